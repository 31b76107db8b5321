//! CI server, credential, and folder-item types

use serde::Deserialize;
use std::fmt;

/// Basic-auth identity used against a CI server
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub secret: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

// Keeps secrets out of logs and panic messages
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// One CI endpoint as seen by the crawler
#[derive(Debug, Clone)]
pub struct CiServer {
    /// Row ID in the catalog store
    pub id: i64,
    pub name: String,
    /// Base URL of the server
    pub url: String,
    pub last_synced_at: Option<String>,
    /// Name of the configured credential, if any
    pub credential_ref: Option<String>,
    /// Resolved identity; `None` means requests fail before reaching the network
    pub credential: Option<Credential>,
}

impl CiServer {
    /// Returns the credential or a `MissingCredential` error
    pub fn require_credential(&self) -> crate::Result<&Credential> {
        self.credential
            .as_ref()
            .ok_or_else(|| crate::DiscoveryError::MissingCredential {
                server: self.name.clone(),
            })
    }
}

/// Classification of an item returned by a folder listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Standard, organization, or multi-branch container
    Folder,
    /// Buildable pipeline definition
    Pipeline,
    /// Anything else (freestyle jobs, views, unknown plugins)
    Other,
}

impl ItemKind {
    /// Classifies an item by its `_class` discriminator
    ///
    /// Only the simple class name is inspected, so both
    /// `com.cloudbees.hudson.plugins.folder.Folder` and a shaded
    /// `x.y.Folder` count as folders.
    pub fn classify(class: Option<&str>) -> Self {
        let Some(class) = class else {
            return Self::Other;
        };
        let simple = class.rsplit(['.', '$']).next().unwrap_or(class);

        if simple == "Folder" || simple == "OrganizationFolder" || simple.ends_with("MultiBranchProject")
        {
            Self::Folder
        } else if simple == "WorkflowJob" {
            Self::Pipeline
        } else {
            Self::Other
        }
    }
}

/// A child item of a CI folder
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CiItem {
    #[serde(rename = "_class", default)]
    pub class: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,

    #[serde(rename = "fullDisplayName", default)]
    pub full_display_name: Option<String>,
}

impl CiItem {
    pub fn kind(&self) -> ItemKind {
        ItemKind::classify(self.class.as_deref())
    }

    /// Display name, falling back to the item name
    pub fn display_name_or_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.name)
    }
}

/// Body of a `{folder}/api/json` response
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FolderListing {
    #[serde(default)]
    pub jobs: Option<Vec<CiItem>>,
}
