//! URL handling for CI endpoints
//!
//! Folder and job URLs double as storage keys and visited-set entries, so
//! every URL is normalized before it is compared, stored, or extended with
//! an API suffix.

mod normalize;

use thiserror::Error;

pub use normalize::normalize_ci_url;

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Unsupported URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Endpoint suffix that triggers a build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEndpoint {
    /// `POST {job}/build`
    Build,
    /// `POST {job}/buildWithParameters`
    BuildWithParameters,
}

impl TriggerEndpoint {
    /// Picks the endpoint for a parameter set
    pub fn for_parameter_count(count: usize) -> Self {
        if count == 0 {
            Self::Build
        } else {
            Self::BuildWithParameters
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::BuildWithParameters => "buildWithParameters",
        }
    }
}

/// Builds the JSON listing endpoint for a server or folder URL
///
/// # Examples
///
/// ```
/// use atlas_discovery::url::api_json_url;
///
/// let url = api_json_url("https://ci.example.com/job/team-a/").unwrap();
/// assert_eq!(url, "https://ci.example.com/job/team-a/api/json");
/// ```
pub fn api_json_url(base: &str) -> UrlResult<String> {
    Ok(format!("{}/api/json", normalize_ci_url(base)?))
}

/// Builds the trigger endpoint for a job URL
pub fn trigger_url(job_url: &str, endpoint: TriggerEndpoint) -> UrlResult<String> {
    Ok(format!("{}/{}", normalize_ci_url(job_url)?, endpoint.suffix()))
}
