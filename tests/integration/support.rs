//! Shared fixtures for the integration tests

use atlas_discovery::ci::{CiClient, CiServer, Credential};
use atlas_discovery::config::{parse_config, Config};
use atlas_discovery::crawler::Coordinator;
use atlas_discovery::storage::SqliteStorage;
use serde_json::{json, Value};

pub const USERNAME: &str = "ci-bot";
pub const SECRET: &str = "api-token";

pub const FOLDER_CLASS: &str = "com.cloudbees.hudson.plugins.folder.Folder";
pub const MULTIBRANCH_CLASS: &str =
    "org.jenkinsci.plugins.workflow.multibranch.WorkflowMultiBranchProject";
pub const PIPELINE_CLASS: &str = "org.jenkinsci.plugins.workflow.job.WorkflowJob";
pub const FREESTYLE_CLASS: &str = "hudson.model.FreeStyleProject";

/// Builds a config with one credentialed server pointing at `base_url`
pub fn test_config(base_url: &str, max_depth: u32) -> Config {
    parse_config(&format!(
        r#"
[discovery]
workers = 3
max-depth = {max_depth}
max-attempts = 3
retry-delay-ms = 10
request-timeout-secs = 5

[output]
database-path = ":memory:"

[[credential]]
name = "bot"
username = "{USERNAME}"
secret = "{SECRET}"

[[server]]
name = "main"
url = "{base_url}"
credential = "bot"
"#
    ))
    .expect("test config should be valid")
}

/// Coordinator over an in-memory database
pub fn test_coordinator(base_url: &str, max_depth: u32) -> Coordinator {
    let config = test_config(base_url, max_depth);
    let client = CiClient::new(&config.discovery, &config.user_agent).expect("client");
    let storage = SqliteStorage::new_in_memory().expect("storage");
    Coordinator::with_parts(config, storage, client, "test-hash").expect("coordinator")
}

/// Client with fast retries
pub fn test_client() -> CiClient {
    let config = test_config("http://127.0.0.1", 8);
    CiClient::new(&config.discovery, &config.user_agent).expect("client")
}

pub fn test_server(base_url: &str, with_credential: bool) -> CiServer {
    CiServer {
        id: 1,
        name: "main".to_string(),
        url: base_url.to_string(),
        last_synced_at: None,
        credential_ref: with_credential.then(|| "bot".to_string()),
        credential: with_credential.then(|| Credential::new(USERNAME, SECRET)),
    }
}

/// A listed item as Jenkins returns it (URLs carry a trailing slash)
pub fn item(class: &str, name: &str, url: &str) -> Value {
    json!({
        "_class": class,
        "name": name,
        "url": format!("{}/", url.trim_end_matches('/')),
        "displayName": name,
        "fullDisplayName": name,
        "description": format!("{} description", name)
    })
}

pub fn listing(items: Vec<Value>) -> Value {
    json!({ "_class": FOLDER_CLASS, "jobs": items })
}
