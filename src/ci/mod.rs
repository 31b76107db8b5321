//! CI server integration
//!
//! - `CiClient::list_children`: discovery of a folder's immediate children
//! - `CiClient::trigger_build`: starting a build of a known job
//! - `ItemKind`: folder / pipeline / other classification of listed items

mod client;
mod types;

pub use client::{build_http_client, CiClient};
pub use types::{CiItem, CiServer, Credential, ItemKind};
