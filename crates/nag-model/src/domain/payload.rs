use serde::{Deserialize, Serialize};

use crate::{TAG_PLUGIN_PREFIXES, Uniqid};

/// What a delivery task carries: the notification content plus its identity.
///
/// The engine never looks inside; delivery backends do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub uniqid: Uniqid,
    pub message: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originated_from: Option<String>,
}

impl Payload {
    /// Backend names requested through `plugin:` / `plugins:` tags.
    ///
    /// Returns `None` when no tag selects a backend explicitly.
    pub fn requested_backends(&self) -> Option<Vec<&str>> {
        let names: Vec<&str> = self
            .tags
            .iter()
            .filter_map(|tag| {
                TAG_PLUGIN_PREFIXES
                    .iter()
                    .find_map(|prefix| tag.strip_prefix(prefix))
            })
            .flat_map(|csv| csv.split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();

        if names.is_empty() { None } else { Some(names) }
    }
}
