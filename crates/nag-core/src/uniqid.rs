use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Serialize)]
struct Identity<'a> {
    message: &'a str,
    tags: &'a [String],
    originated_from: Option<&'a str>,
}

/// Content-derived uniqid: identical message, tags and source coalesce under one id.
pub fn default_uniqid(message: &str, tags: &[String], originated_from: Option<&str>) -> String {
    let identity = Identity {
        message,
        tags,
        originated_from,
    };
    let canonical = serde_json::to_vec(&identity).unwrap_or_else(|_| message.as_bytes().to_vec());
    hex::encode(Sha256::digest(&canonical))
}
