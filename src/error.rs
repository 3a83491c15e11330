use std::{io, path::PathBuf};

use thiserror::Error;

use crate::models::TransportError;

pub type Result<T> = std::result::Result<T, HubError>;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("repository reference is not trusted: {0}")]
    Untrusted(String),

    #[error("manifest not found for {repo} at {url}")]
    ManifestNotFound { repo: String, url: String },

    #[error("manifest for {repo} could not be parsed: {reason}")]
    ManifestParse { repo: String, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no model named {name:?}{} in manifest", opset_suffix(.opset))]
    NotFound { name: String, opset: Option<u32> },

    #[error(transparent)]
    Network(#[from] TransportError),

    #[error("cache io failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("artifact could not be parsed: {0}")]
    Parse(String),

    #[error("{model} has {actual} but the manifest expects {expected}; {hint}")]
    Integrity {
        model: String,
        expected: String,
        actual: String,
        hint: &'static str,
    },
}

impl HubError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn opset_suffix(opset: &Option<u32>) -> String {
    opset
        .map(|opset| format!(" with opset {opset}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_mentions_requested_opset() {
        let error = HubError::NotFound {
            name: "mnist".into(),
            opset: Some(9),
        };
        assert_eq!(
            error.to_string(),
            "no model named \"mnist\" with opset 9 in manifest"
        );
    }

    #[test]
    fn untrusted_message_names_the_ref() {
        let error = HubError::Untrusted("someone/models".into());
        assert!(error.to_string().contains("not trusted"));
        assert!(error.to_string().contains("someone/models"));
    }
}
