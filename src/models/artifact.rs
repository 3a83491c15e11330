use std::{ops::Deref, path::PathBuf};

use crate::error::{HubError, Result};

use super::manifest::ModelRecord;

/// Turns cached artifact bytes into the caller's in-memory representation.
pub trait ArtifactParser: Send + Sync {
    type Artifact;

    fn parse(&self, bytes: Vec<u8>, source: &ArtifactSource) -> Result<Self::Artifact>;
}

/// Where a set of artifact bytes came from.
#[derive(Debug, Clone)]
pub struct ArtifactSource {
    pub record: ModelRecord,
    pub path: PathBuf,
}

/// The container left opaque: raw bytes plus provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelBlob {
    pub model: String,
    pub opset_version: u32,
    pub path: PathBuf,
    bytes: Vec<u8>,
}

impl ModelBlob {
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Deref for ModelBlob {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

/// Accepts any non-empty payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlobParser;

impl ArtifactParser for BlobParser {
    type Artifact = ModelBlob;

    fn parse(&self, bytes: Vec<u8>, source: &ArtifactSource) -> Result<ModelBlob> {
        if bytes.is_empty() {
            return Err(HubError::Parse(format!(
                "{} is empty",
                source.path.display()
            )));
        }
        Ok(ModelBlob {
            model: source.record.model.clone(),
            opset_version: source.record.opset_version,
            path: source.path.clone(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn source() -> ArtifactSource {
        ArtifactSource {
            record: ModelRecord {
                model: "mnist".into(),
                model_path: "mnist-8.onnx".into(),
                onnx_version: "1.3".into(),
                opset_version: 8,
                tags: BTreeSet::new(),
                metadata_properties: BTreeMap::new(),
                model_sha: None,
                model_bytes: None,
            },
            path: PathBuf::from("/cache/mnist-8.onnx"),
        }
    }

    #[test]
    fn blob_parser_keeps_bytes_and_provenance() {
        let blob = BlobParser.parse(vec![8, 1, 2], &source()).unwrap();
        assert_eq!(blob.bytes(), &[8, 1, 2]);
        assert_eq!(blob.len(), 3);
        assert_eq!(blob.opset_version, 8);
        assert_eq!(blob.path, PathBuf::from("/cache/mnist-8.onnx"));
    }

    #[test]
    fn blob_parser_rejects_empty_payload() {
        assert!(matches!(
            BlobParser.parse(Vec::new(), &source()),
            Err(HubError::Parse(_))
        ));
    }
}
