use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{HubError, Result},
    trust::{RepoRef, TrustVerifier},
};

use super::{
    download::{Transport, TransportError},
    metadata::is_sha256_hex,
};

pub const DEFAULT_MANIFEST_BASE_URL: &str = "https://raw.githubusercontent.com";
pub const DEFAULT_MANIFEST_FILE: &str = "ONNX_HUB_MANIFEST.json";

/// One downloadable entry of a repository manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRecord {
    pub model: String,
    pub model_path: String,
    pub onnx_version: String,
    pub opset_version: u32,
    pub tags: BTreeSet<String>,
    pub metadata_properties: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_sha: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_bytes: Option<u64>,
}

impl ModelRecord {
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.model.to_lowercase() == name.to_lowercase()
    }
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    model: String,
    model_path: String,
    opset_version: u32,
    #[serde(default)]
    onnx_version: Option<Value>,
    #[serde(default)]
    metadata: RawMetadata,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    model_sha: Option<String>,
    #[serde(default)]
    model_bytes: Option<u64>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl From<RawRecord> for ModelRecord {
    fn from(raw: RawRecord) -> Self {
        let mut metadata_properties: BTreeMap<String, String> = raw
            .metadata
            .extra
            .into_iter()
            .map(|(key, value)| (key, value_text(value)))
            .collect();
        let model_sha = match raw.metadata.model_sha {
            Some(sha) if is_sha256_hex(&sha) => Some(sha),
            Some(sha) => {
                tracing::warn!(model = %raw.model, model_sha = %sha, "Ignoring malformed model_sha");
                metadata_properties.insert("model_sha".into(), sha);
                None
            }
            None => None,
        };
        for (key, value) in raw.extra {
            metadata_properties
                .entry(key)
                .or_insert_with(|| value_text(value));
        }

        Self {
            model: raw.model,
            model_path: raw.model_path,
            onnx_version: raw.onnx_version.map(value_text).unwrap_or_default(),
            opset_version: raw.opset_version,
            tags: raw.metadata.tags.into_iter().collect(),
            metadata_properties,
            model_sha,
            model_bytes: raw.metadata.model_bytes,
        }
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Parses a manifest document. Records with missing or mistyped required
/// fields are dropped; a document that is not a JSON array, or that lists the
/// same model and opset under two different paths, is rejected.
pub fn parse_manifest(repo: &str, bytes: &[u8]) -> Result<Vec<ModelRecord>> {
    let parse_error = |reason: String| HubError::ManifestParse {
        repo: repo.to_string(),
        reason,
    };

    let entries: Vec<Value> =
        serde_json::from_slice(bytes).map_err(|err| parse_error(err.to_string()))?;

    let mut records = Vec::with_capacity(entries.len());
    let mut seen: HashMap<(String, u32), usize> = HashMap::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let record: ModelRecord = match serde_json::from_value::<RawRecord>(entry) {
            Ok(raw) => raw.into(),
            Err(err) => {
                tracing::warn!(repo, index, error = %err, "Dropping malformed manifest record");
                continue;
            }
        };

        let key = (record.model.to_lowercase(), record.opset_version);
        if let Some(&previous) = seen.get(&key) {
            let existing: &ModelRecord = &records[previous];
            if existing.model_path != record.model_path {
                return Err(parse_error(format!(
                    "{} opset {} listed with conflicting paths {} and {}",
                    record.model, record.opset_version, existing.model_path, record.model_path
                )));
            }
        } else {
            seen.insert(key, records.len());
        }
        records.push(record);
    }
    Ok(records)
}

/// Retrieves manifests for trusted repositories.
pub struct ManifestClient {
    transport: Arc<dyn Transport>,
    trust: Arc<TrustVerifier>,
    base_url: String,
    manifest_file: String,
}

impl ManifestClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        trust: Arc<TrustVerifier>,
        base_url: impl Into<String>,
        manifest_file: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            trust,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            manifest_file: manifest_file.into(),
        }
    }

    #[must_use]
    pub fn manifest_url(&self, repo: &RepoRef) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.base_url, repo.owner, repo.name, repo.reference, self.manifest_file
        )
    }

    pub fn fetch_manifest(&self, repo: &RepoRef) -> Result<Vec<ModelRecord>> {
        if !self.trust.verify_ref(repo) {
            return Err(HubError::Untrusted(repo.to_string()));
        }

        let url = self.manifest_url(repo);
        tracing::debug!(repo = %repo, url = %url, "Fetching manifest");
        let bytes = self.transport.fetch_bytes(&url).map_err(|err| match err {
            TransportError::NotFound { url } => HubError::ManifestNotFound {
                repo: repo.to_string(),
                url,
            },
            other => HubError::Network(other),
        })?;

        let records = parse_manifest(&repo.to_string(), &bytes)?;
        tracing::debug!(repo = %repo, records = records.len(), "Parsed manifest");
        Ok(records)
    }
}
