mod artifact;
mod cache;
mod catalog;
mod download;
mod manifest;
mod metadata;

pub use artifact::{ArtifactParser, ArtifactSource, BlobParser, ModelBlob};
pub use cache::{default_cache_dir, CacheStore, HOME_ENV};
pub(crate) use catalog::validate_opset;
pub use catalog::ModelCatalog;
pub use download::{HttpTransport, Transport, TransportError};
pub use manifest::{
    parse_manifest, ManifestClient, ModelRecord, DEFAULT_MANIFEST_BASE_URL, DEFAULT_MANIFEST_FILE,
};
pub(crate) use metadata::verify_artifact;
pub use metadata::{is_sha256_hex, sha256_hex};
