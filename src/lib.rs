//! Trusted, cached retrieval of ONNX models from manifest-indexed
//! repositories.
//!
//! ```no_run
//! use onnx_hub::{HubClient, HubSettings, LoadOptions};
//!
//! let hub = HubClient::new(&HubSettings::load_default()?)?;
//! let model = hub.load("mnist", "onnx/models:main", &LoadOptions::default())?;
//! println!("{} bytes from {}", model.len(), model.path.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod core;
pub mod error;
pub mod models;
pub mod trust;

pub use crate::core::{init_logging, HubClient, HubSettings, LoadOptions, LoadStage};
pub use error::{HubError, Result};
pub use models::{
    ArtifactParser, ArtifactSource, BlobParser, CacheStore, ManifestClient, ModelBlob,
    ModelCatalog, ModelRecord, Transport, TransportError,
};
pub use trust::{RepoRef, TrustVerifier};
