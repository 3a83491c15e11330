pub mod hub;
pub mod logging;
pub mod settings;

pub use hub::{HubClient, LoadOptions, LoadStage};
pub use logging::init_logging;
pub use settings::{HubSettings, DEFAULT_ARTIFACT_BASE_URL};
