use std::{path::PathBuf, sync::Arc};

use crate::error::{HubError, Result};
use crate::models::{
    validate_opset, verify_artifact, ArtifactParser, ArtifactSource, BlobParser, CacheStore,
    HttpTransport, ManifestClient, ModelCatalog, ModelRecord, Transport,
};
use crate::trust::{RepoRef, TrustVerifier};

use super::settings::HubSettings;

const DOWNLOAD_HINT: &str = "the download is corrupt or the manifest is stale";
const CACHED_HINT: &str =
    "the model in the hub may have been updated, use force_reload to download it again";

/// Informational output, demoted to debug for silent requests.
macro_rules! progress {
    ($silent:expr, $($arg:tt)+) => {
        if $silent {
            tracing::debug!($($arg)+)
        } else {
            tracing::info!($($arg)+)
        }
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub opset: Option<i64>,
    pub force_reload: bool,
    pub silent: bool,
}

impl LoadOptions {
    #[must_use]
    pub fn opset(opset: i64) -> Self {
        Self {
            opset: Some(opset),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Verify,
    FetchManifest,
    Resolve,
    CacheCheck,
    Download,
    Persist,
    Load,
    Done,
}

/// Entry point: trust check, manifest lookup, cache, download.
pub struct HubClient<P: ArtifactParser = BlobParser> {
    trust: Arc<TrustVerifier>,
    manifests: ManifestClient,
    cache: Arc<CacheStore>,
    transport: Arc<dyn Transport>,
    parser: P,
    artifact_base_url: String,
    verify_checksums: bool,
}

impl HubClient<BlobParser> {
    /// Client over HTTP returning raw [`crate::models::ModelBlob`]s.
    pub fn new(settings: &HubSettings) -> Result<Self> {
        let transport = HttpTransport::new(&settings.user_agent, settings.timeout())?;
        Self::with_parts(settings, Arc::new(transport), BlobParser)
    }
}

impl<P: ArtifactParser> HubClient<P> {
    pub fn with_parts(
        settings: &HubSettings,
        transport: Arc<dyn Transport>,
        parser: P,
    ) -> Result<Self> {
        let trust = Arc::new(TrustVerifier::with_rules(&settings.trusted_repos)?);
        let cache = match &settings.cache_dir {
            Some(dir) => CacheStore::new(dir),
            None => CacheStore::default(),
        };
        let manifests = ManifestClient::new(
            transport.clone(),
            trust.clone(),
            settings.manifest_base_url.as_str(),
            settings.manifest_file.as_str(),
        );

        Ok(Self {
            trust,
            manifests,
            cache: Arc::new(cache),
            transport,
            parser,
            artifact_base_url: settings.artifact_base_url.trim_end_matches('/').to_string(),
            verify_checksums: settings.verify_checksums,
        })
    }

    #[must_use]
    pub fn trust(&self) -> &TrustVerifier {
        &self.trust
    }

    #[must_use]
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    #[must_use]
    pub fn get_dir(&self) -> PathBuf {
        self.cache.root()
    }

    pub fn set_dir(&self, path: impl Into<PathBuf>) {
        self.cache.set_root(path);
    }

    /// Downloads (or reuses the cached copy of) `name` from `repo_ref` and
    /// parses it.
    pub fn load(&self, name: &str, repo_ref: &str, options: &LoadOptions) -> Result<P::Artifact> {
        let mut stage = LoadStage::Verify;
        let result = self.load_stages(name, repo_ref, options, &mut stage);
        if let Err(error) = &result {
            tracing::debug!(model = name, repo = repo_ref, failed_at = ?stage, %error, "Model load failed");
        }
        result
    }

    fn load_stages(
        &self,
        name: &str,
        repo_ref: &str,
        options: &LoadOptions,
        stage: &mut LoadStage,
    ) -> Result<P::Artifact> {
        let repo = self.verified(repo_ref)?;
        validate_opset(options.opset)?;

        advance(stage, LoadStage::FetchManifest, name);
        let records = self.manifests.fetch_manifest(&repo)?;

        advance(stage, LoadStage::Resolve, name);
        let record = ModelCatalog::resolve(&records, name, options.opset)?;

        advance(stage, LoadStage::CacheCheck, name);
        let path = self.cache.path_for(&repo.owner, &repo.name, record);
        let (expected_sha, expected_len) = if self.verify_checksums {
            (record.model_sha.as_deref(), record.model_bytes)
        } else {
            (None, None)
        };

        if !options.force_reload && self.cache.exists(&path) {
            progress!(
                options.silent,
                model = %record.model,
                opset = record.opset_version,
                path = %path.display(),
                "Using cached model"
            );
        } else {
            advance(stage, LoadStage::Download, name);
            let url = self.artifact_url(&repo, record);
            progress!(
                options.silent,
                model = %record.model,
                opset = record.opset_version,
                url = %url,
                "Downloading model"
            );
            let bytes = self
                .transport
                .fetch_bytes_with_progress(&url, &mut |downloaded: u64| {
                    tracing::trace!(downloaded, expected = ?record.model_bytes, "Download progress");
                })?;
            verify_artifact(&record.model, expected_sha, expected_len, &bytes, DOWNLOAD_HINT)?;

            advance(stage, LoadStage::Persist, name);
            self.cache.write(&path, &bytes)?;
            progress!(
                options.silent,
                bytes = bytes.len(),
                path = %path.display(),
                "Cached model"
            );
        }

        advance(stage, LoadStage::Load, name);
        let bytes = self.cache.read(&path)?;
        verify_artifact(&record.model, expected_sha, expected_len, &bytes, CACHED_HINT)?;
        let source = ArtifactSource {
            record: record.clone(),
            path,
        };
        let artifact = self.parser.parse(bytes, &source)?;

        advance(stage, LoadStage::Done, name);
        Ok(artifact)
    }

    /// Manifest records of `repo_ref`, optionally filtered by model name and
    /// tags.
    pub fn list_models<S: AsRef<str>>(
        &self,
        repo_ref: &str,
        model: Option<&str>,
        tags: &[S],
    ) -> Result<Vec<ModelRecord>> {
        let repo = self.verified(repo_ref)?;
        let records = self.manifests.fetch_manifest(&repo)?;
        Ok(ModelCatalog::list(&records, model, tags)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn get_model_info(
        &self,
        name: &str,
        repo_ref: &str,
        opset: Option<i64>,
    ) -> Result<ModelRecord> {
        let repo = self.verified(repo_ref)?;
        validate_opset(opset)?;
        let records = self.manifests.fetch_manifest(&repo)?;
        ModelCatalog::get_info(&records, name, opset).cloned()
    }

    /// Where `load` would cache the artifact, without downloading it.
    pub fn cached_path(&self, name: &str, repo_ref: &str, opset: Option<i64>) -> Result<PathBuf> {
        let repo = self.verified(repo_ref)?;
        validate_opset(opset)?;
        let records = self.manifests.fetch_manifest(&repo)?;
        let record = ModelCatalog::resolve(&records, name, opset)?;
        Ok(self.cache.path_for(&repo.owner, &repo.name, record))
    }

    #[must_use]
    pub fn artifact_url(&self, repo: &RepoRef, record: &ModelRecord) -> String {
        let model_path = record.model_path.replace('\\', "/");
        if model_path.starts_with("https://") || model_path.starts_with("http://") {
            return model_path;
        }
        format!(
            "{}/{}/{}/{}/{}",
            self.artifact_base_url,
            repo.owner,
            repo.name,
            repo.reference,
            model_path.trim_start_matches('/')
        )
    }

    fn verified(&self, repo_ref: &str) -> Result<RepoRef> {
        let repo = RepoRef::parse(repo_ref)?;
        if !self.trust.verify_ref(&repo) {
            return Err(HubError::Untrusted(repo_ref.to_string()));
        }
        Ok(repo)
    }
}

fn advance(stage: &mut LoadStage, next: LoadStage, model: &str) {
    tracing::debug!(model, from = ?stage, to = ?next, "Hub request stage");
    *stage = next;
}
