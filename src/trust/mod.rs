mod repo_ref;
mod verifier;

pub use repo_ref::{RepoRef, DEFAULT_REF};
pub use verifier::{TrustRule, TrustVerifier, DEFAULT_TRUSTED_REPOS};
