use parking_lot::RwLock;
use regex::Regex;

use crate::error::{HubError, Result};

use super::repo_ref::RepoRef;

pub const DEFAULT_TRUSTED_REPOS: &[&str] = &["onnx/models:main", "onnx/models:master"];

/// One allow-list entry. Each segment is matched exactly unless it contains
/// `*`, which matches any run of characters. A rule without `:ref` trusts
/// every ref of the repository.
#[derive(Debug, Clone)]
pub struct TrustRule {
    source: String,
    owner: Regex,
    name: Regex,
    reference: Option<Regex>,
}

impl TrustRule {
    pub fn parse(rule: &str) -> Result<Self> {
        let (repo, reference) = match rule.split_once(':') {
            Some((repo, reference)) => (repo, Some(reference)),
            None => (rule, None),
        };
        let (owner, name) = repo
            .split_once('/')
            .ok_or_else(|| invalid_rule(rule, "expected owner/name"))?;
        if [owner, name].iter().any(|segment| !valid_segment(segment, false))
            || reference.is_some_and(|reference| !valid_segment(reference, true))
        {
            return Err(invalid_rule(rule, "segments must be non-empty without whitespace"));
        }

        Ok(Self {
            source: rule.to_string(),
            owner: glob(owner)?,
            name: glob(name)?,
            reference: reference.map(glob).transpose()?,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn matches(&self, repo: &RepoRef) -> bool {
        self.owner.is_match(&repo.owner)
            && self.name.is_match(&repo.name)
            && self
                .reference
                .as_ref()
                .map_or(true, |reference| reference.is_match(&repo.reference))
    }
}

/// Decides whether a repository reference may be queried or downloaded from.
#[derive(Debug)]
pub struct TrustVerifier {
    rules: RwLock<Vec<TrustRule>>,
}

impl TrustVerifier {
    /// Verifier with no trusted repositories at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
        }
    }

    pub fn with_rules<I, S>(rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let verifier = Self::empty();
        for rule in rules {
            verifier.allow(rule.as_ref())?;
        }
        Ok(verifier)
    }

    pub fn allow(&self, rule: &str) -> Result<()> {
        let rule = TrustRule::parse(rule)?;
        let mut rules = self.rules.write();
        if !rules.iter().any(|existing| existing.source == rule.source) {
            rules.push(rule);
        }
        Ok(())
    }

    #[must_use]
    pub fn rules(&self) -> Vec<String> {
        self.rules
            .read()
            .iter()
            .map(|rule| rule.source.clone())
            .collect()
    }

    /// False for malformed references as well as untrusted ones.
    #[must_use]
    pub fn verify(&self, repo_ref: &str) -> bool {
        match RepoRef::parse(repo_ref) {
            Ok(repo) => self.verify_ref(&repo),
            Err(_) => false,
        }
    }

    #[must_use]
    pub fn verify_ref(&self, repo: &RepoRef) -> bool {
        self.rules.read().iter().any(|rule| rule.matches(repo))
    }
}

impl Default for TrustVerifier {
    fn default() -> Self {
        let rules = DEFAULT_TRUSTED_REPOS
            .iter()
            .filter_map(|rule| TrustRule::parse(rule).ok())
            .collect();
        Self {
            rules: RwLock::new(rules),
        }
    }
}

fn valid_segment(segment: &str, allow_slash: bool) -> bool {
    !segment.is_empty()
        && !segment
            .chars()
            .any(|c| c.is_whitespace() || c == ':' || (!allow_slash && c == '/'))
}

fn glob(segment: &str) -> Result<Regex> {
    let pattern = segment
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{pattern}$"))
        .map_err(|err| HubError::InvalidArgument(format!("trust rule {segment:?}: {err}")))
}

fn invalid_rule(rule: &str, reason: &str) -> HubError {
    HubError::InvalidArgument(format!("malformed trust rule {rule:?}: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_repository_is_trusted() {
        let verifier = TrustVerifier::default();
        assert!(verifier.verify("onnx/models:master"));
        assert!(verifier.verify("onnx/models:main"));
        assert!(verifier.verify("onnx/models"));
    }

    #[test]
    fn unknown_repositories_and_refs_are_untrusted() {
        let verifier = TrustVerifier::default();
        assert!(!verifier.verify("mhamilton723/models"));
        assert!(!verifier.verify("onnx/models:unknown"));
        assert!(!verifier.verify("ONNX/models:main"));
    }

    #[test]
    fn malformed_refs_are_untrusted() {
        let verifier = TrustVerifier::default();
        assert!(!verifier.verify("onnx"));
        assert!(!verifier.verify("onnx/models:"));
        assert!(!verifier.verify(" onnx/models"));
    }

    #[test]
    fn unscoped_rule_trusts_every_ref() {
        let verifier = TrustVerifier::with_rules(["acme/zoo"]).unwrap();
        assert!(verifier.verify("acme/zoo:v1.0"));
        assert!(verifier.verify("acme/zoo:feature/x"));
        assert!(!verifier.verify("acme/zoo2:main"));
    }

    #[test]
    fn wildcard_rules_match_patterns() {
        let verifier = TrustVerifier::with_rules(["acme/*:release-*"]).unwrap();
        assert!(verifier.verify("acme/vision:release-1.2"));
        assert!(!verifier.verify("acme/vision:main"));
        assert!(!verifier.verify("other/vision:release-1.2"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let verifier = TrustVerifier::with_rules(["acme/zoo.v2"]).unwrap();
        assert!(verifier.verify("acme/zoo.v2"));
        assert!(!verifier.verify("acme/zooXv2"));
    }

    #[test]
    fn malformed_rules_are_rejected() {
        let verifier = TrustVerifier::empty();
        assert!(verifier.allow("acme").is_err());
        assert!(verifier.allow("acme/zoo:").is_err());
        assert!(verifier.allow("acme /zoo").is_err());
        assert!(verifier.rules().is_empty());
    }

    #[test]
    fn allow_is_idempotent() {
        let verifier = TrustVerifier::empty();
        verifier.allow("acme/zoo").unwrap();
        verifier.allow("acme/zoo").unwrap();
        assert_eq!(verifier.rules(), vec!["acme/zoo".to_string()]);
    }
}
