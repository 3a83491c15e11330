use std::{fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::HubError;

pub const DEFAULT_REF: &str = "main";

static SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s/:]+$").expect("segment pattern compiles"));
static REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s:]+$").expect("reference pattern compiles"));

/// A repository reference of the form `owner/name[:ref]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
    pub reference: String,
}

impl RepoRef {
    pub fn parse(value: &str) -> Result<Self, HubError> {
        let (repo, reference) = match value.split_once(':') {
            Some((repo, reference)) => (repo, reference),
            None => (value, DEFAULT_REF),
        };
        let (owner, name) = repo
            .split_once('/')
            .ok_or_else(|| malformed(value, "expected owner/name"))?;

        if [owner, name]
            .iter()
            .any(|segment| !SEGMENT.is_match(segment) || matches!(*segment, "." | ".."))
        {
            return Err(malformed(value, "owner and name must be non-empty"));
        }
        if !REFERENCE.is_match(reference) {
            return Err(malformed(value, "branch or tag must be non-empty"));
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            reference: reference.to_string(),
        })
    }

    /// `owner/name` without the ref.
    #[must_use]
    pub fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = HubError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.owner, self.name, self.reference)
    }
}

fn malformed(value: &str, reason: &str) -> HubError {
    HubError::InvalidArgument(format!("malformed repository reference {value:?}: {reason}"))
}
