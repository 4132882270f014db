use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HubError, HubResult};

/// Kind of hub repository. Determines the URL prefix and the plural
/// directory prefix used in the on-disk cache layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoKind {
    Model,
    Dataset,
    Space,
}

impl RepoKind {
    /// Plural directory prefix (`models--…`, `datasets--…`, `spaces--…`).
    pub fn plural(self) -> &'static str {
        match self {
            RepoKind::Model => "models",
            RepoKind::Dataset => "datasets",
            RepoKind::Space => "spaces",
        }
    }

    /// URL path prefix for content URLs. Models live at the site root.
    pub(crate) fn url_prefix(self) -> &'static str {
        match self {
            RepoKind::Model => "",
            RepoKind::Dataset => "datasets/",
            RepoKind::Space => "spaces/",
        }
    }
}

impl FromStr for RepoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" | "models" => Ok(RepoKind::Model),
            "dataset" | "datasets" => Ok(RepoKind::Dataset),
            "space" | "spaces" => Ok(RepoKind::Space),
            other => Err(format!("unknown repo kind: {other}")),
        }
    }
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RepoKind::Model => "model",
            RepoKind::Dataset => "dataset",
            RepoKind::Space => "space",
        };
        f.write_str(s)
    }
}

/// A `namespace/name` repository identifier.
///
/// The id is split on the *first* slash only, so a name may itself contain
/// slashes. Both components must be non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub namespace: String,
    pub name: String,
}

impl RepoId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }

    /// Parse `namespace/name`, splitting on the first `/`.
    pub fn parse(s: &str) -> HubResult<Self> {
        match s.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() => {
                Ok(Self::new(ns, name))
            }
            _ => Err(HubError::InvalidRepoId(s.to_string())),
        }
    }

    /// Directory-safe form: every `/` in the id becomes `--`.
    pub fn slug(&self) -> String {
        format!("{}--{}", self.namespace, self.name.replace('/', "--"))
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for RepoId {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A revision is a commit hash exactly when it is 40 hex characters.
/// Everything else (branches, tags, `refs/pr/5`) is a symbolic ref.
pub fn is_commit_hash(revision: &str) -> bool {
    revision.len() == 40 && revision.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_id() {
        let id = RepoId::parse("a/b").unwrap();
        assert_eq!(id.namespace, "a");
        assert_eq!(id.name, "b");
        assert_eq!(id.to_string(), "a/b");
    }

    #[test]
    fn parse_splits_on_first_slash_only() {
        let id = RepoId::parse("a/b/c").unwrap();
        assert_eq!(id.namespace, "a");
        assert_eq!(id.name, "b/c");
    }

    #[test]
    fn parse_rejects_missing_namespace() {
        assert!(RepoId::parse("a").is_err());
        assert!(RepoId::parse("/b").is_err());
        assert!(RepoId::parse("a/").is_err());
    }

    #[test]
    fn slug_replaces_every_slash() {
        assert_eq!(RepoId::parse("ns/n").unwrap().slug(), "ns--n");
        assert_eq!(RepoId::parse("a/b/c").unwrap().slug(), "a--b--c");
    }

    #[test]
    fn commit_hash_classification() {
        assert!(is_commit_hash("1111111111111111111111111111111111111111"));
        assert!(is_commit_hash("abcdefABCDEF0123456789abcdefabcdefabcdef"));
        // wrong length
        assert!(!is_commit_hash("abc123"));
        assert!(!is_commit_hash(&"a".repeat(41)));
        // non-hex character
        assert!(!is_commit_hash(&"g".repeat(40)));
        // symbolic refs
        assert!(!is_commit_hash("main"));
        assert!(!is_commit_hash("refs/pr/5"));
    }

    #[test]
    fn kind_plural_prefixes() {
        assert_eq!(RepoKind::Model.plural(), "models");
        assert_eq!(RepoKind::Dataset.plural(), "datasets");
        assert_eq!(RepoKind::Space.plural(), "spaces");
    }

    #[test]
    fn kind_parses_both_forms() {
        assert_eq!("model".parse::<RepoKind>().unwrap(), RepoKind::Model);
        assert_eq!("datasets".parse::<RepoKind>().unwrap(), RepoKind::Dataset);
        assert!("weights".parse::<RepoKind>().is_err());
    }
}
