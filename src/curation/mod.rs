//! Curation collaborator interface.
//!
//! Manual curation happens outside this crate: a curation document (local
//! JSON, a content-addressed URI or a JSON file in a GitHub repository)
//! assigns labels to sorted units and may merge them. This module only
//! describes where such a document lives, which labels a caller keeps, and
//! the traits an implementation plugs into.

use crate::error::{Result, SpikeError};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Location of a curation document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CurationSource {
    /// JSON file on the local filesystem
    LocalFile(PathBuf),
    /// Content-addressed document, e.g. `sha1://<hash>`
    ContentUri { algorithm: String, hash: String },
    /// `gh://owner/repo/branch/path/to/file.json`
    GitHub {
        owner: String,
        repo: String,
        branch: String,
        path: String,
    },
}

impl CurationSource {
    /// Parse a URI or a filesystem path.
    pub fn parse(uri_or_path: &str) -> Result<Self> {
        let text = uri_or_path.trim();
        if text.is_empty() {
            return Err(SpikeError::Curation("empty curation source".to_string()));
        }

        if let Some(rest) = text.strip_prefix("gh://") {
            let mut parts = rest.splitn(4, '/');
            let (Some(owner), Some(repo), Some(branch), Some(path)) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(SpikeError::Curation(format!(
                    "expected gh://owner/repo/branch/path, got {:?}",
                    text
                )));
            };
            if [owner, repo, branch, path].iter().any(|p| p.is_empty()) {
                return Err(SpikeError::Curation(format!(
                    "empty component in {:?}",
                    text
                )));
            }
            return Ok(CurationSource::GitHub {
                owner: owner.to_string(),
                repo: repo.to_string(),
                branch: branch.to_string(),
                path: path.to_string(),
            });
        }

        if let Some((scheme, hash)) = text.split_once("://") {
            let hash = hash.split('?').next().unwrap_or_default();
            if scheme.is_empty() || hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(SpikeError::Curation(format!(
                    "invalid content URI {:?}",
                    text
                )));
            }
            return Ok(CurationSource::ContentUri {
                algorithm: scheme.to_ascii_lowercase(),
                hash: hash.to_ascii_lowercase(),
            });
        }

        Ok(CurationSource::LocalFile(PathBuf::from(text)))
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, CurationSource::LocalFile(_))
    }
}

impl std::fmt::Display for CurationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurationSource::LocalFile(path) => write!(f, "{}", path.display()),
            CurationSource::ContentUri { algorithm, hash } => write!(f, "{}://{}", algorithm, hash),
            CurationSource::GitHub {
                owner,
                repo,
                branch,
                path,
            } => write!(f, "gh://{}/{}/{}/{}", owner, repo, branch, path),
        }
    }
}

impl std::str::FromStr for CurationSource {
    type Err = SpikeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Which labelled units survive curation.
///
/// A unit is kept when it carries at least one `include` label (or `include`
/// is empty) and none of the `exclude` labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl LabelFilter {
    pub fn include<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: labels.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
        }
    }

    pub fn exclude<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: Vec::new(),
            exclude: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn admits<S: AsRef<str>>(&self, labels: &[S]) -> bool {
        let has = |wanted: &String| labels.iter().any(|l| l.as_ref() == wanted.as_str());
        let included = self.include.is_empty() || self.include.iter().any(|w| has(w));
        included && !self.exclude.iter().any(|w| has(w))
    }
}

/// Read access to a sorted-units result.
pub trait SortingHandle: Send + Sync {
    fn unit_ids(&self) -> Vec<String>;

    /// Names of the per-unit properties (labels appear as boolean properties).
    fn property_keys(&self) -> Vec<String>;

    /// Per-unit string values of a property, if present.
    fn property(&self, _key: &str) -> Option<BTreeMap<String, String>> {
        None
    }
}

/// Applies a curation document to a sorting.
pub trait Curator {
    fn apply(
        &self,
        sorting: &dyn SortingHandle,
        source: &CurationSource,
        filter: &LabelFilter,
    ) -> Result<Box<dyn SortingHandle>>;
}
