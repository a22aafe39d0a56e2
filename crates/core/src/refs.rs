//! Project refs: branches, tags and merge requests.

use crate::key::{RefKey, join_components};
use crate::project::Project;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a ref.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefKind {
    Branch,
    Tag,
    MergeRequest,
}

impl RefKind {
    /// Label value and key component for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Tag => "tag",
            Self::MergeRequest => "merge-request",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "branch" => Ok(Self::Branch),
            "tag" => Ok(Self::Tag),
            "merge-request" => Ok(Self::MergeRequest),
            other => Err(crate::Error::UnknownRefKind(other.to_string())),
        }
    }
}

/// Project settings cached on a ref.
///
/// All four values are compared and refreshed together by the refs
/// reconciliation pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefSettings {
    pub output_sparse_status_metrics: bool,
    pub pull_pipeline_jobs_enabled: bool,
    pub pull_pipeline_variables_enabled: bool,
    pub pull_pipeline_variables_regexp: String,
}

/// A ref, identified by (project name, kind, name).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    pub kind: RefKind,
    pub project_name: String,
    pub name: String,
    #[serde(flatten)]
    pub settings: RefSettings,
}

impl Ref {
    /// Create a ref of `project`, caching its current settings.
    pub fn new(project: &Project, kind: RefKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            project_name: project.name.clone(),
            name: name.into(),
            settings: project.ref_settings(),
        }
    }

    /// Canonical store key.
    pub fn key(&self) -> RefKey {
        Self::key_for(&self.project_name, self.kind.as_str(), &self.name)
    }

    /// Key of a ref from its identifying parts.
    ///
    /// `kind` is taken as a raw string so keys can be rebuilt from metric
    /// labels without validating them first; an unknown kind simply yields a
    /// key no stored ref can have.
    pub fn key_for(project_name: &str, kind: &str, name: &str) -> RefKey {
        RefKey::from_raw(join_components([project_name, kind, name]))
    }
}
