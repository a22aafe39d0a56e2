//! Computed metric values.
//!
//! A metric does not reference the ref or environment it was computed for.
//! The owner is recovered from the `project`, `kind`, `ref` and `environment`
//! labels when needed.

use crate::key::{MetricKey, encode_component};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Label holding the project full path.
pub const LABEL_PROJECT: &str = "project";
/// Label holding the ref name.
pub const LABEL_REF: &str = "ref";
/// Label holding the ref kind.
pub const LABEL_KIND: &str = "kind";
/// Label holding the environment name.
pub const LABEL_ENVIRONMENT: &str = "environment";

/// Metric labels, ordered so the key is stable.
pub type Labels = BTreeMap<String, String>;

macro_rules! metric_kinds {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Closed set of metric kinds.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum MetricKind {
            $(#[serde(rename = $name)] $variant,)+
        }

        impl MetricKind {
            /// Every metric kind.
            pub const ALL: &'static [MetricKind] = &[$(MetricKind::$variant,)+];

            /// Stable name, used in keys.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl FromStr for MetricKind {
            type Err = crate::Error;

            fn from_str(s: &str) -> crate::Result<Self> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    other => Err(crate::Error::UnknownMetricKind(other.to_string())),
                }
            }
        }
    };
}

metric_kinds! {
    Coverage => "coverage",
    DurationSeconds => "duration_seconds",
    EnvironmentBehindCommitsCount => "environment_behind_commits_count",
    EnvironmentBehindDurationSeconds => "environment_behind_duration_seconds",
    EnvironmentDeploymentCount => "environment_deployment_count",
    EnvironmentDeploymentDurationSeconds => "environment_deployment_duration_seconds",
    EnvironmentDeploymentJobId => "environment_deployment_job_id",
    EnvironmentDeploymentStatus => "environment_deployment_status",
    EnvironmentDeploymentTimestamp => "environment_deployment_timestamp",
    EnvironmentInformation => "environment_information",
    Id => "id",
    JobArtifactSizeBytes => "job_artifact_size_bytes",
    JobDurationSeconds => "job_duration_seconds",
    JobId => "job_id",
    JobRunCount => "job_run_count",
    JobStatus => "job_status",
    JobTimestamp => "job_timestamp",
    RunCount => "run_count",
    Status => "status",
    Timestamp => "timestamp",
}

impl MetricKind {
    /// Kinds computed from pipeline jobs, dropped when job pulling is disabled.
    pub fn is_job_kind(&self) -> bool {
        matches!(
            self,
            Self::JobArtifactSizeBytes
                | Self::JobDurationSeconds
                | Self::JobId
                | Self::JobRunCount
                | Self::JobStatus
                | Self::JobTimestamp
        )
    }

    /// Kinds emitted as one row per possible status value.
    pub fn is_status_kind(&self) -> bool {
        matches!(self, Self::JobStatus | Self::Status)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single measurement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub kind: MetricKind,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub value: f64,
}

impl Metric {
    /// Create a metric with a zero value.
    pub fn new(kind: MetricKind, labels: Labels) -> Self {
        Self {
            kind,
            labels,
            value: 0.0,
        }
    }

    /// Canonical store key: the kind and the full label set, never the value.
    pub fn key(&self) -> MetricKey {
        let labels = self
            .labels
            .iter()
            .map(|(name, value)| {
                format!("{}={}", encode_component(name), encode_component(value))
            })
            .collect::<Vec<_>>()
            .join(",");
        MetricKey::from_raw(format!("{}:{labels}", self.kind.as_str()))
    }

    /// Value of the label `name`, if set.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}

/// Build a label set from pairs.
pub fn labels<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Labels {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_value_and_label_order() {
        let mut a = Metric::new(
            MetricKind::Coverage,
            labels([("project", "foo"), ("ref", "main")]),
        );
        a.value = 12.5;
        let b = Metric::new(
            MetricKind::Coverage,
            labels([("ref", "main"), ("project", "foo")]),
        );
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().as_str(), "coverage:project=foo,ref=main");
    }

    #[test]
    fn key_distinguishes_kind_and_labels() {
        let l = labels([("project", "foo")]);
        assert_ne!(
            Metric::new(MetricKind::Coverage, l.clone()).key(),
            Metric::new(MetricKind::Status, l).key()
        );
        assert_ne!(
            Metric::new(MetricKind::Status, labels([("a", "b,c=d")])).key(),
            Metric::new(MetricKind::Status, labels([("a", "b"), ("c", "d")])).key()
        );
    }

    #[test]
    fn kind_families() {
        assert!(MetricKind::JobStatus.is_job_kind());
        assert!(MetricKind::JobStatus.is_status_kind());
        assert!(MetricKind::Status.is_status_kind());
        assert!(!MetricKind::Status.is_job_kind());
        assert!(!MetricKind::Coverage.is_job_kind());
        assert!(!MetricKind::EnvironmentDeploymentStatus.is_status_kind());
    }

    #[test]
    fn kind_names_parse_back() {
        for kind in MetricKind::ALL {
            assert_eq!(kind.as_str().parse::<MetricKind>().unwrap(), *kind);
            assert_eq!(
                serde_json::to_string(kind).unwrap(),
                format!("\"{}\"", kind.as_str())
            );
        }
    }
}
