//! Units of work leased through the store's task queue.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of a queued task. Rendered in PascalCase inside task keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    PullProjectsFromWildcard,
    PullEnvironmentsFromProject,
    PullEnvironmentMetrics,
    PullMetrics,
    PullRefsFromProject,
    PullRefMetrics,
    GarbageCollectProjects,
    GarbageCollectEnvironments,
    GarbageCollectRefs,
    GarbageCollectMetrics,
}

impl TaskType {
    /// Every task type.
    pub const ALL: &'static [TaskType] = &[
        Self::PullProjectsFromWildcard,
        Self::PullEnvironmentsFromProject,
        Self::PullEnvironmentMetrics,
        Self::PullMetrics,
        Self::PullRefsFromProject,
        Self::PullRefMetrics,
        Self::GarbageCollectProjects,
        Self::GarbageCollectEnvironments,
        Self::GarbageCollectRefs,
        Self::GarbageCollectMetrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PullProjectsFromWildcard => "PullProjectsFromWildcard",
            Self::PullEnvironmentsFromProject => "PullEnvironmentsFromProject",
            Self::PullEnvironmentMetrics => "PullEnvironmentMetrics",
            Self::PullMetrics => "PullMetrics",
            Self::PullRefsFromProject => "PullRefsFromProject",
            Self::PullRefMetrics => "PullRefMetrics",
            Self::GarbageCollectProjects => "GarbageCollectProjects",
            Self::GarbageCollectEnvironments => "GarbageCollectEnvironments",
            Self::GarbageCollectRefs => "GarbageCollectRefs",
            Self::GarbageCollectMetrics => "GarbageCollectMetrics",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| crate::Error::UnknownTaskType(s.to_string()))
    }
}

/// Key of a queued task: `<TaskType>:<work id>`.
///
/// Backends add their own namespace prefix on top of this.
pub fn task_key(task_type: TaskType, work_id: &str) -> String {
    format!("{task_type}:{work_id}")
}
