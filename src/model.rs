//! Normalized records shared by both CI families and emitted as JSON.

use serde::{Deserialize, Serialize};

/// Reachability of one instance during a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Unavailable,
}

impl Status {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Unavailable => "unavailable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceKind {
    JobServer,
    HostedBuild,
}

impl InstanceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JobServer => "jobserver",
            Self::HostedBuild => "hostedbuild",
        }
    }
}

/// Common envelope of every per-instance record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregation {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: InstanceKind,
    pub status: Status,
}

impl Aggregation {
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: InstanceKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
            status: Status::Ok,
        }
    }

    /// Downgrade to unavailable. Never upgrades back.
    pub fn mark_unavailable(&mut self) {
        self.status = Status::Unavailable;
    }
}

pub const COLOR_GREEN: &str = "green";
pub const COLOR_RED: &str = "red";
pub const COLOR_GREY: &str = "grey";

/// A job as shown on the board.
///
/// Job servers fill the optional fields from the broken view; hosted build
/// jobs only carry name, url and color.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_build: Option<LastBuild>,
}

impl Job {
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            color: color.into(),
            ..Self::default()
        }
    }

    /// Green or no color at all.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.color.is_empty() || self.color == COLOR_GREEN
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastBuild {
    #[serde(default)]
    pub actions: Vec<BuildAction>,
}

/// One `lastBuild.actions[]` entry. Most actions are empty objects; test
/// result and failure cause actions fill the fields below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub found_failure_causes: Vec<FailureCause>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureCause {
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobServerAggregation {
    #[serde(flatten)]
    pub aggregation: Aggregation,
    pub broken_view_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    pub busy_executor_count: u32,
    pub build_queue_size: usize,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostedBuildAggregation {
    #[serde(flatten)]
    pub aggregation: Aggregation,
    /// Only jobs that are not successful.
    pub jobs: Vec<Job>,
}
