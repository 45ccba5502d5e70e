//! Snapshots decoded from job-server `api/json` resources.
//!
//! These only live inside one aggregation call. Unknown fields are ignored and
//! missing ones default, since `tree` projections trim payloads arbitrarily.

use crate::Job;
use serde::{Deserialize, Serialize};

/// `GET /queue/api/json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    #[serde(default)]
    pub items: Vec<QueueItem>,
}

impl Queue {
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueItem {
    pub id: u64,
    pub blocked: bool,
    pub buildable: bool,
    pub stuck: bool,
    pub pending: bool,
    pub in_queue_since: i64,
    pub buildable_start_milliseconds: Option<i64>,
    pub params: Option<String>,
    pub url: String,
    pub why: Option<String>,
    pub task: QueueTask,
    pub actions: Vec<QueueAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueTask {
    pub name: String,
    pub url: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueAction {
    pub causes: Vec<QueueCause>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueCause {
    pub short_description: String,
    pub upstream_build: Option<u64>,
    pub upstream_project: Option<String>,
    pub upstream_url: Option<String>,
}

/// `GET /computer/api/json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Executors {
    pub busy_executors: u32,
    pub total_executors: u32,
    pub display_name: String,
    pub computer: Vec<Computer>,
}

impl Executors {
    #[must_use]
    pub fn idle_executors(&self) -> u32 {
        self.total_executors.saturating_sub(self.busy_executors)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Computer {
    pub display_name: String,
    pub idle: bool,
    pub jnlp_agent: bool,
    pub num_executors: u32,
    pub offline: bool,
    pub offline_cause_reason: String,
    pub temporarily_offline: bool,
}

/// `GET /overallLoad/api/json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverallLoad {
    pub available_executors: LoadStatistic,
    pub busy_executors: LoadStatistic,
    pub connecting_executors: LoadStatistic,
    pub defined_executors: LoadStatistic,
    pub idle_executors: LoadStatistic,
    pub online_executors: LoadStatistic,
    pub queue_length: LoadStatistic,
    pub total_executors: LoadStatistic,
    pub total_queue_length: LoadStatistic,
}

/// Exponential moving averages at three resolutions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadStatistic {
    pub hour: LoadSeries,
    pub min: LoadSeries,
    pub sec10: LoadSeries,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSeries {
    pub history: Vec<f64>,
    pub latest: Option<f64>,
}

/// `GET /view/<name>/api/json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct View {
    #[serde(default)]
    pub jobs: Vec<Job>,
}
