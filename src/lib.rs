//! Broken-build aggregation for CI dashboards.
//!
//! Polls self-hosted job servers and hosted build services concurrently and
//! merges their state into ordered, JSON-ready records. Upstream failures
//! degrade individual records; the snapshot queries themselves never fail.

pub mod aggregate;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fanout;
pub mod hostedbuild;
pub mod instance;
pub mod jobserver;
pub mod model;
pub mod upstream;

pub use auth::{Auth, SecretString};
pub use config::{ConfigWarning, DashboardConfig, LoadedConfig};
pub use dashboard::{Dashboard, DashboardBuilder};
pub use error::{BodySnippetConfig, Error, ErrorKind, HttpError, Result, TransportErrorKind};
pub use fanout::FanOut;
pub use hostedbuild::{HostedBuild, HostedBuildClient};
pub use instance::{HostedBuildInstance, JobServerInstance};
pub use jobserver::{JobServer, JobServerClient};
pub use model::{
    Aggregation, HostedBuildAggregation, InstanceKind, Job, JobServerAggregation, Status,
};
pub use upstream::{ClientOptions, HttpClient};
