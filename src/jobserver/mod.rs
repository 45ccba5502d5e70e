//! Self-hosted job servers (Jenkins family).

pub mod models;

pub use models::*;

use crate::{
    Auth, ClientOptions, Error, Job,
    upstream::{HttpClient, Request, endpoint::split_path},
};
use async_trait::async_trait;

/// Field filter for the broken view: enough to render a job and its test/failure summary.
pub const BROKEN_JOBS_TREE: &str = "jobs[name,fullDisplayName,color,url,lastBuild[actions[foundFailureCauses[categories,description],failCount,skipCount,totalCount]]]";

/// Name of the view listing currently failing jobs.
pub const BROKEN_VIEW: &str = "Broken";

/// Read-only queries the aggregator needs from a job server.
#[async_trait]
pub trait JobServer: Send + Sync {
    /// `GET /queue/api/json`
    async fn queue(&self) -> Result<Queue, Error>;

    /// `GET /computer/api/json?tree=busyExecutors`
    async fn busy_executor_count(&self) -> Result<u32, Error>;

    /// `GET /<path>/api/json?tree=<tree>`, where `path` is relative to the base URL.
    async fn jobs_from_path_with_field_filter(
        &self,
        path: &str,
        tree: &str,
    ) -> Result<Vec<Job>, Error>;
}

/// [`JobServer`] over HTTP.
#[derive(Clone)]
pub struct JobServerClient {
    http: HttpClient,
}

impl JobServerClient {
    pub fn new(
        base_url: impl AsRef<str>,
        auth: Option<Auth>,
        options: ClientOptions,
    ) -> Result<Self, Error> {
        let http = HttpClient::builder(base_url)?
            .auth(auth)
            .options(options)
            .build()?;
        Ok(Self { http })
    }

    #[must_use]
    pub fn from_http(http: HttpClient) -> Self {
        Self { http }
    }

    /// `GET /computer/api/json`
    pub async fn executors(&self) -> Result<Executors, Error> {
        self.http
            .send_json(Request::get(["computer", "api", "json"]))
            .await
    }

    /// `GET /overallLoad/api/json`
    pub async fn overall_load(&self) -> Result<OverallLoad, Error> {
        self.http
            .send_json(Request::get(["overallLoad", "api", "json"]))
            .await
    }

    /// `GET /view/<name>/api/json`
    pub async fn jobs_from_view(&self, view: &str) -> Result<Vec<Job>, Error> {
        let view: View = self
            .http
            .send_json(Request::get(["view", view, "api", "json"]))
            .await?;
        Ok(view.jobs)
    }

    /// `GET /view/<name>/api/json?tree=<tree>`
    pub async fn jobs_from_view_with_tree(&self, view: &str, tree: &str) -> Result<Vec<Job>, Error> {
        let view: View = self
            .http
            .send_json(Request::get(["view", view, "api", "json"]).query_pair("tree", tree))
            .await?;
        Ok(view.jobs)
    }
}

#[async_trait]
impl JobServer for JobServerClient {
    async fn queue(&self) -> Result<Queue, Error> {
        self.http
            .send_json(Request::get(["queue", "api", "json"]))
            .await
    }

    async fn busy_executor_count(&self) -> Result<u32, Error> {
        let executors: Executors = self
            .http
            .send_json(Request::get(["computer", "api", "json"]).query_pair("tree", "busyExecutors"))
            .await?;
        Ok(executors.busy_executors)
    }

    async fn jobs_from_path_with_field_filter(
        &self,
        path: &str,
        tree: &str,
    ) -> Result<Vec<Job>, Error> {
        let segments = split_path(path).chain(["api", "json"].map(String::from));
        let view: View = self
            .http
            .send_json(Request::get(segments).query_pair("tree", tree))
            .await?;
        Ok(view.jobs)
    }
}
