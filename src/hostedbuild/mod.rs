//! Hosted build services (Travis family), API v3.

pub mod models;

pub use models::*;

use crate::{
    Auth, ClientOptions, Error, Job,
    model::{COLOR_GREEN, COLOR_GREY, COLOR_RED},
    upstream::{HttpClient, Request},
};
use async_trait::async_trait;
use http::{HeaderName, HeaderValue};

pub const DEFAULT_API_URL: &str = "https://api.travis-ci.org/";
pub const DEFAULT_WEB_URL: &str = "https://travis-ci.org/";

const API_VERSION_HEADER: HeaderName = HeaderName::from_static("travis-api-version");

/// Read-only queries the aggregator needs from a hosted build service.
#[async_trait]
pub trait HostedBuild: Send + Sync {
    /// Outcome of the latest build on the repository's tracked branch.
    async fn build_state(&self, repo: &Repository) -> Result<BuildState, Error>;

    /// Link shown on the board for `repo`.
    fn repository_url(&self, repo: &Repository) -> String;

    /// Board job for `repo`: green when the last build passed, red otherwise,
    /// grey when the lookup itself failed.
    async fn job_status(&self, repo: &Repository) -> Job {
        let color = match self.build_state(repo).await {
            Ok(BuildState::Passed) => COLOR_GREEN,
            Ok(BuildState::NotPassed) => COLOR_RED,
            Err(err) => {
                tracing::warn!(repo = %repo.slug(), branch = %repo.branch, error = %err, "branch lookup failed");
                COLOR_GREY
            }
        };
        Job::new(repo.name.clone(), self.repository_url(repo), color)
    }
}

/// [`HostedBuild`] over HTTP.
#[derive(Clone)]
pub struct HostedBuildClient {
    http: HttpClient,
    web_url: String,
}

impl HostedBuildClient {
    /// `access_token` may be empty for public repositories.
    pub fn new(
        api_url: impl AsRef<str>,
        web_url: impl Into<String>,
        access_token: &str,
        options: ClientOptions,
    ) -> Result<Self, Error> {
        let auth = (!access_token.is_empty()).then(|| Auth::token(access_token));
        let http = HttpClient::builder(api_url)?
            .auth(auth)
            .options(options)
            .default_header(API_VERSION_HEADER, HeaderValue::from_static("3"))
            .build()?;
        Ok(Self {
            http,
            web_url: with_trailing_slash(web_url.into()),
        })
    }

    #[must_use]
    pub fn web_url(&self) -> &str {
        &self.web_url
    }

    /// `GET /repo/<organization%2Fname>/branch/<branch>`
    pub async fn branch(&self, repo: &Repository) -> Result<Branch, Error> {
        let slug = repo.slug();
        self.http
            .send_json(Request::get([
                "repo",
                slug.as_str(),
                "branch",
                repo.branch.as_str(),
            ]))
            .await
    }
}

#[async_trait]
impl HostedBuild for HostedBuildClient {
    async fn build_state(&self, repo: &Repository) -> Result<BuildState, Error> {
        Ok(self.branch(repo).await?.build_state())
    }

    fn repository_url(&self, repo: &Repository) -> String {
        format!("{}{}", self.web_url, repo.slug())
    }
}

pub(crate) fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}
