//! Static descriptors of configured CI endpoints and their bound clients.

use crate::{
    Error,
    hostedbuild::{HostedBuild, Repository},
    jobserver::{BROKEN_VIEW, JobServer},
};
use std::{fmt, sync::Arc};

/// One named job server.
///
/// The broken view is derived once at construction: the override URL when
/// set (it must live under the base URL), the base URL otherwise.
#[derive(Clone)]
pub struct JobServerInstance {
    name: String,
    url: String,
    broken_view_url: String,
    broken_view_path: String,
    public_url: Option<String>,
    client: Arc<dyn JobServer>,
}

impl JobServerInstance {
    /// Fails with [`Error::InvalidConfig`] when `override_url` is not under `url`.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        override_url: Option<String>,
        client: Arc<dyn JobServer>,
    ) -> Result<Self, Error> {
        let name = name.into();
        let url = url.into();
        let broken_view_url = override_url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| url.clone());
        let prefix = relative_view_path(&url, &broken_view_url).ok_or_else(|| {
            Error::invalid_config(format!(
                "job server '{name}': instance URL '{url}' must be part of override URL '{broken_view_url}'"
            ))
        })?;
        let broken_view_path = format!("{prefix}/view/{BROKEN_VIEW}");

        Ok(Self {
            name,
            url,
            broken_view_url,
            broken_view_path,
            public_url: None,
            client,
        })
    }

    #[must_use]
    pub fn with_public_url(mut self, public_url: Option<String>) -> Self {
        self.public_url = public_url.filter(|u| !u.is_empty());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn broken_view_url(&self) -> &str {
        &self.broken_view_url
    }

    /// Path of the broken-jobs listing relative to the base URL, e.g. `/view/team/view/Broken`.
    #[must_use]
    pub fn broken_view_path(&self) -> &str {
        &self.broken_view_path
    }

    #[must_use]
    pub fn public_url(&self) -> Option<&str> {
        self.public_url.as_deref()
    }

    #[must_use]
    pub fn client(&self) -> &Arc<dyn JobServer> {
        &self.client
    }
}

impl fmt::Debug for JobServerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobServerInstance")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("broken_view_url", &self.broken_view_url)
            .field("public_url", &self.public_url)
            .finish_non_exhaustive()
    }
}

/// Remainder of `view_url` after `base_url`, or `None` when it is not underneath.
fn relative_view_path<'a>(base_url: &str, view_url: &'a str) -> Option<&'a str> {
    let base = base_url.trim_end_matches('/');
    let rest = view_url.strip_prefix(base)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest.trim_end_matches('/'))
    } else {
        None
    }
}

/// One hosted build organization and the repositories tracked for it.
#[derive(Clone)]
pub struct HostedBuildInstance {
    name: String,
    url: String,
    repos: Vec<Repository>,
    client: Arc<dyn HostedBuild>,
}

impl HostedBuildInstance {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        repos: Vec<Repository>,
        client: Arc<dyn HostedBuild>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            repos,
            client,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn repos(&self) -> &[Repository] {
        &self.repos
    }

    #[must_use]
    pub fn client(&self) -> &Arc<dyn HostedBuild> {
        &self.client
    }
}

impl fmt::Debug for HostedBuildInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostedBuildInstance")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("repos", &self.repos)
            .finish_non_exhaustive()
    }
}
