//! The aggregation entry points.
//!
//! A [`Dashboard`] holds every configured instance and answers the two
//! snapshot queries. Instances are polled concurrently; results keep
//! configuration order and degrade per instance instead of failing.

use crate::{
    Error, HostedBuildAggregation, JobServerAggregation,
    aggregate::{
        aggregate_hosted_build, aggregate_job_server, empty_hosted_build_record,
        empty_job_server_record,
    },
    config::DashboardConfig,
    fanout::FanOut,
    hostedbuild::HostedBuildClient,
    instance::{HostedBuildInstance, JobServerInstance},
    jobserver::JobServerClient,
};
use std::{num::NonZeroUsize, sync::Arc};

#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    job_servers: Vec<Arc<JobServerInstance>>,
    hosted_builds: Vec<Arc<HostedBuildInstance>>,
    fan_out: FanOut,
}

/// Configures and constructs [`Dashboard`].
#[derive(Debug, Default)]
pub struct DashboardBuilder {
    job_servers: Vec<Arc<JobServerInstance>>,
    hosted_builds: Vec<Arc<HostedBuildInstance>>,
    max_concurrency: Option<NonZeroUsize>,
}

impl DashboardBuilder {
    pub fn job_server(mut self, instance: JobServerInstance) -> Self {
        self.job_servers.push(Arc::new(instance));
        self
    }

    pub fn hosted_build(mut self, instance: HostedBuildInstance) -> Self {
        self.hosted_builds.push(Arc::new(instance));
        self
    }

    /// Bound on concurrently running tasks per fan-out level. Unbounded by default.
    pub fn max_concurrency(mut self, limit: Option<NonZeroUsize>) -> Self {
        self.max_concurrency = limit;
        self
    }

    #[must_use]
    pub fn build(self) -> Dashboard {
        Dashboard {
            job_servers: self.job_servers,
            hosted_builds: self.hosted_builds,
            fan_out: FanOut::bounded(self.max_concurrency),
        }
    }
}

impl Dashboard {
    #[must_use]
    pub fn builder() -> DashboardBuilder {
        DashboardBuilder::default()
    }

    /// Builds HTTP clients and instances for every configured entry.
    ///
    /// Fails on the first instance that cannot be built, e.g. an override URL
    /// outside its job server's base URL.
    pub fn from_config(config: &DashboardConfig) -> Result<Self, Error> {
        let options = config.client_options();
        let mut builder = Self::builder().max_concurrency(config.max_concurrency);

        for entry in &config.job_servers {
            let client = JobServerClient::new(&entry.url, config.job_server_auth(), options.clone())?;
            let instance = JobServerInstance::new(
                entry.name.as_str(),
                entry.url.as_str(),
                entry.override_url.clone(),
                Arc::new(client),
            )?
            .with_public_url(entry.public_url.clone());
            builder = builder.job_server(instance);
        }

        if let Some(hosted) = &config.hosted_build {
            for org in &hosted.organizations {
                let token = org.access_token.as_deref().unwrap_or(&hosted.access_token);
                let client = HostedBuildClient::new(
                    &hosted.api_url,
                    hosted.web_url.as_str(),
                    token,
                    options.clone(),
                )?;
                let url = format!("{}{}", client.web_url(), org.name);
                builder = builder.hosted_build(HostedBuildInstance::new(
                    org.name.as_str(),
                    url,
                    org.repos.clone(),
                    Arc::new(client),
                ));
            }
        }

        let dashboard = builder.build();
        tracing::info!(
            job_servers = dashboard.job_servers.len(),
            hosted_builds = dashboard.hosted_builds.len(),
            "dashboard configured"
        );
        Ok(dashboard)
    }

    #[must_use]
    pub fn job_servers(&self) -> &[Arc<JobServerInstance>] {
        &self.job_servers
    }

    #[must_use]
    pub fn hosted_builds(&self) -> &[Arc<HostedBuildInstance>] {
        &self.hosted_builds
    }

    /// One record per configured job server, in configuration order.
    pub async fn broken_job_server_builds(&self) -> Vec<JobServerAggregation> {
        let fan_out = self.fan_out;
        let tasks = self.job_servers.iter().cloned().map(|instance| async move {
            aggregate_job_server(&instance, fan_out).await
        });
        let slots = fan_out.join_indexed(tasks).await;

        slots
            .into_iter()
            .zip(&self.job_servers)
            .map(|(slot, instance)| {
                slot.unwrap_or_else(|| {
                    tracing::error!(instance = %instance.name(), "job server aggregation aborted");
                    let mut record = empty_job_server_record(instance);
                    record.aggregation.mark_unavailable();
                    record
                })
            })
            .collect()
    }

    /// One record per configured hosted build organization, in configuration order.
    pub async fn broken_hosted_build_builds(&self) -> Vec<HostedBuildAggregation> {
        let fan_out = self.fan_out;
        let tasks = self.hosted_builds.iter().cloned().map(|instance| async move {
            aggregate_hosted_build(&instance, fan_out).await
        });
        let slots = fan_out.join_indexed(tasks).await;

        slots
            .into_iter()
            .zip(&self.hosted_builds)
            .map(|(slot, instance)| {
                slot.unwrap_or_else(|| {
                    tracing::error!(instance = %instance.name(), "hosted build aggregation aborted");
                    empty_hosted_build_record(instance)
                })
            })
            .collect()
    }
}
