//! Per-instance aggregation.
//!
//! Each aggregator fans its queries out through [`FanOut`] and never fails:
//! upstream errors degrade the affected fields instead of propagating.

use crate::{
    Aggregation, Error, HostedBuildAggregation, InstanceKind, Job, JobServerAggregation,
    fanout::FanOut,
    instance::{HostedBuildInstance, JobServerInstance},
    jobserver::{BROKEN_JOBS_TREE, Queue},
    model::COLOR_GREY,
};
use std::{future::Future, pin::Pin, sync::Arc};

type ProbeFuture = Pin<Box<dyn Future<Output = Probe> + Send>>;

/// Outcome of one job-server sub-query.
enum Probe {
    Queue(Result<Queue, Error>),
    BusyExecutors(Result<u32, Error>),
    BrokenJobs(Result<Vec<Job>, Error>),
}

#[derive(Debug, Clone, Copy)]
enum ProbeKind {
    Queue,
    BusyExecutors,
    BrokenJobs,
}

impl ProbeKind {
    const ALL: [ProbeKind; 3] = [Self::Queue, Self::BusyExecutors, Self::BrokenJobs];

    fn as_str(self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::BusyExecutors => "busy_executors",
            Self::BrokenJobs => "broken_jobs",
        }
    }

    fn spawn(self, instance: &JobServerInstance) -> ProbeFuture {
        let client = Arc::clone(instance.client());
        match self {
            Self::Queue => Box::pin(async move { Probe::Queue(client.queue().await) }),
            Self::BusyExecutors => {
                Box::pin(async move { Probe::BusyExecutors(client.busy_executor_count().await) })
            }
            Self::BrokenJobs => {
                let path = instance.broken_view_path().to_owned();
                Box::pin(async move {
                    Probe::BrokenJobs(
                        client
                            .jobs_from_path_with_field_filter(&path, BROKEN_JOBS_TREE)
                            .await,
                    )
                })
            }
        }
    }
}

/// Record with every data field at its zero value and status `ok`.
pub(crate) fn empty_job_server_record(instance: &JobServerInstance) -> JobServerAggregation {
    JobServerAggregation {
        aggregation: Aggregation::new(instance.name(), instance.url(), InstanceKind::JobServer),
        broken_view_url: instance.broken_view_url().to_owned(),
        public_url: instance.public_url().map(str::to_owned),
        busy_executor_count: 0,
        build_queue_size: 0,
        jobs: Vec::new(),
    }
}

pub(crate) fn empty_hosted_build_record(instance: &HostedBuildInstance) -> HostedBuildAggregation {
    HostedBuildAggregation {
        aggregation: Aggregation::new(instance.name(), instance.url(), InstanceKind::HostedBuild),
        jobs: Vec::new(),
    }
}

/// Queue size, busy executors and broken jobs of one job server, queried concurrently.
///
/// Any failed query leaves its field at zero and marks the record unavailable;
/// the other queries still populate theirs.
pub async fn aggregate_job_server(
    instance: &JobServerInstance,
    fan_out: FanOut,
) -> JobServerAggregation {
    let mut record = empty_job_server_record(instance);

    let probes = ProbeKind::ALL.map(|kind| kind.spawn(instance));
    let slots = fan_out.join_indexed(probes).await;

    for (kind, slot) in ProbeKind::ALL.into_iter().zip(slots) {
        let failure = match slot {
            Some(Probe::Queue(Ok(queue))) => {
                record.build_queue_size = queue.len();
                None
            }
            Some(Probe::BusyExecutors(Ok(count))) => {
                record.busy_executor_count = count;
                None
            }
            Some(Probe::BrokenJobs(Ok(jobs))) => {
                record.jobs = jobs;
                None
            }
            Some(Probe::Queue(Err(err)))
            | Some(Probe::BusyExecutors(Err(err)))
            | Some(Probe::BrokenJobs(Err(err))) => Some(err.to_string()),
            None => Some("query task aborted".to_owned()),
        };

        if let Some(error) = failure {
            tracing::warn!(
                instance = %instance.name(),
                query = kind.as_str(),
                error = %error,
                "job server query failed"
            );
            record.aggregation.mark_unavailable();
        }
    }

    #[cfg(feature = "metrics")]
    crate::upstream::metrics::record_aggregation(InstanceKind::JobServer, record.aggregation.status);

    record
}

/// Non-successful jobs of one hosted build organization.
///
/// Repositories are looked up concurrently; the result keeps configuration
/// order. Lookup failures show up as grey jobs, so the envelope status stays `ok`.
pub async fn aggregate_hosted_build(
    instance: &HostedBuildInstance,
    fan_out: FanOut,
) -> HostedBuildAggregation {
    let mut record = empty_hosted_build_record(instance);

    let lookups = instance.repos().iter().cloned().map(|repo| {
        let client = Arc::clone(instance.client());
        async move { client.job_status(&repo).await }
    });
    let slots = fan_out.join_indexed(lookups).await;

    record.jobs = slots
        .into_iter()
        .zip(instance.repos())
        .map(|(slot, repo)| {
            slot.unwrap_or_else(|| {
                tracing::warn!(
                    instance = %instance.name(),
                    repo = %repo.slug(),
                    "branch lookup task aborted"
                );
                Job::new(
                    repo.name.clone(),
                    instance.client().repository_url(repo),
                    COLOR_GREY,
                )
            })
        })
        .filter(|job| !job.is_successful())
        .collect();

    #[cfg(feature = "metrics")]
    crate::upstream::metrics::record_aggregation(
        InstanceKind::HostedBuild,
        record.aggregation.status,
    );

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        HttpError, Status,
        hostedbuild::{BuildState, HostedBuild, Repository},
        jobserver::{JobServer, QueueItem},
    };
    use async_trait::async_trait;
    use http::{Method, StatusCode};
    use std::sync::Mutex;

    fn remote_error() -> Error {
        Error::from_http(HttpError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            method: Method::GET,
            url: Box::new(url::Url::parse("https://ci.example.com/").unwrap()),
            message: None,
            body_snippet: None,
        })
    }

    #[derive(Default)]
    struct FakeJobServer {
        fail_queue: bool,
        fail_executors: bool,
        fail_jobs: bool,
        paths: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl JobServer for FakeJobServer {
        async fn queue(&self) -> Result<Queue, Error> {
            if self.fail_queue {
                return Err(remote_error());
            }
            Ok(Queue {
                items: vec![QueueItem::default(); 4],
            })
        }

        async fn busy_executor_count(&self) -> Result<u32, Error> {
            if self.fail_executors {
                return Err(remote_error());
            }
            Ok(6)
        }

        async fn jobs_from_path_with_field_filter(
            &self,
            path: &str,
            tree: &str,
        ) -> Result<Vec<Job>, Error> {
            self.paths
                .lock()
                .unwrap()
                .push((path.to_owned(), tree.to_owned()));
            if self.fail_jobs {
                return Err(remote_error());
            }
            Ok(vec![
                Job::new("core", "https://ci/job/core/", "red"),
                Job::new("docs", "https://ci/job/docs/", "yellow"),
            ])
        }
    }

    fn job_server(fake: FakeJobServer) -> (JobServerInstance, Arc<FakeJobServer>) {
        let fake = Arc::new(fake);
        let instance = JobServerInstance::new(
            "Public",
            "https://ci",
            Some("https://ci/view/team".into()),
            Arc::clone(&fake) as Arc<dyn JobServer>,
        )
        .unwrap();
        (instance, fake)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn healthy_job_server_fills_every_field() {
        let (instance, fake) = job_server(FakeJobServer::default());

        let record = aggregate_job_server(&instance, FanOut::unbounded()).await;

        assert_eq!(record.aggregation.status, Status::Ok);
        assert_eq!(record.build_queue_size, 4);
        assert_eq!(record.busy_executor_count, 6);
        assert_eq!(record.jobs.len(), 2);
        assert_eq!(record.broken_view_url, "https://ci/view/team");
        assert_eq!(
            fake.paths.lock().unwrap().as_slice(),
            [(
                "/view/team/view/Broken".to_owned(),
                BROKEN_JOBS_TREE.to_owned()
            )]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn all_queries_failing_zeroes_fields() {
        let (instance, _) = job_server(FakeJobServer {
            fail_queue: true,
            fail_executors: true,
            fail_jobs: true,
            ..FakeJobServer::default()
        });

        let record = aggregate_job_server(&instance, FanOut::unbounded()).await;

        assert_eq!(record.aggregation.status, Status::Unavailable);
        assert_eq!(record.build_queue_size, 0);
        assert_eq!(record.busy_executor_count, 0);
        assert!(record.jobs.is_empty());
        assert_eq!(record.aggregation.name, "Public");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn single_failure_keeps_other_fields() {
        let cases = [
            (true, false, false),
            (false, true, false),
            (false, false, true),
        ];
        for (queue, executors, jobs) in cases {
            let (instance, _) = job_server(FakeJobServer {
                fail_queue: queue,
                fail_executors: executors,
                fail_jobs: jobs,
                ..FakeJobServer::default()
            });

            let record = aggregate_job_server(&instance, FanOut::unbounded()).await;

            assert_eq!(record.aggregation.status, Status::Unavailable);
            assert_eq!(record.build_queue_size, if queue { 0 } else { 4 });
            assert_eq!(record.busy_executor_count, if executors { 0 } else { 6 });
            assert_eq!(record.jobs.len(), if jobs { 0 } else { 2 });
        }
    }

    struct FakeHostedBuild;

    #[async_trait]
    impl HostedBuild for FakeHostedBuild {
        async fn build_state(&self, repo: &Repository) -> Result<BuildState, Error> {
            match repo.name.as_str() {
                "green" => Ok(BuildState::Passed),
                "red" => Ok(BuildState::NotPassed),
                _ => Err(remote_error()),
            }
        }

        fn repository_url(&self, repo: &Repository) -> String {
            format!("https://hosted/{}", repo.slug())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn hosted_build_keeps_only_broken_jobs_in_order() {
        let repos = ["red", "green", "broken-lookup", "green"]
            .into_iter()
            .map(|name| Repository::new("org", name, None))
            .collect();
        let instance =
            HostedBuildInstance::new("org", "https://hosted/org", repos, Arc::new(FakeHostedBuild));

        let record = aggregate_hosted_build(&instance, FanOut::unbounded()).await;

        assert_eq!(record.aggregation.status, Status::Ok);
        assert_eq!(record.aggregation.kind, InstanceKind::HostedBuild);
        assert_eq!(
            record.jobs,
            vec![
                Job::new("red", "https://hosted/org/red", "red"),
                Job::new("broken-lookup", "https://hosted/org/broken-lookup", "grey"),
            ]
        );
    }
}
