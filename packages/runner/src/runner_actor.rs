//! Runner actor: claims queued jobs and hands them to the executor.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use wf_backend::store::AnyStore;
use wf_backend::{Backend, BackendError};
use wf_core::{Job, JobStatus, RunnerId};

use crate::config::{ConfigError, RunnerConfig};
use crate::executor::{Execution, JobExecutor};
use crate::messages::{PollReport, RunnerInfo, RunnerMessage};

/// Lost claims tolerated per free slot before a poll gives up.
const CONTENTION_PER_SLOT: usize = 4;

type PollReply = RpcReplyPort<Result<PollReport, String>>;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Failed to spawn runner: {0}")]
    Spawn(#[from] ractor::SpawnErr),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// State for the runner actor.
pub struct RunnerActorState {
    /// Runner id used for claims and liveness.
    pub id: RunnerId,
    /// Maximum jobs executing at once.
    pub slots: usize,
    pub backend: Arc<Backend<AnyStore>>,
    pub executor: Arc<dyn JobExecutor>,
    /// Whether ticks should still poll.
    pub running: bool,
    busy: usize,
    polls: u64,
    finished: u64,
    requeued: u64,
}

impl RunnerActorState {
    pub fn new(
        id: impl Into<RunnerId>,
        slots: usize,
        backend: Arc<Backend<AnyStore>>,
        executor: Arc<dyn JobExecutor>,
    ) -> Self {
        Self {
            id: id.into(),
            slots: slots.max(1),
            backend,
            executor,
            running: true,
            busy: 0,
            polls: 0,
            finished: 0,
            requeued: 0,
        }
    }

    pub fn info(&self) -> RunnerInfo {
        RunnerInfo {
            id: self.id.clone(),
            slots: self.slots,
            busy: self.busy,
            polls: self.polls,
            finished: self.finished,
            requeued: self.requeued,
        }
    }

    /// Claim up to `limit` jobs from the head of the queue.
    ///
    /// A claim lost to another runner just means the head moved on; the
    /// queue is peeked again until the slots are full, the queue is empty, or
    /// too many claims were lost. Ids without a job record are skipped.
    ///
    /// Jobs claimed before an error are returned alongside it: they already
    /// sit in this runner's running set and must still be executed.
    async fn claim(&self, limit: usize, report: &mut PollReport) -> (Vec<Job>, Option<BackendError>) {
        let jobs = self.backend.jobs();
        let mut claimed = Vec::new();
        let mut skipped: i64 = 0;

        while claimed.len() < limit {
            let head = match jobs.next_jobs(skipped, skipped).await {
                Ok(ids) => ids.into_iter().next(),
                Err(e) => return (claimed, Some(e)),
            };
            let Some(id) = head else {
                break;
            };

            let mut job = match jobs.get(id).await {
                Ok(job) => job,
                Err(BackendError::NotFound(_)) => {
                    tracing::warn!("Runner {} skipping queued job {id} with no record", self.id);
                    skipped += 1;
                    continue;
                }
                Err(e) => return (claimed, Some(e)),
            };

            match jobs.run_job(id, &self.id).await {
                Ok(()) => {
                    job.status = JobStatus::Running;
                    job.runner = Some(self.id.clone());
                    report.claimed.push(id);
                    claimed.push(job);
                }
                Err(BackendError::InvalidTransition(_)) => {
                    report.contended += 1;
                    tracing::debug!("Runner {} lost job {id} to another runner", self.id);
                    if report.contended >= self.slots * CONTENTION_PER_SLOT {
                        tracing::warn!("Runner {} giving up after {} lost claims", self.id, report.contended);
                        break;
                    }
                }
                Err(e) => return (claimed, Some(e)),
            }
        }

        (claimed, None)
    }

    /// Report liveness and claim jobs for the free slots.
    ///
    /// Claimed jobs count as busy until their `Completed` message arrives.
    async fn begin_poll(&mut self, report: &mut PollReport) -> (Vec<Job>, Option<BackendError>) {
        self.polls += 1;
        if let Err(e) = self.backend.runners().active(&self.id).await {
            return (Vec::new(), Some(e));
        }

        let free = self.slots.saturating_sub(self.busy);
        let (claimed, error) = self.claim(free, report).await;
        self.busy += claimed.len();
        (claimed, error)
    }

    /// Run the claimed jobs off the actor's message loop, so heartbeats and
    /// other messages keep flowing while they execute.
    fn dispatch(
        &self,
        myself: ActorRef<RunnerMessage>,
        claimed: Vec<Job>,
        mut report: PollReport,
        error: Option<BackendError>,
        reply: Option<PollReply>,
    ) {
        if claimed.is_empty() {
            respond(&self.id, reply, report, error);
            return;
        }

        tracing::debug!("Runner {} executing {} job(s)", self.id, claimed.len());

        let id = self.id.clone();
        let backend = self.backend.clone();
        let executor = self.executor.clone();

        tokio::spawn(async move {
            let results = join_all(
                claimed
                    .into_iter()
                    .map(|job| execute(&backend, executor.as_ref(), &id, job)),
            )
            .await;

            let mut first_error = error;
            for result in results {
                match result {
                    Ok((job, true)) => report.finished.push(job.uuid),
                    Ok((job, false)) => report.requeued.push(job.uuid),
                    Err(e) => {
                        tracing::error!("Runner {id} failed to record a job result: {e}");
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }

            // Counters first, so anything sent after the reply sees them.
            let _ = myself.send_message(RunnerMessage::Completed {
                released: report.claimed.len(),
                finished: report.finished.len(),
                requeued: report.requeued.len(),
            });
            respond(&id, reply, report, first_error);
        });
    }

    fn complete(&mut self, released: usize, finished: usize, requeued: usize) {
        self.busy = self.busy.saturating_sub(released);
        self.finished += finished as u64;
        self.requeued += requeued as u64;
    }
}

/// Run one claimed job and write the result back.
async fn execute(
    backend: &Backend<AnyStore>,
    executor: &dyn JobExecutor,
    runner: &str,
    mut job: Job,
) -> Result<(Job, bool), BackendError> {
    let jobs = backend.jobs();

    match executor.execute(&job).await {
        Execution::Finished {
            outcome,
            chain_results,
            onerror_results,
        } => {
            job.outcome = Some(outcome);
            job.chain_results = chain_results;
            job.onerror_results = onerror_results;
            Ok((jobs.finish_job(&job).await?, true))
        }
        Execution::Requeue { reason } => {
            tracing::info!("Runner {runner} requeueing job {}: {reason}", job.uuid);
            Ok((jobs.queue_job(&job).await?, false))
        }
    }
}

fn respond(runner: &str, reply: Option<PollReply>, report: PollReport, error: Option<BackendError>) {
    let result = match error {
        Some(e) => Err(e.to_string()),
        None => Ok(report),
    };
    match reply {
        Some(reply) => {
            let _ = reply.send(result);
        }
        None => {
            if let Err(e) = result {
                tracing::warn!("Runner {runner} poll failed: {e}");
            }
        }
    }
}

/// Runner actor arguments.
pub struct RunnerArgs {
    pub config: RunnerConfig,
    pub backend: Arc<Backend<AnyStore>>,
    pub executor: Arc<dyn JobExecutor>,
}

/// Runner actor that pulls jobs from the shared queue.
pub struct RunnerActor;

fn spawn_ticker(
    myself: ActorRef<RunnerMessage>,
    every: Duration,
    message: fn() -> RunnerMessage,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            if myself.send_message(message()).is_err() {
                break;
            }
        }
    });
}

impl Actor for RunnerActor {
    type Msg = RunnerMessage;
    type State = RunnerActorState;
    type Arguments = RunnerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let RunnerArgs {
            config,
            backend,
            executor,
        } = args;

        tracing::info!("Starting runner: {} ({} slots)", config.identifier, config.slots);

        backend.runners().register(&config.identifier).await?;

        if let Some(every) = config.poll_interval() {
            spawn_ticker(myself.clone(), every, || RunnerMessage::Tick);
        }
        if let Some(every) = config.heartbeat_interval() {
            spawn_ticker(myself.clone(), every, || RunnerMessage::Heartbeat);
        }

        Ok(RunnerActorState::new(config.identifier, config.slots, backend, executor))
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            RunnerMessage::Poll { reply } => {
                let mut report = PollReport::default();
                let (claimed, error) = state.begin_poll(&mut report).await;
                state.dispatch(myself, claimed, report, error, Some(reply));
            }

            RunnerMessage::Tick => {
                if !state.running {
                    return Ok(());
                }
                let mut report = PollReport::default();
                let (claimed, error) = state.begin_poll(&mut report).await;
                state.dispatch(myself, claimed, report, error, None);
            }

            RunnerMessage::Heartbeat => {
                if let Err(e) = state.backend.runners().active(&state.id).await {
                    tracing::warn!("Runner {} heartbeat failed: {e}", state.id);
                }
            }

            RunnerMessage::GetInfo { reply } => {
                let _ = reply.send(state.info());
            }

            RunnerMessage::Completed {
                released,
                finished,
                requeued,
            } => {
                state.complete(released, finished, requeued);
            }

            RunnerMessage::Shutdown => {
                // Executions already started still write their results back.
                tracing::info!("Shutting down runner: {} ({} busy)", state.id, state.busy);
                state.running = false;
                myself.stop(None);
            }
        }

        Ok(())
    }
}

/// Spawn a runner actor against an existing backend.
pub async fn start_runner(
    config: RunnerConfig,
    backend: Arc<Backend<AnyStore>>,
    executor: Arc<dyn JobExecutor>,
) -> Result<(ActorRef<RunnerMessage>, tokio::task::JoinHandle<()>), RunnerError> {
    config.validate()?;

    let (actor, handle) = Actor::spawn(
        Some(config.identifier.clone()),
        RunnerActor,
        RunnerArgs {
            config,
            backend,
            executor,
        },
    )
    .await?;

    Ok((actor, handle))
}

/// Load a config file, install logging, connect to the store and spawn a
/// runner.
pub async fn start_from_file(
    path: impl AsRef<std::path::Path>,
    executor: Arc<dyn JobExecutor>,
) -> Result<(ActorRef<RunnerMessage>, tokio::task::JoinHandle<()>), RunnerError> {
    let config = RunnerConfig::from_file(path).await?;
    crate::init_tracing(config.level()?);

    let backend = wf_backend::connect(config.backend.clone()).await?;
    let (actor, handle) = start_runner(config, Arc::new(backend), executor).await?;

    tracing::info!("Workflow runner up");
    Ok((actor, handle))
}
