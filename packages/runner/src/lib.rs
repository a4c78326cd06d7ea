//! Runner process for the workflow job queue.
//!
//! A runner is a Ractor actor that periodically reports itself alive, claims
//! queued jobs through the backend's locking protocol, passes them to a
//! [`JobExecutor`] and records the outcome. Any number of runners, in any
//! number of processes, can share one store.
//!
//! # Usage
//!
//! ```ignore
//! use wf_runner::{Execution, RunnerConfig, job_executor, start_runner};
//!
//! let backend = Arc::new(wf_backend::connect(BackendConfig::memory()).await?);
//! let executor = Arc::new(job_executor!(|job| Execution::succeeded(vec![])));
//! let (runner, handle) = start_runner(RunnerConfig::new("runner-1"), backend, executor).await?;
//! ```

mod config;
mod executor;
mod messages;
mod runner_actor;

pub use config::{ConfigError, RunnerConfig};
pub use executor::{Execution, ExecutorFuture, FnExecutor, JobExecutor};
pub use messages::{PollReport, RunnerInfo, RunnerMessage};
pub use runner_actor::{
    RunnerActor, RunnerActorState, RunnerArgs, RunnerError, start_from_file, start_runner,
};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort};

/// Install a formatting subscriber at the given max level.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(level: tracing::Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .is_ok()
}
