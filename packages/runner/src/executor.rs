//! Job executor trait: the seam to the workflow execution engine.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use wf_core::{Job, JobOutcome};

/// What the engine decided for a claimed job.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    /// The job reached a terminal outcome.
    Finished {
        outcome: JobOutcome,
        chain_results: Vec<Value>,
        onerror_results: Vec<Value>,
    },
    /// The job should go back to the queue, e.g. because the runner is
    /// shutting down before it could start.
    Requeue { reason: String },
}

impl Execution {
    /// A successful run with the given chain results.
    pub fn succeeded(chain_results: Vec<Value>) -> Self {
        Execution::Finished {
            outcome: JobOutcome::Succeeded,
            chain_results,
            onerror_results: Vec::new(),
        }
    }

    /// A failed run; `onerror_results` are the error chain's results.
    pub fn failed(chain_results: Vec<Value>, onerror_results: Vec<Value>) -> Self {
        Execution::Finished {
            outcome: JobOutcome::Failed,
            chain_results,
            onerror_results,
        }
    }

    /// Hand the job back to the queue.
    pub fn requeue(reason: impl Into<String>) -> Self {
        Execution::Requeue {
            reason: reason.into(),
        }
    }
}

/// Future type for async executors.
pub type ExecutorFuture = Pin<Box<dyn Future<Output = Execution> + Send>>;

/// Runs the chain of a claimed job.
///
/// The runner only moves jobs between queue states; interpreting the chain,
/// retries and timeouts all belong to the implementation.
pub trait JobExecutor: Send + Sync + 'static {
    fn execute(&self, job: &Job) -> ExecutorFuture;
}

/// A simple function-based executor.
pub struct FnExecutor<F>
where
    F: Fn(&Job) -> ExecutorFuture + Send + Sync + 'static,
{
    executor: F,
}

impl<F> FnExecutor<F>
where
    F: Fn(&Job) -> ExecutorFuture + Send + Sync + 'static,
{
    pub fn new(executor: F) -> Self {
        Self { executor }
    }
}

impl<F> JobExecutor for FnExecutor<F>
where
    F: Fn(&Job) -> ExecutorFuture + Send + Sync + 'static,
{
    fn execute(&self, job: &Job) -> ExecutorFuture {
        (self.executor)(job)
    }
}

/// Helper macro for creating executors from async closures.
#[macro_export]
macro_rules! job_executor {
    (|$job:ident| $body:expr) => {
        $crate::FnExecutor::new(|$job: &::wf_core::Job| -> $crate::ExecutorFuture {
            let $job = $job.clone();
            Box::pin(async move { $body })
        })
    };
}
