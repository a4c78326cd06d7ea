//! Message types for the runner actor.

use ractor::RpcReplyPort;
use wf_core::{JobId, RunnerId};

/// Messages for the RunnerActor.
#[derive(Debug)]
pub enum RunnerMessage {
    /// Claim as many queued jobs as there are free slots; replies once they
    /// have been executed and written back.
    Poll {
        reply: RpcReplyPort<Result<PollReport, String>>,
    },

    /// Periodic tick; polls without replying.
    Tick,

    /// Report liveness to the registry.
    Heartbeat,

    /// Get runner info.
    GetInfo { reply: RpcReplyPort<RunnerInfo> },

    /// Sent by a poll's execution task once its jobs are written back.
    Completed {
        released: usize,
        finished: usize,
        requeued: usize,
    },

    /// Stop ticking and shut the actor down.
    Shutdown,
}

/// What one poll did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Jobs this runner claimed.
    pub claimed: Vec<JobId>,
    /// Claimed jobs written back as finished.
    pub finished: Vec<JobId>,
    /// Claimed jobs handed back to the queue.
    pub requeued: Vec<JobId>,
    /// Claims lost to another runner.
    pub contended: usize,
}

/// Snapshot of a runner's counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerInfo {
    pub id: RunnerId,
    pub slots: usize,
    /// Claimed jobs still executing.
    pub busy: usize,
    pub polls: u64,
    pub finished: u64,
    pub requeued: u64,
}
