mod common;

use std::error::Error;
use std::sync::Arc;

use serde_json::json;
use wf_backend::BackendError;
use wf_backend::store::Store;
use wf_core::{Job, JobOutcome, JobStatus, Workflow};

#[tokio::test]
async fn test_claim_and_finish_lifecycle() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();

    let ping = common::create_task(&backend, "ping").await?;
    let wf = backend
        .workflows()
        .create(&Workflow::new("healthcheck").with_chain([&ping]))
        .await?;

    let job = common::create_job(&backend, &wf).await?;
    common::assert_in_list(&backend, job.uuid, JobStatus::Queued).await?;

    backend.jobs().run_job(job.uuid, "runner-A").await?;
    common::assert_in_list(&backend, job.uuid, JobStatus::Running).await?;
    let running = backend.jobs().get(job.uuid).await?;
    assert_eq!(running.runner.as_deref(), Some("runner-A"));
    assert_eq!(backend.runners().jobs("runner-A").await?, vec![job.uuid]);

    let err = backend.jobs().run_job(job.uuid, "runner-B").await.unwrap_err();
    assert!(matches!(err, BackendError::InvalidTransition(ref msg) if msg == "only queued jobs can be run"));
    common::assert_in_list(&backend, job.uuid, JobStatus::Running).await?;
    assert!(backend.runners().jobs("runner-B").await?.is_empty());

    let mut done = running.clone();
    done.outcome = Some(JobOutcome::Succeeded);
    done.chain_results = vec![json!({"result": "pong"})];
    let finished = backend.jobs().finish_job(&done).await?;
    assert_eq!(finished.status, JobStatus::Finished);
    assert_eq!(finished.runner, None);

    common::assert_in_list(&backend, job.uuid, JobStatus::Finished).await?;
    let stored = backend.jobs().get(job.uuid).await?;
    assert_eq!(stored.runner, None);
    assert_eq!(stored.outcome, Some(JobOutcome::Succeeded));
    assert_eq!(stored.chain_results, vec![json!({"result": "pong"})]);
    assert!(backend.runners().jobs("runner-A").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_create_forces_queued_state() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();
    let wf = backend.workflows().create(&Workflow::new("healthcheck")).await?;

    let mut job = Job::new(&wf);
    job.status = JobStatus::Finished;
    job.runner = Some("sneaky".to_string());
    let created = backend.jobs().create(&job).await?;

    assert_eq!(created.status, JobStatus::Queued);
    assert_eq!(created.runner, None);
    common::assert_in_list(&backend, job.uuid, JobStatus::Queued).await?;
    assert_eq!(backend.jobs().get(job.uuid).await?.runner, None);
    Ok(())
}

#[tokio::test]
async fn test_transitions_from_wrong_state_leave_lists_alone() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();
    let wf = backend.workflows().create(&Workflow::new("healthcheck")).await?;
    let job = common::create_job(&backend, &wf).await?;

    let err = backend.jobs().finish_job(&job).await.unwrap_err();
    assert!(matches!(err, BackendError::InvalidTransition(ref msg) if msg == "only running jobs can be finished"));
    let err = backend.jobs().queue_job(&job).await.unwrap_err();
    assert!(matches!(err, BackendError::InvalidTransition(ref msg) if msg == "only running jobs can be queued again"));
    common::assert_in_list(&backend, job.uuid, JobStatus::Queued).await?;

    backend.jobs().run_job(job.uuid, "runner-A").await?;
    let running = backend.jobs().get(job.uuid).await?;
    backend.jobs().finish_job(&running).await?;

    let err = backend.jobs().run_job(job.uuid, "runner-A").await.unwrap_err();
    assert!(matches!(err, BackendError::InvalidTransition(_)));
    let err = backend.jobs().queue_job(&running).await.unwrap_err();
    assert!(matches!(err, BackendError::InvalidTransition(_)));
    let err = backend.jobs().finish_job(&running).await.unwrap_err();
    assert!(matches!(err, BackendError::InvalidTransition(_)));
    common::assert_in_list(&backend, job.uuid, JobStatus::Finished).await?;
    Ok(())
}

#[tokio::test]
async fn test_requeue_goes_to_the_tail() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();
    let wf = backend.workflows().create(&Workflow::new("healthcheck")).await?;

    let first = common::create_job(&backend, &wf).await?;
    let second = common::create_job(&backend, &wf).await?;

    backend.jobs().run_job(first.uuid, "runner-A").await?;
    let running = backend.jobs().get(first.uuid).await?;
    let requeued = backend.jobs().queue_job(&running).await?;
    assert_eq!(requeued.status, JobStatus::Queued);

    common::assert_in_list(&backend, first.uuid, JobStatus::Queued).await?;
    assert_eq!(backend.jobs().next_jobs(0, -1).await?, vec![second.uuid, first.uuid]);
    assert_eq!(backend.jobs().get(first.uuid).await?.runner, None);
    assert!(backend.runners().jobs("runner-A").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_release_without_runner_uses_stored_runner() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();
    let wf = backend.workflows().create(&Workflow::new("healthcheck")).await?;
    let job = common::create_job(&backend, &wf).await?;

    backend.jobs().run_job(job.uuid, "runner-A").await?;

    // The caller only has the job as it was created, without a runner.
    let mut result = job.clone();
    result.outcome = Some(JobOutcome::Failed);
    backend.jobs().finish_job(&result).await?;

    assert!(backend.runners().jobs("runner-A").await?.is_empty());
    common::assert_in_list(&backend, job.uuid, JobStatus::Finished).await?;
    Ok(())
}

#[tokio::test]
async fn test_peek_does_not_claim() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();
    let wf = backend.workflows().create(&Workflow::new("healthcheck")).await?;

    assert!(backend.jobs().next_job(0).await?.is_none());
    assert!(backend.jobs().next_jobs(0, 10).await?.is_empty());

    let a = common::create_job(&backend, &wf).await?;
    let b = common::create_job(&backend, &wf).await?;
    let c = common::create_job(&backend, &wf).await?;

    assert_eq!(backend.jobs().next_job(0).await?.map(|j| j.uuid), Some(a.uuid));
    assert_eq!(backend.jobs().next_job(2).await?.map(|j| j.uuid), Some(c.uuid));
    assert!(backend.jobs().next_job(3).await?.is_none());

    assert_eq!(backend.jobs().next_jobs(0, 1).await?, vec![a.uuid, b.uuid]);
    assert_eq!(backend.jobs().next_jobs(-1, -1).await?, vec![c.uuid]);
    assert_eq!(backend.jobs().next_jobs(0, -1).await?.len(), 3);
    assert_eq!(backend.jobs().queue_len(JobStatus::Queued).await?, 3);
    assert_eq!(backend.jobs().queue_len(JobStatus::Running).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_target_duplicates() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();
    let ping = common::create_task(&backend, "ping").await?;
    let wf = backend
        .workflows()
        .create(&Workflow::new("healthcheck").with_chain([&ping]))
        .await?;
    let other_wf = backend.workflows().create(&Workflow::new("other")).await?;

    let existing = Job::new(&wf).with_target("host-1").with_params(json!("a"));
    backend.jobs().create(&existing).await?;

    let same = Job::new(&wf).with_target("host-1").with_params(json!("a"));
    let err = backend.jobs().validate_target(&same).await.unwrap_err();
    assert!(matches!(err, BackendError::DuplicateTarget { ref target } if target == "host-1"));

    let different_params = Job::new(&wf).with_target("host-1").with_params(json!("b"));
    backend.jobs().validate_target(&different_params).await?;

    let different_workflow = Job::new(&other_wf).with_target("host-1").with_params(json!("a"));
    backend.jobs().validate_target(&different_workflow).await?;

    let other_target = Job::new(&wf).with_target("host-2").with_params(json!("a"));
    backend.jobs().validate_target(&other_target).await?;

    let untargeted = Job::new(&wf).with_params(json!("a"));
    backend.jobs().validate_target(&untargeted).await?;

    // The stored job does not count as its own duplicate.
    backend.jobs().validate_target(&existing).await?;
    Ok(())
}

#[tokio::test]
async fn test_target_scan_skips_vanished_jobs() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();
    let wf = backend.workflows().create(&Workflow::new("healthcheck")).await?;

    let job = Job::new(&wf).with_target("host-1").with_params(json!("a"));
    backend.jobs().create(&job).await?;
    backend
        .store()
        .sadd(&backend.keys().target("host-1"), &wf_core::JobId::new().to_string())
        .await?;

    let candidate = Job::new(&wf).with_target("host-1").with_params(json!("b"));
    backend.jobs().validate_target(&candidate).await?;
    Ok(())
}

#[tokio::test]
async fn test_get_missing_job() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();

    let err = backend.jobs().get(wf_core::JobId::new()).await.unwrap_err();
    assert!(matches!(err, BackendError::NotFound(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_have_one_winner() -> Result<(), Box<dyn Error>> {
    let backend = Arc::new(common::setup_backend());
    let wf = backend.workflows().create(&Workflow::new("healthcheck")).await?;

    for _round in 0..10 {
        let job = common::create_job(&backend, &wf).await?;
        let job_id = job.uuid;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let backend = Arc::clone(&backend);
                tokio::spawn(async move {
                    let runner = format!("runner-{i}");
                    backend
                        .jobs()
                        .run_job(job_id, &runner)
                        .await
                        .map(|()| runner)
                })
            })
            .collect();

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await? {
                Ok(runner) => winners.push(runner),
                Err(BackendError::InvalidTransition(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        assert_eq!(winners.len(), 1);
        common::assert_in_list(&backend, job.uuid, JobStatus::Running).await?;
        let stored = backend.jobs().get(job.uuid).await?;
        assert_eq!(stored.runner.as_ref(), Some(&winners[0]));
    }

    assert_eq!(backend.jobs().queue_len(JobStatus::Running).await?, 10);
    assert_eq!(backend.jobs().queue_len(JobStatus::Queued).await?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_finish_and_requeue_have_one_winner() -> Result<(), Box<dyn Error>> {
    let backend = Arc::new(common::setup_backend());
    let wf = backend.workflows().create(&Workflow::new("healthcheck")).await?;
    let job = common::create_job(&backend, &wf).await?;

    backend.jobs().run_job(job.uuid, "runner-A").await?;
    let running = backend.jobs().get(job.uuid).await?;

    let finisher = {
        let backend = Arc::clone(&backend);
        let job = running.clone();
        tokio::spawn(async move { backend.jobs().finish_job(&job).await })
    };
    let requeuer = {
        let backend = Arc::clone(&backend);
        let job = running.clone();
        tokio::spawn(async move { backend.jobs().queue_job(&job).await })
    };

    let finished = finisher.await?;
    let requeued = requeuer.await?;
    assert!(finished.is_ok() ^ requeued.is_ok());

    let expected = if finished.is_ok() {
        JobStatus::Finished
    } else {
        JobStatus::Queued
    };
    common::assert_in_list(&backend, job.uuid, expected).await?;
    Ok(())
}
