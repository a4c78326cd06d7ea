mod common;

use std::error::Error;
use std::sync::Arc;

use wf_backend::store::Store;
use wf_backend::{BackendError, Role};
use wf_core::{ChainEntry, Task, Workflow};

#[tokio::test]
async fn test_task_crud() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();

    let task = Task::new("ping").with_body("ping -c1 $host").with_timeout(30).with_retry(2);
    let created = backend.tasks().create(&task).await?;
    assert_eq!(created, task);

    let loaded = backend.tasks().get(task.uuid).await?;
    assert_eq!(loaded, task);

    let mut renamed = loaded.clone();
    renamed.name = "ping-v2".to_string();
    renamed.timeout = None;
    backend.tasks().update(&renamed).await?;

    let loaded = backend.tasks().get(task.uuid).await?;
    assert_eq!(loaded.name, "ping-v2");
    assert_eq!(loaded.timeout, None);

    // The old name is free again, the new one is taken.
    backend.tasks().create(&Task::new("ping")).await?;
    let dup = backend.tasks().create(&Task::new("ping-v2")).await;
    assert!(matches!(dup, Err(BackendError::DuplicateName { kind: "task", .. })));

    backend.tasks().delete(task.uuid).await?;
    let missing = backend.tasks().get(task.uuid).await;
    assert!(matches!(missing, Err(BackendError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_duplicate_task_name_is_rejected() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();

    backend.tasks().create(&Task::new("a")).await?;
    backend.tasks().create(&Task::new("b")).await?;

    let dup = Task::new("a");
    let err = backend.tasks().create(&dup).await.unwrap_err();
    assert!(matches!(err, BackendError::DuplicateName { ref name, .. } if name == "a"));

    // Nothing was written for the rejected task.
    assert!(matches!(
        backend.tasks().get(dup.uuid).await,
        Err(BackendError::NotFound(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_update_and_delete_of_missing_task() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();

    let ghost = Task::new("ghost");
    assert!(matches!(
        backend.tasks().update(&ghost).await,
        Err(BackendError::NotFound(_))
    ));
    assert!(matches!(
        backend.tasks().delete(ghost.uuid).await,
        Err(BackendError::NotFound(_))
    ));

    // A failed update must not claim the name.
    backend.tasks().create(&Task::new("ghost")).await?;
    Ok(())
}

#[tokio::test]
async fn test_rename_to_taken_name_keeps_record() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();

    let a = common::create_task(&backend, "a").await?;
    common::create_task(&backend, "b").await?;

    let mut clash = a.clone();
    clash.name = "b".to_string();
    let err = backend.tasks().update(&clash).await.unwrap_err();
    assert!(matches!(err, BackendError::DuplicateName { .. }));

    assert_eq!(backend.tasks().get(a.uuid).await?.name, "a");
    Ok(())
}

#[tokio::test]
async fn test_delete_task_strips_it_from_workflows() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();

    let t1 = common::create_task(&backend, "t1").await?;
    let t2 = common::create_task(&backend, "t2").await?;
    let t3 = common::create_task(&backend, "t3").await?;

    let w1 = backend
        .workflows()
        .create(
            &Workflow::new("w1")
                .with_chain([&t1, &t2, &t3])
                .with_onerror([&t2]),
        )
        .await?;
    let w2 = backend
        .workflows()
        .create(&Workflow::new("w2").with_chain([&t1, &t3]))
        .await?;

    backend.tasks().delete(t2.uuid).await?;

    let w1 = backend.workflows().get(w1.uuid).await?;
    assert_eq!(w1.chain_ids(), vec![t1.uuid, t3.uuid]);
    assert!(w1.onerror.is_empty());

    let w2_after = backend.workflows().get(w2.uuid).await?;
    assert_eq!(w2_after, w2);

    // Name freed and both reverse indices dropped.
    backend.tasks().create(&Task::new("t2")).await?;
    let keys = backend.keys();
    for role in Role::ALL {
        assert!(!backend.store().exists(&keys.reverse_index(role, t2.uuid)).await?);
    }
    Ok(())
}

#[tokio::test]
async fn test_delete_task_with_many_referencing_workflows() -> Result<(), Box<dyn Error>> {
    let backend = common::setup_backend();

    let shared = common::create_task(&backend, "shared").await?;
    let other = common::create_task(&backend, "other").await?;

    let mut ids = Vec::new();
    for i in 0..25 {
        let wf = Workflow::new(format!("wf-{i}")).with_chain([
            ChainEntry::from(other.uuid),
            ChainEntry::from(shared.uuid),
        ]);
        ids.push(backend.workflows().create(&wf).await?.uuid);
    }

    backend.tasks().delete(shared.uuid).await?;

    for id in ids {
        assert_eq!(backend.workflows().get(id).await?.chain_ids(), vec![other.uuid]);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_of_one_name() -> Result<(), Box<dyn Error>> {
    let backend = Arc::new(common::setup_backend());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let backend = Arc::clone(&backend);
            tokio::spawn(async move { backend.tasks().create(&Task::new("contended")).await })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await? {
            Ok(task) => winners.push(task.uuid),
            Err(BackendError::DuplicateName { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(backend.tasks().get(winners[0]).await?.name, "contended");
    Ok(())
}

