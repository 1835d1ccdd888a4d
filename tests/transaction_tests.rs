/// Unit of work transaction semantics
///
/// Run with: cargo test --test transaction_tests
mod common;

use common::{FaultyStore, member};
use memberstore::prelude::store::{ClientSession, DocumentStore, MemoryStore};
use memberstore::{MemberRepo, StoreError, UnitOfWork};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_nested_execute_runs_one_transaction() {
    let store = MemoryStore::new();
    let mut uow = UnitOfWork::new(store.clone());

    let value = uow
        .execute(|uow| {
            Box::pin(async move {
                let inner = uow
                    .execute(|uow| Box::pin(async move { uow.execute(|_| Box::pin(async { Ok(40) })).await }))
                    .await?;
                Ok(inner + 2)
            })
        })
        .await;

    assert_eq!(assert_ok!(value), 42);
    let stats = store.stats();
    assert_eq!(stats.sessions_started, 1);
    assert_eq!(stats.transactions_started, 1);
    assert_eq!(stats.transactions_committed, 1);
    assert_eq!(stats.transactions_aborted, 0);
}

#[tokio::test]
async fn test_failing_callback_aborts_exactly_once() {
    let store = FaultyStore::new();
    let mut uow = UnitOfWork::new(store.clone());

    let result: memberstore::Result<()> = uow
        .execute(|_| Box::pin(async { Err(StoreError::Store("boom".into())) }))
        .await;

    let err = assert_err!(result);
    assert!(err.is_transaction_failure());
    assert!(matches!(err.root_cause(), StoreError::Store(msg) if msg == "boom"));
    assert_eq!(store.faults.starts(), 1);
    assert_eq!(store.faults.aborts(), 1);
    assert_eq!(store.faults.commits(), 0);
    assert!(!uow.in_transaction());
}

#[tokio::test]
async fn test_failed_transaction_discards_writes() {
    let store = MemoryStore::new();
    let repo = MemberRepo::default();
    let mut uow = UnitOfWork::new(store.clone());

    let inner = repo.clone();
    let result: memberstore::Result<()> = uow
        .execute(move |uow| {
            Box::pin(async move {
                inner.register(uow, &member(1)).await?;
                inner.register(uow, &member(2)).await?;
                Err(StoreError::Precondition("rejected after writes".into()))
            })
        })
        .await;

    assert!(result.is_err());
    assert_eq!(store.document_count(repo.collection_name()).unwrap(), 0);
}

#[tokio::test]
async fn test_recovered_inner_failure_still_rolls_back() {
    let store = FaultyStore::new();
    let repo = MemberRepo::default();
    let mut uow = UnitOfWork::new(store.clone());

    let inner = repo.clone();
    let outcome = uow
        .execute(move |uow| {
            Box::pin(async move {
                inner.register(uow, &member(1)).await?;
                let nested_repo = inner.clone();
                let nested: memberstore::Result<()> = uow
                    .execute(move |uow| {
                        Box::pin(async move {
                            nested_repo.register(uow, &member(2)).await?;
                            Err(StoreError::Precondition("inner".into()))
                        })
                    })
                    .await;
                // Nested failures come back unwrapped
                let err = nested.unwrap_err();
                assert!(!err.is_transaction_failure());
                Ok("recovered")
            })
        })
        .await;

    let err = assert_err!(outcome);
    assert!(err.is_transaction_failure());
    assert!(matches!(err.root_cause(), StoreError::RollbackOnly(_)));
    assert_eq!(store.faults.commits(), 0);
    assert_eq!(store.faults.aborts(), 1);
    assert_eq!(store.inner.document_count(repo.collection_name()).unwrap(), 0);
}

#[tokio::test]
async fn test_rollback_only_cleared_for_next_transaction() {
    let store = MemoryStore::new();
    let repo = MemberRepo::default();
    let mut uow = UnitOfWork::new(store.clone());

    let doomed: memberstore::Result<()> = uow
        .execute(|uow| {
            Box::pin(async move {
                let _ = uow
                    .execute(|_| Box::pin(async { Err::<(), _>(StoreError::Precondition("inner".into())) }))
                    .await;
                Ok(())
            })
        })
        .await;
    assert!(doomed.is_err());

    let next = repo.clone();
    assert_ok!(
        uow.execute(move |uow| Box::pin(async move { next.register(uow, &member(1)).await }))
            .await
    );

    let stats = store.stats();
    assert_eq!(stats.transactions_aborted, 1);
    assert_eq!(stats.transactions_committed, 1);
    assert_eq!(store.document_count(repo.collection_name()).unwrap(), 1);
}

#[tokio::test]
async fn test_inner_failure_propagated_is_wrapped_once() {
    let store = FaultyStore::new();
    let mut uow = UnitOfWork::new(store.clone());

    let result: memberstore::Result<()> = uow
        .execute(|uow| {
            Box::pin(async move {
                uow.execute(|_| Box::pin(async { Err(StoreError::Precondition("deep".into())) }))
                    .await
            })
        })
        .await;

    match assert_err!(result) {
        StoreError::TransactionFailed { source } => {
            assert!(matches!(*source, StoreError::Precondition(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.faults.aborts(), 1);
}

#[tokio::test]
async fn test_commit_failure_surfaces_as_transaction_failed() {
    let store = FaultyStore::new();
    store.fail_commits();
    let mut uow = UnitOfWork::new(store.clone());

    let result = uow.execute(|_| Box::pin(async { Ok(1) })).await;

    let err = assert_err!(result);
    assert!(err.is_transaction_failure());
    assert_eq!(store.faults.commits(), 1);
    assert_eq!(store.faults.aborts(), 1);
    assert_eq!(store.inner.stats().active_transactions, 0);
    assert!(!uow.in_transaction());
}

#[tokio::test]
async fn test_start_failure_surfaces_as_transaction_failed() {
    let store = FaultyStore::new();
    store.fail_starts();
    let mut uow = UnitOfWork::new(store.clone());

    let result = uow.execute(|_| Box::pin(async { Ok(()) })).await;

    assert!(assert_err!(result).is_transaction_failure());
    assert_eq!(store.faults.commits(), 0);
    assert_eq!(store.faults.aborts(), 0);
}

#[tokio::test]
async fn test_close_aborts_open_transaction() {
    let store = MemoryStore::new();
    let mut uow = UnitOfWork::new(store.clone());

    let cancelled = tokio::time::timeout(
        Duration::from_millis(20),
        uow.execute(|_| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
        }),
    )
    .await;
    assert!(cancelled.is_err());
    assert!(uow.in_transaction());

    uow.close().await;
    uow.close().await;

    let stats = store.stats();
    assert_eq!(stats.transactions_aborted, 1);
    assert_eq!(stats.active_transactions, 0);
    assert_eq!(stats.open_sessions(), 0);
    assert!(uow.current_session().is_none());
}

#[tokio::test]
async fn test_scope_always_releases_session() {
    let store = MemoryStore::new();

    let ok = UnitOfWork::scope(store.clone(), |uow| {
        Box::pin(async move { uow.execute(|_| Box::pin(async { Ok(5) })).await })
    })
    .await;
    assert_eq!(ok.unwrap(), 5);

    let failed: memberstore::Result<()> = UnitOfWork::scope(store.clone(), |uow| {
        Box::pin(async move {
            uow.execute(|_| Box::pin(async { Err(StoreError::Store("nope".into())) }))
                .await
        })
    })
    .await;
    assert!(failed.is_err());

    let stats = store.stats();
    assert_eq!(stats.sessions_started, 2);
    assert_eq!(stats.open_sessions(), 0);
    assert_eq!(stats.active_transactions, 0);
}

#[tokio::test]
async fn test_cancelled_work_releases_session_on_drop() {
    let store = MemoryStore::new();
    let mut uow = UnitOfWork::new(store.clone());

    let cancelled = tokio::time::timeout(
        Duration::from_millis(20),
        uow.execute(|_| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
        }),
    )
    .await;
    assert!(cancelled.is_err());
    assert!(uow.in_transaction());

    drop(uow);

    let stats = store.stats();
    assert_eq!(stats.open_sessions(), 0);
    assert_eq!(stats.active_transactions, 0);
    assert_eq!(stats.transactions_committed, 0);
}

#[tokio::test]
async fn test_execute_after_cancelled_work_owns_fresh_transaction() {
    let store = MemoryStore::new();
    let repo = MemberRepo::default();
    let mut uow = UnitOfWork::new(store.clone());

    let abandoned = repo.clone();
    let cancelled = tokio::time::timeout(
        Duration::from_millis(20),
        uow.execute(move |uow| {
            Box::pin(async move {
                abandoned.register(uow, &member(9)).await?;
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
        }),
    )
    .await;
    assert!(cancelled.is_err());
    assert!(uow.in_transaction());
    assert_eq!(uow.depth(), 0);

    let next = repo.clone();
    assert_ok!(
        uow.execute(move |uow| Box::pin(async move { next.register(uow, &member(1)).await }))
            .await
    );
    assert!(!uow.in_transaction());

    let stats = store.stats();
    assert_eq!(stats.transactions_aborted, 1);
    assert_eq!(stats.transactions_committed, 1);
    assert_eq!(stats.active_transactions, 0);

    let stored = store.documents(repo.collection_name()).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["email"], member(1).email);
}

#[tokio::test]
async fn test_execute_after_close_starts_new_session() {
    let store = MemoryStore::new();
    let mut uow = UnitOfWork::new(store.clone());

    uow.execute(|_| Box::pin(async { Ok(()) })).await.unwrap();
    uow.close().await;
    uow.execute(|_| Box::pin(async { Ok(()) })).await.unwrap();

    let session = uow.current_session().unwrap();
    assert!(!session.is_ended());
    assert_eq!(store.stats().sessions_started, 2);
}

#[tokio::test]
async fn test_standalone_store_call_outside_session() {
    let store = MemoryStore::new();
    let repo = MemberRepo::default();
    let mut uow = UnitOfWork::new(store.clone());

    repo.register(&mut uow, &member(1)).await.unwrap();

    assert!(uow.current_session().is_none());
    let stats = store.stats();
    assert_eq!(stats.sessions_started, 0);
    assert_eq!(stats.transactions_started, 0);
    assert_eq!(store.start_session().await.unwrap().id().0, 1);
}
