//! Behaviour every `Database` backend must share. Each backend's test module
//! calls these against its own instance.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::calculator::{Operation, compile};
use crate::error::DatabaseError;
use crate::store::traits::Database;
use crate::tasks::model::TaskStatus;

pub fn lease() -> Duration {
    Duration::seconds(60)
}

async fn enqueue(db: &dyn Database, owner: i64, expr: &str) -> String {
    let op = compile(expr).unwrap();
    db.enqueue(owner, expr, &op).await.unwrap()
}

pub async fn claim_is_exclusive<D: Database + 'static>(db: Arc<D>) {
    const TASKS: usize = 50;
    const CLAIMERS: usize = 8;

    let owner = db.create_user("worker-test", "hash").await.unwrap();
    let mut expected = HashSet::new();
    for i in 0..TASKS {
        expected.insert(enqueue(db.as_ref(), owner, &format!("{i}+1")).await);
    }

    let mut handles = Vec::new();
    for _ in 0..CLAIMERS {
        let db = Arc::clone(&db);
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(task) = db.claim_oldest_pending(lease()).await.unwrap() {
                claimed.push(task.id);
            }
            claimed
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        for id in handle.await.unwrap() {
            assert!(seen.insert(id.clone()), "task {id} claimed twice");
        }
    }
    assert_eq!(seen, expected);
}

pub async fn claim_follows_creation_order(db: &dyn Database) {
    let owner = db.create_user("alice", "hash").await.unwrap();
    let first = enqueue(db, owner, "1+1").await;
    let second = enqueue(db, owner, "2+2").await;
    let third = enqueue(db, owner, "3+3").await;

    for expected in [first, second, third] {
        let task = db.claim_oldest_pending(lease()).await.unwrap().unwrap();
        assert_eq!(task.id, expected);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.started_at.is_some());
        assert!(task.lease_expires_at.is_some());
    }
}

pub async fn claim_on_empty_store(db: &dyn Database) {
    assert!(db.claim_oldest_pending(lease()).await.unwrap().is_none());

    let owner = db.create_user("alice", "hash").await.unwrap();
    enqueue(db, owner, "1+1").await;
    assert!(db.claim_oldest_pending(lease()).await.unwrap().is_some());
    assert!(db.claim_oldest_pending(lease()).await.unwrap().is_none());
}

pub async fn complete_then_get_is_stable(db: &dyn Database) {
    let owner = db.create_user("alice", "hash").await.unwrap();
    let id = enqueue(db, owner, "5+2.5").await;
    let claimed = db.claim_oldest_pending(lease()).await.unwrap().unwrap();
    assert_eq!(claimed.id, id);
    assert_eq!(claimed.arg1, "5");
    assert_eq!(claimed.operation, "+");
    assert_eq!(claimed.arg2, "2.5");

    db.complete_task(&id, 7.5).await.unwrap();

    for _ in 0..3 {
        let task = db.get_task(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result, Some(7.5));
        assert!(task.completed_at.is_some());
        assert!(task.lease_expires_at.is_none());
    }

    // Completing again overwrites.
    db.complete_task(&id, 8.0).await.unwrap();
    assert_eq!(db.get_task(&id).await.unwrap().result, Some(8.0));
}

pub async fn complete_unknown_task(db: &dyn Database) {
    let err = db.complete_task("task_1", 1.0).await.unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound { .. }));

    let err = db.get_task("task_1").await.unwrap_err();
    assert!(matches!(err, DatabaseError::NotFound { .. }));
}

pub async fn expired_lease_is_requeued(db: &dyn Database) {
    let owner = db.create_user("alice", "hash").await.unwrap();
    let id = enqueue(db, owner, "6*7").await;

    // A zero lease is already expired on the next claim.
    let abandoned = db.claim_oldest_pending(Duration::zero()).await.unwrap().unwrap();
    assert_eq!(abandoned.id, id);

    let reclaimed = db.claim_oldest_pending(lease()).await.unwrap().unwrap();
    assert_eq!(reclaimed.id, id);
    assert_eq!(reclaimed.status, TaskStatus::InProgress);

    // Still within its lease.
    assert_eq!(db.requeue_expired(Utc::now()).await.unwrap(), 0);
    assert!(db.claim_oldest_pending(lease()).await.unwrap().is_none());

    // Past the deadline the sweep puts it back.
    assert_eq!(db.requeue_expired(Utc::now() + lease() * 2).await.unwrap(), 1);
    let task = db.get_task(&id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.started_at.is_none());
    assert!(task.lease_expires_at.is_none());
}

pub async fn lease_out_of_range(db: &dyn Database) {
    let owner = db.create_user("alice", "hash").await.unwrap();
    let id = enqueue(db, owner, "6*7").await;

    let err = db.claim_oldest_pending(Duration::MAX).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Query(_)));
    assert_eq!(db.get_task(&id).await.unwrap().status, TaskStatus::Pending);

    let claimed = db.claim_oldest_pending(lease()).await.unwrap().unwrap();
    assert_eq!(claimed.id, id);
}

pub async fn tasks_listed_newest_first(db: &dyn Database) {
    let alice = db.create_user("alice", "hash").await.unwrap();
    let bob = db.create_user("bob", "hash").await.unwrap();
    let a1 = enqueue(db, alice, "1+1").await;
    let b1 = enqueue(db, bob, "2+2").await;
    let a2 = enqueue(db, alice, "3+3").await;

    let ids: Vec<String> = db
        .list_tasks_for_owner(alice)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![a2, a1]);

    let bobs = db.list_tasks_for_owner(bob).await.unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].id, b1);

    assert!(db.list_tasks_for_owner(alice + bob + 100).await.unwrap().is_empty());
}

pub async fn whole_expression_task_roundtrip(db: &dyn Database) {
    let owner = db.create_user("alice", "hash").await.unwrap();
    let id = enqueue(db, owner, "3 + 4 * 2").await;

    let task = db.claim_oldest_pending(lease()).await.unwrap().unwrap();
    assert_eq!(task.id, id);
    assert_eq!(task.expression, "3 + 4 * 2");
    assert_eq!(task.operation, "");
    assert_eq!(task.work().unwrap(), Operation::Expression("3 + 4 * 2".into()));
    assert_eq!(task.work().unwrap().compute().unwrap(), 11.0);
}

pub async fn duplicate_login_conflicts(db: &dyn Database) {
    let id = db.create_user("alice", "hash-1").await.unwrap();
    let err = db.create_user("alice", "hash-2").await.unwrap_err();
    assert!(matches!(err, DatabaseError::Conflict(_)));

    let user = db.find_user_by_login("alice").await.unwrap().unwrap();
    assert_eq!(user.id, id);
    assert_eq!(user.password_hash, "hash-1");
    assert!(db.find_user_by_login("bob").await.unwrap().is_none());
}
