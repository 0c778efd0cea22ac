#![cfg(feature = "sqlite")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use sql_mapper::prelude::*;

async fn pool_at(dir: &tempfile::TempDir, size: usize, wait_time_secs: u64) -> Session {
    let path = dir.path().join("contention.db");
    let session = Session::connect(&PoolConfig::sqlite(
        path.to_str().unwrap(),
        size,
        wait_time_secs,
    ))
    .await
    .unwrap();
    session
        .execute_batch(
            "create table t (a text, n integer);
             insert into t values ('k', 1), ('k', 2), ('j', 3);",
        )
        .await
        .unwrap();
    session
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn exhausted_pool_reports_system_busy() {
    let dir = tempfile::tempdir().unwrap();
    let session = pool_at(&dir, 2, 1).await;
    let pool = Arc::clone(session.pool());

    let _first = pool.acquire().await.unwrap();
    let _second = pool.acquire().await.unwrap();

    let started = Instant::now();
    let err = session
        .select_list::<i64>("select n from t", None)
        .await
        .unwrap_err();
    assert!(err.is_system_busy(), "unexpected error: {err}");
    assert!(started.elapsed() >= Duration::from_millis(900));
    assert_eq!(pool.busy_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_a_small_pool() {
    let dir = tempfile::tempdir().unwrap();
    let session = pool_at(&dir, 3, 10).await;
    let peak = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for i in 0..16_i64 {
        let session = session.clone();
        let peak = Arc::clone(&peak);
        tasks.push(tokio::spawn(async move {
            let total: i64 = session
                .select_one("select sum(n) + #{i} from t", Some(i.into()))
                .await?;
            peak.fetch_max(session.pool().busy_count(), Ordering::SeqCst);
            Ok::<_, SqlMapperError>((i, total))
        }));
    }

    for task in tasks {
        let (i, total) = task.await.unwrap().unwrap();
        assert_eq!(total, 6 + i);
    }
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(session.pool().busy_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_caller_waits_for_the_only_connection() {
    let dir = tempfile::tempdir().unwrap();
    let session = pool_at(&dir, 1, 5).await;

    let held = session.pool().acquire().await.unwrap();
    let waiter = {
        let session = session.clone();
        tokio::spawn(async move {
            session
                .select_list::<i64>(
                    "select n from t where a=#{a} order by n",
                    Some(BindValue::map([("a", "k")])),
                )
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!waiter.is_finished(), "caller ran without a free connection");

    held.release();
    let mine: Vec<i64> = session
        .select_list("select n from t where a=#{a}", Some(BindValue::map([("a", "j")])))
        .await
        .unwrap();
    assert_eq!(mine, [3_i64]);
    assert_eq!(waiter.await.unwrap().unwrap(), [1_i64, 2]);
}

#[tokio::test]
async fn failing_statements_leave_connections_free() {
    let dir = tempfile::tempdir().unwrap();
    let session = pool_at(&dir, 1, 0).await;

    for _ in 0..3 {
        let err = session
            .update("update nowhere set n = #{n}", Some(1_i64.into()))
            .await
            .unwrap_err();
        assert!(matches!(err, SqlMapperError::ExecutionError(_)));
    }
    // With a zero wait budget any leaked connection would make this fail with SystemBusy.
    let n: i64 = session
        .select_one("select count(*) from t", None)
        .await
        .unwrap();
    assert_eq!(n, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn abandoned_statement_keeps_its_connection_until_done() {
    let dir = tempfile::tempdir().unwrap();
    let session = pool_at(&dir, 1, 0).await;
    let slow = "with recursive c(x) as (select 1 union all select x + 1 from c where x < 20000000) \
                select count(*) from c";

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        session.select_one::<i64>(slow, None),
    )
    .await;
    assert!(abandoned.is_err(), "statement finished before the timeout");

    // The driver is still stepping the query, so the slot must not be handed out.
    assert_eq!(session.pool().busy_count(), 1);
    let started = Instant::now();
    let err = session
        .select_one::<i64>("select 1", None)
        .await
        .unwrap_err();
    assert!(err.is_system_busy(), "unexpected error: {err}");
    assert!(started.elapsed() < Duration::from_secs(1));

    let deadline = Instant::now() + Duration::from_secs(120);
    while session.pool().busy_count() != 0 {
        assert!(Instant::now() < deadline, "abandoned statement never released");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let one: i64 = session.select_one("select 1", None).await.unwrap();
    assert_eq!(one, 1);
}
