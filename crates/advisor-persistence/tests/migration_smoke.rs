
use advisor_persistence::migrations::{run_pending_migrations, MIGRATIONS};
use test_support::pool_or_skip;

#[tokio::test]
async fn migrations_are_idempotent() {
    let Some(pool) = pool_or_skip().await else { return };
    // build_pool ya aplicó todo; una segunda pasada no aplica nada.
    assert_eq!(run_pending_migrations(&pool).await.unwrap(), 0);
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM schema_migrations").fetch_one(&pool).await.unwrap();
    assert!(count >= MIGRATIONS.len() as i64);
}
