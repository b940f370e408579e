//! Statements executed through the `Db` facade against a scripted driver.

mod common;

use std::time::Duration;

use common::MockDriver;
use serde::Deserialize;
use sqlstmt::{
    CacheTtl, Db, DbConfig, DbError, DriverError, Executable, MemoryStore, ResultSet, SqlStyle,
    Statement, TransactionConfig, Value, WhereClause, sql,
};

fn users() -> ResultSet {
    ResultSet::new(
        vec!["id".into(), "name".into()],
        vec![
            vec![Value::Int(1), Value::from("ann")],
            vec![Value::Int(2), Value::from("bo")],
        ],
    )
}

fn fast_retries() -> DbConfig {
    DbConfig::new().transaction(
        TransactionConfig::new()
            .attempts(3)
            .delay(Duration::from_millis(1)),
    )
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: i64,
    name: String,
}

#[tokio::test]
async fn fetch_family_reads_the_result() {
    let db = Db::new(MockDriver::returning(users()));
    let mut q = db.select("users");
    q.filter([("active", true)]).unwrap();

    let all = q.fetch_all(&db, CacheTtl::Bypass).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].get("name"), Some(&Value::from("bo")));

    let first = q.fetch(&db, CacheTtl::Bypass).await.unwrap().unwrap();
    assert_eq!(first.get("id"), Some(&Value::Int(1)));

    let column = q.fetch_column(&db, 1, CacheTtl::Bypass).await.unwrap();
    assert_eq!(column, Some(Value::from("ann")));

    let typed: Option<User> = q.fetch_as(&db, CacheTtl::Bypass).await.unwrap();
    assert_eq!(
        typed,
        Some(User {
            id: 1,
            name: "ann".into()
        })
    );
    let typed: Vec<User> = q.fetch_all_as(&db, CacheTtl::Bypass).await.unwrap();
    assert_eq!(typed.len(), 2);

    let executed = db.driver().executed.lock().unwrap();
    assert_eq!(executed.len(), 5);
    assert_eq!(executed[0].0, "SELECT * FROM users\r\nWHERE `active`=:p0;");
    assert_eq!(executed[0].1.get("p0"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn cached_fetch_hits_the_driver_once() {
    let db = Db::new(MockDriver::returning(users())).with_cache(MemoryStore::default());

    let mut q = db.select("users");
    q.filter([("id", 1)]).unwrap();
    let first = q.fetch_all(&db, 60).await.unwrap();

    let mut same = db.select("users");
    same.filter([("id", 1)]).unwrap();
    let second = same.fetch_all(&db, 60).await.unwrap();
    let flavour = same.fetch_column(&db, 0, 60).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(flavour, Some(Value::Int(1)));
    assert_eq!(db.driver().execute_count(), 1);

    let mut other = db.select("users");
    other.filter([("id", 2)]).unwrap();
    other.fetch_all(&db, 60).await.unwrap();
    assert_eq!(db.driver().execute_count(), 2);
}

#[tokio::test]
async fn bypass_ttl_skips_a_configured_cache() {
    let db = Db::new(MockDriver::returning(users())).with_cache(MemoryStore::default());
    let q = db.select("users");
    q.fetch_all(&db, CacheTtl::Bypass).await.unwrap();
    q.fetch_all(&db, CacheTtl::Bypass).await.unwrap();
    assert_eq!(db.driver().execute_count(), 2);
    assert!(db.cache().unwrap().is_empty());
}

#[tokio::test]
async fn builders_carry_the_configured_style() {
    let db = Db::with_config(
        MockDriver::new(),
        DbConfig::new().style(SqlStyle::postgres().default_page_size(50)),
    );
    let mut q = db.select("users");
    q.fields([("id", "user_id")]).unwrap().page(Some(2)).unwrap();
    assert_eq!(
        q.to_sql(),
        "SELECT \"id\" AS \"user_id\" FROM users\r\nLIMIT 50 OFFSET 100 ;"
    );
}

#[tokio::test]
async fn prefix_applies_to_the_next_statement_only() {
    let db = Db::new(MockDriver::new());
    db.prefix(Some("EXPLAIN "));
    db.execute(&db.select("users")).await.unwrap();
    db.execute(&db.select("users")).await.unwrap();

    assert_eq!(
        db.driver().executed_sql(),
        vec!["EXPLAIN SELECT * FROM users;", "SELECT * FROM users;"]
    );
}

#[tokio::test]
async fn prefixed_fetch_is_not_cached() {
    let db = Db::new(MockDriver::returning(users())).with_cache(MemoryStore::default());
    let q = db.select("users");

    db.prefix(Some("EXPLAIN "));
    q.fetch_all(&db, 60).await.unwrap();
    assert!(db.cache().unwrap().is_empty());

    q.fetch_all(&db, 60).await.unwrap();
    assert_eq!(
        db.driver().executed_sql(),
        vec!["EXPLAIN SELECT * FROM users;", "SELECT * FROM users;"]
    );
}

#[tokio::test]
async fn prefixed_fetch_skips_a_cached_plain_result() {
    let db = Db::new(MockDriver::returning(users())).with_cache(MemoryStore::default());
    let q = db.select("users");
    q.fetch_all(&db, 60).await.unwrap();

    db.prefix(Some("EXPLAIN "));
    q.fetch_all(&db, 60).await.unwrap();
    q.fetch_all(&db, 60).await.unwrap();

    assert_eq!(
        db.driver().executed_sql(),
        vec!["SELECT * FROM users;", "EXPLAIN SELECT * FROM users;"]
    );
}

#[tokio::test]
async fn prefix_survives_transaction_retries() {
    let db = Db::with_config(MockDriver::new(), fast_retries());
    db.driver().push_err(
        DriverError::execute("could not serialize access").with_code("40001"),
    );

    let mut up = db.update("counters");
    up.set([("hits", sql("hits + 1"))])
        .unwrap()
        .use_transaction(true)
        .unwrap();
    db.prefix(Some("EXPLAIN "));
    up.exec(&db).await.unwrap();
    db.execute(&up).await.unwrap();

    let executed = db.driver().executed_sql();
    assert_eq!(executed.len(), 3);
    assert!(executed[0].starts_with("EXPLAIN UPDATE"));
    assert_eq!(executed[0], executed[1]);
    assert!(executed[2].starts_with("UPDATE"));
}

#[tokio::test]
async fn exec_freezes_the_statement() {
    let db = Db::new(MockDriver::new());
    let mut del = db.delete("sessions");
    del.filter("expires_at < NOW()").unwrap();
    del.exec(&db).await.unwrap();

    assert!(del.is_frozen());
    let err = del.filter([("id", 1)]).unwrap_err();
    assert!(err.is_frozen());
    assert_eq!(
        db.driver().executed_sql(),
        vec!["DELETE FROM `sessions` \r\nWHERE expires_at < NOW();"]
    );
}

#[tokio::test]
async fn use_transaction_wraps_exec_in_the_runner() {
    let db = Db::with_config(MockDriver::new(), fast_retries());
    db.driver().push_err(
        DriverError::execute("could not serialize access").with_code("40001"),
    );

    let mut up = db.update("counters");
    up.set([("hits", sql("hits + 1"))])
        .unwrap()
        .filter([("id", 3)])
        .unwrap()
        .use_transaction(true)
        .unwrap();
    up.exec(&db).await.unwrap();

    assert_eq!(
        db.driver().control_log(),
        vec!["begin", "rollback", "begin", "commit"]
    );
    let sql = db.driver().executed_sql();
    assert_eq!(sql.len(), 2);
    assert_eq!(sql[0], sql[1]);
    assert_eq!(sql[0], "UPDATE `counters` \r\nSET `hits`=hits + 1 \r\nWHERE `id`=:p0;");
}

#[tokio::test]
async fn plain_exec_does_not_open_a_transaction() {
    let db = Db::new(MockDriver::new());
    let mut ins = db.insert("users");
    ins.values([("name", "ann")]).unwrap();
    ins.exec(&db).await.unwrap();
    assert!(db.driver().control_log().is_empty());
}

#[tokio::test]
async fn transaction_returns_the_work_result() {
    let driver = MockDriver {
        insert_id: Some("42".into()),
        ..MockDriver::new()
    };
    let db = Db::with_config(driver, fast_retries());

    let id = db
        .transaction(|| async {
            let mut ins = db.insert("orders");
            ins.values([("total", 10)])?;
            db.execute(&ins).await?;
            db.last_insert_id().await
        })
        .await
        .unwrap();

    assert_eq!(id.as_deref(), Some("42"));
    assert_eq!(db.driver().control_log(), vec!["begin", "commit"]);
}

#[tokio::test]
async fn fatal_driver_errors_propagate_unchanged() {
    let db = Db::with_config(MockDriver::new(), fast_retries());
    db.driver()
        .push_err(DriverError::execute("duplicate key").with_code("23505"));

    let err = db
        .transaction(|| async { db.execute(&db.delete("t")).await })
        .await
        .unwrap_err();
    assert_eq!(err.driver_code(), Some("23505"));
    assert_eq!(db.driver().control_log(), vec!["begin", "rollback"]);
}

#[tokio::test]
async fn raw_fragments_execute_with_their_parameters() {
    let db = Db::new(MockDriver::new());
    let raw = db
        .sql("SELECT * FROM t WHERE a = :a", [("a", 5)])
        .unwrap();
    db.execute_raw(&raw).await.unwrap();

    let executed = db.driver().executed.lock().unwrap();
    assert_eq!(executed[0].0, "SELECT * FROM t WHERE a = :a");
    assert_eq!(executed[0].1.get("a"), Some(&Value::Int(5)));
}

#[tokio::test]
async fn reserved_raw_parameter_names_are_rejected() {
    let db = Db::new(MockDriver::new());
    let err = db.sql("SELECT :p0", [("p0", 1)]).unwrap_err();
    assert!(matches!(err, DbError::Usage(_)));
}
