#![cfg(feature = "postgres")]

use std::env;

use databank::{Database, DbError, Params, PoolSettings, Value, params};

fn postgres_config() -> deadpool_postgres::Config {
    let mut cfg = deadpool_postgres::Config::new();
    cfg.dbname = Some(env::var("DATABANK_PG_DBNAME").unwrap_or_else(|_| "testing".to_string()));
    cfg.host = Some(env::var("DATABANK_PG_HOST").unwrap_or_else(|_| "localhost".to_string()));
    cfg.port = Some(5432);
    cfg.user = Some(env::var("DATABANK_PG_USER").unwrap_or_else(|_| "postgres".to_string()));
    // Trust auth in CI; allow override when a password is required.
    cfg.password = Some(env::var("DATABANK_PG_PASSWORD").unwrap_or_default());
    cfg
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL server; set DATABANK_PG_HOST/USER/DBNAME/PASSWORD"]
async fn postgres_sessions_roundtrip() -> Result<(), DbError> {
    let db = Database::new_postgres(postgres_config(), PoolSettings::default()).await?;

    db.execute("DROP TABLE IF EXISTS databank_beatles", Params::new())
        .await?;
    db.execute(
        "CREATE TABLE databank_beatles (id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY, member TEXT NOT NULL)",
        Params::new(),
    )
    .await?;

    db.execute_many(
        "INSERT INTO databank_beatles (member) VALUES (:member)",
        vec![
            params! { "member" => "John" },
            params! { "member" => "Paul" },
            params! { "member" => "George" },
            params! { "member" => "Ringo" },
        ],
    )
    .await?;

    let row = db
        .fetch_one("SELECT * FROM databank_beatles ORDER BY id", Params::new())
        .await?;
    assert_eq!(row.get("id"), Some(&Value::Int(1)));
    assert_eq!(row.get("member").and_then(Value::as_text), Some("John"));

    let rows = db
        .fetch_all("SELECT * FROM databank_beatles ORDER BY id", Params::new())
        .await?;
    assert_eq!(rows.len(), 4);

    let returned = db
        .execute_fetch_all(
            "INSERT INTO databank_beatles (member) VALUES (:member) RETURNING member",
            vec![
                params! { "member" => "Klaus" },
                params! { "member" => "Yoko" },
            ],
        )
        .await?;
    assert_eq!(returned.len(), 1);
    assert_eq!(
        returned[0].get("member").and_then(Value::as_text),
        Some("Yoko")
    );

    db.execute("DROP TABLE databank_beatles", Params::new()).await?;
    Ok(())
}

#[tokio::test]
#[ignore = "requires a running PostgreSQL server; set DATABANK_PG_HOST/USER/DBNAME/PASSWORD"]
async fn postgres_rolls_back_failed_batches() -> Result<(), DbError> {
    let db = Database::new_postgres(postgres_config(), PoolSettings::default()).await?;

    db.execute("DROP TABLE IF EXISTS databank_rollback", Params::new())
        .await?;
    db.execute(
        "CREATE TABLE databank_rollback (id BIGINT PRIMARY KEY, member TEXT NOT NULL)",
        Params::new(),
    )
    .await?;

    let result = db
        .execute_many(
            "INSERT INTO databank_rollback (id, member) VALUES (:id, :member)",
            vec![
                params! { "id" => 1, "member" => "Klaus" },
                params! { "id" => 1, "member" => "Yoko" },
            ],
        )
        .await;
    assert!(matches!(result, Err(DbError::QueryError { .. })));

    let rows = db
        .fetch_all("SELECT * FROM databank_rollback", Params::new())
        .await?;
    assert!(rows.is_empty());

    db.execute("DROP TABLE databank_rollback", Params::new()).await?;
    Ok(())
}

#[test]
fn missing_config_fields_are_config_errors() {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let result = rt.block_on(Database::new_postgres(
        deadpool_postgres::Config::new(),
        PoolSettings::default(),
    ));
    assert!(matches!(result, Err(DbError::ConfigError(_))));
}
