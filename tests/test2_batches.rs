#![cfg(feature = "sqlite")]

use databank::{Database, DbError, DriverError, Params, PoolSettings, Value, params};

fn one_connection() -> PoolSettings {
    PoolSettings::default().with_pool_size(1).with_max_overflow(0)
}

async fn empty_db() -> Result<Database, DbError> {
    let db = Database::new_sqlite(":memory:", one_connection()).await?;
    db.execute(
        "CREATE TABLE beatles (id INTEGER PRIMARY KEY, member TEXT NOT NULL)",
        Params::new(),
    )
    .await?;
    Ok(db)
}

#[tokio::test]
async fn execute_many_applies_every_set_in_one_transaction() -> Result<(), DbError> {
    let db = empty_db().await?;

    db.execute_many(
        "INSERT INTO beatles (member) VALUES (:member)",
        vec![
            params! { "member" => "Klaus" },
            params! { "member" => "Yoko" },
        ],
    )
    .await?;

    let rows = db.fetch_all("SELECT * FROM beatles", Params::new()).await?;
    assert_eq!(rows.len(), 2);
    Ok(())
}

#[tokio::test]
async fn execute_many_is_all_or_nothing() -> Result<(), DbError> {
    let db = empty_db().await?;

    // The second set violates the primary key; the first must roll back too.
    let result = db
        .execute_many(
            "INSERT INTO beatles (id, member) VALUES (:id, :member)",
            vec![
                params! { "id" => 1, "member" => "Klaus" },
                params! { "id" => 1, "member" => "Yoko" },
            ],
        )
        .await;
    assert!(matches!(result, Err(DbError::QueryError { .. })));

    let rows = db.fetch_all("SELECT * FROM beatles", Params::new()).await?;
    assert!(rows.is_empty());
    Ok(())
}

#[tokio::test]
async fn execute_fetch_all_returns_only_the_last_result_set() -> Result<(), DbError> {
    let db = empty_db().await?;

    let rows = db
        .execute_fetch_all(
            "INSERT INTO beatles (member) VALUES (:member) RETURNING id, member",
            vec![
                params! { "member" => "John" },
                params! { "member" => "Paul" },
                params! { "member" => "George" },
            ],
        )
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("member").and_then(Value::as_text),
        Some("George")
    );
    assert_eq!(rows[0].get("id"), Some(&Value::Int(3)));

    // All three applications were committed, not just the last.
    let all = db
        .fetch_all("SELECT * FROM beatles ORDER BY id", Params::new())
        .await?;
    assert_eq!(all.len(), 3);
    Ok(())
}

#[tokio::test]
async fn execute_fetch_one_with_no_sets_is_a_committed_no_op() -> Result<(), DbError> {
    let db = empty_db().await?;

    let row = db
        .execute_fetch_one(
            "INSERT INTO beatles (member) VALUES (:member) RETURNING id",
            Vec::new(),
        )
        .await?;
    assert!(row.is_empty());
    Ok(())
}

#[tokio::test]
async fn execute_fetch_many_trims_the_last_result_set() -> Result<(), DbError> {
    let db = empty_db().await?;
    db.execute_many(
        "INSERT INTO beatles (member) VALUES (:member)",
        vec![
            params! { "member" => "John" },
            params! { "member" => "Paul" },
        ],
    )
    .await?;

    let rows = db
        .execute_fetch_many(
            "UPDATE beatles SET member = upper(member) WHERE id > :min RETURNING member",
            vec![params! { "min" => 0 }],
            1,
        )
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("member").and_then(Value::as_text), Some("JOHN"));
    Ok(())
}

#[tokio::test]
async fn query_errors_carry_statement_and_param_names_only() -> Result<(), DbError> {
    let db = empty_db().await?;

    let err = db
        .execute(
            "INSERT INTO nowhere (x) VALUES (:x)",
            params! { "x" => "secret" },
        )
        .await
        .unwrap_err();
    match err {
        DbError::QueryError {
            statement,
            param_names,
            ..
        } => {
            assert_eq!(statement, "INSERT INTO nowhere (x) VALUES (:x)");
            assert_eq!(param_names, vec!["x".to_string()]);
        }
        other => panic!("expected a query error, got {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn statement_redaction_hides_the_sql_text() -> Result<(), DbError> {
    let db = empty_db().await?.with_statement_redaction(true);

    let err = db
        .execute("INSERT INTO nowhere (x) VALUES (:x)", params! { "x" => 1 })
        .await
        .unwrap_err();
    match err {
        DbError::QueryError {
            statement,
            param_names,
            ..
        } => {
            assert_eq!(statement, "<redacted>");
            assert_eq!(param_names, vec!["x".to_string()]);
        }
        other => panic!("expected a query error, got {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn placeholder_mismatches_are_bind_errors() -> Result<(), DbError> {
    let db = empty_db().await?;

    let err = db
        .execute("INSERT INTO beatles (member) VALUES (:member)", Params::new())
        .await
        .unwrap_err();
    match err {
        DbError::QueryError { source, .. } => {
            assert!(matches!(source, DriverError::Bind(_)));
        }
        other => panic!("expected a query error, got {other}"),
    }

    let err = db
        .execute(
            "INSERT INTO beatles (member) VALUES (:member)",
            params! { "member" => "John", "stray" => 1 },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::QueryError { .. }));

    // Nothing committed along the way.
    let rows = db.fetch_all("SELECT * FROM beatles", Params::new()).await?;
    assert!(rows.is_empty());
    Ok(())
}
