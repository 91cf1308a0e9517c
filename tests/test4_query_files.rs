#![cfg(feature = "sqlite")]

use databank::{Database, DbError, Params, PoolSettings, QueryCollection, params};

const QUERIES: &str = "/* @name select_all_members */\nSELECT * FROM beatles;\n\n/* @name select_member_by_id */\nSELECT * FROM beatles WHERE id = :id;\n";

#[tokio::test]
async fn queries_load_from_file_and_run() -> Result<(), DbError> {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("queries.sql");
    std::fs::write(&path, QUERIES).expect("write queries");

    let queries = QueryCollection::from_file(&path)?;
    assert_eq!(queries.len(), 2);

    let db = Database::new_sqlite(
        ":memory:",
        PoolSettings::default().with_pool_size(1).with_max_overflow(0),
    )
    .await?;
    db.execute(
        "CREATE TABLE beatles (id INTEGER PRIMARY KEY, member TEXT NOT NULL)",
        Params::new(),
    )
    .await?;
    db.execute_many(
        "INSERT INTO beatles (member) VALUES (:member)",
        vec![
            params! { "member" => "John" },
            params! { "member" => "Paul" },
            params! { "member" => "George" },
            params! { "member" => "Ringo" },
        ],
    )
    .await?;

    let rows = db.fetch_all(&queries["select_all_members"], Params::new()).await?;
    assert_eq!(rows.len(), 4);

    let row = db
        .fetch_one(&queries["select_member_by_id"], params! { "id" => 2 })
        .await?;
    assert_eq!(
        row.get("member").and_then(databank::Value::as_text),
        Some("Paul")
    );
    Ok(())
}

#[test]
fn malformed_headers_surface_as_invalid_query_header() {
    let err = QueryCollection::parse("/* @name broken name */\nSELECT 1;").unwrap_err();
    assert!(matches!(err, DbError::InvalidQueryHeader(_)));
}
