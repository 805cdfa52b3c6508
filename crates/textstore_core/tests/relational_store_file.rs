use rusqlite::Connection;
use std::path::Path;
use textstore_core::{
    ConnectionTarget, ErrorKind, Record, RelationalFileBackend, RelationalStoreConfig,
    StorageBackend,
};

async fn open(path: &Path, fresh: bool) -> RelationalFileBackend {
    let backend = RelationalFileBackend::connect(RelationalStoreConfig::at(path).fresh(fresh))
        .await
        .unwrap();
    backend
        .set_target(ConnectionTarget::new("", "textfiles"))
        .await
        .unwrap();
    backend
}

#[tokio::test]
async fn connect_creates_file_with_record_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("testdb.db");

    let backend = open(&path, false).await;
    assert_eq!(backend.path(), Some(path.as_path()));
    backend.close().await.unwrap();

    let conn = Connection::open(&path).unwrap();
    assert_table_exists(&conn, "textfiles");
}

#[tokio::test]
async fn reopening_keeps_rows_without_fresh_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("testdb.db");

    let first = open(&path, false).await;
    let id = first.create(&Record::new("kept", "body")).await.unwrap();
    first.close().await.unwrap();

    let second = open(&path, false).await;
    assert_eq!(second.get(id).await.unwrap().title, "kept");
    assert_eq!(
        second
            .list_collections("")
            .await
            .unwrap()
            .iter()
            .filter(|name| name.as_str() == "textfiles")
            .count(),
        1
    );
}

#[tokio::test]
async fn fresh_mode_discards_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("testdb.db");

    let first = open(&path, false).await;
    first.create(&Record::new("old", "body")).await.unwrap();
    first.close().await.unwrap();

    let second = open(&path, true).await;
    let err = second.get(1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        second.create(&Record::new("new", "body")).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn text_is_persisted_in_name_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("testdb.db");

    let backend = open(&path, true).await;
    backend.create(&Record::new("t1", "hello")).await.unwrap();
    backend.close().await.unwrap();

    let conn = Connection::open(&path).unwrap();
    let (title, name): (String, String) = conn
        .query_row("SELECT title, name FROM textfiles WHERE id = 1;", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(title, "t1");
    assert_eq!(name, "hello");
}

#[tokio::test]
async fn connect_to_unopenable_path_is_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("nested").join("testdb.db");

    let result = RelationalFileBackend::connect(RelationalStoreConfig::at(&path)).await;
    match result {
        Err(err) => assert_eq!(err.kind(), ErrorKind::Connection),
        Ok(_) => panic!("expected connection error"),
    }
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
