use std::sync::Arc;

use intarkdb_middleware::adapter::{DIALECT_NAME, connect_url, is_disconnect};
use intarkdb_middleware::prelude::*;
use intarkdb_middleware::test_utils::{Failure, MemoryEngine};

fn driver() -> (Arc<MemoryEngine>, Driver) {
    let engine = Arc::new(MemoryEngine::local());
    (engine.clone(), Driver::new(engine))
}

/// Exercises a connection only through the driver contract.
fn load_and_count<C: DriverConnection>(conn: &C) -> Result<usize, IntarkDbError> {
    conn.execute("CREATE TABLE items (id INTEGER, name VARCHAR)", None)?;
    conn.begin()?;
    conn.executemany(
        "INSERT INTO items VALUES (?, ?)",
        &[
            vec![RowValues::Int(1), RowValues::Text("one".into())],
            vec![RowValues::Int(2), RowValues::Text("two".into())],
            vec![RowValues::Int(3), RowValues::Text("three".into())],
        ],
    )?;
    conn.commit()?;

    let cursor = conn.cursor()?;
    cursor.execute("SELECT * FROM items ORDER BY id", None)?;
    let mut seen = cursor.fetchmany(2)?.len();
    while cursor.fetchone()?.is_some() {
        seen += 1;
    }
    cursor.close();
    Ok(seen)
}

#[test]
fn generic_code_drives_a_connection() -> Result<(), Box<dyn std::error::Error>> {
    let (_engine, driver) = driver();
    let conn = driver.connect(&ConnectOptions::local("generic"))?;
    assert_eq!(load_and_count(&conn)?, 3);
    DriverConnection::close(&conn);
    assert!(conn.is_closed());
    Ok(())
}

#[test]
fn cursor_contract_reports_shape_and_position() -> Result<(), Box<dyn std::error::Error>> {
    let (_engine, driver) = driver();
    let conn = driver.connect(&ConnectOptions::local("shape"))?;
    let cursor = DriverConnection::execute(&conn, "SELECT 1, 'x'", None)?;
    let description = DriverCursor::description(&cursor).unwrap_or_default();
    assert_eq!(description.len(), 2);
    assert_eq!(DriverCursor::rowcount(&cursor), 1);
    assert_eq!(cursor.fetchall()?.len(), 1);
    assert_eq!(DriverCursor::rownumber(&cursor), 1);

    let params = [RowValues::Int(7)];
    DriverCursor::execute(&cursor, "SELECT ?", Some(&params[..]))?;
    let row = cursor.fetchone()?.expect("one row");
    assert_eq!(row.get_by_index(0), Some(&RowValues::Int(7)));
    Ok(())
}

#[test]
fn scalar_returns_the_first_cell() -> Result<(), Box<dyn std::error::Error>> {
    let (_engine, driver) = driver();
    let conn = driver.connect(&ConnectOptions::local("scalar"))?;
    assert_eq!(conn.scalar("SELECT 42", None)?, Some(RowValues::Int(42)));

    conn.execute("CREATE TABLE empty (id INTEGER)")?;
    assert_eq!(conn.scalar("SELECT * FROM empty", None)?, None);
    Ok(())
}

#[test]
fn catalog_lookups() -> Result<(), Box<dyn std::error::Error>> {
    let (_engine, driver) = driver();
    let conn = driver.connect(&ConnectOptions::local("catalog"))?;
    assert!(!conn.has_table("orders")?);

    conn.execute("CREATE TABLE orders (id INTEGER)")?;
    assert!(conn.has_table("orders")?);
    assert!(!conn.has_table("order")?);
    assert!(conn.get_schema_names()?.is_empty());
    Ok(())
}

#[test]
fn rollback_through_the_contract() -> Result<(), Box<dyn std::error::Error>> {
    let (_engine, driver) = driver();
    let conn = driver.connect(&ConnectOptions::local("contract_tx"))?;
    DriverConnection::execute(&conn, "CREATE TABLE t (id INTEGER)", None)?;
    DriverConnection::begin(&conn)?;
    DriverConnection::execute(&conn, "INSERT INTO t VALUES (?)", Some(&[RowValues::Int(1)][..]))?;
    DriverConnection::rollback(&conn)?;
    let cursor = DriverConnection::execute(&conn, "SELECT * FROM t", None)?;
    assert!(cursor.fetchall()?.is_empty());
    Ok(())
}

#[test]
fn urls_open_local_connections() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, driver) = driver();
    let conn = connect_url(&driver, "intarkdb:///adapter_db")?;
    assert_eq!(conn.identifier(), "adapter_db");
    assert_eq!(conn.backend(), Backend::Local);
    assert_eq!(engine.open_databases(), 1);

    let default = connect_url(&driver, "intarkdb:///")?;
    assert_eq!(default.identifier(), ".");

    let err = connect_url(&driver, "postgres://localhost/db").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    Ok(())
}

#[test]
fn disconnect_classification() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, driver) = driver();
    engine.fail_next(Failure::Open);
    let interface = driver.connect(&ConnectOptions::local("refused")).unwrap_err();
    assert_eq!(interface.kind(), ErrorKind::Interface);
    assert!(!is_disconnect(&interface));

    let conn = driver.connect(&ConnectOptions::local("classified"))?;
    let programming = conn.execute("SELECT * FROM nowhere").unwrap_err();
    assert!(is_disconnect(&programming));
    Ok(())
}

#[test]
fn module_level_constants() {
    assert_eq!(API_LEVEL, "2.0");
    assert_eq!(THREAD_SAFETY, 1);
    assert_eq!(PARAM_STYLE, "qmark");
    assert_eq!(DIALECT_NAME, "IntarkDB");
}
