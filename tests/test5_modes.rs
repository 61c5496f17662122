use std::sync::Arc;

use intarkdb_middleware::prelude::*;
use intarkdb_middleware::test_utils::{Failure, MemoryEngine, NativeCall};

fn setup() -> (Arc<MemoryEngine>, Driver) {
    let engine = Arc::new(MemoryEngine::local());
    let driver = Driver::new(engine.clone());
    (engine, driver)
}

fn assert_programming(err: &IntarkDbError, message: &str) {
    assert_eq!(err.kind(), ErrorKind::Programming, "{err}");
    assert_eq!(err.message, message);
}

#[test]
fn kv_connection_rejects_sql_operations() -> Result<(), Box<dyn std::error::Error>> {
    let (_engine, driver) = setup();
    let conn = driver.connect_kv(&ConnectOptions::local("kv_only"))?;
    assert_eq!(conn.mode(), DataMode::Kv);

    assert_programming(&conn.execute("SELECT 1").unwrap_err(), "use set, get or del instead!");
    assert_programming(
        &conn.execute_with("SELECT ?", &[RowValues::Int(1)]).unwrap_err(),
        "use set, get or del instead!",
    );
    assert_programming(&conn.begin().unwrap_err(), "use multi instead!");
    assert_programming(&conn.commit().unwrap_err(), "use exec instead!");
    assert_programming(&conn.rollback().unwrap_err(), "use discard instead!");

    let cursor = conn.cursor()?;
    assert_programming(&cursor.execute("SELECT 1").unwrap_err(), "use get, set or del instead!");
    assert_programming(&cursor.fetch_all().unwrap_err(), "use get instead!");
    Ok(())
}

#[test]
fn sql_connection_rejects_kv_operations() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, driver) = setup();
    let conn = driver.connect(&ConnectOptions::local("sql_only"))?;
    engine.clear_calls();

    assert_programming(&conn.set("k", "v").unwrap_err(), "use execute instead!");
    assert_programming(&conn.get("k").unwrap_err(), "use execute instead!");
    assert_programming(&conn.delete("k").unwrap_err(), "use execute instead!");
    assert_programming(&conn.open_table("t", false).unwrap_err(), "use execute instead!");
    assert_programming(&conn.multi().unwrap_err(), "use begin instead!");
    assert_programming(&conn.exec().unwrap_err(), "use commit instead!");
    assert_programming(&conn.discard().unwrap_err(), "use rollback instead!");

    let cursor = conn.cursor()?;
    assert_programming(&cursor.set("k", "v").unwrap_err(), "use execute instead!");

    // Nothing but the cursor allocation reached the engine.
    assert!(engine.calls().iter().all(|call| matches!(call, NativeCall::InitResult)));
    Ok(())
}

#[test]
fn kv_set_get_delete() -> Result<(), Box<dyn std::error::Error>> {
    let (_engine, driver) = setup();
    let conn = driver.connect_kv(&ConnectOptions::local("kv_basic"))?;

    assert_eq!(conn.get("missing")?, None);
    conn.set("greeting", "hello")?;
    assert_eq!(conn.get("greeting")?.as_deref(), Some("hello"));
    conn.set("greeting", "bonjour")?;
    assert_eq!(conn.get("greeting")?.as_deref(), Some("bonjour"));
    conn.delete("greeting")?;
    assert_eq!(conn.get("greeting")?, None);

    // a cursor works the same way
    let cursor = conn.cursor()?;
    cursor.set("a", "1")?;
    assert_eq!(cursor.get("a")?.as_deref(), Some("1"));
    Ok(())
}

#[test]
fn kv_values_are_visible_to_other_connections() -> Result<(), Box<dyn std::error::Error>> {
    let (_engine, driver) = setup();
    let writer = driver.connect_kv(&ConnectOptions::local("kv_shared"))?;
    let reader = driver.connect_kv(&ConnectOptions::local("kv_shared"))?;
    writer.set("k", "v")?;
    assert_eq!(reader.get("k")?.as_deref(), Some("v"));
    Ok(())
}

#[test]
fn open_table_isolates_keys() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, driver) = setup();
    let conn = driver.connect_kv(&ConnectOptions::local("kv_tables"))?;
    conn.set("k", "default")?;

    conn.open_table("scratch", true)?;
    assert_eq!(conn.get("k")?, None);
    conn.set("k", "scratch")?;
    assert_eq!(conn.get("k")?.as_deref(), Some("scratch"));

    conn.open_table(intarkdb_middleware::test_utils::DEFAULT_KV_TABLE, false)?;
    assert_eq!(conn.get("k")?.as_deref(), Some("default"));

    assert_eq!(
        engine.count_calls(|call| matches!(call, NativeCall::OpenTable(_))),
        2
    );
    Ok(())
}

#[test]
fn multi_then_discard_drops_pending_writes() -> Result<(), Box<dyn std::error::Error>> {
    let (_engine, driver) = setup();
    let conn = driver.connect_kv(&ConnectOptions::local("kv_discard"))?;
    conn.set("kept", "1")?;

    conn.multi()?;
    conn.set("pending", "2")?;
    conn.delete("kept")?;
    conn.discard()?;

    assert_eq!(conn.get("pending")?, None);
    assert_eq!(conn.get("kept")?.as_deref(), Some("1"));
    Ok(())
}

#[test]
fn multi_then_exec_applies_pending_writes() -> Result<(), Box<dyn std::error::Error>> {
    let (_engine, driver) = setup();
    let conn = driver.connect_kv(&ConnectOptions::local("kv_exec"))?;
    let other = driver.connect_kv(&ConnectOptions::local("kv_exec"))?;

    conn.multi()?;
    conn.set("a", "1")?;
    conn.set("b", "2")?;
    // not visible outside the transaction yet
    assert_eq!(other.get("a")?, None);
    conn.exec()?;

    assert_eq!(other.get("a")?.as_deref(), Some("1"));
    assert_eq!(other.get("b")?.as_deref(), Some("2"));
    Ok(())
}

#[test]
fn exec_without_multi_is_a_database_error() -> Result<(), Box<dyn std::error::Error>> {
    let (_engine, driver) = setup();
    let conn = driver.connect_kv(&ConnectOptions::local("kv_exec_alone"))?;
    let err = conn.exec().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Database);
    assert_eq!(err.message, "intarkdb exec fail");

    let err = conn.discard().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Database);
    Ok(())
}

#[test]
fn failed_kv_write_is_a_programming_error() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, driver) = setup();
    let conn = driver.connect_kv(&ConnectOptions::local("kv_fail"))?;
    engine.fail_next(Failure::Kv);
    assert_programming(&conn.set("k", "v").unwrap_err(), "intarkdb set fail");
    engine.fail_next(Failure::Kv);
    assert_programming(&conn.get("k").unwrap_err(), "intarkdb get fail");
    engine.fail_next(Failure::Kv);
    assert_programming(&conn.delete("k").unwrap_err(), "intarkdb delete fail");
    Ok(())
}

#[test]
fn networked_kv_is_not_supported() -> Result<(), Box<dyn std::error::Error>> {
    let engine = Arc::new(MemoryEngine::networked());
    let driver = Driver::networked_only(engine.clone());
    let options = ConnectOptions::builder("db")
        .host("127.0.0.1")
        .port(9090)
        .user("sys")
        .password("secret")
        .finish()?;

    let err = driver.connect_kv(&options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotSupported);
    assert!(engine.calls().is_empty());
    Ok(())
}

#[test]
fn connect_kv_free_function_opens_a_kv_session() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, driver) = setup();
    let conn = connect_kv(&driver, "kv_free")?;
    assert_eq!(conn.mode(), DataMode::Kv);
    assert_eq!(engine.count_calls(|call| *call == NativeCall::Connect(DataMode::Kv)), 1);
    Ok(())
}
