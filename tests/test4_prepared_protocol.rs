use std::sync::Arc;
use std::thread;

use intarkdb_middleware::prelude::*;
use intarkdb_middleware::test_utils::{Failure, MemoryEngine, NativeCall};

fn setup() -> Result<(Arc<MemoryEngine>, Connection), IntarkDbError> {
    let engine = Arc::new(MemoryEngine::local());
    let driver = Driver::new(engine.clone());
    let conn = driver.connect(&ConnectOptions::local("protocol"))?;
    conn.execute("CREATE TABLE t (id INTEGER, name VARCHAR)")?;
    engine.clear_calls();
    Ok((engine, conn))
}

fn count(engine: &MemoryEngine, pred: fn(&NativeCall) -> bool) -> usize {
    engine.count_calls(pred)
}

fn prepares(call: &NativeCall) -> bool {
    matches!(call, NativeCall::Prepare(_))
}

fn destroys(call: &NativeCall) -> bool {
    matches!(call, NativeCall::DestroyPrepare)
}

fn binds(call: &NativeCall) -> bool {
    matches!(call, NativeCall::Bind { .. })
}

fn executes(call: &NativeCall) -> bool {
    matches!(call, NativeCall::ExecutePrepared)
}

#[test]
fn execute_many_uses_one_statement_for_all_rows() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, conn) = setup()?;
    let rows = vec![
        vec![RowValues::Int(1), RowValues::Text("a".into())],
        vec![RowValues::Int(2), RowValues::Text("b".into())],
        vec![RowValues::Int(3), RowValues::Text("c".into())],
    ];
    conn.execute_many("INSERT INTO t VALUES (?, ?)", &rows)?;

    assert_eq!(count(&engine, prepares), 1);
    assert_eq!(count(&engine, destroys), 1);
    assert_eq!(count(&engine, executes), 3);
    assert_eq!(count(&engine, binds), 6);
    assert_eq!(engine.live_statements(), 0);

    // destroy comes after the last execute
    let calls = engine.calls();
    let last_execute = calls.iter().rposition(executes).unwrap();
    let destroy = calls.iter().position(destroys).unwrap();
    assert!(destroy > last_execute);
    Ok(())
}

#[test]
fn bind_kinds_follow_value_ranges() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, conn) = setup()?;
    conn.execute("CREATE TABLE k (a BIGINT, b BIGINT, c BIGINT, d BIGINT, e BOOLEAN, f REAL)")?;
    engine.clear_calls();
    conn.execute_with(
        "INSERT INTO k VALUES (?, ?, ?, ?, ?, ?)",
        &[
            RowValues::Int(127),
            RowValues::Int(128),
            RowValues::Int(40_000),
            RowValues::Int(3_000_000_000),
            RowValues::Bool(true),
            RowValues::Float(0.5),
        ],
    )?;

    let bound: Vec<(u32, String)> = engine
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            NativeCall::Bind { index, value } => Some((index, value)),
            _ => None,
        })
        .collect();
    assert_eq!(
        bound,
        vec![
            (1, "Int8(127)".to_string()),
            (2, "Int16(128)".to_string()),
            (3, "Int32(40000)".to_string()),
            (4, "Int64(3000000000)".to_string()),
            (5, "Boolean(true)".to_string()),
            (6, "Double(0.5)".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn null_and_blob_parameters_bind_null() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, conn) = setup()?;
    conn.execute_with(
        "INSERT INTO t VALUES (?, ?)",
        &[RowValues::Null, RowValues::Blob(vec![1, 2, 3])],
    )?;
    assert_eq!(count(&engine, |call| matches!(call, NativeCall::Bind { value, .. } if value == "Null")), 2);
    Ok(())
}

#[test]
fn prepare_failure_reports_the_native_message() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, conn) = setup()?;
    let cursor = conn.cursor()?;
    engine.fail_next(Failure::Prepare);

    let err = cursor
        .execute_with("INSERT INTO t VALUES (?, ?)", &[RowValues::Int(1), RowValues::Null])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Programming);
    assert_eq!(err.message, "injected prepare failure");
    assert_eq!(cursor.state(), CursorState::Failed);
    assert_eq!(count(&engine, binds), 0);
    assert_eq!(engine.live_statements(), 0);
    Ok(())
}

#[test]
fn bind_failure_still_destroys_the_statement() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, conn) = setup()?;
    let cursor = conn.cursor()?;
    engine.fail_next(Failure::Bind);

    let err = cursor
        .execute_with("INSERT INTO t VALUES (?, ?)", &[RowValues::Int(1), RowValues::Null])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Programming);
    assert_eq!(err.message, "injected bind failure");
    assert_eq!(count(&engine, executes), 0);
    assert_eq!(count(&engine, destroys), 1);
    assert_eq!(engine.live_statements(), 0);
    Ok(())
}

#[test]
fn execute_failure_still_destroys_the_statement() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, conn) = setup()?;
    let cursor = conn.cursor()?;
    engine.fail_next(Failure::Execute);

    let err = cursor
        .execute_with("INSERT INTO t VALUES (?, ?)", &[RowValues::Int(1), RowValues::Null])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Programming);
    assert_eq!(err.message, "injected execute failure");
    assert_eq!(cursor.state(), CursorState::Failed);
    assert_eq!(cursor.rowcount(), -1);
    assert_eq!(engine.live_statements(), 0);

    // A failed cursor accepts the next statement.
    cursor.execute("SELECT * FROM t")?;
    assert_eq!(cursor.state(), CursorState::Executed);
    assert_eq!(cursor.rowcount(), 0);
    Ok(())
}

#[test]
fn execute_many_stops_at_the_first_failing_row() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, conn) = setup()?;
    let rows = vec![
        vec![RowValues::Int(1), RowValues::Text("ok".into())],
        vec![RowValues::Text("not a number".into()), RowValues::Text("bad".into())],
        vec![RowValues::Int(3), RowValues::Text("never".into())],
    ];
    let err = conn.execute_many("INSERT INTO t VALUES (?, ?)", &rows).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Programming);
    assert!(err.message.contains("INTEGER"), "{err}");

    assert_eq!(count(&engine, executes), 2);
    assert_eq!(count(&engine, destroys), 1);

    // The first row was applied and stays applied.
    let rows = conn.execute("SELECT * FROM t")?.fetch_all()?;
    assert_eq!(rows.len(), 1);
    Ok(())
}

#[test]
fn parameter_count_mismatch_fails_before_prepare() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, conn) = setup()?;
    let err = conn
        .execute_with("INSERT INTO t VALUES (?, ?)", &[RowValues::Int(1)])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Programming);
    assert!(err.message.contains("expects 2 parameters"), "{err}");
    assert_eq!(count(&engine, prepares), 0);

    // markers inside literals do not count
    conn.execute_with("INSERT INTO t VALUES (?, 'what?')", &[RowValues::Int(9)])?;
    let row = conn
        .execute_with("SELECT name FROM t WHERE id = ?", &[RowValues::Int(9)])?
        .fetch_one()?
        .expect("inserted row");
    assert_eq!(row.get("name"), Some(&RowValues::Text("what?".into())));
    Ok(())
}

#[test]
fn direct_query_failure_carries_the_result_message() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, conn) = setup()?;
    let cursor = conn.cursor()?;
    let err = cursor.execute("SELECT * FROM missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Programming);
    assert!(err.message.contains("does not exist"), "{err}");
    assert_eq!(cursor.state(), CursorState::Failed);
    assert_eq!(count(&engine, prepares), 0);
    Ok(())
}

#[test]
fn oversized_unsigned_parameter_is_a_data_error() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, conn) = setup()?;
    let err = conn
        .execute_with("INSERT INTO t VALUES (?, ?)", &[RowValues::UInt(u64::MAX), RowValues::Null])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Data);
    assert!(err.is_database_error());
    assert_eq!(engine.live_statements(), 0);
    Ok(())
}

#[test]
fn dollar_signs_in_identifiers_keep_their_markers() -> Result<(), Box<dyn std::error::Error>> {
    let (engine, conn) = setup()?;
    conn.execute("CREATE TABLE d (id INTEGER, a$b$c VARCHAR)")?;
    conn.execute_with(
        "INSERT INTO d (id, a$b$c) VALUES (?, ?)",
        &[RowValues::Int(1), RowValues::Text("x".into())],
    )?;
    let rows = conn
        .execute_with("SELECT id FROM d WHERE a$b$c = ?", &[RowValues::Text("x".into())])?
        .fetch_all()?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&RowValues::Int(1)));
    assert_eq!(count(&engine, prepares), 2);
    Ok(())
}

#[test]
fn one_cursor_never_interleaves_statements() -> Result<(), Box<dyn std::error::Error>> {
    const ROUNDS: i64 = 25;
    let (engine, conn) = setup()?;
    let cursor = Arc::new(conn.cursor()?);
    engine.clear_calls();

    let workers: Vec<_> = (0..2_i64)
        .map(|worker| {
            let cursor = Arc::clone(&cursor);
            thread::spawn(move || -> Result<(), IntarkDbError> {
                for round in 0..ROUNDS {
                    let id = worker * 1000 + round;
                    cursor.execute_many(
                        "INSERT INTO t VALUES (?, ?)",
                        &[
                            vec![RowValues::Int(id), RowValues::Text(format!("w{worker}"))],
                            vec![RowValues::Int(-id), RowValues::Null],
                        ],
                    )?;
                }
                Ok(())
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker thread")?;
    }

    // Each prepare runs to its destroy before anything else touches a statement.
    let mut in_flight = false;
    let mut executes_in_statement = 0;
    for call in engine.calls() {
        match call {
            NativeCall::Prepare(_) => {
                assert!(!in_flight, "prepare while another statement is open");
                in_flight = true;
                executes_in_statement = 0;
            }
            NativeCall::Bind { .. } => assert!(in_flight, "bind outside a statement"),
            NativeCall::ExecutePrepared => {
                assert!(in_flight, "execute outside a statement");
                executes_in_statement += 1;
            }
            NativeCall::DestroyPrepare => {
                assert!(in_flight, "destroy without a prepare");
                assert_eq!(executes_in_statement, 2);
                in_flight = false;
            }
            _ => {}
        }
    }
    assert!(!in_flight);
    assert_eq!(count(&engine, prepares), 50);
    assert_eq!(count(&engine, binds), 200);

    let rows = conn.execute("SELECT * FROM t")?.fetch_all()?;
    assert_eq!(rows.len(), 100);
    Ok(())
}
