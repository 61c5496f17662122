use std::sync::Arc;

use intarkdb_middleware::prelude::*;
use intarkdb_middleware::test_utils::MemoryEngine;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const ROWS: i64 = 25;

fn seeded_connection() -> Result<Connection, IntarkDbError> {
    let driver = Driver::new(Arc::new(MemoryEngine::local()));
    let conn = driver.connect(&ConnectOptions::local("pagination"))?;
    conn.execute("CREATE TABLE p (id INTEGER, label VARCHAR)")?;
    let rows: Vec<Vec<RowValues>> = (0..ROWS)
        .map(|i| vec![RowValues::Int(i), RowValues::Text(format!("row-{i}"))])
        .collect();
    conn.execute_many("INSERT INTO p VALUES (?, ?)", &rows)?;
    Ok(conn)
}

fn select_all(conn: &Connection) -> Result<Cursor, IntarkDbError> {
    conn.execute("SELECT * FROM p ORDER BY id")
}

#[test]
fn fetch_many_partitions_concatenate_to_fetch_all() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded_connection()?;
    let everything = select_all(&conn)?.fetch_all()?;
    assert_eq!(everything.len(), usize::try_from(ROWS)?);

    let mut rng = ChaCha8Rng::seed_from_u64(0x1d);
    for _ in 0..20 {
        let cursor = select_all(&conn)?;
        let mut collected = Vec::new();
        let mut remaining = usize::try_from(ROWS)?;
        while remaining > 0 {
            let k = rng.random_range(1..=remaining);
            let batch = cursor.fetch_many(k)?;
            assert_eq!(batch.len(), k);
            remaining -= k;
            collected.extend(batch);
        }
        assert_eq!(collected, everything);
        assert_eq!(cursor.rownumber(), ROWS);
    }
    Ok(())
}

#[test]
fn fetch_one_walks_the_same_rows() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded_connection()?;
    let everything = select_all(&conn)?.fetch_all()?;

    let cursor = select_all(&conn)?;
    let mut one_by_one = Vec::new();
    while let Some(row) = cursor.fetch_one()? {
        one_by_one.push(row);
    }
    assert_eq!(one_by_one, everything);
    Ok(())
}

#[test]
fn exhausted_cursors_return_empty_results() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded_connection()?;
    let cursor = select_all(&conn)?;
    cursor.fetch_all()?;

    assert_eq!(cursor.fetch_one()?, None);
    assert_eq!(cursor.fetch_one()?, None);
    assert!(cursor.fetch_many(3)?.is_empty());
    assert!(cursor.fetch_all()?.is_empty());
    assert_eq!(cursor.rownumber(), cursor.rowcount());
    Ok(())
}

#[test]
fn oversized_fetch_many_behaves_like_fetch_all() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded_connection()?;
    let cursor = select_all(&conn)?;
    cursor.fetch_many(20)?;

    let rest = cursor.fetch_many(1_000)?;
    assert_eq!(rest.len(), 5);
    assert_eq!(
        rest.first().and_then(|row| row.get("id")),
        Some(&RowValues::Int(20))
    );
    assert!(cursor.fetch_many(0)?.is_empty());
    Ok(())
}

#[test]
fn re_execute_resets_the_position() -> Result<(), Box<dyn std::error::Error>> {
    let conn = seeded_connection()?;
    let cursor = conn.cursor()?;
    cursor.execute("SELECT * FROM p ORDER BY id")?;
    cursor.fetch_many(10)?;
    assert_eq!(cursor.rownumber(), 10);

    cursor.execute("SELECT label FROM p WHERE id = 3")?;
    assert_eq!(cursor.rownumber(), 0);
    assert_eq!(cursor.rowcount(), 1);
    let row = cursor.fetch_one()?.expect("row 3");
    assert_eq!(row.get("label"), Some(&RowValues::Text("row-3".into())));
    assert_eq!(row.get("id"), None);
    Ok(())
}

#[test]
fn failed_batch_leaves_the_position_in_place() -> Result<(), Box<dyn std::error::Error>> {
    let driver = Driver::new(Arc::new(MemoryEngine::local()));
    let conn = driver.connect(&ConnectOptions::local("bad_cell"))?;
    conn.execute("CREATE TABLE m (id INTEGER, amount DECIMAL)")?;
    conn.execute("INSERT INTO m VALUES (1, 1.5), (2, 2.5), (3, 'NaN'), (4, 4.5)")?;

    let cursor = conn.execute("SELECT * FROM m ORDER BY id")?;
    assert_eq!(cursor.fetch_many(2)?.len(), 2);
    assert_eq!(cursor.rownumber(), 2);

    let err = cursor.fetch_many(2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Data);
    assert_eq!(cursor.rownumber(), 2);

    // Still pointing at the undecodable row.
    assert!(cursor.fetch_all().is_err());
    assert_eq!(cursor.rownumber(), 2);
    Ok(())
}
