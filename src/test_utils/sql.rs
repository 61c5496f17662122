//! A deliberately tiny SQL interpreter backing [`super::MemoryEngine`].
//!
//! Supported: `CREATE TABLE`, `DROP TABLE`, `INSERT ... VALUES` (one or more
//! tuples), `SELECT cols|* FROM t [WHERE ...] [ORDER BY c [ASC|DESC]]`,
//! `SELECT <literals>`, `UPDATE t SET ... [WHERE ...]`,
//! `DELETE FROM t [WHERE ...]`. `WHERE` accepts `col = lit` / `col <> lit`
//! terms joined by `AND`. Values are stored as canonical text.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::types::TypeKind;

pub(crate) type Cell = Option<String>;

#[derive(Debug, Clone, Default)]
pub(crate) struct Table {
    pub(crate) columns: Vec<(String, TypeKind)>,
    pub(crate) rows: Vec<Vec<Cell>>,
}

/// Output of one statement.
#[derive(Debug, Clone, Default)]
pub(crate) struct Outcome {
    pub(crate) columns: Vec<(String, i32)>,
    pub(crate) rows: Vec<Vec<Cell>>,
    /// Rows touched by a DML statement.
    pub(crate) affected: usize,
}

impl Outcome {
    pub(crate) fn row_count(&self) -> usize {
        if self.columns.is_empty() {
            self.affected
        } else {
            self.rows.len()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxControl {
    Begin,
    Commit,
    Rollback,
}

pub(crate) enum Statement {
    Tx(TxControl),
    Create { table: String, body: String },
    Drop { table: String },
    Insert { table: String, columns: Option<String>, values: String },
    Select { exprs: String, table: Option<String>, filter: Option<String>, order: Option<(String, bool)> },
    Update { table: String, assignments: String, filter: Option<String> },
    Delete { table: String, filter: Option<String> },
}

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).unwrap_or_else(|e| panic!("bad pattern: {e}")));
    };
}

pattern!(TX, r"(?is)^\s*(begin|commit|rollback)\s*;?\s*$");
pattern!(
    CREATE,
    r"(?is)^\s*create\s+table\s+(?:if\s+not\s+exists\s+)?(\w+)\s*\((.*)\)\s*;?\s*$"
);
pattern!(DROP, r"(?is)^\s*drop\s+table\s+(?:if\s+exists\s+)?(\w+)\s*;?\s*$");
pattern!(
    INSERT,
    r"(?is)^\s*insert\s+into\s+(\w+)\s*(?:\(([^)]*)\))?\s*values\s*(.*?)\s*;?\s*$"
);
pattern!(
    SELECT_FROM,
    r"(?is)^\s*select\s+(.*?)\s+from\s+'?(\w+)'?(?:\s+where\s+(.*?))?(?:\s+order\s+by\s+(\w+)(?:\s+(asc|desc))?)?\s*;?\s*$"
);
pattern!(SELECT_LITERALS, r"(?is)^\s*select\s+(.*?)\s*;?\s*$");
pattern!(
    UPDATE,
    r"(?is)^\s*update\s+(\w+)\s+set\s+(.*?)(?:\s+where\s+(.*?))?\s*;?\s*$"
);
pattern!(DELETE, r"(?is)^\s*delete\s+from\s+(\w+)(?:\s+where\s+(.*?))?\s*;?\s*$");
pattern!(CONDITION, r"(?is)^\s*([\w$]+)\s*(=|<>|!=)\s*(.+?)\s*$");
pattern!(AND, r"(?i)\s+and\s+");
pattern!(NUMBER, r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$");

/// Recognise the statement shape without touching any data.
pub(crate) fn parse(sql: &str) -> Result<Statement, String> {
    let group = |caps: &regex::Captures<'_>, i: usize| caps.get(i).map(|m| m.as_str().to_string());

    if let Some(caps) = TX.captures(sql) {
        let tx = match caps[1].to_ascii_lowercase().as_str() {
            "begin" => TxControl::Begin,
            "commit" => TxControl::Commit,
            _ => TxControl::Rollback,
        };
        return Ok(Statement::Tx(tx));
    }
    if let Some(caps) = CREATE.captures(sql) {
        return Ok(Statement::Create {
            table: caps[1].to_ascii_lowercase(),
            body: caps[2].to_string(),
        });
    }
    if let Some(caps) = DROP.captures(sql) {
        return Ok(Statement::Drop { table: caps[1].to_ascii_lowercase() });
    }
    if let Some(caps) = INSERT.captures(sql) {
        return Ok(Statement::Insert {
            table: caps[1].to_ascii_lowercase(),
            columns: group(&caps, 2),
            values: caps[3].to_string(),
        });
    }
    if let Some(caps) = SELECT_FROM.captures(sql) {
        let order = caps.get(4).map(|col| {
            let descending = caps
                .get(5)
                .is_some_and(|dir| dir.as_str().eq_ignore_ascii_case("desc"));
            (col.as_str().to_ascii_lowercase(), descending)
        });
        return Ok(Statement::Select {
            exprs: caps[1].to_string(),
            table: Some(caps[2].to_ascii_lowercase()),
            filter: group(&caps, 3),
            order,
        });
    }
    if let Some(caps) = UPDATE.captures(sql) {
        return Ok(Statement::Update {
            table: caps[1].to_ascii_lowercase(),
            assignments: caps[2].to_string(),
            filter: group(&caps, 3),
        });
    }
    if let Some(caps) = DELETE.captures(sql) {
        return Ok(Statement::Delete {
            table: caps[1].to_ascii_lowercase(),
            filter: group(&caps, 2),
        });
    }
    if let Some(caps) = SELECT_LITERALS.captures(sql) {
        return Ok(Statement::Select {
            exprs: caps[1].to_string(),
            table: None,
            filter: None,
            order: None,
        });
    }
    Err(format!("syntax error near \"{}\"", sql.trim()))
}

/// Split on `sep` at paren depth zero, outside single-quoted strings.
fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth -= 1,
            c if c == sep && !quoted && depth == 0 => {
                parts.push(input[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    let tail = input[start..].trim();
    if !tail.is_empty() || !parts.is_empty() {
        parts.push(tail);
    }
    parts
}

/// Declared type name to kind; unknown names store as text.
pub(crate) fn kind_for_declared(declared: &str) -> TypeKind {
    let base = declared
        .split(['(', ' '])
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    match base.as_str() {
        "INT" | "INT4" => TypeKind::Integer,
        "INT8" => TypeKind::Bigint,
        "INT2" => TypeKind::Smallint,
        "TEXT" => TypeKind::Varchar,
        "DOUBLE" | "FLOAT8" => TypeKind::Real,
        "BOOL" => TypeKind::Boolean,
        "NUMERIC" => TypeKind::Decimal,
        "DATETIME" => TypeKind::Timestamp,
        other => {
            let kind = [
                TypeKind::Integer,
                TypeKind::Bigint,
                TypeKind::Smallint,
                TypeKind::Tinyint,
                TypeKind::Utinyint,
                TypeKind::Usmallint,
                TypeKind::Uint32,
                TypeKind::Uint64,
                TypeKind::Real,
                TypeKind::Float,
                TypeKind::Decimal,
                TypeKind::Boolean,
                TypeKind::Date,
                TypeKind::Timestamp,
                TypeKind::Char,
                TypeKind::Varchar,
                TypeKind::String,
                TypeKind::Clob,
                TypeKind::Blob,
            ]
            .into_iter()
            .find(|kind| kind.sql_name() == other);
            kind.unwrap_or(TypeKind::Varchar)
        }
    }
}

/// A literal as written in SQL: `NULL`, a number, `true`/`false` or a
/// single-quoted string.
pub(crate) fn parse_literal(token: &str) -> Result<Cell, String> {
    let token = token.trim();
    if token.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    if token.eq_ignore_ascii_case("true") {
        return Ok(Some("1".to_string()));
    }
    if token.eq_ignore_ascii_case("false") {
        return Ok(Some("0".to_string()));
    }
    if NUMBER.is_match(token) {
        return Ok(Some(token.to_string()));
    }
    if token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'') {
        return Ok(Some(token[1..token.len() - 1].replace("''", "'")));
    }
    Err(format!("unsupported literal: {token}"))
}

/// Canonical stored text for `value` in a column of `kind`.
fn coerce(kind: TypeKind, value: Cell) -> Result<Cell, String> {
    let Some(text) = value else {
        return Ok(None);
    };
    let invalid = |what: &str| format!("invalid {what} value: {text}");
    let canonical = match kind {
        TypeKind::Tinyint | TypeKind::Smallint | TypeKind::Integer | TypeKind::Bigint => text
            .parse::<i64>()
            .map_err(|_| invalid(kind.sql_name()))?
            .to_string(),
        TypeKind::Utinyint | TypeKind::Usmallint | TypeKind::Uint32 | TypeKind::Uint64 => text
            .parse::<u64>()
            .map_err(|_| invalid(kind.sql_name()))?
            .to_string(),
        TypeKind::Boolean => match text.to_ascii_lowercase().as_str() {
            "1" | "true" => "1".to_string(),
            "0" | "false" => "0".to_string(),
            _ => return Err(invalid("BOOLEAN")),
        },
        TypeKind::Real | TypeKind::Float => {
            let parsed = text.parse::<f64>().map_err(|_| invalid(kind.sql_name()))?;
            parsed.to_string()
        }
        TypeKind::Decimal => {
            text.parse::<f64>().map_err(|_| invalid("DECIMAL"))?;
            text
        }
        TypeKind::Date => {
            NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|_| invalid("DATE"))?;
            text
        }
        TypeKind::Timestamp => {
            NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
                .map_err(|_| invalid("TIMESTAMP"))?;
            text
        }
        _ => text,
    };
    Ok(Some(canonical))
}

fn compare_cells(kind: TypeKind, a: &Cell, b: &Cell) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match kind {
            TypeKind::Tinyint
            | TypeKind::Smallint
            | TypeKind::Integer
            | TypeKind::Bigint
            | TypeKind::Utinyint
            | TypeKind::Usmallint
            | TypeKind::Uint32
            | TypeKind::Uint64
            | TypeKind::Real
            | TypeKind::Float
            | TypeKind::Decimal
            | TypeKind::Boolean => {
                let (x, y) = (a.parse::<f64>(), b.parse::<f64>());
                match (x, y) {
                    (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                    _ => a.cmp(b),
                }
            }
            _ => a.cmp(b),
        },
    }
}

struct Condition {
    column: usize,
    negate: bool,
    value: Cell,
}

fn parse_filter(table: &Table, filter: Option<&str>) -> Result<Vec<Condition>, String> {
    let Some(filter) = filter else {
        return Ok(Vec::new());
    };
    AND.split(filter)
        .map(|term| {
            let caps = CONDITION
                .captures(term)
                .ok_or_else(|| format!("unsupported condition: {term}"))?;
            let column = column_position(table, &caps[1])?;
            let kind = table.columns[column].1;
            Ok(Condition {
                column,
                negate: &caps[2] != "=",
                value: coerce(kind, parse_literal(&caps[3])?)?,
            })
        })
        .collect()
}

fn matches(table: &Table, row: &[Cell], conditions: &[Condition]) -> bool {
    conditions.iter().all(|cond| {
        let kind = table.columns[cond.column].1;
        let cell = &row[cond.column];
        // NULL never compares equal or unequal.
        if cell.is_none() || cond.value.is_none() {
            return false;
        }
        let equal = compare_cells(kind, cell, &cond.value) == Ordering::Equal;
        equal != cond.negate
    })
}

const SYSTEM_TABLES: &str = "sys_tables";

/// Read-only catalog with one `name` row per user table.
fn system_tables(tables: &HashMap<String, Table>) -> Table {
    let mut names: Vec<&String> = tables.keys().collect();
    names.sort();
    Table {
        columns: vec![("name".to_string(), TypeKind::Varchar)],
        rows: names.into_iter().map(|name| vec![Some(name.clone())]).collect(),
    }
}

fn column_position(table: &Table, name: &str) -> Result<usize, String> {
    let name = name.trim();
    table
        .columns
        .iter()
        .position(|(col, _)| col.eq_ignore_ascii_case(name))
        .ok_or_else(|| format!("column {name} does not exist"))
}

/// Run a parsed data statement against `tables`.
pub(crate) fn execute(
    tables: &mut HashMap<String, Table>,
    statement: Statement,
) -> Result<Outcome, String> {
    match statement {
        Statement::Tx(_) => Ok(Outcome::default()),
        Statement::Create { table, body } => {
            if tables.contains_key(&table) {
                return Err(format!("table {table} already exists"));
            }
            let mut columns = Vec::new();
            for def in split_top_level(&body, ',') {
                let mut words = def.split_whitespace();
                let Some(name) = words.next() else { continue };
                let lowered = name.to_ascii_lowercase();
                if matches!(lowered.as_str(), "primary" | "constraint" | "unique" | "foreign") {
                    continue;
                }
                let declared = words.next().unwrap_or("VARCHAR");
                columns.push((lowered, kind_for_declared(declared)));
            }
            if columns.is_empty() {
                return Err(format!("table {table} has no columns"));
            }
            tables.insert(table, Table { columns, rows: Vec::new() });
            Ok(Outcome::default())
        }
        Statement::Drop { table } => {
            tables
                .remove(&table)
                .ok_or_else(|| format!("table {table} does not exist"))?;
            Ok(Outcome::default())
        }
        Statement::Insert { table, columns, values } => {
            let target = tables
                .get_mut(&table)
                .ok_or_else(|| format!("table {table} does not exist"))?;
            let positions: Vec<usize> = match columns {
                Some(list) => split_top_level(&list, ',')
                    .into_iter()
                    .map(|name| column_position(target, name))
                    .collect::<Result<_, _>>()?,
                None => (0..target.columns.len()).collect(),
            };
            let mut staged = Vec::new();
            for tuple in split_top_level(&values, ',') {
                let inner = tuple
                    .strip_prefix('(')
                    .and_then(|t| t.strip_suffix(')'))
                    .ok_or_else(|| format!("malformed VALUES tuple: {tuple}"))?;
                let literals = split_top_level(inner, ',');
                if literals.len() != positions.len() {
                    return Err(format!(
                        "expected {} values, got {}",
                        positions.len(),
                        literals.len()
                    ));
                }
                let mut row: Vec<Cell> = vec![None; target.columns.len()];
                for (&pos, literal) in positions.iter().zip(literals) {
                    row[pos] = coerce(target.columns[pos].1, parse_literal(literal)?)?;
                }
                staged.push(row);
            }
            let affected = staged.len();
            target.rows.extend(staged);
            Ok(Outcome { affected, ..Outcome::default() })
        }
        Statement::Select { exprs, table: None, .. } => {
            let mut columns = Vec::new();
            let mut row = Vec::new();
            for expr in split_top_level(&exprs, ',') {
                let value = parse_literal(expr)?;
                let kind = match &value {
                    Some(v) if v.parse::<i64>().is_ok() && !expr.starts_with('\'') => {
                        TypeKind::Integer
                    }
                    Some(v) if NUMBER.is_match(v) && !expr.starts_with('\'') => TypeKind::Real,
                    _ => TypeKind::Varchar,
                };
                columns.push((expr.to_string(), kind.code()));
                row.push(value);
            }
            Ok(Outcome { columns, rows: vec![row], affected: 0 })
        }
        Statement::Select { exprs, table: Some(table), filter, order } => {
            let catalog;
            let source = match tables.get(&table) {
                Some(source) => source,
                None if table == SYSTEM_TABLES => {
                    catalog = system_tables(tables);
                    &catalog
                }
                None => return Err(format!("table {table} does not exist")),
            };
            let positions: Vec<usize> = if exprs.trim() == "*" {
                (0..source.columns.len()).collect()
            } else {
                split_top_level(&exprs, ',')
                    .into_iter()
                    .map(|name| column_position(source, name))
                    .collect::<Result<_, _>>()?
            };
            let conditions = parse_filter(source, filter.as_deref())?;
            let mut selected: Vec<&Vec<Cell>> = source
                .rows
                .iter()
                .filter(|row| matches(source, row, &conditions))
                .collect();
            if let Some((column, descending)) = order {
                let pos = column_position(source, &column)?;
                let kind = source.columns[pos].1;
                selected.sort_by(|a, b| {
                    let ord = compare_cells(kind, &a[pos], &b[pos]);
                    if descending { ord.reverse() } else { ord }
                });
            }
            let columns = positions
                .iter()
                .map(|&p| (source.columns[p].0.clone(), source.columns[p].1.code()))
                .collect();
            let rows = selected
                .into_iter()
                .map(|row| positions.iter().map(|&p| row[p].clone()).collect())
                .collect();
            Ok(Outcome { columns, rows, affected: 0 })
        }
        Statement::Update { table, assignments, filter } => {
            let target = tables
                .get_mut(&table)
                .ok_or_else(|| format!("table {table} does not exist"))?;
            let mut sets = Vec::new();
            for assignment in split_top_level(&assignments, ',') {
                let (column, literal) = assignment
                    .split_once('=')
                    .ok_or_else(|| format!("malformed assignment: {assignment}"))?;
                let pos = column_position(target, column)?;
                sets.push((pos, coerce(target.columns[pos].1, parse_literal(literal)?)?));
            }
            let conditions = parse_filter(target, filter.as_deref())?;
            let hits: Vec<usize> = target
                .rows
                .iter()
                .enumerate()
                .filter(|(_, row)| matches(target, row, &conditions))
                .map(|(i, _)| i)
                .collect();
            for &i in &hits {
                for (pos, value) in &sets {
                    target.rows[i][*pos] = value.clone();
                }
            }
            Ok(Outcome { affected: hits.len(), ..Outcome::default() })
        }
        Statement::Delete { table, filter } => {
            let target = tables
                .get_mut(&table)
                .ok_or_else(|| format!("table {table} does not exist"))?;
            let conditions = parse_filter(target, filter.as_deref())?;
            let before = target.rows.len();
            let kept: Vec<Vec<Cell>> = target
                .rows
                .iter()
                .filter(|row| !matches(target, row, &conditions))
                .cloned()
                .collect();
            target.rows = kept;
            Ok(Outcome { affected: before - target.rows.len(), ..Outcome::default() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(tables: &mut HashMap<String, Table>, sql: &str) -> Outcome {
        execute(tables, parse(sql).unwrap()).unwrap()
    }

    #[test]
    fn create_insert_select_round() {
        let mut tables = HashMap::new();
        run(&mut tables, "CREATE TABLE t (id INTEGER, name VARCHAR(20), ok BOOLEAN)");
        let out = run(&mut tables, "INSERT INTO t VALUES (1, 'a', true), (2, 'it''s', false)");
        assert_eq!(out.affected, 2);

        let out = run(&mut tables, "SELECT name, ok FROM t WHERE id = 2");
        assert_eq!(out.rows, vec![vec![Some("it's".into()), Some("0".into())]]);
        assert_eq!(out.columns[1].1, TypeKind::Boolean.code());
    }

    #[test]
    fn order_by_is_numeric_for_numeric_columns() {
        let mut tables = HashMap::new();
        run(&mut tables, "CREATE TABLE n (v INTEGER)");
        run(&mut tables, "INSERT INTO n VALUES (10), (9), (100)");
        let out = run(&mut tables, "SELECT v FROM n ORDER BY v DESC");
        let values: Vec<_> = out.rows.into_iter().map(|r| r[0].clone().unwrap()).collect();
        assert_eq!(values, ["100", "10", "9"]);
    }

    #[test]
    fn rejects_values_of_the_wrong_kind() {
        let mut tables = HashMap::new();
        run(&mut tables, "CREATE TABLE t (id INTEGER)");
        let err = execute(&mut tables, parse("INSERT INTO t VALUES ('x')").unwrap()).unwrap_err();
        assert!(err.contains("INTEGER"), "{err}");
    }

    #[test]
    fn catalog_lists_user_tables() {
        let mut tables = HashMap::new();
        run(&mut tables, "CREATE TABLE b (id INTEGER)");
        run(&mut tables, "CREATE TABLE a (id INTEGER)");
        let out = run(&mut tables, "SELECT name FROM 'SYS_TABLES'");
        assert_eq!(out.rows, vec![vec![Some("a".into())], vec![Some("b".into())]]);

        let out = run(&mut tables, "SELECT name FROM SYS_TABLES WHERE name = 'b'");
        assert_eq!(out.rows.len(), 1);
    }

    #[test]
    fn unknown_statements_fail_to_parse() {
        assert!(parse("VACUUM").is_err());
    }
}
