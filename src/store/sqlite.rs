//! SQLite-backed byte engine.
//!
//! A single `kv` table keyed by BLOB. SQLite compares BLOBs with `memcmp`, so
//! `ORDER BY key` is raw byte order.

use std::fs;
use std::ops::Bound;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::error::{Result, SpacedRepError};
use crate::store::engine::{BatchOp, ByteStore, ScanControl};

pub struct SqliteByteStore {
    conn: Connection,
}

impl SqliteByteStore {
    /// Open or create a database file, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| SpacedRepError::Transport(format!("Failed to open {}: {e}", path.display())))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key BLOB PRIMARY KEY NOT NULL,
                value BLOB NOT NULL
            ) WITHOUT ROWID;
            "#,
        )?;
        Ok(Self { conn })
    }
}

fn push_bound(clauses: &mut Vec<String>, args: &mut Vec<Value>, bound: Bound<&[u8]>, inclusive: &str, exclusive: &str) {
    match bound {
        Bound::Included(k) => {
            clauses.push(format!("key {inclusive} ?"));
            args.push(Value::Blob(k.to_vec()));
        }
        Bound::Excluded(k) => {
            clauses.push(format!("key {exclusive} ?"));
            args.push(Value::Blob(k.to_vec()));
        }
        Bound::Unbounded => {}
    }
}

impl ByteStore for SqliteByteStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn scan(
        &self,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
        limit: Option<usize>,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> Result<ScanControl>,
    ) -> Result<()> {
        let mut clauses = Vec::new();
        let mut args = Vec::new();
        push_bound(&mut clauses, &mut args, start, ">=", ">");
        push_bound(&mut clauses, &mut args, end, "<=", "<");

        let mut sql = String::from("SELECT key, value FROM kv");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY key");
        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            args.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(args))?;
        while let Some(row) = rows.next()? {
            let key: Vec<u8> = row.get(0)?;
            let value: Vec<u8> = row.get(1)?;
            if visit(&key, &value)? == ScanControl::Stop {
                break;
            }
        }
        Ok(())
    }

    fn write_batch(&mut self, ops: Vec<BatchOp>) -> Result<()> {
        // Dropping the transaction on error rolls it back
        let tx = self.conn.transaction()?;
        for op in &ops {
            match op {
                BatchOp::Put { key, value } => {
                    tx.execute("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)", params![key, value])?;
                }
                BatchOp::Delete { key } => {
                    tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM kv", [])?;
        Ok(())
    }
}
