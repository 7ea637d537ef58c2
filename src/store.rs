//! Entity store over the single workspace database file.
//!
//! One `Store` owns the SQLite handle for the life of the process. Every
//! operation takes the handle's mutex, so writes are applied one at a time in
//! call order and reads always see committed state. Cascading deletes run in a
//! single transaction and either land completely or not at all.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params_from_iter, Connection, OptionalExtension, Transaction};
use tracing::{debug, info};

use crate::changes::{ChangeHub, ChangeKind, Subscription};
use crate::db;
use crate::error::{Result, StoreError};
use crate::ids::Clock;
use crate::models::{Record, Table};
use crate::query::Query;

pub struct Store {
    conn: Mutex<Connection>,
    clock: Clock,
    changes: ChangeHub,
    workspace: Option<PathBuf>,
}

impl Store {
    pub fn open(workspace: &Path) -> Result<Self> {
        let conn = db::open_db(workspace)?;
        info!(workspace = %workspace.display(), "opened classbook store");
        Ok(Self::from_connection(conn, Some(workspace.to_path_buf())))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(db::open_in_memory()?, None))
    }

    fn from_connection(conn: Connection, workspace: Option<PathBuf>) -> Self {
        Self {
            conn: Mutex::new(conn),
            clock: Clock::new(),
            changes: ChangeHub::new(),
            workspace,
        }
    }

    pub fn workspace(&self) -> Option<&Path> {
        self.workspace.as_deref()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn subscribe(&self, tables: &[Table]) -> Subscription {
        self.changes.subscribe(tables)
    }

    pub fn versions(&self) -> Vec<(Table, u64)> {
        self.changes.versions()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-call leaves no open transaction behind (it rolls back on drop).
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run read-only work against the committed state.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock();
        f(&conn)
    }

    /// Run `f` in one transaction; publish `touched` only once it has committed.
    pub(crate) fn write<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<(T, Vec<(Table, ChangeKind)>)>,
    ) -> Result<T> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let (out, touched) = f(&tx)?;
        tx.commit()?;
        for (table, kind) in touched {
            self.changes.publish(table, kind);
        }
        Ok(out)
    }

    /// Insert, or overwrite every attribute of the row with the same key.
    ///
    /// The row is stored exactly as given; use [`Store::save`] for local edits
    /// that need a fresh stamp.
    pub fn upsert<E: Record>(&self, row: &E) -> Result<E::Key> {
        self.write(|tx| {
            upsert_in(tx, row)?;
            debug!(table = %E::TABLE, key = ?row.key(), "upserted");
            Ok((row.key(), vec![(E::TABLE, ChangeKind::Upsert)]))
        })
    }

    /// Insert that refuses to replace: a key collision is a constraint violation.
    pub fn insert<E: Record>(&self, row: &E) -> Result<E::Key> {
        row.check()?;
        self.write(|tx| {
            let placeholders = vec!["?"; E::COLUMNS.len()].join(", ");
            let sql = format!(
                "INSERT INTO {}({}) VALUES({})",
                E::TABLE.name(),
                E::COLUMNS.join(", "),
                placeholders
            );
            tx.execute(&sql, params_from_iter(row.values()))
                .map_err(|e| StoreError::from_sqlite(E::TABLE.name(), e))?;
            Ok((row.key(), vec![(E::TABLE, ChangeKind::Upsert)]))
        })
    }

    /// Local edit: stamp `last_modified`, mark the row dirty, then upsert.
    pub fn save<E: Record>(&self, row: &mut E) -> Result<E::Key> {
        row.set_sync_state(self.clock.now_millis(), false);
        self.upsert(row)
    }

    /// Overwrite an existing row. Returns 0 when the key is absent.
    pub fn update<E: Record>(&self, row: &E) -> Result<usize> {
        self.write(|tx| {
            let n = update_in(tx, row)?;
            let touched = if n > 0 {
                vec![(E::TABLE, ChangeKind::Update)]
            } else {
                Vec::new()
            };
            Ok((n, touched))
        })
    }

    pub fn delete<E: Record>(&self, row: &E) -> Result<usize> {
        self.delete_by_key::<E>(&row.key())
    }

    /// Delete by key; dependent rows go with it in the same transaction.
    pub fn delete_by_key<E: Record>(&self, key: &E::Key) -> Result<usize> {
        self.write(|tx| {
            let sql = format!(
                "DELETE FROM {} WHERE {}",
                E::TABLE.name(),
                key_clause(E::KEY_COLUMNS)
            );
            let n = tx
                .execute(&sql, params_from_iter(E::key_values(key)))
                .map_err(|e| StoreError::from_sqlite(E::TABLE.name(), e))?;
            let mut touched = Vec::new();
            if n > 0 {
                debug!(table = %E::TABLE, key = ?key, "deleted");
                touched.push((E::TABLE, ChangeKind::Delete));
                touched.extend(
                    E::TABLE
                        .cascades_to()
                        .iter()
                        .map(|t| (*t, ChangeKind::Cascade)),
                );
            }
            Ok((n, touched))
        })
    }

    pub fn get<E: Record>(&self, key: &E::Key) -> Result<Option<E>> {
        self.read(|conn| get_in::<E>(conn, key))
    }

    pub fn query<E: Record>(&self, query: &Query) -> Result<Vec<E>> {
        let (sql, params) = query.to_sql::<E>()?;
        self.read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params), |r| E::from_row(r))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Dirty rows in primary-key order.
    pub fn list_unsynced<E: Record>(&self) -> Result<Vec<E>> {
        self.query::<E>(&Query::new().unsynced())
    }

    pub fn count<E: Record>(&self) -> Result<i64> {
        self.read(|conn| {
            let n = conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", E::TABLE.name()),
                [],
                |r| r.get(0),
            )?;
            Ok(n)
        })
    }

    /// Write a consistent copy of the database to `out` (which must not exist).
    pub fn snapshot_to(&self, out: &Path) -> Result<()> {
        let target = out.to_string_lossy().to_string();
        self.read(|conn| {
            conn.execute("VACUUM INTO ?1", [target.as_str()])?;
            Ok(())
        })
    }
}

pub(crate) fn key_clause(keys: &[&str]) -> String {
    keys.iter()
        .map(|k| format!("{k} = ?"))
        .collect::<Vec<_>>()
        .join(" AND ")
}

pub(crate) fn get_in<E: Record>(conn: &Connection, key: &E::Key) -> Result<Option<E>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {}",
        E::COLUMNS.join(", "),
        E::TABLE.name(),
        key_clause(E::KEY_COLUMNS)
    );
    let row = conn
        .query_row(&sql, params_from_iter(E::key_values(key)), |r| {
            E::from_row(r)
        })
        .optional()?;
    Ok(row)
}

/// `ON CONFLICT DO UPDATE` rather than `INSERT OR REPLACE`: REPLACE deletes
/// the old row first, which would fire the cascades and wipe its children.
pub(crate) fn upsert_in<E: Record>(conn: &Connection, row: &E) -> Result<()> {
    row.check()?;
    let placeholders = vec!["?"; E::COLUMNS.len()].join(", ");
    let assignments = E::COLUMNS
        .iter()
        .filter(|c| !E::KEY_COLUMNS.contains(*c))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {table}({cols}) VALUES({placeholders})
         ON CONFLICT({keys}) DO UPDATE SET {assignments}",
        table = E::TABLE.name(),
        cols = E::COLUMNS.join(", "),
        keys = E::KEY_COLUMNS.join(", "),
    );
    conn.execute(&sql, params_from_iter(row.values()))
        .map_err(|e| StoreError::from_sqlite(E::TABLE.name(), e))?;
    Ok(())
}

pub(crate) fn update_in<E: Record>(conn: &Connection, row: &E) -> Result<usize> {
    row.check()?;
    let assignments = E::COLUMNS
        .iter()
        .filter(|c| !E::KEY_COLUMNS.contains(*c))
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        E::TABLE.name(),
        assignments,
        key_clause(E::KEY_COLUMNS)
    );
    let values = row.values();
    let mut params: Vec<_> = E::COLUMNS
        .iter()
        .zip(values)
        .filter(|(c, _)| !E::KEY_COLUMNS.contains(*c))
        .map(|(_, v)| v)
        .collect();
    params.extend(E::key_values(&row.key()));
    let n = conn
        .execute(&sql, params_from_iter(params))
        .map_err(|e| StoreError::from_sqlite(E::TABLE.name(), e))?;
    Ok(n)
}

/// Holds the process-wide store. The first caller for a workspace opens it
/// under the lock; later callers get the same handle back.
#[derive(Default)]
pub struct StoreSlot {
    inner: Mutex<Option<Arc<Store>>>,
}

impl StoreSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<Store>> {
        self.guard().clone()
    }

    pub fn get_or_open(&self, workspace: &Path) -> Result<Arc<Store>> {
        let mut slot = self.guard();
        if let Some(store) = slot.as_ref() {
            if store.workspace() == Some(workspace) {
                return Ok(Arc::clone(store));
            }
        }
        let store = Arc::new(Store::open(workspace)?);
        *slot = Some(Arc::clone(&store));
        Ok(store)
    }

    /// Release the slot's handle. The file closes once every clone is dropped.
    pub fn close(&self) -> Option<Arc<Store>> {
        self.guard().take()
    }

    fn guard(&self) -> MutexGuard<'_, Option<Arc<Store>>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
