//! Bookkeeping for an external synchronizer.
//!
//! The store never talks to the remote side. It hands out dirty rows
//! (`pending_of`), accepts push acknowledgements (`mark_synced`) and applies
//! pulled rows under last-writer-wins on `last_modified` (`apply_remote`).

use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::Serialize;
use tracing::{debug, warn};

use crate::changes::ChangeKind;
use crate::error::{Result, StoreError};
use crate::models::{Record, Table};
use crate::store::{get_in, key_clause, upsert_in, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum RemoteOutcome {
    /// The row was absent locally or the remote copy was newer.
    Applied,
    /// The local row is newer and was kept; it is still pending and should be pushed.
    #[serde(rename_all = "camelCase")]
    LocalNewer { local_last_modified: i64 },
    /// Same stamp on both sides. The local copy was kept, and marked synced if
    /// it matched the remote one.
    Unchanged { confirmed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCount {
    pub table: Table,
    pub count: i64,
}

impl Store {
    /// Rows still waiting to be pushed, in primary-key order.
    pub fn pending_of<E: Record>(&self) -> Result<Vec<E>> {
        self.list_unsynced::<E>()
    }

    /// Acknowledge a push of the row with `key` as it looked at
    /// `seen_last_modified`. Returns false, and leaves the row pending, when the
    /// row changed (or vanished) after the synchronizer read it.
    pub fn mark_synced<E: Record>(&self, key: &E::Key, seen_last_modified: i64) -> Result<bool> {
        self.write(|tx| {
            let sql = format!(
                "UPDATE {} SET synced_to_cloud = 1 WHERE {} AND last_modified = ?",
                E::TABLE.name(),
                key_clause(E::KEY_COLUMNS)
            );
            let mut params = E::key_values(key);
            params.push(Value::Integer(seen_last_modified));
            let n = tx
                .execute(&sql, params_from_iter(params))
                .map_err(|e| StoreError::from_sqlite(E::TABLE.name(), e))?;
            if n == 0 {
                warn!(
                    table = %E::TABLE,
                    key = ?key,
                    seen_last_modified,
                    "stale sync acknowledgement ignored"
                );
                return Ok((false, Vec::new()));
            }
            debug!(table = %E::TABLE, key = ?key, "marked synced");
            Ok((true, vec![(E::TABLE, ChangeKind::Synced)]))
        })
    }

    /// Apply a row pulled from the remote store.
    ///
    /// Comparison and write happen in one transaction, so a local edit cannot
    /// slip in between. Equal stamps keep the local copy.
    pub fn apply_remote<E: Record>(&self, remote: &E) -> Result<RemoteOutcome> {
        let mut incoming = remote.clone();
        incoming.set_sync_state(remote.last_modified(), true);
        let remote_lm = incoming.last_modified();

        let outcome = self.write(|tx| {
            let local = get_in::<E>(tx, &incoming.key())?;
            match local {
                Some(local) if local.last_modified() > remote_lm => {
                    warn!(
                        table = %E::TABLE,
                        key = ?local.key(),
                        local = local.last_modified(),
                        remote = remote_lm,
                        "remote row older than local copy; keeping local"
                    );
                    Ok((
                        RemoteOutcome::LocalNewer {
                            local_last_modified: local.last_modified(),
                        },
                        Vec::new(),
                    ))
                }
                Some(local) if local.last_modified() == remote_lm => {
                    let mut as_synced = local.clone();
                    as_synced.set_sync_state(remote_lm, true);
                    if as_synced != incoming {
                        warn!(
                            table = %E::TABLE,
                            key = ?local.key(),
                            "remote row differs at equal stamp; keeping local"
                        );
                        return Ok((RemoteOutcome::Unchanged { confirmed: false }, Vec::new()));
                    }
                    if local.synced_to_cloud() {
                        return Ok((RemoteOutcome::Unchanged { confirmed: true }, Vec::new()));
                    }
                    upsert_in(tx, &as_synced)?;
                    Ok((
                        RemoteOutcome::Unchanged { confirmed: true },
                        vec![(E::TABLE, ChangeKind::Synced)],
                    ))
                }
                _ => {
                    upsert_in(tx, &incoming)?;
                    debug!(table = %E::TABLE, key = ?incoming.key(), "applied remote row");
                    Ok((RemoteOutcome::Applied, vec![(E::TABLE, ChangeKind::Remote)]))
                }
            }
        })?;
        self.clock().observe(remote_lm);
        Ok(outcome)
    }

    /// Dirty-row counts for every table, in dependency order.
    pub fn pending_counts(&self) -> Result<Vec<PendingCount>> {
        self.read(|conn| {
            let mut out = Vec::with_capacity(Table::ALL.len());
            for table in Table::ALL {
                let count = conn.query_row(
                    &format!(
                        "SELECT COUNT(*) FROM {} WHERE synced_to_cloud = 0",
                        table.name()
                    ),
                    [],
                    |r| r.get(0),
                )?;
                out.push(PendingCount { table, count });
            }
            Ok(out)
        })
    }
}
