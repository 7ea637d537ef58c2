//! Change notification for committed writes.
//!
//! Two contracts are offered: push (a [`Subscription`] receives one [`Change`]
//! per committed mutation of a table it asked for) and poll (per-table version
//! counters that only ever grow). Both are fed after the transaction commits,
//! so observers never see a partially applied cascade.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

use crate::models::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Upsert,
    Update,
    Delete,
    /// Rows removed because a parent row was deleted.
    Cascade,
    /// A row was written from the remote store.
    Remote,
    /// Only the sync flag moved.
    Synced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub table: Table,
    pub kind: ChangeKind,
    /// Table version after this change.
    pub version: u64,
}

struct Subscriber {
    tables: Vec<Table>,
    tx: Sender<Change>,
}

impl Subscriber {
    fn wants(&self, table: Table) -> bool {
        self.tables.is_empty() || self.tables.contains(&table)
    }
}

#[derive(Default)]
pub struct ChangeHub {
    versions: [AtomicU64; 6],
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty `tables` slice subscribes to every table.
    pub fn subscribe(&self, tables: &[Table]) -> Subscription {
        let (tx, rx) = mpsc::channel();
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subs.push(Subscriber {
            tables: tables.to_vec(),
            tx,
        });
        Subscription { rx }
    }

    pub fn publish(&self, table: Table, kind: ChangeKind) {
        let version = self.versions[table.index()].fetch_add(1, Ordering::AcqRel) + 1;
        let change = Change {
            table,
            kind,
            version,
        };
        let mut subs = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Dropped receivers fall out here.
        subs.retain(|s| !s.wants(table) || s.tx.send(change.clone()).is_ok());
    }

    pub fn version(&self, table: Table) -> u64 {
        self.versions[table.index()].load(Ordering::Acquire)
    }

    pub fn versions(&self) -> Vec<(Table, u64)> {
        Table::ALL.iter().map(|t| (*t, self.version(*t))).collect()
    }
}

/// Receiving end of [`ChangeHub::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    rx: Receiver<Change>,
}

impl Subscription {
    pub fn try_next(&self) -> Option<Change> {
        match self.rx.try_recv() {
            Ok(c) => Some(c),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<Change> {
        match self.rx.recv_timeout(timeout) {
            Ok(c) => Some(c),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything queued so far, without blocking.
    pub fn drain(&self) -> Vec<Change> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
