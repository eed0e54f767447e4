//! Page lock manager.
//!
//! Locks are held per transaction per page and released in bulk at commit
//! or abort (strict two-phase locking). There is no waits-for graph: a
//! request that cannot be granted before its deadline fails with
//! [`Error::LockTimeout`], and the caller aborts the transaction.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::common::config::DEFAULT_LOCK_TIMEOUT;
use crate::common::{Error, PageId, Permissions, Result, TransactionId};

/// Lock strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl From<Permissions> for LockMode {
    fn from(perm: Permissions) -> Self {
        match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "S"),
            LockMode::Exclusive => write!(f, "X"),
        }
    }
}

/// Who holds a page.
#[derive(Debug)]
enum LockState {
    Shared(HashSet<TransactionId>),
    Exclusive(TransactionId),
}

impl LockState {
    fn new(tid: TransactionId, mode: LockMode) -> Self {
        match mode {
            LockMode::Shared => LockState::Shared(HashSet::from([tid])),
            LockMode::Exclusive => LockState::Exclusive(tid),
        }
    }

    fn mode_of(&self, tid: TransactionId) -> Option<LockMode> {
        match self {
            LockState::Exclusive(owner) if *owner == tid => Some(LockMode::Exclusive),
            LockState::Shared(holders) if holders.contains(&tid) => Some(LockMode::Shared),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grant {
    Acquired,
    AlreadyHeld,
    Upgraded,
}

#[derive(Debug, Default)]
struct LockTable {
    locks: HashMap<PageId, LockState>,
    txn_pages: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTable {
    /// Grant the request if it is compatible with current holders.
    fn try_grant(&mut self, tid: TransactionId, pid: PageId, mode: LockMode) -> Option<Grant> {
        let grant = match self.locks.entry(pid) {
            Entry::Vacant(slot) => {
                slot.insert(LockState::new(tid, mode));
                Grant::Acquired
            }
            Entry::Occupied(mut slot) => {
                let grant = Self::grant_on_held(slot.get(), tid, mode)?;
                match grant {
                    Grant::Acquired => {
                        if let LockState::Shared(holders) = slot.get_mut() {
                            holders.insert(tid);
                        }
                    }
                    Grant::Upgraded => *slot.get_mut() = LockState::Exclusive(tid),
                    Grant::AlreadyHeld => {}
                }
                grant
            }
        };

        self.txn_pages.entry(tid).or_default().insert(pid);
        Some(grant)
    }

    fn grant_on_held(state: &LockState, tid: TransactionId, mode: LockMode) -> Option<Grant> {
        match (state, mode) {
            // An exclusive holder may also read.
            (LockState::Exclusive(owner), _) if *owner == tid => Some(Grant::AlreadyHeld),
            (LockState::Exclusive(_), _) => None,
            (LockState::Shared(holders), LockMode::Shared) => Some(if holders.contains(&tid) {
                Grant::AlreadyHeld
            } else {
                Grant::Acquired
            }),
            (LockState::Shared(holders), LockMode::Exclusive) => {
                if holders.len() == 1 && holders.contains(&tid) {
                    Some(Grant::Upgraded)
                } else {
                    None
                }
            }
        }
    }

    /// Drop `tid` from the holders of `pid`. Returns false if it held nothing.
    fn remove_holder(&mut self, tid: TransactionId, pid: PageId) -> bool {
        let Some(state) = self.locks.get_mut(&pid) else {
            return false;
        };

        let (removed, now_free) = match state {
            LockState::Exclusive(owner) => (*owner == tid, *owner == tid),
            LockState::Shared(holders) => {
                let removed = holders.remove(&tid);
                (removed, holders.is_empty())
            }
        };
        if now_free {
            self.locks.remove(&pid);
        }
        removed
    }
}

/// Page-level shared/exclusive lock table.
///
/// # Thread Safety
/// One `Mutex` guards the whole table; waiters park on a `Condvar` that
/// is signalled whenever any lock is released.
pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
    timeout: Duration,
    stats: LockStats,
}

impl LockManager {
    /// A lock manager with the default wait timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            released: Condvar::new(),
            timeout,
            stats: LockStats::default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Block until `tid` holds `pid` in the mode implied by `perm`.
    ///
    /// Re-requesting a lock already held is a no-op; a sole shared holder
    /// asking for `ReadWrite` is upgraded in place.
    ///
    /// # Errors
    /// `Error::LockTimeout` if the lock is not granted within the timeout.
    pub fn acquire(&self, tid: TransactionId, pid: PageId, perm: Permissions) -> Result<()> {
        let mode = LockMode::from(perm);
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut waited = false;

        let mut table = self.table.lock();
        loop {
            if let Some(grant) = table.try_grant(tid, pid, mode) {
                self.record_grant(grant, tid, pid, mode);
                return Ok(());
            }

            if !waited {
                waited = true;
                LockStats::incr(&self.stats.waits);
                trace!(%tid, %pid, %mode, "waiting for lock");
            }

            if self.released.wait_until(&mut table, deadline).timed_out() {
                if let Some(grant) = table.try_grant(tid, pid, mode) {
                    self.record_grant(grant, tid, pid, mode);
                    return Ok(());
                }

                let waited = start.elapsed();
                LockStats::incr(&self.stats.timeouts);
                warn!(%tid, %pid, %mode, ?waited, "lock wait timed out");
                return Err(Error::LockTimeout { tid, pid, waited });
            }
        }
    }

    fn record_grant(&self, grant: Grant, tid: TransactionId, pid: PageId, mode: LockMode) {
        match grant {
            Grant::Acquired => {
                LockStats::incr(&self.stats.acquisitions);
                trace!(%tid, %pid, %mode, "lock granted");
            }
            Grant::Upgraded => {
                LockStats::incr(&self.stats.upgrades);
                debug!(%tid, %pid, "lock upgraded to exclusive");
            }
            Grant::AlreadyHeld => {}
        }
    }

    /// Release one lock early. Returns whether `tid` held it.
    pub fn release(&self, tid: TransactionId, pid: PageId) -> bool {
        let mut table = self.table.lock();
        if !table.remove_holder(tid, pid) {
            return false;
        }

        if let Entry::Occupied(mut pages) = table.txn_pages.entry(tid) {
            pages.get_mut().remove(&pid);
            if pages.get().is_empty() {
                pages.remove();
            }
        }
        drop(table);

        LockStats::incr(&self.stats.releases);
        self.released.notify_all();
        true
    }

    /// Release every lock held by `tid`. Calling it again is harmless.
    ///
    /// Returns the number of locks released.
    pub fn release_all(&self, tid: TransactionId) -> usize {
        let mut table = self.table.lock();
        let Some(pages) = table.txn_pages.remove(&tid) else {
            return 0;
        };

        let released = pages
            .into_iter()
            .filter(|pid| table.remove_holder(tid, *pid))
            .count();
        drop(table);

        self.stats
            .releases
            .fetch_add(released as u64, Ordering::Relaxed);
        if released > 0 {
            debug!(%tid, released, "released all locks");
            self.released.notify_all();
        }
        released
    }

    /// Whether `tid` holds any lock on `pid`.
    pub fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_mode(tid, pid).is_some()
    }

    /// The mode in which `tid` holds `pid`, if at all.
    pub fn lock_mode(&self, tid: TransactionId, pid: PageId) -> Option<LockMode> {
        self.table.lock().locks.get(&pid)?.mode_of(tid)
    }

    /// Pages currently locked by `tid`.
    pub fn held_pages(&self, tid: TransactionId) -> Vec<PageId> {
        self.table
            .lock()
            .txn_pages
            .get(&tid)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> &LockStats {
        &self.stats
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManager")
            .field("timeout", &self.timeout)
            .field("locked_pages", &self.table.lock().locks.len())
            .finish()
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Lock manager counters, updated with `Ordering::Relaxed`.
#[derive(Debug, Default)]
pub struct LockStats {
    pub acquisitions: AtomicU64,
    /// Requests that had to block at least once.
    pub waits: AtomicU64,
    pub upgrades: AtomicU64,
    pub timeouts: AtomicU64,
    pub releases: AtomicU64,
}

impl LockStats {
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LockStatsSnapshot {
        LockStatsSnapshot {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            waits: self.waits.load(Ordering::Relaxed),
            upgrades: self.upgrades.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockStatsSnapshot {
    pub acquisitions: u64,
    pub waits: u64,
    pub upgrades: u64,
    pub timeouts: u64,
    pub releases: u64,
}
