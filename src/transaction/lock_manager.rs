use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::common::types::{Rid, TxnId};
use crate::transaction::transaction::{
    IsolationLevel, Transaction, TransactionError, TransactionState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug)]
struct LockRequest {
    txn_id: TxnId,
    mode: LockMode,
    granted: bool,
}

#[derive(Default)]
struct LockRequestQueue {
    requests: Vec<LockRequest>,
    upgrading: bool,
    cv: Arc<Condvar>,
}

#[derive(Default)]
struct LockTables {
    lock_table: HashMap<Rid, LockRequestQueue>,
    rid_exclusive: HashMap<Rid, bool>,
    waits_for: HashMap<TxnId, Vec<TxnId>>,
    tid_to_rid: HashMap<TxnId, Rid>,
}

struct LockState {
    tables: Mutex<LockTables>,
    registry: Mutex<HashMap<TxnId, Arc<Transaction>>>,
}

/// Row-level two-phase lock manager.
///
/// Requests enter a per-RID queue when granted; blocked acquirers wait on
/// the queue's condvar under the manager-wide mutex and maintain their own
/// waits-for edges while parked. A background thread periodically searches
/// the graph for cycles and aborts the youngest member of the first one
/// found, waking the queue it sleeps on.
pub struct LockManager {
    state: Arc<LockState>,
    running: Arc<AtomicBool>,
    detector: Mutex<Option<JoinHandle<()>>>,
}

impl LockManager {
    pub fn new(cycle_detection_interval: Duration) -> Self {
        let state = Arc::new(LockState {
            tables: Mutex::new(LockTables::default()),
            registry: Mutex::new(HashMap::new()),
        });
        let running = Arc::new(AtomicBool::new(true));

        let detector = {
            let state = state.clone();
            let running = running.clone();
            std::thread::spawn(move || {
                Self::run_cycle_detection(state, running, cycle_detection_interval)
            })
        };

        Self {
            state,
            running,
            detector: Mutex::new(Some(detector)),
        }
    }

    /// The detector resolves victim txn ids through this registry.
    pub fn register_transaction(&self, txn: &Arc<Transaction>) {
        self.state.registry.lock().insert(txn.id(), txn.clone());
    }

    pub fn deregister_transaction(&self, txn_id: TxnId) {
        self.state.registry.lock().remove(&txn_id);
    }

    /// Acquire a shared lock. Blocks while an upgrade is pending or an
    /// exclusive lock is held.
    pub fn lock_shared(&self, txn: &Transaction, rid: Rid) -> Result<(), TransactionError> {
        if txn.state() == TransactionState::Shrinking {
            txn.set_state(TransactionState::Aborted);
            return Err(TransactionError::LockOnShrinking(txn.id()));
        }

        let mut tables = self.state.tables.lock();
        loop {
            let upgrading = tables.lock_table.entry(rid).or_default().upgrading;
            let exclusive = tables.rid_exclusive.get(&rid).copied().unwrap_or(false);
            let blocked =
                (upgrading || exclusive) && txn.state() != TransactionState::Aborted;
            if !blocked {
                break;
            }
            let holders: Vec<TxnId> = tables.lock_table[&rid]
                .requests
                .iter()
                .filter(|r| r.granted && r.mode == LockMode::Exclusive)
                .map(|r| r.txn_id)
                .collect();
            for holder in holders {
                Self::add_edge(&mut tables, txn.id(), holder);
            }
            tables.tid_to_rid.insert(txn.id(), rid);
            let cv = tables.lock_table[&rid].cv.clone();
            cv.wait(&mut tables);
        }

        self.leave_wait(&mut tables, txn.id(), rid, LockMode::Shared);
        if txn.state() == TransactionState::Aborted {
            return Err(TransactionError::Deadlock(txn.id()));
        }

        tables
            .lock_table
            .entry(rid)
            .or_default()
            .requests
            .push(LockRequest {
                txn_id: txn.id(),
                mode: LockMode::Shared,
                granted: true,
            });
        txn.shared_lock_set().insert(rid);
        Ok(())
    }

    /// Acquire an exclusive lock. Blocks while anyone else holds the RID.
    pub fn lock_exclusive(&self, txn: &Transaction, rid: Rid) -> Result<(), TransactionError> {
        if txn.state() == TransactionState::Shrinking {
            txn.set_state(TransactionState::Aborted);
            return Err(TransactionError::LockOnShrinking(txn.id()));
        }

        let mut tables = self.state.tables.lock();
        loop {
            let queue = tables.lock_table.entry(rid).or_default();
            let blocked = (queue.upgrading || !queue.requests.is_empty())
                && txn.state() != TransactionState::Aborted;
            if !blocked {
                break;
            }
            let holders: Vec<TxnId> = queue
                .requests
                .iter()
                .filter(|r| r.granted)
                .map(|r| r.txn_id)
                .collect();
            for holder in holders {
                Self::add_edge(&mut tables, txn.id(), holder);
            }
            tables.tid_to_rid.insert(txn.id(), rid);
            let cv = tables.lock_table[&rid].cv.clone();
            cv.wait(&mut tables);
        }

        self.leave_wait(&mut tables, txn.id(), rid, LockMode::Exclusive);
        if txn.state() == TransactionState::Aborted {
            return Err(TransactionError::Deadlock(txn.id()));
        }

        tables
            .lock_table
            .entry(rid)
            .or_default()
            .requests
            .push(LockRequest {
                txn_id: txn.id(),
                mode: LockMode::Exclusive,
                granted: true,
            });
        tables.rid_exclusive.insert(rid, true);
        txn.exclusive_lock_set().insert(rid);
        Ok(())
    }

    /// Promote an already-held shared lock to exclusive. Blocks until this
    /// transaction is the queue's sole member.
    pub fn lock_upgrade(&self, txn: &Transaction, rid: Rid) -> Result<(), TransactionError> {
        if txn.state() == TransactionState::Shrinking {
            txn.set_state(TransactionState::Aborted);
            return Err(TransactionError::LockOnShrinking(txn.id()));
        }
        if !txn.is_shared_locked(&rid) {
            return Err(TransactionError::UpgradeWithoutLock(txn.id()));
        }

        let mut tables = self.state.tables.lock();
        tables.lock_table.entry(rid).or_default().upgrading = true;
        loop {
            let queue = tables.lock_table.entry(rid).or_default();
            let blocked =
                queue.requests.len() != 1 && txn.state() != TransactionState::Aborted;
            if !blocked {
                break;
            }
            let holders: Vec<TxnId> = queue
                .requests
                .iter()
                .filter(|r| r.granted && r.txn_id != txn.id())
                .map(|r| r.txn_id)
                .collect();
            for holder in holders {
                Self::add_edge(&mut tables, txn.id(), holder);
            }
            tables.tid_to_rid.insert(txn.id(), rid);
            let cv = tables.lock_table[&rid].cv.clone();
            cv.wait(&mut tables);
        }

        self.leave_wait(&mut tables, txn.id(), rid, LockMode::Exclusive);
        let queue = tables.lock_table.entry(rid).or_default();
        if txn.state() == TransactionState::Aborted {
            // do not leave the queue wedged behind a dead upgrader
            queue.upgrading = false;
            queue.cv.notify_all();
            return Err(TransactionError::Deadlock(txn.id()));
        }

        if let Some(request) = queue.requests.iter_mut().find(|r| r.txn_id == txn.id()) {
            request.mode = LockMode::Exclusive;
            request.granted = true;
        }
        queue.upgrading = false;
        tables.rid_exclusive.insert(rid, true);
        txn.shared_lock_set().remove(&rid);
        txn.exclusive_lock_set().insert(rid);
        Ok(())
    }

    /// Release a held lock. Under REPEATABLE_READ the first unlock moves
    /// the transaction into its shrinking phase.
    pub fn unlock(&self, txn: &Transaction, rid: Rid) -> bool {
        let mode = if txn.is_shared_locked(&rid) {
            LockMode::Shared
        } else if txn.is_exclusive_locked(&rid) {
            LockMode::Exclusive
        } else {
            return false;
        };

        let mut tables = self.state.tables.lock();
        let Some(queue) = tables.lock_table.get_mut(&rid) else {
            return false;
        };
        if let Some(index) = queue.requests.iter().position(|r| r.txn_id == txn.id()) {
            queue.requests.remove(index);
        }

        if txn.isolation_level() == IsolationLevel::RepeatableRead
            && txn.state() == TransactionState::Growing
        {
            txn.set_state(TransactionState::Shrinking);
        }

        match mode {
            LockMode::Shared => {
                txn.shared_lock_set().remove(&rid);
            }
            LockMode::Exclusive => {
                txn.exclusive_lock_set().remove(&rid);
                tables.rid_exclusive.insert(rid, false);
            }
        }
        tables.lock_table[&rid].cv.notify_all();
        true
    }

    /// Release everything a finished transaction still holds.
    pub fn release_all(&self, txn: &Transaction) {
        let shared: Vec<Rid> = txn.shared_lock_set().iter().copied().collect();
        let exclusive: Vec<Rid> = txn.exclusive_lock_set().iter().copied().collect();
        for rid in shared.into_iter().chain(exclusive) {
            self.unlock(txn, rid);
        }
    }

    // ---- waits-for graph --------------------------------------------------

    fn add_edge(tables: &mut LockTables, waiter: TxnId, holder: TxnId) {
        if waiter == holder {
            return;
        }
        let edges = tables.waits_for.entry(waiter).or_default();
        if !edges.contains(&holder) {
            edges.push(holder);
        }
    }

    fn remove_edge(tables: &mut LockTables, waiter: TxnId, holder: TxnId) {
        if let Some(edges) = tables.waits_for.get_mut(&waiter) {
            edges.retain(|&t| t != holder);
            if edges.is_empty() {
                tables.waits_for.remove(&waiter);
            }
        }
    }

    /// On leaving a wait (granted or aborted) the waiter retracts the edges
    /// it published against the queue's current members.
    fn leave_wait(&self, tables: &mut LockTables, txn_id: TxnId, rid: Rid, mode: LockMode) {
        let blockers: Vec<TxnId> = tables
            .lock_table
            .get(&rid)
            .map(|queue| {
                queue
                    .requests
                    .iter()
                    .filter(|r| mode == LockMode::Exclusive || r.mode == LockMode::Exclusive)
                    .map(|r| r.txn_id)
                    .collect()
            })
            .unwrap_or_default();
        for blocker in blockers {
            Self::remove_edge(tables, txn_id, blocker);
        }
        tables.waits_for.remove(&txn_id);
        tables.tid_to_rid.remove(&txn_id);
    }

    /// DFS from the smallest txn id (deterministic order); reports the
    /// youngest member of the first cycle found.
    fn find_cycle(tables: &LockTables) -> Option<TxnId> {
        if tables.waits_for.is_empty() {
            return None;
        }
        let mut roots: Vec<TxnId> = tables.waits_for.keys().copied().collect();
        roots.sort_unstable();

        let mut visited: HashSet<TxnId> = HashSet::new();
        for root in roots {
            if visited.contains(&root) {
                continue;
            }
            let mut stack: Vec<TxnId> = Vec::new();
            if let Some(victim) = Self::dfs(tables, root, &mut visited, &mut stack) {
                return Some(victim);
            }
        }
        None
    }

    fn dfs(
        tables: &LockTables,
        current: TxnId,
        visited: &mut HashSet<TxnId>,
        stack: &mut Vec<TxnId>,
    ) -> Option<TxnId> {
        visited.insert(current);
        stack.push(current);
        if let Some(edges) = tables.waits_for.get(&current) {
            for &next in edges {
                // a back edge closes a cycle: the members are the stack
                // suffix starting at the revisited transaction
                if let Some(pos) = stack.iter().position(|&t| t == next) {
                    return stack[pos..].iter().copied().max();
                }
                if !visited.contains(&next) {
                    if let Some(victim) = Self::dfs(tables, next, visited, stack) {
                        return Some(victim);
                    }
                }
            }
        }
        stack.pop();
        None
    }

    fn run_cycle_detection(
        state: Arc<LockState>,
        running: Arc<AtomicBool>,
        interval: Duration,
    ) {
        while running.load(Ordering::SeqCst) {
            std::thread::sleep(interval);
            let tables = state.tables.lock();
            let Some(victim) = Self::find_cycle(&tables) else {
                continue;
            };
            log::warn!("deadlock detected, aborting youngest transaction {}", victim);
            if let Some(txn) = state.registry.lock().get(&victim).cloned() {
                txn.set_state(TransactionState::Aborted);
            }
            if let Some(rid) = tables.tid_to_rid.get(&victim).copied() {
                if let Some(queue) = tables.lock_table.get(&rid) {
                    queue.cv.notify_all();
                }
            }
        }
    }
}

impl Drop for LockManager {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.detector.lock().take() {
            let _ = handle.join();
        }
    }
}
