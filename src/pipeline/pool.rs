//! Fixed set of worker slots: dispatch, per-task timeout, replacement, halt.

use anyhow::Result;
use crossbeam_channel::{Receiver, Select, Sender, TryRecvError, bounded};
use log::{debug, warn};
use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::messages::{BatchOutcome, WorkerReply};
use super::worker::{ConversionWorker, RetiredWorker};
use crate::codec::CodecRegistry;
use crate::history::{ConversionErrorKind, ConversionHistoryEntry, HistoryRecord};
use crate::{ConversionResult, ConversionTask, FileBlob};

/// Thread-safe handle that halts the pool. Cloneable; halting twice is a no-op.
#[derive(Clone, Debug)]
pub struct HaltHandle {
    halted: Arc<AtomicBool>,
    signal_tx: Sender<()>,
}

impl HaltHandle {
    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
        // Full means a wake-up is already pending.
        let _ = self.signal_tx.try_send(());
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}

struct InFlight {
    entry: ConversionHistoryEntry,
    deadline: Option<Instant>,
}

/// One concurrency slot: the live worker plus replaced workers still winding down.
struct Slot {
    worker: ConversionWorker,
    retired: Vec<RetiredWorker>,
}

impl Slot {
    /// Open for dispatch only once every replaced worker has exited.
    fn is_open(&self) -> bool {
        self.retired.is_empty()
    }
}

#[derive(Clone, Copy)]
enum Op {
    Reply(usize),
    Retired(usize, usize),
    Halt,
}

enum Wake {
    Reply(usize, WorkerReply),
    Disconnected(usize),
    /// A retired worker replied late or exited.
    Retired,
    Expired,
    Halt,
}

/// Results and history collected while a batch settles.
#[derive(Default)]
struct Settled {
    results: Vec<ConversionResult>,
    history: Vec<ConversionHistoryEntry>,
}

impl Settled {
    fn with_capacity(n: usize) -> Self {
        Self {
            results: Vec::with_capacity(n),
            history: Vec::with_capacity(n),
        }
    }

    fn converted(&mut self, mut entry: ConversionHistoryEntry, target: FileBlob) {
        entry.push(HistoryRecord::finish());
        entry.converted = Some(target.clone());
        self.results
            .push(ConversionResult::converted(entry.source.clone(), target));
        self.history.push(entry);
    }

    fn failed(
        &mut self,
        mut entry: ConversionHistoryEntry,
        kind: ConversionErrorKind,
        message: Option<String>,
    ) {
        entry.push(HistoryRecord::error(kind, message));
        self.results
            .push(ConversionResult::failed(entry.source.clone(), kind));
        self.history.push(entry);
    }
}

/// W slots, each running at most one conversion at any instant.
///
/// A worker that times out or is halted cannot be stopped mid-codec. It is
/// retired: its slot gets a fresh worker but takes no new task until the old
/// thread has exited. Dropping the pool detaches any threads still running.
pub struct WorkerPool {
    slots: Vec<Slot>,
    codecs: Arc<CodecRegistry>,
    next_id: u64,
    halted: Arc<AtomicBool>,
    signal_tx: Sender<()>,
    signal_rx: Receiver<()>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one).
    pub fn new(size: usize, codecs: Arc<CodecRegistry>) -> Result<Self> {
        let (signal_tx, signal_rx) = bounded(1);
        let mut pool = Self {
            slots: Vec::with_capacity(size.max(1)),
            codecs,
            next_id: 0,
            halted: Arc::new(AtomicBool::new(false)),
            signal_tx,
            signal_rx,
        };
        for _ in 0..size.max(1) {
            let worker = pool.spawn_worker()?;
            pool.slots.push(Slot {
                worker,
                retired: Vec::new(),
            });
        }
        debug!("Worker pool ready with {} slots", pool.slots.len());
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Current worker identity per slot.
    pub fn worker_ids(&self) -> Vec<u64> {
        self.slots.iter().map(|s| s.worker.id()).collect()
    }

    /// Replaced workers whose threads have not exited yet.
    pub fn draining_workers(&self) -> usize {
        self.slots.iter().map(|s| s.retired.len()).sum()
    }

    pub fn halt_handle(&self) -> HaltHandle {
        HaltHandle {
            halted: Arc::clone(&self.halted),
            signal_tx: self.signal_tx.clone(),
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Halt from the owning thread: set the flag and recreate every worker.
    pub fn halt_now(&mut self) -> Result<()> {
        self.halt_handle().halt();
        self.replace_all()
    }

    /// Clear the halted flag and any stale wake-up. Called once a halted run has settled.
    pub fn reset_halt(&mut self) {
        self.halted.store(false, Ordering::SeqCst);
        while self.signal_rx.try_recv().is_ok() {}
    }

    /// Run one batch to completion, or until a halt.
    ///
    /// At most one task per slot is outstanding, counting retired workers that
    /// are still converting. Each task yields exactly one result: the worker's
    /// reply, a timeout, or a fault. Timed out and faulted workers are replaced.
    pub fn run_batch(
        &mut self,
        tasks: Vec<ConversionTask>,
        timeout: Duration,
    ) -> Result<BatchOutcome> {
        if self.is_halted() {
            return Ok(BatchOutcome::Halted);
        }
        let mut settled = Settled::with_capacity(tasks.len());
        let mut pending: VecDeque<ConversionTask> = tasks.into();
        let mut in_flight: Vec<Option<InFlight>> = self.slots.iter().map(|_| None).collect();

        loop {
            if self.is_halted() {
                return self.abandon(in_flight.iter().flatten().count());
            }
            self.reap_retired();
            self.fill_idle_slots(&mut pending, &mut in_flight, &mut settled, timeout)?;
            if in_flight.iter().all(Option::is_none) {
                if pending.is_empty() {
                    break;
                }
                if self.draining_workers() == 0 {
                    continue;
                }
            }

            match self.wait(&in_flight) {
                Wake::Reply(slot, reply) => {
                    let Some(flight) = in_flight[slot].take() else {
                        continue;
                    };
                    match reply {
                        WorkerReply::Converted(target) => {
                            debug!("{} converted in slot {slot}", flight.entry.filename());
                            settled.converted(flight.entry, target);
                        }
                        WorkerReply::Failed(message) => {
                            debug!("{} failed: {message}", flight.entry.filename());
                            settled.failed(
                                flight.entry,
                                ConversionErrorKind::ConversionFailed,
                                Some(message),
                            );
                        }
                    }
                }
                Wake::Disconnected(slot) => {
                    if let Some(flight) = in_flight[slot].take() {
                        warn!(
                            "Worker in slot {slot} died while converting {}",
                            flight.entry.filename()
                        );
                        settled.failed(
                            flight.entry,
                            ConversionErrorKind::ConversionFailed,
                            Some("worker fault: thread exited".to_string()),
                        );
                    }
                    self.replace(slot)?;
                }
                Wake::Expired => {
                    let now = Instant::now();
                    for slot in 0..in_flight.len() {
                        let expired = in_flight[slot]
                            .as_ref()
                            .and_then(|f| f.deadline)
                            .is_some_and(|d| d <= now);
                        if !expired {
                            continue;
                        }
                        if let Some(flight) = in_flight[slot].take() {
                            warn!(
                                "{} timed out after {} ms",
                                flight.entry.filename(),
                                timeout.as_millis()
                            );
                            settled.failed(flight.entry, ConversionErrorKind::Timeout, None);
                        }
                        self.replace(slot)?;
                    }
                }
                Wake::Retired => {}
                Wake::Halt => {
                    return self.abandon(in_flight.iter().flatten().count());
                }
            }
        }

        Ok(BatchOutcome::Finished {
            results: settled.results,
            history: settled.history,
        })
    }

    /// Join retired workers that have exited, discarding their late replies.
    fn reap_retired(&mut self) {
        for slot in &mut self.slots {
            let mut running = Vec::with_capacity(slot.retired.len());
            for retired in slot.retired.drain(..) {
                if still_running(&retired) {
                    running.push(retired);
                } else {
                    debug!("Retired worker {} exited", retired.id());
                    retired.join();
                }
            }
            slot.retired = running;
        }
    }

    /// Dispatch pending tasks to idle open slots, in slot order.
    fn fill_idle_slots(
        &mut self,
        pending: &mut VecDeque<ConversionTask>,
        in_flight: &mut [Option<InFlight>],
        settled: &mut Settled,
        timeout: Duration,
    ) -> Result<()> {
        for slot in 0..self.slots.len() {
            if in_flight[slot].is_some() || !self.slots[slot].is_open() {
                continue;
            }
            let Some(task) = pending.pop_front() else {
                break;
            };
            let entry = ConversionHistoryEntry::begun(task.source.clone());
            let deadline = Instant::now().checked_add(timeout);
            match self.slots[slot].worker.dispatch(task) {
                Ok(()) => {
                    debug!(
                        "Dispatched {} to worker {} (slot {slot})",
                        entry.filename(),
                        self.slots[slot].worker.id()
                    );
                    in_flight[slot] = Some(InFlight { entry, deadline });
                }
                Err(e) => {
                    warn!("{e}");
                    settled.failed(
                        entry,
                        ConversionErrorKind::ConversionFailed,
                        Some(format!("worker fault: {e}")),
                    );
                    self.replace(slot)?;
                }
            }
        }
        Ok(())
    }

    /// Block until a reply, a retired worker event, a deadline or a halt signal.
    fn wait(&self, in_flight: &[Option<InFlight>]) -> Wake {
        let mut sel = Select::new();
        let mut ops = Vec::with_capacity(in_flight.len() + 1);
        for (slot, flight) in in_flight.iter().enumerate() {
            if flight.is_some() {
                sel.recv(self.slots[slot].worker.replies());
                ops.push(Op::Reply(slot));
            }
            for (i, retired) in self.slots[slot].retired.iter().enumerate() {
                sel.recv(retired.replies());
                ops.push(Op::Retired(slot, i));
            }
        }
        sel.recv(&self.signal_rx);
        ops.push(Op::Halt);
        let earliest = in_flight.iter().flatten().filter_map(|f| f.deadline).min();

        let oper = match earliest {
            Some(deadline) => match sel.select_deadline(deadline) {
                Ok(oper) => oper,
                Err(_) => return Wake::Expired,
            },
            None => sel.select(),
        };
        match ops[oper.index()] {
            Op::Halt => {
                let _ = oper.recv(&self.signal_rx);
                Wake::Halt
            }
            Op::Reply(slot) => match oper.recv(self.slots[slot].worker.replies()) {
                Ok(reply) => Wake::Reply(slot, reply),
                Err(_) => Wake::Disconnected(slot),
            },
            Op::Retired(slot, i) => {
                let retired = &self.slots[slot].retired[i];
                if oper.recv(retired.replies()).is_ok() {
                    debug!("Discarded late reply from retired worker {}", retired.id());
                }
                Wake::Retired
            }
        }
    }

    /// Drop every in-flight wait and the batch's history; recreate all workers.
    fn abandon(&mut self, in_flight: usize) -> Result<BatchOutcome> {
        warn!("Halting pool; abandoning {in_flight} in-flight conversions");
        self.replace_all()?;
        Ok(BatchOutcome::Halted)
    }

    fn spawn_worker(&mut self) -> Result<ConversionWorker> {
        let id = self.next_id;
        self.next_id += 1;
        ConversionWorker::spawn(id, Arc::clone(&self.codecs))
    }

    /// Give the slot a fresh worker and retire the old one.
    fn replace(&mut self, slot: usize) -> Result<()> {
        let fresh = self.spawn_worker()?;
        let old = mem::replace(&mut self.slots[slot].worker, fresh);
        debug!(
            "Replaced worker {} with {} in slot {slot}",
            old.id(),
            self.slots[slot].worker.id()
        );
        self.slots[slot].retired.push(old.retire());
        Ok(())
    }

    fn replace_all(&mut self) -> Result<()> {
        for slot in 0..self.slots.len() {
            self.replace(slot)?;
        }
        Ok(())
    }
}

/// Drain late replies; false once the retired thread has exited.
fn still_running(retired: &RetiredWorker) -> bool {
    loop {
        match retired.replies().try_recv() {
            Ok(_) => debug!("Discarded late reply from retired worker {}", retired.id()),
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Disconnected) => return false,
        }
    }
}
