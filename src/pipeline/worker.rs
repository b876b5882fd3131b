use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::{debug, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::messages::WorkerReply;
use crate::ConversionTask;
use crate::codec::CodecRegistry;
use crate::utils::config::{PackagePaths, PoolConsts};

/// One isolated conversion thread with its own request/reply channel pair.
///
/// Dropping the worker severs both channels and detaches the thread. The pool
/// [`retire`](Self::retire)s workers instead so it can tell when they are gone.
pub struct ConversionWorker {
    id: u64,
    request_tx: Sender<ConversionTask>,
    reply_rx: Receiver<WorkerReply>,
    handle: JoinHandle<()>,
}

impl ConversionWorker {
    pub fn spawn(id: u64, codecs: Arc<CodecRegistry>) -> Result<Self> {
        let (request_tx, request_rx) = bounded(PoolConsts::REQUEST_CHANNEL_CAP);
        let (reply_tx, reply_rx) = unbounded();
        let name = PackagePaths::get().worker_thread_name(id);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(request_rx, reply_tx, codecs))
            .with_context(|| format!("Failed to spawn conversion worker {name}"))?;
        debug!("Spawned {name}");
        Ok(Self {
            id,
            request_tx,
            reply_rx,
            handle,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Hand a task to the worker. Fails only if the worker thread is gone.
    pub fn dispatch(&self, task: ConversionTask) -> Result<()> {
        self.request_tx
            .send(task)
            .map_err(|_| anyhow::anyhow!("conversion worker {} is not running", self.id))
    }

    pub fn replies(&self) -> &Receiver<WorkerReply> {
        &self.reply_rx
    }

    /// Stop taking work. The thread finishes any codec call in progress, sends
    /// a reply nobody reads, then exits and closes its reply channel.
    pub fn retire(self) -> RetiredWorker {
        let Self {
            id,
            request_tx,
            reply_rx,
            handle,
        } = self;
        drop(request_tx);
        RetiredWorker {
            id,
            reply_rx,
            handle,
        }
    }
}

/// A replaced worker whose thread may still be inside a codec call.
///
/// Its slot stays closed to new work until the reply channel disconnects, so
/// running conversions never outnumber the slots.
pub struct RetiredWorker {
    id: u64,
    reply_rx: Receiver<WorkerReply>,
    handle: JoinHandle<()>,
}

impl RetiredWorker {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Late replies arrive here and are discarded; disconnection means the thread exited.
    pub fn replies(&self) -> &Receiver<WorkerReply> {
        &self.reply_rx
    }

    /// Join the exited thread.
    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("Conversion worker {} exited by panic", self.id);
        }
    }
}

/// Convert each received task and reply. Exits when either channel closes.
fn worker_loop(
    request_rx: Receiver<ConversionTask>,
    reply_tx: Sender<WorkerReply>,
    codecs: Arc<CodecRegistry>,
) {
    while let Ok(task) = request_rx.recv() {
        let reply = convert_isolated(&codecs, &task);
        if reply_tx.send(reply).is_err() {
            break;
        }
    }
}

fn convert_isolated(codecs: &CodecRegistry, task: &ConversionTask) -> WorkerReply {
    let Some(codec) = codecs.get(&task.target_format) else {
        return WorkerReply::Failed(format!("no codec for {}", task.target_format));
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        codec.convert(&task.source, &task.target_format)
    }));
    match outcome {
        Ok(Ok(target)) => WorkerReply::Converted(target),
        Ok(Err(e)) => WorkerReply::Failed(format!("{e:#}")),
        Err(_) => WorkerReply::Failed("worker fault: codec panicked".to_string()),
    }
}
