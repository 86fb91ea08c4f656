//! Per-UE Worker Pool
//!
//! Every UE key owns a serial FIFO queue drained by its own tokio task.
//! Jobs for one UE run one at a time in submission order; queues of
//! different UEs run concurrently, so a slow job only holds back its own
//! UE. A queue's task retires once the queue is empty and is respawned by
//! the next submission for that key.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use amf_ngap::{AmfUeNgapId, RanUeNgapId};
use tokio::sync::{mpsc, Notify};

use crate::context::RanNodeId;

/// Boxed job executed on a UE queue
pub type UeJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Serialization key of a UE-associated message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UeKey {
    /// Keyed by RAN node and RAN UE NGAP ID (RAN-initiated messages)
    Ran {
        ran_id: RanNodeId,
        ran_ue_ngap_id: RanUeNgapId,
    },
    /// Keyed by AMF UE NGAP ID
    Amf(AmfUeNgapId),
}

#[derive(Default)]
struct PoolState {
    queues: HashMap<UeKey, mpsc::UnboundedSender<UeJob>>,
    /// Queue tasks still running
    active: usize,
    closed: bool,
}

fn lock(state: &Mutex<PoolState>) -> MutexGuard<'_, PoolState> {
    // Jobs never run under the lock, so poisoning leaves the tables intact
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Accounts for one running queue task, also when its job panics
struct ActiveQueue {
    state: Arc<Mutex<PoolState>>,
    idle: Arc<Notify>,
}

impl Drop for ActiveQueue {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.active = state.active.saturating_sub(1);
        if state.active == 0 {
            self.idle.notify_one();
        }
    }
}

async fn run_queue(key: UeKey, mut rx: mpsc::UnboundedReceiver<UeJob>, active: ActiveQueue) {
    loop {
        while let Ok(job) = rx.try_recv() {
            job.await;
        }

        // A submission may have raced the drain; check again under the lock
        let next = {
            let mut state = lock(&active.state);
            match rx.try_recv() {
                Ok(job) => Some(job),
                Err(_) => {
                    state.queues.remove(&key);
                    None
                }
            }
        };

        match next {
            Some(job) => job.await,
            None => break,
        }
    }
    log::trace!("UE queue {:?} retired", key);
}

#[derive(Default)]
pub struct UeWorkerPool {
    state: Arc<Mutex<PoolState>>,
    idle: Arc<Notify>,
}

impl UeWorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of UE queues with pending or running jobs
    pub fn num_queues(&self) -> usize {
        lock(&self.state).active
    }

    /// Queue a job behind every earlier job with the same key. Must run
    /// inside a tokio runtime.
    pub fn submit(&self, key: UeKey, job: UeJob) {
        let mut state = lock(&self.state);
        if state.closed {
            log::warn!("UE worker pool closed, dropping job for {:?}", key);
            return;
        }

        let job = match state.queues.get(&key) {
            Some(tx) => match tx.send(job) {
                Ok(()) => return,
                // The queue task is gone (its job panicked); start over
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let (tx, rx) = mpsc::unbounded_channel::<UeJob>();
        if tx.send(job).is_err() {
            return;
        }
        state.queues.insert(key, tx);
        state.active += 1;
        drop(state);

        let active = ActiveQueue {
            state: self.state.clone(),
            idle: self.idle.clone(),
        };
        tokio::spawn(run_queue(key, rx, active));
    }

    /// Stop accepting jobs and wait until every queued job has run
    pub async fn shutdown(&self) {
        loop {
            {
                let mut state = lock(&self.state);
                state.closed = true;
                if state.active == 0 {
                    break;
                }
            }
            self.idle.notified().await;
        }
        log::info!("UE worker pool drained");
    }
}
