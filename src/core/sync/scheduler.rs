//! Periodic fan-out of fetch cycles.
//!
//! Every tick spawns one cycle per source and immediately goes back to
//! sleep, so a slow feed never delays the next tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::cycle::{CycleReport, FetchCycle};
use crate::core::feed::reader::FeedReader;
use crate::core::feed::FeedError;

pub type CycleHandle = JoinHandle<Result<CycleReport, FeedError>>;

enum SchedulerMessage {
    Shutdown,
}

/// Stops the scheduler loop. Dropping it has the same effect.
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerMessage>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stops ticking and waits for the loop to exit. Cycles that were
    /// already dispatched keep running.
    pub async fn shutdown(self) {
        let _ = self.sender.send(SchedulerMessage::Shutdown).await;
        let _ = self.task.await;
    }
}

pub struct Scheduler<R> {
    sources: Arc<[String]>,
    interval: Duration,
    cycle: FetchCycle<R>,
    in_flight: Option<Arc<[AtomicBool]>>,
}

impl<R: FeedReader> Scheduler<R> {
    pub fn new(sources: Vec<String>, interval: Duration, cycle: FetchCycle<R>) -> Self {
        Self {
            sources: sources.into(),
            interval,
            cycle,
            in_flight: None,
        }
    }

    /// When enabled, a source whose previous cycle has not finished is left
    /// out of the current tick.
    pub fn skip_in_flight(mut self, enabled: bool) -> Self {
        self.in_flight = enabled.then(|| {
            self.sources
                .iter()
                .map(|_| AtomicBool::new(false))
                .collect::<Vec<_>>()
                .into()
        });
        self
    }

    /// Spawns one cycle per source without waiting on any of them.
    pub fn dispatch(&self) -> Vec<CycleHandle> {
        let mut handles = Vec::with_capacity(self.sources.len());
        for (index, source) in self.sources.iter().enumerate() {
            let guard = match &self.in_flight {
                Some(flags) => match InFlightGuard::claim(flags, index) {
                    Some(guard) => Some(guard),
                    None => {
                        tracing::debug!(source = %source, "previous cycle still running, skipping");
                        continue;
                    }
                },
                None => None,
            };

            let cycle = self.cycle.clone();
            let source = source.clone();
            handles.push(tokio::spawn(async move {
                let _guard = guard;
                cycle.run(&source).await
            }));
        }
        handles
    }

    /// Runs until the returned handle is shut down or dropped. The first
    /// tick fires immediately.
    pub fn spawn(self) -> SchedulerHandle {
        let (sender, mut receiver) = mpsc::channel(1);

        let task = tokio::spawn(async move {
            tracing::info!(
                sources = self.sources.len(),
                interval_secs = self.interval.as_secs(),
                "scheduler started"
            );
            loop {
                let dispatched = self.dispatch().len();
                tracing::debug!(dispatched, "tick dispatched");

                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    msg = receiver.recv() => {
                        match msg {
                            Some(SchedulerMessage::Shutdown) | None => {
                                tracing::info!("scheduler stopped");
                                break;
                            }
                        }
                    }
                }
            }
        });

        SchedulerHandle { sender, task }
    }
}

struct InFlightGuard {
    flags: Arc<[AtomicBool]>,
    index: usize,
}

impl InFlightGuard {
    fn claim(flags: &Arc<[AtomicBool]>, index: usize) -> Option<Self> {
        if flags[index].swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Self {
            flags: Arc::clone(flags),
            index,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flags[self.index].store(false, Ordering::Release);
    }
}
