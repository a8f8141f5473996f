use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use jobfeed_db::sync::models::RunStatus;

use crate::connector::{Connector, RunMode, TriggerKind};

/// On-demand work an operator can ask for between scheduled runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    RunSync,
    RunSweep,
}

impl Trigger {
    pub fn mode(&self) -> RunMode {
        match self {
            Self::RunSync => RunMode::Full,
            Self::RunSweep => RunMode::SweepOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Queued,
    /// A trigger is already waiting; this one folds into it.
    Coalesced,
}

#[derive(Debug, thiserror::Error)]
#[error("scheduler is not running")]
pub struct SchedulerStopped;

/// Cloneable sender side of the scheduler's trigger queue.
#[derive(Debug, Clone)]
pub struct TriggerHandle {
    tx: mpsc::Sender<Trigger>,
}

impl TriggerHandle {
    pub fn request(&self, trigger: Trigger) -> Result<TriggerOutcome, SchedulerStopped> {
        match self.tx.try_send(trigger) {
            Ok(()) => Ok(TriggerOutcome::Queued),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(TriggerOutcome::Coalesced),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SchedulerStopped),
        }
    }
}

/// Runs the connector on a fixed interval and on demand, never two runs at once.
pub struct Scheduler {
    connector: Arc<dyn Connector>,
    interval: Duration,
    rx: mpsc::Receiver<Trigger>,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(
        connector: Arc<dyn Connector>,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, TriggerHandle) {
        let (tx, rx) = mpsc::channel(1);
        let scheduler = Self {
            connector,
            interval,
            rx,
            shutdown,
        };
        (scheduler, TriggerHandle { tx })
    }

    /// Drive runs until shutdown is signalled, then wait for the run in flight.
    ///
    /// The first scheduled run starts immediately.
    pub async fn run(mut self) {
        tracing::info!(
            source = self.connector.source_name(),
            interval_secs = self.interval.as_secs(),
            "scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Option<JoinHandle<()>> = None;

        loop {
            let (mode, trigger) = tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => (RunMode::Full, TriggerKind::Scheduled),
                Some(requested) = self.rx.recv() => (requested.mode(), TriggerKind::Manual),
            };

            if in_flight.as_ref().is_some_and(|h| !h.is_finished()) {
                tracing::info!(
                    mode = mode.as_str(),
                    trigger = trigger.as_str(),
                    "run in progress, trigger coalesced"
                );
                continue;
            }

            in_flight = Some(tokio::spawn(execute(self.connector.clone(), mode, trigger)));
        }

        tracing::info!("scheduler stopping");
        if let Some(handle) = in_flight {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "in-flight run aborted");
            }
        }
    }
}

async fn execute(connector: Arc<dyn Connector>, mode: RunMode, trigger: TriggerKind) {
    let source = connector.source_name().to_string();
    match connector.sync(mode, trigger).await {
        Ok(result) if result.status == RunStatus::Skipped => {
            tracing::info!(source = %source, mode = mode.as_str(), "run skipped, another run holds the lock");
        }
        Ok(result) => {
            tracing::info!(
                source = %source,
                mode = mode.as_str(),
                trigger = trigger.as_str(),
                created = result.created,
                updated = result.updated,
                deleted = result.deleted,
                errors = result.errors,
                sweep_pending = result.sweep_pending,
                "run finished"
            );
        }
        Err(e) => {
            tracing::error!(
                source = %source,
                error = %e,
                retryable = e.is_retryable(),
                "run failed"
            );
        }
    }
}
