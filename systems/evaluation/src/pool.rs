//! Fixed-size pool of isolated replay workers.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::Instant,
};

use crate::{
    message::{CorrelationId, ReplayOutcome, ReplayTask, UnitReply},
    EvaluationError,
};

enum UnitCommand {
    Replay {
        correlation_id: CorrelationId,
        payload: Vec<u8>,
    },
    Shutdown,
}

struct ExecutionUnit {
    inbox: Sender<UnitCommand>,
    handle: Option<JoinHandle<()>>,
}

/// Worker threads that replay candidates from serialised tasks.
///
/// Units keep no state between dispatches. Every reply is funnelled through a
/// single shared channel and carries the correlation id of its task.
pub struct ExecutionPool {
    units: Vec<ExecutionUnit>,
    replies: Receiver<UnitReply>,
}

impl ExecutionPool {
    /// Spawns `size` units (at least one).
    pub fn new(size: usize) -> Result<Self, EvaluationError> {
        let size = size.max(1);
        let (outbox, replies) = mpsc::channel();
        let mut units = Vec::with_capacity(size);
        for index in 0..size {
            let (inbox, commands) = mpsc::channel();
            let outbox = outbox.clone();
            let handle = thread::Builder::new()
                .name(format!("arena-eval-{index}"))
                .spawn(move || run_unit(commands, outbox))
                .map_err(EvaluationError::Spawn)?;
            units.push(ExecutionUnit {
                inbox,
                handle: Some(handle),
            });
        }
        tracing::info!(units = size, "execution pool started");
        Ok(Self { units, replies })
    }

    /// Number of execution units.
    #[must_use]
    pub fn size(&self) -> usize {
        self.units.len()
    }

    /// Queues a task on unit `slot mod size`.
    pub(crate) fn dispatch(
        &self,
        slot: usize,
        correlation_id: CorrelationId,
        payload: Vec<u8>,
    ) -> Result<(), EvaluationError> {
        let unit = self
            .units
            .get(slot % self.units.len())
            .ok_or(EvaluationError::PoolClosed)?;
        unit.inbox
            .send(UnitCommand::Replay {
                correlation_id,
                payload,
            })
            .map_err(|_| EvaluationError::PoolClosed)
    }

    /// Waits for the next reply; `Ok(None)` means the deadline passed.
    pub(crate) fn receive(
        &self,
        deadline: Option<Instant>,
    ) -> Result<Option<UnitReply>, EvaluationError> {
        let Some(deadline) = deadline else {
            return self
                .replies
                .recv()
                .map(Some)
                .map_err(|_| EvaluationError::PoolClosed);
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.replies.recv_timeout(remaining) {
            Ok(reply) => Ok(Some(reply)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(EvaluationError::PoolClosed),
        }
    }
}

impl Drop for ExecutionPool {
    fn drop(&mut self) {
        for unit in &self.units {
            let _ = unit.inbox.send(UnitCommand::Shutdown);
        }
        for unit in &mut self.units {
            if let Some(handle) = unit.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

impl std::fmt::Debug for ExecutionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPool")
            .field("units", &self.units.len())
            .finish()
    }
}

fn run_unit(commands: Receiver<UnitCommand>, outbox: Sender<UnitReply>) {
    while let Ok(command) = commands.recv() {
        match command {
            UnitCommand::Replay {
                correlation_id,
                payload,
            } => {
                let replay = AssertUnwindSafe(|| replay_payload(&payload));
                let outcome = panic::catch_unwind(replay).unwrap_or_else(|cause| {
                    ReplayOutcome::Failed {
                        reason: panic_reason(cause.as_ref()),
                    }
                });
                // An unencodable outcome goes out empty and is rejected as malformed.
                let reply = UnitReply {
                    correlation_id,
                    payload: bincode::serialize(&outcome).unwrap_or_default(),
                };
                if outbox.send(reply).is_err() {
                    break;
                }
            }
            UnitCommand::Shutdown => break,
        }
    }
}

fn replay_payload(payload: &[u8]) -> ReplayOutcome {
    match bincode::deserialize::<ReplayTask>(payload) {
        Ok(task) => ReplayOutcome::Completed(task.run()),
        Err(err) => ReplayOutcome::Failed {
            reason: format!("undecodable task: {err}"),
        },
    }
}

fn panic_reason(cause: &(dyn Any + Send)) -> String {
    if let Some(message) = cause.downcast_ref::<&str>() {
        format!("replay panicked: {message}")
    } else if let Some(message) = cause.downcast_ref::<String>() {
        format!("replay panicked: {message}")
    } else {
        "replay panicked".to_owned()
    }
}
