#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Concurrent fan-out/fan-in evaluation of candidate parameter sets.
//!
//! The [`EvaluationCoordinator`] owns an [`ExecutionPool`] created once at
//! startup. Each call to [`EvaluationCoordinator::evaluate`] serialises one
//! task per candidate, dispatches them round-robin, waits for every reply and
//! only then ranks the batch. Ranking is a stable sort on fitness over the
//! dispatch order, so the outcome never depends on which unit answered first.

mod device;
mod message;
mod pool;

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use adaptive_arena_core::{
    AdaptationSummary, CandidateResult, ParameterSet, Snapshot, SUMMARY_CHANGE_LIMIT,
};
use adaptive_arena_system_population::Candidate;
use thiserror::Error;

pub use device::DeviceProfile;
pub use message::{CorrelationId, ReplaySettings};
pub use pool::ExecutionPool;

use message::{ReplayOutcome, ReplayTask, UnitReply};

/// Fairness threshold applied when none is configured.
pub const DEFAULT_FAIRNESS_MAX: f64 = 0.02;

/// Failures that abort an evaluation batch.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// A batch must contain at least one candidate.
    #[error("evaluation batch is empty")]
    EmptyBatch,
    /// An execution unit thread could not be started.
    #[error("failed to spawn execution unit: {0}")]
    Spawn(#[source] std::io::Error),
    /// Every execution unit has stopped.
    #[error("execution pool is closed")]
    PoolClosed,
    /// A task could not be serialised for dispatch.
    #[error("failed to encode replay task: {0}")]
    Encode(#[source] bincode::Error),
    /// A unit reply could not be decoded.
    #[error("malformed reply from execution unit: {0}")]
    MalformedReply(#[source] bincode::Error),
    /// A unit reported that its replay failed.
    #[error("replay {correlation_id} failed: {reason}")]
    UnitFailed {
        /// Task whose replay failed.
        correlation_id: CorrelationId,
        /// Failure reported by the unit.
        reason: String,
    },
    /// The batch deadline passed before every reply arrived.
    #[error("evaluation timed out with {outstanding} replies outstanding")]
    Timeout {
        /// Replies still missing at the deadline.
        outstanding: usize,
    },
}

/// Settings read by the coordinator for each batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EvaluationSettings {
    /// Settings shipped to every execution unit.
    pub replay: ReplaySettings,
    /// Largest fairness value a winner may carry when any candidate qualifies.
    pub fairness_max: f64,
    /// Optional per-batch deadline; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            replay: ReplaySettings::default(),
            fairness_max: DEFAULT_FAIRNESS_MAX,
            timeout: None,
        }
    }
}

/// Ranked results of one resolved batch.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationOutcome {
    ranked: Vec<CandidateResult>,
    winner: CandidateResult,
    summary: AdaptationSummary,
}

impl EvaluationOutcome {
    /// Every result, highest fitness first.
    #[must_use]
    pub fn ranked(&self) -> &[CandidateResult] {
        &self.ranked
    }

    /// Fairness-gated winner of the batch.
    #[must_use]
    pub const fn winner(&self) -> &CandidateResult {
        &self.winner
    }

    /// Largest weight changes between the base set and the winner.
    #[must_use]
    pub const fn summary(&self) -> &AdaptationSummary {
        &self.summary
    }
}

/// Highest-ranked result within the fairness threshold, or the top result if none qualifies.
///
/// `ranked` must already be ordered by descending fitness.
#[must_use]
pub fn select_winner(ranked: &[CandidateResult], fairness_max: f64) -> Option<&CandidateResult> {
    ranked
        .iter()
        .find(|result| result.fairness <= fairness_max)
        .or_else(|| ranked.first())
}

/// Dispatches candidate replays to the pool and ranks the replies.
#[derive(Debug)]
pub struct EvaluationCoordinator {
    pool: ExecutionPool,
    settings: EvaluationSettings,
    next_id: CorrelationId,
}

impl EvaluationCoordinator {
    /// Takes ownership of the pool for the lifetime of the process.
    #[must_use]
    pub fn new(pool: ExecutionPool, settings: EvaluationSettings) -> Self {
        Self {
            pool,
            settings,
            next_id: CorrelationId::new(1),
        }
    }

    /// Settings applied to the next batch.
    #[must_use]
    pub const fn settings(&self) -> &EvaluationSettings {
        &self.settings
    }

    /// Replaces the settings applied to subsequent batches.
    pub fn set_settings(&mut self, settings: EvaluationSettings) {
        self.settings = settings;
    }

    /// Number of execution units serving the coordinator.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    /// Replays every candidate against the snapshot and ranks them.
    ///
    /// Candidate `i` runs on unit `i mod pool_size`. The call returns once all
    /// replies are in, the first unit failure is seen, or the configured
    /// deadline passes.
    pub fn evaluate(
        &mut self,
        snapshot: &Snapshot,
        base: &ParameterSet,
        candidates: Vec<Candidate>,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        if candidates.is_empty() {
            return Err(EvaluationError::EmptyBatch);
        }
        let count = candidates.len();
        tracing::info!(
            candidates = count,
            units = self.pool.size(),
            seed = snapshot.seed(),
            "dispatching evaluation batch"
        );

        let mut pending = HashMap::with_capacity(count);
        for (index, candidate) in candidates.into_iter().enumerate() {
            let task = ReplayTask {
                snapshot: snapshot.clone(),
                parameters: candidate.parameters,
                perturbation: candidate.perturbation,
                settings: self.settings.replay,
            };
            let payload = bincode::serialize(&task).map_err(EvaluationError::Encode)?;
            let correlation_id = self.allocate_id();
            self.pool.dispatch(index, correlation_id, payload)?;
            let _ = pending.insert(correlation_id, index);
        }

        let deadline = self.settings.timeout.map(|timeout| Instant::now() + timeout);
        let mut ranked = self.collect(pending, count, deadline)?;
        ranked.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));

        let winner = select_winner(&ranked, self.settings.fairness_max)
            .cloned()
            .ok_or(EvaluationError::EmptyBatch)?;
        let summary = AdaptationSummary::between(base, &winner.parameters, SUMMARY_CHANGE_LIMIT);
        tracing::info!(
            best = ranked.first().map_or(f64::NAN, |result| result.fitness),
            winner = winner.fitness,
            fairness = winner.fairness,
            "evaluation batch resolved"
        );
        Ok(EvaluationOutcome {
            ranked,
            winner,
            summary,
        })
    }

    fn allocate_id(&mut self) -> CorrelationId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    /// Gathers replies until `pending` is empty; results keep dispatch order.
    fn collect(
        &self,
        pending: HashMap<CorrelationId, usize>,
        count: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<CandidateResult>, EvaluationError> {
        let mut batch = Batch::new(pending, count);
        while !batch.is_complete() {
            let Some(reply) = self.pool.receive(deadline)? else {
                let outstanding = batch.outstanding();
                tracing::warn!(outstanding, "evaluation batch timed out");
                return Err(EvaluationError::Timeout { outstanding });
            };
            batch.accept(&reply)?;
        }
        Ok(batch.into_results())
    }
}

/// Replies gathered so far for one dispatched batch.
struct Batch {
    pending: HashMap<CorrelationId, usize>,
    slots: Vec<Option<CandidateResult>>,
}

impl Batch {
    fn new(pending: HashMap<CorrelationId, usize>, count: usize) -> Self {
        Self {
            pending,
            slots: vec![None; count],
        }
    }

    fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Records one reply. Replies for ids outside the batch are dropped unread,
    /// so a stale or garbled answer to an earlier batch cannot fail this one.
    fn accept(&mut self, reply: &UnitReply) -> Result<(), EvaluationError> {
        let Some(&index) = self.pending.get(&reply.correlation_id) else {
            tracing::debug!(id = %reply.correlation_id, "discarding unmatched reply");
            return Ok(());
        };
        let outcome = reply.decode().map_err(EvaluationError::MalformedReply)?;
        let _ = self.pending.remove(&reply.correlation_id);
        match outcome {
            ReplayOutcome::Completed(result) => {
                if let Some(slot) = self.slots.get_mut(index) {
                    *slot = Some(result);
                }
                Ok(())
            }
            ReplayOutcome::Failed { reason } => {
                tracing::warn!(id = %reply.correlation_id, %reason, "replay failed");
                Err(EvaluationError::UnitFailed {
                    correlation_id: reply.correlation_id,
                    reason,
                })
            }
        }
    }

    fn into_results(self) -> Vec<CandidateResult> {
        self.slots.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptive_arena_core::{
        Archetype, ArenaLayout, DVec2, EnemyState, PerformanceLog, PlayerState, Rule,
        WorldBounds,
    };

    fn result(fitness: f64, fairness: f64) -> CandidateResult {
        CandidateResult {
            parameters: ParameterSet::new(vec![Rule::new("Approach", fitness.abs(), 0.25)]),
            fitness,
            fairness,
            log: PerformanceLog::default(),
            perturbation: None,
        }
    }

    fn coordinator(timeout: Option<Duration>) -> EvaluationCoordinator {
        let settings = EvaluationSettings {
            timeout,
            ..EvaluationSettings::default()
        };
        EvaluationCoordinator::new(ExecutionPool::new(2).expect("pool"), settings)
    }

    #[test]
    fn winner_skips_unfair_leaders() {
        let ranked = vec![result(3.0, 0.5), result(2.0, 0.01), result(1.0, 0.0)];
        let winner = select_winner(&ranked, 0.02).expect("winner");
        assert_eq!(winner.fitness, 2.0);
    }

    #[test]
    fn winner_falls_back_to_top_when_nothing_is_fair() {
        let ranked = vec![result(3.0, 0.5), result(2.0, 0.4)];
        assert_eq!(select_winner(&ranked, 0.02).expect("winner").fitness, 3.0);
        assert!(select_winner(&[], 0.02).is_none());
    }

    #[test]
    fn empty_batches_are_rejected() {
        let layout = ArenaLayout {
            seed: 1,
            bounds: WorldBounds::new(100.0, 100.0),
            hazards: Vec::new(),
            obstacles: Vec::new(),
        };
        let enemy = EnemyState::new(DVec2::ONE, Archetype::Grunt, ParameterSet::default());
        let player = PlayerState::new(DVec2::ZERO);
        let snapshot = Snapshot::new(layout, player, enemy, Vec::new(), 1, 0.01);
        let outcome = coordinator(None).evaluate(&snapshot, &ParameterSet::default(), Vec::new());
        assert!(matches!(outcome, Err(EvaluationError::EmptyBatch)));
    }

    #[test]
    fn unit_failure_fails_the_batch() {
        let coordinator = coordinator(None);
        let id = CorrelationId::new(90);
        coordinator.pool.dispatch(0, id, vec![1, 2, 3]).expect("dispatch");
        let pending = HashMap::from([(id, 0)]);
        let err = coordinator.collect(pending, 1, None).unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::UnitFailed { correlation_id, .. } if correlation_id == id
        ));
    }

    #[test]
    fn missing_replies_time_out() {
        let coordinator = coordinator(Some(Duration::from_millis(20)));
        let pending = HashMap::from([(CorrelationId::new(5), 0), (CorrelationId::new(6), 1)]);
        let deadline = Some(Instant::now() + Duration::from_millis(20));
        let err = coordinator.collect(pending, 2, deadline).unwrap_err();
        assert!(matches!(err, EvaluationError::Timeout { outstanding: 2 }));
    }

    #[test]
    fn unmatched_failures_are_discarded() {
        let coordinator = coordinator(Some(Duration::from_millis(50)));
        let stray = CorrelationId::new(1_000);
        coordinator.pool.dispatch(0, stray, vec![9]).expect("dispatch");
        let deadline = Some(Instant::now() + Duration::from_millis(50));
        let err = coordinator
            .collect(HashMap::from([(CorrelationId::new(1), 0)]), 1, deadline)
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Timeout { outstanding: 1 }));
    }

    fn reply(id: u64, outcome: &ReplayOutcome) -> UnitReply {
        UnitReply {
            correlation_id: CorrelationId::new(id),
            payload: bincode::serialize(outcome).expect("encode outcome"),
        }
    }

    #[test]
    fn garbled_stale_replies_do_not_fail_the_batch() {
        let mut batch = Batch::new(HashMap::from([(CorrelationId::new(2), 0)]), 1);
        let stale = UnitReply {
            correlation_id: CorrelationId::new(1),
            payload: vec![0xde, 0xad],
        };
        batch.accept(&stale).expect("stale reply is ignored");
        assert_eq!(batch.outstanding(), 1);

        batch
            .accept(&reply(2, &ReplayOutcome::Completed(result(1.5, 0.0))))
            .expect("matched reply");
        assert!(batch.is_complete());
        let results = batch.into_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].fitness, 1.5);
    }

    #[test]
    fn garbled_replies_for_the_batch_are_malformed() {
        let mut batch = Batch::new(HashMap::from([(CorrelationId::new(2), 0)]), 1);
        let garbled = UnitReply {
            correlation_id: CorrelationId::new(2),
            payload: vec![0xff; 4],
        };
        let err = batch.accept(&garbled).unwrap_err();
        assert!(matches!(err, EvaluationError::MalformedReply(_)));
    }

    #[test]
    fn correlation_ids_are_never_reused() {
        let mut coordinator = coordinator(None);
        let first = coordinator.allocate_id();
        let second = coordinator.allocate_id();
        assert!(second > first);
    }
}
