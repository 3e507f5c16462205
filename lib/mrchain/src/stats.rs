use serde::Serialize;
use tracing::info;

/// Counters for one executed stage.
#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageStats {
    pub stage: usize,
    pub partitions: usize,
    pub reducers: usize,
    pub records_in: u64,
    /// Records skipped as malformed by the mapper.
    pub malformed: u64,
    pub map_emitted: u64,
    /// Pairs leaving the map side after combining (equals `map_emitted` without a combiner).
    pub combine_out: u64,
    pub groups: u64,
    pub reduce_emitted: u64,
    pub map_ms: u64,
    pub reduce_ms: u64,
    pub wall_ms: u64,
}

/// Per-map-task counters, folded into [`StageStats`] after the barrier.
#[derive(Default, Clone, Debug)]
pub(crate) struct MapTaskStats {
    pub records_in: u64,
    pub malformed: u64,
    pub emitted: u64,
    pub combine_out: u64,
}

#[derive(Default, Clone, Debug)]
pub(crate) struct ReduceTaskStats {
    pub groups: u64,
    pub emitted: u64,
}

impl StageStats {
    pub(crate) fn record_map(&mut self, per_task: &[MapTaskStats], wall_ms: u64) {
        self.records_in = per_task.iter().map(|t| t.records_in).sum();
        self.malformed = per_task.iter().map(|t| t.malformed).sum();
        self.map_emitted = per_task.iter().map(|t| t.emitted).sum();
        self.combine_out = per_task.iter().map(|t| t.combine_out).sum();
        self.map_ms = wall_ms;
        info!(
            stage = self.stage,
            phase = "map",
            tasks = per_task.len(),
            records_in = self.records_in,
            malformed = self.malformed,
            emitted = self.map_emitted,
            combine_out = self.combine_out,
            wall_ms,
            "Map phase complete"
        );
    }

    pub(crate) fn record_reduce(&mut self, per_task: &[ReduceTaskStats], wall_ms: u64) {
        self.groups = per_task.iter().map(|t| t.groups).sum();
        self.reduce_emitted = per_task.iter().map(|t| t.emitted).sum();
        self.reduce_ms = wall_ms;
        info!(
            stage = self.stage,
            phase = "reduce",
            reducers = per_task.len(),
            groups = self.groups,
            emitted = self.reduce_emitted,
            wall_ms,
            "Reduce phase complete"
        );
    }
}

/// Totals over every stage of a job.
#[derive(Default, Clone, Debug, Serialize)]
pub struct JobStats {
    pub stages: Vec<StageStats>,
}

impl JobStats {
    pub fn malformed(&self) -> u64 {
        self.stages.iter().map(|s| s.malformed).sum()
    }

    pub fn wall_ms(&self) -> u64 {
        self.stages.iter().map(|s| s.wall_ms).sum()
    }
}
