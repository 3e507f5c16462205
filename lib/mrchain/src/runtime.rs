use crate::api::{Combiner, MalformedRecord, Mapper, Reducer};
use crate::config::EngineConfig;
use crate::error::JobError;
use crate::stage::{Job, JobOutput, Stage, StagePlan};
use crate::stats::{JobStats, MapTaskStats, ReduceTaskStats, StageStats};
use crate::utils::{describe_key, hash_to_partition};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Pairs produced by one stage, in reduce-bucket order then key order.
#[derive(Debug)]
pub struct StageOutput<K, V> {
    pub pairs: Vec<(K, V)>,
    pub stats: StageStats,
}

/// Map-side output of one partition: pairs already routed to reduce buckets.
type Buckets<K, V> = Vec<Vec<(K, V)>>;

/// Runs stages on a fixed-size worker pool: parallel map per partition,
/// optional local combine, hash shuffle, barrier, then parallel reduce per bucket.
pub struct Engine {
    config: EngineConfig,
    pool: rayon::ThreadPool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, JobError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("mrchain-worker-{}", i))
            .build()?;
        info!(
            threads = config.threads,
            partitions = config.partitions,
            reducers = config.reducers,
            use_combiners = config.use_combiners,
            "Engine ready"
        );
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs every stage of `job` in order, feeding each stage's output to the next.
    /// Stops at the first failing stage.
    pub fn run_job<P, I>(&self, job: &Job<P>, source: I) -> Result<JobOutput<P::Out>, JobError>
    where
        P: StagePlan,
        I: IntoIterator<Item = P::In>,
    {
        let records: Vec<P::In> = source.into_iter().collect();
        let job_start = Instant::now();
        info!(job = job.name(), stages = job.stage_count(), records = records.len(), "Job starting");
        let mut stages = Vec::with_capacity(job.stage_count());
        match job.plan().execute(self, 1, records, &mut stages) {
            Ok(pairs) => {
                info!(
                    job = job.name(),
                    output = pairs.len(),
                    wall_ms = job_start.elapsed().as_millis() as u64,
                    "Job complete"
                );
                Ok(JobOutput { pairs, stats: JobStats { stages } })
            }
            Err(e) => {
                error!(job = job.name(), completed_stages = stages.len(), "Job failed: {}", e);
                Err(e)
            }
        }
    }

    /// Executes a single stage over `records`. `stage_index` is only used to label
    /// stats and errors.
    pub fn run_stage<M, C, R>(
        &self,
        stage_index: usize,
        stage: &Stage<M, C, R>,
        records: Vec<M::Input>,
    ) -> Result<StageOutput<R::KeyOut, R::ValueOut>, JobError>
    where
        M: Mapper,
        C: Combiner<Key = M::Key, Value = M::Value>,
        R: Reducer<Key = M::Key, ValueIn = M::Value>,
    {
        let stage_start = Instant::now();
        let reducers = self.config.reducers;
        let combiner = if self.config.use_combiners { stage.combiner.as_ref() } else { None };
        let chunks = split_partitions(records, self.config.partitions);
        let mut stats = StageStats {
            stage: stage_index,
            partitions: chunks.len(),
            reducers,
            ..StageStats::default()
        };
        info!(
            stage = stage_index,
            partitions = chunks.len(),
            reducers,
            combiner = combiner.is_some(),
            "Stage starting map phase"
        );

        let guard = FailFast::new();

        // Map phase
        let map_start = Instant::now();
        let map_results: Vec<Option<(Buckets<M::Key, M::Value>, MapTaskStats)>> = self.pool.install(|| {
            chunks
                .into_par_iter()
                .enumerate()
                .map(|(partition, chunk)| {
                    map_partition(stage_index, partition, &stage.mapper, combiner, chunk, reducers, &guard)
                })
                .collect()
        });
        // Every map task has returned at this point: this is the map/reduce barrier.
        if let Some(err) = guard.take() {
            return Err(err);
        }

        let mut per_reducer: Vec<Vec<Vec<(M::Key, M::Value)>>> =
            (0..reducers).map(|_| Vec::with_capacity(map_results.len())).collect();
        let mut map_stats = Vec::with_capacity(map_results.len());
        for (buckets, task_stats) in map_results.into_iter().flatten() {
            for (r, bucket) in buckets.into_iter().enumerate() {
                per_reducer[r].push(bucket);
            }
            map_stats.push(task_stats);
        }
        stats.record_map(&map_stats, map_start.elapsed().as_millis() as u64);

        // Reduce phase
        let reduce_start = Instant::now();
        let reduce_results: Vec<Option<(Vec<(R::KeyOut, R::ValueOut)>, ReduceTaskStats)>> =
            self.pool.install(|| {
                per_reducer
                    .into_par_iter()
                    .enumerate()
                    .map(|(bucket, parts)| reduce_bucket(stage_index, bucket, &stage.reducer, parts, &guard))
                    .collect()
            });
        if let Some(err) = guard.take() {
            return Err(err);
        }

        let mut pairs = Vec::new();
        let mut reduce_stats = Vec::with_capacity(reduce_results.len());
        for (out, task_stats) in reduce_results.into_iter().flatten() {
            pairs.extend(out);
            reduce_stats.push(task_stats);
        }
        stats.record_reduce(&reduce_stats, reduce_start.elapsed().as_millis() as u64);
        stats.wall_ms = stage_start.elapsed().as_millis() as u64;

        Ok(StageOutput { pairs, stats })
    }
}

/// First-error slot plus the cancellation flag workers poll between records.
struct FailFast {
    cancelled: AtomicBool,
    first: Mutex<Option<JobError>>,
}

impl FailFast {
    fn new() -> Self {
        Self { cancelled: AtomicBool::new(false), first: Mutex::new(None) }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn fail(&self, err: JobError) {
        let mut slot = self.first.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            warn!("{}; cancelling remaining workers", err);
            *slot = Some(err);
        } else {
            debug!("suppressed later failure: {}", err);
        }
        self.cancelled.store(true, Ordering::Release);
    }

    fn take(&self) -> Option<JobError> {
        self.first.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Splits records into at most `partitions` contiguous chunks of near-equal size.
fn split_partitions<T>(records: Vec<T>, partitions: usize) -> Vec<Vec<T>> {
    let per_chunk = records.len().div_ceil(partitions.max(1)).max(1);
    let mut out = Vec::with_capacity(partitions);
    let mut it = records.into_iter();
    loop {
        let chunk: Vec<T> = it.by_ref().take(per_chunk).collect();
        if chunk.is_empty() {
            break;
        }
        out.push(chunk);
    }
    out
}

fn map_partition<M, C>(
    stage: usize,
    partition: usize,
    mapper: &M,
    combiner: Option<&C>,
    records: Vec<M::Input>,
    reducers: usize,
    guard: &FailFast,
) -> Option<(Buckets<M::Key, M::Value>, MapTaskStats)>
where
    M: Mapper,
    C: Combiner<Key = M::Key, Value = M::Value>,
{
    let task_start = Instant::now();
    let mut stats = MapTaskStats::default();
    let mut emitted: Vec<(M::Key, M::Value)> = Vec::new();
    // Pairs of the record being mapped; only kept if the record maps cleanly.
    let mut scratch: Vec<(M::Key, M::Value)> = Vec::new();

    for record in records {
        if guard.is_cancelled() {
            return None;
        }
        stats.records_in += 1;
        let mut emit = |k: M::Key, v: M::Value| scratch.push((k, v));
        match mapper.do_map(record, &mut emit) {
            Ok(()) => emitted.append(&mut scratch),
            Err(e) if e.is::<MalformedRecord>() => {
                stats.malformed += 1;
                scratch.clear();
                debug!(stage, partition, "skipping record: {:#}", e);
            }
            Err(e) => {
                guard.fail(JobError::Mapper { stage, partition, source: e });
                return None;
            }
        }
    }
    stats.emitted = emitted.len() as u64;

    let pairs = match combiner {
        Some(combiner) => {
            let mut groups: BTreeMap<M::Key, Vec<M::Value>> = BTreeMap::new();
            for (k, v) in emitted {
                groups.entry(k).or_default().push(v);
            }
            let mut combined = Vec::with_capacity(groups.len());
            for (key, values) in groups {
                if guard.is_cancelled() {
                    return None;
                }
                let mut emit = |v: M::Value| combined.push((key.clone(), v));
                if let Err(e) = combiner.do_combine(&key, values, &mut emit) {
                    guard.fail(JobError::Combiner { stage, partition, key: describe_key(&key), source: e });
                    return None;
                }
            }
            combined
        }
        None => emitted,
    };
    stats.combine_out = pairs.len() as u64;

    let mut buckets: Buckets<M::Key, M::Value> = (0..reducers).map(|_| Vec::new()).collect();
    for (k, v) in pairs {
        let r = hash_to_partition(&k, reducers);
        buckets[r].push((k, v));
    }
    debug!(
        stage,
        partition,
        records_in = stats.records_in,
        emitted = stats.emitted,
        combine_out = stats.combine_out,
        wall_ms = task_start.elapsed().as_millis() as u64,
        "map task finished"
    );
    Some((buckets, stats))
}

fn reduce_bucket<R: Reducer>(
    stage: usize,
    bucket: usize,
    reducer: &R,
    parts: Vec<Vec<(R::Key, R::ValueIn)>>,
    guard: &FailFast,
) -> Option<(Vec<(R::KeyOut, R::ValueOut)>, ReduceTaskStats)> {
    let task_start = Instant::now();
    // Parts arrive in map-partition order, so values of a key keep that order.
    let mut groups: BTreeMap<R::Key, Vec<R::ValueIn>> = BTreeMap::new();
    for part in parts {
        for (k, v) in part {
            groups.entry(k).or_default().push(v);
        }
    }

    let mut stats = ReduceTaskStats::default();
    let mut out = Vec::new();
    for (key, values) in groups {
        if guard.is_cancelled() {
            return None;
        }
        stats.groups += 1;
        let mut emit = |k: R::KeyOut, v: R::ValueOut| out.push((k, v));
        if let Err(e) = reducer.do_reduce(&key, values, &mut emit) {
            guard.fail(JobError::Reducer { stage, key: describe_key(&key), source: e });
            return None;
        }
    }
    stats.emitted = out.len() as u64;
    debug!(
        stage,
        bucket,
        groups = stats.groups,
        emitted = stats.emitted,
        wall_ms = task_start.elapsed().as_millis() as u64,
        "reduce task finished"
    );
    Some((out, stats))
}
