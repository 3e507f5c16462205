//! Stages and the typed chain that strings them into a job.
//!
//! A [`Stage`] is one mapper → (combiner) → reducer unit. Stages compose with
//! [`Job::then`], which only accepts a next stage whose input type is exactly the
//! previous stage's `(key, value)` output, so a key-shape change between stages
//! is checked at compile time.

use crate::api::{Combiner, IdentityMapper, Mapper, NoCombiner, Reducer};
use crate::error::JobError;
use crate::runtime::Engine;
use crate::stats::{JobStats, StageStats};
use tracing::debug;

pub struct Stage<M, C, R> {
    pub(crate) mapper: M,
    pub(crate) combiner: Option<C>,
    pub(crate) reducer: R,
}

impl<M, R> Stage<M, NoCombiner<M::Key, M::Value>, R>
where
    M: Mapper,
    R: Reducer<Key = M::Key, ValueIn = M::Value>,
{
    pub fn new(mapper: M, reducer: R) -> Self {
        Self { mapper, combiner: None, reducer }
    }
}

impl<R: Reducer> Stage<IdentityMapper<R::Key, R::ValueIn>, NoCombiner<R::Key, R::ValueIn>, R> {
    /// A stage whose input records are already `(key, value)` pairs.
    pub fn reduce_only(reducer: R) -> Self {
        Self { mapper: IdentityMapper::new(), combiner: None, reducer }
    }
}

impl<M, C, R> Stage<M, C, R>
where
    M: Mapper,
    C: Combiner<Key = M::Key, Value = M::Value>,
    R: Reducer<Key = M::Key, ValueIn = M::Value>,
{
    pub fn with_combiner<C2>(self, combiner: C2) -> Stage<M, C2, R>
    where
        C2: Combiner<Key = M::Key, Value = M::Value>,
    {
        Stage { mapper: self.mapper, combiner: Some(combiner), reducer: self.reducer }
    }

    pub fn has_combiner(&self) -> bool {
        self.combiner.is_some()
    }
}

/// Something the engine can execute as one or more consecutive stages.
pub trait StagePlan: Send + Sync {
    type In: Send;
    type Out: Send;

    fn stage_count(&self) -> usize;

    /// Runs every stage of the plan; `first_stage` is the 1-based index of the
    /// first one within the enclosing job.
    fn execute(
        &self,
        engine: &Engine,
        first_stage: usize,
        input: Vec<Self::In>,
        stats: &mut Vec<StageStats>,
    ) -> Result<Vec<Self::Out>, JobError>;
}

impl<M, C, R> StagePlan for Stage<M, C, R>
where
    M: Mapper,
    C: Combiner<Key = M::Key, Value = M::Value>,
    R: Reducer<Key = M::Key, ValueIn = M::Value>,
{
    type In = M::Input;
    type Out = (R::KeyOut, R::ValueOut);

    fn stage_count(&self) -> usize {
        1
    }

    fn execute(
        &self,
        engine: &Engine,
        first_stage: usize,
        input: Vec<Self::In>,
        stats: &mut Vec<StageStats>,
    ) -> Result<Vec<Self::Out>, JobError> {
        let out = engine.run_stage(first_stage, self, input)?;
        stats.push(out.stats);
        Ok(out.pairs)
    }
}

pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> StagePlan for Chain<A, B>
where
    A: StagePlan,
    B: StagePlan<In = A::Out>,
{
    type In = A::In;
    type Out = B::Out;

    fn stage_count(&self) -> usize {
        self.first.stage_count() + self.second.stage_count()
    }

    fn execute(
        &self,
        engine: &Engine,
        first_stage: usize,
        input: Vec<Self::In>,
        stats: &mut Vec<StageStats>,
    ) -> Result<Vec<Self::Out>, JobError> {
        let intermediate = self.first.execute(engine, first_stage, input, stats)?;
        let next_stage = first_stage + self.first.stage_count();
        debug!(stage = next_stage, records = intermediate.len(), "handing stage output to next stage");
        self.second.execute(engine, next_stage, intermediate, stats)
    }
}

/// A named, ordered sequence of stages.
pub struct Job<P> {
    name: String,
    plan: P,
}

impl<P: StagePlan> Job<P> {
    pub fn new(name: impl Into<String>, first: P) -> Self {
        Self { name: name.into(), plan: first }
    }

    pub fn then<S>(self, next: S) -> Job<Chain<P, S>>
    where
        S: StagePlan<In = P::Out>,
    {
        Job { name: self.name, plan: Chain { first: self.plan, second: next } }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_count(&self) -> usize {
        self.plan.stage_count()
    }

    pub(crate) fn plan(&self) -> &P {
        &self.plan
    }
}

/// Terminal output of a job plus the counters of every stage that ran.
#[derive(Debug)]
pub struct JobOutput<T> {
    pub pairs: Vec<T>,
    pub stats: JobStats,
}
