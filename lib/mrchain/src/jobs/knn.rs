//! K-nearest-neighbour classification of Iris samples.
//!
//! Every row of the dataset is min-max normalized once, up front, into a
//! [`KnnContext`]. The stage input is the unlabeled samples; the mapper pairs
//! each with every labeled sample and the reducer votes among the nearest K.

use crate::api::{Mapper, NoCombiner, Reducer};
use crate::io::split_csv_line;
use crate::stage::{Job, Stage};
use crate::topk::{majority_vote, top_k_by, SortOrder};
use anyhow::{anyhow, bail, Context, Result};
use std::sync::Arc;
use tracing::debug;

pub const FEATURES: [&str; 4] = ["SepalLengthCm", "SepalWidthCm", "PetalLengthCm", "PetalWidthCm"];
pub const DEFAULT_K: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub id: u64,
    pub features: [f64; 4],
    pub species: Option<String>,
}

impl Sample {
    pub fn distance(&self, other: &Sample) -> f64 {
        self.features.iter().zip(other.features.iter()).map(|(a, b)| (a - b) * (a - b)).sum::<f64>().sqrt()
    }
}

/// Column positions resolved from the CSV header.
struct Columns {
    id: usize,
    features: [usize; 4],
    species: usize,
}

impl Columns {
    fn from_header(header: &[String]) -> Result<Self> {
        let find = |name: &str| {
            header.iter().position(|h| h.trim() == name).ok_or_else(|| anyhow!("missing column {:?}", name))
        };
        let mut features = [0; 4];
        for (slot, name) in features.iter_mut().zip(FEATURES.iter()) {
            *slot = find(*name)?;
        }
        Ok(Self { id: find("Id")?, features, species: find("Species")? })
    }
}

/// Parses an Iris-style CSV: a header row, then one sample per row. Blank rows
/// are ignored and an empty `Species` marks the sample as unlabeled.
pub fn parse_samples(lines: &[String]) -> Result<Vec<Sample>> {
    let mut rows = lines.iter().enumerate().filter(|(_, l)| !l.trim().is_empty());
    let (_, header) = rows.next().ok_or_else(|| anyhow!("empty dataset"))?;
    let cols = Columns::from_header(&split_csv_line(header))?;

    let mut samples = Vec::new();
    for (i, line) in rows {
        let fields = split_csv_line(line);
        let field = |idx: usize| {
            fields.get(idx).map(|f| f.trim()).ok_or_else(|| anyhow!("line {}: expected at least {} fields", i + 1, idx + 1))
        };
        let id: u64 = field(cols.id)?.parse().with_context(|| format!("line {}: bad Id", i + 1))?;
        let mut features = [0.0; 4];
        for (slot, &idx) in features.iter_mut().zip(cols.features.iter()) {
            *slot = field(idx)?.parse().with_context(|| format!("line {}: bad feature value", i + 1))?;
        }
        // A missing trailing Species column reads as unlabeled too.
        let species = fields.get(cols.species).map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string);
        samples.push(Sample { id, features, species });
    }
    Ok(samples)
}

/// Read-only reference data shared by every mapper invocation.
#[derive(Debug)]
pub struct KnnContext {
    labeled: Vec<Sample>,
    unlabeled: Vec<Sample>,
    min: [f64; 4],
    max: [f64; 4],
}

impl KnnContext {
    /// Normalizes every feature to `[0, 1]` over all rows, labeled or not.
    /// A feature with zero range normalizes to 0.
    pub fn from_rows(rows: Vec<Sample>) -> Self {
        let mut min = [f64::INFINITY; 4];
        let mut max = [f64::NEG_INFINITY; 4];
        for row in &rows {
            for (j, &x) in row.features.iter().enumerate() {
                min[j] = min[j].min(x);
                max[j] = max[j].max(x);
            }
        }

        let mut labeled = Vec::new();
        let mut unlabeled = Vec::new();
        for mut row in rows {
            for (j, x) in row.features.iter_mut().enumerate() {
                let range = max[j] - min[j];
                *x = if range > 0.0 { (*x - min[j]) / range } else { 0.0 };
            }
            if row.species.is_some() {
                labeled.push(row);
            } else {
                unlabeled.push(row);
            }
        }
        debug!(labeled = labeled.len(), unlabeled = unlabeled.len(), "knn context built");
        Self { labeled, unlabeled, min, max }
    }

    pub fn labeled(&self) -> &[Sample] {
        &self.labeled
    }

    pub fn unlabeled(&self) -> &[Sample] {
        &self.unlabeled
    }

    /// Per-feature `(min, max)` before normalization.
    pub fn bounds(&self) -> [(f64, f64); 4] {
        let mut out = [(0.0, 0.0); 4];
        for (j, b) in out.iter_mut().enumerate() {
            *b = (self.min[j], self.max[j]);
        }
        out
    }
}

/// Emits `(id, (distance, species))` of an unlabeled sample against every labeled one.
pub struct NeighbourDistances {
    ctx: Arc<KnnContext>,
}

impl NeighbourDistances {
    pub fn new(ctx: Arc<KnnContext>) -> Self {
        Self { ctx }
    }
}

impl Mapper for NeighbourDistances {
    type Input = Sample;
    type Key = u64;
    type Value = (f64, String);

    fn do_map<F>(&self, unknown: Sample, emit: &mut F) -> Result<()>
    where
        F: FnMut(u64, (f64, String)),
    {
        for known in self.ctx.labeled() {
            let Some(species) = &known.species else { continue };
            emit(unknown.id, (unknown.distance(known), species.clone()));
        }
        Ok(())
    }
}

pub struct NearestVote {
    k: usize,
}

impl NearestVote {
    pub fn new(k: usize) -> Self {
        Self { k }
    }
}

impl Reducer for NearestVote {
    type Key = u64;
    type ValueIn = (f64, String);
    type KeyOut = u64;
    type ValueOut = String;

    fn do_reduce<I, F>(&self, id: &u64, neighbours: I, emit: &mut F) -> Result<()>
    where
        I: IntoIterator<Item = (f64, String)>,
        F: FnMut(u64, String),
    {
        let nearest = top_k_by(neighbours, self.k, SortOrder::Ascending, |n| n.0);
        let species = majority_vote(nearest.into_iter().map(|(_, s)| s))?;
        emit(*id, species);
        Ok(())
    }
}

pub type KnnStage = Stage<NeighbourDistances, NoCombiner<u64, (f64, String)>, NearestVote>;

pub fn job(ctx: Arc<KnnContext>, k: usize) -> Result<Job<KnnStage>> {
    if ctx.labeled().is_empty() && !ctx.unlabeled().is_empty() {
        bail!("no labeled samples to classify against");
    }
    Ok(Job::new("knn-classify", Stage::new(NeighbourDistances::new(ctx), NearestVote::new(k))))
}
