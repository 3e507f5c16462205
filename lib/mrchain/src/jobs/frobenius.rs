//! Frobenius norm of a whitespace-separated numeric matrix: square every
//! element, sum them under a single key, take the square root.
//!
//! Squares travel as [`ExactSum`]s, so the norm is the same bit for bit however
//! the input is partitioned and whether or not the combiner runs.

use crate::api::{Mapper, Reducer, SumCombiner};
use crate::exact::ExactSum;
use crate::stage::{Job, Stage};
use anyhow::{Context, Result};

pub const OUTPUT_KEY: &str = "Frobenius_Norm";

pub struct SquareElements;

impl Mapper for SquareElements {
    type Input = String;
    type Key = ();
    type Value = ExactSum;

    fn do_map<F>(&self, line: String, emit: &mut F) -> Result<()>
    where
        F: FnMut((), ExactSum),
    {
        for token in line.split_whitespace() {
            let x: f64 = token.parse().with_context(|| format!("not a number: {:?}", token))?;
            emit((), ExactSum::from(x * x));
        }
        Ok(())
    }
}

pub struct SquareRootOfSum;

impl Reducer for SquareRootOfSum {
    type Key = ();
    type ValueIn = ExactSum;
    type KeyOut = String;
    type ValueOut = f64;

    fn do_reduce<I, F>(&self, _key: &(), values: I, emit: &mut F) -> Result<()>
    where
        I: IntoIterator<Item = ExactSum>,
        F: FnMut(String, f64),
    {
        let total: ExactSum = values.into_iter().sum();
        emit(OUTPUT_KEY.to_string(), total.value().sqrt());
        Ok(())
    }
}

pub fn stage() -> Stage<SquareElements, SumCombiner<(), ExactSum>, SquareRootOfSum> {
    Stage::new(SquareElements, SquareRootOfSum).with_combiner(SumCombiner::new())
}

pub fn job() -> Job<Stage<SquareElements, SumCombiner<(), ExactSum>, SquareRootOfSum>> {
    Job::new("frobenius-norm", stage())
}
