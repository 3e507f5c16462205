//! Reverses the edges of a `from to` edge list and collects, for every target
//! node, all nodes that link to it.

use crate::api::{MalformedRecord, Mapper, NoCombiner, Reducer};
use crate::stage::{Job, Stage};
use anyhow::{bail, Result};

pub struct ReverseLinks;

impl Mapper for ReverseLinks {
    type Input = String;
    type Key = String;
    type Value = String;

    fn do_map<F>(&self, line: String, emit: &mut F) -> Result<()>
    where
        F: FnMut(String, String),
    {
        if line.starts_with('#') {
            bail!(MalformedRecord::new("comment line"));
        }
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(from), Some(to), None) => {
                emit(to.to_string(), from.to_string());
                Ok(())
            }
            _ => bail!(MalformedRecord::new(format!("expected 2 tokens: {:?}", line))),
        }
    }
}

/// Collects every source of a node. No combiner: the aggregation keeps all
/// values, there is nothing to pre-reduce.
pub struct CollectSources;

impl Reducer for CollectSources {
    type Key = String;
    type ValueIn = String;
    type KeyOut = String;
    type ValueOut = Vec<String>;

    fn do_reduce<I, F>(&self, to: &String, from: I, emit: &mut F) -> Result<()>
    where
        I: IntoIterator<Item = String>,
        F: FnMut(String, Vec<String>),
    {
        emit(to.clone(), from.into_iter().collect());
        Ok(())
    }
}

pub fn job() -> Job<Stage<ReverseLinks, NoCombiner<String, String>, CollectSources>> {
    Job::new("reverse-web-graph", Stage::new(ReverseLinks, CollectSources))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(line: &str) -> Result<Vec<(String, String)>> {
        let mut out = Vec::new();
        ReverseLinks.do_map(line.to_string(), &mut |k, v| out.push((k, v)))?;
        Ok(out)
    }

    #[test]
    fn emits_reversed_edge() {
        assert_eq!(map("1\t2").unwrap(), vec![("2".to_string(), "1".to_string())]);
    }

    #[test]
    fn comments_and_bad_lines_are_malformed() {
        for line in ["# FromNodeId ToNodeId", "bad", "1 2 3", ""] {
            let err = map(line).unwrap_err();
            assert!(err.is::<MalformedRecord>(), "{:?} should be malformed", line);
        }
    }
}
