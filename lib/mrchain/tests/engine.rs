use anyhow::bail;
use mrchain::api::{map_fn, reduce_fn};
use mrchain::{Engine, EngineConfig, Job, JobError, MalformedRecord, Stage, SumCombiner};
use std::collections::BTreeMap;

fn engine(workers: usize, use_combiners: bool) -> Engine {
    let config = EngineConfig { use_combiners, ..EngineConfig::with_workers(workers) };
    Engine::new(config).unwrap()
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Emits `(token, 1)` for every token; a token `!` is malformed, `boom` is fatal.
fn token_mapper() -> impl mrchain::Mapper<Input = String, Key = String, Value = u64> {
    map_fn(|line: String, emit: &mut dyn FnMut(String, u64)| {
        for t in line.split_whitespace() {
            match t {
                "!" => bail!(MalformedRecord::new("bang")),
                "boom" => bail!("mapper exploded"),
                _ => emit(t.to_string(), 1),
            }
        }
        Ok(())
    })
}

/// Reports how many values each key received.
fn count_values() -> impl mrchain::Reducer<Key = String, ValueIn = u64, KeyOut = String, ValueOut = u64> {
    reduce_fn(|key: &String, values: Vec<u64>, emit: &mut dyn FnMut(String, u64)| {
        emit(key.clone(), values.len() as u64);
        Ok(())
    })
}

fn sum_values() -> impl mrchain::Reducer<Key = String, ValueIn = u64, KeyOut = String, ValueOut = u64> {
    reduce_fn(|key: &String, values: Vec<u64>, emit: &mut dyn FnMut(String, u64)| {
        emit(key.clone(), values.into_iter().sum());
        Ok(())
    })
}

fn as_map<K: Ord, V>(pairs: Vec<(K, V)>) -> BTreeMap<K, V> {
    pairs.into_iter().collect()
}

fn corpus() -> Vec<String> {
    (0..200).map(|i| format!("w{} w{} shared", i % 7, i % 13)).collect()
}

#[test]
fn every_value_reaches_its_group_regardless_of_partitioning() {
    let job = Job::new("count", Stage::new(token_mapper(), count_values()));
    let single = engine(1, true).run_job(&job, corpus()).unwrap();
    let many = engine(6, true).run_job(&job, corpus()).unwrap();
    let single = as_map(single.pairs);
    assert_eq!(single, as_map(many.pairs));
    assert_eq!(single["shared"], 200);
    let total: u64 = single.values().sum();
    assert_eq!(total, 600);
}

#[test]
fn combiner_does_not_change_results() {
    let job = Job::new("sum", Stage::new(token_mapper(), sum_values()).with_combiner(SumCombiner::new()));
    let with = engine(4, true).run_job(&job, corpus()).unwrap();
    let without = engine(4, false).run_job(&job, corpus()).unwrap();
    assert_eq!(as_map(with.pairs), as_map(without.pairs));

    let with_stats = &with.stats.stages[0];
    let without_stats = &without.stats.stages[0];
    assert_eq!(with_stats.map_emitted, 600);
    assert!(with_stats.combine_out < without_stats.combine_out);
    assert_eq!(without_stats.combine_out, 600);
}

#[test]
fn rerun_is_idempotent() {
    let job = Job::new("sum", Stage::new(token_mapper(), sum_values()));
    let e = engine(3, true);
    let a = e.run_job(&job, corpus()).unwrap();
    let b = e.run_job(&job, corpus()).unwrap();
    assert_eq!(a.pairs, b.pairs);
}

#[test]
fn malformed_records_are_counted_not_fatal() {
    let job = Job::new("count", Stage::new(token_mapper(), sum_values()));
    let out = engine(2, true).run_job(&job, lines(&["a b", "a ! c", "!", "b"])).unwrap();
    // "a ! c" is dropped as a whole, including the "a" emitted before the bang.
    assert_eq!(as_map(out.pairs), BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 2)]));
    assert_eq!(out.stats.malformed(), 2);
    assert_eq!(out.stats.stages[0].records_in, 4);
}

#[test]
fn failing_stage_stops_the_chain() {
    let regroup = Stage::reduce_only(reduce_fn(|key: &String, values: Vec<u64>, emit: &mut dyn FnMut(String, u64)| {
        emit(key.to_uppercase(), values.into_iter().sum());
        Ok(())
    }));
    let job = Job::new("chain", Stage::new(token_mapper(), sum_values())).then(regroup);
    assert_eq!(job.stage_count(), 2);

    let ok = engine(2, true).run_job(&job, lines(&["a a b"])).unwrap();
    assert_eq!(as_map(ok.pairs), BTreeMap::from([("A".to_string(), 2), ("B".to_string(), 1)]));
    assert_eq!(ok.stats.stages.len(), 2);

    let err = engine(2, true).run_job(&job, lines(&["a", "boom", "b"])).unwrap_err();
    assert_eq!(err.stage(), Some(1));
    assert!(matches!(err, JobError::Mapper { .. }));
    assert!(err.to_string().contains("mapper exploded"));
}

#[test]
fn reducer_error_in_second_stage_names_stage_and_key() {
    let picky = Stage::reduce_only(reduce_fn(|key: &String, _values: Vec<u64>, _emit: &mut dyn FnMut(String, u64)| {
        if key == "bad" {
            bail!("cannot rank {}", key);
        }
        Ok(())
    }));
    let job = Job::new("chain", Stage::new(token_mapper(), sum_values())).then(picky);
    let err = engine(3, true).run_job(&job, lines(&["ok bad ok"])).unwrap_err();
    match &err {
        JobError::Reducer { stage, key, .. } => {
            assert_eq!(*stage, 2);
            assert_eq!(key, "\"bad\"");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn zero_partitions_is_rejected() {
    let config = EngineConfig { partitions: 0, ..EngineConfig::with_workers(2) };
    assert!(matches!(Engine::new(config), Err(JobError::Config(_))));
}
