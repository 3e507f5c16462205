use anyhow::Result;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::iter::Sum;
use std::marker::PhantomData;

// ========== Core MapReduce traits ==========

/// Bound shared by every grouping key. `Ord` makes grouping deterministic,
/// `Debug` is used to name the key in error reports.
pub trait GroupKey: Hash + Ord + Clone + Debug + Send + Sync + 'static {}

impl<T> GroupKey for T where T: Hash + Ord + Clone + Debug + Send + Sync + 'static {}

/// Turns one record into zero or more key/value pairs.
///
/// Returning an error wrapping [`MalformedRecord`] skips the record; any other
/// error aborts the stage.
pub trait Mapper: Send + Sync {
    type Input: Send;
    type Key: GroupKey;
    type Value: Send;

    fn do_map<F>(&self, record: Self::Input, emit: &mut F) -> Result<()>
    where
        F: FnMut(Self::Key, Self::Value);
}

/// Partial aggregation run on the mapper side, once per key per partition.
///
/// A combiner only emits values: the key it was called with is kept, so it can
/// never move values between groups.
pub trait Combiner: Send + Sync {
    type Key: GroupKey;
    type Value: Send;

    fn do_combine<I, F>(&self, key: &Self::Key, values: I, emit: &mut F) -> Result<()>
    where
        I: IntoIterator<Item = Self::Value>,
        F: FnMut(Self::Value);
}

/// Consumes one complete group and produces zero or more output pairs.
pub trait Reducer: Send + Sync {
    type Key: GroupKey;
    type ValueIn: Send;
    type KeyOut: Send;
    type ValueOut: Send;

    fn do_reduce<I, F>(&self, key: &Self::Key, values: I, emit: &mut F) -> Result<()>
    where
        I: IntoIterator<Item = Self::ValueIn>,
        F: FnMut(Self::KeyOut, Self::ValueOut);
}

// ========== Record-level skip ==========

/// Marks a record that failed shape validation. The engine counts and drops it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl fmt::Display for MalformedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed record: {}", self.reason)
    }
}

impl std::error::Error for MalformedRecord {}

// ========== Stock pieces ==========

/// Passes `(K, V)` records straight through. Used for reducer-only stages
/// that consume the previous stage's output as is.
pub struct IdentityMapper<K, V>(PhantomData<fn() -> (K, V)>);

impl<K, V> IdentityMapper<K, V> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<K, V> Default for IdentityMapper<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: GroupKey, V: Send> Mapper for IdentityMapper<K, V> {
    type Input = (K, V);
    type Key = K;
    type Value = V;

    fn do_map<F>(&self, record: Self::Input, emit: &mut F) -> Result<()>
    where
        F: FnMut(K, V),
    {
        emit(record.0, record.1);
        Ok(())
    }
}

/// Placeholder combiner type for stages that have none.
pub struct NoCombiner<K, V>(PhantomData<fn() -> (K, V)>);

impl<K, V> NoCombiner<K, V> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<K, V> Default for NoCombiner<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: GroupKey, V: Send> Combiner for NoCombiner<K, V> {
    type Key = K;
    type Value = V;

    fn do_combine<I, F>(&self, _key: &K, values: I, emit: &mut F) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        F: FnMut(V),
    {
        values.into_iter().for_each(|v| emit(v));
        Ok(())
    }
}

/// Sums every value of a key into one.
pub struct SumCombiner<K, V>(PhantomData<fn() -> (K, V)>);

impl<K, V> SumCombiner<K, V> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<K, V> Default for SumCombiner<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Combiner for SumCombiner<K, V>
where
    K: GroupKey,
    V: Sum<V> + Send,
{
    type Key = K;
    type Value = V;

    fn do_combine<I, F>(&self, _key: &K, values: I, emit: &mut F) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        F: FnMut(V),
    {
        emit(values.into_iter().sum());
        Ok(())
    }
}

// ========== Closure adapters ==========

pub struct MapFn<In, K, V, Func> {
    func: Func,
    _types: PhantomData<fn(In) -> (K, V)>,
}

/// Wraps `|record, emit| { ... }` as a [`Mapper`].
pub fn map_fn<In, K, V, Func>(func: Func) -> MapFn<In, K, V, Func>
where
    Func: Fn(In, &mut dyn FnMut(K, V)) -> Result<()> + Send + Sync,
{
    MapFn { func, _types: PhantomData }
}

impl<In, K, V, Func> Mapper for MapFn<In, K, V, Func>
where
    In: Send,
    K: GroupKey,
    V: Send,
    Func: Fn(In, &mut dyn FnMut(K, V)) -> Result<()> + Send + Sync,
{
    type Input = In;
    type Key = K;
    type Value = V;

    fn do_map<F>(&self, record: In, emit: &mut F) -> Result<()>
    where
        F: FnMut(K, V),
    {
        let emit: &mut dyn FnMut(K, V) = emit;
        (self.func)(record, emit)
    }
}

pub struct CombineFn<K, V, Func> {
    func: Func,
    _types: PhantomData<fn(K) -> V>,
}

/// Wraps `|key, values| -> Result<Vec<V>>` as a [`Combiner`].
pub fn combine_fn<K, V, Func>(func: Func) -> CombineFn<K, V, Func>
where
    Func: Fn(&K, Vec<V>) -> Result<Vec<V>> + Send + Sync,
{
    CombineFn { func, _types: PhantomData }
}

impl<K, V, Func> Combiner for CombineFn<K, V, Func>
where
    K: GroupKey,
    V: Send,
    Func: Fn(&K, Vec<V>) -> Result<Vec<V>> + Send + Sync,
{
    type Key = K;
    type Value = V;

    fn do_combine<I, F>(&self, key: &K, values: I, emit: &mut F) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        F: FnMut(V),
    {
        for v in (self.func)(key, values.into_iter().collect())? {
            emit(v);
        }
        Ok(())
    }
}

pub struct ReduceFn<K, V, KO, VO, Func> {
    func: Func,
    _types: PhantomData<fn(K, V) -> (KO, VO)>,
}

/// Wraps `|key, values, emit| { ... }` as a [`Reducer`].
pub fn reduce_fn<K, V, KO, VO, Func>(func: Func) -> ReduceFn<K, V, KO, VO, Func>
where
    Func: Fn(&K, Vec<V>, &mut dyn FnMut(KO, VO)) -> Result<()> + Send + Sync,
{
    ReduceFn { func, _types: PhantomData }
}

impl<K, V, KO, VO, Func> Reducer for ReduceFn<K, V, KO, VO, Func>
where
    K: GroupKey,
    V: Send,
    KO: Send,
    VO: Send,
    Func: Fn(&K, Vec<V>, &mut dyn FnMut(KO, VO)) -> Result<()> + Send + Sync,
{
    type Key = K;
    type ValueIn = V;
    type KeyOut = KO;
    type ValueOut = VO;

    fn do_reduce<I, F>(&self, key: &K, values: I, emit: &mut F) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        F: FnMut(KO, VO),
    {
        let emit: &mut dyn FnMut(KO, VO) = emit;
        (self.func)(key, values.into_iter().collect(), emit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_combiner_emits_single_total() {
        let mut out = Vec::new();
        SumCombiner::<String, u64>::new()
            .do_combine(&"k".to_string(), vec![1, 2, 3], &mut |v| out.push(v))
            .unwrap();
        assert_eq!(out, vec![6]);
    }

    #[test]
    fn no_combiner_passes_values_through() {
        let mut out = Vec::new();
        NoCombiner::<u8, &str>::new()
            .do_combine(&1, vec!["a", "b"], &mut |v| out.push(v))
            .unwrap();
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn malformed_record_is_recognisable_through_anyhow() {
        let err: anyhow::Error = MalformedRecord::new("two tokens expected").into();
        assert!(err.is::<MalformedRecord>());
        assert_eq!(err.to_string(), "malformed record: two tokens expected");
    }

    #[test]
    fn closure_mapper_emits_through_callback() {
        let m = map_fn(|line: String, emit: &mut dyn FnMut(String, u32)| {
            for w in line.split_whitespace() {
                emit(w.to_string(), 1);
            }
            Ok(())
        });
        let mut out = Vec::new();
        m.do_map("a b a".to_string(), &mut |k, v| out.push((k, v))).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[2], ("a".to_string(), 1));
    }

    #[test]
    fn closure_combiner_keeps_only_the_maximum() {
        let c = combine_fn(|_key: &String, values: Vec<u32>| Ok(values.into_iter().max().into_iter().collect()));
        let mut out = Vec::new();
        c.do_combine(&"k".to_string(), vec![3, 9, 4], &mut |v| out.push(v)).unwrap();
        assert_eq!(out, vec![9]);
    }
}
