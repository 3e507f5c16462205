//! Top title keywords per movie genre, as a two-stage job.
//!
//! Stage 1 counts every `(genre, word)` pair and re-keys the counts by genre.
//! Stage 2 merges the per-word counts of a genre and keeps the highest ones.

use super::stopwords;
use crate::api::{IdentityMapper, MalformedRecord, Mapper, NoCombiner, Reducer, SumCombiner};
use crate::io::split_csv_line;
use crate::stage::{Chain, Job, Stage};
use crate::topk::{add_counts_first_seen, top_k_by, SortOrder};
use anyhow::{bail, Result};
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_TOP: usize = 10;
const HEADER_PREFIX: &str = "movieId";

/// Stopword set plus the word pattern, built once and shared by all mappers.
pub struct KeywordFilter {
    stopwords: HashSet<String>,
    word_re: Regex,
}

impl KeywordFilter {
    pub fn new(extra_stopwords: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut stopwords = stopwords::default_set();
        stopwords.extend(extra_stopwords);
        Ok(Self { stopwords, word_re: Regex::new(r"\b[a-z]+\b")? })
    }

    /// Lower-cased title words that are neither stopwords nor single letters.
    pub fn keywords(&self, title: &str) -> Vec<String> {
        let title = title.to_lowercase();
        self.word_re
            .find_iter(&title)
            .map(|m| m.as_str())
            .filter(|w| w.len() > 1 && !self.stopwords.contains(*w))
            .map(str::to_string)
            .collect()
    }
}

/// `movieId,title,genres` row to `((genre, word), 1)` per keyword per genre.
pub struct GenreWords {
    filter: Arc<KeywordFilter>,
}

impl GenreWords {
    pub fn new(filter: Arc<KeywordFilter>) -> Self {
        Self { filter }
    }
}

impl Mapper for GenreWords {
    type Input = String;
    type Key = (String, String);
    type Value = u64;

    fn do_map<F>(&self, line: String, emit: &mut F) -> Result<()>
    where
        F: FnMut((String, String), u64),
    {
        if line.starts_with(HEADER_PREFIX) {
            return Ok(());
        }
        let row = split_csv_line(&line);
        if row.len() < 3 {
            bail!(MalformedRecord::new(format!("expected 3 fields, got {}", row.len())));
        }
        let keywords = self.filter.keywords(&row[1]);
        for genre in row[2].split('|') {
            for word in &keywords {
                emit((genre.to_string(), word.clone()), 1);
            }
        }
        Ok(())
    }
}

/// Sums a `(genre, word)` group and re-keys it as `(genre, (word, count))`.
pub struct CountPerGenre;

impl Reducer for CountPerGenre {
    type Key = (String, String);
    type ValueIn = u64;
    type KeyOut = String;
    type ValueOut = (String, u64);

    fn do_reduce<I, F>(&self, key: &(String, String), counts: I, emit: &mut F) -> Result<()>
    where
        I: IntoIterator<Item = u64>,
        F: FnMut(String, (String, u64)),
    {
        let (genre, word) = key;
        emit(genre.clone(), (word.clone(), counts.into_iter().sum()));
        Ok(())
    }
}

/// Highest counted words of a genre, ties kept in first-seen order.
pub struct TopWords {
    top: usize,
}

impl TopWords {
    pub fn new(top: usize) -> Self {
        Self { top }
    }
}

impl Reducer for TopWords {
    type Key = String;
    type ValueIn = (String, u64);
    type KeyOut = String;
    type ValueOut = Vec<(String, u64)>;

    fn do_reduce<I, F>(&self, genre: &String, word_counts: I, emit: &mut F) -> Result<()>
    where
        I: IntoIterator<Item = (String, u64)>,
        F: FnMut(String, Vec<(String, u64)>),
    {
        let merged = add_counts_first_seen(word_counts);
        emit(genre.clone(), top_k_by(merged, self.top, SortOrder::Descending, |wc| wc.1));
        Ok(())
    }
}

pub type CountStage = Stage<GenreWords, SumCombiner<(String, String), u64>, CountPerGenre>;
pub type RankStage = Stage<IdentityMapper<String, (String, u64)>, NoCombiner<String, (String, u64)>, TopWords>;

pub fn job(filter: Arc<KeywordFilter>, top: usize) -> Job<Chain<CountStage, RankStage>> {
    let count = Stage::new(GenreWords::new(filter), CountPerGenre).with_combiner(SumCombiner::new());
    Job::new("top-keywords-per-genre", count).then(Stage::reduce_only(TopWords::new(top)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> KeywordFilter {
        KeywordFilter::new(Vec::new()).unwrap()
    }

    fn map(line: &str) -> Result<Vec<((String, String), u64)>> {
        let mut out = Vec::new();
        GenreWords::new(Arc::new(filter())).do_map(line.to_string(), &mut |k, v| out.push((k, v)))?;
        Ok(out)
    }

    #[test]
    fn keywords_drop_stopwords_and_short_words() {
        assert_eq!(filter().keywords("The Lord of the Rings: Part II (2002)"), vec!["lord", "rings", "part"]);
        assert_eq!(filter().keywords("Alien vs. Predator"), vec!["alien", "predator"]);
    }

    #[test]
    fn extra_stopwords_are_honoured() {
        let f = KeywordFilter::new(vec!["part".to_string()]).unwrap();
        assert_eq!(f.keywords("Part Two"), vec!["two"]);
    }

    #[test]
    fn emits_every_keyword_for_every_genre() {
        let out = map(r#"2,"Jumanji, Return (1995)",Adventure|Children"#).unwrap();
        let keys: Vec<(&str, &str)> = out.iter().map(|((g, w), _)| (g.as_str(), w.as_str())).collect();
        assert_eq!(
            keys,
            vec![("Adventure", "jumanji"), ("Adventure", "return"), ("Children", "jumanji"), ("Children", "return")]
        );
        assert!(out.iter().all(|(_, n)| *n == 1));
    }

    #[test]
    fn header_is_skipped_and_short_rows_are_malformed() {
        assert!(map("movieId,title,genres").unwrap().is_empty());
        assert!(map("7,Sabrina").unwrap_err().is::<MalformedRecord>());
    }

    #[test]
    fn top_words_merge_then_rank() {
        let values = vec![
            ("night".to_string(), 1),
            ("day".to_string(), 2),
            ("night".to_string(), 2),
            ("dawn".to_string(), 2),
        ];
        let mut out = Vec::new();
        TopWords::new(2).do_reduce(&"Horror".to_string(), values, &mut |k, v| out.push((k, v))).unwrap();
        assert_eq!(out, vec![("Horror".to_string(), vec![("night".to_string(), 3), ("day".to_string(), 2)])]);
    }
}
