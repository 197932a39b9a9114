use std::cmp::Ordering;

use super::aggregator::Aggregation;
use crate::errors::{TallyError, TallyResult};
use crate::results::WordRecord;

/// Descending count, then ascending word
fn by_rank(a: &WordRecord, b: &WordRecord) -> Ordering {
    b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word))
}

/// Ranks a finished aggregation, keeping the `top_n` most frequent words
pub fn rank(aggregation: Aggregation, top_n: usize) -> TallyResult<Vec<WordRecord>> {
    rank_records(aggregation.into_records(), top_n)
}

/// Orders records by descending count with ties broken lexicographically by
/// word, and keeps the first `top_n`. Fewer records than `top_n` are all
/// returned. Ranking an already ranked sequence returns it unchanged.
pub fn rank_records(mut records: Vec<WordRecord>, top_n: usize) -> TallyResult<Vec<WordRecord>> {
    if top_n == 0 {
        return Err(TallyError::invalid_configuration(
            "top_n must be greater than zero",
        ));
    }

    if records.len() > top_n {
        records.select_nth_unstable_by(top_n - 1, by_rank);
        records.truncate(top_n);
    }
    records.sort_unstable_by(by_rank);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{LocationDetail, SourceId};
    use std::path::Path;

    fn record(word: &str, count: usize) -> WordRecord {
        let source = SourceId::from(Path::new("doc.txt"));
        let mut record = WordRecord::new(word, LocationDetail::Files);
        for line in 0..count {
            record.record(&source, line + 1);
        }
        record
    }

    fn words(records: &[WordRecord]) -> Vec<(&str, u64)> {
        records.iter().map(|r| (r.word.as_str(), r.count)).collect()
    }

    #[test]
    fn test_descending_count() {
        let ranked = rank_records(
            vec![record("one", 1), record("six", 6), record("three", 3)],
            10,
        )
        .unwrap();
        assert_eq!(words(&ranked), vec![("six", 6), ("three", 3), ("one", 1)]);
    }

    #[test]
    fn test_ties_break_lexicographically() {
        let ranked = rank_records(
            vec![
                record("four", 2),
                record("six", 6),
                record("five", 2),
                record("apple", 2),
            ],
            3,
        )
        .unwrap();
        assert_eq!(words(&ranked), vec![("six", 6), ("apple", 2), ("five", 2)]);
    }

    #[test]
    fn test_truncates_to_top_n() {
        let records: Vec<_> = (1..=50).map(|i| record(&format!("w{:02}", i), i)).collect();
        let ranked = rank_records(records, 5).unwrap();
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked[0].word, "w50");
        assert_eq!(ranked[4].word, "w46");
    }

    #[test]
    fn test_fewer_words_than_top_n() {
        let ranked = rank_records(vec![record("b", 1), record("a", 1)], 20).unwrap();
        assert_eq!(words(&ranked), vec![("a", 1), ("b", 1)]);
    }

    #[test]
    fn test_rank_is_idempotent() {
        let records = vec![
            record("x", 4),
            record("y", 4),
            record("z", 1),
            record("w", 7),
        ];
        let once = rank_records(records, 3).unwrap();
        let twice = rank_records(once.clone(), 3).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_zero_top_n_is_rejected() {
        let result = rank_records(vec![record("a", 1)], 0);
        assert!(matches!(result, Err(TallyError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_empty_aggregation() {
        let ranked = rank(Aggregation::new(), 20).unwrap();
        assert!(ranked.is_empty());
    }
}
