use tracing::debug;

use crate::errors::{TallyError, TallyResult};
use crate::results::SourceId;

/// How input is divided into work units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One unit per source; parallelism is bounded by the file count
    File,
    /// Units of at most this many lines; parallelism follows file size
    LineChunk(usize),
}

/// The lines of a source a unit covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRange {
    /// Every line of the source
    Whole,
    /// Zero-based half-open range of line indices
    Span { start: usize, end: usize },
}

impl LineRange {
    /// Resolves the range against a source of `len` lines
    pub fn bounds(&self, len: usize) -> (usize, usize) {
        match *self {
            LineRange::Whole => (0, len),
            LineRange::Span { start, end } => (start.min(len), end.min(len)),
        }
    }
}

/// An indivisible slice of input, processed by exactly one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub source: SourceId,
    pub range: LineRange,
}

/// A source to partition, with its line count once it has been read
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub id: SourceId,
    pub line_count: Option<usize>,
}

impl SourceSpec {
    /// A source that has not been read yet
    pub fn unread(id: SourceId) -> Self {
        Self {
            id,
            line_count: None,
        }
    }

    pub fn with_line_count(id: SourceId, line_count: usize) -> Self {
        Self {
            id,
            line_count: Some(line_count),
        }
    }
}

/// Divides the sources into work units.
///
/// Units of one source come out in ascending line order, never overlap and
/// together cover every line. A source with zero lines produces no unit in
/// line-chunk mode. Sources whose line count is unknown fall back to a single
/// whole-file unit.
pub fn partition(sources: &[SourceSpec], granularity: Granularity) -> TallyResult<Vec<WorkUnit>> {
    let units: Vec<WorkUnit> = match granularity {
        Granularity::File => sources
            .iter()
            .map(|spec| WorkUnit {
                source: spec.id.clone(),
                range: LineRange::Whole,
            })
            .collect(),
        Granularity::LineChunk(0) => {
            return Err(TallyError::invalid_configuration(
                "chunk_size must be greater than zero",
            ))
        }
        Granularity::LineChunk(chunk_size) => sources
            .iter()
            .flat_map(|spec| chunk_source(spec, chunk_size))
            .collect(),
    };

    debug!(
        "Partitioned {} sources into {} work units ({:?})",
        sources.len(),
        units.len(),
        granularity
    );
    Ok(units)
}

fn chunk_source(spec: &SourceSpec, chunk_size: usize) -> Vec<WorkUnit> {
    let Some(line_count) = spec.line_count else {
        debug!(
            "Line count unknown for {}, using one unit",
            spec.id.display()
        );
        return vec![WorkUnit {
            source: spec.id.clone(),
            range: LineRange::Whole,
        }];
    };

    (0..line_count)
        .step_by(chunk_size)
        .map(|start| WorkUnit {
            source: spec.id.clone(),
            range: LineRange::Span {
                start,
                end: start.saturating_add(chunk_size).min(line_count),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn spec(name: &str, lines: usize) -> SourceSpec {
        SourceSpec::with_line_count(SourceId::from(Path::new(name)), lines)
    }

    fn spans(units: &[WorkUnit]) -> Vec<(usize, usize)> {
        units
            .iter()
            .map(|u| match u.range {
                LineRange::Span { start, end } => (start, end),
                LineRange::Whole => panic!("expected span"),
            })
            .collect()
    }

    #[test]
    fn test_file_granularity() {
        let sources = vec![spec("a.txt", 100), spec("b.txt", 0)];
        let units = partition(&sources, Granularity::File).unwrap();
        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| u.range == LineRange::Whole));
        assert_eq!(units[1].source.as_ref(), Path::new("b.txt"));
    }

    #[test]
    fn test_line_chunks_cover_file() {
        let units = partition(&[spec("a.txt", 25)], Granularity::LineChunk(10)).unwrap();
        assert_eq!(spans(&units), vec![(0, 10), (10, 20), (20, 25)]);
    }

    #[test]
    fn test_line_chunks_exact_multiple() {
        let units = partition(&[spec("a.txt", 20)], Granularity::LineChunk(10)).unwrap();
        assert_eq!(spans(&units), vec![(0, 10), (10, 20)]);
    }

    #[test]
    fn test_chunk_size_one() {
        let units = partition(&[spec("a.txt", 3)], Granularity::LineChunk(1)).unwrap();
        assert_eq!(spans(&units), vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn test_empty_source_has_no_chunks() {
        let units = partition(&[spec("empty.txt", 0)], Granularity::LineChunk(10)).unwrap();
        assert!(units.is_empty());
    }

    #[test]
    fn test_unknown_line_count_falls_back_to_whole() {
        let sources = vec![SourceSpec::unread(SourceId::from(Path::new("a.txt")))];
        let units = partition(&sources, Granularity::LineChunk(10)).unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].range, LineRange::Whole);
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let result = partition(&[spec("a.txt", 5)], Granularity::LineChunk(0));
        assert!(matches!(result, Err(TallyError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_range_bounds() {
        assert_eq!(LineRange::Whole.bounds(7), (0, 7));
        assert_eq!(LineRange::Span { start: 2, end: 5 }.bounds(7), (2, 5));
        assert_eq!(LineRange::Span { start: 5, end: 10 }.bounds(7), (5, 7));
        assert_eq!(LineRange::Span { start: 9, end: 10 }.bounds(7), (7, 7));
    }
}
