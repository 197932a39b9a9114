use memmap2::Mmap;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

use crate::config::EncodingMode;
use crate::errors::{TallyError, TallyResult};
use crate::metrics::RunMetrics;

// Constants for file reading
const BUFFER_CAPACITY: usize = 65536;
pub(crate) const SMALL_FILE_THRESHOLD: u64 = 32 * 1024; // 32KB
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// Supplies the lines of a source.
///
/// Implementations are shared by every worker of a run, so they must be
/// `Send + Sync`.
pub trait LineSource: Send + Sync {
    /// Reads every line of `source`, without line terminators
    fn read_lines(&self, source: &Path) -> TallyResult<Vec<String>>;
}

/// Decodes bytes according to the encoding mode
fn decode_bytes<'a>(
    bytes: &'a [u8],
    path: &Path,
    encoding_mode: EncodingMode,
) -> TallyResult<Cow<'a, str>> {
    match encoding_mode {
        EncodingMode::FailFast => std::str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|e| TallyError::read_failure(path, format!("invalid UTF-8: {}", e))),
        EncodingMode::Lossy => {
            let cow = String::from_utf8_lossy(bytes);
            // Owned means at least one invalid sequence was replaced
            if let Cow::Owned(_) = cow {
                warn!("Invalid UTF-8 replaced in file: {}", path.display());
            }
            Ok(cow)
        }
    }
}

fn split_lines(contents: &str) -> Vec<String> {
    contents.lines().map(str::to_string).collect()
}

/// Reads sources from the filesystem, choosing a strategy by file size
#[derive(Debug, Clone, Default)]
pub struct FsLineSource {
    encoding_mode: EncodingMode,
    metrics: RunMetrics,
}

impl FsLineSource {
    pub fn new(encoding_mode: EncodingMode) -> Self {
        Self {
            encoding_mode,
            metrics: RunMetrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: RunMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    fn open(path: &Path) -> TallyResult<File> {
        File::open(path).map_err(|e| TallyError::from_io(path, e))
    }

    /// Reads a small file in one call
    fn read_small_file(&self, path: &Path) -> TallyResult<Vec<String>> {
        trace!("Reading small file: {}", path.display());
        let bytes = std::fs::read(path).map_err(|e| TallyError::from_io(path, e))?;
        Ok(split_lines(&decode_bytes(&bytes, path, self.encoding_mode)?))
    }

    /// Reads a file through a buffered reader
    fn read_file_buffered(&self, path: &Path) -> TallyResult<Vec<String>> {
        trace!("Reading buffered file: {}", path.display());
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, Self::open(path)?);
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| TallyError::from_io(path, e))?;
        Ok(split_lines(&decode_bytes(&bytes, path, self.encoding_mode)?))
    }

    /// Reads a large file through a memory map
    fn read_mmap_file(&self, path: &Path) -> TallyResult<Vec<String>> {
        trace!("Memory mapping file: {}", path.display());
        let file = Self::open(path)?;
        // SAFETY: the map is read-only and dropped before this call returns.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| TallyError::from_io(path, e))?;
        Ok(split_lines(&decode_bytes(&mmap, path, self.encoding_mode)?))
    }
}

impl LineSource for FsLineSource {
    fn read_lines(&self, source: &Path) -> TallyResult<Vec<String>> {
        let metadata = source
            .metadata()
            .map_err(|e| TallyError::from_io(source, e))?;
        if metadata.is_dir() {
            return Err(TallyError::read_failure(source, "is a directory"));
        }

        let size = metadata.len();
        self.metrics.record_file_read(size);

        if size < SMALL_FILE_THRESHOLD {
            self.read_small_file(source)
        } else if size >= LARGE_FILE_THRESHOLD {
            self.read_mmap_file(source)
        } else {
            self.read_file_buffered(source)
        }
    }
}

/// Serves lines from memory. Useful for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryLineSource {
    sources: HashMap<PathBuf, Vec<String>>,
}

impl MemoryLineSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source whose contents are `text`
    pub fn with_source(mut self, path: impl Into<PathBuf>, text: &str) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, text: &str) {
        self.sources.insert(path.into(), split_lines(text));
    }

    /// Paths of every source, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.sources.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl LineSource for MemoryLineSource {
    fn read_lines(&self, source: &Path) -> TallyResult<Vec<String>> {
        self.sources
            .get(source)
            .cloned()
            .ok_or_else(|| TallyError::source_not_found(source))
    }
}
