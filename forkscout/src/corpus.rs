/// Documents, patterns and the loaders that build them.
///
/// A corpus is read once at the start of a search session and stays
/// read-only for the rest of it. Input files follow a simple convention:
/// one file may hold many documents separated by a marker line (`@` by
/// default), and the first line of every document is its title.
use ignore::WalkBuilder;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::config::EncodingMode;
use crate::errors::{SearchError, SearchResult};
use crate::filters::CorpusFilter;
use crate::search::scheduler::{catch_panic, TaskHandle, WorkScheduler};

const BUFFER_CAPACITY: usize = 65536;
pub(crate) const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024; // 10MB

/// An immutable phrase to search for; identity is its text
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern(String);

impl Pattern {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Pattern {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Pattern {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable titled text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    title: String,
    body: String,
}

impl Document {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Splits raw text into a title (the first line) and a body (everything
    /// after the title, starting with the line break that ended it)
    pub fn parse(raw: &str) -> Self {
        let title_len = raw.find('\n').unwrap_or(raw.len());
        let title = raw[..title_len].trim_end_matches('\r');
        Self::new(title, &raw[title_len..])
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Splits one input text into documents on `separator`, dropping segments
/// that hold nothing but whitespace. An empty separator keeps the whole
/// text as one document.
pub fn split_input(text: &str, separator: &str) -> Vec<Document> {
    let segments: Vec<&str> = if separator.is_empty() {
        vec![text]
    } else {
        text.split(separator).collect()
    };

    segments
        .into_iter()
        .filter(|segment| !segment.trim().is_empty())
        .map(|segment| Document::parse(segment.trim_start_matches(['\r', '\n'])))
        .collect()
}

/// Reads a phrase list: one phrase per line, empty lines skipped
pub fn load_patterns(path: &Path) -> SearchResult<Vec<Pattern>> {
    let contents = std::fs::read_to_string(path).map_err(|e| SearchError::from_io(path, e))?;
    let patterns: Vec<Pattern> = contents
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .map(Pattern::from)
        .collect();
    debug!("Loaded {} patterns from {}", patterns.len(), path.display());
    Ok(patterns)
}

/// Loads documents from files and directories, in the order given.
///
/// Directories are walked recursively (hidden files and ignore files are
/// honoured) and their entries are visited in path order so repeated loads
/// produce the same document order.
pub fn load_documents(
    inputs: &[PathBuf],
    separator: &str,
    filter: &CorpusFilter,
    encoding_mode: EncodingMode,
) -> SearchResult<Vec<Document>> {
    let ctx = Arc::new(LoadContext {
        separator: separator.to_string(),
        filter: filter.clone(),
        encoding_mode,
        scheduler: None,
    });
    load_inputs(&ctx, inputs)
}

/// Same as [`load_documents`], but every subdirectory is loaded by its own
/// task forked on `scheduler`. The resulting document order is identical.
pub fn load_documents_parallel(
    inputs: &[PathBuf],
    separator: &str,
    filter: &CorpusFilter,
    encoding_mode: EncodingMode,
    scheduler: &Arc<WorkScheduler>,
) -> SearchResult<Vec<Document>> {
    let ctx = Arc::new(LoadContext {
        separator: separator.to_string(),
        filter: filter.clone(),
        encoding_mode,
        scheduler: Some(Arc::clone(scheduler)),
    });
    scheduler.install(|| catch_panic(|| load_inputs(&ctx, inputs)))
}

/// Read-only settings shared by every folder task of one load
struct LoadContext {
    separator: String,
    filter: CorpusFilter,
    encoding_mode: EncodingMode,
    scheduler: Option<Arc<WorkScheduler>>,
}

/// Output of one directory entry: loaded in place, or by a forked task
enum FolderPart {
    Loaded(SearchResult<Vec<Document>>),
    Forked(TaskHandle<Vec<Document>>),
}

fn load_inputs(ctx: &Arc<LoadContext>, inputs: &[PathBuf]) -> SearchResult<Vec<Document>> {
    let mut documents = Vec::new();
    for input in inputs {
        let metadata = std::fs::metadata(input).map_err(|e| SearchError::from_io(input, e))?;
        if metadata.is_file() {
            documents.extend(read_documents(ctx, input)?);
        } else {
            documents.extend(load_folder(ctx, input.clone())?);
        }
    }
    debug!("Loaded {} documents in total", documents.len());
    Ok(documents)
}

/// Loads one directory: files in place, subdirectories as forked tasks when
/// a scheduler is available. Every forked subtree is joined before the
/// first failure in path order is returned.
fn load_folder(ctx: &Arc<LoadContext>, dir: PathBuf) -> SearchResult<Vec<Document>> {
    let mut parts = Vec::new();
    for (path, is_dir) in list_folder(&dir) {
        if is_dir {
            match &ctx.scheduler {
                Some(scheduler) => {
                    let forked = Arc::clone(ctx);
                    let part = match scheduler.fork(move || load_folder(&forked, path)) {
                        Ok(handle) => FolderPart::Forked(handle),
                        Err(e) => FolderPart::Loaded(Err(e)),
                    };
                    parts.push(part);
                }
                None => parts.push(FolderPart::Loaded(load_folder(ctx, path))),
            }
        } else if ctx.filter.includes(&path) {
            parts.push(FolderPart::Loaded(read_documents(ctx, &path)));
        }
    }

    let mut documents = Vec::new();
    let mut failure = None;
    for part in parts {
        let result = match part {
            FolderPart::Loaded(result) => result,
            FolderPart::Forked(handle) => match &ctx.scheduler {
                Some(scheduler) => scheduler.join(&handle),
                None => Err(SearchError::scheduler_exhausted("folder task lost its scheduler")),
            },
        };
        match result {
            Ok(loaded) if failure.is_none() => documents.extend(loaded),
            Ok(_) => {}
            Err(e) => {
                failure.get_or_insert(e);
            }
        }
    }
    match failure {
        Some(e) => Err(e),
        None => Ok(documents),
    }
}

/// Immediate files and subdirectories of `dir`, sorted by path
fn list_folder(dir: &Path) -> Vec<(PathBuf, bool)> {
    let mut entries: Vec<(PathBuf, bool)> = WalkBuilder::new(dir)
        .max_depth(Some(1))
        .hidden(true)
        .ignore(true)
        .git_ignore(true)
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| entry.depth() == 1)
        .filter_map(|entry| {
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                Some((entry.into_path(), true))
            } else if file_type.is_file() {
                Some((entry.into_path(), false))
            } else {
                None
            }
        })
        .collect();
    entries.sort();
    entries
}

fn read_documents(ctx: &LoadContext, path: &Path) -> SearchResult<Vec<Document>> {
    let text = read_text(path, ctx.encoding_mode)?;
    let documents = split_input(&text, &ctx.separator);
    trace!("Loaded {} documents from {}", documents.len(), path.display());
    Ok(documents)
}

/// Reads a file as text; large files are memory mapped
fn read_text(path: &Path, encoding_mode: EncodingMode) -> SearchResult<String> {
    let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);

    if size >= LARGE_FILE_THRESHOLD {
        trace!("Memory mapping {}", path.display());
        let mmap = unsafe { Mmap::map(&file) }.map_err(SearchError::IoError)?;
        decode_bytes(&mmap, path, encoding_mode)
    } else {
        let mut reader = BufReader::with_capacity(BUFFER_CAPACITY, file);
        let mut bytes = Vec::with_capacity(size as usize);
        reader
            .read_to_end(&mut bytes)
            .map_err(SearchError::IoError)?;
        decode_bytes(&bytes, path, encoding_mode)
    }
}

fn decode_bytes(bytes: &[u8], path: &Path, encoding_mode: EncodingMode) -> SearchResult<String> {
    match encoding_mode {
        EncodingMode::FailFast => std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| SearchError::encoding_error(path, e)),
        EncodingMode::Lossy => {
            let cow = String::from_utf8_lossy(bytes);
            if let std::borrow::Cow::Owned(_) = cow {
                warn!("Invalid UTF-8 replaced in file: {}", path.display());
            }
            Ok(cow.into_owned())
        }
    }
}
