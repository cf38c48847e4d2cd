//! Filesystem probes: existence, content search and directory listing
//!
//! Content searches read plain UTF-8 files directly and pull the text layer
//! out of PDF files.

use eyre::Result;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use super::{Capability, CapabilityResult};
use crate::directive::{Command, Verb};
use crate::error::ProtocolError;

/// Upper bound on listed files per call
const MAX_LISTED_FILES: usize = 200;

/// Files larger than this are skipped by `GREP`
const MAX_GREP_FILE_BYTES: u64 = 16 * 1024 * 1024;

/// Resolve a path from a directive against the workspace root
///
/// `~` is expanded, relative paths are joined onto `root`, and `.`/`..`
/// components are folded lexically. The filesystem is not consulted.
pub fn resolve_path(root: &Path, raw: &str) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = Path::new(expanded.as_ref());
    let joined = if path.is_absolute() { path.to_path_buf() } else { root.join(path) };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn absolute_root(root: PathBuf) -> PathBuf {
    std::path::absolute(&root).unwrap_or(root)
}

fn is_pdf(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Searchable text of a file: the text layer for PDFs, UTF-8 content otherwise
pub fn read_text(path: &Path) -> Result<String> {
    if !is_pdf(path) {
        return Ok(fs::read_to_string(path)?);
    }

    let document = lopdf::Document::load(path)?;
    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    let text = document.extract_text(&pages)?;
    log::trace!("Extracted {} bytes from {} PDF pages in {}", text.len(), pages.len(), path.display());
    Ok(text)
}

fn mismatch(verb: Verb, command: &Command) -> CapabilityResult {
    ProtocolError::HandlerFault {
        verb,
        message: format!("cannot handle {}", command.verb()),
    }
    .into()
}

/// `SEARCH`: report whether each path exists
pub struct FileExistsProbe {
    root: PathBuf,
}

impl FileExistsProbe {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: absolute_root(root),
        }
    }

    pub fn probe(&self, paths: &[String]) -> CapabilityResult {
        let lines = paths
            .iter()
            .map(|raw| {
                if resolve_path(&self.root, raw).exists() {
                    format!("Found: {}", raw)
                } else {
                    format!("Not found: {}", raw)
                }
            })
            .collect();
        CapabilityResult::from_lines(lines, true)
    }
}

impl Capability for FileExistsProbe {
    fn verb(&self) -> Verb {
        Verb::Search
    }

    fn execute(&self, command: Command) -> CapabilityResult {
        match command {
            Command::Search { paths } => self.probe(&paths),
            other => mismatch(self.verb(), &other),
        }
    }
}

/// `SEARCHCONTENT`: case-sensitive substring search per file, PDFs included
pub struct ContentGrepProbe {
    root: PathBuf,
}

impl ContentGrepProbe {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: absolute_root(root),
        }
    }

    pub fn probe(&self, phrase: &str, paths: &[String]) -> CapabilityResult {
        let lines = paths.iter().map(|raw| self.probe_one(phrase, raw)).collect();
        CapabilityResult::from_lines(lines, true)
    }

    fn probe_one(&self, phrase: &str, raw: &str) -> String {
        let path = resolve_path(&self.root, raw);
        if !path.exists() {
            return format!("File not found: {}", raw);
        }

        match read_text(&path) {
            Ok(content) if content.contains(phrase) => format!("Phrase found in: {}", raw),
            Ok(_) => format!("Phrase not found in: {}", raw),
            Err(e) => {
                log::debug!("Failed to read {}: {}", path.display(), e);
                format!("Error reading {}: {}", raw, e)
            }
        }
    }
}

impl Capability for ContentGrepProbe {
    fn verb(&self) -> Verb {
        Verb::SearchContent
    }

    fn execute(&self, command: Command) -> CapabilityResult {
        match command {
            Command::SearchContent { phrase, paths } => self.probe(&phrase, &paths),
            other => mismatch(self.verb(), &other),
        }
    }
}

/// `LISTFILES`: recursive listing, optionally filtered by extension
pub struct ListFilesProbe {
    root: PathBuf,
}

impl ListFilesProbe {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: absolute_root(root),
        }
    }

    pub fn list(&self, dir: &str, extensions: &[String]) -> CapabilityResult {
        let base = resolve_path(&self.root, dir);
        if !base.is_dir() {
            return CapabilityResult::failure(format!("Directory not found: {}", dir));
        }

        let wanted: Vec<String> = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();

        let files: Vec<String> = visible_files(&base)
            .filter(|e| wanted.is_empty() || has_extension(e.path(), &wanted))
            .filter_map(|e| relative(&base, e.path()))
            .collect();

        if files.is_empty() {
            return CapabilityResult::success(format!("No files found in: {}", dir));
        }
        CapabilityResult::from_lines(capped(files), true)
    }
}

/// Regular files under `base`, hidden entries pruned
fn visible_files(base: &Path) -> impl Iterator<Item = DirEntry> {
    WalkDir::new(base)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                log::debug!("Error walking directory: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
}

fn relative(base: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(base)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

/// Sort and cut to `MAX_LISTED_FILES`, noting how many were dropped
fn capped(mut lines: Vec<String>) -> Vec<String> {
    lines.sort();
    let total = lines.len();
    lines.truncate(MAX_LISTED_FILES);
    if total > MAX_LISTED_FILES {
        lines.push(format!("... and {} more", total - MAX_LISTED_FILES));
    }
    lines
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn has_extension(path: &Path, wanted: &[String]) -> bool {
    path.extension()
        .map(|ext| wanted.contains(&ext.to_string_lossy().to_lowercase()))
        .unwrap_or(false)
}

impl Capability for ListFilesProbe {
    fn verb(&self) -> Verb {
        Verb::ListFiles
    }

    fn execute(&self, command: Command) -> CapabilityResult {
        match command {
            Command::ListFiles { root, extensions } => self.list(&root, &extensions),
            other => mismatch(self.verb(), &other),
        }
    }
}

/// `GREP`: every file under a directory that contains a phrase
pub struct WorkspaceGrepProbe {
    root: PathBuf,
}

impl WorkspaceGrepProbe {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: absolute_root(root),
        }
    }

    pub fn search(&self, phrase: &str, dir: &str, case_sensitive: bool) -> CapabilityResult {
        let base = resolve_path(&self.root, dir);
        if !base.is_dir() {
            return CapabilityResult::failure(format!("Directory not found: {}", dir));
        }

        let needle = if case_sensitive { phrase.to_string() } else { phrase.to_lowercase() };
        let matches: Vec<String> = visible_files(&base)
            .filter(|e| e.metadata().map(|m| m.len() <= MAX_GREP_FILE_BYTES).unwrap_or(false))
            .filter(|e| match read_text(e.path()) {
                Ok(text) if case_sensitive => text.contains(&needle),
                Ok(text) => text.to_lowercase().contains(&needle),
                Err(err) => {
                    log::trace!("Skipping {}: {}", e.path().display(), err);
                    false
                }
            })
            .filter_map(|e| relative(&base, e.path()))
            .map(|rel| format!("Phrase found in: {}", rel))
            .collect();

        log::debug!("GREP {:?} under {}: {} matches", phrase, base.display(), matches.len());
        if matches.is_empty() {
            return CapabilityResult::success(format!("Phrase not found under: {}", dir));
        }
        CapabilityResult::from_lines(capped(matches), true)
    }
}

impl Capability for WorkspaceGrepProbe {
    fn verb(&self) -> Verb {
        Verb::Grep
    }

    fn execute(&self, command: Command) -> CapabilityResult {
        match command {
            Command::Grep {
                phrase,
                root,
                case_sensitive,
            } => self.search(&phrase, &root, case_sensitive),
            other => mismatch(self.verb(), &other),
        }
    }
}
