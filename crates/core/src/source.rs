//! Loaded source files and import resolution.
//!
//! The `SourceManager` owns every file that takes part in a build. Imports
//! append files to the queue; the compile driver keeps lexing until the queue
//! is exhausted. File access goes through the `SourceLoader` trait so tests
//! can compile from memory.

use std::collections::HashMap;
use std::fs;
use std::io;

use crate::types::LineInfo;

/// Provider of source text by path.
pub trait SourceLoader {
    fn load(&self, path: &str) -> io::Result<String>;
}

/// Loads sources from the file system.
#[derive(Debug, Default)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(path)
    }
}

/// In-memory loader for tests and embedding hosts.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    files: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        MemoryLoader::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &str) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }
}

/// One loaded source file.
#[derive(Debug)]
pub struct SourceFile {
    path: String,
    text: String,
}

impl SourceFile {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Return line `num` (1-based), without its newline.
    pub fn line(&self, num: i32) -> Option<&str> {
        if num < 1 {
            return None;
        }
        self.text
            .lines()
            .nth((num - 1) as usize)
            .map(|l| l.trim_end_matches('\r'))
    }
}

/// The set of sources participating in one build.
pub struct SourceManager {
    loader: Box<dyn SourceLoader>,
    sources: Vec<SourceFile>,
}

impl SourceManager {
    pub fn new() -> Self {
        SourceManager::with_loader(Box::new(FsLoader))
    }

    pub fn with_loader(loader: Box<dyn SourceLoader>) -> Self {
        SourceManager {
            loader,
            sources: Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.sources.len()
    }

    pub fn get(&self, index: usize) -> Option<&SourceFile> {
        self.sources.get(index)
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }

    /// Queue a file for compilation.
    ///
    /// Returns `true` if the file is available (newly loaded or already
    /// queued). Paths already present, compared case-insensitively and
    /// slash-agnostically, are not loaded twice.
    pub fn load(&mut self, path: &str) -> bool {
        if self.sources.iter().any(|s| path_eq(&s.path, path)) {
            return true;
        }
        match self.loader.load(path) {
            Ok(text) => {
                self.sources.push(SourceFile {
                    path: path.to_string(),
                    text,
                });
                true
            }
            Err(_) => false,
        }
    }

    /// Queue literal source text under a synthetic path.
    pub fn load_from_string(&mut self, text: impl Into<String>) {
        self.sources.push(SourceFile {
            path: format!("<memory:{}>", self.sources.len()),
            text: text.into(),
        });
    }

    /// Rewrite an import path to be relative to the importing file.
    pub fn imported_path(&self, importer: usize, path: &str) -> String {
        let base = self
            .get(importer)
            .map(|s| base_path(s.path()))
            .unwrap_or_default();
        if base.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Source text for a `(file, line)` position, for diagnostics.
    pub fn get_line(&self, line: LineInfo) -> Option<&str> {
        if !line.is_valid() {
            return None;
        }
        self.get(line.file as usize)?.line(line.line)
    }
}

impl Default for SourceManager {
    fn default() -> Self {
        SourceManager::new()
    }
}

/// Directory part of a path, tolerant of both slash styles.
fn base_path(path: &str) -> String {
    let last = path.rfind(['/', '\\']).unwrap_or(0);
    path[..last].to_string()
}

/// Path compare that is insensitive to case and slash direction.
fn path_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).all(|(x, y)| {
        let x = x.to_ascii_lowercase();
        let y = y.to_ascii_lowercase();
        x == y || (x == b'/' && y == b'\\') || (x == b'\\' && y == b'/')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn memory_loader_round_trip() {
        let mut loader = MemoryLoader::new();
        loader.insert("main.no", "var x = 1\n");
        let mut sources = SourceManager::with_loader(Box::new(loader));
        assert!(sources.load("main.no"));
        assert_eq!(sources.count(), 1);
        assert_eq!(sources.get(0).unwrap().line(1), Some("var x = 1"));
    }

    #[test]
    fn duplicate_paths_are_ignored() {
        let mut loader = MemoryLoader::new();
        loader.insert("lib/util.no", "# util\n");
        let mut sources = SourceManager::with_loader(Box::new(loader));
        assert!(sources.load("lib/util.no"));
        assert!(sources.load("LIB\\Util.no"));
        assert_eq!(sources.count(), 1);
    }

    #[test]
    fn imported_path_is_relative_to_importer() {
        let mut loader = MemoryLoader::new();
        loader.insert("scripts/main.no", "");
        let mut sources = SourceManager::with_loader(Box::new(loader));
        sources.load("scripts/main.no");
        assert_eq!(sources.imported_path(0, "util.no"), "scripts/util.no");
    }

    #[test]
    fn fs_loader_reads_real_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "function main()").unwrap();
        writeln!(file, "  return 1").unwrap();
        writeln!(file, "end").unwrap();

        let mut sources = SourceManager::new();
        assert!(sources.load(file.path().to_str().unwrap()));
        let line = LineInfo::new(0, 2);
        assert_eq!(sources.get_line(line), Some("  return 1"));
    }

    #[test]
    fn missing_file_reports_failure() {
        let mut sources = SourceManager::new();
        assert!(!sources.load("/definitely/not/here.no"));
    }
}
