use crate::error::{ChunkerError, Result};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default cap on a single file read during directory ingestion (20 MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// Directory walk options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Descend into subdirectories
    pub recursive: bool,

    /// Files larger than this are skipped
    pub max_file_size: u64,

    /// Include dot-files and dot-directories
    pub include_hidden: bool,

    /// Extra gitignore-style patterns to exclude, e.g. `*.log` or `drafts/`
    pub ignore_patterns: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            include_hidden: false,
            ignore_patterns: Vec::new(),
        }
    }
}

impl ScanOptions {
    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub fn ignore_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.ignore_patterns.push(pattern.into());
        self
    }
}

/// Scanner for finding ingestible documents under a directory
pub struct FileScanner {
    root: PathBuf,
    options: ScanOptions,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            options: ScanOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    /// Scan for ingestible files (.gitignore aware), sorted by path
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(ChunkerError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("not a directory: {}", self.root.display()),
            )));
        }

        let mut overrides = OverrideBuilder::new(&self.root);
        for pattern in &self.options.ignore_patterns {
            overrides
                .add(&format!("!{pattern}"))
                .map_err(|err| ChunkerError::invalid_config(format!("ignore pattern '{pattern}': {err}")))?;
        }
        let overrides = overrides
            .build()
            .map_err(|err| ChunkerError::invalid_config(err.to_string()))?;

        let root = self.root.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(!self.options.include_hidden)
            .git_ignore(true)
            .git_exclude(true)
            .require_git(false)
            .overrides(overrides);
        if !self.options.recursive {
            builder.max_depth(Some(1));
        }
        builder.filter_entry(move |entry| !Self::is_ignored_scope(entry.path(), &root));

        let mut files = Vec::new();
        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > self.options.max_file_size {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                self.options.max_file_size
                            );
                            continue;
                        }
                    }

                    if !Self::is_supported_file(path) {
                        continue;
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::info!("Found {} documents under {}", files.len(), self.root.display());
        Ok(files)
    }

    /// Allow-listed text, code and document extension that is not a known binary
    pub(crate) fn is_supported_file(path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        let ext = ext.to_lowercase();
        if IGNORED_EXTENSIONS.contains(&ext.as_str()) {
            return false;
        }
        SUPPORTED_EXTENSIONS.contains(&ext.as_str())
    }

    fn is_ignored_scope(path: &Path, root: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return false;
        };
        relative.components().any(|component| match component {
            std::path::Component::Normal(name) => {
                let lowered = name.to_string_lossy().to_lowercase();
                IGNORED_SCOPES.contains(&lowered.as_str())
            }
            _ => false,
        })
    }
}

const IGNORED_SCOPES: &[&str] = &[
    // VCS / tooling
    ".git",
    ".hg",
    ".svn",
    ".idea",
    ".vscode",
    // caches / builds
    ".cache",
    "node_modules",
    "build",
    "dist",
    "target",
    ".venv",
    "venv",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
];

/// Binary, media and archive formats that never carry ingestible text
const IGNORED_EXTENSIONS: &[&str] = &[
    "pyc", "pyo", "so", "dll", "dylib", "exe", "bin", "o", "a", "class", "jar", "png", "jpg",
    "jpeg", "gif", "bmp", "ico", "svg", "webp", "mp3", "mp4", "wav", "avi", "mov", "mkv", "zip",
    "tar", "gz", "bz2", "xz", "7z", "rar", "db", "sqlite", "lock",
];

const SUPPORTED_EXTENSIONS: &[&str] = &[
    // Documents
    "txt",
    "md",
    "markdown",
    "docx",
    "pdf",
    "rst",
    "adoc",
    // Code
    "rs",
    "py",
    "js",
    "mjs",
    "ts",
    "tsx",
    "jsx",
    "java",
    "kt",
    "go",
    "c",
    "h",
    "cpp",
    "cc",
    "hpp",
    "cs",
    "rb",
    "swift",
    "php",
    "scala",
    "lua",
    "sh",
    "bash",
    "sql",
    // Config / data
    "json",
    "yaml",
    "yml",
    "toml",
    "ini",
    "cfg",
    "conf",
    "xml",
    "html",
    "htm",
    "css",
    "csv",
    "log",
];

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn skips_ignored_directories_and_binaries() {
        let temp = tempdir().unwrap();
        let cache = temp.path().join("node_modules").join("pkg");
        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join("readme.md"), b"vendored").unwrap();
        fs::write(temp.path().join("notes.txt"), b"hello").unwrap();
        fs::write(temp.path().join("logo.png"), b"\x89PNG").unwrap();
        fs::write(temp.path().join("Makefile"), b"all:").unwrap();

        let files = FileScanner::new(temp.path()).scan().unwrap();
        assert_eq!(names(&files), vec!["notes.txt"]);
    }

    #[test]
    fn non_recursive_scan_stays_at_top_level() {
        let temp = tempdir().unwrap();
        let nested = temp.path().join("chapter");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("b.md"), b"nested").unwrap();
        fs::write(temp.path().join("a.md"), b"top").unwrap();

        let recursive = FileScanner::new(temp.path()).scan().unwrap();
        assert_eq!(names(&recursive), vec!["a.md", "b.md"]);

        let flat = FileScanner::new(temp.path())
            .with_options(ScanOptions::default().recursive(false))
            .scan()
            .unwrap();
        assert_eq!(names(&flat), vec!["a.md"]);
    }

    #[test]
    fn honours_extra_ignore_patterns_and_gitignore() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("drafts")).unwrap();
        fs::write(temp.path().join("drafts").join("wip.md"), b"wip").unwrap();
        fs::write(temp.path().join("keep.md"), b"keep").unwrap();
        fs::write(temp.path().join("secret.txt"), b"secret").unwrap();
        fs::write(temp.path().join("trace.log"), b"log").unwrap();
        fs::write(temp.path().join(".gitignore"), b"secret.txt\n").unwrap();

        let options = ScanOptions::default().ignore_pattern("drafts/").ignore_pattern("*.log");
        let files = FileScanner::new(temp.path())
            .with_options(options)
            .scan()
            .unwrap();
        assert_eq!(names(&files), vec!["keep.md"]);
    }

    #[test]
    fn skips_files_over_size_cap() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("big.txt"), vec![b'a'; 64]).unwrap();
        fs::write(temp.path().join("small.txt"), b"ok").unwrap();

        let options = ScanOptions {
            max_file_size: 16,
            ..ScanOptions::default()
        };
        let files = FileScanner::new(temp.path())
            .with_options(options)
            .scan()
            .unwrap();
        assert_eq!(names(&files), vec!["small.txt"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let temp = tempdir().unwrap();
        let result = FileScanner::new(temp.path().join("absent")).scan();
        assert!(matches!(result, Err(ChunkerError::IoError(_))));
    }
}
