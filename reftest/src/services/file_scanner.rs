//! Exposure file discovery
//!
//! Turns an operator-supplied location into candidate exposure paths. The
//! location may be a single file, a glob pattern or a directory crawled
//! recursively. Candidates are kept when their name carries one of the
//! configured suffixes and their first bytes are a FITS primary header.
//!
//! Two phases: sequential traversal, then parallel signature verification.

use crate::services::fits_header::{is_fits_signature, FITS_SIGNATURE};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// File scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist and is not a glob
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, String),

    /// Cannot access file
    #[error("File access error {0}: {1}")]
    FileAccessError(PathBuf, String),
}

impl From<ScanError> for reftest_common::Error {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::PathNotFound(path) => reftest_common::Error::NotFound(path.display().to_string()),
            ScanError::InvalidPattern(..) => reftest_common::Error::InvalidInput(err.to_string()),
            ScanError::FileAccessError(path, reason) => reftest_common::Error::parse(path, reason),
        }
    }
}

/// Exposure file scanner
pub struct FileScanner {
    suffixes: Vec<String>,
    ignore_patterns: Vec<String>,
}

impl FileScanner {
    /// Scanner accepting file names that contain any of `suffixes`
    pub fn new(suffixes: Vec<String>) -> Self {
        Self {
            suffixes,
            ignore_patterns: vec![".git".to_string(), ".svn".to_string(), ".DS_Store".to_string()],
        }
    }

    /// Candidate exposure files under `location`
    ///
    /// A single file is returned as given once its signature checks out;
    /// the suffix convention only filters crawled and globbed files.
    pub fn scan(&self, location: &Path) -> Result<Vec<PathBuf>, ScanError> {
        let candidates = if location.is_file() {
            return if self.verify_signature(location)? {
                Ok(vec![location.to_path_buf()])
            } else {
                tracing::warn!(file = %location.display(), "Not a FITS file, skipping");
                Ok(Vec::new())
            };
        } else if location.is_dir() {
            self.walk(location)
        } else if is_glob(location) {
            self.expand_glob(location)?
        } else {
            return Err(ScanError::PathNotFound(location.to_path_buf()));
        };

        tracing::debug!(
            "Traversal complete: {} candidate files under {}",
            candidates.len(),
            location.display()
        );

        let mut verified: Vec<PathBuf> = candidates
            .par_iter()
            .filter_map(|path| match self.verify_signature(path) {
                Ok(true) => Some(path.clone()),
                Ok(false) => {
                    tracing::debug!(file = %path.display(), "Missing FITS signature, skipping");
                    None
                }
                Err(e) => {
                    tracing::warn!("Error verifying {}: {}", path.display(), e);
                    None
                }
            })
            .collect();
        verified.sort();

        tracing::info!(
            "Found {} exposure files ({} candidates) under {}",
            verified.len(),
            candidates.len(),
            location.display()
        );

        Ok(verified)
    }

    fn walk(&self, root: &Path) -> Vec<PathBuf> {
        let mut symlink_visited = HashSet::new();
        let mut candidates = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e, &mut symlink_visited));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && self.has_suffix(entry.path()) {
                        candidates.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                }
            }
        }

        candidates
    }

    fn expand_glob(&self, pattern: &Path) -> Result<Vec<PathBuf>, ScanError> {
        let pattern = pattern.to_string_lossy().into_owned();
        let paths = glob::glob(&pattern)
            .map_err(|e| ScanError::InvalidPattern(pattern.clone(), e.to_string()))?;

        let mut candidates = Vec::new();
        for entry in paths {
            match entry {
                Ok(path) => {
                    if path.is_file() && self.has_suffix(&path) {
                        candidates.push(path);
                    }
                }
                Err(e) => tracing::warn!("Error accessing entry: {}", e),
            }
        }
        Ok(candidates)
    }

    fn should_process_entry(&self, entry: &DirEntry, symlink_visited: &mut HashSet<PathBuf>) -> bool {
        let file_name = entry.file_name().to_string_lossy();

        if self.ignore_patterns.iter().any(|p| file_name.contains(p.as_str())) {
            return false;
        }

        if entry.file_type().is_symlink() {
            if let Ok(canonical) = entry.path().canonicalize() {
                if !symlink_visited.insert(canonical) {
                    tracing::warn!("Symlink loop detected: {}", entry.path().display());
                    return false;
                }
            }
        }

        true
    }

    /// Whether the file name contains one of the configured suffixes
    fn has_suffix(&self, path: &Path) -> bool {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy(),
            None => return false,
        };
        self.suffixes.iter().any(|s| name.contains(s.as_str()))
    }

    /// Check the leading `SIMPLE  =` bytes
    fn verify_signature(&self, path: &Path) -> Result<bool, ScanError> {
        let mut file = File::open(path)
            .map_err(|e| ScanError::FileAccessError(path.to_path_buf(), e.to_string()))?;

        let mut buffer = [0u8; FITS_SIGNATURE.len()];
        let mut filled = 0;
        while filled < buffer.len() {
            match file.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) => return Err(ScanError::FileAccessError(path.to_path_buf(), e.to_string())),
            }
        }

        Ok(is_fits_signature(&buffer[..filled]))
    }
}

impl Default for FileScanner {
    fn default() -> Self {
        Self::new(
            reftest_common::config::DEFAULT_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

fn is_glob(path: &Path) -> bool {
    path.to_string_lossy().contains(['*', '?', '['])
}
