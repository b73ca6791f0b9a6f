use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::loader::REQUEST_SUFFIX;

/// How many directory levels below the root are searched by default.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// A discovered request fixture and the directory it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFixture {
    pub dir: PathBuf,
    pub file_name: String,
}

impl RequestFixture {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// Collect every request fixture below `root`.
///
/// The walk uses an explicit stack and never descends more than `max_depth`
/// levels. Directories are identified by canonical path, so symlinked
/// directories are followed but a link cycle is only entered once.
/// Unreadable directories are logged and contribute nothing.
///
/// Results are sorted by path for a stable order across runs.
pub fn locate(root: &Path, max_depth: usize) -> Vec<RequestFixture> {
    let mut found = Vec::new();
    let mut visited = HashSet::new();
    let mut pending = vec![(root.to_path_buf(), 0usize)];

    while let Some((dir, depth)) = pending.pop() {
        let canonical = match fs::canonicalize(&dir) {
            Ok(canonical) => canonical,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "cannot resolve fixture directory");
                continue;
            }
        };
        if !visited.insert(canonical) {
            debug!(dir = %dir.display(), "directory already visited");
            continue;
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "cannot list fixture directory");
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "cannot read directory entry");
                    continue;
                }
            };
            let path = entry.path();
            // follows symlinks, so linked directories and files are treated as their targets
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot stat fixture candidate");
                    continue;
                }
            };

            if metadata.is_dir() {
                if depth >= max_depth {
                    warn!(dir = %path.display(), max_depth, "fixture directory too deep, not searched");
                    continue;
                }
                pending.push((path, depth + 1));
            } else if metadata.is_file() {
                let file_name = entry.file_name().to_string_lossy().into_owned();
                if is_request_fixture(&file_name) {
                    found.push(RequestFixture {
                        dir: dir.clone(),
                        file_name,
                    });
                }
            }
        }
    }

    found.sort_by_key(RequestFixture::path);
    debug!(root = %root.display(), count = found.len(), "located request fixtures");
    found
}

fn is_request_fixture(file_name: &str) -> bool {
    file_name.contains(REQUEST_SUFFIX) && !is_hidden(file_name)
}

fn is_hidden(file_name: &str) -> bool {
    file_name.starts_with('.')
}
