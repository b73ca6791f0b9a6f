use std::fs;
use std::io;
use std::path::Path;

/// Write `contents` to `path`, creating missing parent directories.
pub fn write_text(path: &Path, contents: &str) -> io::Result<()> {
    ensure_parent_dir(path)?;
    fs::write(path, contents)
}

pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
