use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// List the log files in `dir` with the given extension, sorted by path
///
/// Only regular files directly inside `dir` are returned; subdirectories are
/// not descended into. The extension comparison ignores case.
pub fn list_log_files(dir: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false);

        if matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
