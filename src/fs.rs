//! Filesystem helpers that sit next to the shell session.
//!
//! Every failure is reported as [`PipeShellError::Filesystem`], naming the
//! action and the path and keeping the underlying I/O error as its source.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::PipeShellError;
use crate::Result;

/// What a path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Directory,
    File,
    /// Exists, but is neither a file nor a directory (socket, fifo, ...).
    Other,
    Missing,
}

fn failed(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> PipeShellError {
    let path = path.to_path_buf();
    move |source| PipeShellError::Filesystem {
        action,
        path,
        source,
    }
}

/// Classify `path`, following symlinks.
pub fn path_kind(path: impl AsRef<Path>) -> PathKind {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => PathKind::Directory,
        Ok(meta) if meta.is_file() => PathKind::File,
        Ok(_) => PathKind::Other,
        Err(_) => PathKind::Missing,
    }
}

/// Create `path` and any missing parents. Succeeds if it already exists.
pub fn create_directory(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    fs::create_dir_all(path).map_err(failed("create directory", path))?;
    Ok(path.to_path_buf())
}

/// Remove a directory and everything below it.
pub fn delete_directory(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::remove_dir_all(path).map_err(failed("delete directory", path))
}

/// Names of the entries in a directory, sorted.
pub fn list_directory(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let mut names = Vec::new();
    for entry in fs::read_dir(path).map_err(failed("list directory", path))? {
        let entry = entry.map_err(failed("list directory", path))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

pub fn read_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(failed("read file", path))
}

/// Write text, replacing any existing content.
pub fn write_file(path: impl AsRef<Path>, content: &str) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, content).map_err(failed("write file", path))
}

pub fn read_bytes(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(failed("read file", path))
}

pub fn write_bytes(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, content).map_err(failed("write file", path))
}

/// Lay out a directory tree under `root` from a JSON description.
///
/// Objects become directories and every other value becomes a file:
/// strings are written as-is, anything else as its JSON text.
///
/// ```no_run
/// use serde_json::json;
///
/// let tree = json!({
///     "src": {"main.rs": "fn main() {}\n"},
///     "Cargo.toml": "[package]\nname = \"demo\"\n",
/// });
/// pipe_shell::fs::create_project("demo", &tree)?;
/// # Ok::<(), pipe_shell::PipeShellError>(())
/// ```
pub fn create_project(root: impl AsRef<Path>, tree: &Value) -> Result<()> {
    let root = create_directory(root)?;
    let Value::Object(entries) = tree else {
        return Err(failed("create project in", &root)(io::Error::new(
            io::ErrorKind::InvalidInput,
            "project description must be a JSON object",
        )));
    };

    for (name, node) in entries {
        // Entries stay inside `root`.
        let is_plain_name = !name.is_empty()
            && Path::new(name)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain_name {
            return Err(failed("create project entry", &root.join(name))(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{}' is not a plain relative name", name),
            )));
        }

        let path = root.join(name);
        match node {
            Value::Object(_) => create_project(&path, node)?,
            Value::String(text) => write_file(&path, text)?,
            other => write_file(&path, &other.to_string())?,
        }
    }
    debug!(root = %root.display(), entries = entries.len(), "Created project tree");
    Ok(())
}
