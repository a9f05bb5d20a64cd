//! Output module for page image directories
//!
//! Every page gets one directory under the output root, named after its
//! label. Images are written as `<ordinal>.<ext>`; an image that could not be
//! fetched within its attempt budget leaves an empty `<ordinal>.<ext>_<status>`
//! placeholder. The number of entries in a directory is the point from which
//! a later pass resumes, so nothing here ever deletes a file.

pub mod stats;

pub use stats::{load_statistics, print_statistics, QueueStatistics};

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Directory name used when a label sanitizes to nothing
const UNTITLED_DIR: &str = "untitled";

/// Creates the output root (and parents) if it does not exist
pub fn ensure_output_root(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// File name of a saved image
pub fn image_file_name(ordinal: usize, extension: &str) -> String {
    format!("{}.{}", ordinal, extension)
}

/// File name of a skipped image's placeholder
pub fn placeholder_file_name(ordinal: usize, extension: &str, status_code: u16) -> String {
    format!("{}_{}", image_file_name(ordinal, extension), status_code)
}

/// Returns true if `name` looks like `<ordinal>.<ext>_<status>`
pub fn is_placeholder(name: &str) -> bool {
    let Some((image, status)) = name.rsplit_once('_') else {
        return false;
    };
    let Some((ordinal, _)) = image.split_once('.') else {
        return false;
    };

    !status.is_empty()
        && status.chars().all(|c| c.is_ascii_digit())
        && !ordinal.is_empty()
        && ordinal.chars().all(|c| c.is_ascii_digit())
}

/// The image directory of a single page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDirectory {
    path: PathBuf,
}

impl PageDirectory {
    /// Resolves the directory for `label` under `output_root`
    ///
    /// The label is sanitized so it always names a single child of the root.
    pub fn for_label(output_root: &Path, label: &str) -> Self {
        let name = sanitize_filename::sanitize(label.trim());
        let name = if name.is_empty() {
            UNTITLED_DIR.to_string()
        } else {
            name
        };

        Self {
            path: output_root.join(name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the directory if it does not exist
    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.path)
    }

    /// Number of entries already present, i.e. the ordinal to resume from
    ///
    /// A missing directory resumes from 0.
    pub fn resume_index(&self) -> io::Result<usize> {
        match fs::read_dir(&self.path) {
            Ok(entries) => {
                let mut count = 0;
                for entry in entries {
                    entry?;
                    count += 1;
                }
                Ok(count)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Writes image bytes to `<ordinal>.<ext>`
    ///
    /// The bytes are staged in a temporary file next to the page directory
    /// and renamed into place, so the directory never holds a partial image
    /// that `resume_index` would count as done.
    pub fn save_image(&self, ordinal: usize, extension: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.path.join(image_file_name(ordinal, extension));
        let staging_dir = self.path.parent().unwrap_or(self.path.as_path());

        let mut staged = NamedTempFile::new_in(staging_dir)?;
        staged.write_all(bytes)?;
        staged.as_file().sync_all()?;
        staged.persist(&path)?;

        Ok(path)
    }

    /// Writes an empty `<ordinal>.<ext>_<status>` placeholder
    pub fn save_placeholder(
        &self,
        ordinal: usize,
        extension: &str,
        status_code: u16,
    ) -> io::Result<PathBuf> {
        let path = self
            .path
            .join(placeholder_file_name(ordinal, extension, status_code));
        fs::write(&path, b"")?;
        Ok(path)
    }
}
