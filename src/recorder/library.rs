use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

/// Extension of recordings written and listed by the recorder.
pub const RECORDING_EXTENSION: &str = "wav";

/// `YYYYMMDD_HHMMSS.wav` for the given local time.
pub fn recording_file_name(time: NaiveDateTime) -> String {
    format!("{}.{}", time.format("%Y%m%d_%H%M%S"), RECORDING_EXTENSION)
}

/// Recordings in one directory, newest first.
#[derive(Debug)]
pub struct RecordingLibrary {
    directory: PathBuf,
    files: Vec<PathBuf>,
    selected: Option<usize>,
}

impl RecordingLibrary {
    /// Creates an empty library; call [`refresh`](Self::refresh) to scan.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            files: Vec::new(),
            selected: None,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Re-scans the directory and selects the newest recording.
    ///
    /// # Errors
    ///
    /// Any I/O error from reading the directory. The previous listing is kept.
    pub fn refresh(&mut self) -> io::Result<()> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.is_file() && is_recording(&path) {
                files.push(path);
            }
        }

        files.sort();
        files.reverse();

        self.selected = if files.is_empty() { None } else { Some(0) };
        self.files = files;
        log::debug!(
            "Found {} recordings in {}",
            self.files.len(),
            self.directory.display()
        );
        Ok(())
    }

    /// File names in display order.
    pub fn names(&self) -> Vec<String> {
        self.files
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Selects the recording at `row`; returns `false` if there is none.
    pub fn select(&mut self, row: usize) -> bool {
        if row < self.files.len() {
            self.selected = Some(row);
            true
        } else {
            false
        }
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_path(&self) -> Option<&Path> {
        self.selected
            .and_then(|row| self.files.get(row))
            .map(PathBuf::as_path)
    }
}

fn is_recording(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(RECORDING_EXTENSION))
}
