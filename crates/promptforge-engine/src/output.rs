use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, Local};
use promptforge_contracts::PipelineError;

pub const DEFAULT_OUTPUT_DIR: &str = "./generation-image";

/// Collision suffixes tried before giving up on a timestamp.
const MAX_COLLISIONS: u32 = 10_000;

pub fn extension_for_mime(mime: Option<&str>) -> &'static str {
    let Some(mime) = mime else {
        return "png";
    };
    let lowered = mime.to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    "png"
}

#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn write(&self, bytes: &[u8], ext: &str) -> Result<PathBuf, PipelineError> {
        self.write_at(Local::now(), bytes, ext)
    }

    /// Writes `generated_<date>_<time>.<ext>`, never replacing an existing
    /// file: a taken name gets `_1`, `_2`, ... before the extension.
    pub fn write_at(
        &self,
        now: DateTime<Local>,
        bytes: &[u8],
        ext: &str,
    ) -> Result<PathBuf, PipelineError> {
        fs::create_dir_all(&self.dir).map_err(|source| PipelineError::Write {
            path: self.dir.clone(),
            source,
        })?;
        let stem = format!("generated_{}", now.format("%Y%m%d_%H%M%S"));

        for attempt in 0..MAX_COLLISIONS {
            let name = if attempt == 0 {
                format!("{stem}.{ext}")
            } else {
                format!("{stem}_{attempt}.{ext}")
            };
            let path = self.dir.join(name);
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(PipelineError::Write { path, source }),
            };
            if let Err(source) = file.write_all(bytes).and_then(|()| file.sync_all()) {
                drop(file);
                let _ = fs::remove_file(&path);
                return Err(PipelineError::Write { path, source });
            }
            tracing::debug!(path = %path.display(), bytes = bytes.len(), "image written");
            return Ok(path);
        }

        Err(PipelineError::Write {
            path: self.dir.join(format!("{stem}.{ext}")),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{MAX_COLLISIONS} files named {stem} already exist"),
            ),
        })
    }
}
