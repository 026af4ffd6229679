use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use shared_definitions::telemetry::TelemetrySchema;

use crate::util::error::AppError;

/// Destination of encoded telemetry records.
pub trait RecordSink {
    fn write_record(&mut self, bytes: &[u8]) -> Result<(), AppError>;

    fn flush(&mut self) -> Result<(), AppError> {
        Ok(())
    }
}

impl RecordSink for Vec<u8> {
    fn write_record(&mut self, bytes: &[u8]) -> Result<(), AppError> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

pub fn path_for(dir: &Path, stem: &str, index: usize) -> PathBuf {
    dir.join(format!("{}_{}.bin", stem, index))
}

/// Shifts `{stem}_N.bin` to `{stem}_{N+1}.bin`, newest first, so index 0 is
/// free for a new log. Files that would land past `retention` are deleted.
pub fn rotate(dir: &Path, stem: &str, retention: usize) -> Result<(), AppError> {
    if retention == 0 {
        return Err(AppError::config("log retention must be at least one file"));
    }

    let oldest = path_for(dir, stem, retention - 1);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
        log::debug!("Deleted old telemetry log {}", oldest.display());
    }
    for index in (0..retention - 1).rev() {
        let from = path_for(dir, stem, index);
        if from.exists() {
            fs::rename(&from, path_for(dir, stem, index + 1))?;
        }
    }
    Ok(())
}

/// Telemetry log file, rotated on creation.
pub struct FileLogStorage {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl FileLogStorage {
    /// Rotates older logs and opens `{stem}_0.bin`. When a schema is given
    /// its header is written first so the log can be decoded on its own.
    pub fn create(
        dir: &Path,
        stem: &str,
        retention: usize,
        schema: Option<&TelemetrySchema>,
    ) -> Result<Self, AppError> {
        fs::create_dir_all(dir)?;
        if let Err(error) = rotate(dir, stem, retention) {
            log::warn!("Telemetry log rotation failed: {}", error);
            return Err(error);
        }

        let path = path_for(dir, stem, 0);
        let mut writer = BufWriter::new(File::create(&path)?);
        if let Some(schema) = schema {
            writer.write_all(&schema.encode_header())?;
        }
        log::info!("Writing telemetry to {}", path.display());
        Ok(FileLogStorage { writer, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for FileLogStorage {
    fn write_record(&mut self, bytes: &[u8]) -> Result<(), AppError> {
        self.writer.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), AppError> {
        self.writer.flush()?;
        Ok(())
    }
}
