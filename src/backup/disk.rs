use std::path::Path;

use crate::error::AppError;

/// Space on the volume holding a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl DiskUsage {
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        let used = self.total_bytes.saturating_sub(self.available_bytes);
        used as f64 * 100.0 / self.total_bytes as f64
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait DiskProbe: Send + Sync {
    fn usage(&self, path: &Path) -> Result<DiskUsage, AppError>;
}

/// Reads volume statistics through `fs2`.
pub struct Fs2DiskProbe;

impl DiskProbe for Fs2DiskProbe {
    fn usage(&self, path: &Path) -> Result<DiskUsage, AppError> {
        let shown = path.display();
        let total_bytes = fs2::total_space(path).map_err(|e| {
            AppError::Backup(format!("Failed to read disk size of '{shown}': {e}"))
        })?;
        let available_bytes = fs2::available_space(path).map_err(|e| {
            AppError::Backup(format!("Failed to read free space of '{shown}': {e}"))
        })?;
        Ok(DiskUsage {
            total_bytes,
            available_bytes,
        })
    }
}
