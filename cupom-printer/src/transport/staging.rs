//! Temporary job files for queue submission
//!
//! `lp` reads the job from a file. The spooler may still be copying it after
//! `lp` exits, so deletion is deferred by a configurable delay.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tempfile::{Builder, TempPath};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::PrintResult;

/// A framed job written to a uniquely named temporary file
#[derive(Debug)]
pub struct StagedPayload {
    path: TempPath,
}

impl StagedPayload {
    pub fn create(data: &[u8]) -> PrintResult<Self> {
        let mut file = Builder::new().prefix("cupom-").suffix(".bin").tempfile()?;
        file.write_all(data)?;
        file.flush()?;
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file once `delay` has passed
    ///
    /// Runs on the tokio runtime; a failed delete is logged and otherwise
    /// ignored.
    pub fn release_after(self, delay: Duration) -> JoinHandle<()> {
        let path = self.path;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let shown = path.display().to_string();
            match path.close() {
                Ok(()) => debug!(path = %shown, "staged job removed"),
                Err(e) => warn!(path = %shown, error = %e, "failed to remove staged job"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_staged_file_outlives_release_call() {
        let staged = StagedPayload::create(b"\x1b@job").unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"\x1b@job");

        let handle = staged.release_after(Duration::from_millis(100));
        assert!(path.exists());

        handle.await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_unique_names() {
        let a = StagedPayload::create(b"a").unwrap();
        let b = StagedPayload::create(b"b").unwrap();
        assert_ne!(a.path(), b.path());
    }
}
