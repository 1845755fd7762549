//! Per-request job workspace and the durable artifact directory it promotes
//! into. The handler exclusively owns the job directory from creation until
//! cleanup; the artifact directory is shared with the static file server and
//! the reclaimer.

use std::{
    io,
    path::{Path, PathBuf},
};

use rand::{rngs::OsRng, RngCore};
use tokio::{fs, io::AsyncWriteExt};
use tracing::error;

use crate::config::Config;

/// 8 hex characters from 4 cryptographically random bytes. There is no
/// global registry; collisions overwrite an existing artifact directory.
pub fn new_job_id() -> String {
    let mut bytes = [0u8; 4];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub struct Workspace {
    job_dir: PathBuf,
    artifact_dir: PathBuf,
}

impl Workspace {
    /// Create the transient job directory and the durable artifact directory
    /// for a job id.
    pub async fn create(config: &Config, id: &str) -> io::Result<Self> {
        let job_dir = config.jobs_path().join(id);
        let artifact_dir = config.artifacts_path().join(id);

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true).mode(0o755);
        builder.create(&job_dir).await?;
        builder.create(&artifact_dir).await?;

        Ok(Self {
            job_dir,
            artifact_dir,
        })
    }

    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Write the request source into the job directory.
    pub async fn write_source(&self, name: &str, code: &str) -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o644)
            .open(self.job_dir.join(name))
            .await?;
        file.write_all(code.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Move named compiler outputs from the job directory into the artifact
    /// directory.
    pub async fn promote(&self, files: &[&str]) -> io::Result<()> {
        for name in files {
            fs::rename(self.job_dir.join(name), self.artifact_dir.join(name)).await?;
        }
        Ok(())
    }

    /// Remove the job directory. Teardown failures are logged and swallowed.
    pub async fn cleanup(&self) {
        if let Err(err) = fs::remove_dir_all(&self.job_dir).await {
            error!(
                "failed to remove job directory {}: {err}",
                self.job_dir.display()
            );
        }
    }
}
