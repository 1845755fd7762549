use std::{
    env, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(30 * 60);
const DEFAULT_JOB_MEMORY_ESTIMATE_MB: i64 = 256;

/// Load the configuration from `config.json` in the current working directory
/// (overridable via `CONFIG_PATH`). A missing file yields the built-in
/// defaults; a present but malformed file is an error.
pub fn load() -> Result<Config, LoadError> {
    let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.json".to_owned());
    load_from(Path::new(&path))
}

pub fn load_from(path: &Path) -> Result<Config, LoadError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(LoadError::Read {
                path: path.to_owned(),
                source,
            })
        }
    };
    serde_json::from_str(&raw).map_err(|source| LoadError::Parse {
        path: path.to_owned(),
        source,
    })
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// `chdir` target before the service starts; empty keeps the process cwd.
    pub working_dir: String,
    /// Listen address, `[host]:port`.
    pub addr: String,

    pub base_dir: PathBuf,
    pub jobs_dir: String,
    pub artifacts_dir: String,

    pub enable_static_artifacts: bool,
    #[serde(rename = "artifactTTLDays")]
    pub artifact_ttl_days: i64,
    pub cleanup_interval_mins: i64,

    /// Operator-trusted arguments prepended to every filtered user vector.
    pub default_args: Vec<String>,

    pub nsjail_enabled: bool,
    pub nsjail_path: String,

    pub enable_resource_gating: bool,
    pub cgroup_v2_root: PathBuf,
    #[serde(rename = "jobMemoryEstimateMB")]
    pub job_memory_estimate_mb: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_dir: "/srv/emcc-sandboxd".into(),
            addr: ":8080".into(),
            base_dir: ".".into(),
            jobs_dir: "jobs".into(),
            artifacts_dir: "artifacts".into(),
            enable_static_artifacts: true,
            artifact_ttl_days: 3,
            cleanup_interval_mins: 30,
            default_args: vec![
                "-sINVOKE_RUN=0".into(),
                "-sENVIRONMENT=web".into(),
                "-sALLOW_MEMORY_GROWTH=1".into(),
                "-sMODULARIZE=1".into(),
            ],
            nsjail_enabled: false,
            nsjail_path: "nsjail".into(),
            enable_resource_gating: false,
            cgroup_v2_root: "cgroup".into(),
            job_memory_estimate_mb: DEFAULT_JOB_MEMORY_ESTIMATE_MB,
        }
    }
}

impl Config {
    /// Address in the form `host:port`; a bare `:port` binds all interfaces.
    pub fn listen_addr(&self) -> String {
        if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        }
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.base_dir.join(&self.jobs_dir)
    }

    pub fn artifacts_path(&self) -> PathBuf {
        self.base_dir.join(&self.artifacts_dir)
    }

    /// URL prefix under which artifacts are served.
    pub fn artifacts_url_base(&self) -> String {
        format!("/{}", self.artifacts_dir.trim_start_matches('/'))
    }

    /// Time-to-live of a promoted artifact directory; `None` disables
    /// reclamation.
    pub fn artifact_ttl(&self) -> Option<Duration> {
        (self.artifact_ttl_days > 0)
            .then(|| Duration::from_secs(self.artifact_ttl_days as u64 * 24 * 60 * 60))
    }

    pub fn cleanup_interval(&self) -> Duration {
        if self.cleanup_interval_mins > 0 {
            Duration::from_secs(self.cleanup_interval_mins as u64 * 60)
        } else {
            DEFAULT_CLEANUP_INTERVAL
        }
    }

    /// Per-job memory estimate in bytes used by the admission controller.
    pub fn job_memory_estimate(&self) -> u64 {
        let mb = if self.job_memory_estimate_mb > 0 {
            self.job_memory_estimate_mb
        } else {
            DEFAULT_JOB_MEMORY_ESTIMATE_MB
        };
        mb as u64 * 1024 * 1024
    }
}
