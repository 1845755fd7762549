//! Cgroup-v2 memory probe. Both readers hit the kernel files on every call;
//! `memory.current` in particular must never be cached between admission
//! attempts.

use std::{io, num::ParseIntError, path::Path};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CgroupError {
    #[error("failed to read {file}: {source}")]
    Read {
        file: &'static str,
        source: io::Error,
    },
    #[error("failed to parse {file}: {source}")]
    Parse {
        file: &'static str,
        source: ParseIntError,
    },
}

/// Read `memory.max` below the cgroup root. An empty root or the literal
/// `max` means unlimited and is reported as 0.
pub fn read_memory_max(root: &Path) -> Result<u64, CgroupError> {
    if root.as_os_str().is_empty() {
        return Ok(0);
    }
    let raw = std::fs::read_to_string(root.join("memory.max")).map_err(|source| {
        CgroupError::Read {
            file: "memory.max",
            source,
        }
    })?;
    let value = raw.trim();
    if value == "max" {
        return Ok(0);
    }
    value.parse().map_err(|source| CgroupError::Parse {
        file: "memory.max",
        source,
    })
}

/// Read `memory.current` below the cgroup root.
pub fn read_memory_current(root: &Path) -> Result<u64, CgroupError> {
    let raw = std::fs::read_to_string(root.join("memory.current")).map_err(|source| {
        CgroupError::Read {
            file: "memory.current",
            source,
        }
    })?;
    raw.trim().parse().map_err(|source| CgroupError::Parse {
        file: "memory.current",
        source,
    })
}
