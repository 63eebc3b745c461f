use codegraph_core::{CodeGraphError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Contents of `.vibe/server.pid` (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerPid {
    pub pid: u32,
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(".vibe").join("server.pid")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, pid: &ServerPid) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CodeGraphError::Filesystem {
                operation: format!("create_dir_all({parent:?})"),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(pid)?;
        std::fs::write(&self.path, json).map_err(|e| CodeGraphError::Filesystem {
            operation: format!("write({:?})", self.path),
            source: e,
        })?;
        info!("wrote server pid file at {:?}", self.path);
        Ok(())
    }

    pub fn read(&self) -> Result<Option<ServerPid>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| CodeGraphError::Filesystem {
            operation: format!("read({:?})", self.path),
            source: e,
        })?;
        let pid = serde_json::from_str(&content)?;
        Ok(Some(pid))
    }

    pub fn remove(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| CodeGraphError::Filesystem {
                operation: format!("remove_file({:?})", self.path),
                source: e,
            })?;
            info!("removed server pid file at {:?}", self.path);
        }
        Ok(())
    }

    /// Removes the PID file if its process is no longer alive (§4.6: "a stale PID file is
    /// removed opportunistically").
    pub fn cleanup_stale(&self) -> Result<bool> {
        match self.read()? {
            Some(server_pid) if !is_process_alive(server_pid.pid) => {
                warn!("removing stale server pid file for process {}", server_pid.pid);
                self.remove()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> ServerPid {
        ServerPid {
            pid: std::process::id(),
            host: "127.0.0.1".to_string(),
            port: 4243,
            db_path: PathBuf::from(".vibe/code.db"),
            start_time: chrono::Utc::now(),
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let pid_file = PidFile::new(dir.path().join("server.pid"));
        let written = sample();
        pid_file.write(&written).unwrap();
        let read_back = pid_file.read().unwrap().unwrap();
        assert_eq!(read_back.pid, written.pid);
        assert_eq!(read_back.port, written.port);
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let pid_file = PidFile::new(dir.path().join("server.pid"));
        assert!(pid_file.read().unwrap().is_none());
    }

    #[test]
    fn cleanup_stale_removes_file_for_a_dead_process() {
        let dir = TempDir::new().unwrap();
        let pid_file = PidFile::new(dir.path().join("server.pid"));
        let mut stale = sample();
        stale.pid = 2_147_483_000; // astronomically unlikely to be a live pid in the test sandbox
        pid_file.write(&stale).unwrap();
        let removed = pid_file.cleanup_stale().unwrap();
        assert!(removed);
        assert!(pid_file.read().unwrap().is_none());
    }
}
