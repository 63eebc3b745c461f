use crate::pid::{is_process_alive, PidFile, ServerPid};
use codegraph_core::{CodeGraphError, Result, StorageConfig};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{info, warn};

const READY_POLL_TIMEOUT: Duration = Duration::from_secs(5);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(200);
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(2);
const PORT_PROBE_RANGE: u16 = 100;

/// Ensures an embedded graph store server is reachable, reusing an existing process via the
/// PID file when possible and otherwise launching a fresh one (§4.6 Workspace supervision).
/// Returns the `StorageConfig` with `host`/`port` rewritten to wherever the server actually
/// ended up listening.
pub async fn ensure_server(workspace_root: &Path, config: &StorageConfig) -> Result<StorageConfig> {
    let pid_file = PidFile::new(PidFile::default_path(workspace_root));
    pid_file.cleanup_stale()?;

    if let Some(existing) = pid_file.read()? {
        if is_process_alive(existing.pid) && probe(&existing.host, existing.port, "/version").await {
            info!("reusing existing graph store server at {}:{}", existing.host, existing.port);
            let mut config = config.clone();
            config.host = existing.host;
            config.port = existing.port;
            return Ok(config);
        }
        warn!("pid file present but server at {}:{} is unreachable; relaunching", existing.host, existing.port);
    }

    launch_server(workspace_root, config, &pid_file).await
}

async fn launch_server(workspace_root: &Path, config: &StorageConfig, pid_file: &PidFile) -> Result<StorageConfig> {
    let port = find_free_port(&config.host, config.base_port).await?;
    let db_path = if config.db_path.is_absolute() {
        config.db_path.clone()
    } else {
        workspace_root.join(&config.db_path)
    };

    let child = Command::new("surreal")
        .arg("start")
        .arg("--bind")
        .arg(format!("{}:{}", config.host, port))
        .arg(format!("rocksdb:{}", db_path.display()))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| CodeGraphError::StorageConnection(format!("failed to launch graph store server: {e}")))?;

    // Spawned directly (not through a shell), so the reported pid is already the real
    // server process id; no secondary process-name lookup is needed.
    let pid = child.id();

    let server_pid = ServerPid {
        pid,
        host: config.host.clone(),
        port,
        db_path: db_path.clone(),
        start_time: chrono::Utc::now(),
    };
    pid_file.write(&server_pid)?;

    wait_until_ready(&config.host, port).await?;

    let mut config = config.clone();
    config.port = port;
    config.db_path = db_path;
    Ok(config)
}

async fn find_free_port(host: &str, base_port: u16) -> Result<u16> {
    for offset in 0..PORT_PROBE_RANGE {
        let port = base_port.saturating_add(offset);
        if !probe(host, port, "/health").await {
            return Ok(port);
        }
    }
    Err(CodeGraphError::StorageConnection(format!(
        "no free port found in [{base_port}, {})",
        base_port as u32 + PORT_PROBE_RANGE as u32
    )))
}

async fn wait_until_ready(host: &str, port: u16) -> Result<()> {
    let deadline = tokio::time::Instant::now() + READY_POLL_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if probe(host, port, "/version").await {
            return Ok(());
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
    Err(CodeGraphError::StorageConnection(format!(
        "graph store server at {host}:{port} did not become ready within {READY_POLL_TIMEOUT:?}"
    )))
}

/// `true` if an HTTP GET to `host:port/path` returns successfully; used both for the
/// `/health` port probe and the `/version` readiness/liveness check.
async fn probe(host: &str, port: u16, path: &str) -> bool {
    let url = format!("http://{host}:{port}{path}");
    reqwest::get(&url).await.map(|r| r.status().is_success()).unwrap_or(false)
}

/// Graceful shutdown (§4.6): TERM, wait, verify via `/version`, KILL if still alive, remove
/// the PID file either way.
pub async fn shutdown_server(workspace_root: &Path) -> Result<()> {
    let pid_file = PidFile::new(PidFile::default_path(workspace_root));
    let Some(server_pid) = pid_file.read()? else {
        return Ok(());
    };

    send_signal(server_pid.pid, nix::sys::signal::Signal::SIGTERM);
    tokio::time::sleep(SHUTDOWN_GRACE_PERIOD).await;

    if probe(&server_pid.host, server_pid.port, "/version").await {
        warn!("graph store server {} still alive after SIGTERM; sending SIGKILL", server_pid.pid);
        send_signal(server_pid.pid, nix::sys::signal::Signal::SIGKILL);
    }

    pid_file.remove()
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: nix::sys::signal::Signal) {
    let _ = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), signal);
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _signal: nix::sys::signal::Signal) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probing_an_unbound_port_returns_false() {
        assert!(!probe("127.0.0.1", 1, "/version").await);
    }
}
