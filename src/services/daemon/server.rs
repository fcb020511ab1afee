//! Socket Server
//!
//! Serves the line protocol on a Unix domain socket restricted to the
//! owner. One task per client; engine work runs on the blocking pool so
//! SQLite never stalls the reactor.

use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::services::daemon::handlers::{decode_failure, dispatch, internal_failure, DaemonContext};
use crate::services::daemon::protocol::{decode_request, Request, Response};
use crate::utils::error::AppResult;

/// Socket file permissions: owner read/write only
const SOCKET_MODE: u32 = 0o600;

/// Permissions for the socket's parent and the bind staging directory
const PRIVATE_DIR_MODE: u32 = 0o700;

/// Memory daemon bound to one socket path
pub struct MemoryDaemon {
    socket_path: PathBuf,
    context: Arc<DaemonContext>,
    shutdown: CancellationToken,
}

impl MemoryDaemon {
    pub fn new(socket_path: impl Into<PathBuf>, context: DaemonContext) -> Self {
        Self {
            socket_path: socket_path.into(),
            context: Arc::new(context),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket and serve until shutdown.
    ///
    /// A stale socket file from a previous run is replaced. The socket file
    /// is removed again on exit.
    pub async fn run(self) -> AppResult<()> {
        let listener = self.bind()?;
        tracing::info!(socket = %self.socket_path.display(), "Memory daemon listening");

        let mut clients = JoinSet::new();
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let context = Arc::clone(&self.context);
                        let shutdown = self.shutdown.clone();
                        clients.spawn(async move {
                            if let Err(e) = serve_client(stream, context, shutdown).await {
                                tracing::debug!(error = %e, "Client connection closed with error");
                            }
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to accept connection"),
                },
                Some(_) = clients.join_next(), if !clients.is_empty() => {}
            }
        }

        drop(listener);
        // in-flight clients observe the token and finish their current line
        while clients.join_next().await.is_some() {}

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %e, "Failed to remove socket file");
            }
        }
        tracing::info!("Memory daemon stopped");
        Ok(())
    }

    /// Bind inside a private staging directory, restrict the socket, then
    /// rename it into place. The socket is never reachable at the public
    /// path with looser permissions.
    fn bind(&self) -> AppResult<UnixListener> {
        let parent = match self.socket_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !parent.exists() {
            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(PRIVATE_DIR_MODE)
                .create(&parent)?;
        }

        let staging = self.staging_dir(&parent);
        match std::fs::remove_dir_all(&staging) {
            Ok(()) => tracing::debug!(dir = %staging.display(), "Removed leftover staging directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        std::fs::DirBuilder::new()
            .mode(PRIVATE_DIR_MODE)
            .create(&staging)?;

        let bound = (|| -> AppResult<UnixListener> {
            let staged = staging.join("bind");
            let listener = UnixListener::bind(&staged)?;
            std::fs::set_permissions(&staged, std::fs::Permissions::from_mode(SOCKET_MODE))?;
            if std::fs::symlink_metadata(&self.socket_path).is_ok() {
                tracing::debug!(socket = %self.socket_path.display(), "Replacing stale socket");
            }
            std::fs::rename(&staged, &self.socket_path)?;
            Ok(listener)
        })();

        if let Err(e) = std::fs::remove_dir_all(&staging) {
            tracing::warn!(dir = %staging.display(), error = %e, "Failed to remove staging directory");
        }
        bound
    }

    fn staging_dir(&self, parent: &Path) -> PathBuf {
        let name = self
            .socket_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "limpha.sock".to_string());
        parent.join(format!(".{}.{}", name, std::process::id()))
    }
}

/// Read request lines until EOF, `shutdown`, or cancellation
async fn serve_client(
    stream: UnixStream,
    context: Arc<DaemonContext>,
    shutdown: CancellationToken,
) -> AppResult<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let (response, stop) = match decode_request(&line) {
            Ok(request) => {
                let stop = matches!(request, Request::Shutdown);
                (execute(&context, request).await, stop)
            }
            Err(message) => (decode_failure(message), false),
        };

        writer.write_all(response.to_line().as_bytes()).await?;
        writer.flush().await?;

        if stop {
            tracing::info!("Shutdown requested by client");
            shutdown.cancel();
            break;
        }
    }

    Ok(())
}

async fn execute(context: &Arc<DaemonContext>, request: Request) -> Response {
    let context = Arc::clone(context);
    match tokio::task::spawn_blocking(move || dispatch(&context, request)).await {
        Ok(response) => response,
        Err(e) => internal_failure(e),
    }
}
