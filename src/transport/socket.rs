//! Unix domain socket server.
//!
//! One request per connection: the server reads until the bytes form a
//! complete JSON document, the peer closes its write side, or the peer goes
//! quiet for `read_timeout_ms`. It then answers and closes the connection.
//! At most `backlog` connections are served at once.
//!
//! # Files
//!
//! - `lock_path` holds the pid of the serving process; a second server
//!   refuses to start while that process is alive
//! - `sock_path` is unlinked before bind (it can only be a leftover once the
//!   lock is held) and again on shutdown

use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::io::{self, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::rpc::{Context, Engine, Errata, HandlerOptions};

const READ_CHUNK: usize = 1024;
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

/// Bounds on reading one request.
#[derive(Debug, Clone, Copy)]
struct ReadLimits {
    max_size: usize,
    timeout: Duration,
}

/// Errata code: the peer's uid may not call restricted handlers.
pub const PEER_NOT_ALLOWED: i32 = 1;
/// Errata code: the peer's credentials could not be read.
pub const PEER_UNKNOWN: i32 = 2;

/// Serves an [`Engine`] on a Unix domain socket.
#[derive(Debug)]
pub struct IpcSocketServer {
    engine: Arc<Engine>,
    config: TransportConfig,
}

impl IpcSocketServer {
    /// Creates a server; nothing is bound until [`IpcSocketServer::run`].
    #[must_use]
    pub const fn new(engine: Arc<Engine>, config: TransportConfig) -> Self {
        Self { engine, config }
    }

    /// Binds the socket and serves connections until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be taken, the socket cannot be
    /// bound, or accepting fails more often than
    /// `max_retries_on_transient_errors` in a row.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()>,
    {
        let _lock = LockFile::acquire(&self.config.lock_path())?;
        let sock_path = self.config.sock_path.as_path();
        let listener = bind(sock_path)?;
        let _socket = SocketFile(sock_path.to_path_buf());

        let owner_uid = if self.config.restricted_api {
            Some(
                fs::metadata(sock_path)
                    .map_err(|source| TransportError::Bind {
                        path: sock_path.to_path_buf(),
                        source,
                    })?
                    .uid(),
            )
        } else {
            None
        };

        info!(
            socket = %sock_path.display(),
            restricted = self.config.restricted_api,
            "Listening for admin requests"
        );

        let permits = Arc::new(Semaphore::new(self.config.backlog));
        let mut failures = 0_u32;
        tokio::pin!(shutdown);

        loop {
            // A free slot first, so a server at capacity still sees shutdown.
            let permit = tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, closing admin socket");
                    return Ok(());
                }
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return Ok(()),
                },
            };

            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, closing admin socket");
                    return Ok(());
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            failures = 0;
                            let engine = Arc::clone(&self.engine);
                            let limits = ReadLimits {
                                max_size: self.config.max_message_size,
                                timeout: self.config.read_timeout(),
                            };
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, engine, limits, owner_uid).await {
                                    warn!(error = %e, "Admin connection failed");
                                }
                                drop(permit);
                            });
                        }
                        Err(e) if is_transient(&e) => {
                            failures += 1;
                            if failures > self.config.max_retries_on_transient_errors {
                                return Err(TransportError::Accept { attempts: failures, source: e });
                            }
                            debug!(error = %e, failures, "Transient accept error, retrying");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                        Err(e) => {
                            return Err(TransportError::Accept { attempts: failures + 1, source: e });
                        }
                    }
                }
            }
        }
    }
}

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::OutOfMemory
    )
}

fn bind(path: &Path) -> Result<UnixListener, TransportError> {
    match fs::remove_file(path) {
        Ok(()) => debug!(socket = %path.display(), "Removed stale socket file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(TransportError::Bind {
                path: path.to_path_buf(),
                source,
            })
        }
    }
    UnixListener::bind(path).map_err(|source| TransportError::Bind {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads one request, answers it, and closes the connection.
async fn handle_connection(
    mut stream: UnixStream,
    engine: Arc<Engine>,
    limits: ReadLimits,
    owner_uid: Option<u32>,
) -> Result<(), TransportError> {
    let Some(raw) = read_request(&mut stream, limits).await? else {
        debug!("No request received, closing");
        return Ok(());
    };

    let mut ctx = Context::new();
    if let Some(owner) = owner_uid {
        let peer_uid = stream.peer_cred().ok().map(|cred| cred.uid());
        ctx.add_permission_checker(peer_uid_checker(owner, peer_uid));
    }
    debug!(bytes = raw.len(), checkers = ctx.checker_count(), "Serving admin request");

    let response = tokio::task::spawn_blocking(move || engine.handle_bytes_with_context(&ctx, &raw))
        .await
        .map_err(io::Error::other)?;

    if let Some(text) = response {
        stream.write_all(text.as_bytes()).await?;
        stream.flush().await?;
    }
    stream.shutdown().await?;
    Ok(())
}

/// Builds the checker letting root and the socket owner through.
pub fn peer_uid_checker(
    owner_uid: u32,
    peer_uid: Option<u32>,
) -> impl Fn(&HandlerOptions, &mut Errata) + Send + Sync + 'static {
    move |_options: &HandlerOptions, errata: &mut Errata| match peer_uid {
        Some(uid) if uid == 0 || uid == owner_uid => {}
        Some(uid) => {
            errata.push(
                PEER_NOT_ALLOWED,
                format!("uid {uid} may not call restricted handlers"),
            );
        }
        None => {
            errata.push(PEER_UNKNOWN, "peer credentials unavailable");
        }
    }
}

/// Reads until the buffer holds a complete JSON document, the peer stops
/// writing, or a read waits longer than `limits.timeout`.
///
/// A deadline hit after some bytes arrived hands over what was read, and the
/// engine answers it with a parse error. Returns `None` if the peer sent
/// nothing.
async fn read_request(stream: &mut UnixStream, limits: ReadLimits) -> io::Result<Option<Vec<u8>>> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; READ_CHUNK];

    loop {
        let Ok(read) = tokio::time::timeout(limits.timeout, stream.read(&mut chunk)).await else {
            debug!(bytes = buffer.len(), "Read deadline passed");
            break;
        };
        let n = read?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.len() > limits.max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("request exceeds {} bytes", limits.max_size),
            ));
        }
        if is_complete(&buffer) {
            break;
        }
    }

    Ok((!buffer.is_empty()).then_some(buffer))
}

/// Whether more bytes could still turn `buffer` into valid JSON.
///
/// Syntax errors count as complete: the engine answers them with a parse
/// error instead of waiting for data that will not fix them.
fn is_complete(buffer: &[u8]) -> bool {
    match serde_json::from_slice::<serde::de::IgnoredAny>(buffer) {
        Ok(_) => true,
        Err(e) => !e.is_eof(),
    }
}

/// Removes the socket file when dropped.
struct SocketFile(PathBuf);

impl Drop for SocketFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.0) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                warn!(file = %self.0.display(), error = %error, "failed to remove socket file");
            }
            _ => {}
        }
    }
}

/// Exclusive lock file holding the owner's pid. Removed on drop.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    _file: File,
}

impl LockFile {
    /// Creates the lock file, replacing it if the process that wrote it is
    /// gone.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AlreadyRunning`] if a live process holds
    /// the lock, or [`TransportError::Lock`] if the file cannot be handled.
    pub fn acquire(path: &Path) -> Result<Self, TransportError> {
        match create_lock(path) {
            Ok(file) => Ok(Self::held(path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if !holder_is_gone(path) {
                    return Err(TransportError::AlreadyRunning {
                        path: path.to_path_buf(),
                    });
                }
                warn!(file = %path.display(), "Replacing stale lock file");
                fs::remove_file(path).map_err(|source| TransportError::Lock {
                    path: path.to_path_buf(),
                    source,
                })?;
                create_lock(path)
                    .map(|file| Self::held(path, file))
                    .map_err(|source| TransportError::Lock {
                        path: path.to_path_buf(),
                        source,
                    })
            }
            Err(source) => Err(TransportError::Lock {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn held(path: &Path, file: File) -> Self {
        debug!(file = %path.display(), "Acquired lock file");
        Self {
            path: path.to_path_buf(),
            _file: file,
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                warn!(file = %self.path.display(), error = %error, "failed to remove lock file");
            }
            _ => {}
        }
    }
}

fn create_lock(path: &Path) -> io::Result<File> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    writeln!(file, "{}", std::process::id())?;
    file.sync_all()?;
    Ok(file)
}

/// A lock is stale when it names a pid that no longer exists. Without
/// `/proc` liveness cannot be told, so the lock is assumed held.
fn holder_is_gone(path: &Path) -> bool {
    let Ok(contents) = fs::read_to_string(path) else {
        return false;
    };
    let Ok(pid) = contents.trim().parse::<u32>() else {
        return false;
    };
    let proc_root = Path::new("/proc");
    proc_root.is_dir() && !proc_root.join(pid.to_string()).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completeness_of_partial_documents() {
        assert!(is_complete(br#"{"method":"m","id":1}"#));
        assert!(is_complete(br#"[{"method":"m"}]  "#));
        assert!(!is_complete(br#"{"method":"m","#));
        assert!(!is_complete(b""));
        assert!(is_complete(b"{oops"));
    }

    #[test]
    fn peer_checker_allows_root_and_owner() {
        let mut errata = Errata::new();
        peer_uid_checker(1000, Some(0))(&HandlerOptions::RESTRICTED, &mut errata);
        peer_uid_checker(1000, Some(1000))(&HandlerOptions::RESTRICTED, &mut errata);
        assert!(errata.is_ok());

        peer_uid_checker(1000, Some(1001))(&HandlerOptions::RESTRICTED, &mut errata);
        peer_uid_checker(1000, None)(&HandlerOptions::RESTRICTED, &mut errata);
        let codes: Vec<i32> = errata.iter().map(|a| a.code).collect();
        assert_eq!(codes, vec![PEER_NOT_ALLOWED, PEER_UNKNOWN]);
    }

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.lock");

        let lock = LockFile::acquire(&path).unwrap();
        assert_eq!(lock.path(), path.as_path());
        assert!(matches!(
            LockFile::acquire(&path),
            Err(TransportError::AlreadyRunning { .. })
        ));

        drop(lock);
        assert!(!path.exists());
        assert!(LockFile::acquire(&path).is_ok());
    }

    #[test]
    fn unparsable_lock_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.lock");
        fs::write(&path, "").unwrap();
        assert!(matches!(
            LockFile::acquire(&path),
            Err(TransportError::AlreadyRunning { .. })
        ));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn stale_lock_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("admin.lock");
        // Beyond the kernel's pid_max, so no such process can exist.
        fs::write(&path, "4194305\n").unwrap();

        let lock = LockFile::acquire(&path).unwrap();
        let contents = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }
}
