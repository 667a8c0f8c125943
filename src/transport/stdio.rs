//! Line-delimited transport.
//!
//! - Each request is one line of JSON; lines that are not UTF-8 are
//!   answered with a parse error
//! - Each response (if any) is written back as one line
//! - Blank lines are skipped
//! - stderr stays free for logging
//!
//! Over stdin/stdout this is a debugging aid: the pipe is trusted, so no
//! permission checkers are installed.

use std::future::Future;
use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::rpc::Engine;

/// A newline-delimited transport over any reader/writer pair.
pub struct LineTransport<R, W> {
    /// Buffered request reader.
    reader: BufReader<R>,
    /// Response writer.
    writer: W,
}

/// The transport bound to the process's stdin and stdout.
pub type StdioTransport = LineTransport<tokio::io::Stdin, tokio::io::Stdout>;

impl StdioTransport {
    /// Creates a transport on stdin/stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a transport over `reader` and `writer`.
    #[must_use]
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    /// Reads the next line as raw bytes, without its line ending.
    ///
    /// Returns `None` once the reader is closed (EOF).
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub async fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        let bytes_read = self.reader.read_until(b'\n', &mut line).await?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if line.ends_with(b"\n") {
            line.pop();
            if line.ends_with(b"\r") {
                line.pop();
            }
        }

        Ok(Some(line))
    }

    /// Writes one encoded response followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub async fn write_line(&mut self, json: &str) -> io::Result<()> {
        debug_assert!(
            !json.contains('\n'),
            "encoded responses must not contain embedded newlines"
        );

        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    /// Serves requests until EOF or until `shutdown` completes.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    pub async fn serve<F>(&mut self, engine: &Arc<Engine>, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested, closing line transport");
                    return Ok(());
                }

                line = self.read_line() => {
                    let Some(line) = line? else {
                        debug!("Input closed");
                        return Ok(());
                    };
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    if let Some(response) = engine.handle_bytes(&line) {
                        self.write_line(&response).await?;
                    }
                }
            }
        }
    }
}
