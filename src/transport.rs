//! Byte transports: local files, in-memory buffers, and network peers, with
//! optional pass-through decompression.
//!
//! Compressed file sources are not decompressed in-process. The transport
//! provisions a named pipe inside a private scratch directory, spawns the
//! external `gzip`/`zstd` tool with its output redirected into the pipe, and
//! reads the pipe in place of the raw source. The pipe and scratch directory
//! are removed on close, on drop, and on open failure.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};
use std::time::Duration;

use log::{debug, warn};
use tempfile::TempDir;
use thiserror::Error;

/// Errors opening, reading, or closing a byte transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The source file could not be opened.
    #[error("Cannot open {}: {source}", path.display())]
    Source { path: PathBuf, source: io::Error },
    /// The network peer could not be reached.
    #[error("Cannot reach peer {addr}: {source}")]
    Peer { addr: SocketAddr, source: io::Error },
    /// The named decompression pipe could not be provisioned.
    #[error("Cannot provision a decompression pipe: {0}")]
    Pipe(io::Error),
    /// The external decompression tool could not be spawned.
    #[error("Cannot spawn the {tool} pipeline: {source}")]
    Pipeline { tool: &'static str, source: io::Error },
    /// The external decompression tool exited unsuccessfully.
    #[error("The {tool} pipeline exited with {status}.")]
    PipelineExit { tool: &'static str, status: ExitStatus },
    /// An unrecoverable error reading the stream.
    #[error("Cannot read the stream: {0}")]
    Read(#[from] io::Error),
}

/// Where a stream's bytes come from.
#[derive(Debug, Clone)]
pub enum Source {
    /// A local file, possibly transport-compressed.
    File(PathBuf),
    /// A raw in-memory buffer.
    Memory(Vec<u8>),
    /// A network peer serving the stream.
    Peer(SocketAddr),
}

/// Transport-level compression applied to a file source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Decide from the source name's suffix (`.gz`, `.zst`).
    #[default]
    Auto,
    /// Read the source as-is.
    None,
    /// Feed the source through `gzip -d`.
    Gzip,
    /// Feed the source through `zstd -d`.
    Zstd,
}

impl Compression {
    /// Resolve `Auto` against a source path's suffix.
    fn resolve(self, path: &Path) -> Compression {
        if self != Compression::Auto {
            return self;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some("zst") => Compression::Zstd,
            Some("gz") => Compression::Gzip,
            _ => Compression::None,
        }
    }

    fn tool(self) -> Option<&'static str> {
        match self {
            Compression::Gzip => Some("gzip"),
            Compression::Zstd => Some("zstd"),
            _ => None,
        }
    }
}

/// A spawned decompression tool feeding a named pipe in a scratch directory.
///
/// Dropping tears both down; [`Pipeline::finish`] additionally surfaces a
/// non-zero exit.
#[derive(Debug)]
struct Pipeline {
    tool: &'static str,
    child: Child,
    _scratch: TempDir,
}

impl Pipeline {
    fn finish(mut self) -> Result<(), TransportError> {
        let status = match self.child.try_wait() {
            Ok(Some(status)) => status,
            // Still running: the consumer stopped early. Tear it down.
            Ok(None) => {
                self.child.kill().ok();
                return Ok(());
            }
            Err(err) => return Err(TransportError::Read(err)),
        };

        if status.success() {
            Ok(())
        } else {
            Err(TransportError::PipelineExit {
                tool: self.tool,
                status,
            })
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            self.child.kill().ok();
        }
        if let Err(err) = self.child.wait() {
            warn!("failed to reap {} pipeline: {err}", self.tool);
        }
    }
}

#[derive(Debug)]
enum Inner {
    File(File),
    Memory(Cursor<Vec<u8>>),
    Peer(TcpStream),
}

/// An open byte source.
#[derive(Debug)]
pub struct Transport {
    inner: Inner,
    pipeline: Option<Pipeline>,
}

impl Transport {
    /// Open a byte source.
    ///
    /// `timeout` (seconds) bounds blocking reads on network peers; zero
    /// blocks indefinitely. Compression other than [`Compression::None`]
    /// applies to file sources only and is ignored with a warning elsewhere.
    pub fn open(
        source: Source,
        timeout: u32,
        compression: Compression,
    ) -> Result<Transport, TransportError> {
        let (inner, pipeline) = match source {
            Source::File(path) => match compression.resolve(&path).tool() {
                None => {
                    let file = File::open(&path)
                        .map_err(|source| TransportError::Source { path, source })?;
                    (Inner::File(file), None)
                }
                Some(tool) => {
                    let (file, pipeline) = spawn_pipeline(&path, tool)?;
                    (Inner::File(file), Some(pipeline))
                }
            },
            Source::Memory(bytes) => {
                if compression.tool().is_some() {
                    warn!("ignoring {compression:?} compression on a memory source");
                }
                (Inner::Memory(Cursor::new(bytes)), None)
            }
            Source::Peer(addr) => {
                if compression.tool().is_some() {
                    warn!("ignoring {compression:?} compression on a peer source");
                }
                let stream = connect(addr, timeout)
                    .map_err(|source| TransportError::Peer { addr, source })?;
                (Inner::Peer(stream), None)
            }
        };

        Ok(Transport { inner, pipeline })
    }

    /// Read exactly `buf.len()` bytes, retrying short reads.
    ///
    /// Returns `Ok(false)` on end-of-stream. A stream ending inside the
    /// requested span is reported as end-of-stream with a logged warning,
    /// not as an error.
    pub fn read_full(&mut self, buf: &mut [u8]) -> io::Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => {
                    if filled != 0 {
                        warn!("stream ended {} bytes into a record", filled);
                    }
                    return Ok(false);
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(true)
    }

    /// Release the source, surfacing a decompression pipeline's failure.
    pub fn close(&mut self) -> Result<(), TransportError> {
        match self.pipeline.take() {
            Some(pipeline) => pipeline.finish(),
            None => Ok(()),
        }
    }
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            Inner::File(file) => file.read(buf),
            Inner::Memory(cursor) => cursor.read(buf),
            Inner::Peer(stream) => match stream.read(buf) {
                // A bounded wait expiring with no data ends the stream.
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    debug!("peer read timed out; treating as end of stream");
                    Ok(0)
                }
                other => other,
            },
        }
    }
}

fn connect(addr: SocketAddr, timeout: u32) -> io::Result<TcpStream> {
    let stream = if timeout == 0 {
        TcpStream::connect(addr)?
    } else {
        TcpStream::connect_timeout(&addr, Duration::from_secs(timeout.into()))?
    };

    if timeout != 0 {
        stream.set_read_timeout(Some(Duration::from_secs(timeout.into())))?;
    }

    Ok(stream)
}

/// Provision a named pipe and spawn `tool` decompressing `path` into it.
fn spawn_pipeline(path: &Path, tool: &'static str) -> Result<(File, Pipeline), TransportError> {
    let scratch = tempfile::Builder::new()
        .prefix("fcio-")
        .tempdir()
        .map_err(TransportError::Pipe)?;

    let name = path.file_name().unwrap_or("stream".as_ref());
    let pipe = scratch.path().join(name);
    nix::unistd::mkfifo(&pipe, nix::sys::stat::Mode::from_bits_truncate(0o600))
        .map_err(|errno| TransportError::Pipe(io::Error::from_raw_os_error(errno as i32)))?;

    // The tool opens the pipe's write end itself (opening it here would block
    // with no reader attached yet). `exec` keeps the shell from lingering.
    let child = Command::new("sh")
        .arg("-c")
        .arg(format!(r#"exec {tool} -qdc -- "$0" > "$1""#))
        .arg(path)
        .arg(&pipe)
        .spawn()
        .map_err(|source| TransportError::Pipeline { tool, source })?;

    debug!("decompressing {} through {tool} (pid {})", path.display(), child.id());

    let pipeline = Pipeline {
        tool,
        child,
        _scratch: scratch,
    };

    // Blocks until the tool opens the write end, then streams from it.
    let file = File::open(&pipe).map_err(TransportError::Pipe)?;

    Ok((file, pipeline))
}
