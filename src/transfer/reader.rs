//! Download side of a buffered transfer
//!
//! Fetches the whole remote file once on open, then serves reads and
//! seeks from the local spool with no further remote calls.

use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::debug;

use super::Spool;
use crate::cache::CachingClient;
use crate::fs::errors::{FsError, FsResult};
use crate::fs::FileStream;
use crate::remote::{Download, RemoteApi};

/// Bytes moved from the response body per read
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// A downloaded file, readable and seekable locally
pub struct SpooledReader {
    path: String,
    spool: Spool,
    len: u64,
}

impl SpooledReader {
    /// Download `path` into a spool
    ///
    /// Files whose declared length is below the client's buffer threshold
    /// are held in memory, larger ones in a temp file.
    pub fn open<R: RemoteApi>(client: &CachingClient<R>, path: &str) -> FsResult<Self> {
        let max_buffer = client.config().max_buffer;
        let Download {
            mut body,
            content_length,
        } = client.get_file(path)?;

        let mut spool = if content_length < max_buffer as u64 {
            Spool::memory(content_length as usize)
        } else {
            Spool::disk()?
        };

        let len = copy_body(&mut body, &mut spool, max_buffer).map_err(|e| {
            debug!(path = path, error = %e, "Download interrupted");
            FsError::RemoteConnection {
                op: "get_file",
                path: path.to_string(),
                status: None,
            }
        })?;
        spool.rewind()?;

        debug!(
            path = path,
            size = len,
            on_disk = spool.is_on_disk(),
            "Downloaded file into spool"
        );

        Ok(Self {
            path: path.to_string(),
            spool,
            len,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of bytes downloaded
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_on_disk(&self) -> bool {
        self.spool.is_on_disk()
    }
}

/// Copy a response body into the spool, spilling if it outgrows memory
fn copy_body(body: &mut dyn Read, spool: &mut Spool, max_buffer: usize) -> io::Result<u64> {
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        spool.write_limited(&buf[..n], max_buffer)?;
        total += n as u64;
    }
}

impl Read for SpooledReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.spool.read(buf)
    }
}

impl Seek for SpooledReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.spool.seek(pos)
    }
}

impl Write for SpooledReader {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("{} was opened for reading", self.path),
        ))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileStream for SpooledReader {
    fn len(&self) -> u64 {
        self.len
    }

    fn close(self: Box<Self>) -> FsResult<()> {
        Ok(())
    }
}
