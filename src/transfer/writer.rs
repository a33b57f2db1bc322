//! Upload side of a buffered transfer
//!
//! Collects writes in a spool and performs a single overwriting upload
//! when closed. Dropping an unclosed writer uploads as well; failures on
//! that path can only be logged.

use std::io::{self, Read, Seek, SeekFrom, Write};

use tracing::{debug, error, warn};

use super::Spool;
use crate::cache::CachingClient;
use crate::fs::errors::FsResult;
use crate::fs::FileStream;
use crate::remote::{Metadata, RemoteApi, UploadBody};

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "writer already closed")
}

/// A file being written, uploaded on close
pub struct SpooledWriter<R: RemoteApi> {
    client: CachingClient<R>,
    path: String,
    /// `None` once the upload has been attempted
    spool: Option<Spool>,
    max_buffer: usize,
    /// End offset of the written content
    end: u64,
}

impl<R: RemoteApi> SpooledWriter<R> {
    /// Start a writer for `path`, buffering in memory at first
    pub fn new(client: CachingClient<R>, path: &str) -> Self {
        let max_buffer = client.config().max_buffer;
        Self {
            client,
            path: path.to_string(),
            spool: Some(Spool::memory(0)),
            max_buffer,
            end: 0,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Size of the content written so far
    pub fn len(&self) -> u64 {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end == 0
    }

    pub fn is_on_disk(&self) -> bool {
        self.spool.as_ref().is_some_and(Spool::is_on_disk)
    }

    /// Upload the buffered content, returning the stored file's metadata
    pub fn close(mut self) -> FsResult<Metadata> {
        self.finish()
    }

    fn finish(&mut self) -> FsResult<Metadata> {
        let mut spool = self.spool.take().ok_or_else(closed_error)?;

        spool.flush()?;
        let len = spool.seek(SeekFrom::End(0))?;
        spool.rewind()?;

        debug!(
            path = %self.path,
            size = len,
            on_disk = spool.is_on_disk(),
            "Uploading spooled file"
        );

        // The spool moves into the upload body and is released with it
        self.client
            .put_file(&self.path, UploadBody::new(Box::new(spool), len), true)
    }
}

impl<R: RemoteApi> Write for SpooledWriter<R> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let spool = self.spool.as_mut().ok_or_else(closed_error)?;
        spool.write_limited(buf, self.max_buffer)?;
        self.end = self.end.max(spool.stream_position()?);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.spool.as_mut() {
            Some(spool) => spool.flush(),
            None => Ok(()),
        }
    }
}

impl<R: RemoteApi> Read for SpooledWriter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.spool.as_mut().ok_or_else(closed_error)?.read(buf)
    }
}

impl<R: RemoteApi> Seek for SpooledWriter<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.spool.as_mut().ok_or_else(closed_error)?.seek(pos)
    }
}

impl<R: RemoteApi> FileStream for SpooledWriter<R> {
    fn len(&self) -> u64 {
        self.end
    }

    fn close(self: Box<Self>) -> FsResult<()> {
        (*self).close().map(|_| ())
    }
}

impl<R: RemoteApi> Drop for SpooledWriter<R> {
    fn drop(&mut self) {
        if self.spool.is_none() {
            return;
        }
        if std::thread::panicking() {
            warn!(path = %self.path, "Discarding unfinished upload while panicking");
            return;
        }
        if let Err(e) = self.finish() {
            error!(path = %self.path, error = %e, "Upload on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::fs::errors::FsError;
    use crate::remote::mock::MemoryRemote;
    use crate::remote::RemoteError;
    use crate::transfer::SpooledReader;

    const THRESHOLD: usize = 1024;

    fn client() -> CachingClient<MemoryRemote> {
        CachingClient::new(
            MemoryRemote::new(),
            CacheConfig {
                max_buffer: THRESHOLD,
                ..CacheConfig::default()
            },
        )
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn round_trip(len: usize, expect_disk: bool) {
        let client = client();
        let data = pattern(len);

        let mut writer = SpooledWriter::new(client.clone(), "/file.bin");
        for chunk in data.chunks(100) {
            writer.write_all(chunk).unwrap();
        }
        assert_eq!(writer.is_on_disk(), expect_disk);
        assert_eq!(writer.len(), len as u64);

        let meta = writer.close().unwrap();
        assert_eq!(meta.bytes, len as u64);
        assert_eq!(client.remote().calls("upload"), 1);

        let mut reader = SpooledReader::open(&client, "/file.bin").unwrap();
        assert_eq!(reader.is_on_disk(), expect_disk);
        let mut back = Vec::new();
        reader.read_to_end(&mut back).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_round_trip_below_threshold() {
        round_trip(THRESHOLD - 1, false);
    }

    #[test]
    fn test_round_trip_above_threshold() {
        round_trip(THRESHOLD + 1, true);
    }

    #[test]
    fn test_single_large_write_spills() {
        let client = client();
        let mut writer = SpooledWriter::new(client.clone(), "/one.bin");
        writer.write_all(&pattern(THRESHOLD + 1)).unwrap();
        assert!(writer.is_on_disk());
        writer.close().unwrap();
        assert_eq!(client.remote().file_data("/one.bin").unwrap().len(), THRESHOLD + 1);
    }

    #[test]
    fn test_drop_uploads() {
        let client = client();
        {
            let mut writer = SpooledWriter::new(client.clone(), "/dropped.txt");
            writer.write_all(b"scoped").unwrap();
        }
        assert_eq!(client.remote().file_data("/dropped.txt").unwrap(), b"scoped");
        assert_eq!(client.remote().calls("upload"), 1);
    }

    #[test]
    fn test_close_uploads_once() {
        let client = client();
        let mut writer = SpooledWriter::new(client.clone(), "/once.txt");
        writer.write_all(b"data").unwrap();
        writer.close().unwrap();
        assert_eq!(client.remote().calls("upload"), 1);
    }

    #[test]
    fn test_upload_failure_surfaces_on_close() {
        let client = client();
        client
            .remote()
            .fail_next("upload", RemoteError::from_status(500, "boom"));

        let mut writer = SpooledWriter::new(client.clone(), "/fail.txt");
        writer.write_all(b"data").unwrap();
        assert!(matches!(
            writer.close(),
            Err(FsError::RemoteConnection {
                op: "put_file",
                ..
            })
        ));
        assert!(!client.remote().exists("/fail.txt"));
        assert_eq!(client.remote().calls("upload"), 1);
    }

    #[test]
    fn test_len_after_seek_and_overwrite() {
        let client = client();
        let mut writer = SpooledWriter::new(client.clone(), "/edit.txt");
        writer.write_all(b"hello world").unwrap();
        writer.seek(SeekFrom::Start(0)).unwrap();
        writer.write_all(b"HELLO").unwrap();
        assert_eq!(writer.len(), 11);

        writer.seek(SeekFrom::End(0)).unwrap();
        writer.write_all(b"!").unwrap();
        assert_eq!(writer.len(), 12);

        writer.close().unwrap();
        assert_eq!(client.remote().file_data("/edit.txt").unwrap(), b"HELLO world!");
    }

    #[test]
    fn test_empty_file() {
        let client = client();
        let writer = SpooledWriter::new(client.clone(), "/empty.txt");
        writer.close().unwrap();
        assert_eq!(client.remote().file_data("/empty.txt").unwrap(), Vec::<u8>::new());
    }
}
