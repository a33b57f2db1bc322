//! Buffered transfers
//!
//! Uploads and downloads are staged through a spool that lives in memory
//! up to a threshold and moves to an anonymous temp file beyond it. The
//! move happens at most once; a spool never returns to memory.

pub mod reader;
pub mod writer;

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use tracing::debug;

pub use reader::SpooledReader;
pub use writer::SpooledWriter;

/// Backing storage of a transfer
#[derive(Debug)]
pub enum Spool {
    Memory(Cursor<Vec<u8>>),
    Disk(File),
}

impl Spool {
    /// Empty in-memory spool
    pub fn memory(capacity: usize) -> Self {
        Spool::Memory(Cursor::new(Vec::with_capacity(capacity)))
    }

    /// Empty spool backed by an anonymous temp file
    pub fn disk() -> io::Result<Self> {
        Ok(Spool::Disk(tempfile::tempfile()?))
    }

    pub fn is_on_disk(&self) -> bool {
        matches!(self, Spool::Disk(_))
    }

    /// Copy buffered bytes into a temp file and continue there
    ///
    /// The current position is preserved. No-op once on disk.
    pub fn spill(&mut self) -> io::Result<()> {
        if let Spool::Memory(cursor) = self {
            let mut file = tempfile::tempfile()?;
            file.write_all(cursor.get_ref())?;
            file.seek(SeekFrom::Start(cursor.position()))?;
            debug!(
                bytes = cursor.get_ref().len(),
                "Spool exceeded memory buffer, switched to temp file"
            );
            *self = Spool::Disk(file);
        }
        Ok(())
    }

    /// Write all of `buf`, spilling first if memory would exceed `max_buffer`
    pub fn write_limited(&mut self, buf: &[u8], max_buffer: usize) -> io::Result<()> {
        let overflow = match self {
            Spool::Memory(cursor) => cursor.position() as usize + buf.len() > max_buffer,
            Spool::Disk(_) => false,
        };
        if overflow {
            self.spill()?;
        }
        self.write_all(buf)
    }
}

impl Read for Spool {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Spool::Memory(cursor) => cursor.read(buf),
            Spool::Disk(file) => file.read(buf),
        }
    }
}

impl Write for Spool {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Spool::Memory(cursor) => cursor.write(buf),
            Spool::Disk(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Spool::Memory(_) => Ok(()),
            Spool::Disk(file) => file.flush(),
        }
    }
}

impl Seek for Spool {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Spool::Memory(cursor) => cursor.seek(pos),
            Spool::Disk(file) => file.seek(pos),
        }
    }
}
