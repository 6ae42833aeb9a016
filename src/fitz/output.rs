//! Output sink
//!
//! Seekable, buffered destination for the serialized document. The two-pass
//! linearized write seeks back to the start of the file between passes, and
//! the xref/trailer emitters need `tell` to record byte offsets.

use crate::fitz::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

/// Destination a writer can emit into
pub trait OutputWriter: Write {
    /// Seek to a position, returning the new position
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Current position
    fn tell(&mut self) -> Result<u64>;

    /// Truncate at the current position
    fn truncate(&mut self) -> Result<()>;

    /// Backing bytes, when the destination is in memory
    fn data(&self) -> Option<&[u8]> {
        None
    }
}

/// Output stream for writing a document
pub struct Output {
    writer: Box<dyn OutputWriter>,
}

impl Output {
    /// Open a file destination. `append` keeps the existing contents
    /// (incremental update); otherwise the file is truncated.
    pub fn from_path<P: AsRef<Path>>(path: P, append: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .read(false)
            .create(true)
            .truncate(!append)
            .open(path)
            .map_err(Error::System)?;
        Ok(Self {
            writer: Box::new(FileOutput::new(file)),
        })
    }

    /// An in-memory destination, inspectable through [`Output::data`].
    pub fn memory() -> Self {
        Self {
            writer: Box::new(MemoryOutput::new()),
        }
    }

    pub fn from_writer<W: OutputWriter + 'static>(writer: W) -> Self {
        Self {
            writer: Box::new(writer),
        }
    }

    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data).map_err(Error::System)
    }

    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_data(s.as_bytes())
    }

    pub fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.write_data(&[byte])
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.writer.seek(pos)
    }

    pub fn tell(&mut self) -> Result<i64> {
        Ok(self.writer.tell()? as i64)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(Error::System)
    }

    /// Flush and release the destination
    pub fn close(&mut self) -> Result<()> {
        self.flush()
    }

    pub fn truncate(&mut self) -> Result<()> {
        self.writer.truncate()
    }

    /// Bytes written so far, for memory destinations
    pub fn data(&self) -> Option<&[u8]> {
        self.writer.data()
    }
}

// ============================================================================
// File output
// ============================================================================

struct FileOutput {
    file: BufWriter<File>,
}

impl FileOutput {
    fn new(file: File) -> Self {
        Self {
            file: BufWriter::new(file),
        }
    }
}

impl Write for FileOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl OutputWriter for FileOutput {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Seek::seek(&mut self.file, pos).map_err(Error::System)
    }

    fn tell(&mut self) -> Result<u64> {
        self.file.stream_position().map_err(Error::System)
    }

    fn truncate(&mut self) -> Result<()> {
        self.file.flush().map_err(Error::System)?;
        let pos = self.tell()?;
        self.file.get_ref().set_len(pos).map_err(Error::System)
    }
}

// ============================================================================
// Memory output
// ============================================================================

pub struct MemoryOutput {
    data: Vec<u8>,
    position: usize,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            position: 0,
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Default for MemoryOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.position >= self.data.len() {
            self.data.resize(self.position, 0);
            self.data.extend_from_slice(buf);
        } else {
            let end = self.position + buf.len();
            if end > self.data.len() {
                let overwrite = self.data.len() - self.position;
                self.data[self.position..].copy_from_slice(&buf[..overwrite]);
                self.data.extend_from_slice(&buf[overwrite..]);
            } else {
                self.data[self.position..end].copy_from_slice(buf);
            }
        }
        self.position += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputWriter for MemoryOutput {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::Current(n) => self.position as i64 + n,
            SeekFrom::End(n) => self.data.len() as i64 + n,
        };
        if new_pos < 0 {
            return Err(Error::generic("seek before start of output"));
        }
        self.position = new_pos as usize;
        Ok(self.position as u64)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.position as u64)
    }

    fn truncate(&mut self) -> Result<()> {
        self.data.truncate(self.position);
        Ok(())
    }

    fn data(&self) -> Option<&[u8]> {
        Some(&self.data)
    }
}
