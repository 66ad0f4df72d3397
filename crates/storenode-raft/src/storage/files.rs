//! Durable file helpers for the raft store

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Replace `path` with `bytes` via write-to-temp + rename
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

/// Contents of `path`, or `None` if it does not exist
pub(crate) fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Records read back from a [`LogFile`]
#[derive(Debug, Default)]
pub(crate) struct LogRecords {
    pub records: Vec<Vec<u8>>,
    /// A partially written record was found at the end of the file and skipped
    pub torn_tail: bool,
}

/// Append-only file of `[u32 LE length][record]` frames
#[derive(Debug, Clone)]
pub(crate) struct LogFile {
    path: PathBuf,
}

impl LogFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append<'a>(&self, records: impl IntoIterator<Item = &'a [u8]>) -> io::Result<()> {
        let buf = frame(records);
        if buf.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(&buf)?;
        file.sync_data()
    }

    /// Replace the whole file with `records`
    pub fn rewrite<'a>(&self, records: impl IntoIterator<Item = &'a [u8]>) -> io::Result<()> {
        write_atomic(&self.path, &frame(records))
    }

    pub fn read(&self) -> io::Result<LogRecords> {
        let Some(bytes) = read_optional(&self.path)? else {
            return Ok(LogRecords::default());
        };

        let mut out = LogRecords::default();
        let mut pos = 0usize;
        while pos < bytes.len() {
            let Some(header) = bytes.get(pos..pos + 4) else {
                out.torn_tail = true;
                break;
            };
            let len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
            pos += 4;
            let Some(record) = bytes.get(pos..pos + len) else {
                out.torn_tail = true;
                break;
            };
            out.records.push(record.to_vec());
            pos += len;
        }
        Ok(out)
    }
}

fn frame<'a>(records: impl IntoIterator<Item = &'a [u8]>) -> Vec<u8> {
    let mut buf = Vec::new();
    for record in records {
        buf.extend_from_slice(&(record.len() as u32).to_le_bytes());
        buf.extend_from_slice(record);
    }
    buf
}
