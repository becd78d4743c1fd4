use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use crate::StorageError;

const F64_BYTES: u64 = 8;

/// A run that is still receiving rows.
///
/// Rows collect in an in-memory buffer of `chunk_size` rows. A full buffer is
/// written to the raw file, which grows one chunk at a time, and the buffer is
/// reset. The raw file holds little-endian `f64` values, row-major.
#[derive(Debug)]
pub(crate) struct ActiveRun {
    pub(crate) index: u64,
    pub(crate) name: String,
    pub(crate) columns: Vec<String>,
    raw_path: PathBuf,
    file: File,
    chunk_size: usize,
    buffer: Vec<f64>,
    rows_flushed: u64,
    capacity_rows: u64,
}

impl ActiveRun {
    /// Creates the raw file for a new run.
    pub(crate) fn create(
        dir: &Path,
        index: u64,
        name: String,
        columns: Vec<String>,
        chunk_size: usize,
    ) -> Result<Self, StorageError> {
        let raw_path = dir.join(format!("{name}_raw"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&raw_path)
            .map_err(|source| {
                if source.kind() == ErrorKind::AlreadyExists {
                    StorageError::NameCollision { name: name.clone() }
                } else {
                    StorageError::Io {
                        path: raw_path.clone(),
                        source,
                    }
                }
            })?;

        Ok(Self {
            index,
            name,
            buffer: Vec::with_capacity(chunk_size * columns.len()),
            columns,
            raw_path,
            file,
            chunk_size,
            rows_flushed: 0,
            capacity_rows: 0,
        })
    }

    fn width(&self) -> usize {
        self.columns.len()
    }

    fn buffered_rows(&self) -> usize {
        self.buffer.len() / self.width()
    }

    /// Total rows appended so far.
    pub(crate) fn rows(&self) -> u64 {
        self.rows_flushed + self.buffered_rows() as u64
    }

    /// Buffers a row and returns true if the buffer was flushed.
    pub(crate) fn append(&mut self, row: &[f64]) -> Result<bool, StorageError> {
        if row.len() != self.width() {
            return Err(StorageError::RowWidth {
                expected: self.width(),
                actual: row.len(),
            });
        }
        self.buffer.extend_from_slice(row);
        if self.buffered_rows() >= self.chunk_size {
            self.flush()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Writes buffered rows to the raw file.
    ///
    /// Returns false if there was nothing to write.
    pub(crate) fn flush(&mut self) -> Result<bool, StorageError> {
        if self.buffer.is_empty() {
            return Ok(false);
        }
        let row_bytes = self.width() as u64 * F64_BYTES;
        let needed = self.rows();
        if needed > self.capacity_rows {
            let chunk = self.chunk_size as u64;
            self.capacity_rows = needed.div_ceil(chunk) * chunk;
            self.file
                .set_len(self.capacity_rows * row_bytes)
                .map_err(StorageError::io(&self.raw_path))?;
        }

        let mut bytes = Vec::with_capacity(self.buffer.len() * F64_BYTES as usize);
        for value in &self.buffer {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        self.file
            .seek(SeekFrom::Start(self.rows_flushed * row_bytes))
            .and_then(|_| self.file.write_all(&bytes))
            .map_err(StorageError::io(&self.raw_path))?;

        self.rows_flushed = needed;
        self.buffer.clear();
        Ok(true)
    }

    /// Reads back every flushed row, ignoring the unused tail of the last chunk.
    pub(crate) fn read_flushed(&mut self) -> Result<Vec<f64>, StorageError> {
        let len = usize::try_from(self.rows_flushed * self.width() as u64 * F64_BYTES)
            .map_err(|_| StorageError::corrupt(&self.raw_path, "raw run too large"))?;
        let mut bytes = vec![0; len];
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_exact(&mut bytes))
            .map_err(StorageError::io(&self.raw_path))?;

        Ok(bytes
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect())
    }

    /// Deletes the raw file.
    pub(crate) fn remove(self) -> Result<(), StorageError> {
        let Self { file, raw_path, .. } = self;
        drop(file);
        fs::remove_file(&raw_path).map_err(StorageError::io(&raw_path))
    }

    #[cfg(test)]
    pub(crate) fn raw_path(&self) -> &Path {
        &self.raw_path
    }
}
