use std::{
    ffi::OsString,
    fs::{self, File},
    io::{BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use crc32c::crc32c;
use flate2::{Compression, read::GzDecoder, write::GzEncoder};

use crate::StorageError;

const DATASET_MAGIC: &[u8; 4] = b"HSDS";
const DATASET_VERSION: u32 = 1;
pub(crate) const DATASET_EXTENSION: &str = "dset";

/// A finalized, read-only run.
///
/// Rows are stored row-major with the column order fixed when the run began.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    name: String,
    index: u64,
    columns: Vec<String>,
    values: Vec<f64>,
}

impl Dataset {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Family index of the run.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len() / self.columns.len().max(1)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        let width = self.columns.len();
        (i < self.len()).then(|| &self.values[i * width..(i + 1) * width])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.columns.len().max(1))
    }

    /// Returns every value of the named column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows().map(|row| row[index]).collect())
    }

    /// Writes all rows as comma-separated text with a header of column names.
    ///
    /// Values are written in their shortest round-trip form.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the file cannot be written.
    pub fn export_flat(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(StorageError::io(path))?;
        let mut out = BufWriter::new(file);

        let write_rows = |out: &mut BufWriter<File>| -> std::io::Result<()> {
            writeln!(out, "{}", self.columns.join(","))?;
            for row in self.rows() {
                let mut first = true;
                for value in row {
                    if !first {
                        out.write_all(b",")?;
                    }
                    write!(out, "{value}")?;
                    first = false;
                }
                out.write_all(b"\n")?;
            }
            out.flush()
        };
        write_rows(&mut out).map_err(StorageError::io(path))?;

        tracing::debug!(path = ?path, rows = self.len(), "exported dataset");
        Ok(())
    }

    pub(crate) fn read(name: &str, index: u64, path: &Path) -> Result<Self, StorageError> {
        let bytes = fs::read(path).map_err(StorageError::io(path))?;
        let (columns, values) = decode(path, &bytes)?;
        Ok(Self {
            name: name.to_string(),
            index,
            columns,
            values,
        })
    }
}

/// Encodes a dataset file: header, gzip payload of little-endian rows, and a
/// `crc32c` trailer over everything before it.
pub(crate) fn encode(columns: &[String], values: &[f64]) -> std::io::Result<Vec<u8>> {
    let width = columns.len().max(1);
    let rows = (values.len() / width) as u64;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for value in values {
        encoder.write_all(&value.to_le_bytes())?;
    }
    let payload = encoder.finish()?;

    let mut buf = Vec::with_capacity(payload.len() + 64);
    buf.extend_from_slice(DATASET_MAGIC);
    buf.extend_from_slice(&DATASET_VERSION.to_le_bytes());
    buf.extend_from_slice(&len_u32(columns.len())?.to_le_bytes());
    for column in columns {
        buf.extend_from_slice(&len_u32(column.len())?.to_le_bytes());
        buf.extend_from_slice(column.as_bytes());
    }
    buf.extend_from_slice(&rows.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    buf.extend_from_slice(&payload);

    let crc = crc32c(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    Ok(buf)
}

fn len_u32(len: usize) -> std::io::Result<u32> {
    u32::try_from(len).map_err(|_| std::io::Error::other("length does not fit in u32"))
}

fn decode(path: &Path, bytes: &[u8]) -> Result<(Vec<String>, Vec<f64>), StorageError> {
    let corrupt = |reason: &str| StorageError::corrupt(path, reason);

    if bytes.len() < DATASET_MAGIC.len() + 4 {
        return Err(corrupt("file too short"));
    }
    let (body, trailer) = bytes.split_at(bytes.len() - 4);
    let expected_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if crc32c(body) != expected_crc {
        return Err(corrupt("checksum mismatch"));
    }
    if &body[..DATASET_MAGIC.len()] != DATASET_MAGIC {
        return Err(corrupt("bad magic"));
    }

    let mut offset = DATASET_MAGIC.len();
    let version = read_u32_le(body, &mut offset).ok_or_else(|| corrupt("truncated header"))?;
    if version != DATASET_VERSION {
        return Err(corrupt(&format!("unsupported version {version}")));
    }

    let num_columns =
        read_u32_le(body, &mut offset).ok_or_else(|| corrupt("truncated header"))? as usize;
    let mut columns = Vec::with_capacity(num_columns.min(1024));
    for _ in 0..num_columns {
        let len = read_u32_le(body, &mut offset).ok_or_else(|| corrupt("truncated header"))?;
        let raw = take(body, &mut offset, len as usize).ok_or_else(|| corrupt("truncated header"))?;
        let name = std::str::from_utf8(raw).map_err(|_| corrupt("column name is not utf-8"))?;
        columns.push(name.to_string());
    }

    let rows = read_u64_le(body, &mut offset).ok_or_else(|| corrupt("truncated header"))?;
    let payload_len =
        read_u64_le(body, &mut offset).ok_or_else(|| corrupt("truncated header"))?;
    let payload = usize::try_from(payload_len)
        .ok()
        .and_then(|len| take(body, &mut offset, len))
        .ok_or_else(|| corrupt("truncated payload"))?;
    if offset != body.len() {
        return Err(corrupt("trailing bytes after payload"));
    }

    let mut raw = Vec::new();
    GzDecoder::new(payload)
        .read_to_end(&mut raw)
        .map_err(|_| corrupt("payload does not decompress"))?;

    let expected_len = usize::try_from(rows)
        .ok()
        .and_then(|rows| rows.checked_mul(num_columns))
        .and_then(|n| n.checked_mul(8));
    if expected_len != Some(raw.len()) {
        return Err(corrupt("payload size does not match row count"));
    }

    let values = raw
        .chunks_exact(8)
        .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
        .collect();
    Ok((columns, values))
}

fn take<'a>(bytes: &'a [u8], offset: &mut usize, len: usize) -> Option<&'a [u8]> {
    let end = offset.checked_add(len)?;
    let slice = bytes.get(*offset..end)?;
    *offset = end;
    Some(slice)
}

fn read_u32_le(bytes: &[u8], offset: &mut usize) -> Option<u32> {
    let slice = take(bytes, offset, 4)?;
    Some(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn read_u64_le(bytes: &[u8], offset: &mut usize) -> Option<u64> {
    let slice = take(bytes, offset, 8)?;
    Some(u64::from_le_bytes([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ]))
}

/// Writes `bytes` to a temporary sibling of `path`, syncs it, and renames it
/// into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp_path = tmp_sibling(path);
    let mut file = File::create(&tmp_path).map_err(StorageError::io(&tmp_path))?;
    file.write_all(bytes).map_err(StorageError::io(&tmp_path))?;
    file.sync_all().map_err(StorageError::io(&tmp_path))?;
    fs::rename(&tmp_path, path).map_err(StorageError::io(path))
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map_or_else(OsString::new, OsString::from);
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["t".into(), "p".into()]
    }

    #[test]
    fn decode_preserves_bits() {
        let values = vec![0.0, -0.0, 1e-300, f64::MAX, 0.1 + 0.2, f64::NAN];
        let bytes = encode(&columns(), &values).unwrap();
        let (decoded_columns, decoded) = decode(Path::new("x.dset"), &bytes).unwrap();

        assert_eq!(decoded_columns, columns());
        let bits: Vec<u64> = decoded.iter().map(|v| v.to_bits()).collect();
        let expected: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
        assert_eq!(bits, expected);
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut bytes = encode(&columns(), &[1.0, 2.0]).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xff;
        assert!(matches!(
            decode(Path::new("x.dset"), &bytes),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn truncated_file_is_corrupt() {
        assert!(matches!(
            decode(Path::new("x.dset"), b"HS"),
            Err(StorageError::Corrupt { .. })
        ));
    }

    #[test]
    fn atomic_write_leaves_no_temporary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.bin");
        write_atomic(&path, b"abc").unwrap();
        write_atomic(&path, b"defg").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"defg");
        assert!(!tmp_sibling(&path).exists());
    }
}
