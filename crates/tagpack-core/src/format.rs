//! # Binary Layout Primitives
//!
//! Every binary file produced by tagpack is a flat little-endian stream of
//! unsigned 64-bit counts followed by 32-bit float arrays. There is no magic
//! number and no padding; readers rely on the counts alone.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{Result, TagpackError};

/// Size in bytes of one encoded count.
pub const U64_BYTES: usize = 8;

/// Size in bytes of one encoded value.
pub const F32_BYTES: usize = 4;

/// Write a single unsigned 64-bit count.
pub fn write_u64<W: Write>(writer: &mut W, value: u64) -> std::io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Write a sequence of unsigned 64-bit counts back to back.
pub fn write_u64s<W: Write>(writer: &mut W, values: &[u64]) -> std::io::Result<()> {
    for &value in values {
        write_u64(writer, value)?;
    }
    Ok(())
}

/// Write a float array.
pub fn write_f32s<W: Write>(writer: &mut W, values: &[f32]) -> std::io::Result<()> {
    let mut buf = Vec::with_capacity(values.len() * F32_BYTES);
    for value in values {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    writer.write_all(&buf)
}

/// Write `count` zero floats (the padding row of an embedding table).
pub fn write_zeros<W: Write>(writer: &mut W, count: usize) -> std::io::Result<()> {
    writer.write_all(&vec![0u8; count * F32_BYTES])
}

/// Read a single unsigned 64-bit count.
pub fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; U64_BYTES];
    reader
        .read_exact(&mut buf)
        .map_err(|e| truncated("u64 count", e))?;
    Ok(u64::from_le_bytes(buf))
}

/// Read `count` unsigned 64-bit counts.
pub fn read_u64s<R: Read>(reader: &mut R, count: usize) -> Result<Vec<u64>> {
    (0..count).map(|_| read_u64(reader)).collect()
}

/// Read `count` floats.
///
/// The buffer grows with the bytes actually present, so a corrupt count
/// fails as truncated instead of allocating up front.
pub fn read_f32s<R: Read>(reader: &mut R, count: usize) -> Result<Vec<f32>> {
    let len = count
        .checked_mul(F32_BYTES)
        .ok_or_else(|| TagpackError::Format(format!("{} f32 values overflow", count)))?;
    let expected = u64::try_from(len)
        .map_err(|_| TagpackError::Format(format!("{} f32 values overflow", count)))?;

    let mut buf = Vec::new();
    reader
        .by_ref()
        .take(expected)
        .read_to_end(&mut buf)
        .map_err(|e| truncated("f32 values", e))?;
    if buf.len() != len {
        return Err(TagpackError::Format(format!(
            "stream ended while reading f32 values: expected {} bytes, found {}",
            len,
            buf.len()
        )));
    }
    Ok(buf
        .chunks_exact(F32_BYTES)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Fail unless the reader is exhausted.
pub fn expect_eof<R: Read>(reader: &mut R) -> Result<()> {
    let mut byte = [0u8; 1];
    match reader.read(&mut byte) {
        Ok(0) => Ok(()),
        Ok(_) => Err(TagpackError::Format(
            "trailing bytes after declared content".into(),
        )),
        Err(e) => Err(TagpackError::Format(format!("read error: {}", e))),
    }
}

/// Convert a length that came off the wire into a `usize`.
pub fn to_len(value: u64, what: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| TagpackError::Format(format!("{} {} does not fit in memory", what, value)))
}

/// Create (truncating) an output file wrapped in a buffered writer.
pub fn create_output(path: &Path, stage: &'static str) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| TagpackError::io(stage, path, e))?;
    Ok(BufWriter::new(file))
}

/// Open an input file wrapped in a buffered reader.
pub fn open_input(path: &Path, stage: &'static str) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| TagpackError::io(stage, path, e))?;
    Ok(BufReader::new(file))
}

/// Run `body` against a fresh output file and flush it before returning.
///
/// Any failure is reported against `path` and `stage`.
pub fn write_file<F>(path: &Path, stage: &'static str, body: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let mut writer = create_output(path, stage)?;
    body(&mut writer).map_err(|e| TagpackError::io(stage, path, e))?;
    writer.flush().map_err(|e| TagpackError::io(stage, path, e))
}

fn truncated(what: &str, err: std::io::Error) -> TagpackError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        TagpackError::Format(format!("stream ended while reading {}", what))
    } else {
        TagpackError::Format(format!("failed to read {}: {}", what, err))
    }
}
