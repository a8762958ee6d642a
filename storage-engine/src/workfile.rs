//! Spill files for executors that must buffer more rows than fit in memory.
//!
//! A workfile is a temporary file written once through a [`CompressedStream`]
//! and then read back in order. Each tuple is stored as a little-endian `u32`
//! length followed by its encoding. The file is removed when the workfile or
//! its reader is dropped.

use crate::error::{Result, StorageError};
use crate::options::CompressionSpec;
use common::tuple::{Schema, Tuple};
use compressed_stream::{CompressedStream, StreamMode};
use std::fs::File;
use std::io;
use std::path::Path;
use tempfile::{NamedTempFile, TempPath};
use tracing::debug;

/// The write side of a workfile.
#[derive(Debug)]
pub struct Workfile {
    stream: CompressedStream,
    path: TempPath,
    schema: Schema,
    spec: CompressionSpec,
    tuples: u64,
    record: Vec<u8>,
}

impl Workfile {
    /// Creates an empty workfile in `dir`.
    pub fn create_in(dir: impl AsRef<Path>, schema: Schema, spec: CompressionSpec) -> Result<Self> {
        let (file, path) = NamedTempFile::new_in(dir.as_ref())?.into_parts();
        let stream = CompressedStream::open_with_level(file, StreamMode::Append, spec.kind, spec.level)?;
        debug!(path = %path.display(), kind = %spec.kind, "created workfile");
        Ok(Self {
            stream,
            path,
            schema,
            spec,
            tuples: 0,
            record: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tuple_count(&self) -> u64 {
        self.tuples
    }

    pub fn write_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        self.record.clear();
        self.record.extend_from_slice(&[0; 4]);
        tuple.serialize_into(&self.schema, &mut self.record)?;
        let len = (self.record.len() - 4) as u32;
        self.record[..4].copy_from_slice(&len.to_le_bytes());
        self.stream.write(&self.record)?;
        self.tuples += 1;
        Ok(())
    }

    /// Closes the write side and reopens the file for reading from the start.
    pub fn into_reader(mut self) -> Result<WorkfileReader> {
        self.stream.close()?;
        let file = File::open(&self.path)?;
        let stream = CompressedStream::open(file, StreamMode::Read, self.spec.kind)?;
        debug!(
            path = %self.path.display(),
            tuples = self.tuples,
            "reading back workfile"
        );
        Ok(WorkfileReader {
            stream,
            path: self.path,
            schema: self.schema,
            spec: self.spec,
            tuples: self.tuples,
            record: self.record,
        })
    }
}

/// The read side of a workfile.
#[derive(Debug)]
pub struct WorkfileReader {
    stream: CompressedStream,
    path: TempPath,
    schema: Schema,
    spec: CompressionSpec,
    tuples: u64,
    record: Vec<u8>,
}

impl WorkfileReader {
    pub fn tuple_count(&self) -> u64 {
        self.tuples
    }

    /// Returns the next tuple, or `None` at the end of the file.
    pub fn next_tuple(&mut self) -> Result<Option<Tuple>> {
        let mut len = [0u8; 4];
        match self.stream.read_full(&mut len)? {
            0 => return Ok(None),
            4 => {}
            n => return Err(truncated(n, 4)),
        }
        let len = u32::from_le_bytes(len) as usize;
        self.record.resize(len, 0);
        let n = self.stream.read_full(&mut self.record)?;
        if n != len {
            return Err(truncated(n, len));
        }
        Ok(Some(Tuple::deserialize(&self.record, &self.schema)?))
    }

    /// Starts reading again from the first tuple.
    pub fn rewind(&mut self) -> Result<()> {
        self.stream.close()?;
        let file = File::open(&self.path)?;
        self.stream = CompressedStream::open(file, StreamMode::Read, self.spec.kind)?;
        Ok(())
    }
}

fn truncated(read: usize, expected: usize) -> StorageError {
    StorageError::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("workfile truncated: read {} of {} bytes", read, expected),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::tuple::{Column, Type, Value};
    use compressed_stream::BackendKind;
    use test_case::test_case;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", Type::BigInt),
            Column::new("note", Type::Varchar(32)),
        ])
    }

    #[test_case(BackendKind::None ; "none")]
    #[test_case(BackendKind::Zlib ; "zlib")]
    #[test_case(BackendKind::Zstd ; "zstd")]
    #[test_case(BackendKind::Lz4 ; "lz4")]
    fn test_spill_and_read_back(kind: BackendKind) {
        let dir = tempfile::tempdir().unwrap();
        let mut workfile = Workfile::create_in(dir.path(), schema(), CompressionSpec::new(kind, 0)).unwrap();
        for i in 0..1000 {
            let note = if i % 3 == 0 { Value::Null } else { Value::Varchar(format!("row {}", i)) };
            workfile.write_tuple(&Tuple::new(vec![Value::BigInt(i), note])).unwrap();
        }
        let path = workfile.path().to_path_buf();

        let mut reader = workfile.into_reader().unwrap();
        assert_eq!(reader.tuple_count(), 1000);
        for pass in 0..2 {
            let mut count = 0;
            while let Some(tuple) = reader.next_tuple().unwrap() {
                assert_eq!(tuple.values[0], Value::BigInt(count), "pass {pass}");
                count += 1;
            }
            assert_eq!(count, 1000);
            reader.rewind().unwrap();
        }

        drop(reader);
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_workfile() {
        let dir = tempfile::tempdir().unwrap();
        let workfile = Workfile::create_in(dir.path(), schema(), CompressionSpec::new(BackendKind::Zstd, 3)).unwrap();
        let mut reader = workfile.into_reader().unwrap();
        assert!(reader.next_tuple().unwrap().is_none());
    }
}
