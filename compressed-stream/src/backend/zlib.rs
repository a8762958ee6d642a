use super::{wrong_mode, CompressionBackend, StreamMode};
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, Read, Write};

/// gzip framed deflate. Readers accept concatenated members so a file that was
/// appended to by several writers reads back as one stream.
pub enum ZlibBackend {
    Encoder(GzEncoder<File>),
    Decoder(MultiGzDecoder<File>),
}

impl ZlibBackend {
    pub fn new(file: File, mode: StreamMode, level: u32) -> Self {
        match mode {
            StreamMode::Append => ZlibBackend::Encoder(GzEncoder::new(file, Compression::new(level))),
            StreamMode::Read => ZlibBackend::Decoder(MultiGzDecoder::new(file)),
        }
    }
}

impl CompressionBackend for ZlibBackend {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ZlibBackend::Encoder(encoder) => encoder.write(buf),
            ZlibBackend::Decoder(_) => Err(wrong_mode("write", StreamMode::Read)),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ZlibBackend::Decoder(decoder) => decoder.read(buf),
            ZlibBackend::Encoder(_) => Err(wrong_mode("read", StreamMode::Append)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ZlibBackend::Encoder(encoder) => encoder.flush(),
            ZlibBackend::Decoder(_) => Ok(()),
        }
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        match *self {
            ZlibBackend::Encoder(encoder) => {
                let file = encoder.finish()?;
                file.sync_data()
            }
            ZlibBackend::Decoder(_) => Ok(()),
        }
    }
}
