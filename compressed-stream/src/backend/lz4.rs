use super::{wrong_mode, CompressionBackend, StreamMode};
use lz4_flex::frame::{FrameDecoder, FrameEncoder};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};

/// LZ4 frame format. Only the fast compressor exists, so there is a single
/// level.
pub enum Lz4Backend {
    Encoder(FrameEncoder<File>),
    Decoder(FrameDecoder<BufReader<File>>),
}

impl Lz4Backend {
    pub fn new(file: File, mode: StreamMode) -> Self {
        match mode {
            StreamMode::Append => Lz4Backend::Encoder(FrameEncoder::new(file)),
            StreamMode::Read => Lz4Backend::Decoder(FrameDecoder::new(BufReader::new(file))),
        }
    }
}

impl CompressionBackend for Lz4Backend {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Lz4Backend::Encoder(encoder) => encoder.write(buf),
            Lz4Backend::Decoder(_) => Err(wrong_mode("write", StreamMode::Read)),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Lz4Backend::Decoder(decoder) => decoder.read(buf),
            Lz4Backend::Encoder(_) => Err(wrong_mode("read", StreamMode::Append)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Lz4Backend::Encoder(encoder) => encoder.flush(),
            Lz4Backend::Decoder(_) => Ok(()),
        }
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        match *self {
            Lz4Backend::Encoder(encoder) => {
                let file = encoder.finish().map_err(io::Error::from)?;
                file.sync_data()
            }
            Lz4Backend::Decoder(_) => Ok(()),
        }
    }
}
