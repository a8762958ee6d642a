use super::{wrong_mode, CompressionBackend, StreamMode};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use ::zstd::stream::read::Decoder;
use ::zstd::stream::write::Encoder;

pub enum ZstdBackend {
    Encoder(Encoder<'static, File>),
    Decoder(Decoder<'static, BufReader<File>>),
}

impl ZstdBackend {
    /// Allocates the zstd context. Fails if the library cannot set it up.
    pub fn new(file: File, mode: StreamMode, level: u32) -> io::Result<Self> {
        match mode {
            StreamMode::Append => Ok(ZstdBackend::Encoder(Encoder::new(file, level as i32)?)),
            StreamMode::Read => Ok(ZstdBackend::Decoder(Decoder::new(file)?)),
        }
    }
}

impl CompressionBackend for ZstdBackend {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ZstdBackend::Encoder(encoder) => encoder.write(buf),
            ZstdBackend::Decoder(_) => Err(wrong_mode("write", StreamMode::Read)),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ZstdBackend::Decoder(decoder) => decoder.read(buf),
            ZstdBackend::Encoder(_) => Err(wrong_mode("read", StreamMode::Append)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ZstdBackend::Encoder(encoder) => encoder.flush(),
            ZstdBackend::Decoder(_) => Ok(()),
        }
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        match *self {
            ZstdBackend::Encoder(encoder) => {
                let file = encoder.finish()?;
                file.sync_data()
            }
            ZstdBackend::Decoder(_) => Ok(()),
        }
    }
}
