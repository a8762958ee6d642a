use super::{wrong_mode, CompressionBackend, StreamMode};
use std::fs::File;
use std::io::{self, Read, Write};

/// Passes bytes straight through to the file.
#[derive(Debug)]
pub struct IdentityBackend {
    file: File,
    mode: StreamMode,
}

impl IdentityBackend {
    pub fn new(file: File, mode: StreamMode) -> Self {
        Self { file, mode }
    }
}

impl CompressionBackend for IdentityBackend {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.mode {
            StreamMode::Append => self.file.write(buf),
            StreamMode::Read => Err(wrong_mode("write", self.mode)),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.mode {
            StreamMode::Read => self.file.read(buf),
            StreamMode::Append => Err(wrong_mode("read", self.mode)),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }

    fn close(self: Box<Self>) -> io::Result<()> {
        if self.mode == StreamMode::Append {
            self.file.sync_data()?;
        }
        Ok(())
    }
}
