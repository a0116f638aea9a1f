//! Byte-Stream Transport

use crate::error::DecoderError;
use std::collections::VecDeque;

/// Byte source and line sink the decoder is polled against
///
/// Reads never block: `available` reports what can be read right now.
pub trait Transport {
    /// Number of bytes that can be read without blocking
    fn available(&self) -> usize;

    /// Read the next byte, if any
    fn read_byte(&mut self) -> Option<u8>;

    /// Write one reply line followed by `\r\n`
    ///
    /// Lines are raw bytes: an echoed command may carry any 8-bit value.
    fn write_line(&mut self, line: &[u8]) -> Result<(), DecoderError>;
}

/// In-memory transport for tests and the stdio simulator
#[derive(Debug, Default)]
pub struct MemoryTransport {
    /// Bytes waiting to be read by the decoder
    inbound: VecDeque<u8>,
    /// Reply lines written by the decoder, without terminator
    outbound: Vec<Vec<u8>>,
}

impl MemoryTransport {
    /// Create an empty transport
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the decoder
    pub fn feed(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes);
    }

    /// Take every reply line written so far, as text
    pub fn take_lines(&mut self) -> Vec<String> {
        self.take_raw_lines()
            .iter()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Take every reply line written so far, byte for byte
    pub fn take_raw_lines(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.outbound)
    }

    /// Reply lines written so far
    pub fn lines(&self) -> &[Vec<u8>] {
        &self.outbound
    }
}

impl Transport for MemoryTransport {
    fn available(&self) -> usize {
        self.inbound.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.inbound.pop_front()
    }

    fn write_line(&mut self, line: &[u8]) -> Result<(), DecoderError> {
        self.outbound.push(line.to_vec());
        Ok(())
    }
}
