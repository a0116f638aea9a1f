//! Pocket LoC device simulator
//!
//! Runs the line decoder against stdin/stdout. Each chunk read from stdin is
//! one poll. Pass a config file path as the first argument.

use line_decoder::{init_logging, DecoderConfig, LineDecoder, MemoryTransport, SimulatedSensor};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::info;

/// Widen bare `\n` to `\r\n` so terminal input forms complete lines
fn widen_line_feeds(chunk: &[u8], previous: Option<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(chunk.len() + 2);
    let mut last = previous;
    for &byte in chunk {
        if byte == b'\n' && last != Some(b'\r') {
            out.push(b'\r');
        }
        out.push(byte);
        last = Some(byte);
    }
    out
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = DecoderConfig::load(path.as_deref())?;

    info!("=== Pocket LoC simulator v{} ===", env!("CARGO_PKG_VERSION"));

    let mut decoder = LineDecoder::new(config)?;
    let mut transport = MemoryTransport::new();
    let mut sensor = SimulatedSensor::new();

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut input = stdin.lock();
    let mut output = stdout.lock();

    let mut chunk = [0u8; 256];
    let mut last_byte = None;
    loop {
        let n = input.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        transport.feed(&widen_line_feeds(&chunk[..n], last_byte));
        last_byte = chunk[..n].last().copied();

        decoder.poll(&mut transport, &mut sensor)?;
        for line in transport.take_raw_lines() {
            output.write_all(&line)?;
            output.write_all(b"\r\n")?;
        }
        output.flush()?;
    }

    info!("Input closed, stats: {:?}", decoder.stats());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widen_bare_line_feed() {
        assert_eq!(widen_line_feeds(b"ID\n", None), b"ID\r\n".to_vec());
        assert_eq!(widen_line_feeds(b"ID\r\n", None), b"ID\r\n".to_vec());
        assert_eq!(widen_line_feeds(b"\n", Some(b'\r')), b"\n".to_vec());
    }
}
