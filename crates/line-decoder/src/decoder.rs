//! Line Command Decoder
//!
//! Drains the transport into the bounded input buffer and dispatches at most
//! one command per poll.

use crate::buffer::InputBuffer;
use crate::command::Command;
use crate::config::{DecoderConfig, OverflowPolicy};
use crate::device::{SensorConfig, StatusIndicator};
use crate::error::DecoderError;
use crate::reply::Reply;
use crate::transport::Transport;
use crate::TERMINATOR;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No complete line yet; partial input stays buffered
    Pending,
    /// A line was dispatched and the buffer cleared
    Dispatched(Command),
}

/// Counters kept across polls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    /// Bytes stored in the buffer
    pub bytes_accepted: u64,
    /// Bytes read but refused because the buffer was full or resyncing
    pub overflow_bytes: u64,
    /// Bytes after the first terminator, dropped by the clear
    pub discarded_bytes: u64,
    /// Lines dispatched, including empty and unrecognized ones
    pub commands: u64,
    /// Lines answered with `Wrong command`
    pub unrecognized: u64,
}

/// Line command decoder
///
/// Owns the input buffer and the streaming flag. `poll` takes `&mut self`, so
/// the decoder cannot be re-entered; it is meant to be driven from a single
/// loop and must not be shared between execution contexts.
pub struct LineDecoder {
    /// Accumulated input
    buffer: InputBuffer,
    /// Configuration
    config: DecoderConfig,
    /// Streaming active flag
    streaming: bool,
    /// Skipping input through the next `\n` (resync policy)
    resyncing: bool,
    /// An overflow has been logged since the last clear
    overflow_logged: bool,
    /// Statistics
    stats: DecoderStats,
}

impl LineDecoder {
    /// Create a decoder from a validated config
    pub fn new(config: DecoderConfig) -> Result<Self, DecoderError> {
        config.validate()?;
        info!(
            "Creating line decoder: capacity {}, channels {:?}, overflow {:?}",
            config.capacity, config.channels, config.overflow_policy
        );
        Ok(Self {
            buffer: InputBuffer::new(config.capacity),
            config,
            streaming: false,
            resyncing: false,
            overflow_logged: false,
            stats: DecoderStats::default(),
        })
    }

    /// Drain available input and dispatch one complete line, if any
    pub fn poll<T, D>(
        &mut self,
        transport: &mut T,
        device: &mut D,
    ) -> Result<PollOutcome, DecoderError>
    where
        T: Transport,
        D: SensorConfig + StatusIndicator,
    {
        self.drain(transport);

        let Some(end) = self.buffer.find_terminator() else {
            return Ok(PollOutcome::Pending);
        };

        // Only a buffer holding exactly the terminator greets
        let command = if end == 0 && self.buffer.len() > TERMINATOR.len() {
            Command::Unrecognized(Vec::new())
        } else {
            Command::parse(&self.buffer.as_bytes()[..end])
        };
        let trailing = self.buffer.len() - end - TERMINATOR.len();
        let result = self.dispatch(&command, transport, device);

        if trailing > 0 {
            debug!("Discarding {} bytes after the first line", trailing);
            self.stats.discarded_bytes += trailing as u64;
        }
        self.clear();

        result.map(|()| PollOutcome::Dispatched(command))
    }

    /// Empty the buffer and leave any overflow or resync state
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.resyncing = false;
        self.overflow_logged = false;
    }

    /// Whether streaming is active
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Accumulated input
    pub fn buffer(&self) -> &InputBuffer {
        &self.buffer
    }

    /// Statistics since creation
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Active configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    fn drain<T: Transport>(&mut self, transport: &mut T) {
        let mut dropped: u64 = 0;

        while transport.available() > 0 {
            let Some(byte) = transport.read_byte() else {
                break;
            };

            if self.resyncing {
                dropped += 1;
                if byte == b'\n' {
                    debug!("Resynchronized on line feed");
                    self.resyncing = false;
                }
                continue;
            }

            if self.buffer.append(byte) {
                self.stats.bytes_accepted += 1;
                continue;
            }

            dropped += 1;
            if self.config.overflow_policy == OverflowPolicy::Resync
                && self.buffer.find_terminator().is_none()
            {
                warn!(
                    "Input buffer full ({} bytes) without terminator, resynchronizing",
                    self.buffer.capacity()
                );
                self.buffer.clear();
                self.resyncing = byte != b'\n';
            } else if !self.overflow_logged {
                warn!(
                    "Input buffer full ({} bytes), dropping input",
                    self.buffer.capacity()
                );
                self.overflow_logged = true;
            }
        }

        if dropped > 0 {
            self.stats.overflow_bytes += dropped;
            metrics::counter!("decoder_overflow_bytes_total").increment(dropped);
        }
    }

    fn dispatch<T, D>(
        &mut self,
        command: &Command,
        transport: &mut T,
        device: &mut D,
    ) -> Result<(), DecoderError>
    where
        T: Transport,
        D: SensorConfig + StatusIndicator,
    {
        debug!("Dispatching {:?}", command);
        self.stats.commands += 1;
        metrics::counter!("decoder_commands_total", "command" => command.name()).increment(1);

        let reply = match command {
            Command::Empty => Reply::Banner(self.config.banner.clone()),
            Command::SetSampleTime { ms } => {
                for &channel in &self.config.channels {
                    device.set_sample_time(channel, *ms);
                }
                Reply::Ok
            }
            Command::SetGain { level } => {
                for &channel in &self.config.channels {
                    device.set_gain(channel, *level);
                }
                Reply::GainSelected { level: *level }
            }
            Command::SetAdcConfig(selection) => {
                for &channel in &self.config.channels {
                    device.set_adc_config(channel, selection);
                }
                Reply::Ok
            }
            Command::Start => {
                info!("Streaming started");
                self.streaming = true;
                Reply::Started
            }
            Command::Stop => {
                info!("Streaming stopped");
                self.streaming = false;
                Reply::Stopped
            }
            Command::Identify => Reply::DeviceId(self.config.device_id.clone()),
            Command::Unrecognized(line) => {
                warn!("Unrecognized command: {:?}", String::from_utf8_lossy(line));
                self.stats.unrecognized += 1;
                Reply::WrongCommand(line.clone())
            }
        };

        let written = transport.write_line(&reply.to_wire());

        match command {
            Command::Start => device.set_active(true),
            Command::Stop => device.set_active(false),
            _ => {}
        }

        written
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self {
            buffer: InputBuffer::new(DecoderConfig::default().capacity),
            config: DecoderConfig::default(),
            streaming: false,
            resyncing: false,
            overflow_logged: false,
            stats: DecoderStats::default(),
        }
    }
}
