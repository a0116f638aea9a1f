//! Sensor Client
//!
//! Async command/reply exchange with a Pocket LoC sensor over any byte
//! stream; `open` connects to a serial port.

use crate::config::{HostConfig, LinkConfig};
use crate::error::LinkError;
use crate::sample::{looks_like_sample, now_ms, Sample, SampleLayout};
use line_decoder::limits::{GAIN_LEVEL_MAX, GAIN_LEVEL_MIN};
use line_decoder::{gain_multiplier, AdcSelection, Command, Reply};
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, warn};

/// Client for a Pocket LoC sensor
pub struct SensorClient<S> {
    /// Buffered read side
    reader: BufReader<ReadHalf<S>>,
    /// Bytes of a line not yet terminated, kept across timed out reads
    pending: Vec<u8>,
    /// Write side
    writer: WriteHalf<S>,
    /// Reply timeout
    timeout: Duration,
    /// Sample line layout
    layout: SampleLayout,
    /// Whether the device was told to stream
    streaming: bool,
}

impl SensorClient<SerialStream> {
    /// Open a serial port
    pub fn open(port: &str, config: &LinkConfig) -> Result<Self, LinkError> {
        info!("Opening sensor port {} at {} baud", port, config.baud_rate);
        let stream = tokio_serial::new(port, config.baud_rate)
            .timeout(Duration::from_millis(config.timeout_ms))
            .open_native_async()?;
        Ok(Self::new(stream, config))
    }
}

impl<S: AsyncRead + AsyncWrite> SensorClient<S> {
    /// Wrap an already connected stream
    pub fn new(stream: S, config: &LinkConfig) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read),
            pending: Vec::new(),
            writer: write,
            timeout: Duration::from_millis(config.timeout_ms),
            layout: config.layout,
            streaming: false,
        }
    }

    /// Set reply timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Whether the device was told to stream
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Write one line followed by `\r\n`
    pub async fn send_line(&mut self, line: &str) -> Result<(), LinkError> {
        debug!("-> {:?}", line);
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Read one line with the terminator stripped
    ///
    /// A timeout leaves the partial line buffered; the next call resumes it.
    pub async fn read_line(&mut self) -> Result<String, LinkError> {
        let read = tokio::time::timeout(
            self.timeout,
            self.reader.read_until(b'\n', &mut self.pending),
        )
        .await
        .map_err(|_| LinkError::Timeout(self.timeout.as_millis() as u64))??;
        if read == 0 {
            return Err(LinkError::Disconnected);
        }
        let raw = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&raw)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        debug!("<- {:?}", line);
        Ok(line)
    }

    /// Discard whatever the device sends until it stays quiet for `quiet`
    ///
    /// Returns the number of lines discarded.
    pub async fn discard_pending(&mut self, quiet: Duration) -> Result<usize, LinkError> {
        let timeout = self.timeout;
        self.timeout = quiet;
        let mut discarded = 0;
        let result = loop {
            match self.read_line().await {
                Ok(_) => discarded += 1,
                Err(LinkError::Timeout(_)) => break Ok(discarded),
                Err(err) => break Err(err),
            }
        };
        self.timeout = timeout;
        result
    }

    /// Read the next reply line, skipping samples and blank lines
    async fn read_reply(&mut self) -> Result<String, LinkError> {
        loop {
            let line = self.read_line().await?;
            if line.is_empty() || looks_like_sample(&line) {
                continue;
            }
            return Ok(line);
        }
    }

    /// Send a command and read its reply
    ///
    /// `Wrong command (...)` is returned as [`LinkError::Rejected`].
    pub async fn send(&mut self, command: &Command) -> Result<Reply, LinkError> {
        self.send_line(&command.encode()).await?;
        let line = self.read_reply().await?;

        let reply = match (Reply::parse(&line), command) {
            (Some(Reply::WrongCommand(echoed)), _) => {
                return Err(LinkError::Rejected(
                    String::from_utf8_lossy(&echoed).into_owned(),
                ))
            }
            (Some(reply), _) => reply,
            (None, Command::Identify) => Reply::DeviceId(line),
            (None, Command::Empty) => Reply::Banner(line),
            (None, _) => {
                return Err(LinkError::InvalidResponse(format!(
                    "{:?} answered with {:?}",
                    command.encode(),
                    line
                )))
            }
        };
        Ok(reply)
    }

    /// Query the device identifier
    pub async fn identify(&mut self) -> Result<String, LinkError> {
        match self.send(&Command::Identify).await? {
            Reply::DeviceId(id) => Ok(id),
            other => Err(unexpected("ID", &other)),
        }
    }

    /// Check that the device reports the expected identifier
    pub async fn verify(&mut self, expected: &str) -> Result<(), LinkError> {
        let actual = self.identify().await?;
        if actual != expected {
            return Err(LinkError::DeviceMismatch {
                expected: expected.to_string(),
                actual,
            });
        }
        info!("Connected to {}", actual);
        Ok(())
    }

    /// Set the sample time per conversion (ms)
    pub async fn set_sample_time(&mut self, ms: u8) -> Result<(), LinkError> {
        self.expect_ok(&Command::SetSampleTime { ms }).await
    }

    /// Set the gain level, returning the multiplier the device selected
    pub async fn set_gain(&mut self, level: u8) -> Result<f64, LinkError> {
        match self.send(&Command::SetGain { level }).await? {
            Reply::GainSelected { level: selected } if selected == level => {
                Ok(gain_multiplier(selected))
            }
            other => Err(unexpected("G", &other)),
        }
    }

    /// Select the active photodiodes
    pub async fn set_adc_config(&mut self, selection: AdcSelection) -> Result<(), LinkError> {
        self.expect_ok(&Command::SetAdcConfig(selection)).await
    }

    /// Start streaming samples
    pub async fn start(&mut self) -> Result<(), LinkError> {
        match self.send(&Command::Start).await? {
            Reply::Started => {
                self.streaming = true;
                Ok(())
            }
            other => Err(unexpected("START", &other)),
        }
    }

    /// Stop streaming samples
    pub async fn stop(&mut self) -> Result<(), LinkError> {
        match self.send(&Command::Stop).await? {
            Reply::Stopped => {
                self.streaming = false;
                Ok(())
            }
            other => Err(unexpected("STOP", &other)),
        }
    }

    /// Read the next streamed sample
    pub async fn read_sample(&mut self) -> Result<Sample, LinkError> {
        loop {
            let line = self.read_line().await?;
            if line.is_empty() {
                continue;
            }
            return Sample::parse(&line, &self.layout, now_ms());
        }
    }

    /// Pick the highest gain level that does not saturate
    ///
    /// Levels are tried from the top down; each one streams up to
    /// `samples_per_level` samples. If every level saturates, the lowest
    /// level stays selected.
    pub async fn auto_gain(&mut self, samples_per_level: usize) -> Result<u8, LinkError> {
        for level in (GAIN_LEVEL_MIN..=GAIN_LEVEL_MAX).rev() {
            self.set_gain(level).await?;
            self.start().await?;

            let mut saturated = false;
            for _ in 0..samples_per_level {
                match self.read_sample().await {
                    Ok(sample) if sample.is_saturated() => {
                        saturated = true;
                        break;
                    }
                    Ok(_) => {}
                    Err(LinkError::InvalidSample(msg)) => warn!("Skipping sample: {}", msg),
                    Err(err) => return Err(err),
                }
            }

            self.stop().await?;

            if !saturated {
                info!("Auto gain selected level {} ({}x)", level, gain_multiplier(level));
                return Ok(level);
            }
            debug!("Gain level {} saturates", level);
        }

        warn!("Every gain level saturates, keeping level {}", GAIN_LEVEL_MIN);
        Ok(GAIN_LEVEL_MIN)
    }

    /// Apply a run configuration, returning the gain level in effect
    pub async fn apply(&mut self, config: &HostConfig) -> Result<u8, LinkError> {
        self.set_adc_config(config.adc_selection()).await?;
        self.set_sample_time(config.sample_time_ms).await?;
        if config.auto_gain {
            self.auto_gain(config.auto_gain_samples).await
        } else {
            self.set_gain(config.gain_level).await?;
            Ok(config.gain_level)
        }
    }

    async fn expect_ok(&mut self, command: &Command) -> Result<(), LinkError> {
        match self.send(command).await? {
            Reply::Ok => Ok(()),
            other => Err(unexpected(&command.encode(), &other)),
        }
    }
}

fn unexpected(command: &str, reply: &Reply) -> LinkError {
    LinkError::InvalidResponse(format!("{:?} answered with {:?}", command, reply.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    /// Answer each received line with the next scripted reply lines
    fn scripted(
        peer: DuplexStream,
        script: Vec<Vec<&'static str>>,
    ) -> tokio::task::JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(peer);
            let mut reader = BufReader::new(read);
            let mut received = Vec::new();
            for replies in script {
                let mut line = String::new();
                if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                    break;
                }
                received.push(line);
                for reply in replies {
                    write.write_all(reply.as_bytes()).await.unwrap();
                    write.write_all(b"\r\n").await.unwrap();
                }
            }
            received
        })
    }

    fn client(stream: DuplexStream) -> SensorClient<DuplexStream> {
        let config = LinkConfig {
            timeout_ms: 200,
            ..Default::default()
        };
        SensorClient::new(stream, &config)
    }

    #[tokio::test]
    async fn test_commands_are_terminated() {
        let (local, peer) = tokio::io::duplex(1024);
        let device = scripted(peer, vec![vec!["OK"]]);
        let mut client = client(local);

        client.set_sample_time(10).await.unwrap();
        drop(client);
        assert_eq!(device.await.unwrap(), vec!["T10\r\n".to_string()]);
    }

    #[tokio::test]
    async fn test_reply_skips_sample_lines() {
        let (local, peer) = tokio::io::duplex(1024);
        let sample = "1\t2\t3\t4\t5\t6\t0\t1\t2\t3\t4\t5\t6\t0";
        let _device = scripted(peer, vec![vec![sample, "", sample, "Stopped"]]);
        let mut client = client(local);

        client.stop().await.unwrap();
        assert!(!client.is_streaming());
    }

    #[tokio::test]
    async fn test_wrong_command_is_rejected() {
        let (local, peer) = tokio::io::duplex(1024);
        let _device = scripted(peer, vec![vec!["Wrong command (FOO)"]]);
        let mut client = client(local);

        let result = client.send(&Command::Unrecognized(b"FOO".to_vec())).await;
        assert!(matches!(result, Err(LinkError::Rejected(line)) if line == "FOO"));
    }

    #[tokio::test]
    async fn test_gain_mismatch_is_invalid() {
        let (local, peer) = tokio::io::duplex(1024);
        let _device = scripted(peer, vec![vec!["OK. Selected gain: 1x"]]);
        let mut client = client(local);

        let result = client.set_gain(5).await;
        assert!(matches!(result, Err(LinkError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_free_text_to_config_command_is_invalid() {
        let (local, peer) = tokio::io::duplex(1024);
        let _device = scripted(peer, vec![vec!["PocketLoCSensor"]]);
        let mut client = client(local);

        let result = client.set_sample_time(10).await;
        assert!(matches!(result, Err(LinkError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_identify_mismatch() {
        let (local, peer) = tokio::io::duplex(1024);
        let _device = scripted(peer, vec![vec!["SomethingElse"]]);
        let mut client = client(local);

        let result = client.verify("PocketLoCSensor").await;
        assert!(matches!(
            result,
            Err(LinkError::DeviceMismatch { actual, .. }) if actual == "SomethingElse"
        ));
    }

    #[tokio::test]
    async fn test_timeout_when_silent() {
        let (local, _peer) = tokio::io::duplex(1024);
        let mut client = client(local);
        client.set_timeout(Duration::from_millis(20));

        let result = client.identify().await;
        assert!(matches!(result, Err(LinkError::Timeout(20))));
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_line() {
        let (local, mut peer) = tokio::io::duplex(1024);
        let mut client = client(local);
        client.set_timeout(Duration::from_millis(20));

        peer.write_all(b"Pocket").await.unwrap();
        assert!(matches!(client.read_line().await, Err(LinkError::Timeout(20))));

        peer.write_all(b"LoCSensor\r\n").await.unwrap();
        assert_eq!(client.read_line().await.unwrap(), "PocketLoCSensor");
    }

    #[tokio::test]
    async fn test_disconnected_when_closed() {
        let (local, peer) = tokio::io::duplex(1024);
        drop(peer);
        let mut client = client(local);

        let result = client.read_line().await;
        assert!(matches!(result, Err(LinkError::Disconnected)));
    }

    #[tokio::test]
    async fn test_discard_pending() {
        let (local, mut peer) = tokio::io::duplex(1024);
        peer.write_all(b"Greetings\r\nnoise\r\n").await.unwrap();
        let mut client = client(local);

        let discarded = client.discard_pending(Duration::from_millis(20)).await.unwrap();
        assert_eq!(discarded, 2);
        drop(peer);
    }
}
