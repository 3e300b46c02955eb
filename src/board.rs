//! Serial acquisition session for the 8-channel EEG board.
//!
//! The dongle speaks a fixed 33-byte framing: a 0xA0 sync byte, a packet
//! counter, eight 24-bit big-endian EEG words, three 16-bit auxiliary words
//! and a 0xC0..=0xCF footer. EEG words are scaled to microvolts; the
//! auxiliary words (the photo sensor among them) are kept as raw counts.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ndarray::Array2;
use serialport::SerialPort;

use crate::error::PipelineError;

/// Board identifier in the vendor's board table.
pub const BOARD_ID_CYTON: i32 = 0;
pub const BAUD_RATE: u32 = 115_200;
/// Sampling rate of the board.
pub const BOARD_SAMPLE_RATE_HZ: f64 = 250.0;
pub const EEG_CHANNELS: usize = 8;
pub const AUX_CHANNELS: usize = 3;

const PACKET_LEN: usize = 33;
const SYNC_BYTE: u8 = 0xA0;
const FOOTER_LOW: u8 = 0xC0;
const FOOTER_HIGH: u8 = 0xCF;
const CMD_START: &[u8] = b"b";
const CMD_STOP: &[u8] = b"s";
const CMD_RESET: &[u8] = b"v";

// ADS1299 front end: 4.5 V reference, gain 24, 24-bit counts, in microvolts.
const EEG_SCALE_UV: f64 = 4.5 / 24.0 / 8_388_607.0 * 1_000_000.0;

/// Cooperative cancellation for the capture wait; clone it into whatever
/// should be able to stop the recording early.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One decoded sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawSample {
    pub eeg: [f64; EEG_CHANNELS],
    pub aux: [f64; AUX_CHANNELS],
}

/// Everything captured in one streaming run, channels x samples.
pub struct Recording {
    pub eeg: Array2<f64>,
    pub aux: Array2<f64>,
    pub sample_rate_hz: f64,
}

impl Recording {
    pub fn sample_count(&self) -> usize {
        self.eeg.ncols()
    }
}

/// Streaming session: prepare on connect, stream between start and stop,
/// release exactly once. Dropping the session stops the stream.
pub struct BoardSession {
    port: Box<dyn SerialPort>,
    port_name: String,
    read_buffer: Vec<u8>,
    is_streaming: bool,
    released: bool,
}

impl BoardSession {
    /// Opens the serial port, soft-resets the board and waits for it to go
    /// quiet so stale bytes never reach the packet parser.
    pub fn connect(port_name: &str) -> Result<Self, PipelineError> {
        let mut port = serialport::new(port_name, BAUD_RATE)
            .timeout(Duration::from_millis(100))
            .open()?;
        log::debug!("board {BOARD_ID_CYTON} on {port_name}: soft reset");
        port.write_all(CMD_RESET)?;
        port.flush()?;
        drain_banner(&mut port)?;
        Ok(Self {
            port,
            port_name: port_name.to_string(),
            read_buffer: Vec::with_capacity(4096),
            is_streaming: false,
            released: false,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn sample_rate_hz(&self) -> f64 {
        BOARD_SAMPLE_RATE_HZ
    }

    pub fn start_stream(&mut self) -> Result<(), PipelineError> {
        if !self.is_streaming {
            self.port.write_all(CMD_START)?;
            self.port.flush()?;
            self.is_streaming = true;
        }
        Ok(())
    }

    pub fn stop_stream(&mut self) -> Result<(), PipelineError> {
        if !self.released {
            if self.is_streaming {
                self.port.write_all(CMD_STOP)?;
                self.port.flush()?;
                self.is_streaming = false;
            }
            self.released = true;
        }
        Ok(())
    }

    /// Captures until the deadline passes or the token is cancelled, then
    /// returns whatever arrived as channel-major arrays.
    pub fn record_for(
        &mut self,
        duration: Duration,
        cancel: &CancelToken,
    ) -> Result<Recording, PipelineError> {
        if !self.is_streaming {
            return Err(PipelineError::Board(
                "record_for called before start_stream".into(),
            ));
        }
        let deadline = Instant::now() + duration;
        let mut samples: Vec<RawSample> = Vec::new();
        let mut chunk = [0u8; 512];
        while Instant::now() < deadline && !cancel.is_cancelled() {
            match self.port.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => {
                    self.read_buffer.extend_from_slice(&chunk[..n]);
                    drain_packets(&mut self.read_buffer, &mut samples);
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }
        if cancel.is_cancelled() {
            log::info!("capture cancelled after {} samples", samples.len());
        }

        let n = samples.len();
        let mut eeg = Array2::zeros((EEG_CHANNELS, n));
        let mut aux = Array2::zeros((AUX_CHANNELS, n));
        for (idx, sample) in samples.iter().enumerate() {
            for c in 0..EEG_CHANNELS {
                eeg[[c, idx]] = sample.eeg[c];
            }
            for c in 0..AUX_CHANNELS {
                aux[[c, idx]] = sample.aux[c];
            }
        }
        Ok(Recording {
            eeg,
            aux,
            sample_rate_hz: BOARD_SAMPLE_RATE_HZ,
        })
    }
}

impl Drop for BoardSession {
    fn drop(&mut self) {
        let _ = self.stop_stream();
    }
}

// Reads until the reset banner stops arriving (a timeout with no bytes).
fn drain_banner(port: &mut Box<dyn SerialPort>) -> Result<(), PipelineError> {
    let mut chunk = [0u8; 256];
    let settle_deadline = Instant::now() + Duration::from_secs(3);
    loop {
        match port.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(_) if Instant::now() < settle_deadline => {}
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

// Pulls every complete, well-framed packet out of `buffer`, sliding over
// garbage bytes to re-sync after a dropout.
fn drain_packets(buffer: &mut Vec<u8>, out: &mut Vec<RawSample>) {
    let mut pos = 0;
    while buffer.len() - pos >= PACKET_LEN {
        if let Some(sample) = parse_packet(&buffer[pos..pos + PACKET_LEN]) {
            out.push(sample);
            pos += PACKET_LEN;
        } else {
            pos += 1;
        }
    }
    buffer.drain(..pos);
}

/// Decodes one frame; `None` if the sync byte or footer is wrong.
pub fn parse_packet(bytes: &[u8]) -> Option<RawSample> {
    if bytes.len() != PACKET_LEN
        || bytes[0] != SYNC_BYTE
        || !(FOOTER_LOW..=FOOTER_HIGH).contains(&bytes[PACKET_LEN - 1])
    {
        return None;
    }
    let mut eeg = [0.0; EEG_CHANNELS];
    for (c, slot) in eeg.iter_mut().enumerate() {
        let offset = 2 + 3 * c;
        *slot = f64::from(i24_be(&bytes[offset..offset + 3])) * EEG_SCALE_UV;
    }
    let mut aux = [0.0; AUX_CHANNELS];
    for (c, slot) in aux.iter_mut().enumerate() {
        let offset = 26 + 2 * c;
        *slot = f64::from(i16::from_be_bytes([bytes[offset], bytes[offset + 1]]));
    }
    Some(RawSample { eeg, aux })
}

// Sign-extended 24-bit big-endian word.
fn i24_be(bytes: &[u8]) -> i32 {
    let raw = (i32::from(bytes[0]) << 16) | (i32::from(bytes[1]) << 8) | i32::from(bytes[2]);
    (raw << 8) >> 8
}
