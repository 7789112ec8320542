//! Bridge configuration.
//!
//! Loaded from TOML or built in code:
//!
//! ```toml
//! capture = "/dev/umidi0.0"
//! playback = "/dev/umidi0.0"
//! queue_capacity = 256
//!
//! [decoder]
//! skip = [0xFE]
//! expand_running_status = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use midibridge_frame::{DecoderConfig, DumpMode, DEFAULT_QUEUE_CAPACITY};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Largest frame buffer accepted by [`BridgeConfig::validate`].
pub const MAX_FRAME_BYTES_LIMIT: usize = 4096;
/// Smallest frame that still holds a three-byte channel message.
pub const MIN_FRAME_BYTES: usize = 3;
/// Upper bound on skip-list entries.
pub const MAX_SKIP_ENTRIES: usize = 254;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Device read for MIDI input.
    pub capture: Option<PathBuf>,
    /// Device that transport events are written back to.
    pub playback: Option<PathBuf>,
    pub decoder: DecoderConfig,
    pub queue_capacity: usize,
    /// Copy every queued frame to this file, or to standard error for `-`.
    pub dump_path: Option<PathBuf>,
    pub dump_mode: DumpMode,
    /// Housekeeping period.
    pub poll_interval_ms: u64,
    /// Stop the supervisor once a configured device is gone.
    pub shutdown_on_device_loss: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            capture: None,
            playback: None,
            decoder: DecoderConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            dump_path: None,
            dump_mode: DumpMode::default(),
            poll_interval_ms: 1,
            shutdown_on_device_loss: false,
        }
    }
}

impl BridgeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn capture(mut self, path: impl Into<PathBuf>) -> Self {
        self.capture = Some(path.into());
        self
    }

    pub fn playback(mut self, path: impl Into<PathBuf>) -> Self {
        self.playback = Some(path.into());
        self
    }

    pub fn decoder(mut self, decoder: DecoderConfig) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn dump(mut self, path: impl Into<PathBuf>, mode: DumpMode) -> Self {
        self.dump_path = Some(path.into());
        self.dump_mode = mode;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn shutdown_on_device_loss(mut self, enabled: bool) -> Self {
        self.shutdown_on_device_loss = enabled;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capture.is_none() && self.playback.is_none() {
            return Err(Error::InvalidConfig(
                "at least one of capture or playback must be set".to_string(),
            ));
        }
        if self.dump_path.is_some() && self.capture.is_none() {
            return Err(Error::InvalidConfig(
                "frame dump requires a capture device".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig(
                "queue_capacity must be non-zero".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "poll_interval_ms must be non-zero".to_string(),
            ));
        }

        let decoder = &self.decoder;
        if !(MIN_FRAME_BYTES..=MAX_FRAME_BYTES_LIMIT).contains(&decoder.max_frame_bytes) {
            return Err(Error::InvalidConfig(format!(
                "max_frame_bytes {} out of range ({}-{})",
                decoder.max_frame_bytes, MIN_FRAME_BYTES, MAX_FRAME_BYTES_LIMIT
            )));
        }
        if decoder.refill_buffer_bytes == 0 {
            return Err(Error::InvalidConfig(
                "refill_buffer_bytes must be non-zero".to_string(),
            ));
        }
        if decoder.skip.len() > MAX_SKIP_ENTRIES {
            return Err(Error::InvalidConfig(format!(
                "{} skip entries, at most {} allowed",
                decoder.skip.len(),
                MAX_SKIP_ENTRIES
            )));
        }
        if let Some(byte) = decoder.skip.iter().find(|b| **b < 0x80) {
            return Err(Error::InvalidConfig(format!(
                "skip entry {:#04x} is not a status byte",
                byte
            )));
        }
        Ok(())
    }
}
