//! Serial MIDI bridge I/O.
//!
//! Connects the byte-stream decoder from `midibridge-frame` to real devices
//! and to a real-time transport.
//!
//! # Features
//!
//! - **Bridge**: lock-guarded frame queue, drained from a real-time callback
//! - **Write-back**: transport events written to the playback device unframed
//! - **Supervisor**: housekeeping thread that opens, polls and reopens devices
//! - **Char devices**: non-blocking unix device nodes (feature: `device`)
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use midibridge_io::{BridgeConfig, CharDeviceProvider, EventBuffer, MidiBridge, Supervisor};
//!
//! let config = BridgeConfig::load("midibridge.toml")?;
//! let bridge = Arc::new(MidiBridge::from_config(&config));
//! let provider = CharDeviceProvider::from_config(&config);
//! let handle = Supervisor::new(config, provider, Arc::clone(&bridge))?.spawn()?;
//!
//! // In the transport callback
//! bridge.set_consumer_attached(true);
//! let mut events = EventBuffer::new(64, 1024);
//! events.clear();
//! bridge.process_cycle(&mut events, inbound_events);
//! ```

// Error types
pub mod error;
pub use error::{Error, Result};

pub mod bridge;
pub mod config;
pub mod device;
pub mod supervisor;
pub mod transport;

pub use bridge::{BridgeStats, BridgeStatsSnapshot, MidiBridge};
pub use config::BridgeConfig;
pub use device::DeviceProvider;
#[cfg(all(unix, feature = "device"))]
pub use device::{CharDevice, CharDeviceProvider};
pub use supervisor::{Supervisor, SupervisorHandle, TickStatus};
pub use transport::{EventBuffer, TransportSink};
