//! # midibridge - Serial MIDI Bridge
//!
//! Decodes the byte stream of a serial MIDI interface into discrete messages
//! and hands them to a real-time transport, with the reverse path written
//! straight back to the device.
//!
//! ## Architecture
//!
//! midibridge is an umbrella crate over:
//! - **midibridge-frame** - Decoder, running status, post-processing, frame queue
//! - **midibridge-io** - Lock bridge, transport drain, write-back, device supervision
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use midibridge::prelude::*;
//!
//! let config = BridgeConfig::default()
//!     .capture("/dev/umidi0.0")
//!     .playback("/dev/umidi0.0")
//!     .decoder(DecoderConfig::default().with_skip([0xFE]));
//!
//! let bridge = Arc::new(MidiBridge::from_config(&config));
//! let provider = CharDeviceProvider::from_config(&config);
//! let _supervisor = Supervisor::new(config, provider, Arc::clone(&bridge))?.spawn()?;
//!
//! // Once per transport cycle
//! bridge.set_consumer_attached(true);
//! let mut events = EventBuffer::new(64, 1024);
//! bridge.process_cycle(&mut events, inbound);
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Everything below
//! - `device` - Non-blocking unix character devices

/// Re-export of midibridge-frame for direct access
pub use midibridge_frame as frame;
/// Re-export of midibridge-io for direct access
pub use midibridge_io as io;

// Error
mod error;
pub use error::{Error, Result};

// Framing
pub use midibridge_frame::{
    decode_all, expand_running, ByteSource, DecodeStats, DecoderConfig, DumpMode, Expansion,
    Frame, FrameDecoder, FrameDump, FrameError, FrameQueue, FrameReader, PushOutcome,
    RefillWindow, SkipSet, SliceSource,
};

// Bridge and supervision
pub use midibridge_io::{
    BridgeConfig, BridgeStatsSnapshot, DeviceProvider, EventBuffer, MidiBridge, Supervisor,
    SupervisorHandle, TickStatus, TransportSink,
};
#[cfg(all(unix, feature = "device"))]
pub use midibridge_io::{CharDevice, CharDeviceProvider};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        BridgeConfig, DecoderConfig, DumpMode, EventBuffer, Frame, MidiBridge, Supervisor,
        TransportSink,
    };
    pub use crate::{Error, Result};

    #[cfg(all(unix, feature = "device"))]
    pub use crate::CharDeviceProvider;
}
