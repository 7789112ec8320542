//! Housekeeping loop: device open/close, decoding, queue maintenance.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use midibridge_frame::{ByteSource, DecodeStats, FrameError, FrameReader, PushOutcome};
use tracing::{debug, info, warn};

use crate::bridge::MidiBridge;
use crate::config::BridgeConfig;
use crate::device::DeviceProvider;
use crate::{Error, Result};

/// Result of one [`Supervisor::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Running,
    /// A configured device is gone and `shutdown_on_device_loss` is set.
    Shutdown,
}

enum SupervisorCommand {
    Shutdown,
}

/// Device state published to other threads.
struct DeviceState {
    capture_device: ArcSwap<Option<String>>,
    playback_device: ArcSwap<Option<String>>,
    capture_open: AtomicBool,
    playback_open: AtomicBool,
    running: AtomicBool,
}

impl DeviceState {
    fn new() -> Self {
        Self {
            capture_device: ArcSwap::from_pointee(None),
            playback_device: ArcSwap::from_pointee(None),
            capture_open: AtomicBool::new(false),
            playback_open: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }
}

/// `-` selects standard error; any other path is created or truncated.
fn open_dump(path: &Path) -> Result<Box<dyn Write + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(std::io::stderr()));
    }
    let file = File::create(path).map_err(|source| Error::Device {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(file))
}

/// Owns the decoder and the devices; feeds the [`MidiBridge`].
pub struct Supervisor<P: DeviceProvider> {
    config: BridgeConfig,
    provider: P,
    bridge: Arc<MidiBridge>,
    reader: FrameReader,
    capture: Option<Box<dyn ByteSource + Send>>,
    capture_failed: bool,
    playback_failed: bool,
    state: Arc<DeviceState>,
}

impl<P: DeviceProvider> Supervisor<P> {
    pub fn new(config: BridgeConfig, provider: P, bridge: Arc<MidiBridge>) -> Result<Self> {
        config.validate()?;

        let mut reader = FrameReader::new(&config.decoder);
        if let Some(path) = &config.dump_path {
            let sink = open_dump(path)?;
            reader.decoder_mut().attach_dump(sink, config.dump_mode);
            info!("Dumping frames to {}", path.display());
        }

        Ok(Self {
            config,
            provider,
            bridge,
            reader,
            capture: None,
            capture_failed: false,
            playback_failed: false,
            state: Arc::new(DeviceState::new()),
        })
    }

    pub fn bridge(&self) -> &Arc<MidiBridge> {
        &self.bridge
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn is_capture_open(&self) -> bool {
        self.capture.is_some()
    }

    pub fn is_playback_open(&self) -> bool {
        self.state.playback_open.load(Ordering::SeqCst)
    }

    pub fn decode_stats(&self) -> DecodeStats {
        self.reader.stats()
    }

    /// One housekeeping pass.
    pub fn tick(&mut self) -> TickStatus {
        self.open_close();

        if self.device_lost() {
            warn!("Configured device unavailable, shutting down");
            return TickStatus::Shutdown;
        }

        self.pump();

        if !self.bridge.consumer_attached() {
            self.bridge.clear_queue();
        }
        TickStatus::Running
    }

    fn device_lost(&self) -> bool {
        self.config.shutdown_on_device_loss
            && ((self.provider.has_capture() && self.capture.is_none())
                || (self.provider.has_playback() && !self.is_playback_open()))
    }

    fn open_close(&mut self) {
        if self.provider.has_capture() {
            match self.capture.as_mut() {
                None => self.open_capture(),
                Some(source) => {
                    if let Err(e) = source.poll_readable() {
                        warn!("Capture device {} lost: {}", self.provider.capture_name(), e);
                        self.close_capture();
                    }
                }
            }
        }

        if self.provider.has_playback() {
            if self.bridge.take_write_failure() {
                warn!(
                    "Playback device {} lost after write failure",
                    self.provider.playback_name()
                );
                self.close_playback();
            }
            if !self.is_playback_open() {
                self.open_playback();
            }
        }
    }

    fn open_capture(&mut self) {
        let name = self.provider.capture_name();
        match self.provider.open_capture() {
            Ok(source) => {
                // Bytes from a previous session must not leak into this one
                self.reader.reset_stream();
                self.capture = Some(source);
                self.capture_failed = false;
                self.state.capture_open.store(true, Ordering::SeqCst);
                info!("Opened capture device {}", name);
                self.state.capture_device.store(Arc::new(Some(name)));
            }
            Err(e) => {
                if !self.capture_failed {
                    debug!("Cannot open capture device {}: {}", name, e);
                    self.capture_failed = true;
                }
            }
        }
    }

    fn open_playback(&mut self) {
        let name = self.provider.playback_name();
        match self.provider.open_playback() {
            Ok(writer) => {
                drop(self.bridge.set_writer(Some(writer)));
                self.playback_failed = false;
                self.state.playback_open.store(true, Ordering::SeqCst);
                info!("Opened playback device {}", name);
                self.state.playback_device.store(Arc::new(Some(name)));
            }
            Err(e) => {
                if !self.playback_failed {
                    debug!("Cannot open playback device {}: {}", name, e);
                    self.playback_failed = true;
                }
            }
        }
    }

    fn close_capture(&mut self) {
        if self.capture.take().is_some() {
            info!("Closed capture device {}", self.provider.capture_name());
        }
        self.reader.reset_stream();
        self.state.capture_open.store(false, Ordering::SeqCst);
        self.state.capture_device.store(Arc::new(None));
    }

    fn close_playback(&mut self) {
        if self.bridge.set_writer(None).is_some() {
            info!("Closed playback device {}", self.provider.playback_name());
        }
        self.state.playback_open.store(false, Ordering::SeqCst);
        self.state.playback_device.store(Arc::new(None));
    }

    fn close_all(&mut self) {
        if self.capture.is_some() {
            self.close_capture();
        }
        if self.is_playback_open() {
            self.close_playback();
        }
    }

    /// Decode everything the capture device has right now.
    fn pump(&mut self) {
        let Some(source) = self.capture.as_mut() else {
            return;
        };

        let mut lost = None;
        loop {
            match self.reader.read_one(source) {
                PushOutcome::NoByte => break,
                PushOutcome::Complete => {
                    if let Some(frame) = self.reader.frame() {
                        self.bridge.enqueue(frame);
                    }
                }
                PushOutcome::Next | PushOutcome::Skipped => {}
                PushOutcome::Error(FrameError::Io(kind)) => {
                    lost = Some(kind);
                    break;
                }
                PushOutcome::Error(e) => debug!("Dropped frame: {}", e),
            }
        }

        if let Some(kind) = lost {
            warn!(
                "Capture device {} lost: {}",
                self.provider.capture_name(),
                std::io::Error::from(kind)
            );
            self.close_capture();
        }
    }
}

impl<P: DeviceProvider + 'static> Supervisor<P> {
    /// Run [`tick`](Self::tick) on a dedicated thread every poll interval.
    pub fn spawn(self) -> Result<SupervisorHandle> {
        let (command_sender, command_receiver) = bounded(16);
        let state = Arc::clone(&self.state);
        let bridge = Arc::clone(&self.bridge);
        state.running.store(true, Ordering::SeqCst);

        let thread = thread::Builder::new()
            .name("midibridge-supervisor".to_string())
            .spawn(move || self.run(command_receiver))
            .map_err(|e| {
                state.running.store(false, Ordering::SeqCst);
                Error::Io(e)
            })?;

        Ok(SupervisorHandle {
            command_sender,
            state,
            bridge,
            thread: Some(thread),
        })
    }

    fn run(mut self, command_receiver: Receiver<SupervisorCommand>) {
        let interval = self.config.poll_interval();
        loop {
            if self.tick() == TickStatus::Shutdown {
                break;
            }
            match command_receiver.recv_timeout(interval) {
                Ok(SupervisorCommand::Shutdown) => break,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.close_all();
        self.state.running.store(false, Ordering::SeqCst);
        debug!("Supervisor thread exiting");
    }
}

impl<P: DeviceProvider> std::fmt::Debug for Supervisor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("capture_open", &self.is_capture_open())
            .field("playback_open", &self.is_playback_open())
            .field("stats", &self.reader.stats())
            .finish_non_exhaustive()
    }
}

/// Handle to a spawned [`Supervisor`]. Dropping it stops the thread.
pub struct SupervisorHandle {
    command_sender: Sender<SupervisorCommand>,
    state: Arc<DeviceState>,
    bridge: Arc<MidiBridge>,
    thread: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    pub fn bridge(&self) -> &Arc<MidiBridge> {
        &self.bridge
    }

    /// `false` once the thread has exited, on request or device loss.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn is_capture_open(&self) -> bool {
        self.state.capture_open.load(Ordering::SeqCst)
    }

    pub fn is_playback_open(&self) -> bool {
        self.state.playback_open.load(Ordering::SeqCst)
    }

    pub fn capture_device(&self) -> Option<String> {
        self.state.capture_device.load().as_ref().clone()
    }

    pub fn playback_device(&self) -> Option<String> {
        self.state.playback_device.load().as_ref().clone()
    }

    /// Stop the thread and wait for it to close its devices.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.command_sender.send(SupervisorCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Supervisor thread panicked");
            }
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
