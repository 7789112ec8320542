//! Opening capture and playback devices.

use std::io::{self, Write};

use midibridge_frame::ByteSource;

/// Opens the devices the supervisor manages. Called from the housekeeping
/// thread only, so opening may block.
pub trait DeviceProvider: Send {
    fn open_capture(&mut self) -> io::Result<Box<dyn ByteSource + Send>>;

    fn open_playback(&mut self) -> io::Result<Box<dyn Write + Send>>;

    fn has_capture(&self) -> bool;

    fn has_playback(&self) -> bool;

    /// Name shown in logs and by [`SupervisorHandle`](crate::SupervisorHandle).
    fn capture_name(&self) -> String {
        "capture".to_string()
    }

    fn playback_name(&self) -> String {
        "playback".to_string()
    }
}

impl<P: DeviceProvider + ?Sized> DeviceProvider for Box<P> {
    fn open_capture(&mut self) -> io::Result<Box<dyn ByteSource + Send>> {
        (**self).open_capture()
    }

    fn open_playback(&mut self) -> io::Result<Box<dyn Write + Send>> {
        (**self).open_playback()
    }

    fn has_capture(&self) -> bool {
        (**self).has_capture()
    }

    fn has_playback(&self) -> bool {
        (**self).has_playback()
    }

    fn capture_name(&self) -> String {
        (**self).capture_name()
    }

    fn playback_name(&self) -> String {
        (**self).playback_name()
    }
}

#[cfg(all(unix, feature = "device"))]
pub use self::unix::{CharDevice, CharDeviceProvider};

#[cfg(all(unix, feature = "device"))]
mod unix {
    use std::fs::{File, OpenOptions};
    use std::io::{self, Read, Write};
    use std::os::fd::AsFd;
    use std::os::unix::fs::OpenOptionsExt;
    use std::path::{Path, PathBuf};

    use midibridge_frame::ByteSource;
    use nix::errno::Errno;
    use nix::fcntl::OFlag;
    use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

    use super::DeviceProvider;

    /// Character device (or any file) opened non-blocking.
    #[derive(Debug)]
    pub struct CharDevice {
        file: File,
        path: PathBuf,
    }

    impl CharDevice {
        pub fn open_read(path: impl AsRef<Path>) -> io::Result<Self> {
            Self::open(path.as_ref(), OpenOptions::new().read(true))
        }

        pub fn open_write(path: impl AsRef<Path>) -> io::Result<Self> {
            Self::open(path.as_ref(), OpenOptions::new().write(true))
        }

        fn open(path: &Path, options: &mut OpenOptions) -> io::Result<Self> {
            let file = options.custom_flags(OFlag::O_NONBLOCK.bits()).open(path)?;
            Ok(Self {
                file,
                path: path.to_path_buf(),
            })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl ByteSource for CharDevice {
        fn poll_readable(&mut self) -> io::Result<bool> {
            let interest = PollFlags::POLLIN | PollFlags::POLLPRI;
            let mut fds = [PollFd::new(self.file.as_fd(), interest)];
            match poll(&mut fds, PollTimeout::ZERO) {
                Ok(0) => return Ok(false),
                Ok(_) => {}
                Err(Errno::EINTR) => return Ok(false),
                Err(e) => return Err(e.into()),
            }

            let revents = fds[0].revents().unwrap_or(PollFlags::empty());
            if revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL) {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    format!("{} hung up", self.path.display()),
                ));
            }
            Ok(revents.intersects(interest))
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.file.read(buf)
        }
    }

    impl Write for CharDevice {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.file.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.file.flush()
        }
    }

    /// Opens configured device paths; either side may be absent.
    #[derive(Debug, Clone, Default)]
    pub struct CharDeviceProvider {
        pub capture: Option<PathBuf>,
        pub playback: Option<PathBuf>,
    }

    impl CharDeviceProvider {
        pub fn new(capture: Option<PathBuf>, playback: Option<PathBuf>) -> Self {
            Self { capture, playback }
        }

        pub fn from_config(config: &crate::BridgeConfig) -> Self {
            Self::new(config.capture.clone(), config.playback.clone())
        }
    }

    fn not_configured(side: &str) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no {} device configured", side),
        )
    }

    impl DeviceProvider for CharDeviceProvider {
        fn open_capture(&mut self) -> io::Result<Box<dyn ByteSource + Send>> {
            let path = self.capture.as_ref().ok_or_else(|| not_configured("capture"))?;
            Ok(Box::new(CharDevice::open_read(path)?))
        }

        fn open_playback(&mut self) -> io::Result<Box<dyn Write + Send>> {
            let path = self.playback.as_ref().ok_or_else(|| not_configured("playback"))?;
            Ok(Box::new(CharDevice::open_write(path)?))
        }

        fn has_capture(&self) -> bool {
            self.capture.is_some()
        }

        fn has_playback(&self) -> bool {
            self.playback.is_some()
        }

        fn capture_name(&self) -> String {
            self.capture
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        }

        fn playback_name(&self) -> String {
            self.playback
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        }
    }

}
