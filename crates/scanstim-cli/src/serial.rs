use anyhow::{Context, Result};
use scanstim_lib::{InputDevice, RawKey, TriggerSource};
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;

/// Upper bound on bytes discarded by one flush.
const FLUSH_LIMIT: usize = 4096;

/// Line speed of the scanner's trigger box.
const TRIGGER_BAUD: libc::speed_t = libc::B19200;

/// Scanner trigger box on a serial port, read one byte per poll without blocking.
///
/// The line is switched to raw mode on open: the box sends single ASCII digits
/// with no line terminator, which a canonical tty would hold back.
pub struct SerialInput {
    port: File,
}

impl SerialInput {
    pub fn open(path: &Path) -> Result<Self> {
        let port = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(path)
            .with_context(|| format!("opening serial device {}", path.display()))?;
        make_raw(&port).with_context(|| format!("configuring serial device {}", path.display()))?;
        Ok(Self { port })
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(1) => Ok(Some(buf[0])),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(err).context("reading serial device"),
        }
    }
}

/// Raw 8N1 at `TRIGGER_BAUD`, receiver on, modem lines ignored.
fn make_raw(port: &File) -> io::Result<()> {
    let fd = port.as_raw_fd();
    // SAFETY: `fd` is an open descriptor owned by `port` for the whole call, and
    // `termios` is plain data that `tcgetattr` fully initializes before use.
    unsafe {
        let mut tio: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fd, &mut tio) != 0 {
            return Err(io::Error::last_os_error());
        }
        libc::cfmakeraw(&mut tio);
        tio.c_cflag |= libc::CLOCAL | libc::CREAD;
        if libc::cfsetspeed(&mut tio, TRIGGER_BAUD) != 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

impl InputDevice for SerialInput {
    fn source(&self) -> TriggerSource {
        TriggerSource::Serial
    }

    fn poll(&mut self) -> Result<Vec<RawKey>> {
        Ok(self
            .read_byte()?
            .map(|byte| vec![RawKey::Char(byte as char)])
            .unwrap_or_default())
    }

    fn flush(&mut self) -> Result<()> {
        for _ in 0..FLUSH_LIMIT {
            if self.read_byte()?.is_none() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::io::Write;
    use std::os::unix::io::FromRawFd;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    // ptsname returns a pointer into shared static storage
    static PTSNAME: Mutex<()> = Mutex::new(());

    /// Pseudo-terminal pair; the slave path stands in for the trigger device.
    fn open_pty() -> (File, PathBuf) {
        let _guard = PTSNAME.lock().unwrap();
        unsafe {
            let fd = libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY);
            assert!(fd >= 0, "posix_openpt: {}", io::Error::last_os_error());
            assert_eq!(libc::grantpt(fd), 0);
            assert_eq!(libc::unlockpt(fd), 0);
            let name = libc::ptsname(fd);
            assert!(!name.is_null());
            let path = PathBuf::from(CStr::from_ptr(name).to_string_lossy().into_owned());
            (File::from_raw_fd(fd), path)
        }
    }

    fn poll_until_some(input: &mut SerialInput) -> Vec<RawKey> {
        for _ in 0..500 {
            let keys = input.poll().unwrap();
            if !keys.is_empty() {
                return keys;
            }
            thread::sleep(Duration::from_millis(2));
        }
        Vec::new()
    }

    #[test]
    fn lone_trigger_byte_is_readable_without_newline() {
        let (mut master, slave) = open_pty();
        let mut input = SerialInput::open(&slave).unwrap();
        master.write_all(b"5").unwrap();
        master.flush().unwrap();
        assert_eq!(poll_until_some(&mut input), vec![RawKey::Char('5')]);
        assert!(input.poll().unwrap().is_empty());
    }

    #[test]
    fn reads_one_byte_per_poll() {
        let (mut master, slave) = open_pty();
        let mut input = SerialInput::open(&slave).unwrap();
        master.write_all(b"51").unwrap();
        assert_eq!(poll_until_some(&mut input), vec![RawKey::Char('5')]);
        assert_eq!(poll_until_some(&mut input), vec![RawKey::Char('1')]);
    }

    #[test]
    fn flush_drains_pending_bytes() {
        let (mut master, slave) = open_pty();
        let mut input = SerialInput::open(&slave).unwrap();
        master.write_all(b"5555").unwrap();
        assert_eq!(poll_until_some(&mut input), vec![RawKey::Char('5')]);
        thread::sleep(Duration::from_millis(50));
        input.flush().unwrap();
        assert!(input.poll().unwrap().is_empty());
    }

    #[test]
    fn missing_device_fails_to_open() {
        let dir = tempdir().unwrap();
        assert!(SerialInput::open(&dir.path().join("cu.none")).is_err());
    }

    #[test]
    fn plain_file_is_not_a_trigger_device() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tty");
        std::fs::write(&path, b"5").unwrap();
        assert!(SerialInput::open(&path).is_err());
    }
}
