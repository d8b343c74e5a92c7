//! Direct port writer
//!
//! Writes a job straight to a device node or serial port, bypassing any
//! spooler. Used for Linux `/dev` printers, and on Windows only as a second
//! attempt when a printer's spooler queue is backed by a real COM port.
//! Virtual USB port labels are never written to directly.
//!
//! The payload goes out in a single write call and the reported byte count
//! must match the payload length exactly.
//!
//! On Unix, device files are opened non-blocking and a write the device
//! cannot accept yet is retried until the job deadline, so a timed out job
//! closes its handle before returning. Windows handles have no such bound:
//! after a timeout the port stays held until the pending write returns.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::{info, instrument, warn};

use super::Printer;
use crate::error::{PrintError, PrintResult};
use crate::router::TransportKind;

const TRANSPORT: TransportKind = TransportKind::DirectFile;

/// Pause before retrying a write the device would block on
const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(10);

/// Extra wait on the blocking task past the job deadline
const RELEASE_GRACE: Duration = Duration::from_millis(500);

/// Baud rates tried, in order, by the legacy probe
pub const LEGACY_BAUD_RATES: [u32; 4] = [9600, 19200, 38400, 115200];

/// Serial line configuration
///
/// With neither an explicit rate nor the legacy probe, serial devices are
/// opened as plain files and keep whatever line settings they already have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialSettings {
    pub baud_rate: Option<u32>,
    /// Try [`LEGACY_BAUD_RATES`] until one opens without error. Success at
    /// a rate is not otherwise verified.
    pub legacy_baud_probe: bool,
}

impl SerialSettings {
    /// Rates to attempt, in order; empty means no line configuration
    pub fn baud_candidates(&self) -> Vec<u32> {
        match (self.baud_rate, self.legacy_baud_probe) {
            (Some(rate), _) => vec![rate],
            (None, true) => LEGACY_BAUD_RATES.to_vec(),
            (None, false) => Vec::new(),
        }
    }
}

/// Where a direct write goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectTarget {
    /// Windows serial port (`COM3`)
    Com(String),
    /// Device node or file path
    Path(PathBuf),
}

impl DirectTarget {
    /// Whether the target is a serial line whose baud rate can be set
    pub fn is_serial(&self) -> bool {
        match self {
            Self::Com(_) => true,
            Self::Path(path) => is_serial_device(path),
        }
    }

    fn port_name(&self) -> String {
        match self {
            Self::Com(name) => name.clone(),
            Self::Path(path) => path.to_string_lossy().into_owned(),
        }
    }

    fn file_path(&self) -> PathBuf {
        match self {
            Self::Com(name) => PathBuf::from(format!(r"\\.\{name}")),
            Self::Path(path) => path.clone(),
        }
    }
}

/// `/dev/tty*` and macOS `/dev/cu.*` nodes
pub fn is_serial_device(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("tty") || n.starts_with("cu."))
}

/// Open port, either configured serial or raw file
enum PortHandle {
    Serial(Box<dyn SerialPort>),
    File(File),
}

impl Write for PortHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Serial(port) => port.write(buf),
            Self::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Serial(port) => port.flush(),
            Self::File(file) => file.flush(),
        }
    }
}

fn open_exclusive(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.custom_flags(libc::O_NONBLOCK);
    }
    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        options.share_mode(0);
    }
    options.open(path)
}

/// Direct device / serial port printer
#[derive(Debug, Clone)]
pub struct DirectPortPrinter {
    target: DirectTarget,
    serial: SerialSettings,
    timeout: Duration,
}

impl DirectPortPrinter {
    pub fn new(target: DirectTarget, serial: SerialSettings, timeout: Duration) -> Self {
        Self {
            target,
            serial,
            timeout,
        }
    }

    pub fn target(&self) -> &DirectTarget {
        &self.target
    }

    fn open(&self) -> PrintResult<PortHandle> {
        let candidates = if self.target.is_serial() {
            self.serial.baud_candidates()
        } else {
            Vec::new()
        };

        if candidates.is_empty() {
            let path = self.target.file_path();
            return open_exclusive(&path).map(PortHandle::File).map_err(|e| {
                PrintError::transport(TRANSPORT, format!("open {}: {}", path.display(), e))
            });
        }

        let name = self.target.port_name();
        let probing = candidates.len() > 1;
        let mut last_error = None;
        for baud in candidates {
            if probing {
                info!(port = %name, baud, "trying baud rate");
            }
            // serialport opens unix ttys with exclusive access (TIOCEXCL)
            match serialport::new(&name, baud).timeout(self.timeout).open() {
                Ok(port) => {
                    if probing {
                        warn!(port = %name, baud, "legacy baud probe settled without verification");
                    }
                    return Ok(PortHandle::Serial(port));
                }
                Err(e) => {
                    warn!(port = %name, baud, error = %e, "serial open failed");
                    last_error = Some(e);
                }
            }
        }

        Err(PrintError::transport(
            TRANSPORT,
            format!(
                "open {name}: {}",
                last_error.map_or_else(|| "no baud rate".to_string(), |e| e.to_string())
            ),
        ))
    }

    /// Open, write the whole job in one call, flush.
    ///
    /// The port is closed before returning, including when `deadline` passes
    /// while the device refuses the write.
    pub fn print_sync(&self, data: &[u8], deadline: Instant) -> PrintResult<()> {
        let mut port = self.open()?;

        let written = loop {
            match port.write(data) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(PrintError::Timeout {
                            transport: TRANSPORT,
                            after: self.timeout,
                        });
                    }
                    std::thread::sleep(WOULD_BLOCK_BACKOFF);
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    return Err(PrintError::Timeout {
                        transport: TRANSPORT,
                        after: self.timeout,
                    });
                }
                Err(e) => {
                    return Err(PrintError::transport(TRANSPORT, format!("Write failed: {e}")));
                }
            }
        };
        if written != data.len() {
            return Err(PrintError::PartialWrite {
                transport: TRANSPORT,
                written,
                expected: data.len(),
            });
        }

        port.flush()
            .map_err(|e| PrintError::transport(TRANSPORT, format!("Flush failed: {e}")))
    }
}

impl Printer for DirectPortPrinter {
    #[instrument(skip(self, data), fields(target = ?self.target, data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        let printer = self.clone();
        let data = data.to_vec();
        let deadline = Instant::now() + self.timeout;

        let task = tokio::task::spawn_blocking(move || printer.print_sync(&data, deadline));
        let result = tokio::time::timeout(self.timeout + RELEASE_GRACE, task)
            .await
            .map_err(|_| {
                warn!("write still pending, port held until it returns");
                PrintError::Timeout {
                    transport: TRANSPORT,
                    after: self.timeout,
                }
            })?
            .map_err(|e| PrintError::transport(TRANSPORT, format!("Task join failed: {e}")))?;

        if result.is_ok() {
            info!("Print job written to port");
        }
        result
    }

    #[instrument(skip(self), fields(target = ?self.target))]
    async fn is_online(&self) -> bool {
        let printer = self.clone();
        match tokio::task::spawn_blocking(move || printer.open().map(drop)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "port not available");
                false
            }
            Err(e) => {
                warn!(error = %e, "port check task failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baud_candidates() {
        let explicit = SerialSettings {
            baud_rate: Some(115200),
            legacy_baud_probe: true,
        };
        assert_eq!(explicit.baud_candidates(), vec![115200]);

        let legacy = SerialSettings {
            baud_rate: None,
            legacy_baud_probe: true,
        };
        assert_eq!(legacy.baud_candidates(), vec![9600, 19200, 38400, 115200]);

        assert!(SerialSettings::default().baud_candidates().is_empty());
    }

    #[test]
    fn test_serial_detection() {
        assert!(DirectTarget::Com("COM3".to_string()).is_serial());
        assert!(DirectTarget::Path(PathBuf::from("/dev/ttyUSB0")).is_serial());
        assert!(DirectTarget::Path(PathBuf::from("/dev/cu.usbserial-1410")).is_serial());
        assert!(!DirectTarget::Path(PathBuf::from("/dev/usb/lp0")).is_serial());
    }

    #[test]
    fn test_com_file_path() {
        assert_eq!(
            DirectTarget::Com("COM10".to_string()).file_path(),
            PathBuf::from(r"\\.\COM10")
        );
    }

    #[tokio::test]
    async fn test_print_to_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let printer = DirectPortPrinter::new(
            DirectTarget::Path(file.path().to_path_buf()),
            SerialSettings::default(),
            Duration::from_secs(5),
        );

        assert!(printer.is_online().await);
        printer.print(b"\x1b@cupom\n").await.unwrap();
        assert_eq!(std::fs::read(file.path()).unwrap(), b"\x1b@cupom\n");
    }

    #[tokio::test]
    async fn test_missing_device() {
        let dir = tempfile::tempdir().unwrap();
        let printer = DirectPortPrinter::new(
            DirectTarget::Path(dir.path().join("lp9")),
            SerialSettings::default(),
            Duration::from_secs(5),
        );

        assert!(!printer.is_online().await);
        let err = printer.print(b"x").await.unwrap_err();
        assert!(matches!(
            err,
            PrintError::Transport {
                transport: TransportKind::DirectFile,
                ..
            }
        ));
    }

    /// Open `path` non-blocking for reading or writing
    #[cfg(target_os = "linux")]
    fn open_fifo(path: &Path, write: bool) -> File {
        use std::os::unix::fs::OpenOptionsExt;
        OpenOptions::new()
            .read(!write)
            .write(write)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .unwrap()
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_stalled_device_times_out_and_releases_port() {
        use std::ffi::CString;
        use std::io::Read;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let fifo = dir.path().join("lp0");
        let c_path = CString::new(fifo.as_os_str().as_bytes()).unwrap();
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) }, 0);

        // Reader that never reads, and a pipe already full
        let mut reader = open_fifo(&fifo, false);
        let mut filler = open_fifo(&fifo, true);
        let mut queued = 0;
        loop {
            match filler.write(&[0u8; 4096]) {
                Ok(n) => queued += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => panic!("fill: {e}"),
            }
        }
        drop(filler);

        let printer = DirectPortPrinter::new(
            DirectTarget::Path(fifo.clone()),
            SerialSettings::default(),
            Duration::from_millis(300),
        );
        let started = Instant::now();
        let err = printer.print(b"\x1b@cupom\n").await.unwrap_err();
        assert!(matches!(err, PrintError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(3));

        // Nothing from the aborted job reaches the device later
        tokio::time::sleep(Duration::from_millis(100)).await;
        let mut drained = 0;
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => drained += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => panic!("drain: {e}"),
            }
        }
        assert_eq!(drained, queued);

        // The port is free for the next job
        printer.print(b"\x1b@cupom\n").await.unwrap();
        let mut received = Vec::new();
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => received.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => panic!("read: {e}"),
            }
        }
        assert_eq!(received, b"\x1b@cupom\n");
    }
}
