//! Windows spooler binding
//!
//! Win32 winspool calls behind [`SpoolBackend`], plus the queue status
//! probe used by connection tests.

use core::ffi::c_void;
use std::time::Duration;

use tracing::{info, instrument, warn};
use windows::Win32::Graphics::Printing::{
    ClosePrinter, DOC_INFO_1W, EndDocPrinter, EndPagePrinter, GetPrinterW, OpenPrinterW,
    PRINTER_HANDLE, PRINTER_INFO_5W, PRINTER_INFO_6, PRINTER_STATUS_OFFLINE, StartDocPrinterW,
    StartPagePrinter, WritePrinter,
};
use windows::core::{BOOL, PCWSTR, PWSTR};

use super::Printer;
use super::spooler::{RawSpoolWriter, SpoolBackend, SpoolSettings};
use crate::error::{PrintError, PrintResult};
use crate::router::TransportKind;

const TRANSPORT: TransportKind = TransportKind::Spooler;

pub(crate) fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// winspool reports success either as `BOOL` or as `Result`
trait Succeeded {
    fn succeeded(self) -> bool;
}

impl Succeeded for BOOL {
    fn succeeded(self) -> bool {
        self.as_bool()
    }
}

impl Succeeded for windows::core::Result<()> {
    fn succeeded(self) -> bool {
        self.is_ok()
    }
}

fn check(ok: impl Succeeded, call: &str) -> PrintResult<()> {
    if ok.succeeded() {
        Ok(())
    } else {
        Err(PrintError::transport(
            TRANSPORT,
            format!("{call} failed: {}", std::io::Error::last_os_error()),
        ))
    }
}

/// winspool handle for one job
#[derive(Default)]
pub struct WinSpoolBackend {
    handle: PRINTER_HANDLE,
}

impl SpoolBackend for WinSpoolBackend {
    fn open_queue(&mut self, queue: &str) -> PrintResult<()> {
        let name_w = to_wide(queue);
        unsafe { OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut self.handle, None) }
            .map_err(|e| PrintError::transport(TRANSPORT, format!("OpenPrinterW({queue}): {e}")))
    }

    fn start_document(&mut self, doc_name: &str) -> PrintResult<()> {
        let doc_name_w = to_wide(doc_name);
        let datatype_w = to_wide("RAW");
        let doc_info = DOC_INFO_1W {
            pDocName: PWSTR(doc_name_w.as_ptr() as *mut _),
            pOutputFile: PWSTR::null(),
            pDatatype: PWSTR(datatype_w.as_ptr() as *mut _),
        };

        let job = unsafe { StartDocPrinterW(self.handle, 1, &doc_info as *const DOC_INFO_1W) };
        if job == 0 {
            return Err(PrintError::transport(
                TRANSPORT,
                format!(
                    "StartDocPrinter failed: {}",
                    std::io::Error::last_os_error()
                ),
            ));
        }
        Ok(())
    }

    fn start_page(&mut self) -> PrintResult<()> {
        check(unsafe { StartPagePrinter(self.handle) }, "StartPagePrinter")
    }

    fn write(&mut self, chunk: &[u8]) -> PrintResult<usize> {
        let mut written: u32 = 0;
        let ok = unsafe {
            WritePrinter(
                self.handle,
                chunk.as_ptr() as *const c_void,
                chunk.len() as u32,
                &mut written,
            )
        };
        check(ok, "WritePrinter")?;
        Ok(written as usize)
    }

    fn end_page(&mut self) -> PrintResult<()> {
        check(unsafe { EndPagePrinter(self.handle) }, "EndPagePrinter")
    }

    fn end_document(&mut self) -> PrintResult<()> {
        check(unsafe { EndDocPrinter(self.handle) }, "EndDocPrinter")
    }

    fn close_queue(&mut self) -> PrintResult<()> {
        let result = check(unsafe { ClosePrinter(self.handle) }, "ClosePrinter");
        self.handle = PRINTER_HANDLE::default();
        result
    }
}

/// Printer status and port name read from an open queue
pub(crate) struct QueueInfo {
    pub offline: bool,
    pub port: String,
}

/// Open `name`, read PRINTER_INFO_6 (status) and PRINTER_INFO_5 (port).
pub(crate) fn queue_info(name: &str) -> PrintResult<QueueInfo> {
    let mut handle = PRINTER_HANDLE::default();
    let name_w = to_wide(name);

    unsafe {
        OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut handle, None)
            .map_err(|e| PrintError::transport(TRANSPORT, format!("OpenPrinterW({name}): {e}")))?;

        let mut offline = false;
        let mut needed6: u32 = 0;
        let _ = GetPrinterW(handle, 6, None, &mut needed6);
        if needed6 > 0 {
            let mut buf6: Vec<u8> = vec![0; needed6 as usize];
            if GetPrinterW(handle, 6, Some(buf6.as_mut_slice()), &mut needed6).is_ok() {
                let info6 = std::ptr::read_unaligned(buf6.as_ptr() as *const PRINTER_INFO_6);
                offline = (info6.dwStatus & PRINTER_STATUS_OFFLINE) != 0;
            }
        }

        let mut port = String::new();
        let mut needed5: u32 = 0;
        let _ = GetPrinterW(handle, 5, None, &mut needed5);
        if needed5 > 0 {
            let mut buf5: Vec<u8> = vec![0; needed5 as usize];
            if GetPrinterW(handle, 5, Some(buf5.as_mut_slice()), &mut needed5).is_ok() {
                let info5 = std::ptr::read_unaligned(buf5.as_ptr() as *const PRINTER_INFO_5W);
                if !info5.pPortName.is_null() {
                    port = PWSTR(info5.pPortName.0).to_string().unwrap_or_default();
                }
            }
        }

        if !ClosePrinter(handle).succeeded() {
            warn!(printer = name, "ClosePrinter failed after status query");
        }

        Ok(QueueInfo { offline, port })
    }
}

/// Windows spooler queue printer
#[derive(Debug, Clone)]
pub struct SpoolerPrinter {
    name: String,
    writer: RawSpoolWriter,
    timeout: Duration,
}

impl SpoolerPrinter {
    pub fn new(name: &str, settings: SpoolSettings, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            writer: RawSpoolWriter::new(settings),
            timeout,
        }
    }

    /// Get the printer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a job synchronously (for use from blocking contexts)
    pub fn print_sync(&self, data: &[u8]) -> PrintResult<()> {
        // A queue marked offline still accepts jobs and then holds them
        if queue_info(&self.name).is_ok_and(|info| info.offline) {
            return Err(PrintError::transport(
                TRANSPORT,
                format!("Printer offline: {}", self.name),
            ));
        }

        let mut backend = WinSpoolBackend::default();
        self.writer
            .write(&mut backend, &self.name, data, self.timeout)
    }
}

impl Printer for SpoolerPrinter {
    #[instrument(skip(self, data), fields(printer = %self.name, data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        let printer = self.clone();
        let data = data.to_vec();
        let timeout = self.timeout;

        // The blocking task checks the same deadline between chunks and
        // releases the queue itself if this await gives up first.
        let task = tokio::task::spawn_blocking(move || printer.print_sync(&data));
        match tokio::time::timeout(timeout + Duration::from_secs(1), task).await {
            Ok(joined) => joined
                .map_err(|e| PrintError::transport(TRANSPORT, format!("Task join failed: {e}")))?,
            Err(_) => Err(PrintError::Timeout {
                transport: TRANSPORT,
                after: timeout,
            }),
        }
    }

    async fn is_online(&self) -> bool {
        let name = self.name.clone();
        match tokio::task::spawn_blocking(move || queue_info(&name)).await {
            Ok(Ok(info)) => {
                info!(port = %info.port, offline = info.offline, "queue status");
                !info.offline
            }
            Ok(Err(e)) => {
                warn!(error = %e, "queue status query failed");
                false
            }
            Err(e) => {
                warn!(error = %e, "queue status task failed");
                false
            }
        }
    }
}
