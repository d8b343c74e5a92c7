//! Windows spooler enumeration

use tracing::debug;
use windows::Win32::Graphics::Printing::{
    EnumPrintersW, GetDefaultPrinterW, PRINTER_ATTRIBUTE_WORK_OFFLINE, PRINTER_ENUM_CONNECTIONS,
    PRINTER_ENUM_LOCAL, PRINTER_INFO_2W, PRINTER_STATUS_BUSY, PRINTER_STATUS_ERROR,
    PRINTER_STATUS_NOT_AVAILABLE, PRINTER_STATUS_OFFLINE, PRINTER_STATUS_PAPER_OUT,
    PRINTER_STATUS_PRINTING, PRINTER_STATUS_PROCESSING,
};
use windows::core::PWSTR;

use super::{DiscoveredPrinter, PrinterStatus};
use crate::device::is_virtual_spooler_port;
use crate::error::{PrintError, PrintResult};

/// First port of a spooler port list, without the trailing colon of
/// `COM3:` / `LPT1:`
pub fn port_reference(ports: &str) -> String {
    let first = ports.split(',').next().unwrap_or_default().trim();
    first.strip_suffix(':').unwrap_or(first).to_string()
}

pub fn status_from_bits(status: u32, attributes: u32) -> PrinterStatus {
    const OFFLINE: u32 = PRINTER_STATUS_OFFLINE
        | PRINTER_STATUS_ERROR
        | PRINTER_STATUS_PAPER_OUT
        | PRINTER_STATUS_NOT_AVAILABLE;
    const BUSY: u32 = PRINTER_STATUS_PRINTING | PRINTER_STATUS_BUSY | PRINTER_STATUS_PROCESSING;

    if status & OFFLINE != 0 || attributes & PRINTER_ATTRIBUTE_WORK_OFFLINE != 0 {
        PrinterStatus::Offline
    } else if status & BUSY != 0 {
        PrinterStatus::Busy
    } else if status == 0 {
        PrinterStatus::Ready
    } else {
        PrinterStatus::Unknown
    }
}

fn default_printer() -> Option<String> {
    unsafe {
        let mut needed: u32 = 0;
        let _ = GetDefaultPrinterW(None, &mut needed);
        if needed == 0 {
            return None;
        }

        let mut buf: Vec<u16> = vec![0; needed as usize];
        if !GetDefaultPrinterW(Some(PWSTR(buf.as_mut_ptr())), &mut needed).as_bool() {
            return None;
        }
        PWSTR(buf.as_mut_ptr()).to_string().ok()
    }
}

/// Local and connected printers, excluding virtual spooler ports
pub fn enumerate() -> PrintResult<Vec<DiscoveredPrinter>> {
    let default = default_printer();
    let flags = PRINTER_ENUM_LOCAL | PRINTER_ENUM_CONNECTIONS;

    unsafe {
        let mut needed: u32 = 0;
        let mut returned: u32 = 0;
        let _ = EnumPrintersW(flags, None, 2, None, &mut needed, &mut returned);
        if needed == 0 {
            return Ok(Vec::new());
        }

        let mut buf: Vec<u8> = vec![0; needed as usize];
        EnumPrintersW(
            flags,
            None,
            2,
            Some(buf.as_mut_slice()),
            &mut needed,
            &mut returned,
        )
        .map_err(|e| PrintError::Configuration(format!("EnumPrintersW failed: {e}")))?;

        let mut printers = Vec::with_capacity(returned as usize);
        for i in 0..returned as usize {
            let info = std::ptr::read_unaligned(
                (buf.as_ptr() as *const PRINTER_INFO_2W).add(i),
            );
            if info.pPrinterName.is_null() {
                continue;
            }
            let name = PWSTR(info.pPrinterName.0).to_string().unwrap_or_default();
            let port = if info.pPortName.is_null() {
                String::new()
            } else {
                PWSTR(info.pPortName.0).to_string().unwrap_or_default()
            };

            if is_virtual_spooler_port(&port) {
                debug!(printer = %name, port = %port, "skipping virtual printer");
                continue;
            }

            printers.push(DiscoveredPrinter {
                is_default: default.as_deref() == Some(name.as_str()),
                device_reference: port_reference(&port),
                status: status_from_bits(info.Status, info.Attributes),
                display_name: name,
            });
        }

        Ok(printers)
    }
}
