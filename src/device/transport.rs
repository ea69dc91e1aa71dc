//! HID transport abstraction over hidapi.
//!
//! The session only needs enumerate/open/write/read-with-timeout, so those
//! live behind small traits. Handles are `Send + Sync`: the tick task
//! writes while the diagnostic task reads, serialized by an interior lock.

use std::ffi::CString;
use std::sync::Mutex;

use hidapi::{HidApi, HidDevice};

use crate::error::{DisplayError, Result};

// =============================================================================
// Traits
// =============================================================================

/// An enumerated HID device, not yet opened.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub path: CString,
}

/// Open handle to a HID device.
pub trait HidHandle: Send + Sync {
    /// Write one output report. The first byte of `data` is the report id.
    fn write_report(&self, data: &[u8]) -> Result<usize>;

    /// Read one input report with a timeout in milliseconds.
    /// Returns 0 when no report arrived before the timeout.
    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize>;
}

/// HID device enumeration and opening.
pub trait HidTransport {
    /// List devices matching a vendor id.
    fn enumerate(&self, vendor_id: u16) -> Vec<DeviceInfo>;

    /// Open a device previously returned by `enumerate`.
    fn open(&self, info: &DeviceInfo) -> Result<Box<dyn HidHandle>>;
}

// =============================================================================
// hidapi Implementation
// =============================================================================

/// Transport backed by the system hidapi library.
pub struct HidApiTransport {
    api: HidApi,
}

impl HidApiTransport {
    pub fn new() -> Result<Self> {
        let api = HidApi::new().map_err(DisplayError::HidError)?;
        Ok(Self { api })
    }
}

impl HidTransport for HidApiTransport {
    fn enumerate(&self, vendor_id: u16) -> Vec<DeviceInfo> {
        self.api
            .device_list()
            .filter(|info| info.vendor_id() == vendor_id)
            .map(|info| DeviceInfo {
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
                path: info.path().to_owned(),
            })
            .collect()
    }

    fn open(&self, info: &DeviceInfo) -> Result<Box<dyn HidHandle>> {
        let device = self
            .api
            .open_path(&info.path)
            .map_err(DisplayError::HidError)?;
        Ok(Box::new(HidApiHandle {
            device: Mutex::new(device),
        }))
    }
}

struct HidApiHandle {
    device: Mutex<HidDevice>,
}

impl HidApiHandle {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HidDevice>> {
        self.device
            .lock()
            .map_err(|_| DisplayError::Transport("HID handle lock poisoned".into()))
    }
}

impl HidHandle for HidApiHandle {
    fn write_report(&self, data: &[u8]) -> Result<usize> {
        let device = self.lock()?;
        device.write(data).map_err(DisplayError::HidError)
    }

    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize> {
        let device = self.lock()?;
        device
            .read_timeout(buf, timeout_ms)
            .map_err(DisplayError::HidError)
    }
}
