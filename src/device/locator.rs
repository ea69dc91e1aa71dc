//! Device resolution and series classification.
//!
//! Scans the candidate product ids in fixed priority order and classifies
//! the first match into a protocol series. Absence of a device is a normal
//! outcome — the session just does not start.

use std::sync::Arc;

use log::{info, warn};

use crate::config::ModeConfig;
use crate::device::transport::{DeviceInfo, HidHandle, HidTransport};
use crate::protocol::{CANDIDATE_PRODUCT_IDS, DEEPCOOL_VID, Series};

/// A resolved display device. Immutable for the session once resolved;
/// `handle` is `None` when the open failed (writes then degrade per tick).
pub struct Device {
    pub vendor_id: u16,
    pub product_id: u16,
    pub series: Series,
    pub handle: Option<Arc<dyn HidHandle>>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("vendor_id", &format_args!("{:#06x}", self.vendor_id))
            .field("product_id", &format_args!("{:#06x}", self.product_id))
            .field("series", &self.series)
            .field("open", &self.handle.is_some())
            .finish()
    }
}

/// Candidate product ids in detection priority order, with an optional
/// override tried first and duplicates removed.
pub fn candidate_order(product_override: Option<u16>) -> Vec<u16> {
    let mut order = Vec::with_capacity(CANDIDATE_PRODUCT_IDS.len() + 1);
    if let Some(pid) = product_override {
        order.push(pid);
    }
    for pid in CANDIDATE_PRODUCT_IDS {
        if !order.contains(&pid) {
            order.push(pid);
        }
    }
    order
}

/// Resolve a display device.
///
/// Returns `None` when no candidate product id is present. An open failure
/// is logged and the device is still returned, without a handle, so the
/// session can continue best-effort.
pub fn resolve(transport: &dyn HidTransport, config: &ModeConfig) -> Option<Device> {
    let vendor_id = config.vendor_id.unwrap_or(DEEPCOOL_VID);
    let present = transport.enumerate(vendor_id);

    for pid in candidate_order(config.product_id) {
        let Some(info) = present.iter().find(|d| d.product_id == pid) else {
            continue;
        };
        return Some(open_device(transport, info, vendor_id));
    }

    info!(
        "No display device found for vendor {:#06x} among {} candidate ids",
        vendor_id,
        candidate_order(config.product_id).len()
    );
    None
}

fn open_device(transport: &dyn HidTransport, info: &DeviceInfo, vendor_id: u16) -> Device {
    let series = Series::from_product_id(info.product_id);
    info!(
        "Found display device {:#06x}:{:#06x}, series {}",
        vendor_id, info.product_id, series
    );

    let handle = match transport.open(info) {
        Ok(handle) => Some(Arc::from(handle)),
        Err(e) => {
            // Best-effort: keep the device, writes will be skipped per tick.
            warn!("Failed to open device {:#06x}: {}", info.product_id, e);
            None
        }
    };

    Device {
        vendor_id,
        product_id: info.product_id,
        series,
        handle,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use std::ffi::CString;

    struct FakeTransport {
        devices: Vec<(u16, u16)>,
    }

    struct NullHandle;

    impl HidHandle for NullHandle {
        fn write_report(&self, data: &[u8]) -> Result<usize> {
            Ok(data.len())
        }
        fn read_report(&self, _buf: &mut [u8], _timeout_ms: i32) -> Result<usize> {
            Ok(0)
        }
    }

    impl HidTransport for FakeTransport {
        fn enumerate(&self, vendor_id: u16) -> Vec<DeviceInfo> {
            self.devices
                .iter()
                .filter(|(vid, _)| *vid == vendor_id)
                .map(|(vid, pid)| DeviceInfo {
                    vendor_id: *vid,
                    product_id: *pid,
                    path: CString::new(format!("fake:{:04x}", pid)).unwrap(),
                })
                .collect()
        }

        fn open(&self, _info: &DeviceInfo) -> Result<Box<dyn HidHandle>> {
            Ok(Box::new(NullHandle))
        }
    }

    #[test]
    fn test_candidate_priority_order() {
        assert_eq!(
            candidate_order(None),
            vec![0x0007, 0x000A, 0x000B, 0x000C, 0x0010]
        );
    }

    #[test]
    fn test_candidate_override_first_and_deduplicated() {
        assert_eq!(
            candidate_order(Some(0x000B)),
            vec![0x000B, 0x0007, 0x000A, 0x000C, 0x0010]
        );
        assert_eq!(
            candidate_order(Some(0x1234)),
            vec![0x1234, 0x0007, 0x000A, 0x000B, 0x000C, 0x0010]
        );
    }

    #[test]
    fn test_resolve_priority() {
        // 0x000A is connected but 0x0007 has higher priority.
        let transport = FakeTransport {
            devices: vec![(DEEPCOOL_VID, 0x000A), (DEEPCOOL_VID, 0x0007)],
        };
        let device = resolve(&transport, &ModeConfig::default()).unwrap();
        assert_eq!(device.product_id, 0x0007);
        assert_eq!(device.series, Series::Ch);
        assert!(device.handle.is_some());
    }

    #[test]
    fn test_resolve_product_override() {
        let transport = FakeTransport {
            devices: vec![(DEEPCOOL_VID, 0x0007), (DEEPCOOL_VID, 0x000A)],
        };
        let config = ModeConfig {
            product_id: Some(0x000A),
            ..Default::default()
        };
        let device = resolve(&transport, &config).unwrap();
        assert_eq!(device.product_id, 0x000A);
        assert_eq!(device.series, Series::Ld);
    }

    #[test]
    fn test_resolve_vendor_override() {
        let transport = FakeTransport {
            devices: vec![(0x1234, 0x000B)],
        };
        assert!(resolve(&transport, &ModeConfig::default()).is_none());

        let config = ModeConfig {
            vendor_id: Some(0x1234),
            ..Default::default()
        };
        let device = resolve(&transport, &config).unwrap();
        assert_eq!(device.vendor_id, 0x1234);
        assert_eq!(device.series, Series::Ch);
    }

    #[test]
    fn test_resolve_unknown_series() {
        let transport = FakeTransport {
            devices: vec![(DEEPCOOL_VID, 0x0010)],
        };
        let device = resolve(&transport, &ModeConfig::default()).unwrap();
        assert_eq!(device.series, Series::Unknown);
    }

    #[test]
    fn test_resolve_not_found_is_none() {
        let transport = FakeTransport { devices: vec![] };
        assert!(resolve(&transport, &ModeConfig::default()).is_none());
    }
}
