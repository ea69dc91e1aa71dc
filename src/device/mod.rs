//! Device resolution and HID transport.

pub mod locator;
pub mod transport;

pub use locator::{Device, resolve};
pub use transport::{DeviceInfo, HidApiTransport, HidHandle, HidTransport};
