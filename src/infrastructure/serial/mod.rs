//! Serial link transports
//!
//! ```text
//! ┌──────────────────────┐      LinkEvent       ┌───────────────────┐
//! │  SessionController   │ ◀──────────────────  │  SerialLink impl  │
//! │                      │  ──────────────────▶ │                   │
//! └──────────────────────┘   scan / connect /   │ - LoopbackLink    │
//!                            send bytes         │ - BleSerialLink   │
//!                                               └───────────────────┘
//! ```
//!
//! - [`loopback`] - in-process simulated robot, the default backend
//! - [`ble`] - BLE UART over an HM-10 style characteristic (feature `ble`)

#[cfg(feature = "ble")]
pub mod ble;
pub mod loopback;

#[cfg(feature = "ble")]
pub use ble::BleSerialLink;
pub use loopback::LoopbackLink;
