//! Port driver seam.
//!
//! The session never talks to hardware directly; it goes through a
//! `PortDriver`, which makes the real `serialport` backend and the in-memory
//! mock interchangeable.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::{MockDeviceHandle, MockPortDriver};
pub use sync_port::{SerialDeviceHandle, SerialPortDriver, MAX_LINE_LEN};
pub use traits::*;
