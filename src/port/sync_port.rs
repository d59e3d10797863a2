//! Blocking serial driver backed by the `serialport` crate.
//!
//! Reads are line-buffered: bytes that arrive after a terminator stay in the
//! handle's buffer and are returned by the next `read_line`.

use super::error::PortError;
use super::traits::{DeviceHandle, PortDriver, PortSettings};
use std::io::{Read, Write};
use tracing::{debug, trace};

/// Longest line the driver buffers before giving up on a terminator.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Read chunk size used when `minimum_bytes_to_read` is smaller.
const READ_CHUNK: usize = 256;

/// Opens real serial devices.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPortDriver;

impl SerialPortDriver {
    pub fn new() -> Self {
        Self
    }
}

impl PortDriver for SerialPortDriver {
    fn open(
        &self,
        path: &str,
        settings: &PortSettings,
    ) -> Result<Box<dyn DeviceHandle>, PortError> {
        let handle = SerialDeviceHandle::open(path, settings)?;
        Ok(Box::new(handle))
    }
}

/// An open serial device.
pub struct SerialDeviceHandle {
    /// `None` once closed.
    port: Option<Box<dyn serialport::SerialPort>>,
    name: String,
    pending: Vec<u8>,
    chunk: usize,
}

impl SerialDeviceHandle {
    /// Open a serial device with the given settings.
    ///
    /// # Example
    /// ```no_run
    /// use threadsafe_serial::port::{PortSettings, SerialDeviceHandle};
    ///
    /// let port = SerialDeviceHandle::open("/dev/ttyUSB0", &PortSettings::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(path: &str, settings: &PortSettings) -> Result<Self, PortError> {
        let port = serialport::new(path, settings.baud_rate)
            .data_bits(settings.data_bits.into())
            .flow_control(settings.flow_control.into())
            .parity(settings.parity.into())
            .stop_bits(settings.stop_bits.into())
            .timeout(settings.read_timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(path),
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        debug!(path, baud = settings.baud_rate, "serial device opened");
        Ok(Self {
            port: Some(port),
            name: path.to_string(),
            pending: Vec::new(),
            chunk: settings.minimum_bytes_to_read.max(READ_CHUNK),
        })
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, PortError> {
        let name = &self.name;
        self.port
            .as_mut()
            .ok_or_else(|| PortError::disconnected(name.clone()))
    }
}

/// Remove and decode the first complete line in `pending`, if any.
fn take_line(pending: &mut Vec<u8>) -> Option<String> {
    let end = pending.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = pending.drain(..=end).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(String::from_utf8_lossy(&line).into_owned())
}

impl DeviceHandle for SerialDeviceHandle {
    fn read_line(&mut self) -> Result<String, PortError> {
        let mut buf = vec![0u8; self.chunk];
        loop {
            if let Some(line) = take_line(&mut self.pending) {
                return Ok(line);
            }
            if self.pending.len() > MAX_LINE_LEN {
                self.pending.clear();
                return Err(PortError::LineTooLong(MAX_LINE_LEN));
            }

            let name = self.name.clone();
            let port = self.port_mut()?;
            let timeout = port.timeout();
            match port.read(&mut buf) {
                Ok(0) => return Err(PortError::disconnected(name)),
                Ok(n) => {
                    trace!(path = %name, bytes = n, "serial read");
                    self.pending.extend_from_slice(&buf[..n]);
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(PortError::timeout(timeout));
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(PortError::Io(e)),
            }
        }
    }

    fn write_str(&mut self, data: &str) -> Result<usize, PortError> {
        let port = self.port_mut()?;
        port.write_all(data.as_bytes())?;
        port.flush()?;
        Ok(data.len())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            self.pending.clear();
            debug!(path = %self.name, "serial device closed");
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for SerialDeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialDeviceHandle")
            .field("name", &self.name)
            .field("open", &self.port.is_some())
            .field("buffered", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_error() {
        let result =
            SerialPortDriver::new().open("/dev/nonexistent_port_12345", &PortSettings::default());

        match result {
            Err(PortError::NotFound(name)) => assert!(name.contains("nonexistent")),
            Err(_) => {}
            Ok(handle) => panic!("unexpectedly opened {:?}", handle),
        }
    }

    #[test]
    fn test_take_line_strips_terminators() {
        let mut pending = b"OK\r\nREADY\nrest".to_vec();
        assert_eq!(take_line(&mut pending).as_deref(), Some("OK"));
        assert_eq!(take_line(&mut pending).as_deref(), Some("READY"));
        assert_eq!(take_line(&mut pending), None);
        assert_eq!(pending, b"rest");
    }

    #[test]
    fn test_take_line_empty_line() {
        let mut pending = b"\n".to_vec();
        assert_eq!(take_line(&mut pending).as_deref(), Some(""));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_take_line_lossy_utf8() {
        let mut pending = vec![0x66, 0xff, 0x6f, b'\n'];
        assert_eq!(take_line(&mut pending).as_deref(), Some("f\u{fffd}o"));
    }
}
