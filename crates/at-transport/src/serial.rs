use crate::{AtLink, PortInfo, RawResponse, ReplyStatus, Result, TransportError};
use serialport::{SerialPort, SerialPortType};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::debug;

/// AT command set over a UART (Bluefruit UART Friend and compatible modules)
pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open_with(path: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(20))
            .open()
            .map_err(|e| match e.kind {
                serialport::ErrorKind::NoDevice => TransportError::PortNotFound(path.to_string()),
                _ => TransportError::Io(e.to_string()),
            })?;
        Ok(SerialLink { port })
    }

    fn write_cmd(port: &mut dyn SerialPort, cmd: &str) -> Result<()> {
        port.write_all(cmd.as_bytes())
            .and_then(|_| port.write_all(b"\r\n"))
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(())
    }

    // Finds a complete status line anywhere in the accumulated reply.
    fn status_of(acc: &[u8]) -> Option<ReplyStatus> {
        acc.split(|&b| b == b'\n')
            .rev()
            .skip(1) // bytes after the last newline are an unfinished line
            .find_map(ReplyStatus::from_line)
    }
}

impl AtLink for SerialLink {
    fn open(path: &str) -> Result<Self>
    where
        Self: Sized,
    {
        Self::open_with(path, 9600)
    }

    fn list() -> Result<Vec<PortInfo>> {
        let mut out = Vec::new();
        for p in serialport::available_ports().map_err(|e| TransportError::Io(e.to_string()))? {
            match p.port_type {
                SerialPortType::UsbPort(_u) => {
                    out.push(PortInfo {
                        name: p.port_name,
                        driver: "usb-serial".to_string(),
                    });
                }
                _ => {
                    // Still include other serial ports; user can pick
                    out.push(PortInfo {
                        name: p.port_name,
                        driver: "serial".to_string(),
                    });
                }
            }
        }
        Ok(out)
    }

    fn exchange(&mut self, command: &str, wait_ms: u64) -> Result<RawResponse> {
        // Drop whatever an earlier, timed-out command left behind
        let _ = self.port.clear(serialport::ClearBuffer::Input);
        Self::write_cmd(&mut *self.port, command)?;
        debug!(command, wait_ms, "sent command");

        let deadline = Instant::now() + Duration::from_millis(wait_ms);
        let mut buf = [0u8; 128];
        let mut acc: Vec<u8> = Vec::with_capacity(256);
        while Instant::now() < deadline {
            match self.port.read(&mut buf) {
                Ok(n) if n > 0 => {
                    acc.extend_from_slice(&buf[..n]);
                    if let Some(status) = Self::status_of(&acc) {
                        return Ok(RawResponse::new(acc, Some(status)));
                    }
                }
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                Err(e) => return Err(TransportError::Io(e.to_string())),
            }
        }
        debug!(command, received = acc.len(), "reply window elapsed");
        Ok(RawResponse::new(acc, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_requires_complete_line() {
        assert_eq!(SerialLink::status_of(b"1\r\nOK"), None);
        assert_eq!(SerialLink::status_of(b"1\r\nOK\r\n"), Some(ReplyStatus::Ok));
        assert_eq!(SerialLink::status_of(b"ERROR\r\n"), Some(ReplyStatus::Error));
    }
}
