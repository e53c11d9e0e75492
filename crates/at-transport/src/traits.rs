use crate::{PortInfo, RawResponse, Result, TransportError};

/// Reply window for ordinary configuration commands.
pub const COMMAND_WAIT_MS: u64 = 250;

/// Reply window for commands that restart the module.
pub const RESET_WAIT_MS: u64 = 1000;

/// A minimal blocking command channel to a radio module.
pub trait AtLink {
    /// Open a module by port name (e.g., "/dev/ttyUSB0", "mock0").
    fn open(name: &str) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list available ports for this backend.
    fn list() -> Result<Vec<PortInfo>>;

    /// Send one command line and collect the reply until a status line arrives or
    /// `wait_ms` elapses. Elapsing is not an error: the response comes back with no status.
    fn exchange(&mut self, command: &str, wait_ms: u64) -> Result<RawResponse>;

    /// Send a command and require an `OK` status.
    fn send_check_ok(&mut self, command: &str) -> Result<RawResponse> {
        let wait_ms = if is_reset_command(command) {
            RESET_WAIT_MS
        } else {
            COMMAND_WAIT_MS
        };
        let resp = self.exchange(command, wait_ms)?;
        if resp.is_ok() {
            Ok(resp)
        } else {
            Err(TransportError::NotAcknowledged(command.to_string()))
        }
    }

    /// Send a creation command and parse the identifier the module assigned.
    fn send_for_id(&mut self, command: &str) -> Result<u8> {
        let resp = self.send_check_ok(command)?;
        let line = resp
            .payload_lines()
            .next()
            .ok_or(TransportError::InvalidReply("missing identifier"))?;
        let text =
            std::str::from_utf8(line).map_err(|_| TransportError::InvalidReply("utf8"))?;
        text.trim()
            .parse::<u8>()
            .map_err(|_| TransportError::InvalidReply("identifier"))
    }

    /// Write raw bytes to a characteristic.
    fn set_char(&mut self, id: u8, value: &[u8]) -> Result<()> {
        self.send_check_ok(&format!("AT+GATTCHAR={id},{}", hex_dashed(value)))?;
        Ok(())
    }

    fn set_char_u8(&mut self, id: u8, value: u8) -> Result<()> {
        self.set_char(id, &[value])
    }

    /// Integers are written in little-endian byte order.
    fn set_char_u32(&mut self, id: u8, value: u32) -> Result<()> {
        self.set_char(id, &value.to_le_bytes())
    }

    fn factory_reset(&mut self) -> Result<()> {
        self.send_check_ok("AT+FACTORYRESET")?;
        Ok(())
    }

    fn soft_reset(&mut self) -> Result<()> {
        self.send_check_ok("ATZ")?;
        Ok(())
    }
}

fn is_reset_command(command: &str) -> bool {
    command == "ATZ" || command == "AT+FACTORYRESET"
}

/// Render bytes the way the module expects them: `0A-FF-00`.
pub fn hex_dashed(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push('-');
        }
        out.push_str(&format!("{b:02X}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_dashed() {
        assert_eq!(hex_dashed(&[0x0a, 0xff, 0x00]), "0A-FF-00");
        assert_eq!(hex_dashed(&[]), "");
    }
}
