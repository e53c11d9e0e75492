use crate::{AtLink, PortInfo, RawResponse, ReplyStatus, Result};
use tracing::debug;

struct MockService {
    id: u8,
    uuid: u16,
}

struct MockCharacteristic {
    id: u8,
    service: u8,
    uuid: u16,
    properties: u8,
    min_len: usize,
    max_len: usize,
    datatype: u8,
    value: Vec<u8>,
}

/// An in-process radio module. Each instance holds its own GATT table.
///
/// Identifiers are assigned the way the hardware does it: services and characteristics are
/// numbered separately, starting at 1, in creation order. The table survives until a clear
/// or factory reset, so a test can build a catalog and then verify it.
pub struct MockModule {
    name: String,
    services: Vec<MockService>,
    characteristics: Vec<MockCharacteristic>,
    device_name: Option<String>,
    advertising: Vec<u8>,
    resets: u32,
    history: Vec<String>,
    refused: Vec<String>,
    // Listing lines sent before the reply window elapses; None answers in full
    listing_cut: Option<usize>,
}

impl MockModule {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            services: Vec::new(),
            characteristics: Vec::new(),
            device_name: None,
            advertising: Vec::new(),
            resets: 0,
            history: Vec::new(),
            refused: Vec::new(),
            listing_cut: None,
        }
    }

    /// Answer `ERROR` to every command starting with `prefix`.
    pub fn refuse(&mut self, prefix: &str) {
        self.refused.push(prefix.to_string());
    }

    /// Never answer the listing command, as if the module were busy.
    pub fn silence_listing(&mut self, silent: bool) {
        self.listing_cut = silent.then_some(0);
    }

    /// Send only the first `lines` lines of the listing, then go quiet before the status line.
    pub fn cut_listing(&mut self, lines: usize) {
        self.listing_cut = Some(lines);
    }

    /// Every command received, in order.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn characteristic_count(&self) -> usize {
        self.characteristics.len()
    }

    pub fn characteristic_value(&self, id: u8) -> Option<&[u8]> {
        self.characteristics
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.value.as_slice())
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn advertising_data(&self) -> &[u8] {
        &self.advertising
    }

    pub fn reset_count(&self) -> u32 {
        self.resets
    }

    /// The catalog listing as the module prints it, status line included.
    pub fn gatt_listing(&self) -> String {
        let mut out = String::new();
        for svc in &self.services {
            out.push_str(&format!("ID={:02X},UUID=0x{:04X}\r\n", svc.id, svc.uuid));
            for ch in self.characteristics.iter().filter(|c| c.service == svc.id) {
                out.push_str(&format!(
                    "  ID={:02X},UUID=0x{:04X},PROPERTIES=0x{:02X},MIN_LEN={},MAX_LEN={},DATATYPE={},VALUE={}\r\n",
                    ch.id,
                    ch.uuid,
                    ch.properties,
                    ch.min_len,
                    ch.max_len,
                    ch.datatype,
                    render_value(ch.value.as_slice(), ch.max_len),
                ));
            }
        }
        out.push_str("OK\r\n");
        out
    }

    fn handle(&mut self, command: &str) -> Option<String> {
        let (verb, args) = match command.split_once('=') {
            Some((v, a)) => (v, a),
            None => (command, ""),
        };
        match verb {
            "AT+GATTLIST" => Some(self.gatt_listing()),
            "AT+GATTCLEAR" => {
                self.services.clear();
                self.characteristics.clear();
                Some(ok(""))
            }
            "AT+FACTORYRESET" => {
                self.services.clear();
                self.characteristics.clear();
                self.device_name = None;
                self.advertising.clear();
                self.resets += 1;
                Some(ok(""))
            }
            "ATZ" => {
                self.resets += 1;
                Some(ok(""))
            }
            "AT+GATTADDSERVICE" => self.add_service(args),
            "AT+GATTADDCHAR" => self.add_characteristic(args),
            "AT+GATTCHAR" => self.characteristic(args),
            "AT+GAPDEVNAME" => {
                self.device_name = Some(args.to_string());
                Some(ok(""))
            }
            "AT+GAPSETADVDATA" => {
                self.advertising = parse_dashed(args)?;
                Some(ok(""))
            }
            _ => None,
        }
    }

    fn add_service(&mut self, args: &str) -> Option<String> {
        let uuid = field(args, "UUID").and_then(parse_number)?;
        let id = u8::try_from(self.services.len() + 1).ok()?;
        self.services.push(MockService {
            id,
            uuid: u16::try_from(uuid).ok()?,
        });
        Some(ok(&format!("{id}\r\n")))
    }

    fn add_characteristic(&mut self, args: &str) -> Option<String> {
        let service = self.services.last()?.id;
        let uuid = u16::try_from(field(args, "UUID").and_then(parse_number)?).ok()?;
        let properties = u8::try_from(field(args, "PROPERTIES").and_then(parse_number)?).ok()?;
        let min_len = field(args, "MIN_LEN").and_then(parse_number)? as usize;
        let max_len = field(args, "MAX_LEN").and_then(parse_number)? as usize;
        let datatype = field(args, "DATATYPE")
            .and_then(parse_number)
            .and_then(|d| u8::try_from(d).ok())
            .unwrap_or(0);
        if min_len > max_len {
            return None;
        }
        let id = u8::try_from(self.characteristics.len() + 1).ok()?;
        self.characteristics.push(MockCharacteristic {
            id,
            service,
            uuid,
            properties,
            min_len,
            max_len,
            datatype,
            value: vec![0; min_len],
        });
        Some(ok(&format!("{id}\r\n")))
    }

    fn characteristic(&mut self, args: &str) -> Option<String> {
        let (id, value) = match args.split_once(',') {
            Some((id, value)) => (id, Some(value)),
            None => (args, None),
        };
        let id = u8::try_from(parse_number(id)?).ok()?;
        let ch = self.characteristics.iter_mut().find(|c| c.id == id)?;
        match value {
            Some(v) => {
                let bytes = parse_dashed(v)?;
                if bytes.len() > ch.max_len {
                    return None;
                }
                ch.value = bytes;
                Some(ok(""))
            }
            None => Some(ok(&format!("{}\r\n", crate::hex_dashed(&ch.value)))),
        }
    }
}

impl AtLink for MockModule {
    fn open(name: &str) -> Result<Self> {
        Ok(Self::new(name))
    }

    fn list() -> Result<Vec<PortInfo>> {
        Ok(vec![PortInfo {
            name: "mock0".to_string(),
            driver: "mock".to_string(),
        }])
    }

    fn exchange(&mut self, command: &str, wait_ms: u64) -> Result<RawResponse> {
        let command = command.trim();
        self.history.push(command.to_string());
        debug!(port = %self.name, command, wait_ms, "mock exchange");
        if let (Some(keep), "AT+GATTLIST") = (self.listing_cut, command) {
            let listing = self.gatt_listing();
            let partial: String = listing.split_inclusive('\n').take(keep).collect();
            return Ok(RawResponse::new(partial.into_bytes(), None));
        }
        let refused = self.refused.iter().any(|p| command.starts_with(p.as_str()));
        let reply = if refused { None } else { self.handle(command) };
        Ok(match reply {
            Some(text) => RawResponse::new(text.into_bytes(), Some(ReplyStatus::Ok)),
            None => RawResponse::new(b"ERROR\r\n".to_vec(), Some(ReplyStatus::Error)),
        })
    }
}

fn ok(payload: &str) -> String {
    format!("{payload}OK\r\n")
}

fn field<'a>(args: &'a str, key: &str) -> Option<&'a str> {
    args.split(',')
        .filter_map(|kv| kv.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
}

fn parse_number(s: &str) -> Option<u32> {
    let t = s.trim();
    match t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => t.parse::<u32>().ok(),
    }
}

fn parse_dashed(s: &str) -> Option<Vec<u8>> {
    let t = s.trim();
    if t.is_empty() {
        return Some(Vec::new());
    }
    t.split('-')
        .map(|b| u8::from_str_radix(b.trim(), 16).ok())
        .collect()
}

// Short slots print as an integer, longer ones as dashed hex.
fn render_value(value: &[u8], max_len: usize) -> String {
    if max_len <= 4 {
        let mut buf = [0u8; 4];
        for (i, b) in value.iter().take(4).enumerate() {
            buf[i] = *b;
        }
        u32::from_le_bytes(buf).to_string()
    } else {
        crate::hex_dashed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_list() {
        let mut m = MockModule::new("mock0");
        assert_eq!(m.send_for_id("AT+GATTADDSERVICE=UUID=0x1818").unwrap(), 1);
        let id = m
            .send_for_id(
                "AT+GATTADDCHAR=UUID=0x2A63,PROPERTIES=0x10,MIN_LEN=6,MAX_LEN=6,DATATYPE=0",
            )
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(
            m.gatt_listing(),
            "ID=01,UUID=0x1818\r\n  ID=01,UUID=0x2A63,PROPERTIES=0x10,MIN_LEN=6,MAX_LEN=6,DATATYPE=0,VALUE=00-00-00-00-00-00\r\nOK\r\n"
        );
    }

    #[test]
    fn test_characteristic_requires_service() {
        let mut m = MockModule::new("mock0");
        let res = m.send_for_id("AT+GATTADDCHAR=UUID=0x2A65,PROPERTIES=0x02,MIN_LEN=4,MAX_LEN=4");
        assert!(res.is_err());
    }

    #[test]
    fn test_set_char_respects_max_len() {
        let mut m = MockModule::new("mock0");
        m.send_for_id("AT+GATTADDSERVICE=UUID=0x1818").unwrap();
        m.send_for_id("AT+GATTADDCHAR=UUID=0x2A5D,PROPERTIES=0x02,MIN_LEN=1,MAX_LEN=1")
            .unwrap();
        assert!(m.set_char_u8(1, 6).is_ok());
        assert_eq!(m.characteristic_value(1), Some([6u8].as_slice()));
        assert!(m.set_char_u32(1, 6).is_err());
    }

    #[test]
    fn test_refused_command_is_not_acknowledged() {
        let mut m = MockModule::new("mock0");
        m.refuse("AT+GATTCLEAR");
        let err = m.send_check_ok("AT+GATTCLEAR").unwrap_err();
        assert!(matches!(err, crate::TransportError::NotAcknowledged(_)));
    }

    #[test]
    fn test_silent_listing_times_out() {
        let mut m = MockModule::new("mock0");
        m.silence_listing(true);
        let resp = m.exchange("AT+GATTLIST", 100).unwrap();
        assert!(resp.timed_out());
        assert!(resp.bytes.is_empty());
    }

    #[test]
    fn test_cut_listing_stops_before_status() {
        let mut m = MockModule::new("mock0");
        m.send_for_id("AT+GATTADDSERVICE=UUID=0x1818").unwrap();
        m.send_for_id("AT+GATTADDCHAR=UUID=0x2A5D,PROPERTIES=0x02,MIN_LEN=1,MAX_LEN=1")
            .unwrap();
        m.cut_listing(1);
        let resp = m.exchange("AT+GATTLIST", 100).unwrap();
        assert!(resp.timed_out());
        assert_eq!(resp.bytes, b"ID=01,UUID=0x1818\r\n".to_vec());
    }

    #[test]
    fn test_factory_reset_clears_table() {
        let mut m = MockModule::new("mock0");
        m.send_for_id("AT+GATTADDSERVICE=UUID=0x1818").unwrap();
        m.factory_reset().unwrap();
        assert_eq!(m.service_count(), 0);
        assert_eq!(m.reset_count(), 1);
        assert_eq!(m.gatt_listing(), "OK\r\n");
    }
}
