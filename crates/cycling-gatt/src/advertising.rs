//! GAP advertising payload and device naming.

use at_transport::hex_dashed;

/// Advertising data, byte-exact as centrals in the field have seen it:
///
/// - `02 01 06`: flags, LE general discoverable, BR/EDR not supported
/// - `02 0a 00`: tx power 0 dBm
/// - `11 06 ...`: 128-bit UART service UUID 6e400001-b5a3-f393-e0a9-e50e24dcca9e
/// - `03 02 18 18`: 16-bit service UUID list, Cycling Power only
pub const ADVERTISING_DATA: [u8; 28] = [
    0x02, 0x01, 0x06, //
    0x02, 0x0a, 0x00, //
    0x11, 0x06, 0x9e, 0xca, 0xdc, 0x24, 0x0e, 0xe5, 0xa9, 0xe0, 0x93, 0xf3, 0xa3, 0xb5, 0x01,
    0x00, 0x40, 0x6e, //
    0x03, 0x02, 0x18, 0x18,
];

pub const DEFAULT_DEVICE_NAME: &str = "PeloMon";

pub fn device_name_command(name: &str) -> String {
    format!("AT+GAPDEVNAME={name}")
}

pub fn advertising_command(data: &[u8]) -> String {
    format!("AT+GAPSETADVDATA={}", hex_dashed(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    // (type, payload) pairs of the length-prefixed AD structures
    fn ad_structures(data: &[u8]) -> Vec<(u8, &[u8])> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < data.len() {
            let len = usize::from(data[i]);
            if len == 0 || i + 1 + len > data.len() {
                break;
            }
            out.push((data[i + 1], &data[i + 2..i + 1 + len]));
            i += 1 + len;
        }
        out
    }

    #[test]
    fn test_advertising_structures() {
        let ad = ad_structures(&ADVERTISING_DATA);
        assert_eq!(ad.len(), 4);
        assert_eq!(ad[0], (0x01, [0x06u8].as_slice()));
        assert_eq!(ad[1], (0x0a, [0x00u8].as_slice()));
        assert_eq!(ad[2].0, 0x06);
        assert_eq!(ad[2].1.len(), 16);
        assert_eq!(ad[3], (0x02, [0x18u8, 0x18].as_slice()));
    }

    #[test]
    fn test_advertising_command() {
        let cmd = advertising_command(&ADVERTISING_DATA);
        assert!(cmd.starts_with("AT+GAPSETADVDATA=02-01-06-02-0A-00-11-06-9E-CA"));
        assert!(cmd.ends_with("03-02-18-18"));
    }
}
