/// Fletcher-16 over `bytes`, both accumulators modulo 256.
///
/// Order sensitive but not collision resistant: it catches accidental drift between a
/// module's catalog and the reference listing, nothing more.
pub fn fletcher16(bytes: &[u8]) -> u16 {
    let mut lo: u8 = 0;
    let mut hi: u8 = 0;
    for &b in bytes {
        lo = lo.wrapping_add(b);
        hi = hi.wrapping_add(lo);
    }
    (u16::from(hi) << 8) | u16::from(lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(fletcher16(b""), 0);
    }

    #[test]
    fn test_deterministic() {
        let line = b"ID=01,UUID=0x1818";
        assert_eq!(fletcher16(line), fletcher16(line));
    }

    #[test]
    fn test_order_sensitive() {
        assert_ne!(fletcher16(b"ab"), fletcher16(b"ba"));
    }

    #[test]
    fn test_known_vectors() {
        assert_eq!(fletcher16(b"ID=01,UUID=0x1818"), 0xAC45);
        assert_eq!(
            fletcher16(b"  ID=01,UUID=0x2A65,PROPERTIES=0x02,MIN_LEN=4,MAX_LEN=4,DATATYPE=0,VALUE=0"),
            0x389C
        );
        assert_eq!(
            fletcher16(
                b"  ID=02,UUID=0x2A63,PROPERTIES=0x10,MIN_LEN=6,MAX_LEN=6,DATATYPE=0,VALUE=00-00-00-00-00-00"
            ),
            0x228F
        );
        assert_eq!(
            fletcher16(b"  ID=03,UUID=0x2A5D,PROPERTIES=0x02,MIN_LEN=1,MAX_LEN=1,DATATYPE=0,VALUE=0"),
            0x39A6
        );
        assert_eq!(fletcher16(b"OK"), 0xE99A);
    }

    #[test]
    fn test_accumulators_wrap() {
        // 0xFF + 0x01 wraps lo to 0; hi = 0xFF + 0x00
        assert_eq!(fletcher16(&[0xFF, 0x01]), 0xFF00);
    }
}
