//! Dallas/Maxim CRC8 checksum.
//!
//! The bootloader verifies every 16-byte block against this checksum, so the
//! implementation has to match the device bit for bit: seed `0x00`, reflected
//! polynomial `0x8C` (x^8 + x^5 + x^4 + 1), data consumed LSB first.

/// Reflected Dallas/Maxim polynomial.
const POLY: u8 = 0x8C;

/// Compute the Dallas/Maxim CRC8 of `data`.
///
/// ```
/// use n76flash::protocol::crc::crc8;
///
/// assert_eq!(crc8(&[]), 0x00);
/// assert_eq!(crc8(b"123456789"), 0xA1);
/// ```
pub fn crc8(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |crc, &byte| update(crc, byte))
}

/// Feed a single byte into a running CRC.
fn update(mut crc: u8, mut byte: u8) -> u8 {
    for _ in 0..8 {
        let mix = (crc ^ byte) & 0x01;
        crc >>= 1;
        if mix != 0 {
            crc ^= POLY;
        }
        byte >>= 1;
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_empty() {
        assert_eq!(crc8(&[]), 0x00);
    }

    #[test]
    fn test_crc8_check_value() {
        // Standard CRC-8/MAXIM check value
        assert_eq!(crc8(b"123456789"), 0xA1);
    }

    #[test]
    fn test_crc8_single_bytes() {
        assert_eq!(crc8(&[0x00]), 0x00);
        assert_eq!(crc8(&[0x01]), 0x5E);
        assert_eq!(crc8(&[0x80]), 0x8C);
        assert_eq!(crc8(&[0xFF]), 0x35);
    }

    #[test]
    fn test_crc8_one_wire_rom_id() {
        // DS18B20 ROM code from the Maxim application note 27 example:
        // family 0x02, serial 0x1C B8 01 00 00 00, CRC 0xA2
        let rom = [0x02, 0x1C, 0xB8, 0x01, 0x00, 0x00, 0x00];
        assert_eq!(crc8(&rom), 0xA2);
    }

    #[test]
    fn test_crc8_appended_crc_is_zero() {
        let mut data = b"N76E003 block!!!".to_vec();
        let crc = crc8(&data);
        data.push(crc);
        assert_eq!(crc8(&data), 0x00);
    }

    #[test]
    fn test_crc8_erased_block() {
        // Full 0xFF padding block
        assert_eq!(crc8(&[0xFF; 16]), 0x7B);
    }
}
