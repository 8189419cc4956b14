// src/checksums.rs
//
// Checksum calculation algorithms and the trailer sign/verify layer used
// on framed payloads.

use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// Checksum configuration for a session or command.
/// Selects the algorithm and thereby the trailer width appended to payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumConfig {
    /// No checksum - sign is identity, verify always passes
    None,
    /// XOR of all bytes
    Xor,
    /// sum(bytes) & 0xFF
    Sum8,
    /// CRC-8 polynomial 0x07 (ITU/SMBUS)
    Crc8,
    /// CRC-8 Maxim polynomial 0x31 (1-Wire devices)
    Crc8Maxim,
    /// CRC-16 Modbus polynomial (0xA001)
    Crc16Modbus,
    /// CRC-16 CCITT polynomial (0x1021)
    Crc16Ccitt,
    /// CRC-32 IEEE (reflected, polynomial 0x04C11DB7)
    Crc32,
}

impl ChecksumConfig {
    /// Get the trailer size in bytes for this algorithm.
    pub fn output_bytes(&self) -> usize {
        match self {
            ChecksumConfig::None => 0,
            ChecksumConfig::Xor => 1,
            ChecksumConfig::Sum8 => 1,
            ChecksumConfig::Crc8 => 1,
            ChecksumConfig::Crc8Maxim => 1,
            ChecksumConfig::Crc16Modbus => 2,
            ChecksumConfig::Crc16Ccitt => 2,
            ChecksumConfig::Crc32 => 4,
        }
    }

    /// Parse algorithm from the external configuration surface.
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "none" => Ok(ChecksumConfig::None),
            "xor" => Ok(ChecksumConfig::Xor),
            "sum8" => Ok(ChecksumConfig::Sum8),
            "crc8" => Ok(ChecksumConfig::Crc8),
            "crc8_maxim" => Ok(ChecksumConfig::Crc8Maxim),
            "crc16_modbus" => Ok(ChecksumConfig::Crc16Modbus),
            "crc16_ccitt" => Ok(ChecksumConfig::Crc16Ccitt),
            "crc32" => Ok(ChecksumConfig::Crc32),
            _ => Err(format!("Unknown checksum algorithm: {}", s)),
        }
    }

    /// Calculate the checksum value over `data`.
    /// The value is at most 32 bits wide; narrower algorithms occupy the
    /// low bits.
    pub fn calculate(&self, data: &[u8]) -> u32 {
        match self {
            ChecksumConfig::None => 0,
            ChecksumConfig::Xor => xor_checksum(data) as u32,
            ChecksumConfig::Sum8 => sum8_checksum(data) as u32,
            ChecksumConfig::Crc8 => crc8_checksum(data) as u32,
            ChecksumConfig::Crc8Maxim => crc8_maxim_checksum(data) as u32,
            ChecksumConfig::Crc16Modbus => crc16_modbus_checksum(data) as u32,
            ChecksumConfig::Crc16Ccitt => crc16_ccitt_checksum(data) as u32,
            ChecksumConfig::Crc32 => crc32_checksum(data),
        }
    }

    /// Render the checksum value as trailer bytes (big-endian, trailer width).
    fn trailer(&self, value: u32) -> Vec<u8> {
        let width = self.output_bytes();
        value.to_be_bytes()[4 - width..].to_vec()
    }

    /// Return `data` with the checksum trailer appended.
    /// `None` returns the payload unchanged.
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let width = self.output_bytes();
        if width == 0 {
            return data.to_vec();
        }
        let value = self.calculate(data);
        let mut signed = Vec::with_capacity(data.len() + width);
        signed.extend_from_slice(data);
        signed.extend_from_slice(&self.trailer(value));
        signed
    }

    /// Verify the checksum trailer of `message`.
    ///
    /// Recomputes the checksum over all bytes except the trailing
    /// checksum-width bytes and compares the trailer region byte-for-byte.
    /// Hex-substring comparison would under-match at leading-zero nibbles
    /// (a checksum byte of 0x0A rendered as "a" vs "0a"), so the trailer
    /// bytes are compared exactly. `None` always verifies.
    pub fn verify(&self, message: &[u8]) -> bool {
        let width = self.output_bytes();
        if width == 0 {
            return true;
        }
        if message.len() < width {
            return false;
        }
        let (payload, trailer) = message.split_at(message.len() - width);
        let expected = self.trailer(self.calculate(payload));
        trailer == expected.as_slice()
    }
}

// ============================================================================
// Reflection Helpers
// ============================================================================

/// Reflect (reverse) the bits of a byte.
fn reflect8(mut value: u8) -> u8 {
    let mut result: u8 = 0;
    for _ in 0..8 {
        result = (result << 1) | (value & 1);
        value >>= 1;
    }
    result
}

/// Reflect (reverse) the bits of a 16-bit value.
fn reflect16(mut value: u16) -> u16 {
    let mut result: u16 = 0;
    for _ in 0..16 {
        result = (result << 1) | (value & 1);
        value >>= 1;
    }
    result
}

// ============================================================================
// Parameterised CRC Functions (Canonical Implementations)
// ============================================================================

/// CRC-8 with arbitrary parameters.
///
/// # Arguments
/// * `data` - The data to calculate CRC over
/// * `polynomial` - The CRC polynomial (e.g., 0x07 for standard CRC-8)
/// * `init` - Initial CRC value (e.g., 0x00 or 0xFF)
/// * `xor_out` - Final XOR value (e.g., 0x00 or 0xFF)
/// * `reflect` - Whether to use reflected (LSB-first) mode
pub fn crc8_parameterised(
    data: &[u8],
    polynomial: u8,
    init: u8,
    xor_out: u8,
    reflect: bool,
) -> u8 {
    let mut crc = init;

    if reflect {
        // Reflected mode (LSB-first processing)
        let reflected_poly = reflect8(polynomial);
        for &byte in data {
            crc ^= byte;
            for _ in 0..8 {
                if crc & 0x01 != 0 {
                    crc = (crc >> 1) ^ reflected_poly;
                } else {
                    crc >>= 1;
                }
            }
        }
    } else {
        // Normal mode (MSB-first processing)
        for &byte in data {
            crc ^= byte;
            for _ in 0..8 {
                if crc & 0x80 != 0 {
                    crc = (crc << 1) ^ polynomial;
                } else {
                    crc <<= 1;
                }
            }
        }
    }

    crc ^ xor_out
}

/// CRC-16 with arbitrary parameters.
///
/// # Arguments
/// * `data` - The data to calculate CRC over
/// * `polynomial` - The CRC polynomial (e.g., 0x8005 for CRC-16)
/// * `init` - Initial CRC value (e.g., 0x0000 or 0xFFFF)
/// * `xor_out` - Final XOR value (e.g., 0x0000 or 0xFFFF)
/// * `reflect_in` - Whether to reflect input bytes
/// * `reflect_out` - Whether to reflect the final CRC output
pub fn crc16_parameterised(
    data: &[u8],
    polynomial: u16,
    init: u16,
    xor_out: u16,
    reflect_in: bool,
    reflect_out: bool,
) -> u16 {
    let mut crc = init;

    if reflect_in {
        // Reflected input mode (LSB-first)
        let reflected_poly = reflect16(polynomial);
        for &byte in data {
            crc ^= byte as u16;
            for _ in 0..8 {
                if crc & 0x0001 != 0 {
                    crc = (crc >> 1) ^ reflected_poly;
                } else {
                    crc >>= 1;
                }
            }
        }
    } else {
        // Normal input mode (MSB-first)
        for &byte in data {
            crc ^= (byte as u16) << 8;
            for _ in 0..8 {
                if crc & 0x8000 != 0 {
                    crc = (crc << 1) ^ polynomial;
                } else {
                    crc <<= 1;
                }
            }
        }
    }

    let final_crc = if reflect_out != reflect_in {
        // Output reflection differs from the input processing mode
        reflect16(crc)
    } else {
        crc
    };

    final_crc ^ xor_out
}

// ============================================================================
// Named Checksum Functions
// ============================================================================

/// XOR of all bytes.
/// Simple but effective for detecting single-bit errors.
pub fn xor_checksum(data: &[u8]) -> u8 {
    let mut result: u8 = 0;
    for &byte in data {
        result ^= byte;
    }
    result
}

/// Simple modulo-256 sum of bytes (8-bit sum).
pub fn sum8_checksum(data: &[u8]) -> u8 {
    let mut sum: u8 = 0;
    for &byte in data {
        sum = sum.wrapping_add(byte);
    }
    sum
}

/// CRC-8 with polynomial 0x07 (ITU/SMBUS).
/// Common in many embedded protocols.
pub fn crc8_checksum(data: &[u8]) -> u8 {
    crc8_parameterised(data, 0x07, 0x00, 0x00, false)
}

/// CRC-8 Maxim with polynomial 0x31.
/// Used in Dallas/Maxim 1-Wire devices.
/// Init: 0x00, XOR out: 0x00, Reflected (LSB-first)
pub fn crc8_maxim_checksum(data: &[u8]) -> u8 {
    crc8_parameterised(data, 0x31, 0x00, 0x00, true)
}

/// CRC-16 Modbus polynomial (0x8005, reflected).
/// Used by Modbus RTU protocol.
pub fn crc16_modbus_checksum(data: &[u8]) -> u16 {
    crc16_parameterised(data, 0x8005, 0xFFFF, 0x0000, true, true)
}

/// CRC-16 CCITT polynomial (0x1021, non-reflected).
/// Common in telecommunications and some industrial protocols.
pub fn crc16_ccitt_checksum(data: &[u8]) -> u16 {
    crc16_parameterised(data, 0x1021, 0xFFFF, 0x0000, false, false)
}

/// CRC-32 IEEE (reflected, polynomial 0x04C11DB7).
/// The ubiquitous Ethernet/zlib CRC.
/// Init: 0xFFFFFFFF, XOR out: 0xFFFFFFFF, Reflected (LSB-first)
pub fn crc32_checksum(data: &[u8]) -> u32 {
    // Reflected polynomial of 0x04C11DB7
    const REFLECTED_POLY: u32 = 0xEDB8_8320;

    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ REFLECTED_POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc ^ 0xFFFF_FFFF
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // XOR Checksum Tests
    // ========================================================================

    #[test]
    fn test_xor_checksum_basic() {
        // 0x01 ^ 0x02 ^ 0x03 ^ 0x04 ^ 0x05 = 0x01
        assert_eq!(xor_checksum(&[0x01, 0x02, 0x03, 0x04, 0x05]), 0x01);
    }

    #[test]
    fn test_xor_checksum_pairs() {
        assert_eq!(xor_checksum(&[0x01, 0x02, 0x03]), 0x00);
        assert_eq!(xor_checksum(&[0xFF, 0xFF]), 0x00);
        assert_eq!(xor_checksum(&[0xAA, 0x55]), 0xFF);
    }

    #[test]
    fn test_xor_checksum_empty() {
        assert_eq!(xor_checksum(&[]), 0);
    }

    // ========================================================================
    // Sum8 Checksum Tests
    // ========================================================================

    #[test]
    fn test_sum8_checksum_basic() {
        // 0x01 + 0x02 + 0x03 + 0x04 + 0x05 = 0x0F
        assert_eq!(sum8_checksum(&[0x01, 0x02, 0x03, 0x04, 0x05]), 0x0F);
    }

    #[test]
    fn test_sum8_checksum_wrapping() {
        // 0xFF + 0x02 = 0x101, wraps to 0x01
        assert_eq!(sum8_checksum(&[0xFF, 0x02]), 0x01);
        // 0x80 + 0x80 = 0x100, wraps to 0x00
        assert_eq!(sum8_checksum(&[0x80, 0x80]), 0x00);
    }

    // ========================================================================
    // CRC Test Vectors
    // ========================================================================

    #[test]
    fn test_crc8_checksum_test_vector() {
        // Known test vector: "123456789" -> 0xF4
        let data = b"123456789";
        assert_eq!(crc8_checksum(data), 0xF4);
    }

    #[test]
    fn test_crc8_maxim_test_vector() {
        // Known test vector from CRC catalogue: "123456789" -> 0xA1
        let data = b"123456789";
        assert_eq!(crc8_maxim_checksum(data), 0xA1);
    }

    #[test]
    fn test_crc16_modbus_checksum_test_vector() {
        // Known Modbus test vector: device address 0x01, function 0x03, data
        // [0x01, 0x03, 0x00, 0x00, 0x00, 0x0A] -> 0xCDC5
        let data = [0x01, 0x03, 0x00, 0x00, 0x00, 0x0A];
        assert_eq!(crc16_modbus_checksum(&data), 0xCDC5);
    }

    #[test]
    fn test_crc16_ccitt_checksum_test_vector() {
        // Known CCITT test vector: "123456789" -> 0x29B1
        let data = b"123456789";
        assert_eq!(crc16_ccitt_checksum(data), 0x29B1);
    }

    #[test]
    fn test_crc16_empty_is_init() {
        // Initial value for both CRC-16 variants is 0xFFFF
        assert_eq!(crc16_modbus_checksum(&[]), 0xFFFF);
        assert_eq!(crc16_ccitt_checksum(&[]), 0xFFFF);
    }

    #[test]
    fn test_crc32_checksum_test_vector() {
        // Known IEEE test vector: "123456789" -> 0xCBF43926
        let data = b"123456789";
        assert_eq!(crc32_checksum(data), 0xCBF4_3926);
    }

    #[test]
    fn test_crc32_empty() {
        assert_eq!(crc32_checksum(&[]), 0);
    }

    // ========================================================================
    // Sign / Verify Tests
    // ========================================================================

    #[test]
    fn test_sign_none_is_identity() {
        let payload = vec![0x01, 0x02, 0x03];
        assert_eq!(ChecksumConfig::None.sign(&payload), payload);
        assert!(ChecksumConfig::None.verify(&payload));
        // None verifies even the empty message
        assert!(ChecksumConfig::None.verify(&[]));
    }

    #[test]
    fn test_sign_appends_trailer_width() {
        let payload = [0x10u8, 0x20, 0x30];
        for config in [
            ChecksumConfig::Xor,
            ChecksumConfig::Sum8,
            ChecksumConfig::Crc8,
            ChecksumConfig::Crc8Maxim,
            ChecksumConfig::Crc16Modbus,
            ChecksumConfig::Crc16Ccitt,
            ChecksumConfig::Crc32,
        ] {
            let signed = config.sign(&payload);
            assert_eq!(signed.len(), payload.len() + config.output_bytes());
            assert_eq!(&signed[..payload.len()], &payload);
        }
    }

    #[test]
    fn test_verify_sign_roundtrip_all_algorithms() {
        let payloads: [&[u8]; 4] = [&[], &[0x00], &[0xDE, 0xAD, 0xBE, 0xEF], b"123456789"];
        for config in [
            ChecksumConfig::Xor,
            ChecksumConfig::Sum8,
            ChecksumConfig::Crc8,
            ChecksumConfig::Crc8Maxim,
            ChecksumConfig::Crc16Modbus,
            ChecksumConfig::Crc16Ccitt,
            ChecksumConfig::Crc32,
        ] {
            for payload in payloads {
                assert!(
                    config.verify(&config.sign(payload)),
                    "roundtrip failed for {:?} / {:02x?}",
                    config,
                    payload
                );
            }
        }
    }

    #[test]
    fn test_verify_detects_tampered_payload() {
        let mut signed = ChecksumConfig::Crc16Ccitt.sign(b"hello");
        signed[0] ^= 0x01;
        assert!(!ChecksumConfig::Crc16Ccitt.verify(&signed));
    }

    #[test]
    fn test_verify_detects_tampered_trailer() {
        let mut signed = ChecksumConfig::Crc8.sign(b"hello");
        let last = signed.len() - 1;
        signed[last] ^= 0x01;
        assert!(!ChecksumConfig::Crc8.verify(&signed));
    }

    #[test]
    fn test_verify_leading_zero_trailer_byte() {
        // [0x0A] XOR checksum is 0x0A - a value whose hex rendering drops
        // the leading zero nibble. Byte-exact comparison must still pass.
        let signed = ChecksumConfig::Xor.sign(&[0x0A]);
        assert_eq!(signed, vec![0x0A, 0x0A]);
        assert!(ChecksumConfig::Xor.verify(&signed));
        // And a trailer that merely shares the low nibble must fail.
        assert!(!ChecksumConfig::Xor.verify(&[0x0A, 0xAA]));
    }

    #[test]
    fn test_verify_message_shorter_than_trailer() {
        assert!(!ChecksumConfig::Crc32.verify(&[0x01, 0x02]));
        assert!(!ChecksumConfig::Crc8.verify(&[]));
    }

    #[test]
    fn test_crc16_trailer_is_big_endian() {
        let signed = ChecksumConfig::Crc16Ccitt.sign(b"123456789");
        let n = signed.len();
        // "123456789" -> 0x29B1
        assert_eq!(signed[n - 2], 0x29);
        assert_eq!(signed[n - 1], 0xB1);
    }

    // ========================================================================
    // Config Surface Tests
    // ========================================================================

    #[test]
    fn test_config_from_str() {
        assert_eq!(ChecksumConfig::from_str("none").unwrap(), ChecksumConfig::None);
        assert_eq!(ChecksumConfig::from_str("xor").unwrap(), ChecksumConfig::Xor);
        assert_eq!(ChecksumConfig::from_str("sum8").unwrap(), ChecksumConfig::Sum8);
        assert_eq!(ChecksumConfig::from_str("crc8").unwrap(), ChecksumConfig::Crc8);
        assert_eq!(
            ChecksumConfig::from_str("crc8_maxim").unwrap(),
            ChecksumConfig::Crc8Maxim
        );
        assert_eq!(
            ChecksumConfig::from_str("crc16_modbus").unwrap(),
            ChecksumConfig::Crc16Modbus
        );
        assert_eq!(
            ChecksumConfig::from_str("crc16_ccitt").unwrap(),
            ChecksumConfig::Crc16Ccitt
        );
        assert_eq!(ChecksumConfig::from_str("crc32").unwrap(), ChecksumConfig::Crc32);
    }

    #[test]
    fn test_config_from_str_unknown() {
        assert!(ChecksumConfig::from_str("unknown").is_err());
        assert!(ChecksumConfig::from_str("").is_err());
    }

    #[test]
    fn test_config_output_bytes() {
        assert_eq!(ChecksumConfig::None.output_bytes(), 0);
        assert_eq!(ChecksumConfig::Xor.output_bytes(), 1);
        assert_eq!(ChecksumConfig::Sum8.output_bytes(), 1);
        assert_eq!(ChecksumConfig::Crc8.output_bytes(), 1);
        assert_eq!(ChecksumConfig::Crc8Maxim.output_bytes(), 1);
        assert_eq!(ChecksumConfig::Crc16Modbus.output_bytes(), 2);
        assert_eq!(ChecksumConfig::Crc16Ccitt.output_bytes(), 2);
        assert_eq!(ChecksumConfig::Crc32.output_bytes(), 4);
    }
}
