#![allow(clippy::unusual_byte_groupings)]
//! Low-level parsing of FPS header words and QT hit data words.
//!
//! The shifts and masks here are fixed by the front-end firmware and must
//! stay bit-for-bit compatible with stored data.

use crate::decoder::DecodeError;
use crate::types::{EventHeader, HEADER_BYTES, STP_WORDS};
use byteorder::{ByteOrder, LittleEndian};

// ============================================================================
// QT hit datum (32 bits)
// Bits: [31:27] channel | [26:16] tdc | [15:12] unused | [11:0] adc
// ============================================================================

/// Extracts the channel number from a hit datum.
#[inline]
pub fn hit_get_channel(datum: u32) -> u8 {
    (datum >> 27) as u8
}

/// Extracts the 12-bit ADC value from a hit datum.
#[inline]
pub fn hit_get_adc(datum: u32) -> u16 {
    (datum & 0x0FFF) as u16
}

/// Extracts the 11-bit TDC value from a hit datum.
#[inline]
pub fn hit_get_tdc(datum: u32) -> u16 {
    ((datum >> 16) & 0x07FF) as u16
}

/// Packs channel, ADC and TDC into a hit datum. Out-of-range bits are dropped.
#[inline]
pub fn pack_hit(channel: u8, adc: u16, tdc: u16) -> u32 {
    ((channel as u32 & 0x1F) << 27) | ((tdc as u32 & 0x07FF) << 16) | (adc as u32 & 0x0FFF)
}

/// Parses the fixed event header from the start of `bytes`.
pub fn parse_header(bytes: &[u8]) -> Result<EventHeader, DecodeError> {
    if bytes.len() < HEADER_BYTES {
        return Err(DecodeError::TooShort {
            needed: HEADER_BYTES,
            available: bytes.len(),
        });
    }

    let word = |i: usize| LittleEndian::read_u32(&bytes[i * 4..i * 4 + 4]);
    let mut stp_data = [0u32; STP_WORDS];
    for (i, stp) in stp_data.iter_mut().enumerate() {
        *stp = word(5 + i);
    }

    Ok(EventHeader {
        version: word(0),
        event_number: word(1),
        token: word(2),
        tick: word(3),
        status: word(4),
        stp_data,
        pre_post_count: word(8),
        qt_count: word(9),
    })
}

impl EventHeader {
    /// Parses the header from the start of `bytes`. See [`parse_header`].
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        parse_header(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_parsing() {
        // ch=21, tdc=0x5A5, adc=0xBCD
        let datum: u32 = 0b10101_10110100101_0000_101111001101;
        assert_eq!(hit_get_channel(datum), 21);
        assert_eq!(hit_get_tdc(datum), 0x5A5);
        assert_eq!(hit_get_adc(datum), 0xBCD);
    }

    #[test]
    fn test_hit_ignores_unused_bits() {
        let datum: u32 = 0x0000_F000;
        assert_eq!(hit_get_adc(datum), 0);
        assert_eq!(hit_get_tdc(datum), 0);
        assert_eq!(hit_get_channel(datum), 0);
    }

    #[test]
    fn test_pack_hit() {
        let datum = pack_hit(31, 0xFFF, 0x7FF);
        assert_eq!(datum, 0xFFFF_0FFF);
        assert_eq!(pack_hit(3, 100, 200), (3 << 27) | (200 << 16) | 100);
    }

    #[test]
    fn test_parse_header_too_short() {
        let err = parse_header(&[0u8; HEADER_BYTES - 1]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TooShort {
                needed: 40,
                available: 39
            }
        ));
    }

    #[test]
    fn test_parse_header_fields() {
        let header = EventHeader {
            version: 0x0100_000A,
            event_number: 12,
            token: 0xABC,
            tick: 99_000,
            status: 3,
            stp_data: [1, 2, 3],
            pre_post_count: 2,
            qt_count: 8,
        };
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&[0xFF; 16]);
        assert_eq!(parse_header(&bytes).unwrap(), header);
    }
}
