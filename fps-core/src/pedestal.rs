//! Pedestal/RMS calibration tables.
//!
//! A table is a flat array of [`PED_RECORD_BYTES`]-sized records. A table
//! whose size is not a whole number of records is rejected outright; a
//! record with an unexpected version tag is kept and reported.

use crate::decoder::DecodeError;
use crate::types::{
    PedestalRecord, PedestalTable, VersionMismatch, PED_FORMAT_VERSION, PED_RECORD_BYTES,
};
use tracing::{debug, warn};

/// Returns the number of records in a table of `bytes` bytes.
pub fn check_table_size(bytes: usize) -> Result<usize, DecodeError> {
    if bytes % PED_RECORD_BYTES != 0 {
        return Err(DecodeError::MalformedTable {
            bytes,
            record_size: PED_RECORD_BYTES,
        });
    }
    Ok(bytes / PED_RECORD_BYTES)
}

/// Decodes a pedestal table into `out`, which is cleared first.
pub fn decode_pedestals_into(bytes: &[u8], out: &mut PedestalTable) -> Result<(), DecodeError> {
    out.clear();
    let count = check_table_size(bytes.len())?;
    out.records.reserve(count);

    for (index, chunk) in bytes.chunks_exact(PED_RECORD_BYTES).enumerate() {
        let slot: &[u8; PED_RECORD_BYTES] =
            chunk.try_into().map_err(|_| DecodeError::MalformedTable {
                bytes: bytes.len(),
                record_size: PED_RECORD_BYTES,
            })?;
        let record = PedestalRecord::from_bytes(slot);

        if record.version != PED_FORMAT_VERSION {
            warn!(
                index,
                qt = record.group_index,
                found = record.version,
                expected = PED_FORMAT_VERSION,
                "Wrong pedestal record version"
            );
            out.warnings.push(VersionMismatch {
                index,
                found: record.version,
                expected: PED_FORMAT_VERSION,
            });
        }

        out.records.push(record);
    }

    debug!(records = count, warnings = out.warnings.len(), "Decoded pedrms bank");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelPedestal, QT_CHANNELS};

    fn record(version: u16, qt: u16) -> PedestalRecord {
        let mut channels = [ChannelPedestal::default(); QT_CHANNELS];
        for (ch, p) in channels.iter_mut().enumerate() {
            p.ped = 100.0 + ch as f32;
            p.rms = 1.5;
        }
        PedestalRecord {
            version,
            group_index: qt,
            channels,
        }
    }

    #[test]
    fn test_check_table_size() {
        assert_eq!(check_table_size(0).unwrap(), 0);
        assert_eq!(check_table_size(PED_RECORD_BYTES * 4).unwrap(), 4);
        assert!(matches!(
            check_table_size(PED_RECORD_BYTES + 1),
            Err(DecodeError::MalformedTable { bytes: 261, record_size: 260 })
        ));
    }

    #[test]
    fn test_decode_table() {
        let mut bytes = Vec::new();
        for qt in 0..3 {
            bytes.extend_from_slice(&record(PED_FORMAT_VERSION, qt).to_bytes());
        }

        let mut table = PedestalTable::default();
        decode_pedestals_into(&bytes, &mut table).unwrap();

        assert_eq!(table.records.len(), 3);
        assert!(table.warnings.is_empty());
        assert_eq!(table.records[2].group_index, 2);
        assert_eq!(table.records[2].channels[7].ped, 107.0);
    }

    #[test]
    fn test_decoded_records_match_encoded_slots() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&record(PED_FORMAT_VERSION, 4).to_bytes());
        bytes.extend_from_slice(&record(PED_FORMAT_VERSION, 5).to_bytes());

        let mut table = PedestalTable::default();
        decode_pedestals_into(&bytes, &mut table).unwrap();

        for (slot, decoded) in bytes.chunks_exact(PED_RECORD_BYTES).zip(&table.records) {
            let slot: &[u8; PED_RECORD_BYTES] = slot.try_into().unwrap();
            assert_eq!(&PedestalRecord::from_bytes(slot), decoded);
        }
        assert_eq!(table.records[1], record(PED_FORMAT_VERSION, 5));
    }

    #[test]
    fn test_bad_version_is_not_fatal() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&record(PED_FORMAT_VERSION, 0).to_bytes());
        bytes.extend_from_slice(&record(0x7, 1).to_bytes());
        bytes.extend_from_slice(&record(PED_FORMAT_VERSION, 2).to_bytes());

        let mut table = PedestalTable::default();
        decode_pedestals_into(&bytes, &mut table).unwrap();

        assert_eq!(table.records.len(), 3);
        assert_eq!(
            table.warnings,
            vec![VersionMismatch {
                index: 1,
                found: 7,
                expected: PED_FORMAT_VERSION
            }]
        );
    }

    #[test]
    fn test_malformed_table_clears_previous_output() {
        let mut table = PedestalTable::default();
        decode_pedestals_into(&record(PED_FORMAT_VERSION, 0).to_bytes(), &mut table).unwrap();
        assert_eq!(table.records.len(), 1);

        let err = decode_pedestals_into(&[0u8; 100], &mut table).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedTable { bytes: 100, .. }));
        assert!(table.records.is_empty());
    }
}
