//! FPS bank decoder.
//!
//! This module walks the raw QT event format (time bucket, then QT board,
//! then channel hits) and hosts [`FpsDecoder`], the entry point that fetches
//! banks through a [`DataSource`] and hands out the decoded result.

use crate::frame::RawFrame;
use crate::parser::{self, parse_header};
use crate::pedestal::{self, check_table_size};
use crate::source::{DataSource, ReadShortfall};
use crate::trigger;
use crate::types::{
    AdcData, HitGroup, HitRecord, PedestalTable, TriggerToken, TriggerWords, HEADER_WORDS,
    STP_WORDS,
};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during FPS decoding.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer too short: need {needed} bytes, got {available}")]
    TooShort { needed: usize, available: usize },

    #[error("Read of {width} bytes at offset {offset} exceeds declared length {len}")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },

    #[error("Corrupt frame at byte offset {offset} (header skip {header_words} words)")]
    CorruptFrame { offset: usize, header_words: u32 },

    #[error("Malformed pedestal table: {bytes} bytes is not a multiple of {record_size}")]
    MalformedTable { bytes: usize, record_size: usize },

    #[error(
        "Bad QT event {event_number}: stp 0x{:08X} 0x{:08X} 0x{:08X}",
        .stp_data[0],
        .stp_data[1],
        .stp_data[2]
    )]
    InvalidEvent {
        event_number: u32,
        stp_data: [u32; STP_WORDS],
        /// Token built before the status check; not to be trusted
        token: TriggerToken,
    },

    #[error("Unknown bank type \"{0}\"")]
    UnknownBank(String),
}

/// Banks served by the FPS decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bank {
    /// The event's raw bytes, unmodified
    Raw,
    /// QT hits decoded from the raw bank
    Adc,
    /// Pedestal/RMS calibration table
    PedRms,
}

impl Bank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Adc => "adc",
            Self::PedRms => "pedrms",
        }
    }
}

impl FromStr for Bank {
    type Err = DecodeError;

    /// Parses a bank name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Raw, Self::Adc, Self::PedRms]
            .into_iter()
            .find(|bank| bank.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DecodeError::UnknownBank(s.to_string()))
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded bank, borrowed from the decoder's output containers.
#[derive(Debug, Clone, Copy)]
pub enum BankData<'a> {
    Raw(&'a [u8]),
    Adc(&'a AdcData),
    PedRms(&'a PedestalTable),
}

/// Where the FPS banks live in the event's file system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FpsConfig {
    /// Top-level directory name of the detector
    pub sfs_name: String,
    pub sector: u8,
    pub rdo: u8,
}

impl Default for FpsConfig {
    fn default() -> Self {
        Self {
            sfs_name: "fps".to_string(),
            sector: 1,
            rdo: 1,
        }
    }
}

impl FpsConfig {
    /// Symbolic path of the raw event bank, e.g. `fps/sec01/rb01/raw`.
    pub fn raw_path(&self) -> String {
        format!("{}/sec{:02}/rb{:02}/raw", self.sfs_name, self.sector, self.rdo)
    }

    /// Symbolic path of the pedestal bank, e.g. `fps/sec01/pedrms`.
    pub fn pedrms_path(&self) -> String {
        format!("{}/sec{:02}/pedrms", self.sfs_name, self.sector)
    }
}

/// Decodes the QT hits of one raw event into `out`.
///
/// `out` is cleared first. On error it is left empty: once a count word
/// is lost the rest of the stream cannot be realigned.
pub fn decode_adc_into(bytes: &[u8], out: &mut AdcData) -> Result<(), DecodeError> {
    out.clear();
    let result = walk_hits(bytes, out);
    if result.is_err() {
        out.clear();
    }
    result
}

fn walk_hits(bytes: &[u8], out: &mut AdcData) -> Result<(), DecodeError> {
    let header = parse_header(bytes)?;
    let header_words = header.header_words();
    out.header = header;
    out.header_words = header_words;

    if (header_words as usize) < HEADER_WORDS {
        warn!(
            event = header.event_number,
            header_words,
            version = header.version,
            "Header skip shorter than the fixed header"
        );
    }

    let corrupt = |err: DecodeError| match err {
        DecodeError::OutOfBounds { offset, .. } => DecodeError::CorruptFrame {
            offset,
            header_words,
        },
        other => other,
    };

    let mut frame = RawFrame::from_slice(bytes);
    frame.seek(header_words as usize).map_err(corrupt)?;

    for tb in 0..header.pre_post_count {
        let relative_crossing = frame.read_u32().map_err(corrupt)? as i32;

        for _ in 0..header.qt_count {
            let group_index = frame.read_u32().map_err(corrupt)?;
            let channel_count = frame.read_u32().map_err(corrupt)? as usize;

            if channel_count == 0 {
                continue;
            }

            let start = out.hits.len();
            // The count is untrusted until the words are actually read
            out.hits.reserve(channel_count.min(frame.remaining() / 4));

            for _ in 0..channel_count {
                let datum = frame.read_u32().map_err(corrupt)?;
                out.hits.push(HitRecord {
                    channel_index: parser::hit_get_channel(datum),
                    adc_value: parser::hit_get_adc(datum),
                    tdc_value: parser::hit_get_tdc(datum),
                    time_bucket_index: tb,
                    group_index,
                    relative_crossing,
                });
            }

            out.groups.push(HitGroup {
                time_bucket_index: tb,
                group_index,
                relative_crossing,
                start,
                len: channel_count,
            });
        }
    }

    debug!(
        event = header.event_number,
        time_buckets = header.pre_post_count,
        qts = header.qt_count,
        hits = out.hits.len(),
        "Decoded adc bank"
    );

    Ok(())
}

/// FPS decoder with reusable output containers.
///
/// Each call truncates and rebuilds the container of the requested bank;
/// the returned [`BankData`] borrows it until the next call. One decoder
/// serves one stream at a time.
#[derive(Debug, Default)]
pub struct FpsDecoder {
    pub config: FpsConfig,
    raw: Vec<u8>,
    adc: AdcData,
    pedrms: PedestalTable,
    shortfalls: Vec<ReadShortfall>,
}

impl FpsDecoder {
    /// Creates a decoder with the default bank locations.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FpsConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Decodes `bytes` as the requested bank.
    ///
    /// Returns `Ok(None)` when `bytes` is empty: the bank is not present in
    /// this event.
    pub fn decode(&mut self, bank: Bank, bytes: &[u8]) -> Result<Option<BankData<'_>>, DecodeError> {
        if bytes.is_empty() {
            return Ok(None);
        }

        match bank {
            Bank::Raw => {
                self.raw.clear();
                self.raw.extend_from_slice(bytes);
                Ok(Some(BankData::Raw(&self.raw)))
            }
            Bank::Adc => {
                decode_adc_into(bytes, &mut self.adc)?;
                Ok(Some(BankData::Adc(&self.adc)))
            }
            Bank::PedRms => {
                pedestal::decode_pedestals_into(bytes, &mut self.pedrms)?;
                Ok(Some(BankData::PedRms(&self.pedrms)))
            }
        }
    }

    /// Decodes the QT hits of a raw event buffer.
    pub fn decode_adc(&mut self, bytes: &[u8]) -> Result<&AdcData, DecodeError> {
        decode_adc_into(bytes, &mut self.adc)?;
        Ok(&self.adc)
    }

    /// Decodes a pedestal/RMS table.
    pub fn decode_pedrms(&mut self, bytes: &[u8]) -> Result<&PedestalTable, DecodeError> {
        pedestal::decode_pedestals_into(bytes, &mut self.pedrms)?;
        Ok(&self.pedrms)
    }

    /// Reads a standalone bank file from disk and decodes it.
    pub fn decode_file<P: AsRef<Path>>(
        &mut self,
        bank: Bank,
        path: P,
    ) -> Result<Option<BankData<'_>>, DecodeError> {
        let bytes = fs::read(path.as_ref())?;
        debug!(path = %path.as_ref().display(), bytes = bytes.len(), bank = %bank, "Read bank file");
        self.decode(bank, &bytes)
    }

    /// Fetches the named bank from `source` and decodes it.
    ///
    /// Bank names are matched case-insensitively. Returns `Ok(None)` if the
    /// bank is absent from the event.
    pub fn get<S: DataSource + ?Sized>(
        &mut self,
        source: &S,
        bank: &str,
    ) -> Result<Option<BankData<'_>>, DecodeError> {
        match bank.parse::<Bank>()? {
            Bank::Raw => {
                if !self.fetch_raw(source)? {
                    return Ok(None);
                }
                Ok(Some(BankData::Raw(&self.raw)))
            }
            Bank::Adc => {
                if !self.fetch_raw(source)? {
                    return Ok(None);
                }
                decode_adc_into(&self.raw, &mut self.adc)?;
                Ok(Some(BankData::Adc(&self.adc)))
            }
            Bank::PedRms => {
                if !self.fetch_pedrms(source)? {
                    return Ok(None);
                }
                Ok(Some(BankData::PedRms(&self.pedrms)))
            }
        }
    }

    /// Short reads seen by the most recent [`get`](Self::get).
    pub fn read_shortfalls(&self) -> &[ReadShortfall] {
        &self.shortfalls
    }

    /// Extracts the FPS trigger token from an event header.
    pub fn extract_trigger(
        &self,
        header_bytes: &[u8],
        capacity: usize,
        channel_id: u32,
    ) -> Result<TriggerWords, DecodeError> {
        trigger::extract_trigger(header_bytes, capacity, channel_id)
    }

    fn fetch_raw<S: DataSource + ?Sized>(&mut self, source: &S) -> Result<bool, DecodeError> {
        self.shortfalls.clear();
        self.raw.clear();

        let path = self.config.raw_path();
        let Some(full_name) = source.resolve(&path) else {
            debug!(path = %path, "Raw bank not present");
            return Ok(false);
        };

        let bytes = source.size_of(&full_name)?;
        self.raw.resize(bytes, 0);
        read_bank(source, &path, &mut self.raw, &mut self.shortfalls)?;

        Ok(!self.raw.is_empty())
    }

    fn fetch_pedrms<S: DataSource + ?Sized>(&mut self, source: &S) -> Result<bool, DecodeError> {
        self.shortfalls.clear();
        self.pedrms.clear();

        let path = self.config.pedrms_path();
        let Some(full_name) = source.resolve(&path) else {
            debug!(path = %path, "Pedestal bank not present");
            return Ok(false);
        };
        debug!(full_name = %full_name, "Reading pedestal bank");

        let bytes = source.size_of(&full_name)?;
        check_table_size(bytes)?;

        let mut data = vec![0u8; bytes];
        read_bank(source, &path, &mut data, &mut self.shortfalls)?;
        pedestal::decode_pedestals_into(&data, &mut self.pedrms)?;

        Ok(true)
    }
}

/// Reads a whole bank, recording (not failing on) a short read.
fn read_bank<S: DataSource + ?Sized>(
    source: &S,
    path: &str,
    buf: &mut [u8],
    shortfalls: &mut Vec<ReadShortfall>,
) -> Result<(), DecodeError> {
    let got = source.read(path, buf)?;
    if got != buf.len() {
        warn!(path, expected = buf.len(), got, "Short read of bank");
        shortfalls.push(ReadShortfall {
            path: path.to_string(),
            expected: buf.len(),
            got,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::pack_hit;
    use crate::source::MemorySource;
    use crate::types::{EventHeader, HEADER_BYTES};

    fn event(tb_count: u32, blocks: &[(u32, Vec<u32>)]) -> Vec<u8> {
        let header = EventHeader {
            version: HEADER_WORDS as u32,
            event_number: 1,
            status: 1,
            pre_post_count: tb_count,
            qt_count: blocks.len() as u32,
            ..Default::default()
        };
        let mut bytes = header.to_bytes().to_vec();
        for tb in 0..tb_count {
            bytes.extend_from_slice(&(tb as i32 - 1).to_le_bytes());
            for (qt, data) in blocks {
                bytes.extend_from_slice(&qt.to_le_bytes());
                bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
                for datum in data {
                    bytes.extend_from_slice(&datum.to_le_bytes());
                }
            }
        }
        bytes
    }

    #[test]
    fn test_bank_names_ignore_case() {
        assert_eq!("RAW".parse::<Bank>().unwrap(), Bank::Raw);
        assert_eq!("Adc".parse::<Bank>().unwrap(), Bank::Adc);
        assert_eq!("pedRMS".parse::<Bank>().unwrap(), Bank::PedRms);
        assert!(matches!(
            "ped".parse::<Bank>(),
            Err(DecodeError::UnknownBank(name)) if name == "ped"
        ));
    }

    #[test]
    fn test_config_paths() {
        let config = FpsConfig {
            sfs_name: "fps".into(),
            sector: 2,
            rdo: 11,
        };
        assert_eq!(config.raw_path(), "fps/sec02/rb11/raw");
        assert_eq!(config.pedrms_path(), "fps/sec02/pedrms");
    }

    #[test]
    fn test_decode_simple_event() {
        let hits = vec![pack_hit(5, 300, 40), pack_hit(31, 4095, 2047)];
        let bytes = event(1, &[(7, hits)]);

        let mut out = AdcData::default();
        decode_adc_into(&bytes, &mut out).unwrap();

        assert_eq!(out.header_words, 10);
        assert_eq!(out.hits.len(), 2);
        assert_eq!(out.groups.len(), 1);
        assert_eq!(
            out.hits[1],
            HitRecord {
                channel_index: 31,
                adc_value: 4095,
                tdc_value: 2047,
                time_bucket_index: 0,
                group_index: 7,
                relative_crossing: -1,
            }
        );
    }

    #[test]
    fn test_empty_groups_are_skipped() {
        let bytes = event(2, &[(1, vec![]), (2, vec![pack_hit(0, 1, 1)])]);

        let mut out = AdcData::default();
        decode_adc_into(&bytes, &mut out).unwrap();

        assert_eq!(out.hits.len(), 2);
        assert!(out.groups.iter().all(|g| g.group_index == 2));
        assert_eq!(out.groups[1].relative_crossing, 0);
    }

    #[test]
    fn test_header_skip_past_end_is_corrupt() {
        let mut bytes = event(0, &[]);
        bytes[0] = 0xFF;

        let mut out = AdcData::default();
        let err = decode_adc_into(&bytes, &mut out).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::CorruptFrame {
                header_words: 255,
                ..
            }
        ));
        assert!(out.hits.is_empty());
    }

    #[test]
    fn test_short_header_skip_walks_header_words() {
        // A skip of 2 starts the walk at the token word: token is read as
        // the crossing, tick as the QT id, status as the channel count.
        let header = EventHeader {
            version: 2,
            event_number: 77,
            token: 5,
            tick: 9,
            status: 1,
            stp_data: [pack_hit(4, 321, 65), 0, 0],
            pre_post_count: 1,
            qt_count: 1,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_BYTES);

        let mut out = AdcData::default();
        decode_adc_into(&bytes, &mut out).unwrap();

        assert_eq!(out.header_words, 2);
        assert_eq!(out.header, header);
        assert_eq!(
            out.hits,
            vec![HitRecord {
                channel_index: 4,
                adc_value: 321,
                tdc_value: 65,
                time_bucket_index: 0,
                group_index: 9,
                relative_crossing: 5,
            }]
        );
        assert_eq!(
            out.groups,
            vec![HitGroup {
                time_bucket_index: 0,
                group_index: 9,
                relative_crossing: 5,
                start: 0,
                len: 1,
            }]
        );
    }

    #[test]
    fn test_truncated_event_discards_hits() {
        let hits = vec![pack_hit(1, 2, 3), pack_hit(4, 5, 6)];
        let bytes = event(1, &[(3, hits)]);
        let truncated = &bytes[..bytes.len() - 1];

        let mut out = AdcData::default();
        let err = decode_adc_into(truncated, &mut out).unwrap_err();
        assert!(matches!(err, DecodeError::CorruptFrame { offset: 56, .. }));
        assert!(out.hits.is_empty());
        assert!(out.groups.is_empty());
    }

    #[test]
    fn test_decode_empty_is_not_present() {
        let mut decoder = FpsDecoder::new();
        assert!(decoder.decode(Bank::Adc, &[]).unwrap().is_none());
        assert!(decoder.decode(Bank::PedRms, &[]).unwrap().is_none());
    }

    #[test]
    fn test_get_missing_bank() {
        let mut decoder = FpsDecoder::new();
        let source = MemorySource::new();
        assert!(decoder.get(&source, "adc").unwrap().is_none());
        assert!(decoder.get(&source, "pedrms").unwrap().is_none());
        assert!(matches!(
            decoder.get(&source, "tof"),
            Err(DecodeError::UnknownBank(_))
        ));
    }

    #[test]
    fn test_get_raw_then_adc() {
        let bytes = event(1, &[(9, vec![pack_hit(2, 10, 20)])]);
        let mut source = MemorySource::new();
        source.insert("fps/sec01/rb01/raw", bytes.clone());

        let mut decoder = FpsDecoder::new();
        match decoder.get(&source, "raw").unwrap() {
            Some(BankData::Raw(raw)) => assert_eq!(raw, &bytes[..]),
            other => panic!("unexpected {:?}", other),
        }
        match decoder.get(&source, "ADC").unwrap() {
            Some(BankData::Adc(adc)) => {
                assert_eq!(adc.hits.len(), 1);
                assert_eq!(adc.hits[0].group_index, 9);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(decoder.read_shortfalls().is_empty());
    }
}
