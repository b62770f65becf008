//! Core types for FPS DAQ data.
//!
//! This module defines the event header, decoded hit records, pedestal
//! calibration records and trigger tokens, together with the fixed byte
//! layouts they are read from.

use byteorder::{ByteOrder, LittleEndian};

/// Number of 32-bit words in the fixed event header.
pub const HEADER_WORDS: usize = 10;

/// Size of the fixed event header in bytes.
pub const HEADER_BYTES: usize = HEADER_WORDS * 4;

/// Number of auxiliary STP status words carried in the header.
pub const STP_WORDS: usize = 3;

/// Channels read out by one QT board.
pub const QT_CHANNELS: usize = 32;

/// Expected `version` tag of every pedestal record.
pub const PED_FORMAT_VERSION: u16 = 1;

/// Size of one on-disk pedestal record: version, QT index, then a
/// (pedestal, rms) pair of `f32` per channel.
pub const PED_RECORD_BYTES: usize = 4 + QT_CHANNELS * 8;

/// Trigger-word tag identifying this subsystem's contribution.
pub const FPS_TRG_KIND: u8 = 4;

/// DAQ command tag written into every trigger token.
pub const FPS_DAQ_KIND: u8 = 2;

/// The fixed-layout header at the start of every raw FPS event.
///
/// Layout (little-endian `u32` words):
/// `version, event_number, token, tick, status, stp_data[3],
/// pre_post_count, qt_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventHeader {
    /// Format version; the low byte is the header size in words
    pub version: u32,
    /// Event counter
    pub event_number: u32,
    /// Trigger token
    pub token: u32,
    /// RHIC clock tick
    pub tick: u32,
    /// 0 marks a bad event
    pub status: u32,
    /// STP receiver status words
    pub stp_data: [u32; STP_WORDS],
    /// Number of time buckets (pre + post + triggered crossing)
    pub pre_post_count: u32,
    /// Number of QT channel groups per time bucket
    pub qt_count: u32,
}

impl EventHeader {
    /// Number of words between the buffer start and the first time bucket.
    #[inline]
    pub fn header_words(&self) -> u32 {
        self.version & 0xFF
    }

    /// Serializes the header into its 40-byte wire layout.
    pub fn to_bytes(&self) -> [u8; HEADER_BYTES] {
        let mut words = [0u32; HEADER_WORDS];
        words[0] = self.version;
        words[1] = self.event_number;
        words[2] = self.token;
        words[3] = self.tick;
        words[4] = self.status;
        words[5..8].copy_from_slice(&self.stp_data);
        words[8] = self.pre_post_count;
        words[9] = self.qt_count;

        let mut out = [0u8; HEADER_BYTES];
        LittleEndian::write_u32_into(&words, &mut out);
        out
    }
}

/// One decoded QT channel hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRecord {
    /// Channel within the QT board (0-31)
    pub channel_index: u8,
    /// 12-bit ADC magnitude
    pub adc_value: u16,
    /// 11-bit TDC value
    pub tdc_value: u16,
    /// Time bucket this hit was read in
    pub time_bucket_index: u32,
    /// QT board id as written in the stream
    pub group_index: u32,
    /// Signed crossing offset of the time bucket
    pub relative_crossing: i32,
}

/// Location of one non-empty (time bucket, QT) block inside [`AdcData::hits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitGroup {
    pub time_bucket_index: u32,
    pub group_index: u32,
    pub relative_crossing: i32,
    /// Index of the first hit of this group
    pub start: usize,
    /// Number of hits (the stream's channel count)
    pub len: usize,
}

/// Decoded "adc" bank: all hits of one event plus header metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdcData {
    /// Copy of the event header the hits were decoded under
    pub header: EventHeader,
    /// Word skip applied before the first time bucket (`version & 0xFF`)
    pub header_words: u32,
    /// Hits in stream order: time bucket, then QT, then channel
    pub hits: Vec<HitRecord>,
    /// One entry per non-empty (time bucket, QT) block
    pub groups: Vec<HitGroup>,
}

impl AdcData {
    /// Truncates all containers, keeping their allocations.
    pub fn clear(&mut self) {
        self.header = EventHeader::default();
        self.header_words = 0;
        self.hits.clear();
        self.groups.clear();
    }

    /// Returns the hits belonging to `group`.
    pub fn group_hits(&self, group: &HitGroup) -> &[HitRecord] {
        &self.hits[group.start..group.start + group.len]
    }

    /// Iterates over `(group, hits)` pairs in stream order.
    pub fn iter_groups(&self) -> impl Iterator<Item = (&HitGroup, &[HitRecord])> {
        self.groups.iter().map(move |g| (g, self.group_hits(g)))
    }
}

/// Pedestal and noise of one QT channel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelPedestal {
    pub ped: f32,
    pub rms: f32,
}

/// One pedestal/RMS calibration record, covering a full QT board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PedestalRecord {
    /// Format tag, expected to equal [`PED_FORMAT_VERSION`]
    pub version: u16,
    /// QT board index
    pub group_index: u16,
    pub channels: [ChannelPedestal; QT_CHANNELS],
}

impl PedestalRecord {
    /// Reads a record from one [`PED_RECORD_BYTES`]-byte slot of a table.
    pub fn from_bytes(bytes: &[u8; PED_RECORD_BYTES]) -> Self {
        let mut channels = [ChannelPedestal::default(); QT_CHANNELS];
        for (ch, pair) in channels.iter_mut().zip(bytes[4..].chunks_exact(8)) {
            ch.ped = LittleEndian::read_f32(&pair[0..4]);
            ch.rms = LittleEndian::read_f32(&pair[4..8]);
        }

        Self {
            version: LittleEndian::read_u16(&bytes[0..2]),
            group_index: LittleEndian::read_u16(&bytes[2..4]),
            channels,
        }
    }

    /// Serializes the record into its on-disk layout.
    pub fn to_bytes(&self) -> [u8; PED_RECORD_BYTES] {
        let mut out = [0u8; PED_RECORD_BYTES];
        LittleEndian::write_u16(&mut out[0..2], self.version);
        LittleEndian::write_u16(&mut out[2..4], self.group_index);
        for (ch, pair) in self.channels.iter().zip(out[4..].chunks_exact_mut(8)) {
            LittleEndian::write_f32(&mut pair[0..4], ch.ped);
            LittleEndian::write_f32(&mut pair[4..8], ch.rms);
        }
        out
    }
}

/// A pedestal record whose version tag did not match [`PED_FORMAT_VERSION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionMismatch {
    /// Position of the record in the table
    pub index: usize,
    pub found: u16,
    pub expected: u16,
}

/// Decoded "pedrms" bank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PedestalTable {
    pub records: Vec<PedestalRecord>,
    /// Records decoded with an unexpected version tag
    pub warnings: Vec<VersionMismatch>,
}

impl PedestalTable {
    pub fn clear(&mut self) {
        self.records.clear();
        self.warnings.clear();
    }
}

/// Trigger-system word contributed by the FPS for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerToken {
    pub trigger_kind: u8,
    pub daq_kind: u8,
    /// RHIC clock, copied from the header tick
    pub rhic_clock: u32,
    /// Always zero for this subsystem
    pub rhic_delta: u32,
    pub token_value: u32,
}

impl TriggerToken {
    /// Builds the FPS trigger token for `header`.
    #[inline]
    pub fn from_header(header: &EventHeader) -> Self {
        Self {
            trigger_kind: FPS_TRG_KIND,
            daq_kind: FPS_DAQ_KIND,
            rhic_clock: header.tick,
            rhic_delta: 0,
            token_value: header.token,
        }
    }
}

/// Result of a successful trigger extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerWords {
    /// Number of tokens produced
    pub count: usize,
    pub tokens: Vec<TriggerToken>,
}
