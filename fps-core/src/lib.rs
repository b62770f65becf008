//! Decoder library for FPS detector DAQ banks.
//!
//! This crate turns the raw bytes written by the FPS QT front-end
//! electronics into typed records: per-channel ADC/TDC hits, pedestal/RMS
//! calibration tables and the trigger token the FPS contributes to the
//! global trigger decision.
//!
//! # Example
//!
//! ```no_run
//! use fps_core::{BankData, DirSource, FpsDecoder};
//!
//! let source = DirSource::new("/data/event_0001");
//! let mut decoder = FpsDecoder::new();
//!
//! if let Some(BankData::Adc(adc)) = decoder.get(&source, "adc").unwrap() {
//!     println!("Event {}: {} hits", adc.header.event_number, adc.hits.len());
//! }
//! ```
//!
//! # Features
//!
//! - Bounds-checked walk of the time bucket / QT / channel hit structure
//! - Pedestal table decoding with per-record version checks
//! - Trigger token extraction with event validity check
//! - Pluggable bank storage through [`DataSource`]
//! - CSV and binary output writers

pub mod decoder;
pub mod frame;
pub mod output;
pub mod parser;
pub mod pedestal;
pub mod source;
pub mod trigger;
pub mod types;

// Re-export commonly used types
pub use decoder::{decode_adc_into, Bank, BankData, DecodeError, FpsConfig, FpsDecoder};
pub use frame::RawFrame;
pub use output::{OutputError, OutputFormat};
pub use parser::parse_header;
pub use pedestal::decode_pedestals_into;
pub use source::{DataSource, DirSource, MemorySource, ReadShortfall};
pub use trigger::extract_trigger;
pub use types::{
    AdcData, EventHeader, HitGroup, HitRecord, PedestalRecord, PedestalTable, TriggerToken,
    TriggerWords, VersionMismatch, PED_FORMAT_VERSION,
};
