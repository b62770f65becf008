//! Output format writers for decoded FPS banks.
//!
//! Hits can be written as CSV or as a packed binary file; pedestal tables
//! are written as CSV.

use crate::types::{AdcData, HitRecord, PedestalTable};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output writing.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported output format: .{0}. Use .csv or .bin")]
    UnsupportedExtension(String),
}

/// Output file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Comma-separated values (human-readable)
    #[default]
    Csv,
    /// Packed little-endian records
    Binary,
}

impl OutputFormat {
    /// Picks the format from a file extension; a path without one is CSV.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, OutputError> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("csv");

        match ext.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "bin" => Ok(Self::Binary),
            _ => Err(OutputError::UnsupportedExtension(ext.to_string())),
        }
    }
}

/// Column header of the hit CSV format.
pub const HIT_CSV_COLUMNS: &str = "tb,qt,rel_xing,ch,adc,tdc";

/// CSV output writer for QT hits.
pub struct HitCsvWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> HitCsvWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Writes the event metadata comment line and the column header.
    pub fn write_header(&mut self, adc: &AdcData) -> Result<(), OutputError> {
        writeln!(
            self.writer,
            "# event={} token={} tick={} header_words={}",
            adc.header.event_number, adc.header.token, adc.header.tick, adc.header_words
        )?;
        writeln!(self.writer, "{}", HIT_CSV_COLUMNS)?;
        Ok(())
    }

    /// Writes a batch of hits.
    pub fn write_hits(&mut self, hits: &[HitRecord]) -> Result<(), OutputError> {
        for hit in hits {
            writeln!(
                self.writer,
                "{},{},{},{},{},{}",
                hit.time_bucket_index,
                hit.group_index,
                hit.relative_crossing,
                hit.channel_index,
                hit.adc_value,
                hit.tdc_value
            )?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// CSV writer for pedestal tables, one row per QT channel.
pub struct PedestalCsvWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> PedestalCsvWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    pub fn write_table(&mut self, table: &PedestalTable) -> Result<(), OutputError> {
        writeln!(self.writer, "qt,ch,ped,rms,version")?;
        for record in &table.records {
            for (ch, p) in record.channels.iter().enumerate() {
                writeln!(
                    self.writer,
                    "{},{},{},{},{}",
                    record.group_index, ch, p.ped, p.rms, record.version
                )?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Version of the binary hit format written by [`HitBinaryWriter`].
pub const HIT_BINARY_VERSION: u32 = 1;

/// Binary output format for QT hits.
///
/// The file starts with a 24-byte header:
/// - magic: `FPSHITS\0` (8 bytes)
/// - format version: u32
/// - event number: u32
/// - hit count: u64
///
/// followed by one 20-byte record per hit:
/// - time bucket: u32
/// - qt: u32
/// - relative crossing: i32
/// - channel: u8, padding: u8
/// - adc: u16
/// - tdc: u16, padding: u16
pub struct HitBinaryWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> HitBinaryWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    pub fn write_header(&mut self, event_number: u32, hit_count: u64) -> Result<(), OutputError> {
        self.writer.write_all(b"FPSHITS\0")?;
        self.writer.write_all(&HIT_BINARY_VERSION.to_le_bytes())?;
        self.writer.write_all(&event_number.to_le_bytes())?;
        self.writer.write_all(&hit_count.to_le_bytes())?;
        Ok(())
    }

    pub fn write_hits(&mut self, hits: &[HitRecord]) -> Result<(), OutputError> {
        for hit in hits {
            self.writer.write_all(&hit.time_bucket_index.to_le_bytes())?;
            self.writer.write_all(&hit.group_index.to_le_bytes())?;
            self.writer.write_all(&hit.relative_crossing.to_le_bytes())?;
            self.writer.write_all(&[hit.channel_index, 0])?;
            self.writer.write_all(&hit.adc_value.to_le_bytes())?;
            self.writer.write_all(&hit.tdc_value.to_le_bytes())?;
            self.writer.write_all(&[0, 0])?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes the hits of an event to a CSV file.
pub fn write_hits_csv<P: AsRef<Path>>(path: P, adc: &AdcData) -> Result<(), OutputError> {
    let file = File::create(path)?;
    let mut writer = HitCsvWriter::new(file);
    writer.write_header(adc)?;
    writer.write_hits(&adc.hits)?;
    writer.flush()?;
    Ok(())
}

/// Writes the hits of an event to a binary file.
pub fn write_hits_binary<P: AsRef<Path>>(path: P, adc: &AdcData) -> Result<(), OutputError> {
    let file = File::create(path)?;
    let mut writer = HitBinaryWriter::new(file);
    writer.write_header(adc.header.event_number, adc.hits.len() as u64)?;
    writer.write_hits(&adc.hits)?;
    writer.flush()?;
    Ok(())
}

/// Writes hits in the format implied by the path's extension.
pub fn write_hits<P: AsRef<Path>>(path: P, adc: &AdcData) -> Result<(), OutputError> {
    match OutputFormat::from_path(&path)? {
        OutputFormat::Csv => write_hits_csv(path, adc),
        OutputFormat::Binary => write_hits_binary(path, adc),
    }
}

/// Writes a pedestal table to a CSV file.
pub fn write_pedestals_csv<P: AsRef<Path>>(
    path: P,
    table: &PedestalTable,
) -> Result<(), OutputError> {
    let file = File::create(path)?;
    let mut writer = PedestalCsvWriter::new(file);
    writer.write_table(table)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelPedestal, EventHeader, PedestalRecord, QT_CHANNELS};

    fn sample_adc() -> AdcData {
        AdcData {
            header: EventHeader {
                event_number: 17,
                token: 200,
                tick: 9000,
                ..Default::default()
            },
            header_words: 10,
            hits: vec![
                HitRecord {
                    channel_index: 3,
                    adc_value: 1500,
                    tdc_value: 120,
                    time_bucket_index: 0,
                    group_index: 4,
                    relative_crossing: -1,
                },
                HitRecord {
                    channel_index: 30,
                    adc_value: 12,
                    tdc_value: 0,
                    time_bucket_index: 1,
                    group_index: 4,
                    relative_crossing: 0,
                },
            ],
            groups: Vec::new(),
        }
    }

    #[test]
    fn test_output_format_from_path() {
        assert_eq!(OutputFormat::from_path("hits.csv").unwrap(), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_path("hits.BIN").unwrap(), OutputFormat::Binary);
        assert_eq!(OutputFormat::from_path("hits").unwrap(), OutputFormat::Csv);
        assert!(matches!(
            OutputFormat::from_path("hits.json"),
            Err(OutputError::UnsupportedExtension(ext)) if ext == "json"
        ));
    }

    #[test]
    fn test_hit_csv_writer() {
        let adc = sample_adc();
        let mut output = Vec::new();
        {
            let mut writer = HitCsvWriter::new(&mut output);
            writer.write_header(&adc).unwrap();
            writer.write_hits(&adc.hits).unwrap();
            writer.flush().unwrap();
        }

        let output_str = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = output_str.lines().collect();
        assert_eq!(lines[0], "# event=17 token=200 tick=9000 header_words=10");
        assert_eq!(lines[1], HIT_CSV_COLUMNS);
        assert_eq!(lines[2], "0,4,-1,3,1500,120");
        assert_eq!(lines[3], "1,4,0,30,12,0");
    }

    #[test]
    fn test_pedestal_csv_writer() {
        let mut channels = [ChannelPedestal::default(); QT_CHANNELS];
        channels[1] = ChannelPedestal { ped: 98.5, rms: 1.25 };
        let table = PedestalTable {
            records: vec![PedestalRecord {
                version: 1,
                group_index: 6,
                channels,
            }],
            warnings: Vec::new(),
        };

        let mut output = Vec::new();
        {
            let mut writer = PedestalCsvWriter::new(&mut output);
            writer.write_table(&table).unwrap();
            writer.flush().unwrap();
        }

        let output_str = String::from_utf8(output).unwrap();
        assert_eq!(output_str.lines().count(), 1 + QT_CHANNELS);
        assert!(output_str.contains("6,1,98.5,1.25,1"));
    }

    #[test]
    fn test_binary_output() {
        let adc = sample_adc();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.bin");
        write_hits(&path, &adc).unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), 24 + 2 * 20);
        assert_eq!(&data[0..8], b"FPSHITS\0");
        assert_eq!(u32::from_le_bytes([data[8], data[9], data[10], data[11]]), 1);
        assert_eq!(u32::from_le_bytes([data[12], data[13], data[14], data[15]]), 17);
        assert_eq!(data[16], 2);

        // First record: relative crossing -1 and channel 3
        assert_eq!(i32::from_le_bytes([data[32], data[33], data[34], data[35]]), -1);
        assert_eq!(data[36], 3);
        assert_eq!(u16::from_le_bytes([data[38], data[39]]), 1500);
    }
}
