//! Python bindings for the FPS DAQ decoder with numpy support.
//!
//! This module provides Python bindings using PyO3 that expose decoded QT
//! hits and pedestal tables as columnar numpy arrays.

use fps_core::{AdcData, Bank, BankData, DecodeError, FpsDecoder, PedestalTable};
use numpy::{IntoPyArray, PyArray1};
use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

fn to_py_err(err: DecodeError) -> PyErr {
    match err {
        DecodeError::Io(e) => PyIOError::new_err(format!("Failed to read bank: {}", e)),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Container for the decoded QT hits of one event.
///
/// The data is stored in columnar format (one array per field), which maps
/// directly onto numpy arrays and pandas columns.
#[pyclass]
pub struct Hits {
    channel: Vec<u8>,
    adc: Vec<u16>,
    tdc: Vec<u16>,
    time_bucket: Vec<u32>,
    qt: Vec<u32>,
    rel_xing: Vec<i32>,
    event_number: u32,
    token: u32,
    tick: u32,
    header_words: u32,
}

#[pymethods]
impl Hits {
    /// Returns the number of hits.
    fn __len__(&self) -> usize {
        self.channel.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "Hits(count={}, event={}, token={})",
            self.channel.len(),
            self.event_number,
            self.token
        )
    }

    /// Channel within the QT board (0-31).
    #[getter]
    fn channel<'py>(&self, py: Python<'py>) -> &'py PyArray1<u8> {
        self.channel.clone().into_pyarray(py)
    }

    /// 12-bit ADC values.
    #[getter]
    fn adc<'py>(&self, py: Python<'py>) -> &'py PyArray1<u16> {
        self.adc.clone().into_pyarray(py)
    }

    /// 11-bit TDC values.
    #[getter]
    fn tdc<'py>(&self, py: Python<'py>) -> &'py PyArray1<u16> {
        self.tdc.clone().into_pyarray(py)
    }

    #[getter]
    fn time_bucket<'py>(&self, py: Python<'py>) -> &'py PyArray1<u32> {
        self.time_bucket.clone().into_pyarray(py)
    }

    /// QT board id of each hit.
    #[getter]
    fn qt<'py>(&self, py: Python<'py>) -> &'py PyArray1<u32> {
        self.qt.clone().into_pyarray(py)
    }

    /// Signed crossing offset of each hit's time bucket.
    #[getter]
    fn rel_xing<'py>(&self, py: Python<'py>) -> &'py PyArray1<i32> {
        self.rel_xing.clone().into_pyarray(py)
    }

    #[getter]
    fn event_number(&self) -> u32 {
        self.event_number
    }

    #[getter]
    fn token(&self) -> u32 {
        self.token
    }

    #[getter]
    fn tick(&self) -> u32 {
        self.tick
    }

    /// Words skipped before the first time bucket.
    #[getter]
    fn header_words(&self) -> u32 {
        self.header_words
    }

    /// Returns all arrays as a dictionary.
    ///
    /// This is useful for creating a pandas DataFrame.
    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<PyObject> {
        let dict = PyDict::new(py);
        dict.set_item("tb", self.time_bucket.clone().into_pyarray(py))?;
        dict.set_item("qt", self.qt.clone().into_pyarray(py))?;
        dict.set_item("rel_xing", self.rel_xing.clone().into_pyarray(py))?;
        dict.set_item("ch", self.channel.clone().into_pyarray(py))?;
        dict.set_item("adc", self.adc.clone().into_pyarray(py))?;
        dict.set_item("tdc", self.tdc.clone().into_pyarray(py))?;
        Ok(dict.into())
    }
}

impl Hits {
    fn from_adc(data: &AdcData) -> Self {
        let len = data.hits.len();
        let mut hits = Self {
            channel: Vec::with_capacity(len),
            adc: Vec::with_capacity(len),
            tdc: Vec::with_capacity(len),
            time_bucket: Vec::with_capacity(len),
            qt: Vec::with_capacity(len),
            rel_xing: Vec::with_capacity(len),
            event_number: data.header.event_number,
            token: data.header.token,
            tick: data.header.tick,
            header_words: data.header_words,
        };

        for hit in &data.hits {
            hits.channel.push(hit.channel_index);
            hits.adc.push(hit.adc_value);
            hits.tdc.push(hit.tdc_value);
            hits.time_bucket.push(hit.time_bucket_index);
            hits.qt.push(hit.group_index);
            hits.rel_xing.push(hit.relative_crossing);
        }

        hits
    }
}

/// Container for a decoded pedestal/RMS table.
///
/// `ped` and `rms` are flattened per record: reshape to `(len(qt), 32)`.
#[pyclass]
pub struct Pedestals {
    qt: Vec<u16>,
    version: Vec<u16>,
    ped: Vec<f32>,
    rms: Vec<f32>,
    /// Indices of records with an unexpected version tag
    #[pyo3(get)]
    bad_versions: Vec<usize>,
}

#[pymethods]
impl Pedestals {
    /// Returns the number of QT records.
    fn __len__(&self) -> usize {
        self.qt.len()
    }

    #[getter]
    fn qt<'py>(&self, py: Python<'py>) -> &'py PyArray1<u16> {
        self.qt.clone().into_pyarray(py)
    }

    #[getter]
    fn version<'py>(&self, py: Python<'py>) -> &'py PyArray1<u16> {
        self.version.clone().into_pyarray(py)
    }

    #[getter]
    fn ped<'py>(&self, py: Python<'py>) -> &'py PyArray1<f32> {
        self.ped.clone().into_pyarray(py)
    }

    #[getter]
    fn rms<'py>(&self, py: Python<'py>) -> &'py PyArray1<f32> {
        self.rms.clone().into_pyarray(py)
    }
}

impl Pedestals {
    fn from_table(table: &PedestalTable) -> Self {
        let mut pedestals = Self {
            qt: Vec::with_capacity(table.records.len()),
            version: Vec::with_capacity(table.records.len()),
            ped: Vec::new(),
            rms: Vec::new(),
            bad_versions: table.warnings.iter().map(|w| w.index).collect(),
        };

        for record in &table.records {
            pedestals.qt.push(record.group_index);
            pedestals.version.push(record.version);
            pedestals.ped.extend(record.channels.iter().map(|c| c.ped));
            pedestals.rms.extend(record.channels.iter().map(|c| c.rms));
        }

        pedestals
    }
}

/// Decodes the QT hits of a raw event held in memory.
///
/// Args:
///     data: Raw event bytes
///
/// Returns:
///     Hits, or None if `data` is empty
///
/// Example:
///     >>> import fps
///     >>> hits = fps.decode_adc_bytes(raw)
///     >>> print(f"Decoded {len(hits)} hits")
///     >>> adc = hits.adc  # numpy array of ADC values
#[pyfunction]
fn decode_adc_bytes(py: Python<'_>, data: &[u8]) -> PyResult<Option<Py<Hits>>> {
    let mut decoder = FpsDecoder::new();
    match decoder.decode(Bank::Adc, data).map_err(to_py_err)? {
        Some(BankData::Adc(adc)) => Ok(Some(Py::new(py, Hits::from_adc(adc))?)),
        _ => Ok(None),
    }
}

/// Decodes the QT hits of a raw event file.
///
/// Args:
///     path: Path to the raw bank file
#[pyfunction]
fn decode_adc_file(py: Python<'_>, path: &str) -> PyResult<Option<Py<Hits>>> {
    let mut decoder = FpsDecoder::new();
    match decoder.decode_file(Bank::Adc, path).map_err(to_py_err)? {
        Some(BankData::Adc(adc)) => Ok(Some(Py::new(py, Hits::from_adc(adc))?)),
        _ => Ok(None),
    }
}

/// Decodes a pedestal/RMS table held in memory.
///
/// Raises:
///     ValueError: if the table size is not a whole number of records
#[pyfunction]
fn decode_pedrms_bytes(py: Python<'_>, data: &[u8]) -> PyResult<Option<Py<Pedestals>>> {
    let mut decoder = FpsDecoder::new();
    match decoder.decode(Bank::PedRms, data).map_err(to_py_err)? {
        Some(BankData::PedRms(table)) => Ok(Some(Py::new(py, Pedestals::from_table(table))?)),
        _ => Ok(None),
    }
}

/// Extracts the FPS trigger token from a raw event header.
///
/// Returns:
///     dict with keys trg, daq, rhic, rhic_delta, token
///
/// Raises:
///     ValueError: if the event is flagged bad or the header is truncated
#[pyfunction]
#[pyo3(signature = (data, channel_id=0))]
fn extract_trigger(py: Python<'_>, data: &[u8], channel_id: u32) -> PyResult<PyObject> {
    let words = fps_core::extract_trigger(data, 1, channel_id).map_err(to_py_err)?;
    let dict = PyDict::new(py);
    if let Some(token) = words.tokens.first() {
        dict.set_item("trg", token.trigger_kind)?;
        dict.set_item("daq", token.daq_kind)?;
        dict.set_item("rhic", token.rhic_clock)?;
        dict.set_item("rhic_delta", token.rhic_delta)?;
        dict.set_item("token", token.token_value)?;
    }
    Ok(dict.into())
}

/// FPS DAQ decoder module for Python.
#[pymodule]
fn fps(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(decode_adc_bytes, m)?)?;
    m.add_function(wrap_pyfunction!(decode_adc_file, m)?)?;
    m.add_function(wrap_pyfunction!(decode_pedrms_bytes, m)?)?;
    m.add_function(wrap_pyfunction!(extract_trigger, m)?)?;
    m.add_class::<Hits>()?;
    m.add_class::<Pedestals>()?;
    Ok(())
}
