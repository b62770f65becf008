//! Access to the bank files of one event.
//!
//! The decoder never opens files itself. It asks a [`DataSource`] to map
//! a symbolic bank path such as `fps/sec01/rb01/raw` to a full name, to
//! report its size and to read its bytes.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Host-side storage of event banks.
pub trait DataSource {
    /// Maps a symbolic path to the full name of a bank, or `None` if the
    /// bank is absent from the current event.
    fn resolve(&self, path: &str) -> Option<String>;

    /// Size in bytes of a resolved bank.
    fn size_of(&self, full_path: &str) -> io::Result<usize>;

    /// Reads the bank at the symbolic `path` into `buf`, returning the
    /// number of bytes read.
    fn read(&self, path: &str, buf: &mut [u8]) -> io::Result<usize>;
}

/// A read that returned fewer bytes than the bank's declared size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadShortfall {
    pub path: String,
    pub expected: usize,
    pub got: usize,
}

/// Banks stored as files below a root directory, one file per symbolic path.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn locate(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl DataSource for DirSource {
    fn resolve(&self, path: &str) -> Option<String> {
        let full = self.locate(path);
        full.is_file().then(|| full.to_string_lossy().into_owned())
    }

    fn size_of(&self, full_path: &str) -> io::Result<usize> {
        Ok(fs::metadata(full_path)?.len() as usize)
    }

    fn read(&self, path: &str, buf: &mut [u8]) -> io::Result<usize> {
        let mut file = fs::File::open(self.locate(path))?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Ok(filled)
    }
}

/// Banks held in memory, keyed by symbolic path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    banks: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the bank at `path`.
    pub fn insert<S: Into<String>>(&mut self, path: S, bytes: Vec<u8>) {
        self.banks.insert(path.into(), bytes);
    }
}

impl DataSource for MemorySource {
    fn resolve(&self, path: &str) -> Option<String> {
        self.banks.contains_key(path).then(|| path.to_string())
    }

    fn size_of(&self, full_path: &str) -> io::Result<usize> {
        self.banks
            .get(full_path)
            .map(Vec::len)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, full_path.to_string()))
    }

    fn read(&self, path: &str, buf: &mut [u8]) -> io::Result<usize> {
        let bank = self
            .banks
            .get(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))?;
        let n = bank.len().min(buf.len());
        buf[..n].copy_from_slice(&bank[..n]);
        Ok(n)
    }
}
