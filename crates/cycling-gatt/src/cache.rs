//! Byte-addressed storage for catalog identifiers across restarts.

use anyhow::Context;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Value of a cell that was never written.
pub const ERASED: u8 = 0xFF;

pub const CP_SERVICE_ID_ADDRESS: u16 = 0x20;
pub const CP_FEATURE_ID_ADDRESS: u16 = 0x21;
pub const CP_MEASUREMENT_ID_ADDRESS: u16 = 0x22;
pub const CP_SENSOR_LOCATION_ID_ADDRESS: u16 = 0x23;
pub const CP_CONTROL_POINT_ID_ADDRESS: u16 = 0x24;

/// Cache address for a characteristic, by UUID.
pub fn address_for(uuid: u16) -> Option<u16> {
    use crate::catalog::*;
    match uuid {
        CYCLING_POWER_FEATURE_CHAR_UUID => Some(CP_FEATURE_ID_ADDRESS),
        CYCLING_POWER_MEASUREMENT_CHAR_UUID => Some(CP_MEASUREMENT_ID_ADDRESS),
        SENSOR_LOCATION_CHAR_UUID => Some(CP_SENSOR_LOCATION_ID_ADDRESS),
        CYCLING_POWER_CONTROL_POINT_CHAR_UUID => Some(CP_CONTROL_POINT_ID_ADDRESS),
        _ => None,
    }
}

pub trait IdCache {
    fn read(&self, address: u16) -> u8;
    fn write(&mut self, address: u16, value: u8) -> anyhow::Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    cells: BTreeMap<u16, u8>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdCache for MemoryCache {
    fn read(&self, address: u16) -> u8 {
        self.cells.get(&address).copied().unwrap_or(ERASED)
    }

    fn write(&mut self, address: u16, value: u8) -> anyhow::Result<()> {
        self.cells.insert(address, value);
        Ok(())
    }
}

/// JSON file of address -> byte, rewritten whenever a cell changes.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
    cells: BTreeMap<u16, u8>,
}

impl FileCache {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cells = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("reading id cache: {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing id cache: {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, cells })
    }

    fn flush(&self) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(&self.cells)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("writing id cache: {}", self.path.display()))
    }
}

impl IdCache for FileCache {
    fn read(&self, address: u16) -> u8 {
        self.cells.get(&address).copied().unwrap_or(ERASED)
    }

    fn write(&mut self, address: u16, value: u8) -> anyhow::Result<()> {
        // Only touch the file when the value changes
        if self.cells.get(&address) == Some(&value) {
            return Ok(());
        }
        self.cells.insert(address, value);
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_cache_defaults_to_erased() {
        let mut c = MemoryCache::new();
        assert_eq!(c.read(CP_SERVICE_ID_ADDRESS), ERASED);
        c.write(CP_SERVICE_ID_ADDRESS, 1).unwrap();
        assert_eq!(c.read(CP_SERVICE_ID_ADDRESS), 1);
    }

    #[test]
    fn test_file_cache_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        {
            let mut c = FileCache::open(&path).unwrap();
            c.write(CP_MEASUREMENT_ID_ADDRESS, 2).unwrap();
        }
        let c = FileCache::open(&path).unwrap();
        assert_eq!(c.read(CP_MEASUREMENT_ID_ADDRESS), 2);
        assert_eq!(c.read(CP_FEATURE_ID_ADDRESS), ERASED);
    }

    #[test]
    fn test_file_cache_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        fs::write(&path, "not json").unwrap();
        assert!(FileCache::open(&path).is_err());
    }
}
