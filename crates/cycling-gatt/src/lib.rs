//! cycling-gatt: Cycling Power GATT catalog management and measurement encoding
//!
//! Bring-up verifies the radio module's catalog against a compiled-in reference listing
//! (Fletcher-16 per line), rebuilding it from scratch on any difference, then measurement
//! records are pushed to the module on a fixed cadence.

pub mod advertising;
pub mod cache;
pub mod catalog;
pub mod checksum;
pub mod comparator;
pub mod line_stream;
pub mod reference;
pub mod telemetry;

mod config;
pub use config::{load_config_file, SensorConfig};

mod error;
pub use error::{DecodeError, GattError, Result};

mod manager;
pub use manager::{BringUp, CatalogManager, CatalogState, ManagerConfig, Verification};

mod metrics;
pub use metrics::{MetricsHub, SensorMetrics};

mod sensor;
pub use sensor::CyclingPowerSensor;

pub use cache::{FileCache, IdCache, MemoryCache};
pub use catalog::{CharacteristicDescriptor, DataType, Properties, ServiceCatalog};
pub use checksum::fletcher16;
pub use comparator::{ComparatorState, ReferenceTable};
pub use line_stream::{LineBuf, LineStreamParser, LineVisitor, MAX_LINE_LEN};
pub use telemetry::{MeasurementRecord, TelemetryEncoder, TelemetrySample};
