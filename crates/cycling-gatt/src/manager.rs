//! Bring-up of the module's GATT catalog: verify, then reuse or rebuild.

use crate::advertising::{advertising_command, device_name_command, ADVERTISING_DATA};
use crate::cache::{address_for, IdCache, CP_SERVICE_ID_ADDRESS, ERASED};
use crate::catalog::{
    ServiceCatalog, CPF_CRANK_REVOLUTION_DATA_SUPPORTED, CPF_WHEEL_REVOLUTION_DATA_SUPPORTED,
    CYCLING_POWER_CONTROL_POINT_CHAR_UUID, CYCLING_POWER_FEATURE_CHAR_UUID,
    CYCLING_POWER_MEASUREMENT_CHAR_UUID, SENSOR_LOCATION_CHAR_UUID, SENSOR_LOCATION_RIGHT_CRANK,
};
use crate::comparator::{ComparatorState, ReferenceTable};
use crate::config::SensorConfig;
use crate::error::{GattError, Result};
use crate::line_stream::LineStreamParser;
use crate::reference::expected_checksums;
use at_transport::AtLink;
use std::fmt::Write as _;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CatalogState {
    Unverified,
    Querying,
    Matched,
    Mismatched,
    Resetting,
    Provisioning,
    Ready,
}

impl CatalogState {
    pub fn as_str(self) -> &'static str {
        match self {
            CatalogState::Unverified => "unverified",
            CatalogState::Querying => "querying",
            CatalogState::Matched => "matched",
            CatalogState::Mismatched => "mismatched",
            CatalogState::Resetting => "resetting",
            CatalogState::Provisioning => "provisioning",
            CatalogState::Ready => "ready",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ManagerConfig {
    pub always_reprovision: bool,
    pub response_wait_ms: u64,
    pub max_line_len: usize,
    pub device_name: String,
    pub control_point: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig::from(&SensorConfig::default())
    }
}

impl From<&SensorConfig> for ManagerConfig {
    fn from(cfg: &SensorConfig) -> Self {
        Self {
            always_reprovision: cfg.always_reprovision,
            response_wait_ms: cfg.response_wait_ms,
            max_line_len: cfg.max_line_len,
            device_name: cfg.device_name.clone(),
            control_point: cfg.control_point,
        }
    }
}

/// Result of comparing the module's listing with the reference.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Verification {
    pub matched: bool,
    pub lines_compared: usize,
    pub total_lines: usize,
    /// The listing did not finish inside the wait window.
    pub timed_out: bool,
    /// No query was sent because policy demands a rebuild.
    pub forced: bool,
}

/// What a bring-up ended up doing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BringUp {
    pub verification: Verification,
    pub reprovisioned: bool,
}

/// Owns the catalog and drives the module through bring-up.
pub struct CatalogManager<L: AtLink> {
    link: L,
    config: ManagerConfig,
    catalog: ServiceCatalog,
    state: CatalogState,
    parser: LineStreamParser,
    reference: ReferenceTable<'static>,
    cache: Option<Box<dyn IdCache>>,
}

impl<L: AtLink> CatalogManager<L> {
    pub fn new(link: L, config: ManagerConfig) -> Self {
        let catalog = if config.control_point {
            ServiceCatalog::cycling_power_with_control_point()
        } else {
            ServiceCatalog::cycling_power()
        };
        let parser = LineStreamParser::new(config.max_line_len);
        Self {
            link,
            config,
            catalog,
            state: CatalogState::Unverified,
            parser,
            reference: expected_checksums(),
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Box<dyn IdCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Compare against a different reference, e.g. the text table when debugging.
    pub fn with_reference(mut self, reference: ReferenceTable<'static>) -> Self {
        self.reference = reference;
        self
    }

    pub fn state(&self) -> CatalogState {
        self.state
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    pub fn cache(&self) -> Option<&dyn IdCache> {
        self.cache.as_deref()
    }

    fn transition(&mut self, next: CatalogState) {
        debug!(from = self.state.as_str(), to = next.as_str(), "catalog state");
        self.state = next;
    }

    /// Measurement characteristic id, once the catalog is ready.
    pub fn measurement_id(&self) -> Result<u8> {
        if self.state != CatalogState::Ready {
            return Err(GattError::NotReady(self.state.as_str()));
        }
        self.catalog
            .assigned_id_of(CYCLING_POWER_MEASUREMENT_CHAR_UUID)
            .ok_or(GattError::NotReady(self.state.as_str()))
    }

    /// Query the module's listing and compare it line by line with the reference.
    ///
    /// Never fails: a timeout, a short listing, or a broken link all come back as a
    /// non-matching verdict.
    pub fn check_catalog(&mut self) -> Verification {
        self.transition(CatalogState::Querying);
        let mut comparator = ComparatorState::new(self.reference);
        let timed_out = match self
            .link
            .exchange("AT+GATTLIST", self.config.response_wait_ms)
        {
            Ok(resp) => {
                self.parser.parse(&resp.bytes, &mut comparator);
                resp.timed_out()
            }
            Err(e) => {
                warn!(error = %e, "catalog query failed");
                true
            }
        };
        let v = Verification {
            matched: comparator.matched() && !timed_out,
            lines_compared: comparator.line_number,
            total_lines: comparator.total_lines,
            timed_out,
            forced: false,
        };
        if v.matched {
            info!(lines = v.lines_compared, "catalog matches reference");
        } else {
            info!(
                lines = v.lines_compared,
                expected = v.total_lines,
                timed_out,
                "catalog differs from reference"
            );
        }
        v
    }

    /// Verification as bring-up runs it: honours `always_reprovision`.
    pub fn verify(&mut self) -> Verification {
        if self.config.always_reprovision {
            debug!("always_reprovision set; skipping catalog query");
            return Verification {
                matched: false,
                lines_compared: 0,
                total_lines: self.reference.len(),
                timed_out: false,
                forced: true,
            };
        }
        self.check_catalog()
    }

    /// Full bring-up, ending in [`CatalogState::Ready`].
    pub fn initialize(&mut self) -> Result<BringUp> {
        let verification = self.verify();
        let mut reprovisioned = false;
        if verification.matched {
            self.transition(CatalogState::Matched);
            if !self.load_cached_ids() {
                info!("no usable cached identifiers; rebuilding catalog");
                self.rebuild()?;
                reprovisioned = true;
            }
        } else {
            self.transition(CatalogState::Mismatched);
            self.rebuild()?;
            reprovisioned = true;
        }
        self.configure_gap()?;
        self.seed_values()?;
        self.transition(CatalogState::Ready);
        info!(
            service = ?self.catalog.assigned_id,
            reprovisioned,
            "catalog ready"
        );
        Ok(BringUp {
            verification,
            reprovisioned,
        })
    }

    fn rebuild(&mut self) -> Result<()> {
        self.reset()?;
        self.provision()?;
        self.store_cached_ids();
        Ok(())
    }

    /// Factory-reset the module and forget every identifier.
    pub fn reset(&mut self) -> Result<()> {
        self.transition(CatalogState::Resetting);
        self.link.factory_reset()?;
        info!("module factory reset");
        self.link.send_check_ok("AT+GATTCLEAR")?;
        self.catalog.clear_assignments();
        Ok(())
    }

    /// Create the service and its characteristics in declared order.
    pub fn provision(&mut self) -> Result<()> {
        self.transition(CatalogState::Provisioning);
        let service_id = self.link.send_for_id(&self.catalog.add_command())?;
        if service_id == 0 {
            return Err(GattError::InvalidId("service"));
        }
        self.catalog.assigned_id = Some(service_id);
        debug!(uuid = self.catalog.uuid, id = service_id, "service created");

        for i in 0..self.catalog.characteristics.len() {
            let cmd = self.catalog.characteristics[i].add_command();
            let id = self.link.send_for_id(&cmd)?;
            if id == 0 {
                return Err(GattError::InvalidId("characteristic"));
            }
            let ch = &mut self.catalog.characteristics[i];
            ch.assigned_id = Some(id);
            debug!(uuid = ch.uuid, id, "characteristic created");
        }
        Ok(())
    }

    // Adopt identifiers from the cache; false if any are missing.
    fn load_cached_ids(&mut self) -> bool {
        let Some(cache) = self.cache.as_deref() else {
            return false;
        };
        let service = cache.read(CP_SERVICE_ID_ADDRESS);
        if service == ERASED || service == 0 {
            return false;
        }
        let mut ids = Vec::with_capacity(self.catalog.characteristics.len());
        for ch in &self.catalog.characteristics {
            let id = address_for(ch.uuid).map(|a| cache.read(a)).unwrap_or(ERASED);
            if id == ERASED || id == 0 {
                return false;
            }
            ids.push(id);
        }
        self.catalog.assigned_id = Some(service);
        for (ch, id) in self.catalog.characteristics.iter_mut().zip(ids) {
            ch.assigned_id = Some(id);
        }
        info!(service, "reusing cached identifiers");
        true
    }

    // Cache failures only cost a rebuild on the next start.
    fn store_cached_ids(&mut self) {
        let Some(cache) = self.cache.as_deref_mut() else {
            return;
        };
        let mut cells = Vec::new();
        if let Some(id) = self.catalog.assigned_id {
            cells.push((CP_SERVICE_ID_ADDRESS, id));
        }
        for ch in &self.catalog.characteristics {
            if let (Some(addr), Some(id)) = (address_for(ch.uuid), ch.assigned_id) {
                cells.push((addr, id));
            }
        }
        for (addr, id) in cells {
            if let Err(e) = cache.write(addr, id) {
                warn!(error = %e, address = addr, "failed to cache identifier");
            }
        }
    }

    /// Name the device and push advertising data, resetting around it.
    pub fn configure_gap(&mut self) -> Result<()> {
        self.link.soft_reset()?;
        self.link
            .send_check_ok(&device_name_command(&self.config.device_name))?;
        self.link
            .send_check_ok(&advertising_command(&ADVERTISING_DATA))?;
        self.link.soft_reset()?;
        Ok(())
    }

    /// Initial values for the static characteristics.
    pub fn seed_values(&mut self) -> Result<()> {
        if let Some(id) = self.catalog.assigned_id_of(SENSOR_LOCATION_CHAR_UUID) {
            self.link.set_char_u8(id, SENSOR_LOCATION_RIGHT_CRANK)?;
        }
        if let Some(id) = self.catalog.assigned_id_of(CYCLING_POWER_FEATURE_CHAR_UUID) {
            self.link.set_char_u32(
                id,
                CPF_CRANK_REVOLUTION_DATA_SUPPORTED | CPF_WHEEL_REVOLUTION_DATA_SUPPORTED,
            )?;
        }
        match self
            .catalog
            .assigned_id_of(CYCLING_POWER_CONTROL_POINT_CHAR_UUID)
        {
            Some(id) => self.link.set_char_u8(id, 0)?,
            None => debug!("no control point in catalog; nothing to zero"),
        }
        Ok(())
    }

    /// Human-readable summary of the assigned identifiers.
    pub fn status_text(&self) -> String {
        let id = |v: Option<u8>| v.map(|i| i.to_string()).unwrap_or_else(|| "-".into());
        let mut out = String::new();
        let _ = writeln!(out, "catalog: {}", self.state.as_str());
        let _ = writeln!(
            out,
            "service 0x{:04X}\tid={}",
            self.catalog.uuid,
            id(self.catalog.assigned_id)
        );
        for ch in &self.catalog.characteristics {
            let _ = writeln!(
                out,
                "  char 0x{:04X}\tid={}\tprops=0x{:02X}\tlen={}..{}",
                ch.uuid,
                id(ch.assigned_id),
                ch.properties.bits(),
                ch.min_len,
                ch.max_len
            );
        }
        out
    }
}
