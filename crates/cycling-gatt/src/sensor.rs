use crate::error::{GattError, Result};
use crate::manager::{BringUp, CatalogManager};
use crate::metrics::MetricsHub;
use crate::telemetry::{TelemetryEncoder, TelemetrySample};
use at_transport::AtLink;
use tracing::warn;

/// A Cycling Power sensor on top of a radio module: bring-up, then periodic updates.
pub struct CyclingPowerSensor<L: AtLink> {
    manager: CatalogManager<L>,
    encoder: Option<TelemetryEncoder>,
    metrics: Option<MetricsHub>,
}

impl<L: AtLink> CyclingPowerSensor<L> {
    pub fn new(manager: CatalogManager<L>) -> Self {
        Self {
            manager,
            encoder: None,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MetricsHub) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn manager(&self) -> &CatalogManager<L> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut CatalogManager<L> {
        &mut self.manager
    }

    pub fn metrics(&self) -> Option<&MetricsHub> {
        self.metrics.as_ref()
    }

    pub fn initialize(&mut self) -> Result<BringUp> {
        let bring_up = self.manager.initialize()?;
        self.encoder = Some(TelemetryEncoder::new(self.manager.measurement_id()?));
        if let Some(m) = &self.metrics {
            if bring_up.verification.matched {
                m.sensor.catalog_matches.inc();
            }
            if bring_up.reprovisioned {
                m.sensor.catalog_reprovisions.inc();
            }
            m.sensor
                .characteristics
                .set(self.manager.catalog().characteristics.len() as i64);
        }
        Ok(bring_up)
    }

    /// Publish one sample. Fails with `NotReady` before [`initialize`](Self::initialize).
    pub fn update(&mut self, sample: &TelemetrySample) -> Result<()> {
        let encoder = self.encoder.ok_or(GattError::NotReady(self.manager.state().as_str()))?;
        let res = encoder.update(self.manager.link_mut(), sample);
        if let Some(m) = &self.metrics {
            match &res {
                Ok(()) => m.sensor.records_sent.inc(),
                Err(_) => m.sensor.record_failures.inc(),
            }
        }
        if let Err(e) = &res {
            warn!(error = %e, "measurement not delivered");
        }
        res.map_err(GattError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerConfig;
    use crate::telemetry::MeasurementRecord;
    use at_transport::MockModule;

    fn sensor() -> CyclingPowerSensor<MockModule> {
        let mgr = CatalogManager::new(MockModule::new("mock0"), ManagerConfig::default());
        CyclingPowerSensor::new(mgr).with_metrics(MetricsHub::new().unwrap())
    }

    #[test]
    fn test_update_before_initialize() {
        let mut s = sensor();
        let err = s.update(&TelemetrySample::default()).unwrap_err();
        assert!(matches!(err, GattError::NotReady("unverified")));
    }

    #[test]
    fn test_update_writes_measurement() {
        let mut s = sensor();
        s.initialize().unwrap();
        let sample = TelemetrySample {
            power_watts: 40000,
            wheel_revs: 5199,
            last_wheel_rev_timestamp_ms: 1290,
            crank_revs: 12,
            last_crank_rev_timestamp_ms: 5000,
            total_energy_kj: 0,
        };
        s.update(&sample).unwrap();
        let id = s.manager().measurement_id().unwrap();
        let raw = s.manager().link().characteristic_value(id).unwrap();
        let rec = MeasurementRecord::decode(raw).unwrap();
        assert_eq!(rec.power_watts, i16::MAX);
        assert_eq!(rec.wheel_revs, 5199);
        let text = s.metrics().unwrap().encode_text();
        assert!(text.contains("cps_records_sent 1"));
        assert!(text.contains("cps_catalog_reprovisions 1"));
    }

    #[test]
    fn test_delivery_failure_propagates() {
        let mut s = sensor();
        s.initialize().unwrap();
        s.manager_mut().link_mut().refuse("AT+GATTCHAR=2");
        assert!(s.update(&TelemetrySample::default()).is_err());
        let text = s.metrics().unwrap().encode_text();
        assert!(text.contains("cps_record_failures 1"));
    }
}
