use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct SensorMetrics {
    pub records_sent: IntCounter,
    pub record_failures: IntCounter,
    pub catalog_matches: IntCounter,
    pub catalog_reprovisions: IntCounter,
    pub characteristics: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub sensor: SensorMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let records_sent = IntCounter::new("cps_records_sent", "Measurement records delivered")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let record_failures = IntCounter::new(
            "cps_record_failures",
            "Measurement records the module did not acknowledge",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let catalog_matches = IntCounter::new(
            "cps_catalog_matches",
            "Bring-ups whose catalog listing matched the reference",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let catalog_reprovisions =
            IntCounter::new("cps_catalog_reprovisions", "Catalog rebuilds from scratch")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let characteristics =
            IntGauge::new("cps_characteristics", "Characteristics in the live catalog")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let sensor = SensorMetrics {
            records_sent,
            record_failures,
            catalog_matches,
            catalog_reprovisions,
            characteristics,
        };
        let _ = registry.register(Box::new(sensor.records_sent.clone()));
        let _ = registry.register(Box::new(sensor.record_failures.clone()));
        let _ = registry.register(Box::new(sensor.catalog_matches.clone()));
        let _ = registry.register(Box::new(sensor.catalog_reprovisions.clone()));
        let _ = registry.register(Box::new(sensor.characteristics.clone()));
        Ok(Self { registry, sensor })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_exposition() {
        let hub = MetricsHub::new().unwrap();
        hub.sensor.records_sent.inc();
        hub.sensor.characteristics.set(3);
        let text = hub.encode_text();
        assert!(text.contains("cps_records_sent 1"));
        assert!(text.contains("cps_characteristics 3"));
    }
}
