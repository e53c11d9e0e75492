//! Cycling Power Measurement records.
//!
//! Layout (all little-endian, no padding):
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 2    | flags                                   |
//! | 2      | 2    | instantaneous power, sint16 W           |
//! | 4      | 4    | cumulative wheel revolutions            |
//! | 8      | 2    | last wheel event time, 1/2048 s         |
//! | 10     | 2    | cumulative crank revolutions            |
//! | 12     | 2    | last crank event time, 1/1024 s         |
//!
//! Both event times wrap (every 32 s and 64 s respectively); receivers work from deltas.

use crate::error::DecodeError;
use at_transport::AtLink;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const MEASUREMENT_RECORD_LEN: usize = 14;

/// Cycling Power Measurement flag bits.
pub const CPM_WHEEL_REV_DATA_PRESENT: u16 = 1 << 4;
pub const CPM_CRANK_REV_DATA_PRESENT: u16 = 1 << 5;
pub const CPM_ACCUMULATED_ENERGY_PRESENT: u16 = 1 << 11;

/// One reading from the ride tracker.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub power_watts: u16,
    pub wheel_revs: u32,
    pub last_wheel_rev_timestamp_ms: u32,
    pub crank_revs: u16,
    pub last_crank_rev_timestamp_ms: u32,
    /// Carried for completeness; this profile does not transmit accumulated energy.
    #[serde(default)]
    pub total_energy_kj: u16,
}

/// The wire form of a sample.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub flags: u16,
    pub power_watts: i16,
    pub wheel_revs: u32,
    pub wheel_event_time: u16,
    pub crank_revs: u16,
    pub crank_event_time: u16,
}

impl MeasurementRecord {
    pub fn from_sample(sample: &TelemetrySample) -> Self {
        Self {
            flags: CPM_WHEEL_REV_DATA_PRESENT | CPM_CRANK_REV_DATA_PRESENT,
            power_watts: clamp_power(sample.power_watts),
            wheel_revs: sample.wheel_revs,
            wheel_event_time: wheel_event_time(sample.last_wheel_rev_timestamp_ms),
            crank_revs: sample.crank_revs,
            crank_event_time: crank_event_time(sample.last_crank_rev_timestamp_ms),
        }
    }

    pub fn encode(&self) -> [u8; MEASUREMENT_RECORD_LEN] {
        let mut out = [0u8; MEASUREMENT_RECORD_LEN];
        out[0..2].copy_from_slice(&self.flags.to_le_bytes());
        out[2..4].copy_from_slice(&self.power_watts.to_le_bytes());
        out[4..8].copy_from_slice(&self.wheel_revs.to_le_bytes());
        out[8..10].copy_from_slice(&self.wheel_event_time.to_le_bytes());
        out[10..12].copy_from_slice(&self.crank_revs.to_le_bytes());
        out[12..14].copy_from_slice(&self.crank_event_time.to_le_bytes());
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < MEASUREMENT_RECORD_LEN {
            return Err(DecodeError::TooShort {
                got: data.len(),
                need: MEASUREMENT_RECORD_LEN,
            });
        }
        let u16_at = |i: usize| u16::from_le_bytes([data[i], data[i + 1]]);
        Ok(Self {
            flags: u16_at(0),
            power_watts: i16::from_le_bytes([data[2], data[3]]),
            wheel_revs: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
            wheel_event_time: u16_at(8),
            crank_revs: u16_at(10),
            crank_event_time: u16_at(12),
        })
    }

    pub fn has_wheel_data(&self) -> bool {
        self.flags & CPM_WHEEL_REV_DATA_PRESENT != 0
    }

    pub fn has_crank_data(&self) -> bool {
        self.flags & CPM_CRANK_REV_DATA_PRESENT != 0
    }
}

/// Power above the sint16 range is pinned to its maximum.
pub fn clamp_power(watts: u16) -> i16 {
    i16::try_from(watts).unwrap_or(i16::MAX)
}

/// Milliseconds to 1/2048 s ticks, keeping the low 16 bits.
pub fn wheel_event_time(ms: u32) -> u16 {
    (u64::from(ms) * 2048 / 1000) as u16
}

/// Milliseconds to 1/1024 s ticks, keeping the low 16 bits.
pub fn crank_event_time(ms: u32) -> u16 {
    (u64::from(ms) * 1024 / 1000) as u16
}

/// Publishes samples to the measurement characteristic.
#[derive(Clone, Copy, Debug)]
pub struct TelemetryEncoder {
    measurement_id: u8,
}

impl TelemetryEncoder {
    pub fn new(measurement_id: u8) -> Self {
        Self { measurement_id }
    }

    pub fn measurement_id(&self) -> u8 {
        self.measurement_id
    }

    pub fn encode(sample: &TelemetrySample) -> [u8; MEASUREMENT_RECORD_LEN] {
        MeasurementRecord::from_sample(sample).encode()
    }

    /// Encode `sample` and hand it to `link`. The result is whatever the write returned.
    pub fn update<L: AtLink + ?Sized>(
        &self,
        link: &mut L,
        sample: &TelemetrySample,
    ) -> at_transport::Result<()> {
        let record = Self::encode(sample);
        debug!(id = self.measurement_id, power = sample.power_watts, "publishing measurement");
        let res = link.set_char(self.measurement_id, &record);
        self.handle_control_point();
        res
    }

    /// Control point writes are accepted and ignored. Head units used so far connect without
    /// responses; wheel-revolution resets would land here if ever needed.
    pub fn handle_control_point(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TelemetrySample {
        TelemetrySample {
            power_watts: 156,
            wheel_revs: 5199,
            last_wheel_rev_timestamp_ms: 1290,
            crank_revs: 1675,
            last_crank_rev_timestamp_ms: 61377,
            total_energy_kj: 195,
        }
    }

    #[test]
    fn test_record_layout() {
        let bytes = TelemetryEncoder::encode(&sample());
        assert_eq!(bytes.len(), 14);
        assert_eq!(&bytes[0..2], &[0x30, 0x00]);
        assert_eq!(&bytes[2..4], &[0x9c, 0x00]);
        assert_eq!(&bytes[4..8], &[0x4f, 0x14, 0x00, 0x00]);
        assert_eq!(u16::from_le_bytes([bytes[8], bytes[9]]), 2641);
        assert_eq!(&bytes[10..12], &[0x8b, 0x06]);
    }

    #[test]
    fn test_flags_omit_energy() {
        let rec = MeasurementRecord::from_sample(&sample());
        assert!(rec.has_wheel_data());
        assert!(rec.has_crank_data());
        assert_eq!(rec.flags & CPM_ACCUMULATED_ENERGY_PRESENT, 0);
    }

    #[test]
    fn test_power_clamped() {
        let mut s = sample();
        s.power_watts = 40000;
        let bytes = TelemetryEncoder::encode(&s);
        assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 0x7FFF);
        assert_eq!(clamp_power(32767), 32767);
        assert_eq!(clamp_power(32768), 32767);
        assert_eq!(clamp_power(0), 0);
    }

    #[test]
    fn test_event_time_scaling() {
        assert_eq!(wheel_event_time(1290), 2641);
        assert_eq!(crank_event_time(1000), 1024);
        assert_eq!(crank_event_time(999), 1022);
    }

    #[test]
    fn test_event_times_wrap() {
        // 32000 ms is exactly 65536 ticks of 1/2048 s
        assert_eq!(wheel_event_time(32_000), 0);
        assert_eq!(wheel_event_time(32_001), 2);
        assert_eq!(crank_event_time(64_000), 0);
        // No intermediate overflow for long rides
        assert_eq!(wheel_event_time(3_600_000), (3_600_000u64 * 2048 / 1000) as u16);
    }

    #[test]
    fn test_round_trip() {
        let s = sample();
        let rec = MeasurementRecord::decode(&TelemetryEncoder::encode(&s)).unwrap();
        assert_eq!(rec.flags, CPM_WHEEL_REV_DATA_PRESENT | CPM_CRANK_REV_DATA_PRESENT);
        assert_eq!(rec.power_watts, 156);
        assert_eq!(rec.wheel_revs, 5199);
        assert_eq!(rec.wheel_event_time, wheel_event_time(1290));
        assert_eq!(rec.crank_revs, 1675);
        assert_eq!(rec.crank_event_time, crank_event_time(61377));
    }

    #[test]
    fn test_decode_short() {
        let err = MeasurementRecord::decode(&[0u8; 13]).unwrap_err();
        assert_eq!(err, DecodeError::TooShort { got: 13, need: 14 });
    }
}
