//! Simulated ride for exercising a sensor without a bike attached.

use cycling_gatt::TelemetrySample;

/// Wheel revolutions per millisecond per mph, for a 700c x 25 wheel (2105 mm).
const WHEEL_REV_PER_MS_MPH: f32 = 2.1237e-4;

/// Integrates steady cadence and power into revolution counts and event times.
pub struct SimulatedRide {
    rpm: f32,
    power_watts: u16,
    mph: f32,
    crank_revs: f64,
    wheel_revs: f64,
    last_crank_ms: u32,
    last_wheel_ms: u32,
    now_ms: u32,
}

impl SimulatedRide {
    pub fn new(rpm: f32, power_watts: u16) -> Self {
        Self {
            rpm,
            power_watts,
            mph: mph_from_power(power_watts),
            crank_revs: 0.0,
            wheel_revs: 0.0,
            last_crank_ms: 0,
            last_wheel_ms: 0,
            now_ms: 0,
        }
    }

    /// Move the ride forward by `elapsed_ms` and return the resulting sample.
    pub fn advance(&mut self, elapsed_ms: u32) -> TelemetrySample {
        self.now_ms = self.now_ms.wrapping_add(elapsed_ms);
        let crank_per_ms = f64::from(self.rpm) / 60_000.0;
        let wheel_per_ms = f64::from(WHEEL_REV_PER_MS_MPH * self.mph);
        self.last_crank_ms = advance_revs(
            &mut self.crank_revs,
            self.last_crank_ms,
            crank_per_ms,
            elapsed_ms,
            self.now_ms,
        );
        self.last_wheel_ms = advance_revs(
            &mut self.wheel_revs,
            self.last_wheel_ms,
            wheel_per_ms,
            elapsed_ms,
            self.now_ms,
        );
        TelemetrySample {
            power_watts: self.power_watts,
            wheel_revs: (self.wheel_revs as u64 % 0x1_0000_0000) as u32,
            last_wheel_rev_timestamp_ms: self.last_wheel_ms,
            // Both counters roll over at their field width
            crank_revs: (self.crank_revs as u64 % 0x1_0000) as u16,
            last_crank_rev_timestamp_ms: self.last_crank_ms,
            total_energy_kj: 0,
        }
    }
}

// Event time moves back from `now` to the moment the last whole revolution completed.
fn advance_revs(total: &mut f64, last_event_ms: u32, per_ms: f64, elapsed_ms: u32, now: u32) -> u32 {
    let before = *total as u64;
    *total += per_ms * f64::from(elapsed_ms);
    if (*total as u64) == before || per_ms <= 0.0 {
        return last_event_ms;
    }
    let partial = total.fract();
    now.wrapping_sub((partial / per_ms) as u32)
}

/// Piecewise fit of road speed against power.
fn mph_from_power(watts: u16) -> f32 {
    const LOW: [f32; 4] = [-0.07605, 0.74063, -0.14023, 0.04660];
    const HIGH: [f32; 4] = [0.00087, -0.05685, 2.23594, -1.31158];
    let power = f32::from(watts);
    let root = power.sqrt();
    let coefs = if power < 27.0 { &LOW } else { &HIGH };
    let mut mph = 0.0_f32;
    for c in &coefs[..3] {
        mph += *c;
        mph *= root;
    }
    (mph + coefs[3]).max(0.0)
}
