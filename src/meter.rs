//! Live input level shared between the capture thread and observers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const METER_FLOOR_DB: f32 = -60.0;

/// Lock-free dBFS cell the capture loop updates once per chunk. Clones share
/// the same cell, so an embedding layer can poll it without touching the
/// pipeline.
#[derive(Clone, Debug)]
pub struct LiveMeter {
    level_bits: Arc<AtomicU32>,
}

impl LiveMeter {
    pub fn new() -> Self {
        Self {
            level_bits: Arc::new(AtomicU32::new(METER_FLOOR_DB.to_bits())),
        }
    }

    pub(crate) fn set_db(&self, db: f32) {
        self.level_bits.store(db.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.set_db(METER_FLOOR_DB);
    }

    pub fn level_db(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }
}

impl Default for LiveMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// RMS level of a 16-bit chunk in dBFS, floored for silence/empty input.
pub(crate) fn rms_db(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return METER_FLOOR_DB;
    }
    let energy: f32 = samples
        .iter()
        .map(|&s| {
            let normalized = f32::from(s) / 32_768.0;
            normalized * normalized
        })
        .sum::<f32>()
        / samples.len() as f32;
    let rms = energy.sqrt().max(1e-6);
    (20.0 * rms.log10()).max(METER_FLOOR_DB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_meter_defaults_to_floor() {
        let meter = LiveMeter::new();
        assert_eq!(meter.level_db(), METER_FLOOR_DB);
    }

    #[test]
    fn live_meter_updates_and_resets() {
        let meter = LiveMeter::new();
        meter.set_db(-20.0);
        assert_eq!(meter.level_db(), -20.0);
        meter.reset();
        assert_eq!(meter.level_db(), METER_FLOOR_DB);
    }

    #[test]
    fn rms_db_floors_empty_and_silent_input() {
        assert_eq!(rms_db(&[]), METER_FLOOR_DB);
        assert_eq!(rms_db(&[0, 0, 0]), METER_FLOOR_DB);
    }

    #[test]
    fn rms_db_full_scale_is_near_zero() {
        let level = rms_db(&[i16::MAX; 64]);
        assert!(level > -0.1 && level <= 0.0, "got {level}");
    }
}
