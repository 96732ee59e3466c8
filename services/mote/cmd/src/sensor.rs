//! Synthetic Telos sensor board.
//!
//! Each reading type follows its own bounded random walk in the raw ADC range,
//! so consecutive samples of one type look like a slowly drifting signal.

use mote_forward::Sampler;
use mote_wire::ReadingFlag;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Full scale of the 12-bit MSP430 ADC
pub const ADC_MAX: u16 = 4095;

/// Largest step of the walk between two samples of one type
const MAX_STEP: i32 = 8;

/// Where a reading type is sampled on the Telos board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSource {
    /// Internal ADC channel
    Adc(u8),
    /// Sensirion SHT11 digital sensor
    Sht11,
}

/// Board wiring for each reading type
pub fn source_for(flag: ReadingFlag) -> SensorSource {
    match flag {
        ReadingFlag::Temperature | ReadingFlag::Humidity => SensorSource::Sht11,
        // S1087 photodiode
        ReadingFlag::Visible => SensorSource::Adc(4),
        // S1087-01 photodiode
        ReadingFlag::Infrared => SensorSource::Adc(5),
        // VCC/2
        ReadingFlag::Voltage => SensorSource::Adc(11),
    }
}

/// Plausible raw value a walk starts from
fn baseline(flag: ReadingFlag) -> u16 {
    match flag {
        // about 22 °C
        ReadingFlag::Temperature => 6_160,
        // about 45 %RH
        ReadingFlag::Humidity => 1_450,
        ReadingFlag::Visible => 600,
        ReadingFlag::Infrared => 900,
        // about 2.9 V
        ReadingFlag::Voltage => 3_960,
    }
}

/// Largest raw value for a reading type; the SHT11 reports 14-bit values
fn ceiling(flag: ReadingFlag) -> u16 {
    match source_for(flag) {
        SensorSource::Sht11 => 16_383,
        SensorSource::Adc(_) => ADC_MAX,
    }
}

/// Random-walk sampler standing in for the sensor board
#[derive(Debug)]
pub struct SyntheticSensor {
    rng: StdRng,
    last: [u16; ReadingFlag::ALL.len()],
}

impl SyntheticSensor {
    /// Sensor seeded from the OS
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible sensor
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            last: ReadingFlag::ALL.map(baseline),
        }
    }

    fn slot(flag: ReadingFlag) -> usize {
        (flag as u8 / mote_wire::FLAG_STEP) as usize
    }
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for SyntheticSensor {
    fn sample(&mut self, flag: ReadingFlag) -> u16 {
        let slot = Self::slot(flag);
        let step = self.rng.gen_range(-MAX_STEP..=MAX_STEP);
        let next = (self.last[slot] as i32 + step).clamp(0, ceiling(flag) as i32) as u16;
        self.last[slot] = next;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_wiring() {
        assert_eq!(source_for(ReadingFlag::Temperature), SensorSource::Sht11);
        assert_eq!(source_for(ReadingFlag::Humidity), SensorSource::Sht11);
        assert_eq!(source_for(ReadingFlag::Visible), SensorSource::Adc(4));
        assert_eq!(source_for(ReadingFlag::Infrared), SensorSource::Adc(5));
        assert_eq!(source_for(ReadingFlag::Voltage), SensorSource::Adc(11));
    }

    #[test]
    fn test_walk_stays_near_previous_value() {
        let mut sensor = SyntheticSensor::seeded(7);

        for flag in ReadingFlag::ALL {
            let mut prev = baseline(flag);
            for _ in 0..100 {
                let value = sensor.sample(flag);
                assert!((value as i32 - prev as i32).abs() <= MAX_STEP);
                assert!(value <= ceiling(flag));
                prev = value;
            }
        }
    }

    #[test]
    fn test_seeded_sensors_agree() {
        let mut a = SyntheticSensor::seeded(42);
        let mut b = SyntheticSensor::seeded(42);

        for flag in ReadingFlag::ALL.iter().cycle().take(20) {
            assert_eq!(a.sample(*flag), b.sample(*flag));
        }
    }
}
