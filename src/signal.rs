//! Radio signal conversions for stationary beacon readings
//! Raw hardware byte -> calibrated RSSI (dBm) -> linear power (mW)

const RSSI_OFFSET_DBM: i32 = -45; // radio front-end offset
const SIGN_BIT: i32 = 128;

/// Convert a raw radio reading into a calibrated RSSI value in dBm.
///
/// Readings below 128 are a plain offset. Readings at or above 128 are the
/// radio's two's-complement encoding of a negative register value, decoded
/// as `-((reading - 1) ^ 0xFF)` before the offset is applied.
///
/// Input is the radio's single register byte; readings outside 0..=255 are
/// rejected as `InvalidReading` when records are classified.
pub fn to_calibrated_signal(raw_reading: u8) -> i32 {
    let reading = raw_reading as i32;
    if reading < SIGN_BIT {
        reading + RSSI_OFFSET_DBM
    } else {
        -((reading - 1) ^ 0xFF) + RSSI_OFFSET_DBM
    }
}

/// Convert a logarithmic signal (dBm) into linear power (mW).
pub fn to_linear_power(signal_dbm: f64) -> f64 {
    10f64.powf(signal_dbm / 10.0)
}

/// Convert linear power (mW) back to dBm. Non-positive power maps to -inf.
pub fn power_to_dbm(power_mw: f64) -> f64 {
    if power_mw <= 0.0 {
        return f64::NEG_INFINITY;
    }
    10.0 * power_mw.log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_low_readings_are_offset() {
        assert_eq!(to_calibrated_signal(0), -45);
        assert_eq!(to_calibrated_signal(45), 0);
        assert_eq!(to_calibrated_signal(127), 82);
    }

    #[test]
    fn test_high_readings_are_sign_decoded() {
        // (128 - 1) ^ 0xFF = 128
        assert_eq!(to_calibrated_signal(128), -173);
        // (200 - 1) ^ 0xFF = 56
        assert_eq!(to_calibrated_signal(200), -101);
        // (255 - 1) ^ 0xFF = 1
        assert_eq!(to_calibrated_signal(255), -46);
    }

    #[test]
    fn test_linear_power() {
        assert_relative_eq!(to_linear_power(0.0), 1.0);
        assert_relative_eq!(to_linear_power(-10.0), 0.1, epsilon = 1e-12);
        assert_relative_eq!(to_linear_power(-85.0), 3.1622776601683795e-9, max_relative = 1e-12);
    }

    #[test]
    fn test_power_is_monotonic_in_reading() {
        let mut previous = f64::NEG_INFINITY;
        for reading in 128u8..=255 {
            let power = to_linear_power(to_calibrated_signal(reading) as f64);
            assert!(power > previous, "reading {} not monotonic", reading);
            previous = power;
        }
    }

    #[test]
    fn test_dbm_round_trip() {
        assert_relative_eq!(power_to_dbm(to_linear_power(-73.0)), -73.0, epsilon = 1e-9);
        assert_eq!(power_to_dbm(0.0), f64::NEG_INFINITY);
    }
}
