use crate::models::{AuroraDetails, AuroraLevel};

pub const KP_MIN: f64 = 0.0;
pub const KP_MAX: f64 = 9.0;

/// Returned by `official_kp_string` when there is no value to format.
pub const NOT_APPLICABLE: &str = "N/A";

/// Lowest geomagnetic latitude the aurora is modelled to reach.
pub const MIN_AURORA_LATITUDE: f64 = 50.0;

pub fn clamp_kp(kp: f64) -> f64 {
    kp.clamp(KP_MIN, KP_MAX)
}

/// Latitude down to which the aurora is visible for a given Kp.
/// Falls 2.5 degrees per Kp unit from 67.5 and never below 50.
pub fn geomagnetic_latitude(kp: f64) -> f64 {
    MIN_AURORA_LATITUDE.max(67.5 - 2.5 * clamp_kp(kp))
}

/// Format Kp on the official thirds scale: `5o`, `5+`, `6-`, ...
///
/// Kp is rounded to the nearest third (ties to even). The thirds above a whole
/// number read `+`; two thirds above read as the next number with `-`.
pub fn official_kp_string(kp: Option<f64>) -> String {
    let Some(kp) = kp.filter(|v| v.is_finite()) else {
        return NOT_APPLICABLE.to_string();
    };

    let thirds = (clamp_kp(kp) * 3.0).round_ties_even() as i64;
    let mut main = thirds / 3;
    let suffix = match thirds % 3 {
        0 => "o",
        1 => "+",
        _ => {
            main += 1;
            "-"
        }
    };

    if main >= 10 {
        return "9o".to_string();
    }
    format!("{}{}", main, suffix)
}

pub fn aurora_level(kp: f64) -> AuroraLevel {
    let kp = clamp_kp(kp);
    if kp >= 7.0 {
        AuroraLevel::High
    } else if kp >= 5.0 {
        AuroraLevel::Moderate
    } else if kp >= 4.0 {
        AuroraLevel::Low
    } else {
        AuroraLevel::Minimal
    }
}

pub fn aurora_details(kp: f64) -> AuroraDetails {
    let level = aurora_level(kp);
    let (color, radius_factor, description) = match level {
        AuroraLevel::High => ("#d946ef", 40, "Aurora visible as far south as Chicago, Detroit"),
        AuroraLevel::Moderate => ("#f43f5e", 35, "Aurora visible in northern US states"),
        AuroraLevel::Low => ("#22c55e", 30, "Aurora visible in Canada and northern Europe"),
        AuroraLevel::Minimal => ("#0ea5e9", 25, "Aurora visible only in polar regions"),
    };

    AuroraDetails {
        level,
        color: color.to_string(),
        radius_factor,
        description: description.to_string(),
    }
}
