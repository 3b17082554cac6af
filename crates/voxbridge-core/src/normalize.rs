//! Prosody parameter normalization.
//!
//! Callers supply rate, pitch and volume as optional floats. Normalization
//! clamps each supplied value into its legal range and then drops any value
//! that lands on neutral. Dropped values are never written to the engine:
//! some platform engines (Android's Google engine in particular) degrade
//! when identity values are explicitly set, so "neutral" is expressed as
//! absence rather than as writing 1.0.

use voxbridge_engine::ParamPlan;

pub const NEUTRAL: f32 = 1.0;

pub const MIN_RATE: f32 = 0.1;
pub const MAX_RATE: f32 = 4.0;
pub const MIN_PITCH: f32 = 0.5;
pub const MAX_PITCH: f32 = 2.0;
pub const MIN_VOLUME: f32 = 0.0;
pub const MAX_VOLUME: f32 = 1.0;

/// Build the setter plan for one request. Total over the full input domain;
/// out-of-range values clamp and non-finite values are treated as absent.
pub fn normalize(rate: Option<f32>, pitch: Option<f32>, volume: Option<f32>) -> ParamPlan {
    ParamPlan {
        rate: normalize_one(rate, MIN_RATE, MAX_RATE),
        pitch: normalize_one(pitch, MIN_PITCH, MAX_PITCH),
        volume: normalize_one(volume, MIN_VOLUME, MAX_VOLUME),
    }
}

fn normalize_one(value: Option<f32>, min: f32, max: f32) -> Option<f32> {
    let value = value.filter(|v| v.is_finite())?;
    let clamped = value.clamp(min, max);
    if (clamped - NEUTRAL).abs() < f32::EPSILON {
        None
    } else {
        Some(clamped)
    }
}
