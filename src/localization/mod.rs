// src/localization/mod.rs
// Inputs handed over by the external localizer: topometric poses, confidence
// smoothing, and the clock used to time off-path hysteresis.

/// Time source for hysteresis timers
pub mod clock;
/// Lost-score smoothing
pub mod lost_filter;
/// Topometric pose
pub mod pose;

pub use clock::{Clock, SystemClock};
pub use lost_filter::LostValueFilter;
pub use pose::TopometricPose;
