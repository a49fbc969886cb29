// src/localization/lost_filter.rs
// Smooths the localizer's confidence stream into a lost-score in [0, 100].
// Saturates at the limits; in between, the score integrates how far and in which
// direction confidence moves relative to the midpoint, so a single noisy sample
// nudges the trend instead of flipping it.

use super::pose::UNKNOWN_CONFIDENCE;
use crate::LostFilterConfig;
use log::debug;

/// Running lost-score with the previous confidence sample
#[derive(Clone, Debug)]
pub struct LostValueFilter {
    config: LostFilterConfig,
    lost_value: f64,
    prev_conf: f64,
}

impl LostValueFilter {
    /// Creates a filter with a zero score and a fully confident previous sample
    pub fn new(config: LostFilterConfig) -> Self {
        LostValueFilter {
            config,
            lost_value: 0.0,
            prev_conf: 1.0,
        }
    }

    /// Current lost-score in [0, 100]
    pub fn lost_value(&self) -> f64 {
        self.lost_value
    }

    /// Confidence sample remembered for the next update
    pub fn prev_conf(&self) -> f64 {
        self.prev_conf
    }

    /// Feeds one confidence sample, using the stored previous sample
    pub fn update(&mut self, cur_conf: f64) -> f64 {
        let prev = self.prev_conf;
        self.make_lost_value(prev, cur_conf)
    }

    /// Updates the lost-score from an explicit previous/current confidence pair
    ///
    /// Non-finite samples count as [`UNKNOWN_CONFIDENCE`].
    pub fn make_lost_value(&mut self, prev_conf: f64, cur_conf: f64) -> f64 {
        let prev_conf = if prev_conf.is_finite() { prev_conf } else { UNKNOWN_CONFIDENCE };
        let cur_conf = if cur_conf.is_finite() { cur_conf } else { UNKNOWN_CONFIDENCE };
        let c = &self.config;
        let mid = c.middle_value;

        if cur_conf <= c.lower_limit {
            self.lost_value = 100.0;
        } else if cur_conf >= c.upper_limit {
            self.lost_value = 0.0;
        } else if cur_conf < mid {
            // uncertain side: the score grows
            self.lost_value += if prev_conf >= mid {
                (prev_conf - cur_conf) * c.weight
            } else if cur_conf < prev_conf {
                (mid - cur_conf) * c.weight
            } else {
                (mid - cur_conf) * c.small_weight
            };
        } else {
            // confident side: the score shrinks
            self.lost_value -= if prev_conf <= mid {
                (cur_conf - prev_conf) * c.weight
            } else if cur_conf < prev_conf {
                (cur_conf - mid) * c.small_weight
            } else {
                (cur_conf - mid) * c.weight
            };
        }

        self.lost_value = self.lost_value.clamp(0.0, 100.0);
        self.prev_conf = cur_conf;
        debug!(
            "lost value {:.1} (conf {:.2} -> {:.2})",
            self.lost_value, prev_conf, cur_conf
        );
        self.lost_value
    }

    /// Returns to the initial state
    pub fn reset(&mut self) {
        self.lost_value = 0.0;
        self.prev_conf = 1.0;
    }
}

impl Default for LostValueFilter {
    fn default() -> Self {
        LostValueFilter::new(LostFilterConfig::default())
    }
}
