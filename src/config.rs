//! Runtime tunables.

use std::time::Duration;

/// Nominal duration of one rendering frame (60 Hz).
pub const FRAME_DURATION: Duration = Duration::from_micros(16_666);

/// Time that must remain before the frame deadline for the non-batched lane
/// to keep draining.
pub const MIN_TIME_LEFT_FOR_NON_BATCHED: Duration = Duration::from_micros(8_333);

#[derive(Debug, Clone, PartialEq)]
pub struct UiManagerConfig {
    pub frame_duration: Duration,
    pub min_time_left_for_non_batched: Duration,
    pub layout_animation_enabled: bool,
}

impl Default for UiManagerConfig {
    fn default() -> Self {
        Self {
            frame_duration: FRAME_DURATION,
            min_time_left_for_non_batched: MIN_TIME_LEFT_FOR_NON_BATCHED,
            layout_animation_enabled: true,
        }
    }
}

impl UiManagerConfig {
    pub fn with_frame_duration(mut self, frame_duration: Duration) -> Self {
        self.frame_duration = frame_duration;
        self
    }

    pub fn with_min_time_left_for_non_batched(mut self, min: Duration) -> Self {
        self.min_time_left_for_non_batched = min;
        self
    }

    pub fn with_layout_animation(mut self, enabled: bool) -> Self {
        self.layout_animation_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UiManagerConfig::default();
        assert_eq!(config.frame_duration, FRAME_DURATION);
        assert_eq!(config.min_time_left_for_non_batched, MIN_TIME_LEFT_FOR_NON_BATCHED);
        assert!(config.layout_animation_enabled);
    }

    #[test]
    fn test_builder() {
        let config = UiManagerConfig::default()
            .with_frame_duration(Duration::from_millis(8))
            .with_layout_animation(false);
        assert_eq!(config.frame_duration, Duration::from_millis(8));
        assert!(!config.layout_animation_enabled);
    }
}
