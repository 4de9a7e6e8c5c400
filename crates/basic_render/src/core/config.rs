//! # Render System Configuration
//!
//! Device-level tuning for the resource managers: how many frames may be in
//! flight on the GPU and how many garbage-collection passes an unreferenced
//! resource has to survive before its native object is destroyed.
//!
//! Both values can be loaded from TOML or RON through [`Config`]:
//!
//! ```toml
//! max_frames_in_flight = 3
//!
//! [defer_policy]
//! static_release_threshold = 1
//! dynamic_release_threshold = 2
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};

/// Upper bound accepted by [`RenderSystemConfig::validate`]
pub const MAX_SUPPORTED_FRAMES_IN_FLIGHT: u32 = 8;

/// # Defer Policy
///
/// Controls when an expired resource record is finally destroyed.
///
/// Every collection pass resets a live record's defer counter to the current
/// frames-in-flight count. Once the record's tracker has expired, each pass
/// decrements the counter while it is above the release threshold; the pass
/// that finds it at or below the threshold destroys the native object.
/// With `N` frames in flight a threshold `t` therefore destroys the resource
/// on pass `N - t + 1` (never earlier than the first pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeferPolicy {
    /// Release threshold for static textures, static buffers and materials
    pub static_release_threshold: u32,
    /// Release threshold for dynamic textures and dynamic buffers
    ///
    /// Dynamic resources already keep one copy per frame in flight inside
    /// their link object, so they need one pass less of external deferral.
    pub dynamic_release_threshold: u32,
}

impl DeferPolicy {
    /// Static resources live `N` passes after expiry, dynamic ones `N - 1`
    pub const DEFAULT: Self = Self {
        static_release_threshold: 1,
        dynamic_release_threshold: 2,
    };

    /// Threshold for the given resource kind
    pub const fn threshold(&self, is_dynamic: bool) -> u32 {
        if is_dynamic {
            self.dynamic_release_threshold
        } else {
            self.static_release_threshold
        }
    }
}

impl Default for DeferPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// # Render System Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSystemConfig {
    /// Number of frames whose GPU work may still be pending
    pub max_frames_in_flight: u32,
    /// Deferred destruction policy
    pub defer_policy: DeferPolicy,
}

impl RenderSystemConfig {
    /// Create a configuration for the given frames-in-flight depth
    pub fn new(max_frames_in_flight: u32) -> Self {
        Self {
            max_frames_in_flight,
            defer_policy: DeferPolicy::default(),
        }
    }

    /// Set maximum frames in flight
    #[must_use]
    pub const fn with_max_frames_in_flight(mut self, frames: u32) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Set a custom defer policy
    #[must_use]
    pub const fn with_defer_policy(mut self, policy: DeferPolicy) -> Self {
        self.defer_policy = policy;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frames_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "Max frames in flight must be at least 1".to_string(),
            ));
        }
        if self.max_frames_in_flight > MAX_SUPPORTED_FRAMES_IN_FLIGHT {
            return Err(ConfigError::Invalid(format!(
                "Max frames in flight should not exceed {MAX_SUPPORTED_FRAMES_IN_FLIGHT}"
            )));
        }
        Ok(())
    }
}

impl Default for RenderSystemConfig {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Config for RenderSystemConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RenderSystemConfig::default();
        assert_eq!(config.max_frames_in_flight, 2);
        assert_eq!(config.defer_policy, DeferPolicy::DEFAULT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_and_too_many_frames() {
        assert!(RenderSystemConfig::new(0).validate().is_err());
        assert!(RenderSystemConfig::new(MAX_SUPPORTED_FRAMES_IN_FLIGHT + 1)
            .validate()
            .is_err());
        assert!(RenderSystemConfig::new(MAX_SUPPORTED_FRAMES_IN_FLIGHT)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_threshold_by_kind() {
        let policy = DeferPolicy {
            static_release_threshold: 4,
            dynamic_release_threshold: 5,
        };
        assert_eq!(policy.threshold(false), 4);
        assert_eq!(policy.threshold(true), 5);
    }

    #[test]
    fn test_parse_toml() {
        let config = RenderSystemConfig::from_toml_str(
            "max_frames_in_flight = 3\n[defer_policy]\nstatic_release_threshold = 0\n",
        )
        .unwrap();
        assert_eq!(config.max_frames_in_flight, 3);
        assert_eq!(config.defer_policy.static_release_threshold, 0);
        assert_eq!(
            config.defer_policy.dynamic_release_threshold,
            DeferPolicy::DEFAULT.dynamic_release_threshold
        );
    }

    #[test]
    fn test_parse_ron() {
        let config = RenderSystemConfig::from_ron_str("(max_frames_in_flight: 4)").unwrap();
        assert_eq!(config.max_frames_in_flight, 4);
        assert_eq!(config.defer_policy, DeferPolicy::DEFAULT);
    }

    #[test]
    fn test_save_and_load_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!(
            "basic_render_config_{}.toml",
            std::process::id()
        ));
        let config = RenderSystemConfig::new(3);
        config.save_to_file(&path).unwrap();
        let loaded = RenderSystemConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = RenderSystemConfig::default().save_to_file("render.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
