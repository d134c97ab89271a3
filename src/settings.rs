//! Reshuffle settings
//!
//! Every delay, kinematic constant and homing limit lives here so a game can
//! retune the effect from JSON without touching the state machine.

use std::collections::HashMap;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::ReshuffleError;

/// Pacing preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PacingPreset {
    Relaxed,
    #[default]
    Standard,
    Turbo,
}

impl PacingPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacingPreset::Relaxed => "Relaxed",
            PacingPreset::Standard => "Standard",
            PacingPreset::Turbo => "Turbo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "relaxed" | "slow" => Some(PacingPreset::Relaxed),
            "standard" | "normal" => Some(PacingPreset::Standard),
            "turbo" | "fast" => Some(PacingPreset::Turbo),
            _ => None,
        }
    }

    /// Multiplier applied to every presentation delay
    pub fn time_scale(&self) -> f32 {
        match self {
            PacingPreset::Relaxed => 1.4,
            PacingPreset::Standard => 1.0,
            PacingPreset::Turbo => 0.5,
        }
    }
}

/// Order in which the server lists each column's symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ColumnOrder {
    /// Bottom row first; reversed once at ingestion
    #[default]
    BottomUp,
    /// Already in reading order (row 0 = top)
    TopDown,
}

/// Free-orbit motion constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitParams {
    /// Center of the orbit (world space)
    pub center: Vec2,
    /// Ring pieces drift toward while free-orbiting
    pub inner_radius: f32,
    /// Radial drift speed (pixels/sec)
    pub radial_speed: f32,
    /// Initial angular speed range (radians/sec)
    pub min_angular_speed: f32,
    pub start_angular_speed: f32,
    /// Cap on angular speed
    pub max_angular_speed: f32,
    /// Angular acceleration (radians/sec²)
    pub angular_accel: f32,
    /// Seconds of orbit before the piece starts slowing down
    pub decel_after: f32,
    /// Angular deceleration once past `decel_after` (radians/sec²)
    pub angular_decel: f32,
}

impl Default for OrbitParams {
    fn default() -> Self {
        Self {
            center: Vec2::ZERO,
            inner_radius: 90.0,
            radial_speed: 60.0,
            min_angular_speed: 1.2,
            start_angular_speed: 2.0,
            max_angular_speed: 5.5,
            angular_accel: 3.0,
            decel_after: 2.5,
            angular_decel: 1.5,
        }
    }
}

/// Directed-flight limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingParams {
    /// Distance at which a homing piece counts as arrived (pixels)
    pub tolerance: f32,
    /// Hard deadline after release; the piece is snapped when it expires
    pub max_search_time: f32,
}

impl Default for HomingParams {
    fn default() -> Self {
        Self {
            tolerance: 14.0,
            max_search_time: 2.0,
        }
    }
}

/// Reshuffle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReshuffleSettings {
    /// Pacing preset (scales every delay below)
    pub pacing: PacingPreset,
    /// RNG seed for initial orbit state
    pub seed: u64,
    /// Suffix marking variant ("transforming") symbols
    pub variant_suffix: String,
    /// How the server orders symbols within a column
    pub server_column_order: ColumnOrder,

    // === Delays (seconds) ===
    /// Random wait-before-start spread given to every picked-up piece
    pub pickup_jitter: f32,
    /// Extra hold for variant pieces before they join the orbit
    pub variant_hold_delay: f32,
    /// Pause after pickup completes
    pub pickup_settle: f32,
    /// Pause between directed landings
    pub directed_landing_interval: f32,
    /// Pause between free landings
    pub free_landing_interval: f32,
    /// Pause before the grid is refreshed at the end
    pub finishing_settle: f32,
    /// Length of the falling/settling tween
    pub drop_duration: f32,
    /// Entrance presentation (shake, sting) before pieces lift
    pub entrance_duration: f32,

    // === Presentation ===
    pub camera_shake: f32,
    /// Finish the payout rollup instantly when auto-playing
    pub instant_rollup_in_auto: bool,
    /// Payout units per second the rollup counts up by
    pub rollup_rate: f32,

    // === Kinematics ===
    pub orbit: OrbitParams,
    pub homing: HomingParams,
    /// Visual offset added to a directed destination, per symbol name
    pub symbol_offsets: HashMap<String, Vec2>,
}

impl Default for ReshuffleSettings {
    fn default() -> Self {
        Self {
            pacing: PacingPreset::Standard,
            seed: 0x5eed_2e5f,
            variant_suffix: "_TRANSFORMING".to_string(),
            server_column_order: ColumnOrder::BottomUp,

            pickup_jitter: 0.25,
            variant_hold_delay: 0.6,
            pickup_settle: 0.5,
            directed_landing_interval: 0.2,
            free_landing_interval: 0.06,
            finishing_settle: 0.4,
            drop_duration: 0.35,
            entrance_duration: 1.0,

            camera_shake: 0.6,
            instant_rollup_in_auto: true,
            rollup_rate: 250.0,

            orbit: OrbitParams::default(),
            homing: HomingParams::default(),
            symbol_offsets: HashMap::new(),
        }
    }
}

impl ReshuffleSettings {
    /// Create settings from a pacing preset
    pub fn from_preset(preset: PacingPreset) -> Self {
        Self {
            pacing: preset,
            ..Self::default()
        }
    }

    /// Parse settings from JSON (missing fields fall back to defaults)
    pub fn from_json(json: &str) -> Result<Self, ReshuffleError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReshuffleError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded reshuffle settings from {}", path.display());
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, ReshuffleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Settings safe to run with: invalid values fall back to the defaults,
    /// keeping the seed so runs stay reproducible
    pub fn sanitized(self) -> Self {
        match self.validate() {
            Ok(()) => self,
            Err(err) => {
                log::warn!("Invalid reshuffle settings ({err}); using defaults");
                Self {
                    seed: self.seed,
                    ..Self::default()
                }
            }
        }
    }

    /// Reject timings the state machine cannot honor
    pub fn validate(&self) -> Result<(), ReshuffleError> {
        let delays = [
            ("pickup_jitter", self.pickup_jitter),
            ("variant_hold_delay", self.variant_hold_delay),
            ("pickup_settle", self.pickup_settle),
            ("directed_landing_interval", self.directed_landing_interval),
            ("free_landing_interval", self.free_landing_interval),
            ("finishing_settle", self.finishing_settle),
            ("drop_duration", self.drop_duration),
            ("entrance_duration", self.entrance_duration),
            ("homing.max_search_time", self.homing.max_search_time),
            ("homing.tolerance", self.homing.tolerance),
        ];
        for (name, value) in delays {
            if !value.is_finite() || value < 0.0 {
                return Err(ReshuffleError::InvalidSettings(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.orbit.max_angular_speed < self.orbit.min_angular_speed {
            return Err(ReshuffleError::InvalidSettings(
                "orbit.max_angular_speed is below orbit.min_angular_speed".to_string(),
            ));
        }
        if self.variant_suffix.is_empty() {
            return Err(ReshuffleError::InvalidSettings(
                "variant_suffix must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a symbol name carries the variant tag
    pub fn is_variant(&self, name: &str) -> bool {
        name.ends_with(self.variant_suffix.as_str())
    }

    /// Visual offset for a directed destination
    pub fn symbol_offset(&self, name: &str) -> Vec2 {
        self.symbol_offsets.get(name).copied().unwrap_or(Vec2::ZERO)
    }

    /// Scale a presentation delay by the pacing preset
    pub fn paced(&self, seconds: f32) -> f32 {
        seconds * self.pacing.time_scale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings =
            ReshuffleSettings::from_json(r#"{ "seed": 7, "homing": { "tolerance": 4.0 } }"#)
                .unwrap();
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.homing.tolerance, 4.0);
        assert_eq!(settings.homing.max_search_time, 2.0);
        assert_eq!(settings.variant_suffix, "_TRANSFORMING");
    }

    #[test]
    fn test_negative_delay_rejected() {
        let err = ReshuffleSettings::from_json(r#"{ "pickup_settle": -1.0 }"#).unwrap_err();
        assert!(matches!(err, ReshuffleError::InvalidSettings(_)));
    }

    #[test]
    fn test_symbol_offsets_from_json() {
        let settings = ReshuffleSettings::from_json(
            r#"{ "symbol_offsets": { "WILD_TRANSFORMING": [0.0, 12.5] } }"#,
        )
        .unwrap();
        assert_eq!(settings.symbol_offset("WILD_TRANSFORMING"), Vec2::new(0.0, 12.5));
        assert_eq!(settings.symbol_offset("A"), Vec2::ZERO);
    }

    #[test]
    fn test_json_round_trip() {
        let mut settings = ReshuffleSettings::from_preset(PacingPreset::Relaxed);
        settings.seed = 99;
        settings.server_column_order = ColumnOrder::TopDown;
        settings
            .symbol_offsets
            .insert("WILD_TRANSFORMING".to_string(), Vec2::new(4.0, -8.0));

        let json = settings.to_json().unwrap();
        let loaded = ReshuffleSettings::from_json(&json).unwrap();
        assert_eq!(loaded.seed, 99);
        assert_eq!(loaded.pacing, PacingPreset::Relaxed);
        assert_eq!(loaded.server_column_order, ColumnOrder::TopDown);
        assert_eq!(loaded.symbol_offset("WILD_TRANSFORMING"), Vec2::new(4.0, -8.0));
    }

    #[test]
    fn test_sanitized_replaces_invalid_settings() {
        let settings = ReshuffleSettings {
            seed: 42,
            pickup_jitter: f32::INFINITY,
            ..ReshuffleSettings::default()
        };
        let sane = settings.sanitized();
        assert!(sane.validate().is_ok());
        assert_eq!(sane.seed, 42);
        assert_eq!(sane.pickup_jitter, ReshuffleSettings::default().pickup_jitter);

        let custom = ReshuffleSettings {
            pickup_settle: 0.1,
            ..ReshuffleSettings::default()
        };
        assert_eq!(custom.sanitized().pickup_settle, 0.1);
    }

    #[test]
    fn test_variant_detection() {
        let settings = ReshuffleSettings::default();
        assert!(settings.is_variant("WILD_TRANSFORMING"));
        assert!(!settings.is_variant("WILD"));
    }

    #[test]
    fn test_pacing_scales_delays() {
        let turbo = ReshuffleSettings::from_preset(PacingPreset::Turbo);
        assert_eq!(turbo.paced(1.0), 0.5);
        assert_eq!(PacingPreset::parse("FAST"), Some(PacingPreset::Turbo));
        assert_eq!(PacingPreset::parse("nope"), None);
    }
}
