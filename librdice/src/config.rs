//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! simulation_speed = 2.0
//! max_iterations = 300
//! stationary_ticks = 4
//! playback = { mode = "timed", duration = 1.0 }
//!
//! [[colliders]]
//! name = "floor"
//! normal = [0.0, 1.0, 0.0]
//! offset = 0.0
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DiceError, Result};
use crate::playback::PlaybackMode;
use crate::Real;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiceConfig {
    /// Length of one shadow tick and one playback tick, in seconds.
    pub fixed_timestep: Real,
    /// Multiplier on the shadow world's timestep. Only changes how many
    /// ticks a roll needs to settle.
    pub simulation_speed: Real,
    /// Tick budget for one prediction pass.
    pub max_iterations: usize,
    /// Consecutive zero-velocity ticks required before a die counts as settled.
    pub stationary_ticks: u32,
    pub playback: PlaybackMode,
    /// Seed for alias-face selection; OS entropy when absent.
    pub seed: Option<u64>,
    pub physics: PhysicsConfig,
    /// Static geometry imported into the shadow world when it is created.
    pub colliders: Vec<ColliderConfig>,
}

impl Default for DiceConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 0.02,
            simulation_speed: 1.0,
            max_iterations: 300,
            stationary_ticks: 4,
            playback: PlaybackMode::TickAccurate,
            seed: None,
            physics: PhysicsConfig::default(),
            colliders: vec![ColliderConfig::floor()],
        }
    }
}

impl DiceConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: DiceConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fixed_timestep > 0.0) {
            return Err(DiceError::InvalidConfig(format!(
                "fixed_timestep must be positive, got {}",
                self.fixed_timestep
            )));
        }
        if !(self.simulation_speed >= 0.001) {
            return Err(DiceError::InvalidConfig(format!(
                "simulation_speed must be at least 0.001, got {}",
                self.simulation_speed
            )));
        }
        if let PlaybackMode::Timed { duration } = self.playback {
            if !(duration >= 0.001) {
                return Err(DiceError::InvalidConfig(format!(
                    "playback duration must be at least 0.001, got {duration}"
                )));
            }
        }
        if !(self.physics.substep > 0.0) {
            return Err(DiceError::InvalidConfig("physics.substep must be positive".into()));
        }
        for c in &self.colliders {
            let [x, y, z] = c.normal;
            if x * x + y * y + z * z < 1e-12 {
                return Err(DiceError::InvalidConfig(format!(
                    "collider {:?} has a zero normal",
                    c.name
                )));
            }
        }
        Ok(())
    }

    /// Time the shadow world advances per tick.
    pub fn shadow_timestep(&self) -> Real {
        self.fixed_timestep * self.simulation_speed
    }
}

/// Solver tuning for the isolated world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: [Real; 3],
    /// Longest internal integration step; ticks are split into substeps.
    pub substep: Real,
    pub solver_iterations: usize,
    pub sleep_linear: Real,
    pub sleep_angular: Real,
    /// Seconds below the sleep thresholds before a body is put to rest.
    pub sleep_time: Real,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
            substep: 1.0 / 240.0,
            solver_iterations: 8,
            sleep_linear: 0.02,
            sleep_angular: 0.5,
            sleep_time: 0.5,
        }
    }
}

/// A static half-space `{ p : normal · p >= offset }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColliderConfig {
    pub name: String,
    pub normal: [Real; 3],
    #[serde(default)]
    pub offset: Real,
    /// Name of an owning object. Parented geometry has no unambiguous world
    /// transform and is not imported.
    #[serde(default)]
    pub parent: Option<String>,
}

impl ColliderConfig {
    pub fn floor() -> Self {
        Self {
            name: "floor".to_string(),
            normal: [0.0, 1.0, 0.0],
            offset: 0.0,
            parent: None,
        }
    }

    /// Plane `normal · p = offset`; bodies stay on the `normal` side.
    pub fn wall(name: &str, normal: [Real; 3], offset: Real) -> Self {
        Self {
            name: name.to_string(),
            normal,
            offset,
            parent: None,
        }
    }
}
