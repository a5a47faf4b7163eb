//! librdice: rigged dice on top of a small convex-polyhedron rigid-body solver.
//!
//! A roll is simulated first in an isolated shadow world, recorded pose by pose,
//! and only then replayed onto the visible die. When the caller asked for a
//! specific face, the displayed mesh is rotated once, up front, so the replayed
//! tumble ends on that face. The recorded physics motion is never touched.
//!
//! - `physics`: impulse solver, static half-space colliders, sleep detection
//! - `face`: face values mapped to local outward directions, face-up resolution
//! - `shadow` / `world`: shadow dice and the manager driving the prediction pass
//! - `playback`: tick-accurate or time-compressed trajectory replay
//! - `table`: per-die lifecycle (roll, predict, play) behind stable `DieId`s
//!
//! Example (single die, forced outcome):
//!
//! ```ignore
//! let mut table = DiceTable::new(DiceConfig::default())?;
//! let id = table.create_die(FaceMap::standard_d6(), shapes::cube(0.5), 0.17, Pose::at(0.0, 1.0, 0.0))?;
//! table.roll(id, RollRequest::forced(6, force, torque))?;
//! table.run_prediction();
//! table.play(id)?;
//! while table.tick(dt) { /* render table.display_transform(id) */ }
//! ```

pub use nalgebra::{Isometry3, Matrix3, Point3, Quaternion, Translation3, Unit, UnitQuaternion, Vector3};

pub mod config;
pub mod error;
pub mod event;
pub mod face;
pub mod geometry;
pub mod physics;
pub mod playback;
pub mod pose;
pub mod reconcile;
pub mod shadow;
pub mod table;
pub mod world;

mod die;

pub use config::{ColliderConfig, DiceConfig, PhysicsConfig};
pub use die::{DieState, RollRequest};
pub use error::{DiceError, Result};
pub use event::RollEvent;
pub use face::{Face, FaceMap, RANDOM_FACE};
pub use geometry::{shapes, Polyhedron};
pub use playback::{Playback, PlaybackMode};
pub use pose::{Pose, Trajectory};
pub use table::{DiceTable, DieId, PredictionReport};
pub use world::{ShadowWorld, SimulationReport};

pub type Real = f32;
const EPS: Real = 1e-6;
