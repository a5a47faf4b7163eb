//! Error type shared by the engine crate.

use thiserror::Error;

use crate::die::DieState;
use crate::table::DieId;

pub type Result<T> = std::result::Result<T, DiceError>;

#[derive(Error, Debug)]
pub enum DiceError {
    /// No die is registered under this id (never created, or destroyed)
    #[error("unknown die {0}")]
    UnknownDie(DieId),

    /// Operation not allowed from the die's current lifecycle state
    #[error("die {die}: cannot {op} while {state:?}")]
    InvalidState {
        die: DieId,
        op: &'static str,
        state: DieState,
    },

    /// Requested outcome has no face in the die's face map
    #[error("die {die}: face value {face} is not in the face map (settled on {actual})")]
    FaceNotInMap { die: DieId, face: i32, actual: i32 },

    /// Polyhedron rejected by validation or mass-property computation
    #[error("invalid geometry: {0}")]
    InvalidGeometry(&'static str),

    /// Configuration value outside its accepted range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
