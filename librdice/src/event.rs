use crate::table::DieId;

/// Notifications queued by the dice table; drained with `DiceTable::drain_events`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RollEvent {
    /// The shadow die stopped moving during prediction.
    Settled { die: DieId, tick: usize },
    /// Playback began; queued before the first pose is applied.
    RollStarted { die: DieId },
    /// Playback finished on `face`.
    RollEnded { die: DieId, face: i32 },
}

impl RollEvent {
    pub fn die(&self) -> DieId {
        match *self {
            RollEvent::Settled { die, .. } | RollEvent::RollStarted { die } | RollEvent::RollEnded { die, .. } => die,
        }
    }
}
