//! Trajectory playback onto the visible die.
//!
//! A `Playback` is a small task object advanced once per scheduler tick. It
//! never suspends inside a pose application; dropping it cancels playback.

use serde::{Deserialize, Serialize};

use crate::pose::{Pose, Trajectory};
use crate::Real;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum PlaybackMode {
    /// One recorded pose per tick.
    #[serde(rename = "tick")]
    TickAccurate,
    /// The whole trajectory squeezed (or stretched) into `duration` seconds.
    #[serde(rename = "timed")]
    Timed { duration: Real },
}

/// Result of advancing a playback by one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    /// Pose to apply to the visible body this tick, if any.
    pub pose: Option<Pose>,
    /// Set exactly once, on the tick that applied the final pose.
    pub finished: bool,
}

#[derive(Clone, Debug)]
pub struct Playback {
    poses: Vec<Pose>,
    mode: PlaybackMode,
    index: usize,
    elapsed: Real,
    done: bool,
}

impl Playback {
    /// Copies the trajectory so later rolls cannot disturb a running playback.
    pub fn new(trajectory: &Trajectory, mode: PlaybackMode) -> Self {
        Self {
            poses: trajectory.as_slice().to_vec(),
            mode,
            index: 0,
            elapsed: 0.0,
            done: false,
        }
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn is_finished(&self) -> bool {
        self.done
    }

    pub fn elapsed(&self) -> Real {
        self.elapsed
    }

    /// Advance one tick of length `dt`.
    pub fn advance(&mut self, dt: Real) -> Frame {
        if self.done {
            return Frame {
                pose: None,
                finished: false,
            };
        }
        let Some(last) = self.poses.len().checked_sub(1) else {
            self.done = true;
            return Frame {
                pose: None,
                finished: true,
            };
        };

        let (index, finished) = match self.mode {
            PlaybackMode::TickAccurate => {
                let i = self.index.min(last);
                (i, i == last)
            }
            PlaybackMode::Timed { duration } => {
                if self.elapsed >= duration {
                    (last, true)
                } else {
                    (timed_index(self.elapsed, duration, self.poses.len()), false)
                }
            }
        };

        self.index = index + 1;
        self.elapsed += dt;
        self.done = finished;
        Frame {
            pose: Some(self.poses[index]),
            finished,
        }
    }
}

/// Pose index shown at `elapsed` seconds into a timed playback of `len`
/// poses lasting `duration`: `floor(elapsed / duration * (len - 1))`, clamped.
pub fn timed_index(elapsed: Real, duration: Real, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let last = len - 1;
    if duration <= 0.0 {
        return last;
    }
    let t = (elapsed / duration).max(0.0);
    ((t * last as Real).floor() as usize).min(last)
}
