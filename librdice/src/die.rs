//! Per-die record and roll lifecycle.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DiceError, Result};
use crate::face::{Face, FaceMap, RANDOM_FACE};
use crate::geometry::Polyhedron;
use crate::playback::{Playback, PlaybackMode};
use crate::pose::Pose;
use crate::reconcile;
use crate::shadow::ShadowDie;
use crate::table::DieId;
use crate::world::ShadowWorld;
use crate::{Isometry3, Real, Translation3, UnitQuaternion, Vector3};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DieState {
    Idle,
    /// Impulse applied to the shadow, prediction pending.
    Rolling,
    /// Prediction done and display correction applied.
    Reconciled,
    Playing,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RollRequest {
    /// Requested face value, `RANDOM_FACE` to keep whatever the physics gives.
    pub face: i32,
    pub force: Vector3<Real>,
    pub torque: Vector3<Real>,
}

impl Default for RollRequest {
    fn default() -> Self {
        Self::random(Vector3::zeros(), Vector3::zeros())
    }
}

impl RollRequest {
    pub fn random(force: Vector3<Real>, torque: Vector3<Real>) -> Self {
        Self {
            face: RANDOM_FACE,
            force,
            torque,
        }
    }

    pub fn forced(face: i32, force: Vector3<Real>, torque: Vector3<Real>) -> Self {
        Self { face, force, torque }
    }

    pub fn is_random(&self) -> bool {
        self.face == RANDOM_FACE
    }
}

/// A die: visible body pose, display-only rotation offset, and its shadow.
///
/// `body` is what playback drives; `graphic` is applied on top of it when
/// the die is drawn and is the only thing reconciliation touches.
#[derive(Debug)]
pub(crate) struct Die {
    pub faces: FaceMap,
    pub shape: Polyhedron,
    pub mass: Real,
    pub body: Pose,
    pub graphic: UnitQuaternion<Real>,
    pub shadow: Option<ShadowDie>,
    pub request: RollRequest,
    pub enabled: bool,
    pub state: DieState,
    pub playback: Option<Playback>,
    /// Face reported when playback ends.
    pub resolved: i32,
}

impl Die {
    pub fn new(faces: FaceMap, shape: Polyhedron, mass: Real, body: Pose) -> Self {
        Self {
            faces,
            shape,
            mass,
            body,
            graphic: UnitQuaternion::identity(),
            shadow: None,
            request: RollRequest::default(),
            enabled: true,
            state: DieState::Idle,
            playback: None,
            resolved: RANDOM_FACE,
        }
    }

    /// The shadow die, spawned into `world` if this die does not have one yet.
    pub fn ensure_shadow(&mut self, id: DieId, world: &mut ShadowWorld) -> Result<&mut ShadowDie> {
        let shadow = match self.shadow.take() {
            Some(shadow) => shadow,
            None => world.spawn(id, self.faces.clone(), self.shape.clone(), self.mass, self.body)?,
        };
        Ok(self.shadow.insert(shadow))
    }

    /// Prime the shadow with the request. Cancels any running playback; the
    /// visible body stays on its last applied pose.
    pub fn roll(&mut self, id: DieId, world: &mut ShadowWorld, request: RollRequest) -> Result<()> {
        match self.state {
            DieState::Idle | DieState::Playing => {}
            state => {
                return Err(DiceError::InvalidState {
                    die: id,
                    op: "roll",
                    state,
                })
            }
        }
        if self.playback.take().is_some() {
            log::debug!("die {id}: playback cancelled by new roll");
        }

        let pose = self.body;
        let shadow = self.ensure_shadow(id, world)?;
        shadow.reset(world.physics_mut(), pose);
        shadow.apply_impulse(world.physics_mut(), request.force, request.torque);

        self.request = request;
        self.state = DieState::Rolling;
        Ok(())
    }

    /// Compare the shadow's resting face with the request and set the
    /// display correction. Always ends in `Reconciled`; a requested face the
    /// map does not contain leaves the actual face in place and is reported.
    pub fn reconcile<R: Rng + ?Sized>(&mut self, id: DieId, world: &ShadowWorld, rng: &mut R) -> Result<()> {
        self.graphic = UnitQuaternion::identity();
        self.state = DieState::Reconciled;
        let top = self.top_face(world);
        self.resolved = top.map_or(RANDOM_FACE, |f| f.value);
        if self.request.is_random() {
            return Ok(());
        }

        let desired = self.request.face;
        let correction = top.and_then(|f| reconcile::random_correction(&self.faces, &f, desired, rng));
        match correction {
            Some(correction) => {
                self.graphic = correction;
                self.resolved = desired;
                Ok(())
            }
            None => Err(DiceError::FaceNotInMap {
                die: id,
                face: desired,
                actual: self.resolved,
            }),
        }
    }

    /// Force the displayed outcome to the first face carrying `value`.
    pub fn set_outcome(&mut self, id: DieId, world: &ShadowWorld, value: i32) -> Result<()> {
        if self.state == DieState::Rolling {
            return Err(DiceError::InvalidState {
                die: id,
                op: "set outcome",
                state: self.state,
            });
        }
        self.graphic = UnitQuaternion::identity();
        let top = self.top_face(world);
        self.resolved = top.map_or(RANDOM_FACE, |f| f.value);
        let correction = top
            .and_then(|f| reconcile::first_face_correction(&self.faces, &f, value))
            .ok_or(DiceError::FaceNotInMap {
                die: id,
                face: value,
                actual: self.resolved,
            })?;
        self.graphic = correction;
        self.resolved = value;
        Ok(())
    }

    pub fn play(&mut self, id: DieId, mode: PlaybackMode) -> Result<()> {
        if self.state != DieState::Reconciled {
            return Err(DiceError::InvalidState {
                die: id,
                op: "play",
                state: self.state,
            });
        }
        let Some(shadow) = self.shadow.as_ref() else {
            return Err(DiceError::InvalidState {
                die: id,
                op: "play without a shadow",
                state: self.state,
            });
        };
        self.playback = Some(Playback::new(shadow.trajectory(), mode));
        self.state = DieState::Playing;
        Ok(())
    }

    /// Advance playback one tick. Returns the resolved face when it finishes.
    pub fn advance(&mut self, dt: Real) -> Option<i32> {
        let frame = self.playback.as_mut()?.advance(dt);
        if let Some(pose) = frame.pose {
            self.body = pose;
        }
        if !frame.finished {
            return None;
        }
        self.playback = None;
        self.state = DieState::Idle;
        Some(self.resolved)
    }

    /// Drop the shadow and any in-flight roll, e.g. when the world goes away.
    pub fn detach_shadow(&mut self) -> Option<ShadowDie> {
        self.playback = None;
        self.state = DieState::Idle;
        self.shadow.take()
    }

    pub fn display_rotation(&self) -> UnitQuaternion<Real> {
        self.body.orientation * self.graphic
    }

    pub fn display_transform(&self) -> Isometry3<Real> {
        self.body.to_isometry() * Isometry3::from_parts(Translation3::identity(), self.graphic)
    }

    /// Face shown on top, taking the display correction into account.
    pub fn face_looking_up(&self) -> i32 {
        self.faces.resolve_up_face(&self.display_rotation())
    }

    /// Face entry physically on top of the shadow, as last captured.
    fn top_face(&self, world: &ShadowWorld) -> Option<Face> {
        self.shadow.as_ref()?.up_face(world.physics())
    }
}
