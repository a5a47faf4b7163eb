//! Shadow die: a die's body in the isolated world plus the trajectory
//! recorded while predicting its roll.

use crate::face::{Face, FaceMap, RANDOM_FACE};
use crate::physics::{BodyHandle, PhysicsWorld};
use crate::pose::{Pose, Trajectory};
use crate::{Real, Vector3};

/// Velocity components below this count as zero.
pub const STATIONARY_EPS: Real = 1e-5;

#[derive(Debug)]
pub struct ShadowDie {
    body: BodyHandle,
    faces: FaceMap,
    trajectory: Trajectory,
    /// Set by `apply_impulse`, cleared once a simulation pass has run.
    primed: bool,
}

impl ShadowDie {
    pub(crate) fn new(body: BodyHandle, faces: FaceMap) -> Self {
        Self {
            body,
            faces,
            trajectory: Trajectory::new(),
            primed: false,
        }
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn faces(&self) -> &FaceMap {
        &self.faces
    }

    pub fn set_faces(&mut self, faces: FaceMap) {
        self.faces = faces;
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn is_primed(&self) -> bool {
        self.primed
    }

    pub(crate) fn clear_primed(&mut self) {
        self.primed = false;
    }

    /// Clear the trajectory and snap the body, kinematic, to `pose`.
    pub fn reset(&mut self, world: &mut PhysicsWorld, pose: Pose) {
        self.trajectory.clear();
        self.primed = false;
        world.set_kinematic(self.body, pose);
    }

    /// Turn the body dynamic and kick it. The next simulation pass picks it up.
    pub fn apply_impulse(&mut self, world: &mut PhysicsWorld, force: Vector3<Real>, torque: Vector3<Real>) {
        world.apply_impulse(self.body, force, torque);
        self.primed = true;
    }

    pub fn pose(&self, world: &PhysicsWorld) -> Option<Pose> {
        world.get(self.body).map(|b| b.pose())
    }

    pub fn record_step(&mut self, world: &PhysicsWorld) {
        if let Some(pose) = self.pose(world) {
            self.trajectory.push(pose);
        }
    }

    /// Zero linear and angular velocity on this tick. Not debounced.
    pub fn is_stationary(&self, world: &PhysicsWorld) -> bool {
        world.get(self.body).is_some_and(|b| {
            approx_zero(&b.rigid.velocity) && approx_zero(&b.rigid.angular_velocity)
        })
    }

    /// Face pointing up in the body's current orientation.
    pub fn resting_face(&self, world: &PhysicsWorld) -> i32 {
        self.up_face(world).map_or(RANDOM_FACE, |f| f.value)
    }

    /// The face entry itself; with aliased values its direction tells the
    /// copies apart.
    pub fn up_face(&self, world: &PhysicsWorld) -> Option<Face> {
        let body = world.get(self.body)?;
        self.faces.up_face(&body.rigid.orientation).copied()
    }

    /// Put the body back on the last recorded pose, at rest. A pass that ends
    /// on its tick budget has stepped once past the last capture.
    pub(crate) fn rewind(&mut self, world: &mut PhysicsWorld) {
        if let Some(&pose) = self.trajectory.last() {
            world.set_kinematic(self.body, pose);
        }
    }
}

fn approx_zero(v: &Vector3<Real>) -> bool {
    v.iter().all(|c| c.abs() <= STATIONARY_EPS)
}
