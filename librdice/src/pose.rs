//! Poses and recorded trajectories.

use serde::{Deserialize, Serialize};

use crate::{Isometry3, Point3, Real, Translation3, UnitQuaternion};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point3<Real>,
    pub orientation: UnitQuaternion<Real>,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Point3::origin(),
            orientation: UnitQuaternion::identity(),
        }
    }
}

impl Pose {
    pub fn new(position: Point3<Real>, orientation: UnitQuaternion<Real>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Unrotated pose at the given position.
    pub fn at(x: Real, y: Real, z: Real) -> Self {
        Self::new(Point3::new(x, y, z), UnitQuaternion::identity())
    }

    pub fn to_isometry(&self) -> Isometry3<Real> {
        Isometry3::from_parts(Translation3::from(self.position.coords), self.orientation)
    }
}

/// Poses captured once per shadow tick, oldest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectory {
    poses: Vec<Pose>,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            poses: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, pose: Pose) {
        self.poses.push(pose);
    }

    pub fn clear(&mut self) {
        self.poses.clear();
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Pose> {
        self.poses.get(index)
    }

    pub fn last(&self) -> Option<&Pose> {
        self.poses.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pose> {
        self.poses.iter()
    }

    pub fn as_slice(&self) -> &[Pose] {
        &self.poses
    }
}

impl From<Vec<Pose>> for Trajectory {
    fn from(poses: Vec<Pose>) -> Self {
        Self { poses }
    }
}
