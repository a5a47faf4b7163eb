//! Face map: which value sits on which outward direction of a die.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geometry::{shapes, Polyhedron};
use crate::{Real, UnitQuaternion, Vector3};

/// Value used for "no particular face": random rolls and empty face maps.
pub const RANDOM_FACE: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub value: i32,
    /// Outward direction in the die's local frame. Need not be normalized.
    pub direction: Vector3<Real>,
}

impl Face {
    pub fn new(value: i32, direction: Vector3<Real>) -> Self {
        Self { value, direction }
    }
}

/// Ordered list of faces. The same value may appear on several directions;
/// forced outcomes then pick one of them uniformly.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceMap {
    faces: Vec<Face>,
}

impl FaceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a face map from polyhedron face normals, `values[i]` labelling face `i`.
    /// Extra faces without a value are left out.
    pub fn from_polyhedron(poly: &Polyhedron, values: &[i32]) -> Result<Self> {
        let normals = poly.face_normals()?;
        Ok(Self {
            faces: normals
                .into_iter()
                .zip(values.iter())
                .map(|(n, &v)| Face::new(v, n))
                .collect(),
        })
    }

    /// Six-sided die, opposite faces summing to seven.
    pub fn standard_d6() -> Self {
        Self {
            faces: vec![
                Face::new(1, Vector3::x()),
                Face::new(6, -Vector3::x()),
                Face::new(2, Vector3::y()),
                Face::new(5, -Vector3::y()),
                Face::new(3, Vector3::z()),
                Face::new(4, -Vector3::z()),
            ],
        }
    }

    /// Face map for one of the standard shapes, numbered 1..=N in face order.
    pub fn standard(sides: u32) -> Option<(Self, Polyhedron)> {
        let poly = match sides {
            4 => shapes::tetrahedron(0.3),
            6 => return Some((Self::standard_d6(), shapes::cube(0.5))),
            8 => shapes::octahedron(0.7),
            _ => return None,
        };
        let values: Vec<i32> = (1..=sides as i32).collect();
        let mut map = Self::from_polyhedron(&poly, &values).ok()?;
        if sides == 4 {
            // a d4 rests on a face and is read at the apex opposite it
            for face in &mut map.faces {
                face.direction = -face.direction;
            }
        }
        Some((map, poly))
    }

    pub fn add_face(&mut self, value: i32, direction: Vector3<Real>) {
        self.faces.push(Face::new(value, direction));
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Face> {
        self.faces.iter()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn contains(&self, value: i32) -> bool {
        self.faces.iter().any(|f| f.value == value)
    }

    pub fn face_by_value(&self, value: i32) -> Option<&Face> {
        self.faces.iter().find(|f| f.value == value)
    }

    pub fn faces_by_value(&self, value: i32) -> Vec<&Face> {
        self.faces.iter().filter(|f| f.value == value).collect()
    }

    pub fn face_direction(&self, value: i32) -> Option<Vector3<Real>> {
        self.face_by_value(value).map(|f| f.direction)
    }

    /// Value of the face whose world-space direction points most along +Y.
    /// Ties keep the first face; an empty map yields `RANDOM_FACE`.
    pub fn resolve_up_face(&self, rotation: &UnitQuaternion<Real>) -> i32 {
        self.up_face(rotation).map_or(RANDOM_FACE, |f| f.value)
    }

    /// Same as `resolve_up_face` but returns the face itself.
    pub fn up_face(&self, rotation: &UnitQuaternion<Real>) -> Option<&Face> {
        let up = Vector3::y();
        let mut best: Option<&Face> = None;
        let mut best_dot = Real::NEG_INFINITY;
        for face in &self.faces {
            let d = (rotation * face.direction).dot(&up);
            if d > best_dot {
                best_dot = d;
                best = Some(face);
            }
        }
        best
    }
}
