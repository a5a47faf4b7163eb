//! Convex polyhedron geometry: validation, face normals, mass properties and
//! the standard die shapes.

use crate::error::{DiceError, Result};
use crate::{Matrix3, Point3, Real, Vector3};

/// Polyhedron: vertices and faces (faces are lists of vertex indices).
/// Faces must be CCW when viewed from outside for consistent volume sign.
#[derive(Clone, Debug)]
pub struct Polyhedron {
    pub vertices: Vec<Point3<Real>>,
    pub faces: Vec<Vec<usize>>,
}

impl Polyhedron {
    pub fn validate(&self) -> Result<()> {
        if self.faces.is_empty() {
            return Err(DiceError::InvalidGeometry("no faces"));
        }
        if self.faces.len() >= 255 {
            return Err(DiceError::InvalidGeometry("face count must be < 255"));
        }
        if self.vertices.is_empty() {
            return Err(DiceError::InvalidGeometry("no vertices"));
        }
        for f in &self.faces {
            if f.len() < 3 {
                return Err(DiceError::InvalidGeometry("face with fewer than 3 vertices"));
            }
            if f.iter().any(|&i| i >= self.vertices.len()) {
                return Err(DiceError::InvalidGeometry("face index out of bounds"));
            }
        }
        Ok(())
    }

    /// Outward unit normals in body space, one per face.
    pub fn face_normals(&self) -> Result<Vec<Vector3<Real>>> {
        let mut normals = Vec::with_capacity(self.faces.len());
        for f in &self.faces {
            let a = self.vertices[f[0]];
            let b = self.vertices[f[1]];
            let c = self.vertices[f[2]];
            let n = (b - a).cross(&(c - a));
            if n.norm_squared() < 1e-12 {
                return Err(DiceError::InvalidGeometry("degenerate face"));
            }
            normals.push(n.normalize());
        }
        Ok(normals)
    }

    /// Max vertex distance from the vertex average.
    pub fn approx_scale(&self) -> Real {
        let mut centroid = Vector3::zeros();
        for v in &self.vertices {
            centroid += v.coords;
        }
        centroid /= self.vertices.len() as Real;
        let mut maxd: Real = 0.0;
        for v in &self.vertices {
            maxd = maxd.max((v.coords - centroid).norm());
        }
        maxd.max(1e-3)
    }
}

/// Mass, centroid and inverse inertia (body space, about the centroid)
/// for a polyhedron of the given total mass.
#[derive(Clone, Debug)]
pub struct MassProperties {
    pub mass: Real,
    pub centroid: Point3<Real>,
    pub inv_inertia: Matrix3<Real>,
}

impl MassProperties {
    pub fn of(poly: &Polyhedron, mass: Real) -> Result<Self> {
        let (volume, centroid, inertia_unit) = volume_integrals(poly)?;

        let density = mass / volume.abs();
        let inertia = inertia_unit * density;

        // parallel-axis shift to the centroid
        let c = centroid.coords;
        let inertia_cm = inertia - Matrix3::identity() * (mass * c.dot(&c)) + c * c.transpose() * mass;

        let inv_inertia = match inertia_cm.try_inverse() {
            Some(inv) => inv,
            None => {
                log::warn!("singular inertia tensor, using a stiff diagonal fallback");
                Matrix3::identity() * 1e6
            }
        };

        Ok(Self {
            mass,
            centroid,
            inv_inertia,
        })
    }
}

// Fan-triangulates every face and sums the tetrahedra (origin, v0, vi, vi+1).
// Exact for closed convex polyhedra; inertia is about the origin at unit density.
fn volume_integrals(poly: &Polyhedron) -> Result<(Real, Point3<Real>, Matrix3<Real>)> {
    let mut vol_acc: Real = 0.0;
    let mut c_acc = Vector3::zeros();
    let mut inertia = Matrix3::zeros();

    for face in &poly.faces {
        let v0 = poly.vertices[face[0]].coords;
        for i in 1..(face.len() - 1) {
            let v1 = poly.vertices[face[i]].coords;
            let v2 = poly.vertices[face[i + 1]].coords;
            let vol = v0.dot(&v1.cross(&v2)) / 6.0;
            vol_acc += vol;
            c_acc += (v0 + v1 + v2) / 4.0 * vol;

            // second moments of a tetrahedron with one vertex at the origin:
            // ∫ a·b dV = V/20 · (Σ a_i b_i + Σ a_i · Σ b_i)
            let verts = [v0, v1, v2];
            let sum = v0 + v1 + v2;
            let mut m = Matrix3::zeros();
            for r in 0..3 {
                for c in 0..3 {
                    let own: Real = verts.iter().map(|v| v[r] * v[c]).sum();
                    m[(r, c)] = vol / 20.0 * (own + sum[r] * sum[c]);
                }
            }
            inertia[(0, 0)] += m[(1, 1)] + m[(2, 2)];
            inertia[(1, 1)] += m[(2, 2)] + m[(0, 0)];
            inertia[(2, 2)] += m[(0, 0)] + m[(1, 1)];
            inertia[(0, 1)] -= m[(0, 1)];
            inertia[(1, 0)] -= m[(1, 0)];
            inertia[(1, 2)] -= m[(1, 2)];
            inertia[(2, 1)] -= m[(2, 1)];
            inertia[(0, 2)] -= m[(0, 2)];
            inertia[(2, 0)] -= m[(2, 0)];
        }
    }

    if vol_acc.abs() < 1e-12 {
        return Err(DiceError::InvalidGeometry("zero-volume polyhedron"));
    }
    Ok((vol_acc, Point3::from(c_acc / vol_acc), inertia))
}

/// Standard die shapes centered at the origin.
pub mod shapes {
    use super::Polyhedron;
    use crate::{Point3, Real};

    /// Regular tetrahedron with vertices at distance `r * sqrt(3)` from the center.
    pub fn tetrahedron(r: Real) -> Polyhedron {
        let vertices = vec![
            Point3::new(r, r, r),
            Point3::new(r, -r, -r),
            Point3::new(-r, r, -r),
            Point3::new(-r, -r, r),
        ];
        let faces = vec![vec![0, 1, 2], vec![0, 3, 1], vec![0, 2, 3], vec![1, 3, 2]];
        Polyhedron { vertices, faces }
    }

    /// Cube with half extent `h`. Face order: -Z, +Z, -Y, +Y, +X, -X.
    pub fn cube(h: Real) -> Polyhedron {
        let vertices = vec![
            Point3::new(-h, -h, -h),
            Point3::new(h, -h, -h),
            Point3::new(h, h, -h),
            Point3::new(-h, h, -h),
            Point3::new(-h, -h, h),
            Point3::new(h, -h, h),
            Point3::new(h, h, h),
            Point3::new(-h, h, h),
        ];
        let faces = vec![
            vec![0, 3, 2, 1], // -Z
            vec![4, 5, 6, 7], // +Z
            vec![0, 1, 5, 4], // -Y
            vec![2, 3, 7, 6], // +Y
            vec![1, 2, 6, 5], // +X
            vec![0, 4, 7, 3], // -X
        ];
        Polyhedron { vertices, faces }
    }

    /// Octahedron with vertices at distance `r` along each axis.
    pub fn octahedron(r: Real) -> Polyhedron {
        let vertices = vec![
            Point3::new(r, 0.0, 0.0),
            Point3::new(-r, 0.0, 0.0),
            Point3::new(0.0, r, 0.0),
            Point3::new(0.0, -r, 0.0),
            Point3::new(0.0, 0.0, r),
            Point3::new(0.0, 0.0, -r),
        ];
        let faces = vec![
            vec![0, 2, 4],
            vec![0, 5, 2],
            vec![0, 3, 5],
            vec![0, 4, 3],
            vec![1, 4, 2],
            vec![1, 2, 5],
            vec![1, 5, 3],
            vec![1, 3, 4],
        ];
        Polyhedron { vertices, faces }
    }
}
