//! Outcome reconciliation: the display-only rotation that turns the face a
//! shadow die actually settled on into the face the caller asked for.
//!
//! With `R` the settled body rotation, `a` the direction of the face that
//! ended up on top and `t` the direction of the requested face, the display
//! offset `G` satisfies `G·t = a`, so `R·G·t = R·a` points up.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::face::{Face, FaceMap};
use crate::{Real, Unit, UnitQuaternion, Vector3};

const PARALLEL_EPS: Real = 1e-6;

/// Rotation taking direction `target` onto direction `actual`.
///
/// When the two are anti-parallel the cross product gives no axis; a half
/// turn about `right × actual` (vertical `actual`) or `up × actual`
/// (otherwise) is used instead. Parallel directions need no rotation.
pub fn correction_rotation(actual: &Vector3<Real>, target: &Vector3<Real>) -> UnitQuaternion<Real> {
    let (Some(a), Some(t)) = (actual.try_normalize(PARALLEL_EPS), target.try_normalize(PARALLEL_EPS)) else {
        return UnitQuaternion::identity();
    };

    let axis = t.cross(&a);
    match Unit::try_new(axis, PARALLEL_EPS) {
        Some(axis) => UnitQuaternion::from_axis_angle(&axis, t.angle(&a)),
        None if a.dot(&t) > 0.0 => UnitQuaternion::identity(),
        None => UnitQuaternion::from_axis_angle(&fallback_axis(&a), std::f32::consts::PI),
    }
}

/// Axis perpendicular to `dir` for half-turn corrections.
pub fn fallback_axis(dir: &Vector3<Real>) -> Unit<Vector3<Real>> {
    let d = dir.normalize();
    let vertical = 1.0 - d.dot(&Vector3::y()).abs() < 1e-4;
    let axis = if vertical {
        Vector3::x().cross(&d)
    } else {
        Vector3::y().cross(&d)
    };
    Unit::new_normalize(axis)
}

/// Display correction for a die that settled with face `actual` on top when
/// `desired` was requested. A target face is picked uniformly among the faces
/// carrying `desired`. Returns `None` when `desired` is absent from the map.
///
/// `actual` must be the face that is physically up, not merely one carrying
/// the same value: with aliased values the directions differ.
pub fn random_correction<R: Rng + ?Sized>(
    faces: &FaceMap,
    actual: &Face,
    desired: i32,
    rng: &mut R,
) -> Option<UnitQuaternion<Real>> {
    correction_with(faces, actual, desired, |candidates| candidates.choose(rng).copied())
}

/// Like `random_correction` but always targets the first face carrying `desired`.
pub fn first_face_correction(faces: &FaceMap, actual: &Face, desired: i32) -> Option<UnitQuaternion<Real>> {
    correction_with(faces, actual, desired, |candidates| candidates.first().copied())
}

fn correction_with<'a, F>(faces: &'a FaceMap, actual: &Face, desired: i32, pick: F) -> Option<UnitQuaternion<Real>>
where
    F: FnOnce(&[&'a Face]) -> Option<&'a Face>,
{
    if actual.value == desired {
        return Some(UnitQuaternion::identity());
    }
    let candidates = faces.faces_by_value(desired);
    let target = pick(&candidates)?;
    Some(correction_rotation(&actual.direction, &target.direction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn close(a: &Vector3<Real>, b: &Vector3<Real>) -> bool {
        (a - b).norm() < 1e-5
    }

    #[test]
    fn quarter_turn_between_perpendicular_faces() {
        let g = correction_rotation(&Vector3::y(), &Vector3::x());
        assert!(close(&(g * Vector3::x()), &Vector3::y()));
        assert!((g.angle() - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn antipodal_faces_use_half_turn_about_fallback_axis() {
        // +Z settled up, -Z requested
        let g = correction_rotation(&Vector3::z(), &-Vector3::z());
        let axis = g.axis().expect("axis");
        // up × +Z = +X
        assert!(axis.dot(&Vector3::x()).abs() > 1.0 - 1e-5);
        assert!((g.angle() - std::f32::consts::PI).abs() < 1e-5);
        assert!(close(&(g * -Vector3::z()), &Vector3::z()));
    }

    #[test]
    fn vertical_antipodes_use_right_axis() {
        let g = correction_rotation(&Vector3::y(), &-Vector3::y());
        let axis = g.axis().expect("axis");
        // right × +Y = +Z
        assert!(axis.dot(&Vector3::z()).abs() > 1.0 - 1e-5);
        assert!(close(&(g * -Vector3::y()), &Vector3::y()));
    }

    #[test]
    fn parallel_faces_need_no_rotation() {
        let g = correction_rotation(&Vector3::x(), &(Vector3::x() * 3.0));
        assert_eq!(g, UnitQuaternion::identity());
    }

    #[test]
    fn missing_desired_value_yields_none() {
        let faces = FaceMap::standard_d6();
        let top = Face::new(2, Vector3::y());
        let mut rng = StdRng::seed_from_u64(1);
        assert!(random_correction(&faces, &top, 9, &mut rng).is_none());
        assert_eq!(first_face_correction(&faces, &top, 2), Some(UnitQuaternion::identity()));
    }

    #[test]
    fn first_face_correction_is_deterministic() {
        let mut faces = FaceMap::new();
        faces.add_face(1, Vector3::y());
        faces.add_face(4, Vector3::x());
        faces.add_face(4, Vector3::z());
        let g = first_face_correction(&faces, &faces.faces()[0], 4).expect("correction");
        assert!(close(&(g * Vector3::x()), &Vector3::y()));
    }

    #[test]
    fn aliased_top_face_uses_its_own_direction() {
        // value 4 on +X and +Y; the die rests with the second one up
        let mut faces = FaceMap::new();
        faces.add_face(4, Vector3::x());
        faces.add_face(4, Vector3::y());
        faces.add_face(1, -Vector3::y());
        let top = *faces.up_face(&UnitQuaternion::identity()).expect("top face");
        assert_eq!(top.direction, Vector3::y());

        let g = first_face_correction(&faces, &top, 1).expect("correction");
        assert!(close(&(g * -Vector3::y()), &Vector3::y()));
        assert_eq!(faces.resolve_up_face(&g), 1);
    }
}
