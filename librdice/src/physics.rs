//! Isolated rigid-body world used for shadow simulation.
//!
//! Semi-implicit integration, impulse contact solver against static
//! half-spaces, Coulomb friction, rolling resistance and sleep detection.
//! Bodies never collide with each other; a world holds only the dice of one
//! prediction pass and the static geometry they land on.

use crate::config::PhysicsConfig;
use crate::error::Result;
use crate::geometry::{MassProperties, Polyhedron};
use crate::pose::Pose;
use crate::{Matrix3, Point3, Quaternion, Real, Unit, UnitQuaternion, Vector3, EPS};

/// Closing speed below which contacts are treated as resting (no bounce).
const RESTING_SPEED: Real = 0.2;

/// Rigid-body data: mass, inverse mass, inverse inertia in body space, and state.
#[derive(Clone, Debug)]
pub struct RigidBody {
    pub mass: Real,
    pub inv_mass: Real,
    pub inv_inertia_body: Matrix3<Real>, // inverse inertia in body coords

    // state
    pub position: Point3<Real>,
    pub orientation: UnitQuaternion<Real>,
    pub velocity: Vector3<Real>,
    pub angular_velocity: Vector3<Real>,

    /// Kinematic bodies are placed externally and ignore gravity and contacts.
    pub kinematic: bool,
    pub asleep: bool,
    sleep_timer: Real,

    // material properties
    pub restitution: Real,
    pub static_friction: Real,
    pub dynamic_friction: Real,
    pub roll_resistance: Real,
}

impl RigidBody {
    fn from_mass_properties(props: &MassProperties) -> Self {
        Self {
            mass: props.mass,
            inv_mass: 1.0 / props.mass.max(EPS),
            inv_inertia_body: props.inv_inertia,
            position: Point3::origin(),
            orientation: UnitQuaternion::identity(),
            velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            kinematic: true,
            asleep: false,
            sleep_timer: 0.0,
            restitution: 0.25,
            static_friction: 0.6,
            dynamic_friction: 0.4,
            roll_resistance: 0.02,
        }
    }

    fn inv_inertia_world(&self) -> Matrix3<Real> {
        let binding = self.orientation.to_rotation_matrix();
        let r = binding.matrix();
        r * self.inv_inertia_body * r.transpose()
    }

    fn apply_impulse_at_point(&mut self, impulse: Vector3<Real>, contact_r: Vector3<Real>) {
        self.velocity += impulse * self.inv_mass;
        let inv_iw = self.inv_inertia_world();
        self.angular_velocity += inv_iw * contact_r.cross(&impulse);
    }

    fn wake(&mut self) {
        self.asleep = false;
        self.sleep_timer = 0.0;
    }
}

/// A body: rigid-body state plus its convex shape, re-centered on the centroid.
#[derive(Clone, Debug)]
pub struct Body {
    pub rigid: RigidBody,
    pub shape: Polyhedron,
}

impl Body {
    /// Build a body from a convex polyhedron and mass. The shape is shifted so
    /// its centroid sits at the body origin.
    pub fn new(mut shape: Polyhedron, mass: Real) -> Result<Self> {
        shape.validate()?;
        shape.face_normals()?;
        let props = MassProperties::of(&shape, mass)?;
        for v in &mut shape.vertices {
            *v -= props.centroid.coords;
        }
        Ok(Self {
            rigid: RigidBody::from_mass_properties(&props),
            shape,
        })
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.rigid.position, self.rigid.orientation)
    }

    /// World-space vertices.
    pub fn vertices_world(&self) -> Vec<Point3<Real>> {
        let r = self.rigid.orientation.to_rotation_matrix();
        self.shape
            .vertices
            .iter()
            .map(|p| self.rigid.position + r * p.coords)
            .collect()
    }
}

/// Static half-space `{ p : normal · p >= offset }`.
#[derive(Clone, Debug, PartialEq)]
pub struct HalfSpace {
    pub normal: Unit<Vector3<Real>>,
    pub offset: Real,
}

impl HalfSpace {
    pub fn new(normal: Vector3<Real>, offset: Real) -> Self {
        Self {
            normal: Unit::new_normalize(normal),
            offset,
        }
    }

    /// Signed distance, negative below the surface.
    fn distance(&self, p: &Point3<Real>) -> Real {
        self.normal.dot(&p.coords) - self.offset
    }
}

/// Generation-checked index of a body in a `PhysicsWorld`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle {
    index: u32,
    generation: u32,
}

struct Slot {
    generation: u32,
    body: Option<Body>,
}

pub struct PhysicsWorld {
    slots: Vec<Slot>,
    free: Vec<u32>,
    colliders: Vec<HalfSpace>,
    pub gravity: Vector3<Real>,
    pub substep: Real,
    pub solver_iters: usize,
    pub sleep_lin_eps: Real,
    pub sleep_ang_eps: Real,
    pub sleep_time_thresh: Real,
}

impl PhysicsWorld {
    pub fn new(cfg: &PhysicsConfig) -> Self {
        let [gx, gy, gz] = cfg.gravity;
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            colliders: Vec::new(),
            gravity: Vector3::new(gx, gy, gz),
            substep: cfg.substep,
            solver_iters: cfg.solver_iterations,
            sleep_lin_eps: cfg.sleep_linear,
            sleep_ang_eps: cfg.sleep_angular,
            sleep_time_thresh: cfg.sleep_time,
        }
    }

    pub fn insert(&mut self, body: Body) -> BodyHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.body = Some(body);
            return BodyHandle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            body: Some(body),
        });
        BodyHandle {
            index,
            generation: 0,
        }
    }

    pub fn remove(&mut self, handle: BodyHandle) -> Option<Body> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let body = slot.body.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        Some(body)
    }

    pub fn get(&self, handle: BodyHandle) -> Option<&Body> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.body.as_ref())
    }

    pub fn get_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.body.as_mut())
    }

    pub fn body_count(&self) -> usize {
        self.slots.iter().filter(|s| s.body.is_some()).count()
    }

    pub fn add_collider(&mut self, collider: HalfSpace) {
        self.colliders.push(collider);
    }

    pub fn clear_colliders(&mut self) {
        self.colliders.clear();
    }

    pub fn colliders(&self) -> &[HalfSpace] {
        &self.colliders
    }

    /// Make the body kinematic at `pose` with zero velocity.
    pub fn set_kinematic(&mut self, handle: BodyHandle, pose: Pose) {
        if let Some(body) = self.get_mut(handle) {
            let rb = &mut body.rigid;
            rb.kinematic = true;
            rb.wake();
            rb.position = pose.position;
            rb.orientation = pose.orientation;
            rb.velocity = Vector3::zeros();
            rb.angular_velocity = Vector3::zeros();
        }
    }

    /// Switch the body to dynamic and apply a linear and an angular impulse
    /// through its center of mass.
    pub fn apply_impulse(&mut self, handle: BodyHandle, force: Vector3<Real>, torque: Vector3<Real>) {
        if let Some(body) = self.get_mut(handle) {
            let rb = &mut body.rigid;
            rb.kinematic = false;
            rb.wake();
            rb.velocity += force * rb.inv_mass;
            rb.angular_velocity += rb.inv_inertia_world() * torque;
        }
    }

    /// Advance every awake dynamic body by `dt`, split into substeps.
    pub fn step(&mut self, dt: Real) {
        if dt <= 0.0 {
            return;
        }
        let n = (dt / self.substep).ceil().max(1.0) as usize;
        let h = dt / n as Real;
        for _ in 0..n {
            self.substep_once(h);
        }
    }

    fn substep_once(&mut self, dt: Real) {
        let gravity = self.gravity;
        let colliders = &self.colliders;
        for slot in &mut self.slots {
            let Some(body) = slot.body.as_mut() else {
                continue;
            };
            if body.rigid.kinematic || body.rigid.asleep {
                continue;
            }
            integrate(body, gravity, dt);

            for _iter in 0..self.solver_iters {
                for plane in colliders {
                    for c in detect_contacts(body, plane) {
                        resolve_contact_impulses(&mut body.rigid, &c);
                        positional_correction(body, &c);
                    }
                }
            }

            // rolling resistance torque -> angular damping
            let rb = &mut body.rigid;
            let inv_iw = rb.inv_inertia_world();
            let tau = -rb.angular_velocity * rb.roll_resistance * rb.mass;
            rb.angular_velocity += inv_iw * tau * dt;

            for plane in colliders {
                lift_out(body, plane);
            }

            let rb = &mut body.rigid;
            if rb.velocity.norm() < self.sleep_lin_eps && rb.angular_velocity.norm() < self.sleep_ang_eps {
                rb.sleep_timer += dt;
                if rb.sleep_timer >= self.sleep_time_thresh {
                    rb.velocity.fill(0.0);
                    rb.angular_velocity.fill(0.0);
                    rb.asleep = true;
                }
            } else {
                rb.sleep_timer = 0.0;
            }
        }
    }
}

// semi-implicit Euler; quaternion derivative q' = 0.5 * ω_quat * q
fn integrate(body: &mut Body, gravity: Vector3<Real>, dt: Real) {
    let rb = &mut body.rigid;
    rb.velocity += gravity * dt;
    rb.position += rb.velocity * dt;

    let w = rb.angular_velocity;
    let q = rb.orientation.quaternion();
    let dq = Quaternion::from_parts(0.0, w) * q * 0.5 * dt;
    rb.orientation = UnitQuaternion::new_normalize(q + dq);
}

/// Contact representation (single contact point from a clipped face polygon)
struct Contact {
    penetration: Real,     // positive if penetrating
    r: Vector3<Real>,      // vector from body position to contact point
    normal: Vector3<Real>, // plane normal, pointing out of the static geometry
}

/// Clip each face against the half-space boundary (Sutherland–Hodgman) and
/// emit one contact at the centroid of the part that lies below it.
fn detect_contacts(body: &Body, plane: &HalfSpace) -> Vec<Contact> {
    let mut contacts = Vec::new();
    let world = body.vertices_world();

    for face in &body.shape.faces {
        let poly: Vec<(Point3<Real>, Real)> = face
            .iter()
            .map(|&vi| (world[vi], plane.distance(&world[vi])))
            .collect();
        if poly.iter().all(|(_, d)| *d >= 0.0) {
            continue;
        }

        let mut clipped: Vec<(Point3<Real>, Real)> = Vec::with_capacity(poly.len() + 2);
        for i in 0..poly.len() {
            let (a, da) = poly[i];
            let (b, db) = poly[(i + 1) % poly.len()];
            let a_inside = da <= 0.0;
            let b_inside = db <= 0.0;
            if a_inside != b_inside {
                let t = da / (da - db);
                clipped.push((a + (b - a) * t, 0.0));
            }
            if b_inside {
                clipped.push((b, db));
            }
        }
        if clipped.is_empty() {
            continue;
        }

        let count = clipped.len() as Real;
        let centroid = clipped.iter().fold(Vector3::zeros(), |acc, (p, _)| acc + p.coords) / count;
        let avg_pen = clipped.iter().map(|(_, d)| -d).sum::<Real>() / count;

        contacts.push(Contact {
            penetration: avg_pen.max(0.0),
            r: centroid - body.rigid.position.coords,
            normal: plane.normal.into_inner(),
        });
    }

    contacts
}

/// Resolve normal + friction impulses for a single contact against static geometry.
fn resolve_contact_impulses(body: &mut RigidBody, c: &Contact) {
    let n = c.normal;
    let v_rel = body.velocity + body.angular_velocity.cross(&c.r);
    let vn = v_rel.dot(&n);

    // denominator: inv_mass + n·( (I^-1 * (r×n)) × r )
    let inv_i = body.inv_inertia_world();
    let angular = (inv_i * c.r.cross(&n)).cross(&c.r).dot(&n);
    let denom = body.inv_mass + angular;

    // restitution only for closing contacts fast enough to bounce
    let mut jn = 0.0;
    if vn < 0.0 {
        let e = if -vn < RESTING_SPEED { 0.0 } else { body.restitution };
        jn = (-(1.0 + e) * vn / denom.max(EPS)).max(0.0);
    }
    body.apply_impulse_at_point(n * jn, c.r);

    // friction impulse (Coulomb)
    let v_rel_post = body.velocity + body.angular_velocity.cross(&c.r);
    let vt = v_rel_post - n * v_rel_post.dot(&n);
    let vt_len = vt.norm();
    if vt_len > 1e-6 {
        let t = vt / vt_len;
        let ang_t = (inv_i * c.r.cross(&t)).cross(&c.r).dot(&t);
        let denom_t = body.inv_mass + ang_t;
        let jt = -v_rel_post.dot(&t) / denom_t.max(EPS);

        // clamp to Coulomb cone
        let max_static = body.static_friction * jn;
        let jf = if jt.abs() > max_static {
            -body.dynamic_friction * jn * jt.signum()
        } else {
            jt
        };
        body.apply_impulse_at_point(t * jf, c.r);
    }
}

/// Positional correction to reduce sinking (Baumgarte-like)
fn positional_correction(body: &mut Body, c: &Contact) {
    let percent = 0.2;
    let slop = 0.01 * body.shape.approx_scale();
    let corr_mag = (c.penetration - slop).max(0.0) * percent;
    if corr_mag <= 0.0 {
        return;
    }
    body.rigid.position += c.normal * corr_mag * body.rigid.inv_mass.min(1.0);
}

// push the deepest vertex back onto the surface and kill slow approach speed
fn lift_out(body: &mut Body, plane: &HalfSpace) {
    let min_d = body
        .vertices_world()
        .iter()
        .map(|v| plane.distance(v))
        .fold(Real::INFINITY, Real::min);
    if min_d < 0.0 {
        let n = plane.normal.into_inner();
        body.rigid.position += n * (-min_d + 1e-5);
        let vn = body.rigid.velocity.dot(&n);
        if vn < 0.0 && vn.abs() < 0.1 {
            body.rigid.velocity -= n * vn;
        }
    }
}
