//! Shadow world manager: owns the isolated physics world, tracks which dice
//! take part in prediction and runs the bounded simulation pass.

use std::collections::BTreeSet;

use crate::config::{ColliderConfig, DiceConfig};
use crate::error::Result;
use crate::face::FaceMap;
use crate::geometry::Polyhedron;
use crate::physics::{Body, HalfSpace, PhysicsWorld};
use crate::pose::Pose;
use crate::shadow::ShadowDie;
use crate::table::DieId;
use crate::{Real, Vector3};

/// Outcome of one `run_simulation` pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulationReport {
    /// Ticks the world was advanced.
    pub ticks: usize,
    /// Dice that settled, with the tick on which they were declared stationary.
    pub settled: Vec<(DieId, usize)>,
    /// Dice still moving when the iteration budget ran out.
    pub unsettled: Vec<DieId>,
}

impl SimulationReport {
    /// True when no die took part in the pass.
    pub fn is_noop(&self) -> bool {
        self.ticks == 0 && self.settled.is_empty() && self.unsettled.is_empty()
    }
}

pub struct ShadowWorld {
    physics: PhysicsWorld,
    registered: BTreeSet<DieId>,
    colliders: Vec<ColliderConfig>,
    simulating: bool,
    timestep: Real,
    max_iterations: usize,
    stationary_ticks: u32,
}

struct Participant<'a> {
    id: DieId,
    shadow: &'a mut ShadowDie,
    still_ticks: u32,
    settled: bool,
}

impl ShadowWorld {
    pub fn new(cfg: &DiceConfig) -> Self {
        let mut world = Self {
            physics: PhysicsWorld::new(&cfg.physics),
            registered: BTreeSet::new(),
            colliders: Vec::new(),
            simulating: false,
            timestep: cfg.shadow_timestep(),
            max_iterations: cfg.max_iterations,
            stationary_ticks: cfg.stationary_ticks,
        };
        world.import_colliders(&cfg.colliders);
        world
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.physics
    }

    /// True only inside `run_simulation`. Callers holding `&mut self` can
    /// never observe it set; the flag guards re-entry from code running
    /// inside the pass, while plain concurrent calls are already excluded by
    /// the borrow checker.
    pub fn is_simulating(&self) -> bool {
        self.simulating
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Bring static geometry into the isolated world. Parented objects are
    /// skipped with a warning, objects already imported are ignored.
    pub fn import_colliders(&mut self, colliders: &[ColliderConfig]) {
        for c in colliders {
            if let Some(parent) = &c.parent {
                log::warn!(
                    "collider {:?} is parented to {:?}; parented geometry cannot be moved into the shadow world, skipping",
                    c.name,
                    parent
                );
                continue;
            }
            if self.colliders.iter().any(|known| known.name == c.name) {
                log::debug!("collider {:?} already imported", c.name);
                continue;
            }
            let [x, y, z] = c.normal;
            self.physics.add_collider(HalfSpace::new(Vector3::new(x, y, z), c.offset));
            self.colliders.push(c.clone());
        }
        log::debug!("shadow world holds {} static colliders", self.colliders.len());
    }

    /// Remove all static geometry from the isolated world and hand it back.
    pub fn export_colliders(&mut self) -> Vec<ColliderConfig> {
        self.physics.clear_colliders();
        std::mem::take(&mut self.colliders)
    }

    pub fn colliders(&self) -> &[ColliderConfig] {
        &self.colliders
    }

    /// Create the shadow body for a die at `pose` and register it.
    pub fn spawn(&mut self, id: DieId, faces: FaceMap, shape: Polyhedron, mass: Real, pose: Pose) -> Result<ShadowDie> {
        let body = Body::new(shape, mass)?;
        let handle = self.physics.insert(body);
        self.physics.set_kinematic(handle, pose);
        self.register(id);
        Ok(ShadowDie::new(handle, faces))
    }

    /// Unregister a die and drop its body from the isolated world.
    pub fn despawn(&mut self, id: DieId, shadow: ShadowDie) {
        self.unregister(id);
        self.physics.remove(shadow.body());
    }

    pub fn register(&mut self, id: DieId) {
        if !self.registered.insert(id) {
            log::trace!("die {id} already registered");
        }
    }

    pub fn unregister(&mut self, id: DieId) {
        self.registered.remove(&id);
    }

    pub fn is_registered(&self, id: DieId) -> bool {
        self.registered.contains(&id)
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    /// Advance every registered, freshly rolled shadow die until it settles or
    /// the tick budget runs out, recording one pose per die per tick before
    /// the world steps.
    ///
    /// Dice that were not rolled since the previous pass do not take part;
    /// with none rolled the call returns an empty report and records nothing.
    pub fn run_simulation<'a, I>(&mut self, dice: I) -> SimulationReport
    where
        I: IntoIterator<Item = (DieId, &'a mut ShadowDie)>,
    {
        let mut report = SimulationReport::default();
        if self.simulating {
            log::debug!("simulation already running, ignoring request");
            return report;
        }

        let mut participants: Vec<Participant<'a>> = dice
            .into_iter()
            .filter(|(id, shadow)| shadow.is_primed() && self.registered.contains(id))
            .map(|(id, shadow)| Participant {
                id,
                shadow,
                still_ticks: 0,
                settled: false,
            })
            .collect();
        if participants.is_empty() {
            return report;
        }

        self.simulating = true;
        for tick in 0..self.max_iterations {
            if participants.iter().all(|p| p.settled) {
                break;
            }
            for p in participants.iter_mut() {
                if p.shadow.is_stationary(&self.physics) {
                    if p.settled {
                        continue;
                    }
                    p.still_ticks += 1;
                    if p.still_ticks > self.stationary_ticks {
                        p.settled = true;
                        report.settled.push((p.id, tick));
                        log::debug!("die {} settled on tick {}", p.id, tick);
                    }
                } else {
                    p.still_ticks = 0;
                }
                p.shadow.record_step(&self.physics);
            }
            self.physics.step(self.timestep);
            report.ticks += 1;
        }

        for p in participants.iter_mut() {
            p.shadow.clear_primed();
            // the last step ran after the last capture; resting faces and
            // playback must agree on the final pose
            p.shadow.rewind(&mut self.physics);
            if !p.settled {
                report.unsettled.push(p.id);
            }
        }
        if !report.unsettled.is_empty() {
            log::debug!(
                "iteration cap of {} reached with {} dice still moving",
                self.max_iterations,
                report.unsettled.len()
            );
        }
        self.simulating = false;
        report
    }

    /// Unregister every die, drop all bodies and give back the static geometry.
    pub fn shutdown(mut self) -> Vec<ColliderConfig> {
        self.registered.clear();
        self.export_colliders()
    }
}
