//! Dice table: the process-wide state object owning every die and the
//! shadow world, addressed by stable `DieId`s.
//!
//! The shadow world is created on first use and released by `shutdown`.
//! A typical frame loop:
//!
//! 1. `roll` each die that should move,
//! 2. `run_prediction` once for all of them,
//! 3. `play` each die,
//! 4. call `tick` every fixed step and read `drain_events`.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::{ColliderConfig, DiceConfig};
use crate::die::{Die, DieState, RollRequest};
use crate::error::{DiceError, Result};
use crate::event::RollEvent;
use crate::face::FaceMap;
use crate::geometry::Polyhedron;
use crate::pose::{Pose, Trajectory};
use crate::world::{ShadowWorld, SimulationReport};
use crate::{Isometry3, Real, UnitQuaternion};

/// Stable die identifier; never reused within one table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DieId(pub u32);

impl fmt::Display for DieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What one `run_prediction` call did.
#[derive(Debug, Default)]
pub struct PredictionReport {
    pub simulation: SimulationReport,
    /// Resolved face per reconciled die.
    pub outcomes: Vec<(DieId, i32)>,
    /// Requests that could not be honoured; those dice keep their physical face.
    pub failures: Vec<DiceError>,
}

pub struct DiceTable {
    config: DiceConfig,
    world: Option<ShadowWorld>,
    dice: BTreeMap<DieId, Die>,
    next_id: u32,
    events: VecDeque<RollEvent>,
    rng: StdRng,
}

impl DiceTable {
    pub fn new(config: DiceConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            world: None,
            dice: BTreeMap::new(),
            next_id: 1,
            events: VecDeque::new(),
            rng,
        })
    }

    pub fn config(&self) -> &DiceConfig {
        &self.config
    }

    /// Create the shadow world up front instead of on first use.
    pub fn init_world(&mut self) -> &mut ShadowWorld {
        let config = &self.config;
        self.world.get_or_insert_with(|| ShadowWorld::new(config))
    }

    pub fn world(&self) -> Option<&ShadowWorld> {
        self.world.as_ref()
    }

    pub fn is_world_loaded(&self) -> bool {
        self.world.is_some()
    }

    fn world_or_create<'w>(slot: &'w mut Option<ShadowWorld>, config: &DiceConfig) -> &'w mut ShadowWorld {
        slot.get_or_insert_with(|| {
            log::warn!("shadow world not found, creating a new one");
            ShadowWorld::new(config)
        })
    }

    /// Replace the static geometry list. Already-loaded worlds import the new
    /// entries immediately.
    pub fn set_collision_objects(&mut self, colliders: Vec<ColliderConfig>) -> Result<()> {
        let mut config = self.config.clone();
        config.colliders = colliders;
        config.validate()?;
        self.config = config;
        if let Some(world) = self.world.as_mut() {
            world.import_colliders(&self.config.colliders);
        }
        Ok(())
    }

    /// Add a die resting at `pose`. Its shadow body is created right away.
    pub fn create_die(&mut self, faces: FaceMap, shape: Polyhedron, mass: Real, pose: Pose) -> Result<DieId> {
        let id = DieId(self.next_id);
        let mut die = Die::new(faces, shape, mass, pose);
        let world = Self::world_or_create(&mut self.world, &self.config);
        die.ensure_shadow(id, world)?;
        self.next_id += 1;
        self.dice.insert(id, die);
        log::debug!("created die {id}");
        Ok(id)
    }

    pub fn destroy_die(&mut self, id: DieId) -> Result<()> {
        let mut die = self.dice.remove(&id).ok_or(DiceError::UnknownDie(id))?;
        if let (Some(world), Some(shadow)) = (self.world.as_mut(), die.detach_shadow()) {
            world.despawn(id, shadow);
        }
        log::debug!("destroyed die {id}");
        Ok(())
    }

    pub fn set_enabled(&mut self, id: DieId, enabled: bool) -> Result<()> {
        self.die_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Reset the die's shadow to the visible pose and kick it. Disabled dice
    /// ignore the call. Legal while idle or playing (playback is cancelled).
    pub fn roll(&mut self, id: DieId, request: RollRequest) -> Result<()> {
        let die = self.dice.get_mut(&id).ok_or(DiceError::UnknownDie(id))?;
        if !die.enabled {
            log::debug!("die {id} is disabled, ignoring roll");
            return Ok(());
        }
        let world = Self::world_or_create(&mut self.world, &self.config);
        die.roll(id, world, request)
    }

    /// Simulate every rolled die to rest in one shared pass, then reconcile
    /// each with its requested face.
    pub fn run_prediction(&mut self) -> PredictionReport {
        let mut report = PredictionReport::default();
        let Some(world) = self.world.as_mut() else {
            return report;
        };

        report.simulation = world.run_simulation(
            self.dice
                .iter_mut()
                .filter_map(|(id, die)| die.shadow.as_mut().map(|s| (*id, s))),
        );
        for &(die, tick) in &report.simulation.settled {
            self.events.push_back(RollEvent::Settled { die, tick });
        }

        for (&id, die) in self.dice.iter_mut() {
            if die.state != DieState::Rolling {
                continue;
            }
            match die.reconcile(id, world, &mut self.rng) {
                Ok(()) => {}
                Err(err) => {
                    log::warn!("{err}");
                    report.failures.push(err);
                }
            }
            report.outcomes.push((id, die.resolved));
        }
        report
    }

    /// Start replaying the last prediction onto the visible die.
    pub fn play(&mut self, id: DieId) -> Result<()> {
        let mode = self.config.playback;
        let die = self.dice.get_mut(&id).ok_or(DiceError::UnknownDie(id))?;
        if !die.enabled {
            log::debug!("die {id} is disabled, ignoring play");
            return Ok(());
        }
        die.play(id, mode)?;
        self.events.push_back(RollEvent::RollStarted { die: id });
        Ok(())
    }

    /// Override the displayed outcome of the last prediction with the first
    /// face carrying `value`. Needs a live shadow: after `shutdown` the die has
    /// nothing to read its resting face from until it is rolled again.
    pub fn set_outcome(&mut self, id: DieId, value: i32) -> Result<()> {
        let die = self.dice.get_mut(&id).ok_or(DiceError::UnknownDie(id))?;
        match (self.world.as_ref(), die.shadow.is_some()) {
            (Some(world), true) => die.set_outcome(id, world, value),
            _ => Err(DiceError::InvalidState {
                die: id,
                op: "set outcome without a shadow world",
                state: die.state,
            }),
        }
    }

    /// Advance every playing die by one fixed tick. Returns whether any die is
    /// still playing afterwards.
    pub fn tick(&mut self, dt: Real) -> bool {
        let mut playing = false;
        for (&id, die) in self.dice.iter_mut() {
            if let Some(face) = die.advance(dt) {
                log::debug!("die {id} finished playback on {face}");
                self.events.push_back(RollEvent::RollEnded { die: id, face });
            }
            playing |= die.state == DieState::Playing;
        }
        playing
    }

    /// Tick with the configured fixed timestep.
    pub fn step(&mut self) -> bool {
        let dt = self.config.fixed_timestep;
        self.tick(dt)
    }

    pub fn drain_events(&mut self) -> Vec<RollEvent> {
        self.events.drain(..).collect()
    }

    /// Unregister every die, drop the isolated world and hand back its static
    /// geometry. In-flight rolls are abandoned; dice stay usable and get a
    /// fresh world on their next roll.
    pub fn shutdown(&mut self) -> Vec<ColliderConfig> {
        for die in self.dice.values_mut() {
            die.detach_shadow();
        }
        match self.world.take() {
            Some(world) => world.shutdown(),
            None => Vec::new(),
        }
    }

    pub fn die_ids(&self) -> impl Iterator<Item = DieId> + '_ {
        self.dice.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.dice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dice.is_empty()
    }

    pub fn state(&self, id: DieId) -> Result<DieState> {
        Ok(self.die(id)?.state)
    }

    pub fn request(&self, id: DieId) -> Result<RollRequest> {
        Ok(self.die(id)?.request)
    }

    /// Pose of the visible body (the physics-driving transform).
    pub fn pose(&self, id: DieId) -> Result<Pose> {
        Ok(self.die(id)?.body)
    }

    /// Display-only rotation offset applied under the visible body.
    pub fn graphic_rotation(&self, id: DieId) -> Result<UnitQuaternion<Real>> {
        Ok(self.die(id)?.graphic)
    }

    /// World transform the die mesh should be drawn with.
    pub fn display_transform(&self, id: DieId) -> Result<Isometry3<Real>> {
        Ok(self.die(id)?.display_transform())
    }

    pub fn face_looking_up(&self, id: DieId) -> Result<i32> {
        Ok(self.die(id)?.face_looking_up())
    }

    /// Face reported by the last reconciliation.
    pub fn resolved_face(&self, id: DieId) -> Result<i32> {
        Ok(self.die(id)?.resolved)
    }

    pub fn faces(&self, id: DieId) -> Result<&FaceMap> {
        Ok(&self.die(id)?.faces)
    }

    /// Trajectory recorded by the last prediction, if the die has a shadow.
    pub fn trajectory(&self, id: DieId) -> Result<Option<&Trajectory>> {
        Ok(self.die(id)?.shadow.as_ref().map(|s| s.trajectory()))
    }

    /// Face the shadow die shows up right now, before any correction.
    pub fn shadow_face(&self, id: DieId) -> Result<Option<i32>> {
        let die = self.die(id)?;
        Ok(match (self.world.as_ref(), die.shadow.as_ref()) {
            (Some(world), Some(shadow)) => Some(shadow.resting_face(world.physics())),
            _ => None,
        })
    }

    fn die(&self, id: DieId) -> Result<&Die> {
        self.dice.get(&id).ok_or(DiceError::UnknownDie(id))
    }

    fn die_mut(&mut self, id: DieId) -> Result<&mut Die> {
        self.dice.get_mut(&id).ok_or(DiceError::UnknownDie(id))
    }
}
