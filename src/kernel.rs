//! Transport kernel driving one neutron from its source to a terminal state.

use crate::config::{KernelConfig, KernelMode};
use crate::flight::advance_position;
use crate::kinematics::collide;
use crate::media::MediaModel;
use crate::types::{Diagnostics, HistoryResult, TerminationClass, Vec3};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_distr::Bernoulli;

/// Neutron transport kernel.
///
/// Holds the read-only media and settings shared by every history.
#[derive(Debug, Clone)]
pub struct Kernel {
    media: MediaModel,
    cfg: KernelConfig,
}

impl Kernel {
    pub fn new(media: MediaModel, cfg: KernelConfig) -> Self {
        Self { media, cfg }
    }

    /// Run one history in the configured mode.
    pub fn run<R: Rng + ?Sized>(
        &self,
        position: Vec3,
        velocity: Vec3,
        rng: &mut R,
    ) -> Result<HistoryResult> {
        match self.cfg.mode {
            KernelMode::Slab => self.run_history(position, velocity, self.cfg.diagnostics, rng),
            KernelMode::InfiniteMedium => {
                self.run_infinite_medium(position, velocity, self.cfg.diagnostics, rng)
            }
            KernelMode::SingleCollision => {
                self.run_single_collision(position, velocity, self.cfg.diagnostics, rng)
            }
        }
    }

    /// Transport a neutron through the slab media until it escapes, is absorbed
    /// or thermalizes.
    ///
    /// # Errors
    /// Returns an error if the source lies outside the domain, the velocity is
    /// zero, or the media hold an invalid cross section or mass.
    pub fn run_history<R: Rng + ?Sized>(
        &self,
        position: Vec3,
        velocity: Vec3,
        diagnostics: bool,
        rng: &mut R,
    ) -> Result<HistoryResult> {
        if self.media.locate(position.x).is_none() {
            bail!("source position {position:?} is outside the domain");
        }
        let mut walk = Walk::new(position, velocity, diagnostics);

        while walk.n_collisions < self.cfg.max_collisions {
            let x = advance_position(walk.x, walk.v, &self.media, rng)
                .context("failed to sample free flight")?;
            walk.x = x;

            if x.x > self.media.right() {
                return Ok(walk.finish(TerminationClass::EscapedRight));
            }
            if x.x < self.media.left() {
                return Ok(walk.finish(TerminationClass::EscapedLeft));
            }

            walk.record_position();

            let i_reg = self
                .media
                .locate(x.x)
                .with_context(|| format!("interaction at {x:?} is outside the domain"))?;

            if let Some(termination) = self.interact(&mut walk, i_reg, rng)? {
                return Ok(walk.finish(termination));
            }
        }

        Ok(walk.abort())
    }

    /// Collide a neutron in the medium at `position` without moving it, until it
    /// is absorbed or thermalizes.
    pub fn run_infinite_medium<R: Rng + ?Sized>(
        &self,
        position: Vec3,
        velocity: Vec3,
        diagnostics: bool,
        rng: &mut R,
    ) -> Result<HistoryResult> {
        let i_reg = self
            .media
            .locate(position.x)
            .with_context(|| format!("source position {position:?} is outside the domain"))?;
        let mut walk = Walk::new(position, velocity, diagnostics);

        while walk.n_collisions < self.cfg.max_collisions {
            if let Some(termination) = self.interact(&mut walk, i_reg, rng)? {
                return Ok(walk.finish(termination));
            }
        }

        Ok(walk.abort())
    }

    /// Fly a neutron to its first interaction site and stop there.
    ///
    /// Ends as `Absorbed` or `Scattered` inside the domain, or as an escape.
    pub fn run_single_collision<R: Rng + ?Sized>(
        &self,
        position: Vec3,
        velocity: Vec3,
        diagnostics: bool,
        rng: &mut R,
    ) -> Result<HistoryResult> {
        if self.media.locate(position.x).is_none() {
            bail!("source position {position:?} is outside the domain");
        }
        let mut walk = Walk::new(position, velocity, diagnostics);

        let x = advance_position(walk.x, walk.v, &self.media, rng)
            .context("failed to sample free flight")?;
        walk.x = x;

        if x.x > self.media.right() {
            return Ok(walk.finish(TerminationClass::EscapedRight));
        }
        if x.x < self.media.left() {
            return Ok(walk.finish(TerminationClass::EscapedLeft));
        }

        walk.record_position();

        let i_reg = self
            .media
            .locate(x.x)
            .with_context(|| format!("interaction at {x:?} is outside the domain"))?;

        match self.interact(&mut walk, i_reg, rng)? {
            Some(TerminationClass::Absorbed) => Ok(walk.finish(TerminationClass::Absorbed)),
            _ => Ok(walk.finish(TerminationClass::Scattered)),
        }
    }

    /// Sample absorption, then an elastic collision, at the current position.
    fn interact<R: Rng + ?Sized>(
        &self,
        walk: &mut Walk,
        i_reg: usize,
        rng: &mut R,
    ) -> Result<Option<TerminationClass>> {
        let region = self.media.region(i_reg);

        let abs_dist = Bernoulli::new(region.absorption_prob())
            .with_context(|| format!("invalid absorption probability in {:?}", region.name))?;
        if abs_dist.sample(rng) {
            return Ok(Some(TerminationClass::Absorbed));
        }

        let mass = region.nuclides.sample(rng);
        let collision = collide(walk.v, mass, rng).context("failed to collide")?;
        walk.record_collision(collision.angle, collision.energy, self.cfg.max_energy_records);
        walk.v = collision.velocity;

        if walk.v.norm() < self.cfg.thermal_speed {
            return Ok(Some(TerminationClass::Thermalized));
        }
        Ok(None)
    }
}

/// In-flight state of a single history.
struct Walk {
    x: Vec3,
    v: Vec3,
    n_collisions: usize,
    diagnostics: Option<Diagnostics>,
}

impl Walk {
    fn new(x: Vec3, v: Vec3, diagnostics: bool) -> Self {
        Self {
            x,
            v,
            n_collisions: 0,
            diagnostics: diagnostics.then(Diagnostics::default),
        }
    }

    fn record_position(&mut self) {
        if let Some(diag) = &mut self.diagnostics {
            diag.trajectory.push(self.x);
        }
    }

    fn record_collision(&mut self, angle: f64, energy: f64, max_energy_records: usize) {
        self.n_collisions += 1;
        if let Some(diag) = &mut self.diagnostics {
            diag.scattering_angles.push(angle);
            if diag.energies.len() < max_energy_records {
                diag.energies.push(energy);
            }
        }
    }

    fn abort(self) -> HistoryResult {
        log::warn!(
            "aborted history after {} collisions at {:?}",
            self.n_collisions,
            self.x
        );
        self.finish(TerminationClass::Aborted)
    }

    fn finish(self, termination: TerminationClass) -> HistoryResult {
        log::trace!("{termination:?} after {} collisions", self.n_collisions);
        HistoryResult {
            termination,
            final_position: self.x,
            n_collisions: self.n_collisions,
            diagnostics: self.diagnostics,
        }
    }
}
