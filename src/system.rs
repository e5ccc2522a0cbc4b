//! The atom record and the simulation state that everything operates on.

use std::fmt;

use na::SVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::boundary::SimulationBox;
use crate::constants::KB_KJPERMOLEKELVIN;
use crate::errors::{CorundumError, Result};
use crate::interactions::{Pairwise, SpecificInteractions};
use crate::loggers::Logger;
use crate::neighbours::NeighbourFinder;

/// Per-atom parameters, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atom {
    pub mass: f64,
    pub charge: f64,
    /// Lennard-Jones diameter.
    pub sigma: f64,
    /// Lennard-Jones well depth.
    pub epsilon: f64,
    /// Marks solute atoms for solute-solvent interaction weighting.
    pub solute: bool,
}

impl Default for Atom {
    fn default() -> Self {
        Self {
            mass: 1.0,
            charge: 0.0,
            sigma: 0.0,
            epsilon: 0.0,
            solute: false,
        }
    }
}

/// The unit convention every quantity in a system follows.
///
/// `Md` means nm, ps, u, kJ/mol, K and elementary charges; `Reduced` means
/// everything is dimensionless with the Boltzmann constant equal to one.
/// The choice is validated against each interaction at construction and
/// never enters the force loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSystem {
    Md,
    Reduced,
}

impl UnitSystem {
    pub fn boltzmann(&self) -> f64 {
        match self {
            UnitSystem::Md => KB_KJPERMOLEKELVIN,
            UnitSystem::Reduced => 1.0,
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitSystem::Md => write!(f, "md"),
            UnitSystem::Reduced => write!(f, "reduced"),
        }
    }
}

/// The complete state of a molecular system.
///
/// Atoms are never added or removed during a run; coordinates and
/// velocities are mutated only by the integrators. Coordinates always
/// satisfy `0 <= c[k] < box[k]` on every axis.
///
/// A system is assembled in stages: [`System::new`] validates the state
/// arrays, then the `with_*` builders attach interactions, the neighbour
/// finder and loggers, each validating what it attaches.
pub struct System<const D: usize> {
    pub atoms: Vec<Atom>,
    pub coords: Vec<SVector<f64, D>>,
    pub velocities: Vec<SVector<f64, D>>,
    pub boundary: SimulationBox<D>,
    pub pairwise: Vec<Pairwise>,
    pub specific: Vec<SpecificInteractions>,
    pub neighbour_finder: NeighbourFinder,
    pub loggers: Vec<Logger<D>>,
    pub units: UnitSystem,
}

impl<const D: usize> System<D> {
    pub fn new(
        atoms: Vec<Atom>,
        coords: Vec<SVector<f64, D>>,
        velocities: Vec<SVector<f64, D>>,
        boundary: SimulationBox<D>,
    ) -> Result<Self> {
        if coords.len() != atoms.len() || velocities.len() != atoms.len() {
            return Err(CorundumError::LengthMismatch {
                atoms: atoms.len(),
                coords: coords.len(),
                velocities: velocities.len(),
            });
        }
        let coords = coords.into_iter().map(|c| boundary.wrap(c)).collect();
        Ok(Self {
            atoms,
            coords,
            velocities,
            boundary,
            pairwise: Vec::new(),
            specific: Vec::new(),
            neighbour_finder: NeighbourFinder::None,
            loggers: Vec::new(),
            units: UnitSystem::Md,
        })
    }

    pub fn with_units(mut self, units: UnitSystem) -> Self {
        self.units = units;
        self
    }

    pub fn with_pairwise(mut self, pairwise: Vec<Pairwise>) -> Result<Self> {
        for inter in &pairwise {
            if inter.units() != self.units {
                return Err(CorundumError::UnitMismatch {
                    interaction: inter.units(),
                    system: self.units,
                });
            }
        }
        self.pairwise = pairwise;
        Ok(self)
    }

    pub fn with_specific(mut self, specific: Vec<SpecificInteractions>) -> Result<Self> {
        for list in &specific {
            list.validate_indices(self.atoms.len())?;
            if list.arity() == 4 && D != 3 {
                return Err(CorundumError::InvalidInteraction {
                    reason: format!("torsions are only defined in 3 dimensions, not {D}"),
                });
            }
        }
        self.specific = specific;
        Ok(self)
    }

    pub fn with_neighbour_finder(mut self, finder: NeighbourFinder) -> Result<Self> {
        finder.validate(self.atoms.len())?;
        self.neighbour_finder = finder;
        Ok(self)
    }

    pub fn with_loggers(mut self, loggers: Vec<Logger<D>>) -> Self {
        self.loggers = loggers;
        self
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.velocities
            .iter()
            .zip(self.atoms.iter())
            .map(|(velocity, atom)| 0.5 * atom.mass * velocity.norm_squared())
            .sum()
    }

    /// Instantaneous temperature from the kinetic energy, with D·N degrees
    /// of freedom.
    pub fn temperature(&self) -> f64 {
        let dof = (D * self.atoms.len()) as f64;
        2.0 * self.kinetic_energy() / (dof * self.units.boltzmann())
    }

    /// Draws velocities from the Maxwell-Boltzmann distribution at the given
    /// temperature, removes centre-of-mass drift and rescales so the
    /// instantaneous temperature matches the target exactly.
    pub fn random_velocities(&mut self, temperature: f64, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        let k_b = self.units.boltzmann();

        for (velocity, atom) in self.velocities.iter_mut().zip(self.atoms.iter()) {
            let sigma = (k_b * temperature / atom.mass).sqrt();
            let normal = Normal::new(0.0, sigma).unwrap();
            for k in 0..D {
                velocity[k] = normal.sample(&mut rng);
            }
        }

        self.remove_drift();
        self.rescale_to_temperature(temperature);
    }

    fn remove_drift(&mut self) {
        let mut total_mass = 0.0;
        let mut total_momentum: SVector<f64, D> = SVector::zeros();

        for (velocity, atom) in self.velocities.iter().zip(self.atoms.iter()) {
            total_mass += atom.mass;
            total_momentum += velocity * atom.mass;
        }

        let velocity_cm = total_momentum / total_mass;
        for velocity in self.velocities.iter_mut() {
            *velocity -= velocity_cm;
        }
    }

    pub(crate) fn rescale_to_temperature(&mut self, temperature: f64) {
        let current = self.temperature();
        if current <= 0.0 {
            return;
        }
        let lambda = (temperature / current).sqrt();
        for velocity in self.velocities.iter_mut() {
            *velocity *= lambda;
        }
    }
}
