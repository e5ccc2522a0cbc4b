//! A molecular dynamics engine for point particles in a periodic cell.
//!
//! A [`System`] holds atoms, coordinates and velocities together with a
//! composable set of pairwise and bonded interactions, a neighbour finding
//! strategy and observable loggers. [`simulate`] integrates the equations
//! of motion with a chosen [`Integrator`], optionally coupled to a
//! thermostat.
//!
//! ```no_run
//! use corundum::*;
//! use nalgebra::Vector3;
//!
//! let boundary = SimulationBox::new(Vector3::new(2.0, 2.0, 2.0))?;
//! let atoms = vec![Atom { mass: 39.948, sigma: 0.3, epsilon: 0.2, ..Default::default() }; 8];
//! let coords = (0..8)
//!     .map(|i| Vector3::new((i % 2) as f64 + 0.5, ((i / 2) % 2) as f64 + 0.5, (i / 4) as f64 + 0.5))
//!     .collect();
//! let velocities = vec![Vector3::zeros(); 8];
//!
//! let mut sys = System::new(atoms, coords, velocities, boundary)?
//!     .with_pairwise(vec![Pairwise::LennardJones(LennardJones::default())])?
//!     .with_loggers(vec![Logger::temperature(100)]);
//! sys.random_velocities(298.0, 42);
//!
//! let mut integrator = VelocityVerlet::new(0.002);
//! simulate(&mut sys, &mut integrator, 10_000)?;
//! # Ok::<(), corundum::CorundumError>(())
//! ```

extern crate nalgebra as na;

pub mod analysis;
pub mod boundary;
pub mod constants;
pub mod cutoffs;
pub mod errors;
pub mod forces;
pub mod integrators;
pub mod interactions;
pub mod loggers;
pub mod neighbours;
pub mod system;

pub use analysis::{displacements, distances, rdf};
pub use boundary::SimulationBox;
pub use cutoffs::Cutoff;
pub use errors::{CorundumError, Result};
pub use forces::{accelerations, forces, forces_parallel, potential_energy, virial_pressure};
pub use integrators::{
    simulate, steepest_descent, Integrator, Langevin, Leapfrog, MinimizationResult,
    StormerVerlet, Thermostat, VelocityVerlet,
};
pub use interactions::{
    Coulomb, CoulombReactionField, Gravity, HarmonicAngle, HarmonicBond, LennardJones,
    LennardJonesSoftCore, Mie, MixingRule, Pairwise, PeriodicTorsion, SoftSphere,
    SpecificInteractions, SpecificList2, SpecificList3, SpecificList4,
};
pub use loggers::{Logger, TrajectoryWriter};
pub use neighbours::{
    empty_14_matrix, full_nb_matrix, CellListNeighbourFinder, DistanceNeighbourFinder,
    NeighbourFinder, NeighbourList, TreeNeighbourFinder,
};
pub use system::{Atom, System, UnitSystem};
