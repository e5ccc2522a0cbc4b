//! Time integrators, thermostats, the simulation driver and the minimiser.

use na::SVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::{debug, info};

use crate::errors::Result;
use crate::forces::{checked_forces, potential_energy};
use crate::loggers::run_loggers;
use crate::neighbours::NeighbourList;
use crate::system::System;

/// One step of a time integration scheme.
///
/// Sub-steps execute strictly in their documented order; the thermostat,
/// when one is coupled, runs last.
pub trait Integrator<const D: usize> {
    fn step(
        &mut self,
        sys: &mut System<D>,
        neighbours: &NeighbourList,
        step: usize,
    ) -> Result<()>;
}

/// Velocity rescaling schemes applied after an integration step.
pub enum Thermostat {
    /// Stochastic collisions: each step every atom is resampled from the
    /// Maxwell-Boltzmann distribution with probability `dt/coupling_time`.
    Andersen {
        temperature: f64,
        coupling_time: f64,
        rng: StdRng,
    },
    /// Deterministic rescale to the target temperature.
    Rescale { temperature: f64 },
}

impl Thermostat {
    pub fn andersen(temperature: f64, coupling_time: f64, seed: u64) -> Self {
        Thermostat::Andersen {
            temperature,
            coupling_time,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn rescale(temperature: f64) -> Self {
        Thermostat::Rescale { temperature }
    }

    pub fn apply<const D: usize>(&mut self, sys: &mut System<D>, dt: f64) {
        match self {
            Thermostat::Andersen {
                temperature,
                coupling_time,
                rng,
            } => {
                let probability = dt / *coupling_time;
                let k_b = sys.units.boltzmann();
                for (velocity, atom) in sys.velocities.iter_mut().zip(sys.atoms.iter()) {
                    if rng.random::<f64>() < probability {
                        let sigma = (k_b * *temperature / atom.mass).sqrt();
                        let normal = Normal::new(0.0, sigma).unwrap();
                        for k in 0..D {
                            velocity[k] = normal.sample(rng);
                        }
                    }
                }
            }
            Thermostat::Rescale { temperature } => {
                sys.rescale_to_temperature(*temperature);
            }
        }
    }
}

/// Symplectic half-kick / drift / half-kick scheme.
pub struct VelocityVerlet {
    pub dt: f64,
    pub coupling: Option<Thermostat>,
}

impl VelocityVerlet {
    pub fn new(dt: f64) -> Self {
        Self { dt, coupling: None }
    }

    pub fn with_thermostat(dt: f64, thermostat: Thermostat) -> Self {
        Self {
            dt,
            coupling: Some(thermostat),
        }
    }
}

impl<const D: usize> Integrator<D> for VelocityVerlet {
    fn step(
        &mut self,
        sys: &mut System<D>,
        neighbours: &NeighbourList,
        step: usize,
    ) -> Result<()> {
        let dt = self.dt;
        let half_kick = |sys: &mut System<D>, forces: &[SVector<f64, D>]| {
            for ((velocity, force), atom) in sys
                .velocities
                .iter_mut()
                .zip(forces.iter())
                .zip(sys.atoms.iter())
            {
                *velocity += force * (0.5 * dt / atom.mass);
            }
        };

        let forces = checked_forces(sys, neighbours, step)?;
        let saved_coords = sys.coords.clone();
        let saved_velocities = sys.velocities.clone();

        half_kick(sys, &forces);
        for i in 0..sys.coords.len() {
            sys.coords[i] = sys.boundary.wrap(sys.coords[i] + sys.velocities[i] * dt);
        }
        // a failure here must leave the system at its last completed step,
        // not half kicked and drifted
        let forces = match checked_forces(sys, neighbours, step) {
            Ok(forces) => forces,
            Err(err) => {
                sys.coords = saved_coords;
                sys.velocities = saved_velocities;
                return Err(err);
            }
        };
        half_kick(sys, &forces);

        if let Some(thermostat) = &mut self.coupling {
            thermostat.apply(sys, dt);
        }
        Ok(())
    }
}

/// Leapfrog Verlet: full kick then drift.
pub struct Leapfrog {
    pub dt: f64,
}

impl Leapfrog {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }
}

impl<const D: usize> Integrator<D> for Leapfrog {
    fn step(
        &mut self,
        sys: &mut System<D>,
        neighbours: &NeighbourList,
        step: usize,
    ) -> Result<()> {
        let forces = checked_forces(sys, neighbours, step)?;
        for i in 0..sys.coords.len() {
            sys.velocities[i] += forces[i] * (self.dt / sys.atoms[i].mass);
            sys.coords[i] = sys.boundary.wrap(sys.coords[i] + sys.velocities[i] * self.dt);
        }
        Ok(())
    }
}

/// Position-only Verlet using the previous coordinates, bootstrapped from
/// the initial velocities on the first step.
///
/// Velocities are maintained as the central difference estimate so kinetic
/// observables stay meaningful.
pub struct StormerVerlet<const D: usize> {
    pub dt: f64,
    prev_coords: Option<Vec<SVector<f64, D>>>,
}

impl<const D: usize> StormerVerlet<D> {
    pub fn new(dt: f64) -> Self {
        Self {
            dt,
            prev_coords: None,
        }
    }
}

impl<const D: usize> Integrator<D> for StormerVerlet<D> {
    fn step(
        &mut self,
        sys: &mut System<D>,
        neighbours: &NeighbourList,
        step: usize,
    ) -> Result<()> {
        let dt = self.dt;
        let forces = checked_forces(sys, neighbours, step)?;
        let prev = self.prev_coords.take().unwrap_or_else(|| {
            // second order bootstrap from the initial velocities
            sys.coords
                .iter()
                .zip(sys.velocities.iter())
                .zip(forces.iter().zip(sys.atoms.iter()))
                .map(|((coord, velocity), (force, atom))| {
                    coord - velocity * dt + force * (0.5 * dt * dt / atom.mass)
                })
                .collect()
        });

        let mut next_prev = Vec::with_capacity(sys.coords.len());
        for i in 0..sys.coords.len() {
            // displacements are taken minimum image so wrapping between
            // steps cannot tear the difference apart
            let moved = sys.boundary.displacement(&sys.coords[i], &prev[i]);
            let accel_term = forces[i] * (dt * dt / sys.atoms[i].mass);
            sys.velocities[i] = (moved * 2.0 + accel_term) / (2.0 * dt);
            next_prev.push(sys.coords[i]);
            sys.coords[i] = sys.boundary.wrap(sys.coords[i] + moved + accel_term);
        }
        self.prev_coords = Some(next_prev);
        Ok(())
    }
}

/// Langevin dynamics with the BAOAB splitting, drawing fresh Gaussian noise
/// every step.
pub struct Langevin {
    pub dt: f64,
    pub temperature: f64,
    /// Friction coefficient γ in inverse time units.
    pub friction: f64,
    rng: StdRng,
}

impl Langevin {
    pub fn new(dt: f64, temperature: f64, friction: f64, seed: u64) -> Self {
        Self {
            dt,
            temperature,
            friction,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<const D: usize> Integrator<D> for Langevin {
    fn step(
        &mut self,
        sys: &mut System<D>,
        neighbours: &NeighbourList,
        step: usize,
    ) -> Result<()> {
        let dt = self.dt;
        let k_b = sys.units.boltzmann();
        let ou_decay = (-self.friction * dt).exp();
        let normal = Normal::new(0.0, 1.0).unwrap();

        let forces = checked_forces(sys, neighbours, step)?;
        let saved_coords = sys.coords.clone();
        let saved_velocities = sys.velocities.clone();

        for i in 0..sys.coords.len() {
            sys.velocities[i] += forces[i] * (0.5 * dt / sys.atoms[i].mass);
            sys.coords[i] += sys.velocities[i] * (0.5 * dt);
        }
        for (velocity, atom) in sys.velocities.iter_mut().zip(sys.atoms.iter()) {
            let noise_scale =
                ((1.0 - ou_decay * ou_decay) * k_b * self.temperature / atom.mass).sqrt();
            for k in 0..D {
                velocity[k] = velocity[k] * ou_decay + noise_scale * normal.sample(&mut self.rng);
            }
        }
        for i in 0..sys.coords.len() {
            sys.coords[i] = sys
                .boundary
                .wrap(sys.coords[i] + sys.velocities[i] * (0.5 * dt));
        }
        // a failure here must leave the system at its last completed step,
        // not kicked, drifted and renoised
        let forces = match checked_forces(sys, neighbours, step) {
            Ok(forces) => forces,
            Err(err) => {
                sys.coords = saved_coords;
                sys.velocities = saved_velocities;
                return Err(err);
            }
        };
        for i in 0..sys.coords.len() {
            sys.velocities[i] += forces[i] * (0.5 * dt / sys.atoms[i].mass);
        }
        Ok(())
    }
}

/// Runs `n_steps` of dynamics, refreshing the neighbour list on the
/// finder's period and sampling loggers on theirs, step zero included.
///
/// A numerical failure aborts the run with the system left in its
/// last-completed-step state.
pub fn simulate<const D: usize, I: Integrator<D>>(
    sys: &mut System<D>,
    integrator: &mut I,
    n_steps: usize,
) -> Result<()> {
    let mut neighbours = sys
        .neighbour_finder
        .find_neighbours(sys, 0)
        .unwrap_or_default();
    run_loggers(sys, &neighbours, 0)?;

    for step in 1..=n_steps {
        integrator.step(sys, &neighbours, step)?;
        if let Some(fresh) = sys.neighbour_finder.find_neighbours(sys, step) {
            neighbours = fresh;
        }
        run_loggers(sys, &neighbours, step)?;
    }
    info!(n_steps, n_atoms = sys.n_atoms(), "simulation finished");
    Ok(())
}

/// Outcome of an energy minimisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizationResult {
    pub steps: usize,
    pub converged: bool,
    pub initial_energy: f64,
    pub final_energy: f64,
}

/// Steepest descent with an adaptive step, terminating when the largest
/// force magnitude drops below `tol`.
pub fn steepest_descent<const D: usize>(
    sys: &mut System<D>,
    tol: f64,
    max_steps: usize,
) -> Result<MinimizationResult> {
    let neighbours = sys
        .neighbour_finder
        .find_neighbours(sys, 0)
        .unwrap_or_default();

    let mut step_size = 0.01;
    let initial_energy = potential_energy(sys, &neighbours);
    let mut energy = initial_energy;

    for step in 0..max_steps {
        let forces = checked_forces(sys, &neighbours, step)?;
        let max_force = forces.iter().map(|f| f.norm()).fold(0.0, f64::max);
        if max_force < tol {
            info!(step, energy, "minimisation converged");
            return Ok(MinimizationResult {
                steps: step,
                converged: true,
                initial_energy,
                final_energy: energy,
            });
        }

        // cap the largest per-atom move at the current step size
        let scale = step_size / max_force;
        let old_coords = sys.coords.clone();
        for (coord, force) in sys.coords.iter_mut().zip(forces.iter()) {
            *coord = sys.boundary.wrap(*coord + force * scale);
        }

        let trial_energy = potential_energy(sys, &neighbours);
        if trial_energy < energy {
            energy = trial_energy;
            step_size *= 1.2;
        } else {
            sys.coords = old_coords;
            step_size *= 0.5;
        }
        if step % 100 == 0 {
            debug!(step, energy, max_force, step_size, "minimisation progress");
        }
    }

    Ok(MinimizationResult {
        steps: max_steps,
        converged: false,
        initial_energy,
        final_energy: energy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use na::Vector3;

    use crate::boundary::SimulationBox;
    use crate::cutoffs::Cutoff;
    use crate::forces::potential_energy;
    use crate::interactions::{LennardJones, Pairwise};
    use crate::system::{Atom, System};

    fn lj_atom() -> Atom {
        Atom {
            mass: 39.948,
            sigma: 0.3,
            epsilon: 0.2,
            ..Default::default()
        }
    }

    fn lj_fluid(cutoff: Cutoff) -> System<3> {
        let boundary = SimulationBox::new(Vector3::new(2.0, 2.0, 2.0)).unwrap();
        let mut coords = Vec::new();
        for a in 0..3 {
            for b in 0..3 {
                for c in 0..3 {
                    coords.push(Vector3::new(
                        (a as f64 + 0.5) * 2.0 / 3.0,
                        (b as f64 + 0.5) * 2.0 / 3.0,
                        (c as f64 + 0.5) * 2.0 / 3.0,
                    ));
                }
            }
        }
        let n = coords.len();
        let mut sys =
            System::new(vec![lj_atom(); n], coords, vec![Vector3::zeros(); n], boundary)
                .unwrap()
                .with_pairwise(vec![Pairwise::LennardJones(LennardJones {
                    cutoff,
                    ..Default::default()
                })])
                .unwrap();
        sys.random_velocities(50.0, 17);
        sys
    }

    #[test]
    fn test_velocity_verlet_conserves_energy() {
        // a smooth force at the cutoff keeps the drift to rounding level
        let mut sys = lj_fluid(Cutoff::shifted_force(0.9));
        let mut integrator = VelocityVerlet::new(0.002);

        let start = sys.kinetic_energy() + potential_energy(&sys, &NeighbourList::default());
        simulate(&mut sys, &mut integrator, 2000).unwrap();
        let end = sys.kinetic_energy() + potential_energy(&sys, &NeighbourList::default());

        let scale = sys.kinetic_energy().abs().max(1.0);
        assert!(
            (end - start).abs() < 0.01 * scale,
            "energy drifted from {start} to {end}"
        );
    }

    #[test]
    fn test_coords_stay_in_box() {
        let mut sys = lj_fluid(Cutoff::shifted_force(0.9));
        let mut integrator = VelocityVerlet::new(0.002);
        simulate(&mut sys, &mut integrator, 500).unwrap();
        for coord in &sys.coords {
            for k in 0..3 {
                assert!(coord[k] >= 0.0 && coord[k] < 2.0);
            }
        }
    }

    #[test]
    fn test_leapfrog_tracks_velocity_verlet_loosely() {
        // both schemes must stay stable and keep the same energy scale
        let mut vv_sys = lj_fluid(Cutoff::shifted_force(0.9));
        let mut lf_sys = lj_fluid(Cutoff::shifted_force(0.9));
        simulate(&mut vv_sys, &mut VelocityVerlet::new(0.002), 200).unwrap();
        simulate(&mut lf_sys, &mut Leapfrog::new(0.002), 200).unwrap();

        let e_vv = vv_sys.kinetic_energy() + potential_energy(&vv_sys, &NeighbourList::default());
        let e_lf = lf_sys.kinetic_energy() + potential_energy(&lf_sys, &NeighbourList::default());
        assert!((e_vv - e_lf).abs() < 0.5 * e_vv.abs().max(1.0));
    }

    #[test]
    fn test_stormer_verlet_matches_velocity_verlet_trajectory() {
        let mut vv_sys = lj_fluid(Cutoff::shifted_force(0.9));
        let mut sv_sys = lj_fluid(Cutoff::shifted_force(0.9));
        simulate(&mut vv_sys, &mut VelocityVerlet::new(0.002), 100).unwrap();
        simulate(&mut sv_sys, &mut StormerVerlet::new(0.002), 100).unwrap();

        // identical positions up to integrator rounding
        for (a, b) in vv_sys.coords.iter().zip(sv_sys.coords.iter()) {
            let dr = vv_sys.boundary.displacement(a, b);
            assert!(dr.norm() < 1e-6, "trajectories diverged by {}", dr.norm());
        }
    }

    #[test]
    fn test_langevin_thermalises_ideal_gas() {
        let boundary = SimulationBox::new(Vector3::new(4.0, 4.0, 4.0)).unwrap();
        let n = 64;
        let coords = (0..n)
            .map(|i| {
                Vector3::new(
                    (i % 4) as f64 + 0.5,
                    ((i / 4) % 4) as f64 + 0.5,
                    (i / 16) as f64 + 0.5,
                )
            })
            .collect();
        let mut sys = System::new(
            vec![lj_atom(); n],
            coords,
            vec![Vector3::zeros(); n],
            boundary,
        )
        .unwrap();

        let mut integrator = Langevin::new(0.01, 300.0, 5.0, 23);
        simulate(&mut sys, &mut integrator, 4000).unwrap();

        // started cold, the thermostat must bring it near the target
        let temperature = sys.temperature();
        assert!(
            temperature > 200.0 && temperature < 400.0,
            "temperature {temperature} K far from 300 K"
        );
    }

    #[test]
    fn test_langevin_is_reproducible() {
        let mut sys_a = lj_fluid(Cutoff::shifted_force(0.9));
        let mut sys_b = lj_fluid(Cutoff::shifted_force(0.9));
        simulate(&mut sys_a, &mut Langevin::new(0.002, 100.0, 1.0, 5), 50).unwrap();
        simulate(&mut sys_b, &mut Langevin::new(0.002, 100.0, 1.0, 5), 50).unwrap();
        for (a, b) in sys_a.coords.iter().zip(sys_b.coords.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_andersen_thermostat_controls_temperature() {
        let mut sys = lj_fluid(Cutoff::shifted_force(0.9));
        // hot start
        sys.random_velocities(600.0, 3);
        let mut integrator = VelocityVerlet::with_thermostat(
            0.002,
            Thermostat::andersen(300.0, 0.1, 9),
        );
        simulate(&mut sys, &mut integrator, 3000).unwrap();

        let temperature = sys.temperature();
        assert!(
            temperature < 450.0,
            "thermostat failed to cool the system, T = {temperature} K"
        );
    }

    #[test]
    fn test_rescale_thermostat_is_exact() {
        let mut sys = lj_fluid(Cutoff::shifted_force(0.9));
        let mut thermostat = Thermostat::rescale(150.0);
        thermostat.apply(&mut sys, 0.002);
        assert_relative_eq!(sys.temperature(), 150.0, epsilon = 1e-9);
    }

    #[test]
    fn test_steepest_descent_relaxes_dimer() {
        let boundary = SimulationBox::new(Vector3::new(10.0, 10.0, 10.0)).unwrap();
        // compressed pair, strongly repulsive
        let mut sys = System::new(
            vec![lj_atom(); 2],
            vec![Vector3::new(5.0, 5.0, 5.0), Vector3::new(5.25, 5.0, 5.0)],
            vec![Vector3::zeros(); 2],
            boundary,
        )
        .unwrap()
        .with_pairwise(vec![Pairwise::LennardJones(LennardJones::default())])
        .unwrap();

        let result = steepest_descent(&mut sys, 0.1, 10_000).unwrap();
        assert!(result.converged);
        assert!(result.final_energy < result.initial_energy);
        // the dimer settles at the potential minimum
        let r = sys
            .boundary
            .displacement(&sys.coords[1], &sys.coords[0])
            .norm();
        assert_relative_eq!(r, 0.3 * 2.0_f64.powf(1.0 / 6.0), epsilon = 1e-2);
        assert_relative_eq!(result.final_energy, -0.2, epsilon = 1e-3);
    }

    #[test]
    fn test_aborted_run_leaves_last_completed_state() {
        let boundary = SimulationBox::new(Vector3::new(10.0, 10.0, 10.0)).unwrap();
        let atom = Atom {
            mass: 1.0,
            charge: 1.0,
            ..Default::default()
        };
        // coincident charges: the first force evaluation blows up
        let mut sys = System::new(
            vec![atom; 2],
            vec![Vector3::new(5.0, 5.0, 5.0); 2],
            vec![Vector3::zeros(); 2],
            boundary,
        )
        .unwrap()
        .with_pairwise(vec![Pairwise::Coulomb(crate::interactions::Coulomb::default())])
        .unwrap();

        let before = sys.coords.clone();
        let err = simulate(&mut sys, &mut VelocityVerlet::new(0.001), 10);
        assert!(err.is_err());
        assert_eq!(sys.coords, before);
    }

    /// Timestep for the collision tests, a power of two so the drift
    /// arithmetic below is exact.
    const COLLISION_DT: f64 = 0.001953125;

    /// Two atoms outside the cutoff aimed head on so they land exactly on
    /// top of each other after the drift: the first force pass is exactly
    /// zero, the second divides by zero.
    fn colliding_dimer() -> System<3> {
        let boundary = SimulationBox::new(Vector3::new(10.0, 10.0, 10.0)).unwrap();
        let coords = vec![
            Vector3::new(4.5, 5.0, 5.0),
            Vector3::new(5.5, 5.0, 5.0),
        ];
        // 256 · dt = 0.5 exactly, so both atoms meet at x = 5
        let velocities = vec![
            Vector3::new(256.0, 0.0, 0.0),
            Vector3::new(-256.0, 0.0, 0.0),
        ];
        System::new(vec![lj_atom(); 2], coords, velocities, boundary)
            .unwrap()
            .with_pairwise(vec![Pairwise::LennardJones(LennardJones {
                cutoff: Cutoff::distance(0.8),
                ..Default::default()
            })])
            .unwrap()
    }

    #[test]
    fn test_failure_after_drift_rolls_back_velocity_verlet() {
        let mut sys = colliding_dimer();
        let coords_before = sys.coords.clone();
        let velocities_before = sys.velocities.clone();

        let err = simulate(&mut sys, &mut VelocityVerlet::new(COLLISION_DT), 1);
        assert!(err.is_err());
        assert_eq!(sys.coords, coords_before);
        assert_eq!(sys.velocities, velocities_before);
    }

    #[test]
    fn test_failure_after_drift_rolls_back_langevin() {
        // zero friction makes the noise step the identity, so the collision
        // course stays exact
        let mut sys = colliding_dimer();
        let coords_before = sys.coords.clone();
        let velocities_before = sys.velocities.clone();

        let err = simulate(&mut sys, &mut Langevin::new(COLLISION_DT, 300.0, 0.0, 1), 1);
        assert!(err.is_err());
        assert_eq!(sys.coords, coords_before);
        assert_eq!(sys.velocities, velocities_before);
    }
}
