//! Assembly of per-atom forces and scalar energies from the interactions.

use na::SVector;
use rayon::prelude::*;

use crate::errors::{CorundumError, Result};
use crate::neighbours::NeighbourList;
use crate::system::System;

/// Calls `visit(i, j, dr, is_14)` for every pair the interaction acts on:
/// the neighbour list for `nl_only` interactions, otherwise all non-excluded
/// `i < j` pairs.
fn visit_pairs<const D: usize>(
    sys: &System<D>,
    neighbours: &NeighbourList,
    nl_only: bool,
    mut visit: impl FnMut(usize, usize, SVector<f64, D>, bool),
) {
    if nl_only {
        for &(i, j, is_14) in &neighbours.pairs {
            let dr = sys.boundary.displacement(&sys.coords[j], &sys.coords[i]);
            visit(i, j, dr, is_14);
        }
    } else {
        let n = sys.n_atoms();
        for i in 0..n {
            for j in (i + 1)..n {
                if sys.neighbour_finder.excluded(i, j) {
                    continue;
                }
                let dr = sys.boundary.displacement(&sys.coords[j], &sys.coords[i]);
                visit(i, j, dr, sys.neighbour_finder.is_14(i, j));
            }
        }
    }
}

/// The force on every atom.
pub fn forces<const D: usize>(
    sys: &System<D>,
    neighbours: &NeighbourList,
) -> Vec<SVector<f64, D>> {
    let mut total = vec![SVector::zeros(); sys.n_atoms()];
    for inter in &sys.pairwise {
        visit_pairs(sys, neighbours, inter.nl_only(), |i, j, dr, is_14| {
            let force = inter.force(&dr, &sys.atoms[i], &sys.atoms[j], is_14);
            total[i] += force;
            total[j] -= force;
        });
    }
    for list in &sys.specific {
        list.accumulate_forces(&sys.coords, &sys.boundary, &mut total);
    }
    total
}

/// The force on every atom, with the pair traversal partitioned across
/// rayon workers into per-thread accumulators.
///
/// The reduction order is not fixed, so results can differ from the serial
/// path by floating point rounding (about 1e-12 relative).
pub fn forces_parallel<const D: usize>(
    sys: &System<D>,
    neighbours: &NeighbourList,
) -> Vec<SVector<f64, D>> {
    let n = sys.n_atoms();
    let zero = || vec![SVector::zeros(); n];
    let add = |mut a: Vec<SVector<f64, D>>, b: Vec<SVector<f64, D>>| {
        for (ai, bi) in a.iter_mut().zip(b) {
            *ai += bi;
        }
        a
    };

    let mut total = zero();
    for inter in &sys.pairwise {
        let partial = if inter.nl_only() {
            neighbours
                .pairs
                .par_chunks(512)
                .map(|chunk| {
                    let mut local = zero();
                    for &(i, j, is_14) in chunk {
                        let dr = sys.boundary.displacement(&sys.coords[j], &sys.coords[i]);
                        let force = inter.force(&dr, &sys.atoms[i], &sys.atoms[j], is_14);
                        local[i] += force;
                        local[j] -= force;
                    }
                    local
                })
                .reduce(zero, add)
        } else {
            (0..n)
                .into_par_iter()
                .map(|i| {
                    let mut local = zero();
                    for j in (i + 1)..n {
                        if sys.neighbour_finder.excluded(i, j) {
                            continue;
                        }
                        let dr = sys.boundary.displacement(&sys.coords[j], &sys.coords[i]);
                        let is_14 = sys.neighbour_finder.is_14(i, j);
                        let force = inter.force(&dr, &sys.atoms[i], &sys.atoms[j], is_14);
                        local[i] += force;
                        local[j] -= force;
                    }
                    local
                })
                .reduce(zero, add)
        };
        total = add(total, partial);
    }
    for list in &sys.specific {
        list.accumulate_forces(&sys.coords, &sys.boundary, &mut total);
    }
    total
}

/// Forces with the non-finite safety check of the integration loop.
pub fn checked_forces<const D: usize>(
    sys: &System<D>,
    neighbours: &NeighbourList,
    step: usize,
) -> Result<Vec<SVector<f64, D>>> {
    let forces = forces(sys, neighbours);
    for (atom, force) in forces.iter().enumerate() {
        if !force.iter().all(|component| component.is_finite()) {
            return Err(CorundumError::NonFiniteForce { atom, step });
        }
    }
    Ok(forces)
}

/// The acceleration of every atom, `F / m`.
pub fn accelerations<const D: usize>(
    sys: &System<D>,
    neighbours: &NeighbourList,
) -> Vec<SVector<f64, D>> {
    forces(sys, neighbours)
        .into_iter()
        .zip(sys.atoms.iter())
        .map(|(force, atom)| force / atom.mass)
        .collect()
}

/// Total potential energy, each pair and bonded item counted once.
pub fn potential_energy<const D: usize>(sys: &System<D>, neighbours: &NeighbourList) -> f64 {
    let mut energy = 0.0;
    for inter in &sys.pairwise {
        visit_pairs(sys, neighbours, inter.nl_only(), |i, j, dr, is_14| {
            energy += inter.potential_energy(&dr, &sys.atoms[i], &sys.atoms[j], is_14);
        });
    }
    for list in &sys.specific {
        energy += list.potential_energy(&sys.coords, &sys.boundary);
    }
    energy
}

/// Scalar pressure from the kinetic energy and the pair virial,
/// `P = (2·KE + W) / (D·V)` with `W = Σ r_ij · F_ij` over the pairwise
/// interactions.
pub fn virial_pressure<const D: usize>(sys: &System<D>, neighbours: &NeighbourList) -> f64 {
    let mut virial = 0.0;
    for inter in &sys.pairwise {
        visit_pairs(sys, neighbours, inter.nl_only(), |i, j, dr, is_14| {
            let (force_divr, _) =
                inter.force_divr_energy(dr.norm_squared(), &sys.atoms[i], &sys.atoms[j], is_14);
            virial += force_divr * dr.norm_squared();
        });
    }
    (2.0 * sys.kinetic_energy() + virial) / (D as f64 * sys.boundary.volume())
}
