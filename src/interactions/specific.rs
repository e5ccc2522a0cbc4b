//! Bonded interactions over indexed tuples of atoms.

use na::SVector;

use crate::boundary::SimulationBox;
use crate::errors::{CorundumError, Result};

/// `½ kb (r - b0)²` stretch between two atoms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicBond {
    pub b0: f64,
    pub kb: f64,
}

/// `½ kθ (θ - θ0)²` bend over three atoms with the middle atom central.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonicAngle {
    pub th0: f64,
    pub kth: f64,
}

/// `k (1 + cos(n φ - φ0))` torsion over four atoms.
///
/// Proper and improper torsions share this kernel; they differ only in how
/// the four atom indices are chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicTorsion {
    pub phi0: f64,
    pub k: f64,
    pub n: i32,
}

/// Parallel index arrays plus one parameter record per item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecificList2<P> {
    pub is: Vec<usize>,
    pub js: Vec<usize>,
    pub params: Vec<P>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecificList3<P> {
    pub is: Vec<usize>,
    pub js: Vec<usize>,
    pub ks: Vec<usize>,
    pub params: Vec<P>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecificList4<P> {
    pub is: Vec<usize>,
    pub js: Vec<usize>,
    pub ks: Vec<usize>,
    pub ls: Vec<usize>,
    pub params: Vec<P>,
}

fn check_lengths(expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(CorundumError::RaggedInteractionList { expected, found })
    }
}

impl<P> SpecificList2<P> {
    pub fn new(is: Vec<usize>, js: Vec<usize>, params: Vec<P>) -> Result<Self> {
        check_lengths(params.len(), is.len())?;
        check_lengths(params.len(), js.len())?;
        Ok(Self { is, js, params })
    }

    fn index_iter(&self) -> impl Iterator<Item = &usize> {
        self.is.iter().chain(self.js.iter())
    }
}

impl<P> SpecificList3<P> {
    pub fn new(is: Vec<usize>, js: Vec<usize>, ks: Vec<usize>, params: Vec<P>) -> Result<Self> {
        check_lengths(params.len(), is.len())?;
        check_lengths(params.len(), js.len())?;
        check_lengths(params.len(), ks.len())?;
        Ok(Self { is, js, ks, params })
    }

    fn index_iter(&self) -> impl Iterator<Item = &usize> {
        self.is.iter().chain(self.js.iter()).chain(self.ks.iter())
    }
}

impl<P> SpecificList4<P> {
    pub fn new(
        is: Vec<usize>,
        js: Vec<usize>,
        ks: Vec<usize>,
        ls: Vec<usize>,
        params: Vec<P>,
    ) -> Result<Self> {
        check_lengths(params.len(), is.len())?;
        check_lengths(params.len(), js.len())?;
        check_lengths(params.len(), ks.len())?;
        check_lengths(params.len(), ls.len())?;
        Ok(Self {
            is,
            js,
            ks,
            ls,
            params,
        })
    }

    fn index_iter(&self) -> impl Iterator<Item = &usize> {
        self.is
            .iter()
            .chain(self.js.iter())
            .chain(self.ks.iter())
            .chain(self.ls.iter())
    }
}

/// A list of bonded interactions of one kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecificInteractions {
    Bonds(SpecificList2<HarmonicBond>),
    Angles(SpecificList3<HarmonicAngle>),
    ProperTorsions(SpecificList4<PeriodicTorsion>),
    ImproperTorsions(SpecificList4<PeriodicTorsion>),
}

impl SpecificInteractions {
    /// Arity of the atom tuples in this list.
    pub fn arity(&self) -> usize {
        match self {
            SpecificInteractions::Bonds(_) => 2,
            SpecificInteractions::Angles(_) => 3,
            SpecificInteractions::ProperTorsions(_) | SpecificInteractions::ImproperTorsions(_) => 4,
        }
    }

    /// Checks that every atom index lies in `[0, n_atoms)`.
    pub fn validate_indices(&self, n_atoms: usize) -> Result<()> {
        let bad = match self {
            SpecificInteractions::Bonds(list) => list.index_iter().find(|&&i| i >= n_atoms),
            SpecificInteractions::Angles(list) => list.index_iter().find(|&&i| i >= n_atoms),
            SpecificInteractions::ProperTorsions(list)
            | SpecificInteractions::ImproperTorsions(list) => {
                list.index_iter().find(|&&i| i >= n_atoms)
            }
        };
        match bad {
            Some(&index) => Err(CorundumError::InvalidAtomIndex { index, n_atoms }),
            None => Ok(()),
        }
    }

    /// Scatters the forces of every item into the per-atom accumulator.
    pub fn accumulate_forces<const D: usize>(
        &self,
        coords: &[SVector<f64, D>],
        boundary: &SimulationBox<D>,
        forces: &mut [SVector<f64, D>],
    ) {
        match self {
            SpecificInteractions::Bonds(list) => {
                for idx in 0..list.params.len() {
                    let (i, j) = (list.is[idx], list.js[idx]);
                    let bond = &list.params[idx];
                    let dr = boundary.displacement(&coords[j], &coords[i]);
                    let r = dr.norm();
                    let f_i = dr * (bond.kb * (r - bond.b0) / r);
                    forces[i] += f_i;
                    forces[j] -= f_i;
                }
            }
            SpecificInteractions::Angles(list) => {
                for idx in 0..list.params.len() {
                    let (i, j, k) = (list.is[idx], list.js[idx], list.ks[idx]);
                    let angle = &list.params[idx];
                    let r_ji = boundary.displacement(&coords[i], &coords[j]);
                    let r_jk = boundary.displacement(&coords[k], &coords[j]);
                    let (r1, r2) = (r_ji.norm(), r_jk.norm());
                    let cos_theta = (r_ji.dot(&r_jk) / (r1 * r2)).clamp(-1.0, 1.0);
                    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
                    if sin_theta < 1e-10 {
                        continue;
                    }
                    let dudtheta = angle.kth * (cos_theta.acos() - angle.th0);
                    let grad_cos_i = r_jk / (r1 * r2) - r_ji * (cos_theta / (r1 * r1));
                    let grad_cos_k = r_ji / (r1 * r2) - r_jk * (cos_theta / (r2 * r2));
                    let f_i = grad_cos_i * (dudtheta / sin_theta);
                    let f_k = grad_cos_k * (dudtheta / sin_theta);
                    forces[i] += f_i;
                    forces[k] += f_k;
                    forces[j] -= f_i + f_k;
                }
            }
            SpecificInteractions::ProperTorsions(list)
            | SpecificInteractions::ImproperTorsions(list) => {
                for idx in 0..list.params.len() {
                    let (i, j, k, l) = (list.is[idx], list.js[idx], list.ks[idx], list.ls[idx]);
                    let torsion = &list.params[idx];
                    let b1 = boundary.displacement(&coords[j], &coords[i]);
                    let b2 = boundary.displacement(&coords[k], &coords[j]);
                    let b3 = boundary.displacement(&coords[l], &coords[k]);
                    let n1 = cross(&b1, &b2);
                    let n2 = cross(&b2, &b3);
                    let (n1_sq, n2_sq) = (n1.norm_squared(), n2.norm_squared());
                    if n1_sq < 1e-20 || n2_sq < 1e-20 {
                        continue;
                    }
                    let b2_norm = b2.norm();
                    let phi = torsion_angle(&n1, &n2, &b2, b2_norm);
                    let dudphi =
                        -torsion.k * torsion.n as f64 * (torsion.n as f64 * phi - torsion.phi0).sin();

                    let dphi_i = n1 * (b2_norm / n1_sq);
                    let dphi_l = n2 * (-b2_norm / n2_sq);
                    let p = b1.dot(&b2) / (b2_norm * b2_norm);
                    let q = b3.dot(&b2) / (b2_norm * b2_norm);
                    let dphi_j = dphi_i * (p - 1.0) - dphi_l * q;
                    let dphi_k = dphi_l * (q - 1.0) - dphi_i * p;

                    forces[i] -= dphi_i * dudphi;
                    forces[j] -= dphi_j * dudphi;
                    forces[k] -= dphi_k * dudphi;
                    forces[l] -= dphi_l * dudphi;
                }
            }
        }
    }

    /// Total energy of the list.
    pub fn potential_energy<const D: usize>(
        &self,
        coords: &[SVector<f64, D>],
        boundary: &SimulationBox<D>,
    ) -> f64 {
        match self {
            SpecificInteractions::Bonds(list) => {
                let mut energy = 0.0;
                for idx in 0..list.params.len() {
                    let bond = &list.params[idx];
                    let dr = boundary.displacement(&coords[list.js[idx]], &coords[list.is[idx]]);
                    energy += 0.5 * bond.kb * (dr.norm() - bond.b0).powi(2);
                }
                energy
            }
            SpecificInteractions::Angles(list) => {
                let mut energy = 0.0;
                for idx in 0..list.params.len() {
                    let angle = &list.params[idx];
                    let r_ji = boundary.displacement(&coords[list.is[idx]], &coords[list.js[idx]]);
                    let r_jk = boundary.displacement(&coords[list.ks[idx]], &coords[list.js[idx]]);
                    let cos_theta =
                        (r_ji.dot(&r_jk) / (r_ji.norm() * r_jk.norm())).clamp(-1.0, 1.0);
                    energy += 0.5 * angle.kth * (cos_theta.acos() - angle.th0).powi(2);
                }
                energy
            }
            SpecificInteractions::ProperTorsions(list)
            | SpecificInteractions::ImproperTorsions(list) => {
                let mut energy = 0.0;
                for idx in 0..list.params.len() {
                    let torsion = &list.params[idx];
                    let b1 =
                        boundary.displacement(&coords[list.js[idx]], &coords[list.is[idx]]);
                    let b2 =
                        boundary.displacement(&coords[list.ks[idx]], &coords[list.js[idx]]);
                    let b3 =
                        boundary.displacement(&coords[list.ls[idx]], &coords[list.ks[idx]]);
                    let n1 = cross(&b1, &b2);
                    let n2 = cross(&b2, &b3);
                    if n1.norm_squared() < 1e-20 || n2.norm_squared() < 1e-20 {
                        continue;
                    }
                    let phi = torsion_angle(&n1, &n2, &b2, b2.norm());
                    energy += torsion.k * (1.0 + (torsion.n as f64 * phi - torsion.phi0).cos());
                }
                energy
            }
        }
    }
}

/// Torsion angle from the plane normals, signed by the middle bond.
#[inline]
fn torsion_angle<const D: usize>(
    n1: &SVector<f64, D>,
    n2: &SVector<f64, D>,
    b2: &SVector<f64, D>,
    b2_norm: f64,
) -> f64 {
    let m1 = cross(n1, &(b2 / b2_norm));
    m1.dot(n2).atan2(n1.dot(n2))
}

// Torsion lists are validated to three dimensions at system construction,
// so the components beyond the third are never populated here.
#[inline]
fn cross<const D: usize>(a: &SVector<f64, D>, b: &SVector<f64, D>) -> SVector<f64, D> {
    let at = |v: &SVector<f64, D>, k: usize| if k < D { v[k] } else { 0.0 };
    let c = [
        at(a, 1) * at(b, 2) - at(a, 2) * at(b, 1),
        at(a, 2) * at(b, 0) - at(a, 0) * at(b, 2),
        at(a, 0) * at(b, 1) - at(a, 1) * at(b, 0),
    ];
    let mut out = SVector::zeros();
    for k in 0..D.min(3) {
        out[k] = c[k];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use na::Vector3;

    fn big_box() -> SimulationBox<3> {
        SimulationBox::new(Vector3::new(100.0, 100.0, 100.0)).unwrap()
    }

    /// Central difference check of every analytic force component.
    fn assert_forces_match_gradient(
        inter: &SpecificInteractions,
        coords: &[Vector3<f64>],
        boundary: &SimulationBox<3>,
        tol: f64,
    ) {
        let mut forces = vec![Vector3::zeros(); coords.len()];
        inter.accumulate_forces(coords, boundary, &mut forces);

        let h = 1e-6;
        for atom in 0..coords.len() {
            for axis in 0..3 {
                let mut plus = coords.to_vec();
                plus[atom][axis] += h;
                let mut minus = coords.to_vec();
                minus[atom][axis] -= h;
                let numeric = -(inter.potential_energy(&plus, boundary)
                    - inter.potential_energy(&minus, boundary))
                    / (2.0 * h);
                assert_relative_eq!(forces[atom][axis], numeric, epsilon = tol, max_relative = tol);
            }
        }
    }

    #[test]
    fn test_bond_at_equilibrium_has_no_force_or_energy() {
        let bonds = SpecificInteractions::Bonds(
            SpecificList2::new(vec![0], vec![1], vec![HarmonicBond { b0: 0.1, kb: 1000.0 }])
                .unwrap(),
        );
        let coords = vec![Vector3::zeros(), Vector3::new(0.1, 0.0, 0.0)];
        let boundary = big_box();

        assert_relative_eq!(bonds.potential_energy(&coords, &boundary), 0.0, epsilon = 1e-12);
        let mut forces = vec![Vector3::zeros(); 2];
        bonds.accumulate_forces(&coords, &boundary, &mut forces);
        assert_relative_eq!(forces[0].norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_bond_energy_value_and_gradient() {
        let bonds = SpecificInteractions::Bonds(
            SpecificList2::new(vec![0], vec![1], vec![HarmonicBond { b0: 0.1, kb: 1000.0 }])
                .unwrap(),
        );
        let coords = vec![Vector3::zeros(), Vector3::new(0.13, 0.02, -0.01)];
        let boundary = big_box();

        let r = coords[1].norm();
        let expected = 0.5 * 1000.0 * (r - 0.1) * (r - 0.1);
        assert_relative_eq!(bonds.potential_energy(&coords, &boundary), expected, epsilon = 1e-10);
        assert_forces_match_gradient(&bonds, &coords, &boundary, 1e-4);
    }

    #[test]
    fn test_bond_across_periodic_boundary() {
        let bonds = SpecificInteractions::Bonds(
            SpecificList2::new(vec![0], vec![1], vec![HarmonicBond { b0: 0.1, kb: 1000.0 }])
                .unwrap(),
        );
        let boundary = SimulationBox::new(Vector3::new(2.0, 2.0, 2.0)).unwrap();
        // separated by 0.1 through the boundary, not 1.9 across the box
        let coords = vec![
            Vector3::new(0.05, 1.0, 1.0),
            Vector3::new(1.95, 1.0, 1.0),
        ];
        assert_relative_eq!(bonds.potential_energy(&coords, &boundary), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_angle_at_equilibrium_and_gradient() {
        let th0 = 1.9;
        let angles = SpecificInteractions::Angles(
            SpecificList3::new(
                vec![0],
                vec![1],
                vec![2],
                vec![HarmonicAngle { th0, kth: 500.0 }],
            )
            .unwrap(),
        );
        let boundary = big_box();

        // place k so the angle at j is exactly th0
        let coords_eq = vec![
            Vector3::new(0.1, 0.0, 0.0),
            Vector3::zeros(),
            Vector3::new(0.12 * th0.cos(), 0.12 * th0.sin(), 0.0),
        ];
        let mut forces = vec![Vector3::zeros(); 3];
        angles.accumulate_forces(&coords_eq, &boundary, &mut forces);
        for f in &forces {
            assert_relative_eq!(f.norm(), 0.0, epsilon = 1e-9);
        }

        let coords = vec![
            Vector3::new(0.11, 0.01, -0.02),
            Vector3::zeros(),
            Vector3::new(-0.03, 0.1, 0.04),
        ];
        assert_forces_match_gradient(&angles, &coords, &boundary, 1e-4);

        // bending forces sum to zero
        let mut forces = vec![Vector3::zeros(); 3];
        angles.accumulate_forces(&coords, &boundary, &mut forces);
        let total: Vector3<f64> = forces.iter().sum();
        assert_relative_eq!(total.norm(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_torsion_energy_at_known_angles() {
        let torsions = SpecificInteractions::ProperTorsions(
            SpecificList4::new(
                vec![0],
                vec![1],
                vec![2],
                vec![3],
                vec![PeriodicTorsion {
                    phi0: 0.0,
                    k: 2.0,
                    n: 1,
                }],
            )
            .unwrap(),
        );
        let boundary = big_box();

        // cis configuration: φ = 0 → U = k(1 + cos 0) = 2k
        let cis = vec![
            Vector3::new(0.0, 0.1, 0.0),
            Vector3::zeros(),
            Vector3::new(0.1, 0.0, 0.0),
            Vector3::new(0.1, 0.1, 0.0),
        ];
        assert_relative_eq!(torsions.potential_energy(&cis, &boundary), 4.0, epsilon = 1e-10);

        // trans configuration: φ = π → U = 0
        let trans = vec![
            Vector3::new(0.0, 0.1, 0.0),
            Vector3::zeros(),
            Vector3::new(0.1, 0.0, 0.0),
            Vector3::new(0.1, -0.1, 0.0),
        ];
        assert_relative_eq!(torsions.potential_energy(&trans, &boundary), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_torsion_gradient_and_momentum() {
        let torsions = SpecificInteractions::ProperTorsions(
            SpecificList4::new(
                vec![0],
                vec![1],
                vec![2],
                vec![3],
                vec![PeriodicTorsion {
                    phi0: 0.5,
                    k: 3.0,
                    n: 2,
                }],
            )
            .unwrap(),
        );
        let boundary = big_box();
        let coords = vec![
            Vector3::new(0.02, 0.11, 0.01),
            Vector3::zeros(),
            Vector3::new(0.1, 0.0, -0.01),
            Vector3::new(0.13, 0.08, 0.06),
        ];

        assert_forces_match_gradient(&torsions, &coords, &boundary, 1e-4);

        let mut forces = vec![Vector3::zeros(); 4];
        torsions.accumulate_forces(&coords, &boundary, &mut forces);
        let total: Vector3<f64> = forces.iter().sum();
        assert_relative_eq!(total.norm(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_improper_uses_same_kernel() {
        let params = vec![PeriodicTorsion {
            phi0: 0.0,
            k: 1.5,
            n: 2,
        }];
        let proper = SpecificInteractions::ProperTorsions(
            SpecificList4::new(vec![0], vec![1], vec![2], vec![3], params.clone()).unwrap(),
        );
        let improper = SpecificInteractions::ImproperTorsions(
            SpecificList4::new(vec![0], vec![1], vec![2], vec![3], params).unwrap(),
        );
        let boundary = big_box();
        let coords = vec![
            Vector3::new(0.02, 0.11, 0.01),
            Vector3::zeros(),
            Vector3::new(0.1, 0.0, -0.01),
            Vector3::new(0.13, 0.08, 0.06),
        ];
        assert_relative_eq!(
            proper.potential_energy(&coords, &boundary),
            improper.potential_energy(&coords, &boundary),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_ragged_lists_are_rejected() {
        assert!(SpecificList2::new(vec![0, 1], vec![1], vec![HarmonicBond {
            b0: 0.1,
            kb: 1.0
        }])
        .is_err());
        assert!(SpecificList3::new(
            vec![0],
            vec![1],
            vec![],
            vec![HarmonicAngle { th0: 1.0, kth: 1.0 }]
        )
        .is_err());
    }

    #[test]
    fn test_out_of_range_indices_are_rejected() {
        let bonds = SpecificInteractions::Bonds(
            SpecificList2::new(vec![0], vec![5], vec![HarmonicBond { b0: 0.1, kb: 1.0 }]).unwrap(),
        );
        assert!(bonds.validate_indices(2).is_err());
        assert!(bonds.validate_indices(6).is_ok());
    }
}
