//! The pairwise non-bonded interactions and their closed-form kernels.
//!
//! Every kernel is a pure function of the squared pair distance and the
//! mixed pair parameters, returning `(force/r, energy)`. The [`Pairwise`]
//! enum dispatches by match so each kernel monomorphises in the pair loop.

use na::SVector;

use crate::constants::COULOMB_KJPERMOLENM;
use crate::cutoffs::Cutoff;
use crate::errors::{CorundumError, Result};
use crate::system::{Atom, UnitSystem};

/// How the Lennard-Jones diameters of two atoms combine.
///
/// The well depth always combines geometrically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixingRule {
    /// Arithmetic mean of the diameters.
    LorentzBerthelot,
    /// Geometric mean of the diameters.
    Geometric,
}

fn mix_lj(rule: MixingRule, weight_solute_solvent: f64, ai: &Atom, aj: &Atom) -> (f64, f64) {
    let sigma = match rule {
        MixingRule::LorentzBerthelot => 0.5 * (ai.sigma + aj.sigma),
        MixingRule::Geometric => (ai.sigma * aj.sigma).sqrt(),
    };
    let mut epsilon = (ai.epsilon * aj.epsilon).sqrt();
    if ai.solute != aj.solute {
        epsilon *= weight_solute_solvent;
    }
    (sigma, epsilon)
}

fn lj_zero_shortcut(ai: &Atom, aj: &Atom) -> bool {
    ai.sigma == 0.0 || ai.epsilon == 0.0 || aj.sigma == 0.0 || aj.epsilon == 0.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJones {
    pub cutoff: Cutoff,
    pub nl_only: bool,
    pub mixing: MixingRule,
    pub weight_14: f64,
    pub weight_solute_solvent: f64,
    pub skip_shortcut: bool,
    pub units: UnitSystem,
}

impl Default for LennardJones {
    fn default() -> Self {
        Self {
            cutoff: Cutoff::None,
            nl_only: false,
            mixing: MixingRule::LorentzBerthelot,
            weight_14: 1.0,
            weight_solute_solvent: 1.0,
            skip_shortcut: false,
            units: UnitSystem::Md,
        }
    }
}

impl LennardJones {
    pub fn new(cutoff: Cutoff, nl_only: bool) -> Self {
        Self {
            cutoff,
            nl_only,
            ..Default::default()
        }
    }
}

#[inline]
fn lj_kernel(r2: f64, sigma2: f64, epsilon: f64) -> (f64, f64) {
    let s6 = (sigma2 / r2).powi(3);
    let s12 = s6 * s6;
    (
        24.0 * epsilon * (2.0 * s12 - s6) / r2,
        4.0 * epsilon * (s12 - s6),
    )
}

/// Lennard-Jones with the singularity softened by an alchemical coupling
/// parameter, `r → (r⁶ + ασ⁶λᵖ)^(1/6)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LennardJonesSoftCore {
    pub cutoff: Cutoff,
    pub nl_only: bool,
    pub mixing: MixingRule,
    pub alpha: f64,
    pub lambda: f64,
    pub p: f64,
    pub weight_14: f64,
    pub weight_solute_solvent: f64,
    pub skip_shortcut: bool,
    pub units: UnitSystem,
    /// α·λᵖ, fixed at construction.
    sc_factor: f64,
}

impl LennardJonesSoftCore {
    pub fn new(alpha: f64, lambda: f64, p: f64, cutoff: Cutoff, nl_only: bool) -> Self {
        Self {
            cutoff,
            nl_only,
            mixing: MixingRule::LorentzBerthelot,
            alpha,
            lambda,
            p,
            weight_14: 1.0,
            weight_solute_solvent: 1.0,
            skip_shortcut: false,
            units: UnitSystem::Md,
            sc_factor: alpha * lambda.powf(p),
        }
    }
}

#[inline]
fn lj_soft_core_kernel(r2: f64, sigma2: f64, epsilon: f64, sc_factor: f64) -> (f64, f64) {
    let sigma6 = sigma2 * sigma2 * sigma2;
    // inverse sixth power of the soft-core distance r_sc
    let inv_rsc6 = 1.0 / (r2 * r2 * r2 + sc_factor * sigma6);
    let s6 = sigma6 * inv_rsc6;
    let s12 = s6 * s6;
    // the (r/r_sc)⁵ factor folded in: F/r = 24ε(2s¹²−s⁶)·r⁴/r_sc⁶
    (
        24.0 * epsilon * (2.0 * s12 - s6) * r2 * r2 * inv_rsc6,
        4.0 * epsilon * (s12 - s6),
    )
}

/// Purely repulsive `4ϵ(σ/r)¹²` sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftSphere {
    pub cutoff: Cutoff,
    pub nl_only: bool,
    pub mixing: MixingRule,
    pub weight_14: f64,
    pub weight_solute_solvent: f64,
    pub skip_shortcut: bool,
    pub units: UnitSystem,
}

impl SoftSphere {
    pub fn new(cutoff: Cutoff, nl_only: bool) -> Self {
        Self {
            cutoff,
            nl_only,
            mixing: MixingRule::LorentzBerthelot,
            weight_14: 1.0,
            weight_solute_solvent: 1.0,
            skip_shortcut: false,
            units: UnitSystem::Md,
        }
    }
}

#[inline]
fn soft_sphere_kernel(r2: f64, sigma2: f64, epsilon: f64) -> (f64, f64) {
    let s6 = (sigma2 / r2).powi(3);
    let s12 = s6 * s6;
    (48.0 * epsilon * s12 / r2, 4.0 * epsilon * s12)
}

/// Generalised Lennard-Jones with attractive exponent `m` and repulsive
/// exponent `n`, `m < n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mie {
    pub m: f64,
    pub n: f64,
    pub cutoff: Cutoff,
    pub nl_only: bool,
    pub mixing: MixingRule,
    pub weight_14: f64,
    pub weight_solute_solvent: f64,
    pub skip_shortcut: bool,
    pub units: UnitSystem,
    /// (n/(n−m))·(n/m)^(m/(n−m)), fixed at construction.
    prefactor: f64,
}

impl Mie {
    pub fn new(m: f64, n: f64, cutoff: Cutoff, nl_only: bool) -> Result<Self> {
        if m >= n {
            return Err(CorundumError::InvalidInteraction {
                reason: format!(
                    "Mie attractive exponent must be below the repulsive one, got m = {m}, n = {n}"
                ),
            });
        }
        Ok(Self {
            m,
            n,
            cutoff,
            nl_only,
            mixing: MixingRule::LorentzBerthelot,
            weight_14: 1.0,
            weight_solute_solvent: 1.0,
            skip_shortcut: false,
            units: UnitSystem::Md,
            prefactor: (n / (n - m)) * (n / m).powf(m / (n - m)),
        })
    }
}

#[inline]
fn mie_kernel(r2: f64, sigma2: f64, epsilon: f64, m: f64, n: f64, prefactor: f64) -> (f64, f64) {
    let s = (sigma2 / r2).sqrt();
    let s_m = s.powf(m);
    let s_n = s.powf(n);
    let const_eps = prefactor * epsilon;
    (
        const_eps * (n * s_n - m * s_m) / r2,
        const_eps * (s_n - s_m),
    )
}

/// Plain Coulomb electrostatics between partial charges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coulomb {
    pub cutoff: Cutoff,
    pub nl_only: bool,
    pub weight_14: f64,
    pub coulomb_const: f64,
    pub units: UnitSystem,
}

impl Default for Coulomb {
    fn default() -> Self {
        Self {
            cutoff: Cutoff::None,
            nl_only: false,
            weight_14: 1.0,
            coulomb_const: COULOMB_KJPERMOLENM,
            units: UnitSystem::Md,
        }
    }
}

impl Coulomb {
    pub fn new(cutoff: Cutoff, nl_only: bool) -> Self {
        Self {
            cutoff,
            nl_only,
            ..Default::default()
        }
    }
}

#[inline]
fn coulomb_kernel(r2: f64, kqq: f64) -> (f64, f64) {
    let inv_r = 1.0 / r2.sqrt();
    (kqq * inv_r / r2, kqq * inv_r)
}

/// Coulomb electrostatics with a reaction-field correction for the
/// continuum dielectric beyond the cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoulombReactionField {
    pub dist_cutoff: f64,
    pub solvent_dielectric: f64,
    pub nl_only: bool,
    pub weight_14: f64,
    pub coulomb_const: f64,
    pub units: UnitSystem,
    sqdist_cutoff: f64,
    krf: f64,
    crf: f64,
}

impl CoulombReactionField {
    pub fn new(dist_cutoff: f64, solvent_dielectric: f64, nl_only: bool) -> Self {
        let eps = solvent_dielectric;
        Self {
            dist_cutoff,
            solvent_dielectric,
            nl_only,
            weight_14: 1.0,
            coulomb_const: COULOMB_KJPERMOLENM,
            units: UnitSystem::Md,
            sqdist_cutoff: dist_cutoff * dist_cutoff,
            krf: (eps - 1.0) / ((2.0 * eps + 1.0) * dist_cutoff.powi(3)),
            crf: 3.0 * eps / ((2.0 * eps + 1.0) * dist_cutoff),
        }
    }
}

#[inline]
fn reaction_field_kernel(r2: f64, kqq: f64, krf: f64, crf: f64) -> (f64, f64) {
    let inv_r = 1.0 / r2.sqrt();
    (
        kqq * (inv_r / r2 - 2.0 * krf),
        kqq * (inv_r + krf * r2 - crf),
    )
}

/// Newtonian gravity between point masses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gravity {
    pub g: f64,
    pub nl_only: bool,
    pub units: UnitSystem,
}

impl Gravity {
    pub fn new(g: f64) -> Self {
        Self {
            g,
            nl_only: false,
            units: UnitSystem::Md,
        }
    }
}

#[inline]
fn gravity_kernel(r2: f64, gmm: f64) -> (f64, f64) {
    let inv_r = 1.0 / r2.sqrt();
    (-gmm * inv_r / r2, -gmm * inv_r)
}

/// A pairwise interaction of any supported kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pairwise {
    LennardJones(LennardJones),
    LennardJonesSoftCore(LennardJonesSoftCore),
    SoftSphere(SoftSphere),
    Mie(Mie),
    Coulomb(Coulomb),
    CoulombReactionField(CoulombReactionField),
    Gravity(Gravity),
}

impl Pairwise {
    /// Whether the pair loop should traverse the neighbour list for this
    /// interaction rather than all pairs.
    pub fn nl_only(&self) -> bool {
        match self {
            Pairwise::LennardJones(inter) => inter.nl_only,
            Pairwise::LennardJonesSoftCore(inter) => inter.nl_only,
            Pairwise::SoftSphere(inter) => inter.nl_only,
            Pairwise::Mie(inter) => inter.nl_only,
            Pairwise::Coulomb(inter) => inter.nl_only,
            Pairwise::CoulombReactionField(inter) => inter.nl_only,
            Pairwise::Gravity(inter) => inter.nl_only,
        }
    }

    pub fn units(&self) -> UnitSystem {
        match self {
            Pairwise::LennardJones(inter) => inter.units,
            Pairwise::LennardJonesSoftCore(inter) => inter.units,
            Pairwise::SoftSphere(inter) => inter.units,
            Pairwise::Mie(inter) => inter.units,
            Pairwise::Coulomb(inter) => inter.units,
            Pairwise::CoulombReactionField(inter) => inter.units,
            Pairwise::Gravity(inter) => inter.units,
        }
    }

    /// `(force/r, energy)` for a pair at squared distance `r2`, with mixing
    /// rules, solute weighting, the cutoff policy and any 1-4 weight applied.
    pub fn force_divr_energy(&self, r2: f64, ai: &Atom, aj: &Atom, is_14: bool) -> (f64, f64) {
        match self {
            Pairwise::LennardJones(inter) => {
                if !inter.skip_shortcut && lj_zero_shortcut(ai, aj) {
                    return (0.0, 0.0);
                }
                let (sigma, epsilon) = mix_lj(inter.mixing, inter.weight_solute_solvent, ai, aj);
                let sigma2 = sigma * sigma;
                let out = inter.cutoff.apply(r2, |r2| lj_kernel(r2, sigma2, epsilon));
                weight_14(out, is_14, inter.weight_14)
            }
            Pairwise::LennardJonesSoftCore(inter) => {
                if !inter.skip_shortcut && lj_zero_shortcut(ai, aj) {
                    return (0.0, 0.0);
                }
                let (sigma, epsilon) = mix_lj(inter.mixing, inter.weight_solute_solvent, ai, aj);
                let sigma2 = sigma * sigma;
                let out = inter
                    .cutoff
                    .apply(r2, |r2| lj_soft_core_kernel(r2, sigma2, epsilon, inter.sc_factor));
                weight_14(out, is_14, inter.weight_14)
            }
            Pairwise::SoftSphere(inter) => {
                if !inter.skip_shortcut && lj_zero_shortcut(ai, aj) {
                    return (0.0, 0.0);
                }
                let (sigma, epsilon) = mix_lj(inter.mixing, inter.weight_solute_solvent, ai, aj);
                let sigma2 = sigma * sigma;
                let out = inter
                    .cutoff
                    .apply(r2, |r2| soft_sphere_kernel(r2, sigma2, epsilon));
                weight_14(out, is_14, inter.weight_14)
            }
            Pairwise::Mie(inter) => {
                if !inter.skip_shortcut && lj_zero_shortcut(ai, aj) {
                    return (0.0, 0.0);
                }
                let (sigma, epsilon) = mix_lj(inter.mixing, inter.weight_solute_solvent, ai, aj);
                let sigma2 = sigma * sigma;
                let out = inter.cutoff.apply(r2, |r2| {
                    mie_kernel(r2, sigma2, epsilon, inter.m, inter.n, inter.prefactor)
                });
                weight_14(out, is_14, inter.weight_14)
            }
            Pairwise::Coulomb(inter) => {
                let kqq = inter.coulomb_const * ai.charge * aj.charge;
                let out = inter.cutoff.apply(r2, |r2| coulomb_kernel(r2, kqq));
                weight_14(out, is_14, inter.weight_14)
            }
            Pairwise::CoulombReactionField(inter) => {
                if r2 > inter.sqdist_cutoff {
                    return (0.0, 0.0);
                }
                let kqq = inter.coulomb_const * ai.charge * aj.charge;
                let out = reaction_field_kernel(r2, kqq, inter.krf, inter.crf);
                weight_14(out, is_14, inter.weight_14)
            }
            Pairwise::Gravity(inter) => gravity_kernel(r2, inter.g * ai.mass * aj.mass),
        }
    }

    /// The force on atom `i` given the minimum image displacement
    /// `dr = c_j - c_i`; the force on `j` is the negation.
    pub fn force<const D: usize>(
        &self,
        dr: &SVector<f64, D>,
        ai: &Atom,
        aj: &Atom,
        is_14: bool,
    ) -> SVector<f64, D> {
        let (force_divr, _) = self.force_divr_energy(dr.norm_squared(), ai, aj, is_14);
        -dr * force_divr
    }

    /// The pair energy, counted once per pair.
    pub fn potential_energy<const D: usize>(
        &self,
        dr: &SVector<f64, D>,
        ai: &Atom,
        aj: &Atom,
        is_14: bool,
    ) -> f64 {
        let (_, energy) = self.force_divr_energy(dr.norm_squared(), ai, aj, is_14);
        energy
    }
}

#[inline]
fn weight_14(out: (f64, f64), is_14: bool, weight: f64) -> (f64, f64) {
    if is_14 {
        (out.0 * weight, out.1 * weight)
    } else {
        out
    }
}
