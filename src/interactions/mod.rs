//! The pairwise and specific (bonded) interactions acting between atoms.

pub mod pairwise;
pub mod specific;

pub use pairwise::{
    Coulomb, CoulombReactionField, Gravity, LennardJones, LennardJonesSoftCore, Mie, MixingRule,
    Pairwise, SoftSphere,
};
pub use specific::{
    HarmonicAngle, HarmonicBond, PeriodicTorsion, SpecificInteractions, SpecificList2,
    SpecificList3, SpecificList4,
};
