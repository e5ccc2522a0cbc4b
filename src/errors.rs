use thiserror::Error;

use crate::system::UnitSystem;

#[derive(Error, Debug)]
pub enum CorundumError {
    // Construction errors
    #[error("length mismatch: {coords} coordinates and {velocities} velocities for {atoms} atoms")]
    LengthMismatch {
        atoms: usize,
        coords: usize,
        velocities: usize,
    },

    #[error("box extent along axis {axis} must be positive, got {extent}")]
    InvalidBoxExtent { axis: usize, extent: f64 },

    #[error("interaction uses {interaction} units but the system uses {system}")]
    UnitMismatch {
        interaction: UnitSystem,
        system: UnitSystem,
    },

    #[error("atom index {index} out of range (total atoms: {n_atoms})")]
    InvalidAtomIndex { index: usize, n_atoms: usize },

    #[error("interaction list index arrays have length {found}, expected {expected}")]
    RaggedInteractionList { expected: usize, found: usize },

    #[error("invalid interaction: {reason}")]
    InvalidInteraction { reason: String },

    #[error("exclusion matrix is {rows}x{cols} but the system has {n_atoms} atoms")]
    ExclusionMatrixShape {
        rows: usize,
        cols: usize,
        n_atoms: usize,
    },

    // Physics errors
    #[error("atom {atom} has a non-finite force component at step {step}")]
    NonFiniteForce { atom: usize, step: usize },

    // File I/O errors
    #[error("failed to create trajectory file '{path}': {source}")]
    TrajectoryFileError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write trajectory frame: {source}")]
    TrajectoryWriteError {
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CorundumError>;
