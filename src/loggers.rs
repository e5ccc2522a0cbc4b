//! Observable loggers sampled on a period, and the trajectory file writer.

use std::fs::File;
use std::io::{BufWriter, Write};

use na::SVector;

use crate::errors::{CorundumError, Result};
use crate::forces::{potential_energy, virial_pressure};
use crate::neighbours::NeighbourList;
use crate::system::{System, UnitSystem};

/// A periodic observer of the running system.
///
/// On every step `s` with `s % period == 0` the logger captures its
/// observable into an append-only history (or writes a trajectory frame).
pub enum Logger<const D: usize> {
    Temperature {
        period: usize,
        history: Vec<f64>,
    },
    KineticEnergy {
        period: usize,
        history: Vec<f64>,
    },
    PotentialEnergy {
        period: usize,
        history: Vec<f64>,
    },
    TotalEnergy {
        period: usize,
        history: Vec<f64>,
    },
    Pressure {
        period: usize,
        history: Vec<f64>,
    },
    Coords {
        period: usize,
        history: Vec<Vec<SVector<f64, D>>>,
    },
    Velocities {
        period: usize,
        history: Vec<Vec<SVector<f64, D>>>,
    },
    Trajectory(TrajectoryWriter),
}

impl<const D: usize> Logger<D> {
    pub fn temperature(period: usize) -> Self {
        Logger::Temperature {
            period,
            history: Vec::new(),
        }
    }

    pub fn kinetic_energy(period: usize) -> Self {
        Logger::KineticEnergy {
            period,
            history: Vec::new(),
        }
    }

    pub fn potential_energy(period: usize) -> Self {
        Logger::PotentialEnergy {
            period,
            history: Vec::new(),
        }
    }

    pub fn total_energy(period: usize) -> Self {
        Logger::TotalEnergy {
            period,
            history: Vec::new(),
        }
    }

    pub fn pressure(period: usize) -> Self {
        Logger::Pressure {
            period,
            history: Vec::new(),
        }
    }

    pub fn coords(period: usize) -> Self {
        Logger::Coords {
            period,
            history: Vec::new(),
        }
    }

    pub fn velocities(period: usize) -> Self {
        Logger::Velocities {
            period,
            history: Vec::new(),
        }
    }

    pub fn trajectory(path: &str, period: usize) -> Result<Self> {
        Ok(Logger::Trajectory(TrajectoryWriter::new(path, period)?))
    }

    pub fn period(&self) -> usize {
        match self {
            Logger::Temperature { period, .. }
            | Logger::KineticEnergy { period, .. }
            | Logger::PotentialEnergy { period, .. }
            | Logger::TotalEnergy { period, .. }
            | Logger::Pressure { period, .. }
            | Logger::Coords { period, .. }
            | Logger::Velocities { period, .. } => *period,
            Logger::Trajectory(writer) => writer.period,
        }
    }

    /// The recorded scalar series, for the scalar observables.
    pub fn scalar_history(&self) -> Option<&[f64]> {
        match self {
            Logger::Temperature { history, .. }
            | Logger::KineticEnergy { history, .. }
            | Logger::PotentialEnergy { history, .. }
            | Logger::TotalEnergy { history, .. }
            | Logger::Pressure { history, .. } => Some(history),
            _ => None,
        }
    }

    /// The recorded per-atom vector snapshots, for coords and velocities.
    pub fn vector_history(&self) -> Option<&[Vec<SVector<f64, D>>]> {
        match self {
            Logger::Coords { history, .. } | Logger::Velocities { history, .. } => Some(history),
            _ => None,
        }
    }

    pub fn n_samples(&self) -> usize {
        match self {
            Logger::Trajectory(writer) => writer.frames_written,
            other => other
                .scalar_history()
                .map(|history| history.len())
                .or_else(|| other.vector_history().map(|history| history.len()))
                .unwrap_or(0),
        }
    }

    fn needs_potential_energy(&self) -> bool {
        matches!(
            self,
            Logger::PotentialEnergy { .. } | Logger::TotalEnergy { .. }
        )
    }

    fn needs_pressure(&self) -> bool {
        matches!(self, Logger::Pressure { .. })
    }

    fn record(
        &mut self,
        sys: &System<D>,
        step: usize,
        kinetic: f64,
        potential: f64,
        pressure: f64,
    ) -> Result<()> {
        if step % self.period() != 0 {
            return Ok(());
        }
        match self {
            Logger::Temperature { history, .. } => history.push(sys.temperature()),
            Logger::KineticEnergy { history, .. } => history.push(kinetic),
            Logger::PotentialEnergy { history, .. } => history.push(potential),
            Logger::TotalEnergy { history, .. } => history.push(kinetic + potential),
            Logger::Pressure { history, .. } => history.push(pressure),
            Logger::Coords { history, .. } => history.push(sys.coords.clone()),
            Logger::Velocities { history, .. } => history.push(sys.velocities.clone()),
            Logger::Trajectory(writer) => writer.write_frame(sys)?,
        }
        Ok(())
    }
}

/// Writes one PDB `MODEL`/`ENDMDL` frame per logging period.
pub struct TrajectoryWriter {
    period: usize,
    out: BufWriter<File>,
    frames_written: usize,
}

impl TrajectoryWriter {
    pub fn new(path: &str, period: usize) -> Result<Self> {
        let file = File::create(path).map_err(|source| CorundumError::TrajectoryFileError {
            path: path.to_string(),
            source,
        })?;
        Ok(Self {
            period,
            out: BufWriter::new(file),
            frames_written: 0,
        })
    }

    pub fn write_frame<const D: usize>(&mut self, sys: &System<D>) -> Result<()> {
        let io_err = |source| CorundumError::TrajectoryWriteError { source };
        // PDB coordinates are in ångström
        let scale = match sys.units {
            UnitSystem::Md => 10.0,
            UnitSystem::Reduced => 1.0,
        };

        self.frames_written += 1;
        writeln!(self.out, "MODEL     {:>4}", self.frames_written).map_err(io_err)?;
        for (i, coord) in sys.coords.iter().enumerate() {
            let mut pos = [0.0f64; 3];
            for k in 0..D.min(3) {
                pos[k] = coord[k] * scale;
            }
            writeln!(
                self.out,
                "ATOM  {:>5}  C   MOL A{:>4}    {:>8.3}{:>8.3}{:>8.3}  1.00  0.00           C",
                i + 1,
                i + 1,
                pos[0],
                pos[1],
                pos[2],
            )
            .map_err(io_err)?;
        }
        writeln!(self.out, "ENDMDL").map_err(io_err)?;
        self.out.flush().map_err(io_err)?;
        Ok(())
    }
}

/// Samples every logger whose period divides the step.
///
/// Observables are gathered first so each logger sees one consistent view
/// of the step; the energy and pressure traversals only run when a due
/// logger needs them.
pub fn run_loggers<const D: usize>(
    sys: &mut System<D>,
    neighbours: &NeighbourList,
    step: usize,
) -> Result<()> {
    if !sys.loggers.iter().any(|l| step % l.period() == 0) {
        return Ok(());
    }

    let kinetic = sys.kinetic_energy();
    let potential = if sys
        .loggers
        .iter()
        .any(|l| step % l.period() == 0 && l.needs_potential_energy())
    {
        potential_energy(sys, neighbours)
    } else {
        0.0
    };
    let pressure = if sys
        .loggers
        .iter()
        .any(|l| step % l.period() == 0 && l.needs_pressure())
    {
        virial_pressure(sys, neighbours)
    } else {
        0.0
    };

    let mut loggers = std::mem::take(&mut sys.loggers);
    let mut outcome = Ok(());
    for logger in &mut loggers {
        outcome = logger.record(sys, step, kinetic, potential, pressure);
        if outcome.is_err() {
            break;
        }
    }
    sys.loggers = loggers;
    outcome
}
