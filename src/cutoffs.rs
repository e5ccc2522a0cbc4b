//! Cutoff policies applied to the raw pairwise kernels.

/// How a pairwise interaction is truncated at long range.
///
/// Every variant precomputes its squared radii so the fast path compares
/// squared distances and never takes a square root for out-of-range pairs.
/// Policies transform the raw `(force/r, energy)` kernel output; the kernel
/// itself stays untouched inside the active region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cutoff {
    /// The raw potential everywhere.
    None,
    /// Hard truncation: zero force and energy beyond the cutoff.
    Distance { sqdist_cutoff: f64 },
    /// Hard truncation with the energy shifted by `U(r_c)` so it reaches
    /// zero continuously at the cutoff.
    ShiftedPotential { cutoff: f64, sqdist_cutoff: f64 },
    /// Force shifted by `F(r_c)` so it vanishes at the cutoff, with the
    /// energy adjusted to stay the integral of the force.
    ShiftedForce { cutoff: f64, sqdist_cutoff: f64 },
    /// Raw below the activation radius, then a cubic polynomial taking both
    /// force and energy smoothly to zero across `[r_on, r_c]`.
    Spline {
        activation: f64,
        cutoff: f64,
        sqdist_activation: f64,
        sqdist_cutoff: f64,
    },
}

impl Cutoff {
    pub fn distance(cutoff: f64) -> Self {
        Cutoff::Distance {
            sqdist_cutoff: cutoff * cutoff,
        }
    }

    pub fn shifted_potential(cutoff: f64) -> Self {
        Cutoff::ShiftedPotential {
            cutoff,
            sqdist_cutoff: cutoff * cutoff,
        }
    }

    pub fn shifted_force(cutoff: f64) -> Self {
        Cutoff::ShiftedForce {
            cutoff,
            sqdist_cutoff: cutoff * cutoff,
        }
    }

    pub fn spline(activation: f64, cutoff: f64) -> Self {
        Cutoff::Spline {
            activation,
            cutoff,
            sqdist_activation: activation * activation,
            sqdist_cutoff: cutoff * cutoff,
        }
    }

    /// The truncation radius, if the policy has one.
    pub fn radius(&self) -> Option<f64> {
        match *self {
            Cutoff::None => None,
            Cutoff::Distance { sqdist_cutoff } => Some(sqdist_cutoff.sqrt()),
            Cutoff::ShiftedPotential { cutoff, .. }
            | Cutoff::ShiftedForce { cutoff, .. }
            | Cutoff::Spline { cutoff, .. } => Some(cutoff),
        }
    }

    /// Evaluates `kernel` (raw `r² → (force/r, energy)`) under this policy.
    #[inline]
    pub fn apply(&self, r2: f64, kernel: impl Fn(f64) -> (f64, f64)) -> (f64, f64) {
        match *self {
            Cutoff::None => kernel(r2),
            Cutoff::Distance { sqdist_cutoff } => {
                if r2 > sqdist_cutoff {
                    (0.0, 0.0)
                } else {
                    kernel(r2)
                }
            }
            Cutoff::ShiftedPotential {
                cutoff,
                sqdist_cutoff,
            } => {
                if r2 > sqdist_cutoff {
                    (0.0, 0.0)
                } else {
                    let (f_divr, energy) = kernel(r2);
                    let (_, energy_rc) = kernel(cutoff * cutoff);
                    (f_divr, energy - energy_rc)
                }
            }
            Cutoff::ShiftedForce {
                cutoff,
                sqdist_cutoff,
            } => {
                if r2 > sqdist_cutoff {
                    (0.0, 0.0)
                } else {
                    let r = r2.sqrt();
                    let (f_divr, energy) = kernel(r2);
                    let (f_divr_rc, energy_rc) = kernel(cutoff * cutoff);
                    let force_rc = f_divr_rc * cutoff;
                    (
                        f_divr - force_rc / r,
                        energy - energy_rc + (r - cutoff) * force_rc,
                    )
                }
            }
            Cutoff::Spline {
                activation,
                cutoff,
                sqdist_activation,
                sqdist_cutoff,
            } => {
                if r2 > sqdist_cutoff {
                    (0.0, 0.0)
                } else if r2 < sqdist_activation {
                    kernel(r2)
                } else {
                    let r = r2.sqrt();
                    let (f_divr, energy) = kernel(r2);
                    let t = (r - activation) / (cutoff - activation);
                    let switch = 1.0 - t * t * (3.0 - 2.0 * t);
                    let dswitch = -6.0 * t * (1.0 - t) / (cutoff - activation);
                    // product rule keeps the switched pair conservative
                    (f_divr * switch - energy * dswitch / r, energy * switch)
                }
            }
        }
    }
}
