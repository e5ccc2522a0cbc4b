/// The Boltzmann constant in kiloJoule per mole kelvin
pub const KB_KJPERMOLEKELVIN: f64 = 0.008314462618;

/// The Coulomb prefactor e²/4πε₀ in kiloJoule nanometre per mole per
/// elementary charge squared
pub const COULOMB_KJPERMOLENM: f64 = 138.935458;
