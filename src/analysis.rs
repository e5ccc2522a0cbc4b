//! Analysis helpers over coordinate sets.

use na::{DMatrix, SVector};

use crate::boundary::SimulationBox;

/// All minimum image displacements; entry `[i][j]` points from atom `i` to
/// atom `j`.
pub fn displacements<const D: usize>(
    coords: &[SVector<f64, D>],
    boundary: &SimulationBox<D>,
) -> Vec<Vec<SVector<f64, D>>> {
    coords
        .iter()
        .map(|ci| {
            coords
                .iter()
                .map(|cj| boundary.displacement(cj, ci))
                .collect()
        })
        .collect()
}

/// The matrix of minimum image distances.
pub fn distances<const D: usize>(
    coords: &[SVector<f64, D>],
    boundary: &SimulationBox<D>,
) -> DMatrix<f64> {
    DMatrix::from_fn(coords.len(), coords.len(), |i, j| {
        boundary.displacement(&coords[j], &coords[i]).norm()
    })
}

/// Radial distribution function over `n_bins` bins up to half the shortest
/// box side.
///
/// Returns the bin centres and g(r), normalised against the ideal gas shell
/// population for the dimensionality.
pub fn rdf<const D: usize>(
    coords: &[SVector<f64, D>],
    boundary: &SimulationBox<D>,
    n_bins: usize,
) -> (Vec<f64>, Vec<f64>) {
    let n = coords.len();
    let r_max = boundary
        .side_lengths()
        .iter()
        .cloned()
        .fold(f64::INFINITY, f64::min)
        / 2.0;
    let bin_width = r_max / n_bins as f64;

    let mut histogram = vec![0usize; n_bins];
    for i in 0..n {
        for j in (i + 1)..n {
            let r = boundary.displacement(&coords[j], &coords[i]).norm();
            let bin = (r / bin_width) as usize;
            if bin < n_bins {
                histogram[bin] += 2; // each pair counts for both atoms
            }
        }
    }

    let volume = boundary.volume();
    let density = n as f64 / volume;
    let mut centres = Vec::with_capacity(n_bins);
    let mut g = Vec::with_capacity(n_bins);
    for (bin, &count) in histogram.iter().enumerate() {
        let r_lo = bin as f64 * bin_width;
        let r_hi = r_lo + bin_width;
        let shell_volume = match D {
            2 => std::f64::consts::PI * (r_hi * r_hi - r_lo * r_lo),
            _ => 4.0 / 3.0 * std::f64::consts::PI * (r_hi.powi(3) - r_lo.powi(3)),
        };
        let ideal = density * shell_volume * n as f64;
        centres.push(r_lo + 0.5 * bin_width);
        g.push(if ideal > 0.0 { count as f64 / ideal } else { 0.0 });
    }
    (centres, g)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use na::Vector3;

    #[test]
    fn test_displacements_are_antisymmetric() {
        let boundary = SimulationBox::new(Vector3::new(2.0, 2.0, 2.0)).unwrap();
        let coords = vec![
            Vector3::new(0.1, 0.2, 0.3),
            Vector3::new(1.9, 1.8, 0.4),
            Vector3::new(1.0, 1.0, 1.0),
        ];
        let disp = displacements(&coords, &boundary);
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!((disp[i][j] + disp[j][i]).norm(), 0.0, epsilon = 1e-12);
            }
        }
        // the 0-1 pair is close through the boundary
        assert!(disp[0][1].norm() < 0.5);
    }

    #[test]
    fn test_distances_symmetric_with_zero_diagonal() {
        let boundary = SimulationBox::new(Vector3::new(2.0, 2.0, 2.0)).unwrap();
        let coords = vec![
            Vector3::new(0.5, 0.5, 0.5),
            Vector3::new(1.0, 0.5, 0.5),
            Vector3::new(0.5, 1.4, 0.5),
        ];
        let dists = distances(&coords, &boundary);
        assert_relative_eq!(dists[(0, 1)], 0.5, epsilon = 1e-12);
        assert_relative_eq!(dists[(0, 2)], 0.9, epsilon = 1e-12);
        for i in 0..3 {
            assert_eq!(dists[(i, i)], 0.0);
            for j in 0..3 {
                assert_relative_eq!(dists[(i, j)], dists[(j, i)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_rdf_peaks_at_pair_distance() {
        let boundary = SimulationBox::new(Vector3::new(2.0, 2.0, 2.0)).unwrap();
        let coords = vec![
            Vector3::new(0.5, 0.5, 0.5),
            Vector3::new(0.9, 0.5, 0.5),
        ];
        let (centres, g) = rdf(&coords, &boundary, 50);
        assert_eq!(centres.len(), 50);

        let peak = g
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(bin, _)| bin)
            .unwrap();
        // the only pair sits at r = 0.4
        assert_relative_eq!(centres[peak], 0.4, epsilon = 0.03);
        assert!(g[peak] > 0.0);
        assert_eq!(g.iter().filter(|&&v| v > 0.0).count(), 1);
    }
}
