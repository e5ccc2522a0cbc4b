//! Neighbour lists and the finders that build them.
//!
//! Every finder produces the same pair set for the same configuration: the
//! index pairs `(i, j)` with `i < j`, minimum image distance below the
//! cutoff and not masked by the exclusion matrix, each flagged when the
//! pair needs 1-4 treatment.

use na::{DMatrix, SVector};
use tracing::debug;

use crate::boundary::SimulationBox;
use crate::errors::{CorundumError, Result};
use crate::system::System;

/// Close pairs `(i, j, is_14)` with `i < j`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NeighbourList {
    pub pairs: Vec<(usize, usize, bool)>,
}

/// An eligibility matrix with everything allowed except self pairs.
pub fn full_nb_matrix(n_atoms: usize) -> DMatrix<bool> {
    DMatrix::from_fn(n_atoms, n_atoms, |i, j| i != j)
}

/// A 1-4 matrix with no special pairs.
pub fn empty_14_matrix(n_atoms: usize) -> DMatrix<bool> {
    DMatrix::from_element(n_atoms, n_atoms, false)
}

/// O(N²) scan over all pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceNeighbourFinder {
    pub nb_matrix: DMatrix<bool>,
    pub matrix_14: DMatrix<bool>,
    pub n_steps: usize,
    pub dist_cutoff: f64,
}

impl DistanceNeighbourFinder {
    pub fn new(
        nb_matrix: DMatrix<bool>,
        matrix_14: DMatrix<bool>,
        n_steps: usize,
        dist_cutoff: f64,
    ) -> Self {
        Self {
            nb_matrix,
            matrix_14,
            n_steps,
            dist_cutoff,
        }
    }
}

/// kd-tree range queries with periodic images, rebuilt on every refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNeighbourFinder {
    pub nb_matrix: DMatrix<bool>,
    pub matrix_14: DMatrix<bool>,
    pub n_steps: usize,
    pub dist_cutoff: f64,
}

impl TreeNeighbourFinder {
    pub fn new(
        nb_matrix: DMatrix<bool>,
        matrix_14: DMatrix<bool>,
        n_steps: usize,
        dist_cutoff: f64,
    ) -> Self {
        Self {
            nb_matrix,
            matrix_14,
            n_steps,
            dist_cutoff,
        }
    }
}

/// Spatial hashing into cells of side at least the cutoff, scanning the
/// forward half neighbourhood of each cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellListNeighbourFinder {
    pub nb_matrix: DMatrix<bool>,
    pub matrix_14: DMatrix<bool>,
    pub n_steps: usize,
    pub dist_cutoff: f64,
}

impl CellListNeighbourFinder {
    pub fn new(
        nb_matrix: DMatrix<bool>,
        matrix_14: DMatrix<bool>,
        n_steps: usize,
        dist_cutoff: f64,
    ) -> Self {
        Self {
            nb_matrix,
            matrix_14,
            n_steps,
            dist_cutoff,
        }
    }
}

/// The neighbour finding strategy of a system.
#[derive(Debug, Clone, PartialEq)]
pub enum NeighbourFinder {
    /// No neighbour list; `nl_only` interactions see no pairs.
    None,
    Distance(DistanceNeighbourFinder),
    Tree(TreeNeighbourFinder),
    CellList(CellListNeighbourFinder),
}

impl NeighbourFinder {
    /// Checks the matrix shapes against the atom count.
    pub fn validate(&self, n_atoms: usize) -> Result<()> {
        let matrices = match self {
            NeighbourFinder::None => return Ok(()),
            NeighbourFinder::Distance(f) => [&f.nb_matrix, &f.matrix_14],
            NeighbourFinder::Tree(f) => [&f.nb_matrix, &f.matrix_14],
            NeighbourFinder::CellList(f) => [&f.nb_matrix, &f.matrix_14],
        };
        for matrix in matrices {
            if matrix.nrows() != n_atoms || matrix.ncols() != n_atoms {
                return Err(CorundumError::ExclusionMatrixShape {
                    rows: matrix.nrows(),
                    cols: matrix.ncols(),
                    n_atoms,
                });
            }
        }
        Ok(())
    }

    /// Whether the pair is permanently excluded from non-bonded evaluation.
    pub fn excluded(&self, i: usize, j: usize) -> bool {
        match self {
            NeighbourFinder::None => false,
            NeighbourFinder::Distance(f) => !f.nb_matrix[(i, j)],
            NeighbourFinder::Tree(f) => !f.nb_matrix[(i, j)],
            NeighbourFinder::CellList(f) => !f.nb_matrix[(i, j)],
        }
    }

    /// Whether the pair takes the 1-4 weighting.
    pub fn is_14(&self, i: usize, j: usize) -> bool {
        match self {
            NeighbourFinder::None => false,
            NeighbourFinder::Distance(f) => f.matrix_14[(i, j)],
            NeighbourFinder::Tree(f) => f.matrix_14[(i, j)],
            NeighbourFinder::CellList(f) => f.matrix_14[(i, j)],
        }
    }

    /// Returns a fresh list on refresh steps and `None` when the previous
    /// list is still current.
    pub fn find_neighbours<const D: usize>(
        &self,
        sys: &System<D>,
        step: usize,
    ) -> Option<NeighbourList> {
        match self {
            NeighbourFinder::None => (step == 0).then(NeighbourList::default),
            NeighbourFinder::Distance(f) => {
                if step % f.n_steps != 0 {
                    return None;
                }
                Some(distance_pass(
                    &sys.coords,
                    &sys.boundary,
                    &f.nb_matrix,
                    &f.matrix_14,
                    f.dist_cutoff,
                ))
            }
            NeighbourFinder::Tree(f) => {
                if step % f.n_steps != 0 {
                    return None;
                }
                Some(tree_pass(
                    &sys.coords,
                    &sys.boundary,
                    &f.nb_matrix,
                    &f.matrix_14,
                    f.dist_cutoff,
                ))
            }
            NeighbourFinder::CellList(f) => {
                if step % f.n_steps != 0 {
                    return None;
                }
                Some(cell_list_pass(
                    &sys.coords,
                    &sys.boundary,
                    &f.nb_matrix,
                    &f.matrix_14,
                    f.dist_cutoff,
                ))
            }
        }
    }
}

fn distance_pass<const D: usize>(
    coords: &[SVector<f64, D>],
    boundary: &SimulationBox<D>,
    nb_matrix: &DMatrix<bool>,
    matrix_14: &DMatrix<bool>,
    dist_cutoff: f64,
) -> NeighbourList {
    let sqdist_cutoff = dist_cutoff * dist_cutoff;
    let mut pairs = Vec::new();
    for i in 0..coords.len() {
        for j in (i + 1)..coords.len() {
            if !nb_matrix[(i, j)] {
                continue;
            }
            let dr = boundary.displacement(&coords[j], &coords[i]);
            if dr.norm_squared() < sqdist_cutoff {
                pairs.push((i, j, matrix_14[(i, j)]));
            }
        }
    }
    NeighbourList { pairs }
}

// ---- kd-tree ----

#[derive(Debug)]
struct KdNode<const D: usize> {
    point: SVector<f64, D>,
    index: usize,
    left: Option<Box<KdNode<D>>>,
    right: Option<Box<KdNode<D>>>,
}

fn build_tree<const D: usize>(
    items: &mut [(SVector<f64, D>, usize)],
    depth: usize,
) -> Option<Box<KdNode<D>>> {
    if items.is_empty() {
        return None;
    }
    let axis = depth % D;
    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |a, b| {
        a.0[axis]
            .partial_cmp(&b.0[axis])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let (point, index) = items[mid];
    let (left, rest) = items.split_at_mut(mid);
    Some(Box::new(KdNode {
        point,
        index,
        left: build_tree(left, depth + 1),
        right: build_tree(&mut rest[1..], depth + 1),
    }))
}

fn query_tree<const D: usize>(
    node: &KdNode<D>,
    query: &SVector<f64, D>,
    radius: f64,
    depth: usize,
    out: &mut Vec<usize>,
) {
    if (node.point - query).norm_squared() < radius * radius {
        out.push(node.index);
    }
    let axis = depth % D;
    let diff = query[axis] - node.point[axis];
    if diff < radius {
        if let Some(left) = &node.left {
            query_tree(left, query, radius, depth + 1, out);
        }
    }
    if diff > -radius {
        if let Some(right) = &node.right {
            query_tree(right, query, radius, depth + 1, out);
        }
    }
}

fn tree_pass<const D: usize>(
    coords: &[SVector<f64, D>],
    boundary: &SimulationBox<D>,
    nb_matrix: &DMatrix<bool>,
    matrix_14: &DMatrix<bool>,
    dist_cutoff: f64,
) -> NeighbourList {
    let mut items: Vec<(SVector<f64, D>, usize)> =
        coords.iter().enumerate().map(|(i, c)| (*c, i)).collect();
    let tree = match build_tree(&mut items, 0) {
        Some(tree) => tree,
        None => return NeighbourList::default(),
    };

    // every periodic image shift the minimum image convention can select
    let mut shifts: Vec<SVector<f64, D>> = Vec::with_capacity(3usize.pow(D as u32));
    for code in 0..3usize.pow(D as u32) {
        let mut shift = SVector::zeros();
        let mut rest = code;
        for k in 0..D {
            shift[k] = ((rest % 3) as f64 - 1.0) * boundary.side_lengths()[k];
            rest /= 3;
        }
        shifts.push(shift);
    }

    let sqdist_cutoff = dist_cutoff * dist_cutoff;
    let mut pairs = Vec::new();
    let mut candidates = Vec::new();
    for i in 0..coords.len() {
        candidates.clear();
        for shift in &shifts {
            let query = coords[i] + shift;
            query_tree(&tree, &query, dist_cutoff, 0, &mut candidates);
        }
        candidates.sort_unstable();
        candidates.dedup();
        for &j in &candidates {
            if j <= i || !nb_matrix[(i, j)] {
                continue;
            }
            let dr = boundary.displacement(&coords[j], &coords[i]);
            if dr.norm_squared() < sqdist_cutoff {
                pairs.push((i, j, matrix_14[(i, j)]));
            }
        }
    }
    NeighbourList { pairs }
}

// ---- cell list ----

/// Forward half of the `{-1, 0, 1}^D` offsets, zero offset included.
///
/// An offset is forward when its highest-axis nonzero component is
/// positive, so every unordered cell pair is visited exactly once.
fn forward_offsets<const D: usize>() -> Vec<[isize; D]> {
    let mut offsets = Vec::new();
    for code in 0..3usize.pow(D as u32) {
        let mut offset = [0isize; D];
        let mut rest = code;
        for k in 0..D {
            offset[k] = (rest % 3) as isize - 1;
            rest /= 3;
        }
        let forward = match (0..D).rev().find(|&k| offset[k] != 0) {
            Some(k) => offset[k] > 0,
            None => true, // the self cell
        };
        if forward {
            offsets.push(offset);
        }
    }
    offsets
}

fn cell_list_pass<const D: usize>(
    coords: &[SVector<f64, D>],
    boundary: &SimulationBox<D>,
    nb_matrix: &DMatrix<bool>,
    matrix_14: &DMatrix<bool>,
    dist_cutoff: f64,
) -> NeighbourList {
    let mut n_cells = [1usize; D];
    for k in 0..D {
        n_cells[k] = ((boundary.side_lengths()[k] / dist_cutoff).floor() as usize).max(1);
    }
    // with fewer than three cells on an axis the forward scan would see the
    // same neighbour cell twice through the periodic wrap
    if n_cells.iter().any(|&n| n < 3) {
        debug!(cutoff = dist_cutoff, "box too small for cell list, using direct pass");
        return distance_pass(coords, boundary, nb_matrix, matrix_14, dist_cutoff);
    }

    let total_cells: usize = n_cells.iter().product();
    let mut strides = [1usize; D];
    for k in 1..D {
        strides[k] = strides[k - 1] * n_cells[k - 1];
    }

    let mut cells: Vec<Vec<usize>> = vec![Vec::new(); total_cells];
    for (i, coord) in coords.iter().enumerate() {
        let mut cell = 0;
        for k in 0..D {
            let idx = ((coord[k] / boundary.side_lengths()[k] * n_cells[k] as f64).floor()
                as usize)
                .min(n_cells[k] - 1);
            cell += idx * strides[k];
        }
        cells[cell].push(i);
    }

    let offsets = forward_offsets::<D>();
    let sqdist_cutoff = dist_cutoff * dist_cutoff;
    let mut pairs = Vec::new();

    for cell in 0..total_cells {
        let mut cell_idx = [0usize; D];
        let mut rest = cell;
        for k in 0..D {
            cell_idx[k] = rest % n_cells[k];
            rest /= n_cells[k];
        }

        for offset in &offsets {
            let mut other = 0;
            for k in 0..D {
                let wrapped =
                    (cell_idx[k] as isize + offset[k]).rem_euclid(n_cells[k] as isize) as usize;
                other += wrapped * strides[k];
            }

            if other == cell {
                let members = &cells[cell];
                for (a, &i) in members.iter().enumerate() {
                    for &j in members.iter().skip(a + 1) {
                        push_pair(i, j, coords, boundary, nb_matrix, matrix_14, sqdist_cutoff, &mut pairs);
                    }
                }
            } else {
                for &i in &cells[cell] {
                    for &j in &cells[other] {
                        push_pair(i, j, coords, boundary, nb_matrix, matrix_14, sqdist_cutoff, &mut pairs);
                    }
                }
            }
        }
    }
    NeighbourList { pairs }
}

#[allow(clippy::too_many_arguments)]
#[inline]
fn push_pair<const D: usize>(
    i: usize,
    j: usize,
    coords: &[SVector<f64, D>],
    boundary: &SimulationBox<D>,
    nb_matrix: &DMatrix<bool>,
    matrix_14: &DMatrix<bool>,
    sqdist_cutoff: f64,
    pairs: &mut Vec<(usize, usize, bool)>,
) {
    let (i, j) = if i < j { (i, j) } else { (j, i) };
    if !nb_matrix[(i, j)] {
        return;
    }
    let dr = boundary.displacement(&coords[j], &coords[i]);
    if dr.norm_squared() < sqdist_cutoff {
        pairs.push((i, j, matrix_14[(i, j)]));
    }
}
