//! Half-matrix storage for difference-bound matrices over signed variables.
//!
//! Variable `x_i` contributes two signed indices: `2i` for `+x_i` and
//! `2i+1` for `-x_i`; `k ^ 1` is the negation of signed index `k`. An
//! entry at `(i, j)` bounds `v(j) - v(i)`, and coherence demands
//! `m[i][j] = m[j^1][i^1]`, so only the lower-triangular half with
//! `j <= (i | 1)` is stored: `matpos` addresses a stored pair directly,
//! `matpos2` first rewrites the coherent twin into the stored triangle.
//!
//! A matrix is either dense (component list ignored) or decomposed: the
//! component list then covers every finite non-diagonal entry, and entries
//! between distinct components are `+∞` both logically and physically, so
//! reads are always exact while algorithms skip unconstrained blocks.

use log::trace;

use crate::bound::INF;
use crate::comps::ComponentList;

/// Number of stored entries for `dim` variables.
#[inline]
pub fn matsize(dim: usize) -> usize {
    2 * dim * (dim + 1)
}

/// Offset of `(i, j)`, assuming `j <= (i | 1)`.
#[inline]
pub fn matpos(i: usize, j: usize) -> usize {
    j + ((i + 1) * (i + 1)) / 2
}

/// Offset of `(i, j)` with coherence normalization.
#[inline]
pub fn matpos2(i: usize, j: usize) -> usize {
    if j > i {
        matpos(j ^ 1, i ^ 1)
    } else {
        matpos(i, j)
    }
}

/// Visit the stored offset of every entry in the block induced by the
/// sorted variable set `ca` (diagonals included, coherent twins once).
pub(crate) fn for_block(ca: &[usize], mut f: impl FnMut(usize)) {
    for bi in 0..2 * ca.len() {
        let i1 = 2 * ca[bi / 2] + (bi & 1);
        for bj in 0..=(bi | 1) {
            let j1 = 2 * ca[bj / 2] + (bj & 1);
            f(matpos(i1, j1));
        }
    }
}

/// Half-matrix plus its component partition.
#[derive(Clone, Debug)]
pub struct OctMat {
    dim: usize,
    pub(crate) m: Vec<f64>,
    pub(crate) comps: ComponentList,
    dense: bool,
}

impl OctMat {
    /// The unconstrained matrix: all `+∞`, zero diagonal, empty partition.
    pub fn top(dim: usize) -> Self {
        let mut m = vec![INF; matsize(dim)];
        for i in 0..2 * dim {
            m[matpos(i, i)] = 0.0;
        }
        OctMat {
            dim,
            m,
            comps: ComponentList::new(dim),
            dense: false,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn is_dense(&self) -> bool {
        self.dense
    }

    pub fn comps(&self) -> &ComponentList {
        &self.comps
    }

    /// Entry at signed pair `(i, j)`: the bound of `v(j) - v(i)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        debug_assert!(i < 2 * self.dim && j < 2 * self.dim);
        self.m[matpos2(i, j)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, v: f64) {
        debug_assert!(i < 2 * self.dim && j < 2 * self.dim);
        self.m[matpos2(i, j)] = v;
    }

    /// Tighten `(i, j)` towards `v`.
    #[inline]
    pub fn min_set(&mut self, i: usize, j: usize, v: f64) {
        let p = matpos2(i, j);
        if v < self.m[p] {
            self.m[p] = v;
        }
    }

    /// Reset the 2x2 block relating `x_i` and `x_j` to "no constraint"
    /// (zero diagonal when `i == j`). Used when a block that was implicit
    /// `+∞` is materialized into a component.
    pub fn ini_relation(&mut self, i: usize, j: usize) {
        if i >= self.dim || j >= self.dim {
            return;
        }
        if i == j {
            self.set(2 * i, 2 * j, 0.0);
            self.set(2 * i + 1, 2 * j + 1, 0.0);
        } else {
            self.set(2 * i, 2 * j, INF);
            self.set(2 * i + 1, 2 * j + 1, INF);
        }
        self.set(2 * i, 2 * j + 1, INF);
        self.set(2 * i + 1, 2 * j, INF);
    }

    /// Materialize every block a fresh constraint on `(i, j)` may touch:
    /// self blocks for untracked variables, the `(i, j)` block, and the
    /// cross blocks between the two components when both are tracked.
    /// The component lists themselves are not merged here.
    pub fn handle_binary_relation(&mut self, i: usize, j: usize) {
        match (self.comps.find(i), self.comps.find(j)) {
            (None, None) => {
                self.ini_relation(i, i);
                self.ini_relation(j, j);
                self.ini_relation(i, j);
            }
            (None, Some(rj)) => {
                self.ini_relation(i, i);
                for w in self.comps.members(rj) {
                    if w != i {
                        self.ini_relation(w, i);
                    }
                }
            }
            (Some(ri), None) => {
                self.ini_relation(j, j);
                for w in self.comps.members(ri) {
                    if w != j {
                        self.ini_relation(w, j);
                    }
                }
            }
            (Some(ri), Some(rj)) => {
                if ri != rj {
                    for w1 in self.comps.members(ri) {
                        for w2 in self.comps.members(rj) {
                            if w1 != w2 {
                                self.ini_relation(w1, w2);
                            }
                        }
                    }
                }
            }
        }
    }

    /// True iff the block relating `x_i` and `x_j` carries no constraint.
    pub fn trivial_relation(&self, i: usize, j: usize) -> bool {
        if i == j {
            self.get(2 * i, 2 * i) == 0.0
                && self.get(2 * i + 1, 2 * i + 1) == 0.0
                && self.get(2 * i, 2 * i + 1) == INF
                && self.get(2 * i + 1, 2 * i) == INF
        } else {
            self.get(2 * i, 2 * j) == INF
                && self.get(2 * i + 1, 2 * j + 1) == INF
                && self.get(2 * i, 2 * j + 1) == INF
                && self.get(2 * i + 1, 2 * j) == INF
        }
    }

    /// Cross-block triviality, unary bounds not considered.
    fn trivial_pair(&self, i: usize, j: usize) -> bool {
        debug_assert_ne!(i, j);
        self.get(2 * i, 2 * j) == INF
            && self.get(2 * i + 1, 2 * j + 1) == INF
            && self.get(2 * i, 2 * j + 1) == INF
            && self.get(2 * i + 1, 2 * j) == INF
    }

    /// Switch to the dense representation. Entries are already physically
    /// exact, so only the flag and the partition change.
    pub fn to_dense(&mut self) {
        if self.dense {
            return;
        }
        trace!("hmat: densifying {}-dim matrix", self.dim);
        self.dense = true;
        self.comps.clear();
    }

    /// Switch to the decomposed representation, recovering the partition
    /// from the finite entries. O(n^2).
    pub fn to_decomposed(&mut self) {
        self.dense = false;
        self.recompute_comps();
    }

    /// Recompute the partition by scanning all variable pairs.
    pub(crate) fn recompute_comps(&mut self) {
        let dim = self.dim;
        let mut cl = ComponentList::new(dim);
        for i in 0..dim {
            if self.get(2 * i, 2 * i + 1) != INF || self.get(2 * i + 1, 2 * i) != INF {
                cl.insert(i);
            }
            for j in 0..i {
                if !self.trivial_pair(i, j) {
                    cl.union(i, j);
                }
            }
        }
        self.comps = cl;
    }

    /// Recompute the partition scanning only the given candidate blocks;
    /// pairs outside them are known `+∞`.
    pub(crate) fn rebuild_comps_within(&mut self, blocks: &[Vec<usize>]) {
        let mut cl = ComponentList::new(self.dim);
        for b in blocks {
            for (k, &i) in b.iter().enumerate() {
                if self.get(2 * i, 2 * i + 1) != INF || self.get(2 * i + 1, 2 * i) != INF {
                    cl.insert(i);
                }
                for &j in &b[..k] {
                    if !self.trivial_pair(i, j) {
                        cl.union(i, j);
                    }
                }
            }
        }
        self.comps = cl;
    }

    /// Erase every constraint involving `x_v` (diagonals kept at `0`,
    /// unary bounds included). The component list is left to the caller.
    pub(crate) fn forget_var(&mut self, v: usize) {
        if self.dense {
            for k in 0..2 * self.dim {
                if k != 2 * v && k != 2 * v + 1 {
                    self.set(2 * v, k, INF);
                    self.set(2 * v + 1, k, INF);
                }
            }
        } else if let Some(root) = self.comps.find(v) {
            for w in self.comps.members(root) {
                if w != v {
                    self.ini_relation(v, w);
                }
            }
        }
        self.set(2 * v, 2 * v + 1, INF);
        self.set(2 * v + 1, 2 * v, INF);
    }
}
