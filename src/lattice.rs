//! Lattice operations: meet, join, widening, narrowing.
//!
//! Meet works on whatever representation the operands are in and defers
//! closure. Join, widening and narrowing need canonical operands, so they
//! promote their arguments to closed form first; a join of two closed
//! octagons is closed again, the others leave an open result.

use log::debug;

use crate::bound::INF;
use crate::comps::ComponentList;
use crate::hmat::{for_block, OctMat};
use crate::oct::{Oct, OctManager, Repr};

impl OctManager {
    /// Greatest lower bound: elementwise min. Exact; the result is not
    /// closed.
    pub fn meet(&mut self, a: &Oct, b: &Oct) -> Oct {
        self.begin();
        assert_eq!(a.dim(), b.dim(), "meet: dimension mismatch");
        assert_eq!(a.intdim(), b.intdim(), "meet: intdim mismatch");
        let (Some(ma), Some(mb)) = (a.mat(), b.mat()) else {
            return Oct::bottom(a.dim(), a.intdim());
        };
        Oct::new(a.dim(), a.intdim(), Repr::Open(meet_mat(ma, mb)))
    }

    /// Least upper bound: elementwise max of the closed forms. The result
    /// is closed; optimal on the rationals only.
    pub fn join(&mut self, a: &mut Oct, b: &mut Oct) -> Oct {
        self.begin();
        assert_eq!(a.dim(), b.dim(), "join: dimension mismatch");
        assert_eq!(a.intdim(), b.intdim(), "join: intdim mismatch");
        a.close();
        b.close();
        match (a.mat(), b.mat()) {
            (None, None) => Oct::bottom(a.dim(), a.intdim()),
            (None, Some(_)) => b.clone(),
            (Some(_), None) => a.clone(),
            (Some(ma), Some(mb)) => {
                self.flags.set_incomplete();
                Oct::new(a.dim(), a.intdim(), Repr::Closed(join_mat(ma, mb)))
            }
        }
    }

    /// Standard widening: keep stable bounds, drop growing ones to `+∞`.
    /// Both iterates are taken in closed form; the result is not
    /// re-closed (re-closing a widening sequence may break termination).
    pub fn widening(&mut self, a: &mut Oct, b: &mut Oct) -> Oct {
        self.widening_inner(a, b, None)
    }

    /// Widening with thresholds: a growing bound lands on the smallest
    /// threshold above the new value instead of `+∞` when one exists.
    pub fn widening_with_thresholds(&mut self, a: &mut Oct, b: &mut Oct, thresholds: &[f64]) -> Oct {
        let mut t: Vec<f64> = thresholds.to_vec();
        t.sort_by(|x, y| x.partial_cmp(y).unwrap());
        self.widening_inner(a, b, Some(&t))
    }

    fn widening_inner(&mut self, a: &mut Oct, b: &mut Oct, thresholds: Option<&[f64]>) -> Oct {
        self.begin();
        assert_eq!(a.dim(), b.dim(), "widening: dimension mismatch");
        assert_eq!(a.intdim(), b.intdim(), "widening: intdim mismatch");
        a.close();
        b.close();
        match (a.mat(), b.mat()) {
            (None, None) => Oct::bottom(a.dim(), a.intdim()),
            (None, Some(_)) => b.clone(),
            (Some(_), None) => a.clone(),
            (Some(ma), Some(mb)) => {
                debug!("widening over {} dims", a.dim());
                let oo = pointwise(ma, mb, |x, y| {
                    if y <= x {
                        x
                    } else {
                        match thresholds {
                            Some(ts) => ts.iter().copied().find(|&t| t >= y).unwrap_or(INF),
                            None => INF,
                        }
                    }
                });
                Oct::new(a.dim(), a.intdim(), Repr::Open(oo))
            }
        }
    }

    /// Narrowing: restore from `b` the bounds `a` lost to `+∞`.
    pub fn narrowing(&mut self, a: &mut Oct, b: &mut Oct) -> Oct {
        self.begin();
        assert_eq!(a.dim(), b.dim(), "narrowing: dimension mismatch");
        assert_eq!(a.intdim(), b.intdim(), "narrowing: intdim mismatch");
        a.close();
        b.close();
        match (a.mat(), b.mat()) {
            (Some(ma), Some(mb)) => {
                let oo = pointwise(ma, mb, |x, y| if x == INF { y } else { x });
                Oct::new(a.dim(), a.intdim(), Repr::Open(oo))
            }
            _ => Oct::bottom(a.dim(), a.intdim()),
        }
    }
}

/// Elementwise min; in decomposed form the partitions are union-overlaid
/// and the touched blocks materialized before the min.
pub(crate) fn meet_mat(a: &OctMat, b: &OctMat) -> OctMat {
    let mut r = a.clone();
    if a.is_dense() || b.is_dense() {
        r.to_dense();
        for (x, &y) in r.m.iter_mut().zip(b.m.iter()) {
            if y < *x {
                *x = y;
            }
        }
    } else {
        for comp in b.comps().components() {
            if comp.len() == 1 {
                let v = comp[0];
                if !r.comps.contains(v) {
                    r.ini_relation(v, v);
                    r.comps.insert(v);
                }
            } else {
                for w in comp.windows(2) {
                    r.handle_binary_relation(w[0], w[1]);
                    r.comps.union(w[0], w[1]);
                }
            }
        }
        let blocks = r.comps.components();
        for ca in &blocks {
            for_block(ca, |p| {
                if b.m[p] < r.m[p] {
                    r.m[p] = b.m[p];
                }
            });
        }
    }
    r
}

/// Elementwise max; in decomposed form a variable pair stays related only
/// when related in both operands, so the blocks are the pairwise
/// intersections of the two partitions.
fn join_mat(a: &OctMat, b: &OctMat) -> OctMat {
    let dim = a.dim();
    if a.is_dense() || b.is_dense() {
        let mut r = a.clone();
        r.to_dense();
        for (x, &y) in r.m.iter_mut().zip(b.m.iter()) {
            if y > *x {
                *x = y;
            }
        }
        r
    } else {
        let mut r = OctMat::top(dim);
        let mut blocks: Vec<Vec<usize>> = Vec::new();
        let bcomps = b.comps().components();
        for ca in a.comps().components() {
            for cb in &bcomps {
                let s = intersect_sorted(&ca, cb);
                if s.is_empty() {
                    continue;
                }
                for_block(&s, |p| {
                    let v = if a.m[p] > b.m[p] { a.m[p] } else { b.m[p] };
                    r.m[p] = v;
                });
                blocks.push(s);
            }
        }
        r.rebuild_comps_within(&blocks);
        r
    }
}

/// Apply `f` over corresponding entries. Decomposed operands are combined
/// over the overlay of both partitions; the result partition is rebuilt
/// from its surviving finite entries.
fn pointwise(a: &OctMat, b: &OctMat, f: impl Fn(f64, f64) -> f64) -> OctMat {
    if a.is_dense() || b.is_dense() {
        let mut r = a.clone();
        r.to_dense();
        for (x, &y) in r.m.iter_mut().zip(b.m.iter()) {
            *x = f(*x, y);
        }
        r
    } else {
        let mut r = OctMat::top(a.dim());
        let blocks = overlay_blocks(a, b);
        for ca in &blocks {
            for_block(ca, |p| {
                r.m[p] = f(a.m[p], b.m[p]);
            });
        }
        // keep diagonals canonical whatever f did
        for i in 0..2 * a.dim() {
            r.set(i, i, 0.0);
        }
        r.rebuild_comps_within(&blocks);
        r
    }
}

/// Union-overlay of two partitions, as candidate blocks.
fn overlay_blocks(a: &OctMat, b: &OctMat) -> Vec<Vec<usize>> {
    let mut cl: ComponentList = a.comps().clone();
    for comp in b.comps().components() {
        cl.insert(comp[0]);
        cl.union_all(&comp);
    }
    cl.components()
}

fn intersect_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}
