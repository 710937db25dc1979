//! Dimension operations: forget, add, remove, permute, expand, fold.
//!
//! Adding, removing and permuting relocate entries under an index map;
//! the component list is remapped alongside so variable identity is
//! preserved. Expansion duplicates a variable's relations into fresh
//! copies; folding joins several variables into the first one.

use crate::bound::INF;
use crate::hmat::OctMat;
use crate::oct::{Oct, OctManager, Repr};

/// Copy `src` into a fresh matrix over `new_dim` variables; `map` sends
/// old variables to new slots, `None` drops them. Unmapped slots stay
/// unconstrained.
fn remap_mat(src: &OctMat, new_dim: usize, map: &[Option<usize>]) -> OctMat {
    let mut dst = OctMat::top(new_dim);
    for i in 0..src.dim() {
        let Some(ni) = map[i] else { continue };
        for j in 0..=i {
            let Some(nj) = map[j] else { continue };
            for si in 0..2 {
                for sj in 0..2 {
                    let v = src.get(2 * i + si, 2 * j + sj);
                    dst.set(2 * ni + si, 2 * nj + sj, v);
                }
            }
        }
    }
    if src.is_dense() {
        dst.to_dense();
    } else {
        dst.comps = src.comps.remap(new_dim, |v| map[v]);
    }
    dst
}

impl OctManager {
    /// Drop every constraint on the listed variables. With `project`
    /// the variables are additionally set to exactly `0`. Out-of-range
    /// indices are ignored.
    pub fn forget_array(&mut self, o: &mut Oct, vars: &[usize], project: bool) -> Oct {
        self.begin();
        o.close();
        let Some(src) = o.mat() else {
            return Oct::bottom(o.dim(), o.intdim());
        };
        let mut oo = src.clone();
        for &v in vars {
            if v >= o.dim() {
                continue;
            }
            oo.forget_var(v);
            if !oo.is_dense() {
                oo.comps.remove(v);
            }
            if project {
                oo.set(2 * v, 2 * v + 1, 0.0);
                oo.set(2 * v + 1, 2 * v, 0.0);
                if !oo.is_dense() {
                    oo.comps.insert(v);
                }
            }
        }
        // forgetting keeps the canonical form; projecting does not
        let repr = if project { Repr::Open(oo) } else { Repr::Closed(oo) };
        Oct::new(o.dim(), o.intdim(), repr)
    }

    /// Insert one fresh unconstrained variable before each listed
    /// position (sorted, repetitions allowed). With `project` the new
    /// variables are `0` instead of unconstrained.
    pub fn add_dimensions(&mut self, o: &Oct, pos: &[usize], project: bool) -> Oct {
        self.begin();
        assert!(
            pos.windows(2).all(|w| w[0] <= w[1]) && pos.iter().all(|&p| p <= o.dim()),
            "add_dimensions: positions must be sorted and <= dim"
        );
        let nb = pos.len();
        let new_dim = o.dim() + nb;
        let new_intdim = o.intdim() + pos.iter().filter(|&&p| p < o.intdim()).count();
        let Some(src) = o.mat() else {
            return Oct::bottom(new_dim, new_intdim);
        };
        let map: Vec<Option<usize>> = (0..o.dim())
            .map(|v| Some(v + pos.iter().filter(|&&p| p <= v).count()))
            .collect();
        let mut oo = remap_mat(src, new_dim, &map);
        if project {
            for (i, &p) in pos.iter().enumerate() {
                let w = p + i;
                oo.set(2 * w, 2 * w + 1, 0.0);
                oo.set(2 * w + 1, 2 * w, 0.0);
                if !oo.is_dense() {
                    oo.comps.insert(w);
                }
            }
        }
        let repr = if o.is_closed() && !project {
            Repr::Closed(oo)
        } else {
            Repr::Open(oo)
        };
        Oct::new(new_dim, new_intdim, repr)
    }

    /// Remove the listed variables (sorted, strictly increasing); the
    /// rest keep their relations.
    pub fn remove_dimensions(&mut self, o: &mut Oct, pos: &[usize]) -> Oct {
        self.begin();
        assert!(
            pos.windows(2).all(|w| w[0] < w[1]) && pos.iter().all(|&p| p < o.dim()),
            "remove_dimensions: positions must be strictly increasing and < dim"
        );
        o.close();
        let new_dim = o.dim() - pos.len();
        let new_intdim = o.intdim() - pos.iter().filter(|&&p| p < o.intdim()).count();
        let Some(src) = o.mat() else {
            return Oct::bottom(new_dim, new_intdim);
        };
        let map: Vec<Option<usize>> = (0..o.dim())
            .map(|v| {
                if pos.binary_search(&v).is_ok() {
                    None
                } else {
                    Some(v - pos.iter().filter(|&&p| p < v).count())
                }
            })
            .collect();
        let oo = remap_mat(src, new_dim, &map);
        Oct::new(new_dim, new_intdim, Repr::Closed(oo))
    }

    /// Relabel variables: `x_v` becomes `x_{perm[v]}`.
    pub fn permute_dimensions(&mut self, o: &Oct, perm: &[usize]) -> Oct {
        self.begin();
        assert_eq!(perm.len(), o.dim(), "permute: wrong permutation size");
        assert!(perm.iter().all(|&p| p < o.dim()), "permute: index out of range");
        let Some(src) = o.mat() else {
            return Oct::bottom(o.dim(), o.intdim());
        };
        let map: Vec<Option<usize>> = perm.iter().map(|&p| Some(p)).collect();
        let oo = remap_mat(src, o.dim(), &map);
        let repr = if o.is_closed() {
            Repr::Closed(oo)
        } else {
            Repr::Open(oo)
        };
        Oct::new(o.dim(), o.intdim(), repr)
    }

    /// Duplicate `x_v` into `k` fresh copies carrying `x_v`'s relations
    /// to every other variable and its unary bounds. The copies join
    /// `x_v`'s component but stay unrelated to `x_v` and to each other.
    pub fn expand(&mut self, o: &Oct, v: usize, k: usize) -> Oct {
        self.begin();
        if v >= o.dim() {
            self.flags.set_algo();
            return o.clone();
        }
        if k == 0 {
            return o.clone();
        }
        let pos_at = if v < o.intdim() { o.intdim() } else { o.dim() };
        let new_dim = o.dim() + k;
        let new_intdim = if v < o.intdim() {
            o.intdim() + k
        } else {
            o.intdim()
        };
        let Some(src) = o.mat() else {
            return Oct::bottom(new_dim, new_intdim);
        };
        let map: Vec<Option<usize>> = (0..o.dim())
            .map(|w| Some(if w >= pos_at { w + k } else { w }))
            .collect();
        let mut oo = remap_mat(src, new_dim, &map);
        let copies: Vec<usize> = (pos_at..pos_at + k).collect();
        for &c in &copies {
            for w in 0..new_dim {
                if w == c || w == v || copies.contains(&w) {
                    continue;
                }
                for si in 0..2 {
                    for sj in 0..2 {
                        let val = oo.get(2 * v + si, 2 * w + sj);
                        oo.set(2 * c + si, 2 * w + sj, val);
                    }
                }
            }
            let u1 = oo.get(2 * v, 2 * v + 1);
            let u2 = oo.get(2 * v + 1, 2 * v);
            oo.set(2 * c, 2 * c + 1, u1);
            oo.set(2 * c + 1, 2 * c, u2);
            if !oo.is_dense() && oo.comps.contains(v) {
                oo.comps.union(v, c);
            }
        }
        Oct::new(new_dim, new_intdim, Repr::Open(oo))
    }

    /// Collapse `vars` (sorted, strictly increasing) into `vars[0]` by
    /// joining their relations, then drop the rest.
    pub fn fold(&mut self, o: &mut Oct, vars: &[usize]) -> Oct {
        self.begin();
        assert!(!vars.is_empty(), "fold: empty variable list");
        assert!(
            vars.windows(2).all(|w| w[0] < w[1]) && *vars.last().unwrap() < o.dim(),
            "fold: variables must be strictly increasing and < dim"
        );
        o.close();
        let t0 = vars[0];
        let removed = &vars[1..];
        let new_dim = o.dim() - removed.len();
        let new_intdim = o.intdim() - removed.iter().filter(|&&p| p < o.intdim()).count();
        let Some(src) = o.mat() else {
            return Oct::bottom(new_dim, new_intdim);
        };
        let mut oo = src.clone();
        for w in 0..o.dim() {
            if vars.contains(&w) {
                continue;
            }
            for si in 0..2 {
                for sj in 0..2 {
                    let mut val = f64::NEG_INFINITY;
                    for &f in vars {
                        let e = oo.get(2 * f + si, 2 * w + sj);
                        if e > val {
                            val = e;
                        }
                        if val == INF {
                            break;
                        }
                    }
                    oo.set(2 * t0 + si, 2 * w + sj, val);
                }
            }
        }
        let mut u1 = f64::NEG_INFINITY;
        let mut u2 = f64::NEG_INFINITY;
        for &f in vars {
            u1 = f64::max(u1, oo.get(2 * f, 2 * f + 1));
            u2 = f64::max(u2, oo.get(2 * f + 1, 2 * f));
        }
        oo.set(2 * t0, 2 * t0 + 1, u1);
        oo.set(2 * t0 + 1, 2 * t0, u2);

        let map: Vec<Option<usize>> = (0..o.dim())
            .map(|w| {
                if removed.binary_search(&w).is_ok() {
                    None
                } else {
                    Some(w - removed.iter().filter(|&&p| p < w).count())
                }
            })
            .collect();
        let mut dst = remap_mat(&oo, new_dim, &map);
        if !dst.is_dense() {
            let blocks = dst.comps.components();
            dst.rebuild_comps_within(&blocks);
        }
        self.flags.exact = false;
        Oct::new(new_dim, new_intdim, Repr::Open(dst))
    }
}
