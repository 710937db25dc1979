//! Strong closure: restoring the canonical form of an octagon matrix.
//!
//! A matrix is strongly closed when every diagonal is zero, every entry is
//! shortest-path closed, and every entry is tightened against the unary
//! bounds: `m[i][j] <= (m[i][i^1] + m[j^1][j]) / 2`. Closure detects
//! emptiness: a negative diagonal entry means the constraint system has a
//! negative cycle and concretizes to the empty set.
//!
//! The dense variant runs a per-variable Floyd-Warshall over the signed
//! indices followed by a strengthening pass. The decomposed variant closes
//! each component's induced block independently (entries between
//! components are `+∞` and cannot shorten any intra-component path), then
//! strengthens: finite unary bounds create relations between variables of
//! distinct components, so the components owning them are merged first.
//!
//! Incremental closure restores the canonical form after a single
//! constraint touching one variable has been added to an already closed
//! matrix, in O(n^2) instead of O(n^3).

use log::debug;

use crate::bound::{badd, floor_half, half, INF};
use crate::hmat::{matpos, matsize, OctMat};

/// Block-local signed index to global signed index.
#[inline]
fn sig(ca: &[usize], k: usize) -> usize {
    2 * ca[k / 2] + (k & 1)
}

#[inline]
fn mget(m: &[f64], i: usize, j: usize) -> f64 {
    m[crate::hmat::matpos2(i, j)]
}

#[inline]
fn mset(m: &mut [f64], i: usize, j: usize, v: f64) {
    m[crate::hmat::matpos2(i, j)] = v;
}

/// Strong closure in place. Returns `true` iff the octagon is empty.
pub fn strong_closure(oo: &mut OctMat, is_int: bool) -> bool {
    let empty = if oo.is_dense() {
        let dim = oo.dim();
        floyd_warshall(&mut oo.m, dim);
        strengthening_dense(oo, is_int)
    } else {
        strong_closure_decomposed(oo, is_int)
    };
    if empty {
        debug!("closure: negative cycle, octagon is empty");
    }
    empty
}

/// In-place Floyd-Warshall over the `2*dim` signed indices of a half
/// matrix. Shortest-path closure only; strengthening is separate.
fn floyd_warshall(m: &mut [f64], dim: usize) {
    let n = 2 * dim;
    let mut rk = vec![INF; n];
    let mut rk1 = vec![INF; n];
    for k in 0..dim {
        let k2 = 2 * k;
        let k3 = k2 + 1;

        // Refresh the pivot pair's rows and columns against each other;
        // by coherence this covers all four orientations.
        let kk = mget(m, k2, k3);
        let kk1 = mget(m, k3, k2);
        for i in 0..n {
            if i == k2 || i == k3 {
                continue;
            }
            let v = badd(mget(m, i, k2), kk);
            if v < mget(m, i, k3) {
                mset(m, i, k3, v);
            }
            let v = badd(mget(m, i, k3), kk1);
            if v < mget(m, i, k2) {
                mset(m, i, k2, v);
            }
        }

        // Relax every stored entry through both pivot rows.
        for j in 0..n {
            rk[j] = mget(m, k2, j);
            rk1[j] = mget(m, k3, j);
        }
        for i in 0..n {
            let ik = mget(m, i, k2);
            let ik1 = mget(m, i, k3);
            if ik == INF && ik1 == INF {
                continue;
            }
            let base = ((i + 1) * (i + 1)) / 2;
            for j in 0..=(i | 1) {
                let v1 = badd(ik, rk[j]);
                let v2 = badd(ik1, rk1[j]);
                let v = if v1 < v2 { v1 } else { v2 };
                if v < m[base + j] {
                    m[base + j] = v;
                }
            }
        }
    }
}

/// Tightening against unary bounds, then the emptiness check. With
/// integer dimensions the unary bounds are first tightened to even values
/// and the halves floored. Returns `true` iff a diagonal went negative.
fn strengthening_dense(oo: &mut OctMat, is_int: bool) -> bool {
    let n = 2 * oo.dim();
    let mut t = vec![INF; n];
    for i in 0..n {
        let b = oo.get(i ^ 1, i);
        if is_int {
            let h = floor_half(b);
            t[i] = h;
            if b != INF {
                oo.set(i ^ 1, i, 2.0 * h);
            }
        } else {
            t[i] = b;
        }
    }
    for i in 0..n {
        let ti = t[i ^ 1];
        if ti == INF {
            continue;
        }
        let base = ((i + 1) * (i + 1)) / 2;
        for j in 0..=(i | 1) {
            let v = if is_int {
                badd(ti, t[j])
            } else {
                half(badd(ti, t[j]))
            };
            if v < oo.m[base + j] {
                oo.m[base + j] = v;
            }
        }
    }
    check_diagonal_dense(oo)
}

fn check_diagonal_dense(oo: &mut OctMat) -> bool {
    let n = 2 * oo.dim();
    for i in 0..n {
        let p = matpos(i, i);
        if oo.m[p] < 0.0 {
            return true;
        }
        oo.m[p] = 0.0;
    }
    false
}

/// Decomposed strong closure: close each component independently, then
/// strengthen across the components owning finite unary bounds.
fn strong_closure_decomposed(oo: &mut OctMat, is_int: bool) -> bool {
    let comps = oo.comps.components();
    for comp in &comps {
        closure_component(oo, comp);
    }
    strengthening_decomposed(oo, is_int)
}

/// Run the shortest-path closure on one component's induced block, via a
/// dense scratch half-matrix.
fn closure_component(oo: &mut OctMat, ca: &[usize]) {
    let s = ca.len();
    if s == 0 {
        return;
    }
    let mut block = vec![INF; matsize(s)];
    for bi in 0..2 * s {
        let i1 = sig(ca, bi);
        for bj in 0..=(bi | 1) {
            let j1 = sig(ca, bj);
            block[matpos(bi, bj)] = oo.m[matpos(i1, j1)];
        }
    }
    floyd_warshall(&mut block, s);
    for bi in 0..2 * s {
        let i1 = sig(ca, bi);
        for bj in 0..=(bi | 1) {
            let j1 = sig(ca, bj);
            oo.m[matpos(i1, j1)] = block[matpos(bi, bj)];
        }
    }
}

/// Strengthening for the decomposed form. Components with at least one
/// finite unary bound get tightening entries between each other, so they
/// are merged (cross blocks materialized first); then the pair tightening
/// runs over the finitely-bounded signed indices only.
fn strengthening_decomposed(oo: &mut OctMat, is_int: bool) -> bool {
    let mut uni: Vec<usize> = Vec::new();
    let mut touched: Vec<Vec<usize>> = Vec::new();
    for comp in oo.comps.components() {
        let mut hit = false;
        for &v in &comp {
            for i1 in [2 * v, 2 * v + 1] {
                if oo.get(i1 ^ 1, i1) != INF {
                    uni.push(i1);
                    hit = true;
                }
            }
        }
        if hit {
            touched.push(comp);
        }
    }

    if touched.len() > 1 {
        for a in 0..touched.len() {
            for b in 0..a {
                for &w1 in &touched[a] {
                    for &w2 in &touched[b] {
                        oo.ini_relation(w1, w2);
                    }
                }
            }
        }
        for w in touched.windows(2) {
            oo.comps.union(w[0][0], w[1][0]);
        }
    }

    let n = 2 * oo.dim();
    let mut t = vec![INF; n];
    for &i1 in &uni {
        let b = oo.get(i1 ^ 1, i1);
        if is_int {
            let h = floor_half(b);
            t[i1] = h;
            oo.set(i1 ^ 1, i1, 2.0 * h);
        } else {
            t[i1] = b;
        }
    }
    for &i1 in &uni {
        for &j1 in &uni {
            if j1 > (i1 | 1) {
                continue;
            }
            let v = if is_int {
                badd(t[i1], t[j1])
            } else {
                half(badd(t[i1], t[j1]))
            };
            let p = matpos(i1 ^ 1, j1);
            if v < oo.m[p] {
                oo.m[p] = v;
            }
        }
    }

    for comp in oo.comps.components() {
        for v in comp {
            for i1 in [2 * v, 2 * v + 1] {
                let p = matpos(i1, i1);
                if oo.m[p] < 0.0 {
                    return true;
                }
                oo.m[p] = 0.0;
            }
        }
    }
    false
}

/// Strengthening only, without the shortest-path pass. Sufficient to
/// restore closure when the matrix differs from a closed one by unary
/// bounds alone (e.g. an octagon freshly built from a box).
pub fn strengthening_only(oo: &mut OctMat, is_int: bool) -> bool {
    if oo.is_dense() {
        strengthening_dense(oo, is_int)
    } else {
        strengthening_decomposed(oo, is_int)
    }
}

/// Incremental closure after a new constraint touching `x_v` has been
/// added to an otherwise strongly closed matrix. Returns `true` iff
/// empty.
pub fn incremental_closure(oo: &mut OctMat, v: usize, is_int: bool) -> bool {
    debug!("closure: incremental on x{}", v);
    if oo.is_dense() {
        let idx: Vec<usize> = (0..2 * oo.dim()).collect();
        incremental_pass(oo, &idx, v);
        strengthening_dense(oo, is_int)
    } else {
        match oo.comps.find(v) {
            Some(root) => {
                let idx: Vec<usize> = oo
                    .comps
                    .members(root)
                    .into_iter()
                    .flat_map(|w| [2 * w, 2 * w + 1])
                    .collect();
                incremental_pass(oo, &idx, v);
                strengthening_decomposed(oo, is_int)
            }
            // Nothing relates v; unary bounds may still need tightening.
            None => strengthening_decomposed(oo, is_int),
        }
    }
}

/// The incremental phases: refresh v's rows/columns through every pivot,
/// relax v's two signed rows against each other, then use v as the pivot
/// for all remaining pairs.
fn incremental_pass(oo: &mut OctMat, idx: &[usize], v: usize) {
    let v1 = 2 * v;
    let v2 = v1 + 1;
    for &k in idx {
        if k == v1 || k == v2 {
            continue;
        }
        for i in [v1, v2] {
            let ik = oo.get(i, k);
            let ki = oo.get(k, i);
            for &j in idx {
                if j == i {
                    continue;
                }
                if ik != INF {
                    let w = badd(ik, oo.get(k, j));
                    if w < oo.get(i, j) {
                        oo.set(i, j, w);
                    }
                }
                if ki != INF {
                    let w = badd(oo.get(j, k), ki);
                    if w < oo.get(j, i) {
                        oo.set(j, i, w);
                    }
                }
            }
        }
    }
    // paths through both +x_v and -x_v need the pair relaxed against
    // itself before it can serve as the pivot
    let kk = oo.get(v1, v2);
    let kk1 = oo.get(v2, v1);
    for &i in idx {
        if i == v1 || i == v2 {
            continue;
        }
        let w = badd(oo.get(i, v1), kk);
        if w < oo.get(i, v2) {
            oo.set(i, v2, w);
        }
        let w = badd(oo.get(i, v2), kk1);
        if w < oo.get(i, v1) {
            oo.set(i, v1, w);
        }
    }
    for &i in idx {
        let iv1 = oo.get(i, v1);
        let iv2 = oo.get(i, v2);
        if iv1 == INF && iv2 == INF {
            continue;
        }
        for &j in idx {
            if j > (i | 1) {
                continue;
            }
            let w1 = badd(iv1, oo.get(v1, j));
            let w2 = badd(iv2, oo.get(v2, j));
            let w = if w1 < w2 { w1 } else { w2 };
            if w < oo.get(i, j) {
                oo.set(i, j, w);
            }
        }
    }
}
