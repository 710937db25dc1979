//! Transfer functions: assumption of linear constraints, assignment and
//! substitution of linear expressions.
//!
//! Expressions classify into the shapes the octagon represents exactly
//! (`ZERO`, `UNARY`, `BINARY` with unit coefficients) or degrade to
//! interval reasoning (`OTHER`). Adding a single octagonal constraint to
//! a closed matrix re-canonicalizes incrementally; anything else leaves
//! an open result for the next lazy closure.

use log::debug;

use crate::bound::{badd, INF};
use crate::closure::incremental_closure;
use crate::expr::{ConsKind, Interval, LinCons, LinExpr};
use crate::hmat::OctMat;
use crate::lattice::meet_mat;
use crate::oct::{Oct, OctManager, Repr};
use crate::predicate::var_interval;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UExprKind {
    /// Empty constant interval: the expression denotes no value.
    Empty,
    /// No variable terms.
    Zero,
    /// One variable, coefficient `±1`.
    Unary,
    /// Two variables, coefficients `±1`.
    Binary,
    /// Anything else; handled through intervals with precision loss.
    Other,
}

/// Octagonal view of a linear expression: constant bounds as `[-a, b]`
/// plus up to two unit terms.
pub(crate) struct UExpr {
    pub kind: UExprKind,
    pub i: usize,
    pub j: usize,
    pub coef_i: i32,
    pub coef_j: i32,
    /// Minus the lower bound of the constant.
    pub a: f64,
    /// Upper bound of the constant.
    pub b: f64,
}

pub(crate) fn uexpr_of_linexpr(e: &LinExpr, dim: usize) -> UExpr {
    let cst = e.constant();
    let mut u = UExpr {
        kind: UExprKind::Zero,
        i: 0,
        j: 0,
        coef_i: 0,
        coef_j: 0,
        a: if cst.inf == f64::NEG_INFINITY {
            INF
        } else {
            -cst.inf
        },
        b: cst.sup,
    };
    if cst.is_empty() {
        u.kind = UExprKind::Empty;
        return u;
    }
    let mut n = 0;
    for &(v, c) in e.terms() {
        if c == 0.0 {
            continue;
        }
        if v >= dim || (c != 1.0 && c != -1.0) {
            u.kind = UExprKind::Other;
            return u;
        }
        match n {
            0 => {
                u.i = v;
                u.coef_i = c as i32;
            }
            1 => {
                u.j = v;
                u.coef_j = c as i32;
            }
            _ => {
                u.kind = UExprKind::Other;
                return u;
            }
        }
        n += 1;
    }
    u.kind = match n {
        0 => UExprKind::Zero,
        1 => UExprKind::Unary,
        _ => UExprKind::Binary,
    };
    u
}

/// Signed index denoting `coef * x_v`.
#[inline]
fn signed_of(v: usize, coef: i32) -> usize {
    2 * v + if coef == 1 { 0 } else { 1 }
}

impl OctManager {
    /// Meet with an array of linear constraints. `=` splits into two
    /// inequalities; `!=` and modular constraints are not octagonal and
    /// are skipped, invalidating the closure for the caller to restore.
    pub fn add_lincons_array(&mut self, o: &Oct, ar: &[LinCons]) -> Oct {
        self.begin();
        let Some(src) = o.mat() else {
            return Oct::bottom(o.dim(), o.intdim());
        };
        let mut oo = src.clone();
        let mut respect_closure = o.is_closed();
        let is_int = o.is_int();
        let mut exact = true;
        for cons in ar {
            match cons.kind {
                ConsKind::DisEq | ConsKind::EqMod(_) => {
                    respect_closure = false;
                    exact = false;
                    continue;
                }
                _ => {}
            }
            let u = uexpr_of_linexpr(&cons.expr, o.dim());
            match u.kind {
                UExprKind::Empty => return Oct::bottom(o.dim(), o.intdim()),
                UExprKind::Zero => {
                    let sat = match cons.kind {
                        ConsKind::SupEq => u.b >= 0.0,
                        ConsKind::Sup => u.b > 0.0,
                        ConsKind::Eq => u.b >= 0.0 && u.a >= 0.0,
                        _ => unreachable!(),
                    };
                    if !sat {
                        return Oct::bottom(o.dim(), o.intdim());
                    }
                }
                UExprKind::Unary => {
                    let i = u.i;
                    let writes = u.b != INF || (matches!(cons.kind, ConsKind::Eq) && u.a != INF);
                    if !writes {
                        continue; // both sides unbounded: nothing to add
                    }
                    if !oo.is_dense() {
                        oo.comps.insert(i);
                    }
                    let ui = signed_of(i, u.coef_i);
                    // -v(ui) <= b, stored as the (ui, ui^1) bound doubled
                    if u.b != INF {
                        let mut c1 = 2.0 * u.b;
                        if matches!(cons.kind, ConsKind::Sup) {
                            if i < o.intdim() {
                                c1 -= 2.0;
                            } else {
                                exact = false;
                            }
                        }
                        oo.min_set(ui, ui ^ 1, c1);
                    }
                    if matches!(cons.kind, ConsKind::Eq) && u.a != INF {
                        oo.min_set(ui ^ 1, ui, 2.0 * u.a);
                    }
                    if respect_closure && incremental_closure(&mut oo, i, is_int) {
                        return Oct::bottom(o.dim(), o.intdim());
                    }
                }
                UExprKind::Binary => {
                    let (i, j) = (u.i, u.j);
                    let writes = u.b != INF || (matches!(cons.kind, ConsKind::Eq) && u.a != INF);
                    if !writes {
                        continue;
                    }
                    if !oo.is_dense() {
                        oo.handle_binary_relation(i, j);
                        oo.comps.union(i, j);
                    }
                    let ui = signed_of(i, u.coef_i);
                    let uj = signed_of(j, u.coef_j);
                    // -v(ui) - v(uj) <= b, stored at (uj, ui^1)
                    if u.b != INF {
                        let mut c1 = u.b;
                        if matches!(cons.kind, ConsKind::Sup) {
                            if i < o.intdim() && j < o.intdim() {
                                c1 -= 1.0;
                            } else {
                                exact = false;
                            }
                        }
                        oo.min_set(uj, ui ^ 1, c1);
                    }
                    if matches!(cons.kind, ConsKind::Eq) && u.a != INF {
                        oo.min_set(uj ^ 1, ui, u.a);
                    }
                    if respect_closure && incremental_closure(&mut oo, i, is_int) {
                        return Oct::bottom(o.dim(), o.intdim());
                    }
                }
                UExprKind::Other => {
                    exact = false;
                }
            }
        }
        if !exact {
            self.flags.set_incomplete();
        }
        let repr = if respect_closure {
            Repr::Closed(oo)
        } else {
            Repr::Open(oo)
        };
        Oct::new(o.dim(), o.intdim(), repr)
    }

    /// Assignment `x_d := e`, optionally intersected with `dest`.
    ///
    /// `x_d := ±x_d + [-a, b]` is an invertible translation applied in
    /// place (it preserves closure). Every other shape forgets `x_d`
    /// first and asserts the bounds the expression implies.
    pub fn assign_linexpr(&mut self, o: &mut Oct, d: usize, e: &LinExpr, dest: Option<&Oct>) -> Oct {
        self.begin();
        if d >= o.dim() {
            self.flags.set_algo();
            return o.clone();
        }
        if let Some(dst) = dest {
            if dst.mat().is_none() {
                return Oct::bottom(o.dim(), o.intdim());
            }
        }
        let u = uexpr_of_linexpr(e, o.dim());
        if u.kind == UExprKind::Empty {
            return Oct::bottom(o.dim(), o.intdim());
        }
        let invertible = u.kind == UExprKind::Unary && u.i == d;
        if !invertible {
            o.close();
        }
        let is_int = o.is_int();
        let Some(src) = o.mat() else {
            return Oct::bottom(o.dim(), o.intdim());
        };
        let respect = o.is_closed() && dest.is_none();
        let mut oo = src.clone();
        let mut empty = false;
        match u.kind {
            UExprKind::Unary if u.i == d => {
                debug!("assign: invertible translation of x{}", d);
                if u.coef_i == -1 {
                    negate_var(&mut oo, d);
                }
                translate_var(&mut oo, d, u.a, u.b);
            }
            UExprKind::Unary => {
                oo.forget_var(d);
                if !oo.is_dense() {
                    oo.comps.remove(d);
                    if u.a != INF || u.b != INF {
                        oo.handle_binary_relation(d, u.i);
                        oo.comps.union(d, u.i);
                    }
                }
                let k = signed_of(u.i, u.coef_i);
                // x_d - v(k) <= b and v(k) - x_d <= a
                if u.b != INF {
                    oo.min_set(k, 2 * d, u.b);
                }
                if u.a != INF {
                    oo.min_set(2 * d, k, u.a);
                }
                if respect {
                    empty = incremental_closure(&mut oo, d, is_int);
                }
            }
            UExprKind::Zero => {
                oo.forget_var(d);
                if !oo.is_dense() {
                    oo.comps.remove(d);
                }
                assert_var_bounds(&mut oo, d, Interval::new(-u.a, u.b));
                if respect {
                    empty = incremental_closure(&mut oo, d, is_int);
                }
            }
            UExprKind::Binary | UExprKind::Other => {
                let itv = eval_interval(&oo, e);
                if itv.is_empty() {
                    return Oct::bottom(o.dim(), o.intdim());
                }
                oo.forget_var(d);
                if !oo.is_dense() {
                    oo.comps.remove(d);
                }
                assert_var_bounds(&mut oo, d, itv);
                self.flags.set_incomplete();
                if respect {
                    empty = incremental_closure(&mut oo, d, is_int);
                }
            }
            UExprKind::Empty => unreachable!(),
        }
        if empty {
            return Oct::bottom(o.dim(), o.intdim());
        }
        if let Some(dst) = dest {
            oo = meet_mat(&oo, dst.mat().expect("dest checked non-empty"));
        }
        let repr = if respect {
            Repr::Closed(oo)
        } else {
            Repr::Open(oo)
        };
        Oct::new(o.dim(), o.intdim(), repr)
    }

    /// Backward assignment: the states that reach the current ones by
    /// executing `x_d := e`. Runs on a densified copy.
    pub fn substitute_linexpr(
        &mut self,
        o: &mut Oct,
        d: usize,
        e: &LinExpr,
        dest: Option<&Oct>,
    ) -> Oct {
        self.begin();
        if d >= o.dim() {
            self.flags.set_algo();
            return o.clone();
        }
        if let Some(dst) = dest {
            if dst.mat().is_none() {
                return Oct::bottom(o.dim(), o.intdim());
            }
        }
        let u = uexpr_of_linexpr(e, o.dim());
        if u.kind == UExprKind::Empty {
            return Oct::bottom(o.dim(), o.intdim());
        }
        let invertible = u.kind == UExprKind::Unary && u.i == d;
        if !invertible {
            o.close();
        }
        let Some(src) = o.mat() else {
            return Oct::bottom(o.dim(), o.intdim());
        };
        let mut respect = o.is_closed() && dest.is_none();
        let mut oo = src.clone();
        oo.to_dense();
        let mut empty = false;
        match u.kind {
            UExprKind::Zero => {
                empty = subst_interval(&mut oo, d, u.a, u.b);
                respect = false;
            }
            UExprKind::Unary if u.i != d => {
                let k = signed_of(u.i, u.coef_i);
                empty = subst_unary(&mut oo, d, k, u.a, u.b);
                respect = false;
            }
            UExprKind::Unary if u.coef_i == -1 => {
                // x -> -x + [-a, b] is its own inverse
                negate_var(&mut oo, d);
                translate_var(&mut oo, d, u.a, u.b);
            }
            UExprKind::Unary => {
                // x -> x + [-a, b] inverts to x <- x + [-b, a]
                translate_var(&mut oo, d, u.b, u.a);
            }
            UExprKind::Binary | UExprKind::Other => {
                oo.forget_var(d);
                self.flags.set_incomplete();
                respect = false;
            }
            UExprKind::Empty => unreachable!(),
        }
        if empty {
            return Oct::bottom(o.dim(), o.intdim());
        }
        if let Some(dst) = dest {
            oo = meet_mat(&oo, dst.mat().expect("dest checked non-empty"));
        }
        let repr = if respect {
            Repr::Closed(oo)
        } else {
            Repr::Open(oo)
        };
        Oct::new(o.dim(), o.intdim(), repr)
    }
}

/// Swap the `+x_d` and `-x_d` rows: the matrix for `x_d := -x_d`.
fn negate_var(oo: &mut OctMat, d: usize) {
    let n = 2 * oo.dim();
    let (d1, d2) = (2 * d, 2 * d + 1);
    for k in 0..n {
        if k == d1 || k == d2 {
            continue;
        }
        let x = oo.get(d1, k);
        let y = oo.get(d2, k);
        oo.set(d1, k, y);
        oo.set(d2, k, x);
    }
    let x = oo.get(d1, d2);
    let y = oo.get(d2, d1);
    oo.set(d1, d2, y);
    oo.set(d2, d1, x);
}

/// The matrix for `x_d := x_d + [-a, b]`: shift every bound involving
/// `x_d`. Translations preserve strong closure.
fn translate_var(oo: &mut OctMat, d: usize, a: f64, b: f64) {
    let n = 2 * oo.dim();
    let (d1, d2) = (2 * d, 2 * d + 1);
    for k in 0..n {
        if k == d1 || k == d2 {
            continue;
        }
        let v = oo.get(d1, k);
        oo.set(d1, k, badd(v, a));
        let v = oo.get(d2, k);
        oo.set(d2, k, badd(v, b));
    }
    let v = oo.get(d1, d2);
    oo.set(d1, d2, badd(v, badd(a, a)));
    let v = oo.get(d2, d1);
    oo.set(d2, d1, badd(v, badd(b, b)));
}

/// Assert `x_d ∈ itv` through the doubled unary cells.
fn assert_var_bounds(oo: &mut OctMat, d: usize, itv: Interval) {
    let mut constrained = false;
    if itv.sup != INF {
        oo.min_set(2 * d + 1, 2 * d, 2.0 * itv.sup);
        constrained = true;
    }
    if itv.inf != f64::NEG_INFINITY {
        oo.min_set(2 * d, 2 * d + 1, -2.0 * itv.inf);
        constrained = true;
    }
    if constrained && !oo.is_dense() {
        oo.comps.insert(d);
    }
}

/// Interval bounds of `e` in the abstract state `m`.
fn eval_interval(m: &OctMat, e: &LinExpr) -> Interval {
    let mut acc = e.constant();
    for &(v, c) in e.terms() {
        let itv = if !m.is_dense() && !m.comps().contains(v) {
            Interval::TOP
        } else {
            var_interval(m, v).0
        };
        acc = acc.add(itv.scale(c));
    }
    acc
}

/// Substitution of `x_d` by the constant interval `[-a, b]`.
/// Returns `true` when the pre-state is empty.
fn subst_interval(oo: &mut OctMat, d: usize, a: f64, b: f64) -> bool {
    let n = 2 * oo.dim();
    let (d1, d2) = (2 * d, 2 * d + 1);
    if badd(badd(a, a), oo.get(d2, d1)) < 0.0 {
        return true;
    }
    if badd(badd(b, b), oo.get(d1, d2)) < 0.0 {
        return true;
    }
    // unary bounds on the other variables, inferred from their relation
    // to the substituted one
    for i in 0..n {
        if i == d1 || i == d2 {
            continue;
        }
        let t2 = badd(a, oo.get(d2, i ^ 1));
        let t3 = badd(b, oo.get(d1, i ^ 1));
        let v1 = badd(t2, t2);
        let v2 = badd(t3, t3);
        let v = if v1 < v2 { v1 } else { v2 };
        oo.min_set(i, i ^ 1, v);
    }
    oo.forget_var(d);
    false
}

/// Substitution of `x_d` by `v(k) + [-a, b]` for `k` not one of `x_d`'s
/// signed indices. Returns `true` when the pre-state is empty.
fn subst_unary(oo: &mut OctMat, d: usize, k: usize, a: f64, b: f64) -> bool {
    let n = 2 * oo.dim();
    let (d1, d2) = (2 * d, 2 * d + 1);
    if badd(a, oo.get(k, d1)) < 0.0 {
        return true;
    }
    if badd(b, oo.get(d1, k)) < 0.0 {
        return true;
    }
    for i in 0..n {
        if i == d1 || i == d2 {
            continue;
        }
        let v = badd(a, oo.get(d2, i));
        oo.min_set(k ^ 1, i, v);
        let v = badd(b, oo.get(d1, i));
        oo.min_set(k, i, v);
    }
    let v = badd(badd(a, a), oo.get(d2, d1));
    oo.min_set(k ^ 1, k, v);
    let v = badd(badd(b, b), oo.get(d1, d2));
    oo.min_set(k, k ^ 1, v);
    oo.forget_var(d);
    false
}
