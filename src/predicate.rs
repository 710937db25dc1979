//! Queries: ordering, extremal element tests, entailment, and the
//! conversions back to boxes and constraint arrays.

use crate::bound::{badd, INF};
use crate::expr::{ConsKind, Interval, LinCons, LinExpr};
use crate::hmat::{for_block, matpos, OctMat};
use crate::oct::{Oct, OctManager, Repr};
use crate::transfer::{uexpr_of_linexpr, UExprKind};

/// Interval of `x_v` read off the matrix:
/// `[-m[2v][2v+1]/2, m[2v+1][2v]/2]`. The second component reports
/// whether a finite bound was halved (conversion imprecision).
pub(crate) fn var_interval(m: &OctMat, v: usize) -> (Interval, bool) {
    let minf = m.get(2 * v, 2 * v + 1);
    let sup = m.get(2 * v + 1, 2 * v);
    let conv = minf != INF || sup != INF;
    let itv = Interval::new(
        if minf == INF {
            f64::NEG_INFINITY
        } else {
            -minf / 2.0
        },
        if sup == INF { INF } else { sup / 2.0 },
    );
    (itv, conv)
}

/// One linear constraint per finite off-diagonal entry `(i, j) <= d`.
pub(crate) fn lincons_of_bound(i: usize, j: usize, d: f64) -> LinCons {
    if i == (j ^ 1) {
        // unary: the bound is doubled in the matrix
        let coef = if i & 1 == 1 { -1.0 } else { 1.0 };
        LinCons::new(LinExpr::cst(d / 2.0).term(i / 2, coef), ConsKind::SupEq)
    } else {
        let cj = if j & 1 == 1 { 1.0 } else { -1.0 };
        let ci = if i & 1 == 1 { -1.0 } else { 1.0 };
        LinCons::new(
            LinExpr::cst(d).term(j / 2, cj).term(i / 2, ci),
            ConsKind::SupEq,
        )
    }
}

impl OctManager {
    /// Definite emptiness test (closure is forced).
    pub fn is_bottom(&mut self, o: &mut Oct) -> bool {
        self.begin();
        o.close();
        match &o.repr {
            Repr::Bottom => true,
            Repr::Closed(_) => {
                if o.intdim() > 0 {
                    self.flags.set_incomplete();
                }
                false
            }
            Repr::Open(_) => {
                self.flags.set_algo();
                false
            }
        }
    }

    /// True iff the octagon is unconstrained. In decomposed form an
    /// empty component list suffices.
    pub fn is_top(&mut self, o: &Oct) -> bool {
        self.begin();
        let Some(m) = o.mat() else {
            return false;
        };
        if !m.is_dense() {
            return m.comps().is_empty();
        }
        let n = 2 * o.dim();
        for i in 0..n {
            for j in 0..=(i | 1) {
                let expect = if i == j { 0.0 } else { INF };
                if m.m[matpos(i, j)] != expect {
                    return false;
                }
            }
        }
        true
    }

    /// Inclusion `a ⊑ b`: every bound of `b` is implied by `a`'s closed
    /// form.
    pub fn is_leq(&mut self, a: &mut Oct, b: &Oct) -> bool {
        self.begin();
        if a.dim() != b.dim() || a.intdim() != b.intdim() {
            return false;
        }
        a.close();
        match (a.mat(), b.mat()) {
            (None, _) => true,
            (Some(_), None) => {
                self.flags.set_incomplete();
                false
            }
            (Some(ma), Some(mb)) => is_leq_mat(ma, mb),
        }
    }

    /// Equality of concretizations, via the canonical forms.
    pub fn is_eq(&mut self, a: &mut Oct, b: &mut Oct) -> bool {
        self.begin();
        if a.dim() != b.dim() || a.intdim() != b.intdim() {
            return false;
        }
        a.close();
        b.close();
        match (a.mat(), b.mat()) {
            (None, None) => true,
            (None, Some(_)) | (Some(_), None) => {
                if a.intdim() > 0 {
                    self.flags.set_incomplete();
                }
                false
            }
            (Some(ma), Some(mb)) => is_eq_mat(ma, mb),
        }
    }

    /// True iff no constraint mentions `x_v`.
    pub fn is_dimension_unconstrained(&mut self, o: &Oct, v: usize) -> bool {
        self.begin();
        if v >= o.dim() {
            return false;
        }
        let Some(m) = o.mat() else {
            return false;
        };
        let d2 = 2 * v;
        if !m.is_dense() {
            let Some(root) = m.comps().find(v) else {
                return true;
            };
            for w in m.comps().members(root) {
                if w == v {
                    if m.get(d2, d2 + 1) != INF || m.get(d2 + 1, d2) != INF {
                        return false;
                    }
                } else {
                    for s in 0..2 {
                        if m.get(2 * w + s, d2) != INF || m.get(2 * w + s, d2 + 1) != INF {
                            return false;
                        }
                    }
                }
            }
            true
        } else {
            for i in 0..2 * o.dim() {
                if i != d2 && m.get(i, d2) != INF {
                    return false;
                }
                if i != d2 + 1 && m.get(i, d2 + 1) != INF {
                    return false;
                }
            }
            true
        }
    }

    /// Does the octagon entail `x_v ∈ itv`?
    pub fn sat_interval(&mut self, o: &mut Oct, v: usize, itv: &Interval) -> bool {
        self.begin();
        if v >= o.dim() {
            return false;
        }
        o.close();
        let Some(m) = o.mat() else {
            return true;
        };
        let (bounds, conv) = if !m.is_dense() && !m.comps().contains(v) {
            (Interval::TOP, false)
        } else {
            var_interval(m, v)
        };
        if itv.contains_interval(&bounds) {
            true
        } else {
            if o.intdim() > 0 {
                self.flags.set_incomplete();
            } else if conv {
                self.flags.set_conv();
            }
            false
        }
    }

    /// Tightest interval the octagon gives for `x_v`; top interval for an
    /// out-of-range index, empty interval on bottom.
    pub fn bound_dimension(&mut self, o: &mut Oct, v: usize) -> Interval {
        self.begin();
        if v >= o.dim() {
            return Interval::TOP;
        }
        o.close();
        let Some(m) = o.mat() else {
            return Interval::BOTTOM;
        };
        let (itv, conv) = if !m.is_dense() && !m.comps().contains(v) {
            (Interval::TOP, false)
        } else {
            var_interval(m, v)
        };
        if o.intdim() > 0 {
            self.flags.set_incomplete();
        } else if conv {
            self.flags.set_conv();
        }
        itv
    }

    /// Interval hull, one interval per variable.
    pub fn to_box(&mut self, o: &mut Oct) -> Vec<Interval> {
        self.begin();
        o.close();
        let dim = o.dim();
        let Some(m) = o.mat() else {
            return vec![Interval::BOTTOM; dim];
        };
        let mut out = Vec::with_capacity(dim);
        let mut conv = false;
        for v in 0..dim {
            if !m.is_dense() && !m.comps().contains(v) {
                out.push(Interval::TOP);
            } else {
                let (itv, c) = var_interval(m, v);
                conv |= c;
                out.push(itv);
            }
        }
        self.flags.exact = false;
        if o.intdim() > 0 {
            self.flags.set_incomplete();
        } else if conv {
            self.flags.set_conv();
        }
        out
    }

    /// Does the octagon entail the constraint? `false` doubles as "don't
    /// know"; the incompleteness flags tell the cases apart.
    pub fn sat_lincons(&mut self, o: &mut Oct, cons: &LinCons) -> bool {
        self.begin();
        o.close();
        let Some(m) = o.mat() else {
            return true;
        };
        match cons.kind {
            ConsKind::DisEq | ConsKind::EqMod(_) => return false,
            _ => {}
        }
        let u = uexpr_of_linexpr(&cons.expr, o.dim());
        match u.kind {
            UExprKind::Empty => true,
            UExprKind::Zero => {
                let sat = match cons.kind {
                    ConsKind::SupEq => u.a <= 0.0,
                    ConsKind::Sup => u.a < 0.0,
                    ConsKind::Eq => u.a == 0.0 && u.b == 0.0,
                    _ => unreachable!(),
                };
                self.sat_verdict(o, sat)
            }
            UExprKind::Unary => {
                let ui = 2 * u.i + if u.coef_i == 1 { 0 } else { 1 };
                let (t0, t1) = if !m.is_dense() && !m.comps().contains(u.i) {
                    (INF, INF)
                } else {
                    (
                        badd(2.0 * u.a, m.get(ui, ui ^ 1)),
                        badd(2.0 * u.b, m.get(ui ^ 1, ui)),
                    )
                };
                let sat = t0 <= 0.0
                    && (!matches!(cons.kind, ConsKind::Sup) || t0 < 0.0)
                    && (!matches!(cons.kind, ConsKind::Eq) || t1 <= 0.0);
                self.sat_verdict(o, sat)
            }
            UExprKind::Binary => {
                let ui = 2 * u.i + if u.coef_i == 1 { 0 } else { 1 };
                let uj = 2 * u.j + if u.coef_j == 1 { 0 } else { 1 };
                let (t0, t1) = if !m.is_dense() && !m.comps().is_connected(u.i, u.j) {
                    (INF, INF)
                } else {
                    (
                        badd(u.a, m.get(uj, ui ^ 1)),
                        badd(u.b, m.get(uj ^ 1, ui)),
                    )
                };
                let sat = t0 <= 0.0
                    && (!matches!(cons.kind, ConsKind::Sup) || t0 < 0.0)
                    && (!matches!(cons.kind, ConsKind::Eq) || t1 <= 0.0);
                self.sat_verdict(o, sat)
            }
            UExprKind::Other => {
                self.flags.set_incomplete();
                false
            }
        }
    }

    fn sat_verdict(&mut self, o: &Oct, sat: bool) -> bool {
        if !sat && o.intdim() > 0 {
            self.flags.set_incomplete();
        }
        sat
    }

    /// Constraint-array form: one constraint per finite off-diagonal
    /// stored entry, coherent twins emitted once.
    pub fn to_lincons_array(&mut self, o: &Oct) -> Vec<LinCons> {
        self.begin();
        let Some(m) = o.mat() else {
            return vec![LinCons::unsat()];
        };
        let mut out = Vec::new();
        let mut conv = false;
        let mut emit = |i: usize, j: usize, d: f64| {
            if i != j && d != INF {
                if i == (j ^ 1) {
                    conv = true;
                }
                out.push(lincons_of_bound(i, j, d));
            }
        };
        if m.is_dense() {
            for i in 0..2 * o.dim() {
                for j in 0..=(i | 1) {
                    emit(i, j, m.m[matpos(i, j)]);
                }
            }
        } else {
            for ca in m.comps().components() {
                for bi in 0..2 * ca.len() {
                    let i1 = 2 * ca[bi / 2] + (bi & 1);
                    for bj in 0..=(bi | 1) {
                        let j1 = 2 * ca[bj / 2] + (bj & 1);
                        emit(i1, j1, m.m[matpos(i1, j1)]);
                    }
                }
            }
        }
        if conv {
            self.flags.set_conv();
        }
        out
    }
}

fn is_leq_mat(a: &OctMat, b: &OctMat) -> bool {
    if a.is_dense() || b.is_dense() {
        a.m.iter().zip(b.m.iter()).all(|(x, y)| x <= y)
    } else {
        // only entries finite in b can fail the inclusion
        for cb in b.comps().components() {
            let mut ok = true;
            for_block(&cb, |p| {
                if a.m[p] > b.m[p] {
                    ok = false;
                }
            });
            if !ok {
                return false;
            }
        }
        true
    }
}

fn is_eq_mat(a: &OctMat, b: &OctMat) -> bool {
    if a.is_dense() || b.is_dense() {
        a.m.iter().zip(b.m.iter()).all(|(x, y)| x == y)
    } else {
        if !a.comps().same_partition(b.comps()) {
            return false;
        }
        let mut eq = true;
        for ca in a.comps().components() {
            for_block(&ca, |p| {
                if a.m[p] != b.m[p] {
                    eq = false;
                }
            });
        }
        eq
    }
}
