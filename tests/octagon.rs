//! End-to-end tests for the octagon domain.
//!
//! Covers the lattice laws, closure invariants, the dense/decomposed
//! equivalence, conversions, and a set of concrete scenarios; randomized
//! cases use a fixed-seed generator so failures reproduce.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use oct_rs::dump::{dump_decomposed, dump_matrix};
use oct_rs::expr::{ConsKind, Interval, LinCons, LinExpr};
use oct_rs::oct::{Oct, OctManager};

const INF: f64 = f64::INFINITY;

// ─── Helpers ───────────────────────────────────────────────────────────────────

/// Parse a dense dump back into a `2n x 2n` matrix.
fn parse_dump(s: &str) -> Vec<Vec<f64>> {
    let mut lines = s.lines();
    let n: usize = lines.next().unwrap().parse().unwrap();
    let m: Vec<Vec<f64>> = lines
        .map(|l| l.split(' ').map(|t| t.parse().unwrap()).collect())
        .collect();
    assert_eq!(m.len(), 2 * n);
    m
}

fn random_cons(rng: &mut ChaCha8Rng, dim: usize) -> LinCons {
    let c = rng.gen_range(-8..=8) as f64;
    let v = rng.gen_range(0..dim);
    let w = rng.gen_range(0..dim);
    match rng.gen_range(0..5) {
        0 => LinCons::upper_bound(v, c.abs()),
        1 => LinCons::lower_bound(v, c),
        2 if v != w => LinCons::diff_bound(v, w, c),
        3 if v != w => LinCons::sum_bound(v, w, c.abs()),
        _ => LinCons::upper_bound(v, c.abs() + 1.0),
    }
}

fn random_oct(man: &mut OctManager, rng: &mut ChaCha8Rng, dim: usize, k: usize) -> Oct {
    let top = man.top(0, dim);
    let cons: Vec<LinCons> = (0..k).map(|_| random_cons(rng, dim)).collect();
    man.add_lincons_array(&top, &cons)
}

/// Does the point satisfy the constraint? (point-constant expressions)
fn point_sat(c: &LinCons, p: &[f64]) -> bool {
    let mut val = c.expr.constant().sup;
    for &(v, coef) in c.expr.terms() {
        val += coef * p[v];
    }
    match c.kind {
        ConsKind::SupEq => val >= 0.0,
        ConsKind::Sup => val > 0.0,
        ConsKind::Eq => val == 0.0,
        _ => true,
    }
}

fn point_sat_all(cons: &[LinCons], p: &[f64]) -> bool {
    cons.iter().all(|c| point_sat(c, p))
}

/// All integer points of `[-6, 6]^dim`.
fn grid(dim: usize) -> Vec<Vec<f64>> {
    let mut points = vec![vec![]];
    for _ in 0..dim {
        let mut next = Vec::new();
        for p in &points {
            for x in -6..=6 {
                let mut q = p.clone();
                q.push(x as f64);
                next.push(q);
            }
        }
        points = next;
    }
    points
}

// ─── Concrete scenarios ────────────────────────────────────────────────────────

#[test]
fn pure_difference_constraints_stay_unary_free() {
    let mut man = OctManager::new();
    let top = man.top(0, 2);
    let mut o = man.add_lincons_array(
        &top,
        &[LinCons::diff_bound(0, 1, 3.0), LinCons::diff_bound(1, 0, -1.0)],
    );
    o.close();
    let m = parse_dump(&dump_matrix(&o));
    // x0 - x1 <= 3 at (2, 0), x1 - x0 <= -1 at (0, 2)
    assert_eq!(m[2][0], 3.0);
    assert_eq!(m[0][2], -1.0);
    // no unary bounds appear out of thin air
    assert_eq!(m[0][1], INF);
    assert_eq!(m[1][0], INF);
    assert_eq!(m[2][3], INF);
    assert_eq!(m[3][2], INF);
    assert_eq!(man.to_box(&mut o), vec![Interval::TOP, Interval::TOP]);
}

#[test]
fn transitive_entailment_through_closure() {
    let mut man = OctManager::new();
    let top = man.top(0, 2);
    let mut o = man.add_lincons_array(
        &top,
        &[
            LinCons::upper_bound(0, 5.0),
            LinCons::lower_bound(0, 0.0),
            LinCons::upper_bound(1, 7.0),
            LinCons::diff_bound(0, 1, -3.0),
        ],
    );
    o.close();
    // x0 >= 0 and x1 >= x0 + 3 entail x1 >= 3
    assert!(man.sat_lincons(&mut o, &LinCons::lower_bound(1, 3.0)));
    assert!(!man.sat_lincons(&mut o, &LinCons::lower_bound(1, 4.0)));
    assert_eq!(man.bound_dimension(&mut o, 1), Interval::new(3.0, 7.0));
}

#[test]
fn untouched_variables_stay_out_of_components() {
    let mut man = OctManager::new();
    let top = man.top(0, 3);
    let o = man.add_lincons_array(
        &top,
        &[LinCons::upper_bound(0, 1.0), LinCons::lower_bound(0, 1.0)],
    );
    assert!(!man.is_dimension_unconstrained(&o, 0));
    assert!(man.is_dimension_unconstrained(&o, 1));
    assert!(man.is_dimension_unconstrained(&o, 2));
    assert_eq!(o.components(), vec![vec![0]]);
}

#[test]
fn negative_cycle_closes_to_bottom() {
    let mut man = OctManager::new();
    let top = man.top(0, 3);
    let mut o = man.add_lincons_array(
        &top,
        &[
            LinCons::diff_bound(0, 1, 0.0),
            LinCons::diff_bound(1, 2, 0.0),
            LinCons::diff_bound(2, 0, -1.0),
        ],
    );
    assert!(man.is_bottom(&mut o));
}

#[test]
fn join_of_two_points_is_their_hull() {
    let mut man = OctManager::new();
    let mut a = man.of_box(0, 1, &[Interval::point(0.0)]);
    let mut b = man.of_box(0, 1, &[Interval::point(2.0)]);
    let mut j = man.join(&mut a, &mut b);
    assert_eq!(man.to_box(&mut j), vec![Interval::new(0.0, 2.0)]);
    assert!(man.sat_lincons(&mut j, &LinCons::lower_bound(0, 0.0)));
    assert!(man.sat_lincons(&mut j, &LinCons::upper_bound(0, 2.0)));
}

#[test]
fn widening_loses_the_growing_side_only() {
    let mut man = OctManager::new();
    let mut a = man.of_box(0, 1, &[Interval::new(0.0, 1.0)]);
    let mut b = man.of_box(0, 1, &[Interval::new(0.0, 2.0)]);
    let mut w = man.widening(&mut a, &mut b);
    assert_eq!(man.bound_dimension(&mut w, 0), Interval::new(0.0, INF));
}

// ─── Coherence and closure invariants ──────────────────────────────────────────

#[test]
fn dumps_are_coherent() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xC0);
    let mut man = OctManager::new();
    for dim in 1..5usize {
        for _ in 0..20 {
            let mut o = random_oct(&mut man, &mut rng, dim, 2 * dim);
            o.close();
            let m = parse_dump(&dump_matrix(&o));
            if m.is_empty() {
                continue; // bottom
            }
            for i in 0..2 * dim {
                for j in 0..2 * dim {
                    assert_eq!(m[i][j], m[j ^ 1][i ^ 1], "coherence at ({}, {})", i, j);
                }
            }
        }
    }
}

#[test]
fn closure_is_idempotent() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xC1);
    let mut man = OctManager::new();
    for _ in 0..30 {
        let a = random_oct(&mut man, &mut rng, 3, 5);
        let b = random_oct(&mut man, &mut rng, 3, 5);
        // meet defers closure, so this value is genuinely unclosed
        let mut m1 = man.meet(&a, &b);
        m1.close();
        let d1 = dump_matrix(&m1);
        m1.close();
        assert_eq!(d1, dump_matrix(&m1));
        // and closing a re-decomposed copy agrees as well
        let mut m2 = m1.clone();
        man.to_decomposed(&mut m2);
        m2.close();
        assert_eq!(d1, dump_matrix(&m2));
    }
}

#[test]
fn closure_preserves_the_concretization() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xC2);
    let mut man = OctManager::new();
    let points = grid(2);
    for _ in 0..25 {
        let cons: Vec<LinCons> = (0..4).map(|_| random_cons(&mut rng, 2)).collect();
        let top = man.top(0, 2);
        let mut o = man.add_lincons_array(&top, &cons);
        o.close();
        if o.is_definitely_bottom() {
            // empty octagon: no sampled point may satisfy the system
            for p in &points {
                assert!(!point_sat_all(&cons, p), "bottom lost a point {:?}", p);
            }
            continue;
        }
        let closed_cons = man.to_lincons_array(&o);
        for p in &points {
            if point_sat_all(&cons, p) {
                assert!(
                    point_sat_all(&closed_cons, p),
                    "closure dropped point {:?} of {:?}",
                    p,
                    cons
                );
            }
        }
    }
}

#[test]
fn boxes_over_approximate() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xC3);
    let mut man = OctManager::new();
    let points = grid(2);
    for _ in 0..25 {
        let cons: Vec<LinCons> = (0..4).map(|_| random_cons(&mut rng, 2)).collect();
        let top = man.top(0, 2);
        let mut o = man.add_lincons_array(&top, &cons);
        let boxes = man.to_box(&mut o);
        for p in &points {
            if point_sat_all(&cons, p) {
                for (v, itv) in boxes.iter().enumerate() {
                    assert!(itv.contains(p[v]), "box lost {:?} at x{}", p, v);
                }
            }
        }
    }
}

// ─── Lattice laws ──────────────────────────────────────────────────────────────

#[test]
fn lattice_laws_hold() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xC4);
    let mut man = OctManager::new();
    for _ in 0..20 {
        let mut a = random_oct(&mut man, &mut rng, 3, 4);
        let mut b = random_oct(&mut man, &mut rng, 3, 4);
        let mut c = random_oct(&mut man, &mut rng, 3, 4);
        let mut top = man.top(0, 3);
        let mut bot = man.bottom(0, 3);

        assert!(man.is_leq(&mut a, &top));
        assert!(man.is_leq(&mut bot, &a));

        // join is an upper bound, meet a lower bound
        let mut j = man.join(&mut a, &mut b);
        assert!(man.is_leq(&mut a, &j));
        assert!(man.is_leq(&mut b, &j));
        let mut m = man.meet(&a, &b);
        assert!(man.is_leq(&mut m, &a));
        assert!(man.is_leq(&mut m, &b));

        // commutativity
        let mut j2 = man.join(&mut b, &mut a);
        assert!(man.is_eq(&mut j, &mut j2));
        let mut m2 = man.meet(&b, &a);
        assert!(man.is_eq(&mut m, &mut m2));

        // associativity
        let mut jab_c = {
            let mut jab = man.join(&mut a, &mut b);
            man.join(&mut jab, &mut c)
        };
        let mut ja_bc = {
            let mut jbc = man.join(&mut b, &mut c);
            man.join(&mut a, &mut jbc)
        };
        assert!(man.is_eq(&mut jab_c, &mut ja_bc));

        // join idempotence
        let mut a2 = a.clone();
        let mut jaa = man.join(&mut a, &mut a2);
        assert!(man.is_eq(&mut jaa, &mut a));

        // antisymmetry
        let leq = man.is_leq(&mut a, &b);
        let geq = man.is_leq(&mut b, &a);
        let eq = man.is_eq(&mut a, &mut b);
        assert_eq!(leq && geq, eq);

        // top/bottom absorb
        let mut jt = man.join(&mut a, &mut top);
        assert!(man.is_top(&jt) || man.is_eq(&mut jt, &mut top));
        let mut mb = man.meet(&a, &bot);
        assert!(man.is_bottom(&mut mb));
    }
}

#[test]
fn widening_chains_stabilize() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xC5);
    let mut man = OctManager::new();
    let dim = 2;
    // ascending chain via running joins
    let mut chain = vec![random_oct(&mut man, &mut rng, dim, 3)];
    for _ in 0..40 {
        let mut next = random_oct(&mut man, &mut rng, dim, 3);
        let mut prev = chain.last().unwrap().clone();
        chain.push(man.join(&mut prev, &mut next));
    }
    let mut b = chain[0].clone();
    let mut stable_at = None;
    for (i, a) in chain.iter().enumerate().skip(1) {
        let mut a = a.clone();
        let mut next = man.widening(&mut b, &mut a);
        if man.is_eq(&mut next, &mut b) {
            stable_at = Some(i);
            break;
        }
        b = next;
    }
    // 2 * (2*dim)^2 is a generous version of the theoretical bound
    let bound = 2 * (2 * dim) * (2 * dim);
    assert!(
        matches!(stable_at, Some(i) if i <= bound),
        "widening did not stabilize within {} steps",
        bound
    );
}

#[test]
fn narrowing_refines_after_widening() {
    let mut man = OctManager::new();
    let mut a = man.of_box(0, 1, &[Interval::new(0.0, 1.0)]);
    let mut b = man.of_box(0, 1, &[Interval::new(0.0, 10.0)]);
    let mut w = man.widening(&mut a, &mut b);
    let mut n = man.narrowing(&mut w, &mut b);
    // the widened [0, +inf) narrows back to [0, 10]
    assert!(man.is_eq(&mut n, &mut b));
}

// ─── Dense / decomposed equivalence ────────────────────────────────────────────

#[test]
fn dense_and_decomposed_agree_on_closure() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xC6);
    let mut man = OctManager::new();
    for dim in 1..5usize {
        for _ in 0..15 {
            let o = random_oct(&mut man, &mut rng, dim, 2 * dim);
            let mut sparse = o.clone();
            let mut dense = o.clone();
            man.to_dense(&mut dense);
            sparse.close();
            dense.close();
            assert_eq!(dump_matrix(&sparse), dump_matrix(&dense));
        }
    }
}

#[test]
fn dense_and_decomposed_agree_on_lattice_ops() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xC7);
    let mut man = OctManager::new();
    for _ in 0..15 {
        let a = random_oct(&mut man, &mut rng, 3, 4);
        let b = random_oct(&mut man, &mut rng, 3, 4);
        let (mut ad, mut bd) = (a.clone(), b.clone());
        man.to_dense(&mut ad);
        man.to_dense(&mut bd);

        let mut ms = man.meet(&a, &b);
        let mut md = man.meet(&ad, &bd);
        ms.close();
        md.close();
        assert_eq!(dump_matrix(&ms), dump_matrix(&md));

        let (mut a1, mut b1) = (a.clone(), b.clone());
        let js = man.join(&mut a1, &mut b1);
        let jd = man.join(&mut ad, &mut bd);
        assert_eq!(dump_matrix(&js), dump_matrix(&jd));

        let (mut a2, mut b2) = (a.clone(), b.clone());
        let mut ws = man.widening(&mut a2, &mut b2);
        let mut wd = man.widening(&mut ad, &mut bd);
        ws.close();
        wd.close();
        assert_eq!(dump_matrix(&ws), dump_matrix(&wd));
    }
}

#[test]
fn dense_and_decomposed_agree_on_forget() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xC8);
    let mut man = OctManager::new();
    for _ in 0..15 {
        let o = random_oct(&mut man, &mut rng, 4, 5);
        let mut s = o.clone();
        let mut d = o.clone();
        man.to_dense(&mut d);
        let fs = man.forget_array(&mut s, &[1, 3], false);
        let fd = man.forget_array(&mut d, &[1, 3], false);
        assert_eq!(dump_matrix(&fs), dump_matrix(&fd));
    }
}

#[test]
fn decomposed_dump_lists_each_component() {
    let mut man = OctManager::new();
    let top = man.top(0, 4);
    let o = man.add_lincons_array(
        &top,
        &[LinCons::diff_bound(0, 2, 1.0), LinCons::upper_bound(3, 9.0)],
    );
    assert_eq!(o.components(), vec![vec![0, 2], vec![3]]);
    let s = dump_decomposed(&o);
    let lines: Vec<&str> = s.lines().collect();
    assert_eq!(lines[0], "4");
    assert_eq!(lines[1], "0 2");
    // component {0, 2} block: 4 rows; then component {3}: 1 line + 2 rows
    assert_eq!(lines[6], "3");
}

// ─── Conversions ───────────────────────────────────────────────────────────────

#[test]
fn lincons_array_roundtrips() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xC9);
    let mut man = OctManager::new();
    for _ in 0..25 {
        let mut a = random_oct(&mut man, &mut rng, 3, 4);
        a.close();
        if a.is_definitely_bottom() {
            continue;
        }
        let cons = man.to_lincons_array(&a);
        let top = man.top(0, 3);
        let mut back = man.add_lincons_array(&top, &cons);
        assert!(man.is_eq(&mut back, &mut a), "roundtrip failed for {}", a);
    }
}

#[test]
fn box_of_oct_of_box() {
    let mut man = OctManager::new();
    let boxes = [
        Interval::new(-2.0, 7.0),
        Interval::TOP,
        Interval::new(3.0, 3.0),
    ];
    let mut o = man.of_box(0, 3, &boxes);
    assert_eq!(man.to_box(&mut o), boxes.to_vec());
}

#[test]
fn integer_octagons_tighten_bounds() {
    let mut man = OctManager::new();
    let top = man.top(2, 0);
    // 2*x0 <= 5 via x0 + x0... expressed as a sum bound on x0 and x1
    // shifted apart: use x0 + x1 <= 5 with x0 = x1 enforced
    let mut o = man.add_lincons_array(
        &top,
        &[
            LinCons::sum_bound(0, 1, 5.0),
            LinCons::new(LinExpr::cst(0.0).term(0, 1.0).term(1, -1.0), ConsKind::Eq),
        ],
    );
    o.close();
    // x0 = x1 and x0 + x1 <= 5 give x0 <= 2 on integers
    assert!(man.sat_lincons(&mut o, &LinCons::upper_bound(0, 2.0)));
}

// ─── Transfer round trips ──────────────────────────────────────────────────────

#[test]
fn assign_then_substitute_returns_superset() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xCA);
    let mut man = OctManager::new();
    for _ in 0..20 {
        let mut a = random_oct(&mut man, &mut rng, 3, 4);
        if man.is_bottom(&mut a) {
            continue;
        }
        let shift = rng.gen_range(-4..=4) as f64;
        let e = LinExpr::cst(shift).term(1, 1.0);
        let mut assigned = man.assign_linexpr(&mut a, 1, &e, None);
        let mut back = man.substitute_linexpr(&mut assigned, 1, &e, None);
        // substitution computes the weakest precondition, so the original
        // states are always included
        assert!(man.is_leq(&mut a, &back));
    }
}

#[test]
fn sequencing_constraints_matches_batch() {
    let mut man = OctManager::new();
    let top = man.top(0, 2);
    let batch = [
        LinCons::upper_bound(0, 4.0),
        LinCons::diff_bound(1, 0, 1.0),
        LinCons::lower_bound(1, -3.0),
    ];
    let mut all = man.add_lincons_array(&top, &batch);
    let mut stepped = top.clone();
    for c in &batch {
        stepped = man.add_lincons_array(&stepped, &[c.clone()]);
    }
    assert!(man.is_eq(&mut all, &mut stepped));
}
