//! Text dumps for cross-implementation testing, plus the constraint
//! `Display` of octagon values.
//!
//! Matrix dump format: the first line is `n`, then the dense `2n x 2n`
//! matrix row by row, space separated, `+∞` printed as the literal
//! `inf`. The decomposed dump prints each component's member list
//! followed by that component's block. An empty octagon prints `0`.

use std::fmt::{self, Write};

use crate::bound::INF;
use crate::hmat::matpos;
use crate::oct::Oct;
use crate::predicate::lincons_of_bound;

/// `-0.0` compares equal to `0.0` but prints as `-0`.
#[inline]
fn norm(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v
    }
}

/// Dense matrix dump.
pub fn dump_matrix(o: &Oct) -> String {
    let Some(m) = o.mat() else {
        return "0\n".to_string();
    };
    let n = 2 * o.dim();
    let mut s = String::new();
    writeln!(s, "{}", o.dim()).unwrap();
    for i in 0..n {
        for j in 0..n {
            if j > 0 {
                s.push(' ');
            }
            write!(s, "{}", norm(m.get(i, j))).unwrap();
        }
        s.push('\n');
    }
    s
}

/// Per-component dump: member list, then the component's dense block.
/// Falls back to the dense dump for a dense matrix.
pub fn dump_decomposed(o: &Oct) -> String {
    let Some(m) = o.mat() else {
        return "0\n".to_string();
    };
    if m.is_dense() {
        return dump_matrix(o);
    }
    let mut s = String::new();
    writeln!(s, "{}", o.dim()).unwrap();
    for comp in m.comps().components() {
        for (k, v) in comp.iter().enumerate() {
            if k > 0 {
                s.push(' ');
            }
            write!(s, "{}", v).unwrap();
        }
        s.push('\n');
        let b = comp.len() * 2;
        for bi in 0..b {
            let i1 = 2 * comp[bi / 2] + (bi & 1);
            for bj in 0..b {
                let j1 = 2 * comp[bj / 2] + (bj & 1);
                if bj > 0 {
                    s.push(' ');
                }
                write!(s, "{}", norm(m.get(i1, j1))).unwrap();
            }
            s.push('\n');
        }
    }
    s
}

impl fmt::Display for Oct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let intdim = self.intdim();
        let realdim = self.dim() - intdim;
        let Some(m) = self.mat() else {
            return write!(f, "empty octagon of dim ({},{})", intdim, realdim);
        };
        writeln!(f, "octagon of dim ({},{})", intdim, realdim)?;
        let mut cons = Vec::new();
        {
            let mut emit = |i: usize, j: usize| {
                let d = m.m[matpos(i, j)];
                if i != j && d != INF {
                    cons.push(lincons_of_bound(i, j, d));
                }
            };
            if m.is_dense() {
                for i in 0..2 * self.dim() {
                    for j in 0..=(i | 1) {
                        emit(i, j);
                    }
                }
            } else {
                for comp in m.comps().components() {
                    for bi in 0..2 * comp.len() {
                        let i1 = 2 * comp[bi / 2] + (bi & 1);
                        for bj in 0..=(bi | 1) {
                            let j1 = 2 * comp[bj / 2] + (bj & 1);
                            emit(i1, j1);
                        }
                    }
                }
            }
        }
        for c in &cons {
            writeln!(f, "{}", c)?;
        }
        Ok(())
    }
}
