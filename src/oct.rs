//! Octagon values and the manager that dispatches domain operations.
//!
//! An [`Oct`] is one of `Bottom` (definitely empty), `Open(m)` (a matrix
//! whose closure has not been computed) or `Closed(m)` (a strongly closed
//! matrix). Closure is lazy: operations that need the canonical form
//! promote `Open` to `Closed` in place, which is why they take their
//! operands by `&mut`. `Bottom` is terminal: every operation maps it to
//! `Bottom` or a trivially true answer.
//!
//! The [`OctManager`] owns the per-operation precision flags. Each public
//! operation resets them on entry; after the call the host can ask whether
//! the answer was exact, incomplete on the rationals, subject to
//! conversion rounding, or degraded because closure was skipped.

use log::debug;

use crate::bound::INF;
use crate::closure;
use crate::expr::Interval;
use crate::hmat::OctMat;

/// Storage state of an octagon: at most one matrix at a time.
#[derive(Clone, Debug)]
pub(crate) enum Repr {
    Bottom,
    Open(OctMat),
    Closed(OctMat),
}

/// An octagon over `dim` variables, the first `intdim` of them integer.
#[derive(Clone, Debug)]
pub struct Oct {
    dim: usize,
    intdim: usize,
    pub(crate) repr: Repr,
}

impl Oct {
    pub(crate) fn new(dim: usize, intdim: usize, repr: Repr) -> Self {
        debug_assert!(intdim <= dim);
        Oct { dim, intdim, repr }
    }

    pub(crate) fn bottom(dim: usize, intdim: usize) -> Self {
        Oct::new(dim, intdim, Repr::Bottom)
    }

    /// Number of variables.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of integer variables (indices `0..intdim`).
    pub fn intdim(&self) -> usize {
        self.intdim
    }

    /// True iff the value is stored in strongly closed form.
    pub fn is_closed(&self) -> bool {
        matches!(self.repr, Repr::Closed(_))
    }

    /// True iff the value is the definite empty octagon (no matrix).
    /// An unclosed value may still be empty without this knowing; use
    /// [`OctManager::is_bottom`] for the deciding test.
    pub fn is_definitely_bottom(&self) -> bool {
        matches!(self.repr, Repr::Bottom)
    }

    /// Integer tightening applies when every dimension is integer.
    pub(crate) fn is_int(&self) -> bool {
        self.dim > 0 && self.intdim == self.dim
    }

    pub(crate) fn mat(&self) -> Option<&OctMat> {
        match &self.repr {
            Repr::Bottom => None,
            Repr::Open(m) | Repr::Closed(m) => Some(m),
        }
    }

    pub(crate) fn mat_mut(&mut self) -> Option<&mut OctMat> {
        match &mut self.repr {
            Repr::Bottom => None,
            Repr::Open(m) | Repr::Closed(m) => Some(m),
        }
    }

    /// True iff the full half-matrix is materialized and the component
    /// list ignored.
    pub fn is_dense(&self) -> bool {
        self.mat().map(|m| m.is_dense()).unwrap_or(false)
    }

    /// The component partition: sorted member lists, ordered by smallest
    /// member. Empty for dense or bottom values.
    pub fn components(&self) -> Vec<Vec<usize>> {
        self.mat().map(|m| m.comps().components()).unwrap_or_default()
    }

    /// Promote `Open` to `Closed`, or to `Bottom` when closure detects
    /// emptiness. No-op on `Closed` and `Bottom`.
    pub fn close(&mut self) {
        if matches!(self.repr, Repr::Open(_)) {
            let is_int = self.is_int();
            let repr = std::mem::replace(&mut self.repr, Repr::Bottom);
            if let Repr::Open(mut m) = repr {
                if closure::strong_closure(&mut m, is_int) {
                    debug!("oct: closure detected bottom");
                    self.repr = Repr::Bottom;
                } else {
                    self.repr = Repr::Closed(m);
                }
            }
        }
    }
}

/// Precision flags of the last operation (all failures are soft: the
/// returned octagon is always a sound over-approximation).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    /// The answer is tight.
    pub exact: bool,
    /// A definite answer was not reached on the rationals.
    pub incomplete: bool,
    /// A numeric conversion lost precision (bound halving).
    pub conv: bool,
    /// Closure was skipped, the result is coarser than it could be.
    pub algo: bool,
}

impl Flags {
    pub(crate) fn fresh() -> Flags {
        Flags {
            exact: true,
            ..Flags::default()
        }
    }

    pub(crate) fn set_incomplete(&mut self) {
        self.exact = false;
        self.incomplete = true;
    }

    pub(crate) fn set_conv(&mut self) {
        self.exact = false;
        self.conv = true;
    }

    pub(crate) fn set_algo(&mut self) {
        self.exact = false;
        self.algo = true;
    }
}

/// Entry point for every domain operation.
#[derive(Debug, Default)]
pub struct OctManager {
    pub(crate) flags: Flags,
}

impl OctManager {
    pub fn new() -> Self {
        OctManager {
            flags: Flags::fresh(),
        }
    }

    /// Flags describing the precision of the last operation.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub(crate) fn begin(&mut self) {
        self.flags = Flags::fresh();
    }

    /// The unconstrained octagon (already closed).
    pub fn top(&mut self, intdim: usize, realdim: usize) -> Oct {
        self.begin();
        let dim = intdim + realdim;
        Oct::new(dim, intdim, Repr::Closed(OctMat::top(dim)))
    }

    /// The empty octagon.
    pub fn bottom(&mut self, intdim: usize, realdim: usize) -> Oct {
        self.begin();
        Oct::bottom(intdim + realdim, intdim)
    }

    /// `(intdim, realdim)` of a value.
    pub fn dimension(&self, o: &Oct) -> (usize, usize) {
        (o.intdim(), o.dim() - o.intdim())
    }

    /// Independent copy; matrix and component list are freshly owned.
    pub fn copy(&mut self, o: &Oct) -> Oct {
        self.begin();
        o.clone()
    }

    /// Force the canonical form now rather than lazily.
    pub fn close(&mut self, o: &mut Oct) {
        self.begin();
        o.close();
    }

    /// Materialize the dense representation; the partition is dropped.
    pub fn to_dense(&mut self, o: &mut Oct) {
        self.begin();
        if let Some(m) = o.mat_mut() {
            m.to_dense();
        }
    }

    /// Recover the decomposed representation, re-deriving the partition
    /// from the finite entries.
    pub fn to_decomposed(&mut self, o: &mut Oct) {
        self.begin();
        if let Some(m) = o.mat_mut() {
            m.to_decomposed();
        }
    }

    /// Octagon of a box: one interval per variable. A strengthening pass
    /// alone restores closure, since only unary bounds are present.
    pub fn of_box(&mut self, intdim: usize, realdim: usize, t: &[Interval]) -> Oct {
        self.begin();
        let dim = intdim + realdim;
        assert_eq!(t.len(), dim, "of_box: interval count must match dim");
        if t.iter().any(|i| i.is_empty()) {
            return Oct::bottom(dim, intdim);
        }
        let mut m = OctMat::top(dim);
        for (i, itv) in t.iter().enumerate() {
            if itv.is_top() {
                continue;
            }
            if itv.sup != INF {
                m.set(2 * i + 1, 2 * i, 2.0 * itv.sup);
            }
            if itv.inf != f64::NEG_INFINITY {
                m.set(2 * i, 2 * i + 1, -2.0 * itv.inf);
            }
            m.comps.insert(i);
        }
        let is_int = dim > 0 && intdim == dim;
        if closure::strengthening_only(&mut m, is_int) {
            Oct::bottom(dim, intdim)
        } else {
            Oct::new(dim, intdim, Repr::Closed(m))
        }
    }
}
