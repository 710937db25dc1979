//! # oct-rs: an optimized octagon abstract domain in Rust
//!
//! **`oct-rs`** implements the octagon abstract domain: a relational
//! numerical domain representing sets of points in ℝⁿ (or ℤⁿ) by
//! conjunctions of constraints of the form `±x_i ± x_j <= c`. It is meant
//! to be plugged into a static analyzer as one of its numerical domains.
//!
//! ## What is an octagon?
//!
//! Every variable `x_i` is doubled into two nodes, `+x_i` and `-x_i`, so
//! that each octagonal constraint becomes a plain difference bound and the
//! whole system a difference-bound matrix (DBM). The **canonical form**
//! --- strong closure --- is a modified shortest-path closure; on it,
//! entailment, equality and the interval hull read straight off the
//! matrix.
//!
//! ## Key Features
//!
//! - **Manager-Centric API**: all operations go through the
//!   [`OctManager`][crate::oct::OctManager], which carries the per-operation
//!   precision flags; octagon values are plain data.
//! - **Lazy Closure**: values remember whether they are canonical. Closure
//!   runs when an operation needs it and is cached in place; adding a
//!   single constraint re-canonicalizes incrementally in O(n²).
//! - **Decomposition**: variables are partitioned into independent
//!   components; closure and the lattice operations skip the quadratic or
//!   cubic work on variables never related to each other.
//! - **Total API**: no errors, no panics on out-of-range queries; precision
//!   losses are reported through [`Flags`][crate::oct::Flags] and the
//!   result stays a sound over-approximation.
//!
//! ## Basic Usage
//!
//! ```rust
//! use oct_rs::expr::LinCons;
//! use oct_rs::oct::OctManager;
//!
//! // 1. Create the manager and an unconstrained octagon over x0, x1
//! let mut man = OctManager::new();
//! let top = man.top(0, 2);
//!
//! // 2. Assume x0 <= 5 and x0 - x1 <= -3
//! let mut o = man.add_lincons_array(
//!     &top,
//!     &[LinCons::upper_bound(0, 5.0), LinCons::diff_bound(0, 1, -3.0)],
//! );
//!
//! // 3. Query the canonical form
//! assert!(man.sat_lincons(&mut o, &LinCons::upper_bound(0, 6.0)));
//! let boxes = man.to_box(&mut o);
//! assert_eq!(boxes[0].sup, 5.0);
//! ```
//!
//! ## Core Components
//!
//! - **[`hmat`]**: the half-matrix storage and the component-aware value.
//! - **[`closure`]**: strong, decomposed and incremental closure.
//! - **[`oct`]**: octagon values, the manager, lifecycle operations.
//! - **[`lattice`]** / **[`predicate`]** / **[`resize`]** / **[`transfer`]**:
//!   the domain operations grouped the way a host analyzer calls them.
//! - **[`dump`]**: text dumps for cross-implementation testing.

pub mod bound;
pub mod closure;
pub mod comps;
pub mod dump;
pub mod expr;
pub mod hmat;
pub mod lattice;
pub mod oct;
pub mod predicate;
pub mod resize;
pub mod transfer;

pub use expr::{ConsKind, Interval, LinCons, LinExpr};
pub use oct::{Flags, Oct, OctManager};
