//! Crate root: public surface, shared tolerances, and prover-wide invariants
//!
//! This crate is an automated synthetic-geometry prover. A problem is a set
//! of named 2D points, a set of initial geometric predicates, and a set of
//! goal predicates; the prover saturates the known facts under two
//! complementary engines until every goal is derived or nothing new appears:
//!
//! - a **deductive database** ([`dd`]) — a datalog-style engine that drives
//!   a fixed geometry rule table to a fixpoint with full provenance, and
//! - an **algebraic reasoner** ([`ar`]) — two exact-rational linear systems
//!   (line directions mod π; log-lengths) in which a target predicate is
//!   deduced by row-span membership with a minimised witness.
//!
//! The [`problem`] module owns the saturation loop and renders the final
//! topologically-ordered proof. Coordinates are consulted **only** as a
//! plausibility oracle ([`point`]); no floating-point value ever becomes a
//! proof step, and all span arithmetic is exact.
//!
//! ## Invariants (crate-wide)
//!
//! - **Canonical identity.** Predicates hash, compare and render through
//!   their canonical symmetry representative ([`predicate`]).
//! - **Monotone state.** Known predicates, validity caches, matrix rows and
//!   stored facts only ever grow; re-registration is idempotent everywhere.
//! - **Determinism.** Same input, same rendered proof, byte for byte: every
//!   order-sensitive scan iterates in canonical key order.
//! - **Single-threaded.** Nothing here suspends, spawns or shares; a
//!   [`problem::Problem`] is mutated only through its methods.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// Algebraic reasoner (angle/ratio linear systems over exact rationals).
pub mod ar;
pub(crate) mod canon;
/// Deductive database (normalised fact store + semi-naive saturation).
pub mod dd;
/// Textual problem front-end.
pub mod parse;
/// Points, line keys, numeric oracle helpers.
pub mod point;
/// Predicate algebra (canonical forms, decomposition, rows, validity).
pub mod predicate;
/// Proof coordinator (state, saturation loop, proof rendering).
pub mod problem;
pub(crate) mod rules;

// ============================================================================
// Shared tolerance constants
// ============================================================================

/// Absolute tolerance for angle comparisons, mod π.
///
/// Deliberately permissive: drawing coordinates are small and integer-ish,
/// and angles only gate *plausibility*, never a proof step.
pub const ANGLE_ABS_TOL: f64 = 1e-2;

/// Relative tolerance for length and ratio comparisons.
pub const REL_TOL: f64 = 1e-9;

/// Absolute tolerance below which a configuration counts as degenerate
/// (straight angle, zero-length direction).
pub const DEGENERATE_TOL: f64 = 1e-9;

/// Magnitude below which a witness coefficient counts as zero.
///
/// The span arithmetic in [`ar`] is exact over rationals, so the non-zero
/// test there is exact; this constant documents the threshold an inexact
/// (floating-point) backend would have to apply instead.
pub const AR_COEFF_TOL: f64 = 1e-9;

// ============================================================================
// Root re-exports
// ============================================================================

pub use crate::ar::Ar;
pub use crate::dd::Dd;
pub use crate::parse::{parse_problem, ParseError, ParsedProblem};
pub use crate::point::{Point, Seg};
pub use crate::predicate::{Deduction, Predicate, Rel};
pub use crate::problem::{Problem, ProblemError, DEFAULT_MAX_ITERS};
