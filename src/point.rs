//! Points, line keys, and the numeric oracle
//!
//! A [`Point`] is a *named* 2D coordinate. Identity is the full
//! `(name, x, y)` triple: two points with the same name but different
//! coordinates are different points, and vice versa. Within one problem the
//! front-end guarantees names are unique, so ordering by name alone would be
//! equivalent; the coordinate bits are folded in anyway so that ordering and
//! hashing never depend on that guarantee.
//!
//! A [`Seg`] is the **unordered** pair of distinct endpoints of a segment.
//! It doubles as the *line key*: the column identifier of the algebraic
//! matrices. Two segments over the same endpoint pair share one key.
//!
//! Everything floating-point in this crate lives here. Coordinates are an
//! *oracle* — they answer "is this relation numerically plausible?" — and
//! never participate in a proof step. The tolerances are surfaced as named
//! constants at the crate root ([`crate::ANGLE_ABS_TOL`], [`crate::REL_TOL`],
//! [`crate::DEGENERATE_TOL`]).

#![forbid(unsafe_code)]

use std::f64::consts::PI;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::{DEGENERATE_TOL, REL_TOL};

/// A named 2D point. Immutable after creation.
#[derive(Clone, Debug)]
pub struct Point {
    /// Label used in predicates, fact IDs and rendered proofs.
    pub name: String,
    /// X coordinate (oracle only).
    pub x: f64,
    /// Y coordinate (oracle only).
    pub y: f64,
}

impl Point {
    /// Build a point from a name and coordinates.
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Self {
        Self { name: name.into(), x, y }
    }

    /// Total-order key: name first, then the raw coordinate bits.
    ///
    /// Comparing `f64` bit patterns keeps `Ord`/`Eq`/`Hash` consistent with
    /// each other without an external ordered-float dependency.
    #[inline]
    fn key(&self) -> (&str, u64, u64) {
        (&self.name, self.x.to_bits(), self.y.to_bits())
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for Point {}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Point {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for Point {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Human-readable output only ever cares about the label.
        f.write_str(&self.name)
    }
}

/// Unordered pair of points; the AR column key.
///
/// The constructor sorts the endpoints, so `Seg::new(a, b) == Seg::new(b, a)`
/// and derived ordering/hashing are canonical.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seg {
    lo: Point,
    hi: Point,
}

impl Seg {
    /// Build the line key for the segment `pq` (endpoint order irrelevant).
    pub fn new(p: Point, q: Point) -> Self {
        if p <= q {
            Self { lo: p, hi: q }
        } else {
            Self { lo: q, hi: p }
        }
    }

    /// First endpoint in canonical order.
    #[inline]
    pub fn lo(&self) -> &Point {
        &self.lo
    }

    /// Second endpoint in canonical order.
    #[inline]
    pub fn hi(&self) -> &Point {
        &self.hi
    }

    /// A segment with a repeated endpoint carries no direction or length.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.lo == self.hi
    }

    /// Euclidean length (oracle).
    #[inline]
    pub fn length(&self) -> f64 {
        distance(&self.lo, &self.hi)
    }

    /// Direction of the supporting line in `(-π, π]` (oracle).
    #[inline]
    pub fn direction(&self) -> f64 {
        angle_of_line(&self.lo, &self.hi)
    }
}

impl fmt::Display for Seg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.lo.name, self.hi.name)
    }
}

// ============================================================================
// Oracle helpers
// ============================================================================

/// Euclidean distance between two points.
#[inline]
pub fn distance(p: &Point, q: &Point) -> f64 {
    ((q.x - p.x).powi(2) + (q.y - p.y).powi(2)).sqrt()
}

/// Direction of the line through `p` towards `q`, via `atan2`.
#[inline]
pub fn angle_of_line(p: &Point, q: &Point) -> f64 {
    (q.y - p.y).atan2(q.x - p.x)
}

/// Directed angle at `q` from the ray `p→q` to the ray `q→r`, in `[0, 2π)`.
pub fn angle_between(p: &Point, q: &Point, r: &Point) -> f64 {
    let mut angle = angle_of_line(q, r) - angle_of_line(p, q);
    if angle < 0.0 {
        angle += 2.0 * PI;
    }
    angle
}

/// Distance from `x - y` to the nearest multiple of π.
///
/// This is the metric for every mod-π angle comparison: lines are parallel
/// when it is ~0, and two directed angles agree (mod π) the same way.
#[inline]
pub fn angle_diff_mod_pi(x: f64, y: f64) -> f64 {
    let d = (x - y).rem_euclid(PI);
    d.min(PI - d)
}

/// Do two point triples wind the same way?
///
/// Uses the shoelace edge sum of each triple; the orientations agree iff the
/// signed areas have the same sign.
pub fn same_orientation(t1: &[Point; 3], t2: &[Point; 3]) -> bool {
    fn signed_edge_sum(t: &[Point; 3]) -> f64 {
        let mut acc = 0.0;
        for i in 0..3 {
            let p = &t[i];
            let q = &t[(i + 1) % 3];
            acc += (q.x - p.x) * (q.y + p.y);
        }
        acc
    }
    signed_edge_sum(t1) * signed_edge_sum(t2) > 0.0
}

/// Relative closeness check for lengths and ratios.
///
/// Mirrors the conventional `isclose` contract: `|a - b|` within
/// [`crate::REL_TOL`] of the larger magnitude.
#[inline]
pub fn isclose(a: f64, b: f64) -> bool {
    (a - b).abs() <= REL_TOL * a.abs().max(b.abs())
}

/// Is the directed angle of a triple degenerate (straight or zero, mod π)?
#[inline]
pub fn is_straight(angle: f64) -> bool {
    angle_diff_mod_pi(angle, 0.0) <= DEGENERATE_TOL
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str, x: f64, y: f64) -> Point {
        Point::new(name, x, y)
    }

    #[test]
    fn seg_is_unordered() {
        let a = p("a", 0.0, 0.0);
        let b = p("b", 1.0, 2.0);
        assert_eq!(Seg::new(a.clone(), b.clone()), Seg::new(b.clone(), a.clone()));
        assert!(!Seg::new(a.clone(), b).is_degenerate());
        assert!(Seg::new(a.clone(), a).is_degenerate());
    }

    #[test]
    fn point_identity_is_the_full_triple() {
        let a1 = p("a", 0.0, 0.0);
        let a2 = p("a", 1.0, 0.0);
        assert_ne!(a1, a2);
        assert_eq!(a1, p("a", 0.0, 0.0));
    }

    #[test]
    fn directed_angle_is_normalized() {
        let a = p("a", -1.0, 0.0);
        let b = p("b", 0.0, 0.0);
        let c = p("c", 0.0, -1.0);
        let ang = angle_between(&a, &b, &c);
        assert!((0.0..2.0 * PI).contains(&ang));
        // Ray a→b points along +x, ray b→c along -y: three quarter turns.
        assert!((ang - 3.0 * PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn mod_pi_distance_wraps() {
        assert!(angle_diff_mod_pi(0.1, 0.1 + PI) < 1e-12);
        assert!((angle_diff_mod_pi(0.0, PI / 2.0) - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn orientation_flips_with_one_swap() {
        let t1 = [p("a", 0.0, 0.0), p("b", 1.0, 0.0), p("c", 0.0, 1.0)];
        let t2 = [t1[1].clone(), t1[0].clone(), t1[2].clone()];
        assert!(same_orientation(&t1, &t1.clone()));
        assert!(!same_orientation(&t1, &t2));
    }
}
