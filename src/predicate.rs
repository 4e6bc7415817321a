//! Predicate algebra: canonical forms, decomposition, rows, validity
//!
//! Every geometric relation is one variant of [`Predicate`]. The constructors
//! store the *canonical* representative of the relation's symmetry class
//! (unordered pairs sorted, triangle correspondences orbit-minimised,
//! `Aconst` fractions reduced), so structural equality, ordering and hashing
//! coincide with equality-up-to-symmetry — the [`Predicate::canonical`] byte
//! key is just the rendered canonical form.
//!
//! ## Invariants
//!
//! - **Canonicalisation.** Two constructions related by an intrinsic symmetry
//!   produce identical values (`para(ab, cd) == para(dc, ba)`).
//! - **Decomposition is a DAG.** Composite predicates unfold only into
//!   strictly simpler kinds (`Midp` → `Col` + `Cong` → `Para`), never back
//!   into themselves.
//! - **Construction never fails.** Degenerate data is represented faithfully
//!   and rejected by the numeric validator, not by the constructor.
//!
//! The numeric checks ([`Predicate::is_valid`]) consult coordinates only as a
//! plausibility oracle; angle comparisons are mod π within
//! [`crate::ANGLE_ABS_TOL`], lengths within [`crate::REL_TOL`] relative.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::fmt;

use num_bigint::BigInt;
use num_rational::BigRational;

use crate::ar::Row;
use crate::canon;
use crate::point::{
    angle_between, angle_diff_mod_pi, is_straight, isclose, same_orientation, Point, Seg,
};
use crate::ANGLE_ABS_TOL;

/// Relation tags, one per [`Predicate`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rel {
    Col,
    Para,
    Perp,
    Cong,
    Eqangle,
    Eqratio,
    Cyclic,
    Midp,
    Simtri1,
    Simtri2,
    Contri1,
    Contri2,
    Sameclock,
    Aconst,
}

impl Rel {
    /// Every relation, in canonical order.
    pub const ALL: [Rel; 14] = [
        Rel::Col,
        Rel::Para,
        Rel::Perp,
        Rel::Cong,
        Rel::Eqangle,
        Rel::Eqratio,
        Rel::Cyclic,
        Rel::Midp,
        Rel::Simtri1,
        Rel::Simtri2,
        Rel::Contri1,
        Rel::Contri2,
        Rel::Sameclock,
        Rel::Aconst,
    ];

    /// Lowercase relation name as used in fact IDs and rendered proofs.
    pub fn name(self) -> &'static str {
        match self {
            Rel::Col => "col",
            Rel::Para => "para",
            Rel::Perp => "perp",
            Rel::Cong => "cong",
            Rel::Eqangle => "eqangle",
            Rel::Eqratio => "eqratio",
            Rel::Cyclic => "cyclic",
            Rel::Midp => "midp",
            Rel::Simtri1 => "simtri1",
            Rel::Simtri2 => "simtri2",
            Rel::Contri1 => "contri1",
            Rel::Contri2 => "contri2",
            Rel::Sameclock => "sameclock",
            Rel::Aconst => "aconst",
        }
    }

    /// Number of point arguments the relation takes.
    pub fn point_arity(self) -> usize {
        match self {
            Rel::Col | Rel::Midp | Rel::Aconst => 3,
            Rel::Para | Rel::Perp | Rel::Cong | Rel::Cyclic => 4,
            Rel::Eqangle
            | Rel::Simtri1
            | Rel::Simtri2
            | Rel::Contri1
            | Rel::Contri2
            | Rel::Sameclock => 6,
            Rel::Eqratio => 8,
        }
    }

    /// Number of integer arguments (only `aconst` carries any).
    pub fn int_arity(self) -> usize {
        match self {
            Rel::Aconst => 2,
            _ => 0,
        }
    }

    /// Look a relation up by its lowercase name.
    pub fn from_name(name: &str) -> Option<Rel> {
        Rel::ALL.iter().copied().find(|r| r.name() == name)
    }
}

impl fmt::Display for Rel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed table of recognised angle constants, as fractions of π.
pub const ANGLE_CONSTANTS: [(i64, i64); 9] = [
    (0, 1),
    (1, 6),
    (1, 4),
    (1, 3),
    (1, 2),
    (2, 3),
    (3, 4),
    (5, 6),
    (1, 1),
];

/// A geometric relation over named points, stored canonically.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Predicate {
    /// Three collinear points (fully symmetric; sorted).
    Col([Point; 3]),
    /// Two parallel lines (unordered pair of line keys).
    Para([Seg; 2]),
    /// Two perpendicular lines (unordered pair of line keys).
    Perp([Seg; 2]),
    /// Two segments of equal length (unordered pair of line keys).
    Cong([Seg; 2]),
    /// Two equal directed angles (unordered pair of *ordered* triples).
    Eqangle([[Point; 3]; 2]),
    /// Two equal length ratios (unordered pair of ordered seg pairs).
    Eqratio([[Seg; 2]; 2]),
    /// Four concyclic points (fully symmetric; sorted).
    Cyclic([Point; 4]),
    /// Midpoint: first field is the midpoint, endpoints sorted.
    Midp(Point, [Point; 2]),
    /// Directly similar triangles (rotation/swap orbit-minimised).
    Simtri1([[Point; 3]; 2]),
    /// Mirror-similar triangles (rotation orbit-minimised).
    Simtri2([[Point; 3]; 2]),
    /// Directly congruent triangles.
    Contri1([[Point; 3]; 2]),
    /// Mirror-congruent triangles.
    Contri2([[Point; 3]; 2]),
    /// Two triples with the same winding (unordered pair of triples).
    Sameclock([[Point; 3]; 2]),
    /// Constant angle `∠ABC = m·π/n` (fraction reduced, n > 0).
    Aconst([Point; 3], i64, i64),
}

// ============================================================================
// Constructors (canonicalising)
// ============================================================================

impl Predicate {
    pub fn col(a: Point, b: Point, c: Point) -> Self {
        Predicate::Col(canon::sorted([a, b, c]))
    }

    pub fn para(a: Point, b: Point, c: Point, d: Point) -> Self {
        Predicate::Para(canon::pair(Seg::new(a, b), Seg::new(c, d)))
    }

    pub fn perp(a: Point, b: Point, c: Point, d: Point) -> Self {
        Predicate::Perp(canon::pair(Seg::new(a, b), Seg::new(c, d)))
    }

    pub fn cong(a: Point, b: Point, c: Point, d: Point) -> Self {
        Predicate::Cong(canon::pair(Seg::new(a, b), Seg::new(c, d)))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn eqangle(a: Point, b: Point, c: Point, d: Point, e: Point, f: Point) -> Self {
        Predicate::Eqangle(canon::pair([a, b, c], [d, e, f]))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn eqratio(
        a: Point,
        b: Point,
        c: Point,
        d: Point,
        e: Point,
        f: Point,
        g: Point,
        h: Point,
    ) -> Self {
        let r1 = [Seg::new(a, b), Seg::new(c, d)];
        let r2 = [Seg::new(e, f), Seg::new(g, h)];
        Predicate::Eqratio(canon::pair(r1, r2))
    }

    pub fn cyclic(a: Point, b: Point, c: Point, d: Point) -> Self {
        Predicate::Cyclic(canon::sorted([a, b, c, d]))
    }

    pub fn midp(m: Point, a: Point, b: Point) -> Self {
        Predicate::Midp(m, canon::pair(a, b))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn simtri1(a: Point, b: Point, c: Point, d: Point, e: Point, f: Point) -> Self {
        Predicate::Simtri1(canon::tri_orbit([a, b, c], [d, e, f], true))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn simtri2(a: Point, b: Point, c: Point, d: Point, e: Point, f: Point) -> Self {
        Predicate::Simtri2(canon::tri_orbit([a, b, c], [d, e, f], false))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn contri1(a: Point, b: Point, c: Point, d: Point, e: Point, f: Point) -> Self {
        Predicate::Contri1(canon::tri_orbit([a, b, c], [d, e, f], true))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn contri2(a: Point, b: Point, c: Point, d: Point, e: Point, f: Point) -> Self {
        Predicate::Contri2(canon::tri_orbit([a, b, c], [d, e, f], false))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn sameclock(a: Point, b: Point, c: Point, d: Point, e: Point, f: Point) -> Self {
        Predicate::Sameclock(canon::pair([a, b, c], [d, e, f]))
    }

    pub fn aconst(a: Point, b: Point, c: Point, m: i64, n: i64) -> Self {
        let (m, n) = canon::reduce_frac(m, n);
        Predicate::Aconst([a, b, c], m, n)
    }

    /// Arity-checked builder from a relation tag plus argument lists.
    ///
    /// Used by the front-end parser and the fact-store driver; returns `None`
    /// on an arity mismatch.
    pub fn from_args(rel: Rel, pts: &[Point], ints: &[i64]) -> Option<Predicate> {
        if pts.len() != rel.point_arity() || ints.len() != rel.int_arity() {
            return None;
        }
        let p = |i: usize| pts[i].clone();
        Some(match rel {
            Rel::Col => Predicate::col(p(0), p(1), p(2)),
            Rel::Para => Predicate::para(p(0), p(1), p(2), p(3)),
            Rel::Perp => Predicate::perp(p(0), p(1), p(2), p(3)),
            Rel::Cong => Predicate::cong(p(0), p(1), p(2), p(3)),
            Rel::Eqangle => Predicate::eqangle(p(0), p(1), p(2), p(3), p(4), p(5)),
            Rel::Eqratio => {
                Predicate::eqratio(p(0), p(1), p(2), p(3), p(4), p(5), p(6), p(7))
            }
            Rel::Cyclic => Predicate::cyclic(p(0), p(1), p(2), p(3)),
            Rel::Midp => Predicate::midp(p(0), p(1), p(2)),
            Rel::Simtri1 => Predicate::simtri1(p(0), p(1), p(2), p(3), p(4), p(5)),
            Rel::Simtri2 => Predicate::simtri2(p(0), p(1), p(2), p(3), p(4), p(5)),
            Rel::Contri1 => Predicate::contri1(p(0), p(1), p(2), p(3), p(4), p(5)),
            Rel::Contri2 => Predicate::contri2(p(0), p(1), p(2), p(3), p(4), p(5)),
            Rel::Sameclock => Predicate::sameclock(p(0), p(1), p(2), p(3), p(4), p(5)),
            Rel::Aconst => Predicate::aconst(p(0), p(1), p(2), ints[0], ints[1]),
        })
    }
}

// ============================================================================
// Identity & rendering
// ============================================================================

impl Predicate {
    /// The relation tag of this predicate.
    pub fn kind(&self) -> Rel {
        match self {
            Predicate::Col(_) => Rel::Col,
            Predicate::Para(_) => Rel::Para,
            Predicate::Perp(_) => Rel::Perp,
            Predicate::Cong(_) => Rel::Cong,
            Predicate::Eqangle(_) => Rel::Eqangle,
            Predicate::Eqratio(_) => Rel::Eqratio,
            Predicate::Cyclic(_) => Rel::Cyclic,
            Predicate::Midp(..) => Rel::Midp,
            Predicate::Simtri1(_) => Rel::Simtri1,
            Predicate::Simtri2(_) => Rel::Simtri2,
            Predicate::Contri1(_) => Rel::Contri1,
            Predicate::Contri2(_) => Rel::Contri2,
            Predicate::Sameclock(_) => Rel::Sameclock,
            Predicate::Aconst(..) => Rel::Aconst,
        }
    }

    /// Argument tokens in canonical order (point names, then integers).
    pub fn arg_tokens(&self) -> Vec<String> {
        fn names(ps: &[&Point]) -> Vec<String> {
            ps.iter().map(|p| p.name.clone()).collect()
        }
        match self {
            Predicate::Col(ps) => names(&ps.iter().collect::<Vec<_>>()),
            Predicate::Cyclic(ps) => names(&ps.iter().collect::<Vec<_>>()),
            Predicate::Para([s1, s2]) | Predicate::Perp([s1, s2]) | Predicate::Cong([s1, s2]) => {
                names(&[s1.lo(), s1.hi(), s2.lo(), s2.hi()])
            }
            Predicate::Eqangle([t1, t2]) | Predicate::Sameclock([t1, t2]) => {
                names(&[&t1[0], &t1[1], &t1[2], &t2[0], &t2[1], &t2[2]])
            }
            Predicate::Eqratio([[a, b], [c, d]]) => names(&[
                a.lo(),
                a.hi(),
                b.lo(),
                b.hi(),
                c.lo(),
                c.hi(),
                d.lo(),
                d.hi(),
            ]),
            Predicate::Midp(m, [a, b]) => names(&[m, a, b]),
            Predicate::Simtri1([t1, t2])
            | Predicate::Simtri2([t1, t2])
            | Predicate::Contri1([t1, t2])
            | Predicate::Contri2([t1, t2]) => {
                names(&[&t1[0], &t1[1], &t1[2], &t2[0], &t2[1], &t2[2]])
            }
            Predicate::Aconst([a, b, c], m, n) => {
                let mut toks = names(&[a, b, c]);
                toks.push(m.to_string());
                toks.push(n.to_string());
                toks
            }
        }
    }

    /// Deterministic byte key identifying the predicate up to symmetry.
    ///
    /// Also serves as the fact ID inside the deductive database:
    /// `"<relname>(<a>,<b>,…)"`.
    pub fn canonical(&self) -> String {
        format!("{}({})", self.kind().name(), self.arg_tokens().join(","))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind().name())?;
        for tok in self.arg_tokens() {
            write!(f, " {tok}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Sub-predicate decomposition
// ============================================================================

fn simtri1_children(t1: &[Point; 3], t2: &[Point; 3]) -> Vec<Predicate> {
    let [a, b, c] = t1.clone();
    let [d, e, f] = t2.clone();
    // Three equal angles and the six side-ratio identities of a direct
    // similarity, phrased over the corresponding sides.
    vec![
        Predicate::eqangle(a.clone(), b.clone(), c.clone(), d.clone(), e.clone(), f.clone()),
        Predicate::eqangle(b.clone(), c.clone(), a.clone(), e.clone(), f.clone(), d.clone()),
        Predicate::eqangle(c.clone(), a.clone(), b.clone(), f.clone(), d.clone(), e.clone()),
        Predicate::eqratio(
            a.clone(), c.clone(), b.clone(), c.clone(),
            d.clone(), f.clone(), e.clone(), f.clone(),
        ),
        Predicate::eqratio(
            a.clone(), c.clone(), b.clone(), a.clone(),
            d.clone(), f.clone(), e.clone(), d.clone(),
        ),
        Predicate::eqratio(
            b.clone(), c.clone(), a.clone(), b.clone(),
            e.clone(), f.clone(), d.clone(), e.clone(),
        ),
        Predicate::eqratio(
            a.clone(), c.clone(), d.clone(), f.clone(),
            b.clone(), c.clone(), e.clone(), f.clone(),
        ),
        Predicate::eqratio(
            b.clone(), c.clone(), e.clone(), f.clone(),
            b.clone(), a.clone(), e.clone(), d.clone(),
        ),
        Predicate::eqratio(b.clone(), a.clone(), e.clone(), d.clone(), a, c, d, f),
    ]
}

fn simtri2_children(t1: &[Point; 3], t2: &[Point; 3]) -> Vec<Predicate> {
    let [a, b, c] = t1.clone();
    let [d, e, f] = t2.clone();
    // Mirror similarity: angles correspond with reversed orientation.
    vec![
        Predicate::eqangle(a.clone(), b.clone(), c.clone(), f.clone(), e.clone(), d.clone()),
        Predicate::eqangle(b.clone(), c.clone(), a.clone(), d.clone(), f.clone(), e.clone()),
        Predicate::eqangle(c.clone(), a.clone(), b.clone(), e.clone(), d.clone(), f.clone()),
        Predicate::eqratio(
            a.clone(), c.clone(), a.clone(), b.clone(),
            d.clone(), f.clone(), d.clone(), e.clone(),
        ),
        Predicate::eqratio(a.clone(), b.clone(), b, c, d.clone(), e.clone(), e, f),
    ]
}

fn side_congs(t1: &[Point; 3], t2: &[Point; 3], mirrored: bool) -> Vec<Predicate> {
    let [a, b, c] = t1.clone();
    let [d, e, f] = t2.clone();
    if mirrored {
        vec![
            Predicate::cong(a.clone(), b.clone(), d.clone(), e.clone()),
            Predicate::cong(b, c.clone(), e, f.clone()),
            Predicate::cong(a, c, d, f),
        ]
    } else {
        vec![
            Predicate::cong(a.clone(), b.clone(), d.clone(), e.clone()),
            Predicate::cong(b, c.clone(), e, f.clone()),
            Predicate::cong(c, a, f, d),
        ]
    }
}

impl Predicate {
    /// The atomic consequences implied by the composite structure.
    ///
    /// Atomic predicates return the empty set. The decomposition is strictly
    /// decreasing in complexity, so recursive unfolding terminates.
    pub fn sub_predicates(&self) -> BTreeSet<Predicate> {
        match self {
            Predicate::Col([a, b, c]) => [
                Predicate::para(a.clone(), b.clone(), b.clone(), c.clone()),
                Predicate::para(a.clone(), b.clone(), a.clone(), c.clone()),
                Predicate::para(b.clone(), c.clone(), a.clone(), c.clone()),
            ]
            .into_iter()
            .collect(),
            Predicate::Midp(m, [a, b]) => [
                Predicate::col(m.clone(), a.clone(), b.clone()),
                Predicate::cong(a.clone(), m.clone(), m.clone(), b.clone()),
            ]
            .into_iter()
            .collect(),
            Predicate::Cyclic([a, b, c, d]) => [
                Predicate::eqangle(
                    b.clone(), a.clone(), c.clone(),
                    b.clone(), d.clone(), c.clone(),
                ),
                Predicate::eqangle(
                    d.clone(), a.clone(), c.clone(),
                    d.clone(), b.clone(), c.clone(),
                ),
                Predicate::eqangle(
                    b.clone(), d.clone(), a.clone(),
                    b.clone(), c.clone(), a.clone(),
                ),
                Predicate::eqangle(
                    d.clone(), b.clone(), a.clone(),
                    d.clone(), c.clone(), a.clone(),
                ),
            ]
            .into_iter()
            .collect(),
            Predicate::Simtri1([t1, t2]) => simtri1_children(t1, t2).into_iter().collect(),
            Predicate::Simtri2([t1, t2]) => simtri2_children(t1, t2).into_iter().collect(),
            Predicate::Contri1([t1, t2]) => simtri1_children(t1, t2)
                .into_iter()
                .chain(side_congs(t1, t2, false))
                .collect(),
            Predicate::Contri2([t1, t2]) => simtri2_children(t1, t2)
                .into_iter()
                .chain(side_congs(t1, t2, true))
                .collect(),
            _ => BTreeSet::new(),
        }
    }
}

// ============================================================================
// Algebraic row emission
// ============================================================================

impl Predicate {
    /// Rows for the angle system (line directions mod π, in half-turn units).
    ///
    /// Composites emit the union of their children's rows, each tagged with
    /// the child as its source.
    pub fn angle_rows(&self) -> Vec<Row> {
        match self {
            Predicate::Para([s1, s2]) => {
                let mut row = Row::new(self.clone());
                row.bump(s1.clone(), 1);
                row.bump(s2.clone(), -1);
                vec![row]
            }
            Predicate::Perp([s1, s2]) => {
                let mut row = Row::new(self.clone());
                row.bump(s1.clone(), 1);
                row.bump(s2.clone(), 1);
                row.set_constant(BigRational::new(BigInt::from(1), BigInt::from(2)));
                vec![row]
            }
            Predicate::Aconst([a, b, c], m, n) => {
                if *n == 0 {
                    return Vec::new();
                }
                let mut row = Row::new(self.clone());
                row.bump(Seg::new(a.clone(), b.clone()), 1);
                row.bump(Seg::new(b.clone(), c.clone()), -1);
                row.set_constant(BigRational::new(BigInt::from(*m), BigInt::from(2 * *n)));
                vec![row]
            }
            Predicate::Eqangle([t1, t2]) => {
                let mut row = Row::new(self.clone());
                row.bump(Seg::new(t1[0].clone(), t1[1].clone()), 1);
                row.bump(Seg::new(t1[1].clone(), t1[2].clone()), -1);
                row.bump(Seg::new(t2[0].clone(), t2[1].clone()), -1);
                row.bump(Seg::new(t2[1].clone(), t2[2].clone()), 1);
                vec![row]
            }
            Predicate::Cong(_) | Predicate::Eqratio(_) | Predicate::Sameclock(_) => Vec::new(),
            _ => self
                .sub_predicates()
                .iter()
                .flat_map(|s| s.angle_rows())
                .collect(),
        }
    }

    /// Rows for the ratio system (log-lengths; no constant term).
    pub fn ratio_rows(&self) -> Vec<Row> {
        match self {
            Predicate::Cong([s1, s2]) => {
                let mut row = Row::new(self.clone());
                row.bump(s1.clone(), 1);
                row.bump(s2.clone(), -1);
                vec![row]
            }
            Predicate::Eqratio([[n1, d1], [n2, d2]]) => {
                let mut row = Row::new(self.clone());
                row.bump(n1.clone(), 1);
                row.bump(d1.clone(), -1);
                row.bump(n2.clone(), -1);
                row.bump(d2.clone(), 1);
                vec![row]
            }
            Predicate::Para(_)
            | Predicate::Perp(_)
            | Predicate::Eqangle(_)
            | Predicate::Sameclock(_)
            | Predicate::Aconst(..) => Vec::new(),
            _ => self
                .sub_predicates()
                .iter()
                .flat_map(|s| s.ratio_rows())
                .collect(),
        }
    }
}

// ============================================================================
// Numeric validity (oracle)
// ============================================================================

fn distinct3(t: &[Point; 3]) -> bool {
    t[0] != t[1] && t[1] != t[2] && t[0] != t[2]
}

impl Predicate {
    /// Does the relation hold under the points' coordinates?
    ///
    /// For composites this is the conjunction of the children's validity.
    /// Never panics; degenerate data simply answers `false` (or `true` for
    /// trivially-true cases like `para` of a line with itself).
    pub fn is_valid(&self) -> bool {
        match self {
            Predicate::Para([s1, s2]) => {
                if s1.is_degenerate() || s2.is_degenerate() {
                    return false;
                }
                if s1 == s2 {
                    return true;
                }
                angle_diff_mod_pi(s1.direction(), s2.direction()) <= ANGLE_ABS_TOL
            }
            Predicate::Perp([s1, s2]) => {
                if s1.is_degenerate() || s2.is_degenerate() || s1 == s2 {
                    return false;
                }
                let d = (s1.direction() - s2.direction()).rem_euclid(PI);
                (d - PI / 2.0).abs() <= ANGLE_ABS_TOL
            }
            Predicate::Cong([s1, s2]) => isclose(s1.length(), s2.length()),
            Predicate::Eqangle([t1, t2]) => {
                if !distinct3(t1) || !distinct3(t2) {
                    return false;
                }
                if t1 == t2 {
                    return true;
                }
                let a1 = angle_between(&t1[0], &t1[1], &t1[2]);
                let a2 = angle_between(&t2[0], &t2[1], &t2[2]);
                if is_straight(a1) || is_straight(a2) {
                    return false;
                }
                angle_diff_mod_pi(a1, a2) <= ANGLE_ABS_TOL
            }
            Predicate::Eqratio([r1, r2]) => {
                if r1 == r2 {
                    return true;
                }
                for seg in [&r1[0], &r1[1], &r2[0], &r2[1]] {
                    if seg.is_degenerate() {
                        return false;
                    }
                }
                isclose(
                    r1[0].length() / r1[1].length(),
                    r2[0].length() / r2[1].length(),
                )
            }
            Predicate::Sameclock([t1, t2]) => {
                if !distinct3(t1) || !distinct3(t2) {
                    return false;
                }
                if t1 == t2 {
                    return true;
                }
                same_orientation(t1, t2)
            }
            Predicate::Aconst([a, b, c], m, n) => {
                if *n <= 0 || a == b || b == c {
                    return false;
                }
                let target = (*m as f64) * PI / (*n as f64);
                angle_diff_mod_pi(angle_between(a, b, c), target) <= ANGLE_ABS_TOL
            }
            // Composites: every child must hold.
            _ => self.sub_predicates().iter().all(|s| s.is_valid()),
        }
    }
}

// ============================================================================
// Candidate enumeration
// ============================================================================

/// Lexicographic `k`-combinations of `0..n`.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if k > n {
        return out;
    }
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.clone());
        // Advance the rightmost index that can still move.
        let mut i = k;
        loop {
            if i == 0 {
                return out;
            }
            i -= 1;
            if idx[i] != i + n - k {
                break;
            }
        }
        idx[i] += 1;
        for j in i + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

/// Lexicographic `k`-permutations of `0..n` (distinct indices).
fn permutations(n: usize, k: usize) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    if k > n {
        return out;
    }
    let mut cur: Vec<usize> = Vec::with_capacity(k);
    let mut used = vec![false; n];
    fn rec(
        n: usize,
        k: usize,
        cur: &mut Vec<usize>,
        used: &mut Vec<bool>,
        out: &mut Vec<Vec<usize>>,
    ) {
        if cur.len() == k {
            out.push(cur.clone());
            return;
        }
        for i in 0..n {
            if !used[i] {
                used[i] = true;
                cur.push(i);
                rec(n, k, cur, used, out);
                cur.pop();
                used[i] = false;
            }
        }
    }
    rec(n, k, &mut cur, &mut used, &mut out);
    out
}

impl Predicate {
    /// Deterministically enumerate candidate instances over a point set.
    ///
    /// The points are sorted first so the order never depends on the caller.
    /// Canonicalisation may map several enumerated shapes to one value;
    /// callers deduplicate by canonical form before doing any work.
    pub fn enumerate(rel: Rel, points: &[Point]) -> Vec<Predicate> {
        let mut pts: Vec<Point> = points.to_vec();
        pts.sort();
        let n = pts.len();
        let p = |i: &usize| pts[*i].clone();

        match rel {
            Rel::Col => combinations(n, 3)
                .iter()
                .map(|ix| Predicate::col(p(&ix[0]), p(&ix[1]), p(&ix[2])))
                .collect(),
            Rel::Para | Rel::Perp | Rel::Cong => {
                let segs = combinations(n, 2);
                let mut out = Vec::new();
                for pair in combinations(segs.len(), 2) {
                    let (s1, s2) = (&segs[pair[0]], &segs[pair[1]]);
                    let args = (p(&s1[0]), p(&s1[1]), p(&s2[0]), p(&s2[1]));
                    out.push(match rel {
                        Rel::Para => Predicate::para(args.0, args.1, args.2, args.3),
                        Rel::Perp => Predicate::perp(args.0, args.1, args.2, args.3),
                        _ => Predicate::cong(args.0, args.1, args.2, args.3),
                    });
                }
                out
            }
            Rel::Eqangle | Rel::Sameclock | Rel::Simtri1 | Rel::Simtri2 | Rel::Contri1
            | Rel::Contri2 => {
                let tris = permutations(n, 3);
                let mut out = Vec::new();
                for pair in combinations(tris.len(), 2) {
                    let (t1, t2) = (&tris[pair[0]], &tris[pair[1]]);
                    let a = [p(&t1[0]), p(&t1[1]), p(&t1[2])];
                    let b = [p(&t2[0]), p(&t2[1]), p(&t2[2])];
                    out.push(match rel {
                        Rel::Eqangle => Predicate::eqangle(
                            a[0].clone(), a[1].clone(), a[2].clone(),
                            b[0].clone(), b[1].clone(), b[2].clone(),
                        ),
                        Rel::Sameclock => Predicate::sameclock(
                            a[0].clone(), a[1].clone(), a[2].clone(),
                            b[0].clone(), b[1].clone(), b[2].clone(),
                        ),
                        Rel::Simtri1 => Predicate::simtri1(
                            a[0].clone(), a[1].clone(), a[2].clone(),
                            b[0].clone(), b[1].clone(), b[2].clone(),
                        ),
                        Rel::Simtri2 => Predicate::simtri2(
                            a[0].clone(), a[1].clone(), a[2].clone(),
                            b[0].clone(), b[1].clone(), b[2].clone(),
                        ),
                        Rel::Contri1 => Predicate::contri1(
                            a[0].clone(), a[1].clone(), a[2].clone(),
                            b[0].clone(), b[1].clone(), b[2].clone(),
                        ),
                        _ => Predicate::contri2(
                            a[0].clone(), a[1].clone(), a[2].clone(),
                            b[0].clone(), b[1].clone(), b[2].clone(),
                        ),
                    });
                }
                out
            }
            Rel::Eqratio => permutations(n, 8)
                .iter()
                .map(|ix| {
                    Predicate::eqratio(
                        p(&ix[0]), p(&ix[1]), p(&ix[2]), p(&ix[3]),
                        p(&ix[4]), p(&ix[5]), p(&ix[6]), p(&ix[7]),
                    )
                })
                .collect(),
            Rel::Cyclic => permutations(n, 4)
                .iter()
                .map(|ix| Predicate::cyclic(p(&ix[0]), p(&ix[1]), p(&ix[2]), p(&ix[3])))
                .collect(),
            Rel::Midp => permutations(n, 3)
                .iter()
                .map(|ix| Predicate::midp(p(&ix[0]), p(&ix[1]), p(&ix[2])))
                .collect(),
            Rel::Aconst => {
                let mut out = Vec::new();
                for ix in permutations(n, 3) {
                    for (m, d) in ANGLE_CONSTANTS {
                        out.push(Predicate::aconst(p(&ix[0]), p(&ix[1]), p(&ix[2]), m, d));
                    }
                }
                out
            }
        }
    }
}

// ============================================================================
// Deductions
// ============================================================================

/// Rule label for initial facts.
pub const RULE_AXIOM: &str = "axiom";
/// Rule label for composite-structure unfolding.
pub const RULE_SUB: &str = "sub_deduction";
/// Rule label for algebraic deductions.
pub const RULE_AR: &str = "AR";
/// Rule label for trivially-true algebraic targets.
pub const RULE_AR_IMPLICIT: &str = "AR_implicit";

/// One derivation path: a predicate, the predicates it followed from, and
/// the rule that fired. Deductions are equal only when all three coincide.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deduction {
    /// The derived predicate.
    pub predicate: Predicate,
    /// Parent predicates the derivation consumed (empty for axioms).
    pub parents: BTreeSet<Predicate>,
    /// Name of the rule that produced the derivation.
    pub rule: &'static str,
}

impl Deduction {
    /// Build a deduction record.
    pub fn new(
        predicate: Predicate,
        parents: impl IntoIterator<Item = Predicate>,
        rule: &'static str,
    ) -> Self {
        Self { predicate, parents: parents.into_iter().collect(), rule }
    }

    /// An initial fact with no parents.
    pub fn axiom(predicate: Predicate) -> Self {
        Self::new(predicate, [], RULE_AXIOM)
    }
}

impl fmt::Display for Deduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  | {}", self.predicate, self.rule)?;
        let mut first = true;
        for p in &self.parents {
            if first {
                write!(f, " {p}")?;
                first = false;
            } else {
                write!(f, ", {p}")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;
    use num_traits::Zero;

    fn pt(name: &str, x: f64, y: f64) -> Point {
        Point::new(name, x, y)
    }

    fn square() -> (Point, Point, Point, Point) {
        (pt("a", 0.0, 0.0), pt("b", 1.0, 0.0), pt("c", 1.0, 1.0), pt("d", 0.0, 1.0))
    }

    #[test]
    fn para_is_symmetric_under_all_its_symmetries() {
        let (a, b, c, d) = square();
        let base = Predicate::para(a.clone(), b.clone(), c.clone(), d.clone());
        for variant in [
            Predicate::para(b.clone(), a.clone(), c.clone(), d.clone()),
            Predicate::para(a.clone(), b.clone(), d.clone(), c.clone()),
            Predicate::para(c.clone(), d.clone(), a.clone(), b.clone()),
            Predicate::para(d, c, b, a),
        ] {
            assert_eq!(base, variant);
            assert_eq!(base.canonical(), variant.canonical());
        }
    }

    #[test]
    fn eqangle_swaps_triples_but_keeps_their_order() {
        let (a, b, c, d) = square();
        let e = pt("e", 2.0, 0.0);
        let f = pt("f", 2.0, 1.0);
        let lhs = Predicate::eqangle(
            a.clone(), b.clone(), c.clone(), d.clone(), e.clone(), f.clone(),
        );
        let swapped = Predicate::eqangle(d.clone(), e.clone(), f.clone(), a.clone(), b.clone(), c.clone());
        assert_eq!(lhs, swapped);
        // Reversing one triple is a *different* statement.
        let reversed = Predicate::eqangle(c, b, a, d, e, f);
        assert_ne!(lhs, reversed);
    }

    #[test]
    fn simtri1_orbit_covers_rotation_and_swap() {
        let (a, b, c, _) = square();
        let d = pt("d", 4.0, 0.0);
        let e = pt("e", 6.0, 0.0);
        let f = pt("f", 6.0, 2.0);
        let base = Predicate::simtri1(
            a.clone(), b.clone(), c.clone(), d.clone(), e.clone(), f.clone(),
        );
        let rotated = Predicate::simtri1(
            b.clone(), c.clone(), a.clone(), e.clone(), f.clone(), d.clone(),
        );
        let swapped = Predicate::simtri1(d, e, f, a, b, c);
        assert_eq!(base, rotated);
        assert_eq!(base, swapped);
    }

    #[test]
    fn aconst_reduces_its_fraction() {
        let (a, b, c, _) = square();
        let p1 = Predicate::aconst(a.clone(), b.clone(), c.clone(), 2, 4);
        let p2 = Predicate::aconst(a, b, c, 1, 2);
        assert_eq!(p1, p2);
        assert_eq!(p1.canonical(), p2.canonical());
    }

    #[test]
    fn col_decomposes_into_three_paras() {
        let a = pt("a", 0.0, 0.0);
        let b = pt("b", 1.0, 0.0);
        let c = pt("c", 2.0, 0.0);
        let subs = Predicate::col(a.clone(), b.clone(), c.clone()).sub_predicates();
        assert_eq!(subs.len(), 3);
        assert!(subs.contains(&Predicate::para(a.clone(), b.clone(), b.clone(), c.clone())));
        assert!(subs.contains(&Predicate::para(a.clone(), b.clone(), a.clone(), c.clone())));
        assert!(subs.contains(&Predicate::para(b, c.clone(), a, c)));
    }

    #[test]
    fn midp_unfolds_transitively_to_paras() {
        let m = pt("m", 1.0, 0.0);
        let a = pt("a", 0.0, 0.0);
        let b = pt("b", 2.0, 0.0);
        let midp = Predicate::midp(m.clone(), a.clone(), b.clone());
        let subs = midp.sub_predicates();
        assert_eq!(subs.len(), 2);
        assert!(subs.contains(&Predicate::col(m.clone(), a.clone(), b.clone())));
        assert!(subs.contains(&Predicate::cong(a, m.clone(), m, b)));
        // One more level down reaches atoms only.
        for s in &subs {
            for ss in s.sub_predicates() {
                assert!(ss.sub_predicates().is_empty());
            }
        }
    }

    #[test]
    fn contri_children_extend_simtri_children() {
        let (a, b, c, _) = square();
        let d = pt("d", 4.0, 0.0);
        let e = pt("e", 5.0, 0.0);
        let f = pt("f", 5.0, 1.0);
        let sim = Predicate::simtri1(
            a.clone(), b.clone(), c.clone(), d.clone(), e.clone(), f.clone(),
        );
        let con = Predicate::contri1(a, b, c, d, e, f);
        let sim_subs = sim.sub_predicates();
        let con_subs = con.sub_predicates();
        assert!(sim_subs.is_subset(&con_subs));
        assert_eq!(con_subs.len(), sim_subs.len() + 3);
        assert_eq!(con_subs.iter().filter(|s| s.kind() == Rel::Cong).count(), 3);
    }

    #[test]
    fn perp_row_carries_the_half_turn_constant() {
        let (a, b, c, d) = square();
        let rows = Predicate::perp(a.clone(), b.clone(), b.clone(), c.clone()).angle_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].constant(),
            &BigRational::new(BigInt::from(1), BigInt::from(2))
        );
        // Para of a line with itself cancels to the zero row.
        let trivial = Predicate::para(a.clone(), b.clone(), a, b).angle_rows();
        assert!(trivial[0].is_zero());
        let _ = (c, d);
    }

    #[test]
    fn eqangle_row_merges_coincident_line_keys() {
        let a = pt("a", 0.0, 0.0);
        let b = pt("b", 1.0, 0.0);
        let c = pt("c", 0.0, 1.0);
        // Both triples over the same three lines with swapped roles: the
        // merged coefficients must still sum to zero overall.
        let rows = Predicate::eqangle(
            a.clone(), b.clone(), c.clone(), c.clone(), b.clone(), a.clone(),
        )
        .angle_rows();
        assert_eq!(rows.len(), 1);
        let total: BigRational =
            rows[0].coeffs().values().cloned().fold(BigRational::zero(), |x, y| x + y);
        assert!(total.is_zero());
    }

    #[test]
    fn validity_respects_canonical_symmetry() {
        let (a, b, c, d) = square();
        let p1 = Predicate::para(a.clone(), b.clone(), d.clone(), c.clone());
        let p2 = Predicate::para(c.clone(), d.clone(), b.clone(), a.clone());
        assert_eq!(p1.is_valid(), p2.is_valid());
        assert!(p1.is_valid());
        assert!(Predicate::perp(a.clone(), b.clone(), a.clone(), d.clone()).is_valid());
        assert!(!Predicate::perp(a.clone(), b.clone(), a.clone(), c.clone()).is_valid());
        assert!(Predicate::cong(a.clone(), b.clone(), b.clone(), c.clone()).is_valid());
        assert!(!Predicate::cong(a.clone(), b.clone(), a.clone(), c.clone()).is_valid());
        assert!(Predicate::para(a.clone(), b.clone(), a.clone(), b.clone()).is_valid());
        assert!(!Predicate::perp(a.clone(), b.clone(), b, a).is_valid());
    }

    #[test]
    fn aconst_validity_is_mod_pi() {
        let a = pt("a", -1.0, 0.0);
        let b = pt("b", 0.0, 0.0);
        let d = pt("d", 0.0, -1.0);
        // Directed angle a→b→d is 3π/2, which is π/2 mod π.
        assert!(Predicate::aconst(a.clone(), b.clone(), d.clone(), 1, 2).is_valid());
        assert!(!Predicate::aconst(a, b, d, 1, 3).is_valid());
    }

    #[test]
    fn enumeration_shapes_match_the_contract() {
        let pts: Vec<Point> = [("a", 0.0, 0.0), ("b", 1.0, 0.0), ("c", 0.0, 1.0), ("d", 1.0, 1.0)]
            .iter()
            .map(|&(n, x, y)| pt(n, x, y))
            .collect();
        assert_eq!(Predicate::enumerate(Rel::Col, &pts).len(), 4); // C(4,3)
        // C(C(4,2), 2) = C(6,2) = 15 pairs of segments.
        assert_eq!(Predicate::enumerate(Rel::Para, &pts).len(), 15);
        // Pairs of 3-permutations: C(24, 2) = 276.
        assert_eq!(Predicate::enumerate(Rel::Eqangle, &pts).len(), 276);
        // 3-permutations times the 9 constants.
        assert_eq!(Predicate::enumerate(Rel::Aconst, &pts).len(), 24 * 9);
        // Not enough points for an 8-permutation.
        assert!(Predicate::enumerate(Rel::Eqratio, &pts).is_empty());
    }

    #[test]
    fn canonical_doubles_as_fact_id() {
        let (a, b, c, d) = square();
        let p = Predicate::para(c, d, a, b);
        assert_eq!(p.canonical(), "para(a,b,c,d)");
        assert_eq!(p.to_string(), "para a b c d");
    }
}
