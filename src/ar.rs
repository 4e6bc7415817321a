//! Algebraic reasoner: angle and ratio linear systems over exact rationals
//!
//! Predicates encode into sparse rational rows over line-key columns
//! ([`crate::point::Seg`]): the *angle* system works in half-turn units of
//! line directions (mod π) and carries a constant column; the *ratio* system
//! works in log-lengths and all its constants are zero. A target predicate
//! follows algebraically iff its row lies in the row span of the stored rows.
//!
//! ## Invariants
//!
//! - **One row per source.** Re-adding a predicate (or a composite sharing a
//!   child) never duplicates a row.
//! - **Append-only.** Rows are never removed; deducibility is monotone in
//!   the stored set.
//! - **Exactness.** All span tests run over `BigRational`, so membership and
//!   the non-zero test on witness coefficients are exact. The float-facing
//!   threshold [`crate::AR_COEFF_TOL`] documents the tolerance an inexact
//!   backend would need; it is not consulted on the rational path.
//! - **No panics.** An undecidable or degenerate system simply yields no
//!   deduction.
//!
//! Witness minimisation walks the active rows in insertion order and drops
//! every row whose removal keeps the target in span, which both prunes
//! spurious parents and makes the reported parent set deterministic.

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use num_rational::BigRational;
use num_traits::Zero;

use crate::point::Seg;
use crate::predicate::{Deduction, Predicate, RULE_AR, RULE_AR_IMPLICIT};

/// One sparse linear row: rational coefficients per line key plus a constant.
///
/// Ratio rows simply keep the constant at zero. Zero coefficients are dropped
/// eagerly so `is_zero` is a structural check.
#[derive(Clone, Debug)]
pub struct Row {
    source: Predicate,
    coeffs: BTreeMap<Seg, BigRational>,
    constant: BigRational,
}

impl Row {
    /// Fresh zero row attributed to `source`.
    pub fn new(source: Predicate) -> Self {
        Self { source, coeffs: BTreeMap::new(), constant: BigRational::zero() }
    }

    /// Add `amount` to the coefficient of `key`, erasing exact zeros.
    pub fn bump(&mut self, key: Seg, amount: i64) {
        let mut value = self.coeffs.remove(&key).unwrap_or_else(BigRational::zero);
        value += BigRational::from_integer(amount.into());
        if !value.is_zero() {
            self.coeffs.insert(key, value);
        }
    }

    /// Overwrite the constant term.
    pub fn set_constant(&mut self, c: BigRational) {
        self.constant = c;
    }

    /// The predicate this row was emitted by.
    pub fn source(&self) -> &Predicate {
        &self.source
    }

    /// Sparse coefficients by line key.
    pub fn coeffs(&self) -> &BTreeMap<Seg, BigRational> {
        &self.coeffs
    }

    /// Constant term (always zero for ratio rows).
    pub fn constant(&self) -> &BigRational {
        &self.constant
    }

    /// No coefficients and a zero constant: the trivially-true row.
    pub fn is_zero(&self) -> bool {
        self.coeffs.is_empty() && self.constant.is_zero()
    }
}

// ============================================================================
// Exact span arithmetic
// ============================================================================

/// Solve `x · A = b` over the rationals.
///
/// `rows` are the dense row vectors of `A`; `b` must have the same width.
/// Returns one witness (free coordinates pinned to zero) or `None` when `b`
/// is outside the row span. Gauss–Jordan with first-non-zero pivoting keeps
/// the result deterministic.
fn solve_combination(rows: &[Vec<BigRational>], b: &[BigRational]) -> Option<Vec<BigRational>> {
    let nvars = rows.len();
    if nvars == 0 {
        return if b.iter().all(Zero::is_zero) { Some(Vec::new()) } else { None };
    }
    let width = b.len();

    // Equations are columns of A: for each column c, Σ_r x_r · A[r][c] = b[c].
    let mut m: Vec<Vec<BigRational>> = (0..width)
        .map(|c| {
            let mut eq: Vec<BigRational> = rows.iter().map(|r| r[c].clone()).collect();
            eq.push(b[c].clone());
            eq
        })
        .collect();

    let mut pivot_of_var: Vec<Option<usize>> = vec![None; nvars];
    let mut rank = 0usize;

    for j in 0..nvars {
        if rank == m.len() {
            break;
        }
        let Some(p) = (rank..m.len()).find(|&i| !m[i][j].is_zero()) else {
            continue;
        };
        m.swap(rank, p);
        let lead = m[rank][j].clone();
        for v in m[rank].iter_mut() {
            *v = v.clone() / lead.clone();
        }
        let prow = m[rank].clone();
        for (i, eq) in m.iter_mut().enumerate() {
            if i == rank || eq[j].is_zero() {
                continue;
            }
            let f = eq[j].clone();
            for (k, v) in eq.iter_mut().enumerate() {
                *v = v.clone() - prow[k].clone() * f.clone();
            }
        }
        pivot_of_var[j] = Some(rank);
        rank += 1;
    }

    // Every non-pivot equation must have reduced to 0 = 0.
    for eq in m.iter().skip(rank) {
        if !eq[nvars].is_zero() {
            return None;
        }
    }

    let mut x = vec![BigRational::zero(); nvars];
    for (j, piv) in pivot_of_var.iter().enumerate() {
        if let Some(i) = piv {
            x[j] = m[*i][nvars].clone();
        }
    }
    Some(x)
}

/// Greedily drop witness rows that are not needed to span `b`.
///
/// Active indices are visited in insertion order; each is tentatively removed
/// and kept out whenever the remaining rows still span `b`. Deterministic by
/// construction.
fn minimize_witness(
    rows: &[Vec<BigRational>],
    b: &[BigRational],
    mut x: Vec<BigRational>,
) -> Vec<BigRational> {
    let mut active: Vec<bool> = x.iter().map(|v| !v.is_zero()).collect();

    for i in 0..x.len() {
        if !active[i] {
            continue;
        }
        let keep: Vec<usize> =
            (0..x.len()).filter(|&r| active[r] && r != i).collect();
        if keep.is_empty() {
            continue;
        }
        let sub_rows: Vec<Vec<BigRational>> = keep.iter().map(|&r| rows[r].clone()).collect();
        if let Some(reduced) = solve_combination(&sub_rows, b) {
            active[i] = false;
            let mut next = vec![BigRational::zero(); x.len()];
            for (slot, &r) in keep.iter().enumerate() {
                next[r] = reduced[slot].clone();
            }
            x = next;
        }
    }
    x
}

// ============================================================================
// Linear systems
// ============================================================================

/// Append-only store of rows with one-row-per-source deduplication.
#[derive(Default, Debug)]
pub struct LinearSystem {
    rows: Vec<Row>,
    seen: BTreeSet<Predicate>,
}

impl LinearSystem {
    /// Add rows, ignoring any whose source predicate is already present.
    pub fn add_rows(&mut self, rows: Vec<Row>) {
        for row in rows {
            if self.seen.insert(row.source.clone()) {
                self.rows.push(row);
            }
        }
    }

    /// Number of stored rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Is a row from this source already stored?
    pub fn contains_source(&self, p: &Predicate) -> bool {
        self.seen.contains(p)
    }

    /// Try to derive each target row from the stored rows.
    ///
    /// Zero target rows are trivially true (`AR_implicit`, no parents).
    /// For the rest, span membership yields an `AR` deduction whose parents
    /// are the sources of the minimised witness rows; an empty parent set is
    /// discarded as vacuous.
    pub fn try_deduce(&self, targets: Vec<Row>) -> BTreeSet<Deduction> {
        let mut out = BTreeSet::new();

        for target in targets {
            if target.is_zero() {
                out.insert(Deduction::new(target.source.clone(), [], RULE_AR_IMPLICIT));
                continue;
            }
            if self.rows.is_empty() {
                continue;
            }

            // Column layout: every line key seen in the store or the target,
            // in canonical order, then the constant column.
            let mut cols: BTreeSet<Seg> = BTreeSet::new();
            for row in &self.rows {
                cols.extend(row.coeffs.keys().cloned());
            }
            cols.extend(target.coeffs.keys().cloned());
            let cols: Vec<Seg> = cols.into_iter().collect();

            let densify = |row: &Row| -> Vec<BigRational> {
                let mut dense: Vec<BigRational> = cols
                    .iter()
                    .map(|c| row.coeffs.get(c).cloned().unwrap_or_else(BigRational::zero))
                    .collect();
                dense.push(row.constant.clone());
                dense
            };

            let a_dense: Vec<Vec<BigRational>> = self.rows.iter().map(&densify).collect();
            let b_dense = densify(&target);

            let Some(witness) = solve_combination(&a_dense, &b_dense) else {
                continue;
            };
            let witness = minimize_witness(&a_dense, &b_dense, witness);

            let parents: BTreeSet<Predicate> = witness
                .iter()
                .enumerate()
                .filter(|(_, v)| !v.is_zero())
                .map(|(i, _)| self.rows[i].source.clone())
                .collect();
            if parents.is_empty() {
                continue;
            }
            out.insert(Deduction::new(target.source.clone(), parents, RULE_AR));
        }
        out
    }
}

/// The two linear systems, owned together and fed the same predicates.
#[derive(Default, Debug)]
pub struct Ar {
    angles: LinearSystem,
    ratios: LinearSystem,
}

impl Ar {
    /// Fresh, empty reasoner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend both systems with the predicate's rows (idempotent per source).
    pub fn add_predicate(&mut self, p: &Predicate) {
        self.angles.add_rows(p.angle_rows());
        self.ratios.add_rows(p.ratio_rows());
    }

    /// Union of angle-side and ratio-side deductions for `p`.
    pub fn try_deduce(&self, p: &Predicate) -> BTreeSet<Deduction> {
        let mut out = self.angles.try_deduce(p.angle_rows());
        out.extend(self.ratios.try_deduce(p.ratio_rows()));
        out
    }

    /// Row counts `(angle, ratio)`, for monotonicity checks.
    pub fn row_counts(&self) -> (usize, usize) {
        (self.angles.row_count(), self.ratios.row_count())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;

    fn pt(name: &str, x: f64, y: f64) -> Point {
        Point::new(name, x, y)
    }

    /// Six points with three pairwise-parallel horizontal segments.
    fn three_parallel_lines() -> (Predicate, Predicate, Predicate) {
        let a = pt("a", 0.0, 0.0);
        let b = pt("b", 1.0, 0.0);
        let c = pt("c", 0.0, 1.0);
        let d = pt("d", 1.0, 1.0);
        let e = pt("e", 0.0, 2.0);
        let f = pt("f", 1.0, 2.0);
        (
            Predicate::para(a.clone(), b.clone(), c.clone(), d.clone()),
            Predicate::para(a, b, e.clone(), f.clone()),
            Predicate::para(c, d, e, f),
        )
    }

    #[test]
    fn span_membership_chains_parallels() {
        let (p1, p2, goal) = three_parallel_lines();
        let mut ar = Ar::new();
        ar.add_predicate(&p1);
        ar.add_predicate(&p2);

        let deds = ar.try_deduce(&goal);
        assert_eq!(deds.len(), 1);
        let d = deds.iter().next().unwrap();
        assert_eq!(d.rule, RULE_AR);
        assert_eq!(d.predicate, goal);
        assert_eq!(
            d.parents.iter().cloned().collect::<Vec<_>>(),
            vec![p1, p2]
        );
    }

    #[test]
    fn underdetermined_targets_are_rejected() {
        let (p1, _, goal) = three_parallel_lines();
        let mut ar = Ar::new();
        ar.add_predicate(&p1);
        assert!(ar.try_deduce(&goal).is_empty());
    }

    #[test]
    fn trivial_targets_deduce_implicitly_with_no_parents() {
        let a = pt("a", 0.0, 0.0);
        let b = pt("b", 1.0, 0.0);
        let ar = Ar::new();
        let trivial = Predicate::para(a.clone(), b.clone(), a, b);
        let deds = ar.try_deduce(&trivial);
        assert_eq!(deds.len(), 1);
        let d = deds.iter().next().unwrap();
        assert_eq!(d.rule, RULE_AR_IMPLICIT);
        assert!(d.parents.is_empty());
    }

    #[test]
    fn minimisation_drops_unused_rows() {
        let (p1, p2, goal) = three_parallel_lines();
        // An unrelated congruence contributes a ratio row only; the angle
        // witness must not mention it, and adding it must not break the
        // angle-side deduction (monotonicity).
        let g = pt("g", 5.0, 5.0);
        let h = pt("h", 6.0, 5.0);
        let unrelated = Predicate::cong(g.clone(), h.clone(), g, h);

        let mut ar = Ar::new();
        ar.add_predicate(&p1);
        ar.add_predicate(&unrelated);
        ar.add_predicate(&p2);

        let deds = ar.try_deduce(&goal);
        let d = deds.iter().find(|d| d.rule == RULE_AR).expect("span deduction");
        assert_eq!(d.parents.len(), 2);
        assert!(d.parents.contains(&p1));
        assert!(d.parents.contains(&p2));
    }

    #[test]
    fn duplicate_sources_are_stored_once() {
        let (p1, _, _) = three_parallel_lines();
        let mut ar = Ar::new();
        ar.add_predicate(&p1);
        ar.add_predicate(&p1);
        assert_eq!(ar.row_counts().0, 1);
    }

    #[test]
    fn aconst_rows_compose_across_a_shared_ray() {
        // ∠abc = π/3 and ∠cbd = π/6 force ∠abd = π/2 in the angle system.
        let a = pt("a", -1.0, 0.0);
        let b = pt("b", 0.0, 0.0);
        let c = pt("c", 0.5, 0.866_025_403_784_438_6);
        let d = pt("d", 0.0, -1.0);

        let ax1 = Predicate::aconst(a.clone(), b.clone(), c.clone(), 1, 3);
        let ax2 = Predicate::aconst(c, b.clone(), d.clone(), 1, 6);
        let goal = Predicate::aconst(a, b, d, 1, 2);

        let mut ar = Ar::new();
        ar.add_predicate(&ax1);
        ar.add_predicate(&ax2);

        let deds = ar.try_deduce(&goal);
        assert_eq!(deds.len(), 1);
        let ded = deds.iter().next().unwrap();
        assert_eq!(ded.rule, RULE_AR);
        assert_eq!(ded.parents.len(), 2);
        assert!(ded.parents.contains(&ax1));
        assert!(ded.parents.contains(&ax2));
    }
}
