//! Deductive database: fact store, provenance, semi-naive saturation
//!
//! Facts are relation tuples over point *names*, normalised with the same
//! symmetry rules the predicate constructors use, so one geometric statement
//! is one stored fact. Each fact carries every derivation that produced it:
//! `("axiom", [])` for seeded facts, `(rule, parent fact IDs)` for each rule
//! firing. Fact IDs are `"<relname>(<a>,<b>,…)"` over the normalised
//! arguments; the coordinator resolves them back to predicates through its
//! own book-keeping and never interprets them.
//!
//! ## Invariants
//!
//! - **Idempotence.** Re-adding a stored fact (or re-recording an identical
//!   derivation) is a no-op.
//! - **Monotonicity.** Facts and derivations are only ever added; `run()` may
//!   be called any number of times and extends the saturated set
//!   incrementally from the facts added since the previous call.
//! - **Termination.** Every rule only creates facts over already-known
//!   points, so the reachable fact space is polynomial in the point count.
//!
//! Saturation is semi-naive: each pass joins only the newly-derived delta
//! against the full store, following the classic bottom-up evaluation
//! scheme, and stops at the first empty delta.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};

use crate::canon;
use crate::predicate::Rel;
use crate::rules::{self, Derived};

/// Normalised fact identity: relation tag plus canonical argument tuple.
pub(crate) type Key = (Rel, Vec<String>);

/// One derivation path of a stored fact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Derivation {
    /// Rule that fired (`"axiom"` for seeded facts).
    pub rule: &'static str,
    /// Parent fact IDs, sorted.
    pub parents: Vec<String>,
}

/// A fact handed to the coordinator exactly once, with all derivations
/// recorded up to that point.
#[derive(Clone, Debug)]
pub struct NewFact {
    pub rel: Rel,
    pub args: Vec<String>,
    pub id: String,
    pub derivations: Vec<Derivation>,
}

/// Render a fact ID from a normalised key.
pub(crate) fn fact_id(rel: Rel, args: &[String]) -> String {
    format!("{}({})", rel.name(), args.join(","))
}

/// Canonicalise an argument tuple under the relation's symmetries.
///
/// Mirrors the predicate constructors exactly (point names are unique within
/// a problem, so name order and point order agree). Tuples with an unexpected
/// arity are passed through untouched; upstream validation rejects them.
pub(crate) fn normalize(rel: Rel, args: Vec<String>) -> Vec<String> {
    fn two(args: &[String], i: usize) -> [String; 2] {
        canon::seg(args[i].clone(), args[i + 1].clone())
    }
    fn three(args: &[String], i: usize) -> [String; 3] {
        [args[i].clone(), args[i + 1].clone(), args[i + 2].clone()]
    }
    match (rel, args.len()) {
        (Rel::Col, 3) => canon::sorted(three(&args, 0)).to_vec(),
        (Rel::Cyclic, 4) => {
            canon::sorted([args[0].clone(), args[1].clone(), args[2].clone(), args[3].clone()])
                .to_vec()
        }
        (Rel::Para | Rel::Perp | Rel::Cong, 4) => {
            let [s1, s2] = canon::pair(two(&args, 0), two(&args, 2));
            [s1, s2].concat()
        }
        (Rel::Eqangle | Rel::Sameclock, 6) => {
            let [t1, t2] = canon::pair(three(&args, 0), three(&args, 3));
            [t1, t2].concat()
        }
        (Rel::Eqratio, 8) => {
            let r1 = [two(&args, 0), two(&args, 2)];
            let r2 = [two(&args, 4), two(&args, 6)];
            let [r1, r2] = canon::pair(r1, r2);
            [r1[0].clone(), r1[1].clone(), r2[0].clone(), r2[1].clone()].concat()
        }
        (Rel::Midp, 3) => {
            let ends = canon::pair(args[1].clone(), args[2].clone());
            vec![args[0].clone(), ends[0].clone(), ends[1].clone()]
        }
        (Rel::Simtri1 | Rel::Contri1, 6) => {
            let [t1, t2] = canon::tri_orbit(three(&args, 0), three(&args, 3), true);
            [t1, t2].concat()
        }
        (Rel::Simtri2 | Rel::Contri2, 6) => {
            let [t1, t2] = canon::tri_orbit(three(&args, 0), three(&args, 3), false);
            [t1, t2].concat()
        }
        (Rel::Aconst, 5) => {
            let m = args[3].parse::<i64>();
            let n = args[4].parse::<i64>();
            match (m, n) {
                (Ok(m), Ok(n)) => {
                    let (m, n) = canon::reduce_frac(m, n);
                    vec![
                        args[0].clone(),
                        args[1].clone(),
                        args[2].clone(),
                        m.to_string(),
                        n.to_string(),
                    ]
                }
                _ => args,
            }
        }
        _ => args,
    }
}

/// The deductive database.
#[derive(Default, Debug)]
pub struct Dd {
    points: BTreeMap<String, (f64, f64)>,
    facts: BTreeMap<Key, Vec<Derivation>>,
    pending: BTreeSet<Key>,
    extracted: BTreeSet<Key>,
}

impl Dd {
    /// Empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a point. Idempotent; coordinates are kept for reference only
    /// (no rule consults them — the numeric oracle lives upstream).
    pub fn add_point(&mut self, name: &str, x: f64, y: f64) {
        self.points.entry(name.to_string()).or_insert((x, y));
    }

    /// Number of registered points.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Seed a base fact; returns its fact ID.
    ///
    /// A *new* fact gets the derivation `("axiom", [])` and is marked as
    /// already extracted — the caller that seeded it owns its provenance and
    /// must not receive it back from [`Dd::drain_new`]. Re-adding is a no-op.
    pub fn add_fact(&mut self, rel: Rel, args: Vec<String>) -> String {
        let args = normalize(rel, args);
        let id = fact_id(rel, &args);
        let key = (rel, args);
        if !self.facts.contains_key(&key) {
            self.facts
                .insert(key.clone(), vec![Derivation { rule: "axiom", parents: Vec::new() }]);
            self.extracted.insert(key.clone());
            self.pending.insert(key);
        }
        id
    }

    pub fn add_col(&mut self, a: &str, b: &str, c: &str) -> String {
        self.add_fact(Rel::Col, vec![a.into(), b.into(), c.into()])
    }
    pub fn add_para(&mut self, a: &str, b: &str, c: &str, d: &str) -> String {
        self.add_fact(Rel::Para, vec![a.into(), b.into(), c.into(), d.into()])
    }
    pub fn add_perp(&mut self, a: &str, b: &str, c: &str, d: &str) -> String {
        self.add_fact(Rel::Perp, vec![a.into(), b.into(), c.into(), d.into()])
    }
    pub fn add_cong(&mut self, a: &str, b: &str, c: &str, d: &str) -> String {
        self.add_fact(Rel::Cong, vec![a.into(), b.into(), c.into(), d.into()])
    }
    #[allow(clippy::too_many_arguments)]
    pub fn add_eqangle(&mut self, a: &str, b: &str, c: &str, d: &str, e: &str, f: &str) -> String {
        self.add_fact(
            Rel::Eqangle,
            vec![a.into(), b.into(), c.into(), d.into(), e.into(), f.into()],
        )
    }
    #[allow(clippy::too_many_arguments)]
    pub fn add_eqratio(
        &mut self,
        a: &str,
        b: &str,
        c: &str,
        d: &str,
        e: &str,
        f: &str,
        g: &str,
        h: &str,
    ) -> String {
        self.add_fact(
            Rel::Eqratio,
            vec![
                a.into(),
                b.into(),
                c.into(),
                d.into(),
                e.into(),
                f.into(),
                g.into(),
                h.into(),
            ],
        )
    }
    pub fn add_cyclic(&mut self, a: &str, b: &str, c: &str, d: &str) -> String {
        self.add_fact(Rel::Cyclic, vec![a.into(), b.into(), c.into(), d.into()])
    }
    pub fn add_midp(&mut self, m: &str, a: &str, b: &str) -> String {
        self.add_fact(Rel::Midp, vec![m.into(), a.into(), b.into()])
    }
    #[allow(clippy::too_many_arguments)]
    pub fn add_simtri1(&mut self, a: &str, b: &str, c: &str, d: &str, e: &str, f: &str) -> String {
        self.add_fact(
            Rel::Simtri1,
            vec![a.into(), b.into(), c.into(), d.into(), e.into(), f.into()],
        )
    }
    #[allow(clippy::too_many_arguments)]
    pub fn add_simtri2(&mut self, a: &str, b: &str, c: &str, d: &str, e: &str, f: &str) -> String {
        self.add_fact(
            Rel::Simtri2,
            vec![a.into(), b.into(), c.into(), d.into(), e.into(), f.into()],
        )
    }
    #[allow(clippy::too_many_arguments)]
    pub fn add_contri1(&mut self, a: &str, b: &str, c: &str, d: &str, e: &str, f: &str) -> String {
        self.add_fact(
            Rel::Contri1,
            vec![a.into(), b.into(), c.into(), d.into(), e.into(), f.into()],
        )
    }
    #[allow(clippy::too_many_arguments)]
    pub fn add_contri2(&mut self, a: &str, b: &str, c: &str, d: &str, e: &str, f: &str) -> String {
        self.add_fact(
            Rel::Contri2,
            vec![a.into(), b.into(), c.into(), d.into(), e.into(), f.into()],
        )
    }
    #[allow(clippy::too_many_arguments)]
    pub fn add_sameclock(
        &mut self,
        a: &str,
        b: &str,
        c: &str,
        d: &str,
        e: &str,
        f: &str,
    ) -> String {
        self.add_fact(
            Rel::Sameclock,
            vec![a.into(), b.into(), c.into(), d.into(), e.into(), f.into()],
        )
    }
    pub fn add_aconst(&mut self, a: &str, b: &str, c: &str, m: i64, n: i64) -> String {
        self.add_fact(
            Rel::Aconst,
            vec![a.into(), b.into(), c.into(), m.to_string(), n.to_string()],
        )
    }

    /// Drive the rule table to fixpoint over the facts added since the last
    /// call (plus everything they join against).
    pub fn run(&mut self) {
        let mut delta: Vec<Key> = self.pending.iter().cloned().collect();
        self.pending.clear();

        let mut passes = 0usize;
        while !delta.is_empty() {
            passes += 1;
            let mut derived: Vec<Derived> = Vec::new();
            for rule in rules::RULES {
                (rule.apply)(self, &delta, &mut derived);
            }

            let mut next: BTreeSet<Key> = BTreeSet::new();
            for d in derived {
                let args = normalize(d.rel, d.args);
                let key = (d.rel, args);
                let parents: Vec<String> =
                    d.parents.iter().map(|(rel, args)| fact_id(*rel, args)).collect();
                if self.insert_derivation(key.clone(), d.rule, parents) {
                    next.insert(key);
                }
            }
            delta = next.into_iter().collect();
        }
        if passes > 0 {
            tracing::debug!(passes, facts = self.facts.len(), "datalog saturation complete");
        }
    }

    fn insert_derivation(&mut self, key: Key, rule: &'static str, mut parents: Vec<String>) -> bool {
        parents.sort();
        parents.dedup();
        match self.facts.get_mut(&key) {
            Some(derivs) => {
                if !derivs.iter().any(|d| d.rule == rule && d.parents == parents) {
                    derivs.push(Derivation { rule, parents });
                }
                false
            }
            None => {
                self.facts.insert(key, vec![Derivation { rule, parents }]);
                true
            }
        }
    }

    /// Every stored fact of one relation, with all derivations.
    pub fn facts_of(&self, rel: Rel) -> Vec<(Vec<String>, Vec<Derivation>)> {
        self.facts
            .iter()
            .filter(|((r, _), _)| *r == rel)
            .map(|((_, args), derivs)| (args.clone(), derivs.clone()))
            .collect()
    }

    /// Total stored fact count.
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    /// Facts not yet handed out, in canonical order; marks them extracted.
    pub fn drain_new(&mut self) -> Vec<NewFact> {
        let mut out = Vec::new();
        for ((rel, args), derivs) in &self.facts {
            let key = (*rel, args.clone());
            if self.extracted.contains(&key) {
                continue;
            }
            out.push(NewFact {
                rel: *rel,
                args: args.clone(),
                id: fact_id(*rel, args),
                derivations: derivs.clone(),
            });
        }
        for fact in &out {
            self.extracted.insert((fact.rel, fact.args.clone()));
        }
        out
    }

    // ----- internal queries used by the rule table -----

    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.facts.contains_key(key)
    }

    pub(crate) fn rel_args(&self, rel: Rel) -> Vec<Vec<String>> {
        self.facts
            .keys()
            .filter(|(r, _)| *r == rel)
            .map(|(_, args)| args.clone())
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_are_idempotent_and_normalised() {
        let mut dd = Dd::new();
        let id1 = dd.add_para("c", "d", "b", "a");
        let id2 = dd.add_para("a", "b", "c", "d");
        assert_eq!(id1, "para(a,b,c,d)");
        assert_eq!(id1, id2);
        assert_eq!(dd.fact_count(), 1);
        let facts = dd.facts_of(Rel::Para);
        let derivs = &facts[0].1;
        assert_eq!(derivs.len(), 1);
        assert_eq!(derivs[0].rule, "axiom");
        assert!(derivs[0].parents.is_empty());
    }

    #[test]
    fn parallel_transitivity_fires_with_provenance() {
        let mut dd = Dd::new();
        for name in ["a", "b", "c", "d", "e", "f"] {
            dd.add_point(name, 0.0, 0.0);
        }
        let id1 = dd.add_para("a", "b", "c", "d");
        let id2 = dd.add_para("a", "b", "e", "f");
        dd.run();

        let new = dd.drain_new();
        let derived = new
            .iter()
            .find(|f| f.id == "para(c,d,e,f)")
            .expect("transitivity consequence");
        let deriv = derived
            .derivations
            .iter()
            .find(|d| d.rule == "para_trans")
            .expect("para_trans derivation");
        assert_eq!(deriv.parents, {
            let mut v = vec![id1.clone(), id2.clone()];
            v.sort();
            v
        });
        // Seeded facts are never drained back.
        assert!(new.iter().all(|f| f.id != id1 && f.id != id2));
    }

    #[test]
    fn drain_is_once_per_fact() {
        let mut dd = Dd::new();
        dd.add_para("a", "b", "c", "d");
        dd.add_para("a", "b", "e", "f");
        dd.run();
        assert!(!dd.drain_new().is_empty());
        assert!(dd.drain_new().is_empty());
    }

    #[test]
    fn saturation_is_incremental_across_runs() {
        let mut dd = Dd::new();
        dd.add_para("a", "b", "c", "d");
        dd.run();
        assert!(dd.drain_new().is_empty());

        // The new fact must join against the pre-saturated store.
        dd.add_para("c", "d", "e", "f");
        dd.run();
        let new = dd.drain_new();
        assert!(new.iter().any(|f| f.id == "para(a,b,e,f)"));
    }

    #[test]
    fn parallelogram_sides_become_congruent() {
        let mut dd = Dd::new();
        dd.add_para("a", "b", "c", "d");
        dd.add_para("b", "c", "d", "a");
        dd.run();
        let new = dd.drain_new();
        assert!(new.iter().any(|f| f.id == "cong(a,b,c,d)"));
        assert!(new.iter().any(|f| f.id == "cong(a,d,b,c)"));
    }

    #[test]
    fn aa_similarity_requires_both_angle_pairs() {
        let mut dd = Dd::new();
        dd.add_eqangle("a", "b", "c", "d", "e", "f");
        dd.run();
        assert!(dd.drain_new().iter().all(|f| f.rel != Rel::Simtri1));

        dd.add_eqangle("b", "c", "a", "e", "f", "d");
        dd.run();
        let new = dd.drain_new();
        let sim = new.iter().find(|f| f.rel == Rel::Simtri1).expect("AA similarity");
        assert_eq!(sim.id, "simtri1(a,b,c,d,e,f)");
    }

    #[test]
    fn perp_composes_with_para() {
        let mut dd = Dd::new();
        dd.add_perp("a", "b", "c", "d");
        dd.add_para("c", "d", "e", "f");
        dd.run();
        let new = dd.drain_new();
        assert!(new.iter().any(|f| f.id == "perp(a,b,e,f)"));
    }
}
