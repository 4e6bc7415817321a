//! Built-in geometry rule table
//!
//! A closed, compile-time table of monotone rules over the fact store. Each
//! rule joins the freshly-derived delta against the full store and pushes
//! derived tuples with `(rule name, parent facts)` provenance; the store
//! normalises and deduplicates on insert. All guards are point-distinctness —
//! numeric plausibility is the coordinator's job, not the rule base's.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use crate::dd::{normalize, Dd, Key};
use crate::predicate::Rel;

/// A derived tuple before normalisation, with its provenance.
pub(crate) struct Derived {
    pub rel: Rel,
    pub args: Vec<String>,
    pub rule: &'static str,
    pub parents: Vec<Key>,
}

/// One rule of the table.
pub(crate) struct Rule {
    pub name: &'static str,
    pub apply: fn(&Dd, &[Key], &mut Vec<Derived>),
}

/// The rule base, in firing order.
pub(crate) static RULES: &[Rule] = &[
    Rule { name: "para_trans", apply: para_trans },
    Rule { name: "perp_para_perp", apply: perp_para_perp },
    Rule { name: "perp_perp_para", apply: perp_perp_para },
    Rule { name: "cong_trans", apply: cong_trans },
    Rule { name: "eqangle_trans", apply: eqangle_trans },
    Rule { name: "parallelogram_cong", apply: parallelogram_cong },
    Rule { name: "aa_simtri", apply: aa_simtri },
    Rule { name: "midline_para", apply: midline_para },
    Rule { name: "simtri_cong_contri", apply: simtri_cong_contri },
];

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn seg_halves(args: &[String]) -> ([String; 2], [String; 2]) {
    (
        [args[0].clone(), args[1].clone()],
        [args[2].clone(), args[3].clone()],
    )
}

fn tri_halves(args: &[String]) -> ([String; 3], [String; 3]) {
    (
        [args[0].clone(), args[1].clone(), args[2].clone()],
        [args[3].clone(), args[4].clone(), args[5].clone()],
    )
}

fn rot_left(t: &[String; 3]) -> [String; 3] {
    [t[1].clone(), t[2].clone(), t[0].clone()]
}

fn all_distinct(names: &[&String]) -> bool {
    for i in 0..names.len() {
        for j in i + 1..names.len() {
            if names[i] == names[j] {
                return false;
            }
        }
    }
    true
}

/// Transitivity-shaped join over unordered seg pairs:
/// `lhs(s, t) ∧ rhs(t, u) ⇒ out(s, u)` for `s ≠ u`.
fn seg_chain(
    dd: &Dd,
    delta: &[Key],
    lhs: Rel,
    rhs: Rel,
    out_rel: Rel,
    rule: &'static str,
    out: &mut Vec<Derived>,
) {
    for key in delta {
        let other_rel = if key.0 == lhs {
            rhs
        } else if key.0 == rhs {
            lhs
        } else {
            continue;
        };
        let (a1, a2) = seg_halves(&key.1);
        for oargs in dd.rel_args(other_rel) {
            if other_rel == key.0 && oargs == key.1 {
                continue;
            }
            let (b1, b2) = seg_halves(&oargs);
            for (s, t) in [(&a1, &a2), (&a2, &a1)] {
                for (u, v) in [(&b1, &b2), (&b2, &b1)] {
                    if t == u && s != v {
                        out.push(Derived {
                            rel: out_rel,
                            args: [s.clone(), v.clone()].concat(),
                            rule,
                            parents: vec![key.clone(), (other_rel, oargs.clone())],
                        });
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// rules
// ---------------------------------------------------------------------------

fn para_trans(dd: &Dd, delta: &[Key], out: &mut Vec<Derived>) {
    seg_chain(dd, delta, Rel::Para, Rel::Para, Rel::Para, "para_trans", out);
}

fn perp_para_perp(dd: &Dd, delta: &[Key], out: &mut Vec<Derived>) {
    seg_chain(dd, delta, Rel::Perp, Rel::Para, Rel::Perp, "perp_para_perp", out);
}

fn perp_perp_para(dd: &Dd, delta: &[Key], out: &mut Vec<Derived>) {
    seg_chain(dd, delta, Rel::Perp, Rel::Perp, Rel::Para, "perp_perp_para", out);
}

fn cong_trans(dd: &Dd, delta: &[Key], out: &mut Vec<Derived>) {
    seg_chain(dd, delta, Rel::Cong, Rel::Cong, Rel::Cong, "cong_trans", out);
}

/// eqangle(t, u) ∧ eqangle(u, v) ⇒ eqangle(t, v) over ordered triples.
fn eqangle_trans(dd: &Dd, delta: &[Key], out: &mut Vec<Derived>) {
    for key in delta {
        if key.0 != Rel::Eqangle {
            continue;
        }
        let (a1, a2) = tri_halves(&key.1);
        for oargs in dd.rel_args(Rel::Eqangle) {
            if oargs == key.1 {
                continue;
            }
            let (b1, b2) = tri_halves(&oargs);
            for (s, t) in [(&a1, &a2), (&a2, &a1)] {
                for (u, v) in [(&b1, &b2), (&b2, &b1)] {
                    if t == u && s != v {
                        out.push(Derived {
                            rel: Rel::Eqangle,
                            args: [s.clone(), v.clone()].concat(),
                            rule: "eqangle_trans",
                            parents: vec![key.clone(), (Rel::Eqangle, oargs.clone())],
                        });
                    }
                }
            }
        }
    }
}

/// para(AB, CD) ∧ para(BC, DA) ⇒ cong(AB, CD) ∧ cong(BC, DA).
///
/// Opposite sides of a quadrilateral parallel in both pairs force a
/// parallelogram; degenerate placements are filtered numerically upstream.
fn parallelogram_cong(dd: &Dd, delta: &[Key], out: &mut Vec<Derived>) {
    for key in delta {
        if key.0 != Rel::Para {
            continue;
        }
        let (s1, s2) = seg_halves(&key.1);
        for (first, second) in [(&s1, &s2), (&s2, &s1)] {
            for (a, b) in [(&first[0], &first[1]), (&first[1], &first[0])] {
                for (c, d) in [(&second[0], &second[1]), (&second[1], &second[0])] {
                    if !all_distinct(&[a, b, c, d]) {
                        continue;
                    }
                    let companion_args = normalize(
                        Rel::Para,
                        vec![b.clone(), c.clone(), d.clone(), a.clone()],
                    );
                    let companion = (Rel::Para, companion_args);
                    if companion == *key || !dd.contains_key(&companion) {
                        continue;
                    }
                    for cong in [
                        vec![a.clone(), b.clone(), c.clone(), d.clone()],
                        vec![b.clone(), c.clone(), d.clone(), a.clone()],
                    ] {
                        out.push(Derived {
                            rel: Rel::Cong,
                            args: cong,
                            rule: "parallelogram_cong",
                            parents: vec![key.clone(), companion.clone()],
                        });
                    }
                }
            }
        }
    }
}

/// Two of the three cyclic angle correspondences of a pair of triangles
/// imply direct similarity (the third angle follows from the angle sum).
fn aa_simtri(dd: &Dd, delta: &[Key], out: &mut Vec<Derived>) {
    for key in delta {
        if key.0 != Rel::Eqangle {
            continue;
        }
        let (t1, t2) = tri_halves(&key.1);
        for (x, y) in [(&t1, &t2), (&t2, &t1)] {
            if !all_distinct(&[&x[0], &x[1], &x[2]]) || !all_distinct(&[&y[0], &y[1], &y[2]]) {
                continue;
            }
            let once = (rot_left(x), rot_left(y));
            let twice = (rot_left(&once.0), rot_left(&once.1));
            for (u, v) in [once, twice] {
                let companion_args =
                    normalize(Rel::Eqangle, [u.clone(), v.clone()].concat());
                let companion = (Rel::Eqangle, companion_args);
                if companion == *key || !dd.contains_key(&companion) {
                    continue;
                }
                out.push(Derived {
                    rel: Rel::Simtri1,
                    args: [x.clone(), y.clone()].concat(),
                    rule: "aa_simtri",
                    parents: vec![key.clone(), companion],
                });
            }
        }
    }
}

/// midp(M, A, B) ∧ midp(N, A, C) ⇒ para(MN, BC) (the midline theorem).
fn midline_para(dd: &Dd, delta: &[Key], out: &mut Vec<Derived>) {
    for key in delta {
        if key.0 != Rel::Midp {
            continue;
        }
        let m = &key.1[0];
        let ends = [&key.1[1], &key.1[2]];
        for oargs in dd.rel_args(Rel::Midp) {
            if oargs == key.1 {
                continue;
            }
            let n = &oargs[0];
            if m == n {
                continue;
            }
            let oends = [&oargs[1], &oargs[2]];
            for i in 0..2 {
                for j in 0..2 {
                    if ends[i] != oends[j] {
                        continue;
                    }
                    let p = ends[1 - i];
                    let q = oends[1 - j];
                    if p == q {
                        continue;
                    }
                    // para of a seg with itself is vacuous.
                    if (m == p && n == q) || (m == q && n == p) {
                        continue;
                    }
                    out.push(Derived {
                        rel: Rel::Para,
                        args: vec![m.clone(), n.clone(), p.clone(), q.clone()],
                        rule: "midline_para",
                        parents: vec![key.clone(), (Rel::Midp, oargs.clone())],
                    });
                }
            }
        }
    }
}

/// simtri1(T, U) ∧ cong of one pair of corresponding sides ⇒ contri1(T, U).
fn simtri_cong_contri(dd: &Dd, delta: &[Key], out: &mut Vec<Derived>) {
    let sides = [(0usize, 1usize), (1, 2), (2, 0)];

    let mut emit = |sim_key: &Key, cong_key: Key, t1: &[String; 3], t2: &[String; 3]| {
        out.push(Derived {
            rel: Rel::Contri1,
            args: [t1.clone(), t2.clone()].concat(),
            rule: "simtri_cong_contri",
            parents: vec![sim_key.clone(), cong_key],
        });
    };

    for key in delta {
        match key.0 {
            Rel::Simtri1 => {
                let (t1, t2) = tri_halves(&key.1);
                for (i, j) in sides {
                    let cong_args = normalize(
                        Rel::Cong,
                        vec![t1[i].clone(), t1[j].clone(), t2[i].clone(), t2[j].clone()],
                    );
                    let cong_key = (Rel::Cong, cong_args);
                    if dd.contains_key(&cong_key) {
                        emit(key, cong_key, &t1, &t2);
                    }
                }
            }
            Rel::Cong => {
                for sargs in dd.rel_args(Rel::Simtri1) {
                    let (t1, t2) = tri_halves(&sargs);
                    for (i, j) in sides {
                        let cong_args = normalize(
                            Rel::Cong,
                            vec![t1[i].clone(), t1[j].clone(), t2[i].clone(), t2[j].clone()],
                        );
                        if cong_args == key.1 {
                            emit(&(Rel::Simtri1, sargs.clone()), key.clone(), &t1, &t2);
                        }
                    }
                }
            }
            _ => {}
        }
    }
}
