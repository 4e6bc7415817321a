//! Textual problem format
//!
//! A problem is a `;`-separated list of segments. A segment of the form
//! `name@x_y = <rest>` defines a point (decimal or scientific coordinates);
//! whatever follows the `=` is treated as a further segment. Every other
//! segment is a predicate clause: `relname tok tok …` with tokens split on
//! whitespace or commas, prefixed with `?` to mark a goal. `aconst` takes
//! three point tokens followed by two integers; every other relation takes
//! point tokens only.
//!
//! ```text
//! a@0_0 = ; b@4_0 = ; c@5_3 = ; d@1_3 = ;
//! para a b c d; para b c d a; ? cong a b c d; ? cong b c d a
//! ```

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use crate::point::Point;
use crate::predicate::{Predicate, Rel};

/// Parsed problem: point universe, premises, goals.
#[derive(Debug, Clone)]
pub struct ParsedProblem {
    /// Every point defined in the input.
    pub points: Vec<Point>,
    /// Non-goal clauses, in input order.
    pub premises: Vec<Predicate>,
    /// Goal clauses, in input order.
    pub goals: Vec<Predicate>,
}

/// Front-end failures; all carry enough context to fix the input.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Input held no predicate clauses at all.
    #[error("no predicate clauses found")]
    Empty,
    /// A `name@x_y = …` segment did not have that shape.
    #[error("malformed point definition `{0}`")]
    BadPointDef(String),
    /// A coordinate token did not parse as a float.
    #[error("invalid coordinate `{0}`")]
    BadCoordinate(String),
    /// Clause named a relation the registry does not know.
    #[error("unknown relation `{0}`")]
    UnknownRelation(String),
    /// Clause had the wrong number of arguments for its relation.
    #[error("relation `{rel}` expects {expected} argument(s), got {got}")]
    Arity {
        /// Relation name as written.
        rel: String,
        /// Expected token count.
        expected: usize,
        /// Supplied token count.
        got: usize,
    },
    /// Clause referenced a point with no definition.
    #[error("unknown point `{0}`")]
    UnknownPoint(String),
    /// An integer argument (of `aconst`) did not parse.
    #[error("invalid integer `{0}`")]
    BadInt(String),
}

/// Parse a whole problem text.
pub fn parse_problem(text: &str) -> Result<ParsedProblem, ParseError> {
    let mut points: BTreeMap<String, Point> = BTreeMap::new();
    let mut clauses: Vec<String> = Vec::new();

    for segment in text.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if let Some(rest) = try_point_def(segment, &mut points)? {
            if !rest.is_empty() {
                clauses.push(rest);
            }
        } else {
            clauses.push(segment.to_string());
        }
    }

    if clauses.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut premises = Vec::new();
    let mut goals = Vec::new();
    for clause in &clauses {
        let (is_goal, predicate) = parse_clause(clause, &points)?;
        if is_goal {
            goals.push(predicate);
        } else {
            premises.push(predicate);
        }
    }

    Ok(ParsedProblem { points: points.into_values().collect(), premises, goals })
}

/// Recognise `name@x_y = rest`; returns the `rest` when the segment is a
/// point definition, `None` when it is an ordinary clause.
fn try_point_def(
    segment: &str,
    points: &mut BTreeMap<String, Point>,
) -> Result<Option<String>, ParseError> {
    let Some((lhs, rest)) = segment.split_once('=') else {
        return Ok(None);
    };
    let lhs = lhs.trim();
    let Some((name, coords)) = lhs.split_once('@') else {
        return Ok(None);
    };

    let name = name.trim();
    let valid_name = !name.is_empty()
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid_name {
        return Err(ParseError::BadPointDef(segment.to_string()));
    }

    let Some((x_tok, y_tok)) = coords.trim().split_once('_') else {
        return Err(ParseError::BadPointDef(segment.to_string()));
    };
    let x: f64 =
        x_tok.trim().parse().map_err(|_| ParseError::BadCoordinate(x_tok.trim().to_string()))?;
    let y: f64 =
        y_tok.trim().parse().map_err(|_| ParseError::BadCoordinate(y_tok.trim().to_string()))?;

    points.insert(name.to_string(), Point::new(name, x, y));
    Ok(Some(rest.trim().to_string()))
}

/// Parse one predicate clause; the leading `?` marks a goal.
fn parse_clause(
    clause: &str,
    points: &BTreeMap<String, Point>,
) -> Result<(bool, Predicate), ParseError> {
    let (is_goal, body) = match clause.strip_prefix('?') {
        Some(rest) => (true, rest.trim()),
        None => (false, clause),
    };

    let tokens: Vec<&str> = body
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();
    let Some((name, args)) = tokens.split_first() else {
        return Err(ParseError::Empty);
    };

    let rel = Rel::from_name(&name.to_ascii_lowercase())
        .ok_or_else(|| ParseError::UnknownRelation((*name).to_string()))?;

    let expected = rel.point_arity() + rel.int_arity();
    if args.len() != expected {
        return Err(ParseError::Arity {
            rel: (*name).to_string(),
            expected,
            got: args.len(),
        });
    }

    let mut pts = Vec::with_capacity(rel.point_arity());
    for tok in &args[..rel.point_arity()] {
        let point = points
            .get(*tok)
            .ok_or_else(|| ParseError::UnknownPoint((*tok).to_string()))?;
        pts.push(point.clone());
    }
    let mut ints = Vec::with_capacity(rel.int_arity());
    for tok in &args[rel.point_arity()..] {
        ints.push(tok.parse::<i64>().map_err(|_| ParseError::BadInt((*tok).to_string()))?);
    }

    // Arity was checked above, so the builder cannot refuse.
    let predicate = Predicate::from_args(rel, &pts, &ints).ok_or(ParseError::Arity {
        rel: (*name).to_string(),
        expected,
        got: args.len(),
    })?;
    Ok((is_goal, predicate))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const PARALLELOGRAM: &str = "a@0_0 = ; b@4_0 = ; c@5_3 = ; d@1_3 = ;\n\
                                 para a b c d; para b c d a;\n\
                                 ? cong a b c d; ? cong b c d a";

    #[test]
    fn parses_points_premises_and_goals() {
        let parsed = parse_problem(PARALLELOGRAM).unwrap();
        assert_eq!(parsed.points.len(), 4);
        assert_eq!(parsed.premises.len(), 2);
        assert_eq!(parsed.goals.len(), 2);

        let names: Vec<&str> = parsed.points.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(parsed.premises[0].to_string(), "para a b c d");
        assert_eq!(parsed.goals[0].to_string(), "cong a b c d");
    }

    #[test]
    fn point_definition_may_carry_a_clause() {
        let parsed =
            parse_problem("a@0_0 = ; b@1_0 = ; c@2_0 = col a b c").unwrap();
        assert_eq!(parsed.premises.len(), 1);
        assert_eq!(parsed.premises[0].to_string(), "col a b c");
    }

    #[test]
    fn negative_and_scientific_coordinates_parse() {
        let parsed = parse_problem("a@-0.52_0.10 = ; b@1e-3_-2.5 = ; cong a b a b").unwrap();
        let a = &parsed.points[0];
        assert!((a.x + 0.52).abs() < 1e-12);
        let b = &parsed.points[1];
        assert!((b.x - 1e-3).abs() < 1e-15);
        assert!((b.y + 2.5).abs() < 1e-12);
    }

    #[test]
    fn aconst_integers_are_typed() {
        let parsed =
            parse_problem("a@1_0 = ; b@0_0 = ; c@0_1 = ; aconst a b c 1 2").unwrap();
        assert_eq!(parsed.premises[0].to_string(), "aconst a b c 1 2");
    }

    #[test]
    fn errors_are_precise() {
        assert!(matches!(parse_problem(""), Err(ParseError::Empty)));
        assert!(matches!(
            parse_problem("a@0_0 = ; quux a a"),
            Err(ParseError::UnknownRelation(_))
        ));
        assert!(matches!(
            parse_problem("a@0_0 = ; para a a a"),
            Err(ParseError::Arity { .. })
        ));
        assert!(matches!(
            parse_problem("a@0_0 = ; para a a a z"),
            Err(ParseError::UnknownPoint(_))
        ));
        assert!(matches!(
            parse_problem("a@zz_0 = ; col a a a"),
            Err(ParseError::BadCoordinate(_))
        ));
        assert!(matches!(
            parse_problem("a@0_0 = ; aconst a a a x 2"),
            Err(ParseError::BadInt(_))
        ));
    }
}
