//! Backend-neutral condition compiler.
//!
//! The tree walk lives here and is shared by every backend; leaf predicates
//! are built by a backend-specific [`PredicateBuilder`]. Groups compile their
//! children first and hand the compiled children to `and`/`or`.

use serde_json::Value;

use crate::condition::Condition;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Equal => "=",
            Comparison::NotEqual => "!=",
            Comparison::GreaterThan => ">",
            Comparison::GreaterThanEqual => ">=",
            Comparison::LessThan => "<",
            Comparison::LessThanEqual => "<=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub north: f64,
    pub east: f64,
    pub south: f64,
    pub west: f64,
}

/// Native predicate construction for one backend.
pub trait PredicateBuilder {
    type Predicate;

    fn search(&self, query: &str) -> Result<Self::Predicate>;
    fn identifier(&self, id: &str) -> Result<Self::Predicate>;
    fn compare(&self, field: &str, op: Comparison, value: &Value) -> Result<Self::Predicate>;
    fn membership(&self, field: &str, values: &[Value], negated: bool) -> Result<Self::Predicate>;
    fn geo_distance(&self, field: &str, lat: f64, lng: f64, distance: f64) -> Result<Self::Predicate>;
    fn geo_bounding_box(&self, field: &str, bbox: BoundingBox) -> Result<Self::Predicate>;
    fn and(&self, children: Vec<Self::Predicate>) -> Result<Self::Predicate>;
    fn or(&self, children: Vec<Self::Predicate>) -> Result<Self::Predicate>;
}

/// Compile each condition into one native predicate, preserving input order.
pub fn compile<B: PredicateBuilder>(conditions: &[Condition], builder: &B) -> Result<Vec<B::Predicate>> {
    conditions.iter().map(|condition| compile_one(condition, builder)).collect()
}

/// Parse JSON filter entries and compile them. Unknown types fail the whole call.
pub fn compile_json<B: PredicateBuilder>(filters: &Value, builder: &B) -> Result<Vec<B::Predicate>> {
    compile(&Condition::parse_list(filters)?, builder)
}

fn compile_one<B: PredicateBuilder>(condition: &Condition, builder: &B) -> Result<B::Predicate> {
    match condition {
        Condition::Search { query } => builder.search(query),
        Condition::Identifier { id } => builder.identifier(id),
        Condition::Equal { field, value } => builder.compare(field, Comparison::Equal, value),
        Condition::NotEqual { field, value } => builder.compare(field, Comparison::NotEqual, value),
        Condition::GreaterThan { field, value } => builder.compare(field, Comparison::GreaterThan, value),
        Condition::GreaterThanEqual { field, value } => {
            builder.compare(field, Comparison::GreaterThanEqual, value)
        }
        Condition::LessThan { field, value } => builder.compare(field, Comparison::LessThan, value),
        Condition::LessThanEqual { field, value } => {
            builder.compare(field, Comparison::LessThanEqual, value)
        }
        Condition::In { field, values } => builder.membership(field, values, false),
        Condition::NotIn { field, values } => builder.membership(field, values, true),
        Condition::GeoDistance { field, lat, lng, distance } => {
            builder.geo_distance(field, *lat, *lng, *distance)
        }
        Condition::GeoBoundingBox { field, north, east, south, west } => builder.geo_bounding_box(
            field,
            BoundingBox { north: *north, east: *east, south: *south, west: *west },
        ),
        Condition::And { conditions } => builder.and(compile(conditions, builder)?),
        Condition::Or { conditions } => builder.or(compile(conditions, builder)?),
    }
}

/// Render a scalar as a filter literal: strings double-quoted with `"` and `\`
/// escaped, numbers and booleans bare, anything else as JSON text.
pub fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    /// Renders predicates as s-expressions so tree shape is easy to assert on.
    struct Sexpr;

    impl PredicateBuilder for Sexpr {
        type Predicate = String;

        fn search(&self, query: &str) -> Result<String> {
            Ok(format!("(search {query})"))
        }
        fn identifier(&self, id: &str) -> Result<String> {
            Ok(format!("(id {id})"))
        }
        fn compare(&self, field: &str, op: Comparison, value: &Value) -> Result<String> {
            Ok(format!("({} {field} {})", op.symbol(), literal(value)))
        }
        fn membership(&self, field: &str, values: &[Value], negated: bool) -> Result<String> {
            let op = if negated { "not-in" } else { "in" };
            Ok(format!("({op} {field} {})", values.len()))
        }
        fn geo_distance(&self, field: &str, lat: f64, lng: f64, distance: f64) -> Result<String> {
            Ok(format!("(near {field} {lat} {lng} {distance})"))
        }
        fn geo_bounding_box(&self, field: &str, bbox: BoundingBox) -> Result<String> {
            Ok(format!("(box {field} {} {} {} {})", bbox.north, bbox.east, bbox.south, bbox.west))
        }
        fn and(&self, children: Vec<String>) -> Result<String> {
            Ok(format!("(and {})", children.join(" ")))
        }
        fn or(&self, children: Vec<String>) -> Result<String> {
            Ok(format!("(or {})", children.join(" ")))
        }
    }

    #[test]
    fn and_wraps_children_in_order() {
        let out = compile_json(
            &json!([{"type": "and", "conditions": [
                {"type": "equal", "field": "a", "value": "x"},
                {"type": "lt", "field": "b", "value": 3}
            ]}]),
            &Sexpr,
        )
        .expect("compile");
        assert_eq!(out, vec![r#"(and (= a "x") (< b 3))"#.to_string()]);
    }

    #[test]
    fn one_predicate_per_entry_in_input_order() {
        let out = compile_json(
            &json!([
                {"type": "search", "query": "boots"},
                {"type": "identifier", "id": "7"},
                {"type": "in", "field": "c", "values": [1, 2]},
                {"type": "or", "conditions": [
                    {"type": "geo_bounding_box", "north": 1, "east": 2, "south": 3, "west": 4},
                    {"type": "not_equal", "field": "d", "value": true}
                ]}
            ]),
            &Sexpr,
        )
        .expect("compile");
        assert_eq!(
            out,
            vec![
                "(search boots)".to_string(),
                "(id 7)".to_string(),
                "(in c 2)".to_string(),
                "(or (box _geo 1 2 3 4) (!= d true))".to_string(),
            ]
        );
    }

    #[test]
    fn unknown_operator_fails_compilation() {
        let err = compile_json(&json!([{"type": "between", "field": "a"}]), &Sexpr).unwrap_err();
        assert!(matches!(err, Error::InvalidFilter(_)));
    }

    #[test]
    fn literal_escapes_quotes() {
        assert_eq!(literal(&json!(r#"say "hi" \o/"#)), r#""say \"hi\" \\o/""#);
        assert_eq!(literal(&json!(2.5)), "2.5");
        assert_eq!(literal(&json!(false)), "false");
    }
}
