//! Condition evaluation against a run context.
//!
//! Evaluation is total: a missing path, a type mismatch or a failed numeric
//! coercion yields `false` rather than an error.

use serde_json::Value;

use crate::config::Operator;

/// A fully configured condition, as held by an execution plan.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionSpec {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl ConditionSpec {
    pub fn evaluate(&self, context: &Value) -> bool {
        evaluate(self, context)
    }
}

/// Evaluate `spec` against `context`.
pub fn evaluate(spec: &ConditionSpec, context: &Value) -> bool {
    let left = resolve_path(context, &spec.field).unwrap_or(&Value::Null);
    let right = &spec.value;

    match spec.operator {
        Operator::Equals => loosely_equal(left, right),
        Operator::NotEquals => !loosely_equal(left, right),
        Operator::Contains => contains(left, right),
        Operator::GreaterThan => compare(left, right, |l, r| l > r),
        Operator::LessThan => compare(left, right, |l, r| l < r),
    }
}

/// Follow a dotted path (`a.b.0.c`). Numeric segments index into arrays.
pub fn resolve_path<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .try_fold(context, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    if let (Some(l), Some(r)) = (as_f64(left), as_f64(right)) {
        return l == r;
    }
    if left.is_string() || right.is_string() {
        return match (stringify(left), stringify(right)) {
            (Some(l), Some(r)) => l == r,
            _ => false,
        };
    }
    false
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::String(s) => stringify(needle).map_or(false, |n| s.contains(n.as_str())),
        Value::Array(items) => items.iter().any(|item| loosely_equal(item, needle)),
        Value::Object(map) => needle.as_str().map_or(false, |k| map.contains_key(k)),
        _ => false,
    }
}

fn compare(left: &Value, right: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (as_f64(left), as_f64(right)) {
        (Some(l), Some(r)) => op(l, r),
        _ => false,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Scalars only; containers and `null` have no string form.
fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(field: &str, operator: Operator, value: Value) -> ConditionSpec {
        ConditionSpec { field: field.into(), operator, value }
    }

    #[test]
    fn resolves_nested_paths_and_array_indexes() {
        let ctx = json!({ "ticket": { "tags": ["billing", "vip"], "owner": { "name": "kai" } } });
        assert_eq!(resolve_path(&ctx, "ticket.owner.name"), Some(&json!("kai")));
        assert_eq!(resolve_path(&ctx, "ticket.tags.1"), Some(&json!("vip")));
        assert_eq!(resolve_path(&ctx, "ticket.tags.7"), None);
        assert_eq!(resolve_path(&ctx, "ticket.missing.deeper"), None);
    }

    #[test]
    fn equals_matches_strings_and_coerces_numbers() {
        let ctx = json!({ "priority": "high", "amount": "250", "count": 3 });
        assert!(evaluate(&spec("priority", Operator::Equals, json!("high")), &ctx));
        assert!(!evaluate(&spec("priority", Operator::Equals, json!("low")), &ctx));
        assert!(evaluate(&spec("amount", Operator::Equals, json!(250)), &ctx));
        assert!(evaluate(&spec("count", Operator::Equals, json!("3")), &ctx));
        assert!(evaluate(&spec("priority", Operator::NotEquals, json!("low")), &ctx));
    }

    #[test]
    fn missing_field_compares_as_null() {
        let ctx = json!({});
        assert!(!evaluate(&spec("priority", Operator::Equals, json!("high")), &ctx));
        assert!(evaluate(&spec("priority", Operator::NotEquals, json!("high")), &ctx));
        assert!(!evaluate(&spec("amount", Operator::GreaterThan, json!(0)), &ctx));
        assert!(!evaluate(&spec("amount", Operator::LessThan, json!(0)), &ctx));
    }

    #[test]
    fn contains_handles_strings_arrays_and_objects() {
        let ctx = json!({ "subject": "Invoice overdue", "tags": ["vip", 7], "meta": { "region": "eu" } });
        assert!(evaluate(&spec("subject", Operator::Contains, json!("overdue")), &ctx));
        assert!(evaluate(&spec("tags", Operator::Contains, json!("vip")), &ctx));
        assert!(evaluate(&spec("tags", Operator::Contains, json!(7)), &ctx));
        assert!(evaluate(&spec("meta", Operator::Contains, json!("region")), &ctx));
        assert!(!evaluate(&spec("meta", Operator::Contains, json!("country")), &ctx));
    }

    #[test]
    fn ordering_requires_numeric_operands() {
        let ctx = json!({ "days_overdue": "45", "name": "acme" });
        assert!(evaluate(&spec("days_overdue", Operator::GreaterThan, json!(30)), &ctx));
        assert!(!evaluate(&spec("days_overdue", Operator::LessThan, json!(30)), &ctx));
        assert!(!evaluate(&spec("name", Operator::GreaterThan, json!(1)), &ctx));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let ctx = json!({ "priority": "high" });
        let cond = spec("priority", Operator::Equals, json!("high"));
        let first = cond.evaluate(&ctx);
        assert!((0..100).all(|_| cond.evaluate(&ctx) == first));
    }
}
