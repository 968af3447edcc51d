//! Numeric instances: integer-ness, `multipleOf` and bounds.
use serde_json::Number;

use crate::document::{Node, NodeKind};
use crate::schema::{SchemaObject, SchemaType};
use crate::validate::checker::Checker;
use crate::validate::diagnostic::{FixableIssueKind, IssueData, Priority, ValidationError};
use crate::validate::types::matching_schema_type;

const EPSILON: f64 = 0.000_001;

pub(crate) fn check_number(node: &Node, schema: &SchemaObject, kind: SchemaType, checker: &mut Checker<'_>) {
    let text = match node.kind() {
        NodeKind::Number(n) => n.to_string(),
        NodeKind::String(s) if kind == SchemaType::StringNumber => s.clone(),
        _ => return,
    };
    let expected = match matching_schema_type(schema, kind) {
        Some(SchemaType::Integer) => SchemaType::Integer,
        _ => kind,
    };

    let value = if expected == SchemaType::Integer {
        match text.parse::<i128>() {
            Ok(v) => v as f64,
            Err(_) => {
                checker.error(node.anchor(), mismatch("Integer value expected", expected));
                return;
            }
        }
    } else {
        match text.parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                if expected != SchemaType::StringNumber {
                    checker.error(node.anchor(), mismatch("Number expected", expected));
                }
                return;
            }
        }
    };

    if let Some(multiple_of) = schema.multiple_of.as_ref().and_then(Number::as_f64) {
        if !is_multiple(value, multiple_of) {
            checker.report(node.anchor(), format!("Is not multiple of {}", display_number(multiple_of)), Priority::Low);
        }
    }
    check_minimum(node, schema, value, checker);
    check_maximum(node, schema, value, checker);
}

fn mismatch(message: &str, expected: SchemaType) -> ValidationError {
    ValidationError::fixable(
        message,
        FixableIssueKind::TypeMismatch,
        Some(IssueData::TypeMismatch { expected: vec![expected] }),
        Priority::TypeMismatch,
    )
}

/// Remainders within a small epsilon of zero or of the divisor count as
/// exact, so float noise in either direction is tolerated.
fn is_multiple(value: f64, multiple_of: f64) -> bool {
    if multiple_of == 0.0 {
        return true;
    }
    let left_over = (value % multiple_of).abs();
    left_over <= EPSILON || (multiple_of.abs() - left_over) <= EPSILON
}

/// Whole divisors print without a fraction.
fn display_number(value: f64) -> String {
    if (value - value.trunc()).abs() < EPSILON {
        format!("{}", value.trunc() as i64)
    } else {
        value.to_string()
    }
}

fn as_f64(number: &Number) -> f64 {
    number.as_f64().unwrap_or(f64::NAN)
}

fn check_minimum(node: &Node, schema: &SchemaObject, value: f64, checker: &mut Checker<'_>) {
    if let Some(bound) = &schema.exclusive_minimum_number {
        if value <= as_f64(bound) {
            checker.report(node.anchor(), format!("Less than an exclusive minimum {bound}"), Priority::Low);
        }
    }
    let Some(minimum) = &schema.minimum else {
        return;
    };
    if schema.is_exclusive_minimum {
        if value <= as_f64(minimum) {
            checker.report(node.anchor(), format!("Less than an exclusive minimum {minimum}"), Priority::Low);
        }
    } else if value < as_f64(minimum) {
        checker.report(node.anchor(), format!("Less than the minimum {minimum}"), Priority::Low);
    }
}

fn check_maximum(node: &Node, schema: &SchemaObject, value: f64, checker: &mut Checker<'_>) {
    if let Some(bound) = &schema.exclusive_maximum_number {
        if value >= as_f64(bound) {
            checker.report(node.anchor(), format!("Greater than an exclusive maximum {bound}"), Priority::Low);
        }
    }
    let Some(maximum) = &schema.maximum else {
        return;
    };
    if schema.is_exclusive_maximum {
        if value >= as_f64(maximum) {
            checker.report(node.anchor(), format!("Greater than an exclusive maximum {maximum}"), Priority::Low);
        }
    } else if value > as_f64(maximum) {
        checker.report(node.anchor(), format!("Greater than the maximum {maximum}"), Priority::Low);
    }
}
