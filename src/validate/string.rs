//! String instances: length bounds and `pattern`.
use crate::document::Node;
use crate::schema::SchemaObject;
use crate::validate::checker::Checker;
use crate::validate::diagnostic::Priority;

/// Length bounds count characters; the first violated bound ends the check.
pub(crate) fn check_string(node: &Node, schema: &SchemaObject, checker: &mut Checker<'_>) {
    let Some(value) = node.as_str() else {
        return;
    };
    let length = value.chars().count() as u64;

    if let Some(min) = schema.min_length.filter(|min| length < *min) {
        checker.report(node.anchor(), format!("String is shorter than {min}"), Priority::Low);
        return;
    }
    if let Some(max) = schema.max_length.filter(|max| length > *max) {
        checker.report(node.anchor(), format!("String is longer than {max}"), Priority::Low);
        return;
    }

    if let Some(pattern) = &schema.pattern {
        if let Some(error) = pattern.error() {
            checker.report(
                node.anchor(),
                format!("Can not check the string by pattern because of an error: {}", error.replace("\r\n", "\n")),
                Priority::Low,
            );
        } else if !pattern.check(value) {
            checker.report(node.anchor(), format!("String violates the pattern: '{}'", pattern.source()), Priority::Low);
        }
    }
}
