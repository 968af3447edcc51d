//! Accumulates findings for one instance value and picks the best
//! alternative when several schemas could apply.
use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;

use crate::config::ComplianceOptions;
use crate::document::{Anchor, Node};
use crate::pointer::PointerPosition;
use crate::resolve::EngineContext;
use crate::schema::{Schema, SchemaType};
use crate::validate::diagnostic::{FixableIssueKind, IssueData, MissingProperties, Priority, ValidationError};
use crate::validate::{Validation, types};
use crate::variants::{self, MatchResult};

pub(crate) const INCOMPATIBLE_TYPES: &str = "Incompatible types.";
pub(crate) const ENUM_MISMATCH: &str = "Value should be one of: ";
const ACTUAL: &str = "Actual: ";

pub struct Checker<'a> {
    ctx: &'a EngineContext,
    options: ComplianceOptions,
    errors: IndexMap<Anchor, ValidationError>,
    had_type_error: bool,
}

impl<'a> Checker<'a> {
    pub fn new(ctx: &'a EngineContext, options: ComplianceOptions) -> Self {
        Self { ctx, options, errors: IndexMap::new(), had_type_error: false }
    }

    pub fn ctx(&self) -> &'a EngineContext {
        self.ctx
    }

    pub fn options(&self) -> ComplianceOptions {
        self.options
    }

    pub fn errors(&self) -> &IndexMap<Anchor, ValidationError> {
        &self.errors
    }

    pub fn into_errors(self) -> IndexMap<Anchor, ValidationError> {
        self.errors
    }

    pub fn had_type_error(&self) -> bool {
        self.had_type_error
    }

    /// No findings at all.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    // ---- recording ----

    /// Record a finding; the first one per anchor wins.
    pub fn error(&mut self, anchor: &Anchor, error: ValidationError) {
        if !self.errors.contains_key(anchor) {
            self.errors.insert(anchor.clone(), error);
        }
    }

    pub fn report(&mut self, anchor: &Anchor, message: impl Into<String>, priority: Priority) {
        self.error(anchor, ValidationError::new(message, priority));
    }

    pub fn type_error(&mut self, anchor: &Anchor, actual: Option<SchemaType>, allowed: &[SchemaType]) {
        if allowed.is_empty() {
            return;
        }
        let actual = actual.map(|t| format!(" {ACTUAL}{}.", t.description())).unwrap_or_default();
        let message = match allowed {
            [only] => format!("{INCOMPATIBLE_TYPES}\n Required: {}.{actual}", only.description()),
            _ => format!("{INCOMPATIBLE_TYPES}\n Required one of: {}.{actual}", sorted_descriptions(allowed)),
        };
        self.error(
            anchor,
            ValidationError::fixable(
                message,
                FixableIssueKind::ProhibitedType,
                Some(IssueData::TypeMismatch { expected: allowed.to_vec() }),
                Priority::TypeMismatch,
            ),
        );
        self.had_type_error = true;
    }

    fn absorb(&mut self, other: Checker<'_>) {
        self.had_type_error |= other.had_type_error;
        for (anchor, error) in other.errors {
            self.error(&anchor, error);
        }
    }

    // ---- checking ----

    /// Variants of `schema` itself.
    pub fn resolve(&self, schema: &Schema) -> MatchResult {
        variants::detailed_resolve(self.ctx, schema, &PointerPosition::new())
    }

    /// Run every applicable validation of `schema` against `node`.
    pub fn check_by_schema(&mut self, node: &Node, schema: &Schema) {
        let kind = SchemaType::of_node(node);
        for validation in Validation::for_schema(schema, kind) {
            validation.apply(node, schema, kind, self);
        }
    }

    /// Resolve `schema` into its variants and check `node` against them,
    /// keeping the findings here.
    pub fn check_with_variants(&mut self, schema: &Schema, node: &Node) {
        let result = self.resolve(schema);
        if let Some(checker) = check_by_match_result(self.ctx, node, &result, self.options) {
            self.absorb(checker);
        }
    }

    /// Check `node` against a separately resolved result, for example a
    /// `propertyNames` schema against a member name.
    pub fn check_with_result(&mut self, node: &Node, result: &MatchResult) {
        if let Some(checker) = check_by_match_result(self.ctx, node, result, self.options) {
            self.absorb(checker);
        }
    }

    fn process_one_of(&mut self, node: &Node, one_of: &[Schema]) {
        let mut failed = Vec::new();
        let mut correct: Vec<&Schema> = Vec::new();

        for schema in one_of {
            if schema.should_validate_against_js_type {
                continue;
            }
            let mut checker = Checker::new(self.ctx, self.options);
            checker.check_by_schema(node, schema);
            if checker.is_valid() {
                correct.push(schema);
            } else {
                failed.push(checker);
            }
        }

        if correct.len() == 1 {
            return;
        }
        if !correct.is_empty() {
            let distinct: HashSet<_> = correct.iter().map(|s| s.key()).collect();
            // `format` is not checked, so alternatives differing only there are fine
            let differ_unchecked = correct.iter().any(|s| s.format.as_deref().is_some_and(|f| !f.trim().is_empty()));
            if distinct.len() > 1 && !differ_unchecked {
                self.report(node.anchor(), "Validates to more than one variant", Priority::Medium);
            }
            return;
        }
        self.report_least_erroneous(failed, true);
    }

    fn process_any_of(&mut self, node: &Node, any_of: &[Schema]) {
        let mut failed = Vec::new();
        for schema in any_of {
            let mut checker = Checker::new(self.ctx, self.options);
            checker.check_by_schema(node, schema);
            if checker.is_valid() {
                return;
            }
            failed.push(checker);
        }
        self.report_least_erroneous(failed, false);
    }

    /// None of the alternatives matched: report the findings of the ones
    /// that failed least, merging same-kind findings on one anchor.
    fn report_least_erroneous(&mut self, failed: Vec<Checker<'_>>, is_one_of: bool) {
        let amounts: Vec<FailureAmount> = failed.iter().map(FailureAmount::of).collect();
        let min_amount = amounts.iter().min().copied().unwrap_or(FailureAmount::Hard);
        let min_errors = failed.iter().map(|c| c.errors.len()).min().unwrap_or(usize::MAX);

        let mut lightest: IndexMap<Anchor, Vec<ValidationError>> = IndexMap::new();
        let mut heavier: IndexMap<Anchor, Vec<ValidationError>> = IndexMap::new();
        for (checker, amount) in failed.into_iter().zip(amounts) {
            if checker.errors.len() > min_errors {
                continue;
            }
            let target = if amount > min_amount { &mut heavier } else { &mut lightest };
            for (anchor, error) in checker.errors {
                target.entry(anchor).or_default().push(error);
            }
        }
        if lightest.is_empty() {
            lightest = heavier;
        }

        for (anchor, errors) in lightest {
            if errors.len() == 1 {
                for error in errors {
                    self.error(&anchor, error);
                }
                continue;
            }
            match try_merge_errors(&errors, is_one_of) {
                Some(merged) => self.error(&anchor, merged),
                None => {
                    for error in errors {
                        self.error(&anchor, error);
                    }
                }
            }
        }
    }
}

/// How badly an alternative failed, from its worst finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum FailureAmount {
    Light,
    MissingItems,
    Medium,
    Hard,
    NotSchema,
}

impl FailureAmount {
    fn of(checker: &Checker<'_>) -> Self {
        let mut low = 0;
        let (mut medium, mut missing, mut hard) = (false, false, false);
        for error in checker.errors.values() {
            match error.priority {
                Priority::Low => low += 1,
                Priority::MissingProps => missing = true,
                Priority::Medium => medium = true,
                Priority::TypeMismatch => hard = true,
                Priority::NotSchema => return FailureAmount::NotSchema,
            }
        }
        if hard {
            FailureAmount::Hard
        } else if missing {
            FailureAmount::MissingItems
        } else if medium || low > 3 {
            FailureAmount::Medium
        } else {
            FailureAmount::Light
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// MATCH RESULTS
// ————————————————————————————————————————————————————————————————————————————

/// Check `node` against every schema of `result`. A single unconditional
/// schema is checked directly; otherwise the unconditional schemas behave
/// like `anyOf` and each exclusive group like `oneOf`.
pub fn check_by_match_result<'a>(
    ctx: &'a EngineContext,
    node: &Node,
    result: &MatchResult,
    options: ComplianceOptions,
) -> Option<Checker<'a>> {
    let mut checkers = Vec::new();
    if let ([only], true) = (result.schemas.as_slice(), result.excluding_schemas.is_empty()) {
        let mut checker = Checker::new(ctx, options);
        checker.check_by_schema(node, only);
        checkers.push(checker);
    } else {
        if !result.schemas.is_empty() {
            checkers.push(process_variants(ctx, &result.schemas, node, false, options));
        }
        if !result.excluding_schemas.is_empty() {
            let list = result
                .excluding_schemas
                .iter()
                .map(|group| process_variants(ctx, group, node, true, options))
                .collect();
            checkers.push(merge_errors(ctx, options, list, &result.excluding_schemas));
        }
    }

    if checkers.len() > 1 {
        let idx = checkers.iter().position(|c| !c.had_type_error).unwrap_or(0);
        return Some(checkers.swap_remove(idx));
    }
    checkers.pop()
}

fn process_variants<'a>(
    ctx: &'a EngineContext,
    collection: &[Schema],
    node: &Node,
    is_one_of: bool,
    options: ComplianceOptions,
) -> Checker<'a> {
    let mut checker = Checker::new(ctx, options);
    let kind = SchemaType::of_node(node);
    let filtered: Vec<Schema> = collection
        .iter()
        .filter(|s| types::accepts(s, kind) || types::accepts(s, kind.alternate()))
        .cloned()
        .collect();

    match filtered.as_slice() {
        [] => checker.type_error(node.anchor(), Some(kind), &types::expected_types(collection)),
        [only] => checker.check_by_schema(node, only),
        _ if is_one_of => checker.process_one_of(node, &filtered),
        _ => checker.process_any_of(node, &filtered),
    }
    checker
}

/// Union of the exclusive groups' findings. A prohibited property is
/// excused when some alternative, not closed by itself, declares it.
fn merge_errors<'a>(
    ctx: &'a EngineContext,
    options: ComplianceOptions,
    list: Vec<Checker<'_>>,
    excluding: &[Vec<Schema>],
) -> Checker<'a> {
    let mut merged = Checker::new(ctx, options);
    for checker in list {
        for (anchor, error) in checker.errors {
            if let Some(IssueData::ProhibitedProperty { name }) = &error.data {
                let excused = excluding.iter().any(|group| {
                    group
                        .iter()
                        .filter(|s| !s.has_own_extra_property_prohibition())
                        .any(|s| s.property(name).is_some())
                });
                if excused {
                    continue;
                }
            }
            merged.errors.insert(anchor, error);
        }
    }
    merged
}

/// Combine same-kind findings from several alternatives into one.
fn try_merge_errors(errors: &[ValidationError], is_one_of: bool) -> Option<ValidationError> {
    let mut common = None;
    for error in errors {
        match (error.kind, common) {
            (FixableIssueKind::None, _) => return None,
            (kind, None) => common = Some(kind),
            (kind, Some(seen)) if kind != seen => return None,
            _ => {}
        }
    }
    let priority = errors.first()?.priority;

    match common? {
        FixableIssueKind::NonEnumValue => {
            let mut values: Vec<&str> = Vec::new();
            for error in errors {
                let listed = error.message.strip_prefix(ENUM_MISMATCH).unwrap_or(&error.message);
                for value in listed.split(", ") {
                    if !values.contains(&value) {
                        values.push(value);
                    }
                }
            }
            let message = format!("{ENUM_MISMATCH}{}", values.join(", "));
            Some(ValidationError::fixable(message, FixableIssueKind::NonEnumValue, None, priority))
        }
        FixableIssueKind::MissingProperty => {
            let options: Vec<MissingProperties> = errors
                .iter()
                .filter_map(|e| match &e.data {
                    Some(IssueData::MissingProperties(missing)) => Some(missing.clone()),
                    _ => None,
                })
                .collect();
            let sets = join_or(options.iter().map(|o| o.message(false)).collect());
            let (message, kind) = if is_one_of {
                (
                    format!("Exactly one of the following property sets is required: {sets}"),
                    FixableIssueKind::MissingOneOfProperty,
                )
            } else {
                (
                    format!("At least one of the following property sets is required: {sets}"),
                    FixableIssueKind::MissingAnyOfProperty,
                )
            };
            Some(ValidationError::fixable(message, kind, Some(IssueData::MissingOneOf { options }), priority))
        }
        FixableIssueKind::ProhibitedType => {
            let mut all = BTreeSet::new();
            for error in errors {
                if let Some(IssueData::TypeMismatch { expected }) = &error.data {
                    all.extend(expected.iter().copied());
                }
            }
            if all.len() == 1 {
                return errors.first().cloned();
            }
            let mut actuals: Vec<Option<&str>> = Vec::new();
            for error in errors {
                let actual = fetch_actual(&error.message);
                if !actuals.contains(&actual) {
                    actuals.push(actual);
                }
            }
            let actual = match actuals.as_slice() {
                [Some(actual)] => format!(" {ACTUAL}{actual}."),
                _ => String::new(),
            };
            let expected: Vec<SchemaType> = all.into_iter().collect();
            let message = format!("{INCOMPATIBLE_TYPES}\n Required one of: {}.{actual}", sorted_descriptions(&expected));
            Some(ValidationError::fixable(
                message,
                FixableIssueKind::TypeMismatch,
                Some(IssueData::TypeMismatch { expected }),
                priority,
            ))
        }
        _ => None,
    }
}

fn fetch_actual(message: &str) -> Option<&str> {
    let start = message.find(ACTUAL)? + ACTUAL.len();
    Some(message[start..].trim_end_matches('.'))
}

fn sorted_descriptions(types: &[SchemaType]) -> String {
    let mut names: Vec<&str> = types.iter().map(|t| t.description()).collect();
    names.sort_unstable();
    names.dedup();
    names.join(", ")
}

/// `a`, `a or b`, `a, b or c`.
fn join_or(mut items: Vec<String>) -> String {
    let Some(last) = items.pop() else {
        return String::new();
    };
    if items.is_empty() {
        return last;
    }
    format!("{} or {last}", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::reader::read_value;
    use crate::resolve::InMemorySchemaService;
    use crate::schema::FileId;
    use serde_json::json;

    fn setup(schema: serde_json::Value) -> (EngineContext, Schema) {
        let ctx = EngineContext::new(InMemorySchemaService::new());
        let root = read_value(FileId::new("mem://checker"), schema);
        ctx.adopt_root(&root);
        (ctx, root)
    }

    fn check(ctx: &EngineContext, root: &Schema, instance: serde_json::Value) -> Vec<(String, ValidationError)> {
        let doc = Document::from_json(instance);
        let result = variants::detailed_resolve(ctx, root, &PointerPosition::new());
        check_by_match_result(ctx, doc.root(), &result, ComplianceOptions::default().with_force_strict())
            .map(|c| c.into_errors().into_iter().map(|(a, e)| (a.pointer, e)).collect())
            .unwrap_or_default()
    }

    #[test]
    fn one_of_picks_the_single_match() {
        let (ctx, root) = setup(json!({"oneOf": [{"type": "string"}, {"type": "number"}]}));
        assert!(check(&ctx, &root, json!("x")).is_empty());
        assert!(check(&ctx, &root, json!(3)).is_empty());

        let errors = check(&ctx, &root, json!(true));
        assert_eq!(errors.len(), 1);
        let (_, error) = &errors[0];
        assert_eq!(error.priority, Priority::TypeMismatch);
        assert_eq!(error.message, "Incompatible types.\n Required one of: number, string. Actual: boolean.");
        assert_eq!(
            error.data,
            Some(IssueData::TypeMismatch { expected: vec![SchemaType::String, SchemaType::Number] })
        );
    }

    #[test]
    fn one_of_with_two_matches_is_reported() {
        let (ctx, root) = setup(json!({"oneOf": [{"type": "integer"}, {"minimum": 0}]}));
        let errors = check(&ctx, &root, json!(4));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].1.message, "Validates to more than one variant");
        assert!(check(&ctx, &root, json!(-4)).is_empty());
    }

    #[test]
    fn any_of_reports_lightest_failure() {
        let (ctx, root) = setup(json!({
            "type": "object",
            "anyOf": [
                {"properties": {"a": {"type": "string"}}, "required": ["a"]},
                {"properties": {"b": {"type": "string"}}, "required": ["b"]}
            ]
        }));
        assert!(check(&ctx, &root, json!({"b": "x"})).is_empty());

        let errors = check(&ctx, &root, json!({}));
        assert_eq!(errors.len(), 1);
        let (pointer, error) = &errors[0];
        assert_eq!(pointer, "/");
        assert_eq!(error.kind, FixableIssueKind::MissingAnyOfProperty);
        assert_eq!(
            error.message,
            "At least one of the following property sets is required: property 'a' or property 'b'"
        );
    }

    #[test]
    fn enum_failures_merge_their_values() {
        let merged = try_merge_errors(
            &[
                ValidationError::fixable("Value should be one of: \"a\", \"b\"", FixableIssueKind::NonEnumValue, None, Priority::Medium),
                ValidationError::fixable("Value should be one of: \"b\", \"c\"", FixableIssueKind::NonEnumValue, None, Priority::Medium),
            ],
            true,
        )
        .unwrap();
        assert_eq!(merged.message, "Value should be one of: \"a\", \"b\", \"c\"");
        assert!(try_merge_errors(&[ValidationError::new("x", Priority::Low)], true).is_none());
    }

    #[test]
    fn first_finding_per_anchor_wins() {
        let ctx = EngineContext::new(InMemorySchemaService::new());
        let mut checker = Checker::new(&ctx, ComplianceOptions::default());
        let anchor = Anchor::value("/a");
        checker.report(&anchor, "first", Priority::Low);
        checker.report(&anchor, "second", Priority::NotSchema);
        assert_eq!(checker.errors()[&anchor].message, "first");
        assert!(!checker.had_type_error());
        checker.type_error(&Anchor::value("/b"), Some(SchemaType::Null), &[SchemaType::String]);
        assert!(checker.had_type_error());
        assert_eq!(checker.errors()[&Anchor::value("/b")].message, "Incompatible types.\n Required: string. Actual: null.");
    }

    #[test]
    fn join_or_forms() {
        assert_eq!(join_or(vec![]), "");
        assert_eq!(join_or(vec!["a".into()]), "a");
        assert_eq!(join_or(vec!["a".into(), "b".into(), "c".into()]), "a, b or c");
    }
}
