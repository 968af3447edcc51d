//! Merge algebra: overlaying one schema onto another.
use std::sync::Arc;

use indexmap::IndexMap;

use crate::schema::{PatternProperties, SchemaObject, SchemaType, TypeSet};

/// Combine `base` and `other` into a fresh object that takes its identity
/// from `point_to`. `base` is copied first, then `other` is overlaid; the
/// result's `$ref` is always `other`'s.
pub fn merge(base: &SchemaObject, other: &SchemaObject, point_to: &SchemaObject) -> SchemaObject {
    let mut merged = SchemaObject::new(point_to.file().clone(), point_to.pointer());
    merged.ids = point_to.ids.clone();
    merged.merge_values(base);
    merged.merge_values(other);
    merged.reference = other.reference.clone();
    merged.ref_is_recursive = other.ref_is_recursive;
    merged
}

fn copy_map<V: Clone>(target: &mut Option<IndexMap<String, V>>, source: &Option<IndexMap<String, V>>) {
    let Some(source) = source.as_ref().filter(|s| !s.is_empty()) else {
        return;
    };
    let target = target.get_or_insert_with(IndexMap::new);
    for (k, v) in source {
        target.insert(k.clone(), v.clone());
    }
}

fn copy_list<T: Clone>(target: &mut Option<Vec<T>>, source: &Option<Vec<T>>) {
    let Some(source) = source.as_ref().filter(|s| !s.is_empty()) else {
        return;
    };
    target.get_or_insert_with(Vec::new).extend(source.iter().cloned());
}

fn overwrite<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
    if let Some(value) = source {
        *target = Some(value.clone());
    }
}

/// Every kind compatible with both `t` and one of `variants`.
fn narrow_against(t: SchemaType, variants: &TypeSet) -> TypeSet {
    variants.iter().filter_map(|v| t.subtype_of_both(*v)).collect()
}

impl SchemaObject {
    /// Overlay `other`'s values onto `self`. Identity, `$id` and `$schema`
    /// are left alone.
    pub fn merge_values(&mut self, other: &SchemaObject) {
        for (name, other_prop) in &other.properties {
            let merged = match self.properties.get(name) {
                Some(existing) => Arc::new(merge(existing, other_prop, other_prop)),
                None => other_prop.clone(),
            };
            self.properties.insert(name.clone(), merged);
        }
        copy_map(&mut self.definitions, &other.definitions);

        if other.pattern_properties.is_some() {
            let mut schemas = self.pattern_properties.take().map(PatternProperties::into_schemas).unwrap_or_default();
            if let Some(theirs) = &other.pattern_properties {
                for (source, schema) in theirs.schemas() {
                    schemas.insert(source.clone(), schema.clone());
                }
            }
            self.pattern_properties = Some(PatternProperties::new(schemas));
        }

        overwrite(&mut self.title, &other.title);
        overwrite(&mut self.description, &other.description);
        overwrite(&mut self.html_description, &other.html_description);
        if other.deprecation_message.as_deref().is_some_and(|m| !m.trim().is_empty()) {
            self.deprecation_message = other.deprecation_message.clone();
        }

        self.schema_type = self.merge_types(self.schema_type, other.schema_type, other.type_variants.as_ref());

        overwrite(&mut self.default, &other.default);
        overwrite(&mut self.example, &other.example);
        overwrite(&mut self.reference, &other.reference);
        overwrite(&mut self.format, &other.format);

        let mine = self.type_variants.take();
        self.type_variants = self.merge_type_variant_sets(mine, other.type_variants.as_ref());

        overwrite(&mut self.multiple_of, &other.multiple_of);
        overwrite(&mut self.maximum, &other.maximum);
        overwrite(&mut self.exclusive_maximum_number, &other.exclusive_maximum_number);
        self.is_exclusive_maximum |= other.is_exclusive_maximum;
        overwrite(&mut self.minimum, &other.minimum);
        overwrite(&mut self.exclusive_minimum_number, &other.exclusive_minimum_number);
        self.is_exclusive_minimum |= other.is_exclusive_minimum;
        overwrite(&mut self.max_length, &other.max_length);
        overwrite(&mut self.min_length, &other.min_length);
        overwrite(&mut self.pattern, &other.pattern);

        if let Some(allowed) = other.additional_properties_allowed {
            self.additional_properties_allowed = Some(allowed);
            if !allowed {
                self.additional_properties_not_allowed_for.insert(other.own_slot());
                self.additional_properties_not_allowed_for
                    .extend(other.additional_properties_not_allowed_for.iter().cloned());
            }
        }
        overwrite(&mut self.additional_properties_schema, &other.additional_properties_schema);
        overwrite(&mut self.property_names_schema, &other.property_names_schema);
        overwrite(&mut self.additional_items_allowed, &other.additional_items_allowed);
        overwrite(&mut self.additional_items_schema, &other.additional_items_schema);
        overwrite(&mut self.items_schema, &other.items_schema);
        overwrite(&mut self.contains_schema, &other.contains_schema);
        copy_list(&mut self.items_schema_list, &other.items_schema_list);

        overwrite(&mut self.max_items, &other.max_items);
        overwrite(&mut self.min_items, &other.min_items);
        overwrite(&mut self.unique_items, &other.unique_items);
        overwrite(&mut self.max_properties, &other.max_properties);
        overwrite(&mut self.min_properties, &other.min_properties);

        if let Some(theirs) = &other.required {
            self.required.get_or_insert_with(Default::default).extend(theirs.iter().cloned());
        }

        copy_map(&mut self.property_dependencies, &other.property_dependencies);
        copy_map(&mut self.schema_dependencies, &other.schema_dependencies);
        copy_map(&mut self.enum_metadata, &other.enum_metadata);
        overwrite(&mut self.enum_values, &other.enum_values);

        copy_list(&mut self.all_of, &other.all_of);
        copy_list(&mut self.any_of, &other.any_of);
        copy_list(&mut self.one_of, &other.one_of);
        overwrite(&mut self.not, &other.not);
        copy_list(&mut self.if_then_else, &other.if_then_else);

        overwrite(&mut self.language_injection, &other.language_injection);
        overwrite(&mut self.language_injection_prefix, &other.language_injection_prefix);
        overwrite(&mut self.language_injection_suffix, &other.language_injection_suffix);
        self.should_validate_against_js_type |= other.should_validate_against_js_type;
        self.force_case_insensitive |= other.force_case_insensitive;
        self.is_valid_by_exclusion &= other.is_valid_by_exclusion;
    }

    /// Narrow `self_type` against `other_type`, or against `other_variants`
    /// when `other_type` is unset. An empty intersection clears
    /// `is_valid_by_exclusion`. `None` with several surviving variants
    /// leaves the decision to the variant set.
    pub(crate) fn merge_types(
        &mut self,
        self_type: Option<SchemaType>,
        other_type: Option<SchemaType>,
        other_variants: Option<&TypeSet>,
    ) -> Option<SchemaType> {
        let Some(self_type) = self_type else {
            return other_type;
        };
        let Some(other_type) = other_type else {
            let Some(variants) = other_variants.filter(|v| !v.is_empty()) else {
                return Some(self_type);
            };
            let filtered = narrow_against(self_type, variants);
            return match filtered.len() {
                0 => {
                    self.is_valid_by_exclusion = false;
                    Some(self_type)
                }
                1 => filtered.first().copied(),
                _ => None,
            };
        };
        match self_type.subtype_of_both(other_type) {
            Some(narrowed) => Some(narrowed),
            None => {
                self.is_valid_by_exclusion = false;
                Some(other_type)
            }
        }
    }

    fn merge_type_variant_sets(&mut self, mine: Option<TypeSet>, other: Option<&TypeSet>) -> Option<TypeSet> {
        let Some(mine) = mine else {
            return other.cloned();
        };
        let Some(other) = other else {
            return Some(mine);
        };
        let result: TypeSet = mine.iter().flat_map(|t| narrow_against(*t, other)).collect();
        if result.is_empty() {
            self.is_valid_by_exclusion = false;
            return Some(other.clone());
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FileId;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn object(pointer: &str) -> SchemaObject {
        SchemaObject::new(FileId::new("mem://merge"), pointer)
    }

    fn typed(pointer: &str, t: SchemaType) -> SchemaObject {
        let mut s = object(pointer);
        s.schema_type = Some(t);
        s
    }

    #[test]
    fn integer_and_number_narrow_to_integer() {
        let merged = merge(&typed("/a", SchemaType::Integer), &typed("/b", SchemaType::Number), &object("/b"));
        assert_eq!(merged.schema_type, Some(SchemaType::Integer));
        assert!(merged.is_valid_by_exclusion());
        assert_eq!(merged.pointer(), "/b");
    }

    #[test]
    fn conflicting_types_mark_exclusion_and_keep_other() {
        let merged = merge(&typed("/a", SchemaType::String), &typed("/b", SchemaType::Object), &object("/b"));
        assert_eq!(merged.schema_type, Some(SchemaType::Object));
        assert!(!merged.is_valid_by_exclusion());
    }

    #[test]
    fn any_yields_the_other_kind() {
        for t in SchemaType::ALL {
            let merged = merge(&typed("/a", SchemaType::Any), &typed("/b", t), &object("/b"));
            assert_eq!(merged.schema_type, Some(t));
            assert!(merged.is_valid_by_exclusion());
        }
    }

    #[test]
    fn type_against_variants() {
        let mut variants = object("/v");
        variants.type_variants = Some(TypeSet::from([SchemaType::Number, SchemaType::String]));

        let merged = merge(&typed("/a", SchemaType::Integer), &variants, &object("/v"));
        assert_eq!(merged.schema_type, Some(SchemaType::Integer));

        let merged = merge(&typed("/a", SchemaType::Boolean), &variants, &object("/v"));
        assert!(!merged.is_valid_by_exclusion());

        let merged = merge(&typed("/a", SchemaType::StringNumber), &variants, &object("/v"));
        assert_eq!(merged.schema_type, None);
    }

    #[test]
    fn variant_sets_intersect() {
        let mut a = object("/a");
        a.type_variants = Some(TypeSet::from([SchemaType::Integer, SchemaType::Null, SchemaType::Boolean]));
        let mut b = object("/b");
        b.type_variants = Some(TypeSet::from([SchemaType::Number, SchemaType::Null]));
        let merged = merge(&a, &b, &b);
        assert_eq!(merged.type_variants, Some(TypeSet::from([SchemaType::Integer, SchemaType::Null])));
        assert!(merged.is_valid_by_exclusion());

        let mut c = object("/c");
        c.type_variants = Some(TypeSet::from([SchemaType::Object]));
        let merged = merge(&a, &c, &c);
        assert!(!merged.is_valid_by_exclusion());
    }

    #[test]
    fn properties_and_required_are_unioned() {
        let mut a = object("/a");
        a.properties.insert("x".into(), Arc::new(typed("/a/properties/x", SchemaType::Number)));
        a.required = Some(BTreeSet::from(["x".to_string()]));
        let mut b = object("/b");
        b.properties.insert("x".into(), Arc::new(typed("/b/properties/x", SchemaType::Integer)));
        b.properties.insert("y".into(), Arc::new(object("/b/properties/y")));
        b.required = Some(BTreeSet::from(["y".to_string()]));

        let merged = merge(&a, &b, &b);
        let names: Vec<&str> = merged.properties.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(merged.properties["x"].schema_type, Some(SchemaType::Integer));
        assert_eq!(merged.properties["x"].pointer(), "/b/properties/x");
        assert_eq!(merged.required, Some(BTreeSet::from(["x".to_string(), "y".to_string()])));

        let only_base = merge(&a, &object("/c"), &object("/c"));
        assert_eq!(only_base.required, Some(BTreeSet::from(["x".to_string()])));
    }

    #[test]
    fn ref_follows_other_and_lists_concatenate() {
        let mut a = object("/a");
        a.reference = Some("#/definitions/a".into());
        a.any_of = Some(vec![Arc::new(object("/a/anyOf/0"))]);
        let mut b = object("/b");
        b.any_of = Some(vec![Arc::new(object("/b/anyOf/0"))]);

        let merged = merge(&a, &b, &b);
        assert_eq!(merged.reference, None);
        assert_eq!(merged.any_of.as_ref().map(Vec::len), Some(2));

        let merged = merge(&b, &a, &b);
        assert_eq!(merged.reference.as_deref(), Some("#/definitions/a"));
    }

    #[test]
    fn prohibition_is_attributed_to_its_declarer() {
        let mut a = object("/a");
        a.set_additional_properties_allowed(false);
        let merged = merge(&object("/b"), &a, &a);
        assert!(merged.has_own_extra_property_prohibition());
        let elsewhere = merge(&object("/b"), &a, &object("/b"));
        assert!(!elsewhere.has_own_extra_property_prohibition());
        assert!(!elsewhere.additional_properties_allowed());
    }
}
