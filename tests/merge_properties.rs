use std::collections::BTreeSet;

use cirjson_schema::reader::read_value;
use cirjson_schema::schema::{FileId, Schema, SchemaObject, SchemaType, merge};
use proptest::prelude::*;
use serde_json::{Value, json};

fn kind() -> impl Strategy<Value = SchemaType> {
    prop_oneof![
        Just(SchemaType::String),
        Just(SchemaType::Number),
        Just(SchemaType::Integer),
        Just(SchemaType::Boolean),
        Just(SchemaType::Null),
        Just(SchemaType::Object),
        Just(SchemaType::Array),
    ]
}

fn object_schema(idx: usize, names: &BTreeSet<String>, required: &BTreeSet<String>) -> Schema {
    let properties: serde_json::Map<String, Value> = names.iter().map(|n| (n.clone(), json!({}))).collect();
    read_value(
        FileId::new(format!("mem://prop/{idx}")),
        json!({"properties": properties, "required": required.iter().collect::<Vec<_>>()}),
    )
}

fn typed(kind: SchemaType) -> SchemaObject {
    let mut schema = SchemaObject::new(FileId::new("mem://typed"), "/");
    schema.schema_type = Some(kind);
    schema
}

proptest! {
    /// Chained merges keep every property and every required name.
    #[test]
    fn merge_unions_names(
        sets in prop::collection::vec(
            (prop::collection::btree_set("[a-e]{1,3}", 0..5), prop::collection::btree_set("[a-e]{1,3}", 0..3)),
            3,
        )
    ) {
        let schemas: Vec<Schema> = sets.iter().enumerate().map(|(i, (n, r))| object_schema(i, n, r)).collect();
        let ab = merge(&schemas[0], &schemas[1], &schemas[1]);
        let abc = merge(&ab, &schemas[2], &schemas[2]);

        let expected_names: BTreeSet<String> = sets.iter().flat_map(|(n, _)| n.iter().cloned()).collect();
        let names: BTreeSet<String> = abc.properties.keys().cloned().collect();
        prop_assert_eq!(names, expected_names);

        let expected_required: BTreeSet<String> = sets.iter().flat_map(|(_, r)| r.iter().cloned()).collect();
        let required: BTreeSet<String> = abc.required.clone().unwrap_or_default();
        prop_assert_eq!(required, expected_required);
    }

    /// `any` never constrains the other side.
    #[test]
    fn any_is_neutral(kind in kind()) {
        let merged = merge(&typed(SchemaType::Any), &typed(kind), &typed(kind));
        prop_assert_eq!(merged.schema_type, Some(kind));
        prop_assert!(merged.is_valid_by_exclusion());
    }

    /// Merging a kind with itself changes nothing.
    #[test]
    fn same_kind_is_idempotent(kind in kind()) {
        let merged = merge(&typed(kind), &typed(kind), &typed(kind));
        prop_assert_eq!(merged.schema_type, Some(kind));
        prop_assert!(merged.is_valid_by_exclusion());
    }
}
