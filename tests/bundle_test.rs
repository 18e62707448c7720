//! Integration tests for bundling.

use std::path::PathBuf;

use json_refs::{bundle, ParserOptions, RefError, Source};
use serde_json::{json, Value};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
    write_text(dir, name, &serde_json::to_string_pretty(value).unwrap())
}

fn write_text(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// Every `$ref` string in `value`.
fn refs_in(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect(value, &mut found);
    found
}

fn collect(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("$ref") {
                found.push(target.clone());
            }
            map.values().for_each(|child| collect(child, found));
        }
        Value::Array(items) => items.iter().for_each(|child| collect(child, found)),
        _ => {}
    }
}

fn assert_self_contained(value: &Value) {
    for target in refs_in(value) {
        assert!(target.starts_with('#'), "external $ref left behind: {}", target);
    }
}

// === Inlining Tests ===

mod inlining {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn root_reference_is_replaced_by_target() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "file.json", &json!({"$ref": "other.json#/defs/Person"}));
        write(&dir, "other.json", &json!({"defs": {"Person": {"type": "object"}}}));

        let bundled = bundle(&root, &ParserOptions::default()).unwrap();
        assert_eq!(bundled.value, json!({"type": "object"}));
        assert!(!bundled.circular);
    }

    #[test]
    fn one_copy_per_target() {
        let dir = TempDir::new().unwrap();
        let root = write(
            &dir,
            "root.json",
            &json!({
                "a": {"$ref": "f.json#/x"},
                "b": {"c": {"$ref": "f.json#/x"}}
            }),
        );
        write(&dir, "f.json", &json!({"x": {"type": "string", "minLength": 1}}));

        let bundled = bundle(&root, &ParserOptions::default()).unwrap();
        assert_eq!(
            bundled.value,
            json!({
                "a": {"type": "string", "minLength": 1},
                "b": {"c": {"$ref": "#/a"}}
            })
        );
    }

    #[test]
    fn definitions_hold_the_inlined_copy() {
        let dir = TempDir::new().unwrap();
        let root = write(
            &dir,
            "root.json",
            &json!({
                "properties": {"pet": {"$ref": "pet.json"}},
                "definitions": {"pet": {"$ref": "pet.json"}}
            }),
        );
        write(&dir, "pet.json", &json!({"type": "object"}));

        let bundled = bundle(&root, &ParserOptions::default()).unwrap();
        assert_eq!(
            bundled.value,
            json!({
                "properties": {"pet": {"$ref": "#/definitions/pet"}},
                "definitions": {"pet": {"type": "object"}}
            })
        );
    }

    #[test]
    fn sub_path_points_into_parent_despite_sibling_names() {
        let dir = TempDir::new().unwrap();
        let root = write(
            &dir,
            "root.json",
            &json!({
                "a": {"$ref": "t.json#/Pet"},
                "b": {"$ref": "t.json#/Pet.v2"},
                "c": {"$ref": "t.json#/Pet/properties/name"}
            }),
        );
        write(
            &dir,
            "t.json",
            &json!({
                "Pet": {"properties": {"name": {"type": "string"}}},
                "Pet.v2": {"type": "object"}
            }),
        );

        let bundled = bundle(&root, &ParserOptions::default()).unwrap();
        assert_eq!(
            bundled.value,
            json!({
                "a": {"properties": {"name": {"type": "string"}}},
                "b": {"type": "object"},
                "c": {"$ref": "#/a/properties/name"}
            })
        );
    }

    #[test]
    fn reference_below_an_inlined_value_points_into_it() {
        let dir = TempDir::new().unwrap();
        let root = write(
            &dir,
            "root.json",
            &json!({"a": {"$ref": "defs.json"}, "b": {"$ref": "defs.json#/Person"}}),
        );
        write(&dir, "defs.json", &json!({"Person": {"type": "object"}}));

        let bundled = bundle(&root, &ParserOptions::default()).unwrap();
        assert_eq!(
            bundled.value,
            json!({"a": {"Person": {"type": "object"}}, "b": {"$ref": "#/a/Person"}})
        );
    }

    #[test]
    fn references_inside_external_documents_are_followed() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "root.json", &json!({"pet": {"$ref": "models/pet.json#/Pet"}}));
        write(
            &dir,
            "models/pet.json",
            &json!({
                "Pet": {"properties": {"tag": {"$ref": "#/Tag"}, "owner": {"$ref": "../person.json"}}},
                "Tag": {"type": "string"}
            }),
        );
        write(&dir, "person.json", &json!({"type": "object"}));

        let bundled = bundle(&root, &ParserOptions::default()).unwrap();
        assert_eq!(
            bundled.value,
            json!({"pet": {"properties": {"tag": {"type": "string"}, "owner": {"type": "object"}}}})
        );
        assert_self_contained(&bundled.value);
    }

    #[test]
    fn extended_reference_keeps_its_extensions() {
        let dir = TempDir::new().unwrap();
        let root = write(
            &dir,
            "root.json",
            &json!({"a": {"$ref": "other.json#/Pet", "description": "mine"}}),
        );
        write(
            &dir,
            "other.json",
            &json!({"Pet": {"type": "object", "description": "theirs"}}),
        );

        let bundled = bundle(&root, &ParserOptions::default()).unwrap();
        assert_eq!(
            bundled.value,
            json!({"a": {"description": "mine", "type": "object"}})
        );
    }

    #[test]
    fn extended_reference_into_other_document_resolves_there() {
        let dir = TempDir::new().unwrap();
        let root = write(
            &dir,
            "root.json",
            &json!({"a": {"$ref": "other.json#/B", "description": "mine"}}),
        );
        write(
            &dir,
            "other.json",
            &json!({
                "B": {"properties": {"p": {"$ref": "#/C"}}},
                "C": {"type": "integer"}
            }),
        );

        let bundled = bundle(&root, &ParserOptions::default()).unwrap();
        assert_eq!(
            bundled.value,
            json!({"a": {"description": "mine", "properties": {"p": {"type": "integer"}}}})
        );
    }

    #[test]
    fn yaml_documents() {
        let dir = TempDir::new().unwrap();
        let root = write_text(
            &dir,
            "api.yaml",
            "components:\n  schemas:\n    Pet:\n      $ref: 'schemas.yaml#/Pet'\n",
        );
        write_text(&dir, "schemas.yaml", "Pet:\n  type: object\n  required: [name]\n");

        let bundled = bundle(&root, &ParserOptions::default()).unwrap();
        assert_eq!(
            bundled.value,
            json!({"components": {"schemas": {"Pet": {"type": "object", "required": ["name"]}}}})
        );
    }
}

// === Internal Reference Tests ===

mod internal_references {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn internal_references_are_kept() {
        let schema = json!({
            "properties": {"owner": {"$ref": "#/definitions/person"}},
            "definitions": {"person": {"type": "object"}}
        });

        let bundled = bundle(schema.clone(), &ParserOptions::default()).unwrap();
        assert_eq!(bundled.value, schema);
    }

    #[test]
    fn bundling_a_bundle_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let root = write(
            &dir,
            "root.json",
            &json!({"a": {"$ref": "f.json#/x"}, "b": [{"$ref": "f.json#/x"}]}),
        );
        write(&dir, "f.json", &json!({"x": {"type": "integer"}}));

        let first = bundle(&root, &ParserOptions::default()).unwrap();
        let second = bundle(first.value.clone(), &ParserOptions::default()).unwrap();
        assert_eq!(second.value, first.value);
    }

    #[test]
    fn external_references_left_when_disabled() {
        let schema = json!({"a": {"$ref": "elsewhere.json#/x"}, "b": {"$ref": "#/a"}});

        let bundled = bundle(schema.clone(), &ParserOptions::default().external(false)).unwrap();
        assert_eq!(bundled.value, schema);
    }
}

// === Circular Reference Tests ===

mod circular {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cycle_across_documents_points_back_into_bundle() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "root.json", &json!({"a": {"$ref": "other.json#/Node"}}));
        write(
            &dir,
            "other.json",
            &json!({"Node": {"properties": {"next": {"$ref": "#/Node"}}}}),
        );

        let bundled = bundle(&root, &ParserOptions::default()).unwrap();
        assert_eq!(
            bundled.value,
            json!({"a": {"properties": {"next": {"$ref": "#/a"}}}})
        );
        assert!(bundled.circular);
        assert!(bundled.refs.circular());
    }

    #[test]
    fn internal_cycle_is_flagged() {
        let schema = json!({"node": {"properties": {"next": {"$ref": "#/node"}}}});

        let bundled = bundle(schema.clone(), &ParserOptions::default()).unwrap();
        assert_eq!(bundled.value, schema);
        assert!(bundled.circular);
    }

    #[test]
    fn documents_referencing_each_other() {
        let dir = TempDir::new().unwrap();
        let root = write(
            &dir,
            "root.json",
            &json!({"person": {"$ref": "person.json"}}),
        );
        write(
            &dir,
            "person.json",
            &json!({"properties": {"pets": {"items": {"$ref": "pet.json"}}}}),
        );
        write(
            &dir,
            "pet.json",
            &json!({"properties": {"owner": {"$ref": "person.json"}}}),
        );

        let bundled = bundle(&root, &ParserOptions::default()).unwrap();
        assert_self_contained(&bundled.value);
        assert_eq!(
            bundled.value,
            json!({
                "person": {"properties": {"pets": {"items": {
                    "properties": {"owner": {"$ref": "#/person"}}
                }}}}
            })
        );
    }
}

// === Error Tests ===

mod errors {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn broken_pointer_into_other_document() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "root.json", &json!({"a": {"$ref": "other.json#/defs/Missing"}}));
        write(&dir, "other.json", &json!({"defs": {}}));

        match bundle(&root, &ParserOptions::default()).unwrap_err() {
            RefError::BrokenPointer { token, .. } => assert_eq!(token, "Missing"),
            other => panic!("expected broken pointer, got {:?}", other),
        }
    }

    #[test]
    fn missing_document() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "root.json", &json!({"a": {"$ref": "gone.json"}}));

        let err = bundle(&root, &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, RefError::UnresolvedReference { .. }));
    }

    #[test]
    fn invalid_root() {
        let err = bundle(Source::from(json!(true)), &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, RefError::InvalidRoot { .. }));
    }
}
