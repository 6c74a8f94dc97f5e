//! JSON Patch construction
//!
//! Builds RFC 6902 operations that add init containers and set the injection
//! annotation. Operations are replayed in order against the original pod.

use std::collections::BTreeMap;

use json_patch::{AddOperation, PatchOperation, ReplaceOperation};
use jsonptr::{Pointer, PointerBuf};
use k8s_openapi::api::core::v1::Container;
use serde_json::Value;

use crate::Result;

/// Pointer to a pod's `spec.initContainers`
pub fn init_containers_path() -> PointerBuf {
    PointerBuf::from_tokens(["spec", "initContainers"])
}

/// Pointer to a pod's `metadata.annotations`
pub fn annotations_path() -> PointerBuf {
    PointerBuf::from_tokens(["metadata", "annotations"])
}

/// Emit `add` operations inserting `to_add` into the array at `base_path`
///
/// When `existing` is empty the array does not exist yet, so the first
/// container creates it with `add base_path [c1]`. Every following container
/// is appended at `base_path/-`, and the value of each append is the running
/// list of everything added so far (`[c1, c2]`, `[c1, c2, c3]`, ...).
pub fn add_containers(
    existing: &[Container],
    to_add: &[Container],
    base_path: &Pointer,
) -> Result<Vec<PatchOperation>> {
    let mut ops = Vec::with_capacity(to_add.len());
    let mut running: Vec<Value> = Vec::with_capacity(to_add.len());
    let mut first = existing.is_empty();

    for container in to_add {
        running.push(serde_json::to_value(container)?);

        let path = if first {
            first = false;
            base_path.to_buf()
        } else {
            let mut path = base_path.to_buf();
            path.push_back("-");
            path
        };

        ops.push(PatchOperation::Add(AddOperation {
            path,
            value: Value::Array(running.clone()),
        }));
    }

    Ok(ops)
}

/// Emit operations setting every entry of `to_add` as an annotation
///
/// A key that is absent (or empty) in `existing` is written with
/// `add /metadata/annotations {key: value}`; a key with a value is
/// overwritten with `replace /metadata/annotations/<key>`. Keys are handled
/// in ascending order.
pub fn update_annotations(
    existing: Option<&BTreeMap<String, String>>,
    to_add: &BTreeMap<String, String>,
) -> Vec<PatchOperation> {
    to_add
        .iter()
        .map(|(key, value)| {
            let present = existing
                .and_then(|annotations| annotations.get(key))
                .is_some_and(|v| !v.is_empty());

            if present {
                let mut path = annotations_path();
                path.push_back(key.as_str());
                PatchOperation::Replace(ReplaceOperation {
                    path,
                    value: Value::String(value.clone()),
                })
            } else {
                PatchOperation::Add(AddOperation {
                    path: annotations_path(),
                    value: serde_json::json!({ key.as_str(): value }),
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_test_container(name: &str) -> Container {
        Container {
            name: name.to_string(),
            image: Some("busybox".to_string()),
            ..Default::default()
        }
    }

    fn names(value: &Value) -> Vec<&str> {
        value
            .as_array()
            .expect("value should be an array")
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect()
    }

    fn single(key: &str, value: &str) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(key.to_string(), value.to_string());
        map
    }

    // =========================================================================
    // add_containers
    // =========================================================================

    #[test]
    fn test_add_containers_to_empty_list() {
        let c1 = make_test_container("c1");
        let c2 = make_test_container("c2");

        let ops = add_containers(&[], &[c1, c2], &init_containers_path()).unwrap();
        assert_eq!(ops.len(), 2);

        match &ops[0] {
            PatchOperation::Add(a) => {
                assert_eq!(a.path.as_str(), "/spec/initContainers");
                assert_eq!(names(&a.value), vec!["c1"]);
            }
            other => panic!("expected add, got {other:?}"),
        }
        match &ops[1] {
            PatchOperation::Add(a) => {
                assert_eq!(a.path.as_str(), "/spec/initContainers/-");
                assert_eq!(names(&a.value), vec!["c1", "c2"]);
            }
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn test_add_containers_to_existing_list_appends() {
        let existing = vec![make_test_container("existing")];
        let to_add = vec![make_test_container("c1"), make_test_container("c2")];

        let ops = add_containers(&existing, &to_add, &init_containers_path()).unwrap();

        let paths: Vec<&str> = ops
            .iter()
            .map(|op| match op {
                PatchOperation::Add(a) => a.path.as_str(),
                other => panic!("expected add, got {other:?}"),
            })
            .collect();
        assert_eq!(paths, vec!["/spec/initContainers/-", "/spec/initContainers/-"]);

        if let PatchOperation::Add(a) = &ops[1] {
            assert_eq!(names(&a.value), vec!["c1", "c2"]);
        }
    }

    #[test]
    fn test_add_nothing_emits_nothing() {
        let ops = add_containers(&[], &[], &init_containers_path()).unwrap();
        assert!(ops.is_empty());
    }

    #[test]
    fn test_add_containers_custom_base_path() {
        let base = PointerBuf::from_tokens(["spec", "template", "spec", "initContainers"]);
        let ops = add_containers(&[], &[make_test_container("c1")], &base).unwrap();

        let json = serde_json::to_value(json_patch::Patch(ops)).unwrap();
        assert_eq!(json[0]["op"], "add");
        assert_eq!(json[0]["path"], "/spec/template/spec/initContainers");
    }

    // =========================================================================
    // update_annotations
    // =========================================================================

    #[test]
    fn test_update_annotations_without_existing_map() {
        let ops = update_annotations(None, &single("k", "v"));
        let json = serde_json::to_value(json_patch::Patch(ops)).unwrap();

        assert_eq!(
            json,
            json!([{ "op": "add", "path": "/metadata/annotations", "value": { "k": "v" } }])
        );
    }

    #[test]
    fn test_update_annotations_replaces_existing_value() {
        let existing = single("k", "old");
        let ops = update_annotations(Some(&existing), &single("k", "v"));
        let json = serde_json::to_value(json_patch::Patch(ops)).unwrap();

        assert_eq!(
            json,
            json!([{ "op": "replace", "path": "/metadata/annotations/k", "value": "v" }])
        );
    }

    #[test]
    fn test_update_annotations_empty_value_counts_as_absent() {
        let existing = single("k", "");
        let ops = update_annotations(Some(&existing), &single("k", "v"));
        assert!(matches!(&ops[0], PatchOperation::Add(a) if a.path == annotations_path()));
    }

    #[test]
    fn test_update_annotations_absent_key_in_existing_map() {
        let existing = single("other", "x");
        let ops = update_annotations(Some(&existing), &single("k", "v"));

        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], PatchOperation::Add(a) if a.path == annotations_path()));
    }

    #[test]
    fn test_update_annotations_escapes_key() {
        let key = crate::INJECTION_STATUS_ANNOTATION;
        let existing = single(key, "pending");
        let ops = update_annotations(Some(&existing), &single(key, "injected"));

        match &ops[0] {
            PatchOperation::Replace(r) => assert_eq!(
                r.path.as_str(),
                "/metadata/annotations/volume-permissions-container-injector-webhook.malston.me~1status"
            ),
            other => panic!("expected replace, got {other:?}"),
        }
    }

    /// Story: Annotation patches are reproducible
    ///
    /// Two runs over the same input produce byte-identical patches, whatever
    /// order the keys were inserted in.
    #[test]
    fn story_annotation_order_is_deterministic() {
        let mut a = BTreeMap::new();
        a.insert("zeta".to_string(), "1".to_string());
        a.insert("alpha".to_string(), "2".to_string());

        let mut b = BTreeMap::new();
        b.insert("alpha".to_string(), "2".to_string());
        b.insert("zeta".to_string(), "1".to_string());

        let pa = serde_json::to_string(&json_patch::Patch(update_annotations(None, &a))).unwrap();
        let pb = serde_json::to_string(&json_patch::Patch(update_annotations(None, &b))).unwrap();
        assert_eq!(pa, pb);

        let first_key = update_annotations(None, &a)
            .into_iter()
            .next()
            .and_then(|op| match op {
                PatchOperation::Add(add) => add.value.as_object().cloned(),
                _ => None,
            })
            .unwrap();
        assert!(first_key.contains_key("alpha"));
    }
}
