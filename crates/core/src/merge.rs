//! Document merging: schema migration by deep merge onto defaults, and
//! reconciliation of a remote snapshot into the local document.

use crate::document::ProgressDocument;
use crate::module_num::ModuleNum;
use crate::remote::RemoteProgressRecord;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Errors from merging a raw value onto the default document.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The payload is not a JSON object
    #[error("progress payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// The merged value does not fit the document shape
    #[error("progress payload does not match the document shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Recursively merge `source` onto `target`.
///
/// Objects merge key by key; every other value (arrays and nulls included)
/// from `source` replaces the one in `target`.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target), Value::Object(source)) => {
            for (key, value) in source {
                let merged = match value {
                    Value::Object(_) => {
                        let base = match target.remove(&key) {
                            Some(existing @ Value::Object(_)) => existing,
                            _ => Value::Object(Map::new()),
                        };
                        deep_merge(base, value)
                    }
                    other => other,
                };
                target.insert(key, merged);
            }
            Value::Object(target)
        }
        (_, source) => source,
    }
}

/// Merge a raw persisted or imported payload onto the default document.
///
/// Every default key is guaranteed present afterwards and every payload key
/// overrides its default, so documents written by older schema versions
/// load cleanly.
pub fn merge_onto_defaults(payload: Value) -> Result<ProgressDocument, MergeError> {
    if !payload.is_object() {
        return Err(MergeError::NotAnObject(json_kind(&payload)));
    }
    let defaults = serde_json::to_value(ProgressDocument::default())?;
    let merged = deep_merge(defaults, payload);
    Ok(serde_json::from_value(merged)?)
}

/// Fold remote records into the local document.
///
/// For each module the server knows about: the server's `completed` flag
/// wins outright (and may regress a local completion), `unlocked` is
/// derived from the server's record of the predecessor, and sections are
/// a shallow union with remote keys overriding local ones.
///
/// Modules absent remotely keep their local state, except that one whose
/// predecessor ends up completed is unlocked.
pub fn merge_remote(doc: &mut ProgressDocument, remote: &BTreeMap<ModuleNum, RemoteProgressRecord>) {
    for n in ModuleNum::all() {
        let Some(record) = remote.get(&n) else {
            continue;
        };

        let unlocked = match n.prev() {
            None => true,
            Some(prev) => remote.get(&prev).is_some_and(|r| r.completed),
        };

        let module = doc.module_mut(n);
        module.completed = record.completed;
        module.unlocked = unlocked;
        module.sections.extend(
            record
                .section_data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    for n in ModuleNum::all().filter(|n| !remote.contains_key(n)) {
        if n.prev().is_some_and(|prev| doc.module(prev).completed) {
            doc.module_mut(n).unlocked = true;
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{SectionValue, Sections};
    use serde_json::json;

    fn m(n: u8) -> ModuleNum {
        ModuleNum::new(n).unwrap()
    }

    fn record(n: u8, completed: bool, sections: Sections) -> (ModuleNum, RemoteProgressRecord) {
        (
            m(n),
            RemoteProgressRecord {
                module_num: n,
                section_data: sections,
                completed,
                completed_at: None,
            },
        )
    }

    #[test]
    fn test_deep_merge_semantics() {
        let target = json!({"a": {"x": 1, "y": 2}, "list": [1, 2], "keep": true});
        let source = json!({"a": {"y": 3}, "list": [9], "new": null});
        assert_eq!(
            deep_merge(target, source),
            json!({"a": {"x": 1, "y": 3}, "list": [9], "keep": true, "new": null})
        );
    }

    #[test]
    fn test_empty_object_yields_defaults() {
        let doc = merge_onto_defaults(json!({})).unwrap();
        assert_eq!(doc, ProgressDocument::default());
    }

    #[test]
    fn test_old_schema_gains_new_keys() {
        let old = json!({
            "studentName": "Ada",
            "module1": {"completed": true, "sections": {"elementMixerCompleted": true}},
            "module2": {"unlocked": true}
        });
        let doc = merge_onto_defaults(old).unwrap();
        assert_eq!(doc.student_name, "Ada");
        assert!(doc.module(m(1)).completed);
        assert!(doc.module(m(1)).unlocked);
        assert_eq!(doc.module(m(1)).sections["section1Read"], SectionValue::Flag(false));
        assert!(doc.module(m(2)).unlocked);
        assert_eq!(doc.module(m(2)).sections["quizScore"], SectionValue::score(0));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(matches!(
            merge_onto_defaults(json!([1, 2])),
            Err(MergeError::NotAnObject("an array"))
        ));
        assert!(matches!(
            merge_onto_defaults(json!({"overallProgress": "lots"})),
            Err(MergeError::Shape(_))
        ));
    }

    #[test]
    fn test_remote_merge_scenario() {
        let mut doc = ProgressDocument::default();
        doc.module_mut(m(1)).completed = true;
        doc.module_mut(m(2)).unlocked = true;

        let remote: BTreeMap<_, _> = [
            record(1, true, Sections::new()),
            record(2, true, [("quizPassed".to_string(), SectionValue::Flag(true))].into()),
        ]
        .into();

        merge_remote(&mut doc, &remote);

        let m2 = doc.module(m(2));
        assert!(m2.completed);
        assert!(m2.unlocked);
        assert!(m2.flag("quizPassed"));
        assert_eq!(m2.sections["quizScore"], SectionValue::score(0));

        // no remote record for module 3, but its predecessor is now done
        assert!(doc.module(m(3)).unlocked);
        assert!(!doc.module(m(4)).unlocked);
    }

    #[test]
    fn test_remote_completion_can_regress() {
        let mut doc = ProgressDocument::default();
        doc.module_mut(m(1)).completed = true;
        doc.module_mut(m(2)).unlocked = true;
        doc.module_mut(m(2)).completed = true;

        let remote: BTreeMap<_, _> = [
            record(1, true, Sections::new()),
            record(2, false, Sections::new()),
        ]
        .into();
        merge_remote(&mut doc, &remote);

        assert!(!doc.module(m(2)).completed);
        assert!(doc.module(m(2)).unlocked);
    }

    #[test]
    fn test_unlock_derived_from_remote_predecessor() {
        let mut doc = ProgressDocument::default();
        doc.module_mut(m(3)).unlocked = true;

        // server has module 3 but no module 2 record
        let remote: BTreeMap<_, _> = [record(3, false, Sections::new())].into();
        merge_remote(&mut doc, &remote);
        assert!(!doc.module(m(3)).unlocked);
    }

    #[test]
    fn test_remote_merge_idempotent() {
        let remote: BTreeMap<_, _> = [
            record(1, true, [("elementMixerCompleted".to_string(), SectionValue::Flag(true))].into()),
            record(2, false, [("quizScore".to_string(), SectionValue::score(55))].into()),
        ]
        .into();

        let mut once = ProgressDocument::default();
        merge_remote(&mut once, &remote);

        let mut twice = once.clone();
        merge_remote(&mut twice, &remote);

        assert_eq!(once, twice);
    }
}
