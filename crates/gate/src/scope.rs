use serde_json::Value;
use std::collections::BTreeSet;
use taskdeck_protocol::string_field;

/// Scope identifiers the caller already knows, passed alongside the raw
/// input.
#[derive(Debug, Clone, Default)]
pub struct ScopeHints {
    pub space_ids: Vec<String>,
    pub list_ids: Vec<String>,
}

/// Space/list identifiers discovered for one write check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeSet {
    pub spaces: BTreeSet<String>,
    pub lists: BTreeSet<String>,
}

impl ScopeSet {
    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty() && self.lists.is_empty()
    }

    pub fn absorb_hints(&mut self, hints: &ScopeHints) {
        self.spaces.extend(hints.space_ids.iter().cloned());
        self.lists.extend(hints.list_ids.iter().cloned());
    }

    /// Stable, human-readable rendering for rejection messages.
    pub fn describe(&self) -> Vec<String> {
        self.spaces
            .iter()
            .map(|id| format!("space:{id}"))
            .chain(self.lists.iter().map(|id| format!("list:{id}")))
            .collect()
    }
}

/// A non-scope identifier that can be resolved upward to a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IndirectRef {
    Task(String),
    Document(String),
}

const ITEM_ARRAY_KEYS: [&str; 3] = ["tasks", "items", "entries"];

/// Read scope identifiers directly off the input: singular and plural
/// space/list fields, plus the same fields on entries of item arrays.
pub(crate) fn collect_direct_scopes(input: &Value, scopes: &mut ScopeSet) {
    collect_object_scopes(input, scopes);
    for key in ITEM_ARRAY_KEYS {
        if let Some(Value::Array(entries)) = input.get(key) {
            for entry in entries {
                collect_object_scopes(entry, scopes);
            }
        }
    }
}

fn collect_object_scopes(value: &Value, scopes: &mut ScopeSet) {
    if let Some(id) = string_field(value, &["spaceId", "space_id"]) {
        scopes.spaces.insert(id);
    }
    if let Some(id) = string_field(value, &["listId", "list_id"]) {
        scopes.lists.insert(id);
    }
    for key in ["spaceIds", "space_ids"] {
        extend_from_array(value.get(key), &mut scopes.spaces);
    }
    for key in ["listIds", "list_ids"] {
        extend_from_array(value.get(key), &mut scopes.lists);
    }
}

fn extend_from_array(value: Option<&Value>, into: &mut BTreeSet<String>) {
    let Some(Value::Array(entries)) = value else {
        return;
    };
    for entry in entries {
        match entry {
            Value::String(s) if !s.is_empty() => {
                into.insert(s.clone());
            }
            Value::Number(n) => {
                into.insert(n.to_string());
            }
            _ => {}
        }
    }
}

/// Task/parent-task/document identifiers usable for upward resolution when
/// the input names no scope directly. Order-preserving, deduplicated.
pub(crate) fn collect_indirect_refs(input: &Value) -> Vec<IndirectRef> {
    let mut refs = Vec::new();
    collect_object_refs(input, &mut refs);
    for key in ITEM_ARRAY_KEYS {
        if let Some(Value::Array(entries)) = input.get(key) {
            for entry in entries {
                collect_object_refs(entry, &mut refs);
            }
        }
    }
    refs
}

fn collect_object_refs(value: &Value, refs: &mut Vec<IndirectRef>) {
    for key in ["taskId", "task_id", "parentTaskId", "parent_task_id", "parent"] {
        if let Some(id) = string_field(value, &[key]) {
            push_unique(refs, IndirectRef::Task(id));
        }
    }
    for key in ["documentId", "document_id", "docId", "doc_id"] {
        if let Some(id) = string_field(value, &[key]) {
            push_unique(refs, IndirectRef::Document(id));
        }
    }
}

fn push_unique(refs: &mut Vec<IndirectRef>, candidate: IndirectRef) {
    if !refs.contains(&candidate) {
        refs.push(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn direct_scopes_cover_singular_plural_and_item_arrays() {
        let input = json!({
            "spaceId": "space-1",
            "listIds": ["list-1", 22],
            "tasks": [
                {"listId": "list-3", "name": "a"},
                {"space_id": "space-2"}
            ]
        });
        let mut scopes = ScopeSet::default();
        collect_direct_scopes(&input, &mut scopes);
        assert_eq!(
            scopes.spaces,
            BTreeSet::from(["space-1".to_string(), "space-2".to_string()])
        );
        assert_eq!(
            scopes.lists,
            BTreeSet::from(["list-1".to_string(), "22".to_string(), "list-3".to_string()])
        );
    }

    #[test]
    fn indirect_refs_dedupe_and_keep_order() {
        let input = json!({
            "taskId": "86dt2abc",
            "parent": "86dt2abd",
            "tasks": [{"task_id": "86dt2abc"}, {"documentId": "doc-1"}]
        });
        let refs = collect_indirect_refs(&input);
        assert_eq!(
            refs,
            vec![
                IndirectRef::Task("86dt2abc".to_string()),
                IndirectRef::Task("86dt2abd".to_string()),
                IndirectRef::Document("doc-1".to_string()),
            ]
        );
    }

    #[test]
    fn describe_is_stable() {
        let mut scopes = ScopeSet::default();
        scopes.spaces.insert("s2".into());
        scopes.spaces.insert("s1".into());
        scopes.lists.insert("l1".into());
        assert_eq!(scopes.describe(), vec!["space:s1", "space:s2", "list:l1"]);
    }
}
