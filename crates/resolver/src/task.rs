use crate::error::{ResolveError, Result};
use crate::index::{FieldWeight, FuzzyIndex, IndexEntry, RankedCandidate};
use crate::member::ResolutionMethod;
use serde_json::Value;
use std::collections::BTreeSet;
use taskdeck_protocol::{
    is_standard_task_id, normalize_task, normalize_text, tokenize, Identifier, IdentifierSource,
    TaskRecord,
};

#[derive(Debug, Clone)]
pub struct ResolvedTask {
    pub record: TaskRecord,
    pub score: f64,
    pub method: ResolutionMethod,
    pub matched: BTreeSet<String>,
    pub reasons: BTreeSet<String>,
}

/// Searchable index over one page of tasks, for "find task by name within
/// this list" lookups.
pub struct TaskIndex {
    tasks: Vec<TaskRecord>,
    index: FuzzyIndex,
}

impl TaskIndex {
    /// Build from raw task payloads; entries that fail to normalize are
    /// skipped.
    pub fn from_raw(raw_tasks: &[Value]) -> Self {
        let tasks: Vec<TaskRecord> = raw_tasks.iter().filter_map(normalize_task).collect();
        let index = FuzzyIndex::build(tasks.iter().map(task_entry).collect());
        Self { tasks, index }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn rank(&self, query: &str, limit: usize) -> Vec<RankedCandidate> {
        self.index.rank(query, limit)
    }

    /// Resolve a reference to exactly one task on this page. References
    /// shaped like a standard task id bypass ranking when present.
    pub fn resolve(&self, reference: &str) -> Result<ResolvedTask> {
        let trimmed = reference.trim();
        if is_standard_task_id(trimmed) {
            if let Some(task) = self.tasks.iter().find(|t| t.id == trimmed) {
                return Ok(ResolvedTask {
                    record: task.clone(),
                    score: 0.0,
                    method: ResolutionMethod::Direct,
                    matched: BTreeSet::from([task.id.clone()]),
                    reasons: BTreeSet::from(["direct".to_string()]),
                });
            }
        }

        let ranked = self.index.rank(trimmed, 10);
        let Some(best) = ranked.first() else {
            return Err(ResolveError::NoMatch {
                what: "task",
                reference: trimmed.to_string(),
            });
        };
        if best.score == 0.0 {
            let exact: Vec<&RankedCandidate> = ranked.iter().filter(|c| c.score == 0.0).collect();
            if exact.len() > 1 {
                return Err(ResolveError::Ambiguous {
                    what: "task",
                    reference: trimmed.to_string(),
                    candidates: exact.iter().map(|c| c.display.clone()).collect(),
                });
            }
        }
        let record = self
            .tasks
            .iter()
            .find(|t| t.id == best.key)
            .cloned()
            .ok_or_else(|| ResolveError::NoMatch {
                what: "task",
                reference: trimmed.to_string(),
            })?;
        Ok(ResolvedTask {
            record,
            score: best.score,
            method: ResolutionMethod::Ranked,
            matched: best.matched.clone(),
            reasons: best.reasons.clone(),
        })
    }
}

fn task_entry(task: &TaskRecord) -> IndexEntry {
    let identifiers = vec![
        Identifier {
            value: task.id.clone(),
            source: IdentifierSource::Id,
            normalized: normalize_text(&task.id),
            tokens: tokenize(&task.id),
        },
        Identifier {
            value: task.name.clone(),
            source: IdentifierSource::DisplayName,
            normalized: normalize_text(&task.name),
            tokens: tokenize(&task.name),
        },
    ];
    let mut haystacks = vec![(task.name.clone(), FieldWeight::Primary)];
    if let Some(description) = &task.description {
        haystacks.push((description.clone(), FieldWeight::Secondary));
    }
    IndexEntry {
        key: task.id.clone(),
        display: task.name.clone(),
        identifiers,
        haystacks,
    }
}
