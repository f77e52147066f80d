use crate::records::{Identifier, IdentifierSource, MemberRecord, TaskRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static STANDARD_TASK_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-z]{7,12}$").expect("valid task id pattern"));

/// Whether a reference already looks like a standard upstream task id.
pub fn is_standard_task_id(reference: &str) -> bool {
    STANDARD_TASK_ID.is_match(reference.trim())
}

/// Lowercase, Unicode-decompose dropping combining marks, collapse
/// whitespace runs to single spaces.
pub fn normalize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for ch in input.nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        for lower in ch.to_lowercase() {
            out.push(lower);
        }
    }
    out
}

/// Split normalized text into tokens, dropping non-alphanumerics.
pub fn tokenize(input: &str) -> Vec<String> {
    normalize_text(input)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// First non-empty string (or number, stringified) found under any of the
/// given keys. Upstream payloads mix camelCase and snake_case freely.
pub fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match value.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// Normalize a raw upstream task payload into a [`TaskRecord`].
///
/// Returns `None` when no identifier can be found; shape surprises never
/// error.
pub fn normalize_task(raw: &Value) -> Option<TaskRecord> {
    let id = string_field(raw, &["id", "task_id", "taskId"])?;
    let name = string_field(raw, &["name", "title"]).unwrap_or_else(|| id.clone());
    let list = raw.get("list");
    let list_id = string_field(raw, &["list_id", "listId"])
        .or_else(|| list.and_then(|l| string_field(l, &["id"])));
    let list_name = string_field(raw, &["list_name", "listName"])
        .or_else(|| list.and_then(|l| string_field(l, &["name"])));
    let list_url = string_field(raw, &["list_url", "listUrl"])
        .or_else(|| list.and_then(|l| string_field(l, &["url"])));
    let status = match raw.get("status") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(nested @ Value::Object(_)) => string_field(nested, &["status", "name"]),
        _ => None,
    };
    Some(TaskRecord {
        id,
        name,
        description: string_field(raw, &["description", "text_content", "textContent"]),
        status,
        updated_at: string_field(raw, &["date_updated", "dateUpdated", "updated_at", "updatedAt"]),
        list_id,
        list_name,
        list_url,
        url: string_field(raw, &["url"]),
    })
}

/// Normalize a raw member payload, harvesting every identifier the nested
/// user/profile fields yield. Duplicate `(source, normalized)` pairs are
/// dropped. Returns `None` when the payload carries no identifier.
pub fn normalize_member(raw: &Value) -> Option<MemberRecord> {
    let user = raw.get("user").unwrap_or(raw);
    let id = string_field(user, &["id", "user_id", "userId"])?;
    let username = string_field(user, &["username", "user_name", "userName"]);
    let email = string_field(user, &["email"]);
    let full_name = string_field(user, &["name", "display_name", "displayName", "full_name"]);
    let display_name = full_name
        .clone()
        .or_else(|| username.clone())
        .or_else(|| email.clone())
        .unwrap_or_else(|| id.clone());

    let mut harvest = IdentifierHarvest::default();
    harvest.push(IdentifierSource::Id, &id);
    if let Some(name) = &full_name {
        harvest.push(IdentifierSource::DisplayName, name);
    }
    if let Some(username) = &username {
        harvest.push(IdentifierSource::Username, username);
    }
    if let Some(email) = &email {
        harvest.push(IdentifierSource::Email, email);
        // the local part alone is a common way to refer to a teammate
        if let Some(local) = email.split('@').next() {
            harvest.push(IdentifierSource::Email, local);
        }
    }
    if let Some(initials) = string_field(user, &["initials"]) {
        harvest.push(IdentifierSource::Initials, &initials);
    }
    for profile_key in ["profile", "profileInfo", "profile_info"] {
        if let Some(profile) = user.get(profile_key) {
            for key in ["display_profile", "displayProfile", "nickname", "title", "role_name"] {
                if let Some(value) = string_field(profile, &[key]) {
                    harvest.push(IdentifierSource::Profile, &value);
                }
            }
        }
    }

    let mut keywords: Vec<String> = Vec::new();
    let mut seen_keywords = HashSet::new();
    for identifier in &harvest.out {
        for token in &identifier.tokens {
            if seen_keywords.insert(token.clone()) {
                keywords.push(token.clone());
            }
        }
    }

    Some(MemberRecord {
        id,
        display_name,
        email,
        username,
        identifiers: harvest.out,
        keywords,
        raw: raw.clone(),
    })
}

#[derive(Default)]
struct IdentifierHarvest {
    seen: HashSet<(IdentifierSource, String)>,
    out: Vec<Identifier>,
}

impl IdentifierHarvest {
    fn push(&mut self, source: IdentifierSource, value: &str) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return;
        }
        let normalized = normalize_text(trimmed);
        if normalized.is_empty() {
            return;
        }
        if !self.seen.insert((source, normalized.clone())) {
            return;
        }
        self.out.push(Identifier {
            value: trimmed.to_string(),
            source,
            normalized,
            tokens: tokenize(trimmed),
        });
    }
}
