use crate::error::{ResolveError, Result};
use crate::index::{FieldWeight, FuzzyIndex, IndexEntry, RankedCandidate};
use serde_json::Value;
use std::collections::BTreeSet;
use taskdeck_protocol::{normalize_member, MemberRecord};

/// How a reference was mapped to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    /// The reference was already an identifier; ranking was bypassed.
    Direct,
    Ranked,
}

#[derive(Debug, Clone)]
pub struct ResolvedMember {
    pub record: MemberRecord,
    pub score: f64,
    pub method: ResolutionMethod,
    pub matched: BTreeSet<String>,
    pub reasons: BTreeSet<String>,
}

/// Maps free-text member references (names, emails, usernames) onto
/// workspace members.
pub struct MemberResolver {
    members: Vec<MemberRecord>,
    index: FuzzyIndex,
    limit: usize,
}

impl MemberResolver {
    /// Build from raw member payloads; entries that fail to normalize are
    /// skipped.
    pub fn from_raw(raw_members: &[Value], limit: usize) -> Self {
        let members: Vec<MemberRecord> = raw_members.iter().filter_map(normalize_member).collect();
        if members.len() < raw_members.len() {
            log::debug!(
                "skipped {} member payloads without identifiers",
                raw_members.len() - members.len()
            );
        }
        let index = FuzzyIndex::build(members.iter().map(member_entry).collect());
        Self {
            members,
            index,
            limit: limit.max(1),
        }
    }

    pub fn members(&self) -> &[MemberRecord] {
        &self.members
    }

    pub fn rank(&self, query: &str) -> Vec<RankedCandidate> {
        self.index.rank(query, self.limit)
    }

    /// Resolve a reference to exactly one member. A direct identifier
    /// bypasses ranking; otherwise the tier ladder decides, failing as
    /// ambiguous when several members tie on an exact match.
    pub fn resolve(&self, reference: &str) -> Result<ResolvedMember> {
        let trimmed = reference.trim();
        if let Some(member) = self.members.iter().find(|m| m.id == trimmed) {
            return Ok(ResolvedMember {
                record: member.clone(),
                score: 0.0,
                method: ResolutionMethod::Direct,
                matched: BTreeSet::from([member.id.clone()]),
                reasons: BTreeSet::from(["direct".to_string()]),
            });
        }

        let ranked = self.index.rank(trimmed, self.limit.max(2));
        let Some(best) = ranked.first() else {
            return Err(ResolveError::NoMatch {
                what: "member",
                reference: trimmed.to_string(),
            });
        };
        if best.score == 0.0 {
            let exact: Vec<&RankedCandidate> =
                ranked.iter().filter(|c| c.score == 0.0).collect();
            if exact.len() > 1 {
                return Err(ResolveError::Ambiguous {
                    what: "member",
                    reference: trimmed.to_string(),
                    candidates: exact.iter().map(|c| c.display.clone()).collect(),
                });
            }
        }
        let record = self
            .members
            .iter()
            .find(|m| m.id == best.key)
            .cloned()
            .ok_or_else(|| ResolveError::NoMatch {
                what: "member",
                reference: trimmed.to_string(),
            })?;
        Ok(ResolvedMember {
            record,
            score: best.score,
            method: ResolutionMethod::Ranked,
            matched: best.matched.clone(),
            reasons: best.reasons.clone(),
        })
    }
}

fn member_entry(member: &MemberRecord) -> IndexEntry {
    let mut haystacks = vec![(member.display_name.clone(), FieldWeight::Primary)];
    if let Some(email) = &member.email {
        haystacks.push((email.clone(), FieldWeight::Secondary));
    }
    if let Some(username) = &member.username {
        haystacks.push((username.clone(), FieldWeight::Tertiary));
    }
    if !member.keywords.is_empty() {
        haystacks.push((member.keywords.join(" "), FieldWeight::Tertiary));
    }
    IndexEntry {
        key: member.id.clone(),
        display: member.display_name.clone(),
        identifiers: member.identifiers.clone(),
        haystacks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn resolver() -> MemberResolver {
        MemberResolver::from_raw(
            &[
                json!({"user": {"id": 1, "username": "jmarch", "email": "jo.march@corp.io", "name": "Jo March"}}),
                json!({"user": {"id": 2, "username": "amarch", "email": "amy.march@corp.io", "name": "Amy March"}}),
                json!({"user": {"id": 3, "username": "renee", "email": "renee@corp.io", "name": "Ren\u{00e9}e Durst"}}),
                json!({"not_a_member": true}),
            ],
            10,
        )
    }

    #[test]
    fn direct_id_bypasses_ranking() {
        let resolved = resolver().resolve("2").expect("resolve");
        assert_eq!(resolved.record.display_name, "Amy March");
        assert_eq!(resolved.method, ResolutionMethod::Direct);
        assert_eq!(resolved.score, 0.0);
        assert!(resolved.reasons.contains("direct"));
    }

    #[test]
    fn email_resolves_exactly() {
        let resolved = resolver().resolve("jo.march@corp.io").expect("resolve");
        assert_eq!(resolved.record.id, "1");
        assert_eq!(resolved.method, ResolutionMethod::Ranked);
        assert_eq!(resolved.score, 0.0);
    }

    #[test]
    fn diacritic_insensitive_name_resolution() {
        let resolved = resolver().resolve("renee durst").expect("resolve");
        assert_eq!(resolved.record.id, "3");
        assert_eq!(resolved.score, 0.0);
    }

    #[test]
    fn shared_surname_is_not_ambiguous_when_scores_differ() {
        // "jo march" hits member 1 exactly; member 2 only overlaps on
        // "march", so no ambiguity.
        let resolved = resolver().resolve("jo march").expect("resolve");
        assert_eq!(resolved.record.id, "1");
    }

    #[test]
    fn exact_tie_is_ambiguous() {
        let resolver = MemberResolver::from_raw(
            &[
                json!({"user": {"id": 1, "username": "sam", "name": "Sam Alpha"}}),
                json!({"user": {"id": 2, "username": "sam", "name": "Sam Beta"}}),
            ],
            10,
        );
        let err = resolver.resolve("sam").expect_err("ambiguous");
        match err {
            ResolveError::Ambiguous { candidates, .. } => {
                assert_eq!(candidates, vec!["Sam Alpha".to_string(), "Sam Beta".to_string()]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn unknown_reference_names_itself() {
        let err = resolver().resolve("nobody-here").expect_err("no match");
        assert_eq!(
            err.to_string(),
            "could not resolve member reference 'nobody-here'"
        );
    }
}
