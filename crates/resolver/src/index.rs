use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Matcher, Utf32String};
use std::collections::BTreeSet;
use taskdeck_protocol::{normalize_text, tokenize, Identifier};

pub const SCORE_EXACT: f64 = 0.0;
pub const SCORE_PREFIX: f64 = 0.02;
pub const SCORE_TOKEN_SUBSET: f64 = 0.05;
pub const SCORE_SUBSTRING: f64 = 0.08;
pub const SCORE_TOKEN_OVERLAP: f64 = 0.12;
/// Approximate matches always score worse than every heuristic tier.
const SCORE_FUZZY_FLOOR: f64 = 0.2;
const SCORE_FUZZY_SPAN: f64 = 0.8;

/// Relative weight of a free-text haystack in the approximate tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWeight {
    /// Display name.
    Primary,
    /// Email, description.
    Secondary,
    /// Username, keywords.
    Tertiary,
}

impl FieldWeight {
    fn factor(self) -> f64 {
        match self {
            FieldWeight::Primary => 1.0,
            FieldWeight::Secondary => 0.75,
            FieldWeight::Tertiary => 0.5,
        }
    }
}

/// One searchable record in the index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub key: String,
    pub display: String,
    pub identifiers: Vec<Identifier>,
    pub haystacks: Vec<(String, FieldWeight)>,
}

/// Candidate accumulated while ranking. Multiple signals may touch the
/// same record; the minimum score wins while matched values and reasons
/// are unioned.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub key: String,
    pub display: String,
    pub score: f64,
    pub matched: BTreeSet<String>,
    pub reasons: BTreeSet<String>,
}

/// Searchable structure over a record set, ranked by the tier ladder:
/// exact, prefix, token-subset, substring, token-overlap, then weighted
/// approximate similarity. Lower scores are better; zero is exact.
pub struct FuzzyIndex {
    entries: Vec<IndexEntry>,
}

impl FuzzyIndex {
    pub fn build(entries: Vec<IndexEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rank(&self, query: &str, limit: usize) -> Vec<RankedCandidate> {
        let normalized_query = normalize_text(query);
        if normalized_query.is_empty() || limit == 0 {
            return Vec::new();
        }
        let query_tokens = tokenize(query);
        let pattern = Pattern::parse(query, CaseMatching::Ignore, Normalization::Smart);
        let mut matcher = Matcher::new(nucleo_matcher::Config::DEFAULT);

        let mut scored: Vec<(RankedCandidate, Option<(u32, f64)>)> = Vec::new();
        let mut max_fuzzy: u32 = 0;
        for entry in &self.entries {
            let mut candidate = RankedCandidate {
                key: entry.key.clone(),
                display: entry.display.clone(),
                score: f64::INFINITY,
                matched: BTreeSet::new(),
                reasons: BTreeSet::new(),
            };
            for identifier in &entry.identifiers {
                score_identifier(identifier, &normalized_query, &query_tokens, &mut candidate);
            }

            let mut fuzzy_best: Option<(u32, f64)> = None;
            for (haystack, weight) in &entry.haystacks {
                let haystack = Utf32String::from(haystack.as_str());
                if let Some(raw) = pattern.score(haystack.slice(..), &mut matcher) {
                    let factor = weight.factor();
                    let better = fuzzy_best
                        .map_or(true, |(best, f)| (raw as f64) * factor > (best as f64) * f);
                    if better {
                        fuzzy_best = Some((raw, factor));
                    }
                }
            }
            if let Some((raw, _)) = fuzzy_best {
                max_fuzzy = max_fuzzy.max(raw);
            }
            if candidate.score.is_finite() || fuzzy_best.is_some() {
                scored.push((candidate, fuzzy_best));
            }
        }

        let mut ranked: Vec<RankedCandidate> = scored
            .into_iter()
            .map(|(mut candidate, fuzzy_best)| {
                if let Some((raw, factor)) = fuzzy_best {
                    let similarity = if max_fuzzy > 0 {
                        (raw as f64 / max_fuzzy as f64) * factor
                    } else {
                        0.0
                    };
                    let fuzzy_score =
                        SCORE_FUZZY_FLOOR + (1.0 - similarity.clamp(0.0, 1.0)) * SCORE_FUZZY_SPAN;
                    if fuzzy_score < candidate.score {
                        candidate.score = fuzzy_score;
                    }
                    candidate.reasons.insert("approximate".to_string());
                }
                candidate
            })
            .collect();

        ranked.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.display.cmp(&b.display))
        });
        ranked.truncate(limit);
        ranked
    }
}

fn score_identifier(
    identifier: &Identifier,
    normalized_query: &str,
    query_tokens: &[String],
    candidate: &mut RankedCandidate,
) {
    let id_norm = identifier.normalized.as_str();
    let source = identifier.source.as_str();
    let (score, reason) = if id_norm == normalized_query {
        (SCORE_EXACT, format!("exact:{source}"))
    } else if id_norm.starts_with(normalized_query) {
        (SCORE_PREFIX, format!("prefix:{source}"))
    } else if !query_tokens.is_empty()
        && query_tokens
            .iter()
            .all(|token| identifier.tokens.iter().any(|t| t == token))
    {
        (SCORE_TOKEN_SUBSET, format!("tokens:{source}"))
    } else if id_norm.contains(normalized_query) {
        (SCORE_SUBSTRING, format!("substring:{source}"))
    } else {
        let hit: Vec<&String> = query_tokens
            .iter()
            .filter(|token| identifier.tokens.iter().any(|t| &t == token))
            .collect();
        if hit.is_empty() {
            return;
        }
        let reason = hit
            .iter()
            .map(|token| format!("token:{token}"))
            .collect::<Vec<_>>()
            .join(",");
        (SCORE_TOKEN_OVERLAP, reason)
    };
    candidate.matched.insert(identifier.value.clone());
    candidate.reasons.insert(reason);
    if score < candidate.score {
        candidate.score = score;
    }
}
