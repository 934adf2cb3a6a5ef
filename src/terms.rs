//! Key references found in the source text, and whether the report kept them.
//!
//! Three kinds of term are recognised by regex: legal references
//! (articles, laws, decrees, directives), definitions ("si intende per ...")
//! and key concepts ("principio di ...", "diritto di ..."). Each chunk's
//! terms are listed in its request so the model carries them over; after
//! aggregation the report is checked against the full list.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Terms listed in one chunk request.
pub const MAX_TERMS_PER_CHUNK: usize = 50;
/// Missing terms kept in [`Coverage::missing_terms`].
pub const MAX_MISSING_TERMS: usize = 20;
/// Context shown next to a term in a request.
const MAX_CONTEXT_CHARS: usize = 100;

/// What a [`Term`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermKind {
    Law,
    Definition,
    Concept,
}

impl fmt::Display for TermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TermKind::Law => "LAW",
            TermKind::Definition => "DEFINITION",
            TermKind::Concept => "CONCEPT",
        })
    }
}

/// A reference the report is expected to keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub term: String,
    pub kind: TermKind,
    /// Surrounding text, whitespace collapsed.
    pub context: String,
    /// 1-based page of the chunk the term was found in.
    pub page: usize,
}

/// How many extracted terms made it into the report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub total_terms: usize,
    pub terms_in_output: usize,
    /// First [`MAX_MISSING_TERMS`] terms not found, deduplicated.
    pub missing_terms: Vec<String>,
}

impl Coverage {
    /// Share of terms found in the report, in percent. 0 when no terms.
    pub fn percentage(&self) -> f64 {
        if self.total_terms == 0 {
            0.0
        } else {
            self.terms_in_output as f64 * 100.0 / self.total_terms as f64
        }
    }
}

// ── Patterns ─────────────────────────────────────────────────────────────

static RE_LAW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\bart(?:icolo)?\.?\s*\d+(?:\s*[-,]\s*\d+)*",
        r"|\bl(?:egge)?\.?\s*(?:n\.?\s*)?\d+/\d{4}",
        r"|\bd\.?\s*lgs\.?\s*(?:n\.?\s*)?\d+/\d{4}",
        r"|\bd\.?\s*p\.?\s*r\.?\s*(?:n\.?\s*)?\d+/\d{4}",
        r"|\bdirettiva\s+(?:ue\s+)?\d+/\d+",
        r"|\bregolamento\s+(?:ue\s+)?(?:n\.?\s*)?\d+/\d{4}",
        r"|\bcodice\s+(?:civile|penale)\b",
        r"|\bcostituzione\b",
        r"|\bgdpr\b",
        r"|\btrattato\s+(?:ue|cee|ce)\b",
    ))
    .unwrap()
});

static RE_DEFINITIONS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?i)(?:si\s+)?(?:intende|definisce|significa)\s+(?:per|come|con)\s+["']?([^"',.;:]+)["']?"#,
        r#"(?i)(?:è|sono)\s+(?:definit[oaie]|considerat[oaie])\s+(?:come\s+)?["']?([^"',.;:]+)"#,
        r#"(?i)["']([^"']+)["']\s*(?:significa|indica|è)"#,
        r#"(?i)(?:per|con)\s+["']([^"']+)["']\s+si\s+intende"#,
        r#"(?i)(?:il\s+termine|la\s+nozione\s+di)\s+["']?([^"',.;:]+)["']?"#,
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static RE_CONCEPTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(?:principio|criterio|requisito)\s+(?:di|del(?:la)?)\s+([a-zàèìòùé\s]+)",
        r"(?i)(?:diritto|obbligo|dovere|facoltà)\s+(?:di|a|del(?:la)?)\s+([a-zàèìòùé\s]+)",
        r"(?i)(?:tutela|protezione|garanzia)\s+(?:del(?:la)?|dei|delle)\s+([a-zàèìòùé\s]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

// ── Extraction ───────────────────────────────────────────────────────────

/// Extract the terms of `text`, deduplicated by kind and lowercase form.
pub fn extract_terms(text: &str, page: usize) -> Vec<Term> {
    let mut terms = Vec::new();

    for m in RE_LAW.find_iter(text) {
        terms.push(Term {
            term: squash(m.as_str()),
            kind: TermKind::Law,
            context: context_around(text, m.start(), m.end(), 50, 50),
            page,
        });
    }

    for re in RE_DEFINITIONS.iter() {
        for caps in re.captures_iter(text) {
            let (Some(whole), Some(group)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let term = squash(group.as_str());
            let len = term.chars().count();
            if len > 3 && len < 100 {
                terms.push(Term {
                    term,
                    kind: TermKind::Definition,
                    context: context_around(text, whole.start(), whole.end(), 30, 100),
                    page,
                });
            }
        }
    }

    for re in RE_CONCEPTS.iter() {
        for caps in re.captures_iter(text) {
            let (Some(whole), Some(group)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let term = squash(group.as_str());
            let len = term.chars().count();
            if len > 3 && len < 80 {
                terms.push(Term {
                    term,
                    kind: TermKind::Concept,
                    context: squash(whole.as_str()),
                    page,
                });
            }
        }
    }

    dedup(terms)
}

/// Drop repeats of the same kind and lowercase form, keeping the first.
pub fn dedup(terms: Vec<Term>) -> Vec<Term> {
    let mut seen = HashSet::new();
    terms
        .into_iter()
        .filter(|t| seen.insert((t.kind, t.term.to_lowercase())))
        .collect()
}

/// `- [KIND] term: context` lines for the first [`MAX_TERMS_PER_CHUNK`] terms.
pub fn format_term_list(terms: &[Term]) -> String {
    terms
        .iter()
        .take(MAX_TERMS_PER_CHUNK)
        .map(|t| {
            let context: String = t.context.chars().take(MAX_CONTEXT_CHARS).collect();
            format!("- [{}] {}: {}", t.kind, t.term, context)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Coverage ─────────────────────────────────────────────────────────────

/// Check which `terms` appear in `report`.
///
/// A term counts as found when its lowercase form occurs in the lowercase
/// report, or when any of its words longer than four characters does.
pub fn coverage(terms: &[Term], report: &str) -> Coverage {
    let haystack = report.to_lowercase();
    let mut found = 0;
    let mut missing = Vec::new();
    let mut seen = HashSet::new();

    for t in terms {
        let needle = t.term.to_lowercase();
        let hit = haystack.contains(&needle)
            || needle
                .split_whitespace()
                .any(|w| w.chars().count() > 4 && haystack.contains(w));
        if hit {
            found += 1;
        } else if missing.len() < MAX_MISSING_TERMS && seen.insert(needle) {
            missing.push(t.term.clone());
        }
    }

    Coverage {
        total_terms: terms.len(),
        terms_in_output: found,
        missing_terms: missing,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn squash(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `before` chars ahead of the byte range `start..end` and `after` chars past it.
fn context_around(text: &str, start: usize, end: usize, before: usize, after: usize) -> String {
    let lo = text[..start]
        .char_indices()
        .rev()
        .take(before)
        .last()
        .map_or(start, |(i, _)| i);
    let hi = text[end..]
        .char_indices()
        .nth(after)
        .map_or(text.len(), |(i, _)| end + i);
    squash(&text[lo..hi])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(terms: &[Term], kind: TermKind) -> Vec<&str> {
        terms
            .iter()
            .filter(|t| t.kind == kind)
            .map(|t| t.term.as_str())
            .collect()
    }

    #[test]
    fn finds_legal_references() {
        let text = "Ai sensi dell'art. 5, 6 della legge n. 241/1990 e del D.Lgs. 196/2003, \
                    nel rispetto del GDPR e della Costituzione.";
        let terms = extract_terms(text, 3);
        let laws = kinds(&terms, TermKind::Law);
        assert!(laws.contains(&"art. 5, 6"), "got {laws:?}");
        assert!(laws.contains(&"legge n. 241/1990"), "got {laws:?}");
        assert!(laws.contains(&"D.Lgs. 196/2003"), "got {laws:?}");
        assert!(laws.contains(&"GDPR"), "got {laws:?}");
        assert!(laws.contains(&"Costituzione"), "got {laws:?}");
        assert!(terms.iter().all(|t| t.page == 3));
    }

    #[test]
    fn finds_definitions_and_concepts() {
        let text = "Per \"dato personale\" si intende qualsiasi informazione. \
                    Vale il principio di proporzionalità.";
        let terms = extract_terms(text, 1);
        assert!(kinds(&terms, TermKind::Definition).contains(&"dato personale"));
        assert!(kinds(&terms, TermKind::Concept).contains(&"proporzionalità"));
    }

    #[test]
    fn repeats_are_dropped() {
        let terms = extract_terms("Il GDPR e ancora il gdpr.", 1);
        assert_eq!(kinds(&terms, TermKind::Law), vec!["GDPR"]);
    }

    #[test]
    fn plain_prose_has_no_terms() {
        assert!(extract_terms("The quick brown fox jumps over the lazy dog.", 1).is_empty());
    }

    #[test]
    fn context_respects_char_boundaries() {
        let text = "ààààà GDPR èèèèè";
        let terms = extract_terms(text, 1);
        assert_eq!(terms[0].context, "ààààà GDPR èèèèè");
    }

    #[test]
    fn term_list_is_capped() {
        let terms: Vec<Term> = (0..60)
            .map(|i| Term {
                term: format!("Art. {i}"),
                kind: TermKind::Law,
                context: "x".repeat(150),
                page: 1,
            })
            .collect();
        let list = format_term_list(&terms);
        assert_eq!(list.lines().count(), MAX_TERMS_PER_CHUNK);
        let first = list.lines().next().unwrap();
        assert!(first.starts_with("- [LAW] Art. 0: "));
        assert_eq!(first.len(), "- [LAW] Art. 0: ".len() + 100);
    }

    #[test]
    fn coverage_matches_whole_term_or_long_word() {
        let terms = vec![
            Term {
                term: "Art. 5".into(),
                kind: TermKind::Law,
                context: String::new(),
                page: 1,
            },
            Term {
                term: "dato personale".into(),
                kind: TermKind::Definition,
                context: String::new(),
                page: 1,
            },
            Term {
                term: "D.Lgs. 196/2003".into(),
                kind: TermKind::Law,
                context: String::new(),
                page: 2,
            },
        ];
        let cov = coverage(&terms, "L'ART. 5 tutela ogni informazione personale.");
        assert_eq!(cov.total_terms, 3);
        assert_eq!(cov.terms_in_output, 2);
        assert_eq!(cov.missing_terms, vec!["D.Lgs. 196/2003"]);
        assert!((cov.percentage() - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn coverage_of_no_terms_is_zero() {
        let cov = coverage(&[], "anything");
        assert_eq!(cov, Coverage::default());
        assert_eq!(cov.percentage(), 0.0);
    }
}
