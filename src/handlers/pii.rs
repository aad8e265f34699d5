//! PII pattern set for the privacy handler: email, tax-file-number-like digit
//! groups, card-number-like digit sequences, phone numbers. Patterns are
//! precompiled once via `OnceLock` and reused across repeated scans rather
//! than rebuilt per call.

use std::sync::OnceLock;

use regex::Regex;

use crate::event::PiiFinding;

struct PiiPattern {
    kind: &'static str,
    regex: &'static str,
}

const PATTERNS: &[PiiPattern] = &[
    PiiPattern { kind: "email", regex: r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}" },
    PiiPattern { kind: "card_number", regex: r"\b(?:\d[ -]?){13,19}\b" },
    PiiPattern { kind: "tax_file_number", regex: r"\b\d{3}[ -]?\d{3}[ -]?\d{3}\b" },
    PiiPattern { kind: "phone_number", regex: r"\b(?:\+?\d{1,3}[ -]?)?(?:\(\d{1,4}\)[ -]?)?\d{3,4}[ -]?\d{3,4}\b" },
];

fn compiled() -> &'static Vec<Regex> {
    static COMPILED: OnceLock<Vec<Regex>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        PATTERNS
            .iter()
            .map(|p| Regex::new(p.regex).expect("static PII regex must compile"))
            .collect()
    })
}

/// Scans `line` for PII, returning the findings (sorted by span start, first
/// match per pattern kind taking priority over later overlapping patterns)
/// and a sanitized copy with every matched span replaced by a typed
/// placeholder like `<EMAIL>`.
pub fn scan(line: &str) -> (Vec<PiiFinding>, String) {
    let regexes = compiled();
    let mut raw_matches: Vec<(usize, usize, &'static str)> = Vec::new();

    for (pattern, regex) in PATTERNS.iter().zip(regexes.iter()) {
        for m in regex.find_iter(line) {
            raw_matches.push((m.start(), m.end(), pattern.kind));
        }
    }

    raw_matches.sort_by_key(|(start, _, _)| *start);

    // Drop matches that overlap an already-accepted, earlier-starting match
    // (email subsumes digit-group matches inside it in practice, but the
    // general rule is simply first-match-wins by position).
    let mut accepted: Vec<(usize, usize, &'static str)> = Vec::new();
    for m in raw_matches {
        if accepted.iter().any(|(s, e, _)| m.0 < *e && *s < m.1) {
            continue;
        }
        accepted.push(m);
    }

    let mut findings = Vec::with_capacity(accepted.len());
    let mut sanitized = String::with_capacity(line.len());
    let mut cursor = 0usize;

    for (start, end, kind) in &accepted {
        sanitized.push_str(&line[cursor..*start]);
        sanitized.push_str(&format!("<{}>", kind.to_uppercase()));
        cursor = *end;
        findings.push(PiiFinding { kind: kind.to_string(), span_start: *start, span_end: *end });
    }
    sanitized.push_str(&line[cursor..]);

    (findings, sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_email_and_sanitizes() {
        let (findings, sanitized) = scan("user jane@example.com transferred $100");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, "email");
        assert!(sanitized.contains("<EMAIL>"));
        assert!(!sanitized.contains("jane@example.com"));
    }

    #[test]
    fn no_pii_returns_empty_findings_and_identical_line() {
        let (findings, sanitized) = scan("service restarted cleanly");
        assert!(findings.is_empty());
        assert_eq!(sanitized, "service restarted cleanly");
    }
}
