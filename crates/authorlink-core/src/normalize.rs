//! Pure, deterministic text normalization.
//!
//! Every comparison and index key in the system goes through one of these
//! functions, so all of them are idempotent: `normalize(normalize(x)) ==
//! normalize(x)` for names, titles, and DOIs.

use unicode_normalization::UnicodeNormalization;

/// Stopwords removed from normalized titles.
const TITLE_STOPWORDS: &[&str] = &["the", "a", "an", "of", "for", "and", "in", "on", "to", "by"];

/// DOI URL prefixes stripped during normalization, checked in order.
const DOI_PREFIXES: &[&str] = &[
    "https://dx.doi.org/",
    "http://dx.doi.org/",
    "https://doi.org/",
    "http://doi.org/",
];

/// ORCID URL prefixes stripped before validation.
const ORCID_PREFIXES: &[&str] = &["https://orcid.org/", "http://orcid.org/"];

/// Normalize free text: Unicode NFKC, lowercase, punctuation to spaces,
/// whitespace collapsed. Used for names, institutions, and journal titles.
pub fn normalize_text(text: &str) -> String {
    let folded: String = text.nfkc().collect::<String>().to_lowercase();
    let mut out = String::with_capacity(folded.len());
    let mut pending_space = false;
    for ch in folded.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else {
            // Punctuation and whitespace both act as token separators.
            pending_space = true;
        }
    }
    out
}

/// Normalize a publication title: [`normalize_text`] plus stopword removal.
pub fn normalize_title(title: &str) -> String {
    normalize_text(title)
        .split_whitespace()
        .filter(|w| !TITLE_STOPWORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a DOI: trim, lowercase, strip `doi.org` URL prefixes.
///
/// Returns `None` when nothing remains after stripping.
pub fn normalize_doi(doi: &str) -> Option<String> {
    let mut s = doi.trim().to_lowercase();
    for prefix in DOI_PREFIXES {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.to_string();
            break;
        }
    }
    let s = s.trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Validate and canonicalize an ORCID.
///
/// Accepts the bare `dddd-dddd-dddd-dddX` form or an `orcid.org` URL.
/// Returns `None` for anything that fails the shape check; invalid ORCIDs
/// never fail a decision, they are dropped with a warning upstream.
pub fn normalize_orcid(orcid: &str) -> Option<String> {
    let mut s = orcid.trim();
    for prefix in ORCID_PREFIXES {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest;
            break;
        }
    }
    let s = s.trim();
    let bytes: Vec<char> = s.chars().collect();
    if bytes.len() != 19 {
        return None;
    }
    for (i, ch) in bytes.iter().enumerate() {
        match i {
            4 | 9 | 14 => {
                if *ch != '-' {
                    return None;
                }
            }
            18 => {
                if !ch.is_ascii_digit() && *ch != 'X' && *ch != 'x' {
                    return None;
                }
            }
            _ => {
                if !ch.is_ascii_digit() {
                    return None;
                }
            }
        }
    }
    // Checksum character is canonically uppercase.
    Some(s.to_uppercase())
}

/// Extract the surname token from a name: the last whitespace token of the
/// normalized form.
pub fn surname(name: &str) -> Option<String> {
    normalize_text(name)
        .split_whitespace()
        .last()
        .map(|s| s.to_string())
}

/// Extract the first given-name initial: first character of the first token,
/// provided the name has at least two tokens (a bare surname has no initial).
pub fn first_given_initial(name: &str) -> Option<char> {
    let norm = normalize_text(name);
    let tokens: Vec<&str> = norm.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }
    tokens[0].chars().next()
}

/// Project a name onto its `surname initial` blocking form, e.g.
/// `"John A. Smith"` → `"smith j"`. Names without a given name project to
/// the bare surname.
pub fn surname_initial_projection(name: &str) -> Option<String> {
    let sur = surname(name)?;
    match first_given_initial(name) {
        Some(initial) => Some(format!("{sur} {initial}")),
        None => Some(sur),
    }
}

/// Whether two normalized names differ only by initial expansion, e.g.
/// `"j smith"` vs `"john smith"` or `"j smith"` vs `"john a smith"`.
/// Requires the same surname and compatible given tokens position by
/// position; surplus trailing given tokens on the longer name (dropped
/// middle names) are tolerated.
pub fn initials_compatible(a: &str, b: &str) -> bool {
    let ta: Vec<&str> = a.split_whitespace().collect();
    let tb: Vec<&str> = b.split_whitespace().collect();
    if ta.len() < 2 || tb.len() < 2 {
        return false;
    }
    if ta.last() != tb.last() {
        return false;
    }
    let given_a = &ta[..ta.len() - 1];
    let given_b = &tb[..tb.len() - 1];
    given_a.iter().zip(given_b).all(|(x, y)| {
        if x == y {
            return true;
        }
        let (short, long) = if x.len() <= y.len() { (x, y) } else { (y, x) };
        short.len() == 1 && long.starts_with(short)
    })
}

/// Script classification of a name, used in the redacted trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    /// Mostly Latin letters (> 70% of alphabetic chars)
    Latin,
    /// Mostly Cyrillic
    Cyrillic,
    /// Mostly CJK ideographs
    Cjk,
    /// Alphabetic but no script dominates
    Mixed,
    /// No alphabetic characters at all
    Other,
}

/// Detect the dominant script of a string. A script dominates when it covers
/// more than 70% of the alphabetic characters.
pub fn detect_script(text: &str) -> ScriptType {
    let mut latin = 0usize;
    let mut cyrillic = 0usize;
    let mut cjk = 0usize;
    for ch in text.chars() {
        if ch.is_ascii_alphabetic() {
            latin += 1;
        } else if ('\u{0400}'..='\u{04FF}').contains(&ch) {
            cyrillic += 1;
        } else if ('\u{4E00}'..='\u{9FFF}').contains(&ch) {
            cjk += 1;
        }
    }
    let total = latin + cyrillic + cjk;
    if total == 0 {
        return ScriptType::Other;
    }
    let dominance = |count: usize| count * 10 > total * 7;
    if dominance(latin) {
        ScriptType::Latin
    } else if dominance(cyrillic) {
        ScriptType::Cyrillic
    } else if dominance(cjk) {
        ScriptType::Cjk
    } else {
        ScriptType::Mixed
    }
}

/// Structural summary of a name, safe to log in place of the plaintext.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NameStructure {
    /// Number of whitespace tokens
    pub token_count: usize,
    /// Mean token length in characters, 2 decimal places
    pub avg_token_length: f64,
    /// Dominant script
    pub script_type: ScriptType,
}

/// Compute the structural summary of a raw (un-normalized) name.
pub fn name_structure(name: &str) -> NameStructure {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    let token_count = tokens.len();
    let avg = if token_count == 0 {
        0.0
    } else {
        let total: usize = tokens.iter().map(|t| t.chars().count()).sum();
        total as f64 / token_count as f64
    };
    NameStructure {
        token_count,
        avg_token_length: (avg * 100.0).round() / 100.0,
        script_type: detect_script(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_normalization_strips_punctuation_and_case() {
        assert_eq!(normalize_text("John A. Smith"), "john a smith");
        assert_eq!(normalize_text("  Müller,   Hans "), "müller hans");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        for input in [
            "The Genome of the Sea Urchin!",
            "J. Smith",
            "Ünïcodé — Títle (2023)",
        ] {
            let once = normalize_text(input);
            assert_eq!(normalize_text(&once), once);
            let title_once = normalize_title(input);
            assert_eq!(normalize_title(&title_once), title_once);
        }
        let doi_once = normalize_doi("https://doi.org/10.1038/X").unwrap();
        assert_eq!(normalize_doi(&doi_once).unwrap(), doi_once);
    }

    #[test]
    fn title_stopwords_removed() {
        assert_eq!(
            normalize_title("The Genome of the Sea Urchin"),
            "genome sea urchin"
        );
        assert_eq!(normalize_title("On the Origin of Species"), "origin species");
    }

    #[test]
    fn doi_prefix_stripping() {
        assert_eq!(normalize_doi("10.1038/x").unwrap(), "10.1038/x");
        assert_eq!(normalize_doi("10.1038/X").unwrap(), "10.1038/x");
        assert_eq!(
            normalize_doi("https://doi.org/10.1038/nature12373").unwrap(),
            "10.1038/nature12373"
        );
        assert_eq!(
            normalize_doi("http://dx.doi.org/10.1126/science.123").unwrap(),
            "10.1126/science.123"
        );
        assert_eq!(normalize_doi("  "), None);
        assert_eq!(normalize_doi("https://doi.org/"), None);
    }

    #[test]
    fn orcid_validation() {
        assert_eq!(
            normalize_orcid("0000-0001-2345-6789").unwrap(),
            "0000-0001-2345-6789"
        );
        assert_eq!(
            normalize_orcid("https://orcid.org/0000-0001-2345-678x").unwrap(),
            "0000-0001-2345-678X"
        );
        assert_eq!(normalize_orcid("0000-0001-2345"), None);
        assert_eq!(normalize_orcid("0000_0001_2345_6789"), None);
        assert_eq!(normalize_orcid("abcd-0001-2345-6789"), None);
        assert_eq!(normalize_orcid(""), None);
    }

    #[test]
    fn surname_extraction() {
        assert_eq!(surname("John A. Smith").unwrap(), "smith");
        assert_eq!(surname("Zhang Wei").unwrap(), "wei");
        assert_eq!(surname(""), None);
        assert_eq!(first_given_initial("John Smith"), Some('j'));
        assert_eq!(first_given_initial("Smith"), None);
        assert_eq!(
            surname_initial_projection("John A. Smith").unwrap(),
            "smith j"
        );
        assert_eq!(surname_initial_projection("Smith").unwrap(), "smith");
    }

    #[test]
    fn initial_expansion_detection() {
        assert!(initials_compatible("j smith", "john smith"));
        assert!(initials_compatible("john a smith", "j a smith"));
        // Dropped middle token still counts as initial expansion.
        assert!(initials_compatible("j smith", "john a smith"));
        assert!(!initials_compatible("jane smith", "john smith"));
        assert!(!initials_compatible("john a smith", "john b smith"));
        assert!(!initials_compatible("j smith", "j jones"));
        assert!(!initials_compatible("smith", "smith"));
    }

    #[test]
    fn script_detection() {
        assert_eq!(detect_script("John Smith"), ScriptType::Latin);
        assert_eq!(detect_script("Иванов Пётр"), ScriptType::Cyrillic);
        assert_eq!(detect_script("张伟"), ScriptType::Cjk);
        assert_eq!(detect_script("Zhang 伟伟 Wei 明明"), ScriptType::Mixed);
        assert_eq!(detect_script("12345 --"), ScriptType::Other);
    }

    #[test]
    fn name_structure_summary() {
        let s = name_structure("John A. Smith");
        assert_eq!(s.token_count, 3);
        assert!((s.avg_token_length - 3.67).abs() < 0.01);
        assert_eq!(s.script_type, ScriptType::Latin);
    }
}
