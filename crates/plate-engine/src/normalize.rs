//! Raw OCR text to canonical plate text.
//!
//! The canonical grammar is REGION (1-2 letters), NUMBER (1-4 digits),
//! SUFFIX (0-3 letters), emitted as "REGION NUMBER SUFFIX" with single
//! spaces. Strings that cannot be parsed into the grammar are returned
//! cleaned but verbatim; partial OCR output is still useful to an operator.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;

/// Visually-confusable glyph pairs as (digit, letter). OCR engines misread
/// these in both directions; the correction direction is decided per
/// character position during grammar segmentation.
pub const DEFAULT_CONFUSIONS: &[(char, char)] = &[
    ('0', 'O'),
    ('1', 'I'),
    ('2', 'Z'),
    ('4', 'A'),
    ('5', 'S'),
    ('6', 'G'),
    ('8', 'B'),
];

/// Grammar bounds and the confusion-correction table.
#[derive(Debug, Clone)]
pub struct NormalizeRules {
    /// Maximum REGION length in letters
    pub max_region_len: usize,

    /// Maximum NUMBER length in digits
    pub max_number_len: usize,

    /// Maximum SUFFIX length in letters
    pub max_suffix_len: usize,

    to_letter: HashMap<char, char>,
    to_digit: HashMap<char, char>,
}

impl Default for NormalizeRules {
    fn default() -> Self {
        Self::new(2, 4, 3, DEFAULT_CONFUSIONS)
    }
}

impl NormalizeRules {
    pub fn new(
        max_region_len: usize,
        max_number_len: usize,
        max_suffix_len: usize,
        confusions: &[(char, char)],
    ) -> Self {
        let mut to_letter = HashMap::new();
        let mut to_digit = HashMap::new();
        for &(digit, letter) in confusions {
            to_letter.insert(digit, letter);
            to_digit.insert(letter, digit);
        }
        Self {
            max_region_len,
            max_number_len,
            max_suffix_len,
            to_letter,
            to_digit,
        }
    }

    /// Parse an override table of the form "0=O,1=I,8=B".
    pub fn with_confusion_spec(
        max_region_len: usize,
        max_number_len: usize,
        max_suffix_len: usize,
        spec: &str,
    ) -> Result<Self> {
        let mut pairs = Vec::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (digit, letter) = entry
                .split_once('=')
                .with_context(|| format!("confusion entry '{}' is not DIGIT=LETTER", entry))?;
            let digit = single_char(digit)?;
            let letter = single_char(letter)?;
            if !digit.is_ascii_digit() || !letter.is_ascii_uppercase() {
                bail!("confusion entry '{}' must map a digit to a letter", entry);
            }
            pairs.push((digit, letter));
        }
        Ok(Self::new(max_region_len, max_number_len, max_suffix_len, &pairs))
    }

    fn max_plate_len(&self) -> usize {
        self.max_region_len + self.max_number_len + self.max_suffix_len
    }
}

fn single_char(s: &str) -> Result<char> {
    let mut chars = s.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c.to_ascii_uppercase()),
        _ => bail!("'{}' is not a single character", s),
    }
}

/// Normalize raw OCR output into canonical plate text.
///
/// Pure and idempotent: normalizing an already-canonical string returns it
/// unchanged. On a grammar match the result is "REGION NUMBER SUFFIX" with
/// leading zeros stripped from NUMBER; otherwise the cleaned input is
/// returned verbatim as a lower-confidence fallback.
pub fn normalize(raw: &str, rules: &NormalizeRules) -> String {
    let cleaned = clean(raw);
    let squeezed: Vec<char> = cleaned.chars().filter(|c| *c != ' ').collect();
    match best_segmentation(&squeezed, rules) {
        Some(seg) => seg.canonical(),
        None => cleaned,
    }
}

/// Uppercase, strip everything outside [A-Z0-9 ], collapse whitespace.
fn clean(raw: &str) -> String {
    let replaced: String = raw
        .to_uppercase()
        .chars()
        .map(|c| {
            if c.is_ascii_uppercase() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Segmentation {
    region: String,
    number: String,
    suffix: String,
    substitutions: usize,
}

impl Segmentation {
    fn canonical(&self) -> String {
        let number = self.number.trim_start_matches('0');
        let number = if number.is_empty() { "0" } else { number };
        let mut out = format!("{} {}", self.region, number);
        if !self.suffix.is_empty() {
            out.push(' ');
            out.push_str(&self.suffix);
        }
        out
    }
}

/// Find the grammar segmentation requiring the fewest confusion
/// substitutions. Corrections are applied per position and only when they
/// produce a grammar match, never unconditionally. Iteration order (region
/// length ascending, then suffix length ascending) breaks cost ties, so the
/// result is deterministic.
fn best_segmentation(chars: &[char], rules: &NormalizeRules) -> Option<Segmentation> {
    let n = chars.len();
    if n < 2 || n > rules.max_plate_len() {
        return None;
    }

    let mut best: Option<Segmentation> = None;
    for region_len in 1..=rules.max_region_len.min(n - 1) {
        for suffix_len in 0..=rules.max_suffix_len.min(n - region_len - 1) {
            let number_len = n - region_len - suffix_len;
            if number_len == 0 || number_len > rules.max_number_len {
                continue;
            }

            let Some((region, region_cost)) = coerce_letters(&chars[..region_len], rules) else {
                continue;
            };
            let number_start = region_len;
            let suffix_start = region_len + number_len;
            let Some((number, number_cost)) =
                coerce_digits(&chars[number_start..suffix_start], rules)
            else {
                continue;
            };
            let Some((suffix, suffix_cost)) = coerce_letters(&chars[suffix_start..], rules) else {
                continue;
            };

            let substitutions = region_cost + number_cost + suffix_cost;
            if best
                .as_ref()
                .map_or(true, |b| substitutions < b.substitutions)
            {
                best = Some(Segmentation {
                    region,
                    number,
                    suffix,
                    substitutions,
                });
            }
        }
    }
    best
}

fn coerce_letters(chars: &[char], rules: &NormalizeRules) -> Option<(String, usize)> {
    let mut out = String::with_capacity(chars.len());
    let mut cost = 0;
    for &c in chars {
        if c.is_ascii_uppercase() {
            out.push(c);
        } else if let Some(&letter) = rules.to_letter.get(&c) {
            out.push(letter);
            cost += 1;
        } else {
            return None;
        }
    }
    Some((out, cost))
}

fn coerce_digits(chars: &[char], rules: &NormalizeRules) -> Option<(String, usize)> {
    let mut out = String::with_capacity(chars.len());
    let mut cost = 0;
    for &c in chars {
        if c.is_ascii_digit() {
            out.push(c);
        } else if let Some(&digit) = rules.to_digit.get(&c) {
            out.push(digit);
            cost += 1;
        } else {
            return None;
        }
    }
    Some((out, cost))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> NormalizeRules {
        NormalizeRules::default()
    }

    #[test]
    fn test_clean_grammar_match() {
        assert_eq!(normalize("b1387dkc", &rules()), "B 1387 DKC");
        assert_eq!(normalize("B 1387 DKC", &rules()), "B 1387 DKC");
        assert_eq!(normalize("  b-1387.dkc ", &rules()), "B 1387 DKC");
    }

    #[test]
    fn test_two_letter_region_and_no_suffix() {
        assert_eq!(normalize("AB 123", &rules()), "AB 123");
        assert_eq!(normalize("AB123", &rules()), "AB 123");
        assert_eq!(normalize("D 45", &rules()), "D 45");
    }

    #[test]
    fn test_leading_zeros_stripped_but_zero_preserved() {
        assert_eq!(normalize("B 0042 AB", &rules()), "B 42 AB");
        assert_eq!(normalize("B 0000 AB", &rules()), "B 0 AB");
    }

    #[test]
    fn test_confusion_correction_only_when_it_yields_a_match() {
        // '8' misread in the region slot becomes 'B'
        assert_eq!(normalize("8 1387 DKC", &rules()), "B 1387 DKC");
        // 'O' misread in the number slot becomes '0'
        assert_eq!(normalize("B 13O7 DKC", &rules()), "B 1307 DKC");
        // A clean non-plate string is left alone, not "corrected"
        assert_eq!(normalize("HELLO WORLD", &rules()), "HELLO WORLD");
    }

    #[test]
    fn test_fewest_substitutions_wins() {
        // "81387DKC" parses as B+1387+DKC (1 substitution), not BI+387+DKC (2)
        assert_eq!(normalize("81387DKC", &rules()), "B 1387 DKC");
    }

    #[test]
    fn test_unparsed_fallback_returned_verbatim() {
        assert_eq!(normalize("?????", &rules()), "");
        assert_eq!(normalize("PARKIR GRATIS", &rules()), "PARKIR GRATIS");
        // Too long for the grammar
        assert_eq!(normalize("ABC1234567890", &rules()), "ABC1234567890");
    }

    #[test]
    fn test_idempotence() {
        let inputs = [
            "b1387dkc",
            "8 1387 DKC",
            "AB 0042",
            "PARKIR GRATIS",
            "?????",
            "1234",
            "B 1387 DKC",
        ];
        for raw in inputs {
            let once = normalize(raw, &rules());
            let twice = normalize(&once, &rules());
            assert_eq!(once, twice, "normalize not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_grammar_fixed_point() {
        // Any canonical string with no leading zeros is a fixed point
        for canonical in ["B 1387 DKC", "AB 7 XY", "F 1", "Z 9999 ABC"] {
            assert_eq!(normalize(canonical, &rules()), canonical);
        }
    }

    #[test]
    fn test_confusion_spec_parsing() {
        let rules = NormalizeRules::with_confusion_spec(2, 4, 3, "0=O, 1=I").unwrap();
        assert_eq!(normalize("O123", &rules), "O 123");
        // '8' is not in the override table, so no correction applies
        assert_eq!(normalize("8123", &rules), "8123");

        assert!(NormalizeRules::with_confusion_spec(2, 4, 3, "0O").is_err());
        assert!(NormalizeRules::with_confusion_spec(2, 4, 3, "X=Y").is_err());
    }

    #[test]
    fn test_custom_grammar_bounds() {
        // Three-letter region, five digits, no suffix
        let rules = NormalizeRules::new(3, 5, 0, DEFAULT_CONFUSIONS);
        assert_eq!(normalize("ABC12345", &rules), "ABC 12345");
        assert_eq!(normalize("B1387DKC", &rules), "B1387DKC");
    }
}
