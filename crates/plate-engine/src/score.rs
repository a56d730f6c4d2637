//! Grammar-based quality score for normalized plate text.
//!
//! The score captures "looks like a plate" independently of OCR confidence;
//! the arbiter multiplies the two so neither signal alone dominates.

use crate::normalize::NormalizeRules;
use regex::Regex;

/// Plausible space-stripped plate length range; anything outside is halved.
const MIN_PLATE_LEN: usize = 4;
const MAX_PLATE_LEN: usize = 10;

#[derive(Debug, Clone)]
pub struct PatternScorer {
    spaced: Regex,
    unspaced: Regex,
    letters_then_digits: Regex,
}

impl Default for PatternScorer {
    fn default() -> Self {
        Self::new(&NormalizeRules::default())
    }
}

impl PatternScorer {
    pub fn new(rules: &NormalizeRules) -> Self {
        let (r, n, s) = (
            rules.max_region_len,
            rules.max_number_len,
            rules.max_suffix_len,
        );
        let spaced = if s > 0 {
            format!("^[A-Z]{{1,{r}}} [0-9]{{1,{n}}}( [A-Z]{{1,{s}}})?$")
        } else {
            format!("^[A-Z]{{1,{r}}} [0-9]{{1,{n}}}$")
        };
        let unspaced = format!("^[A-Z]{{1,{r}}}[0-9]{{1,{n}}}[A-Z]{{0,{s}}}$");
        Self {
            spaced: Regex::new(&spaced).expect("spaced grammar pattern is valid"),
            unspaced: Regex::new(&unspaced).expect("unspaced grammar pattern is valid"),
            letters_then_digits: Regex::new("^[A-Z]+[0-9]+")
                .expect("structural pattern is valid"),
        }
    }

    /// Score a normalized string. Base 1.0; the first applicable tier wins:
    /// spaced grammar match x10/x9 (region length 1/2+), unspaced match
    /// x8/x7.5, letters-then-digits x5, otherwise x1. A x0.5 length penalty
    /// applies independently when the stripped length is implausible.
    pub fn score(&self, text: &str) -> f64 {
        let stripped: String = text.chars().filter(|c| !c.is_whitespace()).collect();

        let mut score = 1.0;
        if self.spaced.is_match(text) {
            let region_len = text.split(' ').next().map_or(0, str::len);
            score *= if region_len == 1 { 10.0 } else { 9.0 };
        } else if self.unspaced.is_match(text) {
            let region_len = text.chars().take_while(char::is_ascii_uppercase).count();
            score *= if region_len == 1 { 8.0 } else { 7.5 };
        } else if self.letters_then_digits.is_match(&stripped) {
            score *= 5.0;
        }

        let len = stripped.chars().count();
        if !(MIN_PLATE_LEN..=MAX_PLATE_LEN).contains(&len) {
            score *= 0.5;
        }
        score
    }
}
