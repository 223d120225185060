//! Case conversions for component names, selectors and custom tags.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^a-zA-Z0-9.]+").unwrap();
    static ref LOWER_UPPER: Regex = Regex::new(r"([a-z])([A-Z])").unwrap();
    static ref SEPARATORS: Regex = Regex::new(r"[\s_.]+").unwrap();
    static ref DASH_RUNS: Regex = Regex::new(r"-+").unwrap();
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Split into dot-separated parts, each part into space-separated words.
fn words(name: &str) -> Vec<Vec<String>> {
    let spaced = NON_WORD.replace_all(name, " ");
    spaced
        .split('.')
        .map(|part| part.split(' ').map(str::to_string).collect())
        .collect()
}

/// `my-post` → `MyPost`
pub fn to_pascal_case(name: &str) -> String {
    words(name)
        .iter()
        .flat_map(|part| part.iter().map(|w| capitalize(w)))
        .collect()
}

/// `my-post` → `myPost`
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::new();
    for (part_index, part) in words(name).iter().enumerate() {
        for (word_index, word) in part.iter().enumerate() {
            if part_index == 0 && word_index == 0 {
                out.push_str(&word.to_lowercase());
            } else {
                out.push_str(&capitalize(word));
            }
        }
    }
    out
}

/// `MyPost` → `my-post`. Applying it twice gives the same result.
pub fn to_hyphen_case(name: &str) -> String {
    let split = LOWER_UPPER.replace_all(name, "$1-$2");
    let dashed = SEPARATORS.replace_all(&split, "-").to_lowercase();
    DASH_RUNS.replace_all(&dashed, "-").into_owned()
}

/// The three spellings a component answers to as a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorVariants {
    pub hyphen: String,
    pub camel: String,
    pub pascal: String,
}

impl SelectorVariants {
    pub fn from_name(name: &str) -> Self {
        SelectorVariants {
            hyphen: to_hyphen_case(name),
            camel: to_camel_case(name),
            pascal: to_pascal_case(name),
        }
    }

    pub fn selector(&self) -> String {
        format!("{}, {}, {}", self.hyphen, self.camel, self.pascal)
    }
}
