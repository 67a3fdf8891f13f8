// Unit names: validation and generation.
//
// A valid name has at least two characters, starts with an uppercase letter
// and contains only letters, spaces, and single or double quotes. Generated
// names glue two or three syllables together from the world PRNG and
// occasionally add a quoted epithet, so they always pass validation.

use crate::error::SimError;
use stonehold_prng::SimRng;

const ONSETS: &[&str] = &[
    "b", "br", "d", "dr", "g", "gr", "k", "kh", "m", "n", "r", "th", "t", "v", "z",
];
const VOWELS: &[&str] = &["a", "e", "i", "o", "u", "ai", "ou"];
const CODAS: &[&str] = &["", "", "n", "r", "k", "m", "rin", "li", "dur"];
const EPITHETS: &[&str] = &["Stonefist", "Deepdelver", "Ironbrow", "Ashbeard", "Oakheart"];

pub fn validate_name(name: &str) -> Result<(), SimError> {
    let mut chars = name.chars();
    let valid = name.chars().count() >= 2
        && chars.next().is_some_and(char::is_uppercase)
        && name
            .chars()
            .all(|c| c.is_alphabetic() || c == ' ' || c == '\'' || c == '"');
    if valid {
        Ok(())
    } else {
        Err(SimError::InvalidName(name.to_owned()))
    }
}

fn syllable(rng: &mut SimRng, out: &mut String) {
    for part in [ONSETS, VOWELS, CODAS] {
        if let Some(s) = rng.choose(part) {
            out.push_str(s);
        }
    }
}

/// A random name that satisfies `validate_name`.
pub fn generate_name(rng: &mut SimRng) -> String {
    let mut base = String::new();
    for _ in 0..rng.range_usize(2, 4) {
        syllable(rng, &mut base);
    }
    let mut chars = base.chars();
    let mut name: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    if rng.chance(0.2) {
        if let Some(epithet) = rng.choose(EPITHETS) {
            name.push_str(" \"");
            name.push_str(epithet);
            name.push('"');
        }
    }
    name
}
