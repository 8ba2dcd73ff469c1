//! Procedural region names.
//!
//! A name is a prefix glued to a suffix (`Stone` + `haven`), occasionally led by a
//! modifier word (`Old Stonehaven`). Every function takes the random source as an
//! argument so callers can seed it.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;

/// Probability of leading a name with a modifier word.
pub const MODIFIER_CHANCE: f64 = 0.2;
/// Generation attempts allowed per requested name before giving up.
pub const ATTEMPTS_PER_NAME: usize = 200;

const PREFIXES: &[&str] = &[
    "Ash", "Bram", "Cold", "Crow", "Dun", "Eld", "Fair", "Fen", "Frost", "Glen", "Gray", "Hale",
    "Iron", "Kings", "Lark", "Marl", "Mist", "North", "Oak", "Raven", "Red", "Rook", "Salt",
    "Shale", "Stone", "Thorn", "Wolf", "Wych", "Amber", "Elle", "Isa", "Oru", "Vale", "Bryne",
];

const SUFFIXES: &[&str] = &[
    "barrow", "bourne", "brook", "burg", "crest", "dale", "fall", "fell", "field", "ford",
    "gate", "hold", "hollow", "holm", "hurst", "mere", "moor", "reach", "ridge", "stead",
    "wick", "wood", "watch", "acre", "ey", "ington", "ock", "ow",
];

const MODIFIERS: &[&str] = &[
    "Old", "New", "Upper", "Lower", "High", "East", "West", "Great", "Little", "Far",
];

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, words: &[&'a str]) -> &'a str {
    words.choose(rng).copied().unwrap_or_default()
}

/// Joins a prefix and suffix, dropping the suffix's first letter when both sides of the
/// seam are vowels.
fn join_parts(prefix: &str, suffix: &str) -> String {
    let prefix_ends_vowel = prefix.chars().next_back().is_some_and(is_vowel);
    let mut suffix_chars = suffix.chars();
    let suffix_starts_vowel = suffix_chars.clone().next().is_some_and(is_vowel);
    if prefix_ends_vowel && suffix_starts_vowel {
        suffix_chars.next();
        format!("{prefix}{}", suffix_chars.as_str())
    } else {
        format!("{prefix}{suffix}")
    }
}

pub fn generate_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let prefix = pick(rng, PREFIXES);
    let suffix = pick(rng, SUFFIXES);
    let name = join_parts(prefix, suffix);
    if rng.gen_bool(MODIFIER_CHANCE) {
        format!("{} {name}", pick(rng, MODIFIERS))
    } else {
        name
    }
}

/// Generates up to `count` distinct names within `count * ATTEMPTS_PER_NAME` attempts.
///
/// Returning fewer than `count` names is a normal outcome once the attempt budget runs out.
pub fn generate_unique_names<R: Rng + ?Sized>(count: usize, rng: &mut R) -> HashSet<String> {
    let mut names = HashSet::with_capacity(count);
    let budget = count.saturating_mul(ATTEMPTS_PER_NAME);
    let mut attempts = 0;
    while names.len() < count && attempts < budget {
        names.insert(generate_name(rng));
        attempts += 1;
    }
    names
}

/// Generates one name not present in `used`, or `None` after [`ATTEMPTS_PER_NAME`] misses.
pub fn generate_distinct_name<R: Rng + ?Sized>(
    rng: &mut R,
    used: &HashSet<String>,
) -> Option<String> {
    (0..ATTEMPTS_PER_NAME)
        .map(|_| generate_name(rng))
        .find(|name| !used.contains(name))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn vowel_seam_drops_the_suffix_vowel() {
        assert_eq!(join_parts("Elle", "acre"), "Ellecre");
        assert_eq!(join_parts("Isa", "ey"), "Isay");
        assert_eq!(join_parts("Stone", "haven"), "Stonehaven");
        assert_eq!(join_parts("Ash", "ford"), "Ashford");
        assert_eq!(join_parts("Ash", "acre"), "Ashacre");
    }

    #[test]
    fn generation_is_deterministic_for_a_seed() {
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);
        let first: Vec<String> = (0..32).map(|_| generate_name(&mut a)).collect();
        let second: Vec<String> = (0..32).map(|_| generate_name(&mut b)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn generated_names_are_built_from_the_word_lists() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut saw_modifier = false;
        for _ in 0..500 {
            let name = generate_name(&mut rng);
            let base = match name.split_once(' ') {
                Some((modifier, base)) => {
                    assert!(MODIFIERS.contains(&modifier), "unexpected modifier in {name}");
                    saw_modifier = true;
                    base
                }
                None => name.as_str(),
            };
            assert!(
                PREFIXES.iter().any(|prefix| base.starts_with(prefix)),
                "unexpected prefix in {name}"
            );
        }
        assert!(saw_modifier, "a 20% modifier chance should show up in 500 draws");
    }

    #[test]
    fn unique_names_have_no_duplicates_and_respect_the_count() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let names = generate_unique_names(16, &mut rng);
        assert_eq!(names.len(), 16);

        let none = generate_unique_names(0, &mut rng);
        assert!(none.is_empty());
    }

    #[test]
    fn unique_names_degrade_when_the_budget_is_exhausted() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let possible = PREFIXES.len() * SUFFIXES.len() * (MODIFIERS.len() + 1);
        let names = generate_unique_names(possible + 50, &mut rng);
        assert!(names.len() <= possible);
        assert!(!names.is_empty());
    }

    #[test]
    fn distinct_name_avoids_the_used_set() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let used = generate_unique_names(40, &mut rng);
        for _ in 0..20 {
            let name = generate_distinct_name(&mut rng, &used).expect("name space is large");
            assert!(!used.contains(&name));
        }
    }
}
