//! Loose text comparison for subject names
//!
//! Subject names are stored with their Spanish spelling ("Álgebra I",
//! "Física I") while users type whatever their keyboard gives them. Both
//! sides are folded through [`normalize`] before comparing.

/// Comparison key: lower-cased, with accented vowels and `ñ` folded to their
/// plain ASCII letter.
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Key used for menu options and global commands. Accents are kept so that
/// "sí" and "si" can both be listed explicitly where they matter.
pub fn normalize_command(text: &str) -> String {
    text.trim().to_lowercase()
}

/// True when `haystack` contains `needle` after normalizing both.
/// An empty needle matches nothing.
pub fn loose_contains(haystack: &str, needle: &str) -> bool {
    let needle = normalize(needle.trim());
    !needle.is_empty() && normalize(haystack).contains(&needle)
}

/// True when both strings normalize to the same key.
pub fn loose_eq(a: &str, b: &str) -> bool {
    normalize(a.trim()) == normalize(b.trim())
}
