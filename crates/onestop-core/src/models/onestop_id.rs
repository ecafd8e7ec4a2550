//! Onestop ID composition and name normalization.
//!
//! An identifier has the shape `<type>-<geohash>-<name>`, where the geohash is
//! at most [`GEOHASH_LENGTH`] characters and the whole identifier is truncated
//! to [`MAX_LENGTH`] characters.

use crate::error::{OnestopError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Longest geohash component embedded in an identifier
pub const GEOHASH_LENGTH: usize = 10;

/// Longest identifier, in characters
pub const MAX_LENGTH: usize = 64;

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[:&@/]").expect("separator pattern is valid"));

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^~0-9a-zA-Z]+").expect("disallowed pattern is valid"));

static STREET_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:street|st|sts|ctr|center|drive|dr|ave|avenue|av|boulevard|blvd|road|rd|alley|aly|way|parkway|pkwy|lane|ln|hwy|court|ct)\b",
    )
    .expect("street word pattern is valid")
});

/// Entity kind, doubling as the identifier's type prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnestopType {
    Feed,
    Operator,
    Route,
    Stop,
}

impl OnestopType {
    pub fn prefix(&self) -> char {
        match self {
            OnestopType::Feed => 'f',
            OnestopType::Operator => 'o',
            OnestopType::Route => 'r',
            OnestopType::Stop => 's',
        }
    }

    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'f' => Some(OnestopType::Feed),
            'o' => Some(OnestopType::Operator),
            'r' => Some(OnestopType::Route),
            's' => Some(OnestopType::Stop),
            _ => None,
        }
    }

    /// Kind of the entity an identifier refers to
    pub fn of(onestop_id: &str) -> Result<Self> {
        onestop_id
            .chars()
            .next()
            .filter(|_| onestop_id.chars().nth(1) == Some('-'))
            .and_then(Self::from_prefix)
            .ok_or_else(|| OnestopError::InvalidOnestopId {
                onestop_id: onestop_id.to_string(),
            })
    }
}

impl fmt::Display for OnestopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OnestopType::Feed => "feed",
            OnestopType::Operator => "operator",
            OnestopType::Route => "route",
            OnestopType::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// Lowercase a name, turn separators into `~` and drop everything else
/// outside `[~0-9a-z]`.
pub fn mangle(name: &str) -> String {
    let lowered = name.to_lowercase();
    normalize(&lowered)
}

/// [`mangle`] with common street suffixes removed first, so that "Main St"
/// and "Main Street" yield the same stop name.
pub fn mangle_stop(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = STREET_WORDS.replace_all(&lowered, "");
    normalize(&stripped)
}

fn normalize(lowered: &str) -> String {
    let separated = SEPARATORS.replace_all(lowered, "~");
    DISALLOWED.replace_all(&separated, "").into_owned()
}

/// Compose an identifier from its parts, applying the length limits.
pub fn compose(kind: OnestopType, geohash: &str, mangled_name: &str) -> String {
    let geohash: String = geohash.chars().take(GEOHASH_LENGTH).collect();
    format!("{}-{}-{}", kind.prefix(), geohash, mangled_name)
        .chars()
        .take(MAX_LENGTH)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mangle() {
        assert_eq!(mangle("A b C {d%"), "abcd");
        assert_eq!(mangle("A&B@C:D"), "a~b~c~d");
        assert_eq!(mangle("Bullfrog (Demo)"), "bullfrogdemo");
        assert_eq!(mangle("Demo Transit Authority"), "demotransitauthority");
        assert_eq!(mangle("40~1"), "40~1");
    }

    #[test]
    fn test_mangle_stop_strips_street_words() {
        assert_eq!(mangle_stop("Main Street"), mangle_stop("MAIN ST"));
        assert_eq!(mangle_stop("E Main St / S Irving St (Demo)"), "emain~sirvingdemo");
        // Only whole words are removed
        assert_eq!(mangle_stop("Stagecoach Hotel"), "stagecoachhotel");
        assert_eq!(mangle_stop("Bullfrog (Demo)"), "bullfrogdemo");
    }

    #[test]
    fn test_compose_truncates() {
        assert_eq!(compose(OnestopType::Stop, "9qscv9zzb585", "bullfrogdemo"), "s-9qscv9zzb5-bullfrogdemo");
        assert_eq!(compose(OnestopType::Feed, "9qs", "dta"), "f-9qs-dta");

        let long_name = "a".repeat(100);
        let id = compose(OnestopType::Route, "9q9", &long_name);
        assert_eq!(id.len(), MAX_LENGTH);
        assert!(id.starts_with("r-9q9-aaaa"));
    }

    #[test]
    fn test_type_of_identifier() {
        assert_eq!(OnestopType::of("o-9qs-demotransitauthority").unwrap(), OnestopType::Operator);
        assert_eq!(OnestopType::of("s-9qscv9zzb5-bullfrogdemo").unwrap(), OnestopType::Stop);
        assert!(OnestopType::of("x-9qs-unknown").is_err());
        assert!(OnestopType::of("stop").is_err());
        assert!(OnestopType::of("").is_err());
    }

    proptest! {
        #[test]
        fn mangle_ignores_case(name in "[ -~]{0,40}") {
            prop_assert_eq!(mangle(&name), mangle(&name.to_uppercase()));
        }

        #[test]
        fn mangle_ignores_punctuation(name in "[a-z0-9 ]{0,20}", noise in "[!#$%^*(),.?-]{0,5}") {
            let noisy = format!("{}{}", noise, name);
            prop_assert_eq!(mangle(&noisy), mangle(&name));
        }

        #[test]
        fn mangled_names_use_allowed_alphabet(name in "\\PC{0,40}") {
            let mangled = mangle(&name);
            prop_assert!(mangled.chars().all(|c| c == '~' || c.is_ascii_digit() || c.is_ascii_lowercase()));
        }
    }
}
