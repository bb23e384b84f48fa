//! Per-country phone number validation for lead capture and profile setup.

use std::sync::LazyLock;

use regex::Regex;

/// Per-country patterns over a number with separators removed. Each accepts
/// the international form (`+254...`), the bare dialing code (`254...`) and
/// the national form with or without the trunk `0`.
const PHONE_PATTERNS: &[(&str, &str)] = &[
    ("KE", r"^(?:\+254|254|0)?[17]\d{8}$"),
    ("UG", r"^(?:\+256|256|0)?[37]\d{8}$"),
    ("TZ", r"^(?:\+255|255|0)?[67]\d{8}$"),
    ("RW", r"^(?:\+250|250|0)?7\d{8}$"),
    ("NG", r"^(?:\+234|234|0)?[789]\d{9}$"),
    ("GH", r"^(?:\+233|233|0)?[235]\d{8}$"),
    ("ZA", r"^(?:\+27|27|0)?[1-8]\d{8}$"),
    ("US", r"^(?:\+1|1)?[2-9]\d{9}$"),
    ("CA", r"^(?:\+1|1)?[2-9]\d{9}$"),
    ("GB", r"^(?:\+44|44|0)?[1-9]\d{9}$"),
];

/// Countries without a rule: E.164 allows 7 to 15 digits.
const GENERIC_PATTERN: &str = r"^\+?\d{7,15}$";

static SEPARATORS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[\s().-]").ok());

static COUNTRY_RULES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    PHONE_PATTERNS
        .iter()
        .filter_map(|(country, pattern)| Regex::new(pattern).ok().map(|re| (*country, re)))
        .collect()
});

static GENERIC_RULE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(GENERIC_PATTERN).ok());

/// Validate `raw` as a phone number for `country`.
///
/// Spaces, dashes, dots and parentheses are ignored; anything else that is
/// not a digit (or a leading `+`) fails the match.
pub fn is_valid_phone(country: &str, raw: &str) -> bool {
    let Some(separators) = SEPARATORS.as_ref() else {
        return false;
    };
    let number = separators.replace_all(raw.trim(), "");

    let country = country.trim().to_ascii_uppercase();
    match COUNTRY_RULES.iter().find(|(code, _)| *code == country) {
        Some((_, rule)) => rule.is_match(&number),
        None => GENERIC_RULE.as_ref().is_some_and(|rule| rule.is_match(&number)),
    }
}
