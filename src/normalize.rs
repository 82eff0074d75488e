//! Text normalization for institutional emails and identifier inputs
//!
//! Provides:
//! - Email local-part normalization (first token, NFD, diacritic strip, `[a-z]` only)
//! - Institutional email composition
//! - Input sanitizers for RFC, phone and bank account fields

use unicode_normalization::UnicodeNormalization;

/// Longest RFC accepted by the form (persons use 13, companies 12)
pub const TAX_ID_MAX_LEN: usize = 13;
const PHONE_MAX_DIGITS: usize = 10;
const ACCOUNT_MAX_DIGITS: usize = 18;

/// Normalize a name token into an email local part.
///
/// Only the first whitespace-separated word is used. The steps run in this
/// order: lower-case, canonical decomposition, strip combining marks,
/// `ñ`/`Ñ` to `n`/`N`, drop everything outside `[a-z]`.
///
/// # Examples
///
/// ```
/// use alta_colaborador::normalize::normalize_local_part;
///
/// assert_eq!(normalize_local_part("José"), "jose");
/// assert_eq!(normalize_local_part("Ñoño"), "nono");
/// assert_eq!(normalize_local_part("Del Río"), "del");
/// assert_eq!(normalize_local_part("   "), "");
/// ```
pub fn normalize_local_part(raw: &str) -> String {
    let first = raw.split_whitespace().next().unwrap_or("");

    first
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'ñ' => 'n',
            'Ñ' => 'N',
            other => other,
        })
        .filter(|c| c.is_ascii_lowercase())
        .collect()
}

/// Combining Diacritical Marks block (U+0300..U+036F)
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// Compose `{first}.{last}{domain_suffix}`, lower-cased.
///
/// Returns `None` when either name normalizes to nothing; callers must not
/// synthesize an address in that case.
pub fn institutional_email(first: &str, last: &str, domain_suffix: &str) -> Option<String> {
    let first = normalize_local_part(first);
    let last = normalize_local_part(last);

    if first.is_empty() || last.is_empty() {
        return None;
    }

    Some(format!("{}.{}{}", first, last, domain_suffix).to_lowercase())
}

/// Upper-case, keep `[A-ZÑ0-9]`, truncate to 13 characters
pub fn sanitize_tax_id(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == 'Ñ')
        .take(TAX_ID_MAX_LEN)
        .collect()
}

/// Digits only, at most 10
pub fn sanitize_phone(raw: &str) -> String {
    digits_only(raw, PHONE_MAX_DIGITS)
}

/// Digits only, at most 18 (CLABE length)
pub fn sanitize_account_number(raw: &str) -> String {
    digits_only(raw, ACCOUNT_MAX_DIGITS)
}

fn digits_only(raw: &str, max: usize) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_accents_and_enye() {
        assert_eq!(normalize_local_part("José"), "jose");
        assert_eq!(normalize_local_part("Ñoño"), "nono");
        assert_eq!(normalize_local_part("MARÍA"), "maria");
        assert_eq!(normalize_local_part("Müller"), "muller");
    }

    #[test]
    fn test_blank_and_symbol_only_input() {
        assert_eq!(normalize_local_part("   "), "");
        assert_eq!(normalize_local_part(""), "");
        assert_eq!(normalize_local_part("123-!"), "");
    }

    #[test]
    fn test_only_first_token_is_used() {
        assert_eq!(normalize_local_part("Del Río"), "del");
        assert_eq!(normalize_local_part("  Ana   Sofía"), "ana");
        assert_eq!(normalize_local_part("O'Brien"), "obrien");
    }

    #[test]
    fn test_institutional_email() {
        assert_eq!(
            institutional_email("María", "Del Río", "@marnezdesarrollos.com"),
            Some("maria.del@marnezdesarrollos.com".to_string())
        );
        assert_eq!(
            institutional_email("José Luis", "Núñez", "@Example.COM"),
            Some("jose.nunez@example.com".to_string())
        );
        assert_eq!(institutional_email("", "Núñez", "@x.com"), None);
        assert_eq!(institutional_email("José", "123", "@x.com"), None);
    }

    #[test]
    fn test_sanitize_tax_id() {
        assert_eq!(sanitize_tax_id("peña800101-ab1"), "PEÑA800101AB1");
        assert_eq!(sanitize_tax_id("ABCD800101AB1XYZ"), "ABCD800101AB1");
        assert_eq!(sanitize_tax_id(" abc 123 "), "ABC123");
    }

    #[test]
    fn test_sanitize_digits() {
        assert_eq!(sanitize_phone("(55) 1234-5678 ext 9"), "5512345678");
        assert_eq!(
            sanitize_account_number("0121 8000 1234 5678 90 12"),
            "012180001234567890"
        );
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(s in "\\PC{0,24}") {
            let once = normalize_local_part(&s);
            prop_assert_eq!(normalize_local_part(&once), once.clone());
        }

        #[test]
        fn prop_output_is_ascii_lowercase(s in "\\PC{0,24}") {
            let out = normalize_local_part(&s);
            prop_assert!(out.chars().all(|c| c.is_ascii_lowercase()));
        }
    }
}
