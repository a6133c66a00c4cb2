//! Normalization rules shared by every handler and repository that accepts
//! operator-supplied identifiers. Centralized here so a reseller code typed
//! in the platform API and one typed during a claim handshake normalize
//! identically.

use crate::error::CoreError;

/// Domain keys (SETTINGS, MENU, …) are upper-cased and restricted to
/// `A-Z 0-9 : _ -`. Empty input or a character outside that set is a
/// validation error, not a silent truncation.
pub fn normalize_domain(raw: &str) -> Result<String, CoreError> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(CoreError::validation("domain must not be empty"));
    }
    if !upper
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, ':' | '_' | '-'))
    {
        return Err(CoreError::validation(format!(
            "domain '{raw}' contains characters outside A-Z 0-9 : _ -"
        )));
    }
    Ok(upper)
}

/// Reseller/Store codes: upper-cased, non-empty, restricted to
/// alphanumerics, dash and underscore.
pub fn normalize_code(raw: &str) -> Result<String, CoreError> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(CoreError::validation("code must not be empty"));
    }
    if !upper
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
    {
        return Err(CoreError::validation(format!(
            "code '{raw}' contains characters outside A-Z 0-9 _ -"
        )));
    }
    Ok(upper)
}

/// Tenant slugs: lower-cased, non-empty, restricted to alphanumerics and
/// dash (URL-safe).
pub fn normalize_slug(raw: &str) -> Result<String, CoreError> {
    let lower = raw.trim().to_ascii_lowercase();
    if lower.is_empty() {
        return Err(CoreError::validation("slug must not be empty"));
    }
    if !lower
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(CoreError::validation(format!(
            "slug '{raw}' contains characters outside a-z 0-9 -"
        )));
    }
    Ok(lower)
}

/// Account emails are lower-cased and trimmed; this is not a full RFC 5322
/// validator, only the normalization the uniqueness index relies on.
pub fn normalize_email(raw: &str) -> Result<String, CoreError> {
    let lower = raw.trim().to_ascii_lowercase();
    if lower.is_empty() || !lower.contains('@') {
        return Err(CoreError::validation("email is not well-formed"));
    }
    Ok(lower)
}

/// Node keys minted from an external identifier (the claim handshake's
/// `serverUid`) are upper-cased, restricted to `A-Z 0-9 -`, and truncated to
/// 64 characters as required by §4.6 step 2.
pub fn normalize_node_key_fragment(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .to_ascii_uppercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    cleaned.chars().take(64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_normalizes_case_and_rejects_bad_chars() {
        assert_eq!(normalize_domain("settings").unwrap(), "SETTINGS");
        assert!(normalize_domain("men u!").is_err());
        assert!(normalize_domain("").is_err());
    }

    #[test]
    fn node_key_fragment_is_truncated_and_cleaned() {
        let long = "a".repeat(100);
        assert_eq!(normalize_node_key_fragment(&long).len(), 64);
        assert_eq!(normalize_node_key_fragment("server-123"), "SERVER-123");
    }
}
