//! Token validation for the components of a trait key.
//!
//! Valid trait types:
//! - Must be non-empty
//! - Must start with an ASCII letter
//! - May contain only ASCII letters, digits and `_` (no hyphens)
//!
//! Valid qualifiers, branches and versions:
//! - Must be non-empty
//! - Must start with an ASCII letter or digit
//! - May contain only ASCII letters, digits, `_` and `.`

use crate::error::{KeyError, KeyResult};

/// Which component of a key is being validated. Only used for messages.
#[derive(Clone, Copy, Debug)]
enum Component {
    TraitType,
    Qualifier,
    Branch,
    Version,
}

impl Component {
    fn label(self) -> &'static str {
        match self {
            Self::TraitType => "trait type",
            Self::Qualifier => "qualifier",
            Self::Branch => "branch",
            Self::Version => "version",
        }
    }
}

/// Validate a trait type token, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use strata_keys::names::validate_trait_type;
///
/// assert!(validate_trait_type("image").is_ok());
/// assert!(validate_trait_type("velocity_map").is_ok());
/// assert!(validate_trait_type("2mass").is_err());
/// assert!(validate_trait_type("line-map").is_err());
/// ```
pub fn validate_trait_type(token: &str) -> KeyResult<()> {
    let mut chars = token.chars();
    match chars.next() {
        None => return Err(invalid(Component::TraitType, token, "must not be empty")),
        Some(first) if !first.is_ascii_alphabetic() => {
            return Err(invalid(
                Component::TraitType,
                token,
                "must start with a letter",
            ))
        }
        Some(_) => {}
    }
    if let Some(ch) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(invalid(
            Component::TraitType,
            token,
            &format!("contains forbidden character: {ch:?}"),
        ));
    }
    Ok(())
}

/// Validate a trait qualifier token.
pub fn validate_qualifier(token: &str) -> KeyResult<()> {
    validate_tail_token(Component::Qualifier, token)
}

/// Validate a branch token.
pub fn validate_branch(token: &str) -> KeyResult<()> {
    validate_tail_token(Component::Branch, token)
}

/// Validate a version token.
pub fn validate_version(token: &str) -> KeyResult<()> {
    validate_tail_token(Component::Version, token)
}

fn validate_tail_token(component: Component, token: &str) -> KeyResult<()> {
    let mut chars = token.chars();
    match chars.next() {
        None => return Err(invalid(component, token, "must not be empty")),
        Some(first) if !first.is_ascii_alphanumeric() => {
            return Err(invalid(
                component,
                token,
                "must start with a letter or digit",
            ))
        }
        Some(_) => {}
    }
    if let Some(ch) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '.')) {
        return Err(invalid(
            component,
            token,
            &format!("contains forbidden character: {ch:?}"),
        ));
    }
    Ok(())
}

fn invalid(component: Component, token: &str, reason: &str) -> KeyError {
    KeyError::malformed(token, format!("invalid {}: {reason}", component.label()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_trait_types() {
        assert!(validate_trait_type("image").is_ok());
        assert!(validate_trait_type("Image").is_ok());
        assert!(validate_trait_type("line_map").is_ok());
        assert!(validate_trait_type("x2").is_ok());
    }

    #[test]
    fn trait_type_rejects_empty() {
        assert!(validate_trait_type("").is_err());
    }

    #[test]
    fn trait_type_rejects_leading_digit() {
        assert!(validate_trait_type("1image").is_err());
    }

    #[test]
    fn trait_type_rejects_leading_underscore() {
        assert!(validate_trait_type("_image").is_err());
    }

    #[test]
    fn trait_type_rejects_hyphen() {
        assert!(validate_trait_type("line-map").is_err());
    }

    #[test]
    fn trait_type_rejects_dot() {
        assert!(validate_trait_type("line.map").is_err());
    }

    #[test]
    fn valid_tail_tokens() {
        assert!(validate_qualifier("red").is_ok());
        assert!(validate_qualifier("Halpha").is_ok());
        assert!(validate_branch("1_comp").is_ok());
        assert!(validate_version("1.0").is_ok());
        assert!(validate_version("v2.1.3").is_ok());
    }

    #[test]
    fn tail_tokens_reject_empty() {
        assert!(validate_qualifier("").is_err());
        assert!(validate_branch("").is_err());
        assert!(validate_version("").is_err());
    }

    #[test]
    fn tail_tokens_reject_leading_dot() {
        assert!(validate_version(".1").is_err());
    }

    #[test]
    fn tail_tokens_reject_delimiters() {
        assert!(validate_qualifier("a-b").is_err());
        assert!(validate_branch("a:b").is_err());
        assert!(validate_version("1(0)").is_err());
        assert!(validate_branch("a/b").is_err());
    }

    #[test]
    fn error_names_the_component() {
        let err = validate_branch("").unwrap_err();
        assert!(err.to_string().contains("branch"));
    }
}
