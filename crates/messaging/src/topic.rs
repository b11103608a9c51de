use thiserror::Error;

/// Suffix appended to a pattern to derive its reply topic.
pub const REPLY_SUFFIX: &str = ".reply";

/// An error that can occur when validating a pattern name.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The pattern is empty.
    #[error("pattern must not be empty")]
    Empty,

    /// The pattern contains whitespace or broker wildcard characters.
    #[error("pattern must not contain whitespace, '*', or '>'")]
    InvalidCharacter,

    /// The pattern ends in the reply suffix.
    #[error("pattern must not end in '{REPLY_SUFFIX}' - reserved for replies")]
    ReservedSuffix,
}

/// Derives the reply topic for a pattern.
///
/// Requesters subscribe to this topic before sending; responders publish
/// replies to it. Both sides must agree on this derivation, since decoupled
/// services locate each other purely by convention.
#[must_use]
pub fn reply_topic(pattern: &str) -> String {
    format!("{pattern}{REPLY_SUFFIX}")
}

/// Validates a pattern name.
///
/// # Errors
/// Returns an error if the pattern is empty, contains whitespace or wildcard
/// characters, or ends in the reserved reply suffix.
pub fn validate_pattern(pattern: &str) -> Result<(), Error> {
    if pattern.is_empty() {
        return Err(Error::Empty);
    }
    if pattern
        .chars()
        .any(|c| c.is_whitespace() || c == '*' || c == '>')
    {
        return Err(Error::InvalidCharacter);
    }
    if pattern.ends_with(REPLY_SUFFIX) {
        return Err(Error::ReservedSuffix);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_topic_derivation() {
        assert_eq!(reply_topic("auth.verify-token"), "auth.verify-token.reply");
    }

    #[test]
    fn test_valid_patterns() {
        assert!(validate_pattern("auth.verify-token").is_ok());
        assert!(validate_pattern("post.create").is_ok());
        assert!(validate_pattern("notification").is_ok());
    }

    #[test]
    fn test_empty_pattern() {
        assert_eq!(validate_pattern(""), Err(Error::Empty));
    }

    #[test]
    fn test_wildcards_and_whitespace() {
        assert_eq!(validate_pattern("auth.*"), Err(Error::InvalidCharacter));
        assert_eq!(validate_pattern("auth.>"), Err(Error::InvalidCharacter));
        assert_eq!(
            validate_pattern("auth verify"),
            Err(Error::InvalidCharacter)
        );
    }

    #[test]
    fn test_reserved_suffix() {
        assert_eq!(
            validate_pattern("auth.verify-token.reply"),
            Err(Error::ReservedSuffix)
        );
    }
}
