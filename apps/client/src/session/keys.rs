//! Physical key layout: `jm_<logicalName>::<identity>`.

use std::fmt;

use crate::session::identity::SessionIdentity;

/// Prefix carried by every key this client writes.
pub const KEY_PREFIX: &str = "jm_";
/// Separates the logical name from the identity segment.
pub const NAMESPACE_SEPARATOR: &str = "::";

/// Unprefixed keys written by older clients. Never read; only `full_reset` removes them.
pub const LEGACY_UNPREFIXED_KEYS: &[&str] = &["feedback", "cvFileName", "jobDescriptionFileName"];

/// Name of a cache entry, independent of who owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogicalName(&'static str);

impl LogicalName {
    /// Last analysis result returned by the remote API.
    pub const FEEDBACK: LogicalName = LogicalName("feedback");
    pub const CV_FILE_NAME: LogicalName = LogicalName("cvFileName");
    pub const JD_FILE_NAME: LogicalName = LogicalName("jobDescriptionFileName");
    /// Canonical job description text.
    pub const JOB_DESCRIPTION: LogicalName = LogicalName("jobDescription");
    /// Canonical resume text.
    pub const CV_TEXT: LogicalName = LogicalName("cvText");
    pub const QUESTIONS: LogicalName = LogicalName("chatprep_questions");
    pub const QA_LIST: LogicalName = LogicalName("chatprep_qaList");

    /// Every name the client knows about.
    pub const ALL: [LogicalName; 7] = [
        Self::FEEDBACK,
        Self::CV_FILE_NAME,
        Self::JD_FILE_NAME,
        Self::JOB_DESCRIPTION,
        Self::CV_TEXT,
        Self::QUESTIONS,
        Self::QA_LIST,
    ];

    /// Names dropped by session teardown: full document text is not kept across logins.
    pub const TRANSIENT: [LogicalName; 2] = [Self::JOB_DESCRIPTION, Self::CV_TEXT];

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for LogicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Composes the physical key for `name` owned by `identity`.
pub fn namespaced_key(name: LogicalName, identity: &SessionIdentity) -> String {
    format!(
        "{KEY_PREFIX}{}{NAMESPACE_SEPARATOR}{}",
        name.as_str(),
        identity.as_str()
    )
}

/// A physical key split back into its parts.
#[derive(Debug, PartialEq, Eq)]
pub struct ParsedKey<'a> {
    pub logical_name: &'a str,
    pub identity: &'a str,
}

/// Splits a physical key at the first separator after the prefix.
///
/// Logical names never contain the separator, so the identity segment is
/// everything after it, separators included.
pub fn parse_key(physical: &str) -> Option<ParsedKey<'_>> {
    let rest = physical.strip_prefix(KEY_PREFIX)?;
    let (logical_name, identity) = rest.split_once(NAMESPACE_SEPARATOR)?;
    if logical_name.is_empty() {
        return None;
    }
    Some(ParsedKey {
        logical_name,
        identity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> SessionIdentity {
        SessionIdentity::new(raw).unwrap()
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(
            namespaced_key(LogicalName::FEEDBACK, &id("u1")),
            "jm_feedback::u1"
        );
    }

    #[test]
    fn test_parse_round_trips_identity_with_separator() {
        let key = namespaced_key(LogicalName::QA_LIST, &id("tenant::u1"));
        let parsed = parse_key(&key).unwrap();
        assert_eq!(parsed.logical_name, "chatprep_qaList");
        assert_eq!(parsed.identity, "tenant::u1");
    }

    #[test]
    fn test_distinct_identities_never_share_a_key() {
        let a = namespaced_key(LogicalName::CV_TEXT, &id("a"));
        let b = namespaced_key(LogicalName::CV_TEXT, &id("a::"));
        let c = namespaced_key(LogicalName::CV_TEXT, &id("A"));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_unscoped_keys_do_not_parse() {
        assert_eq!(parse_key("jm_userId"), None);
        assert_eq!(parse_key("feedback"), None);
        assert_eq!(parse_key("jm_::u1"), None);
    }
}
