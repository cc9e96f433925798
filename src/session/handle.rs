//! Command handle type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Leading text of every completion token.
pub const TOKEN_PREFIX: &str = "__PIPE_SHELL_DONE_";

/// Trailing text of every completion token.
pub const TOKEN_SUFFIX: &str = "__";

/// Identifier of one issued command.
///
/// The handle doubles as the command's completion token: its text is what
/// the shell echoes once the command has finished. It is displayed as
/// `__PIPE_SHELL_DONE_<base>_<seq>__` where `<base>` is the session's
/// random marker base and `<seq>` is the hexadecimal issuance count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommandHandle(String);

impl CommandHandle {
    pub(crate) fn new(base: &str, seq: u64) -> Self {
        Self(format!("{TOKEN_PREFIX}{base}_{seq:x}{TOKEN_SUFFIX}"))
    }

    /// The token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The marker base of the session that minted this handle.
    pub fn marker_base(&self) -> &str {
        self.parts().map(|(base, _)| base).unwrap_or_default()
    }

    /// The issuance count encoded in the handle.
    pub fn sequence(&self) -> u64 {
        self.parts()
            .and_then(|(_, seq)| u64::from_str_radix(seq, 16).ok())
            .unwrap_or_default()
    }

    fn parts(&self) -> Option<(&str, &str)> {
        split_token(&self.0)
    }
}

fn split_token(s: &str) -> Option<(&str, &str)> {
    let inner = s.strip_prefix(TOKEN_PREFIX)?.strip_suffix(TOKEN_SUFFIX)?;
    let (base, seq) = inner.rsplit_once('_')?;
    let valid = !base.is_empty()
        && base.chars().all(|c| c.is_ascii_alphanumeric())
        && !seq.is_empty()
        && seq.chars().all(|c| c.is_ascii_hexdigit());
    valid.then_some((base, seq))
}

impl fmt::Display for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CommandHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CommandHandle {
    type Err = crate::error::PipeShellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        split_token(s)
            .and_then(|(_, seq)| u64::from_str_radix(seq, 16).ok())
            .map(|_| CommandHandle(s.to_string()))
            .ok_or_else(|| crate::error::PipeShellError::InvalidHandle(s.into()))
    }
}

impl TryFrom<String> for CommandHandle {
    type Error = crate::error::PipeShellError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CommandHandle> for String {
    fn from(handle: CommandHandle) -> Self {
        handle.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_display_format() {
        let handle = CommandHandle::new("abc123", 255);
        assert_eq!(handle.to_string(), "__PIPE_SHELL_DONE_abc123_ff__");
        assert_eq!(handle.marker_base(), "abc123");
        assert_eq!(handle.sequence(), 255);
    }

    #[test]
    fn test_parse_valid() {
        let handle: CommandHandle = "__PIPE_SHELL_DONE_deadbeef_1a__".parse().unwrap();
        assert_eq!(handle.marker_base(), "deadbeef");
        assert_eq!(handle.sequence(), 0x1a);
    }

    #[test]
    fn test_parse_invalid() {
        // Missing prefix
        assert!("deadbeef_1__".parse::<CommandHandle>().is_err());

        // Missing suffix
        assert!("__PIPE_SHELL_DONE_deadbeef_1".parse::<CommandHandle>().is_err());

        // Invalid sequence
        assert!("__PIPE_SHELL_DONE_deadbeef_zz__"
            .parse::<CommandHandle>()
            .is_err());

        // Empty base
        assert!("__PIPE_SHELL_DONE__1__".parse::<CommandHandle>().is_err());

        // Empty
        assert!("".parse::<CommandHandle>().is_err());
    }

    #[test]
    fn test_distinct_sequences_are_distinct_handles() {
        let mut handles = HashSet::new();
        for seq in 0..1_000 {
            assert!(handles.insert(CommandHandle::new("base", seq)));
        }
        assert_eq!(handles.len(), 1_000);
    }

    #[test]
    fn test_serde_as_plain_string() {
        let handle = CommandHandle::new("cafe", 7);
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, "\"__PIPE_SHELL_DONE_cafe_7__\"");

        let back: CommandHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);

        assert!(serde_json::from_str::<CommandHandle>("\"nope\"").is_err());
    }
}
