//! Workspace identifier validation.
//!
//! Obsidian names each vault by a 16-character lowercase hex id; the same id
//! is embedded verbatim in the Local Storage key, so nothing else is accepted.

use std::fmt;
use std::str::FromStr;

pub const WORKSPACE_ID_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidWorkspaceId {
    #[error("Workspace ID must be 16 characters long (got {len})")]
    WrongLength { len: usize },

    #[error("Workspace ID must be a hex string (found {found:?})")]
    NotHex { found: char },
}

/// A validated workspace id: exactly 16 characters of `[0-9a-f]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn parse(input: &str) -> Result<Self, InvalidWorkspaceId> {
        let len = input.chars().count();
        if len != WORKSPACE_ID_LEN {
            return Err(InvalidWorkspaceId::WrongLength { len });
        }

        if let Some(found) = input.chars().find(|c| !is_lower_hex(*c)) {
            return Err(InvalidWorkspaceId::NotHex { found });
        }

        Ok(Self(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_lower_hex(c: char) -> bool {
    c.is_ascii_digit() || ('a'..='f').contains(&c)
}

impl FromStr for WorkspaceId {
    type Err = InvalidWorkspaceId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for WorkspaceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_lowercase_hex() {
        let id = WorkspaceId::parse("abcdef0123456789").unwrap();
        assert_eq!(id.as_str(), "abcdef0123456789");
        assert_eq!(id.to_string(), "abcdef0123456789");

        let parsed: WorkspaceId = "0000000000000000".parse().unwrap();
        assert_eq!(parsed.as_ref(), "0000000000000000");
    }

    #[test]
    fn test_rejects_wrong_length_regardless_of_content() {
        for input in ["", "short", "abcdef012345678", "abcdef01234567890", "ZZZZZZZZZZZZZZZZZ"] {
            let err = WorkspaceId::parse(input).unwrap_err();
            assert_eq!(
                err,
                InvalidWorkspaceId::WrongLength { len: input.chars().count() },
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_rejects_non_hex() {
        let err = WorkspaceId::parse("ZZZZZZZZZZZZZZZZ").unwrap_err();
        assert_eq!(err, InvalidWorkspaceId::NotHex { found: 'Z' });
        assert!(err.to_string().contains("hex"));
    }

    #[test]
    fn test_rejects_uppercase_hex() {
        let err = WorkspaceId::parse("ABCDEF0123456789").unwrap_err();
        assert_eq!(err, InvalidWorkspaceId::NotHex { found: 'A' });
    }

    #[test]
    fn test_rejects_single_bad_char_at_any_position() {
        let valid = "0123456789abcdef";
        for pos in 0..WORKSPACE_ID_LEN {
            for bad in ['g', 'G', ' ', '-', 'é', '٣'] {
                let input: String = valid
                    .chars()
                    .enumerate()
                    .map(|(i, c)| if i == pos { bad } else { c })
                    .collect();
                assert_eq!(
                    WorkspaceId::parse(&input),
                    Err(InvalidWorkspaceId::NotHex { found: bad }),
                    "input {:?}",
                    input
                );
            }
        }
    }

    #[test]
    fn test_every_hex_digit_is_accepted() {
        let alphabet = "0123456789abcdef";
        for c in alphabet.chars() {
            let input: String = std::iter::repeat(c).take(WORKSPACE_ID_LEN).collect();
            assert!(WorkspaceId::parse(&input).is_ok(), "input {:?}", input);
        }
    }

    #[test]
    fn test_length_message() {
        let err = WorkspaceId::parse("short").unwrap_err();
        assert_eq!(err.to_string(), "Workspace ID must be 16 characters long (got 5)");
    }
}
