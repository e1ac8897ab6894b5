//! Globally unique identifiers used as resource keys.
//!
//! # Textual Form
//! ```text
//! {xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx}
//! ```
//! `Display` always renders the braced lower-case form. Parsing also accepts
//! the bare hyphenated form.
//!
//! # Name-derived guids
//! Resources are usually addressed by a human-readable name (a texture path, a
//! material name). [`Guid::from_name`] maps such a name to a stable guid so the
//! same name always resolves to the same registry slot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Namespace for name-derived guids.
const NAME_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_3c2e_84d7_4b59_9e0a_5d21_c7f8_03b4);

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Errors produced while parsing a [`Guid`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuidError {
    #[error("guid has invalid length {0} (expected 36 or 38 characters)")]
    InvalidLength(usize),
    #[error("braced guid must start with '{{' and end with '}}'")]
    MissingBraces,
    #[error("malformed guid: {0}")]
    Malformed(String),
}

/// A 128-bit identifier.
///
/// # Examples
/// ```
/// use engine_core::guid::Guid;
///
/// let brick = Guid::from_name("textures/brick.png");
/// assert_eq!(brick, Guid::from_name("textures/brick.png"));
/// assert!(Guid::from_name("").is_empty());
///
/// let parsed: Guid = brick.to_string().parse().unwrap();
/// assert_eq!(parsed, brick);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Guid(Uuid);

impl Guid {
    /// The empty guid. Never cached by the registry.
    pub const EMPTY: Guid = Guid(Uuid::nil());

    /// Creates a new random guid.
    pub fn new() -> Self {
        Guid(Uuid::new_v4())
    }

    /// Derives a stable guid from a name. The empty name yields [`Guid::EMPTY`].
    pub fn from_name(name: &str) -> Self {
        if name.is_empty() {
            return Guid::EMPTY;
        }
        Guid(Uuid::new_v5(&NAME_NAMESPACE, name.as_bytes()))
    }

    /// Create from the raw 128-bit value.
    pub const fn from_u128(v: u128) -> Self {
        Guid(Uuid::from_u128(v))
    }

    /// Parses the braced or hyphenated textual form.
    pub fn parse(text: &str) -> Result<Self, GuidError> {
        let text = text.trim();
        let inner = match text.len() {
            38 => text
                .strip_prefix('{')
                .and_then(|t| t.strip_suffix('}'))
                .ok_or(GuidError::MissingBraces)?,
            36 => text,
            len => return Err(GuidError::InvalidLength(len)),
        };

        Uuid::parse_str(inner)
            .map(Guid)
            .map_err(|e| GuidError::Malformed(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// 64-bit FNV-1a hash of the 16 bytes.
    pub fn hash_code(&self) -> u64 {
        self.as_bytes().iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
        })
    }
}

impl Default for Guid {
    /// Creates a new random guid.
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Guid(uuid)
    }
}

impl From<&str> for Guid {
    fn from(name: &str) -> Self {
        Guid::from_name(name)
    }
}

impl From<&String> for Guid {
    fn from(name: &String) -> Self {
        Guid::from_name(name)
    }
}

impl From<String> for Guid {
    fn from(name: String) -> Self {
        Guid::from_name(&name)
    }
}

impl FromStr for Guid {
    type Err = GuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Guid::parse(s)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.braced())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({})", self.0.braced())
    }
}
