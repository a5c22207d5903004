//! Shard functions and their persisted encoding.
//!
//! A shard function maps the leaf of a key to a short bucket name. The
//! function is identified by a one-line descriptor such as
//! `/repo/flatfs/shard/v1/next-to-last/2`, which is stored alongside the
//! data so a store can be reopened with the exact function it was created
//! with.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strata_store::StoreError;

/// Descriptor prefix shared by every shard function.
pub const SHARD_PREFIX: &str = "/repo/flatfs/shard/";

/// The only supported descriptor version.
pub const SHARD_VERSION: &str = "v1";

/// Reserved child key holding the descriptor, newline terminated.
pub const SHARDING_KEY: &str = "/SHARDING";

/// Reserved child key holding [`README`].
pub const README_KEY: &str = "/_README";

/// Human-readable description stored next to sharded data.
pub const README: &str = "This is a repository of sharded key-value data.

Every key is stored under a directory named after a short shard of its
last namespace. The shard function in use is recorded in the SHARDING
entry at the root of this store as a single line of the form

    /repo/flatfs/shard/v1/<function>/<param>

where <function> is one of:

  prefix        the first <param> characters, right-padded with '_'
  suffix        the last <param> characters, left-padded with '_'
  next-to-last  the <param> characters before the last one,
                left-padded with '_'

Do not edit SHARDING by hand: data written with one shard function cannot
be found with another.
";

/// Largest shard width accepted by [`ShardFunction::parse`] and
/// [`ShardFunction::validate`].
pub const MAX_SHARD_PARAM: usize = 256;

const PAD: char = '_';

/// A deterministic bucket function over a key's leaf namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ShardFunction {
    /// First `n` characters.
    Prefix(usize),
    /// Last `n` characters.
    Suffix(usize),
    /// The `n` characters before the last one.
    NextToLast(usize),
}

impl ShardFunction {
    /// Function name as it appears in the descriptor.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Prefix(_) => "prefix",
            Self::Suffix(_) => "suffix",
            Self::NextToLast(_) => "next-to-last",
        }
    }

    pub fn param(&self) -> usize {
        match *self {
            Self::Prefix(n) | Self::Suffix(n) | Self::NextToLast(n) => n,
        }
    }

    /// Compute the shard of `leaf`. Always exactly `param()` characters.
    pub fn apply(&self, leaf: &str) -> String {
        let chars: Vec<char> = leaf.chars().collect();
        match *self {
            Self::Prefix(n) => {
                let pad = n.saturating_sub(chars.len());
                chars
                    .iter()
                    .take(n)
                    .copied()
                    .chain(std::iter::repeat(PAD).take(pad))
                    .collect()
            }
            Self::Suffix(n) => right_aligned(&chars, n),
            Self::NextToLast(n) => {
                let body = &chars[..chars.len().saturating_sub(1)];
                right_aligned(body, n)
            }
        }
    }

    /// Fail with [`StoreError::InvalidShardEncoding`] if the width exceeds
    /// [`MAX_SHARD_PARAM`].
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.param() > MAX_SHARD_PARAM {
            return Err(StoreError::InvalidShardEncoding {
                encoding: self.encoding(),
                reason: format!("parameter exceeds {MAX_SHARD_PARAM}"),
            });
        }
        Ok(())
    }

    /// The descriptor line, without the trailing newline.
    pub fn encoding(&self) -> String {
        self.to_string()
    }

    /// Parse a descriptor. A single trailing newline is accepted.
    pub fn parse(encoding: &str) -> Result<Self, StoreError> {
        let invalid = |reason: &str| StoreError::InvalidShardEncoding {
            encoding: encoding.to_string(),
            reason: reason.to_string(),
        };

        let line = encoding.strip_suffix('\n').unwrap_or(encoding);
        let rest = line
            .strip_prefix(SHARD_PREFIX)
            .ok_or_else(|| invalid("missing /repo/flatfs/shard/ prefix"))?;

        let parts: Vec<&str> = rest.split('/').collect();
        let [version, name, param] = parts.as_slice() else {
            return Err(invalid("expected <version>/<function>/<param>"));
        };
        if *version != SHARD_VERSION {
            return Err(invalid("unsupported version"));
        }
        if param.is_empty() || !param.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("parameter must be a non-negative integer"));
        }
        let n: usize = param.parse().map_err(|_| invalid("parameter out of range"))?;
        if n > MAX_SHARD_PARAM {
            return Err(invalid("parameter out of range"));
        }

        match *name {
            "prefix" => Ok(Self::Prefix(n)),
            "suffix" => Ok(Self::Suffix(n)),
            "next-to-last" => Ok(Self::NextToLast(n)),
            _ => Err(invalid("unknown shard function")),
        }
    }
}

/// The last `n` characters of `chars`, left-padded to `n`.
fn right_aligned(chars: &[char], n: usize) -> String {
    let pad = n.saturating_sub(chars.len());
    let start = chars.len().saturating_sub(n);
    std::iter::repeat(PAD)
        .take(pad)
        .chain(chars[start..].iter().copied())
        .collect()
}

impl fmt::Display for ShardFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SHARD_PREFIX}{SHARD_VERSION}/{}/{}", self.name(), self.param())
    }
}

impl FromStr for ShardFunction {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ShardFunction {
    type Error = StoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ShardFunction> for String {
    fn from(shard: ShardFunction) -> Self {
        shard.encoding()
    }
}
