//! Key matching for pattern-based cache invalidation.

use regex::Regex;
use tracing::warn;

/// Characters that mark a pattern as a regex rather than a literal key.
const META: &str = ".*?+[](){}|^$\\";

/// A compiled invalidation pattern.
///
/// A plain string with no regex metacharacters matches exactly one key;
/// anything else is compiled as a regex and matched against every key.
#[derive(Debug, Clone)]
pub enum KeyPattern {
  Exact(String),
  Regex(Regex),
}

impl KeyPattern {
  /// Compile a pattern. Returns `None` for an invalid regex; the cache
  /// contract never surfaces errors, so callers treat `None` as zero matches.
  pub fn parse(pattern: &str) -> Option<Self> {
    if pattern.chars().any(|c| META.contains(c)) {
      match Regex::new(pattern) {
        Ok(re) => Some(Self::Regex(re)),
        Err(err) => {
          warn!(pattern, %err, "invalid invalidation pattern, ignoring");
          None
        }
      }
    } else {
      Some(Self::Exact(pattern.to_string()))
    }
  }

  pub fn matches(&self, key: &str) -> bool {
    match self {
      Self::Exact(exact) => key == exact,
      Self::Regex(re) => re.is_match(key),
    }
  }
}
