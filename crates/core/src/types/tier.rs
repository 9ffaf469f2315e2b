//! Account tier.

use serde::{Deserialize, Serialize};

/// Error returned when a string is not a known [`Tier`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid account tier: {0}")]
pub struct TierError(pub String);

/// Account classification.
///
/// Subscribers are password-less newsletter sign-ups; members carry a
/// password. Tiers only ever move upward: a member is never demoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Subscriber,
    Member,
}

impl Tier {
    /// Whether an account at this tier may move to `next`.
    ///
    /// Staying put is always allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Subscriber, _) | (Self::Member, Self::Member)
        )
    }

    /// Returns the wire name of this tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscriber => "subscriber",
            Self::Member => "member",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = TierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscriber" => Ok(Self::Subscriber),
            "member" => Ok(Self::Member),
            _ => Err(TierError(s.to_owned())),
        }
    }
}
