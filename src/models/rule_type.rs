//! Notification rule types.

use serde::Serialize;
use std::str::FromStr;

/// How a notification-matching rule is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    AppFilter,
    KeywordFilter,
    TimeBased,
    /// Always surface one-time-password notifications
    OtpAlways,
    /// Silence promotional notifications
    PromoMute,
}

impl RuleType {
    pub const ALL: [RuleType; 5] = [
        RuleType::AppFilter,
        RuleType::KeywordFilter,
        RuleType::TimeBased,
        RuleType::OtpAlways,
        RuleType::PromoMute,
    ];

    /// Column value stored in `user_rules.rule_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppFilter => "app_filter",
            Self::KeywordFilter => "keyword_filter",
            Self::TimeBased => "time_based",
            Self::OtpAlways => "otp_always",
            Self::PromoMute => "promo_mute",
        }
    }

    /// Schema version that introduced this rule type.
    pub fn introduced_in(&self) -> u32 {
        match self {
            Self::AppFilter | Self::KeywordFilter | Self::TimeBased => 1,
            Self::OtpAlways | Self::PromoMute => 2,
        }
    }

    /// Rule types the `rule_type` check constraint admits at a schema version.
    ///
    /// Version 0 means the table does not exist yet.
    pub fn allowed_at(version: u32) -> Vec<RuleType> {
        Self::ALL
            .into_iter()
            .filter(|t| version >= t.introduced_in())
            .collect()
    }

    /// Column values admitted at a schema version, in declaration order.
    pub fn allowed_values_at(version: u32) -> Vec<String> {
        Self::allowed_at(version)
            .into_iter()
            .map(|t| t.as_str().to_string())
            .collect()
    }
}

impl FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown rule type: {}", s))
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
