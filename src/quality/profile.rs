use serde::{Deserialize, Serialize};

use super::definition::QualityLadder;
use super::normalize_quality_name;
use crate::domain::ProperPreference;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileItem {
    pub quality: String,

    #[serde(default = "default_true")]
    pub allowed: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProfile {
    #[serde(default)]
    pub id: i32,

    pub name: String,

    pub cutoff: String,

    #[serde(default = "default_true")]
    pub upgrade_allowed: bool,

    /// Allow-list; qualities missing from it are disallowed.
    pub items: Vec<ProfileItem>,
}

/// Proper/repack facts about the file on disk and the candidate release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevisionFacts {
    pub current_is_proper: bool,
    pub new_is_proper: bool,
}

impl QualityProfile {
    #[must_use]
    pub fn default_profile() -> Self {
        let allowed = [
            "HDTV-720p",
            "WEB-720p",
            "Bluray-720p",
            "HDTV-1080p",
            "WEB-1080p",
            "Bluray-1080p",
        ];

        Self {
            id: 0,
            name: "Default".to_string(),
            cutoff: "Bluray-1080p".to_string(),
            upgrade_allowed: true,
            items: allowed
                .iter()
                .map(|q| ProfileItem {
                    quality: (*q).to_string(),
                    allowed: true,
                })
                .collect(),
        }
    }

    /// Checks the allow-list directly and through the normalized group.
    #[must_use]
    pub fn is_quality_allowed(&self, quality: &str) -> bool {
        let normalized = normalize_quality_name(quality);
        self.items.iter().any(|item| {
            item.allowed
                && (item.quality.eq_ignore_ascii_case(quality.trim())
                    || normalize_quality_name(&item.quality).eq_ignore_ascii_case(&normalized))
        })
    }

    #[must_use]
    pub fn cutoff_weight(&self, ladder: &QualityLadder) -> i32 {
        ladder.weight_of(&self.cutoff)
    }

    /// True once the quality reaches the cutoff. Unresolvable weights never do.
    #[must_use]
    pub fn meets_cutoff(&self, ladder: &QualityLadder, quality: &str) -> bool {
        let weight = ladder.weight_of(&normalize_quality_name(quality));
        let cutoff = self.cutoff_weight(ladder);
        if weight == 0 || cutoff == 0 {
            return false;
        }
        weight >= cutoff
    }

    pub fn evaluate_upgrade(
        &self,
        ladder: &QualityLadder,
        current: &str,
        new: &str,
        facts: RevisionFacts,
        preference: ProperPreference,
    ) -> UpgradeDecision {
        if !self.upgrade_allowed {
            return UpgradeDecision::Reject(RejectReason::UpgradesDisabled);
        }

        let current_weight = ladder.weight_of(&normalize_quality_name(current));
        let new_weight = ladder.weight_of(&normalize_quality_name(new));

        if current_weight == new_weight {
            if facts.current_is_proper {
                return UpgradeDecision::Reject(RejectReason::AlreadyProper);
            }
            if facts.new_is_proper {
                if preference == ProperPreference::DoNotUpgrade {
                    return UpgradeDecision::Reject(RejectReason::PropersDisabled);
                }
                if !self.is_quality_allowed(new) {
                    return UpgradeDecision::Reject(RejectReason::QualityNotAllowed);
                }
                return UpgradeDecision::Upgrade(UpgradeReason::ProperRelease);
            }
            return UpgradeDecision::Reject(RejectReason::NoImprovement);
        }

        if current_weight >= self.cutoff_weight(ladder) {
            return UpgradeDecision::Reject(RejectReason::AlreadyAtCutoff);
        }

        if new_weight <= current_weight {
            return UpgradeDecision::Reject(RejectReason::NoImprovement);
        }

        if !self.is_quality_allowed(new) {
            return UpgradeDecision::Reject(RejectReason::QualityNotAllowed);
        }

        UpgradeDecision::Upgrade(UpgradeReason::BetterQuality)
    }

    #[must_use]
    pub fn should_upgrade(
        &self,
        ladder: &QualityLadder,
        current: &str,
        new: &str,
        facts: RevisionFacts,
        preference: ProperPreference,
    ) -> bool {
        self.evaluate_upgrade(ladder, current, new, facts, preference)
            .is_upgrade()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeDecision {
    Upgrade(UpgradeReason),

    Reject(RejectReason),
}

impl UpgradeDecision {
    #[must_use]
    pub const fn is_upgrade(&self) -> bool {
        matches!(self, Self::Upgrade(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeReason {
    BetterQuality,
    ProperRelease,
}

impl std::fmt::Display for UpgradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BetterQuality => write!(f, "better quality available"),
            Self::ProperRelease => write!(f, "proper/repack of the same quality"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    QualityNotAllowed,
    UpgradesDisabled,
    AlreadyAtCutoff,
    NoImprovement,
    AlreadyProper,
    PropersDisabled,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QualityNotAllowed => write!(f, "quality not allowed in profile"),
            Self::UpgradesDisabled => write!(f, "upgrades disabled"),
            Self::AlreadyAtCutoff => write!(f, "already at quality cutoff"),
            Self::NoImprovement => write!(f, "no quality improvement"),
            Self::AlreadyProper => write!(f, "current file is already a proper"),
            Self::PropersDisabled => write!(f, "proper upgrades disabled"),
        }
    }
}
