use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::EnumIter;

/// Simulated time in milliseconds, supplied by the tick driver
pub type Millis = u64;

/// Identifier of an autonomous agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// Identifier of a coordination group (party, raid, squad)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// Opaque game resource identifier (ability, item, spell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u32);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource-{}", self.0)
    }
}

/// Opaque world entity identifier (enemy, ally, object)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity-{}", self.0)
    }
}

/// Functional role an agent is tagged with inside its group
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tank,
    Healer,
    Damage,
    Support,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Role::Tank => "tank",
                Role::Healer => "healer",
                Role::Damage => "damage",
                Role::Support => "support",
            }
        )
    }
}

/// Category of action an opportunity calls for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Interrupt,
    Dispel,
    Protect,
    Heal,
    Taunt,
    CrowdControl,
    /// Game-specific category outside the common set
    Custom(u32),
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionCategory::Interrupt => write!(f, "interrupt"),
            ActionCategory::Dispel => write!(f, "dispel"),
            ActionCategory::Protect => write!(f, "protect"),
            ActionCategory::Heal => write!(f, "heal"),
            ActionCategory::Taunt => write!(f, "taunt"),
            ActionCategory::CrowdControl => write!(f, "crowd_control"),
            ActionCategory::Custom(id) => write!(f, "custom-{}", id),
        }
    }
}

impl TryFrom<&str> for ActionCategory {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "interrupt" => Ok(ActionCategory::Interrupt),
            "dispel" => Ok(ActionCategory::Dispel),
            "protect" => Ok(ActionCategory::Protect),
            "heal" => Ok(ActionCategory::Heal),
            "taunt" => Ok(ActionCategory::Taunt),
            "crowd_control" => Ok(ActionCategory::CrowdControl),
            other => other
                .strip_prefix("custom-")
                .and_then(|id| id.parse().ok())
                .map(ActionCategory::Custom)
                .ok_or_else(|| s.to_string()),
        }
    }
}

/// Identity of an opportunity: what is being claimed, independent of who claims it
///
/// Two claims on the same subject and action collide deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetKey {
    /// Opaque subject, e.g. the cast instance or ally being acted upon
    pub subject: String,
    pub action: ActionCategory,
}

impl TargetKey {
    pub fn new(subject: impl Into<String>, action: ActionCategory) -> Self {
        Self {
            subject: subject.into(),
            action,
        }
    }

    /// Key for acting on a world entity
    pub fn for_entity(entity: EntityId, action: ActionCategory) -> Self {
        Self::new(entity.to_string(), action)
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject, self.action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ActionCategory::Interrupt)]
    #[case(ActionCategory::CrowdControl)]
    #[case(ActionCategory::Custom(42))]
    fn test_action_category_parses_its_display_form(#[case] action: ActionCategory) {
        let rendered = action.to_string();
        assert_eq!(ActionCategory::try_from(rendered.as_str()), Ok(action));
    }

    #[test]
    fn test_unknown_action_category_is_rejected() {
        assert!(ActionCategory::try_from("fireball").is_err());
        assert!(ActionCategory::try_from("custom-x").is_err());
    }

    #[test]
    fn test_target_keys_collide_on_subject_and_action() {
        let a = TargetKey::new("bossCast#7", ActionCategory::Interrupt);
        let b = TargetKey::new("bossCast#7", ActionCategory::Interrupt);
        let c = TargetKey::new("bossCast#7", ActionCategory::Dispel);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "bossCast#7/interrupt");
    }
}
