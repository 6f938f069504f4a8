use std::collections::BTreeSet;

use super::{
    errors::MessageError,
    models::{Scope, ScopeKey},
};
use crate::group::GroupRegistry;
use crate::types::AgentId;

/// Expand a scope into its rate-limit bucket and de-duplicated recipients
///
/// The sender never receives its own message. An empty expansion is invalid.
pub fn resolve_recipients(
    groups: &GroupRegistry,
    sender: AgentId,
    scope: Scope,
) -> Result<(ScopeKey, Vec<AgentId>), MessageError> {
    let (key, candidates) = match scope {
        Scope::Group => {
            let group = groups
                .group_of(sender)
                .ok_or_else(|| MessageError::invalid(format!("{} is not in a group", sender)))?;
            (ScopeKey::Group(group), groups.members(group))
        }
        Scope::Role(role) => {
            let group = groups
                .group_of(sender)
                .ok_or_else(|| MessageError::invalid(format!("{} is not in a group", sender)))?;
            (
                ScopeKey::Role(group, role),
                groups.members_with_role(group, role),
            )
        }
        Scope::Direct(recipient) => (ScopeKey::Direct(recipient), vec![recipient]),
    };

    let recipients: BTreeSet<AgentId> = candidates
        .into_iter()
        .filter(|member| *member != sender)
        .collect();

    if recipients.is_empty() {
        return Err(MessageError::invalid(format!(
            "scope {:?} of {} resolved to no recipients",
            scope, sender
        )));
    }

    Ok((key, recipients.into_iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBus;
    use crate::group::MembershipUpdate;
    use crate::types::{GroupId, Role};

    fn registry() -> GroupRegistry {
        let bus = EventBus::with_default_config();
        let mut groups = GroupRegistry::new();
        for agent in 1..=3 {
            groups.apply(MembershipUpdate::joined(GroupId(9), AgentId(agent)), 0, &bus);
        }
        groups.set_role(AgentId(2), Role::Healer);
        groups
    }

    #[test]
    fn test_group_scope_excludes_sender() {
        let groups = registry();
        let (key, recipients) = resolve_recipients(&groups, AgentId(1), Scope::Group).unwrap();

        assert_eq!(key, ScopeKey::Group(GroupId(9)));
        assert_eq!(recipients, vec![AgentId(2), AgentId(3)]);
    }

    #[test]
    fn test_role_scope_stays_inside_sender_group() {
        let groups = registry();
        let (key, recipients) =
            resolve_recipients(&groups, AgentId(1), Scope::Role(Role::Healer)).unwrap();

        assert_eq!(key, ScopeKey::Role(GroupId(9), Role::Healer));
        assert_eq!(recipients, vec![AgentId(2)]);

        let empty = resolve_recipients(&groups, AgentId(1), Scope::Role(Role::Tank));
        assert!(matches!(empty, Err(MessageError::InvalidMessage(_))));
    }

    #[test]
    fn test_groupless_sender_and_self_direct_are_invalid() {
        let groups = registry();

        assert!(resolve_recipients(&groups, AgentId(50), Scope::Group).is_err());
        assert!(resolve_recipients(&groups, AgentId(1), Scope::Direct(AgentId(1))).is_err());

        let (_, recipients) =
            resolve_recipients(&groups, AgentId(50), Scope::Direct(AgentId(1))).unwrap();
        assert_eq!(recipients, vec![AgentId(1)]);
    }
}
