pub mod dnd;

use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::error::DomainError;
use crate::ids::{OrganizationId, TeamId, UserId};

pub use dnd::{AllowReason, DndDecision, DndOverride, DndSettings, QuietHours};

/// Per-user notification channels and quiet hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    user_id: UserId,
    channels: Vec<Channel>,
    dnd: DndSettings,
}

impl UserPreferences {
    pub fn new(user_id: UserId, channels: Vec<Channel>) -> Self {
        let mut prefs = Self {
            user_id,
            channels: vec![],
            dnd: DndSettings::default(),
        };
        prefs.set_channels(channels);
        prefs
    }

    pub fn with_dnd(mut self, dnd: DndSettings) -> Self {
        self.dnd = dnd;
        self
    }

    pub fn set_channels(&mut self, channels: Vec<Channel>) {
        self.channels.clear();
        for channel in channels {
            if !self.channels.contains(&channel) {
                self.channels.push(channel);
            }
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn dnd(&self) -> &DndSettings {
        &self.dnd
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    id: TeamId,
    organization_id: OrganizationId,
    name: String,
    members: Vec<UserId>,
}

impl Team {
    pub fn new(
        organization_id: OrganizationId,
        name: String,
        members: Vec<UserId>,
    ) -> Result<Self, DomainError> {
        if members.is_empty() {
            return Err(DomainError::TeamRequiresMember);
        }
        Ok(Self {
            id: TeamId::new(),
            organization_id,
            name,
            members,
        })
    }

    pub fn add_member(&mut self, user_id: UserId) {
        if !self.members.contains(&user_id) {
            self.members.push(user_id);
        }
    }

    pub fn id(&self) -> &TeamId {
        &self.id
    }

    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[UserId] {
        &self.members
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_requires_member() {
        let result = Team::new(OrganizationId::new(), "empty".into(), vec![]);
        assert!(matches!(result, Err(DomainError::TeamRequiresMember)));
    }

    #[test]
    fn team_members_are_unique() {
        let alice = UserId::new();
        let mut team = Team::new(OrganizationId::new(), "backend".into(), vec![alice.clone()]).unwrap();
        team.add_member(alice);
        team.add_member(UserId::new());
        assert_eq!(team.members().len(), 2);
    }

    #[test]
    fn preference_channels_are_deduplicated() {
        let prefs = UserPreferences::new(
            UserId::new(),
            vec![Channel::Slack, Channel::Sms, Channel::Slack],
        );
        assert_eq!(prefs.channels(), [Channel::Slack, Channel::Sms]);
        assert!(!prefs.dnd().is_enabled());
    }
}
