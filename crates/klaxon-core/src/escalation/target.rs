use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::ids::{ScheduleId, TeamId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum TargetKind {
    User(UserId),
    Team(TeamId),
    Schedule(ScheduleId),
}

/// Per-target replacement for the recipient's own channel preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOverride {
    pub channels: Vec<Channel>,
    pub urgent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationTarget {
    kind: TargetKind,
    notification: Option<NotificationOverride>,
}

impl EscalationTarget {
    pub fn user(user_id: UserId) -> Self {
        Self::new(TargetKind::User(user_id))
    }

    pub fn team(team_id: TeamId) -> Self {
        Self::new(TargetKind::Team(team_id))
    }

    pub fn schedule(schedule_id: ScheduleId) -> Self {
        Self::new(TargetKind::Schedule(schedule_id))
    }

    pub fn new(kind: TargetKind) -> Self {
        Self {
            kind,
            notification: None,
        }
    }

    pub fn with_notification(mut self, notification: NotificationOverride) -> Self {
        self.notification = Some(notification);
        self
    }

    pub fn kind(&self) -> &TargetKind {
        &self.kind
    }

    pub fn notification(&self) -> Option<&NotificationOverride> {
        self.notification.as_ref()
    }

    /// Explicit channels, or `None` when the recipient's preferences apply.
    pub fn channel_override(&self) -> Option<&[Channel]> {
        self.notification
            .as_ref()
            .map(|n| n.channels.as_slice())
            .filter(|c| !c.is_empty())
    }

    pub fn is_urgent(&self) -> bool {
        self.notification.as_ref().is_some_and(|n| n.urgent)
    }
}
