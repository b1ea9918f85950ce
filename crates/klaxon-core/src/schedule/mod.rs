pub mod rotation;
pub mod shift_override;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::events::{DomainEvent, OnCallChanged};
use crate::ids::{OrganizationId, OverrideId, RotationId, ScheduleId, TeamId, UserId};
use crate::tz;

pub use rotation::{Participant, RotationKind, RotationSlot, ScheduleRotation};
pub use shift_override::ScheduleOverride;

/// Where an on-call assignment came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShiftSource {
    Override(OverrideId),
    Rotation { rotation_id: RotationId, index: usize },
}

/// A resolved assignment, valid for `[start, end)` so callers may cache it
/// until the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shift {
    pub user_id: UserId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source: ShiftSource,
}

impl Shift {
    pub fn is_override(&self) -> bool {
        matches!(self.source, ShiftSource::Override(_))
    }
}

/// Result of an on-call lookup. `Nobody` is a valid answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnCall {
    Assigned(Shift),
    Nobody,
}

impl OnCall {
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Assigned(shift) => Some(&shift.user_id),
            Self::Nobody => None,
        }
    }

    pub fn shift(&self) -> Option<&Shift> {
        match self {
            Self::Assigned(shift) => Some(shift),
            Self::Nobody => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    id: ScheduleId,
    organization_id: OrganizationId,
    team_id: Option<TeamId>,
    name: String,
    description: Option<String>,
    #[serde(with = "tz::serde_name")]
    timezone: Tz,
    rotations: Vec<ScheduleRotation>,
    overrides: Vec<ScheduleOverride>,
}

impl Schedule {
    pub fn new(organization_id: OrganizationId, name: String, timezone: Tz) -> Self {
        Self {
            id: ScheduleId::new(),
            organization_id,
            team_id: None,
            name,
            description: None,
            timezone,
            rotations: vec![],
            overrides: vec![],
        }
    }

    pub fn add_rotation(&mut self, rotation: ScheduleRotation) {
        self.rotations.push(rotation);
    }

    pub fn reorder_participants(
        &mut self,
        rotation_id: &RotationId,
        users: Vec<UserId>,
    ) -> Result<(), DomainError> {
        self.rotations
            .iter_mut()
            .find(|r| r.id() == rotation_id)
            .ok_or_else(|| DomainError::RotationNotFound(rotation_id.to_string()))?
            .reorder(users)
    }

    pub fn on_call_at(&self, at: DateTime<Utc>) -> OnCall {
        // Most recently created override wins; on equal timestamps the later one added.
        let active_override = self
            .overrides
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_active_at(at))
            .max_by_key(|(pos, o)| (o.created_at(), *pos))
            .map(|(_, o)| o);

        if let Some(ovr) = active_override {
            return OnCall::Assigned(Shift {
                user_id: ovr.user_id().clone(),
                start: ovr.start(),
                end: ovr.end(),
                source: ShiftSource::Override(ovr.id().clone()),
            });
        }

        // Rotations in insertion order; the first one with coverage wins.
        self.rotations
            .iter()
            .find_map(|rotation| {
                rotation.resolve(self.timezone, at).map(|slot| {
                    OnCall::Assigned(Shift {
                        user_id: slot.user_id,
                        start: slot.start,
                        end: slot.end,
                        source: ShiftSource::Rotation {
                            rotation_id: rotation.id().clone(),
                            index: slot.index,
                        },
                    })
                })
            })
            .unwrap_or(OnCall::Nobody)
    }

    /// Who takes over when the current shift ends.
    pub fn next_on_call(&self, at: DateTime<Utc>) -> OnCall {
        match self.on_call_at(at) {
            OnCall::Assigned(shift) => self.on_call_at(shift.end),
            OnCall::Nobody => OnCall::Nobody,
        }
    }

    pub fn add_override(
        &mut self,
        ovr: ScheduleOverride,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        if ovr.end() <= ovr.start() {
            return Err(DomainError::InvalidOverridePeriod);
        }
        let previous_user = self.on_call_at(ovr.start()).user_id().cloned();
        let new_user = Some(ovr.user_id().clone());
        self.overrides.push(ovr);
        Ok(vec![DomainEvent::OnCallChanged(OnCallChanged {
            schedule_id: self.id.clone(),
            new_user,
            previous_user,
            occurred_at: now,
        })])
    }

    pub fn remove_override(
        &mut self,
        override_id: &OverrideId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        let pos = self.overrides.iter().position(|o| o.id() == override_id);
        if let Some(idx) = pos {
            let removed = self.overrides.remove(idx);
            let current = self.on_call_at(now).user_id().cloned();
            Ok(vec![DomainEvent::OnCallChanged(OnCallChanged {
                schedule_id: self.id.clone(),
                new_user: current,
                previous_user: Some(removed.user_id().clone()),
                occurred_at: now,
            })])
        } else {
            Ok(vec![])
        }
    }

    pub fn rename(&mut self, name: String, description: Option<String>) {
        self.name = name;
        self.description = description;
    }

    pub fn set_timezone(&mut self, timezone: Tz) {
        self.timezone = timezone;
    }

    pub fn set_team(&mut self, team_id: Option<TeamId>) {
        self.team_id = team_id;
    }

    pub fn id(&self) -> &ScheduleId {
        &self.id
    }

    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    pub fn team_id(&self) -> Option<&TeamId> {
        self.team_id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn rotations(&self) -> &[ScheduleRotation] {
        &self.rotations
    }

    pub fn overrides(&self) -> &[ScheduleOverride] {
        &self.overrides
    }

    pub fn timezone(&self) -> &Tz {
        &self.timezone
    }
}
