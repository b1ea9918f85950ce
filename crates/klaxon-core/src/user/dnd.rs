use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::alert::Priority;
use crate::error::DomainError;
use crate::tz;

/// A weekly quiet-hours slot in the user's timezone.
///
/// `start < end` covers `[start, end)` of `day`. `end < start` runs overnight
/// into the following day. `start == end` covers all of `day`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub day: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    pub fn new(day: Weekday, start: NaiveTime, end: NaiveTime) -> Self {
        Self { day, start, end }
    }

    fn covers(&self, local: NaiveDateTime) -> bool {
        let weekday = local.weekday();
        let time = local.time();
        if self.start == self.end {
            weekday == self.day
        } else if self.start < self.end {
            weekday == self.day && time >= self.start && time < self.end
        } else {
            (weekday == self.day && time >= self.start)
                || (weekday == self.day.succ() && time < self.end)
        }
    }
}

/// An absolute `[start, end)` quiet period, e.g. a holiday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DndOverride {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    reason: Option<String>,
}

impl DndOverride {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<Self, DomainError> {
        if end <= start {
            return Err(DomainError::InvalidDndPeriod);
        }
        Ok(Self { start, end, reason })
    }

    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    Disabled,
    OutsideQuietHours,
    P1Override,
    UrgentTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DndDecision {
    Allow(AllowReason),
    Suppress,
}

impl DndDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DndSettings {
    enabled: bool,
    allow_p1_override: bool,
    #[serde(with = "crate::tz::serde_name")]
    timezone: Tz,
    quiet_hours: Vec<QuietHours>,
    overrides: Vec<DndOverride>,
}

impl Default for DndSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_p1_override: false,
            timezone: Tz::UTC,
            quiet_hours: vec![],
            overrides: vec![],
        }
    }
}

impl DndSettings {
    pub fn new(timezone: Tz, allow_p1_override: bool) -> Self {
        Self {
            enabled: true,
            allow_p1_override,
            timezone,
            ..Self::default()
        }
    }

    pub fn with_quiet_hours(mut self, slot: QuietHours) -> Self {
        self.quiet_hours.push(slot);
        self
    }

    pub fn with_override(mut self, ovr: DndOverride) -> Self {
        self.overrides.push(ovr);
        self
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn in_quiet_period(&self, at: DateTime<Utc>) -> bool {
        let local = tz::to_local(self.timezone, at);
        self.quiet_hours.iter().any(|slot| slot.covers(local))
            || self.overrides.iter().any(|o| o.covers(at))
    }

    /// Decide whether a notification of `priority` may reach the user at
    /// `at`. `urgent` is the target-level bypass, already combined with the
    /// organization's permission.
    pub fn check(&self, at: DateTime<Utc>, priority: Priority, urgent: bool) -> DndDecision {
        if !self.enabled {
            return DndDecision::Allow(AllowReason::Disabled);
        }
        if !self.in_quiet_period(at) {
            return DndDecision::Allow(AllowReason::OutsideQuietHours);
        }
        if self.allow_p1_override && priority == Priority::P1 {
            return DndDecision::Allow(AllowReason::P1Override);
        }
        if urgent {
            return DndDecision::Allow(AllowReason::UrgentTarget);
        }
        DndDecision::Suppress
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn allow_p1_override(&self) -> bool {
        self.allow_p1_override
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn quiet_hours(&self) -> &[QuietHours] {
        &self.quiet_hours
    }

    pub fn overrides(&self) -> &[DndOverride] {
        &self.overrides
    }
}
