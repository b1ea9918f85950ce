use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{RotationId, UserId};
use crate::tz;

const SECONDS_PER_DAY: i64 = 86_400;

/// Longest cycle a rotation may have, roughly ten years.
pub const MAX_CYCLE_DAYS: i64 = 3_660;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationKind {
    Daily,
    Weekly,
    /// Whole days; the rotation length is the cycle length in days.
    Custom,
}

impl RotationKind {
    fn unit_days(&self) -> i64 {
        match self {
            Self::Daily | Self::Custom => 1,
            Self::Weekly => 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub position: u32,
}

/// Who a rotation puts on call at an instant, and for how long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationSlot {
    pub index: usize,
    pub user_id: UserId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRotation {
    id: RotationId,
    name: String,
    kind: RotationKind,
    length: u32,
    start_date: NaiveDate,
    start_time: NaiveTime,
    end_time: Option<NaiveTime>,
    handoff_day: Option<Weekday>,
    handoff_time: Option<NaiveTime>,
    participants: Vec<Participant>,
}

impl ScheduleRotation {
    pub fn new(
        name: String,
        kind: RotationKind,
        length: u32,
        start: NaiveDateTime,
        participants: Vec<UserId>,
    ) -> Result<Self, DomainError> {
        if length == 0 || kind.unit_days() * i64::from(length) > MAX_CYCLE_DAYS {
            return Err(DomainError::InvalidRotationLength);
        }
        let mut rotation = Self {
            id: RotationId::new(),
            name,
            kind,
            length,
            start_date: start.date(),
            start_time: start.time(),
            end_time: None,
            handoff_day: None,
            handoff_time: None,
            participants: vec![],
        };
        rotation.set_participants(participants);
        Ok(rotation)
    }

    /// Restrict coverage to `[start_time, end_time)` of each local day.
    pub fn with_end_time(mut self, end_time: NaiveTime) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn with_handoff(
        mut self,
        day: Option<Weekday>,
        time: NaiveTime,
    ) -> Result<Self, DomainError> {
        if day.is_some() && self.kind != RotationKind::Weekly {
            return Err(DomainError::HandoffDayRequiresWeekly);
        }
        self.handoff_day = day;
        self.handoff_time = Some(time);
        Ok(self)
    }

    /// Participant index active at `at`, with the interval it covers.
    /// `None` before the rotation starts, with no participants, or outside the
    /// daily coverage window.
    pub fn resolve(&self, timezone: Tz, at: DateTime<Utc>) -> Option<RotationSlot> {
        if self.participants.is_empty() {
            return None;
        }
        let anchor = tz::to_utc(timezone, self.start_date.and_time(self.start_time));
        if at < anchor {
            return None;
        }

        let local = tz::to_local(timezone, at);
        let epoch = self.epoch();
        let cycle_days = self.kind.unit_days() * i64::from(self.length);
        let cycle = (local - epoch)
            .num_seconds()
            .div_euclid(cycle_days * SECONDS_PER_DAY)
            .max(0);
        let index = cycle.rem_euclid(self.participants.len() as i64) as usize;

        // Stored rows skip the constructor, so out-of-range lengths end up here.
        let elapsed = Duration::try_days(cycle.checked_mul(cycle_days)?)?;
        let cycle_start = epoch.checked_add_signed(elapsed)?;
        let cycle_end = cycle_start.checked_add_signed(Duration::try_days(cycle_days)?)?;
        let mut start = tz::to_utc(timezone, cycle_start).max(anchor);
        let mut end = tz::to_utc(timezone, cycle_end);

        if let Some(end_time) = self.end_time {
            let (window_start, window_end) = self.coverage_window(local, end_time)?;
            start = start.max(tz::to_utc(timezone, window_start));
            end = end.min(tz::to_utc(timezone, window_end));
        }

        Some(RotationSlot {
            index,
            user_id: self.participants[index].user_id.clone(),
            start,
            end,
        })
    }

    /// Last handoff moment at or before the rotation start; cycles count from here.
    fn epoch(&self) -> NaiveDateTime {
        let anchor = self.start_date.and_time(self.start_time);
        let handoff_time = self.handoff_time.unwrap_or(self.start_time);
        let mut date = self.start_date;
        if let Some(day) = self.handoff_day {
            let back = (7 + date.weekday().num_days_from_monday() - day.num_days_from_monday()) % 7;
            date = date - Duration::days(i64::from(back));
        }
        let epoch = date.and_time(handoff_time);
        if epoch > anchor {
            epoch - Duration::days(self.kind.unit_days())
        } else {
            epoch
        }
    }

    fn coverage_window(
        &self,
        local: NaiveDateTime,
        end_time: NaiveTime,
    ) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let day = local.date();
        let time = local.time();
        if self.start_time < end_time {
            (time >= self.start_time && time < end_time)
                .then(|| (day.and_time(self.start_time), day.and_time(end_time)))
        } else if time >= self.start_time {
            // overnight window, or the whole day when start == end
            Some((
                day.and_time(self.start_time),
                (day + Duration::days(1)).and_time(end_time),
            ))
        } else if time < end_time {
            Some((
                (day - Duration::days(1)).and_time(self.start_time),
                day.and_time(end_time),
            ))
        } else {
            None
        }
    }

    /// Replace the participant order. `users` must contain every current
    /// participant exactly once.
    pub fn reorder(&mut self, users: Vec<UserId>) -> Result<(), DomainError> {
        let mut current: Vec<&UserId> = self.participants.iter().map(|p| &p.user_id).collect();
        let mut proposed: Vec<&UserId> = users.iter().collect();
        current.sort();
        proposed.sort();
        if current != proposed {
            return Err(DomainError::ParticipantMismatch);
        }
        self.set_participants(users);
        Ok(())
    }

    pub fn add_participant(&mut self, user_id: UserId) {
        let position = self.participants.len() as u32;
        self.participants.push(Participant { user_id, position });
    }

    pub fn remove_participant(&mut self, user_id: &UserId) -> bool {
        let before = self.participants.len();
        let remaining: Vec<UserId> = self
            .participants
            .iter()
            .filter(|p| &p.user_id != user_id)
            .map(|p| p.user_id.clone())
            .collect();
        if remaining.len() == before {
            return false;
        }
        self.set_participants(remaining);
        true
    }

    fn set_participants(&mut self, users: Vec<UserId>) {
        self.participants = users
            .into_iter()
            .enumerate()
            .map(|(position, user_id)| Participant {
                user_id,
                position: position as u32,
            })
            .collect();
    }

    pub fn id(&self) -> &RotationId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RotationKind {
        self.kind
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }
}
