use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::Alert;

use super::{EscalationPolicy, EscalationRule};

/// Position of an alert in its policy: the last processed rule index and the
/// number of completed passes over the rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscalationCursor {
    pub level: i32,
    pub cycle: u32,
}

impl EscalationCursor {
    pub const START: Self = Self { level: -1, cycle: 0 };
}

impl fmt::Display for EscalationCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.level, self.cycle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep<'a> {
    Notify {
        rule: &'a EscalationRule,
        cursor: EscalationCursor,
    },
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    Now,
    At(DateTime<Utc>),
}

impl Due {
    pub fn has_passed(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::Now => true,
            Self::At(at) => *at <= now,
        }
    }
}

/// How an expired snooze affects the next due time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnoozeResume {
    /// The due time is computed as if the snooze never happened.
    #[default]
    KeepDueTime,
    /// The due time moves back by the snooze length.
    ShiftDueTime,
}

impl FromStr for SnoozeResume {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep" | "keep_due_time" => Ok(Self::KeepDueTime),
            "shift" | "shift_due_time" => Ok(Self::ShiftDueTime),
            other => Err(format!("unknown snooze resume mode: {other}")),
        }
    }
}

/// When `alert` next needs attention under `policy`.
///
/// Level -1 and a spent rule list are both due immediately: the first fires
/// rule 0, the second records exhaustion.
pub fn due_at(policy: &EscalationPolicy, alert: &Alert, resume: SnoozeResume) -> Due {
    let cursor = alert.escalation_cursor();
    let Some(last) = alert.last_escalated_at() else {
        return Due::Now;
    };
    if cursor.level < 0 {
        return Due::Now;
    }
    let rule = match policy.next_step(cursor) {
        NextStep::Notify { rule, .. } => rule,
        NextStep::Exhausted => return Due::Now,
    };
    let mut due = last + rule.delay();
    if resume == SnoozeResume::ShiftDueTime {
        if let Some(window) = alert.snooze_window() {
            if window.from >= last {
                due = due + (window.until - window.from);
            }
        }
    }
    Due::At(due)
}
