use chrono::{DateTime, Utc};
use tracing::info;

use klaxon_core::ids::{OverrideId, RotationId, ScheduleId, UserId};
use klaxon_core::schedule::{OnCall, Schedule, ScheduleOverride};
use klaxon_ports::outbound::{EventPublisher, ScheduleRepository};

use crate::error::AppError;

pub struct ScheduleService<S, EP>
where
    S: ScheduleRepository,
    EP: EventPublisher,
{
    schedules: S,
    events: EP,
}

impl<S, EP> ScheduleService<S, EP>
where
    S: ScheduleRepository,
    EP: EventPublisher,
{
    pub fn new(schedules: S, events: EP) -> Self {
        Self { schedules, events }
    }

    pub async fn create_schedule(&self, schedule: Schedule) -> Result<ScheduleId, AppError> {
        let id = schedule.id().clone();
        self.schedules.save(&schedule).await?;
        Ok(id)
    }

    pub async fn who_is_on_call(
        &self,
        schedule_id: &ScheduleId,
        at: DateTime<Utc>,
    ) -> Result<OnCall, AppError> {
        Ok(self.load(schedule_id).await?.on_call_at(at))
    }

    pub async fn next_on_call(
        &self,
        schedule_id: &ScheduleId,
        at: DateTime<Utc>,
    ) -> Result<OnCall, AppError> {
        Ok(self.load(schedule_id).await?.next_on_call(at))
    }

    pub async fn add_override(
        &self,
        schedule_id: &ScheduleId,
        ovr: ScheduleOverride,
        now: DateTime<Utc>,
    ) -> Result<OverrideId, AppError> {
        let mut schedule = self.load(schedule_id).await?;
        let override_id = ovr.id().clone();

        let events = schedule.add_override(ovr, now)?;
        self.schedules.save(&schedule).await?;
        self.events.publish(events).await?;

        info!(schedule_id = %schedule_id, override_id = %override_id, "override added");
        Ok(override_id)
    }

    /// Removing an unknown override is not an error and publishes nothing.
    pub async fn remove_override(
        &self,
        schedule_id: &ScheduleId,
        override_id: &OverrideId,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut schedule = self.load(schedule_id).await?;

        let events = schedule.remove_override(override_id, now)?;
        if !events.is_empty() {
            self.schedules.save(&schedule).await?;
            self.events.publish(events).await?;
        }

        Ok(())
    }

    pub async fn reorder_participants(
        &self,
        schedule_id: &ScheduleId,
        rotation_id: &RotationId,
        users: Vec<UserId>,
    ) -> Result<(), AppError> {
        let mut schedule = self.load(schedule_id).await?;
        schedule.reorder_participants(rotation_id, users)?;
        self.schedules.save(&schedule).await?;
        Ok(())
    }

    async fn load(&self, schedule_id: &ScheduleId) -> Result<Schedule, AppError> {
        self.schedules
            .find_by_id(schedule_id)
            .await?
            .ok_or_else(|| AppError::ScheduleNotFound(schedule_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use chrono::{Duration, NaiveDate, NaiveTime};
    use klaxon_core::error::DomainError;
    use klaxon_core::events::DomainEvent;
    use klaxon_core::ids::OrganizationId;
    use klaxon_core::schedule::{RotationKind, ScheduleRotation, ShiftSource};

    // Monday
    fn start() -> DateTime<Utc> {
        ts("2025-01-13T00:00:00Z")
    }

    fn weekly(users: Vec<UserId>) -> ScheduleRotation {
        ScheduleRotation::new(
            "primary".into(),
            RotationKind::Weekly,
            1,
            NaiveDate::from_ymd_opt(2025, 1, 13)
                .unwrap()
                .and_time(NaiveTime::MIN),
            users,
        )
        .unwrap()
    }

    async fn setup(
        users: Vec<UserId>,
    ) -> (ScheduleService<MemSchedules, MemEvents>, MemEvents, ScheduleId, RotationId) {
        let events = MemEvents::default();
        let service = ScheduleService::new(MemSchedules::default(), events.clone());
        let mut schedule = Schedule::new(OrganizationId::new(), "sre".into(), chrono_tz::UTC);
        let rotation = weekly(users);
        let rotation_id = rotation.id().clone();
        schedule.add_rotation(rotation);
        let id = service.create_schedule(schedule).await.unwrap();
        (service, events, id, rotation_id)
    }

    #[tokio::test]
    async fn weekly_rotation_hands_over_after_a_week() {
        let alice = UserId::new();
        let bob = UserId::new();
        let (service, _, id, _) = setup(vec![alice.clone(), bob.clone()]).await;

        let on_call = service
            .who_is_on_call(&id, start() + Duration::days(8))
            .await
            .unwrap();
        assert_eq!(on_call.user_id(), Some(&bob));
        let shift = on_call.shift().unwrap();
        assert!(matches!(shift.source, ShiftSource::Rotation { index: 1, .. }));
        assert_eq!(shift.start, start() + Duration::days(7));
        assert_eq!(shift.end, start() + Duration::days(14));

        let next = service
            .next_on_call(&id, start() + Duration::days(8))
            .await
            .unwrap();
        assert_eq!(next.user_id(), Some(&alice));
    }

    #[tokio::test]
    async fn override_takes_precedence_and_publishes() {
        let alice = UserId::new();
        let carol = UserId::new();
        let (service, events, id, _) = setup(vec![alice.clone()]).await;
        let now = start() + Duration::days(1);
        let ovr = ScheduleOverride::new(carol.clone(), now, now + Duration::hours(4), now);

        let override_id = service.add_override(&id, ovr, now).await.unwrap();

        let on_call = service.who_is_on_call(&id, now + Duration::hours(1)).await.unwrap();
        assert_eq!(on_call.user_id(), Some(&carol));
        let published = events.events.lock().unwrap().clone();
        assert!(matches!(
            &published[..],
            [DomainEvent::OnCallChanged(e)]
                if e.new_user.as_ref() == Some(&carol) && e.previous_user.as_ref() == Some(&alice)
        ));

        service
            .remove_override(&id, &override_id, now + Duration::hours(1))
            .await
            .unwrap();
        let on_call = service.who_is_on_call(&id, now + Duration::hours(1)).await.unwrap();
        assert_eq!(on_call.user_id(), Some(&alice));
        assert_eq!(events.types(), ["oncall.changed", "oncall.changed"]);
    }

    #[tokio::test]
    async fn inverted_override_is_rejected() {
        let (service, events, id, _) = setup(vec![UserId::new()]).await;
        let now = start();
        let ovr = ScheduleOverride::new(UserId::new(), now, now, now);

        let result = service.add_override(&id, ovr, now).await;

        assert!(matches!(
            result,
            Err(AppError::Domain(DomainError::InvalidOverridePeriod))
        ));
        assert!(events.types().is_empty());
    }

    #[tokio::test]
    async fn removing_unknown_override_is_silent() {
        let (service, events, id, _) = setup(vec![UserId::new()]).await;
        service
            .remove_override(&id, &OverrideId::new(), start())
            .await
            .unwrap();
        assert!(events.types().is_empty());
    }

    #[tokio::test]
    async fn reorder_changes_who_is_on_call() {
        let alice = UserId::new();
        let bob = UserId::new();
        let (service, _, id, rotation_id) = setup(vec![alice.clone(), bob.clone()]).await;

        service
            .reorder_participants(&id, &rotation_id, vec![bob.clone(), alice.clone()])
            .await
            .unwrap();

        let on_call = service.who_is_on_call(&id, start()).await.unwrap();
        assert_eq!(on_call.user_id(), Some(&bob));

        let mismatch = service
            .reorder_participants(&id, &rotation_id, vec![bob])
            .await;
        assert!(matches!(
            mismatch,
            Err(AppError::Domain(DomainError::ParticipantMismatch))
        ));
    }

    #[tokio::test]
    async fn unknown_schedule_is_not_found() {
        let (service, _, _, _) = setup(vec![UserId::new()]).await;
        let result = service.who_is_on_call(&ScheduleId::new(), start()).await;
        assert!(matches!(result, Err(AppError::ScheduleNotFound(_))));
    }
}
