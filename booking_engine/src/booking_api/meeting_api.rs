use std::fmt::Debug;

use log::*;

use crate::{
    booking_api::{fetch_order, fetch_visible_order, require_admin},
    db_types::{BookingCode, Meeting, MeetingUpdate, NewMeeting, Principal},
    events::{EventProducers, EventType, MeetingScheduledEvent},
    traits::{BookingDatabase, BookingError},
};

/// Links validated orders to consultation meetings booked through the external scheduling provider.
///
/// Calendar mechanics live with the provider. The engine only tracks the link reference, the meeting status and the
/// times the provider reports.
pub struct MeetingApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for MeetingApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MeetingApi")
    }
}

impl<B> MeetingApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> MeetingApi<B>
where B: BookingDatabase
{
    /// Attaches a scheduling link to a validated order. Each order can have at most one meeting that isn't cancelled.
    pub async fn schedule_meeting(
        &self,
        principal: &Principal,
        code: &BookingCode,
        meeting: NewMeeting,
    ) -> Result<Meeting, BookingError> {
        require_admin(principal, "schedule meetings")?;
        let order = fetch_order(&self.db, code).await?;
        let meeting = self.db.insert_meeting(order.id, meeting).await?;
        info!("📅️ Meeting [{}] scheduled for order {code} by {principal}", meeting.link_ref);
        let event = MeetingScheduledEvent { order, meeting: meeting.clone() };
        self.producers.publish(EventType::MeetingScheduled(event)).await;
        Ok(meeting)
    }

    /// Applies a callback from the scheduling provider. Callbacks are matched to meetings by link reference.
    ///
    /// Only invitee creation and cancellation come from the provider. Completion is an admin action
    /// ([`Self::complete_meeting`]).
    pub async fn handle_scheduling_callback(&self, link_ref: &str, update: MeetingUpdate) -> Result<Meeting, BookingError> {
        if matches!(update, MeetingUpdate::Completed) {
            return Err(BookingError::InvalidMeetingUpdate("The scheduling provider cannot complete meetings".into()));
        }
        let meeting = self
            .db
            .fetch_meeting_by_link_ref(link_ref)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Meeting with link {link_ref}")))?;
        let meeting = self.db.update_meeting(meeting.id, update).await?;
        debug!("📅️ Scheduling callback for [{link_ref}] processed. Meeting is {}", meeting.status);
        Ok(meeting)
    }

    /// Marks a meeting as having taken place.
    pub async fn complete_meeting(&self, principal: &Principal, meeting_id: i64) -> Result<Meeting, BookingError> {
        require_admin(principal, "complete meetings")?;
        let meeting = self.db.update_meeting(meeting_id, MeetingUpdate::Completed).await?;
        info!("📅️ Meeting #{meeting_id} marked as completed by {principal}");
        Ok(meeting)
    }

    pub async fn meetings_for_order(&self, principal: &Principal, code: &BookingCode) -> Result<Vec<Meeting>, BookingError> {
        let order = fetch_visible_order(&self.db, principal, code).await?;
        self.db.fetch_meetings_for_order(order.id).await
    }
}
