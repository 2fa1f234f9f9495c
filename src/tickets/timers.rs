use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, GuildMarker},
};

use crate::models::{Ticket, TicketConfig, TicketStatus};

pub type TicketKey = (Id<GuildMarker>, String);

pub fn ticket_key(ticket: &Ticket) -> TicketKey {
    (ticket.guild_id, ticket.ticket_id.clone())
}

/// Pending auto-close timers, one per open ticket, plus the channels of open
/// tickets so message activity can be attributed without a lookup.
#[derive(Default)]
pub struct TicketTimers {
    handles: DashMap<TicketKey, JoinHandle<()>>,
    channels: DashMap<Id<ChannelMarker>, TicketKey>,
}

impl TicketTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `task` after `delay`, replacing any timer already armed for `key`.
    pub fn arm<F>(&self, key: TicketKey, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        if let Some(previous) = self.handles.insert(key, handle) {
            previous.abort();
        }
    }

    /// Drops the timer for `key`. Called from inside the timer's own task it
    /// only forgets the handle.
    pub fn cancel(&self, key: &TicketKey) -> bool {
        let Some((_, handle)) = self.handles.remove(key) else {
            return false;
        };
        if tokio::task::try_id() != Some(handle.id()) {
            handle.abort();
        }
        true
    }

    pub fn is_armed(&self, key: &TicketKey) -> bool {
        self.handles
            .get(key)
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn track_channel(&self, channel_id: Id<ChannelMarker>, key: TicketKey) {
        self.channels.insert(channel_id, key);
    }

    pub fn forget_channel(&self, channel_id: Id<ChannelMarker>) {
        self.channels.remove(&channel_id);
    }

    pub fn key_for_channel(&self, channel_id: Id<ChannelMarker>) -> Option<TicketKey> {
        self.channels.get(&channel_id).map(|key| key.clone())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SweepDecision {
    Skip,
    CloseNow,
    Arm(Duration),
}

/// `None` when the deadline falls outside the representable range.
pub fn auto_close_deadline(ticket: &Ticket, hours: u32) -> Option<DateTime<Utc>> {
    let hours = hours.min(TicketConfig::MAX_AUTO_CLOSE_HOURS);
    ticket
        .last_activity
        .checked_add_signed(TimeDelta::hours(i64::from(hours)))
}

/// What the hourly sweep should do with `ticket`.
pub fn decide(ticket: &Ticket, auto_close_hours: Option<u32>, now: DateTime<Utc>) -> SweepDecision {
    let Some(hours) = auto_close_hours.filter(|h| *h > 0) else {
        return SweepDecision::Skip;
    };
    if ticket.status != TicketStatus::Open {
        return SweepDecision::Skip;
    }
    let Some(deadline) = auto_close_deadline(ticket, hours) else {
        return SweepDecision::Skip;
    };
    match (deadline - now).to_std() {
        Ok(remaining) if !remaining.is_zero() => SweepDecision::Arm(remaining),
        _ => SweepDecision::CloseNow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ticket(last_activity: DateTime<Utc>) -> Ticket {
        let mut t = Ticket::draft(Id::new(1), Id::new(2), "support", Vec::new(), last_activity);
        t.ticket_id = "0001".to_string();
        t
    }

    #[test]
    fn test_decide() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let t = ticket(start);

        assert_eq!(decide(&t, None, start), SweepDecision::Skip);
        assert_eq!(decide(&t, Some(0), start), SweepDecision::Skip);
        assert_eq!(
            decide(&t, Some(24), start + TimeDelta::hours(23)),
            SweepDecision::Arm(Duration::from_secs(3600))
        );
        assert_eq!(
            decide(&t, Some(24), start + TimeDelta::hours(24)),
            SweepDecision::CloseNow
        );
        assert_eq!(
            decide(&t, Some(24), start + TimeDelta::hours(30)),
            SweepDecision::CloseNow
        );

        let mut closed = t.clone();
        closed.status = TicketStatus::Closed;
        assert_eq!(
            decide(&closed, Some(1), start + TimeDelta::hours(30)),
            SweepDecision::Skip
        );
    }

    #[test]
    fn test_oversized_auto_close_is_capped() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let t = ticket(start);
        let cap = i64::from(TicketConfig::MAX_AUTO_CLOSE_HOURS);
        assert_eq!(
            auto_close_deadline(&t, u32::MAX),
            Some(start + TimeDelta::hours(cap))
        );
        assert_eq!(
            decide(&t, Some(u32::MAX), start + TimeDelta::hours(cap - 1)),
            SweepDecision::Arm(Duration::from_secs(3600))
        );

        let ancient = ticket(DateTime::<Utc>::MAX_UTC - TimeDelta::hours(1));
        assert_eq!(decide(&ancient, Some(24), start), SweepDecision::Skip);
    }

    #[tokio::test]
    async fn test_rearm_replaces_previous_timer() {
        let timers = TicketTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let key = (Id::new(1), "0001".to_string());

        for _ in 0..3 {
            let fired = fired.clone();
            timers.arm(key.clone(), Duration::from_millis(30), async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(timers.len(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_prevents_firing() {
        let timers = TicketTimers::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let key = (Id::new(1), "0002".to_string());

        let counter = fired.clone();
        timers.arm(key.clone(), Duration::from_millis(30), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timers.is_armed(&key));
        assert!(timers.cancel(&key));
        assert!(!timers.cancel(&key));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_channel_tracking() {
        let timers = TicketTimers::new();
        let key = (Id::new(1), "0003".to_string());
        timers.track_channel(Id::new(77), key.clone());
        assert_eq!(timers.key_for_channel(Id::new(77)), Some(key));
        timers.forget_channel(Id::new(77));
        assert_eq!(timers.key_for_channel(Id::new(77)), None);
    }
}
