use super::TicketError;
use crate::models::Ticket;
use crate::store::{StoreError, TicketStore};

pub const MAX_ID_ATTEMPTS: usize = 5;

pub fn format_ticket_id(number: u64) -> String {
    format!("{number:04}")
}

/// Numbers `draft` as one past the guild's highest ticket and inserts it.
/// A concurrent insert that wins the same number surfaces as a duplicate
/// key, in which case the maximum is read again.
pub async fn insert_with_next_id<S>(store: &S, mut draft: Ticket) -> Result<Ticket, TicketError>
where
    S: TicketStore + ?Sized,
{
    for attempt in 1..=MAX_ID_ATTEMPTS {
        let number = store.max_ticket_number(draft.guild_id).await? + 1;
        draft.ticket_number = number;
        draft.ticket_id = format_ticket_id(number);

        match store.insert_ticket(&draft).await {
            Ok(()) => return Ok(draft),
            Err(StoreError::DuplicateKey(key)) => {
                tracing::debug!(
                    attempt,
                    %key,
                    guild_id = %draft.guild_id,
                    "Ticket id collision, retrying"
                );
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::warn!(guild_id = %draft.guild_id, "Gave up allocating a ticket id");
    Err(TicketError::IdExhausted(MAX_ID_ATTEMPTS))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use twilight_model::id::{
        Id,
        marker::{ChannelMarker, GuildMarker},
    };

    use super::*;
    use crate::models::TicketConfig;
    use crate::store::StoreResult;

    /// Rejects the first `collisions` inserts as if another shard won the number.
    struct Contended {
        collisions: AtomicUsize,
        tickets: Mutex<Vec<Ticket>>,
    }

    impl Contended {
        fn new(collisions: usize) -> Self {
            Self {
                collisions: AtomicUsize::new(collisions),
                tickets: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TicketStore for Contended {
        async fn ticket_config(&self, _: Id<GuildMarker>) -> StoreResult<Option<TicketConfig>> {
            Ok(None)
        }
        async fn save_ticket_config(&self, _: &TicketConfig) -> StoreResult<()> {
            Ok(())
        }
        async fn max_ticket_number(&self, _: Id<GuildMarker>) -> StoreResult<u64> {
            let tickets = self.tickets.lock().unwrap();
            Ok(tickets.iter().map(|t| t.ticket_number).max().unwrap_or(0))
        }
        async fn insert_ticket(&self, ticket: &Ticket) -> StoreResult<()> {
            let remaining = self.collisions.load(Ordering::SeqCst);
            if remaining > 0 {
                self.collisions.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::DuplicateKey(ticket.ticket_id.clone()));
            }
            self.tickets.lock().unwrap().push(ticket.clone());
            Ok(())
        }
        async fn ticket(&self, _: Id<GuildMarker>, _: &str) -> StoreResult<Option<Ticket>> {
            Ok(None)
        }
        async fn ticket_by_channel(&self, _: Id<ChannelMarker>) -> StoreResult<Option<Ticket>> {
            Ok(None)
        }
        async fn update_ticket(&self, _: &Ticket) -> StoreResult<()> {
            Ok(())
        }
        async fn open_tickets(&self) -> StoreResult<Vec<Ticket>> {
            Ok(Vec::new())
        }
    }

    fn draft() -> Ticket {
        Ticket::draft(Id::new(1), Id::new(2), "support", Vec::new(), Utc::now())
    }

    #[tokio::test]
    async fn test_retries_after_collisions() {
        let store = Contended::new(MAX_ID_ATTEMPTS - 1);
        let ticket = insert_with_next_id(&store, draft()).await.unwrap();
        assert_eq!(ticket.ticket_id, "0001");

        let second = insert_with_next_id(&store, draft()).await.unwrap();
        assert_eq!(second.ticket_number, 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let store = Contended::new(MAX_ID_ATTEMPTS);
        let result = insert_with_next_id(&store, draft()).await;
        assert!(matches!(result, Err(TicketError::IdExhausted(n)) if n == MAX_ID_ATTEMPTS));
        assert!(store.tickets.lock().unwrap().is_empty());
    }

    #[test]
    fn test_format() {
        assert_eq!(format_ticket_id(1), "0001");
        assert_eq!(format_ticket_id(42), "0042");
        assert_eq!(format_ticket_id(12345), "12345");
    }
}
