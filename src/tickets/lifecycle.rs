use std::fmt;

use chrono::{DateTime, Utc};
use twilight_model::id::{
    Id,
    marker::{RoleMarker, UserMarker},
};

use super::TicketError;
use crate::models::{StaffRole, Ticket, TicketConfig, TicketStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Close,
    Assign,
    Delete,
    Reopen,
}

impl Capability {
    fn granted_by(self, role: &StaffRole) -> bool {
        match self {
            Capability::Close => role.can_close,
            Capability::Assign => role.can_assign,
            Capability::Delete => role.can_delete,
            Capability::Reopen => role.can_reopen,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Capability::Close => "close",
            Capability::Assign => "claim",
            Capability::Delete => "delete",
            Capability::Reopen => "reopen",
        })
    }
}

/// The member acting on a ticket.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Id<UserMarker>,
    pub roles: Vec<Id<RoleMarker>>,
    pub is_admin: bool,
}

impl Actor {
    pub fn is_staff(&self, config: &TicketConfig) -> bool {
        self.is_admin
            || config
                .staff_roles
                .iter()
                .any(|staff| self.roles.contains(&staff.role_id))
    }

    fn has(&self, config: &TicketConfig, capability: Capability) -> bool {
        self.is_admin
            || config
                .staff_roles
                .iter()
                .filter(|staff| self.roles.contains(&staff.role_id))
                .any(|staff| capability.granted_by(staff))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketAction {
    Close,
    Claim,
    Reopen,
    Delete,
}

impl TicketAction {
    pub fn capability(self) -> Capability {
        match self {
            TicketAction::Close => Capability::Close,
            TicketAction::Claim => Capability::Assign,
            TicketAction::Reopen => Capability::Reopen,
            TicketAction::Delete => Capability::Delete,
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            TicketAction::Close => "close",
            TicketAction::Claim => "claim",
            TicketAction::Reopen => "reopen",
            TicketAction::Delete => "delete",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            TicketAction::Close => "closed",
            TicketAction::Claim => "claimed",
            TicketAction::Reopen => "reopened",
            TicketAction::Delete => "deleted",
        }
    }

    /// Status after the action, or `None` when the action is not allowed
    /// from `from`.
    pub fn next_status(self, from: TicketStatus) -> Option<TicketStatus> {
        match (self, from) {
            (TicketAction::Close, TicketStatus::Open) => Some(TicketStatus::Closed),
            (TicketAction::Claim, TicketStatus::Open) => Some(TicketStatus::Open),
            (TicketAction::Reopen, TicketStatus::Closed) => Some(TicketStatus::Open),
            (TicketAction::Delete, TicketStatus::Open | TicketStatus::Closed) => {
                Some(TicketStatus::Deleted)
            }
            _ => None,
        }
    }
}

/// Staff capability check. The ticket owner may always close their own ticket.
pub fn authorize(
    config: &TicketConfig,
    actor: &Actor,
    ticket: &Ticket,
    action: TicketAction,
) -> Result<(), TicketError> {
    if action == TicketAction::Close && ticket.user_id == actor.user_id {
        return Ok(());
    }
    let capability = action.capability();
    if actor.has(config, capability) {
        Ok(())
    } else {
        Err(TicketError::MissingCapability(capability))
    }
}

/// Moves `ticket` through `action`, stamping who and when.
pub fn apply(
    ticket: &mut Ticket,
    action: TicketAction,
    by: Id<UserMarker>,
    now: DateTime<Utc>,
) -> Result<(), TicketError> {
    let next = action
        .next_status(ticket.status)
        .ok_or(TicketError::InvalidTransition {
            from: ticket.status,
            action: action.verb(),
        })?;

    match action {
        TicketAction::Close => {
            ticket.closed_by = Some(by);
            ticket.closed_at = Some(now);
        }
        TicketAction::Claim => ticket.assigned_to = Some(by),
        TicketAction::Reopen => {
            ticket.closed_by = None;
            ticket.closed_at = None;
            ticket.last_activity = now;
        }
        TicketAction::Delete => {}
    }
    ticket.status = next;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap()
    }

    fn ticket() -> Ticket {
        Ticket::draft(Id::new(1), Id::new(100), "support", Vec::new(), now())
    }

    fn config() -> TicketConfig {
        let mut config = TicketConfig::new(Id::new(1));
        config.staff_roles.push(StaffRole {
            role_id: Id::new(500),
            can_close: true,
            can_assign: true,
            can_delete: false,
            can_reopen: false,
        });
        config
    }

    fn actor(user: u64, roles: &[u64], is_admin: bool) -> Actor {
        Actor {
            user_id: Id::new(user),
            roles: roles.iter().copied().map(Id::new).collect(),
            is_admin,
        }
    }

    #[test]
    fn test_full_lifecycle() {
        let mut t = ticket();
        apply(&mut t, TicketAction::Claim, Id::new(7), now()).unwrap();
        assert_eq!(t.assigned_to, Some(Id::new(7)));
        assert_eq!(t.status, TicketStatus::Open);

        apply(&mut t, TicketAction::Close, Id::new(7), now()).unwrap();
        assert_eq!(t.status, TicketStatus::Closed);
        assert_eq!(t.closed_by, Some(Id::new(7)));
        assert!(t.closed_at.is_some());

        apply(&mut t, TicketAction::Reopen, Id::new(8), now()).unwrap();
        assert_eq!(t.status, TicketStatus::Open);
        assert_eq!(t.closed_by, None);

        apply(&mut t, TicketAction::Delete, Id::new(8), now()).unwrap();
        assert_eq!(t.status, TicketStatus::Deleted);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut t = ticket();
        assert!(matches!(
            apply(&mut t, TicketAction::Reopen, Id::new(1), now()),
            Err(TicketError::InvalidTransition { .. })
        ));

        apply(&mut t, TicketAction::Close, Id::new(1), now()).unwrap();
        assert!(apply(&mut t, TicketAction::Claim, Id::new(1), now()).is_err());
        assert!(apply(&mut t, TicketAction::Close, Id::new(1), now()).is_err());

        apply(&mut t, TicketAction::Delete, Id::new(1), now()).unwrap();
        for action in [
            TicketAction::Close,
            TicketAction::Claim,
            TicketAction::Reopen,
            TicketAction::Delete,
        ] {
            assert!(apply(&mut t, action, Id::new(1), now()).is_err());
        }
    }

    #[test]
    fn test_capabilities() {
        let config = config();
        let t = ticket();

        let staff = actor(2, &[500], false);
        assert!(authorize(&config, &staff, &t, TicketAction::Close).is_ok());
        assert!(authorize(&config, &staff, &t, TicketAction::Claim).is_ok());
        assert!(matches!(
            authorize(&config, &staff, &t, TicketAction::Delete),
            Err(TicketError::MissingCapability(Capability::Delete))
        ));

        let owner = actor(100, &[], false);
        assert!(authorize(&config, &owner, &t, TicketAction::Close).is_ok());
        assert!(authorize(&config, &owner, &t, TicketAction::Claim).is_err());

        let stranger = actor(3, &[999], false);
        assert!(authorize(&config, &stranger, &t, TicketAction::Close).is_err());
        assert!(!stranger.is_staff(&config));

        let admin = actor(4, &[], true);
        assert!(authorize(&config, &admin, &t, TicketAction::Delete).is_ok());
        assert!(admin.is_staff(&config));
    }
}
