use std::fmt;

use twilight_model::id::{Id, marker::RoleMarker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicAction {
    Pause,
    Skip,
    Stop,
    Loop,
    Favorite,
    Lyrics,
    Queue(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketButton {
    Open(String),
    Close(String),
    Claim(String),
    Reopen(String),
    Delete(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderAction {
    Cancel(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfgAction {
    Join(u64),
    Leave(u64),
    Close(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempVcAction {
    Lock,
    Unlock,
    Rename,
    Claim,
    Limit(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilsAction {
    Dismiss,
}

/// Every button the bot renders, parsed once from its `custom_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentAction {
    Music(MusicAction),
    Ticket(TicketButton),
    Reminder(ReminderAction),
    Lfg(LfgAction),
    TempVc(TempVcAction),
    SelfRole(Id<RoleMarker>),
    Utils(UtilsAction),
}

/// Modal submissions, keyed the same way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalAction {
    Ticket(String),
    Template(String),
    TempVcRename,
}

fn non_empty(arg: Option<&str>) -> Option<String> {
    arg.filter(|a| !a.is_empty()).map(str::to_string)
}

impl ComponentAction {
    pub fn parse(custom_id: &str) -> Option<Self> {
        if let Some(action) = parse_self_role(custom_id) {
            return Some(action);
        }
        let (name, arg) = match custom_id.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (custom_id, None),
        };
        let (module, action) = name.split_once('_')?;

        let parsed = match (module, action, arg) {
            ("music", "pause", None) => Self::Music(MusicAction::Pause),
            ("music", "skip", None) => Self::Music(MusicAction::Skip),
            ("music", "stop", None) => Self::Music(MusicAction::Stop),
            ("music", "loop", None) => Self::Music(MusicAction::Loop),
            ("music", "fav", None) => Self::Music(MusicAction::Favorite),
            ("music", "lyrics", None) => Self::Music(MusicAction::Lyrics),
            ("music", "queue", arg) => {
                Self::Music(MusicAction::Queue(arg.map_or(Some(1), |a| a.parse().ok())?))
            }
            ("ticket", kind, arg) => {
                let arg = non_empty(arg)?;
                Self::Ticket(match kind {
                    "open" => TicketButton::Open(arg),
                    "close" => TicketButton::Close(arg),
                    "claim" => TicketButton::Claim(arg),
                    "reopen" => TicketButton::Reopen(arg),
                    "delete" => TicketButton::Delete(arg),
                    _ => return None,
                })
            }
            ("reminder", "cancel", arg) => Self::Reminder(ReminderAction::Cancel(non_empty(arg)?)),
            ("lfg", kind, Some(arg)) => {
                let id = arg.parse().ok()?;
                Self::Lfg(match kind {
                    "join" => LfgAction::Join(id),
                    "leave" => LfgAction::Leave(id),
                    "close" => LfgAction::Close(id),
                    _ => return None,
                })
            }
            ("tempvc", "lock", None) => Self::TempVc(TempVcAction::Lock),
            ("tempvc", "unlock", None) => Self::TempVc(TempVcAction::Unlock),
            ("tempvc", "rename", None) => Self::TempVc(TempVcAction::Rename),
            ("tempvc", "claim", None) => Self::TempVc(TempVcAction::Claim),
            ("tempvc", "limit", Some(arg)) => Self::TempVc(TempVcAction::Limit(arg.parse().ok()?)),
            ("utils", "dismiss", None) => Self::Utils(UtilsAction::Dismiss),
            _ => return None,
        };
        Some(parsed)
    }
}

impl fmt::Display for ComponentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Music(action) => match action {
                MusicAction::Pause => f.write_str("music_pause"),
                MusicAction::Skip => f.write_str("music_skip"),
                MusicAction::Stop => f.write_str("music_stop"),
                MusicAction::Loop => f.write_str("music_loop"),
                MusicAction::Favorite => f.write_str("music_fav"),
                MusicAction::Lyrics => f.write_str("music_lyrics"),
                MusicAction::Queue(page) => write!(f, "music_queue:{page}"),
            },
            Self::Ticket(action) => match action {
                TicketButton::Open(kind) => write!(f, "ticket_open:{kind}"),
                TicketButton::Close(id) => write!(f, "ticket_close:{id}"),
                TicketButton::Claim(id) => write!(f, "ticket_claim:{id}"),
                TicketButton::Reopen(id) => write!(f, "ticket_reopen:{id}"),
                TicketButton::Delete(id) => write!(f, "ticket_delete:{id}"),
            },
            Self::Reminder(ReminderAction::Cancel(id)) => write!(f, "reminder_cancel:{id}"),
            Self::Lfg(action) => match action {
                LfgAction::Join(id) => write!(f, "lfg_join:{id}"),
                LfgAction::Leave(id) => write!(f, "lfg_leave:{id}"),
                LfgAction::Close(id) => write!(f, "lfg_close:{id}"),
            },
            Self::TempVc(action) => match action {
                TempVcAction::Lock => f.write_str("tempvc_lock"),
                TempVcAction::Unlock => f.write_str("tempvc_unlock"),
                TempVcAction::Rename => f.write_str("tempvc_rename"),
                TempVcAction::Claim => f.write_str("tempvc_claim"),
                TempVcAction::Limit(limit) => write!(f, "tempvc_limit:{limit}"),
            },
            Self::SelfRole(role_id) => write!(f, "selfrole:{role_id}"),
            Self::Utils(UtilsAction::Dismiss) => f.write_str("utils_dismiss"),
        }
    }
}

/// Self-role ids have no module prefix of their own.
fn parse_self_role(custom_id: &str) -> Option<ComponentAction> {
    let role = custom_id.strip_prefix("selfrole:")?;
    role.parse::<u64>()
        .ok()
        .and_then(Id::new_checked)
        .map(ComponentAction::SelfRole)
}

impl ModalAction {
    pub fn parse(custom_id: &str) -> Option<Self> {
        match custom_id.split_once(':') {
            Some(("ticket_modal", kind)) => non_empty(Some(kind)).map(Self::Ticket),
            Some(("template_modal", name)) => non_empty(Some(name)).map(Self::Template),
            None if custom_id == "tempvc_rename_modal" => Some(Self::TempVcRename),
            _ => None,
        }
    }
}

impl fmt::Display for ModalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ticket(kind) => write!(f, "ticket_modal:{kind}"),
            Self::Template(name) => write!(f, "template_modal:{name}"),
            Self::TempVcRename => f.write_str("tempvc_rename_modal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_ids() {
        assert_eq!(
            ComponentAction::parse("music_queue:3"),
            Some(ComponentAction::Music(MusicAction::Queue(3)))
        );
        assert_eq!(
            ComponentAction::parse("ticket_close:0042"),
            Some(ComponentAction::Ticket(TicketButton::Close("0042".into())))
        );
        assert_eq!(
            ComponentAction::parse("tempvc_limit:5"),
            Some(ComponentAction::TempVc(TempVcAction::Limit(5)))
        );
        assert_eq!(
            ComponentAction::parse("reminder_cancel:Ab3dE9xZ"),
            Some(ComponentAction::Reminder(ReminderAction::Cancel("Ab3dE9xZ".into())))
        );
    }

    #[test]
    fn test_display_matches_parse() {
        let actions = [
            ComponentAction::Music(MusicAction::Favorite),
            ComponentAction::Ticket(TicketButton::Open("support".into())),
            ComponentAction::Lfg(LfgAction::Leave(7)),
            ComponentAction::Utils(UtilsAction::Dismiss),
        ];
        for action in actions {
            let id = action.to_string();
            assert_eq!(ComponentAction::parse(&id), Some(action), "{id}");
        }
        assert_eq!(ComponentAction::Music(MusicAction::Favorite).to_string(), "music_fav");
    }

    #[test]
    fn test_unknown_ids_are_rejected() {
        for id in [
            "",
            "pause",
            "music_rewind",
            "ticket_close:",
            "lfg_join:abc",
            "tempvc_limit",
            "mystery_button:1",
        ] {
            assert_eq!(ComponentAction::parse(id), None, "{id}");
        }
    }

    #[test]
    fn test_self_role_and_modals() {
        assert_eq!(
            ComponentAction::parse("selfrole:123"),
            Some(ComponentAction::SelfRole(Id::new(123)))
        );
        assert_eq!(ComponentAction::parse("selfrole:0"), None);
        assert_eq!(
            ModalAction::parse("ticket_modal:bug"),
            Some(ModalAction::Ticket("bug".into()))
        );
        assert_eq!(ModalAction::parse("tempvc_rename_modal"), Some(ModalAction::TempVcRename));
        assert_eq!(ModalAction::parse("template_modal:"), None);
        assert_eq!(ModalAction::parse("other"), None);
    }
}
