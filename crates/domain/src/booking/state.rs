//! Booking state machine.

use common::Role;
use serde::{Deserialize, Serialize};

/// The status of a booking in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Accepted ──► Ongoing ──► Completed
///    │           │
///    └───────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Waiting for the provider to accept.
    #[default]
    Pending,

    /// Provider agreed to do the job.
    Accepted,

    /// Work in progress.
    Ongoing,

    /// Job done (terminal state).
    Completed,

    /// Called off before work started (terminal state).
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Accepted,
        BookingStatus::Ongoing,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    /// Roles allowed to move a booking from `self` to `to`, or None if the
    /// pair is not a transition at all.
    pub fn allowed_roles(&self, to: BookingStatus) -> Option<&'static [Role]> {
        use BookingStatus::*;

        const PROVIDER: &[Role] = &[Role::Provider];
        const ANY_PARTY: &[Role] = &[Role::Client, Role::Provider, Role::Admin];

        match (self, to) {
            (Pending, Accepted) => Some(PROVIDER),
            (Pending, Cancelled) => Some(ANY_PARTY),
            (Accepted, Ongoing) => Some(PROVIDER),
            (Accepted, Cancelled) => Some(ANY_PARTY),
            (Ongoing, Completed) => Some(PROVIDER),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, to: BookingStatus) -> bool {
        self.allowed_roles(to).is_some()
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Ongoing => "ongoing",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown booking status: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_pending() {
        assert_eq!(BookingStatus::default(), BookingStatus::Pending);
    }

    #[test]
    fn happy_path_is_provider_driven() {
        assert_eq!(
            BookingStatus::Pending.allowed_roles(BookingStatus::Accepted),
            Some(&[Role::Provider][..])
        );
        assert_eq!(
            BookingStatus::Accepted.allowed_roles(BookingStatus::Ongoing),
            Some(&[Role::Provider][..])
        );
        assert_eq!(
            BookingStatus::Ongoing.allowed_roles(BookingStatus::Completed),
            Some(&[Role::Provider][..])
        );
    }

    #[test]
    fn cancel_only_before_work_starts() {
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Cancelled));
        assert!(BookingStatus::Accepted.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::Ongoing.can_transition_to(BookingStatus::Cancelled));
    }

    #[test]
    fn no_skipping_states() {
        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::Ongoing));
        assert!(!BookingStatus::Accepted.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::Completed));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [BookingStatus::Completed, BookingStatus::Cancelled] {
            assert!(from.is_terminal());
            for to in BookingStatus::ALL {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn parses_and_displays_lowercase() {
        assert_eq!("Ongoing".parse::<BookingStatus>(), Ok(BookingStatus::Ongoing));
        assert_eq!(BookingStatus::Cancelled.to_string(), "cancelled");
        assert!("shipped".parse::<BookingStatus>().is_err());
    }
}
