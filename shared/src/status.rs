use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::BookingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl ReservationStatus {
    pub const ALL: [ReservationStatus; 5] = [
        ReservationStatus::Pending,
        ReservationStatus::Confirmed,
        ReservationStatus::Completed,
        ReservationStatus::Cancelled,
        ReservationStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::NoShow => "no_show",
        }
    }

    /// Targets reachable through a status update. `no_show` has no inbound
    /// edge here; it is only set administratively.
    pub fn allowed_transitions(&self) -> &'static [ReservationStatus] {
        match self {
            ReservationStatus::Pending => {
                &[ReservationStatus::Confirmed, ReservationStatus::Cancelled]
            }
            ReservationStatus::Confirmed => {
                &[ReservationStatus::Completed, ReservationStatus::Cancelled]
            }
            ReservationStatus::Completed
            | ReservationStatus::Cancelled
            | ReservationStatus::NoShow => &[],
        }
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn transition(self, next: ReservationStatus) -> Result<ReservationStatus, BookingError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(BookingError::InvalidTransition { from: self, to: next })
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Completed and cancelled reservations reject field edits.
    pub fn is_frozen(&self) -> bool {
        matches!(self, ReservationStatus::Completed | ReservationStatus::Cancelled)
    }

    /// Whether a reservation in this status still holds its slot on the
    /// staff member's schedule.
    pub fn occupies_schedule(&self) -> bool {
        !matches!(self, ReservationStatus::Cancelled | ReservationStatus::NoShow)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReservationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| BookingError::validation("status", format!("unknown status `{}`", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EDGES: [(ReservationStatus, ReservationStatus); 4] = [
        (ReservationStatus::Pending, ReservationStatus::Confirmed),
        (ReservationStatus::Pending, ReservationStatus::Cancelled),
        (ReservationStatus::Confirmed, ReservationStatus::Completed),
        (ReservationStatus::Confirmed, ReservationStatus::Cancelled),
    ];

    #[test]
    fn every_pair_is_accepted_only_on_listed_edges() {
        for from in ReservationStatus::ALL {
            for to in ReservationStatus::ALL {
                let listed = EDGES.contains(&(from, to));
                match from.transition(to) {
                    Ok(next) => {
                        assert!(listed, "{} -> {} should be rejected", from, to);
                        assert_eq!(next, to);
                    }
                    Err(BookingError::InvalidTransition { from: f, to: t }) => {
                        assert!(!listed, "{} -> {} should be accepted", from, to);
                        assert_eq!((f, t), (from, to));
                    }
                    Err(other) => panic!("unexpected error {:?}", other),
                }
            }
        }
    }

    #[test]
    fn terminal_states_have_no_way_out() {
        assert!(ReservationStatus::Completed.is_terminal());
        assert!(ReservationStatus::Cancelled.is_terminal());
        assert!(ReservationStatus::NoShow.is_terminal());
        assert!(!ReservationStatus::Pending.is_terminal());
        assert!(!ReservationStatus::Confirmed.is_terminal());
    }

    #[test]
    fn cancelled_and_no_show_release_the_schedule() {
        let blocking: Vec<_> = ReservationStatus::ALL
            .into_iter()
            .filter(ReservationStatus::occupies_schedule)
            .collect();
        assert_eq!(
            blocking,
            vec![
                ReservationStatus::Pending,
                ReservationStatus::Confirmed,
                ReservationStatus::Completed
            ]
        );
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!("no_show".parse::<ReservationStatus>().unwrap(), ReservationStatus::NoShow);
        assert_eq!(
            serde_json::to_string(&ReservationStatus::NoShow).unwrap(),
            "\"no_show\""
        );
        assert!(matches!(
            "done".parse::<ReservationStatus>(),
            Err(BookingError::Validation { field: "status", .. })
        ));
    }

    proptest! {
        /// Walking any sequence of requested targets never leaves a terminal
        /// state and never returns to pending.
        #[test]
        fn walks_are_monotonic(
            targets in prop::collection::vec(
                prop::sample::select(ReservationStatus::ALL.to_vec()),
                0..12,
            )
        ) {
            let mut current = ReservationStatus::Pending;
            for target in targets {
                let before = current;
                if let Ok(next) = current.transition(target) {
                    current = next;
                }
                if before.is_terminal() {
                    prop_assert_eq!(current, before);
                }
                if before != ReservationStatus::Pending {
                    prop_assert_ne!(current, ReservationStatus::Pending);
                }
            }
        }
    }
}
