use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::ReservationStatus;

/// Coarse classification used by boundaries to pick a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    BusinessRule,
    Internal,
}

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("reservation date {date} is too early; the earliest bookable date is {earliest}")]
    InvalidDate { date: NaiveDate, earliest: NaiveDate },

    #[error("reservation date {date} is too far ahead; the latest bookable date is {latest}")]
    DateRangeExceeded { date: NaiveDate, latest: NaiveDate },

    #[error("invalid staff id `{0}`")]
    InvalidStaffId(String),

    #[error("customer {0} not found")]
    CustomerNotFound(Uuid),

    #[error("staff {0} not found")]
    StaffNotFound(Uuid),

    #[error("menu {0} not found")]
    MenuNotFound(Uuid),

    #[error("option {0} not found")]
    OptionNotFound(Uuid),

    #[error("reservation {0} not found")]
    ReservationNotFound(Uuid),

    #[error("{entity} {id} not found")]
    EntityNotFound { entity: &'static str, id: Uuid },

    #[error("time slot is already booked by reservation {conflicting_id}")]
    TimeSlotConflict { staff_id: Uuid, conflicting_id: Uuid },

    #[error("{field} `{value}` already exists")]
    Duplicate { field: &'static str, value: String },

    #[error("cannot update a {0} reservation")]
    ImmutableState(ReservationStatus),

    #[error("reservation is already cancelled")]
    AlreadyCancelled,

    #[error("cannot cancel a {0} reservation")]
    TerminalState(ReservationStatus),

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    #[error("{context}")]
    Internal {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl BookingError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        BookingError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Wraps a store or infrastructure failure with the operation it broke.
    pub fn internal(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        BookingError::Internal {
            context: context.into(),
            source: Box::new(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::Validation { .. } | BookingError::InvalidStaffId(_) => {
                ErrorKind::Validation
            }
            BookingError::CustomerNotFound(_)
            | BookingError::StaffNotFound(_)
            | BookingError::MenuNotFound(_)
            | BookingError::OptionNotFound(_)
            | BookingError::ReservationNotFound(_)
            | BookingError::EntityNotFound { .. } => ErrorKind::NotFound,
            BookingError::TimeSlotConflict { .. } | BookingError::Duplicate { .. } => {
                ErrorKind::Conflict
            }
            BookingError::InvalidDate { .. }
            | BookingError::DateRangeExceeded { .. }
            | BookingError::ImmutableState(_)
            | BookingError::AlreadyCancelled
            | BookingError::TerminalState(_)
            | BookingError::InvalidTransition { .. } => ErrorKind::BusinessRule,
            BookingError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BookingError::Validation { .. } => "VALIDATION_ERROR",
            BookingError::InvalidDate { .. } => "INVALID_DATE",
            BookingError::DateRangeExceeded { .. } => "DATE_RANGE_EXCEEDED",
            BookingError::InvalidStaffId(_) => "INVALID_STAFF_ID",
            BookingError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            BookingError::StaffNotFound(_) => "STAFF_NOT_FOUND",
            BookingError::MenuNotFound(_) => "MENU_NOT_FOUND",
            BookingError::OptionNotFound(_) => "OPTION_NOT_FOUND",
            BookingError::ReservationNotFound(_) => "RESERVATION_NOT_FOUND",
            BookingError::EntityNotFound { .. } => "NOT_FOUND",
            BookingError::TimeSlotConflict { .. } => "TIME_SLOT_CONFLICT",
            BookingError::Duplicate { .. } => "DUPLICATE",
            BookingError::ImmutableState(_) => "IMMUTABLE_STATE",
            BookingError::AlreadyCancelled => "ALREADY_CANCELLED",
            BookingError::TerminalState(_) => "TERMINAL_STATE",
            BookingError::InvalidTransition { .. } => "INVALID_TRANSITION",
            BookingError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<diesel::result::Error> for BookingError {
    fn from(err: diesel::result::Error) -> Self {
        BookingError::internal("database error", err)
    }
}
