use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod availability;
mod catalog;
mod clock;
mod error;
mod pagination;
mod schedule;
mod status;

pub use availability::*;
pub use catalog::*;
pub use clock::*;
pub use error::*;
pub use pagination::*;
pub use schedule::*;
pub use status::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub notes: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bookable service. Duration is in minutes, price in whole currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Menu {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub duration: i32,
    pub price: i32,
    pub category: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An add-on to a menu. `duration` and `price` are added on top of the menus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuOption {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub duration: i32,
    pub price: i32,
    pub category: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shift {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }
}

/// Start and end are business-local timestamps; `end_time` is always
/// `start_time + total_duration` minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub staff_id: Uuid,
    pub reservation_date: NaiveDate,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: ReservationStatus,
    pub total_duration: i32,
    pub total_price: i32,
    pub notes: String,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One selected menu or option on a reservation, with the catalog values
/// captured at booking time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationLine {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub item_id: Uuid,
    pub position: i32,
    pub quantity: i32,
    pub unit_price: i32,
    pub unit_duration: i32,
    pub total_price: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookedMenu {
    #[serde(flatten)]
    pub line: ReservationLine,
    pub menu: Option<Menu>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookedOption {
    #[serde(flatten)]
    pub line: ReservationLine,
    pub option: Option<MenuOption>,
}

/// A reservation together with the rows it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationDetail {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub customer: Option<Customer>,
    pub staff: Option<Staff>,
    pub reservation_menus: Vec<BookedMenu>,
    pub reservation_options: Vec<BookedOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReservationRequest {
    pub customer_id: Uuid,
    pub staff_id: Uuid,
    pub reservation_date: String,
    pub start_time: String,
    pub menu_ids: Vec<Uuid>,
    #[serde(default)]
    pub option_ids: Vec<Uuid>,
    #[serde(default)]
    pub notes: String,
}

/// Omitted fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReservationRequest {
    pub customer_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub reservation_date: Option<String>,
    pub start_time: Option<String>,
    pub menu_ids: Option<Vec<Uuid>>,
    pub option_ids: Option<Vec<Uuid>>,
    pub notes: Option<String>,
}

impl UpdateReservationRequest {
    pub fn changes_selection(&self) -> bool {
        self.menu_ids.is_some() || self.option_ids.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelReservationRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
    pub staff_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl ReservationFilter {
    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.status.map_or(true, |s| reservation.status == s)
            && self.staff_id.map_or(true, |id| reservation.staff_id == id)
            && self.customer_id.map_or(true, |id| reservation.customer_id == id)
            && self.date_from.map_or(true, |d| reservation.reservation_date >= d)
            && self.date_to.map_or(true, |d| reservation.reservation_date <= d)
    }
}

/// Raw availability parameters as they arrive at the boundary. `menu_ids`
/// is a comma-separated list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<String>,
    pub duration: Option<String>,
    pub staff_id: Option<String>,
    pub menu_ids: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub table_name: String,
    pub record_id: Uuid,
    pub action: AuditAction,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl AuditEntry {
    pub fn new(
        table_name: &str,
        record_id: Uuid,
        action: AuditAction,
        old_values: Option<serde_json::Value>,
        new_values: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            table_name: table_name.to_string(),
            record_id,
            action,
            old_values,
            new_values,
            created_at: Utc::now(),
        }
    }

    pub fn reservation(
        action: AuditAction,
        record_id: Uuid,
        old_values: Option<&Reservation>,
        new_values: Option<&Reservation>,
    ) -> Self {
        Self::new(
            "reservations",
            record_id,
            action,
            old_values.and_then(|r| serde_json::to_value(r).ok()),
            new_values.and_then(|r| serde_json::to_value(r).ok()),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Email => "email",
            NotificationChannel::Sms => "sms",
            NotificationChannel::Push => "push",
        }
    }
}

/// An outbound message queued for the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEntry {
    pub id: Uuid,
    pub channel: NotificationChannel,
    pub recipient: String,
    pub subject: String,
    pub message: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NotificationEntry {
    /// Addresses the customer by email when one is on file, otherwise by SMS.
    pub fn for_customer(
        customer: &Customer,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let (channel, recipient) = match customer.email.as_deref().filter(|e| !e.is_empty()) {
            Some(email) => (NotificationChannel::Email, email.to_string()),
            None => (NotificationChannel::Sms, customer.phone.clone()),
        };

        Self {
            id: Uuid::new_v4(),
            channel,
            recipient,
            subject: subject.into(),
            message: message.into(),
            scheduled_at: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(email: Option<&str>) -> Customer {
        Customer {
            id: Uuid::new_v4(),
            name: "Hanako".to_string(),
            phone: "09012345678".to_string(),
            email: email.map(str::to_string),
            notes: String::new(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn notification_prefers_email() {
        let entry = NotificationEntry::for_customer(&customer(Some("h@example.com")), "s", "m");
        assert_eq!(entry.channel, NotificationChannel::Email);
        assert_eq!(entry.recipient, "h@example.com");
    }

    #[test]
    fn notification_falls_back_to_phone() {
        let entry = NotificationEntry::for_customer(&customer(Some("")), "s", "m");
        assert_eq!(entry.channel, NotificationChannel::Sms);
        assert_eq!(entry.recipient, "09012345678");
    }

    #[test]
    fn detail_serializes_flat() {
        let now = Utc::now();
        let date = NaiveDate::from_ymd_opt(2030, 1, 2).unwrap();
        let start = date.and_hms_opt(10, 0, 0).unwrap();
        let detail = ReservationDetail {
            reservation: Reservation {
                id: Uuid::new_v4(),
                customer_id: Uuid::new_v4(),
                staff_id: Uuid::new_v4(),
                reservation_date: date,
                start_time: start,
                end_time: end_time_after(start, 60),
                status: ReservationStatus::Pending,
                total_duration: 60,
                total_price: 5000,
                notes: String::new(),
                cancellation_reason: None,
                created_at: now,
                updated_at: now,
            },
            customer: None,
            staff: None,
            reservation_menus: vec![],
            reservation_options: vec![],
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["reservation_date"], "2030-01-02");
        assert_eq!(json["total_price"], 5000);
    }

    #[test]
    fn filter_matches_on_every_field() {
        let now = Utc::now();
        let date = NaiveDate::from_ymd_opt(2030, 1, 2).unwrap();
        let start = date.and_hms_opt(10, 0, 0).unwrap();
        let reservation = Reservation {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            staff_id: Uuid::new_v4(),
            reservation_date: date,
            start_time: start,
            end_time: end_time_after(start, 30),
            status: ReservationStatus::Confirmed,
            total_duration: 30,
            total_price: 1000,
            notes: String::new(),
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        assert!(ReservationFilter::default().matches(&reservation));
        assert!(ReservationFilter {
            status: Some(ReservationStatus::Confirmed),
            staff_id: Some(reservation.staff_id),
            date_from: Some(date),
            date_to: Some(date),
            ..Default::default()
        }
        .matches(&reservation));
        assert!(!ReservationFilter {
            status: Some(ReservationStatus::Pending),
            ..Default::default()
        }
        .matches(&reservation));
        assert!(!ReservationFilter {
            date_from: date.succ_opt(),
            ..Default::default()
        }
        .matches(&reservation));
    }
}
