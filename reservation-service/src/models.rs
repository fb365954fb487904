use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use shared::*;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::customers)]
pub struct CustomerRow {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub notes: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::customers, treat_none_as_null = true)]
pub struct CustomerChanges {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub notes: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::staff)]
pub struct StaffRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::menus)]
pub struct MenuRow {
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

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::options)]
pub struct OptionRow {
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

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::shifts)]
pub struct ShiftRow {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable, AsChangeset, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::reservations, treat_none_as_null = true)]
pub struct ReservationRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub staff_id: Uuid,
    pub reservation_date: NaiveDate,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: String,
    pub total_duration: i32,
    pub total_price: i32,
    pub notes: String,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::reservation_menus)]
pub struct ReservationMenuRow {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub menu_id: Uuid,
    pub position: i32,
    pub quantity: i32,
    pub unit_price: i32,
    pub unit_duration: i32,
    pub total_price: i32,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::reservation_options)]
pub struct ReservationOptionRow {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub option_id: Uuid,
    pub position: i32,
    pub quantity: i32,
    pub unit_price: i32,
    pub unit_duration: i32,
    pub total_price: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::audit_logs)]
pub struct NewAuditLog {
    pub id: Uuid,
    pub table_name: String,
    pub record_id: Uuid,
    pub action: String,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::notification_logs)]
pub struct NewNotificationLog {
    pub id: Uuid,
    pub channel: String,
    pub recipient: String,
    pub subject: String,
    pub message: String,
    pub status: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable)]
pub struct NotificationLogRow {
    pub id: Uuid,
    pub channel: String,
    pub recipient: String,
    pub subject: String,
    pub message: String,
    pub status: String,
    pub error_message: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            notes: row.notes,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<StaffRow> for Staff {
    fn from(row: StaffRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            position: row.position,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<MenuRow> for Menu {
    fn from(row: MenuRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            duration: row.duration,
            price: row.price,
            category: row.category,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<OptionRow> for MenuOption {
    fn from(row: OptionRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            duration: row.duration,
            price: row.price,
            category: row.category,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<ShiftRow> for Shift {
    fn from(row: ShiftRow) -> Self {
        Self {
            id: row.id,
            staff_id: row.staff_id,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&Customer> for CustomerRow {
    fn from(customer: &Customer) -> Self {
        Self {
            id: customer.id,
            name: customer.name.clone(),
            phone: customer.phone.clone(),
            email: customer.email.clone(),
            notes: customer.notes.clone(),
            is_active: customer.is_active,
            created_at: customer.created_at,
            updated_at: customer.updated_at,
        }
    }
}

impl From<&Customer> for CustomerChanges {
    fn from(customer: &Customer) -> Self {
        Self {
            name: customer.name.clone(),
            phone: customer.phone.clone(),
            email: customer.email.clone(),
            notes: customer.notes.clone(),
            updated_at: customer.updated_at,
        }
    }
}

impl From<&Staff> for StaffRow {
    fn from(member: &Staff) -> Self {
        Self {
            id: member.id,
            name: member.name.clone(),
            email: member.email.clone(),
            phone: member.phone.clone(),
            position: member.position.clone(),
            is_active: member.is_active,
            created_at: member.created_at,
            updated_at: member.updated_at,
        }
    }
}

impl From<&Menu> for MenuRow {
    fn from(menu: &Menu) -> Self {
        Self {
            id: menu.id,
            name: menu.name.clone(),
            description: menu.description.clone(),
            duration: menu.duration,
            price: menu.price,
            category: menu.category.clone(),
            is_active: menu.is_active,
            created_at: menu.created_at,
            updated_at: menu.updated_at,
        }
    }
}

impl From<&MenuOption> for OptionRow {
    fn from(option: &MenuOption) -> Self {
        Self {
            id: option.id,
            name: option.name.clone(),
            description: option.description.clone(),
            duration: option.duration,
            price: option.price,
            category: option.category.clone(),
            is_active: option.is_active,
            created_at: option.created_at,
            updated_at: option.updated_at,
        }
    }
}

impl From<&Shift> for ShiftRow {
    fn from(shift: &Shift) -> Self {
        Self {
            id: shift.id,
            staff_id: shift.staff_id,
            date: shift.date,
            start_time: shift.start_time,
            end_time: shift.end_time,
            is_active: shift.is_active,
            created_at: shift.created_at,
            updated_at: shift.updated_at,
        }
    }
}

impl From<&Reservation> for ReservationRow {
    fn from(reservation: &Reservation) -> Self {
        Self {
            id: reservation.id,
            customer_id: reservation.customer_id,
            staff_id: reservation.staff_id,
            reservation_date: reservation.reservation_date,
            start_time: reservation.start_time,
            end_time: reservation.end_time,
            status: reservation.status.as_str().to_string(),
            total_duration: reservation.total_duration,
            total_price: reservation.total_price,
            notes: reservation.notes.clone(),
            cancellation_reason: reservation.cancellation_reason.clone(),
            created_at: reservation.created_at,
            updated_at: reservation.updated_at,
        }
    }
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = BookingError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<ReservationStatus>()?;

        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            staff_id: row.staff_id,
            reservation_date: row.reservation_date,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            total_duration: row.total_duration,
            total_price: row.total_price,
            notes: row.notes,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&ReservationLine> for ReservationMenuRow {
    fn from(line: &ReservationLine) -> Self {
        Self {
            id: line.id,
            reservation_id: line.reservation_id,
            menu_id: line.item_id,
            position: line.position,
            quantity: line.quantity,
            unit_price: line.unit_price,
            unit_duration: line.unit_duration,
            total_price: line.total_price,
        }
    }
}

impl From<ReservationMenuRow> for ReservationLine {
    fn from(row: ReservationMenuRow) -> Self {
        Self {
            id: row.id,
            reservation_id: row.reservation_id,
            item_id: row.menu_id,
            position: row.position,
            quantity: row.quantity,
            unit_price: row.unit_price,
            unit_duration: row.unit_duration,
            total_price: row.total_price,
        }
    }
}

impl From<&ReservationLine> for ReservationOptionRow {
    fn from(line: &ReservationLine) -> Self {
        Self {
            id: line.id,
            reservation_id: line.reservation_id,
            option_id: line.item_id,
            position: line.position,
            quantity: line.quantity,
            unit_price: line.unit_price,
            unit_duration: line.unit_duration,
            total_price: line.total_price,
        }
    }
}

impl From<ReservationOptionRow> for ReservationLine {
    fn from(row: ReservationOptionRow) -> Self {
        Self {
            id: row.id,
            reservation_id: row.reservation_id,
            item_id: row.option_id,
            position: row.position,
            quantity: row.quantity,
            unit_price: row.unit_price,
            unit_duration: row.unit_duration,
            total_price: row.total_price,
        }
    }
}

impl From<&AuditEntry> for NewAuditLog {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            id: entry.id,
            table_name: entry.table_name.clone(),
            record_id: entry.record_id,
            action: entry.action.as_str().to_string(),
            old_values: entry.old_values.clone(),
            new_values: entry.new_values.clone(),
            created_at: entry.created_at,
        }
    }
}

impl From<&NotificationEntry> for NewNotificationLog {
    fn from(entry: &NotificationEntry) -> Self {
        Self {
            id: entry.id,
            channel: entry.channel.as_str().to_string(),
            recipient: entry.recipient.clone(),
            subject: entry.subject.clone(),
            message: entry.message.clone(),
            status: "pending".to_string(),
            scheduled_at: entry.scheduled_at,
            created_at: entry.created_at,
            updated_at: entry.created_at,
        }
    }
}
