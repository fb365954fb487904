use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{parse_date, parse_time, BookingError};
use chrono::{NaiveDate, NaiveTime};

fn check_len(field: &'static str, value: &str, min: usize, max: usize) -> Result<(), BookingError> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(BookingError::validation(
            field,
            format!("must be between {} and {} characters", min, max),
        ));
    }
    Ok(())
}

fn check_range(field: &'static str, value: i32, min: i32, max: i32) -> Result<(), BookingError> {
    if value < min || value > max {
        return Err(BookingError::validation(
            field,
            format!("must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

fn check_email(field: &'static str, value: &str) -> Result<(), BookingError> {
    check_len(field, value, 3, 255)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(BookingError::validation(field, "must be an email address")),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    #[serde(default)]
    pub notes: String,
}

impl CustomerInput {
    /// Trims fields and turns a blank email into `None`.
    pub fn validated(mut self) -> Result<Self, BookingError> {
        self.name = self.name.trim().to_string();
        self.phone = self.phone.trim().to_string();
        self.email = self
            .email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());

        check_len("name", &self.name, 1, 100)?;
        check_len("phone", &self.phone, 10, 20)?;
        if let Some(email) = &self.email {
            check_email("email", email)?;
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub position: Option<String>,
}

impl StaffInput {
    pub fn validated(mut self) -> Result<Self, BookingError> {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_string();
        check_len("name", &self.name, 1, 100)?;
        check_email("email", &self.email)?;
        if let Some(phone) = &self.phone {
            check_len("phone", phone, 10, 20)?;
        }
        if let Some(position) = &self.position {
            check_len("position", position, 0, 50)?;
        }
        Ok(self)
    }
}

/// Shared shape of menus and options; the allowed duration range differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceItemInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub duration: i32,
    pub price: i32,
    pub category: Option<String>,
}

impl ServiceItemInput {
    pub fn validated_menu(self) -> Result<Self, BookingError> {
        self.validated(1, 600)
    }

    pub fn validated_option(self) -> Result<Self, BookingError> {
        self.validated(0, 120)
    }

    fn validated(mut self, min_duration: i32, max_duration: i32) -> Result<Self, BookingError> {
        self.name = self.name.trim().to_string();
        check_len("name", &self.name, 1, 100)?;
        check_range("duration", self.duration, min_duration, max_duration)?;
        check_range("price", self.price, 0, i32::MAX)?;
        if let Some(category) = &self.category {
            check_len("category", category, 0, 50)?;
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftInput {
    pub staff_id: Uuid,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftWindow {
    pub staff_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ShiftInput {
    pub fn parse(&self) -> Result<ShiftWindow, BookingError> {
        let window = ShiftWindow {
            staff_id: self.staff_id,
            date: parse_date("date", &self.date)?,
            start_time: parse_time("start_time", &self.start_time)?,
            end_time: parse_time("end_time", &self.end_time)?,
        };
        if window.start_time >= window.end_time {
            return Err(BookingError::validation("end_time", "must be after start_time"));
        }
        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(phone: &str, email: Option<&str>) -> CustomerInput {
        CustomerInput {
            name: " Hanako ".to_string(),
            phone: phone.to_string(),
            email: email.map(str::to_string),
            notes: String::new(),
        }
    }

    #[test]
    fn customer_is_normalised() {
        let input = customer("09012345678", Some("  ")).validated().unwrap();
        assert_eq!(input.name, "Hanako");
        assert_eq!(input.email, None);
    }

    #[test]
    fn customer_rejects_short_phone_and_bad_email() {
        assert!(matches!(
            customer("0901", None).validated(),
            Err(BookingError::Validation { field: "phone", .. })
        ));
        assert!(matches!(
            customer("09012345678", Some("nobody")).validated(),
            Err(BookingError::Validation { field: "email", .. })
        ));
    }

    #[test]
    fn menus_need_a_duration_but_options_do_not() {
        let item = ServiceItemInput {
            name: "Head spa".to_string(),
            description: String::new(),
            duration: 0,
            price: 1500,
            category: None,
        };
        assert!(item.clone().validated_option().is_ok());
        assert!(matches!(
            item.validated_menu(),
            Err(BookingError::Validation { field: "duration", .. })
        ));
    }

    #[test]
    fn shift_must_end_after_it_starts() {
        let input = ShiftInput {
            staff_id: Uuid::new_v4(),
            date: "2030-01-01".to_string(),
            start_time: "18:00:00".to_string(),
            end_time: "09:00:00".to_string(),
        };
        assert!(matches!(
            input.parse(),
            Err(BookingError::Validation { field: "end_time", .. })
        ));
    }
}
