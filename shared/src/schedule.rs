use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::{BookingError, Menu, MenuOption, Reservation, ReservationLine};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

pub fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        BookingError::validation(field, format!("`{}` is not a YYYY-MM-DD date", value))
    })
}

pub fn parse_time(field: &'static str, value: &str) -> Result<NaiveTime, BookingError> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT)
        .map_err(|_| BookingError::validation(field, format!("`{}` is not a HH:MM:SS time", value)))
}

pub fn parse_id(field: &'static str, value: &str) -> Result<Uuid, BookingError> {
    Uuid::parse_str(value.trim())
        .map_err(|_| BookingError::validation(field, format!("`{}` is not a valid id", value)))
}

/// Range of dates, relative to the business-local "today", that accept new
/// bookings. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindow {
    pub min_lead_days: i64,
    pub max_advance_days: i64,
}

impl Default for BookingWindow {
    fn default() -> Self {
        Self {
            min_lead_days: 1,
            max_advance_days: 90,
        }
    }
}

impl BookingWindow {
    pub fn new(max_advance_days: i64) -> Self {
        Self {
            max_advance_days,
            ..Self::default()
        }
    }

    pub fn earliest(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::days(self.min_lead_days)
    }

    pub fn latest(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::days(self.max_advance_days)
    }

    pub fn check(&self, date: NaiveDate, today: NaiveDate) -> Result<(), BookingError> {
        let earliest = self.earliest(today);
        if date < earliest {
            return Err(BookingError::InvalidDate { date, earliest });
        }
        let latest = self.latest(today);
        if date > latest {
            return Err(BookingError::DateRangeExceeded { date, latest });
        }
        Ok(())
    }
}

/// Anything that can be put on a reservation: contributes minutes and price.
pub trait Bookable {
    fn id(&self) -> Uuid;
    fn duration(&self) -> i32;
    fn price(&self) -> i32;
}

impl Bookable for Menu {
    fn id(&self) -> Uuid {
        self.id
    }
    fn duration(&self) -> i32 {
        self.duration
    }
    fn price(&self) -> i32 {
        self.price
    }
}

impl Bookable for MenuOption {
    fn id(&self) -> Uuid {
        self.id
    }
    fn duration(&self) -> i32 {
        self.duration
    }
    fn price(&self) -> i32 {
        self.price
    }
}

/// The priced contents of a reservation: line snapshots plus their totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub menus: Vec<ReservationLine>,
    pub options: Vec<ReservationLine>,
}

impl Selection {
    pub fn price<M: Bookable, O: Bookable>(
        reservation_id: Uuid,
        menus: &[M],
        options: &[O],
    ) -> Self {
        Self {
            menus: snapshot_lines(reservation_id, menus),
            options: snapshot_lines(reservation_id, options),
        }
    }

    pub fn total_duration(&self) -> Result<i32, BookingError> {
        self.lines().try_fold(0i32, |total, l| {
            l.unit_duration
                .checked_mul(l.quantity)
                .and_then(|minutes| total.checked_add(minutes))
                .ok_or_else(|| BookingError::validation("menu_ids", "total duration out of range"))
        })
    }

    pub fn total_price(&self) -> Result<i32, BookingError> {
        self.lines().try_fold(0i32, |total, l| {
            total
                .checked_add(l.total_price)
                .ok_or_else(|| BookingError::validation("menu_ids", "total price out of range"))
        })
    }

    fn lines(&self) -> impl Iterator<Item = &ReservationLine> {
        self.menus.iter().chain(self.options.iter())
    }
}

/// Captures price and duration of each item as a quantity-one line, keeping
/// the input order.
pub fn snapshot_lines<T: Bookable>(reservation_id: Uuid, items: &[T]) -> Vec<ReservationLine> {
    items
        .iter()
        .enumerate()
        .map(|(position, item)| ReservationLine {
            id: Uuid::new_v4(),
            reservation_id,
            item_id: item.id(),
            position: position as i32,
            quantity: 1,
            unit_price: item.price(),
            unit_duration: item.duration(),
            total_price: item.price(),
        })
        .collect()
}

pub fn end_time_after(start: NaiveDateTime, minutes: i32) -> NaiveDateTime {
    start + Duration::minutes(i64::from(minutes))
}

/// Half-open interval overlap: `[a_start, a_end)` against `[b_start, b_end)`.
pub fn overlaps(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Returns the first reservation that still occupies the schedule and
/// overlaps `[start, end)`. `ignore` excludes the reservation being edited.
pub fn find_conflict<'a>(
    existing: &'a [Reservation],
    start: NaiveDateTime,
    end: NaiveDateTime,
    ignore: Option<Uuid>,
) -> Option<&'a Reservation> {
    existing.iter().find(|r| {
        Some(r.id) != ignore
            && r.status.occupies_schedule()
            && overlaps(start, end, r.start_time, r.end_time)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReservationStatus;
    use chrono::Utc;
    use proptest::prelude::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        day(2030, 5, 1).and_hms_opt(h, m, 0).unwrap()
    }

    fn booked(start: NaiveDateTime, minutes: i32, status: ReservationStatus) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            staff_id: Uuid::new_v4(),
            reservation_date: start.date(),
            start_time: start,
            end_time: end_time_after(start, minutes),
            status,
            total_duration: minutes,
            total_price: 0,
            notes: String::new(),
            cancellation_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    struct Item(i32, i32);

    impl Bookable for Item {
        fn id(&self) -> Uuid {
            Uuid::nil()
        }
        fn duration(&self) -> i32 {
            self.0
        }
        fn price(&self) -> i32 {
            self.1
        }
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let today = day(2030, 1, 1);
        let window = BookingWindow::default();

        assert!(matches!(
            window.check(today, today),
            Err(BookingError::InvalidDate { .. })
        ));
        assert!(window.check(day(2030, 1, 2), today).is_ok());
        assert!(window.check(today + Duration::days(90), today).is_ok());
        assert!(matches!(
            window.check(today + Duration::days(91), today),
            Err(BookingError::DateRangeExceeded { .. })
        ));
    }

    #[test]
    fn parses_boundary_formats() {
        assert_eq!(parse_date("date", "2030-02-03").unwrap(), day(2030, 2, 3));
        assert_eq!(
            parse_time("start_time", "10:30:00").unwrap(),
            NaiveTime::from_hms_opt(10, 30, 0).unwrap()
        );
        assert!(matches!(
            parse_date("date", "03/02/2030"),
            Err(BookingError::Validation { field: "date", .. })
        ));
        assert!(parse_time("start_time", "10:30").is_err());
        assert!(parse_id("staff_id", "nope").is_err());
    }

    #[test]
    fn selection_snapshots_in_order() {
        let reservation_id = Uuid::new_v4();
        let selection = Selection::price(
            reservation_id,
            &[Item(60, 5000), Item(30, 3000)],
            &[Item(10, 500)],
        );

        assert_eq!(selection.total_duration().unwrap(), 100);
        assert_eq!(selection.total_price().unwrap(), 8500);
        assert_eq!(selection.menus[1].position, 1);
        assert_eq!(selection.menus[1].unit_price, 3000);
        assert!(selection.options.iter().all(|l| l.reservation_id == reservation_id));
    }

    #[test]
    fn oversized_totals_are_rejected() {
        let expensive = [Item(60, 2_000_000_000), Item(60, 2_000_000_000)];
        let selection = Selection::price(Uuid::new_v4(), &expensive, &[] as &[Item]);

        assert!(matches!(
            selection.total_price(),
            Err(BookingError::Validation { field: "menu_ids", .. })
        ));
        assert_eq!(selection.total_duration().unwrap(), 120);

        let endless = [Item(i32::MAX, 0), Item(1, 0)];
        let selection = Selection::price(Uuid::new_v4(), &endless, &[] as &[Item]);
        assert!(selection.total_duration().is_err());
    }

    #[test]
    fn adjacent_reservations_do_not_conflict() {
        let existing = vec![booked(at(10, 0), 60, ReservationStatus::Pending)];

        assert!(find_conflict(&existing, at(11, 0), at(11, 30), None).is_none());
        assert!(find_conflict(&existing, at(9, 0), at(10, 0), None).is_none());
        assert!(find_conflict(&existing, at(10, 30), at(11, 30), None).is_some());
        assert!(find_conflict(&existing, at(9, 30), at(12, 0), None).is_some());
    }

    #[test]
    fn released_and_ignored_reservations_never_conflict() {
        let cancelled = booked(at(10, 0), 60, ReservationStatus::Cancelled);
        let no_show = booked(at(10, 0), 60, ReservationStatus::NoShow);
        let own = booked(at(10, 0), 60, ReservationStatus::Confirmed);
        let own_id = own.id;
        let existing = vec![cancelled, no_show, own];

        assert!(find_conflict(&existing, at(10, 0), at(11, 0), Some(own_id)).is_none());
        assert!(find_conflict(&existing, at(10, 0), at(11, 0), None).is_some());
    }

    proptest! {
        #[test]
        fn totals_are_exact_sums(
            menus in prop::collection::vec((1i32..600, 0i32..50_000), 1..6),
            options in prop::collection::vec((0i32..120, 0i32..10_000), 0..6),
        ) {
            let menu_items: Vec<Item> = menus.iter().map(|&(d, p)| Item(d, p)).collect();
            let option_items: Vec<Item> = options.iter().map(|&(d, p)| Item(d, p)).collect();
            let selection = Selection::price(Uuid::new_v4(), &menu_items, &option_items);

            let duration: i32 = menus.iter().chain(&options).map(|item| item.0).sum();
            let price: i32 = menus.iter().chain(&options).map(|item| item.1).sum();
            prop_assert_eq!(selection.total_duration().unwrap(), duration);
            prop_assert_eq!(selection.total_price().unwrap(), price);
        }

        /// Admitting only intervals that pass the conflict check keeps every
        /// pair of kept intervals disjoint.
        #[test]
        fn accepted_intervals_never_overlap(
            requests in prop::collection::vec((0i64..48, 1i32..180), 1..40)
        ) {
            let base = at(8, 0);
            let mut accepted: Vec<Reservation> = Vec::new();
            for (slot, minutes) in requests {
                let start = base + Duration::minutes(slot * 15);
                let end = end_time_after(start, minutes);
                if find_conflict(&accepted, start, end, None).is_none() {
                    accepted.push(booked(start, minutes, ReservationStatus::Pending));
                }
            }

            for (i, a) in accepted.iter().enumerate() {
                for b in accepted.iter().skip(i + 1) {
                    prop_assert!(!overlaps(a.start_time, a.end_time, b.start_time, b.end_time));
                }
            }
        }
    }
}
