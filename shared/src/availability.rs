use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Reservation, Shift};

/// Candidate start times are generated on this grid from the shift start.
pub const SLOT_INTERVAL_MINUTES: i64 = 15;

/// Clean-up gap kept free after every booked reservation.
pub const BUFFER_MINUTES: i64 = 15;

/// A slot never spans more than one day.
pub const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffAvailability {
    pub staff_id: Uuid,
    pub staff_name: String,
    pub slots: Vec<Slot>,
}

/// Sweeps the shift in fixed steps and keeps every `[t, t + duration)` that
/// ends inside the shift and stays clear of each booked reservation padded
/// by the buffer. Reservations that no longer occupy the schedule are
/// ignored.
pub fn available_slots(shift: &Shift, booked: &[Reservation], duration_minutes: i64) -> Vec<Slot> {
    let mut slots = Vec::new();
    if duration_minutes <= 0 || duration_minutes > MINUTES_PER_DAY {
        return slots;
    }

    let required = Duration::minutes(duration_minutes);
    let step = Duration::minutes(SLOT_INTERVAL_MINUTES);
    let buffer = Duration::minutes(BUFFER_MINUTES);
    let shift_end = shift.ends_at();

    let blocked: Vec<_> = booked
        .iter()
        .filter(|r| r.status.occupies_schedule())
        .map(|r| (r.start_time, r.end_time + buffer))
        .collect();

    let mut current = shift.starts_at();
    while let Some(slot_end) = current.checked_add_signed(required) {
        if slot_end > shift_end {
            break;
        }
        let conflicts = blocked
            .iter()
            .any(|&(start, padded_end)| current < padded_end && slot_end > start);

        if !conflicts {
            slots.push(Slot {
                start_time: current.time(),
                end_time: slot_end.time(),
            });
        }

        match current.checked_add_signed(step) {
            Some(next) => current = next,
            None => break,
        }
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{end_time_after, ReservationStatus};
    use chrono::{NaiveDate, Utc};

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, 4).unwrap()
    }

    fn shift(start: NaiveTime, end: NaiveTime) -> Shift {
        Shift {
            id: Uuid::new_v4(),
            staff_id: Uuid::new_v4(),
            date: date(),
            start_time: start,
            end_time: end,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn reservation(start: NaiveTime, minutes: i32, status: ReservationStatus) -> Reservation {
        let start = date().and_time(start);
        Reservation {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            staff_id: Uuid::new_v4(),
            reservation_date: date(),
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

    fn starts(slots: &[Slot]) -> Vec<NaiveTime> {
        slots.iter().map(|s| s.start_time).collect()
    }

    #[test]
    fn buffer_after_reservation_is_kept_free() {
        let shift = shift(time(9, 0), time(12, 0));
        let booked = vec![reservation(time(10, 0), 30, ReservationStatus::Confirmed)];

        let slots = available_slots(&shift, &booked, 30);

        assert_eq!(
            starts(&slots),
            vec![
                time(9, 0),
                time(9, 15),
                time(9, 30),
                time(10, 45),
                time(11, 0),
                time(11, 15),
                time(11, 30)
            ]
        );
        assert_eq!(slots.last().unwrap().end_time, time(12, 0));
    }

    #[test]
    fn empty_day_fills_the_shift() {
        let shift = shift(time(9, 0), time(10, 0));
        let slots = available_slots(&shift, &[], 60);

        assert_eq!(
            slots,
            vec![Slot {
                start_time: time(9, 0),
                end_time: time(10, 0)
            }]
        );
    }

    #[test]
    fn longer_than_shift_yields_nothing() {
        let shift = shift(time(9, 0), time(10, 0));
        assert!(available_slots(&shift, &[], 75).is_empty());
        assert!(available_slots(&shift, &[], 0).is_empty());
    }

    #[test]
    fn huge_duration_yields_nothing() {
        let shift = shift(time(9, 0), time(18, 0));
        assert!(available_slots(&shift, &[], 10_000_000_000_000).is_empty());
        assert!(available_slots(&shift, &[], i64::MAX).is_empty());
    }

    #[test]
    fn cancelled_reservations_free_their_slot() {
        let shift = shift(time(9, 0), time(10, 0));
        let booked = vec![
            reservation(time(9, 0), 60, ReservationStatus::Cancelled),
            reservation(time(9, 0), 60, ReservationStatus::NoShow),
        ];

        assert_eq!(available_slots(&shift, &booked, 30).len(), 3);
    }

    #[test]
    fn slot_may_end_exactly_where_reservation_starts() {
        let shift = shift(time(9, 0), time(11, 0));
        let booked = vec![reservation(time(10, 0), 60, ReservationStatus::Pending)];

        let slots = available_slots(&shift, &booked, 60);
        assert_eq!(starts(&slots), vec![time(9, 0)]);
    }
}
