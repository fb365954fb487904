use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel_async::pooled_connection::{bb8::Pool, AsyncDieselConnectionManager};
use diesel_async::{AsyncConnection, AsyncPgConnection};
use shared::*;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::EntityStore;

pub type DbPool = Pool<AsyncPgConnection>;
pub type DbConnection<'a> =
    bb8::PooledConnection<'a, AsyncDieselConnectionManager<AsyncPgConnection>>;

pub async fn connection(pool: &DbPool) -> Result<DbConnection<'_>, BookingError> {
    pool.get()
        .await
        .map_err(|e| BookingError::internal("acquire database connection", e))
}

/// What a lifecycle operation needs to know about "now".
#[derive(Debug, Clone, Copy)]
pub struct BookingContext {
    pub window: BookingWindow,
    pub today: NaiveDate,
}

pub async fn create_reservation<S: EntityStore + ?Sized>(
    store: &mut S,
    ctx: BookingContext,
    request: &CreateReservationRequest,
) -> Result<ReservationDetail, BookingError> {
    let date = parse_date("reservation_date", &request.reservation_date)?;
    let start = parse_time("start_time", &request.start_time)?;
    if request.menu_ids.is_empty() {
        return Err(BookingError::validation("menu_ids", "at least one menu is required"));
    }
    ctx.window.check(date, ctx.today)?;

    let menus = resolve_menus(store, &request.menu_ids).await?;
    let options = resolve_options(store, &request.option_ids).await?;
    let customer = active_customer(store, request.customer_id).await?;
    let staff = locked_staff(store, request.staff_id).await?;

    let id = Uuid::new_v4();
    let selection = Selection::price(id, &menus, &options);
    let start_time = date.and_time(start);
    let total_duration = selection.total_duration()?;
    let total_price = selection.total_price()?;
    let end_time = end_time_after(start_time, total_duration);
    ensure_free(store, staff.id, date, start_time, end_time, None).await?;

    let now = Utc::now();
    let reservation = Reservation {
        id,
        customer_id: customer.id,
        staff_id: staff.id,
        reservation_date: date,
        start_time,
        end_time,
        status: ReservationStatus::Pending,
        total_duration,
        total_price,
        notes: request.notes.clone(),
        cancellation_reason: None,
        created_at: now,
        updated_at: now,
    };

    store.insert_reservation(&reservation, &selection).await?;
    store
        .append_audit(&AuditEntry::reservation(AuditAction::Create, id, None, Some(&reservation)))
        .await?;
    store
        .queue_notification(&NotificationEntry::for_customer(
            &customer,
            "Reservation received",
            format!(
                "Your reservation with {} on {} at {} has been received.",
                staff.name,
                date.format(DATE_FORMAT),
                start.format(TIME_FORMAT)
            ),
        ))
        .await?;

    info!(
        reservation_id = %id,
        staff_id = %staff.id,
        %start_time,
        %end_time,
        "reservation created"
    );
    hydrate(store, reservation).await
}

pub async fn get_reservation<S: EntityStore + ?Sized>(
    store: &mut S,
    id: Uuid,
) -> Result<ReservationDetail, BookingError> {
    let reservation = store
        .reservation(id, false)
        .await?
        .ok_or(BookingError::ReservationNotFound(id))?;
    hydrate(store, reservation).await
}

pub async fn list_reservations<S: EntityStore + ?Sized>(
    store: &mut S,
    filter: &ReservationFilter,
    page: PageRequest,
) -> Result<Page<ReservationDetail>, BookingError> {
    let (reservations, total) = store.list_reservations(filter, page).await?;
    let mut data = Vec::with_capacity(reservations.len());
    for reservation in reservations {
        data.push(hydrate(store, reservation).await?);
    }
    Ok(Page::new(data, page, total))
}

pub async fn update_reservation<S: EntityStore + ?Sized>(
    store: &mut S,
    ctx: BookingContext,
    id: Uuid,
    request: &UpdateReservationRequest,
) -> Result<ReservationDetail, BookingError> {
    let current = store
        .reservation(id, true)
        .await?
        .ok_or(BookingError::ReservationNotFound(id))?;
    if current.status.is_frozen() {
        return Err(BookingError::ImmutableState(current.status));
    }

    let date = match &request.reservation_date {
        Some(raw) => {
            let date = parse_date("reservation_date", raw)?;
            if date != current.reservation_date {
                ctx.window.check(date, ctx.today)?;
            }
            date
        }
        None => current.reservation_date,
    };
    let start = match &request.start_time {
        Some(raw) => parse_time("start_time", raw)?,
        None => current.start_time.time(),
    };

    let mut next = current.clone();
    if let Some(customer_id) = request.customer_id {
        if customer_id != current.customer_id {
            active_customer(store, customer_id).await?;
        }
        next.customer_id = customer_id;
    }
    if let Some(staff_id) = request.staff_id {
        next.staff_id = staff_id;
    }

    let moves_schedule = next.staff_id != current.staff_id
        || date != current.reservation_date
        || start != current.start_time.time()
        || request.changes_selection();
    if moves_schedule {
        locked_staff(store, next.staff_id).await?;
    }

    let selection = if request.changes_selection() {
        let existing = store.reservation_lines(id).await?;
        let menus = match &request.menu_ids {
            Some(ids) if ids.is_empty() => {
                return Err(BookingError::validation("menu_ids", "at least one menu is required"));
            }
            Some(ids) => snapshot_lines(id, &resolve_menus(store, ids).await?),
            None => existing.menus,
        };
        let options = match &request.option_ids {
            Some(ids) => snapshot_lines(id, &resolve_options(store, ids).await?),
            None => existing.options,
        };
        let selection = Selection { menus, options };
        next.total_duration = selection.total_duration()?;
        next.total_price = selection.total_price()?;
        Some(selection)
    } else {
        None
    };

    next.reservation_date = date;
    next.start_time = date.and_time(start);
    next.end_time = end_time_after(next.start_time, next.total_duration);
    if let Some(notes) = &request.notes {
        next.notes = notes.clone();
    }

    if moves_schedule {
        ensure_free(store, next.staff_id, date, next.start_time, next.end_time, Some(id)).await?;
    }

    next.updated_at = Utc::now();
    store.update_reservation(&next).await?;
    if let Some(selection) = &selection {
        store.replace_selection(id, selection).await?;
    }
    store
        .append_audit(&AuditEntry::reservation(
            AuditAction::Update,
            id,
            Some(&current),
            Some(&next),
        ))
        .await?;

    info!(reservation_id = %id, moved = moves_schedule, "reservation updated");
    hydrate(store, next).await
}

pub async fn cancel_reservation<S: EntityStore + ?Sized>(
    store: &mut S,
    id: Uuid,
    request: &CancelReservationRequest,
) -> Result<ReservationDetail, BookingError> {
    let current = store
        .reservation(id, true)
        .await?
        .ok_or(BookingError::ReservationNotFound(id))?;
    match current.status {
        ReservationStatus::Cancelled => return Err(BookingError::AlreadyCancelled),
        ReservationStatus::Completed | ReservationStatus::NoShow => {
            return Err(BookingError::TerminalState(current.status));
        }
        ReservationStatus::Pending | ReservationStatus::Confirmed => {}
    }

    let mut next = current.clone();
    next.status = ReservationStatus::Cancelled;
    next.cancellation_reason = request
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);
    next.updated_at = Utc::now();

    store.update_reservation(&next).await?;
    store
        .append_audit(&AuditEntry::reservation(
            AuditAction::Update,
            id,
            Some(&current),
            Some(&next),
        ))
        .await?;
    notify_customer(
        store,
        &next,
        "Reservation cancelled",
        format!(
            "Your reservation on {} at {} has been cancelled.",
            next.reservation_date.format(DATE_FORMAT),
            next.start_time.format(TIME_FORMAT)
        ),
    )
    .await?;

    info!(reservation_id = %id, "reservation cancelled");
    hydrate(store, next).await
}

pub async fn update_status<S: EntityStore + ?Sized>(
    store: &mut S,
    id: Uuid,
    request: &UpdateStatusRequest,
) -> Result<ReservationDetail, BookingError> {
    let target: ReservationStatus = request.status.parse()?;
    let current = store
        .reservation(id, true)
        .await?
        .ok_or(BookingError::ReservationNotFound(id))?;

    let mut next = current.clone();
    next.status = current.status.transition(target)?;
    next.updated_at = Utc::now();

    store.update_reservation(&next).await?;
    store
        .append_audit(&AuditEntry::reservation(
            AuditAction::Update,
            id,
            Some(&current),
            Some(&next),
        ))
        .await?;
    notify_customer(
        store,
        &next,
        "Reservation status changed",
        format!(
            "Your reservation on {} at {} is now {}.",
            next.reservation_date.format(DATE_FORMAT),
            next.start_time.format(TIME_FORMAT),
            next.status
        ),
    )
    .await?;

    info!(
        reservation_id = %id,
        from = %current.status,
        to = %next.status,
        "reservation status changed"
    );
    hydrate(store, next).await
}

/// Open slots per staff member for one date. Staff without a shift that day
/// are left out, as are staff with no free slot.
pub async fn get_availability<S: EntityStore + ?Sized>(
    store: &mut S,
    query: &AvailabilityQuery,
) -> Result<Vec<StaffAvailability>, BookingError> {
    let date = match non_blank(&query.date) {
        Some(raw) => parse_date("date", raw)?,
        None => return Err(BookingError::validation("date", "is required")),
    };
    let staff_id = non_blank(&query.staff_id)
        .map(|raw| Uuid::parse_str(raw).map_err(|_| BookingError::InvalidStaffId(raw.to_string())))
        .transpose()?;

    let duration = match (non_blank(&query.duration), non_blank(&query.menu_ids)) {
        (Some(raw), _) => raw
            .parse::<i64>()
            .map_err(|_| {
                let reason = format!("`{}` is not a number of minutes", raw);
                BookingError::validation("duration", reason)
            })?,
        (None, Some(raw)) => {
            let ids = raw
                .split(',')
                .filter(|id| !id.trim().is_empty())
                .map(|id| parse_id("menu_ids", id))
                .collect::<Result<Vec<_>, _>>()?;
            let menus = resolve_menus(store, &ids).await?;
            menus.iter().map(|m| i64::from(m.duration)).sum()
        }
        (None, None) => return Err(BookingError::validation("duration", "is required")),
    };
    if duration < 1 {
        return Err(BookingError::validation("duration", "must be at least 1 minute"));
    }
    if duration > MINUTES_PER_DAY {
        return Err(BookingError::validation("duration", "must not exceed one day"));
    }

    let mut result = Vec::new();
    for staff in store.active_staff(staff_id).await? {
        let Some(shift) = store.shift_on(staff.id, date).await? else {
            continue;
        };
        let booked = store.scheduled_reservations(staff.id, date).await?;
        let slots = available_slots(&shift, &booked, duration);
        if !slots.is_empty() {
            result.push(StaffAvailability {
                staff_id: staff.id,
                staff_name: staff.name,
                slots,
            });
        }
    }
    Ok(result)
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

async fn active_customer<S: EntityStore + ?Sized>(
    store: &mut S,
    id: Uuid,
) -> Result<Customer, BookingError> {
    store
        .customer(id)
        .await?
        .filter(|c| c.is_active)
        .ok_or(BookingError::CustomerNotFound(id))
}

/// Loads the staff member with a row lock, serialising schedule changes for
/// that staff member until the transaction ends.
async fn locked_staff<S: EntityStore + ?Sized>(
    store: &mut S,
    id: Uuid,
) -> Result<Staff, BookingError> {
    store
        .staff_member(id, true)
        .await?
        .filter(|s| s.is_active)
        .ok_or(BookingError::StaffNotFound(id))
}

pub async fn resolve_menus<S: EntityStore + ?Sized>(
    store: &mut S,
    ids: &[Uuid],
) -> Result<Vec<Menu>, BookingError> {
    let mut menus = Vec::with_capacity(ids.len());
    for &id in ids {
        let menu = store
            .menu(id)
            .await?
            .filter(|m| m.is_active)
            .ok_or(BookingError::MenuNotFound(id))?;
        menus.push(menu);
    }
    Ok(menus)
}

pub async fn resolve_options<S: EntityStore + ?Sized>(
    store: &mut S,
    ids: &[Uuid],
) -> Result<Vec<MenuOption>, BookingError> {
    let mut options = Vec::with_capacity(ids.len());
    for &id in ids {
        let option = store
            .option(id)
            .await?
            .filter(|o| o.is_active)
            .ok_or(BookingError::OptionNotFound(id))?;
        options.push(option);
    }
    Ok(options)
}

async fn ensure_free<S: EntityStore + ?Sized>(
    store: &mut S,
    staff_id: Uuid,
    date: NaiveDate,
    start: NaiveDateTime,
    end: NaiveDateTime,
    ignore: Option<Uuid>,
) -> Result<(), BookingError> {
    let existing = store.scheduled_reservations(staff_id, date).await?;
    if let Some(conflict) = find_conflict(&existing, start, end, ignore) {
        warn!(%staff_id, conflicting_id = %conflict.id, %start, %end, "time slot conflict");
        return Err(BookingError::TimeSlotConflict {
            staff_id,
            conflicting_id: conflict.id,
        });
    }
    Ok(())
}

async fn notify_customer<S: EntityStore + ?Sized>(
    store: &mut S,
    reservation: &Reservation,
    subject: &str,
    message: String,
) -> Result<(), BookingError> {
    match store.customer(reservation.customer_id).await? {
        Some(customer) => {
            store
                .queue_notification(&NotificationEntry::for_customer(&customer, subject, message))
                .await
        }
        None => {
            warn!(
                reservation_id = %reservation.id,
                customer_id = %reservation.customer_id,
                "no customer to notify"
            );
            Ok(())
        }
    }
}

/// Attaches customer, staff and the catalog rows behind each line.
pub async fn hydrate<S: EntityStore + ?Sized>(
    store: &mut S,
    reservation: Reservation,
) -> Result<ReservationDetail, BookingError> {
    let customer = store.customer(reservation.customer_id).await?;
    let staff = store.staff_member(reservation.staff_id, false).await?;
    let lines = store.reservation_lines(reservation.id).await?;

    let mut reservation_menus = Vec::with_capacity(lines.menus.len());
    for line in lines.menus {
        let menu = store.menu(line.item_id).await?;
        reservation_menus.push(BookedMenu { line, menu });
    }
    let mut reservation_options = Vec::with_capacity(lines.options.len());
    for line in lines.options {
        let option = store.option(line.item_id).await?;
        reservation_options.push(BookedOption { line, option });
    }

    Ok(ReservationDetail {
        reservation,
        customer,
        staff,
        reservation_menus,
        reservation_options,
    })
}

/// Runs the lifecycle operations against Postgres, one transaction per
/// mutation.
#[derive(Clone)]
pub struct ReservationManager {
    pool: DbPool,
    clock: Arc<dyn Clock>,
    window: BookingWindow,
}

impl ReservationManager {
    pub fn new(pool: DbPool, clock: Arc<dyn Clock>, window: BookingWindow) -> Self {
        Self { pool, clock, window }
    }

    fn context(&self) -> BookingContext {
        BookingContext {
            window: self.window,
            today: self.clock.today(),
        }
    }

    pub async fn create(
        &self,
        request: CreateReservationRequest,
    ) -> Result<ReservationDetail, BookingError> {
        let ctx = self.context();
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.transaction::<_, BookingError, _>(|conn| {
            Box::pin(async move { create_reservation(conn, ctx, &request).await })
        })
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<ReservationDetail, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        get_reservation(conn, id).await
    }

    pub async fn list(
        &self,
        filter: ReservationFilter,
        page: PageRequest,
    ) -> Result<Page<ReservationDetail>, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        list_reservations(conn, &filter, page).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateReservationRequest,
    ) -> Result<ReservationDetail, BookingError> {
        let ctx = self.context();
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.transaction::<_, BookingError, _>(|conn| {
            Box::pin(async move { update_reservation(conn, ctx, id, &request).await })
        })
        .await
    }

    pub async fn cancel(
        &self,
        id: Uuid,
        request: CancelReservationRequest,
    ) -> Result<ReservationDetail, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.transaction::<_, BookingError, _>(|conn| {
            Box::pin(async move { cancel_reservation(conn, id, &request).await })
        })
        .await
    }

    pub async fn change_status(
        &self,
        id: Uuid,
        request: UpdateStatusRequest,
    ) -> Result<ReservationDetail, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.transaction::<_, BookingError, _>(|conn| {
            Box::pin(async move { update_status(conn, id, &request).await })
        })
        .await
    }

    pub async fn availability(
        &self,
        query: AvailabilityQuery,
    ) -> Result<Vec<StaffAvailability>, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        get_availability(conn, &query).await
    }
}
