use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::pg::Pg;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use shared::*;
use uuid::Uuid;

use crate::models::*;
use crate::schema::*;

/// Reads and writes the booking aggregates. Implementations are expected to
/// run inside whatever transaction the caller opened; `for_update` asks for
/// a row lock held until that transaction ends.
#[async_trait]
pub trait EntityStore: Send {
    async fn customer(&mut self, id: Uuid) -> Result<Option<Customer>, BookingError>;

    async fn staff_member(
        &mut self,
        id: Uuid,
        for_update: bool,
    ) -> Result<Option<Staff>, BookingError>;

    /// Active staff, optionally narrowed to one id, in name order.
    async fn active_staff(&mut self, only: Option<Uuid>) -> Result<Vec<Staff>, BookingError>;

    async fn menu(&mut self, id: Uuid) -> Result<Option<Menu>, BookingError>;

    async fn option(&mut self, id: Uuid) -> Result<Option<MenuOption>, BookingError>;

    /// The active shift of a staff member on a date, if any.
    async fn shift_on(
        &mut self,
        staff_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Shift>, BookingError>;

    /// Reservations of a staff member on a date that still occupy the
    /// schedule, ordered by start time.
    async fn scheduled_reservations(
        &mut self,
        staff_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, BookingError>;

    async fn reservation(
        &mut self,
        id: Uuid,
        for_update: bool,
    ) -> Result<Option<Reservation>, BookingError>;

    async fn reservation_lines(&mut self, reservation_id: Uuid) -> Result<Selection, BookingError>;

    async fn list_reservations(
        &mut self,
        filter: &ReservationFilter,
        page: PageRequest,
    ) -> Result<(Vec<Reservation>, i64), BookingError>;

    async fn insert_reservation(
        &mut self,
        reservation: &Reservation,
        selection: &Selection,
    ) -> Result<(), BookingError>;

    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<(), BookingError>;

    async fn replace_selection(
        &mut self,
        reservation_id: Uuid,
        selection: &Selection,
    ) -> Result<(), BookingError>;

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), BookingError>;

    async fn queue_notification(&mut self, entry: &NotificationEntry) -> Result<(), BookingError>;
}

/// Soft-deletable catalog rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEntity {
    Customer,
    Staff,
    Menu,
    Option,
    Shift,
}

impl CatalogEntity {
    pub fn name(&self) -> &'static str {
        match self {
            CatalogEntity::Customer => "customer",
            CatalogEntity::Staff => "staff",
            CatalogEntity::Menu => "menu",
            CatalogEntity::Option => "option",
            CatalogEntity::Shift => "shift",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            CatalogEntity::Customer => "customers",
            CatalogEntity::Staff => "staff",
            CatalogEntity::Menu => "menus",
            CatalogEntity::Option => "options",
            CatalogEntity::Shift => "shifts",
        }
    }
}

/// Administrative reads and writes over the rows reservations refer to.
/// Writes that hit a unique index report `Duplicate`.
#[async_trait]
pub trait CatalogStore: EntityStore {
    async fn list_customers(
        &mut self,
        page: PageRequest,
    ) -> Result<(Vec<Customer>, i64), BookingError>;

    /// Whether an active customer other than `except` uses the phone number.
    async fn phone_in_use(
        &mut self,
        phone: &str,
        except: Option<Uuid>,
    ) -> Result<bool, BookingError>;

    /// Whether an active customer other than `except` uses the email.
    async fn email_in_use(
        &mut self,
        email: &str,
        except: Option<Uuid>,
    ) -> Result<bool, BookingError>;

    async fn insert_customer(&mut self, customer: &Customer) -> Result<(), BookingError>;

    async fn update_customer(&mut self, customer: &Customer) -> Result<(), BookingError>;

    /// Staff emails stay unique across inactive rows too.
    async fn staff_email_in_use(&mut self, email: &str) -> Result<bool, BookingError>;

    async fn insert_staff(&mut self, member: &Staff) -> Result<(), BookingError>;

    async fn list_menus(&mut self) -> Result<Vec<Menu>, BookingError>;

    async fn insert_menu(&mut self, menu: &Menu) -> Result<(), BookingError>;

    async fn list_options(&mut self) -> Result<Vec<MenuOption>, BookingError>;

    async fn insert_option(&mut self, option: &MenuOption) -> Result<(), BookingError>;

    async fn list_shifts(
        &mut self,
        staff_id: Option<Uuid>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Shift>, BookingError>;

    async fn insert_shift(&mut self, shift: &Shift) -> Result<(), BookingError>;

    /// Clears `is_active`. Returns false when no active row had that id.
    async fn deactivate(&mut self, entity: CatalogEntity, id: Uuid) -> Result<bool, BookingError>;
}

fn failed(context: String) -> impl FnOnce(DieselError) -> BookingError {
    move |err| BookingError::internal(context, err)
}

/// Like `failed`, but a unique violation becomes `Duplicate` for the field
/// whose index name matches, falling back to the first field given.
fn conflicting(
    context: String,
    fields: Vec<(&'static str, String)>,
) -> impl FnOnce(DieselError) -> BookingError {
    move |err| {
        if let DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) = &err {
            let constraint = info.constraint_name().unwrap_or_default();
            let hit = fields
                .iter()
                .find(|(field, _)| constraint.contains(field))
                .or_else(|| <[_]>::first(&fields));
            if let Some((field, value)) = hit {
                return BookingError::Duplicate {
                    field,
                    value: value.clone(),
                };
            }
        }
        BookingError::internal(context, err)
    }
}

fn customer_keys(customer: &Customer) -> Vec<(&'static str, String)> {
    let mut keys = vec![("phone", customer.phone.clone())];
    if let Some(email) = &customer.email {
        keys.push(("email", email.clone()));
    }
    keys
}

fn filtered_reservations(filter: &ReservationFilter) -> reservations::BoxedQuery<'static, Pg> {
    let mut query = reservations::table.into_boxed();
    if let Some(status) = filter.status {
        query = query.filter(reservations::status.eq(status.as_str()));
    }
    if let Some(staff_id) = filter.staff_id {
        query = query.filter(reservations::staff_id.eq(staff_id));
    }
    if let Some(customer_id) = filter.customer_id {
        query = query.filter(reservations::customer_id.eq(customer_id));
    }
    if let Some(date_from) = filter.date_from {
        query = query.filter(reservations::reservation_date.ge(date_from));
    }
    if let Some(date_to) = filter.date_to {
        query = query.filter(reservations::reservation_date.le(date_to));
    }
    query
}

fn into_reservations(rows: Vec<ReservationRow>) -> Result<Vec<Reservation>, BookingError> {
    rows.into_iter().map(Reservation::try_from).collect()
}

#[async_trait]
impl EntityStore for AsyncPgConnection {
    async fn customer(&mut self, id: Uuid) -> Result<Option<Customer>, BookingError> {
        let row = customers::table
            .find(id)
            .first::<CustomerRow>(self)
            .await
            .optional()
            .map_err(failed(format!("load customer {}", id)))?;
        Ok(row.map(Customer::from))
    }

    async fn staff_member(
        &mut self,
        id: Uuid,
        for_update: bool,
    ) -> Result<Option<Staff>, BookingError> {
        let query = staff::table.find(id);
        let loaded = if for_update {
            query.for_update().first::<StaffRow>(self).await
        } else {
            query.first::<StaffRow>(self).await
        };
        let row = loaded
            .optional()
            .map_err(failed(format!("load staff {}", id)))?;
        Ok(row.map(Staff::from))
    }

    async fn active_staff(&mut self, only: Option<Uuid>) -> Result<Vec<Staff>, BookingError> {
        let mut query = staff::table.filter(staff::is_active.eq(true)).into_boxed();
        if let Some(id) = only {
            query = query.filter(staff::id.eq(id));
        }
        let rows = query
            .order((staff::name.asc(), staff::id.asc()))
            .load::<StaffRow>(self)
            .await
            .map_err(failed("list active staff".to_string()))?;
        Ok(rows.into_iter().map(Staff::from).collect())
    }

    async fn menu(&mut self, id: Uuid) -> Result<Option<Menu>, BookingError> {
        let row = menus::table
            .find(id)
            .first::<MenuRow>(self)
            .await
            .optional()
            .map_err(failed(format!("load menu {}", id)))?;
        Ok(row.map(Menu::from))
    }

    async fn option(&mut self, id: Uuid) -> Result<Option<MenuOption>, BookingError> {
        let row = options::table
            .find(id)
            .first::<OptionRow>(self)
            .await
            .optional()
            .map_err(failed(format!("load option {}", id)))?;
        Ok(row.map(MenuOption::from))
    }

    async fn shift_on(
        &mut self,
        staff_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Shift>, BookingError> {
        let row = shifts::table
            .filter(shifts::staff_id.eq(staff_id))
            .filter(shifts::date.eq(date))
            .filter(shifts::is_active.eq(true))
            .order(shifts::start_time.asc())
            .first::<ShiftRow>(self)
            .await
            .optional()
            .map_err(failed(format!("load shift of staff {} on {}", staff_id, date)))?;
        Ok(row.map(Shift::from))
    }

    async fn scheduled_reservations(
        &mut self,
        staff_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, BookingError> {
        let released = vec![
            ReservationStatus::Cancelled.as_str(),
            ReservationStatus::NoShow.as_str(),
        ];
        let rows = reservations::table
            .filter(reservations::staff_id.eq(staff_id))
            .filter(reservations::reservation_date.eq(date))
            .filter(reservations::status.ne_all(released))
            .order(reservations::start_time.asc())
            .load::<ReservationRow>(self)
            .await
            .map_err(failed(format!("load reservations of staff {} on {}", staff_id, date)))?;
        into_reservations(rows)
    }

    async fn reservation(
        &mut self,
        id: Uuid,
        for_update: bool,
    ) -> Result<Option<Reservation>, BookingError> {
        let query = reservations::table.find(id);
        let loaded = if for_update {
            query.for_update().first::<ReservationRow>(self).await
        } else {
            query.first::<ReservationRow>(self).await
        };
        let row = loaded
            .optional()
            .map_err(failed(format!("load reservation {}", id)))?;
        row.map(Reservation::try_from).transpose()
    }

    async fn reservation_lines(&mut self, reservation_id: Uuid) -> Result<Selection, BookingError> {
        let menus = reservation_menus::table
            .filter(reservation_menus::reservation_id.eq(reservation_id))
            .order(reservation_menus::position.asc())
            .load::<ReservationMenuRow>(self)
            .await
            .map_err(failed(format!("load menus of reservation {}", reservation_id)))?;
        let options = reservation_options::table
            .filter(reservation_options::reservation_id.eq(reservation_id))
            .order(reservation_options::position.asc())
            .load::<ReservationOptionRow>(self)
            .await
            .map_err(failed(format!("load options of reservation {}", reservation_id)))?;

        Ok(Selection {
            menus: menus.into_iter().map(ReservationLine::from).collect(),
            options: options.into_iter().map(ReservationLine::from).collect(),
        })
    }

    async fn list_reservations(
        &mut self,
        filter: &ReservationFilter,
        page: PageRequest,
    ) -> Result<(Vec<Reservation>, i64), BookingError> {
        let total = filtered_reservations(filter)
            .count()
            .get_result::<i64>(self)
            .await
            .map_err(failed("count reservations".to_string()))?;

        let rows = filtered_reservations(filter)
            .order((
                reservations::reservation_date.desc(),
                reservations::start_time.desc(),
            ))
            .offset(page.offset())
            .limit(page.limit)
            .load::<ReservationRow>(self)
            .await
            .map_err(failed("list reservations".to_string()))?;

        Ok((into_reservations(rows)?, total))
    }

    async fn insert_reservation(
        &mut self,
        reservation: &Reservation,
        selection: &Selection,
    ) -> Result<(), BookingError> {
        diesel::insert_into(reservations::table)
            .values(&ReservationRow::from(reservation))
            .execute(self)
            .await
            .map_err(failed(format!("insert reservation {}", reservation.id)))?;

        self.replace_selection(reservation.id, selection).await
    }

    async fn update_reservation(&mut self, reservation: &Reservation) -> Result<(), BookingError> {
        diesel::update(reservations::table.find(reservation.id))
            .set(&ReservationRow::from(reservation))
            .execute(self)
            .await
            .map_err(failed(format!("update reservation {}", reservation.id)))?;
        Ok(())
    }

    async fn replace_selection(
        &mut self,
        reservation_id: Uuid,
        selection: &Selection,
    ) -> Result<(), BookingError> {
        let menu_lines = reservation_menus::reservation_id.eq(reservation_id);
        diesel::delete(reservation_menus::table.filter(menu_lines))
            .execute(self)
            .await
            .map_err(failed(format!("clear menus of reservation {}", reservation_id)))?;
        let option_lines = reservation_options::reservation_id.eq(reservation_id);
        diesel::delete(reservation_options::table.filter(option_lines))
            .execute(self)
            .await
            .map_err(failed(format!("clear options of reservation {}", reservation_id)))?;

        if !selection.menus.is_empty() {
            let rows: Vec<ReservationMenuRow> =
                selection.menus.iter().map(ReservationMenuRow::from).collect();
            diesel::insert_into(reservation_menus::table)
                .values(&rows)
                .execute(self)
                .await
                .map_err(failed(format!("insert menus of reservation {}", reservation_id)))?;
        }
        if !selection.options.is_empty() {
            let rows: Vec<ReservationOptionRow> =
                selection.options.iter().map(ReservationOptionRow::from).collect();
            diesel::insert_into(reservation_options::table)
                .values(&rows)
                .execute(self)
                .await
                .map_err(failed(format!("insert options of reservation {}", reservation_id)))?;
        }
        Ok(())
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), BookingError> {
        diesel::insert_into(audit_logs::table)
            .values(&NewAuditLog::from(entry))
            .execute(self)
            .await
            .map_err(failed(format!(
                "write audit log for {} {}",
                entry.table_name, entry.record_id
            )))?;
        Ok(())
    }

    async fn queue_notification(&mut self, entry: &NotificationEntry) -> Result<(), BookingError> {
        diesel::insert_into(notification_logs::table)
            .values(&NewNotificationLog::from(entry))
            .execute(self)
            .await
            .map_err(failed(format!("queue notification {}", entry.id)))?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for AsyncPgConnection {
    async fn list_customers(
        &mut self,
        page: PageRequest,
    ) -> Result<(Vec<Customer>, i64), BookingError> {
        let total = customers::table
            .filter(customers::is_active.eq(true))
            .count()
            .get_result::<i64>(self)
            .await
            .map_err(failed("count customers".to_string()))?;
        let rows = customers::table
            .filter(customers::is_active.eq(true))
            .order(customers::created_at.desc())
            .offset(page.offset())
            .limit(page.limit)
            .load::<CustomerRow>(self)
            .await
            .map_err(failed("list customers".to_string()))?;
        Ok((rows.into_iter().map(Customer::from).collect(), total))
    }

    async fn phone_in_use(
        &mut self,
        phone: &str,
        except: Option<Uuid>,
    ) -> Result<bool, BookingError> {
        let mut query = customers::table
            .filter(customers::is_active.eq(true))
            .filter(customers::phone.eq(phone.to_string()))
            .select(customers::id)
            .into_boxed();
        if let Some(id) = except {
            query = query.filter(customers::id.ne(id));
        }
        let taken = query
            .first::<Uuid>(self)
            .await
            .optional()
            .map_err(failed("check customer phone".to_string()))?;
        Ok(taken.is_some())
    }

    async fn email_in_use(
        &mut self,
        email: &str,
        except: Option<Uuid>,
    ) -> Result<bool, BookingError> {
        let mut query = customers::table
            .filter(customers::is_active.eq(true))
            .filter(customers::email.eq(email.to_string()))
            .select(customers::id)
            .into_boxed();
        if let Some(id) = except {
            query = query.filter(customers::id.ne(id));
        }
        let taken = query
            .first::<Uuid>(self)
            .await
            .optional()
            .map_err(failed("check customer email".to_string()))?;
        Ok(taken.is_some())
    }

    async fn insert_customer(&mut self, customer: &Customer) -> Result<(), BookingError> {
        diesel::insert_into(customers::table)
            .values(&CustomerRow::from(customer))
            .execute(self)
            .await
            .map_err(conflicting(
                format!("insert customer {}", customer.id),
                customer_keys(customer),
            ))?;
        Ok(())
    }

    async fn update_customer(&mut self, customer: &Customer) -> Result<(), BookingError> {
        diesel::update(customers::table.find(customer.id))
            .set(&CustomerChanges::from(customer))
            .execute(self)
            .await
            .map_err(conflicting(
                format!("update customer {}", customer.id),
                customer_keys(customer),
            ))?;
        Ok(())
    }

    async fn staff_email_in_use(&mut self, email: &str) -> Result<bool, BookingError> {
        let taken = staff::table
            .filter(staff::email.eq(email.to_string()))
            .select(staff::id)
            .first::<Uuid>(self)
            .await
            .optional()
            .map_err(failed("check staff email".to_string()))?;
        Ok(taken.is_some())
    }

    async fn insert_staff(&mut self, member: &Staff) -> Result<(), BookingError> {
        diesel::insert_into(staff::table)
            .values(&StaffRow::from(member))
            .execute(self)
            .await
            .map_err(conflicting(
                format!("insert staff {}", member.id),
                vec![("email", member.email.clone())],
            ))?;
        Ok(())
    }

    async fn list_menus(&mut self) -> Result<Vec<Menu>, BookingError> {
        let rows = menus::table
            .filter(menus::is_active.eq(true))
            .order((menus::category.asc(), menus::name.asc()))
            .load::<MenuRow>(self)
            .await
            .map_err(failed("list menus".to_string()))?;
        Ok(rows.into_iter().map(Menu::from).collect())
    }

    async fn insert_menu(&mut self, menu: &Menu) -> Result<(), BookingError> {
        diesel::insert_into(menus::table)
            .values(&MenuRow::from(menu))
            .execute(self)
            .await
            .map_err(failed(format!("insert menu {}", menu.id)))?;
        Ok(())
    }

    async fn list_options(&mut self) -> Result<Vec<MenuOption>, BookingError> {
        let rows = options::table
            .filter(options::is_active.eq(true))
            .order((options::category.asc(), options::name.asc()))
            .load::<OptionRow>(self)
            .await
            .map_err(failed("list options".to_string()))?;
        Ok(rows.into_iter().map(MenuOption::from).collect())
    }

    async fn insert_option(&mut self, option: &MenuOption) -> Result<(), BookingError> {
        diesel::insert_into(options::table)
            .values(&OptionRow::from(option))
            .execute(self)
            .await
            .map_err(failed(format!("insert option {}", option.id)))?;
        Ok(())
    }

    async fn list_shifts(
        &mut self,
        staff_id: Option<Uuid>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Shift>, BookingError> {
        let mut query = shifts::table.filter(shifts::is_active.eq(true)).into_boxed();
        if let Some(staff_id) = staff_id {
            query = query.filter(shifts::staff_id.eq(staff_id));
        }
        if let Some(date) = date {
            query = query.filter(shifts::date.eq(date));
        }
        let rows = query
            .order((shifts::date.asc(), shifts::start_time.asc()))
            .load::<ShiftRow>(self)
            .await
            .map_err(failed("list shifts".to_string()))?;
        Ok(rows.into_iter().map(Shift::from).collect())
    }

    async fn insert_shift(&mut self, shift: &Shift) -> Result<(), BookingError> {
        diesel::insert_into(shifts::table)
            .values(&ShiftRow::from(shift))
            .execute(self)
            .await
            .map_err(conflicting(
                format!("insert shift {}", shift.id),
                vec![("date", shift.date.format(DATE_FORMAT).to_string())],
            ))?;
        Ok(())
    }

    async fn deactivate(&mut self, entity: CatalogEntity, id: Uuid) -> Result<bool, BookingError> {
        let now = chrono::Utc::now();
        let updated = match entity {
            CatalogEntity::Customer => {
                diesel::update(customers::table.find(id).filter(customers::is_active.eq(true)))
                    .set((customers::is_active.eq(false), customers::updated_at.eq(now)))
                    .execute(self)
                    .await
            }
            CatalogEntity::Staff => {
                diesel::update(staff::table.find(id).filter(staff::is_active.eq(true)))
                    .set((staff::is_active.eq(false), staff::updated_at.eq(now)))
                    .execute(self)
                    .await
            }
            CatalogEntity::Menu => {
                diesel::update(menus::table.find(id).filter(menus::is_active.eq(true)))
                    .set((menus::is_active.eq(false), menus::updated_at.eq(now)))
                    .execute(self)
                    .await
            }
            CatalogEntity::Option => {
                diesel::update(options::table.find(id).filter(options::is_active.eq(true)))
                    .set((options::is_active.eq(false), options::updated_at.eq(now)))
                    .execute(self)
                    .await
            }
            CatalogEntity::Shift => {
                diesel::update(shifts::table.find(id).filter(shifts::is_active.eq(true)))
                    .set((shifts::is_active.eq(false), shifts::updated_at.eq(now)))
                    .execute(self)
                    .await
            }
        }
        .map_err(failed(format!("deactivate {} {}", entity.name(), id)))?;
        Ok(updated > 0)
    }
}
