use chrono::{NaiveDate, Utc};
use diesel_async::{AsyncConnection, AsyncPgConnection};
use serde::Serialize;
use shared::*;
use tracing::info;
use uuid::Uuid;

use crate::handlers::{connection, DbPool};
use crate::store::{CatalogEntity, CatalogStore, EntityStore};

fn snapshot<T: Serialize>(value: &T) -> Option<serde_json::Value> {
    serde_json::to_value(value).ok()
}

fn not_found(entity: CatalogEntity, id: Uuid) -> BookingError {
    BookingError::EntityNotFound {
        entity: entity.name(),
        id,
    }
}

async fn ensure_unique_customer<S: CatalogStore + ?Sized>(
    store: &mut S,
    input: &CustomerInput,
    except: Option<Uuid>,
) -> Result<(), BookingError> {
    if store.phone_in_use(&input.phone, except).await? {
        return Err(BookingError::Duplicate {
            field: "phone",
            value: input.phone.clone(),
        });
    }
    if let Some(email) = &input.email {
        if store.email_in_use(email, except).await? {
            return Err(BookingError::Duplicate {
                field: "email",
                value: email.clone(),
            });
        }
    }
    Ok(())
}

async fn active_customer<S: CatalogStore + ?Sized>(
    store: &mut S,
    id: Uuid,
) -> Result<Customer, BookingError> {
    store
        .customer(id)
        .await?
        .filter(|c| c.is_active)
        .ok_or_else(|| not_found(CatalogEntity::Customer, id))
}

pub async fn list_customers<S: CatalogStore + ?Sized>(
    store: &mut S,
    page: PageRequest,
) -> Result<Page<Customer>, BookingError> {
    let (customers, total) = store.list_customers(page).await?;
    Ok(Page::new(customers, page, total))
}

pub async fn create_customer<S: CatalogStore + ?Sized>(
    store: &mut S,
    input: CustomerInput,
) -> Result<Customer, BookingError> {
    let input = input.validated()?;
    ensure_unique_customer(store, &input, None).await?;

    let now = Utc::now();
    let customer = Customer {
        id: Uuid::new_v4(),
        name: input.name,
        phone: input.phone,
        email: input.email,
        notes: input.notes,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    store.insert_customer(&customer).await?;
    store
        .append_audit(&AuditEntry::new(
            "customers",
            customer.id,
            AuditAction::Create,
            None,
            snapshot(&customer),
        ))
        .await?;

    info!(customer_id = %customer.id, "customer created");
    Ok(customer)
}

pub async fn update_customer<S: CatalogStore + ?Sized>(
    store: &mut S,
    id: Uuid,
    input: CustomerInput,
) -> Result<Customer, BookingError> {
    let input = input.validated()?;
    let current = active_customer(store, id).await?;
    ensure_unique_customer(store, &input, Some(id)).await?;

    let customer = Customer {
        name: input.name,
        phone: input.phone,
        email: input.email,
        notes: input.notes,
        updated_at: Utc::now(),
        ..current.clone()
    };
    store.update_customer(&customer).await?;
    store
        .append_audit(&AuditEntry::new(
            "customers",
            id,
            AuditAction::Update,
            snapshot(&current),
            snapshot(&customer),
        ))
        .await?;
    Ok(customer)
}

pub async fn create_staff<S: CatalogStore + ?Sized>(
    store: &mut S,
    input: StaffInput,
) -> Result<Staff, BookingError> {
    let input = input.validated()?;
    if store.staff_email_in_use(&input.email).await? {
        return Err(BookingError::Duplicate {
            field: "email",
            value: input.email,
        });
    }

    let now = Utc::now();
    let member = Staff {
        id: Uuid::new_v4(),
        name: input.name,
        email: input.email,
        phone: input.phone,
        position: input.position,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    store.insert_staff(&member).await?;
    store
        .append_audit(&AuditEntry::new(
            "staff",
            member.id,
            AuditAction::Create,
            None,
            snapshot(&member),
        ))
        .await?;

    info!(staff_id = %member.id, "staff created");
    Ok(member)
}

pub async fn create_menu<S: CatalogStore + ?Sized>(
    store: &mut S,
    input: ServiceItemInput,
) -> Result<Menu, BookingError> {
    let input = input.validated_menu()?;
    let now = Utc::now();
    let menu = Menu {
        id: Uuid::new_v4(),
        name: input.name,
        description: input.description,
        duration: input.duration,
        price: input.price,
        category: input.category,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    store.insert_menu(&menu).await?;
    store
        .append_audit(&AuditEntry::new(
            "menus",
            menu.id,
            AuditAction::Create,
            None,
            snapshot(&menu),
        ))
        .await?;
    Ok(menu)
}

pub async fn create_option<S: CatalogStore + ?Sized>(
    store: &mut S,
    input: ServiceItemInput,
) -> Result<MenuOption, BookingError> {
    let input = input.validated_option()?;
    let now = Utc::now();
    let option = MenuOption {
        id: Uuid::new_v4(),
        name: input.name,
        description: input.description,
        duration: input.duration,
        price: input.price,
        category: input.category,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    store.insert_option(&option).await?;
    store
        .append_audit(&AuditEntry::new(
            "options",
            option.id,
            AuditAction::Create,
            None,
            snapshot(&option),
        ))
        .await?;
    Ok(option)
}

/// One active shift per staff member and date. The staff row is locked so
/// two concurrent creates for the same day serialise.
pub async fn create_shift<S: CatalogStore + ?Sized>(
    store: &mut S,
    input: ShiftInput,
) -> Result<Shift, BookingError> {
    let window = input.parse()?;
    store
        .staff_member(window.staff_id, true)
        .await?
        .filter(|s| s.is_active)
        .ok_or(BookingError::StaffNotFound(window.staff_id))?;
    if store.shift_on(window.staff_id, window.date).await?.is_some() {
        return Err(BookingError::Duplicate {
            field: "date",
            value: window.date.format(DATE_FORMAT).to_string(),
        });
    }

    let now = Utc::now();
    let shift = Shift {
        id: Uuid::new_v4(),
        staff_id: window.staff_id,
        date: window.date,
        start_time: window.start_time,
        end_time: window.end_time,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    store.insert_shift(&shift).await?;
    store
        .append_audit(&AuditEntry::new(
            "shifts",
            shift.id,
            AuditAction::Create,
            None,
            snapshot(&shift),
        ))
        .await?;

    info!(shift_id = %shift.id, staff_id = %shift.staff_id, date = %shift.date, "shift created");
    Ok(shift)
}

/// Soft delete. A row that is already inactive counts as missing.
pub async fn deactivate<S: CatalogStore + ?Sized>(
    store: &mut S,
    entity: CatalogEntity,
    id: Uuid,
) -> Result<(), BookingError> {
    if !store.deactivate(entity, id).await? {
        return Err(not_found(entity, id));
    }
    store
        .append_audit(&AuditEntry::new(entity.table(), id, AuditAction::Delete, None, None))
        .await?;

    info!(entity = entity.name(), %id, "deactivated");
    Ok(())
}

/// Administrative maintenance of the rows reservations refer to. Deletes
/// only clear `is_active`.
#[derive(Clone)]
pub struct Catalog {
    pool: DbPool,
}

impl Catalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn remove(&self, entity: CatalogEntity, id: Uuid) -> Result<(), BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.transaction::<_, BookingError, _>(|conn| {
            Box::pin(async move { deactivate(conn, entity, id).await })
        })
        .await
    }

    pub async fn list_customers(&self, page: PageRequest) -> Result<Page<Customer>, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        list_customers(conn, page).await
    }

    pub async fn get_customer(&self, id: Uuid) -> Result<Customer, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        active_customer(conn, id).await
    }

    pub async fn create_customer(&self, input: CustomerInput) -> Result<Customer, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.transaction::<_, BookingError, _>(|conn| {
            Box::pin(async move { create_customer(conn, input).await })
        })
        .await
    }

    pub async fn update_customer(
        &self,
        id: Uuid,
        input: CustomerInput,
    ) -> Result<Customer, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.transaction::<_, BookingError, _>(|conn| {
            Box::pin(async move { update_customer(conn, id, input).await })
        })
        .await
    }

    pub async fn delete_customer(&self, id: Uuid) -> Result<(), BookingError> {
        self.remove(CatalogEntity::Customer, id).await
    }

    pub async fn list_staff(&self) -> Result<Vec<Staff>, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.active_staff(None).await
    }

    pub async fn get_staff(&self, id: Uuid) -> Result<Staff, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.staff_member(id, false)
            .await?
            .filter(|s| s.is_active)
            .ok_or_else(|| not_found(CatalogEntity::Staff, id))
    }

    pub async fn create_staff(&self, input: StaffInput) -> Result<Staff, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.transaction::<_, BookingError, _>(|conn| {
            Box::pin(async move { create_staff(conn, input).await })
        })
        .await
    }

    pub async fn delete_staff(&self, id: Uuid) -> Result<(), BookingError> {
        self.remove(CatalogEntity::Staff, id).await
    }

    pub async fn list_menus(&self) -> Result<Vec<Menu>, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.list_menus().await
    }

    pub async fn create_menu(&self, input: ServiceItemInput) -> Result<Menu, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.transaction::<_, BookingError, _>(|conn| {
            Box::pin(async move { create_menu(conn, input).await })
        })
        .await
    }

    pub async fn delete_menu(&self, id: Uuid) -> Result<(), BookingError> {
        self.remove(CatalogEntity::Menu, id).await
    }

    pub async fn list_options(&self) -> Result<Vec<MenuOption>, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.list_options().await
    }

    pub async fn create_option(&self, input: ServiceItemInput) -> Result<MenuOption, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.transaction::<_, BookingError, _>(|conn| {
            Box::pin(async move { create_option(conn, input).await })
        })
        .await
    }

    pub async fn delete_option(&self, id: Uuid) -> Result<(), BookingError> {
        self.remove(CatalogEntity::Option, id).await
    }

    pub async fn list_shifts(
        &self,
        staff_id: Option<Uuid>,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Shift>, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.list_shifts(staff_id, date).await
    }

    pub async fn create_shift(&self, input: ShiftInput) -> Result<Shift, BookingError> {
        let mut conn = connection(&self.pool).await?;
        let conn: &mut AsyncPgConnection = &mut conn;
        conn.transaction::<_, BookingError, _>(|conn| {
            Box::pin(async move { create_shift(conn, input).await })
        })
        .await
    }

    pub async fn delete_shift(&self, id: Uuid) -> Result<(), BookingError> {
        self.remove(CatalogEntity::Shift, id).await
    }
}
