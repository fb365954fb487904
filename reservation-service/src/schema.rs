diesel::table! {
    customers (id) {
        id -> Uuid,
        name -> Varchar,
        phone -> Varchar,
        email -> Nullable<Varchar>,
        notes -> Text,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    staff (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        phone -> Nullable<Varchar>,
        position -> Nullable<Varchar>,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    menus (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Text,
        duration -> Int4,
        price -> Int4,
        category -> Nullable<Varchar>,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    options (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Text,
        duration -> Int4,
        price -> Int4,
        category -> Nullable<Varchar>,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    shifts (id) {
        id -> Uuid,
        staff_id -> Uuid,
        date -> Date,
        start_time -> Time,
        end_time -> Time,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    reservations (id) {
        id -> Uuid,
        customer_id -> Uuid,
        staff_id -> Uuid,
        reservation_date -> Date,
        start_time -> Timestamp,
        end_time -> Timestamp,
        status -> Varchar,
        total_duration -> Int4,
        total_price -> Int4,
        notes -> Text,
        cancellation_reason -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    reservation_menus (id) {
        id -> Uuid,
        reservation_id -> Uuid,
        menu_id -> Uuid,
        position -> Int4,
        quantity -> Int4,
        unit_price -> Int4,
        unit_duration -> Int4,
        total_price -> Int4,
    }
}

diesel::table! {
    reservation_options (id) {
        id -> Uuid,
        reservation_id -> Uuid,
        option_id -> Uuid,
        position -> Int4,
        quantity -> Int4,
        unit_price -> Int4,
        unit_duration -> Int4,
        total_price -> Int4,
    }
}

diesel::table! {
    audit_logs (id) {
        id -> Uuid,
        table_name -> Varchar,
        record_id -> Uuid,
        action -> Varchar,
        old_values -> Nullable<Jsonb>,
        new_values -> Nullable<Jsonb>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    notification_logs (id) {
        id -> Uuid,
        channel -> Varchar,
        recipient -> Varchar,
        subject -> Varchar,
        message -> Text,
        status -> Varchar,
        error_message -> Nullable<Text>,
        scheduled_at -> Nullable<Timestamptz>,
        sent_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(shifts -> staff (staff_id));
diesel::joinable!(reservations -> customers (customer_id));
diesel::joinable!(reservations -> staff (staff_id));
diesel::joinable!(reservation_menus -> reservations (reservation_id));
diesel::joinable!(reservation_menus -> menus (menu_id));
diesel::joinable!(reservation_options -> reservations (reservation_id));
diesel::joinable!(reservation_options -> options (option_id));

diesel::allow_tables_to_appear_in_same_query!(
    customers,
    staff,
    menus,
    options,
    shifts,
    reservations,
    reservation_menus,
    reservation_options,
    audit_logs,
    notification_logs,
);
