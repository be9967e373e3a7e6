//! Handwritten Diesel schema for the SQLite database.
//!
//! Mirrors the tables created by `migrations/`; constraints live in the
//! migrations only.

diesel::table! {
    appliances (id) {
        id -> BigInt,
        name -> Text,
        power_watts -> Double,
        daily_hours -> Double,
        // serialized JSON array, see `UsageDays::encode`
        usage_days -> Text,
        standby_watts -> Double,
        created_at -> Timestamp,
        updated_at -> Timestamp,
    }
}

diesel::table! {
    settings (key) {
        key -> Text,
        value -> Text,
        updated_at -> Timestamp,
    }
}

diesel::allow_tables_to_appear_in_same_query!(appliances, settings);
