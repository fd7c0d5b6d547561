// Diesel table definitions. Enum-shaped columns (`jobs.kind`, `jobs.status`)
// are plain `Text`, matching the stable string values required by the spec's
// persistence contract; conversion to/from the `docflow_api` enums happens
// in `db::models`.

diesel::table! {
    use diesel::sql_types::*;

    tenants (id) {
        id -> BigInt,
        email -> Text,
        password_hash -> Text,
        active -> Bool,
        verified -> Bool,
        usage_counter -> BigInt,
        last_reset -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    subscription_plans (id) {
        id -> BigInt,
        name -> Text,
        max_files_per_period -> BigInt,
        max_file_size_bytes -> BigInt,
        active -> Bool,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    subscriptions (id) {
        id -> BigInt,
        tenant_id -> BigInt,
        plan_id -> BigInt,
        active -> Bool,
        started_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    api_keys (id) {
        id -> BigInt,
        tenant_id -> BigInt,
        key_hash -> Text,
        label -> Text,
        created_at -> Timestamptz,
        last_used_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    jobs (id) {
        id -> Uuid,
        tenant_id -> BigInt,
        kind -> Text,
        status -> Text,
        created_at -> Timestamptz,
        started_at -> Nullable<Timestamptz>,
        completed_at -> Nullable<Timestamptz>,
        input_path -> Nullable<Text>,
        input_name -> Nullable<Text>,
        input_size -> Nullable<BigInt>,
        parameters -> Jsonb,
        output_path -> Nullable<Text>,
        output_name -> Nullable<Text>,
        output_size -> Nullable<BigInt>,
        result_data -> Nullable<Jsonb>,
        error_kind -> Nullable<Text>,
        error_message -> Nullable<Text>,
        processing_time_ms -> Nullable<BigInt>,
    }
}

diesel::joinable!(subscriptions -> tenants (tenant_id));
diesel::joinable!(subscriptions -> subscription_plans (plan_id));
diesel::joinable!(api_keys -> tenants (tenant_id));
diesel::joinable!(jobs -> tenants (tenant_id));

diesel::allow_tables_to_appear_in_same_query!(
    tenants,
    subscription_plans,
    subscriptions,
    api_keys,
    jobs,
);
