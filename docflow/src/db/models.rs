use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use super::schema::{api_keys, jobs, subscription_plans, subscriptions, tenants};

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = tenants)]
pub struct TenantRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub active: bool,
    pub verified: bool,
    pub usage_counter: i64,
    pub last_reset: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tenants)]
pub struct NewTenant<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub active: bool,
    pub verified: bool,
    pub usage_counter: i64,
    pub last_reset: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = subscription_plans)]
pub struct PlanRow {
    pub id: i64,
    pub name: String,
    pub max_files_per_period: i64,
    pub max_file_size_bytes: i64,
    pub active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionRow {
    pub id: i64,
    pub tenant_id: i64,
    pub plan_id: i64,
    pub active: bool,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = api_keys)]
pub struct ApiKeyRow {
    pub id: i64,
    pub tenant_id: i64,
    pub key_hash: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = api_keys)]
pub struct NewApiKey<'a> {
    pub tenant_id: i64,
    pub key_hash: &'a str,
    pub label: &'a str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = jobs)]
pub struct JobRow {
    pub id: Uuid,
    pub tenant_id: i64,
    pub kind: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub input_path: Option<String>,
    pub input_name: Option<String>,
    pub input_size: Option<i64>,
    pub parameters: Value,
    pub output_path: Option<String>,
    pub output_name: Option<String>,
    pub output_size: Option<i64>,
    pub result_data: Option<Value>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub processing_time_ms: Option<i64>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub tenant_id: i64,
    pub kind: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub input_path: Option<String>,
    pub input_name: Option<String>,
    pub input_size: Option<i64>,
    pub parameters: Value,
}
