//! Tenant and Plan domain types, and the tenant-half of the Job Store.
//! `Tenant` owns its `Job`s and references a `Plan` read-only through its
//! most recent active `Subscription`; neither `Plan` nor `Subscription`
//! holds a back-pointer, so a plan can be retired or a subscription
//! swapped without touching any row that references it.

pub mod quota;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use utils::id::{PlanId, TenantId};

use crate::db::models::{NewTenant, PlanRow, TenantRow};
use crate::db::schema::{subscription_plans, subscriptions, tenants};
use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct Plan {
    pub id: PlanId,
    pub max_files_per_period: i64,
    pub max_file_size_bytes: i64,
    pub active: bool,
}

impl Plan {
    pub fn is_unlimited_files(&self) -> bool {
        self.max_files_per_period < 0
    }

    pub fn is_unlimited_size(&self) -> bool {
        self.max_file_size_bytes < 0
    }
}

impl From<PlanRow> for Plan {
    fn from(r: PlanRow) -> Self {
        Plan {
            id: PlanId::new(r.id),
            max_files_per_period: r.max_files_per_period,
            max_file_size_bytes: r.max_file_size_bytes,
            active: r.active,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tenant {
    pub id: TenantId,
    pub email: String,
    pub password_hash: String,
    pub active: bool,
    pub verified: bool,
    pub usage_counter: i64,
    pub last_reset: DateTime<Utc>,
    pub plan: Plan,
}

fn tenant_from_row(row: TenantRow, plan: Plan) -> Tenant {
    Tenant {
        id: TenantId::new(row.id),
        email: row.email,
        password_hash: row.password_hash,
        active: row.active,
        verified: row.verified,
        usage_counter: row.usage_counter,
        last_reset: row.last_reset,
        plan,
    }
}

/// Resolves a tenant's current plan through its most recent active
/// subscription. A tenant with no active subscription gets a fully
/// restrictive zero-quota plan rather than an error, so admission simply
/// denies rather than 500s.
fn resolve_plan(conn: &mut PgConnection, tid: i64) -> Result<Plan, ApiError> {
    let row: Option<PlanRow> = subscriptions::table
        .inner_join(subscription_plans::table)
        .filter(subscriptions::tenant_id.eq(tid))
        .filter(subscriptions::active.eq(true))
        .order(subscriptions::started_at.desc())
        .select(subscription_plans::all_columns)
        .first(conn)
        .optional()
        .map_err(|e| ApiError::internal(format!("resolve plan: {e}")))?;

    Ok(row.map(Plan::from).unwrap_or(Plan {
        id: PlanId::new(0),
        max_files_per_period: 0,
        max_file_size_bytes: 0,
        active: false,
    }))
}

use diesel::pg::PgConnection;

pub fn get_by_id(conn: &mut PgConnection, id: TenantId) -> Result<Tenant, ApiError> {
    let row: TenantRow = tenants::table
        .find(id.get())
        .first(conn)
        .map_err(|_| ApiError::not_found("tenant not found"))?;
    let plan = resolve_plan(conn, row.id)?;
    Ok(tenant_from_row(row, plan))
}

pub fn get_by_email(conn: &mut PgConnection, email: &str) -> Result<Option<Tenant>, ApiError> {
    let row: Option<TenantRow> = tenants::table
        .filter(tenants::email.eq(email))
        .first(conn)
        .optional()
        .map_err(|e| ApiError::internal(format!("lookup tenant: {e}")))?;
    match row {
        Some(row) => {
            let plan = resolve_plan(conn, row.id)?;
            Ok(Some(tenant_from_row(row, plan)))
        }
        None => Ok(None),
    }
}

pub fn create(
    conn: &mut PgConnection,
    email: &str,
    password_hash: &str,
    default_plan_id: PlanId,
) -> Result<Tenant, ApiError> {
    let now = Utc::now();
    let new_tenant = NewTenant {
        email,
        password_hash,
        active: true,
        verified: false,
        usage_counter: 0,
        last_reset: now,
        created_at: now,
    };

    conn.transaction(|conn| {
        let row: TenantRow = diesel::insert_into(tenants::table)
            .values(&new_tenant)
            .get_result(conn)?;

        diesel::insert_into(subscriptions::table)
            .values((
                subscriptions::tenant_id.eq(row.id),
                subscriptions::plan_id.eq(default_plan_id.get()),
                subscriptions::active.eq(true),
                subscriptions::started_at.eq(now),
            ))
            .execute(conn)?;

        Ok::<_, diesel::result::Error>(row)
    })
    .map_err(|e| match e {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        ) => ApiError::invalid_input("an account with that email already exists"),
        e => ApiError::internal(format!("create tenant: {e}")),
    })
    .map(|row| tenant_from_row(row, Plan::from_default(default_plan_id)))
}

impl Plan {
    fn from_default(id: PlanId) -> Plan {
        // Placeholder until the caller re-reads the tenant; `create` only
        // needs a valid `Tenant` value back, the plan fields are refreshed
        // on the next `get_by_id`.
        Plan {
            id,
            max_files_per_period: -1,
            max_file_size_bytes: -1,
            active: true,
        }
    }
}

pub fn set_verified(conn: &mut PgConnection, id: TenantId, verified: bool) -> Result<(), ApiError> {
    diesel::update(tenants::table.find(id.get()))
        .set(tenants::verified.eq(verified))
        .execute(conn)
        .map_err(|e| ApiError::internal(format!("set verified: {e}")))?;
    Ok(())
}

/// Finds the `default` plan, creating it from the configured limits if
/// this is a fresh database. Run once at startup so `register` always has
/// a plan to attach a new tenant's subscription to.
pub fn ensure_default_plan(
    conn: &mut PgConnection,
    max_files_per_period: i64,
    max_file_size_bytes: i64,
) -> Result<PlanId, ApiError> {
    let existing: Option<PlanRow> = subscription_plans::table
        .filter(subscription_plans::name.eq("default"))
        .first(conn)
        .optional()
        .map_err(|e| ApiError::internal(format!("lookup default plan: {e}")))?;

    if let Some(row) = existing {
        return Ok(PlanId::new(row.id));
    }

    let row: PlanRow = diesel::insert_into(subscription_plans::table)
        .values((
            subscription_plans::name.eq("default"),
            subscription_plans::max_files_per_period.eq(max_files_per_period),
            subscription_plans::max_file_size_bytes.eq(max_file_size_bytes),
            subscription_plans::active.eq(true),
        ))
        .get_result(conn)
        .map_err(|e| ApiError::internal(format!("create default plan: {e}")))?;

    Ok(PlanId::new(row.id))
}
