//! The admission function evaluated before any bytes are persisted for a
//! request. Pure with respect to the caller's view of the world: it reads
//! and, when a period has rolled over, writes exactly the tenant row named
//! by `tenant_id`, and touches nothing else.

use chrono::{DateTime, Datelike, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;

use utils::id::TenantId;

use crate::db::schema::tenants;
use crate::error::ApiError;
use crate::tenant::{self, Tenant};

/// True once `now` has crossed a calendar-month boundary relative to
/// `last_reset`. A tenant's usage resets at most once per rollover,
/// applied lazily on the next admission check rather than by a scheduled
/// job.
fn period_has_rolled_over(last_reset: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    (now.year(), now.month()) != (last_reset.year(), last_reset.month())
}

/// Zeroes the usage counter and advances `last_reset` to `now`, but only
/// if the row's `last_reset` is still the stale value the caller observed
/// — an optimistic guard against two concurrent admissions both applying
/// the rollover.
fn apply_rollover(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    observed_last_reset: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    diesel::update(
        tenants::table
            .find(tenant_id.get())
            .filter(tenants::last_reset.eq(observed_last_reset)),
    )
    .set((tenants::usage_counter.eq(0), tenants::last_reset.eq(now)))
    .execute(conn)
    .map_err(|e| ApiError::internal(format!("apply rollover: {e}")))?;
    Ok(())
}

/// Evaluates admission (active, verified if required, quota, file size)
/// and, on the period-rollover path, applies the reset. Returns the tenant
/// view admission was evaluated against (post-rollover, if one occurred)
/// so callers don't need a second read.
pub fn check_admission(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    requires_verified: bool,
    input_size: Option<u64>,
) -> Result<Tenant, ApiError> {
    let mut t = tenant::get_by_id(conn, tenant_id)?;

    if !t.active {
        return Err(ApiError::forbidden("account is not active"));
    }
    if requires_verified && !t.verified {
        return Err(ApiError::forbidden("account is not verified"));
    }

    let now = Utc::now();
    if period_has_rolled_over(t.last_reset, now) {
        apply_rollover(conn, tenant_id, t.last_reset, now)?;
        t.usage_counter = 0;
        t.last_reset = now;
    }

    if !t.plan.is_unlimited_files() && t.usage_counter >= t.plan.max_files_per_period {
        return Err(ApiError::quota_exhausted(
            "monthly file quota reached for this plan",
        ));
    }

    if let Some(size) = input_size {
        if !t.plan.is_unlimited_size() && size as i64 > t.plan.max_file_size_bytes {
            return Err(ApiError::file_too_large(
                "upload exceeds this plan's per-file size limit",
            ));
        }
    }

    Ok(t)
}

/// The single atomic increment run by the finalizer on COMPLETED:
/// `UPDATE ... SET counter = counter + 1 WHERE id = ? AND counter < cap`.
/// Guarded by the cap so a burst of concurrent completions can never push
/// the counter above the plan's limit.
/// `max_files_per_period` is read from the job's tenant snapshot taken at
/// admission; a plan change mid-flight affects the *next* admission, not
/// this already-approved job's accounting.
pub fn increment_usage(
    conn: &mut PgConnection,
    tenant_id: TenantId,
    max_files_per_period: i64,
) -> Result<(), ApiError> {
    let target = tenants::table.find(tenant_id.get());
    let updated = if max_files_per_period < 0 {
        diesel::update(target)
            .set(tenants::usage_counter.eq(tenants::usage_counter + 1))
            .execute(conn)
    } else {
        diesel::update(target.filter(tenants::usage_counter.lt(max_files_per_period)))
            .set(tenants::usage_counter.eq(tenants::usage_counter + 1))
            .execute(conn)
    };
    updated.map_err(|e| ApiError::internal(format!("increment usage: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn same_month_does_not_roll_over() {
        let last = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        assert!(!period_has_rolled_over(last, now));
    }

    #[test]
    fn crossing_a_month_boundary_rolls_over() {
        let last = Utc.with_ymd_and_hms(2026, 2, 20, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 1).unwrap();
        assert!(period_has_rolled_over(last, now));
    }
}
