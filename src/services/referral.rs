//! Referral engine: one-time signup bonus for the recruiting user.

use tokio_postgres::Transaction;

use crate::db::error::DbError;
use crate::error::{AppResult, DomainError};
use crate::models::referral::ReferralRecord;
use crate::models::types::AccountId;
use crate::services::ledger;

#[derive(Debug)]
pub enum ReferralOutcome {
    Awarded(ReferralRecord),
    /// The code did not resolve to an account. Deliberately not an error: an
    /// invalid referral code must never block onboarding.
    UnknownCode,
}

/// Record the referral and credit the referrer, atomically within the
/// caller's transaction.
///
/// Idempotent per referred user: a second call returns `AlreadyReferred`
/// without touching the ledger. The insert uses `ON CONFLICT DO NOTHING` so a
/// replay does not poison the enclosing transaction.
pub async fn award(
    tx: &Transaction<'_>,
    referrer_code: &str,
    referred_id: AccountId,
    bonus: i64,
) -> AppResult<ReferralOutcome> {
    let row_opt = tx
        .query_opt("SELECT id FROM accounts WHERE referral_code = $1", &[&referrer_code])
        .await
        .map_err(DbError::from)?;

    let Some(row) = row_opt else {
        return Ok(ReferralOutcome::UnknownCode);
    };
    let referrer_id: AccountId = row.get("id");

    let inserted = tx
        .query_opt(
            "INSERT INTO referrals (referrer_id, referred_id, stars_awarded)
             VALUES ($1, $2, $3)
             ON CONFLICT (referred_id) DO NOTHING
             RETURNING referrer_id, referred_id, stars_awarded, created_at",
            &[&referrer_id, &referred_id, &bonus],
        )
        .await
        .map_err(DbError::from)?;

    let Some(row) = inserted else {
        return Err(DomainError::AlreadyReferred);
    };
    let record = ReferralRecord::try_from_row(&row)?;

    ledger::credit(tx, referrer_id, bonus, true).await?;

    Ok(ReferralOutcome::Awarded(record))
}
