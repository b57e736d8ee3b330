//! Account ledger: atomic credit and debit of star balances.
//!
//! Every mutating function takes the caller's open transaction and acquires
//! the account row lock inside it, so the balance check and the write cannot
//! be separated by a concurrent operation on the same account. Nothing in
//! this module commits; that is the coordinator's job.

use tokio_postgres::{GenericClient, Transaction};

use crate::db::error::DbError;
use crate::error::{AppResult, DomainError};
use crate::models::types::AccountId;

/// Lock the account row for the remainder of the transaction and return the
/// current balance. All economic operations on one account serialize here.
pub async fn balance_for_update(tx: &Transaction<'_>, user_id: AccountId) -> AppResult<i64> {
    let row_opt = tx
        .query_opt("SELECT stars FROM accounts WHERE id = $1 FOR UPDATE", &[&user_id])
        .await
        .map_err(DbError::from)?;

    match row_opt {
        Some(row) => Ok(row.get("stars")),
        None => Err(DomainError::AccountNotFound),
    }
}

/// Add `amount` stars. Purchases/sales are transfers and do not count as
/// earned; referral bonuses and gameplay rewards do.
pub async fn credit(
    tx: &Transaction<'_>,
    user_id: AccountId,
    amount: i64,
    counts_as_earned: bool,
) -> AppResult<i64> {
    if amount <= 0 {
        return Err(DomainError::InvalidAmount(amount));
    }

    balance_for_update(tx, user_id).await?;

    let earned = if counts_as_earned { amount } else { 0 };
    let row = tx
        .query_one(
            "UPDATE accounts
             SET stars = stars + $2,
                 total_stars_earned = total_stars_earned + $3,
                 updated_at = now()
             WHERE id = $1
             RETURNING stars",
            &[&user_id, &amount, &earned],
        )
        .await
        .map_err(DbError::from)?;

    Ok(row.get("stars"))
}

/// Subtract `amount` stars, failing when the balance is too low. The check
/// and the subtraction happen under the same row lock.
pub async fn debit(tx: &Transaction<'_>, user_id: AccountId, amount: i64) -> AppResult<i64> {
    if amount <= 0 {
        return Err(DomainError::InvalidAmount(amount));
    }

    let have = balance_for_update(tx, user_id).await?;
    if have < amount {
        return Err(DomainError::InsufficientFunds { have, need: amount });
    }

    let row = tx
        .query_one(
            "UPDATE accounts SET stars = stars - $2, updated_at = now() WHERE id = $1 RETURNING stars",
            &[&user_id, &amount],
        )
        .await
        .map_err(DbError::from)?;

    Ok(row.get("stars"))
}

/// Read-only balance lookup.
pub async fn balance<C: GenericClient>(client: &C, user_id: AccountId) -> AppResult<i64> {
    let row_opt = client
        .query_opt("SELECT stars FROM accounts WHERE id = $1", &[&user_id])
        .await
        .map_err(DbError::from)?;

    match row_opt {
        Some(row) => Ok(row.get("stars")),
        None => Err(DomainError::AccountNotFound),
    }
}
