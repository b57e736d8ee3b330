//! Onboarding: lookup-or-create an account for a verified identity.
//!
//! A returning user gets a profile-field refresh and nothing else; the
//! starting balance is granted exactly once, on first creation. The create
//! path races safely against itself: the unique constraint on `telegram_id`
//! plus `ON CONFLICT DO NOTHING` turns the loser of a concurrent signup into
//! an update.

use rand::Rng;
use tokio_postgres::Transaction;

use crate::auth::VerifiedIdentity;
use crate::config::EconomyConfig;
use crate::db::error::DbError;
use crate::error::{AppResult, DomainError};
use crate::models::account::{ACCOUNT_COLUMNS, Account};
use crate::models::types::AccountId;

const CODE_LEN: usize = 8;
// No 0/O/1/I/L, codes get typed by hand.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

#[derive(Debug)]
pub struct OnboardOutcome {
    pub account: Account,
    pub created: bool,
}

pub async fn lookup_or_create(
    tx: &Transaction<'_>,
    identity: &VerifiedIdentity,
    cfg: &EconomyConfig,
) -> AppResult<OnboardOutcome> {
    if let Some(account) = find_for_update(tx, identity.telegram_id).await? {
        let account = update_profile(tx, account.id, identity).await?;
        return Ok(OnboardOutcome { account, created: false });
    }

    let code = generate_unused_code(tx, cfg.code_attempts).await?;
    let id = AccountId::new();
    let sql = format!(
        "INSERT INTO accounts (id, telegram_id, username, first_name, last_name, photo_url, stars, referral_code)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (telegram_id) DO NOTHING
         RETURNING {ACCOUNT_COLUMNS}"
    );
    let res = tx
        .query_opt(
            sql.as_str(),
            &[
                &id,
                &identity.telegram_id,
                &identity.username,
                &identity.first_name,
                &identity.last_name,
                &identity.photo_url,
                &cfg.starting_stars,
                &code,
            ],
        )
        .await;

    let row_opt = match res {
        Ok(row_opt) => row_opt,
        // telegram_id conflicts are absorbed by ON CONFLICT, so a unique
        // violation here is a referral-code collision that slipped past the
        // pre-check.
        Err(e) => match DbError::from(e) {
            DbError::UniqueViolation => {
                return Err(DomainError::RetryableConflict("referral code collision"));
            }
            other => return Err(other.into()),
        },
    };

    match row_opt {
        Some(row) => Ok(OnboardOutcome {
            account: Account::try_from_row(&row)?,
            created: true,
        }),
        None => {
            // Lost a concurrent signup race. The conflicting insert waited on
            // the winner's commit, so the row is visible to a fresh read now.
            let Some(account) = find_for_update(tx, identity.telegram_id).await? else {
                return Err(DomainError::RetryableConflict("concurrent onboarding"));
            };
            let account = update_profile(tx, account.id, identity).await?;
            Ok(OnboardOutcome { account, created: false })
        }
    }
}

async fn find_for_update(tx: &Transaction<'_>, telegram_id: i64) -> AppResult<Option<Account>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE telegram_id = $1 FOR UPDATE");
    let row_opt = tx
        .query_opt(sql.as_str(), &[&telegram_id])
        .await
        .map_err(DbError::from)?;

    Ok(row_opt.as_ref().map(Account::try_from_row).transpose()?)
}

async fn update_profile(
    tx: &Transaction<'_>,
    id: AccountId,
    identity: &VerifiedIdentity,
) -> AppResult<Account> {
    let sql = format!(
        "UPDATE accounts
         SET username = $2, first_name = $3, last_name = $4, photo_url = $5, updated_at = now()
         WHERE id = $1
         RETURNING {ACCOUNT_COLUMNS}"
    );
    let row = tx
        .query_one(
            sql.as_str(),
            &[
                &id,
                &identity.username,
                &identity.first_name,
                &identity.last_name,
                &identity.photo_url,
            ],
        )
        .await
        .map_err(DbError::from)?;

    Ok(Account::try_from_row(&row)?)
}

/// Pick a referral code nobody holds yet, retrying a few times before
/// surfacing a retryable conflict.
async fn generate_unused_code(tx: &Transaction<'_>, attempts: u32) -> AppResult<String> {
    for _ in 0..attempts {
        let code = generate_code(&mut rand::rng());
        let taken = tx
            .query_opt("SELECT 1 FROM accounts WHERE referral_code = $1", &[&code])
            .await
            .map_err(DbError::from)?;
        if taken.is_none() {
            return Ok(code);
        }
    }

    Err(DomainError::RetryableConflict("could not allocate referral code"))
}

fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn codes_use_the_expected_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn codes_vary_between_draws() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = generate_code(&mut rng);
        let b = generate_code(&mut rng);
        assert_ne!(a, b);
    }
}
