use tokio_postgres::Row;

use crate::db::DbResult;
use crate::db::error::DbError;
use crate::models::types::AccountId;

/// A user's economic state. Rows are owned by Postgres; this struct is a
/// transient view read inside an operation's transaction, never cached.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub telegram_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub photo_url: String,
    pub stars: i64,
    pub total_stars_earned: i64,
    pub battles_count: i64,
    pub referral_code: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Columns selected whenever an account row is decoded with `try_from_row`.
pub const ACCOUNT_COLUMNS: &str = "id, telegram_id, username, first_name, last_name, photo_url, \
     stars, total_stars_earned, battles_count, referral_code, created_at, updated_at";

impl Account {
    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        let stars: i64 = row.try_get("stars")?;
        let total_stars_earned: i64 = row.try_get("total_stars_earned")?;

        // The schema carries CHECK constraints for these; a negative value
        // here means the row was tampered with outside the engine.
        if stars < 0 {
            return Err(DbError::Decode("stars < 0".into()));
        }
        if total_stars_earned < 0 {
            return Err(DbError::Decode("total_stars_earned < 0".into()));
        }

        Ok(Self {
            id: row.try_get::<_, AccountId>("id")?,
            telegram_id: row.try_get("telegram_id")?,
            username: row.try_get("username")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            photo_url: row.try_get("photo_url")?,
            stars,
            total_stars_earned,
            battles_count: row.try_get("battles_count")?,
            referral_code: row.try_get("referral_code")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Full account projection returned by `onboard` and `profile`: the account
/// row plus the collection and referral counts shown on the profile screen.
#[derive(Debug, Clone)]
pub struct AccountProfile {
    pub account: Account,
    pub nft_count: i64,
    pub referrals_count: i64,
}

impl AccountProfile {
    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        Ok(Self {
            account: Account::try_from_row(row)?,
            nft_count: row.try_get("nft_count")?,
            referrals_count: row.try_get("referrals_count")?,
        })
    }
}
