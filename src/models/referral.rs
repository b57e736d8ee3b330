use tokio_postgres::Row;

use crate::db::DbResult;
use crate::models::types::AccountId;

/// One row per referred user, ever. The unique constraint on `referred_id`
/// is what makes the referral bonus impossible to double-credit.
#[derive(Debug, Clone)]
pub struct ReferralRecord {
    pub referrer_id: AccountId,
    pub referred_id: AccountId,
    pub stars_awarded: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ReferralRecord {
    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        Ok(Self {
            referrer_id: row.try_get("referrer_id")?,
            referred_id: row.try_get("referred_id")?,
            stars_awarded: row.try_get("stars_awarded")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
