use tokio_postgres::Row;

use crate::db::DbResult;
use crate::db::error::DbError;
use crate::models::types::{AccountId, ItemId, TemplateId};

/// Catalog entry for a purchasable NFT. Read-only reference data; the engine
/// never writes this table.
#[derive(Debug, Clone)]
pub struct ItemTemplate {
    pub id: TemplateId,
    pub name: String,
    pub img: String,
    pub tier: i32,
    pub base_price: i64,
}

impl ItemTemplate {
    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            img: row.try_get("img")?,
            tier: row.try_get("tier")?,
            base_price: row.try_get("base_price")?,
        })
    }
}

/// An owned NFT. Name and image are snapshotted from the template at purchase
/// time, so later catalog edits do not rewrite owned items. `tier` is joined
/// in from the template for display.
#[derive(Debug, Clone)]
pub struct ItemInstance {
    pub id: ItemId,
    pub owner_id: AccountId,
    pub template_id: TemplateId,
    pub name: String,
    pub img: String,
    pub buy_price: i64,
    pub upgrades: serde_json::Value,
    pub is_active_battle: bool,
    pub tier: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ItemInstance {
    pub fn try_from_row(row: &Row) -> DbResult<Self> {
        let buy_price: i64 = row.try_get("buy_price")?;
        if buy_price < 0 {
            return Err(DbError::Decode("buy_price < 0".into()));
        }

        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("user_id")?,
            template_id: row.try_get("template_id")?,
            name: row.try_get("name")?,
            img: row.try_get("img")?,
            buy_price,
            upgrades: row.try_get("upgrades")?,
            is_active_battle: row.try_get("is_active_battle")?,
            tier: row.try_get("tier")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
