//! Inventory store: the set of owned NFT instances per user.
//!
//! Mutations take the caller's open transaction. The "at most one battle
//! item" invariant is maintained by `set_active`'s clear-then-set inside one
//! transaction and backstopped by a partial unique index in the schema.

use tokio_postgres::{GenericClient, Transaction};

use crate::db::error::DbError;
use crate::error::{AppResult, DomainError};
use crate::models::item::{ItemInstance, ItemTemplate};
use crate::models::types::{AccountId, ItemId};

/// Joined column list decoded by `ItemInstance::try_from_row`; `tier` comes
/// from the template.
const ITEM_COLUMNS: &str = "n.id, n.user_id, n.template_id, n.name, n.img, n.buy_price, \
     n.upgrades, n.is_active_battle, n.created_at, t.tier";

/// Create a new instance owned by `owner_id`. Name and image are snapshotted
/// from the template so later catalog edits leave owned items untouched.
pub async fn add_item(
    tx: &Transaction<'_>,
    owner_id: AccountId,
    template: &ItemTemplate,
    price: i64,
) -> AppResult<ItemInstance> {
    let id = ItemId::new();
    let row = tx
        .query_one(
            "INSERT INTO user_nfts (id, user_id, template_id, name, img, buy_price)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING upgrades, created_at",
            &[&id, &owner_id, &template.id, &template.name, &template.img, &price],
        )
        .await
        .map_err(DbError::from)?;

    Ok(ItemInstance {
        id,
        owner_id,
        template_id: template.id,
        name: template.name.clone(),
        img: template.img.clone(),
        buy_price: price,
        upgrades: row.get("upgrades"),
        is_active_battle: false,
        tier: template.tier,
        created_at: row.get("created_at"),
    })
}

/// Delete an owned instance, returning its last-known data so the caller can
/// compute sale proceeds.
pub async fn remove_item(
    tx: &Transaction<'_>,
    owner_id: AccountId,
    item_id: ItemId,
) -> AppResult<ItemInstance> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS}
         FROM user_nfts n
         JOIN nft_templates t ON t.id = n.template_id
         WHERE n.id = $1 AND n.user_id = $2
         FOR UPDATE OF n"
    );
    let row_opt = tx
        .query_opt(sql.as_str(), &[&item_id, &owner_id])
        .await
        .map_err(DbError::from)?;

    let Some(row) = row_opt else {
        return Err(DomainError::ItemNotFound);
    };
    let item = ItemInstance::try_from_row(&row)?;

    tx.execute("DELETE FROM user_nfts WHERE id = $1", &[&item_id])
        .await
        .map_err(DbError::from)?;

    Ok(item)
}

/// Flag `item_id` as the single active battle item. The clear and the set run
/// in the caller's transaction; if the target does not exist the whole
/// transaction aborts, leaving the previous active item in place.
pub async fn set_active(
    tx: &Transaction<'_>,
    owner_id: AccountId,
    item_id: ItemId,
) -> AppResult<ItemInstance> {
    tx.execute(
        "UPDATE user_nfts SET is_active_battle = false WHERE user_id = $1 AND is_active_battle",
        &[&owner_id],
    )
    .await
    .map_err(DbError::from)?;

    let n = tx
        .execute(
            "UPDATE user_nfts SET is_active_battle = true WHERE id = $1 AND user_id = $2",
            &[&item_id, &owner_id],
        )
        .await
        .map_err(DbError::from)?;
    if n == 0 {
        return Err(DomainError::ItemNotFound);
    }

    get_item(tx, owner_id, item_id).await
}

/// All instances owned by `owner_id`, in creation order.
pub async fn list<C: GenericClient>(client: &C, owner_id: AccountId) -> AppResult<Vec<ItemInstance>> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS}
         FROM user_nfts n
         JOIN nft_templates t ON t.id = n.template_id
         WHERE n.user_id = $1
         ORDER BY n.created_at, n.id"
    );
    let rows = client
        .query(sql.as_str(), &[&owner_id])
        .await
        .map_err(DbError::from)?;

    Ok(rows
        .iter()
        .map(ItemInstance::try_from_row)
        .collect::<Result<_, _>>()?)
}

pub async fn get_item<C: GenericClient>(
    client: &C,
    owner_id: AccountId,
    item_id: ItemId,
) -> AppResult<ItemInstance> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS}
         FROM user_nfts n
         JOIN nft_templates t ON t.id = n.template_id
         WHERE n.id = $1 AND n.user_id = $2"
    );
    let row_opt = client
        .query_opt(sql.as_str(), &[&item_id, &owner_id])
        .await
        .map_err(DbError::from)?;

    match row_opt {
        Some(row) => Ok(ItemInstance::try_from_row(&row)?),
        None => Err(DomainError::ItemNotFound),
    }
}
