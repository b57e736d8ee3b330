//! The public surface of the engine. Every operation runs in exactly one
//! Postgres transaction: either all of its reads and writes land, or none do.
//! Per-account serialization comes from the `FOR UPDATE` lock taken on the
//! account row by the ledger at the start of each mutating operation.

use std::sync::Arc;

use tokio_postgres::GenericClient;
use tracing::{debug, info, warn};

use crate::auth::VerifiedIdentity;
use crate::catalog::TemplateCatalog;
use crate::config::EconomyConfig;
use crate::db::Db;
use crate::db::error::DbError;
use crate::error::{AppResult, DomainError};
use crate::models::account::{ACCOUNT_COLUMNS, AccountProfile};
use crate::models::item::ItemInstance;
use crate::models::types::{AccountId, ItemId, TemplateId};
use crate::services::referral::ReferralOutcome;
use crate::services::{inventory, ledger, onboarding, referral};

#[derive(Debug)]
pub struct PurchaseReceipt {
    pub item: ItemInstance,
    /// Balance after the debit.
    pub stars: i64,
}

#[derive(Debug)]
pub struct SaleReceipt {
    pub item_id: ItemId,
    pub proceeds: i64,
    /// Balance after the credit.
    pub stars: i64,
}

#[derive(Debug)]
pub struct CollectionView {
    pub items: Vec<ItemInstance>,
    pub active: Option<ItemInstance>,
}

pub struct TransactionCoordinator {
    db: Db,
    catalog: Arc<dyn TemplateCatalog>,
    cfg: EconomyConfig,
}

impl TransactionCoordinator {
    pub fn new(db: Db, catalog: Arc<dyn TemplateCatalog>, cfg: EconomyConfig) -> Self {
        Self { db, catalog, cfg }
    }

    /// Debit the price and create the item instance as one unit. A failed
    /// debit leaves no item behind.
    ///
    /// `price` overrides the template's base price when given (the storefront
    /// may apply discounts); the debit rejects non-positive values either way.
    pub async fn buy(
        &self,
        user_id: AccountId,
        template_id: TemplateId,
        price: Option<i64>,
    ) -> AppResult<PurchaseReceipt> {
        let template = self
            .catalog
            .template(template_id)
            .await?
            .ok_or(DomainError::TemplateNotFound)?;
        let price = price.unwrap_or(template.base_price);

        let mut client = self.db.get_client().await?;
        let tx = client.build_transaction().start().await.map_err(DbError::from)?;

        let stars = ledger::debit(&tx, user_id, price).await?;
        let item = inventory::add_item(&tx, user_id, &template, price).await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(%user_id, %template_id, price, stars, "nft purchased");
        Ok(PurchaseReceipt { item, stars })
    }

    /// Remove the item and credit the proceeds as one unit. Proceeds are a
    /// floored fraction of the recorded purchase price, never counted as
    /// earned stars.
    pub async fn sell(&self, user_id: AccountId, item_id: ItemId) -> AppResult<SaleReceipt> {
        let mut client = self.db.get_client().await?;
        let tx = client.build_transaction().start().await.map_err(DbError::from)?;

        let balance = ledger::balance_for_update(&tx, user_id).await?;
        let item = inventory::remove_item(&tx, user_id, item_id).await?;

        let proceeds = sale_proceeds(item.buy_price, self.cfg.sell_ratio_pct);
        let stars = if proceeds > 0 {
            ledger::credit(&tx, user_id, proceeds, false).await?
        } else {
            balance
        };

        tx.commit().await.map_err(DbError::from)?;

        info!(%user_id, %item_id, proceeds, stars, "nft sold");
        Ok(SaleReceipt { item_id, proceeds, stars })
    }

    /// Make `item_id` the single active battle item.
    pub async fn set_active(&self, user_id: AccountId, item_id: ItemId) -> AppResult<ItemInstance> {
        let mut client = self.db.get_client().await?;
        let tx = client.build_transaction().start().await.map_err(DbError::from)?;

        ledger::balance_for_update(&tx, user_id).await?;
        let item = inventory::set_active(&tx, user_id, item_id).await?;

        tx.commit().await.map_err(DbError::from)?;

        debug!(%user_id, %item_id, "active battle nft updated");
        Ok(item)
    }

    /// Create or refresh the account for a verified login and return its full
    /// projection. The referral outcome is logged but never fails onboarding;
    /// only storage errors abort the new account.
    pub async fn onboard(
        &self,
        identity: VerifiedIdentity,
        referral_code: Option<&str>,
    ) -> AppResult<AccountProfile> {
        let mut client = self.db.get_client().await?;
        let tx = client.build_transaction().start().await.map_err(DbError::from)?;

        let outcome = onboarding::lookup_or_create(&tx, &identity, &self.cfg).await?;

        if outcome.created
            && let Some(code) = referral_code
        {
            match referral::award(&tx, code, outcome.account.id, self.cfg.referral_bonus).await {
                Ok(ReferralOutcome::Awarded(rec)) => {
                    info!(
                        referrer = %rec.referrer_id,
                        referred = %rec.referred_id,
                        stars = rec.stars_awarded,
                        "referral bonus awarded"
                    );
                }
                Ok(ReferralOutcome::UnknownCode) => {
                    debug!(code, "referral code did not resolve");
                }
                Err(DomainError::AlreadyReferred) => {
                    warn!(referred = %outcome.account.id, "referral already credited, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        let profile = profile_query(&*tx, outcome.account.id).await?;
        tx.commit().await.map_err(DbError::from)?;

        info!(
            account = %profile.account.id,
            telegram_id = identity.telegram_id,
            created = outcome.created,
            "onboarding complete"
        );
        Ok(profile)
    }

    /// Read-only balance lookup.
    pub async fn balance(&self, user_id: AccountId) -> AppResult<i64> {
        let client = self.db.get_client().await?;
        ledger::balance(&**client, user_id).await
    }

    /// Account projection with collection and referral counts.
    pub async fn profile(&self, user_id: AccountId) -> AppResult<AccountProfile> {
        let client = self.db.get_client().await?;
        profile_query(&**client, user_id).await
    }

    /// The user's collection in creation order, plus the active battle item.
    pub async fn collection(&self, user_id: AccountId) -> AppResult<CollectionView> {
        let client = self.db.get_client().await?;
        let items = inventory::list(&**client, user_id).await?;
        let active = items.iter().find(|i| i.is_active_battle).cloned();
        Ok(CollectionView { items, active })
    }
}

async fn profile_query<C: GenericClient>(client: &C, user_id: AccountId) -> AppResult<AccountProfile> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS},
            (SELECT COUNT(*) FROM user_nfts WHERE user_id = a.id) AS nft_count,
            (SELECT COUNT(*) FROM referrals WHERE referrer_id = a.id) AS referrals_count
         FROM accounts a
         WHERE a.id = $1"
    );
    let row_opt = client
        .query_opt(sql.as_str(), &[&user_id])
        .await
        .map_err(DbError::from)?;

    match row_opt {
        Some(row) => Ok(AccountProfile::try_from_row(&row)?),
        None => Err(DomainError::AccountNotFound),
    }
}

/// Sale proceeds: `floor(buy_price * pct / 100)`.
fn sale_proceeds(buy_price: i64, ratio_pct: i64) -> i64 {
    debug_assert!((0..=100).contains(&ratio_pct));
    buy_price.saturating_mul(ratio_pct) / 100
}

#[cfg(test)]
mod tests {
    use super::sale_proceeds;

    #[test]
    fn proceeds_are_floored() {
        assert_eq!(sale_proceeds(60, 80), 48);
        assert_eq!(sale_proceeds(99, 80), 79); // 79.2 floors down
        assert_eq!(sale_proceeds(1, 80), 0);
        assert_eq!(sale_proceeds(0, 80), 0);
    }

    #[test]
    fn proceeds_at_ratio_bounds() {
        assert_eq!(sale_proceeds(250, 100), 250);
        assert_eq!(sale_proceeds(250, 0), 0);
    }
}
