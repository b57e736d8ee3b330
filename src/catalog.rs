use crate::db::{Db, DbResult};
use crate::models::item::ItemTemplate;
use crate::models::types::TemplateId;

/// Lookup into the NFT template catalog. The catalog is read-only reference
/// data managed outside the engine; this trait is the seam for it.
#[async_trait::async_trait]
pub trait TemplateCatalog: Send + Sync {
    async fn template(&self, id: TemplateId) -> DbResult<Option<ItemTemplate>>;
    async fn all_templates(&self) -> DbResult<Vec<ItemTemplate>>;
}

/// Catalog backed by the `nft_templates` table.
pub struct PgTemplateCatalog {
    db: Db,
}

impl PgTemplateCatalog {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl TemplateCatalog for PgTemplateCatalog {
    async fn template(&self, id: TemplateId) -> DbResult<Option<ItemTemplate>> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("SELECT id, name, img, tier, base_price FROM nft_templates WHERE id = $1")
            .await?;

        let row_opt = client.query_opt(&stmt, &[&id]).await?;
        row_opt.as_ref().map(ItemTemplate::try_from_row).transpose()
    }

    async fn all_templates(&self) -> DbResult<Vec<ItemTemplate>> {
        let client = self.db.get_client().await?;

        let stmt = client
            .prepare_cached("SELECT id, name, img, tier, base_price FROM nft_templates ORDER BY tier, base_price")
            .await?;

        let rows = client.query(&stmt, &[]).await?;
        rows.iter().map(ItemTemplate::try_from_row).collect()
    }
}
