use deadpool_postgres::Pool;

pub mod error;
mod migrations;
mod pool;

pub use error::DbError;

pub type DbResult<T> = Result<T, DbError>;

/// Shared handle to the connection pool. Cheap to clone; all engine state
/// lives in Postgres, never in this struct.
#[derive(Clone, Debug)]
pub struct Db {
    pub(crate) pool: Pool,
}

impl Db {
    pub async fn get_client(&self) -> DbResult<deadpool_postgres::Client> {
        Ok(self.pool.get().await?)
    }
}
