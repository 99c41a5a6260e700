pub mod error;
pub mod executor;
pub mod oauth;
pub mod v1;

use crate::model::{Collection, Item};
use async_trait::async_trait;
use error::ApiResult;

#[async_trait]
pub trait TwitterClient: Send + Sync {
    /// One page of `collection`, newest first. A non-zero `max_id` limits the
    /// page to ids at or below it.
    async fn get_batch(&self, collection: Collection, max_id: u64) -> ApiResult<Vec<Item>>;

    async fn destroy(&self, collection: Collection, id: u64) -> ApiResult<()>;
}
