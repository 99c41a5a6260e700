//! Walks a collection page by page using a max-id cursor.
//!
//! Pages arrive newest first, so the last item holds the smallest id and the
//! next cursor is that id minus one. A cursor of zero asks for the most recent
//! page.

use crate::model::{Collection, Item};
use crate::twitter::error::{ApiError, ApiResult};
use crate::twitter::TwitterClient;

pub struct Paginator<'a> {
    client: &'a dyn TwitterClient,
    collection: Collection,
    cursor: u64,
    done: bool,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a dyn TwitterClient, collection: Collection) -> Self {
        Self {
            client,
            collection,
            cursor: 0,
            done: false,
        }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Fetches the next page, or `None` once the collection is exhausted.
    ///
    /// A failed fetch leaves the cursor where it was, so calling this again
    /// retries the same page.
    pub async fn next_page(&mut self) -> ApiResult<Option<Vec<Item>>> {
        if self.done {
            return Ok(None);
        }
        let page = self.client.get_batch(self.collection, self.cursor).await?;
        let last = match page.last() {
            Some(last) => last.id,
            None => {
                self.done = true;
                return Ok(None);
            }
        };

        // Every id must sit at or below the cursor, otherwise the server has
        // ignored max_id and is replaying items already yielded. This also
        // keeps the next cursor strictly below the current one.
        if self.cursor != 0 {
            let max_id = page.iter().map(|i| i.id).max().unwrap_or(last);
            if max_id > self.cursor {
                self.done = true;
                return Err(ApiError::CursorStalled {
                    cursor: self.cursor,
                    max_id,
                });
            }
        }

        // nothing can sit below id 1, and a cursor of 0 would restart the walk
        let next = last.saturating_sub(1);
        if next == 0 {
            self.done = true;
        } else {
            self.cursor = next;
        }
        Ok(Some(page))
    }
}
