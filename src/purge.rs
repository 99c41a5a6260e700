//! Deletes a collection page by page, skipping whatever the keep policy
//! protects.
//!
//! There is no transaction: if the process dies mid-run, some prefix of the
//! collection is already gone.

use crate::model::{Collection, Item};
use crate::paginate::Paginator;
use crate::twitter::error::ApiResult;
use crate::twitter::TwitterClient;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum KeepPolicy {
    Nothing,
    /// Keep items whose author the caller follows
    Followed,
    /// Keep items younger than `age` at `now`
    NewerThan { age: Duration, now: DateTime<Utc> },
}

impl KeepPolicy {
    pub fn newer_than(age: Duration) -> Self {
        KeepPolicy::NewerThan {
            age,
            now: Utc::now(),
        }
    }

    pub fn keeps(&self, item: &Item) -> bool {
        match self {
            KeepPolicy::Nothing => false,
            KeepPolicy::Followed => item.user.following,
            KeepPolicy::NewerThan { age, now } => match item.created_at() {
                Ok(created) => match (*now - created.with_timezone(&Utc)).to_std() {
                    Ok(elapsed) => elapsed <= *age,
                    // created in the future as far as we can tell
                    Err(_) => true,
                },
                Err(e) => {
                    log::warn!(
                        "Keeping {}, unable to parse created_at {:?}: {}",
                        item.id,
                        item.created_at,
                        e
                    );
                    true
                }
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Kept,
    Deleted,
    AlreadyGone,
    Failed(String),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeSummary {
    pub pages: usize,
    pub kept: usize,
    pub deleted: usize,
    pub already_gone: usize,
    pub failed: usize,
}

impl PurgeSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Kept => self.kept += 1,
            Outcome::Deleted => self.deleted += 1,
            Outcome::AlreadyGone => self.already_gone += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

pub struct Purger<'a> {
    client: &'a dyn TwitterClient,
    collection: Collection,
    policy: KeepPolicy,
    max_page_failures: u32,
}

impl<'a> Purger<'a> {
    pub fn new(client: &'a dyn TwitterClient, collection: Collection, policy: KeepPolicy) -> Self {
        Self {
            client,
            collection,
            policy,
            max_page_failures: 3,
        }
    }

    pub fn max_page_failures(mut self, max: u32) -> Self {
        self.max_page_failures = max;
        self
    }

    /// One delete call per item the policy does not keep. Failures are
    /// logged and never stop the batch.
    pub async fn process_batch(&self, items: &[Item]) -> Vec<(u64, Outcome)> {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let outcome = if self.policy.keeps(item) {
                log::info!("Keeping {}", item.id);
                Outcome::Kept
            } else {
                match self.client.destroy(self.collection, item.id).await {
                    Ok(()) => Outcome::Deleted,
                    Err(e) if e.is_not_found() => {
                        log::warn!("{} {} was already gone, skipping", self.collection, item.id);
                        Outcome::AlreadyGone
                    }
                    Err(e) => {
                        log::warn!("Unable to destroy {} {}: {}", self.collection, item.id, e);
                        Outcome::Failed(e.to_string())
                    }
                }
            };
            outcomes.push((item.id, outcome));
        }
        outcomes
    }

    pub async fn run(&self) -> ApiResult<PurgeSummary> {
        let mut summary = PurgeSummary::default();
        let mut paginator = Paginator::new(self.client, self.collection);
        while let Some(page) = next_page(&mut paginator, self.max_page_failures).await? {
            summary.pages += 1;
            for (_, outcome) in self.process_batch(&page).await {
                summary.record(&outcome);
            }
            log::info!(
                "Processed {} pages of {}: {} deleted, {} kept",
                summary.pages,
                self.collection,
                summary.deleted,
                summary.kept
            );
        }
        Ok(summary)
    }
}

/// Fetches the next page, retrying the same cursor after a failure until
/// `max_failures` consecutive attempts have failed.
pub async fn next_page(
    paginator: &mut Paginator<'_>,
    max_failures: u32,
) -> ApiResult<Option<Vec<Item>>> {
    let mut failures = 0;
    loop {
        match paginator.next_page().await {
            Ok(page) => return Ok(page),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                failures += 1;
                if failures >= max_failures {
                    return Err(e);
                }
                log::warn!(
                    "Unable to fetch page at cursor {} ({}/{}): {}",
                    paginator.cursor(),
                    failures,
                    max_failures,
                    e
                );
            }
        }
    }
}

/// Collects a whole collection for dumping, with the same retry rule as a
/// purge run.
pub async fn gather(
    client: &dyn TwitterClient,
    collection: Collection,
    max_page_failures: u32,
) -> ApiResult<Vec<Item>> {
    let mut paginator = Paginator::new(client, collection);
    let mut items = Vec::new();
    while let Some(mut page) = next_page(&mut paginator, max_page_failures).await? {
        items.append(&mut page);
        log::info!("Gathered {} {}", items.len(), collection);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paginate::tests::{item, page, FakeClient};
    use crate::twitter::error::ApiError;
    use chrono::TimeZone;

    fn followed(id: u64) -> Item {
        let mut item = item(id);
        item.user.following = true;
        item
    }

    #[tokio::test]
    async fn kept_item_is_not_destroyed() {
        let client = FakeClient::default();
        let purger = Purger::new(&client, Collection::Likes, KeepPolicy::Followed);
        let outcomes = purger
            .process_batch(&[item(3), followed(2), item(1)])
            .await;

        assert_eq!(*client.destroyed.lock().unwrap(), vec![3, 1]);
        assert_eq!(
            outcomes,
            vec![
                (3, Outcome::Deleted),
                (2, Outcome::Kept),
                (1, Outcome::Deleted)
            ]
        );
    }

    #[tokio::test]
    async fn already_deleted_item_is_not_fatal() {
        let client = FakeClient {
            missing: vec![2],
            ..Default::default()
        };
        let purger = Purger::new(&client, Collection::Tweets, KeepPolicy::Nothing);
        let outcomes = purger.process_batch(&[item(3), item(2), item(1)]).await;
        assert_eq!(outcomes[1], (2, Outcome::AlreadyGone));
        assert_eq!(outcomes[2], (1, Outcome::Deleted));
        assert_eq!(client.destroyed.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn run_walks_every_page() {
        let mut first = page(500, 301);
        first[10].user.following = true;
        let client = FakeClient::with_pages(vec![Ok(first), Ok(page(300, 101)), Ok(vec![])]);
        let summary = Purger::new(&client, Collection::Likes, KeepPolicy::Followed)
            .run()
            .await
            .unwrap();

        assert_eq!(
            summary,
            PurgeSummary {
                pages: 2,
                kept: 1,
                deleted: 399,
                already_gone: 0,
                failed: 0,
            }
        );
        assert_eq!(*client.cursors.lock().unwrap(), vec![0, 300, 100]);
    }

    #[tokio::test]
    async fn page_failures_retry_same_cursor_then_give_up() {
        let failure = || {
            Err(ApiError::Status {
                status: 503,
                message: "Over capacity".into(),
            })
        };
        let client = FakeClient::with_pages(vec![failure(), Ok(page(10, 5)), failure(), failure()]);
        let result = Purger::new(&client, Collection::Likes, KeepPolicy::Nothing)
            .max_page_failures(2)
            .run()
            .await;

        assert!(result.is_err());
        assert_eq!(*client.cursors.lock().unwrap(), vec![0, 0, 4, 4]);
        assert_eq!(client.destroyed.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn stalled_cursor_stops_run_without_retry() {
        let client = FakeClient::with_pages(vec![Ok(page(500, 301)), Ok(page(500, 301))]);
        let err = Purger::new(&client, Collection::Likes, KeepPolicy::Nothing)
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::CursorStalled { cursor: 300, .. }));
        assert_eq!(*client.cursors.lock().unwrap(), vec![0, 300]);
        assert_eq!(client.destroyed.lock().unwrap().len(), 200);
    }

    #[tokio::test]
    async fn gather_reports_replayed_page() {
        let client = FakeClient::with_pages(vec![Ok(page(500, 301)), Ok(page(500, 101)), Ok(vec![])]);
        let err = gather(&client, Collection::Likes, 3).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::CursorStalled {
                cursor: 300,
                max_id: 500
            }
        ));
        assert_eq!(client.cursors.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn gather_collects_everything() {
        let client = FakeClient::with_pages(vec![Ok(page(500, 301)), Ok(page(300, 101))]);
        let items = gather(&client, Collection::Likes, 3).await.unwrap();
        assert_eq!(items.len(), 400);
    }

    #[test]
    fn age_policy() {
        let now = Utc.with_ymd_and_hms(2018, 10, 11, 20, 19, 24).unwrap();
        let policy = KeepPolicy::NewerThan {
            age: Duration::from_secs(60 * 60 * 36),
            now,
        };

        // item() is created exactly one day before `now`
        assert!(policy.keeps(&item(1)));

        let mut old = item(2);
        old.created_at = "Mon Oct 08 20:19:24 +0000 2018".into();
        assert!(!policy.keeps(&old));

        let mut garbled = item(3);
        garbled.created_at = "yesterday".into();
        assert!(policy.keeps(&garbled));

        let everything = KeepPolicy::NewerThan {
            age: Duration::ZERO,
            now,
        };
        assert!(!everything.keeps(&item(1)));
    }
}
