use crate::config::{ApiConfig, Credentials};
use crate::model::{Collection, Item};
use crate::twitter::error::{ApiError, ApiResult};
use crate::twitter::executor::{
    ApiRequest, Auth, Clock, Executor, RawResponse, ReqwestTransport, SystemClock, Transport,
};
use crate::twitter::oauth::{query_string, Params};
use crate::twitter::TwitterClient;
use async_trait::async_trait;
use maplit::hashmap;
use reqwest::Method;
use serde::Deserialize;

/// Client for the v1.1 REST API.
pub struct TwitterClientV1<T = ReqwestTransport, C = SystemClock> {
    executor: Executor<T, C>,
    api_url: String,
    page_size: u32,
    screen_name: Option<String>,
    read_auth: Auth,
}

#[derive(Deserialize)]
struct TwitterErrors {
    errors: Vec<TwitterErrorEntry>,
}

#[derive(Deserialize)]
struct TwitterErrorEntry {
    code: i64,
    message: String,
}

impl TwitterClientV1 {
    pub fn new(credentials: Credentials, config: &ApiConfig) -> ApiResult<Self> {
        Ok(Self::with_executor(
            Executor::from_config(credentials, config)?,
            config,
        ))
    }
}

impl<T: Transport, C: Clock> TwitterClientV1<T, C> {
    pub fn with_executor(executor: Executor<T, C>, config: &ApiConfig) -> Self {
        Self {
            executor,
            api_url: config.api_url.clone(),
            page_size: config.page_size,
            screen_name: None,
            read_auth: Auth::OAuth1,
        }
    }

    /// Read another account's collections. With a bearer token the listing
    /// calls use app-only auth.
    pub fn for_screen_name(mut self, screen_name: String, bearer: bool) -> Self {
        self.screen_name = Some(screen_name);
        if bearer {
            self.read_auth = Auth::Bearer;
        }
        self
    }

    pub fn executor(&self) -> &Executor<T, C> {
        &self.executor
    }

    fn request(&self, method: Method, resource: &str, params: Params, auth: Auth) -> ApiRequest {
        let mut endpoint = format!("{}{}.json", self.api_url, resource);
        if !params.is_empty() {
            endpoint.push('?');
            endpoint.push_str(&query_string(&params));
        }
        ApiRequest {
            method,
            endpoint,
            params,
            headers: vec![],
            body: None,
            auth,
        }
    }

    fn list_request(&self, collection: Collection, max_id: u64) -> ApiRequest {
        let mut params = hashmap! {
            "count".to_string() => self.page_size.to_string(),
        };
        let resource = match collection {
            Collection::Likes => {
                params.insert("include_entities".into(), "true".into());
                "favorites/list"
            }
            Collection::Tweets => {
                params.insert("include_rts".into(), "true".into());
                "statuses/user_timeline"
            }
        };
        if let Some(screen_name) = &self.screen_name {
            params.insert("screen_name".into(), screen_name.clone());
        }
        if max_id > 0 {
            params.insert("max_id".into(), max_id.to_string());
        }
        self.request(Method::GET, resource, params, self.read_auth)
    }

    fn destroy_request(&self, collection: Collection, id: u64) -> ApiRequest {
        match collection {
            Collection::Likes => self.request(
                Method::POST,
                "favorites/destroy",
                hashmap! { "id".to_string() => id.to_string() },
                Auth::OAuth1,
            ),
            Collection::Tweets => self.request(
                Method::POST,
                &format!("statuses/destroy/{id}"),
                Params::new(),
                Auth::OAuth1,
            ),
        }
    }
}

fn check_status(response: &RawResponse) -> ApiResult<()> {
    if response.is_success() {
        return Ok(());
    }
    let text = response.text();
    let message = match serde_json::from_str::<TwitterErrors>(&text) {
        Ok(errors) => errors
            .errors
            .iter()
            .map(|e| format!("{} (code {})", e.message, e.code))
            .collect::<Vec<_>>()
            .join("; "),
        Err(_) => text,
    };
    Err(ApiError::Status {
        status: response.status,
        message,
    })
}

#[async_trait]
impl<T: Transport, C: Clock> TwitterClient for TwitterClientV1<T, C> {
    async fn get_batch(&self, collection: Collection, max_id: u64) -> ApiResult<Vec<Item>> {
        let response = self
            .executor
            .execute(&self.list_request(collection, max_id))
            .await?;
        check_status(&response)?;
        let items = serde_json::from_slice::<Vec<Item>>(&response.body)?;
        Ok(items.into_iter().map(Item::with_url).collect())
    }

    async fn destroy(&self, collection: Collection, id: u64) -> ApiResult<()> {
        log::info!("Destroying {} {}", collection, id);
        let response = self
            .executor
            .execute(&self.destroy_request(collection, id))
            .await?;
        if response.status == 404 {
            return Err(ApiError::NotFound(id));
        }
        check_status(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twitter::executor::tests::{credentials, ok, FakeClock, FakeTransport};
    use reqwest::header::AUTHORIZATION;

    fn client(responses: Vec<RawResponse>) -> TwitterClientV1<FakeTransport, FakeClock> {
        let config = ApiConfig::default().with_api_url("https://api.example.com/1.1");
        let executor = Executor::new(
            credentials(),
            FakeTransport::with(responses),
            FakeClock::at(1_700_000_000),
            None,
        );
        TwitterClientV1::with_executor(executor, &config)
    }

    fn status(code: u16, body: &str) -> RawResponse {
        RawResponse {
            status: code,
            ..ok(body)
        }
    }

    const PAGE: &str = r#"[
        {"id": 20, "created_at": "Wed Oct 10 20:19:24 +0000 2018",
         "user": {"id": 1, "screen_name": "alice", "name": "Alice", "following": true}},
        {"id": 10, "created_at": "Tue Oct 09 20:19:24 +0000 2018",
         "user": {"id": 2, "screen_name": "bob", "name": "Bob", "following": false}}
    ]"#;

    #[tokio::test]
    async fn first_likes_page_has_no_cursor() {
        let client = client(vec![ok(PAGE)]);
        let items = client.get_batch(Collection::Likes, 0).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://twitter.com/alice/status/20");
        assert!(items[0].user.following);

        let sent = client.executor().transport().sent();
        assert_eq!(sent[0].method, Method::GET);
        assert!(sent[0]
            .url
            .starts_with("https://api.example.com/1.1/favorites/list.json?"));
        assert!(sent[0].url.contains("count=200"));
        assert!(sent[0].url.contains("include_entities=true"));
        assert!(!sent[0].url.contains("max_id"));
        let auth = sent[0].headers.get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert!(auth.starts_with("OAuth "));
    }

    #[tokio::test]
    async fn tweets_page_passes_cursor() {
        let client = client(vec![ok("[]")]);
        let items = client.get_batch(Collection::Tweets, 299).await.unwrap();
        assert!(items.is_empty());
        let url = &client.executor().transport().sent()[0].url;
        assert!(url.starts_with("https://api.example.com/1.1/statuses/user_timeline.json?"));
        assert!(url.contains("max_id=299"));
    }

    #[tokio::test]
    async fn malformed_page_is_decode_error() {
        let client = client(vec![ok(r#"{"unexpected": true}"#)]);
        let err = client.get_batch(Collection::Likes, 0).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn error_status_carries_twitter_message() {
        let body = r#"{"errors":[{"code":32,"message":"Could not authenticate you."}]}"#;
        let client = client(vec![status(401, body)]);
        match client.get_batch(Collection::Likes, 0).await.unwrap_err() {
            ApiError::Status { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Could not authenticate you. (code 32)");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn destroy_like_posts_id() {
        let client = client(vec![ok("{}")]);
        client.destroy(Collection::Likes, 42).await.unwrap();
        let sent = client.executor().transport().sent();
        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(
            sent[0].url,
            "https://api.example.com/1.1/favorites/destroy.json?id=42"
        );
    }

    #[tokio::test]
    async fn destroy_tweet_uses_id_path() {
        let client = client(vec![ok("{}")]);
        client.destroy(Collection::Tweets, 42).await.unwrap();
        let sent = client.executor().transport().sent();
        assert_eq!(
            sent[0].url,
            "https://api.example.com/1.1/statuses/destroy/42.json"
        );
    }

    #[tokio::test]
    async fn destroying_missing_item_is_not_found() {
        let body = r#"{"errors":[{"code":144,"message":"No status found with that ID."}]}"#;
        let client = client(vec![status(404, body)]);
        let err = client.destroy(Collection::Likes, 7).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn screen_name_with_bearer_uses_app_auth() {
        let client = client(vec![ok("[]")]).for_screen_name("alice".into(), true);
        client.get_batch(Collection::Likes, 0).await.unwrap();
        let sent = client.executor().transport().sent();
        assert!(sent[0].url.contains("screen_name=alice"));
        assert_eq!(
            sent[0].headers.get(AUTHORIZATION).unwrap().to_str().unwrap(),
            "Bearer bt"
        );
    }
}
