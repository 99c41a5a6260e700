use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};

/// Twitter's v1.1 `created_at` layout, e.g. `Wed Oct 10 20:19:24 +0000 2018`
pub const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub screen_name: String,
    #[serde(default)]
    pub name: String,
    /// Whether the authenticated user follows this account
    #[serde(default, deserialize_with = "null_as_false")]
    pub following: bool,
}

/// A tweet or a liked tweet.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: u64,
    pub created_at: String,
    pub user: User,
    #[serde(skip_deserializing)]
    pub url: String,
}

impl Item {
    pub fn with_url(mut self) -> Self {
        self.url = format!(
            "https://twitter.com/{}/status/{}",
            self.user.screen_name, self.id
        );
        self
    }

    pub fn created_at(&self) -> chrono::ParseResult<DateTime<FixedOffset>> {
        DateTime::parse_from_str(&self.created_at, CREATED_AT_FORMAT)
    }
}

/// Which of the caller's collections to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Likes,
    Tweets,
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Collection::Likes => write!(f, "likes"),
            Collection::Tweets => write!(f, "tweets"),
        }
    }
}

// Twitter sends `"following": null` for accounts with no relationship
fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}
