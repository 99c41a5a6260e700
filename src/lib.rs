//! Bulk removal of a Twitter account's likes and tweets.

pub mod config;
pub mod model;
pub mod paginate;
pub mod purge;
pub mod twitter;
