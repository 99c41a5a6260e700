use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use untweet::config::{ApiConfig, CredentialSource, DEFAULT_API_URL};
use untweet::model::Collection;
use untweet::purge::{gather, KeepPolicy, Purger};
use untweet::twitter::v1::TwitterClientV1;
use untweet::twitter::TwitterClient;

#[derive(Parser, Debug)]
#[clap(version, about = "Destroy or dump your tweets and likes")]
struct Args {
    /// Twitter API consumer key
    #[clap(long, env = "TWITTER_API_KEY", hide_env_values = true)]
    key: Option<String>,
    /// Twitter API consumer secret
    #[clap(long, env = "TWITTER_API_KEY_SECRET", hide_env_values = true)]
    key_secret: Option<String>,
    /// Twitter API access token
    #[clap(long, env = "TWITTER_API_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Twitter API access token secret
    #[clap(long, env = "TWITTER_API_TOKEN_SECRET", hide_env_values = true)]
    token_secret: Option<String>,
    /// App-only bearer token, used when dumping another account
    #[clap(long, env = "TWITTER_BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,
    /// JSON file holding any credentials not given as flags or environment
    #[clap(short, long)]
    auth: Option<PathBuf>,
    #[clap(long, default_value = DEFAULT_API_URL)]
    api_url: String,
    /// Give up after waiting out this many rate limits for one request
    #[clap(long)]
    max_rate_limit_waits: Option<u32>,
    /// Stop after this many consecutive failed page fetches
    #[clap(long, default_value_t = 3)]
    max_page_failures: u32,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Dump likes or tweets to stdout as JSON
    Dump {
        #[clap(long)]
        likes: bool,
        #[clap(long)]
        tweets: bool,
        /// Dump this account instead of the authenticated one
        #[clap(long)]
        screen_name: Option<String>,
    },
    /// Destroy likes
    Likes {
        /// Don't destroy likes of tweets from people you follow
        #[clap(long)]
        keep_following: bool,
    },
    /// Destroy tweets
    Tweets {
        /// Only destroy tweets older than this (30m, 24h, 48h, etc..)
        #[clap(long, default_value = "0s", parse(try_from_str = humantime::parse_duration))]
        older: Duration,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Args = Args::parse();
    let config = ApiConfig {
        max_rate_limit_waits: args.max_rate_limit_waits,
        max_page_failures: args.max_page_failures,
        ..Default::default()
    }
    .with_api_url(&args.api_url);

    // Configuration problems are fatal and reported before any request
    let client = match build_client(&args, &config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(args.command, &client, config.max_page_failures).await {
        log::error!("{:#}", e);
    }
}

fn build_client(args: &Args, config: &ApiConfig) -> anyhow::Result<TwitterClientV1> {
    let mut source = CredentialSource {
        consumer_key: args.key.clone(),
        consumer_secret: args.key_secret.clone(),
        access_token: args.token.clone(),
        access_token_secret: args.token_secret.clone(),
        bearer_token: args.bearer_token.clone(),
    };
    if let Some(path) = &args.auth {
        source = source.or(CredentialSource::from_file(path)?);
    }
    let credentials = source.resolve()?;
    let bearer = credentials.bearer_token.is_some();

    let client =
        TwitterClientV1::new(credentials, config).context("Unable to create HTTP client")?;
    Ok(match &args.command {
        Command::Dump {
            screen_name: Some(screen_name),
            ..
        } => client.for_screen_name(screen_name.clone(), bearer),
        _ => client,
    })
}

async fn run(
    command: Command,
    client: &dyn TwitterClient,
    max_page_failures: u32,
) -> anyhow::Result<()> {
    match command {
        Command::Dump { likes, tweets, .. } => {
            if !likes && !tweets {
                log::warn!("Nothing to dump, pass --likes and/or --tweets");
            }
            if likes {
                dump(client, Collection::Likes, max_page_failures).await?;
            }
            if tweets {
                dump(client, Collection::Tweets, max_page_failures).await?;
            }
        }
        Command::Likes { keep_following } => {
            let (prompt, policy) = if keep_following {
                ("Unlike tweets from people you don't follow?", KeepPolicy::Followed)
            } else {
                ("Unlike ALL tweets?", KeepPolicy::Nothing)
            };
            if confirm(prompt)? {
                purge(client, Collection::Likes, policy, max_page_failures).await?;
            }
        }
        Command::Tweets { older } => {
            let prompt = format!(
                "Destroy all of your tweets older than {}?",
                humantime::format_duration(older)
            );
            if confirm(&prompt)? {
                let policy = KeepPolicy::newer_than(older);
                purge(client, Collection::Tweets, policy, max_page_failures).await?;
            }
        }
    }
    Ok(())
}

async fn dump(
    client: &dyn TwitterClient,
    collection: Collection,
    max_page_failures: u32,
) -> anyhow::Result<()> {
    let items = gather(client, collection, max_page_failures)
        .await
        .with_context(|| format!("Unable to gather {}", collection))?;
    let output = serde_json::to_string(&items).context("Unable to serialize")?;
    println!("{}", output);
    Ok(())
}

async fn purge(
    client: &dyn TwitterClient,
    collection: Collection,
    policy: KeepPolicy,
    max_page_failures: u32,
) -> anyhow::Result<()> {
    let summary = Purger::new(client, collection, policy)
        .max_page_failures(max_page_failures)
        .run()
        .await
        .with_context(|| format!("Stopped destroying {}", collection))?;
    log::info!(
        "Finished {}: {} destroyed, {} already gone, {} kept, {} failed",
        collection,
        summary.deleted,
        summary.already_gone,
        summary.kept,
        summary.failed
    );
    Ok(())
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y"))
}
