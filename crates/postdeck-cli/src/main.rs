//! Operational command line for Postdeck: migrations, plan seeding, and
//! one-shot runs of the background work the server normally schedules.

use clap::{Parser, Subcommand};

use postdeck_social::{PublishRequest, SocialApiClient};

#[derive(Debug, Parser)]
#[command(name = "postdeck-cli")]
#[command(about = "Postdeck operations command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run pending database migrations.
    Migrate,
    /// Upsert subscription plans from the plans config file.
    SeedPlans,
    /// Re-sync connected accounts from the aggregator for every brand.
    SyncAccounts,
    /// Publish every due scheduled post once and exit.
    PublishDue,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = postdeck_core::load_app_config()?;
    let pool_config = postdeck_db::PoolConfig::from_app_config(&config);
    let pool = postdeck_db::connect_pool(&config.database_url, pool_config).await?;

    match cli.command {
        Commands::Migrate => {
            let applied = postdeck_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::SeedPlans => {
            let seeds = postdeck_core::load_plan_seeds(&config.plans_path)?;
            let count = postdeck_db::seed_plans(&pool, &seeds).await?;
            println!("seeded {count} plan(s) from {}", config.plans_path.display());
        }
        Commands::SyncAccounts => {
            let social = require_social_client(&config)?;
            let (brands, accounts) = sync_all_brands(&pool, &social).await?;
            println!("synced {accounts} account(s) across {brands} brand(s)");
        }
        Commands::PublishDue => {
            let social = require_social_client(&config)?;
            let (sent, failed) = publish_due_once(&pool, &social).await?;
            println!("published {sent} target(s), {failed} failed");
        }
    }

    Ok(())
}

fn require_social_client(config: &postdeck_core::AppConfig) -> anyhow::Result<SocialApiClient> {
    let Some(key) = config.social_api_key.as_deref() else {
        anyhow::bail!("POSTDECK_SOCIAL_API_KEY is not set");
    };
    Ok(SocialApiClient::with_base_url(
        key,
        config.social_request_timeout_secs,
        config.social_max_retries,
        &config.social_api_base_url,
    )?)
}

/// Walks every active brand with an aggregator profile and reconciles its
/// account list. Brands without a profile are skipped, not failed.
async fn sync_all_brands(
    pool: &sqlx::PgPool,
    social: &SocialApiClient,
) -> anyhow::Result<(usize, usize)> {
    let brands = postdeck_db::list_all_active_brands(pool).await?;
    let mut brand_count = 0usize;
    let mut account_count = 0usize;

    for brand in brands {
        let Some(profile_id) = brand.aggregator_profile_id.as_deref() else {
            tracing::debug!(brand_id = brand.id, slug = %brand.slug, "no aggregator profile; skipping");
            continue;
        };
        let accounts = match social.list_accounts(profile_id).await {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::warn!(error = %e, brand_id = brand.id, slug = %brand.slug, "account sync failed");
                continue;
            }
        };
        for account in &accounts {
            postdeck_db::upsert_social_account(
                pool,
                brand.id,
                &account.platform,
                &account.id,
                account.display_name.as_deref(),
                &account.metadata,
                false,
            )
            .await?;
        }
        brand_count += 1;
        account_count += accounts.len();
    }

    Ok((brand_count, account_count))
}

const PUBLISH_BATCH_SIZE: i64 = 500;

/// One pass over due pending targets: each target is published on its own
/// platform and the owning post settles to `published` if anything went out.
async fn publish_due_once(
    pool: &sqlx::PgPool,
    social: &SocialApiClient,
) -> anyhow::Result<(usize, usize)> {
    let due =
        postdeck_db::list_due_scheduled_posts(pool, chrono::Utc::now(), PUBLISH_BATCH_SIZE).await?;
    let mut sent = 0usize;
    let mut failed = 0usize;
    let mut touched_posts: Vec<i64> = Vec::new();

    for target in due {
        touched_posts.push(target.post_id);

        let Some(profile_id) = target.aggregator_profile_id.as_deref() else {
            postdeck_db::mark_target_failed(pool, target.id, "brand has no aggregator profile")
                .await?;
            failed += 1;
            continue;
        };
        let Some(post) = postdeck_db::get_post_by_id(pool, target.post_id).await? else {
            postdeck_db::mark_target_failed(pool, target.id, "post no longer exists").await?;
            failed += 1;
            continue;
        };

        let request = PublishRequest {
            body: post.body.clone(),
            platforms: vec![target.platform.clone()],
            media_urls: string_array(&post.image_urls),
        };
        match social.publish_post(profile_id, &request).await {
            Ok(outcomes) => {
                let outcome = outcomes.iter().find(|o| o.platform == target.platform);
                match outcome {
                    Some(o) if o.success => {
                        postdeck_db::mark_target_sent(pool, target.id, o.post_id.as_deref())
                            .await?;
                        sent += 1;
                    }
                    Some(o) => {
                        let reason = o.error.as_deref().unwrap_or("platform rejected the post");
                        postdeck_db::mark_target_failed(pool, target.id, reason).await?;
                        failed += 1;
                    }
                    None => {
                        postdeck_db::mark_target_failed(
                            pool,
                            target.id,
                            "aggregator returned no outcome for this platform",
                        )
                        .await?;
                        failed += 1;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, target_id = target.id, "publish failed");
                postdeck_db::mark_target_failed(pool, target.id, &e.to_string()).await?;
                failed += 1;
            }
        }
    }

    touched_posts.sort_unstable();
    touched_posts.dedup();
    for post_id in touched_posts {
        settle_post(pool, post_id).await?;
    }

    Ok((sent, failed))
}

/// Settles a post that had due targets this pass: `published` if any target
/// is sent, `failed` once every target has failed, untouched while some are
/// still pending.
async fn settle_post(pool: &sqlx::PgPool, post_id: i64) -> anyhow::Result<()> {
    let targets = postdeck_db::list_targets_for_post(pool, post_id).await?;
    if targets.iter().any(|t| t.status == "pending") {
        return Ok(());
    }
    let status = if targets.iter().any(|t| t.status == "sent") {
        "published"
    } else {
        "failed"
    };
    postdeck_db::set_post_status(pool, post_id, status).await?;
    Ok(())
}

fn string_array(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(ToOwned::to_owned))
                .collect()
        })
        .unwrap_or_default()
}
