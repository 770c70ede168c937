//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring publish job for due scheduled posts.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use postdeck_db::ScheduledPostRow;
use postdeck_social::{PublishRequest, SocialApiClient};

/// Max due targets pulled per scheduler tick.
const PUBLISH_BATCH_SIZE: i64 = 100;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    social: Option<Arc<SocialApiClient>>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_publish_job(&scheduler, pool, social).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the every-minute publish job (`0 * * * * *`).
async fn register_publish_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    social: Option<Arc<SocialApiClient>>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async("0 * * * * *", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let social = social.clone();

        Box::pin(async move {
            let Some(social) = social else {
                tracing::debug!("scheduler: aggregator client not configured; skipping publish run");
                return;
            };
            publish_due_posts(&pool, &social).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Publishes every due pending target, then settles each post's status.
///
/// Failures are recorded per target and logged; nothing propagates out of
/// the job. A post ends up `published` when at least one of its targets went
/// out, `failed` only when every target failed.
pub async fn publish_due_posts(pool: &PgPool, social: &SocialApiClient) {
    let due = match postdeck_db::list_due_scheduled_posts(pool, Utc::now(), PUBLISH_BATCH_SIZE).await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "publish: failed to load due scheduled posts");
            return;
        }
    };

    if due.is_empty() {
        return;
    }

    tracing::info!(count = due.len(), "publish: processing due targets");

    let mut by_post: BTreeMap<i64, Vec<ScheduledPostRow>> = BTreeMap::new();
    for target in due {
        by_post.entry(target.post_id).or_default().push(target);
    }

    for (post_id, targets) in by_post {
        publish_post_targets(pool, social, post_id, &targets).await;
    }
}

/// Publish one post to all of its due targets and settle the post status.
async fn publish_post_targets(
    pool: &PgPool,
    social: &SocialApiClient,
    post_id: i64,
    targets: &[ScheduledPostRow],
) {
    let post = match postdeck_db::get_post_by_id(pool, post_id).await {
        Ok(Some(post)) => post,
        Ok(None) => {
            tracing::warn!(post_id, "publish: post row vanished; failing its targets");
            fail_all(pool, targets, "post no longer exists").await;
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, post_id, "publish: failed to load post");
            return;
        }
    };

    let Some(profile_id) = targets.iter().find_map(|t| t.aggregator_profile_id.clone()) else {
        fail_all(pool, targets, "brand has no aggregator profile").await;
        settle_post_status(pool, post_id, false).await;
        return;
    };

    let mut platforms: Vec<String> = targets.iter().map(|t| t.platform.clone()).collect();
    platforms.sort();
    platforms.dedup();

    let media_urls = json_string_array(&post.image_urls);
    let request = PublishRequest {
        body: post.body.clone(),
        platforms,
        media_urls,
    };

    let outcomes = match social.publish_post(&profile_id, &request).await {
        Ok(outcomes) => outcomes,
        Err(e) => {
            tracing::warn!(error = %e, post_id, "publish: aggregator call failed");
            fail_all(pool, targets, &e.to_string()).await;
            settle_post_status(pool, post_id, false).await;
            return;
        }
    };

    let mut any_sent = false;
    for target in targets {
        let outcome = outcomes.iter().find(|o| o.platform == target.platform);
        match outcome {
            Some(o) if o.success => {
                any_sent = true;
                if let Err(e) = postdeck_db::mark_target_sent(pool, target.id, o.post_id.as_deref()).await
                {
                    tracing::error!(error = %e, target_id = target.id, "publish: failed to mark target sent");
                }
            }
            Some(o) => {
                let reason = o.error.as_deref().unwrap_or("platform rejected the post");
                if let Err(e) = postdeck_db::mark_target_failed(pool, target.id, reason).await {
                    tracing::error!(error = %e, target_id = target.id, "publish: failed to mark target failed");
                }
            }
            None => {
                if let Err(e) = postdeck_db::mark_target_failed(
                    pool,
                    target.id,
                    "aggregator returned no outcome for this platform",
                )
                .await
                {
                    tracing::error!(error = %e, target_id = target.id, "publish: failed to mark target failed");
                }
            }
        }
    }

    settle_post_status(pool, post_id, any_sent).await;
}

async fn fail_all(pool: &PgPool, targets: &[ScheduledPostRow], reason: &str) {
    for target in targets {
        if let Err(e) = postdeck_db::mark_target_failed(pool, target.id, reason).await {
            tracing::error!(error = %e, target_id = target.id, "publish: failed to mark target failed");
        }
    }
}

async fn settle_post_status(pool: &PgPool, post_id: i64, any_sent: bool) {
    let status = if any_sent { "published" } else { "failed" };
    if let Err(e) = postdeck_db::set_post_status(pool, post_id, status).await {
        tracing::error!(error = %e, post_id, status, "publish: failed to settle post status");
    }
}

/// Extracts a JSONB array of strings, tolerating anything else as empty.
fn json_string_array(value: &serde_json::Value) -> Vec<String> {
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
