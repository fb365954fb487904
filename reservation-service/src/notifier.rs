use anyhow::Result;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use std::time::Duration;
use tokio::time;
use tracing::{error, info};
use crate::models::*;
use crate::schema::*;

type DbPool = Pool<AsyncPgConnection>;

const BATCH_SIZE: i64 = 100;

/// Drains queued customer notifications. Delivery is a log line; the row is
/// then marked `sent`.
pub struct NotificationDispatcher {
    pool: DbPool,
    interval: Duration,
}

impl NotificationDispatcher {
    pub fn new(pool: DbPool, interval: Duration) -> Self {
        Self { pool, interval }
    }

    pub async fn run(&self) {
        let mut interval = time::interval(self.interval);

        loop {
            interval.tick().await;

            if let Err(e) = self.dispatch_pending().await {
                error!("Error dispatching notifications: {:#}", e);
            }
        }
    }

    async fn dispatch_pending(&self) -> Result<()> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now();

        let pending = notification_logs::table
            .filter(notification_logs::status.eq("pending"))
            .filter(
                notification_logs::scheduled_at
                    .is_null()
                    .or(notification_logs::scheduled_at.le(now)),
            )
            .order(notification_logs::created_at.asc())
            .limit(BATCH_SIZE)
            .load::<NotificationLogRow>(&mut conn)
            .await?;

        for notification in pending {
            info!(
                notification_id = %notification.id,
                channel = %notification.channel,
                recipient = %notification.recipient,
                subject = %notification.subject,
                "delivering notification"
            );

            let sent_at = Utc::now();
            let updated = diesel::update(notification_logs::table.find(notification.id))
                .set((
                    notification_logs::status.eq("sent"),
                    notification_logs::sent_at.eq(Some(sent_at)),
                    notification_logs::updated_at.eq(sent_at),
                ))
                .execute(&mut conn)
                .await;

            if let Err(e) = updated {
                error!("Failed to mark notification {} as sent: {}", notification.id, e);
                continue;
            }
        }

        Ok(())
    }
}
