//! Turns a recipient list into delivery tasks spread out over time.
//!
//! Recipients are sent in batches of [`BATCH_SIZE`], one batch per minute,
//! which keeps the outbound rate under the email provider's limits without
//! a live rate limiter. Every recipient is delayed by at least one minute
//! past the requested initial delay.

use chrono::{DateTime, Duration, Utc};

use crate::contact::ContactId;
use crate::task::{DeliveryTask, TaskId};

use super::CampaignId;

pub const BATCH_SIZE: usize = 80;

/// Minutes from now at which the recipient at `index` is sent.
pub fn delay_for(index: usize, batch_size: usize, initial_delay: u32) -> i64 {
    i64::from(initial_delay) + 1 + (index / batch_size) as i64
}

/// Plans one task per recipient, in recipient order.
pub fn plan_deliveries(
    campaign_id: CampaignId,
    recipients: &[ContactId],
    initial_delay: u32,
    now: DateTime<Utc>,
) -> Vec<DeliveryTask> {
    recipients
        .iter()
        .enumerate()
        .map(|(index, contact_id)| DeliveryTask {
            id: TaskId::new(),
            campaign_id,
            contact_id: *contact_id,
            run_by: now + Duration::minutes(delay_for(index, BATCH_SIZE, initial_delay)),
            created_at: now,
        })
        .collect()
}
