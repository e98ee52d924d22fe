use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::event::{Event, EventId};

use super::{Campaign, CampaignStatus};

/// Characters removed from a subject when deriving event names.
pub const STRIPPED_PUNCTUATION: &[char] = &[
    '!', '"', '#', '$', '%', '&', '\'', '(', ')', '*', '+', ',', '.', '/', ':', ';', '<', '=',
    '>', '?', '@', '[', '\\', ']', '^', '`', '{', '|', '}', '~',
];

/// Lower-cases `subject`, drops [`STRIPPED_PUNCTUATION`] and turns spaces
/// into hyphens. `"Hello, World!"` becomes `"hello-world"`.
pub fn slugify(subject: &str) -> String {
    subject
        .to_lowercase()
        .chars()
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .map(|c| if c == ' ' { '-' } else { c })
        .collect()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeliveryEventKind {
    Delivered,
    Opened,
}

impl DeliveryEventKind {
    pub const ALL: [DeliveryEventKind; 2] = [DeliveryEventKind::Delivered, DeliveryEventKind::Opened];

    pub fn suffix(self) -> &'static str {
        match self {
            DeliveryEventKind::Delivered => "delivered",
            DeliveryEventKind::Opened => "opened",
        }
    }

    pub fn event_name(self, subject: &str) -> String {
        format!("{}-{}", slugify(subject), self.suffix())
    }
}

impl Campaign {
    /// Recipients may only change before the campaign is delivered.
    pub fn ensure_editable(&self) -> Result<(), Error> {
        match self.status {
            CampaignStatus::Draft => Ok(()),
            CampaignStatus::Delivered => Err(Error::CampaignAlreadyDelivered {
                campaign_id: self.id,
            }),
        }
    }

    /// Checks the DRAFT to DELIVERED transition without performing it.
    pub fn ensure_deliverable(&self) -> Result<(), Error> {
        self.ensure_editable()?;

        if self.recipient_ids.is_empty() {
            return Err(Error::CampaignHasNoRecipients {
                campaign_id: self.id,
            });
        }

        Ok(())
    }

    /// Applies the DRAFT to DELIVERED transition to this copy.
    pub fn deliver(&mut self, delivered_at: DateTime<Utc>) {
        self.status = CampaignStatus::Delivered;
        self.delivered_at = Some(delivered_at);
        self.modified_at = delivered_at;
    }

    /// The analytics events recorded when this campaign is delivered.
    pub fn delivery_events(&self, now: DateTime<Utc>) -> Vec<Event> {
        DeliveryEventKind::ALL
            .iter()
            .map(|kind| Event {
                id: EventId::new(),
                project_id: self.project_id,
                campaign_id: self.id,
                name: kind.event_name(&self.subject),
                created_at: now,
            })
            .collect()
    }
}
