use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use commerce_core::UserId;
use commerce_events::EventEnvelope;
use commerce_support::{Complaint, ComplaintId};

use crate::projections::ProjectionError;
use crate::projections::mirror::AggregateMirror;

#[derive(Debug, Default)]
pub struct ComplaintsProjection {
    complaints: AggregateMirror<Complaint>,
}

impl ComplaintsProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, complaint_id: ComplaintId) -> Option<Complaint> {
        self.complaints.get(complaint_id.aggregate_id())
    }

    /// A customer's complaints, newest first.
    pub fn list_for(&self, customer: UserId) -> Vec<Complaint> {
        let mut items: Vec<_> = self
            .complaints
            .list()
            .into_iter()
            .filter(|c| c.customer() == Some(customer))
            .collect();
        items.sort_by(|a, b| b.opened_at().cmp(&a.opened_at()));
        items
    }

    /// Support queue: most urgent first, then oldest.
    pub fn list_all(&self) -> Vec<Complaint> {
        let mut items = self.complaints.list();
        items.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.opened_at().cmp(&b.opened_at()))
        });
        items
    }

    pub fn overdue(&self, now: DateTime<Utc>) -> Vec<Complaint> {
        self.list_all()
            .into_iter()
            .filter(|c| c.is_overdue(now))
            .collect()
    }

    /// Every complaint number issued so far (seeds the numbering on start).
    pub fn numbers(&self) -> Vec<String> {
        self.complaints
            .list()
            .into_iter()
            .map(|c| c.number().to_string())
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        self.complaints.apply_envelope(envelope)
    }

    pub fn reset(&self) {
        self.complaints.reset();
    }
}
