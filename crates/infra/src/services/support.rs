use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use commerce_cart::Owner;
use commerce_core::{DomainError, UserId};
use commerce_support::{
    AssignComplaint, CloseComplaint, Complaint, ComplaintCommand, ComplaintId, ComplaintKind,
    ComplaintStatus, OpenComplaint, Priority, RateResolution, ResolveComplaint,
    RespondToComplaint, ServiceLevel,
};

use super::{CommerceServices, ServiceError, ServiceResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewComplaint {
    #[serde(default)]
    pub order_number: Option<String>,
    pub kind: ComplaintKind,
    pub subject: String,
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplaintView {
    pub complaint_id: ComplaintId,
    pub number: String,
    pub customer: Option<UserId>,
    pub order_number: Option<String>,
    pub kind: ComplaintKind,
    pub subject: String,
    pub description: String,
    pub priority: Priority,
    pub status: ComplaintStatus,
    pub assignee: Option<UserId>,
    pub service_level: Option<ServiceLevel>,
    pub opened_at: Option<DateTime<Utc>>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
    pub satisfaction_rating: Option<u8>,
    pub overdue: bool,
}

impl ComplaintView {
    fn at(complaint: &Complaint, now: DateTime<Utc>) -> Self {
        Self {
            complaint_id: complaint.id_typed(),
            number: complaint.number().to_string(),
            customer: complaint.customer(),
            order_number: complaint.order_number().map(str::to_string),
            kind: complaint.kind(),
            subject: complaint.subject().to_string(),
            description: complaint.description().to_string(),
            priority: complaint.priority(),
            status: complaint.status(),
            assignee: complaint.assignee(),
            service_level: complaint.service_level(),
            opened_at: complaint.opened_at(),
            first_response_at: complaint.first_response_at(),
            resolved_at: complaint.resolved_at(),
            resolution: complaint.resolution().map(str::to_string),
            satisfaction_rating: complaint.satisfaction_rating(),
            overdue: complaint.is_overdue(now),
        }
    }
}

impl CommerceServices {
    /// File a complaint. A referenced order must have been placed by the
    /// same customer.
    #[tracing::instrument(skip_all, fields(%customer))]
    pub fn open_complaint(
        &self,
        customer: UserId,
        input: NewComplaint,
        now: DateTime<Utc>,
    ) -> ServiceResult<ComplaintView> {
        let order_number = input
            .order_number
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if let Some(number) = order_number.as_deref() {
            if self.owned_order_by_number(&Owner::User(customer), number).is_none() {
                return Err(DomainError::not_found(format!("order {number}")).into());
            }
        }

        let _writer = self.lock_writer()?;
        let mut numbers = self
            .complaint_numbers
            .lock()
            .map_err(|_| ServiceError::LockPoisoned)?;
        let mut next_numbers = numbers.clone();
        let number = next_numbers.next(now)?;

        let complaint_id = ComplaintId::generate();
        let mut uow = self.unit_of_work();
        let mut complaint: Complaint = uow.load(complaint_id.aggregate_id())?;
        let command = ComplaintCommand::Open(OpenComplaint {
            complaint_id,
            number: number.clone(),
            customer,
            order_number,
            kind: input.kind,
            subject: input.subject,
            description: input.description,
            priority: input.priority,
            occurred_at: now,
        });
        uow.execute(&mut complaint, &command)?;
        self.commit(uow)?;
        *numbers = next_numbers;

        tracing::info!(%complaint_id, %number, priority = ?complaint.priority(), "complaint opened");
        Ok(ComplaintView::at(&complaint, now))
    }

    pub fn assign_complaint(
        &self,
        complaint_id: ComplaintId,
        assignee: UserId,
        now: DateTime<Utc>,
    ) -> ServiceResult<ComplaintView> {
        let command = ComplaintCommand::Assign(AssignComplaint {
            complaint_id,
            assignee,
            occurred_at: now,
        });
        let complaint = self.execute_one::<Complaint>(complaint_id.aggregate_id(), &command)?;
        Ok(ComplaintView::at(&complaint, now))
    }

    pub fn respond_to_complaint(
        &self,
        complaint_id: ComplaintId,
        responder: UserId,
        message: String,
        now: DateTime<Utc>,
    ) -> ServiceResult<ComplaintView> {
        let command = ComplaintCommand::Respond(RespondToComplaint {
            complaint_id,
            responder,
            message,
            occurred_at: now,
        });
        let complaint = self.execute_one::<Complaint>(complaint_id.aggregate_id(), &command)?;
        Ok(ComplaintView::at(&complaint, now))
    }

    #[tracing::instrument(skip_all, fields(%complaint_id))]
    pub fn resolve_complaint(
        &self,
        complaint_id: ComplaintId,
        resolved_by: UserId,
        resolution: String,
        now: DateTime<Utc>,
    ) -> ServiceResult<ComplaintView> {
        let command = ComplaintCommand::Resolve(ResolveComplaint {
            complaint_id,
            resolved_by,
            resolution,
            occurred_at: now,
        });
        let complaint = self.execute_one::<Complaint>(complaint_id.aggregate_id(), &command)?;
        tracing::info!(number = complaint.number(), overdue = complaint.is_overdue(now), "complaint resolved");
        Ok(ComplaintView::at(&complaint, now))
    }

    pub fn close_complaint(&self, complaint_id: ComplaintId, now: DateTime<Utc>) -> ServiceResult<ComplaintView> {
        let command = ComplaintCommand::Close(CloseComplaint {
            complaint_id,
            occurred_at: now,
        });
        let complaint = self.execute_one::<Complaint>(complaint_id.aggregate_id(), &command)?;
        Ok(ComplaintView::at(&complaint, now))
    }

    pub fn rate_complaint(
        &self,
        customer: UserId,
        complaint_id: ComplaintId,
        rating: u8,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> ServiceResult<ComplaintView> {
        let command = ComplaintCommand::Rate(RateResolution {
            complaint_id,
            customer,
            rating,
            feedback,
            occurred_at: now,
        });
        let complaint = self.execute_one::<Complaint>(complaint_id.aggregate_id(), &command)?;
        Ok(ComplaintView::at(&complaint, now))
    }

    pub fn complaint(&self, complaint_id: ComplaintId, now: DateTime<Utc>) -> Option<ComplaintView> {
        self.projections
            .complaints
            .get(complaint_id)
            .map(|c| ComplaintView::at(&c, now))
    }

    /// A complaint as seen by its customer; anyone else gets not-found.
    pub fn customer_complaint(
        &self,
        customer: UserId,
        complaint_id: ComplaintId,
        now: DateTime<Utc>,
    ) -> ServiceResult<ComplaintView> {
        self.complaint(complaint_id, now)
            .filter(|c| c.customer == Some(customer))
            .ok_or_else(|| DomainError::not_found(format!("complaint {complaint_id}")).into())
    }

    pub fn complaints_for(&self, customer: UserId, now: DateTime<Utc>) -> Vec<ComplaintView> {
        self.projections
            .complaints
            .list_for(customer)
            .iter()
            .map(|c| ComplaintView::at(c, now))
            .collect()
    }

    pub fn complaint_queue(&self, now: DateTime<Utc>) -> Vec<ComplaintView> {
        self.projections
            .complaints
            .list_all()
            .iter()
            .map(|c| ComplaintView::at(c, now))
            .collect()
    }

    pub fn overdue_complaints(&self, now: DateTime<Utc>) -> Vec<ComplaintView> {
        self.projections
            .complaints
            .overdue(now)
            .iter()
            .map(|c| ComplaintView::at(c, now))
            .collect()
    }
}
