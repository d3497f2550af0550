use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use commerce_core::{Aggregate, AggregateRoot, DomainError, UserId};
use commerce_events::Event;

use crate::priority::{Priority, ServiceLevel};

commerce_core::aggregate_id!(ComplaintId);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintKind {
    ProductQuality,
    DeliveryDelay,
    WrongProduct,
    DamagedProduct,
    PoorService,
    BillingIssue,
    WebsiteBug,
    RefundDelay,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl ComplaintStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, ComplaintStatus::Resolved | ComplaintStatus::Closed)
    }
}

/// Aggregate root: Complaint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Complaint {
    id: ComplaintId,
    number: String,
    customer: Option<UserId>,
    order_number: Option<String>,
    kind: ComplaintKind,
    subject: String,
    description: String,
    priority: Priority,
    status: ComplaintStatus,
    assignee: Option<UserId>,
    service_level: Option<ServiceLevel>,
    opened_at: Option<DateTime<Utc>>,
    first_response_at: Option<DateTime<Utc>>,
    resolved_at: Option<DateTime<Utc>>,
    resolved_by: Option<UserId>,
    resolution: Option<String>,
    satisfaction_rating: Option<u8>,
    version: u64,
    created: bool,
}

impl Complaint {
    pub fn empty(id: ComplaintId) -> Self {
        Self {
            id,
            number: String::new(),
            customer: None,
            order_number: None,
            kind: ComplaintKind::Other,
            subject: String::new(),
            description: String::new(),
            priority: Priority::Medium,
            status: ComplaintStatus::Open,
            assignee: None,
            service_level: None,
            opened_at: None,
            first_response_at: None,
            resolved_at: None,
            resolved_by: None,
            resolution: None,
            satisfaction_rating: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ComplaintId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn customer(&self) -> Option<UserId> {
        self.customer
    }

    pub fn order_number(&self) -> Option<&str> {
        self.order_number.as_deref()
    }

    pub fn kind(&self) -> ComplaintKind {
        self.kind
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn status(&self) -> ComplaintStatus {
        self.status
    }

    pub fn assignee(&self) -> Option<UserId> {
        self.assignee
    }

    pub fn service_level(&self) -> Option<ServiceLevel> {
        self.service_level
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    pub fn first_response_at(&self) -> Option<DateTime<Utc>> {
        self.first_response_at
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn resolved_by(&self) -> Option<UserId> {
        self.resolved_by
    }

    pub fn resolution(&self) -> Option<&str> {
        self.resolution.as_deref()
    }

    pub fn satisfaction_rating(&self) -> Option<u8> {
        self.satisfaction_rating
    }

    /// Unresolved past its resolution deadline, or unanswered past its
    /// response deadline.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        if !self.created || self.status.is_finished() {
            return false;
        }
        let Some(sla) = self.service_level else {
            return false;
        };
        now > sla.resolution_due_at
            || (self.first_response_at.is_none() && now > sla.response_due_at)
    }
}

impl AggregateRoot for Complaint {
    type Id = ComplaintId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenComplaint {
    pub complaint_id: ComplaintId,
    /// `CMP` + `YYYYMMDD` + 4-digit daily sequence, issued by the caller.
    pub number: String,
    pub customer: UserId,
    pub order_number: Option<String>,
    pub kind: ComplaintKind,
    pub subject: String,
    pub description: String,
    pub priority: Priority,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignComplaint {
    pub complaint_id: ComplaintId,
    pub assignee: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondToComplaint {
    pub complaint_id: ComplaintId,
    pub responder: UserId,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveComplaint {
    pub complaint_id: ComplaintId,
    pub resolved_by: UserId,
    pub resolution: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseComplaint {
    pub complaint_id: ComplaintId,
    pub occurred_at: DateTime<Utc>,
}

/// Customer rates the resolution (1..=5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateResolution {
    pub complaint_id: ComplaintId,
    pub customer: UserId,
    pub rating: u8,
    pub feedback: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplaintCommand {
    Open(OpenComplaint),
    Assign(AssignComplaint),
    Respond(RespondToComplaint),
    Resolve(ResolveComplaint),
    Close(CloseComplaint),
    Rate(RateResolution),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintOpened {
    pub complaint_id: ComplaintId,
    pub number: String,
    pub customer: UserId,
    pub order_number: Option<String>,
    pub kind: ComplaintKind,
    pub subject: String,
    pub description: String,
    pub priority: Priority,
    pub service_level: ServiceLevel,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintAssigned {
    pub complaint_id: ComplaintId,
    pub assignee: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecorded {
    pub complaint_id: ComplaintId,
    pub responder: UserId,
    pub message: String,
    pub first_response: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintResolved {
    pub complaint_id: ComplaintId,
    pub resolved_by: UserId,
    pub resolution: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintClosed {
    pub complaint_id: ComplaintId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRated {
    pub complaint_id: ComplaintId,
    pub rating: u8,
    pub feedback: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplaintEvent {
    Opened(ComplaintOpened),
    Assigned(ComplaintAssigned),
    ResponseRecorded(ResponseRecorded),
    Resolved(ComplaintResolved),
    Closed(ComplaintClosed),
    Rated(ResolutionRated),
}

impl Event for ComplaintEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ComplaintEvent::Opened(_) => "support.complaint.opened",
            ComplaintEvent::Assigned(_) => "support.complaint.assigned",
            ComplaintEvent::ResponseRecorded(_) => "support.complaint.response_recorded",
            ComplaintEvent::Resolved(_) => "support.complaint.resolved",
            ComplaintEvent::Closed(_) => "support.complaint.closed",
            ComplaintEvent::Rated(_) => "support.complaint.rated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ComplaintEvent::Opened(e) => e.occurred_at,
            ComplaintEvent::Assigned(e) => e.occurred_at,
            ComplaintEvent::ResponseRecorded(e) => e.occurred_at,
            ComplaintEvent::Resolved(e) => e.occurred_at,
            ComplaintEvent::Closed(e) => e.occurred_at,
            ComplaintEvent::Rated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Complaint {
    type Command = ComplaintCommand;
    type Event = ComplaintEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ComplaintEvent::Opened(e) => {
                self.id = e.complaint_id;
                self.number = e.number.clone();
                self.customer = Some(e.customer);
                self.order_number = e.order_number.clone();
                self.kind = e.kind;
                self.subject = e.subject.clone();
                self.description = e.description.clone();
                self.priority = e.priority;
                self.status = ComplaintStatus::Open;
                self.service_level = Some(e.service_level);
                self.opened_at = Some(e.occurred_at);
                self.created = true;
            }
            ComplaintEvent::Assigned(e) => {
                self.assignee = Some(e.assignee);
                if self.status == ComplaintStatus::Open {
                    self.status = ComplaintStatus::InProgress;
                }
            }
            ComplaintEvent::ResponseRecorded(e) => {
                if e.first_response {
                    self.first_response_at = Some(e.occurred_at);
                }
                if self.status == ComplaintStatus::Open {
                    self.status = ComplaintStatus::InProgress;
                }
            }
            ComplaintEvent::Resolved(e) => {
                self.status = ComplaintStatus::Resolved;
                self.resolved_by = Some(e.resolved_by);
                self.resolution = Some(e.resolution.clone());
                self.resolved_at = Some(e.occurred_at);
            }
            ComplaintEvent::Closed(_) => {
                self.status = ComplaintStatus::Closed;
            }
            ComplaintEvent::Rated(e) => {
                self.satisfaction_rating = Some(e.rating);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ComplaintCommand::Open(cmd) => self.handle_open(cmd),
            ComplaintCommand::Assign(cmd) => {
                self.ensure_in_play(cmd.complaint_id)?;
                if self.assignee == Some(cmd.assignee) {
                    return Ok(vec![]);
                }
                Ok(vec![ComplaintEvent::Assigned(ComplaintAssigned {
                    complaint_id: cmd.complaint_id,
                    assignee: cmd.assignee,
                    occurred_at: cmd.occurred_at,
                })])
            }
            ComplaintCommand::Respond(cmd) => {
                self.ensure_in_play(cmd.complaint_id)?;
                if cmd.message.trim().is_empty() {
                    return Err(DomainError::validation("response message cannot be empty"));
                }
                Ok(vec![ComplaintEvent::ResponseRecorded(ResponseRecorded {
                    complaint_id: cmd.complaint_id,
                    responder: cmd.responder,
                    message: cmd.message.clone(),
                    first_response: self.first_response_at.is_none(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            ComplaintCommand::Resolve(cmd) => {
                self.ensure_in_play(cmd.complaint_id)?;
                if cmd.resolution.trim().is_empty() {
                    return Err(DomainError::validation("resolution cannot be empty"));
                }
                Ok(vec![ComplaintEvent::Resolved(ComplaintResolved {
                    complaint_id: cmd.complaint_id,
                    resolved_by: cmd.resolved_by,
                    resolution: cmd.resolution.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            ComplaintCommand::Close(cmd) => {
                self.ensure_exists(cmd.complaint_id)?;
                match self.status {
                    ComplaintStatus::Closed => Ok(vec![]),
                    ComplaintStatus::Resolved => Ok(vec![ComplaintEvent::Closed(ComplaintClosed {
                        complaint_id: cmd.complaint_id,
                        occurred_at: cmd.occurred_at,
                    })]),
                    _ => Err(DomainError::invariant("only resolved complaints can be closed")),
                }
            }
            ComplaintCommand::Rate(cmd) => {
                self.ensure_exists(cmd.complaint_id)?;
                if self.customer != Some(cmd.customer) {
                    return Err(DomainError::Unauthorized);
                }
                if !self.status.is_finished() {
                    return Err(DomainError::invariant("complaint has not been resolved yet"));
                }
                if !(1..=5).contains(&cmd.rating) {
                    return Err(DomainError::validation("rating must be between 1 and 5"));
                }
                Ok(vec![ComplaintEvent::Rated(ResolutionRated {
                    complaint_id: cmd.complaint_id,
                    rating: cmd.rating,
                    feedback: cmd.feedback.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Complaint {
    fn ensure_exists(&self, complaint_id: ComplaintId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("complaint"));
        }
        if self.id != complaint_id {
            return Err(DomainError::invariant("complaint_id mismatch"));
        }
        Ok(())
    }

    fn ensure_in_play(&self, complaint_id: ComplaintId) -> Result<(), DomainError> {
        self.ensure_exists(complaint_id)?;
        if self.status.is_finished() {
            return Err(DomainError::invariant(format!(
                "complaint {} is already {}",
                self.number,
                if self.status == ComplaintStatus::Closed { "closed" } else { "resolved" }
            )));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenComplaint) -> Result<Vec<ComplaintEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("complaint already exists"));
        }
        if cmd.number.trim().is_empty() {
            return Err(DomainError::validation("complaint number cannot be empty"));
        }
        let subject = cmd.subject.trim();
        if subject.is_empty() || subject.len() > 255 {
            return Err(DomainError::validation("subject must be 1 to 255 characters"));
        }
        if cmd.description.trim().is_empty() {
            return Err(DomainError::validation("description cannot be empty"));
        }

        Ok(vec![ComplaintEvent::Opened(ComplaintOpened {
            complaint_id: cmd.complaint_id,
            number: cmd.number.clone(),
            customer: cmd.customer,
            order_number: cmd.order_number.clone(),
            kind: cmd.kind,
            subject: subject.to_string(),
            description: cmd.description.clone(),
            priority: cmd.priority,
            service_level: ServiceLevel::for_priority(cmd.priority, cmd.occurred_at),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use commerce_events::execute;

    fn opened_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap()
    }

    fn open(priority: Priority) -> (Complaint, UserId) {
        let id = ComplaintId::generate();
        let customer = UserId::new();
        let mut complaint = Complaint::empty(id);
        let cmd = ComplaintCommand::Open(OpenComplaint {
            complaint_id: id,
            number: "CMP202610160001".into(),
            customer,
            order_number: Some("ORD202610150003".into()),
            kind: ComplaintKind::DamagedProduct,
            subject: "Mug arrived cracked".into(),
            description: "The handle was broken off.".into(),
            priority,
            occurred_at: opened_at(),
        });
        execute(&mut complaint, &cmd).unwrap();
        (complaint, customer)
    }

    fn resolve(complaint: &mut Complaint) {
        let cmd = ComplaintCommand::Resolve(ResolveComplaint {
            complaint_id: complaint.id_typed(),
            resolved_by: UserId::new(),
            resolution: "Replacement shipped".into(),
            occurred_at: opened_at() + Duration::hours(5),
        });
        execute(complaint, &cmd).unwrap();
    }

    #[test]
    fn opening_sets_deadlines_from_priority() {
        let (complaint, _) = open(Priority::Urgent);
        let sla = complaint.service_level().unwrap();

        assert_eq!(complaint.status(), ComplaintStatus::Open);
        assert_eq!(sla.response_due_at, opened_at() + Duration::hours(2));
        assert_eq!(sla.resolution_due_at, opened_at() + Duration::days(1));
    }

    #[test]
    fn assignment_moves_open_complaint_in_progress() {
        let (mut complaint, _) = open(Priority::Medium);
        let agent = UserId::new();
        let cmd = ComplaintCommand::Assign(AssignComplaint {
            complaint_id: complaint.id_typed(),
            assignee: agent,
            occurred_at: opened_at(),
        });
        execute(&mut complaint, &cmd).unwrap();

        assert_eq!(complaint.assignee(), Some(agent));
        assert_eq!(complaint.status(), ComplaintStatus::InProgress);
        assert!(execute(&mut complaint, &cmd).unwrap().is_empty());
    }

    #[test]
    fn only_the_first_response_is_stamped() {
        let (mut complaint, _) = open(Priority::High);
        for minutes in [30, 90] {
            let cmd = ComplaintCommand::Respond(RespondToComplaint {
                complaint_id: complaint.id_typed(),
                responder: UserId::new(),
                message: "Looking into it".into(),
                occurred_at: opened_at() + Duration::minutes(minutes),
            });
            execute(&mut complaint, &cmd).unwrap();
        }
        assert_eq!(complaint.first_response_at(), Some(opened_at() + Duration::minutes(30)));
    }

    #[test]
    fn overdue_when_unanswered_or_unresolved_past_deadline() {
        let (complaint, _) = open(Priority::Urgent);
        assert!(!complaint.is_overdue(opened_at() + Duration::hours(1)));
        assert!(complaint.is_overdue(opened_at() + Duration::hours(3)));

        let (mut answered, _) = open(Priority::Urgent);
        let cmd = ComplaintCommand::Respond(RespondToComplaint {
            complaint_id: answered.id_typed(),
            responder: UserId::new(),
            message: "On it".into(),
            occurred_at: opened_at() + Duration::hours(1),
        });
        execute(&mut answered, &cmd).unwrap();
        assert!(!answered.is_overdue(opened_at() + Duration::hours(3)));
        assert!(answered.is_overdue(opened_at() + Duration::days(2)));

        resolve(&mut answered);
        assert!(!answered.is_overdue(opened_at() + Duration::days(30)));
    }

    #[test]
    fn resolve_then_close_then_rate() {
        let (mut complaint, customer) = open(Priority::Low);
        resolve(&mut complaint);
        assert_eq!(complaint.status(), ComplaintStatus::Resolved);
        assert_eq!(complaint.resolution(), Some("Replacement shipped"));

        let close = ComplaintCommand::Close(CloseComplaint {
            complaint_id: complaint.id_typed(),
            occurred_at: opened_at() + Duration::days(1),
        });
        execute(&mut complaint, &close).unwrap();
        assert_eq!(complaint.status(), ComplaintStatus::Closed);

        let stranger = ComplaintCommand::Rate(RateResolution {
            complaint_id: complaint.id_typed(),
            customer: UserId::new(),
            rating: 5,
            feedback: None,
            occurred_at: opened_at() + Duration::days(1),
        });
        assert_eq!(complaint.handle(&stranger).unwrap_err(), DomainError::Unauthorized);

        let rate = ComplaintCommand::Rate(RateResolution {
            complaint_id: complaint.id_typed(),
            customer,
            rating: 4,
            feedback: Some("Quick fix".into()),
            occurred_at: opened_at() + Duration::days(1),
        });
        execute(&mut complaint, &rate).unwrap();
        assert_eq!(complaint.satisfaction_rating(), Some(4));
    }

    #[test]
    fn open_complaint_cannot_be_closed_and_resolved_cannot_be_reassigned() {
        let (mut complaint, _) = open(Priority::Medium);
        let close = ComplaintCommand::Close(CloseComplaint {
            complaint_id: complaint.id_typed(),
            occurred_at: opened_at(),
        });
        assert!(complaint.handle(&close).is_err());

        resolve(&mut complaint);
        let assign = ComplaintCommand::Assign(AssignComplaint {
            complaint_id: complaint.id_typed(),
            assignee: UserId::new(),
            occurred_at: opened_at(),
        });
        assert!(matches!(
            complaint.handle(&assign),
            Err(DomainError::InvariantViolation(_))
        ));
    }
}
