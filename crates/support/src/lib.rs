//! Customer complaints with priority-based response and resolution deadlines.

pub mod complaint;
pub mod priority;

pub use complaint::{
    AssignComplaint, CloseComplaint, Complaint, ComplaintAssigned, ComplaintClosed,
    ComplaintCommand, ComplaintEvent, ComplaintId, ComplaintKind, ComplaintOpened,
    ComplaintResolved, ComplaintStatus, OpenComplaint, RateResolution, ResolutionRated,
    ResolveComplaint, RespondToComplaint, ResponseRecorded,
};
pub use priority::{Priority, ServiceLevel};
