//! `commerce-core` — domain foundation building blocks.
//!
//! Ids, money, addresses, record status and the aggregate traits every
//! commerce module builds on. No IO lives here.

pub mod address;
pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod sequence;
pub mod status;
pub mod value_object;

pub use address::Address;
pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, SessionKey, UserId};
pub use money::Money;
pub use sequence::DailySequence;
pub use status::RecordStatus;
pub use value_object::ValueObject;
