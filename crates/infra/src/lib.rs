//! Infrastructure layer: event storage, command execution, read models and
//! the application services the HTTP layer calls.

pub mod aggregates;
pub mod command_dispatcher;
pub mod event_store;
pub mod notifications;
pub mod projections;
pub mod read_model;
pub mod services;
pub mod unit_of_work;
