//! Core types and trait definitions for temporal code-master records.
//!
//! Every persisted row carries an audit envelope and is guarded by an
//! optimistic version stamp. Temporal rows additionally carry a validity
//! window and are linked into chains by their identity key.
//!
//! No HTTP or database code lives here. Storage backends implement
//! [`store::RecordStore`]; callers drive writes through
//! [`service::RecordService`].

pub mod actor;
pub mod audit;
pub mod chain;
pub mod clock;
pub mod code;
pub mod entity;
pub mod error;
pub mod guard;
pub mod service;
pub mod store;
pub mod temporal;

pub use actor::Actor;
pub use error::{Error, Result, ValidationErrors, Violation};
