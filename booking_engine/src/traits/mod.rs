//! # Storage and collaborator contracts
//!
//! The traits in this module define what a storage backend (and the other out-of-process collaborators) must provide
//! for the booking engine to work.
//!
//! * [`BookingQueries`] provides read-only access to orders, services, payments, meetings and documents.
//! * [`BookingDatabase`] provides the atomic write operations. Every order lifecycle transition, payment verification
//!   and document claim goes through here, and each one either fully commits or leaves the store untouched.
//! * [`DocumentRenderer`] turns an authorised document into an artifact.
//!
//! The engine's public APIs (see [`crate::OrderFlowApi`] and friends) layer the authorisation rules on top.
mod booking_database;
mod booking_queries;
mod data_objects;
mod document_renderer;

pub use booking_database::{BookingDatabase, BookingError};
pub use booking_queries::BookingQueries;
pub use data_objects::{RecordedPayment, VerificationResult};
pub use document_renderer::{DocumentPayload, DocumentRenderer, RenderError};
