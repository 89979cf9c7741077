//! Studio Booking Engine
//!
//! The booking engine owns the order lifecycle and the installment payment ledger of the studio's booking site. It
//! is storage-agnostic at its core and ships with an SQLite backend.
//!
//! The library is divided into these sections:
//! 1. Data types ([`mod@db_types`]) and the pure rules that govern them: the order state machine
//!    ([`mod@state_machine`]), the installment policy and balance arithmetic ([`mod@ledger`]) and document
//!    availability ([`mod@document_rules`]).
//! 2. Storage contracts ([`mod@traits`]) and the SQLite backend ([`SqliteDatabase`]). You should never need to call the
//!    backend directly; use the public APIs instead.
//! 3. The public APIs: [`OrderFlowApi`], [`LedgerApi`], [`MeetingApi`], [`DocumentApi`] and [`TrackingApi`]. These
//!    add the authorisation rules. Every state-changing call takes the acting [`db_types::Principal`] explicitly.
//!
//! The engine also emits events ([`mod@events`]) after changes commit, for example when an order is validated or a
//! payment verified. Notification dispatchers hook into these.
mod booking_api;

pub mod db_types;
pub mod document_rules;
pub mod events;
pub mod helpers;
pub mod ledger;
pub mod state_machine;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use booking_api::{
    document_api::{DocumentApi, DEFAULT_CLAIM_TIMEOUT_SECS},
    ledger_api::{LedgerApi, LedgerSummary},
    meeting_api::MeetingApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    tracking_api::TrackingApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
