//! # Studio booking server
//! This crate hosts the HTTP surface of the booking engine. It is responsible for:
//! * Working out who is calling (see [auth](auth/index.html)) and keeping admin routes behind the admin key.
//! * Translating requests into engine calls and engine errors into HTTP responses.
//! * Receiving scheduling-provider callbacks, checked with an HMAC signature.
//! * Wiring up the document renderer and the notification hooks.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/track/{tracking_code}`: Public order status lookup.
//! * `/api/...`: Order, ledger, meeting and document routes. These need an `X-Booking-Principal` header.
//! * `/webhooks/scheduling`: Callbacks from the scheduling-link provider.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
