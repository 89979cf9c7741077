//! Who is calling?
//!
//! Sessions are handled upstream of this server. The session layer forwards the caller's customer id in the
//! `X-Booking-Principal` header. Staff requests additionally carry `X-Booking-Admin-Key`, which must match
//! `BKS_ADMIN_API_KEY`. A request with a wrong admin key is refused outright rather than being downgraded to a
//! customer request.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use booking_engine::db_types::Principal;
use log::*;
use regex::Regex;
use studio_common::Secret;

use crate::{
    errors::{AuthError, ServerError},
    helpers::keys_match,
};

pub const PRINCIPAL_HEADER: &str = "X-Booking-Principal";
pub const ADMIN_KEY_HEADER: &str = "X-Booking-Admin-Key";

/// The admin key, as app data. Kept apart from [`crate::config::ServerOptions`] so that it only lives where it is
/// checked.
#[derive(Clone, Debug, Default)]
pub struct AdminCredentials {
    key: Secret<String>,
}

impl AdminCredentials {
    pub fn new(key: Secret<String>) -> Self {
        Self { key }
    }

    pub fn check(&self, candidate: &str) -> Result<(), AuthError> {
        if self.key.is_empty() {
            return Err(AuthError::AdminAccessDisabled);
        }
        if keys_match(self.key.reveal(), candidate) {
            Ok(())
        } else {
            Err(AuthError::InvalidAdminKey)
        }
    }
}

fn check_principal_id(id: &str) -> Result<(), AuthError> {
    let re = Regex::new(r"^[A-Za-z0-9_.@+-]{1,128}$").map_err(|e| AuthError::MalformedPrincipal(e.to_string()))?;
    if re.is_match(id) {
        Ok(())
    } else {
        Err(AuthError::MalformedPrincipal(format!("'{id}' is not an acceptable principal id")))
    }
}

/// Builds the calling principal from the request headers.
pub fn principal_from_request(req: &HttpRequest) -> Result<Principal, AuthError> {
    let id = req
        .headers()
        .get(PRINCIPAL_HEADER)
        .ok_or(AuthError::MissingPrincipal)?
        .to_str()
        .map_err(|e| AuthError::MalformedPrincipal(e.to_string()))?
        .trim();
    check_principal_id(id)?;
    let Some(key) = req.headers().get(ADMIN_KEY_HEADER) else {
        trace!("🔐️ Request from customer {id}");
        return Ok(Principal::customer(id));
    };
    let key = key.to_str().map_err(|_| AuthError::InvalidAdminKey)?;
    let credentials = req.app_data::<web::Data<AdminCredentials>>().ok_or(AuthError::AdminAccessDisabled)?;
    credentials.check(key).map_err(|e| {
        warn!("🔐️ {id} presented an admin key that was refused. {e}");
        e
    })?;
    trace!("🔐️ Request from admin {id}");
    Ok(Principal::admin(id))
}

/// Extractor for the calling principal. Handlers that take one of these refuse anonymous requests.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Principal);

impl AuthenticatedPrincipal {
    pub fn into_inner(self) -> Principal {
        self.0
    }
}

impl std::ops::Deref for AuthenticatedPrincipal {
    type Target = Principal;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRequest for AuthenticatedPrincipal {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(principal_from_request(req).map(Self).map_err(ServerError::from))
    }
}
