use std::{collections::HashMap, fmt::Debug};

use booking_engine::{
    db_types::{BookingCode, Order, Payment},
    order_objects::OrderSummary,
    traits::BookingError,
};
use cucumber::World;
use log::*;

use crate::support::TestSystem;

#[derive(Default, World)]
pub struct BookingWorld {
    pub system: Option<TestSystem>,
    /// Orders by the alias a scenario gave them
    pub orders: HashMap<String, Order>,
    pub payments: HashMap<String, Payment>,
    pub last_error: Option<BookingError>,
    pub last_lookup: Option<Result<OrderSummary, BookingError>>,
}

impl Debug for BookingWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let db = self.system.as_ref().map(|s| s.db_path.as_str()).unwrap_or("not started");
        write!(f, "BookingWorld({db}, {} orders, {} payments)", self.orders.len(), self.payments.len())
    }
}

impl BookingWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("Booking system not initialised")
    }

    pub fn order(&self, alias: &str) -> &Order {
        self.orders.get(alias).unwrap_or_else(|| panic!("No order called {alias}"))
    }

    pub fn code(&self, alias: &str) -> BookingCode {
        self.order(alias).booking_code.clone()
    }

    pub fn payment(&self, alias: &str) -> &Payment {
        self.payments.get(alias).unwrap_or_else(|| panic!("No payment called {alias}"))
    }

    /// Keeps the outcome of a step that is allowed to fail, so that a later step can check the error.
    pub fn record<T>(&mut self, result: Result<T, BookingError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.last_error = None;
                Some(v)
            },
            Err(e) => {
                debug!("🚀️ Step failed with {e}");
                self.last_error = Some(e);
                None
            },
        }
    }
}
