use std::str::FromStr;

use booking_engine::{
    db_types::{DocumentTarget, NewMeeting, NewPayment, OrderStatusType, PaymentKind, PaymentStatus, Principal},
    traits::BookingError,
};
use cucumber::{given, then, when};
use studio_common::Rupiah;

use crate::{
    cucumber::BookingWorld,
    support::{admin, TestSystem},
};

fn error_name(e: &BookingError) -> &'static str {
    match e {
        BookingError::InvalidTransition { .. } => "InvalidTransition",
        BookingError::InvalidOrderState(_) => "InvalidOrderState",
        BookingError::AmountMismatch { .. } => "AmountMismatch",
        BookingError::AlreadyVerified(_) => "AlreadyVerified",
        BookingError::CancellationNotAllowed(_) => "CancellationNotAllowed",
        BookingError::DuplicatePayment(_) => "DuplicatePayment",
        BookingError::DocumentNotAvailable(_) => "DocumentNotAvailable",
        BookingError::MeetingAlreadyActive(_) => "MeetingAlreadyActive",
        BookingError::NotFound(_) => "NotFound",
        BookingError::Unauthorized(_) => "Unauthorized",
        _ => "Other",
    }
}

async fn refresh(world: &mut BookingWorld, alias: &str) {
    let code = world.code(alias);
    let order = world.system().orders.fetch_order(&admin(), &code).await.expect("Error fetching order");
    world.orders.insert(alias.to_string(), order);
}

#[given("a fresh booking system")]
async fn fresh_system(world: &mut BookingWorld) {
    world.system = Some(TestSystem::new().await);
}

#[when(expr = "customer '{word}' books order {word} for {int} IDR")]
async fn book_order(world: &mut BookingWorld, customer: String, alias: String, total: i64) {
    let request = world.system().new_order_request(&customer, total);
    let result = world.system().orders.create_order(&Principal::customer(customer.as_str()), request).await;
    if let Some(order) = world.record(result) {
        world.orders.insert(alias, order);
    }
}

#[when(expr = "the admin {word} order {word}")]
async fn transition_order(world: &mut BookingWorld, action: String, alias: String) {
    let code = world.code(&alias);
    let orders = &world.system().orders;
    let result = match action.as_str() {
        "validates" => orders.validate(&admin(), &code).await,
        "cancels" => orders.cancel(&admin(), &code).await,
        "archives" => orders.archive(&admin(), &code).await,
        other => panic!("Unknown order action: {other}"),
    };
    if world.record(result).is_some() {
        refresh(world, &alias).await;
    }
}

#[when(expr = "the admin records a {word} payment {word} of {int} IDR for order {word}")]
async fn record_payment(world: &mut BookingWorld, kind: String, payment_alias: String, amount: i64, alias: String) {
    let kind = PaymentKind::from_str(&kind).expect("Not a payment kind");
    let code = world.code(&alias);
    let payment = NewPayment::new(kind, Rupiah::from(amount), "bank_transfer").with_proof("uploads/transfer.jpg");
    let result = world.system().ledger.record_payment(&admin(), &code, payment).await;
    if let Some(payment) = world.record(result) {
        world.payments.insert(payment_alias, payment);
    }
}

#[when(expr = "the admin {word} payment {word}")]
async fn verify_payment(world: &mut BookingWorld, verdict: String, payment_alias: String) {
    let approve = match verdict.as_str() {
        "approves" => true,
        "rejects" => false,
        other => panic!("Unknown verdict: {other}"),
    };
    let id = world.payment(&payment_alias).id;
    let result = world.system().ledger.verify_payment(&admin(), id, approve).await;
    if let Some(result) = world.record(result) {
        world.payments.insert(payment_alias, result.payment);
    }
}

#[when(expr = "the admin schedules a meeting {string} for order {word}")]
async fn schedule_meeting(world: &mut BookingWorld, link: String, alias: String) {
    let code = world.code(&alias);
    let meeting = NewMeeting::new(link.as_str(), "Client");
    let result = world.system().meetings.schedule_meeting(&admin(), &code, meeting).await;
    world.record(result);
}

#[when(expr = "someone looks up the tracking code of order {word}")]
async fn lookup_tracking_code(world: &mut BookingWorld, alias: String) {
    let code = world.order(&alias).tracking_code.as_str().to_lowercase();
    let result = world.system().tracking.lookup(&code).await;
    world.last_lookup = Some(result);
}

#[when(expr = "someone looks up the tracking code {string}")]
async fn lookup_raw_tracking_code(world: &mut BookingWorld, code: String) {
    let result = world.system().tracking.lookup(&code).await;
    world.last_lookup = Some(result);
}

#[then(expr = "order {word} is {word}")]
async fn check_status(world: &mut BookingWorld, alias: String, status: String) {
    refresh(world, &alias).await;
    let expected = OrderStatusType::from_str(&status).expect("Not an order status");
    assert_eq!(world.order(&alias).status, expected);
}

#[then(expr = "the quote for order {word} is {int} down and {int} on settlement")]
async fn check_quote(world: &mut BookingWorld, alias: String, down: i64, settlement: i64) {
    let code = world.code(&alias);
    let quote = world.system().ledger.quote(&admin(), &code).await.expect("Error fetching quote");
    assert_eq!(quote.down_payment, Rupiah::from(down));
    assert_eq!(quote.settlement, Rupiah::from(settlement));
}

#[then(expr = "the remaining balance of order {word} is {int} IDR")]
async fn check_balance(world: &mut BookingWorld, alias: String, balance: i64) {
    let code = world.code(&alias);
    let remaining = world.system().ledger.remaining_balance(&admin(), &code).await.expect("Error fetching balance");
    assert_eq!(remaining, Rupiah::from(balance));
}

#[then(expr = "payment {word} is {word}")]
async fn check_payment_status(world: &mut BookingWorld, payment_alias: String, status: String) {
    let expected = PaymentStatus::from_str(&status).expect("Not a payment status");
    assert_eq!(world.payment(&payment_alias).status, expected);
}

#[then(expr = "the documents available for order {word} are {string}")]
async fn check_documents(world: &mut BookingWorld, alias: String, expected: String) {
    let expected = expected
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "none")
        .map(|s| match s {
            "invoice" => DocumentTarget::Invoice,
            "mou" => DocumentTarget::Mou,
            receipt => {
                let payment_alias = receipt.strip_prefix("receipt for ").expect("Unknown document");
                DocumentTarget::Receipt { payment_id: world.payment(payment_alias).id }
            },
        })
        .collect::<Vec<_>>();
    let code = world.code(&alias);
    let available =
        world.system().documents.available_documents(&admin(), &code).await.expect("Error fetching documents");
    assert_eq!(available, expected);
}

#[then(expr = "the last operation failed with {word}")]
async fn check_last_error(world: &mut BookingWorld, expected: String) {
    let err = world.last_error.as_ref().expect("The last operation succeeded");
    assert_eq!(error_name(err), expected, "Got {err}");
}

#[then(expr = "the lookup shows order {word} as {word}")]
async fn check_lookup(world: &mut BookingWorld, alias: String, status: String) {
    let summary = match world.last_lookup.as_ref().expect("No lookup was made") {
        Ok(summary) => summary,
        Err(e) => panic!("Lookup failed: {e}"),
    };
    assert_eq!(summary.booking_code, world.order(&alias).booking_code);
    assert_eq!(summary.status, OrderStatusType::from_str(&status).expect("Not an order status"));
}

#[then("the lookup finds nothing")]
async fn check_lookup_failed(world: &mut BookingWorld) {
    let result = world.last_lookup.as_ref().expect("No lookup was made");
    assert!(matches!(result, Err(BookingError::NotFound(_))));
}
