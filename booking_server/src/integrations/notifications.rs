//! The notification dispatcher.
//!
//! The studio's messaging integrations (e-mail, WhatsApp) are not part of this server. For now every committed booking
//! event is written to the `bks::notifications` log target as a single JSON line, which is where a mail relay picks
//! them up.
use booking_engine::events::{EventHandlers, EventHooks, EventType};
use futures::future::BoxFuture;
use log::*;

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 25;
const NOTIFICATION_TARGET: &str = "bks::notifications";

pub fn create_notification_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_booking_event(|ev| {
        dispatch(&ev);
        no_op()
    });
    hooks.on_order_settled(|ev| {
        let order = ev.order;
        info!(
            target: NOTIFICATION_TARGET,
            "📬️ Order {} is fully paid. Thank-you message queued for {}", order.booking_code, order.customer_id
        );
        no_op()
    });
    EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks)
}

fn dispatch(event: &EventType) {
    let order = event.order();
    match serde_json::to_string(event) {
        Ok(json) => info!(target: NOTIFICATION_TARGET, "{json}"),
        Err(e) => error!(
            target: NOTIFICATION_TARGET,
            "📬️ Could not serialize the {} notification for order {}. {e}",
            event.name(),
            order.booking_code
        ),
    }
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn both_hooks_are_registered() {
        let handlers = create_notification_event_handlers();
        let producers = handlers.producers();
        assert_eq!(producers.hook_names(), vec!["order_settled", "booking_event"]);
        handlers.start_handlers().await;
    }
}
