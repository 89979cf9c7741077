//! Delivery of booking events to the notification hooks.
//!
//! Each hook owns a bounded queue and a consumer task. The engine publishes after its transaction has committed, and
//! publishing only waits for room in the queue, never for the hook itself. Every hook call runs on a task of its own,
//! so a slow or panicking hook delays nobody but itself.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
};

use crate::events::EventType;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Decides whether a hook wants to hear about an event.
pub type EventFilter = fn(&EventType) -> bool;

/// The consuming end of one hook's queue.
pub struct EventHandler {
    hook_name: &'static str,
    accepts: EventFilter,
    receiver: mpsc::Receiver<EventType>,
    sender: mpsc::Sender<EventType>,
    hook: Handler<EventType>,
}

impl EventHandler {
    pub fn new(hook_name: &'static str, buffer_size: usize, accepts: EventFilter, hook: Handler<EventType>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { hook_name, accepts, receiver, sender, hook }
    }

    pub fn subscribe(&self) -> EventProducer {
        EventProducer { hook_name: self.hook_name, accepts: self.accepts, sender: self.sender.clone() }
    }

    /// Feeds queued events to the hook until the last producer is dropped, then waits for the calls still in flight.
    pub async fn run(mut self) {
        debug!("📬️ The {} hook is listening", self.hook_name);
        drop(self.sender);
        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                event = self.receiver.recv() => match event {
                    Some(event) => {
                        trace!("📬️ {} -> {}", event.name(), self.hook_name);
                        in_flight.spawn((self.hook)(event));
                    },
                    None => break,
                },
                Some(done) = in_flight.join_next(), if !in_flight.is_empty() => report(self.hook_name, done),
            }
        }
        if !in_flight.is_empty() {
            debug!("📬️ Waiting for {} call(s) to the {} hook", in_flight.len(), self.hook_name);
        }
        while let Some(done) = in_flight.join_next().await {
            report(self.hook_name, done);
        }
        debug!("📬️ The {} hook has shut down", self.hook_name);
    }
}

fn report(hook_name: &str, result: Result<(), JoinError>) {
    if let Err(e) = result {
        error!("📬️ The {hook_name} hook failed while handling an event. {e}");
    }
}

/// The publishing end of a hook's queue.
#[derive(Clone)]
pub struct EventProducer {
    hook_name: &'static str,
    accepts: EventFilter,
    sender: mpsc::Sender<EventType>,
}

impl EventProducer {
    pub fn hook_name(&self) -> &'static str {
        self.hook_name
    }

    /// Queues `event` if the hook wants it, and returns whether it was queued.
    ///
    /// Delivery is fire-and-forget. If the hook has already shut down, the event is logged and dropped; the booking
    /// operation that produced it has committed regardless.
    pub async fn publish(&self, event: &EventType) -> bool {
        if !(self.accepts)(event) {
            return false;
        }
        match self.sender.send(event.clone()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    "📬️ The {} hook is no longer running. The {} event for order {} was not delivered",
                    self.hook_name,
                    event.name(),
                    event.order().booking_code
                );
                false
            },
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use chrono::{NaiveDate, Utc};
    use studio_common::Rupiah;

    use super::*;
    use crate::{
        db_types::{BookingCode, Order, OrderStatusType, TrackingCode},
        events::OrderEvent,
    };

    fn order(id: i64, status: OrderStatusType) -> Order {
        let now = Utc::now();
        Order {
            id,
            booking_code: BookingCode(format!("BK-202610-{id:05}")),
            tracking_code: TrackingCode("TRK-ABCD-EFGH-JKMN".into()),
            customer_id: "alice".into(),
            service_id: 1,
            event_name: "Wedding".into(),
            event_date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            event_end_date: None,
            event_time: None,
            location: "Bandung".into(),
            requirements: None,
            total_price: Rupiah::from(1_000_000),
            currency: "IDR".into(),
            status,
            version: 1,
            created_at: now,
            updated_at: now,
            validated_at: None,
            cancelled_at: None,
            settled_at: None,
            archived_at: None,
        }
    }

    fn settled(id: i64) -> EventType {
        EventType::OrderSettled(OrderEvent::new(order(id, OrderStatusType::Settled)))
    }

    fn validated(id: i64) -> EventType {
        EventType::OrderValidated(OrderEvent::new(order(id, OrderStatusType::Validated)))
    }

    fn hook<F, Fut>(f: F) -> Handler<EventType>
    where
        F: Fn(EventType) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Arc::new(move |ev: EventType| -> Pin<Box<dyn Future<Output = ()> + Send>> { Box::pin(f(ev)) })
    }

    fn recording_hook(seen: Arc<Mutex<Vec<i64>>>) -> Handler<EventType> {
        hook(move |ev: EventType| {
            let seen = seen.clone();
            async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
                seen.lock().unwrap().push(ev.order().id);
            }
        })
    }

    #[tokio::test]
    async fn queued_events_are_handled_before_shutdown() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = EventHandler::new("test", 1, |_| true, recording_hook(seen.clone()));
        let first = handler.subscribe();
        let second = handler.subscribe();
        tokio::spawn(async move {
            for id in [1, 3, 5] {
                assert!(first.publish(&validated(id)).await);
            }
        });
        tokio::spawn(async move {
            for id in [2, 4] {
                assert!(second.publish(&settled(id)).await);
            }
        });
        handler.run().await;
        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn filtered_events_are_not_queued() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler =
            EventHandler::new("settled", 4, |ev| matches!(ev, EventType::OrderSettled(_)), recording_hook(seen.clone()));
        let producer = handler.subscribe();
        assert_eq!(producer.hook_name(), "settled");
        assert!(!producer.publish(&validated(1)).await);
        assert!(producer.publish(&settled(2)).await);
        drop(producer);
        handler.run().await;
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn publishing_to_a_stopped_hook_is_harmless() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let counting = hook(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {}
        });
        let handler = EventHandler::new("gone", 1, |_| true, counting);
        let producer = handler.subscribe();
        drop(handler);
        assert!(!producer.publish(&settled(1)).await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn a_panicking_hook_does_not_stop_delivery() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let flaky = hook(move |ev: EventType| {
            let counter = counter.clone();
            async move {
                if ev.order().id == 1 {
                    panic!("mail relay unreachable");
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        let handler = EventHandler::new("flaky", 4, |_| true, flaky);
        let producer = handler.subscribe();
        for id in 1..=3 {
            assert!(producer.publish(&validated(id)).await);
        }
        drop(producer);
        handler.run().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
