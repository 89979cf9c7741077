use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, EventType, Handler, OrderEvent};

const ORDER_SETTLED_HOOK: &str = "order_settled";
const BOOKING_EVENT_HOOK: &str = "booking_event";

#[derive(Default, Clone)]
pub struct EventProducers {
    producers: Vec<EventProducer>,
}

impl EventProducers {
    /// Offers `event` to every registered hook. Each hook only queues the events it listens for.
    pub async fn publish(&self, event: EventType) {
        for producer in &self.producers {
            producer.publish(&event).await;
        }
    }

    /// The names of the hooks this set publishes to, in registration order.
    pub fn hook_names(&self) -> Vec<&'static str> {
        self.producers.iter().map(EventProducer::hook_name).collect()
    }
}

pub struct EventHandlers {
    handlers: Vec<EventHandler>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let mut handlers = Vec::with_capacity(2);
        if let Some(f) = hooks.on_order_settled {
            let hook: Handler<EventType> =
                Arc::new(move |event: EventType| -> Pin<Box<dyn Future<Output = ()> + Send>> {
                    match event {
                        EventType::OrderSettled(ev) => f(ev),
                        _ => Box::pin(async {}),
                    }
                });
            let settled_only = |ev: &EventType| matches!(ev, EventType::OrderSettled(_));
            handlers.push(EventHandler::new(ORDER_SETTLED_HOOK, buffer_size, settled_only, hook));
        }
        if let Some(f) = hooks.on_booking_event {
            handlers.push(EventHandler::new(BOOKING_EVENT_HOOK, buffer_size, |_| true, f));
        }
        Self { handlers }
    }

    pub fn producers(&self) -> EventProducers {
        EventProducers { producers: self.handlers.iter().map(EventHandler::subscribe).collect() }
    }

    pub async fn start_handlers(self) {
        for handler in self.handlers {
            tokio::spawn(handler.run());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_settled: Option<Handler<OrderEvent>>,
    pub on_booking_event: Option<Handler<EventType>>,
}

impl EventHooks {
    pub fn on_order_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_settled = Some(Arc::new(f));
        self
    }

    pub fn on_booking_event<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(EventType) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_booking_event = Some(Arc::new(f));
        self
    }
}
