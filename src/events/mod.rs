//! Domain events and the asynchronous event bus.
//!
//! Events are immutable records of something that happened inside an
//! aggregate. The bus fans them out to subscribed handlers from a single
//! background consumer thread; publishers never wait on handler execution.

mod bus;
mod event;

pub use bus::EventBus;
pub use event::{generate_event_id, DomainEvent};
