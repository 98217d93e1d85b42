pub mod confirmation;
pub mod date_resolver;
pub mod dates;
pub mod engine;
pub mod interrupt;
pub mod router;
pub mod slots;

pub use date_resolver::{AmbiguousDateResolver, DateRole};
pub use dates::{DateExpression, DateParser, NaturalDateParser};
pub use engine::{BookingFlow, FlowOutcome, FlowStatus, SlotFillingEngine};
pub use router::{IntentRouter, TurnOutcome};
