pub mod audit;
pub mod booking;
pub mod conversation;
pub mod intent;

pub use audit::{AuditEvent, AuditKind};
pub use booking::{BookingRecord, FlightBooking};
pub use conversation::{Conversation, ConversationState};
pub use intent::{Intent, Recognition};
