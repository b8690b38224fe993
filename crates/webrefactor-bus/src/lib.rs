//! # WebRefactor Bus
//!
//! Request/response transport between the Controller and the Page Agents.
//!
//! Each tab owns one [`Mailbox`]. The Controller sends an [`Envelope`]
//! carrying a correlation id and a oneshot reply slot; the agent answers
//! through [`Envelope::reply`]. Responses are matched by the slot itself,
//! so they may arrive after the sender has moved on.

mod bus;

pub use bus::{Envelope, Mailbox, MessageBus};
