//! Data-plane plumbing: the envelope type and the fan-in merge primitive.
//!
//! ## Contents
//! - [`Envelope`], [`EnvelopeSender`], [`EnvelopeReceiver`] — the normalized
//!   unit flowing from workers to the consumer
//! - [`Fanin`] — merges N inputs into one bounded output channel

mod envelope;
mod fanin;

pub use envelope::{Envelope, EnvelopeReceiver, EnvelopeSender};
pub use fanin::Fanin;
