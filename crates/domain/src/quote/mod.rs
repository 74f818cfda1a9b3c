//! Quote requests for services that have no catalog price.

mod aggregate;
mod events;
mod service;

pub use aggregate::{QuoteRequest, QuoteStatus};
pub use events::{
    QuoteAcceptedData, QuoteDeclinedData, QuoteEvent, QuoteRequestedData, QuoteSubmittedData,
};
pub use service::{QuoteService, RequestQuote};
