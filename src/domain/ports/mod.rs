pub mod store;
pub mod transport;

pub use store::{
    AlarmLedger, EnclosureDirectory, RecipientDirectory, RuleStore, SampleStore, StoreError,
};
pub use transport::{MessageTransport, OutgoingMessage, TransportError};
