//! Domain ports for the hexagonal boundary.
//!
//! Inbound adapters produce [`InboundDelivery`] values and decode them with a
//! [`CommandDecoder`]; outbound adapters implement [`CommandStore`].

mod macros;
pub(crate) use macros::define_port_error;

mod command_decoder;
mod command_store;
mod delivery;

#[cfg(test)]
pub use command_decoder::MockCommandDecoder;
pub use command_decoder::{CommandDecoder, DecodeError};
#[cfg(test)]
pub use command_store::MockCommandStore;
pub use command_store::{CommandStore, CommandStoreError};
#[cfg(test)]
pub use delivery::MockDeliveryAcker;
pub use delivery::{
    AckError, DeliveryAcker, DeliveryStream, DeliveryStreamError, InboundDelivery, Settlement,
};
