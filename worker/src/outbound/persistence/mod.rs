//! PostgreSQL persistence for applied commands.
//!
//! [`DieselCommandStore`] implements the domain's `CommandStore` port on a
//! single `diesel-async` connection owned by the dispatcher. Row structs and
//! table definitions stay private to this module.

mod connection;
mod diesel_command_store;
mod models;
mod schema;

pub use connection::{StoreConfig, StoreConnectError, connect_store};
pub use diesel_command_store::DieselCommandStore;
