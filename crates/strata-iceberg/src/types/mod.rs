//! Iceberg-native metadata types used by the catalog capability.
//!
//! These mirror the Apache Iceberg table spec JSON encoding so the same
//! values can be handed to an in-memory catalog or sent to a REST catalog.

mod ident;
mod partition;
mod schema;
mod table;

pub use ident::*;
pub use partition::*;
pub use schema::*;
pub use table::*;
pub(crate) use schema::{dotted, parse_decimal_args, struct_fields_mut};
