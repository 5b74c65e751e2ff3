//! Service and gateway registry with authorized lookup.
//!
//! Modules publish services under unique names; gateways are registered by
//! the kernel under their own names in a disjoint namespace. Peers look
//! both up through a principal-bearing [`Context`]; every lookup is an
//! access-control decision:
//!
//! | Lookup | Required permission |
//! |--------|---------------------|
//! | `get_service(ctx, name)` | `service.<owning-module>.<name>.access` |
//! | `get_gateway(ctx, name)` | `gateway.<name>.access` |
//!
//! Stored values are opaque `Arc<dyn Any + Send + Sync>`; callers downcast
//! to the concrete service type they expect.
//!
//! # Guarantees
//!
//! Lookups never observe a half-applied modification: a single
//! readers-writer lock guards both maps, snapshots are taken under the
//! read lock and released before the permission check runs. Callers must
//! still expect [`RegistryError::ServiceNotFound`] after a concurrent
//! unregister. The registry performs no lifecycle management.
//!
//! [`Context`]: banyan_types::Context

pub mod error;
pub mod registry;

pub use error::RegistryError;
pub use registry::{ServiceRegistry, ServiceValue};
