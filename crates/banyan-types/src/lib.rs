//! Core identity and context types for the Banyan kernel.
//!
//! This crate sits at the bottom of the workspace dependency graph and
//! defines the vocabulary every other crate shares:
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Principal`] | Who is performing an action (id, kind, roles) |
//! | [`Context`] | Request-scoped carrier for the principal plus cooperative cancellation |
//! | [`ErrorCode`] | Unified machine-readable error code interface |
//!
//! # Crate Architecture
//!
//! ```text
//! banyan-types  (Principal, Context, ErrorCode)  ◄── THIS CRATE
//!     ▲        ▲
//! banyan-event banyan-auth
//!     ▲        ▲
//!     banyan-registry
//!          ▲
//!     banyan-component (Module, Gateway traits)
//!          ▲
//!     banyan-kernel (lifecycle coordinator)
//! ```
//!
//! # Design Principles
//!
//! - **Identity is not permission**: [`Principal`] carries role *names*;
//!   deciding what those roles allow is `banyan-auth`'s job.
//! - **No ambient globals**: the principal travels in an explicit
//!   [`Context`] parameter; a privileged operation that finds no principal
//!   fails, it never falls back to "anonymous".

pub mod context;
pub mod error;
pub mod principal;

pub use context::Context;
pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use principal::Principal;
