//! # Piatto Service
//!
//! The Order Transaction Manager and its boundary contracts. This crate
//! orchestrates validate → price → persist → decrement (create) and
//! restore → mark cancelled (cancel) on top of the store traits, and owns
//! the only place where a commit-time stock conflict is translated into an
//! `availability_changed` rejection.
//!
//! Transport, sessions, and the second-factor mechanism itself live outside
//! this crate; [`session::Session`] is the hand-off from that external
//! collaborator.

pub mod boundary;
pub mod config;
pub mod orders;
pub mod session;
pub mod telemetry;

pub use boundary::{CancelRejection, CreateOrderRequest, CreateOrderResponse, InputError};
pub use config::ServiceConfig;
pub use orders::{CancelOrderError, CreateOrderError, OrderReceipt, OrderService};
pub use session::Session;
