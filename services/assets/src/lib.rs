//! Asset ledger REST service
//!
//! Provisions the admin and application identities against the Fabric CA,
//! opens one gateway session and exposes the asset contract over HTTP.

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

pub mod handlers;
pub mod server;

pub use fabric::FabricError;
pub use server::{create_router, run};
