//! Vaultwarden administration.
//!
//! [`AdminClient`] talks to the server's `/admin` panel (cookie session
//! established with the admin secret token) and manages the server-wide
//! user directory. On top of it and the vault API client from
//! `vwadmin-bitwarden`, the [`workflows`] module implements the composite
//! account operations: reset an account while preserving its organization
//! rights, transfer those rights to a new address, and deduplicate
//! same-name collections.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vwadmin::{AdminClient, AdminConfig};
//! use vwadmin::workflows::{reset_account, Confirmation};
//! use vwadmin_bitwarden::{BitwardenClient, VaultApi};
//!
//! let admin = AdminClient::connect(admin_config).await?;
//! let vault: Arc<dyn VaultApi> = Arc::new(BitwardenClient::new(vault_config)?);
//!
//! let outcome = reset_account(&admin, &vault, "user@example.com", |unreachable| {
//!     eprintln!("{} organization(s) not reachable", unreachable.len());
//!     Confirmation::from_input(&read_line())
//! })
//! .await?;
//! ```

pub mod client;
pub mod error;
pub mod models;
pub mod workflows;

pub use client::{AdminClient, AdminConfig, AdminDirectory};
pub use error::{AdminError, WorkflowError};
pub use models::{OrganizationMembership, VaultwardenUser};
