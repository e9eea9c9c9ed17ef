//! Bitwarden vault API client for Vaultwarden administration.
//!
//! Authenticates with the OAuth2 `client_credentials` grant, derives the
//! master key from the account password, unwraps the user-key /
//! organization-private-key hierarchy once per login, and exposes the
//! organization, collection, member, and cipher resources as typed
//! entities with lazy per-entity caching.
//!
//! # Architecture
//!
//! - **`session`**: token response models, the unlocked [`Session`], and
//!   the renewal decision logic
//! - **`client`**: [`BitwardenClient`] and the [`VaultApi`] request
//!   primitive every other component funnels through
//! - **`sync`**: `api/sync` account snapshot models
//! - **`models`**: organization / collection / user / cipher entities
//! - **`dedup`**: same-name collection merge workflow
//!
//! # Usage
//!
//! ```rust,ignore
//! use vwadmin_bitwarden::{BitwardenClient, BitwardenConfig, Organization};
//!
//! let client = std::sync::Arc::new(BitwardenClient::new(config)?);
//! let mut org = Organization::fetch(client, org_id).await?;
//! for collection in org.collections(false).await? {
//!     println!("{}", collection.name);
//! }
//! ```

pub mod client;
pub mod dedup;
pub mod error;
pub mod models;
pub mod session;
pub mod sync;

pub use client::{BitwardenClient, BitwardenConfig, VaultApi};
pub use dedup::{deduplicate_collections, DedupReport};
pub use error::VaultError;
pub use models::{
    CipherDetails, CipherType, CollectionAccess, CollectionMember, InviteRequest, Organization,
    OrganizationCollection, OrganizationUserDetails, OrganizationUserStatus, OrganizationUserType,
    VaultwardenUserStatus,
};
pub use session::Session;
