//! Composite account operations.
//!
//! Reset and transfer share a shape: discover which organizations the
//! target belongs to and what rights it holds there, mutate the target
//! account through the admin panel, then re-grant the rights on the new
//! identity through the vault API. Once the mutation starts the workflow
//! only moves forward — there is no rollback.
//!
//! An organization the acting credential cannot read is a warning, not a
//! failure: it is recorded and, for reset, surfaced to the caller as a
//! required confirmation before anything is touched.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use vwadmin_bitwarden::{
    InviteRequest, Organization, OrganizationUserDetails, VaultApi, VaultError,
};

use crate::client::AdminDirectory;
use crate::error::WorkflowError;

pub use vwadmin_bitwarden::dedup::{deduplicate_collections, DedupReport};

/// Rights held by one user in one reachable organization.
pub struct OrgAccess {
    pub organization: Organization,
    pub details: OrganizationUserDetails,
}

impl std::fmt::Debug for OrgAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrgAccess")
            .field("organization", &self.organization.id())
            .field("membership", &self.details.id)
            .finish()
    }
}

/// Result of the organization discovery step.
#[derive(Debug, Default)]
pub struct UserAccesses {
    /// Organizations the acting credential could read and where the user
    /// holds a membership record.
    pub organizations: Vec<OrgAccess>,
    /// Organizations the acting credential could not read.
    pub unreachable: Vec<Uuid>,
}

impl UserAccesses {
    /// Whether discovery was incomplete.
    pub fn is_partial(&self) -> bool {
        !self.unreachable.is_empty()
    }
}

/// Collect a user's per-organization rights through the acting credential.
///
/// An organization that answers with an HTTP error is downgraded to a
/// warning and recorded in `unreachable` — the one place a partial failure
/// is absorbed instead of surfaced.
pub async fn collect_user_accesses(
    vault: &Arc<dyn VaultApi>,
    email: &str,
    organization_ids: &[Uuid],
) -> Result<UserAccesses, WorkflowError> {
    let mut accesses = UserAccesses::default();

    for org_id in organization_ids {
        let mut organization = match Organization::fetch(Arc::clone(vault), *org_id).await {
            Ok(org) => org,
            Err(VaultError::Request { status, .. }) => {
                warn!(
                    organization = %org_id,
                    status,
                    "organization is not reachable with the acting credential"
                );
                accesses.unreachable.push(*org_id);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        match organization.user_search(email, true).await {
            Ok(Some(details)) => {
                debug!(organization = %org_id, membership = %details.id, "membership found");
                accesses.organizations.push(OrgAccess {
                    organization,
                    details,
                });
            }
            Ok(None) => {
                debug!(organization = %org_id, %email, "no membership record");
            }
            Err(VaultError::Request { status, .. }) => {
                warn!(
                    organization = %org_id,
                    status,
                    "organization members are not readable with the acting credential"
                );
                accesses.unreachable.push(*org_id);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(accesses)
}

/// A caller-supplied decision for a workflow that paused on a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Proceed,
    Abort,
}

impl Confirmation {
    /// Interpret operator input: the literal `"yes"` proceeds, anything
    /// else aborts.
    pub fn from_input(input: &str) -> Self {
        if input == "yes" {
            Self::Proceed
        } else {
            Self::Abort
        }
    }
}

/// Outcome of [`reset_account`].
#[derive(Debug)]
pub enum ResetOutcome {
    /// Discovery was incomplete and the caller declined; nothing changed.
    Aborted,
    Completed {
        /// Organizations the email was re-invited to.
        reinvited_organizations: Vec<Uuid>,
        /// Discovery missed at least one organization.
        partial_discovery: bool,
    },
}

/// Delete an account and re-invite the same email with the rights it held.
///
/// When any of the user's organizations is unreachable with the acting
/// credential, `confirm` is called with the unreachable ids; anything but
/// [`Confirmation::Proceed`] aborts before any change is made. Re-invites
/// that fail individually (for instance because the email is already a
/// member again) are logged and skipped.
pub async fn reset_account<F>(
    admin: &dyn AdminDirectory,
    vault: &Arc<dyn VaultApi>,
    email: &str,
    confirm: F,
) -> Result<ResetOutcome, WorkflowError>
where
    F: FnOnce(&[Uuid]) -> Confirmation,
{
    let user = admin.get_user(email).await?;
    let org_ids: Vec<Uuid> = user.organizations.iter().map(|m| m.id).collect();
    let mut accesses = collect_user_accesses(vault, email, &org_ids).await?;

    if accesses.is_partial() {
        warn!(
            %email,
            unreachable = accesses.unreachable.len(),
            "some organizations are not maintained by the acting account"
        );
        if confirm(&accesses.unreachable) != Confirmation::Proceed {
            warn!(%email, "reset cancelled, no changes made");
            return Ok(ResetOutcome::Aborted);
        }
        warn!(%email, "resetting despite incomplete access information");
    }

    admin.delete_user(user.id).await?;
    info!(%email, "account deleted");

    let mut reinvited = Vec::new();
    if accesses.organizations.is_empty() {
        admin.invite(email).await?;
        info!(%email, "re-invited without organization rights");
    } else {
        for access in &mut accesses.organizations {
            let request = InviteRequest::matching(&access.details);
            match access.organization.invite(email, &request).await {
                Ok(()) => reinvited.push(access.organization.id()),
                Err(e) => warn!(
                    organization = %access.organization.id(),
                    error = %e,
                    "re-invite failed, continuing"
                ),
            }
        }
        info!(%email, organizations = reinvited.len(), "rights re-granted");
    }

    Ok(ResetOutcome::Completed {
        reinvited_organizations: reinvited,
        partial_discovery: accesses.is_partial(),
    })
}

/// Outcome of [`transfer_account_rights`].
#[derive(Debug)]
pub struct TransferOutcome {
    /// Organizations the new email was invited to.
    pub invited_organizations: Vec<Uuid>,
    /// Discovery missed at least one organization.
    pub partial_discovery: bool,
}

/// Grant a new email the organization rights of an existing account, then
/// disable (not delete) the previous account.
///
/// There is no confirmation gate: an unreachable organization only logs a
/// warning. Individual invite failures are soft. The previous account is
/// disabled unconditionally once the invite pass completes.
pub async fn transfer_account_rights(
    admin: &dyn AdminDirectory,
    vault: &Arc<dyn VaultApi>,
    previous_email: &str,
    new_email: &str,
) -> Result<TransferOutcome, WorkflowError> {
    if previous_email.eq_ignore_ascii_case(new_email) {
        return Err(WorkflowError::SameEmail);
    }

    let user = admin.get_user(previous_email).await?;
    let org_ids: Vec<Uuid> = user.organizations.iter().map(|m| m.id).collect();
    let mut accesses = collect_user_accesses(vault, previous_email, &org_ids).await?;

    if accesses.is_partial() {
        warn!(
            %previous_email,
            unreachable = accesses.unreachable.len(),
            "some organizations are not maintained by the acting account"
        );
    }

    let mut invited = Vec::new();
    if accesses.organizations.is_empty() {
        warn!(%previous_email, "no organization rights found, issuing a plain invite");
        admin.invite(new_email).await?;
    } else {
        for access in &mut accesses.organizations {
            let request = InviteRequest::matching(&access.details);
            match access.organization.invite(new_email, &request).await {
                Ok(()) => invited.push(access.organization.id()),
                Err(e) => warn!(
                    organization = %access.organization.id(),
                    error = %e,
                    "invite failed, continuing"
                ),
            }
        }
        info!(%new_email, organizations = invited.len(), "rights granted");
    }

    admin.set_user_enabled(user.id, false).await?;
    info!(%previous_email, "previous account disabled");

    Ok(TransferOutcome {
        invited_organizations: invited,
        partial_discovery: accesses.is_partial(),
    })
}
