//! Merge same-name collections inside an organization.
//!
//! For every group of collections sharing a decrypted name, one survivor
//! (the "primary") is chosen by member count, the member rows of the whole
//! group are unioned onto it, every vault item referencing a duplicate is
//! re-pointed at the primary, and the duplicates are deleted.
//!
//! The comparison uses `>=` on the running maximum, so of several
//! equally-sized candidates the last one encountered wins. The first
//! failing step aborts the run; there is no rollback, so progress made up
//! to that point persists.

use std::collections::BTreeMap;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::VaultError;
use crate::models::{CollectionMember, Organization, OrganizationCollection};

/// What a deduplication run changed.
#[derive(Debug, Default)]
pub struct DedupReport {
    /// Name groups that had more than one collection.
    pub groups_merged: usize,
    /// Duplicate collections that were deleted.
    pub collections_removed: Vec<Uuid>,
    /// Vault items re-pointed at a primary.
    pub ciphers_reassigned: usize,
}

/// Deduplicate the organization's collections by decrypted name.
pub async fn deduplicate_collections(
    org: &mut Organization,
) -> Result<DedupReport, VaultError> {
    let collections = org.collections(true).await?;

    // Group by name, preserving encounter order.
    let mut groups: Vec<(String, Vec<OrganizationCollection>)> = Vec::new();
    for collection in collections {
        match groups.iter_mut().find(|(name, _)| *name == collection.name) {
            Some((_, group)) => group.push(collection),
            None => groups.push((collection.name.clone(), vec![collection])),
        }
    }

    let mut report = DedupReport::default();

    for (name, group) in groups.into_iter().filter(|(_, g)| g.len() > 1) {
        debug!(%name, count = group.len(), "merging duplicate collections");

        // Pick the primary by member count and union all member rows,
        // keyed by membership id so later rows overwrite earlier ones.
        let mut primary: Option<&OrganizationCollection> = None;
        let mut max_members = 0usize;
        let mut merged: BTreeMap<Uuid, CollectionMember> = BTreeMap::new();
        for collection in &group {
            let members = collection.users().await?;
            if members.len() >= max_members {
                max_members = members.len();
                primary = Some(collection);
            }
            for member in members {
                merged.insert(member.id, member);
            }
        }
        let Some(primary) = primary else {
            continue;
        };

        let merged: Vec<CollectionMember> = merged.into_values().collect();
        primary.set_users(&merged).await?;
        info!(
            %name,
            primary = %primary.id,
            members = merged.len(),
            "primary collection selected"
        );

        for duplicate in group.iter().filter(|c| c.id != primary.id) {
            // Re-point every item off the duplicate; set semantics collapse
            // an item that already references the primary.
            let ciphers = org.ciphers_in_collection(duplicate.id, true).await?;
            for mut cipher in ciphers {
                let mut target: Vec<Uuid> = cipher
                    .collection_ids
                    .iter()
                    .copied()
                    .filter(|id| *id != duplicate.id)
                    .collect();
                if !target.contains(&primary.id) {
                    target.push(primary.id);
                }
                cipher.update_collections(&target).await?;
                report.ciphers_reassigned += 1;
            }

            org.delete_collection(duplicate.id).await?;
            info!(%name, duplicate = %duplicate.id, "duplicate collection deleted");
            report.collections_removed.push(duplicate.id);
        }

        report.groups_merged += 1;
    }

    Ok(report)
}
