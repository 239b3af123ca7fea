use std::collections::HashMap;

use uuid::Uuid;

use crate::permission::{RequiredResourceAccess, ResourceAccess, ResourceAccessKind};

/// Change staged for one resource API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedAccess {
    /// Resource was not requested before; the desired entry is added as is.
    Add(RequiredResourceAccess),
    /// Resource was requested before; the entry is the union of current and desired ids.
    Merge(RequiredResourceAccess),
}

impl StagedAccess {
    /// Returns the entry that will be written.
    #[must_use]
    pub fn entry(&self) -> &RequiredResourceAccess {
        match self {
            Self::Add(entry) | Self::Merge(entry) => entry,
        }
    }
}

/// Same permission id requested with different kinds in current and desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessKindConflict {
    /// Resource API the permission belongs to.
    pub resource_app_id: Uuid,
    /// Permission id.
    pub access_id: Uuid,
    /// Kind found in the directory, which is kept.
    pub current_kind: ResourceAccessKind,
    /// Kind requested by desired state, which is not applied.
    pub desired_kind: ResourceAccessKind,
}

/// Minimal additive patch that moves required permissions to a desired superset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionDelta {
    staged: Vec<StagedAccess>,
    conflicts: Vec<AccessKindConflict>,
    patched: Vec<RequiredResourceAccess>,
}

impl PermissionDelta {
    /// Returns whether a patch has to be issued.
    #[must_use]
    pub fn requires_patch(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Returns the per-resource changes in desired order.
    #[must_use]
    pub fn staged(&self) -> &[StagedAccess] {
        self.staged.as_slice()
    }

    /// Returns unresolved kind conflicts.
    #[must_use]
    pub fn conflicts(&self) -> &[AccessKindConflict] {
        self.conflicts.as_slice()
    }

    /// Returns the complete list to write, or `None` when nothing changes.
    ///
    /// Every current resource entry is carried through, so a patch never drops
    /// permissions that desired state does not mention.
    #[must_use]
    pub fn patched_access(&self) -> Option<&[RequiredResourceAccess]> {
        self.requires_patch().then_some(self.patched.as_slice())
    }
}

/// Resource entries grouped by resource client id, in first-seen order.
struct GroupedAccess {
    order: Vec<Uuid>,
    entries: HashMap<Uuid, Vec<ResourceAccess>>,
}

impl GroupedAccess {
    fn from_entries(entries: &[RequiredResourceAccess]) -> Self {
        let mut grouped = Self {
            order: Vec::new(),
            entries: HashMap::new(),
        };

        for entry in entries {
            let resource_app_id = entry.resource_app_id();
            let accesses = grouped.entries.entry(resource_app_id).or_insert_with(|| {
                grouped.order.push(resource_app_id);
                Vec::new()
            });
            for access in entry.resource_access() {
                if !accesses.contains(access) {
                    accesses.push(access.clone());
                }
            }
        }

        grouped
    }

    fn kinds_for(
        &self,
        resource_app_id: Uuid,
    ) -> Option<HashMap<Uuid, Vec<ResourceAccessKind>>> {
        self.entries.get(&resource_app_id).map(|accesses| {
            let mut kinds: HashMap<Uuid, Vec<ResourceAccessKind>> = HashMap::new();
            for access in accesses {
                kinds.entry(access.id()).or_default().push(access.kind());
            }
            kinds
        })
    }
}

/// Computes the additive patch of required permissions.
///
/// Current entries are carried through with their kinds. A desired id is
/// missing only when no current entry has that id; an id already present
/// with another kind is reported as a conflict and left untouched.
#[must_use]
pub fn compute_permission_delta(
    current: &[RequiredResourceAccess],
    desired: &[RequiredResourceAccess],
) -> PermissionDelta {
    let current_grouped = GroupedAccess::from_entries(current);
    let desired_grouped = GroupedAccess::from_entries(desired);

    let mut staged = Vec::new();
    let mut conflicts = Vec::new();
    let mut merged_by_resource: HashMap<Uuid, RequiredResourceAccess> = HashMap::new();

    for resource_app_id in &desired_grouped.order {
        let desired_accesses = desired_grouped
            .entries
            .get(resource_app_id)
            .cloned()
            .unwrap_or_default();
        if desired_accesses.is_empty() {
            continue;
        }

        let Some(current_kinds) = current_grouped.kinds_for(*resource_app_id) else {
            staged.push(StagedAccess::Add(RequiredResourceAccess::new(
                *resource_app_id,
                desired_accesses,
            )));
            continue;
        };

        let mut missing = Vec::new();
        for access in desired_accesses {
            match current_kinds.get(&access.id()) {
                None => missing.push(access),
                Some(kinds) if !kinds.contains(&access.kind()) => {
                    conflicts.push(AccessKindConflict {
                        resource_app_id: *resource_app_id,
                        access_id: access.id(),
                        current_kind: kinds[0],
                        desired_kind: access.kind(),
                    });
                }
                Some(_) => {}
            }
        }

        if missing.is_empty() {
            continue;
        }

        let mut union = current_grouped
            .entries
            .get(resource_app_id)
            .cloned()
            .unwrap_or_default();
        union.extend(missing);
        let merged = RequiredResourceAccess::new(*resource_app_id, union);
        merged_by_resource.insert(*resource_app_id, merged.clone());
        staged.push(StagedAccess::Merge(merged));
    }

    if staged.is_empty() {
        return PermissionDelta {
            staged,
            conflicts,
            patched: Vec::new(),
        };
    }

    let mut patched: Vec<RequiredResourceAccess> = current_grouped
        .order
        .iter()
        .map(|resource_app_id| {
            merged_by_resource
                .remove(resource_app_id)
                .unwrap_or_else(|| {
                    RequiredResourceAccess::new(
                        *resource_app_id,
                        current_grouped
                            .entries
                            .get(resource_app_id)
                            .cloned()
                            .unwrap_or_default(),
                    )
                })
        })
        .collect();
    patched.extend(staged.iter().filter_map(|change| match change {
        StagedAccess::Add(entry) => Some(entry.clone()),
        StagedAccess::Merge(_) => None,
    }));

    PermissionDelta {
        staged,
        conflicts,
        patched,
    }
}
