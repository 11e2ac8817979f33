//! Resource types and the static capability table.
//!
//! Six resource types share the same selection/dispatch skeleton but differ
//! in which bulk actions are legal. The table below makes that data-driven:
//! `BulkActionDispatcher` consults it instead of branching on a type string,
//! so adding a resource type never touches dispatch logic.

use serde::{Deserialize, Serialize};

use crate::request::ActionKind;

/// The kinds of resources the fleet dashboard manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    Websites,
    Clients,
    HostingProviders,
    Plugins,
    Templates,
    ScanSchedules,
}

impl ResourceType {
    /// URL path segment for this resource's collection.
    pub fn path_segment(&self) -> &'static str {
        match self {
            ResourceType::Websites => "websites",
            ResourceType::Clients => "clients",
            ResourceType::HostingProviders => "hosting-providers",
            ResourceType::Plugins => "plugins",
            ResourceType::Templates => "templates",
            ResourceType::ScanSchedules => "scan-schedules",
        }
    }

    pub fn all() -> &'static [ResourceType] {
        &[
            ResourceType::Websites,
            ResourceType::Clients,
            ResourceType::HostingProviders,
            ResourceType::Plugins,
            ResourceType::Templates,
            ResourceType::ScanSchedules,
        ]
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path_segment())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "websites" | "website" => Ok(ResourceType::Websites),
            "clients" | "client" => Ok(ResourceType::Clients),
            "hosting-providers" | "hosting-provider" | "hosting" => {
                Ok(ResourceType::HostingProviders)
            }
            "plugins" | "plugin" => Ok(ResourceType::Plugins),
            "templates" | "template" => Ok(ResourceType::Templates),
            "scan-schedules" | "scan-schedule" | "schedules" => Ok(ResourceType::ScanSchedules),
            other => Err(format!("unknown resource type: {}", other)),
        }
    }
}

/// Which bulk actions a resource type supports, and which one its UI
/// pre-selects.
#[derive(Debug, Clone, Copy)]
pub struct Capability {
    pub resource: ResourceType,
    pub valid_kinds: &'static [ActionKind],
    pub default_kind: ActionKind,
}

static CAPABILITIES: &[Capability] = &[
    Capability {
        resource: ResourceType::Websites,
        valid_kinds: &[
            ActionKind::Scan,
            ActionKind::Delete,
            ActionKind::StatusUpdate,
            ActionKind::GroupAssign,
            ActionKind::Schedule,
            ActionKind::CategoryUpdate,
        ],
        default_kind: ActionKind::StatusUpdate,
    },
    Capability {
        resource: ResourceType::Clients,
        valid_kinds: &[ActionKind::Delete, ActionKind::StatusUpdate],
        default_kind: ActionKind::StatusUpdate,
    },
    Capability {
        resource: ResourceType::HostingProviders,
        valid_kinds: &[ActionKind::Delete, ActionKind::StatusUpdate],
        default_kind: ActionKind::StatusUpdate,
    },
    Capability {
        resource: ResourceType::Plugins,
        valid_kinds: &[
            ActionKind::Delete,
            ActionKind::StatusUpdate,
            ActionKind::TypeUpdate,
        ],
        default_kind: ActionKind::TypeUpdate,
    },
    Capability {
        resource: ResourceType::Templates,
        valid_kinds: &[
            ActionKind::Delete,
            ActionKind::StatusUpdate,
            ActionKind::TypeUpdate,
            ActionKind::CategoryUpdate,
        ],
        default_kind: ActionKind::TypeUpdate,
    },
    Capability {
        resource: ResourceType::ScanSchedules,
        valid_kinds: &[ActionKind::Delete, ActionKind::StatusUpdate],
        default_kind: ActionKind::StatusUpdate,
    },
];

/// Capability entry for a resource type. The table covers every variant.
pub fn capabilities_for(resource: ResourceType) -> &'static Capability {
    CAPABILITIES
        .iter()
        .find(|c| c.resource == resource)
        .unwrap_or(&CAPABILITIES[0])
}

/// Whether `kind` is a legal bulk action for `resource`.
pub fn supports(resource: ResourceType, kind: ActionKind) -> bool {
    capabilities_for(resource).valid_kinds.contains(&kind)
}
