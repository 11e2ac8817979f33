//! Operation requests and the wire payload shapes of the fleet API.
//!
//! A request is built once at dispatch time and consumed once by the
//! coordinator. The payload is a typed enum with one variant per action
//! kind, so a payload that does not match its kind is unrepresentable.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::resource::ResourceType;

/// The closed set of bulk operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Scan,
    Delete,
    StatusUpdate,
    GroupAssign,
    Schedule,
    TypeUpdate,
    CategoryUpdate,
}

impl ActionKind {
    /// Destructive kinds require an explicit user confirmation step before
    /// dispatch. The dispatcher never prompts; that is the caller's job.
    pub fn is_destructive(&self) -> bool {
        matches!(self, ActionKind::Delete)
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionKind::Scan => "scan",
            ActionKind::Delete => "delete",
            ActionKind::StatusUpdate => "statusUpdate",
            ActionKind::GroupAssign => "groupAssign",
            ActionKind::Schedule => "schedule",
            ActionKind::TypeUpdate => "typeUpdate",
            ActionKind::CategoryUpdate => "categoryUpdate",
        };
        f.write_str(s)
    }
}

/// Which checks a scan performs. All on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub check_plugins: bool,
    pub check_themes: bool,
    pub check_vulnerabilities: bool,
    pub check_updates: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            check_plugins: true,
            check_themes: true,
            check_vulnerabilities: true,
            check_updates: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebsiteStatus {
    Active,
    Inactive,
    Maintenance,
}

impl std::str::FromStr for WebsiteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(WebsiteStatus::Active),
            "inactive" => Ok(WebsiteStatus::Inactive),
            "maintenance" => Ok(WebsiteStatus::Maintenance),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(format!("unknown frequency: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebsiteType {
    Security,
    Performance,
    Functionality,
    Design,
    Other,
}

impl std::str::FromStr for WebsiteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "security" => Ok(WebsiteType::Security),
            "performance" => Ok(WebsiteType::Performance),
            "functionality" => Ok(WebsiteType::Functionality),
            "design" => Ok(WebsiteType::Design),
            "other" => Ok(WebsiteType::Other),
            other => Err(format!("unknown type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Business,
    Blog,
    Portfolio,
    Ecommerce,
    Landing,
    Other,
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "business" => Ok(Category::Business),
            "blog" => Ok(Category::Blog),
            "portfolio" => Ok(Category::Portfolio),
            "ecommerce" => Ok(Category::Ecommerce),
            "landing" => Ok(Category::Landing),
            "other" => Ok(Category::Other),
            other => Err(format!("unknown category: {}", other)),
        }
    }
}

/// Kind-specific options for a bulk action. One variant per [`ActionKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActionPayload {
    Scan {
        config: ScanConfig,
    },
    Delete,
    StatusUpdate {
        status: WebsiteStatus,
    },
    GroupAssign {
        /// `None` removes the websites from their group.
        group_id: Option<i64>,
    },
    Schedule {
        name_template: String,
        frequency: Frequency,
        /// "HH:MM", 24-hour clock. Validated server-side.
        scheduled_time: String,
        config: ScanConfig,
        is_active: bool,
    },
    TypeUpdate {
        website_type: WebsiteType,
    },
    CategoryUpdate {
        category: Category,
    },
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::Scan { .. } => ActionKind::Scan,
            ActionPayload::Delete => ActionKind::Delete,
            ActionPayload::StatusUpdate { .. } => ActionKind::StatusUpdate,
            ActionPayload::GroupAssign { .. } => ActionKind::GroupAssign,
            ActionPayload::Schedule { .. } => ActionKind::Schedule,
            ActionPayload::TypeUpdate { .. } => ActionKind::TypeUpdate,
            ActionPayload::CategoryUpdate { .. } => ActionKind::CategoryUpdate,
        }
    }
}

/// A single remote operation: constructed at dispatch time, consumed once.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub resource: ResourceType,
    /// Non-empty, in selection order.
    pub target_ids: Vec<String>,
    pub payload: ActionPayload,
}

impl OperationRequest {
    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }

    /// JSON request body in the wire shape the fleet API expects.
    pub fn body(&self) -> Value {
        let ids = self.ids_json();
        match &self.payload {
            ActionPayload::Scan { config } => json!({
                "website_ids": ids,
                "scan_config": config,
            }),
            ActionPayload::Delete => json!({ "ids": ids }),
            ActionPayload::StatusUpdate { status } => {
                // Websites use their historical field name; everything else
                // takes plain `ids`.
                if self.resource == ResourceType::Websites {
                    json!({ "website_ids": ids, "status": status })
                } else {
                    json!({ "ids": ids, "status": status })
                }
            }
            ActionPayload::GroupAssign { group_id } => json!({
                "website_ids": ids,
                "group_id": group_id,
            }),
            ActionPayload::Schedule {
                name_template,
                frequency,
                scheduled_time,
                config,
                is_active,
            } => json!({
                "website_ids": ids,
                "name_template": name_template,
                "frequency": frequency,
                "scheduled_time": scheduled_time,
                "scan_config": config,
                "is_active": is_active,
            }),
            ActionPayload::TypeUpdate { website_type } => json!({
                "ids": ids,
                "type": website_type,
            }),
            ActionPayload::CategoryUpdate { category } => json!({
                "ids": ids,
                "category": category,
            }),
        }
    }

    /// Ids are opaque strings client-side; the API wants integers where the
    /// id parses as one.
    fn ids_json(&self) -> Value {
        Value::Array(
            self.target_ids
                .iter()
                .map(|id| {
                    id.parse::<i64>()
                        .map(Value::from)
                        .unwrap_or_else(|_| Value::from(id.as_str()))
                })
                .collect(),
        )
    }
}
