//! Monitored instance inventory
//!
//! The `config.json` document lists subscriptions, their resource groups and
//! the PostgreSQL flexible servers inside each group. Flattening it yields the
//! work list of one run.

mod reader;

pub use reader::{ConfigReadError, ConfigReader};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Root of `config.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfig {
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub resource_groups: Vec<ResourceGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    pub name: String,
    #[serde(default, alias = "postgresDatabaseNames")]
    pub database_names: Vec<String>,
}

impl MonitoringConfig {
    /// One identity per leaf database name, in document order.
    /// Duplicates are kept: each one becomes its own unit of work.
    pub fn instances(&self) -> Vec<InstanceIdentity> {
        self.subscriptions
            .iter()
            .flat_map(|sub| {
                sub.resource_groups.iter().flat_map(move |rg| {
                    rg.database_names
                        .iter()
                        .map(move |db| InstanceIdentity::new(&sub.id, &rg.name, db))
                })
            })
            .collect()
    }
}

/// One monitored PostgreSQL flexible server
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceIdentity {
    subscription_id: String,
    resource_group_name: String,
    database_name: String,
}

impl InstanceIdentity {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group_name: impl Into<String>,
        database_name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group_name: resource_group_name.into(),
            database_name: database_name.into(),
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group_name(&self) -> &str {
        &self.resource_group_name
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Azure resource id of the flexible server
    pub fn resource_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.DBforPostgreSQL/flexibleServers/{}",
            self.subscription_id, self.resource_group_name, self.database_name
        )
    }
}

impl fmt::Display for InstanceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.subscription_id, self.resource_group_name, self.database_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> MonitoringConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse(
            r#"{
                "subscriptions": [{
                    "id": "sub-1",
                    "resourceGroups": [{
                        "name": "rg-1",
                        "databaseNames": ["db-a", "db-b"]
                    }]
                }]
            }"#,
        );

        assert_eq!(config.subscriptions.len(), 1);
        assert_eq!(config.subscriptions[0].id, "sub-1");
        assert_eq!(
            config.subscriptions[0].resource_groups[0].database_names,
            vec!["db-a", "db-b"]
        );
    }

    #[test]
    fn test_parse_legacy_database_key() {
        let config = parse(
            r#"{"subscriptions": [{"id": "s", "resourceGroups": [
                {"name": "rg", "postgresDatabaseNames": ["pg-1"]}
            ]}]}"#,
        );
        assert_eq!(
            config.subscriptions[0].resource_groups[0].database_names,
            vec!["pg-1"]
        );
    }

    #[test]
    fn test_parse_missing_lists_default_to_empty() {
        let config = parse(r#"{"subscriptions": [{"id": "s"}]}"#);
        assert!(config.subscriptions[0].resource_groups.is_empty());
        assert!(config.instances().is_empty());

        let config = parse("{}");
        assert!(config.subscriptions.is_empty());
    }

    #[test]
    fn test_instances_count_matches_leaves() {
        let config = parse(
            r#"{"subscriptions": [
                {"id": "s1", "resourceGroups": [
                    {"name": "rg1", "databaseNames": ["a", "b"]},
                    {"name": "rg2", "databaseNames": []}
                ]},
                {"id": "s2", "resourceGroups": [
                    {"name": "rg3", "databaseNames": ["c"]}
                ]}
            ]}"#,
        );

        let instances = config.instances();
        assert_eq!(instances.len(), 3);
        assert_eq!(instances[0], InstanceIdentity::new("s1", "rg1", "a"));
        assert_eq!(instances[1], InstanceIdentity::new("s1", "rg1", "b"));
        assert_eq!(instances[2], InstanceIdentity::new("s2", "rg3", "c"));
    }

    #[test]
    fn test_instances_keeps_duplicates() {
        let config = parse(
            r#"{"subscriptions": [{"id": "s", "resourceGroups": [
                {"name": "rg", "databaseNames": ["dup", "dup"]}
            ]}]}"#,
        );

        let instances = config.instances();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0], instances[1]);
    }

    #[test]
    fn test_resource_id() {
        let id = InstanceIdentity::new("sub", "rg", "pg");
        assert_eq!(
            id.resource_id(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.DBforPostgreSQL/flexibleServers/pg"
        );
    }

    #[test]
    fn test_display() {
        let id = InstanceIdentity::new("sub", "rg", "pg");
        assert_eq!(id.to_string(), "sub/rg/pg");
    }
}
