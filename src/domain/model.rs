//! Domain Model - Table descriptors, items and pages
//!
//! Field names follow the table store's wire JSON (PascalCase) so that a
//! schema record or page file can be read back by other tools that speak
//! the same format. Describe and scan responses carry more fields than the
//! typed views below; those are kept verbatim in `extra` so a dump holds
//! the whole response.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Items
// =============================================================================

/// A typed attribute value
///
/// Binary values are carried as their base64 text, exactly as they appear
/// on the wire.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "B")]
    B(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    #[serde(rename = "BS")]
    Bs(Vec<String>),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    #[serde(rename = "M")]
    M(BTreeMap<String, AttributeValue>),
}

/// One stored item: attribute name to value
pub type Item = BTreeMap<String, AttributeValue>;

// =============================================================================
// Schema Types
// =============================================================================

/// Scalar type of a key attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarAttributeType {
    S,
    N,
    B,
}

impl fmt::Display for ScalarAttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarAttributeType::S => write!(f, "S"),
            ScalarAttributeType::N => write!(f, "N"),
            ScalarAttributeType::B => write!(f, "B"),
        }
    }
}

/// Role of an attribute in a key schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyType {
    /// Partition key
    Hash,
    /// Sort key
    Range,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyType::Hash => write!(f, "HASH"),
            KeyType::Range => write!(f, "RANGE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: ScalarAttributeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: KeyType,
}

/// Provisioned read/write capacity of a table or index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionedThroughput {
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

impl ProvisionedThroughput {
    pub fn new(read_capacity_units: i64, write_capacity_units: i64) -> Self {
        Self {
            read_capacity_units,
            write_capacity_units,
        }
    }
}

/// Provisioned capacity as reported by describe-table
///
/// `extra` holds the descriptive fields (`NumberOfDecreasesToday`,
/// `LastIncreaseDateTime`, ...) that never go back into a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThroughputDescription {
    #[serde(flatten)]
    pub capacity: ProvisionedThroughput,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<ProvisionedThroughput> for ThroughputDescription {
    fn from(capacity: ProvisionedThroughput) -> Self {
        Self {
            capacity,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Projection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_key_attributes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocalSecondaryIndex {
    pub index_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    #[serde(default)]
    pub projection: Projection,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GlobalSecondaryIndex {
    pub index_name: String,
    pub key_schema: Vec<KeySchemaElement>,
    #[serde(default)]
    pub projection: Projection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned_throughput: Option<ThroughputDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Lifecycle status of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    Creating,
    Updating,
    Deleting,
    Active,
    #[serde(other)]
    Unknown,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Creating => "CREATING",
            TableStatus::Updating => "UPDATING",
            TableStatus::Deleting => "DELETING",
            TableStatus::Active => "ACTIVE",
            TableStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(status: &str) -> Self {
        match status {
            "CREATING" => TableStatus::Creating,
            "UPDATING" => TableStatus::Updating,
            "DELETING" => TableStatus::Deleting,
            "ACTIVE" => TableStatus::Active,
            _ => TableStatus::Unknown,
        }
    }
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Table Descriptor
// =============================================================================

/// Snapshot of a table's definition as reported by describe-table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDescription {
    pub table_name: String,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub key_schema: Vec<KeySchemaElement>,
    pub provisioned_throughput: ThroughputDescription,
    pub table_status: TableStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_secondary_indexes: Option<Vec<LocalSecondaryIndex>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_secondary_indexes: Option<Vec<GlobalSecondaryIndex>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_size_bytes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_arn: Option<String>,
    /// Every other field of the describe response
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TableDescription {
    /// Describe a new active table with no secondary indexes
    pub fn new(
        table_name: impl Into<String>,
        partition_key: (&str, ScalarAttributeType),
        sort_key: Option<(&str, ScalarAttributeType)>,
        provisioned_throughput: ProvisionedThroughput,
    ) -> Self {
        let mut attribute_definitions = vec![AttributeDefinition {
            attribute_name: partition_key.0.to_string(),
            attribute_type: partition_key.1,
        }];
        let mut key_schema = vec![KeySchemaElement {
            attribute_name: partition_key.0.to_string(),
            key_type: KeyType::Hash,
        }];
        if let Some((name, attribute_type)) = sort_key {
            attribute_definitions.push(AttributeDefinition {
                attribute_name: name.to_string(),
                attribute_type,
            });
            key_schema.push(KeySchemaElement {
                attribute_name: name.to_string(),
                key_type: KeyType::Range,
            });
        }

        Self {
            table_name: table_name.into(),
            attribute_definitions,
            key_schema,
            provisioned_throughput: provisioned_throughput.into(),
            table_status: TableStatus::Active,
            local_secondary_indexes: None,
            global_secondary_indexes: None,
            item_count: None,
            table_size_bytes: None,
            table_arn: None,
            extra: Map::new(),
        }
    }

    /// Names of the attributes making up the primary key, partition key first
    pub fn key_attribute_names(&self) -> Vec<&str> {
        let mut keys: Vec<&KeySchemaElement> = self.key_schema.iter().collect();
        keys.sort_by_key(|k| match k.key_type {
            KeyType::Hash => 0,
            KeyType::Range => 1,
        });
        keys.into_iter().map(|k| k.attribute_name.as_str()).collect()
    }
}

/// The persisted schema record of a Dump Unit (a whole describe-table response)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRecord {
    #[serde(rename = "Table")]
    pub table: TableDescription,
}

// =============================================================================
// Pages
// =============================================================================

/// One scan response: a batch of items plus the continuation key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanPage {
    pub items: Vec<Item>,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub scanned_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<Item>,
    /// Other response fields, e.g. `ConsumedCapacity`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One list-tables response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableNamePage {
    pub table_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_table_name: Option<String>,
}

// =============================================================================
// Requests
// =============================================================================

/// Everything needed to create a table
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableRequest {
    pub table_name: String,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub key_schema: Vec<KeySchemaElement>,
    pub provisioned_throughput: ProvisionedThroughput,
    pub local_secondary_indexes: Option<Vec<LocalSecondaryIndex>>,
    pub global_secondary_indexes: Option<Vec<GlobalSecondaryIndex>>,
}

/// Capacity change for one global secondary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexThroughputUpdate {
    pub index_name: String,
    pub provisioned_throughput: ProvisionedThroughput,
}

/// Capacity changes applied by one update-table call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThroughputUpdate {
    pub table: Option<ProvisionedThroughput>,
    pub indexes: Vec<IndexThroughputUpdate>,
}

impl ThroughputUpdate {
    pub fn is_empty(&self) -> bool {
        self.table.is_none() && self.indexes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_value_wire_format() {
        let mut item = Item::new();
        item.insert("id".into(), AttributeValue::S("a-1".into()));
        item.insert("n".into(), AttributeValue::N("42".into()));
        item.insert("ok".into(), AttributeValue::Bool(true));

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], serde_json::json!({"S": "a-1"}));
        assert_eq!(json["n"], serde_json::json!({"N": "42"}));
        assert_eq!(json["ok"], serde_json::json!({"BOOL": true}));
    }

    #[test]
    fn test_schema_record_parses_describe_response() {
        let raw = r#"{
          "Table": {
            "TableName": "orders-eu",
            "AttributeDefinitions": [
              {"AttributeName": "id", "AttributeType": "S"},
              {"AttributeName": "ts", "AttributeType": "N"}
            ],
            "KeySchema": [
              {"AttributeName": "ts", "KeyType": "RANGE"},
              {"AttributeName": "id", "KeyType": "HASH"}
            ],
            "ProvisionedThroughput": {
              "ReadCapacityUnits": 5,
              "WriteCapacityUnits": 5,
              "NumberOfDecreasesToday": 0
            },
            "TableStatus": "ACTIVE",
            "GlobalSecondaryIndexes": [{
              "IndexName": "by-ts",
              "KeySchema": [{"AttributeName": "ts", "KeyType": "HASH"}],
              "Projection": {"ProjectionType": "ALL"},
              "ProvisionedThroughput": {"ReadCapacityUnits": 1, "WriteCapacityUnits": 1},
              "IndexStatus": "ACTIVE"
            }],
            "ItemCount": 3
          }
        }"#;

        let record: SchemaRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.table.table_name, "orders-eu");
        assert_eq!(record.table.table_status, TableStatus::Active);
        assert_eq!(record.table.key_attribute_names(), vec!["id", "ts"]);
        let gsis = record.table.global_secondary_indexes.unwrap();
        assert_eq!(
            gsis[0].provisioned_throughput.as_ref().map(|t| t.capacity),
            Some(ProvisionedThroughput::new(1, 1))
        );
    }

    #[test]
    fn test_schema_record_keeps_whole_describe_response() {
        let raw = serde_json::json!({
            "Table": {
                "TableName": "orders",
                "TableId": "4f1c-9a2e",
                "TableStatus": "ACTIVE",
                "CreationDateTime": 1_700_000_000.25,
                "AttributeDefinitions": [{"AttributeName": "id", "AttributeType": "S"}],
                "KeySchema": [{"AttributeName": "id", "KeyType": "HASH"}],
                "ProvisionedThroughput": {
                    "ReadCapacityUnits": 5,
                    "WriteCapacityUnits": 5,
                    "NumberOfDecreasesToday": 2,
                    "LastIncreaseDateTime": 1_700_000_100.5
                },
                "BillingModeSummary": {"BillingMode": "PROVISIONED"},
                "StreamSpecification": {"StreamEnabled": true, "StreamViewType": "NEW_IMAGE"},
                "SSEDescription": {"Status": "ENABLED", "SSEType": "KMS"},
                "GlobalSecondaryIndexes": [{
                    "IndexName": "by-owner",
                    "IndexArn": "arn:aws:dynamodb:eu-west-1:1:table/orders/index/by-owner",
                    "KeySchema": [{"AttributeName": "owner", "KeyType": "HASH"}],
                    "Projection": {"ProjectionType": "KEYS_ONLY"},
                    "ProvisionedThroughput": {
                        "ReadCapacityUnits": 1,
                        "WriteCapacityUnits": 1,
                        "NumberOfDecreasesToday": 0
                    },
                    "IndexStatus": "ACTIVE",
                    "Backfilling": false
                }],
                "ItemCount": 3
            }
        });

        let record: SchemaRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.table.provisioned_throughput.capacity, ProvisionedThroughput::new(5, 5));
        assert_eq!(record.table.extra["TableId"], "4f1c-9a2e");

        let written = serde_json::to_value(&record).unwrap();
        assert_eq!(written, raw);
    }

    #[test]
    fn test_scan_page_keeps_consumed_capacity() {
        let raw = serde_json::json!({
            "Items": [{"id": {"S": "a"}}],
            "Count": 1,
            "ScannedCount": 1,
            "ConsumedCapacity": {"TableName": "orders", "CapacityUnits": 0.5}
        });

        let page: ScanPage = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(serde_json::to_value(&page).unwrap(), raw);
    }

    #[test]
    fn test_scan_page_omits_missing_continuation() {
        let page = ScanPage::default();
        let json = serde_json::to_string(&page).unwrap();
        assert!(!json.contains("LastEvaluatedKey"));
        assert!(json.contains("\"Items\""));
    }

    #[test]
    fn test_unknown_table_status() {
        let status: TableStatus = serde_json::from_str("\"ARCHIVED\"").unwrap();
        assert_eq!(status, TableStatus::Unknown);
        assert_eq!(TableStatus::parse("DELETING"), TableStatus::Deleting);
    }
}
