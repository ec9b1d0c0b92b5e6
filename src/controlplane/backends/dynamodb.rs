//! DynamoDB Table Store Adapter
//!
//! Talks to the AWS service, or to a local endpoint with static credentials.
//! Service error codes are classified into [`StoreErrorKind`] here and
//! nowhere else.

use crate::domain::model::{
    AttributeDefinition, AttributeValue, CreateTableRequest, GlobalSecondaryIndex, Item,
    KeySchemaElement, KeyType, LocalSecondaryIndex, Projection, ProvisionedThroughput,
    ScalarAttributeType, ScanPage, TableDescription, TableNamePage, TableStatus,
    ThroughputDescription, ThroughputUpdate,
};
use crate::domain::ports::TableStore;
use crate::error::{Error, Result, StoreErrorKind};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::primitives::{Blob, DateTime};
use aws_sdk_dynamodb::types as sdk;
use aws_sdk_dynamodb::Client;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, info};

// =============================================================================
// Configuration
// =============================================================================

/// Connection settings for the DynamoDB adapter
#[derive(Debug, Clone, Default)]
pub struct DynamoDbConfig {
    pub region: String,
    /// Explicit endpoint, e.g. `http://localhost:8000` for a local store
    pub endpoint_url: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Optional page-size hint for scans
    pub scan_limit: Option<u32>,
}

// =============================================================================
// DynamoDB Store
// =============================================================================

/// Table store backed by the DynamoDB API
pub struct DynamoDbStore {
    client: Client,
    config: DynamoDbConfig,
}

impl DynamoDbStore {
    pub async fn connect(config: DynamoDbConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(ref endpoint) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                loader = loader.credentials_provider(aws_sdk_dynamodb::config::Credentials::new(
                    access_key.clone(),
                    secret_key.clone(),
                    None,
                    None,
                    "static",
                ));
            }
            (None, None) => {}
            _ => {
                return Err(Error::Configuration(
                    "accessKey and secretKey must be given together".into(),
                ))
            }
        }

        let sdk_config = loader.load().await;
        info!(
            "Connected to DynamoDB in {} ({})",
            config.region,
            config.endpoint_url.as_deref().unwrap_or("default endpoint")
        );

        Ok(Self {
            client: Client::new(&sdk_config),
            config,
        })
    }
}

#[async_trait]
impl TableStore for DynamoDbStore {
    async fn list_tables(&self, exclusive_start: Option<&str>) -> Result<TableNamePage> {
        let output = self
            .client
            .list_tables()
            .set_exclusive_start_table_name(exclusive_start.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify("*", e))?;

        Ok(TableNamePage {
            table_names: output.table_names().to_vec(),
            last_evaluated_table_name: output.last_evaluated_table_name().map(str::to_string),
        })
    }

    async fn describe_table(&self, table: &str) -> Result<TableDescription> {
        let output = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| classify(table, e))?;

        let description = output.table().ok_or_else(|| Error::InvalidDescription {
            table: table.to_string(),
            reason: "describe-table returned no table".into(),
        })?;
        table_from_sdk(table, description)
    }

    async fn create_table(&self, request: &CreateTableRequest) -> Result<()> {
        let table = request.table_name.as_str();

        let attribute_definitions = request
            .attribute_definitions
            .iter()
            .map(|a| {
                sdk::AttributeDefinition::builder()
                    .attribute_name(&a.attribute_name)
                    .attribute_type(sdk::ScalarAttributeType::from(a.attribute_type.to_string().as_str()))
                    .build()
                    .map_err(build_error)
            })
            .collect::<Result<Vec<_>>>()?;

        let local_secondary_indexes = request
            .local_secondary_indexes
            .as_ref()
            .map(|lsis| {
                lsis.iter()
                    .map(|lsi| {
                        sdk::LocalSecondaryIndex::builder()
                            .index_name(&lsi.index_name)
                            .set_key_schema(Some(key_schema_to_sdk(&lsi.key_schema)?))
                            .projection(projection_to_sdk(&lsi.projection))
                            .build()
                            .map_err(build_error)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        let global_secondary_indexes = request
            .global_secondary_indexes
            .as_ref()
            .map(|gsis| {
                gsis.iter()
                    .map(|gsi| {
                        let throughput = gsi
                            .provisioned_throughput
                            .map(throughput_to_sdk)
                            .transpose()?;
                        sdk::GlobalSecondaryIndex::builder()
                            .index_name(&gsi.index_name)
                            .set_key_schema(Some(key_schema_to_sdk(&gsi.key_schema)?))
                            .projection(projection_to_sdk(&gsi.projection))
                            .set_provisioned_throughput(throughput)
                            .build()
                            .map_err(build_error)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        self.client
            .create_table()
            .table_name(table)
            .set_attribute_definitions(Some(attribute_definitions))
            .set_key_schema(Some(key_schema_to_sdk(&request.key_schema)?))
            .provisioned_throughput(throughput_to_sdk(request.provisioned_throughput)?)
            .set_local_secondary_indexes(local_secondary_indexes)
            .set_global_secondary_indexes(global_secondary_indexes)
            .send()
            .await
            .map_err(|e| classify(table, e))?;

        Ok(())
    }

    async fn delete_table(&self, table: &str) -> Result<TableStatus> {
        let output = self
            .client
            .delete_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| classify(table, e))?;

        Ok(output
            .table_description()
            .and_then(|d| d.table_status())
            .map(|s| TableStatus::parse(s.as_str()))
            .unwrap_or(TableStatus::Deleting))
    }

    async fn update_table(&self, table: &str, update: &ThroughputUpdate) -> Result<()> {
        let index_updates = update
            .indexes
            .iter()
            .map(|index| -> Result<_> {
                let action = sdk::UpdateGlobalSecondaryIndexAction::builder()
                    .index_name(&index.index_name)
                    .provisioned_throughput(throughput_to_sdk(index.provisioned_throughput)?)
                    .build()
                    .map_err(build_error)?;
                Ok(sdk::GlobalSecondaryIndexUpdate::builder()
                    .update(action)
                    .build())
            })
            .collect::<Result<Vec<_>>>()?;

        self.client
            .update_table()
            .table_name(table)
            .set_provisioned_throughput(update.table.map(throughput_to_sdk).transpose()?)
            .set_global_secondary_index_updates((!index_updates.is_empty()).then_some(index_updates))
            .send()
            .await
            .map_err(|e| classify(table, e))?;

        Ok(())
    }

    async fn scan(&self, table: &str, exclusive_start_key: Option<&Item>) -> Result<ScanPage> {
        let start_key = exclusive_start_key.map(item_to_sdk).transpose()?;

        let output = self
            .client
            .scan()
            .table_name(table)
            .set_exclusive_start_key(start_key)
            .set_limit(self.config.scan_limit.map(|l| l as i32))
            .send()
            .await
            .map_err(|e| classify(table, e))?;

        debug!("Scanned {} item(s) from {}", output.count(), table);

        Ok(ScanPage {
            items: output
                .items()
                .iter()
                .map(|item| item_from_sdk(table, item))
                .collect::<Result<_>>()?,
            count: i64::from(output.count()),
            scanned_count: i64::from(output.scanned_count()),
            last_evaluated_key: output
                .last_evaluated_key()
                .map(|key| item_from_sdk(table, key))
                .transpose()?,
            extra: Map::new(),
        })
    }

    async fn batch_write(&self, table: &str, items: &[Item]) -> Result<Vec<Item>> {
        let requests = items
            .iter()
            .map(|item| -> Result<_> {
                let put = sdk::PutRequest::builder()
                    .set_item(Some(item_to_sdk(item)?))
                    .build()
                    .map_err(build_error)?;
                Ok(sdk::WriteRequest::builder().put_request(put).build())
            })
            .collect::<Result<Vec<_>>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .send()
            .await
            .map_err(|e| classify(table, e))?;

        output
            .unprocessed_items()
            .and_then(|unprocessed| unprocessed.get(table))
            .map(|requests| {
                requests
                    .iter()
                    .filter_map(|r| r.put_request())
                    .map(|put| item_from_sdk(table, put.item()))
                    .collect()
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn store_name(&self) -> &str {
        "dynamodb"
    }
}

// =============================================================================
// Error Classification
// =============================================================================

fn classify<E, R>(table: &str, err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata,
{
    let kind = match err.code() {
        Some("ResourceNotFoundException") => StoreErrorKind::ResourceNotFound,
        Some("ResourceInUseException") => StoreErrorKind::ResourceInUse,
        Some("LimitExceededException") => StoreErrorKind::LimitExceeded,
        Some("ThrottlingException")
        | Some("ProvisionedThroughputExceededException")
        | Some("RequestLimitExceeded") => StoreErrorKind::Throttling,
        Some("ValidationException") => StoreErrorKind::Validation,
        _ => StoreErrorKind::Other,
    };
    let message = match (err.code(), err.message()) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (Some(code), None) => code.to_string(),
        _ => err.to_string(),
    };
    Error::store(kind, table, message)
}

fn build_error(err: aws_sdk_dynamodb::error::BuildError) -> Error {
    Error::Internal(format!("Invalid DynamoDB request: {}", err))
}

// =============================================================================
// Conversions
// =============================================================================

fn value_to_sdk(value: &AttributeValue) -> Result<sdk::AttributeValue> {
    let blob = |text: &str| {
        BASE64
            .decode(text)
            .map(Blob::new)
            .map_err(|e| Error::Internal(format!("Invalid base64 binary attribute: {}", e)))
    };

    Ok(match value {
        AttributeValue::S(s) => sdk::AttributeValue::S(s.clone()),
        AttributeValue::N(n) => sdk::AttributeValue::N(n.clone()),
        AttributeValue::B(b) => sdk::AttributeValue::B(blob(b)?),
        AttributeValue::Bool(b) => sdk::AttributeValue::Bool(*b),
        AttributeValue::Null(n) => sdk::AttributeValue::Null(*n),
        AttributeValue::Ss(ss) => sdk::AttributeValue::Ss(ss.clone()),
        AttributeValue::Ns(ns) => sdk::AttributeValue::Ns(ns.clone()),
        AttributeValue::Bs(bs) => {
            sdk::AttributeValue::Bs(bs.iter().map(|b| blob(b)).collect::<Result<_>>()?)
        }
        AttributeValue::L(l) => {
            sdk::AttributeValue::L(l.iter().map(value_to_sdk).collect::<Result<_>>()?)
        }
        AttributeValue::M(m) => sdk::AttributeValue::M(item_to_sdk(m)?),
    })
}

/// Convert one SDK value; `attribute` names the top-level attribute for errors
fn value_from_sdk(table: &str, attribute: &str, value: &sdk::AttributeValue) -> Result<AttributeValue> {
    Ok(match value {
        sdk::AttributeValue::S(s) => AttributeValue::S(s.clone()),
        sdk::AttributeValue::N(n) => AttributeValue::N(n.clone()),
        sdk::AttributeValue::B(b) => AttributeValue::B(BASE64.encode(b.as_ref())),
        sdk::AttributeValue::Bool(b) => AttributeValue::Bool(*b),
        sdk::AttributeValue::Ss(ss) => AttributeValue::Ss(ss.clone()),
        sdk::AttributeValue::Ns(ns) => AttributeValue::Ns(ns.clone()),
        sdk::AttributeValue::Bs(bs) => {
            AttributeValue::Bs(bs.iter().map(|b| BASE64.encode(b.as_ref())).collect())
        }
        sdk::AttributeValue::L(l) => AttributeValue::L(
            l.iter()
                .map(|v| value_from_sdk(table, attribute, v))
                .collect::<Result<_>>()?,
        ),
        sdk::AttributeValue::M(m) => AttributeValue::M(item_from_sdk(table, m)?),
        sdk::AttributeValue::Null(n) => AttributeValue::Null(*n),
        _ => {
            return Err(Error::UnsupportedAttribute {
                table: table.to_string(),
                attribute: attribute.to_string(),
            })
        }
    })
}

fn item_to_sdk(item: &Item) -> Result<HashMap<String, sdk::AttributeValue>> {
    item.iter()
        .map(|(name, value)| -> Result<_> { Ok((name.clone(), value_to_sdk(value)?)) })
        .collect()
}

fn item_from_sdk(table: &str, item: &HashMap<String, sdk::AttributeValue>) -> Result<Item> {
    item.iter()
        .map(|(name, value)| -> Result<_> { Ok((name.clone(), value_from_sdk(table, name, value)?)) })
        .collect()
}

fn throughput_to_sdk(throughput: ProvisionedThroughput) -> Result<sdk::ProvisionedThroughput> {
    sdk::ProvisionedThroughput::builder()
        .read_capacity_units(throughput.read_capacity_units)
        .write_capacity_units(throughput.write_capacity_units)
        .build()
        .map_err(build_error)
}

fn throughput_from_sdk(
    throughput: Option<&sdk::ProvisionedThroughputDescription>,
) -> Option<ThroughputDescription> {
    throughput.map(|t| {
        let mut extra = Map::new();
        put(&mut extra, "LastIncreaseDateTime", t.last_increase_date_time().map(timestamp));
        put(&mut extra, "LastDecreaseDateTime", t.last_decrease_date_time().map(timestamp));
        put(&mut extra, "NumberOfDecreasesToday", t.number_of_decreases_today());
        ThroughputDescription {
            capacity: ProvisionedThroughput::new(
                t.read_capacity_units().unwrap_or(0),
                t.write_capacity_units().unwrap_or(0),
            ),
            extra,
        }
    })
}

/// Insert `value` under `key` when present
fn put<T: Into<Value>>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value.into());
    }
}

/// Epoch seconds, as the wire JSON carries timestamps
fn timestamp(time: &DateTime) -> Value {
    Value::from(time.as_secs_f64())
}

/// Descriptive fields of a describe response that have no typed field
fn table_extra_from_sdk(desc: &sdk::TableDescription) -> Map<String, Value> {
    let mut extra = Map::new();
    put(&mut extra, "TableId", desc.table_id());
    put(&mut extra, "CreationDateTime", desc.creation_date_time().map(timestamp));

    if let Some(billing) = desc.billing_mode_summary() {
        let mut summary = Map::new();
        put(&mut summary, "BillingMode", billing.billing_mode().map(|m| m.as_str()));
        put(
            &mut summary,
            "LastUpdateToPayPerRequestDateTime",
            billing.last_update_to_pay_per_request_date_time().map(timestamp),
        );
        extra.insert("BillingModeSummary".to_string(), summary.into());
    }

    if let Some(stream) = desc.stream_specification() {
        let mut spec = Map::new();
        spec.insert("StreamEnabled".to_string(), stream.stream_enabled().into());
        put(&mut spec, "StreamViewType", stream.stream_view_type().map(|t| t.as_str()));
        extra.insert("StreamSpecification".to_string(), spec.into());
    }
    put(&mut extra, "LatestStreamLabel", desc.latest_stream_label());
    put(&mut extra, "LatestStreamArn", desc.latest_stream_arn());

    if let Some(sse) = desc.sse_description() {
        let mut summary = Map::new();
        put(&mut summary, "Status", sse.status().map(|s| s.as_str()));
        put(&mut summary, "SSEType", sse.sse_type().map(|t| t.as_str()));
        put(&mut summary, "KMSMasterKeyArn", sse.kms_master_key_arn());
        extra.insert("SSEDescription".to_string(), summary.into());
    }

    if let Some(class) = desc.table_class_summary() {
        let mut summary = Map::new();
        put(&mut summary, "TableClass", class.table_class().map(|c| c.as_str()));
        extra.insert("TableClassSummary".to_string(), summary.into());
    }
    put(&mut extra, "DeletionProtectionEnabled", desc.deletion_protection_enabled());

    extra
}

fn key_schema_to_sdk(keys: &[KeySchemaElement]) -> Result<Vec<sdk::KeySchemaElement>> {
    keys.iter()
        .map(|k| {
            sdk::KeySchemaElement::builder()
                .attribute_name(&k.attribute_name)
                .key_type(sdk::KeyType::from(k.key_type.to_string().as_str()))
                .build()
                .map_err(build_error)
        })
        .collect()
}

fn key_schema_from_sdk(table: &str, keys: &[sdk::KeySchemaElement]) -> Result<Vec<KeySchemaElement>> {
    keys.iter()
        .map(|k| -> Result<_> {
            let key_type = match k.key_type() {
                sdk::KeyType::Hash => KeyType::Hash,
                sdk::KeyType::Range => KeyType::Range,
                other => {
                    return Err(Error::InvalidDescription {
                        table: table.to_string(),
                        reason: format!("unknown key type {}", other.as_str()),
                    })
                }
            };
            Ok(KeySchemaElement {
                attribute_name: k.attribute_name().to_string(),
                key_type,
            })
        })
        .collect()
}

fn projection_to_sdk(projection: &Projection) -> sdk::Projection {
    sdk::Projection::builder()
        .set_projection_type(
            projection
                .projection_type
                .as_deref()
                .map(sdk::ProjectionType::from),
        )
        .set_non_key_attributes(projection.non_key_attributes.clone())
        .build()
}

fn projection_from_sdk(projection: Option<&sdk::Projection>) -> Projection {
    projection
        .map(|p| Projection {
            projection_type: p.projection_type().map(|t| t.as_str().to_string()),
            non_key_attributes: (!p.non_key_attributes().is_empty())
                .then(|| p.non_key_attributes().to_vec()),
        })
        .unwrap_or_default()
}

fn table_from_sdk(table: &str, desc: &sdk::TableDescription) -> Result<TableDescription> {
    let attribute_definitions = desc
        .attribute_definitions()
        .iter()
        .map(|a| -> Result<_> {
            let attribute_type = match a.attribute_type() {
                sdk::ScalarAttributeType::S => ScalarAttributeType::S,
                sdk::ScalarAttributeType::N => ScalarAttributeType::N,
                sdk::ScalarAttributeType::B => ScalarAttributeType::B,
                other => {
                    return Err(Error::InvalidDescription {
                        table: table.to_string(),
                        reason: format!("unknown attribute type {}", other.as_str()),
                    })
                }
            };
            Ok(AttributeDefinition {
                attribute_name: a.attribute_name().to_string(),
                attribute_type,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let local_secondary_indexes = if desc.local_secondary_indexes().is_empty() {
        None
    } else {
        Some(
            desc.local_secondary_indexes()
                .iter()
                .map(|lsi| -> Result<_> {
                    let mut extra = Map::new();
                    put(&mut extra, "IndexArn", lsi.index_arn());
                    put(&mut extra, "IndexSizeBytes", lsi.index_size_bytes());
                    put(&mut extra, "ItemCount", lsi.item_count());
                    Ok(LocalSecondaryIndex {
                        index_name: lsi.index_name().unwrap_or_default().to_string(),
                        key_schema: key_schema_from_sdk(table, lsi.key_schema())?,
                        projection: projection_from_sdk(lsi.projection()),
                        extra,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        )
    };

    let global_secondary_indexes = if desc.global_secondary_indexes().is_empty() {
        None
    } else {
        Some(
            desc.global_secondary_indexes()
                .iter()
                .map(|gsi| -> Result<_> {
                    let mut extra = Map::new();
                    put(&mut extra, "IndexArn", gsi.index_arn());
                    put(&mut extra, "IndexSizeBytes", gsi.index_size_bytes());
                    put(&mut extra, "ItemCount", gsi.item_count());
                    put(&mut extra, "Backfilling", gsi.backfilling());
                    Ok(GlobalSecondaryIndex {
                        index_name: gsi.index_name().unwrap_or_default().to_string(),
                        key_schema: key_schema_from_sdk(table, gsi.key_schema())?,
                        projection: projection_from_sdk(gsi.projection()),
                        provisioned_throughput: throughput_from_sdk(gsi.provisioned_throughput()),
                        index_status: gsi.index_status().map(|s| s.as_str().to_string()),
                        extra,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        )
    };

    Ok(TableDescription {
        table_name: desc.table_name().unwrap_or(table).to_string(),
        attribute_definitions,
        key_schema: key_schema_from_sdk(table, desc.key_schema())?,
        provisioned_throughput: throughput_from_sdk(desc.provisioned_throughput())
            .unwrap_or_else(|| ProvisionedThroughput::new(0, 0).into()),
        table_status: desc
            .table_status()
            .map(|s| TableStatus::parse(s.as_str()))
            .unwrap_or(TableStatus::Unknown),
        local_secondary_indexes,
        global_secondary_indexes,
        item_count: desc.item_count(),
        table_size_bytes: desc.table_size_bytes(),
        table_arn: desc.table_arn().map(str::to_string),
        extra: table_extra_from_sdk(desc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_values_round_trip_through_base64() {
        let value = AttributeValue::Bs(vec![BASE64.encode(b"abc"), BASE64.encode([0u8, 255])]);
        let sdk_value = value_to_sdk(&value).unwrap();
        assert_eq!(value_from_sdk("orders", "blobs", &sdk_value).unwrap(), value);
    }

    #[test]
    fn test_nested_values_convert_through_lists_and_maps() {
        let mut inner = HashMap::new();
        inner.insert("flag".to_string(), sdk::AttributeValue::Bool(true));
        let mut item = HashMap::new();
        item.insert("id".to_string(), sdk::AttributeValue::S("a".into()));
        item.insert(
            "nested".to_string(),
            sdk::AttributeValue::L(vec![
                sdk::AttributeValue::M(inner),
                sdk::AttributeValue::Null(true),
            ]),
        );

        let converted = item_from_sdk("orders", &item).unwrap();
        let mut flag = Item::new();
        flag.insert("flag".into(), AttributeValue::Bool(true));
        assert_eq!(
            converted["nested"],
            AttributeValue::L(vec![AttributeValue::M(flag), AttributeValue::Null(true)])
        );
        assert_eq!(item_to_sdk(&converted).unwrap(), item);
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        assert!(value_to_sdk(&AttributeValue::B("not base64!".into())).is_err());
    }

    #[test]
    fn test_table_description_conversion() {
        let sdk_desc = sdk::TableDescription::builder()
            .table_name("orders")
            .attribute_definitions(
                sdk::AttributeDefinition::builder()
                    .attribute_name("id")
                    .attribute_type(sdk::ScalarAttributeType::S)
                    .build()
                    .unwrap(),
            )
            .key_schema(
                sdk::KeySchemaElement::builder()
                    .attribute_name("id")
                    .key_type(sdk::KeyType::Hash)
                    .build()
                    .unwrap(),
            )
            .provisioned_throughput(
                sdk::ProvisionedThroughputDescription::builder()
                    .read_capacity_units(5)
                    .write_capacity_units(7)
                    .build(),
            )
            .table_status(sdk::TableStatus::Active)
            .build();

        let desc = table_from_sdk("orders", &sdk_desc).unwrap();
        assert_eq!(desc.table_name, "orders");
        assert_eq!(desc.provisioned_throughput.capacity, ProvisionedThroughput::new(5, 7));
        assert_eq!(desc.table_status, TableStatus::Active);
        assert_eq!(desc.key_attribute_names(), vec!["id"]);
        assert!(desc.global_secondary_indexes.is_none());
    }

    #[test]
    fn test_description_keeps_descriptive_fields() {
        let sdk_desc = sdk::TableDescription::builder()
            .table_name("orders")
            .table_id("4f1c-9a2e")
            .creation_date_time(DateTime::from_secs(1_700_000_000))
            .billing_mode_summary(
                sdk::BillingModeSummary::builder()
                    .billing_mode(sdk::BillingMode::Provisioned)
                    .build(),
            )
            .provisioned_throughput(
                sdk::ProvisionedThroughputDescription::builder()
                    .read_capacity_units(5)
                    .write_capacity_units(5)
                    .number_of_decreases_today(2)
                    .build(),
            )
            .build();

        let desc = table_from_sdk("orders", &sdk_desc).unwrap();
        let json = serde_json::to_value(&desc).unwrap();

        assert_eq!(json["TableId"], "4f1c-9a2e");
        assert_eq!(json["CreationDateTime"], 1_700_000_000.0);
        assert_eq!(json["BillingModeSummary"]["BillingMode"], "PROVISIONED");
        assert_eq!(json["ProvisionedThroughput"]["NumberOfDecreasesToday"], 2);
        assert_eq!(json["ProvisionedThroughput"]["ReadCapacityUnits"], 5);
    }
}
