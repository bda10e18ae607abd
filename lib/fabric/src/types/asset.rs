//! Asset records as marshalled into and out of contract calls

use serde::{Deserialize, Deserializer, Serialize};

/// Ledger-owned asset. Field names match the contract's JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Color")]
    pub color: String,
    #[serde(rename = "Size", deserialize_with = "flexible_u64")]
    pub size: u64,
    #[serde(rename = "Owner")]
    pub owner: String,
    #[serde(rename = "AppraisedValue", deserialize_with = "flexible_u64")]
    pub appraised_value: u64,
}

impl AssetRecord {
    /// Contract arguments in `ID, Color, Size, Owner, AppraisedValue` order.
    pub fn to_args(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.color.clone(),
            self.size.to_string(),
            self.owner.clone(),
            self.appraised_value.to_string(),
        ]
    }
}

/// Body of an update; the ID comes from the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetUpdate {
    #[serde(rename = "Color")]
    pub color: String,
    #[serde(rename = "Size", deserialize_with = "flexible_u64")]
    pub size: u64,
    #[serde(rename = "Owner")]
    pub owner: String,
    #[serde(rename = "AppraisedValue", deserialize_with = "flexible_u64")]
    pub appraised_value: u64,
}

impl AssetUpdate {
    pub fn into_record(self, id: impl Into<String>) -> AssetRecord {
        AssetRecord {
            id: id.into(),
            color: self.color,
            size: self.size,
            owner: self.owner,
            appraised_value: self.appraised_value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Owner")]
    pub owner: String,
}

/// Accepts `5` as well as `"5"`; HTML forms and older clients send strings.
fn flexible_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(|_| {
            serde::de::Error::custom(format!("expected a non-negative integer, got {:?}", s))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_args_order() {
        let asset = AssetRecord {
            id: "asset1".to_string(),
            color: "blue".to_string(),
            size: 5,
            owner: "Tom".to_string(),
            appraised_value: 300,
        };
        assert_eq!(asset.to_args(), vec!["asset1", "blue", "5", "Tom", "300"]);
    }

    #[test]
    fn test_asset_accepts_numeric_strings() {
        let asset: AssetRecord = serde_json::from_str(
            r#"{"ID":"asset1","Color":"blue","Size":"5","Owner":"Tom","AppraisedValue":300}"#,
        )
        .unwrap();
        assert_eq!(asset.size, 5);
        assert_eq!(asset.appraised_value, 300);
    }

    #[test]
    fn test_asset_rejects_negative_size() {
        let result: Result<AssetRecord, _> = serde_json::from_str(
            r#"{"ID":"asset1","Color":"blue","Size":-5,"Owner":"Tom","AppraisedValue":300}"#,
        );
        assert!(result.is_err());

        let result: Result<AssetRecord, _> = serde_json::from_str(
            r#"{"ID":"asset1","Color":"blue","Size":"five","Owner":"Tom","AppraisedValue":300}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_asset_serializes_contract_field_names() {
        let asset = AssetRecord {
            id: "asset1".to_string(),
            color: "blue".to_string(),
            size: 5,
            owner: "Tom".to_string(),
            appraised_value: 300,
        };
        let json = serde_json::to_string(&asset).unwrap();
        assert!(json.contains(r#""ID":"asset1""#));
        assert!(json.contains(r#""AppraisedValue":300"#));
    }

    #[test]
    fn test_update_into_record_uses_path_id() {
        let update: AssetUpdate = serde_json::from_str(
            r#"{"Color":"red","Size":10,"Owner":"Ana","AppraisedValue":"450"}"#,
        )
        .unwrap();
        let record = update.into_record("asset7");
        assert_eq!(record.id, "asset7");
        assert_eq!(record.appraised_value, 450);
    }
}
