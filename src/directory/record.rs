// SPDX-License-Identifier: GPL-3.0-only

//! Asset records and assignment input

use crate::constants::{directory, fields};
use crate::errors::ValidationError;
use crate::store::TableEntity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The persisted unit: one asset assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub partition_key: String,
    pub row_key: String,
    pub asset_no: String,
    pub dept: String,
    pub assigned_to: String,
    /// UTC timestamp, `YYYY-MM-DDTHH:MM:SS.sssZ`
    pub assigned_at: String,
    /// Server time of the last write, same format as `assigned_at`
    pub updated_at: String,
}

impl AssetRecord {
    /// Convert to the table entity written to the store
    pub fn to_entity(&self) -> TableEntity {
        TableEntity::new(&self.partition_key, &self.row_key)
            .with(fields::ASSET_NO, self.asset_no.as_str())
            .with(fields::DEPT, self.dept.as_str())
            .with(fields::ASSIGNED_TO, self.assigned_to.as_str())
            .with(fields::ASSIGNED_AT, self.assigned_at.as_str())
            .with(fields::UPDATED_AT, self.updated_at.as_str())
    }

    /// Read a record back from a stored entity
    ///
    /// Entities written by other tools may lack `assetNo`; the row key is
    /// used instead.
    pub fn from_entity(entity: &TableEntity) -> Self {
        let asset_no = match entity.string(fields::ASSET_NO) {
            s if s.is_empty() => entity.row_key.clone(),
            s => s,
        };
        Self {
            partition_key: entity.partition_key.clone(),
            row_key: entity.row_key.clone(),
            asset_no,
            dept: entity.string(fields::DEPT),
            assigned_to: entity.string(fields::ASSIGNED_TO),
            assigned_at: entity.string(fields::ASSIGNED_AT),
            updated_at: entity.string(fields::UPDATED_AT),
        }
    }
}

/// Untrimmed assignment as submitted by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentInput {
    pub asset_no: Option<String>,
    pub dept: Option<String>,
    pub assigned_to: Option<String>,
    pub assigned_at: Option<String>,
}

impl AssignmentInput {
    pub fn new(
        asset_no: impl Into<String>,
        dept: impl Into<String>,
        assigned_to: impl Into<String>,
    ) -> Self {
        Self {
            asset_no: Some(asset_no.into()),
            dept: Some(dept.into()),
            assigned_to: Some(assigned_to.into()),
            assigned_at: None,
        }
    }

    /// Set an explicit assignment time
    pub fn assigned_at(mut self, assigned_at: impl Into<String>) -> Self {
        self.assigned_at = Some(assigned_at.into());
        self
    }

    /// Parse a JSON request body
    ///
    /// An empty body reads as an empty object so the caller gets the usual
    /// "required" message. Scalars are coerced to strings; null, arrays and
    /// objects count as missing.
    pub fn from_json(body: &[u8]) -> Result<Self, ValidationError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(ValidationError::MalformedBody(
                "expected a JSON object".to_string(),
            ));
        };

        Ok(Self {
            asset_no: map.get(fields::ASSET_NO).and_then(coerce_scalar),
            dept: map.get(fields::DEPT).and_then(coerce_scalar),
            assigned_to: map.get(fields::ASSIGNED_TO).and_then(coerce_scalar),
            assigned_at: map.get(fields::ASSIGNED_AT).and_then(coerce_scalar),
        })
    }
}

fn coerce_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Trim an optional field, mapping blank to `None`
pub(crate) fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Check an asset number can be used as a row key
pub(crate) fn check_asset_no(asset_no: &str) -> Result<(), ValidationError> {
    if let Some(c) = asset_no
        .chars()
        .find(|c| directory::FORBIDDEN_KEY_CHARS.contains(c) || c.is_control())
    {
        return Err(ValidationError::InvalidField {
            field: fields::ASSET_NO,
            reason: format!("must not contain {:?}", c),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_coerces_scalars() {
        let input = AssignmentInput::from_json(
            br#"{"assetNo": 1042, "dept": "AR", "assignedTo": true, "assignedAt": null}"#,
        )
        .unwrap();
        assert_eq!(input.asset_no.as_deref(), Some("1042"));
        assert_eq!(input.dept.as_deref(), Some("AR"));
        assert_eq!(input.assigned_to.as_deref(), Some("true"));
        assert_eq!(input.assigned_at, None);
    }

    #[test]
    fn test_from_json_nested_values_are_missing() {
        let input =
            AssignmentInput::from_json(br#"{"assetNo": ["A1"], "dept": {"x": 1}}"#).unwrap();
        assert_eq!(input.asset_no, None);
        assert_eq!(input.dept, None);
    }

    #[test]
    fn test_from_json_empty_body_is_empty_input() {
        assert_eq!(
            AssignmentInput::from_json(b"  ").unwrap(),
            AssignmentInput::default()
        );
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            AssignmentInput::from_json(b"{not json"),
            Err(ValidationError::MalformedBody(_))
        ));
        assert!(matches!(
            AssignmentInput::from_json(b"[1,2]"),
            Err(ValidationError::MalformedBody(_))
        ));
    }

    #[test]
    fn test_entity_roundtrip_keeps_wire_names() {
        let record = AssetRecord {
            partition_key: "assets".into(),
            row_key: "A1".into(),
            asset_no: "A1".into(),
            dept: "AR".into(),
            assigned_to: "Jo".into(),
            assigned_at: "2024-01-01T00:00:00.000Z".into(),
            updated_at: "2024-01-01T00:00:00.000Z".into(),
        };
        let entity = record.to_entity();
        assert_eq!(entity.string("assignedTo"), "Jo");
        assert_eq!(AssetRecord::from_entity(&entity), record);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["partitionKey"], "assets");
        assert_eq!(json["rowKey"], "A1");
        assert_eq!(json["assignedAt"], "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_asset_no_key_characters() {
        assert!(check_asset_no("LAP-0042").is_ok());
        assert!(check_asset_no("A/1").is_err());
        assert!(check_asset_no("A#1").is_err());
        assert!(check_asset_no("A\t1").is_err());
    }
}
