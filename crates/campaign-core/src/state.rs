use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::schema::CampaignSchema;

/// Typed value of a campaign field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

/// Partial update: field name to newly confirmed value.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Partially filled campaign record, one slot per schema field in schema order.
///
/// The slot set is fixed at construction; writes to names outside it are refused.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignState {
    slots: Vec<(String, Option<FieldValue>)>,
}

impl CampaignState {
    pub fn empty(schema: &CampaignSchema) -> Self {
        Self {
            slots: schema.names().map(|name| (name.to_string(), None)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.slots
            .iter()
            .find(|(slot, _)| slot == name)
            .and_then(|(_, value)| value.as_ref())
    }

    /// Overwrite one field. Returns `false` when the name is not part of the schema.
    pub fn set(&mut self, name: &str, value: FieldValue) -> bool {
        match self.slots.iter_mut().find(|(slot, _)| slot == name) {
            Some((_, slot_value)) => {
                *slot_value = Some(value);
                true
            }
            None => false,
        }
    }

    /// Apply every schema field present in `partial`; unknown names are skipped.
    /// Returns the names that were written.
    pub fn apply(&mut self, partial: &FieldMap) -> Vec<String> {
        let mut written = Vec::new();
        for (name, value) in partial {
            if self.set(name, value.clone()) {
                written.push(name.clone());
            }
        }
        written
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(|(_, value)| value.is_some())
    }

    pub fn missing_fields(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn collected_count(&self) -> usize {
        self.slots.iter().filter(|(_, value)| value.is_some()).count()
    }
}

impl Serialize for CampaignState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for (name, value) in &self.slots {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
