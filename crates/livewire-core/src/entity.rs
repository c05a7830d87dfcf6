//! Entity types for Livewire.
//!
//! An entity is one tracked telemetry item (a motor, a sensor, ...) keyed by a
//! caller-defined identifier and grouped into a fixed set of categories.

use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum entity identifier length in bytes.
pub const MAX_ENTITY_ID_LENGTH: usize = 256;

/// Validate an entity identifier.
///
/// # Errors
///
/// Returns an error message if the identifier is invalid.
pub fn validate_entity_id(id: &str) -> Result<(), &'static str> {
    if id.is_empty() {
        return Err("Entity id cannot be empty");
    }
    if id.len() > MAX_ENTITY_ID_LENGTH {
        return Err("Entity id too long");
    }
    if id.chars().any(char::is_control) {
        return Err("Entity id contains control characters");
    }
    Ok(())
}

/// A validated entity identifier.
///
/// Identifiers arrive either as strings or as integers; integers are carried
/// in their decimal form so `7` and `"7"` name the same entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawEntityId", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Create a new entity identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidEntityId`] if the identifier is empty, too
    /// long, or contains control characters.
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        validate_entity_id(&id).map_err(StoreError::InvalidEntityId)?;
        Ok(Self(id))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Wire representation of an identifier before validation.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntityId {
    Number(u64),
    Text(String),
}

impl TryFrom<RawEntityId> for EntityId {
    type Error = StoreError;

    fn try_from(raw: RawEntityId) -> Result<Self, Self::Error> {
        match raw {
            RawEntityId::Number(n) => Ok(Self::from(n)),
            RawEntityId::Text(s) => Self::new(s),
        }
    }
}

/// The fixed set of entity categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Scalar motor outputs.
    Motors,
    /// Sensors and every other peripheral.
    Peripherals,
}

impl Category {
    /// Every recognized category.
    pub const ALL: [Category; 2] = [Category::Motors, Category::Peripherals];

    /// Get the category name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Motors => "motors",
            Self::Peripherals => "peripherals",
        }
    }

    /// Kind assigned to a new entity when the update carries none.
    #[must_use]
    pub fn default_kind(self) -> EntityKind {
        match self {
            Self::Motors => EntityKind::MotorScalar,
            Self::Peripherals => EntityKind::Unknown,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "motors" => Ok(Self::Motors),
            "peripherals" => Ok(Self::Peripherals),
            other => Err(StoreError::UnknownCategory(other.to_string())),
        }
    }
}

/// Peripheral type tag carried by an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    MotorScalar,
    SensorScalar,
    SensorBoolean,
    LimitSwitch,
    LinearActuator,
    Servo,
    ColorSensor,
    Unknown,
}

/// A point-in-time copy of one live entity.
///
/// Values handed out by the store are owned copies; mutating them never
/// affects the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity identifier.
    pub id: EntityId,
    /// Peripheral type tag.
    pub kind: EntityKind,
    /// Last reported reading.
    pub value: serde_json::Value,
    /// Display name from the rename index, if one was assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Entity {
    /// Create a new entity without a display name.
    #[must_use]
    pub fn new(id: EntityId, kind: EntityKind, value: serde_json::Value) -> Self {
        Self {
            id,
            kind,
            value,
            name: None,
        }
    }

    /// Attach a display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_id_validation() {
        assert!(validate_entity_id("m1").is_ok());
        assert!(validate_entity_id("").is_err());
        assert!(validate_entity_id("bad\nid").is_err());

        let long_id = "a".repeat(MAX_ENTITY_ID_LENGTH + 1);
        assert!(validate_entity_id(&long_id).is_err());
    }

    #[test]
    fn test_entity_id_rejects_empty() {
        assert!(matches!(
            EntityId::new(""),
            Err(StoreError::InvalidEntityId(_))
        ));
        assert!("".parse::<EntityId>().is_err());
    }

    #[test]
    fn test_entity_id_from_integer() {
        let id = EntityId::from(42);
        assert_eq!(id.as_str(), "42");
        assert_eq!(id, EntityId::new("42").unwrap());
    }

    #[test]
    fn test_entity_id_deserializes_string_or_integer() {
        let text: EntityId = serde_json::from_value(json!("motor-a")).unwrap();
        assert_eq!(text.as_str(), "motor-a");

        let number: EntityId = serde_json::from_value(json!(7)).unwrap();
        assert_eq!(number.as_str(), "7");

        assert!(serde_json::from_value::<EntityId>(json!("")).is_err());
        assert!(serde_json::from_value::<EntityId>(json!(null)).is_err());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("motors".parse::<Category>().unwrap(), Category::Motors);
        assert_eq!(
            "peripherals".parse::<Category>().unwrap(),
            Category::Peripherals
        );
        assert!(matches!(
            "servos".parse::<Category>(),
            Err(StoreError::UnknownCategory(name)) if name == "servos"
        ));
    }

    #[test]
    fn test_category_default_kind() {
        assert_eq!(Category::Motors.default_kind(), EntityKind::MotorScalar);
        assert_eq!(Category::Peripherals.default_kind(), EntityKind::Unknown);
    }

    #[test]
    fn test_entity_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(EntityKind::MotorScalar).unwrap(),
            json!("MOTOR_SCALAR")
        );
        let kind: EntityKind = serde_json::from_value(json!("LIMIT_SWITCH")).unwrap();
        assert_eq!(kind, EntityKind::LimitSwitch);
    }

    #[test]
    fn test_entity_serialization_skips_missing_name() {
        let entity = Entity::new(EntityId::from(1), EntityKind::Servo, json!(90));
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(value, json!({"id": "1", "kind": "SERVO", "value": 90}));

        let named = entity.with_name("wrist");
        assert_eq!(serde_json::to_value(&named).unwrap()["name"], json!("wrist"));
    }
}
