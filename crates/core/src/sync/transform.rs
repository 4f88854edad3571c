//! Field transformation
//!
//! Sets one field on every record to a literal or generated value. Inputs
//! are never mutated; each call returns fresh entities.

use std::fmt;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use fieldsync_domain::{Entity, EntityError, Result, SyncError};
use serde_json::Value;

/// Produces a value for one record.
pub type ValueGenerator = Arc<dyn Fn(&Entity) -> Value + Send + Sync>;

/// What to write into the transformed field.
#[derive(Clone)]
pub enum FieldValue {
    /// Same value for every record.
    Literal(Value),
    /// Evaluated once per record at transform time.
    Generated(ValueGenerator),
}

impl FieldValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn generated<F>(generator: F) -> Self
    where
        F: Fn(&Entity) -> Value + Send + Sync + 'static,
    {
        Self::Generated(Arc::new(generator))
    }

    /// Current UTC time as an RFC 3339 string.
    pub fn timestamp_now() -> Self {
        Self::generated(|_| Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)))
    }

    /// Current time as seconds since the Unix epoch.
    pub fn unix_seconds_now() -> Self {
        Self::generated(|_| Value::from(Utc::now().timestamp()))
    }

    fn resolve(&self, entity: &Entity) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Generated(generator) => generator(entity),
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

/// Sets `field` to `value` on each record.
#[derive(Debug, Clone)]
pub struct FieldTransformer {
    field: String,
    value: FieldValue,
}

impl FieldTransformer {
    /// # Errors
    /// Returns `SyncError::Configuration` if `field` is empty.
    pub fn new(field: impl Into<String>, value: FieldValue) -> Result<Self> {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(SyncError::Configuration("field name must not be empty".into()));
        }
        Ok(Self { field, value })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Fails before any record is touched if `field` is the identifier.
    ///
    /// # Errors
    /// Returns `SyncError::Configuration` when `field == id_field`.
    pub fn check_identifier(&self, id_field: &str) -> Result<()> {
        if self.field == id_field {
            return Err(SyncError::Configuration(format!(
                "field '{}' is the record identifier and cannot be transformed",
                self.field
            )));
        }
        Ok(())
    }

    pub fn apply(&self, entity: &Entity) -> Result<Entity> {
        entity.with_field(&self.field, self.value.resolve(entity)).map_err(|err| match err {
            EntityError::IdentifierImmutable(_) => SyncError::Configuration(err.to_string()),
            other => SyncError::Internal(other.to_string()),
        })
    }

    /// Transforms every record, preserving order and count.
    pub fn apply_all(&self, entities: &[Entity]) -> Result<Vec<Entity>> {
        entities.iter().map(|entity| self.apply(entity)).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entities() -> Vec<Entity> {
        vec![
            Entity::from_json(json!({"id": "a", "plan": "free"}), "id").unwrap(),
            Entity::from_json(json!({"id": "b"}), "id").unwrap(),
        ]
    }

    #[test]
    fn literal_value_is_applied_to_every_record() {
        let input = entities();
        let transformer = FieldTransformer::new("plan", FieldValue::literal("pro")).unwrap();

        let output = transformer.apply_all(&input).unwrap();

        assert_eq!(output.len(), 2);
        assert!(output.iter().all(|e| e.get("plan") == Some(&json!("pro"))));
        assert_eq!(output[0].id(), "a");
        assert_eq!(output[1].id(), "b");
        assert_eq!(input[0].get("plan"), Some(&json!("free")));
        assert_eq!(input[1].get("plan"), None);
    }

    #[test]
    fn reapplying_the_same_literal_changes_nothing() {
        let input = entities();
        let transformer = FieldTransformer::new("plan", FieldValue::literal("x")).unwrap();

        let once = transformer.apply_all(&input).unwrap();
        let twice = transformer.apply_all(&once).unwrap();

        assert_eq!(twice, once);
    }

    #[test]
    fn generator_sees_each_record() {
        let transformer = FieldTransformer::new(
            "label",
            FieldValue::generated(|entity| json!(format!("user-{}", entity.id()))),
        )
        .unwrap();

        let output = transformer.apply_all(&entities()).unwrap();
        assert_eq!(output[0].get("label"), Some(&json!("user-a")));
        assert_eq!(output[1].get("label"), Some(&json!("user-b")));
    }

    #[test]
    fn time_generators_produce_expected_shapes() {
        let entity = &entities()[0];
        let stamped = FieldTransformer::new("seen", FieldValue::timestamp_now())
            .unwrap()
            .apply(entity)
            .unwrap();
        let seen = stamped.get("seen").and_then(Value::as_str).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(seen).is_ok());

        let epoch = FieldTransformer::new("ts", FieldValue::unix_seconds_now())
            .unwrap()
            .apply(entity)
            .unwrap();
        assert!(epoch.get("ts").and_then(Value::as_i64).unwrap() > 1_600_000_000);
    }

    #[test]
    fn empty_and_identifier_fields_are_configuration_errors() {
        assert!(matches!(
            FieldTransformer::new("  ", FieldValue::literal(1)),
            Err(SyncError::Configuration(_))
        ));

        let transformer = FieldTransformer::new("id", FieldValue::literal("x")).unwrap();
        assert!(matches!(transformer.check_identifier("id"), Err(SyncError::Configuration(_))));
        assert!(matches!(transformer.apply(&entities()[0]), Err(SyncError::Configuration(_))));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let transformer = FieldTransformer::new("plan", FieldValue::literal("pro")).unwrap();
        assert!(transformer.apply_all(&[]).unwrap().is_empty());
    }
}
