//! The versioned resource type.
//!
//! A [`Resource`] carries identity (`resource_type`, `id`), version metadata
//! (`version_id`, `last_updated`) and the JSON body. The document form
//! written to history and to the backend embeds the metadata into the body
//! as `resourceType`, `id`, `meta.versionId` and `meta.lastUpdated`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{StorageResult, ValidationError};

/// Properties added by document backends that never belong to the resource.
pub const SYSTEM_PROPERTIES: &[&str] = &["_rid", "_self", "_etag", "_attachments", "_ts"];

/// A FHIR resource with version metadata.
///
/// # Examples
///
/// ```
/// use helios_docstore::types::Resource;
/// use serde_json::json;
///
/// let resource = Resource::new(
///     "Patient",
///     json!({"resourceType": "Patient", "id": "123", "name": [{"family": "Smith"}]}),
/// );
///
/// assert_eq!(resource.resource_type(), "Patient");
/// assert_eq!(resource.id(), "123");
/// assert!(resource.version_id().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    resource_type: String,
    id: String,
    version_id: String,
    last_updated: Option<DateTime<Utc>>,
    body: Value,
}

impl Resource {
    /// Creates an unsaved resource. The id is taken from `body.id` when present.
    pub fn new(resource_type: impl Into<String>, body: Value) -> Self {
        let id = body
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Self {
            resource_type: resource_type.into(),
            id,
            version_id: String::new(),
            last_updated: None,
            body,
        }
    }

    /// Parses a stored document.
    ///
    /// Backend system properties are stripped. Version metadata is read from
    /// `meta`; an unparseable `meta.lastUpdated` is treated as absent.
    pub fn from_document(mut document: Value) -> StorageResult<Self> {
        let object = document
            .as_object_mut()
            .ok_or_else(|| ValidationError::InvalidResource {
                message: "document is not a JSON object".to_string(),
            })?;

        for property in SYSTEM_PROPERTIES {
            object.remove(*property);
        }

        let resource_type = object
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::MissingRequiredField {
                field: "resourceType".to_string(),
            })?
            .to_string();

        let meta = object.get("meta");
        let version_id = meta
            .and_then(|m| m.get("versionId"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let last_updated = meta
            .and_then(|m| m.get("lastUpdated"))
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let mut resource = Resource::new(resource_type, document);
        resource.version_id = version_id;
        resource.last_updated = last_updated;
        Ok(resource)
    }

    /// Parses a serialized document.
    pub fn from_slice(bytes: &[u8]) -> StorageResult<Self> {
        let document: Value = serde_json::from_slice(bytes)?;
        Self::from_document(document)
    }

    /// Returns the resource type.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the logical id, empty for a resource that was never saved.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the version id, empty for a resource that was never saved.
    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    /// Returns when this version was written.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Returns the resource body.
    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Returns a mutable reference to the body.
    pub fn body_mut(&mut self) -> &mut Value {
        &mut self.body
    }

    /// Consumes self and returns the body.
    pub fn into_body(self) -> Value {
        self.body
    }

    /// Sets the logical id.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Builder form of [`set_id`](Self::set_id).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.set_id(id);
        self
    }

    /// Stamps a new version onto the resource.
    pub(crate) fn assign_version(&mut self, version_id: String, last_updated: DateTime<Utc>) {
        self.version_id = version_id;
        self.last_updated = Some(last_updated);
    }

    /// Returns `{type}/{id}`.
    pub fn url(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }

    /// Returns `{type}/{id}/_history/{version}`.
    pub fn versioned_url(&self) -> String {
        format!(
            "{}/{}/_history/{}",
            self.resource_type, self.id, self.version_id
        )
    }

    /// Returns a weak ETag for the current version.
    pub fn etag(&self) -> String {
        format!("W/\"{}\"", self.version_id)
    }

    /// Returns the document form with identity and meta embedded.
    pub fn to_document(&self) -> Value {
        let mut object = match &self.body {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };

        object.insert(
            "resourceType".to_string(),
            Value::String(self.resource_type.clone()),
        );
        if !self.id.is_empty() {
            object.insert("id".to_string(), Value::String(self.id.clone()));
        }

        let mut meta = match object.remove("meta") {
            Some(Value::Object(meta)) => meta,
            _ => Map::new(),
        };
        if !self.version_id.is_empty() {
            meta.insert(
                "versionId".to_string(),
                Value::String(self.version_id.clone()),
            );
        }
        if let Some(ts) = self.last_updated {
            meta.insert(
                "lastUpdated".to_string(),
                Value::String(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
        if !meta.is_empty() {
            object.insert("meta".to_string(), Value::Object(meta));
        }

        Value::Object(object)
    }

    /// Serializes the document form.
    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_document())?)
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}
