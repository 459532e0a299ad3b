//! Resource catalogue
//!
//! The backend exposes the same handful of operations for every resource
//! kind. This module names the kinds and operations and holds the table
//! that maps each `(kind, operation)` pair to its verb, path and payload
//! field. The lifecycle engine is generic; everything kind-specific lives
//! here.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One CRUD-managed entity type of the shop backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Product categories
    Category,
    /// Motorcycles (admin inventory and the user's own garage)
    Motorcycle,
    /// Workshop services
    Service,
    /// The user's delivery addresses
    Address,
    /// Orders
    Order,
    /// Fuel log entries
    #[serde(rename = "fuel")]
    FuelEntry,
}

impl ResourceKind {
    /// Every resource kind, in catalogue order
    pub const ALL: [Self; 6] = [
        Self::Category,
        Self::Motorcycle,
        Self::Service,
        Self::Address,
        Self::Order,
        Self::FuelEntry,
    ];

    /// Stable lowercase name, used in logs, metrics and the CLI
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Motorcycle => "motorcycle",
            Self::Service => "service",
            Self::Address => "address",
            Self::Order => "order",
            Self::FuelEntry => "fuel",
        }
    }

    /// The endpoint serving `operation` for this kind, if the backend has one
    #[must_use]
    #[allow(clippy::too_many_lines)] // One arm per table cell
    pub fn endpoint(self, operation: OperationKind) -> Option<Endpoint> {
        use OperationKind as Op;

        let endpoint = match (self, operation) {
            // Categories
            (Self::Category, Op::List) => {
                Endpoint::new(Method::GET, "/api/v1/admin/view/all/category", "categories")
            },
            (Self::Category, Op::Details) => {
                Endpoint::new(Method::GET, "/api/v1/admin/category/{id}", "category")
            },
            (Self::Category, Op::Create) => {
                Endpoint::new(Method::POST, "/api/v1/add/category/new", "category")
            },
            (Self::Category, Op::Update) => {
                Endpoint::new(Method::PUT, "/api/v1/admin/category/{id}", "success")
            },
            (Self::Category, Op::Delete) => {
                Endpoint::new(Method::DELETE, "/api/v1/admin/category/{id}", "success")
            },

            // Motorcycles
            (Self::Motorcycle, Op::List) => {
                Endpoint::new(Method::GET, "/api/v1/admin/view/all/motorcycles", "motorcycles")
            },
            (Self::Motorcycle, Op::ListOwn) => {
                Endpoint::new(Method::GET, "/api/v1/list-motorcycle", "userMotorcycles")
            },
            (Self::Motorcycle, Op::Details) => {
                Endpoint::new(Method::GET, "/api/v1/admin/motorcycle/{id}", "motorcycle")
            },
            (Self::Motorcycle, Op::Create) => {
                Endpoint::new(Method::POST, "/api/v1/create/motorcycle/new", "motorcycle")
            },
            (Self::Motorcycle, Op::Update) => {
                Endpoint::new(Method::PUT, "/api/v1/admin/motorcycle/{id}", "success")
            },
            (Self::Motorcycle, Op::Delete) => {
                Endpoint::new(Method::DELETE, "/api/v1/admin/motorcycle/{id}", "success")
            },

            // Services
            (Self::Service, Op::List) => {
                Endpoint::new(Method::GET, "/api/v1/admin/view/all/services", "services")
            },
            (Self::Service, Op::ListOwn) => {
                Endpoint::new(Method::GET, "/api/v1/showAllServices", "services")
            },
            (Self::Service, Op::Details) => {
                Endpoint::new(Method::GET, "/api/v1/showSingleService/{id}", "service")
            },
            (Self::Service, Op::Create) => {
                Endpoint::new(Method::POST, "/api/v1/add-service", "service")
            },
            (Self::Service, Op::Update) => {
                Endpoint::new(Method::PUT, "/api/v1/admin/service/{id}", "success")
            },
            (Self::Service, Op::Delete) => {
                Endpoint::new(Method::DELETE, "/api/v1/admin/service/{id}", "success")
            },

            // Addresses, orders and fuel: paths follow the conventions above,
            // unconfirmed against the server
            (Self::Address, Op::ListOwn) => {
                Endpoint::new(Method::GET, "/api/v1/list-address", "userAddresses")
            },
            (Self::Address, Op::Details) => {
                Endpoint::new(Method::GET, "/api/v1/address/{id}", "address")
            },
            (Self::Address, Op::Create) => {
                Endpoint::new(Method::POST, "/api/v1/create/address/new", "address")
            },
            (Self::Address, Op::Update) => {
                Endpoint::new(Method::PUT, "/api/v1/address/{id}", "success")
            },
            (Self::Address, Op::Delete) => {
                Endpoint::new(Method::DELETE, "/api/v1/address/{id}", "success")
            },
            (Self::Address, Op::SetDefault) => {
                Endpoint::new(Method::PUT, "/api/v1/address/default/{id}", "success")
            },

            // Orders
            (Self::Order, Op::List) => Endpoint::new(Method::GET, "/api/v1/admin/orders", "alllistorders"),
            (Self::Order, Op::ListOwn) => Endpoint::new(Method::GET, "/api/v1/orders/me", "orders"),
            (Self::Order, Op::Details) => Endpoint::new(Method::GET, "/api/v1/order/{id}", "order"),
            (Self::Order, Op::Create) => Endpoint::new(Method::POST, "/api/v1/order/new", "order"),
            (Self::Order, Op::Update) => {
                Endpoint::new(Method::PUT, "/api/v1/admin/order/{id}", "success")
            },
            (Self::Order, Op::Delete) => {
                Endpoint::new(Method::DELETE, "/api/v1/admin/order/{id}", "success")
            },

            // Fuel log
            (Self::FuelEntry, Op::ListOwn) => Endpoint::new(Method::GET, "/api/v1/list-fuel", "userFuel"),
            (Self::FuelEntry, Op::Details) => Endpoint::new(Method::GET, "/api/v1/fuel/{id}", "fuel"),
            (Self::FuelEntry, Op::Create) => {
                Endpoint::new(Method::POST, "/api/v1/create/fuel/new", "fuel")
            },
            (Self::FuelEntry, Op::Update) => Endpoint::new(Method::PUT, "/api/v1/fuel/{id}", "success"),
            (Self::FuelEntry, Op::Delete) => {
                Endpoint::new(Method::DELETE, "/api/v1/fuel/{id}", "success")
            },

            _ => return None,
        };

        Some(endpoint)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognised resource kind name
#[derive(Debug, Error)]
#[error("unknown resource kind `{0}`")]
pub struct UnknownResourceKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownResourceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownResourceKind(s.to_string()))
    }
}

/// The operations a lifecycle can run, without their input
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Every record of the kind (admin listing)
    List,
    /// The signed-in user's records
    ListOwn,
    /// One record by id
    Details,
    /// Create a record
    Create,
    /// Update a record by id
    Update,
    /// Delete a record by id
    Delete,
    /// Mark one address as the user's default
    SetDefault,
}

impl OperationKind {
    /// Stable snake-case name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::ListOwn => "list_own",
            Self::Details => "details",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::SetDefault => "set_default",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An operation together with its input
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    /// Every record of the kind
    List,
    /// The signed-in user's records
    ListOwn,
    /// One record
    Details {
        /// Record id
        id: String,
    },
    /// Create a record from a field set
    Create {
        /// New record's fields
        body: RequestBody,
    },
    /// Replace fields of a record
    Update {
        /// Record id
        id: String,
        /// Changed fields
        body: RequestBody,
    },
    /// Delete a record
    Delete {
        /// Record id
        id: String,
    },
    /// Mark an address as default
    SetDefault {
        /// Address id
        id: String,
    },
}

impl Operation {
    /// The operation without its input
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::List => OperationKind::List,
            Self::ListOwn => OperationKind::ListOwn,
            Self::Details { .. } => OperationKind::Details,
            Self::Create { .. } => OperationKind::Create,
            Self::Update { .. } => OperationKind::Update,
            Self::Delete { .. } => OperationKind::Delete,
            Self::SetDefault { .. } => OperationKind::SetDefault,
        }
    }

    /// Record id the operation targets, if any
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Details { id } | Self::Update { id, .. } | Self::Delete { id } | Self::SetDefault { id } => {
                Some(id)
            },
            Self::List | Self::ListOwn | Self::Create { .. } => None,
        }
    }

    /// Consume the operation, yielding its request body if it has one
    #[must_use]
    pub fn into_body(self) -> Option<RequestBody> {
        match self {
            Self::Create { body } | Self::Update { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Where a success envelope keeps the payload
///
/// `{ "success": true, "motorcycle": { ... } }` has its payload under
/// `motorcycle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PayloadField(pub &'static str);

impl PayloadField {
    /// Field name inside the envelope
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.0
    }

    /// Take the payload out of a success envelope
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingPayload`](crate::error::ApiError::MissingPayload)
    /// when the envelope is not an object or lacks the field.
    pub fn extract(self, envelope: Value) -> Result<Value, crate::error::ApiError> {
        match envelope {
            Value::Object(mut fields) => fields
                .remove(self.0)
                .ok_or_else(|| crate::error::ApiError::MissingPayload(self.0.to_string())),
            _ => Err(crate::error::ApiError::MissingPayload(self.0.to_string())),
        }
    }
}

/// Verb, path template and payload field of one backend operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// HTTP method
    pub method: Method,
    /// Path relative to the API base URL; `{id}` marks the record id
    pub path: &'static str,
    /// Where the success envelope keeps the payload
    pub payload: PayloadField,
}

impl Endpoint {
    fn new(method: Method, path: &'static str, payload: &'static str) -> Self {
        Self {
            method,
            path,
            payload: PayloadField(payload),
        }
    }

    /// Whether the path needs a record id
    #[must_use]
    pub fn needs_id(&self) -> bool {
        self.path.contains("{id}")
    }
}

/// Field set sent with create and update operations
///
/// Sent as JSON unless it carries attachments, in which case it goes out
/// as multipart form data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestBody {
    /// Plain fields
    pub fields: Map<String, Value>,
    /// Binary parts (images)
    pub attachments: Vec<Attachment>,
}

impl RequestBody {
    /// Empty body
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Add a binary part
    #[must_use]
    pub fn attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Whether the body must be sent as multipart form data
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        !self.attachments.is_empty()
    }
}

impl From<Map<String, Value>> for RequestBody {
    fn from(fields: Map<String, Value>) -> Self {
        Self {
            fields,
            attachments: Vec::new(),
        }
    }
}

/// A file part of a multipart body
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Form field name
    pub field: String,
    /// File name reported to the server
    pub file_name: String,
    /// MIME type, e.g. `image/jpeg`
    pub content_type: String,
    /// File contents
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Create an attachment
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A record whose field set is owned by the server
///
/// Only the id is interpreted; everything else is kept as JSON for the
/// views to render.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Server-assigned id
    #[serde(rename = "_id")]
    pub id: String,
    /// Remaining fields, untouched
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entity {
    /// Look up a field
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests can unwrap
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_kind_supports_core_operations() {
        for kind in ResourceKind::ALL {
            for operation in [
                OperationKind::ListOwn,
                OperationKind::Details,
                OperationKind::Create,
                OperationKind::Update,
                OperationKind::Delete,
            ] {
                if kind == ResourceKind::Category && operation == OperationKind::ListOwn {
                    continue;
                }
                assert!(
                    kind.endpoint(operation).is_some(),
                    "{kind} should support {operation}"
                );
            }
        }
    }

    #[test]
    fn test_verbs_follow_operation() {
        for kind in ResourceKind::ALL {
            for (operation, method) in [
                (OperationKind::List, Method::GET),
                (OperationKind::ListOwn, Method::GET),
                (OperationKind::Details, Method::GET),
                (OperationKind::Create, Method::POST),
                (OperationKind::Update, Method::PUT),
                (OperationKind::Delete, Method::DELETE),
            ] {
                if let Some(endpoint) = kind.endpoint(operation) {
                    assert_eq!(endpoint.method, method, "{kind} {operation}");
                }
            }
        }
    }

    #[test]
    fn test_id_placeholder_matches_operation() {
        for kind in ResourceKind::ALL {
            for operation in [OperationKind::List, OperationKind::ListOwn, OperationKind::Create] {
                if let Some(endpoint) = kind.endpoint(operation) {
                    assert!(!endpoint.needs_id(), "{kind} {operation}");
                }
            }
            for operation in [OperationKind::Details, OperationKind::Update, OperationKind::Delete] {
                if let Some(endpoint) = kind.endpoint(operation) {
                    assert!(endpoint.needs_id(), "{kind} {operation}");
                }
            }
        }
    }

    #[test]
    fn test_set_default_only_for_addresses() {
        for kind in ResourceKind::ALL {
            assert_eq!(
                kind.endpoint(OperationKind::SetDefault).is_some(),
                kind == ResourceKind::Address
            );
        }
    }

    #[test]
    fn test_motorcycle_create_endpoint() {
        let endpoint = ResourceKind::Motorcycle
            .endpoint(OperationKind::Create)
            .unwrap();
        assert_eq!(endpoint.path, "/api/v1/create/motorcycle/new");
        assert_eq!(endpoint.payload.name(), "motorcycle");
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.name().parse::<ResourceKind>().ok(), Some(kind));
        }
        assert!("garage".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_payload_extraction() {
        let envelope = json!({ "success": true, "motorcycle": { "_id": "m1", "plateNumber": "ABC 123" } });
        let payload = PayloadField("motorcycle").extract(envelope);
        assert_eq!(payload, Ok(json!({ "_id": "m1", "plateNumber": "ABC 123" })));

        let missing = PayloadField("motorcycle").extract(json!({ "success": true }));
        assert!(matches!(missing, Err(crate::error::ApiError::MissingPayload(_))));

        let not_object = PayloadField("success").extract(serde_json::Value::Null);
        assert!(not_object.is_err());
    }

    #[test]
    fn test_body_encoding_choice() {
        let body = RequestBody::new().field("name", "Helmets");
        assert!(!body.is_multipart());

        let body = body.attachment(Attachment::new("image", "helmet.jpg", "image/jpeg", vec![1, 2, 3]));
        assert!(body.is_multipart());
        assert!(format!("{:?}", body.attachments[0]).contains("len: 3"));
    }

    #[test]
    fn test_entity_keeps_unknown_fields() {
        let entity: Entity = serde_json::from_value(json!({
            "_id": "c1",
            "name": "Helmets",
            "createdAt": "2024-03-01T10:00:00.000Z"
        }))
        .unwrap();

        assert_eq!(entity.id, "c1");
        assert_eq!(entity.get("name"), Some(&json!("Helmets")));
    }
}
