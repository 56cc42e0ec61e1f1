use std::fmt;

use serde::{Deserialize, Serialize};

/// A field-name → value map, as stored in a document.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// The three collections the sales-call view reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Customers,
    CallLogs,
    Sales,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Customers, Collection::CallLogs, Collection::Sales];

    /// Name of the collection in the backing store.
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Customers => "customers",
            Collection::CallLogs => "callLogs",
            Collection::Sales => "sales",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single document as stored in the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: FieldMap,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build a document from a JSON object literal. Non-object values yield
    /// an empty field map.
    pub fn from_json(id: impl Into<String>, value: serde_json::Value) -> Self {
        let fields = match value {
            serde_json::Value::Object(map) => map,
            _ => FieldMap::new(),
        };
        Self::new(id, fields)
    }

    /// The document as a single JSON object, with `id` folded in.
    ///
    /// Stored fields win over the folded id if both are present.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = FieldMap::with_capacity(self.fields.len() + 1);
        map.insert("id".to_string(), serde_json::Value::String(self.id.clone()));
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.clone());
        }
        serde_json::Value::Object(map)
    }
}

/// One operation inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// Merge `fields` into an existing document.
    Update {
        collection: Collection,
        id: String,
        fields: FieldMap,
    },
    /// Remove a document.
    Delete { collection: Collection, id: String },
}

impl BatchOp {
    pub fn collection(&self) -> Collection {
        match self {
            BatchOp::Update { collection, .. } | BatchOp::Delete { collection, .. } => *collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            BatchOp::Update { id, .. } | BatchOp::Delete { id, .. } => id,
        }
    }
}
