use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::StoreError;

/// Field value meaning "matches any concrete query value" on the
/// broadcast-capable material fields (year, section, branch).
pub const BROADCAST: &str = "All";

pub const MATERIAL_TYPES: [&str; 7] = [
    "notes",
    "videos",
    "interview",
    "assignment",
    "question_paper",
    "syllabus",
    "other",
];

pub const MESSAGE_TARGETS: [&str; 5] = ["all", "students", "students-specific", "faculty", "admin"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Faculty,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Faculty => "faculty",
            Role::Student => "student",
        }
    }

    pub fn from_str(s: &str) -> Option<Role> {
        match s {
            "admin" => Some(Role::Admin),
            "faculty" => Some(Role::Faculty),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            Role::Admin => Collection::Admin,
            Role::Faculty => Collection::Faculty,
            Role::Student => Collection::Students,
        }
    }

    /// The login-id field name stored on this role's account records.
    pub fn login_id_field(&self) -> &'static str {
        match self {
            Role::Admin => "adminId",
            Role::Faculty => "facultyId",
            Role::Student => "sid",
        }
    }
}

/// Which bearer-token slot a request arrived on. Resolved once per request
/// from the params and passed by value from there on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSlot {
    Admin,
    Faculty,
    Student,
}

impl AuthSlot {
    pub fn role(&self) -> Role {
        match self {
            AuthSlot::Admin => Role::Admin,
            AuthSlot::Faculty => Role::Faculty,
            AuthSlot::Student => Role::Student,
        }
    }

    pub fn param_name(&self) -> &'static str {
        match self {
            AuthSlot::Admin => "adminToken",
            AuthSlot::Faculty => "facultyToken",
            AuthSlot::Student => "studentToken",
        }
    }
}

/// A resolved caller identity. Never carries a live record handle; any
/// further account data is a fresh lookup through the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub id: String,
    pub role: Role,
    pub name: String,
}

/// How the file store persists a collection on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileShape {
    /// A JSON array of record objects.
    Array,
    /// A single record object (the admin account).
    Singleton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Students,
    Faculty,
    Admin,
    Materials,
    Courses,
    Messages,
    Relationships,
}

pub const ALL_COLLECTIONS: [Collection; 7] = [
    Collection::Students,
    Collection::Faculty,
    Collection::Admin,
    Collection::Materials,
    Collection::Courses,
    Collection::Messages,
    Collection::Relationships,
];

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Students => "students",
            Collection::Faculty => "faculty",
            Collection::Admin => "admin",
            Collection::Materials => "materials",
            Collection::Courses => "courses",
            Collection::Messages => "messages",
            Collection::Relationships => "relationships",
        }
    }

    pub fn from_name(s: &str) -> Option<Collection> {
        match s {
            "students" => Some(Collection::Students),
            "faculty" => Some(Collection::Faculty),
            "admin" => Some(Collection::Admin),
            "materials" => Some(Collection::Materials),
            "courses" => Some(Collection::Courses),
            "messages" => Some(Collection::Messages),
            "relationships" => Some(Collection::Relationships),
            _ => None,
        }
    }

    pub fn file_shape(&self) -> FileShape {
        match self {
            Collection::Admin => FileShape::Singleton,
            _ => FileShape::Array,
        }
    }

    /// Fields that together form the unique business key for the
    /// collection, if it has one. Uniqueness holds across both stores
    /// combined and is enforced at write time.
    pub fn unique_key_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Students => &["sid"],
            Collection::Faculty => &["facultyId"],
            Collection::Admin => &["adminId"],
            Collection::Courses => &["code"],
            Collection::Relationships => &["studentId", "facultyId"],
            Collection::Materials | Collection::Messages => &[],
        }
    }

    /// Records in these collections carry a creation timestamp.
    pub fn timestamped(&self) -> bool {
        matches!(
            self,
            Collection::Materials | Collection::Messages | Collection::Relationships
        )
    }

    /// Fields every record of the collection must carry.
    fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Collection::Students => &["sid", "name", "password"],
            Collection::Faculty => &["facultyId", "name", "password"],
            Collection::Admin => &["adminId", "name", "password"],
            Collection::Materials => &["title", "type", "uploaderId", "uploaderRole"],
            Collection::Courses => &["code", "name"],
            Collection::Messages => &["text", "target", "sender"],
            Collection::Relationships => &["studentId", "facultyId"],
        }
    }
}

pub fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(|v| v.as_str())
}

pub fn str_field<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record.get(field).and_then(|v| v.as_str())
}

/// Schema validation applied by the document store at its write boundary.
/// The file store accepts any shape; that asymmetry is part of the
/// dual-store contract.
pub fn validate_record(collection: Collection, record: &Value) -> Result<(), StoreError> {
    let Some(obj) = record.as_object() else {
        return Err(StoreError::validation(None, "record must be a JSON object"));
    };

    for field in collection.required_fields() {
        let present = obj
            .get(*field)
            .and_then(|v| v.as_str())
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);
        if !present {
            return Err(StoreError::validation(
                Some(*field),
                format!("{} is required", field),
            ));
        }
    }

    match collection {
        Collection::Materials => {
            let kind = obj.get("type").and_then(|v| v.as_str()).unwrap_or("");
            if !MATERIAL_TYPES.contains(&kind) {
                return Err(StoreError::validation(
                    Some("type"),
                    format!("unknown material type: {}", kind),
                ));
            }
        }
        Collection::Messages => {
            let target = obj.get("target").and_then(|v| v.as_str()).unwrap_or("");
            if !MESSAGE_TARGETS.contains(&target) {
                return Err(StoreError::validation(
                    Some("target"),
                    format!("unknown message target: {}", target),
                ));
            }
            if let Some(sections) = obj.get("targetSections") {
                if !sections.is_array() {
                    return Err(StoreError::validation(
                        Some("targetSections"),
                        "targetSections must be an array",
                    ));
                }
            }
        }
        Collection::Students | Collection::Faculty | Collection::Admin => {
            if let Some(role) = obj.get("role").and_then(|v| v.as_str()) {
                let expected = match collection {
                    Collection::Students => "student",
                    Collection::Faculty => "faculty",
                    _ => "admin",
                };
                if role != expected {
                    return Err(StoreError::validation(
                        Some("role"),
                        format!("role must be {} for this collection", expected),
                    ));
                }
            }
        }
        Collection::Courses => {
            if let Some(sections) = obj.get("sections") {
                if !sections.is_array() {
                    return Err(StoreError::validation(
                        Some("sections"),
                        "sections must be an array",
                    ));
                }
            }
        }
        Collection::Relationships => {}
    }

    Ok(())
}

/// The unique-key filter for a record, if its collection has one and the
/// record carries every key field.
pub fn unique_key_filter(collection: Collection, record: &Value) -> Option<Vec<(String, String)>> {
    let fields = collection.unique_key_fields();
    if fields.is_empty() {
        return None;
    }
    let mut out = Vec::with_capacity(fields.len());
    for f in fields {
        let v = str_field(record, f)?;
        out.push((f.to_string(), v.to_string()));
    }
    Some(out)
}
