//! The exportable surface of one API, and its wire format.
//!
//! An [`ApiMap`] lists the types and method signatures an API makes visible
//! to importers. Maps serialise to a versioned JSON envelope (`.api` files)
//! so downstream compilations can import a surface without recompiling the
//! source. Every serialised record is `{ "meta": {...}, "body": {...} }`;
//! readers reject missing keys and unknown versions.

use orbit_common::{CompileError, ErrorKind};
use serde_json::{json, Value};

use crate::ty::{SignatureRecord, TypeRecord};

/// Current wire-format schema version.
pub const SCHEMA_VERSION: u64 = 0;

/// An exported type, tagged with whether it was imported by reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedType {
    pub record: TypeRecord,
    pub imported: bool,
}

/// An exported method signature, tagged like [`ExportedType`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedMethod {
    pub record: SignatureRecord,
    pub imported: bool,
}

/// The exportable surface of one API.
#[derive(Debug, Clone)]
pub struct ApiMap {
    /// Dotted canonical name; reflects `within` nesting.
    pub canonical_name: String,
    types: Vec<ExportedType>,
    methods: Vec<ExportedMethod>,
}

impl ApiMap {
    pub fn new(canonical_name: impl Into<String>) -> Self {
        Self {
            canonical_name: canonical_name.into(),
            types: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Export a type. Idempotent on full name.
    pub fn export_type(&mut self, record: TypeRecord) {
        let full = record.full_name();
        if self.types.iter().any(|t| t.record.full_name() == full) {
            return;
        }
        self.types.push(ExportedType {
            record,
            imported: false,
        });
    }

    /// Export a method signature. Idempotent on full name.
    pub fn export_method(&mut self, record: SignatureRecord) {
        let full = record.full_name();
        if self.methods.iter().any(|m| m.record.full_name() == full) {
            return;
        }
        self.methods.push(ExportedMethod {
            record,
            imported: false,
        });
    }

    /// Prepend another map's exports, flagged imported. Entries whose full
    /// name is already present are elided.
    pub fn import_all(&mut self, other: &ApiMap) {
        let mut incoming_types: Vec<ExportedType> = Vec::new();
        for entry in &other.types {
            let full = entry.record.full_name();
            if self.types.iter().any(|t| t.record.full_name() == full) {
                continue;
            }
            incoming_types.push(ExportedType {
                record: entry.record.clone(),
                imported: true,
            });
        }
        incoming_types.append(&mut self.types);
        self.types = incoming_types;

        let mut incoming_methods: Vec<ExportedMethod> = Vec::new();
        for entry in &other.methods {
            let full = entry.record.full_name();
            if self.methods.iter().any(|m| m.record.full_name() == full) {
                continue;
            }
            incoming_methods.push(ExportedMethod {
                record: entry.record.clone(),
                imported: true,
            });
        }
        incoming_methods.append(&mut self.methods);
        self.methods = incoming_methods;
    }

    /// Mark every current entry as imported. Used after reading a
    /// precompiled map from disk.
    pub fn mark_imported(&mut self) {
        for t in &mut self.types {
            t.imported = true;
        }
        for m in &mut self.methods {
            m.imported = true;
        }
    }

    /// Exported types in order.
    pub fn types(&self) -> &[ExportedType] {
        &self.types
    }

    /// Exported method signatures in order.
    pub fn methods(&self) -> &[ExportedMethod] {
        &self.methods
    }

    /// First type matching `name` by short or full name.
    pub fn find_type(&self, name: &str) -> Option<&TypeRecord> {
        self.types
            .iter()
            .map(|t| &t.record)
            .find(|r| r.short_name() == name || r.full_name() == name)
    }

    /// Method signature with exactly this full name.
    pub fn find_method(&self, full_name: &str) -> Option<&SignatureRecord> {
        self.methods
            .iter()
            .map(|m| &m.record)
            .find(|r| r.full_name() == full_name)
    }

    // ── Wire format ──────────────────────────────────────────────────

    /// Serialise to the §6.1 JSON envelope.
    pub fn to_json(&self) -> Value {
        json!({
            "meta": { "type": "APIMap", "version": SCHEMA_VERSION },
            "body": {
                "canonical_name": self.canonical_name,
                "exported_types": self.types.iter()
                    .map(|t| type_to_json(&t.record))
                    .collect::<Vec<_>>(),
                "exported_methods": self.methods.iter()
                    .map(|m| signature_to_json(&m.record))
                    .collect::<Vec<_>>(),
            }
        })
    }

    /// Serialise to pretty-printed JSON text (the `.api` file body).
    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(&self.to_json()).unwrap_or_default()
    }

    /// Read a map from `.api` file text. All entries come back flagged
    /// imported; a precompiled surface is imported by definition.
    pub fn from_json_str(text: &str) -> Result<Self, CompileError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| CompileError::new(ErrorKind::MalformedApiMap(e.to_string())))?;
        let body = check_envelope(&value, "APIMap")?;

        let canonical_name = get_str(body, "canonical_name")?.to_string();
        let mut map = ApiMap::new(canonical_name);

        for entry in get_array(body, "exported_types")? {
            map.types.push(ExportedType {
                record: type_from_json(entry)?,
                imported: true,
            });
        }
        for entry in get_array(body, "exported_methods")? {
            map.methods.push(ExportedMethod {
                record: signature_from_json(entry)?,
                imported: true,
            });
        }
        Ok(map)
    }
}

// ── Record envelopes ─────────────────────────────────────────────────

fn type_to_json(record: &TypeRecord) -> Value {
    json!({
        "meta": { "type": "TypeRecord", "version": SCHEMA_VERSION },
        "body": {
            "full_name": record.full_name(),
            "short_name": record.short_name(),
        }
    })
}

fn signature_to_json(record: &SignatureRecord) -> Value {
    json!({
        "meta": { "type": "SignatureTypeRecord", "version": SCHEMA_VERSION },
        "body": {
            "name": record.full_name(),
            "receiver": type_to_json(&record.receiver),
            "args": record.args.iter().map(type_to_json).collect::<Vec<_>>(),
            "return": type_to_json(&record.ret),
        }
    })
}

fn type_from_json(value: &Value) -> Result<TypeRecord, CompileError> {
    let body = check_envelope(value, "TypeRecord")?;
    let full = get_str(body, "full_name")?;
    let short = get_str(body, "short_name")?;
    Ok(TypeRecord::scalar(short, full))
}

fn signature_from_json(value: &Value) -> Result<SignatureRecord, CompileError> {
    let body = check_envelope(value, "SignatureTypeRecord")?;
    let full = get_str(body, "name")?.to_string();
    let receiver = type_from_json(get(body, "receiver")?)?;
    let args = get_array(body, "args")?
        .iter()
        .map(type_from_json)
        .collect::<Result<Vec<_>, _>>()?;
    let ret = type_from_json(get(body, "return")?)?;

    // The wire format carries the mangled name; the method's own name is the
    // segment after the receiver prefix (short names never contain dots).
    let receiver_full = receiver.full_name();
    let rest = full
        .strip_prefix(&format!("{receiver_full}."))
        .unwrap_or(&full);
    let name = rest.split('.').next().unwrap_or(rest).to_string();

    Ok(SignatureRecord::new(name, receiver, args, ret))
}

/// Validate the `{meta, body}` envelope and return the body object.
fn check_envelope<'a>(value: &'a Value, expected: &str) -> Result<&'a Value, CompileError> {
    let meta = get(value, "meta")?;
    let tag = get_str(meta, "type")?;
    if tag != expected {
        return Err(CompileError::new(ErrorKind::MalformedApiMap(format!(
            "expected record type `{expected}`, found `{tag}`"
        ))));
    }
    let version = get(meta, "version")?
        .as_u64()
        .ok_or_else(|| CompileError::new(ErrorKind::MalformedApiMap("non-integer version".into())))?;
    if version != SCHEMA_VERSION {
        return Err(CompileError::new(ErrorKind::UnsupportedApiMapVersion(
            version,
        )));
    }
    get(value, "body")
}

fn get<'a>(value: &'a Value, key: &str) -> Result<&'a Value, CompileError> {
    value
        .get(key)
        .ok_or_else(|| CompileError::new(ErrorKind::MissingApiMapKey(key.to_string())))
}

fn get_str<'a>(value: &'a Value, key: &str) -> Result<&'a str, CompileError> {
    get(value, key)?
        .as_str()
        .ok_or_else(|| CompileError::new(ErrorKind::MissingApiMapKey(key.to_string())))
}

fn get_array<'a>(value: &'a Value, key: &str) -> Result<&'a Vec<Value>, CompileError> {
    get(value, key)?
        .as_array()
        .ok_or_else(|| CompileError::new(ErrorKind::MissingApiMapKey(key.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::builtins;

    fn sample_map() -> ApiMap {
        let mut map = ApiMap::new("M");
        let i = TypeRecord::compound("I", "M.I", vec![builtins::int()]);
        map.export_type(i.clone());
        map.export_method(SignatureRecord::new(
            "id",
            i.clone(),
            vec![i, builtins::int()],
            builtins::int(),
        ));
        map
    }

    #[test]
    fn export_is_idempotent() {
        let mut map = ApiMap::new("M");
        map.export_type(TypeRecord::scalar("I", "M.I"));
        map.export_type(TypeRecord::scalar("I", "M.I"));
        assert_eq!(map.types().len(), 1);
    }

    #[test]
    fn import_all_prepends_and_elides() {
        let mut own = ApiMap::new("B");
        own.export_type(TypeRecord::scalar("T", "B.T"));

        let mut other = ApiMap::new("A");
        other.export_type(TypeRecord::scalar("U", "A.U"));
        other.export_type(TypeRecord::scalar("T", "B.T")); // duplicate full name

        own.import_all(&other);

        let fulls: Vec<String> = own.types().iter().map(|t| t.record.full_name()).collect();
        assert_eq!(fulls, vec!["A.U".to_string(), "B.T".to_string()]);
        assert!(own.types()[0].imported);
        assert!(!own.types()[1].imported);
    }

    #[test]
    fn json_round_trip() {
        let map = sample_map();
        let restored = ApiMap::from_json_str(&map.to_json_string()).unwrap();

        assert_eq!(restored.canonical_name, "M");
        assert_eq!(restored.types().len(), map.types().len());
        assert_eq!(restored.methods().len(), map.methods().len());
        for (a, b) in restored.types().iter().zip(map.types()) {
            assert_eq!(a.record, b.record);
        }
        for (a, b) in restored.methods().iter().zip(map.methods()) {
            assert_eq!(a.record.full_name(), b.record.full_name());
            assert_eq!(a.record.name, b.record.name);
        }
        // Everything read from disk is imported by definition.
        assert!(restored.types().iter().all(|t| t.imported));
        assert!(restored.methods().iter().all(|m| m.imported));
    }

    #[test]
    fn signature_name_recovered_from_mangled_form() {
        let map = sample_map();
        let restored = ApiMap::from_json_str(&map.to_json_string()).unwrap();
        assert_eq!(restored.methods()[0].record.name, "id");
        assert_eq!(
            restored.methods()[0].record.full_name(),
            "M.I.id.M.I.Orb.Core.Types.Int"
        );
    }

    #[test]
    fn missing_key_is_reported() {
        let err = ApiMap::from_json_str(r#"{ "meta": { "type": "APIMap", "version": 0 } }"#)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingApiMapKey("body".into()));

        let err = ApiMap::from_json_str(
            r#"{ "meta": { "type": "APIMap", "version": 0 },
                 "body": { "exported_types": [], "exported_methods": [] } }"#,
        )
        .unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::MissingApiMapKey("canonical_name".into())
        );
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let err = ApiMap::from_json_str(
            r#"{ "meta": { "type": "APIMap", "version": 7 }, "body": {} }"#,
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedApiMapVersion(7));
    }

    #[test]
    fn wrong_record_tag_is_rejected() {
        let err = ApiMap::from_json_str(
            r#"{ "meta": { "type": "TypeRecord", "version": 0 }, "body": {} }"#,
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MalformedApiMap(_)));
    }

    #[test]
    fn find_type_matches_short_and_full() {
        let map = sample_map();
        assert!(map.find_type("I").is_some());
        assert!(map.find_type("M.I").is_some());
        assert!(map.find_type("J").is_none());
    }
}
