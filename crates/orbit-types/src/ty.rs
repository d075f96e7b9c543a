//! The canonical type representation.
//!
//! A [`TypeRecord`] describes one type as two names — the `short_name` as
//! written in source and the dotted, absolute `full_name` — plus whatever
//! structure the variant carries. Records are compared by name: two records
//! are equal when either name matches, and hash by full name only. The
//! asymmetry is deliberate; the full name is the identity, the short name an
//! accepted alias.

use std::fmt;

/// A resolvable description of a type.
#[derive(Debug, Clone)]
pub enum TypeRecord {
    /// A plain named type.
    Scalar { short_name: String, full_name: String },
    /// A product type with ordered members.
    Compound {
        short_name: String,
        full_name: String,
        members: Vec<TypeRecord>,
    },
    /// A generic base applied to ordered parameters; names are derived.
    Generic {
        base: Box<TypeRecord>,
        params: Vec<TypeRecord>,
    },
    /// A method signature.
    Signature(SignatureRecord),
    /// A declared method: its name plus its signature.
    Method {
        name: String,
        signature: SignatureRecord,
    },
}

/// A method signature: receiver, ordered arguments, return type.
///
/// `args` models the full call-site argument list. Instance methods carry
/// their receiver as the first argument; signatures on the `Operator`
/// dispatch namespace carry only their declared operands.
#[derive(Debug, Clone)]
pub struct SignatureRecord {
    /// The method name as written in source.
    pub name: String,
    pub receiver: Box<TypeRecord>,
    pub args: Vec<TypeRecord>,
    pub ret: Box<TypeRecord>,
}

impl SignatureRecord {
    pub fn new(
        name: impl Into<String>,
        receiver: TypeRecord,
        args: Vec<TypeRecord>,
        ret: TypeRecord,
    ) -> Self {
        Self {
            name: name.into(),
            receiver: Box::new(receiver),
            args,
            ret: Box::new(ret),
        }
    }

    /// The mangled identity: `receiver.name.arg0.arg1…`.
    ///
    /// The return type is intentionally absent.
    pub fn full_name(&self) -> String {
        let mut out = format!("{}.{}", self.receiver.full_name(), self.name);
        for arg in &self.args {
            out.push('.');
            out.push_str(&arg.full_name());
        }
        out
    }
}

impl PartialEq for SignatureRecord {
    fn eq(&self, other: &Self) -> bool {
        self.full_name() == other.full_name()
    }
}

impl Eq for SignatureRecord {}

impl TypeRecord {
    /// A plain named type.
    pub fn scalar(short_name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self::Scalar {
            short_name: short_name.into(),
            full_name: full_name.into(),
        }
    }

    /// A product type.
    pub fn compound(
        short_name: impl Into<String>,
        full_name: impl Into<String>,
        members: Vec<TypeRecord>,
    ) -> Self {
        Self::Compound {
            short_name: short_name.into(),
            full_name: full_name.into(),
            members,
        }
    }

    /// A generic instantiation.
    pub fn generic(base: TypeRecord, params: Vec<TypeRecord>) -> Self {
        Self::Generic {
            base: Box::new(base),
            params,
        }
    }

    /// The local identifier. Derived as `Base[P, …]` for generics and the
    /// method name for signatures.
    pub fn short_name(&self) -> String {
        match self {
            Self::Scalar { short_name, .. } | Self::Compound { short_name, .. } => {
                short_name.clone()
            }
            Self::Generic { base, params } => {
                let inner: Vec<String> = params.iter().map(|p| p.short_name()).collect();
                format!("{}[{}]", base.short_name(), inner.join(", "))
            }
            Self::Signature(sig) => sig.name.clone(),
            Self::Method { name, .. } => name.clone(),
        }
    }

    /// The absolute dotted identifier; unique within a scope closure.
    pub fn full_name(&self) -> String {
        match self {
            Self::Scalar { full_name, .. } | Self::Compound { full_name, .. } => full_name.clone(),
            Self::Generic { base, params } => {
                let inner: Vec<String> = params.iter().map(|p| p.full_name()).collect();
                format!("{}[{}]", base.full_name(), inner.join(", "))
            }
            Self::Signature(sig) => sig.full_name(),
            Self::Method { signature, .. } => signature.full_name(),
        }
    }

    /// The signature behind a `Signature` or `Method` record.
    pub fn signature(&self) -> Option<&SignatureRecord> {
        match self {
            Self::Signature(sig) | Self::Method { signature: sig, .. } => Some(sig),
            _ => None,
        }
    }

    /// The return type for callable records.
    pub fn return_type(&self) -> Option<&TypeRecord> {
        self.signature().map(|sig| sig.ret.as_ref())
    }

    /// The ordered members of a compound type; empty otherwise.
    pub fn members(&self) -> &[TypeRecord] {
        match self {
            Self::Compound { members, .. } => members,
            _ => &[],
        }
    }
}

impl PartialEq for TypeRecord {
    fn eq(&self, other: &Self) -> bool {
        // Short-name equality accepts alias matches; full-name equality
        // accepts the same record seen through different paths.
        self.short_name() == other.short_name() || self.full_name() == other.full_name()
    }
}

impl Eq for TypeRecord {}

impl std::hash::Hash for TypeRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.full_name().hash(state); // short_name intentionally excluded
    }
}

impl fmt::Display for TypeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// The bootstrap types every compilation starts from.
pub mod builtins {
    use super::TypeRecord;

    /// Dotted prefix of the core value types.
    pub const CORE_PREFIX: &str = "Orb.Core.Types";

    pub fn unit() -> TypeRecord {
        TypeRecord::scalar("Unit", format!("{CORE_PREFIX}.Unit"))
    }

    pub fn int() -> TypeRecord {
        TypeRecord::scalar("Int", format!("{CORE_PREFIX}.Int"))
    }

    pub fn real() -> TypeRecord {
        TypeRecord::scalar("Real", format!("{CORE_PREFIX}.Real"))
    }

    pub fn string() -> TypeRecord {
        TypeRecord::scalar("String", format!("{CORE_PREFIX}.String"))
    }

    /// The operator dispatch namespace. Its full name equals its short name
    /// so synthesised dispatch names come out as `Operator.<sym>.<args…>`.
    pub fn operator() -> TypeRecord {
        TypeRecord::scalar("Operator", "Operator")
    }

    pub fn list() -> TypeRecord {
        TypeRecord::scalar("List", format!("{CORE_PREFIX}.List"))
    }

    /// A `List` instantiated at one element type.
    pub fn list_of(element: TypeRecord) -> TypeRecord {
        TypeRecord::generic(list(), vec![element])
    }

    /// All bootstrap records, in declaration order.
    pub fn all() -> Vec<TypeRecord> {
        vec![unit(), int(), real(), string(), operator(), list()]
    }
}
