//! The expression arena.
//!
//! Every AST node lives in one owning [`Ast`] arena and is addressed by a
//! stable [`ExprId`]. Node kinds are a closed tagged variant; phases
//! pattern-match instead of downcasting. After parsing, the tree mutates
//! through exactly two operations: annotation attachment and parent-local
//! child rewriting by identity.

use orbit_common::SourcePos;
use rustc_hash::FxHashMap;

use crate::annotation::Annotation;
use orbit_types::TypeRecord;

/// Stable identity of an expression within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

/// A unary operator symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Not => "!",
        }
    }
}

/// A binary operator symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    Gt,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "==",
            Self::Lt => "<",
            Self::Gt => ">",
        }
    }
}

/// The closed set of node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // ── Literals ─────────────────────────────────────────────────────
    IntLiteral(i64),
    RealLiteral(f64),
    StringLiteral(String),
    ListLiteral(Vec<ExprId>),

    // ── References ───────────────────────────────────────────────────
    Identifier(String),
    TypeIdentifier { name: String, is_list: bool },

    /// A `(name, type)` pair: parameters and properties.
    Pair { name: ExprId, ty: ExprId },

    // ── Calls ────────────────────────────────────────────────────────
    StaticCall {
        receiver: ExprId,
        method: String,
        args: Vec<ExprId>,
    },
    InstanceCall {
        receiver: ExprId,
        method: String,
        args: Vec<ExprId>,
    },
    ConstructorCall { ty: ExprId, args: Vec<ExprId> },

    // ── Operators (rewritten to method dispatch by the resolver) ─────
    Unary { op: UnaryOp, value: ExprId },
    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },

    // ── Structure ────────────────────────────────────────────────────
    TypeDef {
        name: String,
        properties: Vec<ExprId>,
        adopted_traits: Vec<String>,
        constructors: Vec<ExprId>,
    },
    TraitDef { name: String, signatures: Vec<ExprId> },
    Signature {
        receiver: ExprId,
        name: String,
        params: Vec<ExprId>,
        ret: Option<ExprId>,
    },
    Method { signature: ExprId, body: ExprId },
    Block {
        statements: Vec<ExprId>,
        ret: Option<ExprId>,
    },
    Assignment {
        name: String,
        declared_ty: Option<ExprId>,
        value: ExprId,
    },
    Return { value: ExprId },

    // ── Module ───────────────────────────────────────────────────────
    Api {
        name: String,
        within: Option<String>,
        with: Vec<String>,
        body: Vec<ExprId>,
    },
    Program { apis: Vec<ExprId> },
    Root { body: Vec<ExprId> },
    Annotation { name: String, params: Vec<ExprId> },
}

impl ExprKind {
    /// Short tag for diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::IntLiteral(_) => "int literal",
            Self::RealLiteral(_) => "real literal",
            Self::StringLiteral(_) => "string literal",
            Self::ListLiteral(_) => "list literal",
            Self::Identifier(_) => "identifier",
            Self::TypeIdentifier { .. } => "type identifier",
            Self::Pair { .. } => "pair",
            Self::StaticCall { .. } => "static call",
            Self::InstanceCall { .. } => "instance call",
            Self::ConstructorCall { .. } => "constructor call",
            Self::Unary { .. } => "unary operator",
            Self::Binary { .. } => "binary operator",
            Self::TypeDef { .. } => "type definition",
            Self::TraitDef { .. } => "trait definition",
            Self::Signature { .. } => "signature",
            Self::Method { .. } => "method",
            Self::Block { .. } => "block",
            Self::Assignment { .. } => "assignment",
            Self::Return { .. } => "return",
            Self::Api { .. } => "api",
            Self::Program { .. } => "program",
            Self::Root { .. } => "root",
            Self::Annotation { .. } => "annotation",
        }
    }
}

/// One arena slot: kind, position, annotations.
#[derive(Debug)]
pub struct Expression {
    pub id: ExprId,
    pub pos: SourcePos,
    pub kind: ExprKind,
    annotations: FxHashMap<String, Annotation>,
}

impl Expression {
    /// Annotation attached under `key`, if any.
    pub fn annotation(&self, key: &str) -> Option<&Annotation> {
        self.annotations.get(key)
    }

    /// Number of attached annotations.
    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }
}

/// The owning arena for all expressions of one compilation.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Expression>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node and return its id.
    pub fn alloc(&mut self, kind: ExprKind, pos: SourcePos) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(Expression {
            id,
            pos,
            kind,
            annotations: FxHashMap::default(),
        });
        id
    }

    pub fn node(&self, id: ExprId) -> &Expression {
        &self.nodes[id.0 as usize]
    }

    pub fn kind(&self, id: ExprId) -> &ExprKind {
        &self.nodes[id.0 as usize].kind
    }

    pub fn pos(&self, id: ExprId) -> &SourcePos {
        &self.nodes[id.0 as usize].pos
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attach an annotation under `key`. Attachment is monotonic: phases add
    /// annotations, they never remove ones placed earlier.
    pub fn annotate(&mut self, id: ExprId, key: impl Into<String>, annotation: Annotation) {
        self.nodes[id.0 as usize]
            .annotations
            .insert(key.into(), annotation);
    }

    /// Annotation attached to `id` under `key`.
    pub fn annotation(&self, id: ExprId, key: &str) -> Option<&Annotation> {
        self.nodes[id.0 as usize].annotations.get(key)
    }

    /// The node's resolved type, if the resolver has run.
    pub fn type_of(&self, id: ExprId) -> Option<&TypeRecord> {
        match self.annotation(id, crate::annotation::keys::TYPE) {
            Some(Annotation::Type(record)) => Some(record),
            _ => None,
        }
    }

    /// A metadata entry attached to `id`.
    pub fn metadata(&self, id: ExprId, key: &str) -> Option<&crate::annotation::MetaValue> {
        match self.annotation(id, crate::annotation::keys::METADATA) {
            Some(Annotation::MetaData(map)) => map.get(key),
            _ => None,
        }
    }

    /// Add one metadata entry, creating the metadata annotation on first use.
    pub fn set_metadata(
        &mut self,
        id: ExprId,
        key: impl Into<String>,
        value: crate::annotation::MetaValue,
    ) {
        let slot = self.nodes[id.0 as usize]
            .annotations
            .entry(crate::annotation::keys::METADATA.to_string())
            .or_insert_with(|| Annotation::MetaData(FxHashMap::default()));
        if let Annotation::MetaData(map) = slot {
            map.insert(key.into(), value);
        }
    }

    /// Replace `old` with `new` in `parent`'s child slots.
    ///
    /// This is the only structural mutation after parsing; phase extensions
    /// use it to swap an annotation node for the expression it produced.
    ///
    /// # Panics
    ///
    /// Panics if `old` is not a direct child of `parent`; callers always
    /// hold the parent they are iterating.
    pub fn rewrite_child(&mut self, parent: ExprId, old: ExprId, new: ExprId) {
        let replaced = match &mut self.nodes[parent.0 as usize].kind {
            ExprKind::ListLiteral(items) => replace_in(items, old, new),
            ExprKind::Pair { name, ty } => replace_slot(name, old, new) || replace_slot(ty, old, new),
            ExprKind::StaticCall { receiver, args, .. }
            | ExprKind::InstanceCall { receiver, args, .. } => {
                replace_slot(receiver, old, new) || replace_in(args, old, new)
            }
            ExprKind::ConstructorCall { ty, args } => {
                replace_slot(ty, old, new) || replace_in(args, old, new)
            }
            ExprKind::Unary { value, .. } => replace_slot(value, old, new),
            ExprKind::Binary { left, right, .. } => {
                replace_slot(left, old, new) || replace_slot(right, old, new)
            }
            ExprKind::TypeDef {
                properties,
                constructors,
                ..
            } => replace_in(properties, old, new) || replace_in(constructors, old, new),
            ExprKind::TraitDef { signatures, .. } => replace_in(signatures, old, new),
            ExprKind::Signature {
                receiver,
                params,
                ret,
                ..
            } => {
                replace_slot(receiver, old, new)
                    || replace_in(params, old, new)
                    || replace_opt(ret, old, new)
            }
            ExprKind::Method { signature, body } => {
                replace_slot(signature, old, new) || replace_slot(body, old, new)
            }
            ExprKind::Block { statements, ret } => {
                replace_in(statements, old, new) || replace_opt(ret, old, new)
            }
            ExprKind::Assignment {
                declared_ty, value, ..
            } => replace_opt(declared_ty, old, new) || replace_slot(value, old, new),
            ExprKind::Return { value } => replace_slot(value, old, new),
            ExprKind::Api { body, .. } => replace_in(body, old, new),
            ExprKind::Program { apis } => replace_in(apis, old, new),
            ExprKind::Root { body } => replace_in(body, old, new),
            ExprKind::Annotation { params, .. } => replace_in(params, old, new),
            ExprKind::IntLiteral(_)
            | ExprKind::RealLiteral(_)
            | ExprKind::StringLiteral(_)
            | ExprKind::Identifier(_)
            | ExprKind::TypeIdentifier { .. } => false,
        };
        assert!(
            replaced,
            "rewrite_child: {old:?} is not a child of {parent:?}"
        );
    }
}

fn replace_slot(slot: &mut ExprId, old: ExprId, new: ExprId) -> bool {
    if *slot == old {
        *slot = new;
        true
    } else {
        false
    }
}

fn replace_opt(slot: &mut Option<ExprId>, old: ExprId, new: ExprId) -> bool {
    match slot {
        Some(id) if *id == old => {
            *slot = Some(new);
            true
        }
        _ => false,
    }
}

fn replace_in(items: &mut [ExprId], old: ExprId, new: ExprId) -> bool {
    for item in items.iter_mut() {
        if *item == old {
            *item = new;
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{keys, Annotation, MetaValue};
    use orbit_types::builtins;

    fn pos() -> SourcePos {
        SourcePos::unknown()
    }

    #[test]
    fn alloc_assigns_sequential_ids() {
        let mut ast = Ast::new();
        let a = ast.alloc(ExprKind::IntLiteral(1), pos());
        let b = ast.alloc(ExprKind::IntLiteral(2), pos());
        assert_eq!(a, ExprId(0));
        assert_eq!(b, ExprId(1));
        assert_eq!(ast.len(), 2);
    }

    #[test]
    fn annotations_attach_and_read_back() {
        let mut ast = Ast::new();
        let id = ast.alloc(ExprKind::IntLiteral(1), pos());

        assert!(ast.type_of(id).is_none());
        ast.annotate(id, keys::TYPE, Annotation::Type(builtins::int()));
        assert_eq!(ast.type_of(id).unwrap().short_name(), "Int");
        assert_eq!(ast.node(id).annotation_count(), 1);
    }

    #[test]
    fn metadata_accretes_entries() {
        let mut ast = Ast::new();
        let id = ast.alloc(ExprKind::IntLiteral(1), pos());

        ast.set_metadata(id, "ExpandedMethodName", MetaValue::Str("M.I.id".into()));
        ast.set_metadata(id, "OperatorFunction", MetaValue::Type(builtins::int()));

        assert!(matches!(
            ast.metadata(id, "ExpandedMethodName"),
            Some(MetaValue::Str(s)) if s == "M.I.id"
        ));
        assert!(ast.metadata(id, "OperatorFunction").is_some());
        // Both entries live under one metadata annotation.
        assert_eq!(ast.node(id).annotation_count(), 1);
    }

    #[test]
    fn rewrite_child_swaps_a_body_slot() {
        let mut ast = Ast::new();
        let ann = ast.alloc(
            ExprKind::Annotation {
                name: "X".into(),
                params: vec![],
            },
            pos(),
        );
        let api = ast.alloc(
            ExprKind::Api {
                name: "M".into(),
                within: None,
                with: vec![],
                body: vec![ann],
            },
            pos(),
        );
        let replacement = ast.alloc(
            ExprKind::TypeDef {
                name: "Foo".into(),
                properties: vec![],
                adopted_traits: vec![],
                constructors: vec![],
            },
            pos(),
        );

        ast.rewrite_child(api, ann, replacement);
        match ast.kind(api) {
            ExprKind::Api { body, .. } => assert_eq!(body, &vec![replacement]),
            _ => unreachable!(),
        }
    }

    #[test]
    #[should_panic(expected = "is not a child of")]
    fn rewrite_child_rejects_non_children() {
        let mut ast = Ast::new();
        let a = ast.alloc(ExprKind::IntLiteral(1), pos());
        let b = ast.alloc(ExprKind::IntLiteral(2), pos());
        let lit = ast.alloc(ExprKind::IntLiteral(3), pos());
        ast.rewrite_child(lit, a, b);
    }
}
