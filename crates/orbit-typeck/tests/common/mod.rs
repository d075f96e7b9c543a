//! Programmatic AST construction shared by the integration tests.
//!
//! The frontend is external to the backend, so tests build arenas directly
//! through [`orbit_ast::Ast::alloc`]; this module keeps that terse.

use orbit_ast::{Ast, BinaryOp, ExprId, ExprKind};
use orbit_common::SourcePos;

pub struct Builder {
    pub ast: Ast,
}

fn pos() -> SourcePos {
    SourcePos::new("test.orb", 1, 1)
}

impl Builder {
    pub fn new() -> Self {
        Self { ast: Ast::new() }
    }

    pub fn int(&mut self, value: i64) -> ExprId {
        self.ast.alloc(ExprKind::IntLiteral(value), pos())
    }

    pub fn real(&mut self, value: f64) -> ExprId {
        self.ast.alloc(ExprKind::RealLiteral(value), pos())
    }

    pub fn ident(&mut self, name: &str) -> ExprId {
        self.ast.alloc(ExprKind::Identifier(name.into()), pos())
    }

    pub fn type_ident(&mut self, name: &str) -> ExprId {
        self.ast.alloc(
            ExprKind::TypeIdentifier {
                name: name.into(),
                is_list: false,
            },
            pos(),
        )
    }

    pub fn pair(&mut self, name: &str, ty: &str) -> ExprId {
        let name_id = self.ident(name);
        let ty_id = self.type_ident(ty);
        self.ast.alloc(
            ExprKind::Pair {
                name: name_id,
                ty: ty_id,
            },
            pos(),
        )
    }

    pub fn type_def(&mut self, name: &str, properties: &[(&str, &str)]) -> ExprId {
        self.type_def_adopting(name, properties, &[])
    }

    pub fn type_def_adopting(
        &mut self,
        name: &str,
        properties: &[(&str, &str)],
        traits: &[&str],
    ) -> ExprId {
        let props: Vec<ExprId> = properties.iter().map(|(n, t)| self.pair(n, t)).collect();
        self.ast.alloc(
            ExprKind::TypeDef {
                name: name.into(),
                properties: props,
                adopted_traits: traits.iter().map(|t| t.to_string()).collect(),
                constructors: Vec::new(),
            },
            pos(),
        )
    }

    pub fn trait_def(&mut self, name: &str) -> ExprId {
        self.ast.alloc(
            ExprKind::TraitDef {
                name: name.into(),
                signatures: Vec::new(),
            },
            pos(),
        )
    }

    pub fn signature(
        &mut self,
        receiver: &str,
        name: &str,
        params: &[(&str, &str)],
        ret: Option<&str>,
    ) -> ExprId {
        let receiver_id = self.type_ident(receiver);
        let param_ids: Vec<ExprId> = params.iter().map(|(n, t)| self.pair(n, t)).collect();
        let ret_id = ret.map(|r| self.type_ident(r));
        self.ast.alloc(
            ExprKind::Signature {
                receiver: receiver_id,
                name: name.into(),
                params: param_ids,
                ret: ret_id,
            },
            pos(),
        )
    }

    pub fn block(&mut self, statements: Vec<ExprId>, ret_value: Option<ExprId>) -> ExprId {
        let ret = ret_value.map(|value| self.ast.alloc(ExprKind::Return { value }, pos()));
        self.ast.alloc(ExprKind::Block { statements, ret }, pos())
    }

    pub fn method(&mut self, signature: ExprId, body: ExprId) -> ExprId {
        self.ast.alloc(ExprKind::Method { signature, body }, pos())
    }

    pub fn binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        self.ast.alloc(ExprKind::Binary { op, left, right }, pos())
    }

    pub fn constructor(&mut self, ty: &str, args: Vec<ExprId>) -> ExprId {
        let ty_id = self.type_ident(ty);
        self.ast
            .alloc(ExprKind::ConstructorCall { ty: ty_id, args }, pos())
    }

    pub fn instance_call(&mut self, receiver: ExprId, method: &str, args: Vec<ExprId>) -> ExprId {
        self.ast.alloc(
            ExprKind::InstanceCall {
                receiver,
                method: method.into(),
                args,
            },
            pos(),
        )
    }

    pub fn assignment(&mut self, name: &str, declared: Option<&str>, value: ExprId) -> ExprId {
        let declared_ty = declared.map(|d| self.type_ident(d));
        self.ast.alloc(
            ExprKind::Assignment {
                name: name.into(),
                declared_ty,
                value,
            },
            pos(),
        )
    }

    pub fn annotation(&mut self, name: &str, params: Vec<ExprId>) -> ExprId {
        self.ast.alloc(
            ExprKind::Annotation {
                name: name.into(),
                params,
            },
            pos(),
        )
    }

    pub fn api(&mut self, name: &str, with: &[&str], body: Vec<ExprId>) -> ExprId {
        self.ast.alloc(
            ExprKind::Api {
                name: name.into(),
                within: None,
                with: with.iter().map(|w| w.to_string()).collect(),
                body,
            },
            pos(),
        )
    }

    pub fn root(&mut self, apis: Vec<ExprId>) -> ExprId {
        let program = self.ast.alloc(ExprKind::Program { apis }, pos());
        self.ast.alloc(
            ExprKind::Root {
                body: vec![program],
            },
            pos(),
        )
    }
}
