//! Post-resolution verification.
//!
//! A separate walk over the annotated tree that asserts what the resolver
//! promised: every resolvable node is typed, assignments agree with their
//! declarations, method bodies agree with their signatures, and operator
//! nodes carry their dispatch records. The first inconsistency is fatal.

use std::rc::Rc;

use orbit_ast::{keys, Ast, ExprId, ExprKind};
use orbit_common::{CompileError, ErrorKind, Phase, Session};
use orbit_types::{builtins, TypeRecord};

use crate::ResolvedProgram;

pub const PHASE_NAME: &str = "TypeChecker";

/// Phase 4: consistency verification.
pub struct TypeChecker {
    #[allow(dead_code)]
    session: Rc<Session>,
}

impl TypeChecker {
    pub fn new(session: Rc<Session>) -> Self {
        Self { session }
    }
}

impl Phase for TypeChecker {
    type Input = ResolvedProgram;
    type Output = ResolvedProgram;

    fn name(&self) -> &'static str {
        PHASE_NAME
    }

    fn run(&mut self, input: Self::Input) -> Result<Self::Output, CompileError> {
        for &api in &input.apis {
            let body = match input.ast.kind(api) {
                ExprKind::Api { body, .. } => body.clone(),
                _ => continue,
            };
            for child in body {
                check(&input.ast, child)?;
            }
        }
        Ok(input)
    }
}

/// The node's type annotation, or a `MissingAnnotation` error.
fn typed(ast: &Ast, id: ExprId) -> Result<&TypeRecord, CompileError> {
    ast.type_of(id).ok_or_else(|| {
        CompileError::at(
            ErrorKind::MissingAnnotation {
                node: ast.kind(id).tag().to_string(),
            },
            ast.pos(id).clone(),
        )
    })
}

fn check(ast: &Ast, id: ExprId) -> Result<(), CompileError> {
    match ast.kind(id) {
        ExprKind::IntLiteral(_)
        | ExprKind::RealLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::Identifier(_)
        | ExprKind::TypeIdentifier { .. }
        | ExprKind::TypeDef { .. } => {
            typed(ast, id)?;
            Ok(())
        }

        ExprKind::ListLiteral(items) => {
            typed(ast, id)?;
            for &item in items {
                check(ast, item)?;
            }
            Ok(())
        }

        ExprKind::Unary { value, .. } => {
            typed(ast, id)?;
            if ast.metadata(id, keys::OPERATOR_FUNCTION).is_none() {
                return Err(CompileError::at(
                    ErrorKind::MissingAnnotation {
                        node: "unary operator dispatch".into(),
                    },
                    ast.pos(id).clone(),
                ));
            }
            check(ast, *value)
        }

        ExprKind::Binary { left, right, .. } => {
            typed(ast, id)?;
            if ast.metadata(id, keys::OPERATOR_FUNCTION).is_none() {
                return Err(CompileError::at(
                    ErrorKind::MissingAnnotation {
                        node: "binary operator dispatch".into(),
                    },
                    ast.pos(id).clone(),
                ));
            }
            check(ast, *left)?;
            check(ast, *right)
        }

        ExprKind::StaticCall { receiver, args, .. }
        | ExprKind::InstanceCall { receiver, args, .. } => {
            typed(ast, id)?;
            if ast.metadata(id, keys::EXPANDED_METHOD_NAME).is_none() {
                return Err(CompileError::at(
                    ErrorKind::MissingAnnotation {
                        node: "call dispatch".into(),
                    },
                    ast.pos(id).clone(),
                ));
            }
            check(ast, *receiver)?;
            for &arg in args {
                check(ast, arg)?;
            }
            Ok(())
        }

        ExprKind::ConstructorCall { ty, args } => {
            typed(ast, id)?;
            check(ast, *ty)?;
            for &arg in args {
                check(ast, arg)?;
            }
            Ok(())
        }

        ExprKind::Assignment {
            declared_ty, value, ..
        } => {
            let value_type = typed(ast, *value)?;
            if let Some(declared) = declared_ty {
                let declared_type = typed(ast, *declared)?;
                let value_is_annotation = matches!(ast.kind(*value), ExprKind::Annotation { .. });
                if declared_type != value_type && !value_is_annotation {
                    return Err(CompileError::at(
                        ErrorKind::AssignmentTypeMismatch {
                            declared: declared_type.full_name(),
                            actual: value_type.full_name(),
                        },
                        ast.pos(id).clone(),
                    ));
                }
            }
            check(ast, *value)
        }

        ExprKind::Return { value } => {
            typed(ast, id)?;
            check(ast, *value)
        }

        ExprKind::Block { statements, ret } => {
            let block_type = typed(ast, id)?;
            match ret {
                Some(ret_id) => {
                    let ret_type = typed(ast, *ret_id)?;
                    if block_type != ret_type {
                        return Err(CompileError::at(
                            ErrorKind::AnnotationMismatch {
                                context: "block type".into(),
                                expected: ret_type.full_name(),
                                actual: block_type.full_name(),
                            },
                            ast.pos(id).clone(),
                        ));
                    }
                    check(ast, *ret_id)?;
                }
                None => {
                    if *block_type != builtins::unit() {
                        return Err(CompileError::at(
                            ErrorKind::AnnotationMismatch {
                                context: "block without return".into(),
                                expected: builtins::unit().full_name(),
                                actual: block_type.full_name(),
                            },
                            ast.pos(id).clone(),
                        ));
                    }
                }
            }
            for &statement in statements {
                check(ast, statement)?;
            }
            Ok(())
        }

        ExprKind::Method { signature, body } => {
            typed(ast, id)?;
            let signature_type = typed(ast, *signature)?;
            let ret = signature_type.return_type().ok_or_else(|| {
                CompileError::at(
                    ErrorKind::MissingAnnotation {
                        node: "method signature".into(),
                    },
                    ast.pos(*signature).clone(),
                )
            })?;
            let body_type = typed(ast, *body)?;
            if body_type != ret {
                return Err(CompileError::at(
                    ErrorKind::AnnotationMismatch {
                        context: "method return".into(),
                        expected: ret.full_name(),
                        actual: body_type.full_name(),
                    },
                    ast.pos(id).clone(),
                ));
            }
            check(ast, *body)
        }

        // Pairs are typed by the resolver but checked through their owners;
        // annotations stay untyped or Unit depending on their phase.
        ExprKind::Pair { .. }
        | ExprKind::Annotation { .. }
        | ExprKind::Signature { .. }
        | ExprKind::TraitDef { .. }
        | ExprKind::Api { .. }
        | ExprKind::Program { .. }
        | ExprKind::Root { .. } => Ok(()),
    }
}
