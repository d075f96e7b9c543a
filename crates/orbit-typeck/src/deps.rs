//! Dependency ordering of APIs.
//!
//! Reorders `Program.apis` so every API comes after everything it imports
//! via `with`, using Kahn's algorithm over the local import graph. Ties
//! (APIs with no import relation) keep their input order. A cycle fails
//! compilation with the offending chain; a self-import is a warning and the
//! edge is dropped.

use std::rc::Rc;

use orbit_ast::ExprKind;
use orbit_common::{CompileError, ErrorKind, Phase, Session, Warning};

use crate::{OrderedProgram, ParsedProgram};

pub const PHASE_NAME: &str = "DependencyGraph";

/// Phase 1: dependency ordering.
pub struct DependencyGraph {
    session: Rc<Session>,
}

impl DependencyGraph {
    pub fn new(session: Rc<Session>) -> Self {
        Self { session }
    }
}

impl Phase for DependencyGraph {
    type Input = ParsedProgram;
    type Output = OrderedProgram;

    fn name(&self) -> &'static str {
        PHASE_NAME
    }

    fn run(&mut self, input: Self::Input) -> Result<Self::Output, CompileError> {
        let ParsedProgram { ast, root } = input;

        let program = match ast.kind(root) {
            ExprKind::Root { body } => *body.first().ok_or_else(|| {
                CompileError::new(ErrorKind::UnsupportedStatement("empty root".into()))
            })?,
            other => {
                return Err(CompileError::new(ErrorKind::UnsupportedStatement(format!(
                    "expected a root expression, found {}",
                    other.tag()
                ))))
            }
        };
        let apis: Vec<_> = match ast.kind(program) {
            ExprKind::Program { apis } => apis.clone(),
            other => {
                return Err(CompileError::new(ErrorKind::UnsupportedStatement(format!(
                    "expected a program, found {}",
                    other.tag()
                ))))
            }
        };

        // Local name and dependency list per API. Imports that do not name a
        // local API are left for the extractor, which may find them on disk.
        let names: Vec<String> = apis
            .iter()
            .map(|&id| match ast.kind(id) {
                ExprKind::Api { name, .. } => Ok(name.clone()),
                other => Err(CompileError::at(
                    ErrorKind::UnsupportedStatement(format!(
                        "expected an api, found {}",
                        other.tag()
                    )),
                    ast.pos(id).clone(),
                )),
            })
            .collect::<Result<_, _>>()?;

        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); apis.len()];
        for (index, &id) in apis.iter().enumerate() {
            let with = match ast.kind(id) {
                ExprKind::Api { with, .. } => with.clone(),
                _ => unreachable!("validated above"),
            };
            for import in &with {
                if *import == names[index] {
                    self.session.warn(
                        Warning::SelfImport {
                            api: names[index].clone(),
                        },
                        Some(ast.pos(id).clone()),
                    );
                    continue;
                }
                if let Some(target) = names.iter().position(|n| n == import) {
                    if !deps[index].contains(&target) {
                        deps[index].push(target);
                    }
                }
            }
        }

        let order = topological_order(&names, &deps)?;
        let ordered: Vec<_> = order.iter().map(|&i| apis[i]).collect();
        log::debug!(
            "ordered {} api(s): {}",
            ordered.len(),
            order
                .iter()
                .map(|&i| names[i].as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(OrderedProgram { ast, apis: ordered })
    }
}

/// Kahn's algorithm with input-order tie-breaking.
///
/// `deps[i]` lists the indices API `i` depends on; dependencies come first
/// in the result. A cycle yields `CircularDependency` with the chain.
fn topological_order(names: &[String], deps: &[Vec<usize>]) -> Result<Vec<usize>, CompileError> {
    let n = names.len();
    let mut in_degree: Vec<usize> = deps.iter().map(|d| d.len()).collect();

    // Seed with dependency-free APIs; scanning in index order keeps ties in
    // input order throughout.
    let mut queue: std::collections::VecDeque<usize> =
        (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(current) = queue.pop_front() {
        order.push(current);
        for (i, d) in deps.iter().enumerate() {
            if in_degree[i] > 0 && d.contains(&current) {
                in_degree[i] -= 1;
                if in_degree[i] == 0 {
                    queue.push_back(i);
                }
            }
        }
    }

    if order.len() == n {
        Ok(order)
    } else {
        Err(CompileError::new(ErrorKind::CircularDependency(
            cycle_chain(names, deps, &in_degree),
        )))
    }
}

/// Walk dependency edges among unprocessed APIs until one repeats, producing
/// the cycle chain ending with the repeated name.
fn cycle_chain(names: &[String], deps: &[Vec<usize>], in_degree: &[usize]) -> Vec<String> {
    let start = match (0..names.len()).find(|&i| in_degree[i] > 0) {
        Some(i) => i,
        None => return Vec::new(),
    };

    let mut path: Vec<usize> = Vec::new();
    let mut visited = vec![false; names.len()];
    let mut current = start;

    loop {
        if visited[current] {
            let begin = path.iter().position(|&i| i == current).unwrap_or(0);
            let mut chain: Vec<String> = path[begin..].iter().map(|&i| names[i].clone()).collect();
            chain.push(names[current].clone());
            return chain;
        }
        visited[current] = true;
        path.push(current);

        match deps[current].iter().find(|&&d| in_degree[d] > 0) {
            Some(&next) => current = next,
            None => {
                return path.iter().map(|&i| names[i].clone()).collect();
            }
        }
    }
}
