//! Postfix query evaluation over relation sets.
//!
//! Operands name tags and evaluate to the set of files related to them.
//! `!` complements against every live file; there is no tag universe.

use super::compiler::{compile, CompiledQuery, PostfixToken};
use super::{ParseError, QueryError, QueryResult};
use crate::model::elem::ElemKind;
use crate::model::set_list::SetList;
use crate::store::RelationStore;
use log::{debug, info};
use std::time::Instant;

/// Compiles and evaluates `text` in one step.
pub fn evaluate_text(store: &RelationStore, text: &str) -> QueryResult<SetList> {
    let query = compile(text)?;
    evaluate(store, &query)
}

/// Evaluates a compiled query.
///
/// # Errors
/// - `UnknownEntity` when an operand names no live tag.
/// - `Parse` when the stack under- or overflows.
pub fn evaluate(store: &RelationStore, query: &CompiledQuery) -> QueryResult<SetList> {
    let started_at = Instant::now();
    let mut operands = query.operands.iter();
    let mut stack: Vec<SetList> = Vec::new();

    for &token in &query.postfix {
        match token {
            PostfixToken::Operand => {
                let name = operands
                    .next()
                    .ok_or(ParseError::DanglingOperands { count: stack.len() })?;
                let elem = store.find(ElemKind::Tag, name)?.ok_or_else(|| {
                    QueryError::UnknownEntity {
                        kind: ElemKind::Tag,
                        name: name.clone(),
                    }
                })?;
                stack.push(store.list_related(&elem)?);
            }
            PostfixToken::Not => {
                let operand = pop(&mut stack, token)?;
                let mut universe = store.list_all(ElemKind::File)?;
                universe.diff(&operand);
                stack.push(universe);
            }
            PostfixToken::And => {
                let right = pop(&mut stack, token)?;
                let mut left = pop(&mut stack, token)?;
                left.intersect(&right);
                stack.push(left);
            }
            PostfixToken::Or => {
                let right = pop(&mut stack, token)?;
                let mut left = pop(&mut stack, token)?;
                left.union(right);
                stack.push(left);
            }
        }
        debug!(
            "event=query_step module=query token={} depth={}",
            token.symbol(),
            stack.len()
        );
    }

    if stack.len() != 1 {
        return Err(ParseError::DanglingOperands { count: stack.len() }.into());
    }
    let result = stack.pop().unwrap_or_default();
    info!(
        "event=query_eval module=query status=ok duration_ms={} operands={} matches={}",
        started_at.elapsed().as_millis(),
        query.operands.len(),
        result.len()
    );
    Ok(result)
}

fn pop(stack: &mut Vec<SetList>, token: PostfixToken) -> Result<SetList, ParseError> {
    stack.pop().ok_or(ParseError::MissingOperand {
        operator: token.symbol(),
    })
}
