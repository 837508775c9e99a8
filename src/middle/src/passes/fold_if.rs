use {
    crate::{
        mapper::{self, AstMapper},
        Result,
    },
    frontend::ast::*,
    num_traits::Zero,
};

struct FoldIf;

impl AstMapper for FoldIf {
    fn map_if(&mut self, r#if: If) -> Result<Statement> {
        let r#if = mapper::walk_if(self, r#if)?;
        Ok(match r#if.condition {
            Expression::Literal(value) if value.is_zero() => {
                Statement::Block(r#if.else_body.unwrap_or_default())
            }
            Expression::Literal(_) => Statement::Block(r#if.body),
            _ => Statement::If(r#if),
        })
    }
}

pub(crate) fn run(block: Block) -> Result<Block> {
    FoldIf.map_block(block)
}
