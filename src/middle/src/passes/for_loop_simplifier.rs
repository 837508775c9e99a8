use {
    crate::{
        mapper::{self, AstMapper},
        Result,
    },
    frontend::ast::*,
};

struct ContinueRewriter<'a> {
    post: &'a Block,
}

impl AstMapper for ContinueRewriter<'_> {
    fn map_continue(&mut self) -> Result<Statement> {
        let mut statements = self.post.statements.clone();
        statements.push(Statement::Continue);
        Ok(Statement::Block(Block::new(statements)))
    }

    // nested loops and functions own their continues
    fn map_for_loop(&mut self, for_loop: ForLoop) -> Result<Statement> {
        Ok(Statement::ForLoop(for_loop))
    }

    fn map_function_definition(&mut self, function: FunctionDefinition) -> Result<Statement> {
        Ok(Statement::FunctionDefinition(function))
    }
}

struct ForLoopSimplifier;

impl AstMapper for ForLoopSimplifier {
    fn map_for_loop(&mut self, for_loop: ForLoop) -> Result<Statement> {
        let ForLoop {
            pre,
            condition,
            post,
            body,
        } = mapper::walk_for_loop(self, for_loop)?;
        let mut body = body;
        if !post.statements.is_empty() {
            body = ContinueRewriter { post: &post }.map_block(body)?;
            body.statements.push(Statement::Block(post));
        }
        let mut statements = pre.statements;
        statements.push(Statement::ForLoop(ForLoop {
            pre: Block::default(),
            condition,
            post: Block::default(),
            body,
        }));
        Ok(Statement::Block(Block::new(statements)))
    }
}

pub(crate) fn run(block: Block) -> Result<Block> {
    ForLoopSimplifier.map_block(block)
}
