//! Owning tree rewrites. A pass overrides the node kinds it cares about and calls the
//! matching `walk_*` function wherever it still wants the children rewritten.

use {
    super::Result,
    frontend::ast::*,
    num_bigint::BigUint,
};

pub(crate) trait AstMapper {
    fn map_block(&mut self, block: Block) -> Result<Block> {
        walk_block(self, block)
    }

    fn map_statement(&mut self, statement: Statement) -> Result<Statement> {
        walk_statement(self, statement)
    }

    fn map_function_definition(&mut self, function: FunctionDefinition) -> Result<Statement> {
        walk_function_definition(self, function).map(Statement::FunctionDefinition)
    }

    fn map_variable_declaration(&mut self, declaration: VariableDeclaration) -> Result<Statement> {
        walk_variable_declaration(self, declaration).map(Statement::VariableDeclaration)
    }

    fn map_assignment(&mut self, assignment: Assignment) -> Result<Statement> {
        walk_assignment(self, assignment).map(Statement::Assignment)
    }

    fn map_expression_statement(&mut self, expression: Expression) -> Result<Statement> {
        self.map_expression(expression).map(Statement::Expression)
    }

    fn map_if(&mut self, r#if: If) -> Result<Statement> {
        walk_if(self, r#if).map(Statement::If)
    }

    fn map_switch(&mut self, switch: Switch) -> Result<Statement> {
        walk_switch(self, switch).map(Statement::Switch)
    }

    fn map_for_loop(&mut self, for_loop: ForLoop) -> Result<Statement> {
        walk_for_loop(self, for_loop).map(Statement::ForLoop)
    }

    fn map_break(&mut self) -> Result<Statement> {
        Ok(Statement::Break)
    }

    fn map_continue(&mut self) -> Result<Statement> {
        Ok(Statement::Continue)
    }

    fn map_leave(&mut self) -> Result<Statement> {
        Ok(Statement::Leave)
    }

    fn map_expression(&mut self, expression: Expression) -> Result<Expression> {
        walk_expression(self, expression)
    }

    fn map_function_call(&mut self, call: FunctionCall) -> Result<Expression> {
        walk_function_call(self, call).map(Expression::Call)
    }

    fn map_identifier(&mut self, name: Ident) -> Result<Expression> {
        Ok(Expression::Identifier(name))
    }

    fn map_literal(&mut self, value: BigUint) -> Result<Expression> {
        Ok(Expression::Literal(value))
    }
}

pub(crate) fn walk_block<M: AstMapper + ?Sized>(mapper: &mut M, block: Block) -> Result<Block> {
    block
        .statements
        .into_iter()
        .map(|statement| mapper.map_statement(statement))
        .collect::<Result<_>>()
        .map(Block::new)
}

pub(crate) fn walk_statement<M: AstMapper + ?Sized>(
    mapper: &mut M,
    statement: Statement,
) -> Result<Statement> {
    match statement {
        Statement::Block(block) => mapper.map_block(block).map(Statement::Block),
        Statement::FunctionDefinition(function) => mapper.map_function_definition(function),
        Statement::VariableDeclaration(declaration) => {
            mapper.map_variable_declaration(declaration)
        }
        Statement::Assignment(assignment) => mapper.map_assignment(assignment),
        Statement::Expression(expression) => mapper.map_expression_statement(expression),
        Statement::If(r#if) => mapper.map_if(r#if),
        Statement::Switch(switch) => mapper.map_switch(switch),
        Statement::ForLoop(for_loop) => mapper.map_for_loop(for_loop),
        Statement::Break => mapper.map_break(),
        Statement::Continue => mapper.map_continue(),
        Statement::Leave => mapper.map_leave(),
    }
}

pub(crate) fn walk_function_definition<M: AstMapper + ?Sized>(
    mapper: &mut M,
    function: FunctionDefinition,
) -> Result<FunctionDefinition> {
    Ok(FunctionDefinition {
        body: mapper.map_block(function.body)?,
        ..function
    })
}

pub(crate) fn walk_variable_declaration<M: AstMapper + ?Sized>(
    mapper: &mut M,
    declaration: VariableDeclaration,
) -> Result<VariableDeclaration> {
    Ok(VariableDeclaration {
        value: declaration
            .value
            .map(|value| mapper.map_expression(value))
            .transpose()?,
        ..declaration
    })
}

pub(crate) fn walk_assignment<M: AstMapper + ?Sized>(
    mapper: &mut M,
    assignment: Assignment,
) -> Result<Assignment> {
    Ok(Assignment {
        value: mapper.map_expression(assignment.value)?,
        ..assignment
    })
}

pub(crate) fn walk_if<M: AstMapper + ?Sized>(mapper: &mut M, r#if: If) -> Result<If> {
    Ok(If {
        condition: mapper.map_expression(r#if.condition)?,
        body: mapper.map_block(r#if.body)?,
        else_body: r#if
            .else_body
            .map(|else_body| mapper.map_block(else_body))
            .transpose()?,
    })
}

pub(crate) fn walk_switch<M: AstMapper + ?Sized>(mapper: &mut M, switch: Switch) -> Result<Switch> {
    Ok(Switch {
        expression: mapper.map_expression(switch.expression)?,
        cases: switch
            .cases
            .into_iter()
            .map(|case| {
                Ok(Case {
                    value: case.value,
                    body: mapper.map_block(case.body)?,
                })
            })
            .collect::<Result<_>>()?,
        default: switch
            .default
            .map(|default| mapper.map_block(default))
            .transpose()?,
    })
}

pub(crate) fn walk_for_loop<M: AstMapper + ?Sized>(
    mapper: &mut M,
    for_loop: ForLoop,
) -> Result<ForLoop> {
    Ok(ForLoop {
        pre: mapper.map_block(for_loop.pre)?,
        condition: mapper.map_expression(for_loop.condition)?,
        post: mapper.map_block(for_loop.post)?,
        body: mapper.map_block(for_loop.body)?,
    })
}

pub(crate) fn walk_expression<M: AstMapper + ?Sized>(
    mapper: &mut M,
    expression: Expression,
) -> Result<Expression> {
    match expression {
        Expression::Literal(value) => mapper.map_literal(value),
        Expression::Identifier(name) => mapper.map_identifier(name),
        Expression::Call(call) => mapper.map_function_call(call),
    }
}

pub(crate) fn walk_function_call<M: AstMapper + ?Sized>(
    mapper: &mut M,
    call: FunctionCall,
) -> Result<FunctionCall> {
    Ok(FunctionCall {
        arguments: call
            .arguments
            .into_iter()
            .map(|argument| mapper.map_expression(argument))
            .collect::<Result<_>>()?,
        ..call
    })
}
