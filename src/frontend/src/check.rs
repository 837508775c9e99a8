use {
    super::{ast::*, RESERVED_PREFIX},
    anyhow::bail,
    std::collections::BTreeSet,
};

fn check_name(name: &str) -> anyhow::Result<()> {
    if name.starts_with(RESERVED_PREFIX) {
        bail!("identifier `{name}` uses the reserved prefix `{RESERVED_PREFIX}`");
    }
    Ok(())
}

fn check_literal(value: &num_bigint::BigUint) -> anyhow::Result<()> {
    if value.bits() > 256 {
        bail!("literal {value} does not fit in 256 bits");
    }
    Ok(())
}

fn check_expression(expression: &Expression) -> anyhow::Result<()> {
    match expression {
        Expression::Literal(value) => check_literal(value),
        Expression::Identifier(name) => check_name(name),
        Expression::Call(call) => {
            check_name(&call.name)?;
            call.arguments.iter().try_for_each(check_expression)
        }
    }
}

fn check_block(block: &Block) -> anyhow::Result<()> {
    block.statements.iter().try_for_each(check_statement)
}

fn check_statement(statement: &Statement) -> anyhow::Result<()> {
    match statement {
        Statement::Block(block) => check_block(block),
        Statement::FunctionDefinition(function) => {
            check_name(&function.name)?;
            for name in function.parameters.iter().chain(&function.returns) {
                check_name(name)?;
            }
            check_block(&function.body)
        }
        Statement::VariableDeclaration(declaration) => {
            declaration.variables.iter().try_for_each(|name| check_name(name))?;
            declaration.value.iter().try_for_each(check_expression)
        }
        Statement::Assignment(assignment) => {
            assignment.variables.iter().try_for_each(|name| check_name(name))?;
            check_expression(&assignment.value)
        }
        Statement::Expression(expression) => check_expression(expression),
        Statement::If(r#if) => {
            check_expression(&r#if.condition)?;
            check_block(&r#if.body)?;
            r#if.else_body.iter().try_for_each(check_block)
        }
        Statement::Switch(switch) => {
            check_expression(&switch.expression)?;
            if switch.cases.is_empty() && switch.default.is_none() {
                bail!("switch on `{}` has neither cases nor a default", switch.expression);
            }
            let mut seen = BTreeSet::new();
            for case in &switch.cases {
                check_literal(&case.value)?;
                if !seen.insert(&case.value) {
                    bail!("duplicate case {} in switch on `{}`", case.value, switch.expression);
                }
                check_block(&case.body)?;
            }
            switch.default.iter().try_for_each(check_block)
        }
        Statement::ForLoop(for_loop) => {
            check_block(&for_loop.pre)?;
            check_expression(&for_loop.condition)?;
            check_block(&for_loop.post)?;
            check_block(&for_loop.body)
        }
        Statement::Break | Statement::Continue | Statement::Leave => Ok(()),
    }
}

/// Rejects programs the rest of the pipeline cannot assume away: reserved names,
/// literals wider than a word, and empty or ambiguous switches.
///
/// Parsing is purely syntactic; every ingested program goes through this check before it is
/// transformed.
pub fn check(block: &Block) -> anyhow::Result<()> {
    check_block(block)
}
