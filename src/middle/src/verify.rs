use {
    super::{Error, Result},
    frontend::ast::*,
};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Postconditions {
    pub simple_loops: bool,
    pub no_loops: bool,
    pub no_switch: bool,
    pub atomic: bool,
    // functions only at the root, no nested blocks, declarations at the top level
    pub flat: bool,
    pub no_leave: bool,
}

#[derive(Clone, Copy)]
struct Context {
    in_function: bool,
    in_loop: bool,
    top_level: bool,
    root: bool,
}

struct Verifier {
    pass: &'static str,
    conditions: Postconditions,
}

impl Verifier {
    fn fail<T>(&self, message: String) -> Result<T> {
        Err(Error::invariant(self.pass, message))
    }

    fn block(&self, block: &Block, context: Context) -> Result<()> {
        block
            .statements
            .iter()
            .try_for_each(|statement| self.statement(statement, context))
    }

    fn nested(&self, block: &Block, context: Context) -> Result<()> {
        self.block(
            block,
            Context {
                top_level: false,
                root: false,
                ..context
            },
        )
    }

    fn statement(&self, statement: &Statement, context: Context) -> Result<()> {
        let conditions = self.conditions;
        match statement {
            Statement::Block(block) => {
                if conditions.flat {
                    return self.fail(format!("nested block remains: {block}"));
                }
                self.nested(block, context)
            }
            Statement::FunctionDefinition(function) => {
                if conditions.flat && !context.root {
                    return self.fail(format!("function `{}` is not at the root", function.name));
                }
                self.block(
                    &function.body,
                    Context {
                        in_function: true,
                        in_loop: false,
                        top_level: true,
                        root: false,
                    },
                )
            }
            Statement::VariableDeclaration(declaration) => {
                if conditions.flat && !context.top_level {
                    return self.fail(format!("declaration below the top level: {statement}"));
                }
                declaration
                    .value
                    .iter()
                    .try_for_each(|value| self.expression(value))
            }
            Statement::Assignment(assignment) => self.expression(&assignment.value),
            Statement::Expression(expression) => self.expression(expression),
            Statement::If(r#if) => {
                self.condition(&r#if.condition)?;
                self.nested(&r#if.body, context)?;
                r#if.else_body
                    .iter()
                    .try_for_each(|else_body| self.nested(else_body, context))
            }
            Statement::Switch(switch) => {
                if conditions.no_switch {
                    return self.fail(format!("switch remains on `{}`", switch.expression));
                }
                self.expression(&switch.expression)?;
                for case in &switch.cases {
                    self.nested(&case.body, context)?;
                }
                switch
                    .default
                    .iter()
                    .try_for_each(|default| self.nested(default, context))
            }
            Statement::ForLoop(for_loop) => {
                if conditions.no_loops {
                    return self.fail(format!("loop remains on `{}`", for_loop.condition));
                }
                if conditions.simple_loops
                    && !(for_loop.pre.statements.is_empty() && for_loop.post.statements.is_empty())
                {
                    return self.fail(format!(
                        "loop on `{}` still has pre or post statements",
                        for_loop.condition
                    ));
                }
                let outside = Context {
                    in_loop: false,
                    ..context
                };
                self.nested(&for_loop.pre, outside)?;
                self.expression(&for_loop.condition)?;
                self.nested(&for_loop.post, outside)?;
                self.nested(
                    &for_loop.body,
                    Context {
                        in_loop: true,
                        ..context
                    },
                )
            }
            Statement::Break | Statement::Continue => {
                if conditions.no_loops {
                    return self.fail(format!("`{statement}` remains"));
                }
                if !context.in_loop {
                    return self.fail(format!("`{statement}` outside of a loop body"));
                }
                Ok(())
            }
            Statement::Leave => {
                if conditions.no_leave {
                    return self.fail("`leave` remains".to_owned());
                }
                if !context.in_function {
                    return self.fail("`leave` outside of a function".to_owned());
                }
                Ok(())
            }
        }
    }

    fn condition(&self, condition: &Expression) -> Result<()> {
        match condition {
            Expression::Call(call)
                if self.conditions.atomic
                    && !(call.name == "iszero" && call.arguments.iter().all(Expression::is_atom)) =>
            {
                self.fail(format!("condition `{condition}` is not atomic"))
            }
            _ => self.expression(condition),
        }
    }

    fn expression(&self, expression: &Expression) -> Result<()> {
        let Expression::Call(call) = expression else {
            return Ok(());
        };
        for argument in &call.arguments {
            if self.conditions.atomic && !argument.is_atom() {
                return self.fail(format!("argument `{argument}` of `{}` is not atomic", call.name));
            }
            self.expression(argument)?;
        }
        Ok(())
    }
}

pub(crate) fn verify(pass: &'static str, conditions: Postconditions, block: &Block) -> Result<()> {
    Verifier { pass, conditions }.block(
        block,
        Context {
            in_function: false,
            in_loop: false,
            top_level: true,
            root: true,
        },
    )
}
