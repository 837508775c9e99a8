use frontend::ast::*;

pub trait AstVisitor {
    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    fn visit_statement(&mut self, statement: &Statement) {
        walk_statement(self, statement);
    }

    fn visit_function_definition(&mut self, function: &FunctionDefinition) {
        self.visit_block(&function.body);
    }

    fn visit_for_loop(&mut self, for_loop: &ForLoop) {
        walk_for_loop(self, for_loop);
    }

    fn visit_expression(&mut self, expression: &Expression) {
        walk_expression(self, expression);
    }

    fn visit_function_call(&mut self, call: &FunctionCall) {
        walk_function_call(self, call);
    }
}

pub fn walk_block<V: AstVisitor + ?Sized>(visitor: &mut V, block: &Block) {
    for statement in &block.statements {
        visitor.visit_statement(statement);
    }
}

pub fn walk_statement<V: AstVisitor + ?Sized>(visitor: &mut V, statement: &Statement) {
    match statement {
        Statement::Block(block) => visitor.visit_block(block),
        Statement::FunctionDefinition(function) => visitor.visit_function_definition(function),
        Statement::VariableDeclaration(declaration) => {
            if let Some(value) = &declaration.value {
                visitor.visit_expression(value);
            }
        }
        Statement::Assignment(assignment) => visitor.visit_expression(&assignment.value),
        Statement::Expression(expression) => visitor.visit_expression(expression),
        Statement::If(r#if) => {
            visitor.visit_expression(&r#if.condition);
            visitor.visit_block(&r#if.body);
            if let Some(else_body) = &r#if.else_body {
                visitor.visit_block(else_body);
            }
        }
        Statement::Switch(switch) => {
            visitor.visit_expression(&switch.expression);
            for case in &switch.cases {
                visitor.visit_block(&case.body);
            }
            if let Some(default) = &switch.default {
                visitor.visit_block(default);
            }
        }
        Statement::ForLoop(for_loop) => visitor.visit_for_loop(for_loop),
        Statement::Break | Statement::Continue | Statement::Leave => {}
    }
}

pub fn walk_for_loop<V: AstVisitor + ?Sized>(visitor: &mut V, for_loop: &ForLoop) {
    visitor.visit_block(&for_loop.pre);
    visitor.visit_expression(&for_loop.condition);
    visitor.visit_block(&for_loop.post);
    visitor.visit_block(&for_loop.body);
}

pub fn walk_expression<V: AstVisitor + ?Sized>(visitor: &mut V, expression: &Expression) {
    if let Expression::Call(call) = expression {
        visitor.visit_function_call(call);
    }
}

pub fn walk_function_call<V: AstVisitor + ?Sized>(visitor: &mut V, call: &FunctionCall) {
    for argument in &call.arguments {
        visitor.visit_expression(argument);
    }
}
