use {
    crate::{
        builtins,
        mapper::{self, AstMapper},
        names, Error, Result,
    },
    frontend::ast::*,
    std::collections::{BTreeMap, BTreeSet},
};

const CAIRO_KEYWORDS: &[&str] = &[
    "abs", "alloc_locals", "and", "ap", "assert", "call", "cast", "codeoffset", "const",
    "dw", "else", "end", "felt", "fp", "from", "func", "if", "import", "jmp", "let", "local",
    "member", "namespace", "new", "nondet", "rel", "ret", "return", "static_assert", "struct",
    "tempvar", "using", "with", "with_attr",
];

const TARGET_NAMES: &[&str] = &[
    "BitwiseBuiltin",
    "DictAccess",
    "HashBuiltin",
    "Uint256",
    "bitwise_ptr",
    "default_dict_finalize",
    "default_dict_new",
    "memory_dict",
    "memory_dict_start",
    "msize",
    "pedersen_ptr",
    "range_check_ptr",
    "syscall_ptr",
];

pub const EXTERNAL_SUFFIX: &str = "_external";

fn is_reserved(name: &str) -> bool {
    CAIRO_KEYWORDS.contains(&name)
        || TARGET_NAMES.contains(&name)
        || name.starts_with("uint256_")
        || builtins::is_builtin(name)
        || builtins::library_functions().any(|function| function == name)
}

fn sanitize(name: &str) -> String {
    let sanitized = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>();
    if names::is_generated(&sanitized) {
        format!("v{sanitized}")
    } else {
        sanitized
    }
}

#[derive(Debug)]
pub(crate) struct Mangled {
    pub block: Block,
    pub root_functions: Vec<(Ident, Ident)>,
}

#[derive(Default)]
struct NameMangler {
    used: BTreeSet<Ident>,
    variables: Vec<BTreeMap<Ident, Ident>>,
    functions: Vec<BTreeMap<Ident, Ident>>,
    root_functions: Vec<(Ident, Ident)>,
}

impl NameMangler {
    fn allocate(&mut self, name: &str, root_function: bool) -> Ident {
        if names::is_generated(name) {
            self.used.insert(name.to_owned());
            return name.to_owned();
        }
        let base = sanitize(name);
        let available = |used: &BTreeSet<Ident>, candidate: &str| {
            !used.contains(candidate)
                && !is_reserved(candidate)
                && !(root_function && used.contains(&format!("{candidate}{EXTERNAL_SUFFIX}")))
        };
        let mut candidate = base.clone();
        let mut suffix = 0;
        while !available(&self.used, &candidate) {
            suffix += 1;
            candidate = format!("{base}_{suffix}");
        }
        if root_function {
            self.used.insert(format!("{candidate}{EXTERNAL_SUFFIX}"));
        }
        self.used.insert(candidate.clone());
        candidate
    }

    fn declare(&mut self, name: &Ident) -> Ident {
        let mangled = self.allocate(name, false);
        if let Some(scope) = self.variables.last_mut() {
            scope.insert(name.clone(), mangled.clone());
        }
        mangled
    }

    fn resolve_variable(&self, name: &str) -> Result<Ident> {
        self.variables
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
            .ok_or_else(|| Error::Unsupported(format!("undeclared variable `{name}`")))
    }

    fn resolve_function(&self, name: &str) -> Option<Ident> {
        self.functions
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .cloned()
    }
}

impl AstMapper for NameMangler {
    fn map_block(&mut self, block: Block) -> Result<Block> {
        let root = self.functions.is_empty();
        let mut functions = BTreeMap::new();
        for function in block.functions() {
            let mangled = self.allocate(&function.name, root);
            if root {
                self.root_functions
                    .push((function.name.clone(), mangled.clone()));
            }
            functions.insert(function.name.clone(), mangled);
        }
        self.functions.push(functions);
        self.variables.push(BTreeMap::new());
        let block = mapper::walk_block(self, block);
        self.variables.pop();
        self.functions.pop();
        block
    }

    fn map_function_definition(&mut self, function: FunctionDefinition) -> Result<Statement> {
        let name = self.resolve_function(&function.name).ok_or_else(|| {
            Error::invariant("name mangler", format!("function `{}` was not hoisted", function.name))
        })?;
        // a function body sees no variables from outside
        let outer = std::mem::replace(&mut self.variables, vec![BTreeMap::new()]);
        let parameters = function.parameters.iter().map(|p| self.declare(p)).collect();
        let returns = function.returns.iter().map(|r| self.declare(r)).collect();
        let body = self.map_block(function.body);
        self.variables = outer;
        Ok(Statement::FunctionDefinition(FunctionDefinition {
            name,
            parameters,
            returns,
            body: body?,
        }))
    }

    fn map_variable_declaration(&mut self, declaration: VariableDeclaration) -> Result<Statement> {
        let value = declaration
            .value
            .map(|value| self.map_expression(value))
            .transpose()?;
        let variables = declaration.variables.iter().map(|v| self.declare(v)).collect();
        Ok(Statement::declare(variables, value))
    }

    fn map_assignment(&mut self, assignment: Assignment) -> Result<Statement> {
        let variables = assignment
            .variables
            .iter()
            .map(|variable| self.resolve_variable(variable))
            .collect::<Result<_>>()?;
        let value = self.map_expression(assignment.value)?;
        Ok(Statement::assign(variables, value))
    }

    fn map_identifier(&mut self, name: Ident) -> Result<Expression> {
        self.resolve_variable(&name).map(Expression::Identifier)
    }

    fn map_function_call(&mut self, call: FunctionCall) -> Result<Expression> {
        let call = mapper::walk_function_call(self, call)?;
        let name = match self.resolve_function(&call.name) {
            Some(name) => name,
            None if builtins::is_builtin(&call.name) => call.name,
            None => {
                return Err(Error::Unsupported(format!(
                    "call of undefined function `{}`",
                    call.name
                )))
            }
        };
        Ok(Expression::call(name, call.arguments))
    }
}

pub(crate) fn run(block: Block) -> Result<Mangled> {
    let mut mangler = NameMangler::default();
    let block = mangler.map_block(block)?;
    Ok(Mangled {
        block,
        root_functions: mangler.root_functions,
    })
}

#[cfg(test)]
mod tests {
    use {super::*, crate::passes::test_utils::block};

    #[test]
    fn sibling_scopes_get_distinct_names() {
        let mangled = run(block(
            "{ function f() -> r { { let x := 1 r := x } { let x := 2 r := add(r, x) } } }",
        ))
        .unwrap();
        let expected = block(
            "{ function f() -> r { { let x := 1 r := x } { let x_1 := 2 r := add(r, x_1) } } }",
        );
        assert_eq!(mangled.block, expected);
    }

    #[test]
    fn target_names_are_avoided() {
        let mangled = run(block(
            "{ function felt(local) -> alloc_locals { alloc_locals := local } \
             function a.b$c() { pop(felt(1)) } }",
        ))
        .unwrap();
        let expected = block(
            "{ function felt_1(local_1) -> alloc_locals_1 { alloc_locals_1 := local_1 } \
             function a_b_c() { pop(felt_1(1)) } }",
        );
        assert_eq!(mangled.block, expected);
        assert_eq!(
            mangled.root_functions,
            [
                ("felt".to_owned(), "felt_1".to_owned()),
                ("a.b$c".to_owned(), "a_b_c".to_owned())
            ]
        );
    }

    #[test]
    fn names_are_unique_across_functions() {
        let mangled = run(block(
            "{ function f(a) -> b { b := a } function g(a) -> b { b := f(a) } }",
        ))
        .unwrap();
        let expected = block(
            "{ function f(a) -> b { b := a } function g(a_1) -> b_1 { b_1 := f(a_1) } }",
        );
        assert_eq!(mangled.block, expected);
    }

    #[test]
    fn external_wrapper_names_are_claimed() {
        let mangled = run(block(
            "{ function f_external() { } function f() { let f_external := 1 } }",
        ))
        .unwrap();
        let names = mangled
            .root_functions
            .iter()
            .map(|(_, mangled)| mangled.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["f_external", "f_1"]);
        assert!(mangled.block.to_string().contains("let f_external_1 := 1"));
    }

    #[test]
    fn generated_names_are_kept() {
        let mangled = run(block("{ function __warp_loop_0(x) -> y { y := x } }")).unwrap();
        assert_eq!(
            mangled.block,
            block("{ function __warp_loop_0(x) -> y { y := x } }")
        );
    }

    #[test]
    fn undefined_names_are_rejected() {
        assert!(run(block("{ pop(x) }")).is_err());
        assert!(run(block("{ pop(frobnicate(1)) }")).is_err());
    }
}
