use {
    super::{
        cairo::*,
        functions::HelperCache,
        library::{self, Implicit},
        Error, Result,
    },
    frontend::ast::{self, FunctionDefinition, Ident, Statement},
    middle::{
        analysis::Variables,
        builtins::{self, Lowering},
        names::NameGenerator,
        Normalized,
    },
    num_traits::Zero,
    std::collections::{BTreeMap, BTreeSet},
    tracing::debug,
    velcro::vec,
};

const MEMORY_DICT_START: &str = "memory_dict_start";

// cairo locals cannot be reassigned, so each assignment binds a new version
#[derive(Debug, Clone, Default)]
struct Scope {
    versions: BTreeMap<Ident, Name>,
    defined: BTreeSet<Name>,
}

impl Scope {
    fn bind(&mut self, variable: &Ident) {
        self.versions.insert(variable.clone(), variable.clone());
        self.defined.insert(variable.clone());
    }

    fn define(&mut self, variable: &Ident, names: &mut NameGenerator) -> Name {
        let name = if self.defined.contains(variable) {
            names.fresh_from(variable)
        } else {
            variable.clone()
        };
        self.defined.insert(name.clone());
        self.versions.insert(variable.clone(), name.clone());
        name
    }

    fn get(&self, variable: &Ident) -> Result<Expression> {
        self.versions
            .get(variable)
            .map(Expression::name)
            .ok_or_else(|| Error::Invariant(format!("`{variable}` is used before it is defined")))
    }
}

enum Test<'a> {
    Static(bool),
    Dynamic { variable: &'a Ident, nonzero: bool },
}

fn test(condition: &ast::Expression) -> Result<Test<'_>> {
    use ast::Expression::*;

    match condition {
        Literal(value) => Ok(Test::Static(!value.is_zero())),
        Identifier(variable) => Ok(Test::Dynamic {
            variable,
            nonzero: true,
        }),
        Call(call) if call.name == "iszero" => match &call.arguments[..] {
            [Literal(value)] => Ok(Test::Static(value.is_zero())),
            [Identifier(variable)] => Ok(Test::Dynamic {
                variable,
                nonzero: false,
            }),
            _ => Err(Error::Invariant(format!("condition `{condition}` is not atomic"))),
        },
        _ => Err(Error::Invariant(format!("condition `{condition}` is not atomic"))),
    }
}

fn zero(name: Name) -> Instruction {
    Instruction::Local {
        name,
        ty: Type::Uint256,
        value: Expression::uint256(&Zero::zero()),
    }
}

struct Generator<'a> {
    names: &'a mut NameGenerator,
    signatures: BTreeMap<&'a str, (usize, usize)>,
    helpers: HelperCache,
    branches: Vec<Function>,
}

impl Generator<'_> {
    fn function(&mut self, function: &FunctionDefinition) -> Result<Function> {
        let mut scope = Scope::default();
        for parameter in &function.parameters {
            scope.bind(parameter);
        }
        let mut body = vec![Instruction::AllocLocals];
        for variable in &function.returns {
            body.push(zero(scope.define(variable, self.names)));
        }
        self.statements(&function.body.statements, &mut scope, &mut body)?;
        body.push(Instruction::Return(
            function
                .returns
                .iter()
                .map(|variable| scope.get(variable))
                .collect::<Result<_>>()?,
        ));
        Ok(Function {
            decorators: vec![],
            name: function.name.clone(),
            implicits: vec![],
            parameters: function.parameters.iter().map(Param::uint256).collect(),
            returns: function.returns.iter().map(Param::uint256).collect(),
            body,
        })
    }

    fn statements(
        &mut self,
        statements: &[Statement],
        scope: &mut Scope,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        statements
            .iter()
            .try_for_each(|statement| self.statement(statement, scope, out))
    }

    fn statement(
        &mut self,
        statement: &Statement,
        scope: &mut Scope,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        match statement {
            Statement::VariableDeclaration(declaration) => match &declaration.value {
                Some(value) => self.define(&declaration.variables, value, scope, out)?,
                None => {
                    for variable in &declaration.variables {
                        out.push(zero(scope.define(variable, self.names)));
                    }
                }
            },
            Statement::Assignment(assignment) => {
                self.define(&assignment.variables, &assignment.value, scope, out)?
            }
            Statement::Expression(ast::Expression::Call(call)) => {
                if let Some((call, returns)) = self.call(call, scope)? {
                    out.push(match returns {
                        0 => Instruction::Call(call),
                        returns => Instruction::Let {
                            bindings: (0..returns).map(|_| Binding::Ignored).collect(),
                            call,
                        },
                    });
                }
            }
            Statement::If(r#if) => self.branch(r#if, scope, out)?,
            Statement::Expression(_)
            | Statement::Block(_)
            | Statement::FunctionDefinition(_)
            | Statement::Switch(_)
            | Statement::ForLoop(_)
            | Statement::Break
            | Statement::Continue
            | Statement::Leave => {
                return Err(Error::Invariant(format!(
                    "{} remains in a function body: {statement}",
                    statement.kind()
                )))
            }
        }
        Ok(())
    }

    fn define(
        &mut self,
        variables: &[Ident],
        value: &ast::Expression,
        scope: &mut Scope,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        match value {
            ast::Expression::Call(call) => {
                let Some((call, returns)) = self.call(call, scope)? else {
                    return Err(Error::Invariant(format!(
                        "`{value}` has no value to assign"
                    )));
                };
                if returns != variables.len() {
                    return Err(Error::Invariant(format!(
                        "`{value}` returns {returns} values, not {}",
                        variables.len()
                    )));
                }
                let bindings = variables
                    .iter()
                    .map(|variable| {
                        Binding::Local(Param::uint256(scope.define(variable, self.names)))
                    })
                    .collect();
                out.push(Instruction::Let { bindings, call });
            }
            atom => {
                let [variable] = variables else {
                    return Err(Error::Invariant(format!(
                        "`{atom}` assigned to {} variables",
                        variables.len()
                    )));
                };
                let value = self.atom(atom, scope)?;
                out.push(Instruction::Local {
                    name: scope.define(variable, self.names),
                    ty: Type::Uint256,
                    value,
                });
            }
        }
        Ok(())
    }

    fn atom(&self, atom: &ast::Expression, scope: &Scope) -> Result<Expression> {
        match atom {
            ast::Expression::Literal(value) => Ok(Expression::uint256(value)),
            ast::Expression::Identifier(variable) => scope.get(variable),
            ast::Expression::Call(_) => {
                Err(Error::Invariant(format!("nested call `{atom}` remains")))
            }
        }
    }

    fn call(
        &mut self,
        call: &ast::FunctionCall,
        scope: &Scope,
    ) -> Result<Option<(Call, usize)>> {
        let arguments = call
            .arguments
            .iter()
            .map(|argument| self.atom(argument, scope))
            .collect::<Result<Vec<_>>>()?;
        if let Some(&(parameters, returns)) = self.signatures.get(call.name.as_str()) {
            if parameters != arguments.len() {
                return Err(Error::Invariant(format!(
                    "`{}` takes {parameters} arguments, not {}",
                    call.name,
                    arguments.len()
                )));
            }
            let call = Call {
                function: call.name.clone(),
                arguments,
            };
            return Ok(Some((call, returns)));
        }
        let builtin = builtins::lookup(&call.name)
            .ok_or_else(|| Error::Unsupported(format!("unknown function `{}`", call.name)))?;
        let function = match builtin.lowering {
            Lowering::Library(function) => function.to_owned(),
            Lowering::Helper(helper) => self.helpers.request(helper)?,
            Lowering::Discard => return Ok(None),
            Lowering::Canonicalized => {
                return Err(Error::Invariant(format!(
                    "`{}` should have been rewritten before code generation",
                    call.name
                )))
            }
        };
        Ok(Some((
            Call {
                function,
                arguments,
            },
            builtin.returns,
        )))
    }

    fn branch(
        &mut self,
        r#if: &ast::If,
        scope: &mut Scope,
        out: &mut Vec<Instruction>,
    ) -> Result<()> {
        let else_statements = r#if
            .else_body
            .as_ref()
            .map_or(&[][..], |else_body| &else_body.statements[..]);
        let (variable, nonzero) = match test(&r#if.condition)? {
            Test::Static(true) => return self.statements(&r#if.body.statements, scope, out),
            Test::Static(false) => return self.statements(else_statements, scope, out),
            Test::Dynamic { variable, nonzero } => (variable, nonzero),
        };

        let variables =
            Variables::of_statements(r#if.body.statements.iter().chain(else_statements));
        let outputs = variables.assigned.iter().cloned().collect::<Vec<_>>();
        let inputs = variables
            .read
            .iter()
            .chain(&variables.assigned)
            .chain([variable])
            .cloned()
            .collect::<BTreeSet<_>>();
        let name = self.names.fresh("if");

        let mut entry = Scope::default();
        for input in &inputs {
            entry.bind(input);
        }
        let mut defined = entry.defined.clone();
        let body = self.arm(&r#if.body.statements, &entry, &mut defined, &outputs)?;
        let else_body = self.arm(else_statements, &entry, &mut defined, &outputs)?;
        self.branches.push(Function {
            decorators: vec![],
            name: name.clone(),
            implicits: vec![],
            parameters: inputs.iter().map(Param::uint256).collect(),
            returns: outputs.iter().map(Param::uint256).collect(),
            body: vec![
                Instruction::AllocLocals,
                Instruction::If {
                    condition: Condition {
                        left: Expression::limb_sum(Expression::name(variable)),
                        equal: !nonzero,
                        right: Expression::int(0u8),
                    },
                    body,
                    else_body: Some(else_body),
                },
            ],
        });

        let call = Call {
            function: name,
            arguments: inputs
                .iter()
                .map(|input| scope.get(input))
                .collect::<Result<_>>()?,
        };
        out.push(if outputs.is_empty() {
            Instruction::Call(call)
        } else {
            let bindings = outputs
                .iter()
                .map(|output| Binding::Local(Param::uint256(scope.define(output, self.names))))
                .collect();
            Instruction::Let { bindings, call }
        });
        Ok(())
    }

    fn arm(
        &mut self,
        statements: &[Statement],
        entry: &Scope,
        defined: &mut BTreeSet<Name>,
        outputs: &[Ident],
    ) -> Result<Vec<Instruction>> {
        let mut scope = Scope {
            versions: entry.versions.clone(),
            defined: std::mem::take(defined),
        };
        let mut arm = vec![];
        self.statements(statements, &mut scope, &mut arm)?;
        arm.push(Instruction::Return(
            outputs
                .iter()
                .map(|output| scope.get(output))
                .collect::<Result<_>>()?,
        ));
        *defined = scope.defined;
        Ok(arm)
    }
}

/// The implicit arguments of every function in `functions`.
///
/// A function needs the implicit arguments of everything it calls, except those a `with`
/// block around the call binds. Computed as a fixpoint so recursion is covered.
fn implicit_arguments(functions: &[Function]) -> BTreeMap<Name, BTreeSet<Implicit>> {
    let calls = functions
        .iter()
        .map(|function| (function.name.as_str(), function.calls()))
        .collect::<Vec<_>>();
    let mut implicits = BTreeMap::<&str, BTreeSet<Implicit>>::new();
    loop {
        let mut changed = false;
        for (name, calls) in &calls {
            let mut needed = BTreeSet::new();
            for (call, bound) in calls {
                let defined = functions
                    .iter()
                    .any(|function| function.name == call.function);
                let callee: Vec<Implicit> = match defined {
                    true => implicits
                        .get(call.function.as_str())
                        .into_iter()
                        .flatten()
                        .copied()
                        .collect(),
                    false => library::lookup(&call.function)
                        .map(|function| function.implicits.to_vec())
                        .unwrap_or_default(),
                };
                needed.extend(
                    callee
                        .into_iter()
                        .filter(|implicit| !bound.iter().any(|name| *name == implicit.name())),
                );
            }
            if implicits.get(name) != Some(&needed) {
                implicits.insert(*name, needed);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    implicits
        .into_iter()
        .map(|(name, implicits)| (name.to_owned(), implicits))
        .collect()
}

fn external(function: &FunctionDefinition, needs_memory: bool) -> Function {
    let call = Call {
        function: function.name.clone(),
        arguments: function.parameters.iter().map(Expression::name).collect(),
    };
    let invoke = if function.returns.is_empty() {
        Instruction::Call(call)
    } else {
        Instruction::Let {
            bindings: function
                .returns
                .iter()
                .map(|variable| Binding::Local(Param::uint256(variable)))
                .collect(),
            call,
        }
    };

    let memory_dict = Implicit::MemoryDict.name();
    let msize = Implicit::Msize.name();
    let dict_access = Type::Pointer("DictAccess".to_owned());
    let (setup, invoke, teardown) = if needs_memory {
        let setup = vec![
            Instruction::Let {
                bindings: vec![Binding::Local(Param::new(MEMORY_DICT_START, dict_access.clone()))],
                call: Call {
                    function: "default_dict_new".to_owned(),
                    arguments: vec![Expression::int(0u8)],
                },
            },
            Instruction::Local {
                name: memory_dict.to_owned(),
                ty: dict_access,
                value: Expression::name(MEMORY_DICT_START),
            },
            Instruction::Local {
                name: msize.to_owned(),
                ty: Type::Felt,
                value: Expression::int(0u8),
            },
        ];
        let invoke = Instruction::With {
            names: vec![memory_dict.to_owned(), msize.to_owned()],
            body: vec![invoke],
        };
        let teardown = vec![Instruction::Let {
            bindings: vec![Binding::Ignored, Binding::Ignored],
            call: Call {
                function: "default_dict_finalize".to_owned(),
                arguments: vec![
                    Expression::name(MEMORY_DICT_START),
                    Expression::name(memory_dict),
                    Expression::int(0u8),
                ],
            },
        }];
        (setup, invoke, teardown)
    } else {
        (vec![], invoke, vec![])
    };

    Function {
        decorators: vec!["external".to_owned()],
        name: format!("{}{}", function.name, middle::EXTERNAL_SUFFIX),
        implicits: vec![],
        parameters: function.parameters.iter().map(Param::uint256).collect(),
        returns: function.returns.iter().map(Param::uint256).collect(),
        body: vec![
            Instruction::AllocLocals,
            ..setup,
            invoke,
            ..teardown,
            Instruction::Return(function.returns.iter().map(Expression::name).collect()),
        ],
    }
}

pub fn generate(normalized: &Normalized, names: &mut NameGenerator) -> Result<Program> {
    let block = &normalized.block;
    if let Some(statement) = block
        .statements
        .iter()
        .find(|statement| !matches!(statement, Statement::FunctionDefinition(_)))
    {
        return Err(Error::Unsupported(format!(
            "top-level {} outside any function: {statement}",
            statement.kind()
        )));
    }
    let definitions = block
        .functions()
        .map(|function| (function.name.as_str(), function))
        .collect::<BTreeMap<_, _>>();

    let mut generator = Generator {
        names,
        signatures: definitions
            .iter()
            .map(|(&name, function)| (name, (function.parameters.len(), function.returns.len())))
            .collect(),
        helpers: HelperCache::default(),
        branches: vec![],
    };
    let mut functions = block
        .functions()
        .map(|function| generator.function(function))
        .collect::<Result<Vec<_>>>()?;
    let Generator {
        helpers, branches, ..
    } = generator;
    functions.extend(branches);
    functions.extend(helpers.into_functions());

    let implicits = implicit_arguments(&functions);
    for entry_point in normalized.entry_points.values() {
        let function = definitions.get(entry_point.as_str()).ok_or_else(|| {
            Error::Invariant(format!("entry point `{entry_point}` has no definition"))
        })?;
        let needs_memory = implicits.get(entry_point).is_some_and(|implicits| {
            implicits.contains(&Implicit::MemoryDict) || implicits.contains(&Implicit::Msize)
        });
        functions.push(external(function, needs_memory));
    }

    let implicits = implicit_arguments(&functions);
    for function in &mut functions {
        function.implicits = implicits
            .get(&function.name)
            .into_iter()
            .flatten()
            .map(|implicit| implicit.param())
            .collect();
    }
    let imports = library::imports(&functions);
    debug!(
        functions = functions.len(),
        imports = imports.len(),
        "generated program"
    );

    Ok(Program {
        directives: vec![
            Directive {
                name: "lang".to_owned(),
                arguments: vec!["starknet".to_owned()],
            },
            Directive {
                name: "builtins".to_owned(),
                arguments: ["pedersen", "range_check", "bitwise"]
                    .map(str::to_owned)
                    .to_vec(),
            },
        ],
        imports,
        functions,
    })
}
