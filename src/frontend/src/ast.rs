use {num_bigint::BigUint, std::fmt};

pub type Ident = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Literal(BigUint),
    Identifier(Ident),
    Call(FunctionCall),
}

impl Expression {
    pub fn literal(value: impl Into<BigUint>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn identifier(name: impl Into<Ident>) -> Self {
        Expression::Identifier(name.into())
    }

    pub fn call(name: impl Into<Ident>, arguments: Vec<Expression>) -> Self {
        Expression::Call(FunctionCall {
            name: name.into(),
            arguments,
        })
    }

    /// Literals and identifiers; the only argument shapes left after expression splitting.
    pub fn is_atom(&self) -> bool {
        matches!(self, Expression::Literal(_) | Expression::Identifier(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: Ident,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDefinition> {
        self.statements.iter().filter_map(|statement| match statement {
            Statement::FunctionDefinition(function) => Some(function),
            _ => None,
        })
    }
}

impl From<Block> for Vec<Statement> {
    fn from(block: Block) -> Self {
        block.statements
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub name: Ident,
    pub parameters: Vec<Ident>,
    pub returns: Vec<Ident>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDeclaration {
    pub variables: Vec<Ident>,
    pub value: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub variables: Vec<Ident>,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct If {
    pub condition: Expression,
    pub body: Block,
    pub else_body: Option<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub value: BigUint,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switch {
    pub expression: Expression,
    pub cases: Vec<Case>,
    pub default: Option<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForLoop {
    pub pre: Block,
    pub condition: Expression,
    pub post: Block,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Block(Block),
    FunctionDefinition(FunctionDefinition),
    VariableDeclaration(VariableDeclaration),
    Assignment(Assignment),
    Expression(Expression),
    If(If),
    Switch(Switch),
    ForLoop(ForLoop),
    Break,
    Continue,
    Leave,
}

impl Statement {
    pub fn declare(variables: Vec<Ident>, value: Option<Expression>) -> Self {
        Statement::VariableDeclaration(VariableDeclaration { variables, value })
    }

    pub fn assign(variables: Vec<Ident>, value: Expression) -> Self {
        Statement::Assignment(Assignment { variables, value })
    }

    pub fn call(name: impl Into<Ident>, arguments: Vec<Expression>) -> Self {
        Statement::Expression(Expression::call(name, arguments))
    }

    /// Assigns the result of `value` to `variables`, or evaluates it for effect when there are none.
    pub fn assign_or_call(variables: Vec<Ident>, value: Expression) -> Self {
        if variables.is_empty() {
            Statement::Expression(value)
        } else {
            Statement::assign(variables, value)
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Block(_) => "block",
            Statement::FunctionDefinition(_) => "function definition",
            Statement::VariableDeclaration(_) => "variable declaration",
            Statement::Assignment(_) => "assignment",
            Statement::Expression(_) => "expression statement",
            Statement::If(_) => "if",
            Statement::Switch(_) => "switch",
            Statement::ForLoop(_) => "for loop",
            Statement::Break => "break",
            Statement::Continue => "continue",
            Statement::Leave => "leave",
        }
    }
}

fn write_list(f: &mut fmt::Formatter, items: &[impl fmt::Display]) -> fmt::Result {
    if let Some((first, rest)) = items.split_first() {
        write!(f, "{first}")?;
        for item in rest {
            write!(f, ", {item}")?;
        }
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Literal(value) if value.bits() > 32 => write!(f, "0x{value:x}"),
            Expression::Literal(value) => write!(f, "{value}"),
            Expression::Identifier(name) => write!(f, "{name}"),
            Expression::Call(call) => write!(f, "{call}"),
        }
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        write_list(f, &self.arguments)?;
        write!(f, ")")
    }
}

struct Indented<'a, T>(usize, &'a T);

impl fmt::Display for Indented<'_, Block> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let &Indented(depth, block) = self;
        if block.statements.is_empty() {
            return write!(f, "{{ }}");
        }
        writeln!(f, "{{")?;
        for statement in &block.statements {
            write!(f, "{:width$}", "", width = (depth + 1) * 4)?;
            writeln!(f, "{}", Indented(depth + 1, statement))?;
        }
        write!(f, "{:width$}}}", "", width = depth * 4)
    }
}

impl fmt::Display for Indented<'_, Statement> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let &Indented(depth, statement) = self;
        match statement {
            Statement::Block(block) => write!(f, "{}", Indented(depth, block)),
            Statement::FunctionDefinition(function) => {
                write!(f, "function {}(", function.name)?;
                write_list(f, &function.parameters)?;
                write!(f, ")")?;
                if !function.returns.is_empty() {
                    write!(f, " -> ")?;
                    write_list(f, &function.returns)?;
                }
                write!(f, " {}", Indented(depth, &function.body))
            }
            Statement::VariableDeclaration(declaration) => {
                write!(f, "let ")?;
                write_list(f, &declaration.variables)?;
                match &declaration.value {
                    Some(value) => write!(f, " := {value}"),
                    None => Ok(()),
                }
            }
            Statement::Assignment(assignment) => {
                write_list(f, &assignment.variables)?;
                write!(f, " := {}", assignment.value)
            }
            Statement::Expression(expression) => write!(f, "{expression}"),
            Statement::If(r#if) => {
                write!(f, "if {} {}", r#if.condition, Indented(depth, &r#if.body))?;
                match &r#if.else_body {
                    Some(else_body) => write!(f, " else {}", Indented(depth, else_body)),
                    None => Ok(()),
                }
            }
            Statement::Switch(switch) => {
                write!(f, "switch {}", switch.expression)?;
                for case in &switch.cases {
                    write!(f, " case {} {}", case.value, Indented(depth, &case.body))?;
                }
                match &switch.default {
                    Some(default) => write!(f, " default {}", Indented(depth, default)),
                    None => Ok(()),
                }
            }
            Statement::ForLoop(for_loop) => write!(
                f,
                "for {} {} {} {}",
                Indented(depth, &for_loop.pre),
                for_loop.condition,
                Indented(depth, &for_loop.post),
                Indented(depth, &for_loop.body)
            ),
            Statement::Break => write!(f, "break"),
            Statement::Continue => write!(f, "continue"),
            Statement::Leave => write!(f, "leave"),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", Indented(0, self))
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", Indented(0, self))
    }
}
