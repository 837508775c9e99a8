use {
    middle::word,
    num_bigint::BigUint,
    std::fmt::{self, Write},
};

pub type Name = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Felt,
    Uint256,
    Pointer(Name),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Name,
    pub ty: Type,
}

impl Param {
    pub fn new(name: impl Into<Name>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn uint256(name: impl Into<Name>) -> Self {
        Self::new(name, Type::Uint256)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Int(BigUint),
    Name(Name),
    Member(Box<Expression>, Name),
    Struct(Name, Vec<Expression>),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
}

impl Expression {
    pub fn int(value: impl Into<BigUint>) -> Self {
        Expression::Int(value.into())
    }

    pub fn name(name: impl Into<Name>) -> Self {
        Expression::Name(name.into())
    }

    pub fn uint256(value: &BigUint) -> Self {
        let (low, high) = word::split(value);
        Expression::Struct(
            "Uint256".to_owned(),
            vec![Expression::Int(low), Expression::Int(high)],
        )
    }

    pub fn member(self, field: impl Into<Name>) -> Self {
        Expression::Member(Box::new(self), field.into())
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Expression::Binary(op, Box::new(left), Box::new(right))
    }

    // zero exactly when the word is
    pub fn limb_sum(value: Expression) -> Self {
        Expression::binary(
            BinaryOp::Add,
            value.clone().member("low"),
            value.member("high"),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub function: Name,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Ignored,
    Reference(Param),
    Local(Param),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub left: Expression,
    pub equal: bool,
    pub right: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    AllocLocals,
    Local {
        name: Name,
        ty: Type,
        value: Expression,
    },
    Let {
        bindings: Vec<Binding>,
        call: Call,
    },
    Call(Call),
    Assert(Expression, Expression),
    If {
        condition: Condition,
        body: Vec<Instruction>,
        else_body: Option<Vec<Instruction>>,
    },
    With {
        names: Vec<Name>,
        body: Vec<Instruction>,
    },
    Return(Vec<Expression>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub decorators: Vec<Name>,
    pub name: Name,
    pub implicits: Vec<Param>,
    pub parameters: Vec<Param>,
    pub returns: Vec<Param>,
    pub body: Vec<Instruction>,
}

impl Function {
    pub fn calls(&self) -> Vec<(&Call, Vec<&Name>)> {
        fn walk<'a>(
            instructions: &'a [Instruction],
            bound: &[&'a Name],
            calls: &mut Vec<(&'a Call, Vec<&'a Name>)>,
        ) {
            for instruction in instructions {
                match instruction {
                    Instruction::Let { call, .. } | Instruction::Call(call) => {
                        calls.push((call, bound.to_vec()))
                    }
                    Instruction::If {
                        body, else_body, ..
                    } => {
                        walk(body, bound, calls);
                        if let Some(else_body) = else_body {
                            walk(else_body, bound, calls);
                        }
                    }
                    Instruction::With { names, body } => {
                        let bound = bound.iter().copied().chain(names).collect::<Vec<_>>();
                        walk(body, &bound, calls);
                    }
                    Instruction::AllocLocals
                    | Instruction::Local { .. }
                    | Instruction::Assert(..)
                    | Instruction::Return(_) => {}
                }
            }
        }
        let mut calls = vec![];
        walk(&self.body, &[], &mut calls);
        calls
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: Name,
    pub arguments: Vec<Name>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: Name,
    pub names: Vec<Name>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub directives: Vec<Directive>,
    pub imports: Vec<Import>,
    pub functions: Vec<Function>,
}

impl Program {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name == name)
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

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Felt => write!(f, "felt"),
            Type::Uint256 => write!(f, "Uint256"),
            Type::Pointer(name) => write!(f, "{name}*"),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.ty {
            Type::Felt => write!(f, "{}", self.name),
            ref ty => write!(f, "{} : {ty}", self.name),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_char(match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
        })
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Int(value) => write!(f, "{value}"),
            Expression::Name(name) => write!(f, "{name}"),
            Expression::Member(base, field) => match **base {
                Expression::Binary(..) => write!(f, "({base}).{field}"),
                _ => write!(f, "{base}.{field}"),
            },
            Expression::Struct(name, fields) => {
                write!(f, "{name}(")?;
                write_list(f, fields)?;
                write!(f, ")")
            }
            Expression::Binary(op, left, right) => {
                let precedence = op.precedence();
                match **left {
                    Expression::Binary(inner, ..) if inner.precedence() < precedence => {
                        write!(f, "({left})")?
                    }
                    _ => write!(f, "{left}")?,
                }
                write!(f, " {op} ")?;
                match **right {
                    Expression::Binary(inner, ..) if inner.precedence() <= precedence => {
                        write!(f, "({right})")
                    }
                    _ => write!(f, "{right}"),
                }
            }
        }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(", self.function)?;
        write_list(f, &self.arguments)?;
        write!(f, ")")
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Binding::Ignored => write!(f, "_"),
            Binding::Reference(param) => write!(f, "{param}"),
            Binding::Local(param) => write!(f, "local {param}"),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let op = if self.equal { "==" } else { "!=" };
        write!(f, "{} {op} {}", self.left, self.right)
    }
}

const INDENT: &str = "    ";

fn write_body(f: &mut fmt::Formatter, depth: usize, body: &[Instruction]) -> fmt::Result {
    for instruction in body {
        write_instruction(f, depth, instruction)?;
    }
    Ok(())
}

fn write_instruction(f: &mut fmt::Formatter, depth: usize, instruction: &Instruction) -> fmt::Result {
    let indent = INDENT.repeat(depth);
    match instruction {
        Instruction::AllocLocals => writeln!(f, "{indent}alloc_locals"),
        Instruction::Local { name, ty, value } => {
            let param = Param::new(name.as_str(), ty.clone());
            writeln!(f, "{indent}local {param} = {value}")
        }
        Instruction::Let { bindings, call } => {
            write!(f, "{indent}let (")?;
            write_list(f, bindings)?;
            writeln!(f, ") = {call}")
        }
        Instruction::Call(call) => writeln!(f, "{indent}{call}"),
        Instruction::Assert(left, right) => writeln!(f, "{indent}assert {left} = {right}"),
        Instruction::If {
            condition,
            body,
            else_body,
        } => {
            writeln!(f, "{indent}if {condition}:")?;
            write_body(f, depth + 1, body)?;
            if let Some(else_body) = else_body {
                writeln!(f, "{indent}else:")?;
                write_body(f, depth + 1, else_body)?;
            }
            writeln!(f, "{indent}end")
        }
        Instruction::With { names, body } => {
            write!(f, "{indent}with ")?;
            write_list(f, names)?;
            writeln!(f, ":")?;
            write_body(f, depth + 1, body)?;
            writeln!(f, "{indent}end")
        }
        Instruction::Return(values) => {
            write!(f, "{indent}return (")?;
            write_list(f, values)?;
            writeln!(f, ")")
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for decorator in &self.decorators {
            writeln!(f, "@{decorator}")?;
        }
        write!(f, "func {}", self.name)?;
        if !self.implicits.is_empty() {
            write!(f, "{{")?;
            write_list(f, &self.implicits)?;
            write!(f, "}}")?;
        }
        write!(f, "(")?;
        write_list(f, &self.parameters)?;
        write!(f, ")")?;
        if !self.returns.is_empty() {
            write!(f, " -> (")?;
            write_list(f, &self.returns)?;
            write!(f, ")")?;
        }
        writeln!(f, ":")?;
        write_body(f, 1, &self.body)?;
        writeln!(f, "end")
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "%{}", self.name)?;
        for argument in &self.arguments {
            write!(f, " {argument}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "from {} import ", self.module)?;
        write_list(f, &self.names)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for directive in &self.directives {
            writeln!(f, "{directive}")?;
        }
        if !self.imports.is_empty() {
            writeln!(f)?;
            for import in &self.imports {
                writeln!(f, "{import}")?;
            }
        }
        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn functions_print_as_cairo() {
        let function = Function {
            decorators: vec!["external".to_owned()],
            name: "f".to_owned(),
            implicits: vec![
                Param::new("range_check_ptr", Type::Felt),
                Param::new("memory_dict", Type::Pointer("DictAccess".to_owned())),
            ],
            parameters: vec![Param::uint256("a")],
            returns: vec![Param::uint256("r")],
            body: vec![
                Instruction::AllocLocals,
                Instruction::Let {
                    bindings: vec![Binding::Local(Param::uint256("r")), Binding::Ignored],
                    call: Call {
                        function: "uint256_add".to_owned(),
                        arguments: vec![
                            Expression::name("a"),
                            Expression::uint256(&(BigUint::from(3u8) << 128u32)),
                        ],
                    },
                },
                Instruction::If {
                    condition: Condition {
                        left: Expression::limb_sum(Expression::name("r")),
                        equal: false,
                        right: Expression::int(0u8),
                    },
                    body: vec![Instruction::Return(vec![Expression::name("r")])],
                    else_body: None,
                },
                Instruction::Return(vec![Expression::name("a")]),
            ],
        };
        assert_eq!(
            function.to_string(),
            "@external\n\
             func f{range_check_ptr, memory_dict : DictAccess*}(a : Uint256) -> (r : Uint256):\n    \
             alloc_locals\n    \
             let (local r : Uint256, _) = uint256_add(a, Uint256(0, 3))\n    \
             if r.low + r.high != 0:\n        \
             return (r)\n    \
             end\n    \
             return (a)\n\
             end\n"
        );
    }

    #[test]
    fn parentheses_follow_precedence() {
        use {BinaryOp::*, Expression as E};

        let a = || E::name("a");
        let b = || E::name("b");
        let c = || E::name("c");
        let cases = [
            (E::binary(Sub, a(), E::binary(Sub, b(), c())), "a - (b - c)"),
            (E::binary(Sub, E::binary(Sub, a(), b()), c()), "a - b - c"),
            (E::binary(Mul, E::binary(Add, a(), b()), c()), "(a + b) * c"),
            (E::binary(Add, a(), E::binary(Mul, b(), c())), "a + b * c"),
            (E::binary(Add, a(), b()).member("low"), "(a + b).low"),
        ];
        for (expression, expected) in cases {
            assert_eq!(expression.to_string(), expected);
        }
    }

    #[test]
    fn calls_see_enclosing_with_blocks() {
        let call = |function: &str| Call {
            function: function.to_owned(),
            arguments: vec![],
        };
        let function = Function {
            decorators: vec![],
            name: "f".to_owned(),
            implicits: vec![],
            parameters: vec![],
            returns: vec![],
            body: vec![
                Instruction::Call(call("g")),
                Instruction::With {
                    names: vec!["msize".to_owned()],
                    body: vec![Instruction::If {
                        condition: Condition {
                            left: Expression::int(1u8),
                            equal: true,
                            right: Expression::int(1u8),
                        },
                        body: vec![Instruction::Call(call("h"))],
                        else_body: Some(vec![Instruction::Call(call("i"))]),
                    }],
                },
            ],
        };
        let calls = function
            .calls()
            .into_iter()
            .map(|(call, bound)| (call.function.as_str(), bound.len()))
            .collect::<Vec<_>>();
        assert_eq!(calls, [("g", 0), ("h", 1), ("i", 1)]);
    }
}
