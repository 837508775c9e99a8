use {
    super::cairo::*,
    middle::{
        builtins,
        interp::{self, Execute, State, Trap},
        word::{self, MODULUS},
    },
    num_bigint::BigUint,
    num_traits::{One, Zero},
    std::{
        collections::{BTreeMap, BTreeSet},
        sync::LazyLock,
    },
};

static PRIME: LazyLock<BigUint> =
    LazyLock::new(|| (BigUint::one() << 251u32) + (BigUint::from(17u8) << 192u32) + 1u8);

static LIMB_BOUND: LazyLock<BigUint> = LazyLock::new(|| BigUint::one() << 128u32);

// branches and loops add calls of their own
const MAX_DEPTH: usize = 4 * interp::MAX_DEPTH;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Felt(BigUint),
    Uint256 { low: BigUint, high: BigUint },
}

impl Value {
    fn word(value: &BigUint) -> Self {
        let (low, high) = word::split(value);
        Value::Uint256 { low, high }
    }

    fn felt(value: BigUint) -> Self {
        Value::Felt(value % &*PRIME)
    }

    fn to_felt(&self) -> Result<&BigUint, Trap> {
        match self {
            Value::Felt(value) => Ok(value),
            Value::Uint256 { .. } => {
                Err(Trap::Fault("expected a felt, found a Uint256".to_owned()))
            }
        }
    }

    fn to_word(&self) -> Result<BigUint, Trap> {
        match self {
            Value::Uint256 { low, high } if *low < *LIMB_BOUND && *high < *LIMB_BOUND => {
                Ok(word::join(low, high))
            }
            Value::Uint256 { low, high } => Err(Trap::Fault(format!(
                "Uint256({low}, {high}) has a limb out of range"
            ))),
            Value::Felt(_) => Err(Trap::Fault("expected a Uint256, found a felt".to_owned())),
        }
    }

    fn check(&self, ty: &Type) -> Result<(), Trap> {
        match (ty, self) {
            (Type::Uint256, Value::Uint256 { .. })
            | (Type::Felt | Type::Pointer(_), Value::Felt(_)) => Ok(()),
            _ => Err(Trap::Fault(format!("value {self:?} is not a {ty}"))),
        }
    }
}

fn words(arguments: &[Value]) -> Result<Vec<BigUint>, Trap> {
    arguments.iter().map(Value::to_word).collect()
}

#[derive(Debug, Default)]
struct Frame<'p> {
    values: BTreeMap<&'p str, Value>,
    locals: BTreeSet<&'p str>,
}

impl<'p> Frame<'p> {
    fn local(&mut self, param: &'p Param, value: Value) -> Result<(), Trap> {
        value.check(&param.ty)?;
        if !self.locals.insert(&param.name) {
            return Err(Trap::Fault(format!("`{}` is defined twice", param.name)));
        }
        self.values.insert(&param.name, value);
        Ok(())
    }

    fn reference(&mut self, param: &'p Param, value: Value) -> Result<(), Trap> {
        value.check(&param.ty)?;
        if self.locals.contains(param.name.as_str()) {
            return Err(Trap::Fault(format!("local `{}` is rebound", param.name)));
        }
        self.values.insert(&param.name, value);
        Ok(())
    }

    fn evaluate(&self, expression: &Expression) -> Result<Value, Trap> {
        match expression {
            Expression::Int(value) => Ok(Value::felt(value.clone())),
            Expression::Name(name) => self
                .values
                .get(name.as_str())
                .cloned()
                .ok_or_else(|| Trap::Fault(format!("unknown identifier `{name}`"))),
            Expression::Member(base, field) => match (self.evaluate(base)?, field.as_str()) {
                (Value::Uint256 { low, .. }, "low") => Ok(Value::Felt(low)),
                (Value::Uint256 { high, .. }, "high") => Ok(Value::Felt(high)),
                (value, field) => Err(Trap::Fault(format!("{value:?} has no member `{field}`"))),
            },
            Expression::Struct(name, members) => match (name.as_str(), &members[..]) {
                ("Uint256", [low, high]) => Ok(Value::Uint256 {
                    low: self.evaluate(low)?.to_felt()?.clone(),
                    high: self.evaluate(high)?.to_felt()?.clone(),
                }),
                _ => Err(Trap::Fault(format!("unknown struct `{expression}`"))),
            },
            Expression::Binary(op, left, right) => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                let (left, right) = (left.to_felt()?, right.to_felt()?);
                Ok(Value::felt(match op {
                    BinaryOp::Add => left + right,
                    BinaryOp::Sub => left + &*PRIME - right,
                    BinaryOp::Mul => left * right,
                }))
            }
        }
    }
}

enum Flow {
    Normal,
    Return(Vec<Value>),
}

struct Runner<'p, 's> {
    functions: BTreeMap<&'p str, &'p Function>,
    state: &'s mut State,
    depth: usize,
}

impl<'p> Runner<'p, '_> {
    fn invoke(
        &mut self,
        function: &'p Function,
        arguments: Vec<Value>,
    ) -> Result<Vec<Value>, Trap> {
        if arguments.len() != function.parameters.len() {
            return Err(Trap::Fault(format!(
                "`{}` takes {} arguments, not {}",
                function.name,
                function.parameters.len(),
                arguments.len()
            )));
        }
        if self.depth == MAX_DEPTH {
            return Err(Trap::Fault("call depth limit exceeded".to_owned()));
        }
        self.depth += 1;

        let mut frame = Frame::default();
        for (param, value) in function.parameters.iter().zip(arguments) {
            frame.local(param, value)?;
        }
        let flow = self.run(&function.body, &mut frame)?;
        self.depth -= 1;

        let Flow::Return(values) = flow else {
            return Err(Trap::Fault(format!("`{}` ends without returning", function.name)));
        };
        if values.len() != function.returns.len() {
            return Err(Trap::Fault(format!(
                "`{}` returns {} values, not {}",
                function.name,
                values.len(),
                function.returns.len()
            )));
        }
        for (param, value) in function.returns.iter().zip(&values) {
            value.check(&param.ty)?;
        }
        Ok(values)
    }

    fn run(&mut self, body: &'p [Instruction], frame: &mut Frame<'p>) -> Result<Flow, Trap> {
        for instruction in body {
            match instruction {
                Instruction::AllocLocals => {}
                Instruction::Local { name, ty, value } => {
                    let value = frame.evaluate(value)?;
                    value.check(ty)?;
                    if !frame.locals.insert(name) {
                        return Err(Trap::Fault(format!("`{name}` is defined twice")));
                    }
                    frame.values.insert(name, value);
                }
                Instruction::Let { bindings, call } => {
                    let values = self.call(call, frame)?;
                    if values.len() != bindings.len() {
                        return Err(Trap::Fault(format!(
                            "`{}` returns {} values, {} are bound",
                            call.function,
                            values.len(),
                            bindings.len()
                        )));
                    }
                    for (binding, value) in bindings.iter().zip(values) {
                        match binding {
                            Binding::Ignored => {}
                            Binding::Local(param) => frame.local(param, value)?,
                            Binding::Reference(param) => frame.reference(param, value)?,
                        }
                    }
                }
                Instruction::Call(call) => {
                    self.call(call, frame)?;
                }
                Instruction::Assert(left, right) => {
                    if frame.evaluate(left)? != frame.evaluate(right)? {
                        return Err(Trap::Revert);
                    }
                }
                Instruction::If {
                    condition,
                    body,
                    else_body,
                } => {
                    let equal =
                        frame.evaluate(&condition.left)? == frame.evaluate(&condition.right)?;
                    let taken = match equal == condition.equal {
                        true => Some(body),
                        false => else_body.as_ref(),
                    };
                    if let Some(taken) = taken {
                        if let Flow::Return(values) = self.run(taken, frame)? {
                            return Ok(Flow::Return(values));
                        }
                    }
                }
                Instruction::With { body, .. } => {
                    if let Flow::Return(values) = self.run(body, frame)? {
                        return Ok(Flow::Return(values));
                    }
                }
                Instruction::Return(values) => {
                    let values = values
                        .iter()
                        .map(|value| frame.evaluate(value))
                        .collect::<Result<_, _>>()?;
                    return Ok(Flow::Return(values));
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn call(&mut self, call: &'p Call, frame: &Frame<'p>) -> Result<Vec<Value>, Trap> {
        let arguments = call
            .arguments
            .iter()
            .map(|argument| frame.evaluate(argument))
            .collect::<Result<Vec<_>, _>>()?;
        match self.functions.get(call.function.as_str()) {
            Some(&function) => self.invoke(function, arguments),
            None => self.library(&call.function, &arguments),
        }
    }

    fn library(&mut self, function: &str, arguments: &[Value]) -> Result<Vec<Value>, Trap> {
        let wrapped = |value: BigUint| Value::word(&word::wrap(value));
        let nonzero = |divisor: BigUint| match divisor.is_zero() {
            true => Err(Trap::Revert),
            false => Ok(divisor),
        };
        let shift = |shift: &Value| {
            word::shift_amount(&shift.to_word()?)
                .ok_or_else(|| Trap::Fault(format!("shift by {shift:?} out of range")))
        };

        Ok(match (function, arguments) {
            ("uint256_add", [a, b]) => {
                let sum = a.to_word()? + b.to_word()?;
                let carry = word::from_bool(sum >= *MODULUS);
                vec![wrapped(sum), Value::Felt(carry)]
            }
            ("uint256_mul", [a, b]) => {
                let product = a.to_word()? * b.to_word()?;
                vec![wrapped(product.clone()), wrapped(product >> word::BITS)]
            }
            ("uint256_unsigned_div_rem", [a, b]) => {
                let (a, b) = (a.to_word()?, nonzero(b.to_word()?)?);
                vec![wrapped(&a / &b), wrapped(a % b)]
            }
            ("uint256_signed_div_rem", [a, b]) => {
                let a = word::to_signed(&a.to_word()?);
                let b = word::to_signed(&nonzero(b.to_word()?)?);
                vec![
                    Value::word(&word::from_signed(&a / &b)),
                    Value::word(&word::from_signed(a % b)),
                ]
            }
            ("uint256_mul_div_mod", [a, b, c]) => {
                let product = a.to_word()? * b.to_word()?;
                let c = nonzero(c.to_word()?)?;
                let quotient = &product / &c;
                vec![
                    wrapped(quotient.clone()),
                    wrapped(quotient >> word::BITS),
                    wrapped(product % c),
                ]
            }
            ("uint256_lt", [a, b]) => {
                vec![Value::Felt(word::from_bool(a.to_word()? < b.to_word()?))]
            }
            ("uint256_signed_lt", [a, b]) => vec![Value::Felt(word::from_bool(
                word::to_signed(&a.to_word()?) < word::to_signed(&b.to_word()?),
            ))],
            ("uint256_eq", [a, b]) => {
                vec![Value::Felt(word::from_bool(a.to_word()? == b.to_word()?))]
            }
            ("uint256_shl", [a, b]) => vec![wrapped(a.to_word()? << shift(b)?)],
            ("uint256_shr", [a, b]) => vec![wrapped(a.to_word()? >> shift(b)?)],
            ("default_dict_new", [_]) => vec![Value::Felt(BigUint::zero())],
            ("default_dict_finalize", [start, end, _]) => vec![start.clone(), end.clone()],
            _ => {
                let builtin = builtins::for_library_function(function)
                    .ok_or_else(|| Trap::Fault(format!("unknown function `{function}`")))?;
                let results = self.state.builtin(builtin, &words(arguments)?)?;
                results.iter().map(Value::word).collect()
            }
        })
    }
}

impl Execute for Program {
    fn execute(
        &self,
        entry: &str,
        arguments: &[BigUint],
        state: &mut State,
    ) -> Result<Vec<BigUint>, Trap> {
        let function = self
            .function(entry)
            .ok_or_else(|| Trap::Fault(format!("unknown function `{entry}`")))?;
        let arguments = function
            .parameters
            .iter()
            .zip(arguments)
            .map(|(param, value)| match param.ty {
                Type::Uint256 => Ok(Value::word(value)),
                Type::Felt => Ok(Value::felt(value.clone())),
                Type::Pointer(_) => Err(Trap::Fault(format!(
                    "cannot pass a pointer to `{}`",
                    param.name
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if arguments.len() != function.parameters.len() {
            return Err(Trap::Fault(format!(
                "`{entry}` takes {} arguments",
                function.parameters.len()
            )));
        }
        interp::run_entry(|| {
            let mut runner = Runner {
                functions: self
                    .functions
                    .iter()
                    .map(|function| (function.name.as_str(), function))
                    .collect(),
                state,
                depth: 0,
            };
            words(&runner.invoke(function, arguments)?)
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{codegen, functions::HelperCache},
        frontend::ast::Block,
        middle::{builtins::Lowering, names::NameGenerator},
    };

    fn samples() -> Vec<BigUint> {
        let max = &*MODULUS - 1u8;
        vec![
            BigUint::zero(),
            BigUint::one(),
            BigUint::from(2u8),
            BigUint::from(7u8),
            BigUint::from(31u8),
            BigUint::from(255u16),
            BigUint::from(256u16),
            BigUint::one() << 128u32,
            (BigUint::one() << 128u32) - 1u8,
            BigUint::one() << 255u32,
            &max - 6u8,
            max,
        ]
    }

    fn compiled(src: &str) -> Program {
        let mut names = NameGenerator::new();
        let normalized = middle::normalize(Block::try_from(src).unwrap(), &[], &mut names).unwrap();
        codegen::generate(&normalized, &mut names).unwrap()
    }

    #[test]
    fn helpers_agree_with_word_semantics() {
        let names = [
            "add", "mul", "div", "sdiv", "mod", "smod", "exp", "signextend", "lt", "gt", "slt",
            "sgt", "eq", "shl", "shr", "sar", "byte",
        ];
        for name in names {
            let Lowering::Helper(helper) = builtins::lookup(name).unwrap().lowering else {
                panic!("`{name}` has no helper");
            };
            let mut cache = HelperCache::default();
            let function = cache.request(helper).unwrap();
            let program = Program {
                directives: vec![],
                imports: vec![],
                functions: cache.into_functions().collect(),
            };
            for a in samples() {
                for b in samples() {
                    let arguments = [a.clone(), b.clone()];
                    let result = program.execute(&function, &arguments, &mut State::default());
                    let expected = builtins::evaluate(name, &arguments).unwrap();
                    assert_eq!(result, Ok(vec![expected]), "{name}({a}, {b})");
                }
            }
        }
    }

    #[test]
    fn ternary_helpers_agree_with_word_semantics() {
        let samples = samples();
        for name in ["addmod", "mulmod"] {
            let Lowering::Helper(helper) = builtins::lookup(name).unwrap().lowering else {
                panic!("`{name}` has no helper");
            };
            let mut cache = HelperCache::default();
            let function = cache.request(helper).unwrap();
            let program = Program {
                directives: vec![],
                imports: vec![],
                functions: cache.into_functions().collect(),
            };
            for a in samples.iter().step_by(2) {
                for b in &samples[1..] {
                    for c in samples.iter().step_by(3) {
                        let arguments = [a.clone(), b.clone(), c.clone()];
                        let result = program.execute(&function, &arguments, &mut State::default());
                        let expected = builtins::evaluate(name, &arguments).unwrap();
                        assert_eq!(result, Ok(vec![expected]), "{name}({a}, {b}, {c})");
                    }
                }
            }
        }
    }

    #[test]
    fn wrappers_provide_memory() {
        let program = compiled("{ function f(a) -> r { mstore(0, a) r := mload(0) } }");
        let mut state = State::default();
        let value = BigUint::from(42u8);
        assert_eq!(
            program.execute("f_external", &[value.clone()], &mut state),
            Ok(vec![value.clone()])
        );
        assert_eq!(state.mload(&BigUint::zero()), Ok(value));
    }

    #[test]
    fn storage_persists_across_calls() {
        let program = compiled(
            "{ function put(k, v) { sstore(k, v) } function fetch(k) -> v { v := sload(k) } }",
        );
        let mut state = State::default();
        let key = BigUint::from(3u8);
        let value = BigUint::from(99u8);
        assert_eq!(
            program.execute("put_external", &[key.clone(), value.clone()], &mut state),
            Ok(vec![])
        );
        assert_eq!(
            program.execute("fetch_external", &[key], &mut state),
            Ok(vec![value])
        );
    }

    #[test]
    fn reverts_propagate() {
        let program = compiled("{ function f(a) -> r { if a { revert(0, 0) } r := 7 } }");
        assert_eq!(
            program.execute("f_external", &[BigUint::one()], &mut State::default()),
            Err(Trap::Revert)
        );
        assert_eq!(
            program.execute("f_external", &[BigUint::zero()], &mut State::default()),
            Ok(vec![BigUint::from(7u8)])
        );
    }

    #[test]
    fn halting_returns_memory() {
        let program = compiled(
            "{ function inner(a) { mstore(0, a) return(31, 1) } \
             function f(a) -> r { r := 1 if a { inner(a) } r := 2 } }",
        );
        let mut state = State::default();
        assert_eq!(
            program.execute("f_external", &[BigUint::from(9u8)], &mut state),
            Ok(vec![])
        );
        assert_eq!(state.return_data, [9]);
        assert_eq!(
            program.execute("f_external", &[BigUint::zero()], &mut state),
            Ok(vec![BigUint::from(2u8)])
        );
        let text = program.to_string();
        assert!(text.contains("from evm.yul_api import warp_return"), "{text}");
    }

    #[test]
    fn malformed_programs_fault() {
        let run = |src: &str| {
            let program = Program::try_from(src).unwrap();
            program.execute("f", &[], &mut State::default())
        };
        let fault = |result: Result<Vec<BigUint>, Trap>| matches!(result, Err(Trap::Fault(_)));
        assert!(fault(run(
            "func f() -> (r : Uint256):\n    local x = 1\n    local x = 2\n    return (Uint256(x, 0))\nend"
        )));
        assert!(fault(run("func f():\n    alloc_locals\nend")));
        assert!(fault(run(
            "func f() -> (r : Uint256):\n    return (Uint256(340282366920938463463374607431768211456, 0))\nend"
        )));
        assert!(fault(run("func f() -> (r : Uint256):\n    return (Uint256(y, 0))\nend")));
        assert_eq!(
            run("func f() -> (r : Uint256):\n    local x = 3 * 2 - 1\n    return (Uint256(x, 0))\nend"),
            Ok(vec![BigUint::from(5u8)])
        );
    }
}
