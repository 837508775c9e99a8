//! Reference interpreter for Yul, and the machine state it shares with the compiled program.

use {
    crate::builtins,
    derive_more::{Display, Error},
    frontend::ast::*,
    num_bigint::BigUint,
    num_traits::{ToPrimitive, Zero},
    std::collections::BTreeMap,
};

const MEMORY_LIMIT: usize = 1 << 20;

/// Nested calls allowed before execution is abandoned. Loops run as recursion once
/// lowered, so this bounds their iterations too.
pub const MAX_DEPTH: usize = 1024;

// every call recurses on the host stack
const STACK_SIZE: usize = 256 << 20;

/// Runs an entry call on a stack deep enough for the depth limits to apply. A halt ends the
/// call without results.
pub fn run_entry(
    run: impl FnOnce() -> Result<Vec<BigUint>, Trap> + Send,
) -> Result<Vec<BigUint>, Trap> {
    let result = std::thread::scope(|scope| {
        std::thread::Builder::new()
            .name("interpreter".to_owned())
            .stack_size(STACK_SIZE)
            .spawn_scoped(scope, run)
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .map_err(|error| Trap::Fault(format!("cannot start interpreter: {error}")))
    })?;
    match result {
        Err(Trap::Halt) => Ok(vec![]),
        result => result,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum Trap {
    #[display("execution reverted")]
    Revert,
    /// `return` or `stop`, unwinding to the entry point.
    #[display("execution halted")]
    Halt,
    #[display("unsupported operation: {_0}")]
    Unsupported(#[error(not(source))] String),
    #[display("fault: {_0}")]
    Fault(#[error(not(source))] String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub calldata: Vec<u8>,
    pub code: Vec<u8>,
    pub caller: BigUint,
    pub address: BigUint,
    pub callvalue: BigUint,
    pub timestamp: BigUint,
    pub number: BigUint,
    pub chainid: BigUint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    pub topics: Vec<BigUint>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    pub memory: Vec<u8>,
    pub storage: BTreeMap<BigUint, BigUint>,
    pub logs: Vec<Log>,
    pub return_data: Vec<u8>,
    pub environment: Environment,
}

fn to_bytes(value: &BigUint) -> [u8; 32] {
    let bytes = value.to_bytes_be();
    let mut word = [0; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    word
}

fn padded(source: &[u8], start: &BigUint, size: usize) -> Vec<u8> {
    let start = start.to_usize().unwrap_or(usize::MAX);
    (0..size)
        .map(|index| {
            start
                .checked_add(index)
                .and_then(|index| source.get(index))
                .copied()
                .unwrap_or_default()
        })
        .collect()
}

fn offset(value: &BigUint) -> Result<usize, Trap> {
    value
        .to_usize()
        .filter(|&offset| offset < MEMORY_LIMIT)
        .ok_or_else(|| Trap::Fault(format!("memory offset {value} out of range")))
}

impl State {
    fn touch(&mut self, start: usize, size: usize) -> Result<&mut [u8], Trap> {
        let end = start + size;
        if end > MEMORY_LIMIT {
            return Err(Trap::Fault(format!("memory access up to {end} out of range")));
        }
        if self.memory.len() < end {
            self.memory.resize(end.next_multiple_of(32), 0);
        }
        Ok(&mut self.memory[start..end])
    }

    fn range(&mut self, start: &BigUint, size: &BigUint) -> Result<Vec<u8>, Trap> {
        let size = offset(size)?;
        if size == 0 {
            return Ok(vec![]);
        }
        Ok(self.touch(offset(start)?, size)?.to_vec())
    }

    pub fn mload(&mut self, address: &BigUint) -> Result<BigUint, Trap> {
        Ok(BigUint::from_bytes_be(self.touch(offset(address)?, 32)?))
    }

    pub fn mstore(&mut self, address: &BigUint, value: &BigUint) -> Result<(), Trap> {
        self.touch(offset(address)?, 32)?.copy_from_slice(&to_bytes(value));
        Ok(())
    }

    pub fn mstore8(&mut self, address: &BigUint, value: &BigUint) -> Result<(), Trap> {
        self.touch(offset(address)?, 1)?[0] = to_bytes(value)[31];
        Ok(())
    }

    pub fn sload(&self, key: &BigUint) -> BigUint {
        self.storage.get(key).cloned().unwrap_or_default()
    }

    pub fn sstore(&mut self, key: &BigUint, value: &BigUint) {
        if value.is_zero() {
            self.storage.remove(key);
        } else {
            self.storage.insert(key.clone(), value.clone());
        }
    }

    fn calldataload(&self, start: &BigUint) -> BigUint {
        let mut word = [0; 32];
        if let Some(start) = start.to_usize() {
            let calldata = &self.environment.calldata;
            for (index, byte) in word.iter_mut().enumerate() {
                *byte = calldata.get(start + index).copied().unwrap_or_default();
            }
        }
        BigUint::from_bytes_be(&word)
    }

    fn copy(&mut self, target: &BigUint, bytes: &[u8]) -> Result<(), Trap> {
        if !bytes.is_empty() {
            self.touch(offset(target)?, bytes.len())?.copy_from_slice(bytes);
        }
        Ok(())
    }

    pub fn builtin(&mut self, name: &str, arguments: &[BigUint]) -> Result<Vec<BigUint>, Trap> {
        if let Some(value) = builtins::evaluate(name, arguments) {
            return Ok(vec![value]);
        }
        let value = match (name, arguments) {
            ("pop", [_]) => return Ok(vec![]),
            ("mload", [address]) => self.mload(address)?,
            ("mstore", [address, value]) => {
                self.mstore(address, value)?;
                return Ok(vec![]);
            }
            ("mstore8", [address, value]) => {
                self.mstore8(address, value)?;
                return Ok(vec![]);
            }
            ("sload", [key]) => self.sload(key),
            ("sstore", [key, value]) => {
                self.sstore(key, value);
                return Ok(vec![]);
            }
            ("calldataload", [start]) => self.calldataload(start),
            ("calldatasize", []) => BigUint::from(self.environment.calldata.len()),
            ("calldatacopy", [target, start, size]) => {
                let bytes = padded(&self.environment.calldata, start, offset(size)?);
                self.copy(target, &bytes)?;
                return Ok(vec![]);
            }
            ("codecopy", [target, start, size]) => {
                let bytes = padded(&self.environment.code, start, offset(size)?);
                self.copy(target, &bytes)?;
                return Ok(vec![]);
            }
            ("extcodesize", [account]) if *account == self.environment.address => {
                BigUint::from(self.environment.code.len())
            }
            ("extcodesize", [_]) => BigUint::zero(),
            ("msize", []) => BigUint::from(self.memory.len()),
            ("caller", []) => self.environment.caller.clone(),
            ("address", []) => self.environment.address.clone(),
            ("callvalue", []) => self.environment.callvalue.clone(),
            ("timestamp", []) => self.environment.timestamp.clone(),
            ("number", []) => self.environment.number.clone(),
            ("chainid", []) => self.environment.chainid.clone(),
            ("gas", []) => BigUint::from(u64::MAX),
            ("returndatasize", []) => BigUint::zero(),
            ("returndatacopy", [_, _, size]) if size.is_zero() => return Ok(vec![]),
            (
                "log0" | "log1" | "log2" | "log3" | "log4",
                [start, size, topics @ ..],
            ) => {
                let data = self.range(start, size)?;
                self.logs.push(Log {
                    topics: topics.to_vec(),
                    data,
                });
                return Ok(vec![]);
            }
            ("return", [start, size]) => {
                self.return_data = self.range(start, size)?;
                return Err(Trap::Halt);
            }
            ("stop", []) => {
                self.return_data.clear();
                return Err(Trap::Halt);
            }
            ("revert", [_, _]) | ("invalid", []) | (builtins::REVERT, []) => {
                return Err(Trap::Revert)
            }
            _ if builtins::is_builtin(name) => return Err(Trap::Unsupported(name.to_owned())),
            _ => return Err(Trap::Fault(format!("unknown function `{name}`"))),
        };
        Ok(vec![value])
    }
}

pub trait Execute {
    fn execute(
        &self,
        entry: &str,
        arguments: &[BigUint],
        state: &mut State,
    ) -> Result<Vec<BigUint>, Trap>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
    Leave,
}

struct Interpreter<'a, 's> {
    state: &'s mut State,
    functions: Vec<BTreeMap<&'a str, &'a FunctionDefinition>>,
    variables: Vec<BTreeMap<&'a str, BigUint>>,
    depth: usize,
}

impl<'a> Interpreter<'a, '_> {
    fn enter(&mut self, block: &'a Block) {
        self.functions.push(
            block
                .functions()
                .map(|function| (function.name.as_str(), function))
                .collect(),
        );
        self.variables.push(BTreeMap::new());
    }

    fn exit(&mut self) {
        self.functions.pop();
        self.variables.pop();
    }

    fn block(&mut self, block: &'a Block) -> Result<Flow, Trap> {
        self.enter(block);
        let flow = self.statements(&block.statements);
        self.exit();
        flow
    }

    fn statements(&mut self, statements: &'a [Statement]) -> Result<Flow, Trap> {
        for statement in statements {
            let flow = self.statement(statement)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn statement(&mut self, statement: &'a Statement) -> Result<Flow, Trap> {
        match statement {
            Statement::Block(block) => return self.block(block),
            Statement::FunctionDefinition(_) => {}
            Statement::VariableDeclaration(declaration) => {
                let values = match &declaration.value {
                    Some(value) => self.evaluate(value)?,
                    None => vec![BigUint::zero(); declaration.variables.len()],
                };
                if values.len() != declaration.variables.len() {
                    return Err(Trap::Fault(format!("arity mismatch in `{statement}`")));
                }
                let scope = self.variables.last_mut().ok_or_else(no_scope)?;
                for (variable, value) in declaration.variables.iter().zip(values) {
                    scope.insert(variable.as_str(), value);
                }
            }
            Statement::Assignment(assignment) => {
                let values = self.evaluate(&assignment.value)?;
                if values.len() != assignment.variables.len() {
                    return Err(Trap::Fault(format!("arity mismatch in `{statement}`")));
                }
                for (variable, value) in assignment.variables.iter().zip(values) {
                    *self.variable(variable)? = value;
                }
            }
            Statement::Expression(expression) => {
                self.evaluate(expression)?;
            }
            Statement::If(r#if) => {
                if !self.value(&r#if.condition)?.is_zero() {
                    return self.block(&r#if.body);
                } else if let Some(else_body) = &r#if.else_body {
                    return self.block(else_body);
                }
            }
            Statement::Switch(switch) => {
                let value = self.value(&switch.expression)?;
                let body = switch
                    .cases
                    .iter()
                    .find(|case| case.value == value)
                    .map(|case| &case.body)
                    .or(switch.default.as_ref());
                if let Some(body) = body {
                    return self.block(body);
                }
            }
            Statement::ForLoop(for_loop) => {
                self.enter(&for_loop.pre);
                let flow = self.for_loop(for_loop);
                self.exit();
                return flow;
            }
            Statement::Break => return Ok(Flow::Break),
            Statement::Continue => return Ok(Flow::Continue),
            Statement::Leave => return Ok(Flow::Leave),
        }
        Ok(Flow::Normal)
    }

    fn for_loop(&mut self, for_loop: &'a ForLoop) -> Result<Flow, Trap> {
        if self.statements(&for_loop.pre.statements)? != Flow::Normal {
            return Err(Trap::Fault("control transfer in loop initializer".to_owned()));
        }
        while !self.value(&for_loop.condition)?.is_zero() {
            match self.block(&for_loop.body)? {
                Flow::Break => break,
                Flow::Leave => return Ok(Flow::Leave),
                Flow::Normal | Flow::Continue => {}
            }
            if self.block(&for_loop.post)? != Flow::Normal {
                return Err(Trap::Fault("control transfer in loop post block".to_owned()));
            }
        }
        Ok(Flow::Normal)
    }

    fn variable(&mut self, name: &str) -> Result<&mut BigUint, Trap> {
        self.variables
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
            .ok_or_else(|| Trap::Fault(format!("undeclared variable `{name}`")))
    }

    fn value(&mut self, expression: &'a Expression) -> Result<BigUint, Trap> {
        let values = self.evaluate(expression)?;
        <[BigUint; 1]>::try_from(values)
            .map(|[value]| value)
            .map_err(|_| Trap::Fault(format!("`{expression}` is not a single value")))
    }

    fn evaluate(&mut self, expression: &'a Expression) -> Result<Vec<BigUint>, Trap> {
        match expression {
            Expression::Literal(value) => Ok(vec![value.clone()]),
            Expression::Identifier(name) => Ok(vec![self.variable(name)?.clone()]),
            Expression::Call(call) => {
                let arguments = call
                    .arguments
                    .iter()
                    .map(|argument| self.value(argument))
                    .collect::<Result<Vec<_>, _>>()?;
                let function = self.functions.iter().enumerate().rev().find_map(|(frame, scope)| {
                    scope.get(call.name.as_str()).map(|function| (frame, *function))
                });
                match function {
                    Some((frame, function)) => self.call(frame, function, arguments),
                    None => self.state.builtin(&call.name, &arguments),
                }
            }
        }
    }

    fn call(
        &mut self,
        frame: usize,
        function: &'a FunctionDefinition,
        arguments: Vec<BigUint>,
    ) -> Result<Vec<BigUint>, Trap> {
        if arguments.len() != function.parameters.len() {
            return Err(Trap::Fault(format!(
                "`{}` takes {} arguments, got {}",
                function.name,
                function.parameters.len(),
                arguments.len()
            )));
        }
        if self.depth >= MAX_DEPTH {
            return Err(Trap::Fault(format!("call depth exceeded in `{}`", function.name)));
        }
        let hidden = self.functions.split_off(frame + 1);
        let mut scope = function
            .parameters
            .iter()
            .map(String::as_str)
            .zip(arguments)
            .collect::<BTreeMap<_, _>>();
        for variable in &function.returns {
            scope.insert(variable.as_str(), BigUint::zero());
        }
        let caller = std::mem::replace(&mut self.variables, vec![scope]);

        self.depth += 1;
        let flow = self.block(&function.body);
        self.depth -= 1;
        let scope = std::mem::replace(&mut self.variables, caller).pop();
        self.functions.extend(hidden);

        match flow? {
            Flow::Normal | Flow::Leave => {}
            Flow::Break | Flow::Continue => {
                return Err(Trap::Fault(format!("loop transfer escapes `{}`", function.name)))
            }
        }
        let mut scope = scope.ok_or_else(no_scope)?;
        function
            .returns
            .iter()
            .map(|variable| scope.remove(variable.as_str()).ok_or_else(no_scope))
            .collect()
    }
}

fn no_scope() -> Trap {
    Trap::Fault("variable scope lost".to_owned())
}

impl Execute for Block {
    fn execute(
        &self,
        entry: &str,
        arguments: &[BigUint],
        state: &mut State,
    ) -> Result<Vec<BigUint>, Trap> {
        let function = self
            .functions()
            .find(|function| function.name == entry)
            .ok_or_else(|| Trap::Fault(format!("no function `{entry}`")))?;
        run_entry(|| {
            let mut interpreter = Interpreter {
                state,
                functions: vec![],
                variables: vec![],
                depth: 0,
            };
            interpreter.enter(self);
            interpreter.call(0, function, arguments.to_vec())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str, entry: &str, arguments: &[u64]) -> Result<Vec<BigUint>, Trap> {
        let arguments = arguments.iter().copied().map(BigUint::from).collect::<Vec<_>>();
        Block::try_from(src)
            .unwrap()
            .execute(entry, &arguments, &mut State::default())
    }

    fn words(values: &[u64]) -> Vec<BigUint> {
        values.iter().copied().map(BigUint::from).collect()
    }

    #[test]
    fn recursion() {
        let src = "{ function fact(n) -> r { r := 1 if gt(n, 1) { r := mul(n, fact(sub(n, 1))) } } }";
        assert_eq!(run(src, "fact", &[5]), Ok(words(&[120])));
    }

    #[test]
    fn nested_functions_are_lexically_scoped() {
        let src = "{ function f(a) -> r { function g(x) -> y { y := add(x, 1) } \
                   { function g(x) -> y { y := mul(x, 10) } r := g(a) } r := add(r, g(a)) } }";
        assert_eq!(run(src, "f", &[2]), Ok(words(&[23])));
    }

    #[test]
    fn loops_and_transfers() {
        let src = "{ function f(n) -> total { for { let i := 0 } 1 { i := add(i, 1) } { \
                   if eq(i, n) { break } if mod(i, 2) { continue } total := add(total, i) } } \
                   function g() -> r { for { } 1 { } { r := 7 leave } r := 8 } }";
        assert_eq!(run(src, "f", &[7]), Ok(words(&[12])));
        assert_eq!(run(src, "g", &[]), Ok(words(&[7])));
    }

    #[test]
    fn switch_selects_a_case() {
        let src = "{ function f(x) -> r { switch x case 1 { r := 10 } case 2 { r := 20 } default { r := 30 } } }";
        assert_eq!(run(src, "f", &[2]), Ok(words(&[20])));
        assert_eq!(run(src, "f", &[9]), Ok(words(&[30])));
    }

    #[test]
    fn memory_and_storage() {
        let src = "{ function f() -> a, b { mstore(0, 0x1122) mstore8(31, 0x33) \
                   a := mload(0) sstore(5, a) b := sload(5) } }";
        let mut state = State::default();
        let result = Block::try_from(src)
            .unwrap()
            .execute("f", &[], &mut state)
            .unwrap();
        assert_eq!(result, words(&[0x1133, 0x1133]));
        assert_eq!(state.memory.len(), 32);
        assert_eq!(state.sload(&BigUint::from(5u8)), BigUint::from(0x1133u32));
    }

    #[test]
    fn traps() {
        let src = "{ function f() { revert(0, 0) } function g() -> r { r := keccak256(0, 32) } \
                   function h() -> r { r := h() } }";
        assert_eq!(run(src, "f", &[]), Err(Trap::Revert));
        assert!(matches!(run(src, "g", &[]), Err(Trap::Unsupported(_))));
        assert!(matches!(run(src, "h", &[]), Err(Trap::Fault(_))));
        assert!(matches!(run(src, "missing", &[]), Err(Trap::Fault(_))));
    }

    #[test]
    fn deep_recursion_stops_at_the_depth_limit() {
        let src = "{ function down(n) -> r { r := n if n { r := add(down(sub(n, 1)), 1) } } }";
        let limit = MAX_DEPTH as u64;
        assert_eq!(run(src, "down", &[limit - 1]), Ok(words(&[limit - 1])));
        assert_eq!(
            run(src, "down", &[limit]),
            Err(Trap::Fault("call depth exceeded in `down`".to_owned()))
        );
        assert!(matches!(run(src, "down", &[100 * limit]), Err(Trap::Fault(_))));
    }

    #[test]
    fn halts_unwind_to_the_entry_point() {
        let block = Block::try_from(
            "{ function inner(a) { mstore(0, a) return(30, 2) } \
             function f(a) -> r { r := 7 inner(a) r := 8 } \
             function g() -> r { r := 1 stop() } }",
        )
        .unwrap();
        let mut state = State::default();
        assert_eq!(block.execute("f", &words(&[0x1234]), &mut state), Ok(vec![]));
        assert_eq!(state.return_data, [0x12, 0x34]);
        assert_eq!(block.execute("g", &[], &mut state), Ok(vec![]));
        assert!(state.return_data.is_empty());
    }

    #[test]
    fn code_and_memory_size() {
        let mut state = State::default();
        state.environment.code = vec![0xaa, 0xbb];
        state.environment.address = BigUint::from(5u8);
        let result = Block::try_from(
            "{ function f() -> size, other, copied, m { size := extcodesize(address()) \
             other := extcodesize(6) codecopy(0, 1, 32) copied := mload(0) m := msize() } }",
        )
        .unwrap()
        .execute("f", &[], &mut state)
        .unwrap();
        assert_eq!(
            result,
            [
                BigUint::from(2u8),
                BigUint::zero(),
                BigUint::from(0xbbu8) << 248u32,
                BigUint::from(32u8),
            ]
        );
    }

    #[test]
    fn calldata_is_zero_padded() {
        let mut state = State::default();
        state.environment.calldata = vec![0xab; 4];
        let result = Block::try_from("{ function f() -> r { r := calldataload(2) } }")
            .unwrap()
            .execute("f", &[], &mut state)
            .unwrap();
        assert_eq!(result, [BigUint::from(0xabab_u32) << 240u32]);
    }
}
