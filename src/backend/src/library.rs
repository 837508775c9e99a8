use {
    super::cairo::{Binding, Function, Import, Instruction, Param, Type},
    std::{
        collections::{BTreeMap, BTreeSet},
        sync::LazyLock,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Implicit {
    SyscallPtr,
    PedersenPtr,
    RangeCheckPtr,
    BitwisePtr,
    MemoryDict,
    Msize,
}

impl Implicit {
    pub const ALL: [Implicit; 6] = [
        Implicit::SyscallPtr,
        Implicit::PedersenPtr,
        Implicit::RangeCheckPtr,
        Implicit::BitwisePtr,
        Implicit::MemoryDict,
        Implicit::Msize,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Implicit::SyscallPtr => "syscall_ptr",
            Implicit::PedersenPtr => "pedersen_ptr",
            Implicit::RangeCheckPtr => "range_check_ptr",
            Implicit::BitwisePtr => "bitwise_ptr",
            Implicit::MemoryDict => "memory_dict",
            Implicit::Msize => "msize",
        }
    }

    pub fn named(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|implicit| implicit.name() == name)
    }

    pub fn param(self) -> Param {
        let ty = match self {
            Implicit::SyscallPtr => Type::Pointer("felt".to_owned()),
            Implicit::PedersenPtr => Type::Pointer("HashBuiltin".to_owned()),
            Implicit::BitwisePtr => Type::Pointer("BitwiseBuiltin".to_owned()),
            Implicit::MemoryDict => Type::Pointer("DictAccess".to_owned()),
            Implicit::RangeCheckPtr | Implicit::Msize => Type::Felt,
        };
        Param::new(self.name(), ty)
    }
}

#[derive(Debug)]
pub struct LibraryFunction {
    pub module: &'static str,
    pub implicits: &'static [Implicit],
}

const UINT256: &str = "starkware.cairo.common.uint256";

static LIBRARY: LazyLock<BTreeMap<&str, LibraryFunction>> = LazyLock::new(|| {
    use Implicit::*;

    let function = |module: &'static str, implicits: &'static [Implicit]| LibraryFunction {
        module,
        implicits,
    };
    let memory: &[Implicit] = &[RangeCheckPtr, MemoryDict, Msize];
    let storage: &[Implicit] = &[SyscallPtr, PedersenPtr, RangeCheckPtr];
    let environment: &[Implicit] = &[SyscallPtr];
    let calls: &[Implicit] = &[SyscallPtr, RangeCheckPtr, MemoryDict, Msize];
    let range_check: &[Implicit] = &[RangeCheckPtr];
    let bitwise: &[Implicit] = &[RangeCheckPtr, BitwisePtr];
    BTreeMap::from([
        // words
        ("uint256_add", function(UINT256, range_check)),
        ("uint256_sub", function(UINT256, range_check)),
        ("uint256_mul", function(UINT256, range_check)),
        ("uint256_unsigned_div_rem", function(UINT256, range_check)),
        ("uint256_signed_div_rem", function(UINT256, range_check)),
        ("uint256_mul_div_mod", function(UINT256, range_check)),
        ("uint256_lt", function(UINT256, range_check)),
        ("uint256_signed_lt", function(UINT256, range_check)),
        ("uint256_eq", function(UINT256, range_check)),
        ("uint256_not", function(UINT256, range_check)),
        ("uint256_and", function(UINT256, bitwise)),
        ("uint256_or", function(UINT256, bitwise)),
        ("uint256_xor", function(UINT256, bitwise)),
        ("uint256_shl", function(UINT256, bitwise)),
        ("uint256_shr", function(UINT256, bitwise)),
        // memory
        ("default_dict_new", function("starkware.cairo.common.default_dict", &[])),
        (
            "default_dict_finalize",
            function("starkware.cairo.common.default_dict", range_check),
        ),
        ("mload_", function("evm.memory", memory)),
        ("mstore_", function("evm.memory", memory)),
        ("mstore8_", function("evm.memory", memory)),
        ("msize_", function("evm.memory", &[Msize])),
        ("sha", function("evm.sha3", &[RangeCheckPtr, BitwisePtr, MemoryDict, Msize])),
        // storage and environment
        ("warp_sload", function("evm.yul_api", storage)),
        ("warp_sstore", function("evm.yul_api", storage)),
        ("warp_caller", function("evm.yul_api", environment)),
        ("warp_address", function("evm.yul_api", environment)),
        ("warp_callvalue", function("evm.yul_api", environment)),
        ("warp_gas", function("evm.yul_api", environment)),
        ("warp_timestamp", function("evm.yul_api", environment)),
        ("warp_number", function("evm.yul_api", environment)),
        ("warp_chainid", function("evm.yul_api", environment)),
        ("warp_log0", function("evm.yul_api", calls)),
        ("warp_log1", function("evm.yul_api", calls)),
        ("warp_log2", function("evm.yul_api", calls)),
        ("warp_log3", function("evm.yul_api", calls)),
        ("warp_log4", function("evm.yul_api", calls)),
        ("warp_return", function("evm.yul_api", calls)),
        ("warp_stop", function("evm.yul_api", environment)),
        // calldata and calls
        ("warp_calldataload", function("evm.calls", &[SyscallPtr, RangeCheckPtr])),
        ("warp_calldatasize", function("evm.calls", environment)),
        ("warp_calldatacopy", function("evm.calls", calls)),
        ("warp_returndatasize", function("evm.calls", environment)),
        ("warp_returndatacopy", function("evm.calls", calls)),
        ("warp_codecopy", function("evm.calls", calls)),
        ("warp_extcodesize", function("evm.calls", environment)),
        ("warp_call", function("evm.calls", calls)),
        ("warp_static_call", function("evm.calls", calls)),
        ("warp_delegatecall", function("evm.calls", calls)),
    ])
});

pub fn lookup(name: &str) -> Option<&'static LibraryFunction> {
    LIBRARY.get(name)
}

fn library_type(ty: &Type) -> Option<(&'static str, &'static str)> {
    const CAIRO_BUILTINS: &str = "starkware.cairo.common.cairo_builtins";
    match ty {
        Type::Felt => None,
        Type::Uint256 => Some((UINT256, "Uint256")),
        Type::Pointer(name) => match name.as_str() {
            "HashBuiltin" => Some((CAIRO_BUILTINS, "HashBuiltin")),
            "BitwiseBuiltin" => Some((CAIRO_BUILTINS, "BitwiseBuiltin")),
            "DictAccess" => Some(("starkware.cairo.common.dict_access", "DictAccess")),
            _ => None,
        },
    }
}

fn collect_types<'a>(body: &'a [Instruction], types: &mut Vec<&'a Type>) {
    for instruction in body {
        match instruction {
            Instruction::Local { ty, .. } => types.push(ty),
            Instruction::Let { bindings, .. } => {
                types.extend(bindings.iter().filter_map(|binding| match binding {
                    Binding::Ignored => None,
                    Binding::Reference(param) | Binding::Local(param) => Some(&param.ty),
                }))
            }
            Instruction::If {
                body, else_body, ..
            } => {
                collect_types(body, types);
                if let Some(else_body) = else_body {
                    collect_types(else_body, types);
                }
            }
            Instruction::With { body, .. } => collect_types(body, types),
            Instruction::AllocLocals
            | Instruction::Call(_)
            | Instruction::Assert(..)
            | Instruction::Return(_) => {}
        }
    }
}

pub fn imports(functions: &[Function]) -> Vec<Import> {
    let mut modules = BTreeMap::<&'static str, BTreeSet<&'static str>>::new();
    for function in functions {
        for (call, _) in function.calls() {
            if let Some((&name, library_function)) = LIBRARY.get_key_value(call.function.as_str())
            {
                modules.entry(library_function.module).or_default().insert(name);
            }
        }
        let mut types = vec![];
        for param in function
            .implicits
            .iter()
            .chain(&function.parameters)
            .chain(&function.returns)
        {
            types.push(&param.ty);
        }
        collect_types(&function.body, &mut types);
        for (module, name) in types.into_iter().filter_map(library_type) {
            modules.entry(module).or_default().insert(name);
        }
    }
    modules
        .into_iter()
        .map(|(module, names)| Import {
            module: module.to_owned(),
            names: names.into_iter().map(str::to_owned).collect(),
        })
        .collect()
}
