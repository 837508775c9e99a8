pub mod cairo;
mod codegen;
mod error;
mod exec;
mod functions;
mod lexer;
pub mod library;
mod parser;
mod validate;

pub use {
    codegen::generate,
    error::{Error, Result},
    validate::validate,
};

use {
    anyhow::Context,
    frontend::ast::{Block, Ident},
    middle::names::NameGenerator,
    std::collections::BTreeMap,
    tracing::info,
};

#[derive(Debug)]
pub struct Transpiled {
    pub text: String,
    pub program: cairo::Program,
    pub entry_points: BTreeMap<Ident, cairo::Name>,
}

/// Translates a Yul block into a StarkNet contract exposing `entry_points`, or every root
/// function when none are given.
pub fn transpile(block: Block, entry_points: &[Ident]) -> anyhow::Result<Transpiled> {
    frontend::check(&block).context("invalid input")?;
    let mut names = NameGenerator::new();
    let normalized =
        middle::normalize(block, entry_points, &mut names).context("normalization failed")?;
    let program = generate(&normalized, &mut names).context("code generation failed")?;
    let (program, text) = validate(&program.to_string()).context("emitted Cairo is malformed")?;
    let entry_points = normalized
        .entry_points
        .into_iter()
        .map(|(source, mangled)| (source, format!("{mangled}{}", middle::EXTERNAL_SUFFIX)))
        .collect();
    info!(functions = program.functions.len(), "transpiled");
    Ok(Transpiled {
        text,
        program,
        entry_points,
    })
}
