use {
    crate::common::{debug_println, init_logging, DEBUG},
    anyhow::Context,
    clap::{Parser, Subcommand, ValueEnum},
    frontend::ast::Block,
    middle::interp::{Execute, State},
    num_bigint::BigUint,
    std::{
        path::{Path, PathBuf},
        sync::atomic::Ordering,
    },
    tracing::info,
};

#[derive(Debug, Parser)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print intermediate programs and enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile a Yul program to Cairo
    Compile {
        /// Input source file
        input_path: PathBuf,

        #[command(flatten)]
        input_options: InputOptions,

        #[command(flatten)]
        compile_options: CompileOptions,
    },
    /// Run a function of a program
    Run {
        /// Input source file
        input_path: PathBuf,

        #[command(flatten)]
        input_options: InputOptions,

        #[command(flatten)]
        run_options: RunOptions,
    },
}

#[derive(ValueEnum, Clone, Debug)]
enum Format {
    Yul,
    Json,
}

#[derive(Debug, Parser)]
struct InputOptions {
    /// Input format
    #[arg(long, default_value = "yul")]
    format: Format,
}

#[derive(Debug, Parser)]
struct CompileOptions {
    /// Functions to expose [all root functions when none are given]
    #[arg(long = "entry")]
    entry_points: Vec<String>,

    /// Output file for generated Cairo code [leave unspecified for stdout]
    #[arg(short)]
    output_path: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Debug)]
enum Stage {
    Yul,
    Cairo,
}

#[derive(Debug, Parser)]
struct RunOptions {
    /// Function to call
    #[arg(long)]
    entry: String,

    /// Comma-separated arguments, decimal or 0x-prefixed hex
    #[arg(long, value_delimiter = ',', value_parser = parse_word)]
    args: Vec<BigUint>,

    /// Compilation stage to run
    #[arg(long, default_value = "cairo")]
    stage: Stage,
}

fn parse_word(src: &str) -> Result<BigUint, String> {
    let value = match src.strip_prefix("0x") {
        Some(hex) => BigUint::parse_bytes(hex.as_bytes(), 16),
        None => BigUint::parse_bytes(src.as_bytes(), 10),
    }
    .ok_or_else(|| format!("`{src}` is not a number"))?;
    if value.bits() > 256 {
        return Err(format!("`{src}` does not fit in 256 bits"));
    }
    Ok(value)
}

fn read(input_path: &Path, input_options: &InputOptions) -> anyhow::Result<Block> {
    let src = std::fs::read_to_string(input_path)
        .with_context(|| format!("failed to read {}", input_path.display()))?;
    let block = match input_options.format {
        Format::Yul => Block::try_from(&*src)?,
        Format::Json => Block::from_json(&src)?,
    };
    info!(path = %input_path.display(), functions = block.functions().count(), "read input");
    debug_println!("{block}");
    Ok(block)
}

pub(crate) fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    DEBUG.store(cli.debug, Ordering::Relaxed);
    init_logging(cli.debug)?;
    match cli.command {
        Command::Compile {
            input_path,
            input_options,
            compile_options,
        } => {
            let block = read(&input_path, &input_options)?;
            let transpiled = backend::transpile(block, &compile_options.entry_points)?;
            debug_println!("{:#?}", transpiled.entry_points);
            if let Some(output_path) = compile_options.output_path {
                std::fs::write(output_path, &transpiled.text)?;
            } else {
                print!("{}", transpiled.text);
            }
        }
        Command::Run {
            input_path,
            input_options,
            run_options,
        } => {
            let block = read(&input_path, &input_options)?;
            let RunOptions { entry, args, stage } = run_options;
            let mut state = State::default();
            let results = match stage {
                Stage::Yul => {
                    frontend::check(&block)?;
                    block.execute(&entry, &args, &mut state)?
                }
                Stage::Cairo => {
                    let transpiled = backend::transpile(block, std::slice::from_ref(&entry))?;
                    debug_println!("{}", transpiled.text);
                    let external = transpiled
                        .entry_points
                        .get(&entry)
                        .with_context(|| format!("`{entry}` is not an entry point"))?;
                    transpiled.program.execute(external, &args, &mut state)?
                }
            };
            println!(
                "{}",
                results
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            if !state.return_data.is_empty() {
                let hex = state
                    .return_data
                    .iter()
                    .map(|byte| format!("{byte:02x}"))
                    .collect::<String>();
                println!("returned 0x{hex}");
            }
        }
    }
    Ok(())
}
