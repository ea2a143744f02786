mod logging;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use keic::toolchain::{self, ToolchainError};
use keic::{Arena, CompileOptions, error};
use snafu::{ResultExt, Snafu, ensure};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "keic", version, about = "Compile a .kei program to x86-64 NASM assembly")]
struct Cli {
  /// Source file, must end in `.kei`
  input: PathBuf,

  /// Where to write the assembly
  #[arg(short, long, value_name = "PATH", default_value = "out.asm")]
  output: PathBuf,

  /// What to produce
  #[arg(long, value_enum, default_value_t = Emit::Asm)]
  emit: Emit,

  /// Byte budget of the syntax tree arena
  #[arg(long, value_name = "BYTES", env = "KEIC_ARENA_CAPACITY", default_value_t = keic::arena::DEFAULT_CAPACITY)]
  arena_capacity: usize,

  /// Assemble with nasm and link with ld after writing the assembly
  #[arg(long)]
  build: bool,

  /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
  /// Print the token stream
  Tokens,
  /// Print the syntax tree as S-expressions
  Ast,
  /// Write assembly to the output path
  Asm,
}

#[derive(Debug, Snafu)]
enum DriverError {
  #[snafu(display("the input file must have a '.kei' extension: {}", path.display()))]
  Extension { path: PathBuf },
  #[snafu(display("failed to read {}: {source}", path.display()))]
  ReadSource {
    path: PathBuf,
    source: std::io::Error,
  },
  #[snafu(display("failed to write {}: {source}", path.display()))]
  WriteOutput {
    path: PathBuf,
    source: std::io::Error,
  },
  #[snafu(display("{rendered}"))]
  Compile { rendered: String },
  #[snafu(context(false), display("{source}"))]
  Toolchain { source: ToolchainError },
}

fn compile_stage<T>(source: &str, result: keic::CompileResult<T>) -> Result<T, DriverError> {
  result.map_err(|err| {
    CompileSnafu {
      rendered: error::render(source, &err),
    }
    .build()
  })
}

fn run(cli: &Cli) -> Result<(), DriverError> {
  ensure!(
    cli.input.extension().is_some_and(|ext| ext == "kei"),
    ExtensionSnafu { path: &cli.input }
  );
  let source = fs::read_to_string(&cli.input).context(ReadSourceSnafu { path: &cli.input })?;
  let options = CompileOptions {
    arena_capacity: cli.arena_capacity,
  };

  match cli.emit {
    Emit::Tokens => {
      for token in compile_stage(&source, keic::tokenize(&source))? {
        println!("{token}");
      }
    }
    Emit::Ast => {
      let tokens = compile_stage(&source, keic::tokenize(&source))?;
      let arena = Arena::with_capacity(options.arena_capacity);
      let program = compile_stage(&source, keic::parse(&tokens, &arena))?;
      print!("{program}");
    }
    Emit::Asm => {
      let asm = compile_stage(&source, keic::compile(&source, &options))?;
      fs::write(&cli.output, asm).context(WriteOutputSnafu { path: &cli.output })?;
      info!(output = %cli.output.display(), "wrote assembly");
      if cli.build {
        let exe = toolchain::build(&cli.output, &executable_path(&cli.output))?;
        info!(executable = %exe.display(), "linked executable");
      }
    }
  }
  Ok(())
}

fn executable_path(asm: &Path) -> PathBuf {
  asm.with_extension("")
}

fn main() {
  let cli = Cli::parse();
  logging::init(cli.verbose);

  if let Err(err) = run(&cli) {
    match err {
      DriverError::Compile { rendered } => eprint!("{rendered}"),
      other => eprintln!("error: {other}"),
    }
    process::exit(1);
  }
}
