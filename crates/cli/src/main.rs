mod cmd;
mod output;

use std::ffi::OsString;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use wpcd_platform::Settings;

use cmd::Invocation;
use output::print_error;

/// Name of the multi-call binary itself
const BINARY_NAME: &str = "wpcd";

/// wpcd - build, test and deploy WordPress sites, plugins and themes
#[derive(Parser, Debug)]
#[command(name = "wpcd", author, version, about, long_about = None)]
struct Flags {
  /// Enable informational logging
  #[arg(short, long)]
  verbose: bool,

  /// Enable debug logging
  #[arg(short, long)]
  debug: bool,
}

impl Flags {
  /// Level used when `RUST_LOG` is not set
  fn default_level(&self) -> &'static str {
    if self.debug {
      "debug"
    } else if self.verbose {
      "info"
    } else {
      "warn"
    }
  }
}

fn main() -> ExitCode {
  let (command, args) = split_invocation(std::env::args_os().collect());

  let Some(invocation) = command.as_deref().and_then(Invocation::parse) else {
    match command {
      Some(name) => print_error(&format!("unknown command '{}'", name)),
      None => print_error("no command given"),
    }
    eprintln!("{}", usage());
    return ExitCode::from(1);
  };

  let flags = Flags::parse_from(std::iter::once(OsString::from(invocation.to_string())).chain(args));
  init_logging(&flags);

  match run(invocation) {
    Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::from(1)
    }
  }
}

fn run(invocation: Invocation) -> Result<i32> {
  let settings = Settings::from_env().context("unable to resolve run settings")?;
  let outcome = cmd::run(invocation, &settings);
  Ok(outcome.exit_code())
}

fn init_logging(flags: &Flags) {
  let filter = if std::env::var_os("RUST_LOG").is_some() {
    EnvFilter::from_default_env()
  } else {
    EnvFilter::new(flags.default_level())
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

/// Split argv into the command name and the remaining arguments.
///
/// Invoked through a `<phase>-wp-<kind>` link the command is the program name;
/// invoked as `wpcd` it is the first argument.
fn split_invocation(argv: Vec<OsString>) -> (Option<String>, Vec<OsString>) {
  let mut args = argv.into_iter();
  let program = args
    .next()
    .and_then(|arg0| Path::new(&arg0).file_stem().map(|s| s.to_string_lossy().into_owned()));

  match program {
    Some(name) if name != BINARY_NAME => (Some(name), args.collect()),
    _ => {
      let command = args.next().map(|arg| arg.to_string_lossy().into_owned());
      (command, args.collect())
    }
  }
}

fn usage() -> String {
  format!(
    "usage: {} <command> [-v] [-d]\n\ncommands:\n{}",
    BINARY_NAME,
    Invocation::all()
      .map(|invocation| format!("  {}", invocation))
      .collect::<Vec<_>>()
      .join("\n")
  )
}
