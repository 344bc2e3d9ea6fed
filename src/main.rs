//! Purpose: `quill` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, prints responses on stdout.
//! Invariants: Errors are printed to stderr with an optional hint line.
//! Invariants: Process exit code is derived from `core::error::to_exit_code`.
//! Invariants: All persistent state goes through one `Store` opened per invocation.
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};
use tracing_subscriber::EnvFilter;

use quill::config_paths::default_config_path;
use quill::core::error::{Error, ErrorKind, to_exit_code};
use quill::core::store::{LAST_REQUEST_KEY, Store};
use quill::editor;
use quill::request::{self, Method, RequestDetails, render_request, render_response};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

#[derive(Parser)]
#[command(
    name = "quill",
    version,
    about = "Command-line HTTP client with a persistent cookie jar",
    after_help = r#"EXAMPLES
  $ quill https://api.example.com/status
  $ quill -m post --edit https://api.example.com/items
  $ quill --raw https://api.example.com/blob
  $ quill cookie add "session=abc123"
  $ quill cookie wipe

NOTES
  - The stored cookie is attached to every request as a Cookie header
  - State lives in ~/.quillconfig (override with --config)"#
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Config store path (default: ~/.quillconfig)",
        value_hint = ValueHint::FilePath
    )]
    config: Option<PathBuf>,

    #[arg(
        short = 'm',
        long,
        value_enum,
        ignore_case = true,
        default_value = "get",
        help = "HTTP request method"
    )]
    method: Method,

    #[arg(
        short = 'e',
        long,
        help = "Open an editor to fill in request details before sending"
    )]
    edit: bool,

    #[arg(long, help = "Print the response body raw instead of pretty-printing JSON")]
    raw: bool,

    #[arg(short = 'v', long, help = "Echo request and response info blocks")]
    verbose: bool,

    #[arg(help = "Request URL", value_hint = ValueHint::Url)]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(arg_required_else_help = true, about = "Manage the stored cookie")]
    Cookie {
        #[command(subcommand)]
        command: CookieCommand,
    },
}

#[derive(Subcommand)]
enum CookieCommand {
    #[command(about = "Append a value to the stored cookie history")]
    Add {
        #[arg(help = "Cookie value, e.g. \"session=abc123\"")]
        value: String,
    },
    #[command(about = "Print the stored cookie value")]
    Show,
    #[command(about = "Delete the stored cookie")]
    Wipe,
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let mut cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut store = Store::open(&config_path)?;

    let outcome = match cli.command.take() {
        Some(Command::Cookie { command }) => run_cookie(&mut store, command),
        None => run_request(&mut store, &cli),
    };
    store.close();
    outcome
}

fn run_cookie(store: &mut Store, command: CookieCommand) -> Result<RunOutcome, Error> {
    match command {
        CookieCommand::Add { value } => {
            store.set_cookie(&value)?;
        }
        CookieCommand::Show => {
            println!("{}", store.cookie()?);
        }
        CookieCommand::Wipe => {
            store.clear_cookie()?;
        }
    }
    Ok(RunOutcome::ok())
}

fn run_request(store: &mut Store, cli: &Cli) -> Result<RunOutcome, Error> {
    let mut req = RequestDetails::new(cli.method, cli.url.clone().unwrap_or_default());

    if cli.edit {
        let template = editor_template(store, &req, cli.url.is_some())?;
        req = editor::edit_request(&template)?;
        store.replace(LAST_REQUEST_KEY, &editor::compose_compact(&req)?)?;
    }

    if req.url.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("no request URL given")
            .with_hint("Pass a URL argument, or fill one in with --edit."));
    }

    let cookie = store.cookie()?;
    if !cookie.is_empty() {
        req.header("Cookie", cookie);
    }

    if cli.verbose {
        print!("{}", render_request(&req));
    }

    let response = request::send(&req)?;
    println!("{}", render_response(&response, cli.verbose, !cli.raw));

    if response.is_success() {
        Ok(RunOutcome::ok())
    } else {
        Ok(RunOutcome::with_code(to_exit_code(ErrorKind::Http)))
    }
}

/// Picks what the editor buffer starts from: flag values when a URL was
/// given explicitly, otherwise the cached last request when one parses.
fn editor_template(
    store: &mut Store,
    req: &RequestDetails,
    url_given: bool,
) -> Result<RequestDetails, Error> {
    if url_given {
        return Ok(req.clone());
    }
    let saved = store.get(LAST_REQUEST_KEY)?;
    if saved.is_empty() {
        return Ok(req.clone());
    }
    match editor::parse(&saved) {
        Ok(previous) => Ok(previous),
        Err(err) => {
            tracing::debug!(error = %err, "ignoring unparseable last-request cache");
            Ok(req.clone())
        }
    }
}

fn emit_error(err: &Error) {
    eprintln!("error: {err}");
    if let Some(hint) = err.hint() {
        eprintln!("hint: {hint}");
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
