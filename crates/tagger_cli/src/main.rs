//! `tagger` command-line entry point.
//!
//! # Responsibility
//! - Parse arguments, discover the store root and start logging.
//! - Convert arguments to UTF-8 at the boundary and print result lines.
//!
//! # Invariants
//! - All tagging semantics live in `tagger_core`; this binary only maps
//!   arguments to service calls.
//! - Result lines go to stdout, errors to stderr.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tagger_core::boundary::EncodingError;
use tagger_core::{
    init_logging, ElemKind, LayoutStatus, LineSink, SetList, TaggerConfig, TaggerService,
    TaggerServiceError, TextCodec, Utf8Codec, Verbosity, WriterSink, STORE_DIR_NAME,
};

const ROOT_ENV: &str = "TAGGER_ROOT";

#[derive(Parser, Debug)]
#[command(
    name = "tagger",
    version,
    about = "Tag files and find them again with boolean tag queries"
)]
struct Cli {
    /// Operate on tags (default)
    #[arg(long, global = true, conflicts_with = "files")]
    tags: bool,

    /// Operate on files
    #[arg(long, global = true)]
    files: bool,

    /// Use the store in ./.tagger instead of the home directory
    #[arg(long, global = true)]
    local: bool,

    /// Store directory, overrides --local
    #[arg(long, global = true, env = ROOT_ENV)]
    root: Option<PathBuf>,

    /// Work on trashed entries (list)
    #[arg(long, global = true)]
    trash: bool,

    /// Print result lines only
    #[arg(long, global = true, conflicts_with = "debug")]
    quiet: bool,

    /// Verbose output and debug logs
    #[arg(long, global = true)]
    debug: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the store directories
    Init,
    /// Create tags
    Create {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Create TARGET with every relation of SOURCE
    Clone { source: String, target: String },
    /// Move entries to the trash (`*` wildcards allowed)
    Delete {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Restore trashed entries (`*` wildcards allowed)
    Recover {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Clone OLD into NEW, then delete OLD
    Rename { old: String, new: String },
    /// Give every named entry the union of their relations
    Merge {
        #[arg(required = true, num_args = 2..)]
        names: Vec<String>,
    },
    /// Add (+tag) or remove (-tag) tags on files
    Tag {
        #[arg(
            required = true,
            num_args = 1..,
            allow_hyphen_values = true,
            trailing_var_arg = true
        )]
        items: Vec<String>,
    },
    /// List entries, optionally filtered by a name or `*` pattern
    List { pattern: Option<String> },
    /// List files, optionally filtered
    Files { pattern: Option<String> },
    /// List tags, optionally filtered
    Tags { pattern: Option<String> },
    /// List entries related to any of the criteria
    Query { criteria: Vec<String> },
    /// Report relations recorded on one side only
    Check,
}

impl Cli {
    fn kind(&self) -> ElemKind {
        if self.files {
            ElemKind::File
        } else {
            ElemKind::Tag
        }
    }

    fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

#[derive(Debug)]
enum CliError {
    Argument(EncodingError),
    EmptyArgument,
    Root(String),
    Service(TaggerServiceError),
    Output(io::Error),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Argument(err) => write!(f, "{err}"),
            Self::EmptyArgument => write!(f, "empty argument"),
            Self::Root(message) => write!(f, "{message}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Output(err) => write!(f, "cannot write output: {err}"),
        }
    }
}

impl From<TaggerServiceError> for CliError {
    fn from(value: TaggerServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<io::Error> for CliError {
    fn from(value: io::Error) -> Self {
        Self::Output(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value.into())
    }
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Argument(_)
            | Self::EmptyArgument
            | Self::Service(TaggerServiceError::Usage(_))
            | Self::Service(TaggerServiceError::NotFound { .. })
            | Self::Service(TaggerServiceError::AlreadyExists { .. })
            | Self::Service(TaggerServiceError::Query(_)) => 2,
            Self::Root(_) | Self::Service(_) | Self::Output(_) => 1,
        }
    }
}

fn main() -> ExitCode {
    let args = match collect_args(std::env::args_os(), &Utf8Codec) {
        Ok(args) => args,
        Err(err) => return report(&err),
    };
    let cli = Cli::parse_from(expand_tag_shorthand(args));

    let stdout = io::stdout();
    let mut sink = WriterSink::new(stdout.lock(), Utf8Codec);
    let outcome = run(&cli, &mut sink);
    if let Err(err) = sink.flush() {
        return report(&CliError::Output(err));
    }
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

fn report(err: &CliError) -> ExitCode {
    log::error!("event=cli_exit module=cli status=error error={err}");
    eprintln!("tagger: {err}");
    ExitCode::from(err.exit_code())
}

/// Converts process arguments to UTF-8, rejecting empty ones.
fn collect_args(
    raw: impl IntoIterator<Item = OsString>,
    codec: &impl TextCodec,
) -> Result<Vec<String>, CliError> {
    let mut args = Vec::new();
    for (index, value) in raw.into_iter().enumerate() {
        let text = codec.to_internal(&value).map_err(CliError::Argument)?;
        if index > 0 && text.is_empty() {
            return Err(CliError::EmptyArgument);
        }
        args.push(text);
    }
    Ok(args)
}

/// Inserts the `tag` operation when the first operand is `+name` or `-name`.
fn expand_tag_shorthand(mut args: Vec<String>) -> Vec<String> {
    let mut index = 1;
    while let Some(arg) = args.get(index) {
        if arg == "--root" {
            index += 2;
        } else if arg.starts_with("--") {
            index += 1;
        } else {
            break;
        }
    }

    let is_tag_item = |arg: &str| {
        arg.starts_with('+') || (arg.starts_with('-') && arg.len() > 1 && !matches!(arg, "-h" | "-V"))
    };
    if args.get(index).is_some_and(|arg| is_tag_item(arg.as_str())) {
        args.insert(index, "tag".to_string());
    }
    args
}

struct TagItems {
    files: Vec<String>,
    add: Vec<String>,
    remove: Vec<String>,
}

fn split_tag_items(items: &[String]) -> TagItems {
    let mut split = TagItems {
        files: Vec::new(),
        add: Vec::new(),
        remove: Vec::new(),
    };
    for item in items {
        if let Some(tag) = item.strip_prefix('+') {
            split.add.push(tag.to_string());
        } else if let Some(tag) = item.strip_prefix('-') {
            split.remove.push(tag.to_string());
        } else {
            split.files.push(item.clone());
        }
    }
    split
}

/// Picks the store root: `--root`/`TAGGER_ROOT`, then `--local`, then home.
fn resolve_root(cli: &Cli) -> Result<PathBuf, CliError> {
    let cwd = || {
        std::env::current_dir()
            .map_err(|err| CliError::Root(format!("cannot read working directory: {err}")))
    };
    if let Some(root) = &cli.root {
        return if root.is_absolute() {
            Ok(root.clone())
        } else {
            Ok(cwd()?.join(root))
        };
    }
    if cli.local {
        return Ok(cwd()?.join(STORE_DIR_NAME));
    }
    dirs::home_dir()
        .map(|home| home.join(STORE_DIR_NAME))
        .ok_or_else(|| CliError::Root("cannot locate home directory; use --root".to_string()))
}

fn start_logging(config: &TaggerConfig) {
    let layout = config.layout();
    if !layout.is_ready() {
        return;
    }
    if let Err(err) = init_logging(config.log_level(), &layout.log_dir()) {
        if config.verbosity == Verbosity::Debug {
            eprintln!("tagger: file logging disabled: {err}");
        }
    }
}

fn run(cli: &Cli, sink: &mut impl LineSink) -> Result<(), CliError> {
    let config = TaggerConfig::new(resolve_root(cli)?)
        .with_verbosity(cli.verbosity())
        .with_trash(cli.trash);
    start_logging(&config);
    log::debug!(
        "event=cli_start module=cli command={:?} root={}",
        cli.command,
        config.root.display()
    );

    let service = TaggerService::open(&config);
    let mut out = Output {
        sink,
        json: cli.json,
        quiet: config.is_quiet(),
    };
    let kind = cli.kind();

    match &cli.command {
        Command::Init => {
            let status = service.init()?;
            start_logging(&config);
            let message = match status {
                LayoutStatus::Created => format!("store created in {}", config.root.display()),
                LayoutStatus::AlreadyReady => {
                    format!("store already present in {}", config.root.display())
                }
            };
            out.summary(&message, &InitSummary::from(status))
        }
        Command::Create { names } => {
            let report = service.create_tags(names)?;
            out.summary(
                &format!("{} tag(s) created, {} ignored", report.created, report.ignored),
                &report,
            )
        }
        Command::Clone { source, target } => {
            let report = service.clone_elem(kind, source, target)?;
            out.summary(
                &format!("{kind} cloned, {} relation(s) copied", report.relations_added),
                &report,
            )
        }
        Command::Delete { names } => {
            let report = service.delete(kind, names)?;
            out.summary(
                &format!("{} {kind}(s) deleted, {} ignored", report.deleted, report.ignored),
                &report,
            )
        }
        Command::Recover { names } => {
            let report = service.recover(kind, names)?;
            out.summary(
                &format!(
                    "{} {kind}(s) recovered, {} ignored",
                    report.recovered, report.ignored
                ),
                &report,
            )
        }
        Command::Rename { old, new } => {
            let report = service.rename(kind, old, new)?;
            out.summary(&format!("1 {kind} renamed"), &report)
        }
        Command::Merge { names } => {
            let report = service.merge(kind, names)?;
            out.summary(
                &format!(
                    "{} {kind}(s) merged, {} relation(s) added",
                    report.elements, report.relations_added
                ),
                &report,
            )
        }
        Command::Tag { items } => {
            let items = split_tag_items(items);
            let report = service.tag(&items.files, &items.add, &items.remove)?;
            out.summary(
                &format!(
                    "{} file(s) updated, {} tag(s) created",
                    report.files, report.tags_created
                ),
                &report,
            )
        }
        Command::List { pattern } => {
            out.names(service.list(kind, pattern.as_deref(), config.trash)?)
        }
        Command::Files { pattern } => {
            out.names(service.list(ElemKind::File, pattern.as_deref(), config.trash)?)
        }
        Command::Tags { pattern } => {
            out.names(service.list(ElemKind::Tag, pattern.as_deref(), config.trash)?)
        }
        Command::Query { criteria } => out.names(service.query(kind, criteria)?),
        Command::Check => {
            let warnings = service.check_consistency()?;
            let lines: Vec<String> = warnings.iter().map(ToString::to_string).collect();
            if out.json {
                return out.json_line(&lines);
            }
            for line in &lines {
                out.sink.emit_line(line)?;
            }
            if lines.is_empty() {
                out.summary("no inconsistency found", &lines)?;
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct InitSummary {
    created: bool,
}

impl From<LayoutStatus> for InitSummary {
    fn from(value: LayoutStatus) -> Self {
        Self {
            created: value == LayoutStatus::Created,
        }
    }
}

struct Output<'a, S: LineSink> {
    sink: &'a mut S,
    json: bool,
    quiet: bool,
}

impl<S: LineSink> Output<'_, S> {
    fn names(&mut self, names: SetList) -> Result<(), CliError> {
        if self.json {
            return self.json_line(&names);
        }
        for name in names.iter() {
            self.sink.emit_line(name)?;
        }
        Ok(())
    }

    /// Prints a human summary, or the report itself in JSON mode.
    fn summary(&mut self, message: &str, report: &impl Serialize) -> Result<(), CliError> {
        if self.json {
            return self.json_line(report);
        }
        if !self.quiet {
            self.sink.emit_line(message)?;
        }
        Ok(())
    }

    fn json_line(&mut self, value: &impl Serialize) -> Result<(), CliError> {
        let line = serde_json::to_string(value)?;
        self.sink.emit_line(&line)?;
        Ok(())
    }
}
