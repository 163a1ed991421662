use clap::{Parser, ValueEnum};
use recurrence_expansion::{
    Completion, EventFile, External, OccurrencePage, OccurrenceQuery, QueryError, ValidationError,
    DEFAULT_COUNT,
};
use std::{
    ffi::OsStr,
    fs::{read_to_string, File},
    io::{self, Error as IoError, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use toml::{de::Error as TomlError, from_str};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum Error {
    #[error("Failed to open event file: {0}")]
    OpenInput(#[from] IoError),
    #[error("Failed to deserialize event file: {0}")]
    ParseInput(#[from] TomlError),
    #[error("Failed to validate event file: {0}")]
    Validation(#[from] ValidationError),
    #[error("Failed to expand occurrences: {0}")]
    Query(#[from] QueryError),
    #[error("Failed to encode occurrences: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to open output: {0}")]
    OpenOutput(IoError),
    #[error("Failed to write to output: {0}")]
    WriteOutput(IoError),
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum Format {
    /// One line per occurrence.
    #[default]
    Text,
    /// JSON array of events and their occurrences.
    Json,
}

#[derive(Parser)]
#[command(author, version, about)]
struct Opt {
    /// Path to the event file
    input: PathBuf,
    /// Specify path to write the occurrences to [default: -]
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Maximum number of occurrences listed per event
    #[arg(short, long, default_value_t = DEFAULT_COUNT)]
    count: usize,
    /// Maximum number of candidates examined per event, deleted ones included
    #[arg(long)]
    scan_limit: Option<usize>,
    /// Only list occurrences of this event
    #[arg(long)]
    event: Option<u64>,
    /// Only list events owned by this user
    #[arg(long)]
    owner: Option<String>,
    /// Delete the occurrence of `--event` starting at this instant, e.g. 2024-01-03T09:00:00
    #[arg(long, value_name = "INSTANT", requires = "event")]
    exclude: Vec<String>,
    #[arg(long, value_enum, default_value_t)]
    format: Format,
}

struct Session;

impl External for Session {
    type Error = Error;

    fn load_without_includes(&self, path: &Path) -> Result<EventFile, Error> {
        let as_str = read_to_string(path)?;
        from_str(&as_str).map_err(Into::into)
    }
}

/// Wrapper around output writer which handles differences between stdout and file outputs.
enum Output {
    Stdout(io::Stdout),
    File(File),
}

impl Output {
    /// Create a `Output` from the output path (or "-" for stdout).
    fn new(path: &OsStr) -> io::Result<Self> {
        if path == "-" {
            return Ok(Output::Stdout(io::stdout()));
        }
        File::create(path).map(Output::File)
    }
}

impl io::Write for Output {
    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(stdout) => stdout.flush(),
            Output::File(file) => file.flush(),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(stdout) => stdout.write(buf),
            Output::File(file) => file.write(buf),
        }
    }
}

fn write_text(output: &mut Output, pages: &[OccurrencePage], count: usize) -> io::Result<()> {
    for page in pages {
        match &page.rule {
            Some(rule) => writeln!(output, "#{} {} [{rule}]", page.event_id, page.title)?,
            None => writeln!(output, "#{} {}", page.event_id, page.title)?,
        }
        for occurrence in &page.occurrences {
            writeln!(
                output,
                "  {} - {}",
                occurrence.start.format("%Y-%m-%d %H:%M:%S"),
                occurrence.end.format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        let found = page.occurrences.len();
        match page.completion {
            Completion::Filled => {}
            Completion::Exhausted => {
                writeln!(output, "  (no further occurrences, {found} of {count})")?
            }
            Completion::ScanLimitReached => {
                writeln!(output, "  (scan limit reached, {found} of {count})")?
            }
        }
    }
    Ok(())
}

fn generate() -> Result<(), Error> {
    let opts = Opt::parse();

    let mut events = EventFile::load(&Session, &opts.input)?;
    events.validate()?;
    tracing::info!(file = %opts.input.display(), events = events.events().len(), "loaded events");

    // `--exclude` requires `--event`.
    if let Some(id) = opts.event {
        for instant in &opts.exclude {
            events.suppress(id, instant)?;
        }
    }

    let mut query = OccurrenceQuery::new(opts.count);
    if let Some(scan_limit) = opts.scan_limit {
        query = query.with_scan_limit(scan_limit);
    }

    let ids: Vec<u64> = match (opts.event, &opts.owner) {
        (Some(id), _) => vec![id],
        (None, Some(owner)) => events.events_owned_by(owner).map(|event| event.id).collect(),
        (None, None) => events.events().iter().map(|event| event.id).collect(),
    };
    let pages =
        ids.into_iter().map(|id| events.occurrences(id, &query)).collect::<Result<Vec<_>, _>>()?;

    let mut output = if let Some(output) = opts.output {
        Output::new(output.as_os_str())
    } else {
        Output::new(OsStr::new("-"))
    }
    .map_err(Error::OpenOutput)?;
    match opts.format {
        Format::Text => write_text(&mut output, &pages, opts.count).map_err(Error::WriteOutput)?,
        Format::Json => {
            serde_json::to_writer_pretty(&mut output, &pages)?;
            writeln!(output).map_err(Error::WriteOutput)?;
        }
    }
    output.flush().map_err(Error::WriteOutput)?;

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = generate() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
