//! xmlbind inspection tool
//!
//! Shows how documents look through the record-and-playback reader and
//! checks that replayed events match the original read.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};

use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use xmlbind::xml::Attributes;
use xmlbind::{EventSource, ReaderOptions, RecordingReader, XmlEvent, XmlSource};

/// Inspection tool for the xmlbind record-and-playback reader
#[derive(Parser)]
#[command(name = "xmlbind")]
#[command(version)]
#[command(about = "Inspection tool for the xmlbind record-and-playback reader", long_about = None)]
struct Cli {
    /// Log traversal decisions (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the event stream of a document, indented by depth
    #[command(visible_alias = "e")]
    Events {
        /// Input file
        file: String,
        /// Output file (default: stdout)
        output: Option<String>,

        /// Trim leading and trailing whitespace of text
        #[arg(short, long)]
        trim: bool,
    },

    /// Re-read every element after rewinding and compare both reads
    #[command(visible_alias = "r")]
    ReplayCheck {
        /// Input file
        file: String,
    },
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Events { file, output, trim } => run_events(&file, output.as_deref(), trim),
        Commands::ReplayCheck { file } => run_replay_check(&file),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open(path: &str, trim: bool) -> Result<XmlSource<BufReader<File>>, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    Ok(XmlSource::with_options(
        BufReader::new(file),
        ReaderOptions { trim_text: trim },
    ))
}

fn format_attributes(attributes: &Attributes) -> String {
    attributes
        .iter()
        .map(|(name, value)| format!(" {}={:?}", name, value))
        .collect()
}

/// Prints one line per event.
fn run_events(
    path: &str,
    output_path: Option<&str>,
    trim: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = RecordingReader::new(open(path, trim)?);

    let mut output: Box<dyn Write> = match output_path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout()),
    };

    let mut count = 0usize;
    loop {
        let event = reader.next_event()?.clone();
        let depth = reader.depth();
        match &event {
            XmlEvent::Start { name, attributes } => {
                let indent = "  ".repeat(depth.saturating_sub(1));
                writeln!(output, "{}start {}{}", indent, name, format_attributes(attributes))?;
            }
            XmlEvent::End { name } => {
                writeln!(output, "{}end {}", "  ".repeat(depth), name)?;
            }
            XmlEvent::Text(_) if event.is_whitespace() => continue,
            XmlEvent::Text(text) => {
                writeln!(output, "{}text {:?}", "  ".repeat(depth), text)?;
            }
            XmlEvent::EndDocument => {
                writeln!(output, "end of document")?;
                break;
            }
        }
        count += 1;
    }
    output.flush()?;
    info!(events = count, "printed event stream");
    Ok(())
}

/// Reads the rest of the element opened at `depth`, returning each event
/// with the depth after it.
fn read_subtree<S: EventSource>(
    reader: &mut RecordingReader<S>,
    depth: usize,
) -> Result<Vec<(XmlEvent, usize)>, Box<dyn std::error::Error>> {
    let mut events = Vec::new();
    while reader.depth() >= depth {
        let event = reader.next_event()?.clone();
        if event == XmlEvent::EndDocument {
            return Err("document ended inside an element".into());
        }
        events.push((event, reader.depth()));
    }
    Ok(events)
}

/// Marks at every start element, reads its subtree, rewinds and reads it
/// again. Children are then visited from the replayed events, so nested
/// elements are checked while an enclosing recording is being played back.
fn run_replay_check(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = RecordingReader::new(open(path, false)?);

    let mut checked = 0usize;
    loop {
        let name = match reader.next_event()? {
            XmlEvent::Start { name, .. } => name.clone(),
            XmlEvent::EndDocument => break,
            _ => continue,
        };
        let depth = reader.depth();

        let marker = reader.start_recording();
        let first = read_subtree(&mut reader, depth)?;
        reader.rewind_and_playback(marker)?;

        let marker = reader.start_recording();
        let second = read_subtree(&mut reader, depth)?;
        reader.rewind_and_playback(marker)?;

        if let Some(i) = first.iter().zip(&second).position(|(a, b)| a != b) {
            return Err(format!(
                "replay of <{}> diverged at event {}: read {:?}, replayed {:?}",
                name, i, first[i].0, second[i].0
            )
            .into());
        }
        if first.len() != second.len() {
            return Err(format!(
                "replay of <{}> has {} events, the original read had {}",
                name,
                second.len(),
                first.len()
            )
            .into());
        }
        debug!(element = %name, events = first.len(), "replay matches");
        checked += 1;
    }

    println!("{}: {} elements replayed identically", path, checked);
    Ok(())
}
