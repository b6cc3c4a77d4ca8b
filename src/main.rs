use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use colored::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use wikisplice_lib::config::{Config, OutputFormat};
use wikisplice_lib::exit_codes::exit;
use wikisplice_lib::{AttrQuote, List, SubElement, SubText};

#[derive(Parser)]
#[command(author, version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Control colored output: auto, always, never
    #[arg(long, global = true, default_value = "auto", value_parser = ["auto", "always", "never"], help = "Control colored output: auto, always, never")]
    color: String,

    /// Path to configuration file
    #[arg(long, global = true, help = "Path to configuration file")]
    config: Option<String>,

    /// Ignore all configuration files and use built-in defaults
    #[arg(
        long,
        global = true,
        help = "Ignore all configuration files and use built-in defaults"
    )]
    no_config: bool,

    /// Output format, overriding the configuration file
    #[arg(long, global = true, value_parser = ["text", "json"])]
    output_format: Option<String>,

    /// Print debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every tag in a file
    Tags {
        /// File to read
        file: PathBuf,
    },
    /// Print every list in a file
    Lists {
        /// File to read
        file: PathBuf,
        /// Leading marker to search for (defaults to the configured markers)
        #[arg(short, long)]
        pattern: Option<String>,
    },
    /// Rewrite the leading marker of every list with a given marker
    Convert(ConvertArgs),
    /// Set an attribute on every tag with a given name
    SetAttr(SetAttrArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// File to edit
    file: PathBuf,
    /// Marker of the lists to convert
    #[arg(short, long)]
    pattern: String,
    /// Replacement marker
    #[arg(long)]
    to: String,
    /// Rewrite the file instead of printing the result
    #[arg(short, long)]
    write: bool,
}

#[derive(Args)]
struct SetAttrArgs {
    /// File to edit
    file: PathBuf,
    /// Tag name, compared case-insensitively
    #[arg(long)]
    tag: String,
    /// Attribute name
    #[arg(long)]
    attr: String,
    /// New value; an empty value writes a bare attribute
    #[arg(long, allow_hyphen_values = true)]
    value: String,
    /// Rewrite the file instead of printing the result
    #[arg(short, long)]
    write: bool,
}

#[derive(Serialize)]
struct AttributeReport {
    name: String,
    value: Option<String>,
    quote: &'static str,
}

#[derive(Serialize)]
struct TagReport {
    name: String,
    start: usize,
    end: usize,
    self_closing: bool,
    attributes: Vec<AttributeReport>,
    contents: Option<String>,
}

#[derive(Serialize)]
struct ListReport {
    pattern: String,
    level: usize,
    start: usize,
    end: usize,
    items: Vec<String>,
}

#[derive(Serialize)]
struct EditReport {
    file: String,
    changed: usize,
    written: bool,
}

fn quote_name(quote: AttrQuote) -> &'static str {
    match quote {
        AttrQuote::Unquoted => "unquoted",
        AttrQuote::Single => "single",
        AttrQuote::Double => "double",
    }
}

fn read_document(path: &Path) -> anyhow::Result<SubText> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(SubText::new(content))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn tag_reports(document: &SubText) -> anyhow::Result<Vec<TagReport>> {
    let mut reports = Vec::new();
    for tag in document.tags()? {
        let span = tag.span()?;
        let start = tag.start_marker()?;
        reports.push(TagReport {
            name: start.name,
            start: span.start,
            end: span.end,
            self_closing: start.self_closing,
            attributes: start
                .attributes
                .into_iter()
                .map(|a| AttributeReport {
                    name: a.name,
                    value: a.value,
                    quote: quote_name(a.quote),
                })
                .collect(),
            contents: tag.contents()?,
        });
    }
    Ok(reports)
}

fn find_lists(document: &SubText, patterns: &[String]) -> anyhow::Result<Vec<List>> {
    let mut lists = Vec::new();
    for pattern in patterns {
        lists.extend(document.lists(pattern)?);
    }
    lists.sort_by_key(|list| list.span().map(|s| s.start).unwrap_or(usize::MAX));
    Ok(lists)
}

fn list_reports(lists: &[List]) -> anyhow::Result<Vec<ListReport>> {
    lists
        .iter()
        .map(|list| -> anyhow::Result<ListReport> {
            let span = list.span()?;
            Ok(ListReport {
                pattern: list.pattern()?,
                level: list.level()?,
                start: span.start,
                end: span.end,
                items: list.items()?,
            })
        })
        .collect()
}

fn handle_tags(file: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let document = read_document(file)?;
    let reports = tag_reports(&document)?;

    if format == OutputFormat::Json {
        return print_json(&reports);
    }
    for report in &reports {
        let attributes = report
            .attributes
            .iter()
            .map(|a| match &a.value {
                Some(value) => format!("{}={value:?}", a.name),
                None => a.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{} {} {}",
            format!("{}..{}", report.start, report.end).dimmed(),
            report.name.cyan().bold(),
            attributes
        );
        match &report.contents {
            Some(contents) => println!("  {contents:?}"),
            None => println!("  {}", "(self-closing)".dimmed()),
        }
    }
    Ok(())
}

fn handle_lists(file: &Path, pattern: Option<String>, config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    let document = read_document(file)?;
    let patterns = match pattern {
        Some(pattern) => vec![pattern],
        None => config.global.default_patterns.clone(),
    };
    let reports = list_reports(&find_lists(&document, &patterns)?)?;

    if format == OutputFormat::Json {
        return print_json(&reports);
    }
    for report in &reports {
        println!(
            "{} {} {}",
            format!("{}..{}", report.start, report.end).dimmed(),
            report.pattern.cyan().bold(),
            format!("level {}", report.level).dimmed()
        );
        for item in &report.items {
            println!("  {} {item}", "-".dimmed());
        }
    }
    Ok(())
}

/// Print the edited text, or write it back and report
fn finish_edit(file: &Path, document: &SubText, changed: usize, write: bool, format: OutputFormat) -> anyhow::Result<()> {
    if write {
        fs::write(file, document.string()?).with_context(|| format!("Failed to write {}", file.display()))?;
    }

    match (format, write) {
        (OutputFormat::Json, _) => print_json(&EditReport {
            file: file.display().to_string(),
            changed,
            written: write,
        }),
        (OutputFormat::Text, true) => {
            println!(
                "{} {} ({changed} changed)",
                "Updated".green().bold(),
                file.display()
            );
            Ok(())
        }
        (OutputFormat::Text, false) => {
            print!("{}", document.string()?);
            Ok(())
        }
    }
}

fn handle_convert(args: &ConvertArgs, format: OutputFormat) -> anyhow::Result<()> {
    let document = read_document(&args.file)?;
    let mut lists = document.lists(&args.pattern)?;
    for list in lists.iter_mut() {
        list.convert(&args.to)?;
    }
    log::debug!("[wikisplice] converted {} list(s) in {}", lists.len(), args.file.display());
    finish_edit(&args.file, &document, lists.len(), args.write, format)
}

fn handle_set_attr(args: &SetAttrArgs, format: OutputFormat) -> anyhow::Result<()> {
    let document = read_document(&args.file)?;
    let mut changed = 0;
    for mut tag in document.tags()? {
        if tag.name()?.eq_ignore_ascii_case(&args.tag) {
            tag.set(&args.attr, &args.value)?;
            changed += 1;
        }
    }
    log::debug!("[wikisplice] set {} on {changed} tag(s)", args.attr);
    finish_edit(&args.file, &document, changed, args.write, format)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref(), cli.no_config)?;
    let format = match cli.output_format.as_deref() {
        Some(format) => format.parse::<OutputFormat>().map_err(|e| anyhow!(e))?,
        None => config.global.output_format,
    };

    match cli.command {
        Commands::Tags { file } => handle_tags(&file, format),
        Commands::Lists { file, pattern } => handle_lists(&file, pattern, &config, format),
        Commands::Convert(args) => handle_convert(&args, format),
        Commands::SetAttr(args) => handle_set_attr(&args, format),
    }
}

fn main() {
    // Reset SIGPIPE to default behavior on Unix so piping to `head` etc. works correctly.
    #[cfg(unix)]
    {
        // SAFETY: restoring the default SIGPIPE disposition before any output is written.
        unsafe {
            libc::signal(libc::SIGPIPE, libc::SIG_DFL);
        }
    }

    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env().filter_level(level).init();

    match cli.color.as_str() {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::unset_override(),
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {e:#}", "Error".red().bold());
        exit::tool_error();
    }
}
