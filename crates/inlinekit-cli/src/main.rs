//! InlineKit CLI - Command-line interface for inlining HTML and CSS resources

use clap::{Args, Parser, Subcommand, ValueEnum};
use inlinekit::{ImagePolicy, InlineOutput, Inliner};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// The inlined document as-is
    #[default]
    Text,
    /// JSON object with the document and any failures
    Json,
}

/// InlineKit - inline stylesheets, scripts and images into HTML and CSS
#[derive(Parser, Debug)]
#[command(name = "inlinekit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inline <link>, <script> and <img> references of an HTML document
    Html(InlineArgs),
    /// Inline url() references of a CSS document
    Css(InlineArgs),
}

#[derive(Args, Debug)]
struct InlineArgs {
    /// Document to read, or `-` for stdin
    file: PathBuf,

    /// Base directory or URL for relative references
    ///
    /// Defaults to the document's directory (current directory for stdin).
    #[arg(long)]
    relative_to: Option<String>,

    /// Image policy: true, false, or a size limit in KB
    #[arg(long, default_value = "false")]
    images: ImagePolicy,

    /// Exit with an error if any resource cannot be inlined
    #[arg(long)]
    strict: bool,

    /// Leave <script src> tags alone
    #[arg(long)]
    no_scripts: bool,

    /// Leave stylesheet links alone
    #[arg(long)]
    no_links: bool,

    /// Opt-in marker attribute
    #[arg(long, default_value = inlinekit::DEFAULT_INLINE_ATTRIBUTE)]
    inline_attribute: String,

    /// Custom User-Agent
    #[arg(long)]
    user_agent: Option<String>,

    /// Timeout for each remote request
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Write the result here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "text")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy)]
enum Document {
    Html,
    Css,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Html(args) => run_inline(Document::Html, args).await,
        Commands::Css(args) => run_inline(Document::Css, args).await,
    };
    std::process::exit(code);
}

async fn run_inline(document: Document, args: InlineArgs) -> i32 {
    let content = match read_input(&args.file) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {}: {}", args.file.display(), e);
            return 1;
        }
    };

    let relative_to = args
        .relative_to
        .clone()
        .unwrap_or_else(|| default_relative_to(&args.file));
    tracing::debug!(file = %args.file.display(), relative_to = %relative_to, "Inlining");

    let inliner = build_inliner(&args);
    let output = match document {
        Document::Html => inliner.html(&content, &relative_to).await,
        Document::Css => inliner.css(&content, &relative_to).await,
    };

    let failed = output.error.is_some();
    let rendered = match args.output {
        OutputFormat::Text => {
            if let Some(ref error) = output.error {
                eprintln!("Error: {}", error);
            }
            output.text
        }
        OutputFormat::Json => format_json(&output),
    };

    match args.out {
        Some(ref path) => {
            if let Err(e) = std::fs::write(path, rendered) {
                eprintln!("Error writing {}: {}", path.display(), e);
                return 1;
            }
        }
        None => write_stdout_safe(&rendered, args.output),
    }

    if failed {
        1
    } else {
        0
    }
}

fn build_inliner(args: &InlineArgs) -> Inliner {
    let mut builder = Inliner::builder()
        .images(args.images)
        .strict(args.strict)
        .scripts(!args.no_scripts)
        .links(!args.no_links)
        .inline_attribute(args.inline_attribute.clone());

    if let Some(ref ua) = args.user_agent {
        builder = builder.user_agent(ua.clone());
    }
    if let Some(secs) = args.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder.build()
}

fn read_input(file: &Path) -> io::Result<String> {
    if file == Path::new("-") {
        let mut content = String::new();
        io::stdin().read_to_string(&mut content)?;
        Ok(content)
    } else {
        std::fs::read_to_string(file)
    }
}

/// Directory containing `file`, with a trailing separator
fn default_relative_to(file: &Path) -> String {
    if file == Path::new("-") {
        return "./".to_string();
    }
    match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => format!("{}/", dir.display()),
        _ => "./".to_string(),
    }
}

/// Format output as JSON
fn format_json(output: &InlineOutput) -> String {
    let failures: Vec<serde_json::Value> = output
        .error
        .iter()
        .flat_map(|error| &error.failures)
        .map(|failure| {
            serde_json::json!({
                "reference": failure.reference,
                "location": failure.location,
                "kind": failure.kind,
                "error": failure.error.to_string(),
            })
        })
        .collect();

    let value = serde_json::json!({
        "text": output.text,
        "error": output.error.as_ref().map(|e| e.to_string()),
        "failures": failures,
    });
    serde_json::to_string_pretty(&value).unwrap_or_else(|e| {
        eprintln!("Error serializing output: {}", e);
        std::process::exit(1);
    })
}

/// Text output is written as-is; JSON gets a trailing newline
fn write_rendered(out: &mut impl Write, rendered: &str, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Text => write!(out, "{}", rendered),
        OutputFormat::Json => writeln!(out, "{}", rendered),
    }
}

/// Write to stdout, exit silently on broken pipe
fn write_stdout_safe(rendered: &str, format: OutputFormat) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = write_rendered(&mut handle, rendered, format).and_then(|_| handle.flush()) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}
