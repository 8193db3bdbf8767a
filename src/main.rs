//! xmltext - legacy rich text to DocBook converter

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use xmltext::util::decode_xml;
use xmltext::{ConvertOptions, ConverterConfig, Diagnostic, Error, NullSink};

#[derive(Parser)]
#[command(name = "xmltext")]
#[command(version, about = "Convert legacy ezxmltext to DocBook rich text", long_about = None)]
#[command(after_help = "EXAMPLES:
    xmltext body.xml                          Convert and print to stdout
    xmltext body.xml body.docbook.xml         Convert to a file
    xmltext - --check-id-values < body.xml    Read stdin, fix invalid ids
    RUST_LOG=xmltext=debug xmltext body.xml   Trace pipeline stages")]
struct Cli {
    /// Input file, or `-` for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output file (stdout when omitted)
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Report ids the stylesheets had to disambiguate
    #[arg(long)]
    check_duplicate_ids: bool,

    /// Rewrite ids that are not valid NCNames
    #[arg(long)]
    check_id_values: bool,

    /// Content field id used in diagnostics
    #[arg(long, value_name = "N")]
    field_id: Option<i64>,

    /// Suppress diagnostics
    #[arg(short, long)]
    quiet: bool,

    /// Print diagnostics as JSON lines
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xmltext=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            if let Error::Convert(ref failure) = e {
                report(&cli, &failure.diagnostics);
            }
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether a document was produced.
fn run(cli: &Cli) -> Result<bool, Error> {
    let config = match &cli.config {
        Some(path) => ConverterConfig::load(path)?,
        None => ConverterConfig::default(),
    };
    let converter = config.build(Arc::new(NullSink));

    let bytes = read_input(&cli.input)?;
    let xml = decode_xml(&bytes);

    let options = ConvertOptions::new()
        .check_duplicate_ids(cli.check_duplicate_ids)
        .check_id_values(cli.check_id_values)
        .content_field_id(cli.field_id);
    let conversion = converter.convert_str(&xml, options)?;
    report(cli, &conversion.diagnostics);

    let Some(output) = conversion.output else {
        return Ok(false);
    };

    match &cli.output {
        Some(path) => {
            std::fs::write(path, output)?;
            if !cli.quiet {
                eprintln!("Wrote {}", path.display());
            }
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(output.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(true)
}

fn read_input(input: &str) -> Result<Vec<u8>, Error> {
    if input == "-" {
        let mut bytes = Vec::new();
        std::io::stdin().read_to_end(&mut bytes)?;
        Ok(bytes)
    } else {
        Ok(std::fs::read(input)?)
    }
}

fn report(cli: &Cli, diagnostics: &[Diagnostic]) {
    if cli.quiet {
        return;
    }
    for diagnostic in diagnostics {
        if cli.json {
            match serde_json::to_string(diagnostic) {
                Ok(line) => eprintln!("{line}"),
                Err(e) => eprintln!("error: {e}"),
            }
        } else {
            eprintln!("{diagnostic}");
            if let Some(context) = &diagnostic.context {
                for error in &context.errors {
                    eprintln!("  {error}");
                }
            }
        }
    }
}
