use clap::Parser;
use color_eyre::eyre::{self, eyre};
use resconv::{
    config::Config,
    convert::Converter,
    format::{output_path, resolve_target, DocFormat},
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Convert resumes between DOCX and PDF.")]
struct CliArg {
    /// Source resume file (.docx or .pdf)
    input: PathBuf,

    /// Optional output path (default: output_resume.*)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force output format instead of inferring from the input extension
    #[arg(long, value_parser = ["pdf", "docx"])]
    to: Option<String>,

    /// Anything else on the command line is ignored
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    extra: Vec<String>,
}

/// Source and destination worked out from the args
#[derive(Debug, PartialEq)]
struct Plan {
    src: PathBuf,
    out: PathBuf,
}

/// Check the input and pick the output before starting LibreOffice
fn plan(src: &Path, output: Option<&Path>, to: Option<&str>) -> Result<Plan, eyre::Error> {
    if !src.exists() {
        return Err(eyre!("File not found: {}", src.display()));
    }

    let source = DocFormat::from_path(src)
        .map_err(|_| eyre!("Only .docx and .pdf files are supported."))?;
    let to = to.map(str::parse::<DocFormat>).transpose()?;
    let target = resolve_target(source, to)?;

    Ok(Plan {
        src: src.to_path_buf(),
        out: output_path(output, target),
    })
}

#[tokio::main]
async fn main() -> Result<(), eyre::Error> {
    // Lets get pretty error reports
    color_eyre::install()?;

    // LibreOffice chatter only when asked for
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Pull in args
    let arg = CliArg::parse();
    if !arg.extra.is_empty() {
        println!("Ignoring extra args: {}", arg.extra.join(" "));
    }

    // Show the path we ended up with to make debugging easier.
    let src = std::path::absolute(&arg.input)?;
    println!("Using source file: {}", src.display());

    let plan = plan(&src, arg.output.as_deref(), arg.to.as_deref())?;

    // Find LibreOffice and convert
    let config = Config::from_env()?;
    let converter = Converter::locate(&config)?;
    converter.convert_file(&plan.src, &plan.out).await?;

    println!("Saved to {}", plan.out.display());

    Ok(())
}
