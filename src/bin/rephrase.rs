//! Rephrase CLI binary.
//!
//! Secure multi-style rewriting service backed by an LLM.
//!
//! # Commands
//!
//! - `serve` - Start the HTTP rephrase server
//! - `scan` - Run the injection filter (and optionally the output validator) on text
//! - `prompt` - Print the structured prompt that would be sent upstream

use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rephrase::{
    llm::build_rephrase_prompt,
    security::SecurityPipeline,
    Config, RephraseServer, VERSION,
};

#[derive(Parser)]
#[command(name = "rephrase")]
#[command(version = VERSION)]
#[command(about = "Rephrase - secure streaming rewrites with an LLM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Config file path (default: per-user config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Enable debug logging
        #[arg(short, long)]
        verbose: bool,

        /// Emit logs as JSON
        #[arg(long)]
        json_logs: bool,
    },

    /// Check text against the security filters
    Scan {
        /// Text input (or - for stdin)
        input: Option<String>,

        /// Input file path
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Also validate the text as model output
        #[arg(short, long)]
        output: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the upstream prompt for a text and style
    Prompt {
        /// Text to rewrite (or - for stdin)
        input: Option<String>,

        /// Target style (professional, casual, polite, social)
        #[arg(short, long, default_value = "professional")]
        style: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            verbose,
            json_logs,
        } => cmd_serve(config, host, port, verbose, json_logs),

        Commands::Scan {
            input,
            file,
            output,
            json,
        } => cmd_scan(input, file, output, json),

        Commands::Prompt { input, style } => cmd_prompt(input, &style),
    }
}

fn cmd_serve(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    verbose: bool,
    json_logs: bool,
) -> anyhow::Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    // Initialize logging
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    if json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Build config: file, then environment, then flags
    let mut config = Config::load(config_path.as_deref())?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let server = RephraseServer::new(config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.run())?;
    Ok(())
}

fn cmd_scan(
    input: Option<String>,
    file: Option<PathBuf>,
    check_output: bool,
    json_output: bool,
) -> anyhow::Result<()> {
    let content = read_input(input, file)?;
    let pipeline = SecurityPipeline::new();

    let detection = pipeline.input_filter.inspect(&content);
    let sanitized = pipeline.input_filter.sanitize_input(&content);
    let violation = if check_output {
        pipeline.output_validator.violation(&content)
    } else {
        None
    };
    let blocked = detection.is_some() || violation.is_some();

    if json_output {
        let output = serde_json::json!({
            "injection": detection.as_ref().map(|d| serde_json::json!({
                "name": d.name,
                "category": d.category.to_string(),
            })),
            "sanitized": sanitized,
            "output_valid": check_output.then_some(violation.is_none()),
            "output_violation": violation.map(|p| p.name),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        match &detection {
            Some(d) => println!("INJECTION: {} ({})", d.name, d.category),
            None => println!("No injection detected"),
        }
        if check_output {
            match violation {
                Some(p) => println!("OUTPUT BLOCKED: {} - {}", p.name, p.description),
                None => println!("Output valid"),
            }
        }
        println!();
        println!("Sanitized:");
        println!("{sanitized}");
    }

    if blocked {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_prompt(input: Option<String>, style: &str) -> anyhow::Result<()> {
    let text = read_input(input, None)?;
    let pipeline = SecurityPipeline::new();

    let prompt = build_rephrase_prompt(&pipeline.input_filter, text.trim_end_matches('\n'), style)?;
    println!("{prompt}");
    Ok(())
}

fn read_input(input: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(path) = file {
        Ok(std::fs::read_to_string(path)?)
    } else if let Some(s) = input {
        if s == "-" {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer)
        } else {
            Ok(s)
        }
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    }
}
