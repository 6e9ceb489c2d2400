use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rule_crawler::{Crawler, CrawlerConfig, RequestOptions, Rule};

#[derive(Parser)]
#[command(name = "rule-crawl", about = "Fetch pages and extract data with declarative rules")]
struct Cli {
    /// Extra request header, `Name: value` (repeatable)
    #[arg(short = 'H', long = "header", global = true)]
    headers: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the status line and body of a response
    Response {
        url: String,
        /// Fail on any status other than 200
        #[arg(long)]
        strict: bool,
    },
    /// Stream a response body to a file
    Download { url: String, path: PathBuf },
    /// Run an extraction rule over a page and print the JSON result
    Extract {
        url: String,
        /// Rule as inline JSON (default: {"_": "html"})
        #[arg(long, conflicts_with = "rule_file")]
        rule: Option<String>,
        /// Read the rule from a JSON file
        #[arg(long)]
        rule_file: Option<PathBuf>,
        /// Reject rules containing malformed functions
        #[arg(long)]
        strict_rule: bool,
        #[arg(long)]
        pretty: bool,
    },
}

fn request_options(url: String, headers: &[String]) -> anyhow::Result<RequestOptions> {
    let mut options = RequestOptions::get(url);
    for header in headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("header must look like 'Name: value', got {:?}", header))?;
        options = options.with_header(name.trim(), value.trim());
    }
    Ok(options)
}

fn load_rule(inline: Option<String>, file: Option<PathBuf>) -> anyhow::Result<Option<Rule>> {
    let text = match (inline, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading rule file {}", path.display()))?,
        (None, None) => return Ok(None),
    };
    Ok(Some(text.parse::<Rule>()?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rule_crawler=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let crawler = Crawler::with_config(CrawlerConfig::from_env())?;

    match cli.command {
        Commands::Response { url, strict } => {
            let options = request_options(url, &cli.headers)?;
            let response = crawler.fetch_response(options, strict).await?;
            println!("{} {}", response.status_code(), response.status_text());
            println!("{}", response.text());
        }
        Commands::Download { url, path } => {
            let options = request_options(url, &cli.headers)?;
            let size = crawler.fetch_to_file(options, &path).await?;
            println!("{}", size);
        }
        Commands::Extract { url, rule, rule_file, strict_rule, pretty } => {
            let options = request_options(url, &cli.headers)?;
            let rule = load_rule(rule, rule_file)?;
            if strict_rule {
                if let Some(rule) = &rule {
                    rule.validate()?;
                }
            }

            let result = crawler.fetch_and_extract(options, rule.as_ref()).await?;
            if pretty {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result);
            }
        }
    }

    Ok(())
}
