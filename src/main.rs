mod aggregate;
mod config;
mod fetch;
mod generate;
mod research;
mod search;
mod sources;
mod text;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::aggregate::Aggregator;
use crate::config::{Limits, Paths, RemoteConfig};
use crate::generate::{GeminiGenerator, TextGenerator};
use crate::search::{DuckDuckGo, GoogleHtml};
use crate::sources::store::{LocalStore, SheetStore};

pub const APP_USER_AGENT: &str = concat!("gleaner/", env!("CARGO_PKG_VERSION"));

/// Browser user-agents rotated across fetches. Scraped sites throttle
/// a repeated unfamiliar UA quickly.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
];

pub fn random_user_agent() -> &'static str {
    USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]
}

#[derive(Parser)]
#[command(name = "gleaner", version, about = "Gathers and merges grounding sources for article generation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Research a keyword on the web and print the merged corpus report
    Research {
        keyword: String,
        #[arg(long, default_value_t = 5)]
        max_sources: usize,
    },
    /// Print the full aggregated source text for a keyword
    Corpus {
        keyword: String,
        /// Skip the live web-research section
        #[arg(long)]
        skip_research: bool,
        #[arg(long, default_value_t = 5)]
        max_sources: usize,
    },
    /// Per-origin counts of stored sources
    Summary,
    /// Store an uploaded file as a source
    AddFile { path: PathBuf },
    /// List stored file sources
    ListFiles,
    /// Delete a stored file source by id
    DeleteFile { id: u64 },
    /// Store a social caption as a source
    AddCaption {
        account: String,
        caption: String,
        #[arg(long, default_value = "")]
        url: String,
        #[arg(long, default_value = "")]
        tags: String,
    },
    /// List stored captions
    ListCaptions,
    /// Delete a stored caption by id
    DeleteCaption { id: u64 },
    /// Fetch a web page and store its snapshot
    SavePage { url: String },
    /// List stored web-page snapshots
    ListPages,
    /// Delete a stored snapshot by id
    DeletePage { id: u64 },
    /// Generate an article grounded in the aggregated sources
    Generate {
        keyword: String,
        #[arg(long, default_value_t = 0.7)]
        temperature: f32,
        #[arg(long)]
        skip_research: bool,
        #[arg(long, default_value_t = 5)]
        max_sources: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gleaner=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
}

fn aggregator(http: &reqwest::Client, limits: &Limits) -> Aggregator {
    let local = LocalStore::new(Paths::from_env(), limits.clone());
    let remote =
        RemoteConfig::from_env().map(|cfg| SheetStore::new(http.clone(), &cfg, limits.clone()));
    Aggregator::new(local, remote, limits.clone())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let limits = Limits::default();
    let http = http_client()?;

    match cli.command {
        Command::Research {
            keyword,
            max_sources,
        } => {
            let result = run_research(&http, &keyword, max_sources, &limits).await;
            print!("{}", research::format_report(&result));
        }

        Command::Corpus {
            keyword,
            skip_research,
            max_sources,
        } => {
            let agg = aggregator(&http, &limits);
            let result = if skip_research {
                None
            } else {
                Some(run_research(&http, &keyword, max_sources, &limits).await)
            };
            println!("{}", agg.all_sources_text(&keyword, result.as_ref()).await);
        }

        Command::Summary => {
            let summary = aggregator(&http, &limits).summary().await;
            println!("files (text): {}", summary.text);
            println!("files (pdf): {}", summary.pdf);
            println!("files (excel): {}", summary.excel);
            println!("files (image): {}", summary.image);
            println!("captions: {}", summary.caption);
            println!("web pages: {}", summary.web);
            println!("total: {}", summary.total());
        }

        Command::AddFile { path } => {
            let record = aggregator(&http, &limits).add_file(&path).await?;
            println!(
                "stored {} as #{} ({} chars)",
                record.label, record.id, record.char_count
            );
        }

        Command::ListFiles => {
            for record in aggregator(&http, &limits).files().await? {
                println!(
                    "{}. {} [{}] {} chars",
                    record.id,
                    record.label,
                    record.origin.as_str(),
                    record.char_count
                );
            }
        }

        Command::DeleteFile { id } => {
            report_deletion(aggregator(&http, &limits).delete_file(id).await?, id);
        }

        Command::AddCaption {
            account,
            caption,
            url,
            tags,
        } => {
            aggregator(&http, &limits)
                .add_caption(&account, &caption, &url, &tags)
                .await?;
            println!("caption from {account} stored");
        }

        Command::ListCaptions => {
            for record in aggregator(&http, &limits).captions().await? {
                println!(
                    "{}. {} {} chars{}",
                    record.id,
                    record.label,
                    record.char_count,
                    if record.tags.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", record.tags)
                    }
                );
            }
        }

        Command::DeleteCaption { id } => {
            report_deletion(aggregator(&http, &limits).delete_caption(id).await?, id);
        }

        Command::SavePage { url } => {
            let record = aggregator(&http, &limits).save_page(&http, &url).await?;
            println!(
                "saved \"{}\" as #{} ({} chars)",
                record.label, record.id, record.char_count
            );
        }

        Command::ListPages => {
            for record in aggregator(&http, &limits).pages()? {
                println!(
                    "{}. {} ({}) {} chars",
                    record.id, record.label, record.url, record.char_count
                );
            }
        }

        Command::DeletePage { id } => {
            report_deletion(aggregator(&http, &limits).delete_page(id)?, id);
        }

        Command::Generate {
            keyword,
            temperature,
            skip_research,
            max_sources,
        } => {
            let generator = GeminiGenerator::from_env(http.clone())?;
            let agg = aggregator(&http, &limits);

            let result = if skip_research {
                None
            } else {
                Some(run_research(&http, &keyword, max_sources, &limits).await)
            };
            let corpus = agg.all_sources_text(&keyword, result.as_ref()).await;

            let system = "You are an experienced SEO writer. Write one complete, \
                          well-structured article in Markdown for the given keyword. \
                          Ground every claim in the provided source material and do \
                          not invent facts the sources do not support.";
            let prompt = if corpus.is_empty() {
                format!("Keyword: {keyword}\n\nNo source material is available; write from general knowledge and say so where relevant.")
            } else {
                format!("Keyword: {keyword}\n\nSource material:\n\n{corpus}")
            };

            let article = generator.generate(system, &prompt, temperature).await?;
            println!("{article}");

            let title = article
                .lines()
                .find_map(|l| l.strip_prefix("# "))
                .unwrap_or(&keyword)
                .to_string();
            match agg.save_article(&keyword, &title, &article).await {
                Ok(true) => eprintln!("article stored remotely"),
                Ok(false) => {}
                Err(e) => eprintln!("warning: article not stored remotely: {e}"),
            }
        }
    }

    Ok(())
}

async fn run_research(
    http: &reqwest::Client,
    keyword: &str,
    max_sources: usize,
    limits: &Limits,
) -> research::ResearchResult {
    let primary = DuckDuckGo::new(http.clone());
    let fallback = GoogleHtml::new(http.clone());
    research::research(&primary, &fallback, http, keyword, max_sources, limits).await
}

fn report_deletion(removed: bool, id: u64) {
    if removed {
        println!("deleted #{id}");
    } else {
        println!("no record with id {id}");
    }
}
