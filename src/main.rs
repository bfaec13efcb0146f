mod db;
mod gemini;
mod page;
mod parser;
mod report;
mod settings;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::{info, warn};

use gemini::{DailyQuota, GeminiClient};
use page::Page;
use parser::PageAnalysis;
use report::{AnalysisReport, AnalyzeGate};
use settings::Settings;

#[derive(Parser)]
#[command(
    name = "tc_analyzer",
    about = "Detect terms of service, privacy policies and other legal pages, and summarize them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a page (file path or http(s) URL) is a legal document
    Detect {
        source: String,
        /// URL to score against when reading a saved file
        #[arg(long)]
        url: Option<String>,
        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the cleaned, truncated payload sent for analysis
    Extract {
        source: String,
        #[arg(long)]
        url: Option<String>,
    },
    /// Summarize a legal page with the model
    Analyze {
        source: String,
        #[arg(long)]
        url: Option<String>,
        /// Analyze even when the page is not detected as a legal document
        #[arg(long)]
        force: bool,
        /// Also write the export report to this file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Check every .html/.htm file in a directory
    Batch {
        dir: PathBuf,
        /// Max files to check (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Store the API key (no value: show whether one is set)
    Key { value: Option<String> },
    /// Show today's API usage
    Usage,
    /// Export the latest analysis
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Write to tc-analysis-<date>.txt
        #[arg(long)]
        download: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Detect { source, url, json } => {
            let page = page::load(&source, url.as_deref()).await?;
            let analysis = parser::analyze_page(&page);
            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_analysis(&analysis);
            }
            Ok(())
        }
        Commands::Extract { source, url } => {
            let page = page::load(&source, url.as_deref()).await?;
            let (_, payload) = parser::extract_page(&page, settings.max_content_chars, Utc::now());
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        Commands::Analyze {
            source,
            url,
            force,
            out,
        } => analyze(&settings, &source, url.as_deref(), force, out.as_deref()).await,
        Commands::Batch { dir, limit } => {
            let mut files = html_files(&dir)?;
            if let Some(n) = limit {
                files.truncate(n);
            }
            if files.is_empty() {
                println!("No HTML files in {:?}.", dir);
                return Ok(());
            }
            println!("Checking {} pages...", files.len());
            let rows = check_files(&files)?;
            print_batch(&rows);
            Ok(())
        }
        Commands::Key { value } => {
            let conn = open_db(&settings)?;
            match value {
                Some(v) => {
                    db::save_api_key(&conn, &v)?;
                    if v.trim().is_empty() {
                        println!("API key cleared.");
                    } else {
                        println!("API key saved.");
                    }
                }
                None => match resolve_api_key(&settings, &conn)? {
                    Some(_) => println!("API key: set"),
                    None => println!("API key: not set (run 'key <VALUE>' or set TCA_API_KEY)"),
                },
            }
            Ok(())
        }
        Commands::Usage => {
            let conn = open_db(&settings)?;
            let used = db::get_usage(&conn, &today())?;
            println!("Usage today: {}/{}", used, settings.daily_limit);
            Ok(())
        }
        Commands::Export { out, download } => {
            let conn = open_db(&settings)?;
            let Some(saved) = db::latest_report(&conn)? else {
                println!("No saved analysis. Run 'analyze' first.");
                return Ok(());
            };
            let text = report::format_export(&saved, Local::now().naive_local());
            match export_target(out, download, Utc::now()) {
                Some(path) => {
                    write_export(&path, &text)?;
                    println!("Saved {}", path.display());
                }
                None => println!("{}", text),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn analyze(
    settings: &Settings,
    source: &str,
    url: Option<&str>,
    force: bool,
    out: Option<&Path>,
) -> Result<()> {
    let conn = open_db(settings)?;
    let api_key = resolve_api_key(settings, &conn)?;

    let page = page::load(source, url).await?;
    let (analysis, payload) = parser::extract_page(&page, settings.max_content_chars, Utc::now());
    print_analysis(&analysis);

    match report::analyze_gate(api_key.as_deref(), &analysis.classification) {
        AnalyzeGate::Ready => {}
        AnalyzeGate::NotLegal if force => {
            warn!("Page not detected as a legal document, analyzing anyway");
        }
        gate => bail!("{}", gate.label()),
    }

    let mut client = GeminiClient::new(settings, api_key.as_deref().unwrap_or_default())?;
    let quota = DailyQuota::new(&conn, settings.daily_limit);
    println!("Analyzing...");
    let outcome = client.analyze(&payload, &quota, &today()).await?;

    let saved = AnalysisReport {
        page_title: page.title,
        page_url: page.url,
        document_type: analysis.classification.document_type,
        confidence: analysis.classification.confidence,
        body: outcome.text,
        created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    db::save_report(&conn, &saved)?;

    println!("\n{}", saved.body);
    println!("\nUsage today: {}/{}", outcome.usage, settings.daily_limit);

    if let Some(path) = out {
        let text = report::format_export(&saved, Local::now().naive_local());
        write_export(path, &text)?;
        println!("Saved {}", path.display());
    }
    Ok(())
}

fn open_db(settings: &Settings) -> Result<Connection> {
    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    Ok(conn)
}

/// `TCA_API_KEY` wins over the stored key.
fn resolve_api_key(settings: &Settings, conn: &Connection) -> Result<Option<String>> {
    if let Some(key) = settings.env_api_key() {
        return Ok(Some(key.to_string()));
    }
    db::load_api_key(conn)
}

fn today() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// `--out` wins; `--download` names the file after the UTC date.
fn export_target(out: Option<PathBuf>, download: bool, now: DateTime<Utc>) -> Option<PathBuf> {
    match (out, download) {
        (Some(path), _) => Some(path),
        (None, true) => Some(PathBuf::from(report::export_filename(now.date_naive()))),
        (None, false) => None,
    }
}

fn write_export(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))
}

fn print_analysis(analysis: &PageAnalysis) {
    let (headline, detail) = report::status_lines(analysis);
    println!("{}", headline);
    println!("{}", detail);
    println!(
        "Page: {} | {} words",
        truncate(&analysis.page_title, 60),
        analysis.classification.word_count
    );
}

fn html_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn check_files(files: &[PathBuf]) -> Result<Vec<(PathBuf, Option<PageAnalysis>)>> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut rows = Vec::with_capacity(files.len());
    for chunk in files.chunks(500) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|path| match Page::from_file(path, None) {
                Ok(page) => (path.clone(), Some(parser::analyze_page(&page))),
                Err(e) => {
                    warn!("Skipping {:?}: {:#}", path, e);
                    (path.clone(), None)
                }
            })
            .collect();
        rows.extend(results);
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    let detected = rows
        .iter()
        .filter(|(_, a)| a.as_ref().is_some_and(|a| a.classification.is_legal_document))
        .count();
    info!("Checked {} pages ({} legal documents)", rows.len(), detected);
    Ok(rows)
}

fn print_batch(rows: &[(PathBuf, Option<PageAnalysis>)]) {
    println!(
        "{:>3} | {:>4} | {:<5} | {:<21} | {:>6} | {:<32}",
        "#", "Conf", "Legal", "Type", "Words", "File"
    );
    println!("{}", "-".repeat(88));

    for (i, (path, analysis)) in rows.iter().enumerate() {
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        match analysis {
            Some(a) => {
                let c = &a.classification;
                println!(
                    "{:>3} | {:>3}% | {:<5} | {:<21} | {:>6} | {:<32}",
                    i + 1,
                    c.confidence,
                    if c.is_legal_document { "yes" } else { "no" },
                    truncate(&c.document_type, 21),
                    c.word_count,
                    truncate(&file, 32),
                );
            }
            None => println!(
                "{:>3} | {:>4} | {:<5} | {:<21} | {:>6} | {:<32}",
                i + 1,
                "-",
                "err",
                "-",
                "-",
                truncate(&file, 32)
            ),
        }
    }

    let detected = rows
        .iter()
        .filter(|(_, a)| a.as_ref().is_some_and(|a| a.classification.is_legal_document))
        .count();
    println!("\n{} pages | {} legal documents", rows.len(), detected);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
