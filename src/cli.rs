use crate::app::AppState;
use crate::config::Config;
use crate::mining::MiningRun;
use crate::resolution::ResolutionEngine;
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(arg_required_else_help = true)]
#[command(name = "speciminer")]
#[command(about = "Mines museum specimen citations from the literature and links them to collection records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Phase 0: fetch documents from a source corpus and mine catalog-number mentions
    Mine {
        #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
        config: PathBuf,

        /// Corpus adapter name: `bhl`, `gdd`, or `local:<dir>`
        corpus: String,

        /// Query string passed to the corpus adapter
        query: String,
    },

    /// Phases 1-4: resolve mined mentions against the collections portal
    Match {
        #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
        config: PathBuf,
    },

    /// Emit a tabular report of snippet/link pairs
    Export {
        #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
        config: PathBuf,

        /// Output CSV path
        path: PathBuf,
    },

    /// Emit a citation-per-specimen summary for one source corpus
    Report {
        #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
        config: PathBuf,

        /// Source-corpus tag to filter documents by (e.g. `bhl`, `gdd`, `local`)
        source: String,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct ShellCommands;

impl ShellCommands {
    fn app(config: &PathBuf) -> Result<AppState> {
        let config = Config::load(config)?;
        Ok(AppState::new(config)?)
    }

    pub async fn run(&self) -> Result<()> {
        let cli = Cli::parse();
        match &cli.command {
            Some(Commands::Mine { config, corpus, query }) => {
                let app = Self::app(config)?;
                let adapter = app.corpus_adapter(corpus)?;
                let run = MiningRun::new(
                    app.storage.clone(),
                    app.bank.clone(),
                    app.topic.clone(),
                    app.config.museum_codes.clone(),
                    app.config.snippet_window,
                    app.config.batch_flush_size,
                );
                let mined = run.run(adapter.as_ref(), query).await?;
                log::info!("mined {mined} documents from {corpus} for query {query:?}");
                println!("mined {mined} documents");
            }
            Some(Commands::Match { config }) => {
                let app = Self::app(config)?;
                let engine = ResolutionEngine::new(
                    app.storage.clone(),
                    app.portal.clone(),
                    app.topic.clone(),
                    app.bank.clone(),
                    app.config.thresholds.clone(),
                );
                let matched = engine.run().await;
                log::info!("resolution completed for {matched} documents");
                println!("resolved {matched} documents");
            }
            Some(Commands::Export { config, path }) => {
                let app = Self::app(config)?;
                crate::report::export_links(app.storage.as_ref(), path).await?;
                println!("exported snippet/link pairs to {}", path.display());
            }
            Some(Commands::Report { config, source }) => {
                let app = Self::app(config)?;
                let lines = crate::report::citation_report(app.storage.as_ref(), source).await?;
                for line in &lines {
                    println!("{line}");
                }
                log::info!("reported {} specimen citations for source {source:?}", lines.len());
            }
            None => return Err(anyhow!("a subcommand is required: mine | match | export | report")),
        }
        Ok(())
    }
}
