//! rgs-mkb - classify the RGS MKB reference chart for ERPNext
//!
//! Reads the canonical record list plus the optional field-specification and
//! concept tables, and writes classifications, entity templates, an ERPNext
//! chart-of-accounts template or a processing report.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rgs_mkb::{
    build_chart_with, read_source, ChartOptions, EngineConfig, EntityCategory, Pipeline,
    PipelineOutput, ProcessingReport, SourceKind, TemplateRequest,
};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rgs-mkb")]
#[command(about = "Classify RGS MKB reference codes for ERPNext", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Inputs {
    /// Canonical record list (JSON)
    #[arg(short, long)]
    records: PathBuf,

    /// Field-specification table (CSV)
    #[arg(short, long)]
    specs: Option<PathBuf>,

    /// Concept / legal-basis table (CSV)
    #[arg(short, long)]
    concepts: Option<PathBuf>,

    /// Engine config (JSON); defaults to $RGS_ENGINE_CONFIG or built-in tables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write output here instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Pretty-print JSON
    #[arg(long)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Full classification set, entity templates and warnings
    Classify {
        #[command(flatten)]
        inputs: Inputs,
    },

    /// One entity template or an ad hoc subset
    Template {
        #[command(flatten)]
        inputs: Inputs,

        /// Entity category: ZZP, EZ, BV or SVC (omit for an ad hoc subset)
        #[arg(short, long, value_parser = parse_entity)]
        entity: Option<EntityCategory>,

        /// Template name for ad hoc subsets
        #[arg(long, default_value = "custom")]
        name: String,

        /// Force a code into the template (repeatable)
        #[arg(long)]
        include: Vec<String>,

        /// Drop a code and its subtree (repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        /// Drop records deeper than this level
        #[arg(long)]
        max_level: Option<u8>,

        /// Keep Passive and Obsolete records
        #[arg(long)]
        include_inactive: bool,

        /// Drop records from the extended superset
        #[arg(long)]
        core_only: bool,
    },

    /// ERPNext chart-of-accounts template JSON
    Coa {
        #[command(flatten)]
        inputs: Inputs,

        /// Entity category; omit for the full chart
        #[arg(short, long, value_parser = parse_entity)]
        entity: Option<EntityCategory>,

        /// Chart name
        #[arg(long, default_value = "Nederlands RGS MKB")]
        name: String,

        /// Leave out balance_must_be
        #[arg(long)]
        no_balance: bool,
    },

    /// Processing report
    Report {
        #[command(flatten)]
        inputs: Inputs,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn parse_entity(value: &str) -> std::result::Result<EntityCategory, String> {
    EntityCategory::from_code(value).ok_or_else(|| format!("unknown entity category '{}' (expected ZZP, EZ, BV or SVC)", value))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "rgs_mkb=info".to_string()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Classify { inputs } => {
            let output = run(&inputs)?;
            write_json(&inputs, &output)?;
        }
        Commands::Template {
            inputs,
            entity,
            name,
            include,
            exclude,
            max_level,
            include_inactive,
            core_only,
        } => {
            let pipeline = Pipeline::new(load_config(&inputs)?);
            let output = run_with(&pipeline, &inputs)?;

            let mut request = match entity {
                Some(category) => TemplateRequest::for_entity(category),
                None => TemplateRequest::custom(name),
            };
            request.include.extend(include);
            request.exclude.extend(exclude);
            request.max_level = max_level;
            request.core_only = core_only;
            if include_inactive {
                request = request.include_inactive();
            }

            let (selection, warnings) = pipeline.select(&output.classifications, &request);
            eprintln!("📋 {} accounts selected; {}", selection.len(), warnings.summary());
            write_json(&inputs, &selection)?;
        }
        Commands::Coa {
            inputs,
            entity,
            name,
            no_balance,
        } => {
            let output = run(&inputs)?;
            let (chart_name, accounts) = match entity {
                Some(category) => {
                    let template = output
                        .template(category)
                        .with_context(|| format!("no template for {}", category))?;
                    (format!("{} - {}", name, category), template.accounts.clone())
                }
                None => (name, output.classifications.as_slice().to_vec()),
            };
            let options = ChartOptions {
                enforce_balance: !no_balance,
            };
            write_json(&inputs, &build_chart_with(&chart_name, &accounts, options))?;
        }
        Commands::Report { inputs, json } => {
            let output = run(&inputs)?;
            let report = ProcessingReport::build(&output).context("Failed to fingerprint classifications")?;
            if json {
                write_json(&inputs, &report)?;
            } else {
                write_text(&inputs, &report.to_string())?;
            }
        }
    }

    Ok(())
}

fn load_config(inputs: &Inputs) -> Result<EngineConfig> {
    match &inputs.config {
        Some(path) => EngineConfig::from_file(path),
        None => EngineConfig::from_env(),
    }
}

fn run(inputs: &Inputs) -> Result<PipelineOutput> {
    let pipeline = Pipeline::new(load_config(inputs)?);
    run_with(&pipeline, inputs)
}

fn run_with(pipeline: &Pipeline, inputs: &Inputs) -> Result<PipelineOutput> {
    let mut batches = vec![read_source(SourceKind::Canonical, &inputs.records)?];
    if let Some(specs) = &inputs.specs {
        batches.push(read_source(SourceKind::FieldSpecification, specs)?);
    }
    if let Some(concepts) = &inputs.concepts {
        batches.push(read_source(SourceKind::ConceptTable, concepts)?);
    }

    let output = pipeline.run(&batches)?;
    eprintln!("✅ {}", output.summary());
    Ok(output)
}

fn write_json<T: Serialize>(inputs: &Inputs, value: &T) -> Result<()> {
    let text = if inputs.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    write_text(inputs, &text)
}

fn write_text(inputs: &Inputs, text: &str) -> Result<()> {
    match &inputs.out {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))?;
            eprintln!("📤 Wrote {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
