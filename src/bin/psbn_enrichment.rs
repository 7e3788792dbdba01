/*
   Command line front-end of the enrichment pipeline.

   `run` loads a partially specified network, enumerates its instances, computes their
   attractors and writes the three enrichment tables (plus a JSON summary) into the output
   directory. Annotations come from the PANTHER web service, unless a local table is given.
   With `--term-hierarchy`, root and leaf terms of the results are resolved through QuickGO
   (or a local `parent  child` table).

   `fixed-points` only evaluates the instances and prints which combinations of fixed points
   occur in which instances.

   Logging is controlled through `RUST_LOG` (default `info`).
*/

use biodivine_psbn_enrichment::annotation::{
    GoAspect, OntologyService, PantherClient, QuickGoClient, StaticHierarchy, StaticOntology,
    TermHierarchy,
};
use biodivine_psbn_enrichment::config::PipelineConfig;
use biodivine_psbn_enrichment::engine::{FixedPointCombinations, SymbolicEngine};
use biodivine_psbn_enrichment::pipeline::Pipeline;
use biodivine_psbn_enrichment::EnrichmentError;
use clap::{Parser, Subcommand};
use log::error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "psbn-enrichment")]
#[command(about = "Attractor analysis and GO enrichment of partially specified Boolean networks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute enrichment tables of all instances of a model.
    Run {
        /// Model file (`.aeon`, `.bnet` or `.sbml`).
        model: PathBuf,
        /// TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output directory of the exported tables.
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Prefix of the exported files (default: model file name).
        #[arg(long)]
        name: Option<String>,
        /// NCBI taxon of the organism.
        #[arg(long)]
        organism: Option<String>,
        /// GO aspect: bp | mf | cc
        #[arg(long)]
        aspect: Option<GoAspect>,
        /// Tab separated `node  term  label` table used instead of PANTHER.
        #[arg(long)]
        annotations: Option<PathBuf>,
        /// Largest number of instances to enumerate.
        #[arg(long)]
        cap: Option<usize>,
        /// Number of instances evaluated in parallel.
        #[arg(long)]
        workers: Option<usize>,
        /// Resolve root and leaf terms of the results.
        #[arg(long)]
        term_hierarchy: bool,
        /// Tab separated `parent  child  relation` table used instead of QuickGO.
        #[arg(long)]
        hierarchy_table: Option<PathBuf>,
    },
    /// Group instances of a model by their fixed points.
    FixedPoints {
        model: PathBuf,
        #[arg(long)]
        cap: Option<usize>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            model,
            config,
            out,
            name,
            organism,
            aspect,
            annotations,
            cap,
            workers,
            term_hierarchy,
            hierarchy_table,
        } => {
            let config = config.map(PipelineConfig::from_toml_file).transpose();
            config.and_then(|config| {
                let mut config = config.unwrap_or_default();
                if let Some(organism) = organism {
                    config.annotation.organism = organism;
                }
                if let Some(aspect) = aspect {
                    config.annotation.aspect = aspect;
                }
                if annotations.is_some() {
                    config.annotation.table = annotations;
                }
                if cap.is_some() {
                    config.enumeration.cap = cap;
                }
                if let Some(workers) = workers {
                    config.evaluation.workers = workers;
                }
                if name.is_some() {
                    config.report.name = name;
                }
                if term_hierarchy || hierarchy_table.is_some() {
                    config.hierarchy.enabled = true;
                }
                if hierarchy_table.is_some() {
                    config.hierarchy.table = hierarchy_table;
                }
                run(&model, &out, config)
            })
        }
        Commands::FixedPoints { model, cap } => {
            let mut config = PipelineConfig::default();
            if cap.is_some() {
                config.enumeration.cap = cap;
            }
            fixed_points(&model, config)
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn model_name(path: &Path) -> String {
    path.file_stem()
        .map(|it| it.to_string_lossy().to_string())
        .unwrap_or_else(|| "model".to_string())
}

fn run(model: &Path, out: &Path, config: PipelineConfig) -> Result<(), EnrichmentError> {
    config.validate()?;
    let name = config.report.name.clone().unwrap_or_else(|| model_name(model));
    let engine = SymbolicEngine::try_from_file(model)?
        .with_max_states(config.evaluation.max_states_per_attractor);
    let handle = engine.model_handle(&model_name(model))?;

    let annotation = &config.annotation;
    let ontology: Box<dyn OntologyService> = match &annotation.table {
        Some(table) => Box::new(StaticOntology::from_tsv_file(table)?),
        None => Box::new(PantherClient::new(
            &annotation.endpoint,
            &annotation.organism,
            annotation.aspect,
            annotation.timeout(),
            annotation.requests_per_second,
        )?),
    };

    let settings = &config.hierarchy;
    let hierarchy: Option<Box<dyn TermHierarchy>> = match (settings.enabled, &settings.table) {
        (false, _) => None,
        (true, Some(table)) => Some(Box::new(StaticHierarchy::from_tsv_file(table)?)),
        (true, None) => Some(Box::new(QuickGoClient::new(
            &settings.endpoint,
            annotation.timeout(),
            settings.requests_per_second,
        )?)),
    };

    let mut pipeline = Pipeline::load(handle, &engine, ontology.as_ref(), config)?;
    if let Some(hierarchy) = &hierarchy {
        pipeline = pipeline.with_term_hierarchy(hierarchy.as_ref());
    }
    let run = pipeline.run()?;
    println!(
        "Evaluated {} of {} instances with {} attractors.",
        run.evaluations.len(),
        run.instances.len(),
        run.attractor_count()
    );
    println!("{}", run.diagnostics);
    let always_unmapped = run.results.always_unmapped();
    if !always_unmapped.is_empty() {
        let nodes: Vec<&str> = always_unmapped.iter().map(String::as_str).collect();
        println!("Nodes without terms in every instance: {}", nodes.join(", "));
    }
    for path in run.export(out, &name)? {
        println!("Written {}", path.display());
    }
    Ok(())
}

fn fixed_points(model: &Path, config: PipelineConfig) -> Result<(), EnrichmentError> {
    let engine = SymbolicEngine::try_from_file(model)?
        .with_max_states(config.evaluation.max_states_per_attractor);
    let handle = engine.model_handle(&model_name(model))?;
    let ontology = StaticOntology::new();
    let mut pipeline = Pipeline::load(handle, &engine, &ontology, config)?;
    pipeline.enumerate()?;
    pipeline.evaluate()?;
    let combinations = FixedPointCombinations::collect(pipeline.evaluations());
    println!(
        "{} instances evaluated, {} fixed-point combinations.",
        pipeline.evaluations().len(),
        combinations.len()
    );
    print!("{}", combinations);
    if !pipeline.diagnostics().failed_instances.is_empty() {
        println!("{}", pipeline.diagnostics());
    }
    Ok(())
}
