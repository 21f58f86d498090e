use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use futures::executor::block_on;
use log::{debug, error, info};
use rayon::prelude::*;
use scopeify_lib::{
    create_dom_tree, insert_css, to_html, ClassPolicy, FixedScopeMap, RunnerOptions, ScopeError,
    ScopeMap, ScopeRunner, ScopedStyles, Scopeify, ScopeifyConfig, ScopingEngine,
};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const SCOPEIFY_INTRO: &str = r#"
     ___  ___ ___  _ __   ___(_)/ _|_   _
    / __|/ __/ _ \| '_ \ / _ \ | |_| | | |
    \__ \ (_| (_) | |_) |  __/ |  _| |_| |
    |___/\___\___/| .__/ \___|_|_|  \__, |
                  |_|               |___/

    Scopes each document's <style> to that document.
"#;

#[derive(Parser)]
#[command(name = "scopeify")]
#[command(about = "Rewrite HTML documents so their CSS only applies to themselves")]
struct Args {
    /// HTML files to scope.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory the scoped documents are written to.
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,

    /// How matched classes are committed to elements.
    #[arg(long, value_enum, default_value_t = PolicyArg::MutateInPlace)]
    class_policy: PolicyArg,

    /// Use a pre-computed scope map (JSON) instead of generating one.
    #[arg(long)]
    scope_map: Option<PathBuf>,

    /// Fixed suffix for generated names.
    #[arg(long, conflicts_with = "scope_map")]
    suffix: Option<String>,

    /// Hex digits of the CSS hash used as suffix.
    #[arg(long, default_value_t = 6)]
    hash_length: usize,

    /// Go through the deferred runner.
    #[arg(long)]
    deferred: bool,

    /// Write `<name>.map.json` next to each scoped document.
    #[arg(long)]
    emit_map: bool,

    /// Do not put the scoped CSS back into the document.
    #[arg(long)]
    no_insert: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    MutateInPlace,
    ReplaceWholesale,
}

impl From<PolicyArg> for ClassPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::MutateInPlace => ClassPolicy::MutateInPlace,
            PolicyArg::ReplaceWholesale => ClassPolicy::ReplaceWholesale,
        }
    }
}

enum Engine {
    Generate(Scopeify),
    Fixed(FixedScopeMap),
}

impl ScopingEngine for Engine {
    fn scope(&self, css: &str) -> Result<ScopedStyles, ScopeError> {
        match self {
            Engine::Generate(engine) => engine.scope(css),
            Engine::Fixed(engine) => engine.scope(css),
        }
    }
}

fn load_engine(args: &Args) -> Result<Engine> {
    match &args.scope_map {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading scope map {}", path.display()))?;
            let map: ScopeMap = serde_json::from_str(&json)
                .with_context(|| format!("parsing scope map {}", path.display()))?;
            Ok(Engine::Fixed(FixedScopeMap::new(map)))
        }
        None => Ok(Engine::Generate(Scopeify::new(ScopeifyConfig {
            suffix: args.suffix.clone(),
            hash_length: args.hash_length,
        }))),
    }
}

/// Output path of every input. Inputs sharing a file name would overwrite each other.
fn output_paths(inputs: &[PathBuf], out_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut seen: HashMap<&std::ffi::OsStr, &Path> = HashMap::new();
    let mut outputs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let file_name = input
            .file_name()
            .with_context(|| format!("{} is not a file", input.display()))?;
        if let Some(previous) = seen.insert(file_name, input) {
            bail!(
                "{} and {} would both be written to {}",
                previous.display(),
                input.display(),
                out_dir.join(file_name).display()
            );
        }
        outputs.push(out_dir.join(file_name));
    }
    Ok(outputs)
}

fn process(input: &Path, output: &Path, args: &Args, engine: &Engine) -> Result<()> {
    let html = fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;

    let document = create_dom_tree(&html);
    let runner = ScopeRunner::with_options(
        engine,
        RunnerOptions {
            class_policy: args.class_policy.into(),
            ..Default::default()
        },
    );
    let scoped = if args.deferred {
        block_on(runner.run_deferred(&document))
    } else {
        runner.run(&document)
    }
    .with_context(|| format!("scoping {}", input.display()))?;

    let Some(scoped) = scoped else {
        info!("{}: no style, copied unchanged", input.display());
        fs::write(output, html).with_context(|| format!("writing {}", output.display()))?;
        return Ok(());
    };
    if scoped.map.is_empty() {
        info!("{}: style has no selectors to scope", input.display());
    } else {
        debug!("{} scope map:\n{}", input.display(), scoped.map);
    }

    if !args.no_insert && insert_css(&document, scoped.css(), None).is_none() {
        bail!("{} has no <head> to put the scoped css in", input.display());
    }
    let scoped_html = to_html(&document)
        .with_context(|| format!("serializing {}", input.display()))?;
    fs::write(output, scoped_html).with_context(|| format!("writing {}", output.display()))?;

    if args.emit_map {
        let stem = output
            .file_stem()
            .map(|stem| stem.to_string_lossy())
            .unwrap_or_default();
        let map_path = args.out_dir.join(format!("{stem}.map.json"));
        let json = serde_json::to_string_pretty(&scoped.map)?;
        fs::write(&map_path, json).with_context(|| format!("writing {}", map_path.display()))?;
    }
    info!("{} -> {}", input.display(), output.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("{}", SCOPEIFY_INTRO);

    let args = Args::parse();
    let engine = load_engine(&args)?;
    let outputs = output_paths(&args.inputs, &args.out_dir)?;
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    // One whole document per task; documents never leave the thread that parsed them.
    let failed = args
        .inputs
        .par_iter()
        .zip(outputs.par_iter())
        .map(|(input, output)| process(input, output, &args, &engine))
        .filter_map(Result::err)
        .inspect(|err| error!("{err:#}"))
        .count();

    if failed > 0 {
        bail!("{failed} of {} input(s) failed", args.inputs.len());
    }
    Ok(())
}
