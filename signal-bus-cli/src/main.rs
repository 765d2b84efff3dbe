//! Signal Bus CLI Application
//!
//! A demonstration host for the signal-bus library. It loads a TOML
//! scenario describing a document tree, a set of signals to watch, and a
//! script of tree mutations and simulated native events; runs the binding
//! engine over it; and prints a report of every signal raise.

use anyhow::{bail, Context, Result};
use clap::Parser;
use signal_bus::{
    Action, BindingEngine, Document, ElementId, EngineConfig, SignalRegistry, Value,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

mod config;
mod report;

use config::{ElementConfig, Scenario, StepConfig};
use report::Report;

/// Signal Bus - replay declarative binding scenarios
#[derive(Parser, Debug)]
#[command(name = "signal-bus-cli")]
#[command(about = "Replay a document/event scenario against the signal bus", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the scenario file (scenario.toml)
    #[arg(value_name = "FILE")]
    scenario: PathBuf,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Signal Bus CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using signal-bus library v{}", signal_bus::VERSION);

    let scenario = config::load_scenario(&args.scenario)?;
    run_scenario(scenario)
}

/// Build the document, wire the reporters, replay the steps, print the report
fn run_scenario(scenario: Scenario) -> Result<()> {
    println!("═══════════════════════════════════════════════");
    println!("  Signal Bus - Scenario Replay");
    println!("═══════════════════════════════════════════════\n");

    let document = Rc::new(Document::new());
    let registry = Rc::new(SignalRegistry::new());
    let report = Rc::new(RefCell::new(Report::new()));

    // Scenario-local element names -> arena handles
    let mut names: HashMap<String, ElementId> = HashMap::new();
    names.insert("root".to_string(), document.root());

    // Build the initial tree, parents before children
    for element in &scenario.elements {
        build_element(&document, &mut names, element)?;
    }
    println!("✓ Document built: {} element(s)", scenario.elements.len());

    // Attach one reporting subscriber per watched signal
    for signal in &scenario.signals {
        let action: Action = {
            let report = Rc::clone(&report);
            let signal = signal.clone();
            Rc::new(move |_ctx, args| {
                log::info!(
                    "Signal {:?} raised with {} argument(s)",
                    signal,
                    args.len()
                );
                report.borrow_mut().record(signal.clone(), args.to_vec());
                Ok(())
            })
        };
        registry.add(signal, action)?;
    }
    println!("✓ Watching {} signal(s): {:?}", scenario.signals.len(), scenario.signals);

    let mut engine = BindingEngine::new(
        Rc::clone(&document),
        Rc::clone(&registry),
        EngineConfig::default(),
    );
    engine.on_ready(|| println!("✓ Initial scan complete, bindings live"));
    engine.init()?;

    // Replay the scripted steps
    for (idx, step) in scenario.steps.iter().enumerate() {
        apply_step(&document, &mut names, step)
            .with_context(|| format!("Step {} failed", idx + 1))?;
        let processed = engine.pump();
        log::debug!("Step {}: {} mutation record(s) processed", idx + 1, processed);
    }
    println!("✓ Replayed {} step(s)", scenario.steps.len());

    let engine_stats = engine.stats();
    let registry_stats = registry.stats();
    println!("\n📊 Final state:");
    println!("  Bindings:      {}", engine_stats.num_bindings);
    println!("  Listeners:     {}", engine_stats.num_listeners);
    println!("  Signals:       {}", registry_stats.num_signals);
    println!("  Subscriptions: {}", registry_stats.num_subscriptions);

    report.borrow().print_summary();
    Ok(())
}

/// Create one element from its config and attach it to its parent
fn build_element(
    document: &Rc<Document>,
    names: &mut HashMap<String, ElementId>,
    config: &ElementConfig,
) -> Result<ElementId> {
    if names.contains_key(&config.name) {
        bail!("Duplicate element name: {:?}", config.name);
    }
    let parent_name = config.parent.as_deref().unwrap_or("root");
    let Some(&parent) = names.get(parent_name) else {
        bail!(
            "Element {:?} references unknown parent {:?}",
            config.name,
            parent_name
        );
    };

    let element = document.create_element(config.tag.clone());
    for (attr, value) in &config.attributes {
        document.set_attribute(element, attr.as_str(), value.as_str())?;
    }
    document.append_child(parent, element)?;
    names.insert(config.name.clone(), element);
    Ok(element)
}

/// Apply one scripted step to the document
fn apply_step(
    document: &Rc<Document>,
    names: &mut HashMap<String, ElementId>,
    step: &StepConfig,
) -> Result<()> {
    match step {
        StepConfig::Dispatch {
            element,
            event,
            payload,
        } => {
            let el = resolve(names, element)?;
            let payload = match payload {
                Some(literal) => serde_json::from_str::<Value>(literal)
                    .with_context(|| format!("Invalid payload literal: {:?}", literal))?,
                None => Value::Null,
            };
            let fired = document.dispatch(el, event, &payload);
            log::info!(
                "Dispatched {:?} on {:?}: {} listener(s) ran",
                event,
                element,
                fired
            );
        }
        StepConfig::SetAttribute {
            element,
            attribute,
            value,
        } => {
            let el = resolve(names, element)?;
            document.set_attribute(el, attribute.as_str(), value.as_str())?;
        }
        StepConfig::RemoveAttribute { element, attribute } => {
            let el = resolve(names, element)?;
            document.remove_attribute(el, attribute)?;
        }
        StepConfig::AddElement { element } => {
            build_element(document, names, element)?;
        }
        StepConfig::RemoveElement { element } => {
            let el = resolve(names, element)?;
            document.remove(el)?;
        }
    }
    Ok(())
}

/// Look up a scenario-local element name
fn resolve(names: &HashMap<String, ElementId>, name: &str) -> Result<ElementId> {
    names
        .get(name)
        .copied()
        .ok_or_else(|| anyhow::anyhow!("Unknown element name: {:?}", name))
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
