use crate::config::{CteMode, load_config};
use crate::ir::LayoutRequest;
use crate::layout::{PlanLayout, compute_plan_layout};
use crate::layout_dump::{layout_dump_json, write_layout_dump};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pforest", version, about = "Query plan layout: tidy trees and CTE forests")]
pub struct Args {
    /// Layout request file (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the JSON layout. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config file (JSON5 or JSON)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// How CTE subtrees are arranged (overrides the config file)
    #[arg(short = 'm', long = "mode", value_enum)]
    pub mode: Option<ModeArg>,

    /// Print a one-line summary of the layout to stderr
    #[arg(short = 's', long = "summary")]
    pub summary: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Forest,
    Inline,
}

impl From<ModeArg> for CteMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Forest => CteMode::Forest,
            ModeArg::Inline => CteMode::Inline,
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    if let Some(mode) = args.mode {
        config.layout.cte_mode = mode.into();
    }

    let input = read_input(args.input.as_deref())?;
    let request = parse_request(&input)?;
    let layout = compute_plan_layout(&request.plan, &request.cte, &config.layout)?;

    if args.summary {
        eprintln!("{}", summarize(&layout));
    }

    match args.output.as_deref() {
        Some(path) => write_layout_dump(path, &layout)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", layout_dump_json(&layout)?),
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn parse_request(input: &str) -> Result<LayoutRequest> {
    if input.trim().is_empty() {
        return Err(anyhow::anyhow!("No layout request found in input"));
    }
    serde_json::from_str(input).context("invalid layout request")
}

fn summarize(layout: &PlanLayout) -> String {
    let nodes = layout.nodes().count();
    let ctes = layout
        .trees
        .iter()
        .filter(|tree| tree.cte_name.is_some())
        .count();
    let resolved = layout
        .reference_links
        .iter()
        .filter(|link| link.is_resolved())
        .count();
    let diagnostics = &layout.diagnostics;
    let mut out = format!(
        "{:?}: {} nodes, {} CTE trees in {} layers, {}/{} references resolved, {:.0}x{:.0}",
        layout.mode,
        nodes,
        ctes,
        layout.layers.len(),
        resolved,
        layout.reference_links.len(),
        layout.width,
        layout.height
    );
    if !diagnostics.unresolved_definitions.is_empty() {
        out.push_str(&format!(
            "; unresolved CTEs: {}",
            diagnostics.unresolved_definitions.join(", ")
        ));
    }
    if !diagnostics.cycle_fallback.is_empty() {
        out.push_str(&format!(
            "; cyclic CTEs: {}",
            diagnostics.cycle_fallback.join(", ")
        ));
    }
    if !diagnostics.residual_overlaps.is_empty() {
        out.push_str(&format!(
            "; {} overlapping groups",
            diagnostics.residual_overlaps.len()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;

    const REQUEST: &str = r#"{
        "plan": {
            "id": "n1", "operatorName": "Hash Join",
            "children": [
                {"id": "n2", "operatorName": "CTE Scan"},
                {"id": "n3", "operatorName": "Aggregate", "children": [
                    {"id": "n4", "operatorName": "Seq Scan"}
                ]}
            ]
        },
        "cte": {
            "definitions": [{"cteName": "totals", "rootNodeId": "n3"}],
            "references": [{"nodeId": "n2", "cteName": "totals", "targetCTENodeId": "n3"}]
        }
    }"#;

    #[test]
    fn parses_layout_requests() {
        let request = parse_request(REQUEST).unwrap();
        assert_eq!(request.plan.node_count(), 4);
        assert_eq!(request.cte.definitions.len(), 1);
    }

    #[test]
    fn cte_section_is_optional() {
        let request =
            parse_request(r#"{"plan": {"id": "a", "operatorName": "Result"}}"#).unwrap();
        assert!(request.cte.is_empty());
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(parse_request("  \n").is_err());
    }

    #[test]
    fn summary_mentions_ctes_and_references() {
        let request = parse_request(REQUEST).unwrap();
        let layout =
            compute_plan_layout(&request.plan, &request.cte, &LayoutConfig::default()).unwrap();
        let summary = summarize(&layout);
        assert!(summary.starts_with("Forest: 4 nodes, 1 CTE trees in 1 layers"));
        assert!(summary.contains("1/1 references resolved"));
    }

    #[test]
    fn mode_argument_maps_to_config() {
        assert_eq!(CteMode::from(ModeArg::Inline), CteMode::Inline);
        let args = Args::parse_from(["pforest", "-i", "plan.json", "--mode", "inline", "-s"]);
        assert_eq!(args.mode, Some(ModeArg::Inline));
        assert!(args.summary);
    }
}
