//! Manual-exercise CLI: reads a JSON-encoded `MultiSourceSelect` from a file
//! or stdin, plans it, and prints the resulting join tree. Test scaffolding,
//! not a product surface — there is no server, wire format, or persisted
//! state owned by the planner core (§6).

use anyhow::{Context, Result};
use clap::Parser;
use joinplan::{plan, MultiSourceSelect, NullConsumerContext};
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "joinplan-cli", about = "Plan a multi-source select into a left-deep join tree")]
struct Cli {
    /// Path to a JSON-encoded MultiSourceSelect; reads stdin when omitted.
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Pretty-print the resulting tree.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let raw = match &cli.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading MultiSourceSelect from stdin")?;
            buf
        }
    };

    let mss: MultiSourceSelect = serde_json::from_str(&raw).context("parsing MultiSourceSelect JSON")?;

    let result = plan(mss, None, &NullConsumerContext).map_err(anyhow::Error::new)?;

    let output = if cli.pretty {
        serde_json::to_string_pretty(&plan_as_tree(&result))
    } else {
        serde_json::to_string(&plan_as_tree(&result))
    }
    .context("serializing planner output")?;

    println!("{output}");
    Ok(())
}

fn plan_as_tree(result: &joinplan::Plan) -> &joinplan::TwoTableJoin {
    match result {
        joinplan::Plan::Join(join) => join,
        joinplan::Plan::QueryThenFetch { join, .. } => join,
    }
}
