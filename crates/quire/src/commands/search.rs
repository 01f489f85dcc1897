//! Search command - keyword search over the workspace.

use anyhow::Result;
use clap::{Args, ValueEnum};
use console::{Style, style};
use quire_workspace::{NodeKind, SearchFacade, SearchQuery};

use super::{Context, print_json, truncate};

/// Arguments for the search command.
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Maximum hits to show
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Hits to skip
    #[arg(long, default_value = "0")]
    pub offset: usize,

    /// Only match this kind of node
    #[arg(long)]
    pub kind: Option<KindArg>,

    /// Only match beneath this folder path
    #[arg(long)]
    pub under: Option<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum KindArg {
    File,
    Folder,
}

impl From<KindArg> for NodeKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::File => NodeKind::File,
            KindArg::Folder => NodeKind::Folder,
        }
    }
}

/// Run the search command.
pub fn run(args: SearchArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let facade = SearchFacade::over_store(&store);
    let query = SearchQuery {
        text: args.query.clone(),
        kind: args.kind.map(NodeKind::from),
        path_prefix: args.under,
        limit: args
            .limit
            .unwrap_or(store.settings().search.default_limit),
        offset: args.offset,
    };
    let results = facade.run(&ctx.tenant, query)?;

    if ctx.json_output {
        return print_json(&results);
    }

    let dim = Style::new().dim();
    println!(
        "{} {}",
        style(format!("Results for \"{}\"", args.query)).bold(),
        dim.apply_to(format!("({} total)", results.total))
    );
    println!("{}", dim.apply_to("─".repeat(50)));
    if results.items.is_empty() {
        println!("{}", dim.apply_to("No matches"));
    }
    for hit in &results.items {
        let suffix = if hit.node.is_folder() { "/" } else { "" };
        println!("{}{}", hit.node.path, suffix);
        if let Some(snippet) = &hit.snippet {
            println!("  {}", dim.apply_to(truncate(snippet, 80)));
        }
    }
    Ok(())
}
