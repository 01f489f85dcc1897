//! Tree command - depth-limited folder listing.

use anyhow::Result;
use clap::Args;
use console::Style;
use quire_workspace::{TreeNode, TreeQuery};

use super::{Context, print_json, resolve_folder};

/// Arguments for the tree command.
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Folder to list (default: the root)
    pub path: Option<String>,

    /// Levels of nesting to show
    #[arg(short, long)]
    pub depth: Option<usize>,
}

/// Run the tree command.
pub fn run(args: TreeArgs, ctx: &Context) -> Result<()> {
    let store = ctx.open_store()?;
    let parent = resolve_folder(&store, ctx, args.path.as_deref())?;
    let query = TreeQuery {
        parent_id: parent.map(|p| p.id),
        depth: args.depth,
    };
    let forest = store.list_tree(&ctx.tenant, &query)?;

    if ctx.json_output {
        return print_json(&forest);
    }

    if forest.is_empty() {
        println!("{}", Style::new().dim().apply_to("(empty)"));
        return Ok(());
    }
    for node in &forest {
        print_node(node, 0, ctx.verbose);
    }
    Ok(())
}

fn print_node(tree: &TreeNode, indent: usize, verbose: bool) {
    let dim = Style::new().dim();
    let blue = Style::new().blue().bold();
    let pad = "  ".repeat(indent);

    let label = if tree.node.is_folder() {
        format!("{}/", blue.apply_to(&tree.node.slug))
    } else {
        tree.node.slug.clone()
    };
    if verbose {
        println!("{pad}{label}  {}", dim.apply_to(&tree.node.id));
    } else {
        println!("{pad}{label}");
    }
    for child in &tree.children {
        print_node(child, indent + 1, verbose);
    }
}
