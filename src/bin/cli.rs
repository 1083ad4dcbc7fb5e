//! auto-locator command line
//!
//! Picks an element in a saved HTML file or a live page and prints every
//! locator computed for it, plus the ranked best one, as JSON.

use anyhow::{Context as _, Result, bail};
use auto_locator::browser::{BrowserSession, ConnectionOptions, LaunchOptions};
use auto_locator::dom::{Document, DomTree, NodeId, css};
use auto_locator::{InspectSession, SynthesisOptions};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "auto-locator")]
#[command(version)]
#[command(about = "Generate robust CSS/XPath locators for a page element", long_about = None)]
struct Cli {
    /// Synthesis options as a JSON file
    #[arg(long, global = true, value_name = "FILE")]
    options: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print compact JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect an element of an HTML file
    Html {
        file: PathBuf,

        /// CSS selector of the element to inspect (first match)
        #[arg(long, short)]
        target: String,

        /// Count matches inside the parsed fragment only
        #[arg(long)]
        sandbox: bool,
    },
    /// Inspect an element of a live page
    Url {
        url: String,

        /// CSS selector of the element to inspect (first match)
        #[arg(long, short)]
        target: String,

        /// Launch browser in headed mode (default: headless)
        #[arg(long, short = 'H')]
        headed: bool,

        /// Path to custom browser executable
        #[arg(long, value_name = "PATH")]
        executable_path: Option<PathBuf>,

        /// WebSocket endpoint of an already running browser
        #[arg(long, value_name = "URL")]
        ws_endpoint: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let options = match &cli.options {
        Some(path) => load_options(path)?,
        None => SynthesisOptions::default(),
    };

    let report = match cli.command {
        Command::Html { file, target, sandbox } => {
            let html = std::fs::read_to_string(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let tree = DomTree::parse_html(&html)?;
            let node = first_match(&tree, &target)?;

            let mut session = InspectSession::new(options);
            if sandbox {
                session = session.sandbox(tree.root_id());
            }
            inspect(&mut session, &tree, node)?
        }
        Command::Url { url, target, headed, executable_path, ws_endpoint } => {
            let browser = match ws_endpoint {
                Some(endpoint) => BrowserSession::connect(ConnectionOptions::new(endpoint))?,
                None => {
                    let mut launch = LaunchOptions::new().headless(!headed);
                    if let Some(path) = executable_path {
                        launch = launch.chrome_path(path);
                    }
                    BrowserSession::launch(launch)?
                }
            };
            browser.navigate(&url)?;
            browser.wait_for_navigation()?;

            let doc = browser.document()?;
            let node = doc.find(&target)?;
            inspect(&mut InspectSession::new(options), &doc, node)?
        }
    };

    let output = if cli.compact { serde_json::to_string(&report)? } else { serde_json::to_string_pretty(&report)? };
    println!("{}", output);
    Ok(())
}

fn load_options(path: &Path) -> Result<SynthesisOptions> {
    let json = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    SynthesisOptions::from_json(&json).with_context(|| format!("Invalid options in {}", path.display()))
}

fn first_match(tree: &DomTree, selector: &str) -> Result<NodeId> {
    match css::select(tree, selector)?.first() {
        Some(node) => Ok(*node),
        None => bail!("No element matches '{}'", selector),
    }
}

fn inspect<D: Document + ?Sized>(session: &mut InspectSession, doc: &D, node: NodeId) -> Result<serde_json::Value> {
    let locators = serde_json::to_value(session.select(doc, node)?)?;
    let best = session.best().context("No element selected")?;
    if best.is_approximate() {
        log::warn!("No unique locator found; the best candidate may match several elements");
    }

    Ok(serde_json::json!({
        "best": best,
        "locators": locators,
    }))
}
