//! # auto-locator
//!
//! Robust locator synthesis for browser automation: given one element of a page, produce CSS and XPath
//! expressions that select exactly that element and keep working after the page re-renders.
//!
//! ## Features
//!
//! - **Volatility filtering**: generated ids, framework classes, hashes and counters never end up in a locator
//! - **Text stabilization**: only the stable words of an element's text are used as anchors
//! - **Verified uniqueness**: every candidate is checked against the document (or a sandbox subtree)
//! - **Two-pass XPath**: a shallow pass, then a deep one, then positional disambiguation
//! - **Framework conventions**: grid/table, data-grid and data-attribute component libraries
//! - **Ranking**: test ids, roles, labels, placeholders and text before structural locators
//!
//! ## Pasted HTML
//!
//! ```rust
//! use auto_locator::dom::{DomTree, css};
//! use auto_locator::{SynthesisOptions, generate_locators};
//!
//! # fn main() -> auto_locator::Result<()> {
//! let tree = DomTree::parse_html("<form><input name='q'><button>Search</button></form>")?;
//! let button = css::select(&tree, "button")?[0];
//!
//! let locators = generate_locators(&tree, button, &SynthesisOptions::default())?;
//! assert_eq!(locators.xpath.expression, "//button[normalize-space(.)='Search']");
//! println!("{:?}", locators.best());
//! # Ok(())
//! # }
//! ```
//!
//! ## Live Pages
//!
//! ```rust,no_run
//! use auto_locator::{BrowserSession, InspectSession, LaunchOptions, SynthesisOptions};
//!
//! # fn main() -> auto_locator::Result<()> {
//! let session = BrowserSession::launch(LaunchOptions::default())?;
//! session.navigate("https://example.com")?;
//! session.wait_for_navigation()?;
//!
//! let doc = session.document()?;
//! let link = doc.find("a")?;
//!
//! let mut inspect = InspectSession::new(SynthesisOptions::default());
//! let locators = inspect.select(&doc, link)?;
//! println!("css: {}", locators.css.expression);
//! println!("best: {:?}", inspect.best());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`locator`]: the synthesizers, framework detectors and ranker
//! - [`dom`]: element tree, in-memory CSS/XPath evaluation and the [`Document`](dom::Document) seam
//! - [`browser`]: Chrome sessions and live page documents
//! - [`inspect`]: per-caller selection state with manual override
//! - [`bridge`]: request/response correlation over async channels (requires `bridge` feature)
//! - [`error`]: Error types and result aliases

pub mod browser;
pub mod dom;
pub mod error;
pub mod inspect;
pub mod locator;

#[cfg(feature = "bridge")]
pub mod bridge;

pub use browser::{BrowserSession, ConnectionOptions, LaunchOptions, LiveDocument};
pub use dom::{Context, Document, DomTree, ElementNode, ExpressionKind, NodeId};
pub use error::{LocatorError, Result};
pub use inspect::InspectSession;
pub use locator::{
    BestLocator, Candidate, Guarantee, LocatorSet, Strategy, SynthesisOptions, generate_locators,
    generate_locators_in,
};

#[cfg(feature = "bridge")]
pub use bridge::{Bridge, Envelope};
