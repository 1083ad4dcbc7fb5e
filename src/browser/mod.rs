//! Live browser plumbing: launch or attach to Chrome and treat a tab's page
//! as a [`Document`](crate::dom::Document).

pub mod config;
pub mod live;
pub mod session;

pub use config::{ConnectionOptions, LaunchOptions};
pub use live::LiveDocument;
pub use session::BrowserSession;
