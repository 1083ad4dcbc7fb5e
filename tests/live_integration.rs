use auto_locator::dom::{Context, Document, ExpressionKind};
use auto_locator::{BrowserSession, Guarantee, InspectSession, LaunchOptions, LiveDocument, SynthesisOptions};

fn open(session: &BrowserSession, html: &str) -> LiveDocument {
    session
        .navigate(&format!("data:text/html,{}", urlencoding::encode(html)))
        .expect("Failed to navigate");
    session.wait_for_navigation().expect("Navigation timeout");
    session.document().expect("Failed to capture page")
}

#[test]
#[ignore] // Requires Chrome to be installed
fn test_snapshot_extraction() {
    let session = BrowserSession::launch(LaunchOptions::new().headless(true)).expect("Failed to launch browser");
    let doc = open(&session, "<html><body><button id='test-btn'>Click me</button><a href='#'>Link</a></body></html>");

    let tree = doc.tree();
    assert!(tree.count_elements() > 0);
    assert!(tree.find_by_id("test-btn").is_some());

    let json = tree.to_json().expect("Failed to convert to JSON");
    assert!(json.contains("button"));
    assert!(json.contains("test-btn"));
}

#[test]
#[ignore]
fn test_live_locators_are_unique_in_page() {
    let session = BrowserSession::launch(LaunchOptions::new().headless(true)).expect("Failed to launch browser");
    let doc = open(
        &session,
        "<table><tr><td>2024-01-01</td><td><button>Open</button></td></tr>\
         <tr><td>2024-01-01</td><td><button>Open</button></td></tr></table>",
    );

    let buttons = doc.evaluate("button", Context::Document, ExpressionKind::Css).unwrap();
    assert_eq!(buttons.len(), 2);

    let mut inspect = InspectSession::new(SynthesisOptions::default());
    for button in buttons {
        let set = inspect.select(&doc, button).unwrap();
        assert_ne!(set.xpath.guarantee, Guarantee::BestEffort);
        let matches = doc.evaluate(&set.xpath.expression, Context::Document, ExpressionKind::Path).unwrap();
        assert_eq!(matches, vec![button]);
    }
}

#[test]
#[ignore]
fn test_refresh_picks_up_new_elements() {
    let session = BrowserSession::launch(LaunchOptions::new().headless(true)).expect("Failed to launch browser");
    let mut doc = open(&session, "<div id='list'><p>One</p></div>");

    doc.tab()
        .evaluate("document.getElementById('list').insertAdjacentHTML('beforeend', '<p>Two</p>')", false)
        .expect("Failed to mutate page");

    // Elements created after the snapshot are counted but not addressable
    assert_eq!(doc.evaluate("p", Context::Document, ExpressionKind::Css).unwrap().len(), 2);
    assert!(doc.find("p:last-child").is_err());

    doc.refresh().expect("Failed to refresh snapshot");
    let second = doc.find("p:last-child").unwrap();
    assert_eq!(doc.tree().text(second), "Two");
}
