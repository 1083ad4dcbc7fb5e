use auto_locator::dom::{Context, Document, DomTree, ElementNode, ExpressionKind, NodeId, css};
use auto_locator::locator::FrameworkMatch;
use auto_locator::{BestLocator, Guarantee, LocatorError, SynthesisOptions, generate_locators, generate_locators_in};

const SAMPLE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Orders</title><script>window.boot = 1;</script></head>
<body>
  <header class="css-1q2w3e">
    <nav>
      <a href="/">Home</a>
      <a href="/orders">Orders</a>
      <a href="/settings" id="nav-settings">Settings</a>
    </nav>
    <span class="badge">4.1K followers</span>
  </header>
  <main id="content">
    <h1>Recent orders</h1>
    <form class="search">
      <label for="query">Search</label>
      <input id="query" name="q" placeholder="Order number">
      <select name="status"><option>Open</option><option>Closed</option></select>
      <button type="submit">Search</button>
    </form>
    <table class="orders">
      <thead><tr><th>Date</th><th>Customer</th><th>Action</th></tr></thead>
      <tbody>
        <tr><td>2024-01-01</td><td>Ann Lee</td><td><button>Open</button></td></tr>
        <tr><td>2024-01-01</td><td>Bob Stone</td><td><button>Open</button></td></tr>
        <tr><td>2024-02-17</td><td>Cara Diaz</td><td><button>Open</button></td></tr>
      </tbody>
    </table>
    <div class="card"><h2>Billing</h2><input type="text"><button>Save</button></div>
    <div class="card"><h2>Shipping</h2><input type="text"><button>Save</button></div>
    <ul><li>Alpha</li><li>Beta</li><li>Alpha</li></ul>
    <div id="ember4821" class="sc-bdVaJa"><span>Generated</span></div>
    <img src="/logo.png" alt="Company logo">
  </main>
  <footer><p>Contact us</p><button data-testid="feedback">Feedback</button></footer>
</body>
</html>"#;

fn sample() -> DomTree {
    DomTree::parse_html(SAMPLE_PAGE).expect("sample page parses")
}

fn select(tree: &DomTree, selector: &str) -> Vec<NodeId> {
    css::select(tree, selector).expect("valid selector")
}

fn first(tree: &DomTree, selector: &str) -> NodeId {
    select(tree, selector)[0]
}

fn assert_locators_match_only_their_element(tree: &DomTree, nodes: impl IntoIterator<Item = NodeId>) {
    let options = SynthesisOptions::default();

    for node in nodes {
        let set = generate_locators(tree, node, &options).unwrap();
        for candidate in [&set.css, &set.xpath] {
            if candidate.guarantee == Guarantee::BestEffort {
                continue;
            }
            let matches = tree.evaluate(&candidate.expression, Context::Document, candidate.syntax).unwrap();
            assert_eq!(
                matches,
                vec![node],
                "{} for <{}> node {} matched {:?}",
                candidate.expression,
                tree.tag(node),
                node,
                matches
            );
        }
    }
}

#[test]
fn test_every_guaranteed_locator_matches_only_its_element() {
    let tree = sample();
    assert_locators_match_only_their_element(&tree, tree.ids());
}

#[test]
fn test_attribute_only_css_segment_is_unique() {
    let tree = DomTree::parse_html("<div><button aria-label=\"Close dialog\">x</button><button>y</button></div>").unwrap();
    let close = first(&tree, "button");

    let set = generate_locators(&tree, close, &SynthesisOptions::default()).unwrap();
    assert_eq!(set.css.expression, "button[aria-label=\"Close dialog\"]");
    assert_eq!(set.css.guarantee, Guarantee::Unique);
    assert_locators_match_only_their_element(&tree, tree.ids());
}

#[test]
fn test_non_ascii_and_non_breaking_space_text() {
    let tree = DomTree::parse_html(
        "<div><button>Save&nbsp;now</button><button>Save now</button><button>Grüße</button><button>Hello</button></div>",
    )
    .unwrap();
    let buttons = select(&tree, "button");
    let options = SynthesisOptions::default();

    let nbsp = generate_locators(&tree, buttons[0], &options).unwrap();
    let plain = generate_locators(&tree, buttons[1], &options).unwrap();
    assert!(nbsp.xpath.expression.contains('\u{a0}'), "{}", nbsp.xpath.expression);
    assert_ne!(nbsp.xpath.expression, plain.xpath.expression);

    let greeting = generate_locators(&tree, buttons[2], &options).unwrap();
    assert_eq!(greeting.xpath.expression, "//button[normalize-space(.)='Grüße']");
    assert_eq!(greeting.xpath.guarantee, Guarantee::Unique);

    assert_locators_match_only_their_element(&tree, tree.ids());
}

#[test]
fn test_deeply_nested_target() {
    let depth = 10_000;
    let html = format!(
        "{}<button data-testid=\"deep-save\">Save</button><span>Other</span>{}",
        "<div>".repeat(depth),
        "</div>".repeat(depth)
    );
    let tree = DomTree::parse_html(&html).unwrap();
    let button = first(&tree, "button");
    assert_eq!(tree.ancestors(button).count(), depth + 1);

    let set = generate_locators(&tree, button, &SynthesisOptions::default()).unwrap();
    assert_eq!(set.css.expression, "button[data-testid=\"deep-save\"]");
    assert_eq!(set.css.guarantee, Guarantee::Unique);
    assert_eq!(
        set.best(),
        BestLocator::TestId { attribute: "data-testid".to_string(), value: "deep-save".to_string() }
    );
    assert_locators_match_only_their_element(&tree, [button, first(&tree, "span")]);
}

#[test]
fn test_id_shortcut() {
    let tree = sample();
    let input = first(&tree, "input[name='q']");

    let set = generate_locators(&tree, input, &SynthesisOptions::default()).unwrap();
    assert_eq!(set.css.expression, "#query");
    assert_eq!(set.css.guarantee, Guarantee::Unique);
    assert_eq!(set.xpath.expression, "//*[@id='query']");
    assert_eq!(set.by_label.as_deref(), Some("Search"));
    assert_eq!(set.by_placeholder.as_deref(), Some("Order number"));
    assert_eq!(set.best(), BestLocator::Label { value: "Search".to_string() });
}

#[test]
fn test_volatile_id_is_not_used() {
    let tree = sample();
    let span = first(&tree, "div.sc-bdVaJa > span");
    let set = generate_locators(&tree, span, &SynthesisOptions::default()).unwrap();

    for expression in [&set.css.expression, &set.xpath.expression] {
        assert!(!expression.contains("ember4821"), "{}", expression);
        assert!(!expression.contains("sc-bdVaJa"), "{}", expression);
    }
    assert_eq!(set.xpath.expression, "//span[normalize-space(.)='Generated']");
}

#[test]
fn test_submit_text_anchor() {
    let tree = DomTree::parse_html("<div><button>Submit</button><button>Cancel</button></div>").unwrap();
    let submit = first(&tree, "button");

    let set = generate_locators(&tree, submit, &SynthesisOptions::default()).unwrap();
    assert_eq!(set.xpath.expression, "//button[normalize-space(.)='Submit']");
    assert_eq!(set.xpath.guarantee, Guarantee::Unique);
    assert_eq!(set.best(), BestLocator::Role { role: "button".to_string(), name: "Submit".to_string() });
}

#[test]
fn test_identical_dates_get_distinct_indexed_locators() {
    let tree = sample();
    let cells: Vec<NodeId> = tree.ids().filter(|n| tree.tag(*n) == "td" && tree.text(*n) == "2024-01-01").collect();
    assert_eq!(cells.len(), 2);

    let options = SynthesisOptions::default();
    let first = generate_locators(&tree, cells[0], &options).unwrap();
    let second = generate_locators(&tree, cells[1], &options).unwrap();

    assert_ne!(first.xpath.expression, second.xpath.expression);
    for (set, cell) in [(&first, cells[0]), (&second, cells[1])] {
        assert_ne!(set.xpath.guarantee, Guarantee::BestEffort);
        let matches = tree.evaluate(&set.xpath.expression, Context::Document, ExpressionKind::Path).unwrap();
        assert_eq!(matches, vec![cell]);
    }
    assert_eq!(first.by_text, None);
}

#[test]
fn test_metric_token_never_anchors() {
    let tree = sample();
    let badge = first(&tree, "span.badge");

    let set = generate_locators(&tree, badge, &SynthesisOptions::default()).unwrap();
    assert!(!set.xpath.expression.contains("4.1K"), "{}", set.xpath.expression);
    assert!(set.xpath.expression.contains("followers"), "{}", set.xpath.expression);
    assert!(set.xpath.is_unique());
    assert_eq!(set.by_text, None);
}

#[test]
fn test_repeated_buttons_stay_distinguishable() {
    let tree = sample();
    let saves: Vec<NodeId> = select(&tree, "div.card > button");
    let options = SynthesisOptions::default();

    let billing = generate_locators(&tree, saves[0], &options).unwrap();
    let shipping = generate_locators(&tree, saves[1], &options).unwrap();

    assert_ne!(billing.xpath.expression, shipping.xpath.expression);
    assert_ne!(billing.css.expression, shipping.css.expression);
    for (set, button) in [(&billing, saves[0]), (&shipping, saves[1])] {
        assert!(set.xpath.is_unique());
        let matches = tree.evaluate(&set.xpath.expression, Context::Document, ExpressionKind::Path).unwrap();
        assert_eq!(matches, vec![button]);
    }
}

#[test]
fn test_test_id_ranks_first() {
    let tree = sample();
    let feedback = first(&tree, "footer button");

    let set = generate_locators(&tree, feedback, &SynthesisOptions::default()).unwrap();
    assert_eq!(
        set.best(),
        BestLocator::TestId { attribute: "data-testid".to_string(), value: "feedback".to_string() }
    );
}

#[test]
fn test_resynthesis_is_idempotent() {
    let options = SynthesisOptions::default();
    let tree = sample();
    let fresh = sample();

    for selector in ["li", "td", "div.card input", "nav a"] {
        for node in select(&tree, selector) {
            let once = generate_locators(&tree, node, &options).unwrap();
            let again = generate_locators(&tree, node, &options).unwrap();
            let reparsed = generate_locators(&fresh, node, &options).unwrap();
            assert_eq!(once, again);
            assert_eq!(once, reparsed);
        }
    }
}

#[test]
fn test_sandbox_counts_only_inside_fragment() {
    let tree = DomTree::parse_html(
        "<section id='app'><button>Save</button></section><section id='preview'><button>Save</button></section>",
    )
    .unwrap();
    let preview = tree.find_by_id("preview").unwrap();
    let target = first(&tree, "#preview button");

    let set = generate_locators_in(&tree, target, Context::Sandbox(preview), &SynthesisOptions::default()).unwrap();
    assert_eq!(set.xpath.expression, "//button[normalize-space(.)='Save']");
    assert_eq!(set.xpath.guarantee, Guarantee::Unique);

    let whole = generate_locators(&tree, target, &SynthesisOptions::default()).unwrap();
    assert_ne!(whole.xpath.expression, set.xpath.expression);
}

#[test]
fn test_node_outside_sandbox_is_rejected() {
    let tree = DomTree::parse_html("<div id='a'><p>x</p></div><div id='b'><p>y</p></div>").unwrap();
    let a = tree.find_by_id("a").unwrap();
    let outside = first(&tree, "#b p");

    let result = generate_locators_in(&tree, outside, Context::Sandbox(a), &SynthesisOptions::default());
    assert!(matches!(result, Err(LocatorError::ElementNotFound(_))));
}

#[test]
fn test_frame_boundary() {
    let frame_document = ElementNode::new("html").with_child(
        ElementNode::new("body").with_child(ElementNode::new("button").with_text("Save")),
    );
    let root = ElementNode::new("html").with_child(
        ElementNode::new("body")
            .with_child(ElementNode::new("button").with_text("Save"))
            .with_child(
                ElementNode::new("iframe")
                    .with_attribute("id", "editor")
                    .with_attribute("src", "/editor.html")
                    .with_child(frame_document),
            ),
    );
    let tree = DomTree::new(root);
    let buttons = select(&tree, "button");
    assert_eq!(buttons.len(), 2);

    let set = generate_locators(&tree, buttons[1], &SynthesisOptions::default()).unwrap();
    let frame = set.frame.expect("target is inside a frame");
    assert_eq!(frame.tag, "iframe");
    assert_eq!(frame.src.as_deref(), Some("/editor.html"));
    assert_eq!(frame.selector.expression, "#editor");
    assert_eq!(set.xpath.expression, "//button[normalize-space(.)='Save']");
    assert!(set.xpath.is_unique());

    let outer = generate_locators(&tree, buttons[0], &SynthesisOptions::default()).unwrap();
    assert!(outer.frame.is_none());
}

#[test]
fn test_hex_row_id_never_reaches_framework_output() {
    let tree = DomTree::parse_html(
        "<div class='ag-root-wrapper' id='reports'>\
         <div role='row' row-id='9f8e7d6c5b4a'><div role='gridcell' col-id='name'>Quarterly report</div></div>\
         <div role='row' row-id='0a1b2c3d4e5f'><div role='gridcell' col-id='name'>Annual summary</div></div>\
         </div>",
    )
    .unwrap();
    let cell = first(&tree, "[role='gridcell']");

    let set = generate_locators(&tree, cell, &SynthesisOptions::default()).unwrap();
    let frameworks = serde_json::to_string(&set.frameworks).unwrap();
    assert!(!frameworks.contains("9f8e7d6c5b4a"));
    assert!(matches!(set.framework(), Some(FrameworkMatch::DataGrid(_))));
    assert!(!set.css.expression.contains("9f8e7d6c5b4a"));
    assert!(!set.xpath.expression.contains("9f8e7d6c5b4a"));
}

#[test]
fn test_detached_node() {
    let tree = DomTree::parse_html("<p>x</p>").unwrap();
    let result = generate_locators(&tree, NodeId(10_000), &SynthesisOptions::default());
    assert!(matches!(result, Err(LocatorError::DetachedNode(10_000))));
}

#[test]
fn test_locator_set_json() {
    let tree = sample();
    let img = first(&tree, "img");
    let set = generate_locators(&tree, img, &SynthesisOptions::default()).unwrap();

    let json = serde_json::to_value(&set).unwrap();
    assert_eq!(json["tag"], "img");
    assert_eq!(json["by_alt_text"], "Company logo");
    assert_eq!(json["xpath"]["syntax"], "xpath");
    assert!(json["css"]["strength"].is_string());
    assert_eq!(json["action"], "click");
    assert!(json["snapshot"].as_str().unwrap().starts_with("<img"));

    let best = serde_json::to_value(set.best()).unwrap();
    assert!(best["method"].is_string());
}

#[test]
fn test_options_file_tightens_search() {
    let options = SynthesisOptions::from_json(r#"{"fast_depth": 2, "deep_depth": 4, "policy": "lenient"}"#).unwrap();
    assert_eq!((options.fast_depth, options.deep_depth), (2, 4));

    let tree = sample();
    let td = first(&tree, "td");
    let set = generate_locators(&tree, td, &options).unwrap();
    if set.xpath.guarantee != Guarantee::BestEffort {
        let matches = tree.evaluate(&set.xpath.expression, Context::Document, ExpressionKind::Path).unwrap();
        assert_eq!(matches, vec![td]);
    }
}
