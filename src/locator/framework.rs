//! Detectors for component libraries with their own addressing conventions.
//!
//! Each detector inspects the target and its ancestor chain and, when it
//! recognizes a component, returns a typed descriptor with ready-made
//! selectors. Detectors never check uniqueness.

use crate::dom::{DomTree, NodeData, NodeId};
use crate::locator::volatility::{VolatilityPolicy, is_volatile_with};
use crate::locator::{css_escape, css_string, stabilize};
use serde::{Deserialize, Serialize};

/// Front-end framework the page was rendered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frontend {
    Angular,
    React,
    Vue,
    #[default]
    Unknown,
}

/// Guess the rendering framework from attribute fingerprints
pub fn detect_frontend(tree: &DomTree) -> Frontend {
    let names = || tree.ids().flat_map(|n| tree.node(n).attributes.keys());
    if names().any(|a| a == "ng-version" || a == "ng-app" || a.starts_with("_ngcontent") || a.starts_with("_nghost")) {
        Frontend::Angular
    } else if names().any(|a| a == "data-reactroot" || a == "data-react-root" || a == "data-reactid") {
        Frontend::React
    } else if names().any(|a| a.starts_with("data-v-")) {
        Frontend::Vue
    } else {
        Frontend::Unknown
    }
}

/// Descriptor produced by one of the detectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "convention", rename_all = "snake_case")]
pub enum FrameworkMatch {
    GridTable(GridTableMatch),
    DataGrid(DataGridMatch),
    ComponentAttribute(ComponentMatch),
}

impl FrameworkMatch {
    /// Element the descriptor was anchored on
    pub fn anchor(&self) -> NodeId {
        match self {
            Self::GridTable(m) => m.anchor,
            Self::DataGrid(m) => m.anchor,
            Self::ComponentAttribute(m) => m.anchor,
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            Self::GridTable(m) => m.selector.as_deref(),
            Self::DataGrid(m) => m.selector.as_deref(),
            Self::ComponentAttribute(m) => m.selector.as_deref(),
        }
    }
}

pub trait FrameworkDetector {
    fn detect(&self, tree: &DomTree, node: NodeId) -> Option<FrameworkMatch>;
}

/// Run every detector; the innermost match comes first
pub fn detect_all(tree: &DomTree, node: NodeId, policy: VolatilityPolicy) -> Vec<FrameworkMatch> {
    let detectors: [&dyn FrameworkDetector; 3] =
        [&GridTableDetector { policy }, &DataGridDetector { policy }, &ComponentAttributeDetector { policy }];
    let mut matches: Vec<FrameworkMatch> = detectors.iter().filter_map(|d| d.detect(tree, node)).collect();
    // Stable sort keeps detector order among equal anchors
    matches.sort_by(|a, b| b.anchor().cmp(&a.anchor()));
    matches
}

/// The match anchored closest to the target
pub fn most_specific(matches: &[FrameworkMatch]) -> Option<&FrameworkMatch> {
    matches.iter().reduce(|best, m| if m.anchor() > best.anchor() { m } else { best })
}

fn stable_attr<'t>(tree: &'t DomTree, node: NodeId, name: &str, policy: VolatilityPolicy) -> Option<&'t str> {
    tree.attr_nonempty(node, name).filter(|v| !is_volatile_with(v, policy))
}

/// Stable phrase for a text selector: the stabilized segment, or the whole
/// text when it is stable as is
fn text_phrase(text: &str, policy: VolatilityPolicy) -> Option<String> {
    stabilize(text).or_else(|| (!text.is_empty() && !is_volatile_with(text, policy)).then(|| text.to_string()))
}

fn within(tree: &DomTree, node: Option<NodeId>, scope: NodeId) -> Option<NodeId> {
    node.filter(|n| *n == scope || tree.is_descendant_of(*n, scope))
}

fn scoped(scope: Option<&str>, selector: &str) -> String {
    match scope {
        Some(scope) => format!("{} {}", scope, selector),
        None => selector.to_string(),
    }
}

fn marker_class<'n>(data: &'n NodeData, prefixes: &[&str]) -> Option<&'n str> {
    data.classes().find(|c| prefixes.iter().any(|p| c.starts_with(p)))
}

// --- Grid/table widget library (dx-*) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridTableKind {
    Button,
    TextBox,
    SelectBox,
    DataGrid,
    Form,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridTableMatch {
    pub anchor: NodeId,
    pub kind: GridTableKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl GridTableMatch {
    fn new(anchor: NodeId, kind: GridTableKind) -> Self {
        Self {
            anchor,
            kind,
            component_id: None,
            text: None,
            placeholder: None,
            row_index: None,
            cell_index: None,
            row_selector: None,
            cell_selector: None,
            selector: None,
        }
    }
}

pub struct GridTableDetector {
    pub policy: VolatilityPolicy,
}

impl GridTableDetector {
    /// Widget kind named by the element's classes.
    ///
    /// `exact` requires whole class tokens; otherwise the widget classes may
    /// appear inside longer tokens, as in `[class*="dx-textbox"]`. Buttons
    /// always need the exact token so their inner parts do not anchor.
    fn kind_of(data: &NodeData, exact: bool) -> Option<GridTableKind> {
        let has = |class: &str| data.classes().any(|c| if exact { c == class } else { c.contains(class) });
        if data.has_class("dx-button") {
            Some(GridTableKind::Button)
        } else if has("dx-selectbox") {
            Some(GridTableKind::SelectBox)
        } else if has("dx-textbox") {
            Some(GridTableKind::TextBox)
        } else if has("dx-datagrid") {
            Some(GridTableKind::DataGrid)
        } else if has("dx-form") {
            Some(GridTableKind::Form)
        } else {
            None
        }
    }

    /// `[data-component-id]` first, then `id`, as a selector suffix
    fn identity(&self, tree: &DomTree, node: NodeId) -> Option<(String, String)> {
        if let Some(id) = stable_attr(tree, node, "data-component-id", self.policy) {
            Some((id.to_string(), format!("[data-component-id={}]", css_string(id))))
        } else {
            stable_attr(tree, node, "id", self.policy).map(|id| (id.to_string(), format!("#{}", css_escape(id))))
        }
    }

    fn button(&self, tree: &DomTree, component: NodeId) -> GridTableMatch {
        let mut found = GridTableMatch::new(component, GridTableKind::Button);
        found.text = text_phrase(tree.text(component), self.policy);
        if let Some((id, suffix)) = self.identity(tree, component) {
            found.component_id = Some(id);
            found.selector = Some(format!(".dx-button{}", suffix));
        } else if let Some(text) = &found.text {
            found.selector = Some(format!(".dx-button:contains({})", css_string(text)));
        }
        found
    }

    fn text_box(&self, tree: &DomTree, node: NodeId, component: NodeId) -> GridTableMatch {
        let mut found = GridTableMatch::new(component, GridTableKind::TextBox);
        let input = if tree.tag(node) == "input" {
            Some(node)
        } else {
            tree.descendants(component).find(|n| tree.tag(*n) == "input")
        };

        if let Some((id, suffix)) = input.and_then(|i| self.identity(tree, i)) {
            found.component_id = Some(id);
            found.selector = Some(format!("input{}", suffix));
        } else if let Some((id, suffix)) = self.identity(tree, component) {
            found.component_id = Some(id);
            found.selector = Some(format!("{}{} input", class_selector(tree, component, "dx-textbox"), suffix));
        }

        found.placeholder = input.and_then(|i| tree.attr_nonempty(i, "placeholder")).map(str::to_string);
        if found.selector.is_none() {
            let scope = class_selector(tree, component, "dx-textbox");
            found.selector = found.placeholder.as_ref().map(|p| format!("{} input[placeholder={}]", scope, css_string(p)));
        }
        found
    }

    fn data_grid(&self, tree: &DomTree, node: NodeId, grid: NodeId) -> GridTableMatch {
        let mut found = GridTableMatch::new(grid, GridTableKind::DataGrid);
        let identity = self.identity(tree, grid);
        let scope = format!(
            "{}{}",
            class_selector(tree, grid, "dx-datagrid"),
            identity.as_ref().map_or("", |(_, suffix)| suffix.as_str())
        );
        found.component_id = identity.map(|(id, _)| id);

        if let Some(row) = within(tree, tree.closest(node, |d| d.classes().any(|c| c.contains("dx-row"))), grid) {
            let row_index = tree.child_index(row);
            let row_selector = format!("{} {}:nth-child({})", scope, class_selector(tree, row, "dx-row"), row_index);

            let cell = std::iter::once(node).chain(tree.ancestors(node)).find(|n| tree.parent(*n) == Some(row));
            if let Some(cell) = cell {
                let cell_index = tree.child_index(cell);
                found.cell_index = Some(cell_index);
                found.cell_selector = Some(format!("{} > {}:nth-child({})", row_selector, tree.tag(cell), cell_index));
                found.text = text_phrase(tree.text(cell), self.policy);
            }

            found.anchor = cell.unwrap_or(row);
            found.row_index = Some(row_index);
            found.row_selector = Some(row_selector);
        }

        found.selector = found.cell_selector.clone().or_else(|| found.row_selector.clone()).or(Some(scope));
        found
    }

    fn suffixed(&self, tree: &DomTree, component: NodeId, kind: GridTableKind, class: &str) -> GridTableMatch {
        let mut found = GridTableMatch::new(component, kind);
        if let Some((id, suffix)) = self.identity(tree, component) {
            found.component_id = Some(id);
            found.selector = Some(format!("{}{}", class_selector(tree, component, class), suffix));
        }
        found
    }
}

/// `.class` when the token is present, else a `[class*=...]` substring match
fn class_selector(tree: &DomTree, node: NodeId, class: &str) -> String {
    if tree.node(node).has_class(class) { format!(".{}", class) } else { format!("[class*={}]", css_string(class)) }
}

impl FrameworkDetector for GridTableDetector {
    fn detect(&self, tree: &DomTree, node: NodeId) -> Option<FrameworkMatch> {
        let nearest = |exact: bool| {
            std::iter::once(node).chain(tree.ancestors(node)).find_map(|n| Self::kind_of(tree.node(n), exact).map(|k| (n, k)))
        };
        let (component, kind) = nearest(true).or_else(|| nearest(false))?;

        let found = match kind {
            GridTableKind::Button => self.button(tree, component),
            GridTableKind::TextBox => self.text_box(tree, node, component),
            GridTableKind::SelectBox => self.suffixed(tree, component, kind, "dx-selectbox"),
            GridTableKind::DataGrid => self.data_grid(tree, node, component),
            GridTableKind::Form => self.suffixed(tree, component, kind, "dx-form"),
        };
        log::debug!("Grid/table widget {:?} around node {}", found.kind, node);
        Some(FrameworkMatch::GridTable(found))
    }
}

// --- Data grid library (ag-*) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataGridKind {
    Grid,
    Row,
    Cell,
    Header,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataGridMatch {
    pub anchor: NodeId,
    pub kind: DataGridKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_id: Option<String>,
    /// Only ever set to a stable value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_anchor_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

pub struct DataGridDetector {
    pub policy: VolatilityPolicy,
}

fn is_grid_root(data: &NodeData) -> bool {
    data.classes().any(|c| c == "ag-root" || c == "ag-root-wrapper" || c.starts_with("ag-theme-"))
}

fn is_grid_row(data: &NodeData) -> bool {
    data.attr("role") == Some("row") || data.has_class("ag-row")
}

fn is_grid_cell(data: &NodeData) -> bool {
    data.attr("role") == Some("gridcell") || data.has_class("ag-cell")
}

fn is_column_header(data: &NodeData) -> bool {
    data.attr("role") == Some("columnheader") || data.has_class("ag-header-cell")
}

impl DataGridDetector {
    /// Row selector from a stable row id, a cell text unique among the
    /// grid's rows, or the row position
    fn row_selector(&self, tree: &DomTree, grid: NodeId, row: NodeId) -> (String, Option<String>, Option<String>) {
        let base = if tree.attr(row, "role") == Some("row") { "[role=\"row\"]" } else { ".ag-row" };

        if let Some(row_id) = stable_attr(tree, row, "row-id", self.policy) {
            return (format!("[row-id={}]", css_string(row_id)), Some(row_id.to_string()), None);
        }

        let rows: Vec<NodeId> = tree.descendants(grid).filter(|n| is_grid_row(tree.node(*n))).collect();
        let cells = |r: NodeId| tree.descendants(r).filter(move |c| is_grid_cell(tree.node(*c)));
        for cell in cells(row) {
            let text = tree.text(cell);
            let length = text.chars().count();
            if length <= 2 || length >= 50 {
                continue;
            }
            let Some(phrase) = stabilize(text) else {
                continue;
            };
            let needle = phrase.to_lowercase();
            let holders = rows
                .iter()
                .filter(|r| cells(**r).any(|c| tree.text(c).to_lowercase().contains(&needle)))
                .count();
            if holders == 1 {
                let cell_base = if tree.attr(cell, "role") == Some("gridcell") { "[role=\"gridcell\"]" } else { ".ag-cell" };
                let selector = format!("{}:has({}:has-text({}))", base, cell_base, css_string(&phrase));
                return (selector, None, Some(phrase));
            }
        }

        (format!("{}:nth-child({})", base, tree.child_index(row)), None, None)
    }
}

impl FrameworkDetector for DataGridDetector {
    fn detect(&self, tree: &DomTree, node: NodeId) -> Option<FrameworkMatch> {
        let grid = tree.closest(node, is_grid_root)?;
        let grid_id = stable_attr(tree, grid, "id", self.policy).map(str::to_string);
        let scope = grid_id.as_ref().map(|id| format!("#{}", css_escape(id)));

        let mut found = DataGridMatch {
            anchor: grid,
            kind: DataGridKind::Grid,
            grid_id,
            row_id: None,
            row_anchor_text: None,
            row_index: None,
            row_selector: None,
            column_id: None,
            text: None,
            selector: scope.clone(),
        };

        if let Some(header) = within(tree, tree.closest(node, is_column_header), grid) {
            found.anchor = header;
            found.kind = DataGridKind::Header;
            found.column_id = stable_attr(tree, header, "col-id", self.policy).map(str::to_string);
            found.text = text_phrase(tree.text(header), self.policy);
            found.selector = match (&found.column_id, &found.text) {
                (Some(col), _) => Some(scoped(scope.as_deref(), &format!("[role=\"columnheader\"][col-id={}]", css_string(col)))),
                (None, Some(text)) => Some(scoped(scope.as_deref(), &format!("[role=\"columnheader\"]:has-text({})", css_string(text)))),
                (None, None) => scope.clone(),
            };
            return Some(FrameworkMatch::DataGrid(found));
        }

        if let Some(row) = within(tree, tree.closest(node, is_grid_row), grid) {
            let (row_selector, row_id, anchor_text) = self.row_selector(tree, grid, row);
            found.anchor = row;
            found.kind = DataGridKind::Row;
            found.row_id = row_id;
            found.row_anchor_text = anchor_text;
            found.row_index = Some(tree.child_index(row));
            found.selector = Some(scoped(scope.as_deref(), &row_selector));

            if let Some(cell) = within(tree, tree.closest(node, is_grid_cell), row) {
                found.anchor = cell;
                found.kind = DataGridKind::Cell;
                found.text = stabilize(tree.text(cell));
                // aria-colindex is always numeric; taken as is
                let column = stable_attr(tree, cell, "col-id", self.policy)
                    .map(|c| ("col-id", c))
                    .or_else(|| tree.attr_nonempty(cell, "aria-colindex").map(|c| ("aria-colindex", c)));
                found.column_id = column.map(|(_, c)| c.to_string());
                let column = match column {
                    Some((attr, value)) => format!("[{}={}]", attr, css_string(value)),
                    None => format!("{}:nth-child({})", tree.tag(cell), tree.child_index(cell)),
                };
                found.selector = Some(scoped(scope.as_deref(), &format!("{} {}", row_selector, column)));
            }
            found.row_selector = Some(row_selector);
        }

        log::debug!("Data grid {:?} around node {}", found.kind, node);
        Some(FrameworkMatch::DataGrid(found))
    }
}

// --- Component attribute convention (data-component / data-nexus-id / n-*, nxs-*) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Button,
    Input,
    Modal,
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMatch {
    pub anchor: NodeId,
    pub kind: ComponentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub in_modal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modal_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modal_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl ComponentMatch {
    fn new(anchor: NodeId, kind: ComponentKind) -> Self {
        Self {
            anchor,
            kind,
            component_id: None,
            label: None,
            text: None,
            in_modal: false,
            modal_title: None,
            modal_selector: None,
            row_id: None,
            row_index: None,
            selector: None,
        }
    }
}

const BUTTON_CLASSES: &[&str] = &["n-button", "nxs-button"];
const INPUT_CLASSES: &[&str] = &["n-input", "nxs-input"];
const MODAL_CLASSES: &[&str] = &["n-modal", "nxs-modal", "n-popup", "nexus-popup"];
const TABLE_CLASSES: &[&str] = &["n-table", "nxs-table"];

fn is_component(data: &NodeData, name: &str, classes: &[&str]) -> bool {
    data.attr("data-component") == Some(name) || marker_class(data, classes).is_some()
}

fn is_form_control(tag: &str) -> bool {
    matches!(tag, "input" | "textarea" | "select")
}

pub struct ComponentAttributeDetector {
    pub policy: VolatilityPolicy,
}

impl ComponentAttributeDetector {
    /// Selector base for a component without an identifier
    fn base(tree: &DomTree, node: NodeId, name: &str, classes: &[&str]) -> String {
        if tree.attr(node, "data-component") == Some(name) {
            format!("[data-component={}]", css_string(name))
        } else {
            marker_class(tree.node(node), classes)
                .map(|c| format!(".{}", css_escape(c)))
                .unwrap_or_else(|| format!("[data-component={}]", css_string(name)))
        }
    }

    fn nexus_id(&self, tree: &DomTree, node: NodeId) -> Option<String> {
        stable_attr(tree, node, "data-nexus-id", self.policy).map(str::to_string)
    }

    fn button(&self, tree: &DomTree, node: NodeId) -> Option<ComponentMatch> {
        let button = tree.closest(node, |d| {
            is_component(d, "button", BUTTON_CLASSES) || d.attr("data-nexus-id").is_some_and(|v| v.contains("btn"))
        })?;
        let mut found = ComponentMatch::new(button, ComponentKind::Button);
        found.component_id = self.nexus_id(tree, button);
        found.text = text_phrase(tree.text(button), self.policy);
        found.selector = match (&found.component_id, &found.text) {
            (Some(id), _) => Some(format!("[data-nexus-id={}]", css_string(id))),
            (None, Some(text)) => {
                Some(format!("{}:has-text({})", Self::base(tree, button, "button", BUTTON_CLASSES), css_string(text)))
            }
            (None, None) => None,
        };
        Some(found)
    }

    fn input(&self, tree: &DomTree, node: NodeId) -> Option<ComponentMatch> {
        let wrapper = tree.closest(node, |d| is_component(d, "input", INPUT_CLASSES));
        let control = if is_form_control(tree.tag(node)) {
            Some(node)
        } else {
            wrapper.and_then(|w| tree.descendants(w).find(|n| is_form_control(tree.tag(*n))))
        };

        // A bare control needs a marker of its own
        let marked = control.is_some_and(|c| tree.attr(c, "data-nexus-id").is_some());
        if wrapper.is_none() && !marked {
            return None;
        }

        let anchor = if is_form_control(tree.tag(node)) { node } else { wrapper? };
        let control_tag = control.map_or("input", |c| tree.tag(c));
        let mut found = ComponentMatch::new(anchor, ComponentKind::Input);

        found.label = wrapper
            .and_then(|w| tree.attr_nonempty(w, "data-label"))
            .or_else(|| control.and_then(|c| tree.attr_nonempty(c, "aria-label")))
            .map(str::to_string);

        if let Some(id) = control.and_then(|c| self.nexus_id(tree, c)) {
            found.selector = Some(format!("{}[data-nexus-id={}]", control_tag, css_string(&id)));
            found.component_id = Some(id);
        } else if let Some(id) = wrapper.and_then(|w| self.nexus_id(tree, w)) {
            found.selector = Some(format!("[data-nexus-id={}] {}", css_string(&id), control_tag));
            found.component_id = Some(id);
        } else if let Some(label) = wrapper.and_then(|w| tree.attr_nonempty(w, "data-label")) {
            found.selector = Some(format!("[data-label={}] {}", css_string(label), control_tag));
        } else if let Some(label) = &found.label {
            found.selector = Some(format!("{}[aria-label={}]", control_tag, css_string(label)));
        }
        Some(found)
    }

    fn modal_selector(&self, tree: &DomTree, modal: NodeId, title: Option<&str>) -> Option<String> {
        if let Some(id) = self.nexus_id(tree, modal) {
            Some(format!("[data-nexus-id={}]", css_string(&id)))
        } else if let Some(id) = stable_attr(tree, modal, "id", self.policy) {
            Some(format!("#{}", css_escape(id)))
        } else {
            title.map(|t| format!("{}:has-text({})", Self::base(tree, modal, "modal", MODAL_CLASSES), css_string(t)))
        }
    }

    fn table(&self, tree: &DomTree, node: NodeId) -> Option<ComponentMatch> {
        let table = tree.closest(node, |d| is_component(d, "table", TABLE_CLASSES))?;
        let scope = if let Some(id) = self.nexus_id(tree, table) {
            format!("[data-nexus-id={}]", css_string(&id))
        } else if let Some(id) = stable_attr(tree, table, "id", self.policy) {
            format!("#{}", css_escape(id))
        } else {
            Self::base(tree, table, "table", TABLE_CLASSES)
        };

        let mut found = ComponentMatch::new(table, ComponentKind::Table);
        found.component_id = self.nexus_id(tree, table);
        found.selector = Some(scope.clone());

        let row = tree.closest(node, |d| d.tag_name == "tr" || d.attr("role") == Some("row") || d.attr("data-row-id").is_some());
        if let Some(row) = within(tree, row, table).filter(|r| *r != table) {
            found.anchor = row;
            found.row_index = Some(tree.child_index(row));
            found.row_id = stable_attr(tree, row, "data-row-id", self.policy).map(str::to_string);
            let row_selector = match &found.row_id {
                Some(id) => format!("[data-row-id={}]", css_string(id)),
                None if tree.tag(row) == "tr" => format!("tr:nth-child({})", tree.child_index(row)),
                None => format!("[role=\"row\"]:nth-child({})", tree.child_index(row)),
            };
            found.selector = Some(format!("{} {}", scope, row_selector));
        }
        Some(found)
    }
}

impl FrameworkDetector for ComponentAttributeDetector {
    fn detect(&self, tree: &DomTree, node: NodeId) -> Option<FrameworkMatch> {
        let modal = tree.closest(node, |d| is_component(d, "modal", MODAL_CLASSES));
        let modal_title = modal.and_then(|m| {
            tree.descendants(m)
                .find(|n| tree.node(*n).classes().any(|c| c.contains("title") || c == "n-popup-header"))
                .map(|n| tree.text(n).to_string())
                .filter(|t| !t.is_empty() && !is_volatile_with(t, self.policy))
        });
        let modal_selector = modal.and_then(|m| self.modal_selector(tree, m, modal_title.as_deref()));

        let modal_match = modal.filter(|m| *m == node).map(|m| {
            let mut found = ComponentMatch::new(m, ComponentKind::Modal);
            found.component_id = self.nexus_id(tree, m);
            found.selector = modal_selector.clone();
            found
        });

        let candidates = [self.button(tree, node), self.input(tree, node), modal_match, self.table(tree, node)];
        let mut best: Option<ComponentMatch> = None;
        for found in candidates.into_iter().flatten() {
            if best.as_ref().is_none_or(|b| found.anchor > b.anchor) {
                best = Some(found);
            }
        }

        let mut found = best?;
        found.in_modal = modal.is_some();
        found.modal_title = modal_title;
        found.modal_selector = modal_selector;
        log::debug!("Component {:?} around node {}", found.kind, node);
        Some(FrameworkMatch::ComponentAttribute(found))
    }
}
