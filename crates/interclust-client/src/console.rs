//! Line commands of the interactive console and their text rendering.

use std::fmt::Write as _;

use interclust_protocol::{topics, Algorithm, DiagramKind, FeatureMethod};

use crate::error::ClientError;
use crate::panel::{PanelRegistry, Plot};
use crate::session::{DispatchOutcome, Session};
use crate::tree::Tree;
use crate::view::DetailedView;

/// Longest node name shown in the tree listing.
const NAME_WIDTH: usize = 14;
const TABLE_PREVIEW_ROWS: usize = 10;

pub const HELP: &str = "\
tree                          show the cluster hierarchy
show                          show the detailed view of the selection
panels                        show the analysis panels
select <node>                 select a node
add <node>                    add a child cluster
k <node> <count>              set the number of child clusters
rename <node> <name>          rename a node
weights <node> <w1,w2,...>    set attribute weights
restrict <node> <rules>       set restrictions, e.g. `age > 30, city = Bonn`
recluster <node>              recompute a node's clustering
delete <node>                 delete a node and its subtree
color <node>                  pick a new node color
drag <node> <dx> <dy>         move a node and its subtree
answer same|diff              answer the pending pairwise query
reassign <row> <node>         move a data row into another cluster
graph <panel> [attr=A] [cluster=NODE] [kind=coordinates|histogram]
dataset <path>                change the dataset
algo <name>                   pckmeans, dbscan or optics
method <name>                 method1, method2 or method3
param <panel> <value> [eps]   set a panel's algorithm parameters
attr <name>|clear             extra attributes for method3
start                         run the analysis
download                      save the clustering result
zoom in|out                   change the tree scale
sent                          list published requests
recv <topic> <json>           feed an engine message by hand
help                          show this text
quit                          leave";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Tree,
    Show,
    Panels,
    Select(String),
    Add(String),
    SetK { node: String, k: usize },
    Rename { node: String, name: String },
    Weights { node: String, weights: Vec<f64> },
    Restrict { node: String, rules: String },
    Recluster(String),
    Delete(String),
    Color(String),
    Drag { node: String, dx: f64, dy: f64 },
    Answer(bool),
    Reassign { row: String, target: String },
    Graph {
        panel: usize,
        attribute: Option<String>,
        cluster: Option<String>,
        kind: Option<DiagramKind>,
    },
    Dataset(String),
    Algorithm(Algorithm),
    Method(FeatureMethod),
    Param { panel: usize, primary: f64, eps: Option<f64> },
    /// `None` clears the selection.
    Attribute(Option<String>),
    Start,
    Download,
    Zoom(bool),
    Sent,
    /// Engine message typed by hand, e.g. in offline mode.
    Receive { topic: String, payload: String },
    Help,
    Quit,
}

fn invalid(message: impl Into<String>) -> ClientError {
    ClientError::InvalidCommand(message.into().into())
}

fn number<T: std::str::FromStr>(text: Option<&str>, what: &str) -> Result<T, ClientError> {
    let text = text.ok_or_else(|| invalid(format!("missing {what}")))?;
    text.parse()
        .map_err(|_| invalid(format!("'{text}' is not a valid {what}")))
}

fn word(text: Option<&str>, what: &str) -> Result<String, ClientError> {
    text.map(str::to_string)
        .ok_or_else(|| invalid(format!("missing {what}")))
}

impl Command {
    /// Parses one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ClientError> {
        let line = line.trim();
        let Some((verb, rest)) = line
            .split_once(char::is_whitespace)
            .map(|(verb, rest)| (verb, rest.trim()))
            .or_else(|| (!line.is_empty()).then_some((line, "")))
        else {
            return Ok(None);
        };
        let mut args = rest.split_whitespace();
        let command = match verb.to_ascii_lowercase().as_str() {
            "tree" | "ls" => Self::Tree,
            "show" => Self::Show,
            "panels" => Self::Panels,
            "select" => Self::Select(word(args.next(), "node")?),
            "add" => Self::Add(word(args.next(), "node")?),
            "k" => Self::SetK {
                node: word(args.next(), "node")?,
                k: number(args.next(), "cluster count")?,
            },
            "rename" => {
                let node = word(args.next(), "node")?;
                let name = args.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    return Err(invalid("missing name"));
                }
                Self::Rename { node, name }
            }
            "weights" => {
                let node = word(args.next(), "node")?;
                let list = args.collect::<Vec<_>>().join("");
                let weights = list
                    .split(',')
                    .filter(|item| !item.is_empty())
                    .map(|item| number(Some(item), "weight"))
                    .collect::<Result<Vec<f64>, _>>()?;
                if weights.is_empty() {
                    return Err(invalid("missing weights"));
                }
                Self::Weights { node, weights }
            }
            "restrict" => {
                let node = word(args.next(), "node")?;
                let rules = args.collect::<Vec<_>>().join(" ");
                Self::Restrict { node, rules }
            }
            "recluster" => Self::Recluster(word(args.next(), "node")?),
            "delete" | "rm" => Self::Delete(word(args.next(), "node")?),
            "color" => Self::Color(word(args.next(), "node")?),
            "drag" => Self::Drag {
                node: word(args.next(), "node")?,
                dx: number(args.next(), "x offset")?,
                dy: number(args.next(), "y offset")?,
            },
            "answer" => match args.next().map(str::to_ascii_lowercase).as_deref() {
                Some("same" | "yes" | "y") => Self::Answer(true),
                Some("diff" | "different" | "no" | "n") => Self::Answer(false),
                _ => return Err(invalid("answer with 'same' or 'diff'")),
            },
            "reassign" => Self::Reassign {
                row: word(args.next(), "row id")?,
                target: word(args.next(), "target node")?,
            },
            "graph" => {
                let panel = number(args.next(), "panel")?;
                let (mut attribute, mut cluster, mut kind) = (None, None, None);
                for option in args {
                    match option.split_once('=') {
                        Some(("attr", value)) => attribute = Some(value.to_string()),
                        Some(("cluster", value)) => cluster = Some(value.to_string()),
                        Some(("kind", value)) => {
                            kind = Some(
                                DiagramKind::parse(value)
                                    .ok_or_else(|| invalid(format!("unknown diagram kind '{value}'")))?,
                            );
                        }
                        _ => return Err(invalid(format!("unexpected graph option '{option}'"))),
                    }
                }
                Self::Graph {
                    panel,
                    attribute,
                    cluster,
                    kind,
                }
            }
            "dataset" => Self::Dataset(word(args.next(), "dataset path")?),
            "algo" | "algorithm" => {
                let name = word(args.next(), "algorithm")?;
                Self::Algorithm(
                    Algorithm::parse(&name).ok_or_else(|| invalid(format!("unknown algorithm '{name}'")))?,
                )
            }
            "method" => {
                let name = word(args.next(), "method")?;
                Self::Method(
                    FeatureMethod::parse(&name).ok_or_else(|| invalid(format!("unknown method '{name}'")))?,
                )
            }
            "param" => Self::Param {
                panel: number(args.next(), "panel")?,
                primary: number(args.next(), "parameter")?,
                eps: args.next().map(|eps| number(Some(eps), "eps")).transpose()?,
            },
            "attr" => match args.next() {
                Some("clear") => Self::Attribute(None),
                Some(name) => Self::Attribute(Some(name.to_string())),
                None => return Err(invalid("missing attribute")),
            },
            "start" => Self::Start,
            "download" => Self::Download,
            "zoom" => match args.next() {
                Some("in" | "+") => Self::Zoom(true),
                Some("out" | "-") => Self::Zoom(false),
                _ => return Err(invalid("zoom in or zoom out")),
            },
            "sent" => Self::Sent,
            "recv" => {
                let topic = word(args.next(), "topic")?;
                let payload = rest
                    .split_once(char::is_whitespace)
                    .map(|(_, payload)| payload.trim().to_string())
                    .unwrap_or_default();
                Self::Receive { topic, payload }
            }
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(invalid(format!("unknown command '{other}', try 'help'"))),
        };
        Ok(Some(command))
    }
}

/// Result of executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Runs a command against the session.
pub fn execute(session: &mut Session, command: Command) -> Result<Reply, ClientError> {
    let reply = match command {
        Command::Tree => Reply::Text(render_tree(session.tree())),
        Command::Show => Reply::Text(render_view(session.tree(), session.view())),
        Command::Panels => Reply::Text(render_panels(session.panels())),
        Command::Select(node) => {
            let id = session.select(&node)?;
            Reply::Text(format!("selected {}", session.tree().get(id.as_str())?.name()))
        }
        Command::Add(parent) => {
            let id = session.add_child(&parent)?;
            Reply::Text(format!("added {id}"))
        }
        Command::SetK { node, k } => {
            let change = session.change_cluster_count(&node, k)?;
            Reply::Text(format!(
                "{} added, {} removed{}",
                change.added.len(),
                change.removed.len(),
                if change.reclustered { ", reclustering" } else { "" }
            ))
        }
        Command::Rename { node, name } => {
            session.rename(&node, &name)?;
            Reply::text("renamed")
        }
        Command::Weights { node, weights } => {
            session.set_weights(&node, weights)?;
            Reply::text("weights sent")
        }
        Command::Restrict { node, rules } => {
            session.set_restrictions(&node, &rules)?;
            Reply::text("restrictions sent")
        }
        Command::Recluster(node) => {
            session.recluster(&node)?;
            Reply::text("reclustering")
        }
        Command::Delete(node) => {
            let removed = session.delete(&node)?;
            Reply::Text(format!("{} node(s) removed", removed.len()))
        }
        Command::Color(node) => Reply::Text(format!("new color {}", session.recolor(&node)?)),
        Command::Drag { node, dx, dy } => {
            session.drag(&node, dx, dy)?;
            Reply::text("moved")
        }
        Command::Answer(same) => {
            session.answer_query(same)?;
            Reply::text("answer sent")
        }
        Command::Reassign { row, target } => {
            session.reassign(&row, &target)?;
            Reply::text("reassignment sent")
        }
        Command::Graph {
            panel,
            attribute,
            cluster,
            kind,
        } => {
            if session.set_graph_form(panel, attribute, cluster.as_deref(), kind)? {
                Reply::text("graph requested")
            } else {
                Reply::text("graph form incomplete")
            }
        }
        Command::Dataset(path) => {
            session.set_dataset(&path);
            Reply::Text(format!("dataset {path}"))
        }
        Command::Algorithm(algorithm) => {
            session.analysis_mut().set_algorithm(algorithm);
            Reply::Text(format!(
                "algorithm {algorithm} ({})",
                algorithm.primary_parameter()
            ))
        }
        Command::Method(method) => {
            session.analysis_mut().set_method(method)?;
            Reply::Text(format!("method {method}"))
        }
        Command::Param { panel, primary, eps } => {
            session.analysis_mut().set_parameter(panel, primary, eps)?;
            Reply::text("parameters set")
        }
        Command::Attribute(Some(name)) => {
            session.analysis_mut().select_attribute(&name)?;
            Reply::Text(format!(
                "extra attributes: {}",
                session.analysis().selected_attributes().join(", ")
            ))
        }
        Command::Attribute(None) => {
            session.analysis_mut().clear_attributes();
            Reply::text("extra attributes cleared")
        }
        Command::Start => Reply::Text(format!("running {}", session.start_analysis()?)),
        Command::Download => Reply::Text(format!(
            "result will be saved to {}",
            session.download().display()
        )),
        Command::Zoom(zoom_in) => Reply::Text(format!("scale {:.1}", session.zoom(zoom_in))),
        Command::Sent => Reply::Text(format!(
            "{} request(s) published",
            session.outbox().published()
        )),
        Command::Receive { topic, payload } => {
            let outcome = session.handle_inbound(&topics::frontend(&topic), payload.as_bytes());
            Reply::Text(match outcome {
                DispatchOutcome::Applied => "applied".to_string(),
                DispatchOutcome::Stale => "stale, dropped".to_string(),
                DispatchOutcome::Dropped => "no matching node or panel, dropped".to_string(),
                DispatchOutcome::Ignored => "ignored".to_string(),
                DispatchOutcome::Rejected(reason) => format!("rejected: {reason}"),
            })
        }
        Command::Help => Reply::text(HELP),
        Command::Quit => Reply::Quit,
    };
    Ok(reply)
}

/// Indented listing of the hierarchy; the selection is marked with `*`.
#[must_use]
pub fn render_tree(tree: &Tree) -> String {
    let mut out = String::new();
    let selected = tree.selected_id();
    let mut stack = vec![(tree.root().id().clone(), String::new(), true, true)];
    while let Some((id, prefix, last, top)) = stack.pop() {
        let Some(node) = tree.node(id.as_str()) else {
            continue;
        };
        let branch = match (top, last) {
            (true, _) => "",
            (false, true) => "└─ ",
            (false, false) => "├─ ",
        };
        let marker = if selected == Some(node.id()) { " *" } else { "" };
        let instances = node
            .analytics()
            .map_or_else(|| "-".to_string(), |a| a.num_instances.to_string());
        let _ = write!(
            out,
            "{prefix}{branch}{} [{}] n={instances} q={} rel={}{marker}",
            node.presentable_name(NAME_WIDTH),
            node.state().label(),
            node.quality_text(),
            node.relative_text(),
        );
        if !node.restrictions().is_empty() {
            let rules: Vec<String> = node.restrictions().iter().map(ToString::to_string).collect();
            let _ = write!(out, " ({})", rules.join(", "));
        }
        out.push('\n');
        let child_prefix = match (top, last) {
            (true, _) => String::new(),
            (false, true) => format!("{prefix}   "),
            (false, false) => format!("{prefix}│  "),
        };
        let count = node.children().len();
        for (index, child) in node.children().iter().enumerate().rev() {
            stack.push((child.clone(), child_prefix.clone(), index + 1 == count, false));
        }
    }
    out
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |value| format!("{value:.3}"))
}

/// Detailed view of the selection as text.
#[must_use]
pub fn render_view(tree: &Tree, view: &DetailedView) -> String {
    let Some(node) = view.node().and_then(|id| tree.node(id.as_str())) else {
        return "no node selected\n".to_string();
    };
    let mut out = String::new();
    let _ = writeln!(out, "{} [{}]", node.name(), node.state().label());
    if let Some(info) = view.info() {
        let instances = info
            .num_instances
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        let _ = writeln!(out, "  level            {}", info.level);
        let _ = writeln!(out, "  instances        {instances}");
        let _ = writeln!(out, "  share of total   {}", info.share_of_total);
        let _ = writeln!(out, "  share of parent  {}", info.share_of_parent);
        for line in &info.quality {
            let _ = writeln!(out, "  {:<16} {} {}", line.name, line.value, line.description);
        }
    }
    if let Some(analytics) = node.analytics() {
        let describe = |badges: &[crate::tree::FeatureBadge]| {
            badges.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        };
        let _ = writeln!(out, "  describes        {}", describe(&analytics.relevant_intern));
        let _ = writeln!(out, "  splits on        {}", describe(&analytics.relevant_clustering));
    }
    if let Some(stats) = view.statistics() {
        let _ = writeln!(out, "statistics");
        let _ = writeln!(out, "  {:<8} {}", "", stats.attributes.join(" | "));
        for row in &stats.rows {
            let values: Vec<String> = row.values.iter().map(|value| cell(*value)).collect();
            let _ = writeln!(out, "  {:<8} {}", row.label, values.join(" | "));
        }
    }
    for recommendation in view.recommendations() {
        let _ = writeln!(out, "hint: {recommendation}");
    }
    if let Some(query) = view.query() {
        let _ = writeln!(out, "same cluster? (answer same|diff)");
        for column in query.relevant.iter().chain(&query.other) {
            let _ = writeln!(out, "  {:<16} {} | {}", column.attribute, column.first, column.second);
        }
    }
    if let Some(table) = view.table() {
        let _ = writeln!(out, "data ({} rows)", table.rows.len());
        for row in table.rows.iter().take(TABLE_PREVIEW_ROWS) {
            let cluster = row
                .assignment
                .as_ref()
                .and_then(|id| tree.node(id.as_str()))
                .map_or("-", |node| node.name());
            let values: Vec<String> = row.values.iter().map(|(_, value)| value.to_string()).collect();
            let _ = writeln!(out, "  {:<6} {:<14} {}", row.backend_row_id, cluster, values.join(" "));
        }
    }
    out
}

/// Method summaries and plot outline of every panel.
#[must_use]
pub fn render_panels(panels: &PanelRegistry) -> String {
    let mut out = String::new();
    for panel in panels.iter() {
        let _ = writeln!(out, "panel {}: {}", panel.id(), panel.topic());
        for summary in panel.summaries() {
            let instances = summary
                .instances
                .map_or_else(|| "-".to_string(), |n| n.to_string());
            let _ = writeln!(out, "  {} ({instances})", summary.header);
            for line in &summary.lines {
                let _ = writeln!(out, "    {line}");
            }
        }
        match panel.plot() {
            Some(Plot::ParallelCoordinates(plot)) => {
                let _ = writeln!(
                    out,
                    "  coordinates: {} lines over {}",
                    plot.lines.len(),
                    plot.dimensions.join(", ")
                );
            }
            Some(Plot::DualHistogram(plot)) => {
                let _ = writeln!(
                    out,
                    "  histogram of {}: {} bins, peak {}",
                    plot.attribute,
                    plot.bins.len(),
                    plot.peak()
                );
            }
            None => {}
        }
    }
    out
}
