use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use wiring_codegen::ProjectGraph;
use wiring_codegen::graph::{
    AmbiguousReference, GraphEdge, GraphNode, GraphReport, IssueCategory,
};

use crate::{Analysis, CliError, ConfigSection, Finding};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(CliError::Config(format!("unknown report format `{s}`"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub format: ReportFormat,
    /// Whether ambiguous container references fail `check`.
    #[serde(default = "default_fail_on_ambiguous")]
    pub fail_on_ambiguous: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: ReportFormat::default(),
            fail_on_ambiguous: default_fail_on_ambiguous(),
        }
    }
}

impl ConfigSection for ReportConfig {
    fn key() -> &'static str {
        "report"
    }
}

fn default_fail_on_ambiguous() -> bool {
    true
}

/// Outcome of `wiring check`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub passed: bool,
    pub files: usize,
    pub containers: usize,
    pub findings: Vec<Finding>,
    pub graph: GraphReport,
}

impl CheckReport {
    pub fn new(analysis: &Analysis, config: &ReportConfig) -> Self {
        let graph = analysis.graph.validate();
        let graph_failed = graph.issues.iter().any(|issue| match issue.category {
            IssueCategory::DependencyCycle => true,
            IssueCategory::AmbiguousReference => config.fail_on_ambiguous,
        });
        Self {
            passed: analysis.findings.is_empty() && !graph_failed,
            files: analysis.files,
            containers: analysis.containers,
            findings: analysis.findings.clone(),
            graph,
        }
    }

    pub fn render(&self, format: ReportFormat) -> Result<String, CliError> {
        match format {
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            ReportFormat::Text => Ok(self.render_text()),
        }
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        for finding in &self.findings {
            let _ = writeln!(
                out,
                "{}:{}: {}: {}",
                finding.file, finding.line, finding.container, finding.message,
            );
        }
        for issue in &self.graph.issues {
            let category = match issue.category {
                IssueCategory::AmbiguousReference => "ambiguous reference",
                IssueCategory::DependencyCycle => "dependency cycle",
            };
            let _ = writeln!(out, "{}: {category}: {}", issue.source_id, issue.detail);
        }
        let _ = writeln!(
            out,
            "checked {} containers in {} files: {}",
            self.containers,
            self.files,
            if self.passed { "ok" } else { "failed" },
        );
        out
    }
}

#[derive(Serialize)]
struct GraphDump<'a> {
    nodes: &'a [GraphNode],
    edges: &'a [GraphEdge],
    ambiguous: &'a [AmbiguousReference],
}

/// Renders the normalized nodes and deduplicated edges of a project graph.
pub fn render_graph(graph: &ProjectGraph, format: ReportFormat) -> Result<String, CliError> {
    if format == ReportFormat::Json {
        let dump = GraphDump {
            nodes: graph.nodes(),
            edges: graph.edges(),
            ambiguous: graph.ambiguous(),
        };
        return Ok(serde_json::to_string_pretty(&dump)?);
    }
    let mut out = String::new();
    for node in graph.nodes() {
        let root = if node.is_root { " (root)" } else { "" };
        let _ = write!(out, "{}{root}", node.id);
        if !node.required_inputs.is_empty() {
            let _ = write!(out, " <- {}", node.required_inputs.join(", "));
        }
        out.push('\n');
    }
    for edge in graph.edges() {
        let _ = write!(out, "{} -> {}", edge.from, edge.to);
        if let Some(label) = &edge.label {
            let _ = write!(out, " [{label}]");
        }
        out.push('\n');
    }
    for reference in graph.ambiguous() {
        let _ = writeln!(
            out,
            "{} -> ? `{}`: {}",
            reference.source_id,
            reference.name,
            reference.candidates.join(", "),
        );
    }
    Ok(out)
}
