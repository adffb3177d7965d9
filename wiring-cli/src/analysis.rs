//! Loading source files and checking the containers they declare.

use std::path::{Path, PathBuf};

use serde::Serialize;
use wiring_codegen::graph::call_sites;
use wiring_codegen::parse::FileContainer;
use wiring_codegen::{ContainerDecl, ProjectGraph, scan_file};

use crate::CliError;

/// Contents of one source file.
#[derive(Debug, Clone)]
pub struct SourceText {
    pub path: PathBuf,
    pub text: String,
}

/// A parsed source file and the containers found in it.
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub containers: Vec<FileContainer>,
}

/// Reads all files concurrently.
pub async fn read_sources(paths: &[PathBuf]) -> Result<Vec<SourceText>, CliError> {
    let reads = paths.iter().map(|path| async move {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CliError::Read {
                path: path.clone(),
                source,
            })?;
        Ok(SourceText {
            path: path.clone(),
            text,
        })
    });
    futures::future::try_join_all(reads).await
}

/// Parses files read by [`read_sources`], stopping at the first syntax error.
pub fn parse_sources(sources: &[SourceText]) -> Result<Vec<SourceFile>, CliError> {
    sources
        .iter()
        .map(|source| parse_source(&source.path, &source.text))
        .collect()
}

pub fn parse_source(path: &Path, text: &str) -> Result<SourceFile, CliError> {
    let file = syn::parse_file(text).map_err(|err| CliError::Parse {
        path: path.to_owned(),
        line: err.span().start().line,
        message: err.to_string(),
    })?;
    let containers = scan_file(&file);
    tracing::debug!(path = %path.display(), containers = containers.len(), "parsed source");
    Ok(SourceFile {
        path: path.to_owned(),
        containers,
    })
}

/// One diagnostic of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub file: String,
    pub container: String,
    pub subject: String,
    pub line: usize,
    pub message: String,
}

#[derive(Debug)]
pub struct Analysis {
    pub files: usize,
    pub containers: usize,
    pub findings: Vec<Finding>,
    pub graph: ProjectGraph,
}

/// Checks every container on its own and links them into a project graph.
pub fn analyze(sources: &[SourceFile]) -> Analysis {
    let mut decls = Vec::new();
    let mut sites = Vec::new();
    let mut findings = Vec::new();
    for source in sources {
        let file = source.path.display().to_string();
        for found in &source.containers {
            let container = &found.parsed.container;
            let decl = ContainerDecl::new(file.clone(), found.modules.clone(), container);
            let id = decl.id();
            sites.extend(call_sites(container, &id));
            for diagnostic in wiring_codegen::check(&found.parsed) {
                findings.push(Finding {
                    file: file.clone(),
                    container: id.clone(),
                    line: diagnostic.span.start().line,
                    message: diagnostic.message(),
                    subject: diagnostic.subject,
                });
            }
            decls.push(decl);
        }
    }
    let graph = ProjectGraph::build(&decls, &sites);
    tracing::debug!(
        containers = decls.len(),
        findings = findings.len(),
        edges = graph.edges().len(),
        "analyzed sources",
    );
    Analysis {
        files: sources.len(),
        containers: decls.len(),
        findings,
        graph,
    }
}
