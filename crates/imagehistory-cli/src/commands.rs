//! The subcommands, each returning a serializable report.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use imagehistory_catalog::{ImageRowId, InMemoryCatalog, RowRelation};
use imagehistory_core::{DImageHistory, FilterAction, HistoryImageId};
use imagehistory_graph::{GraphConfig, ImageCategory, ImageHistoryGraph, LoggingObserver, Vertex};

use crate::error::CliError;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Summary of one history file.
#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub entries: usize,
    pub actions: Vec<String>,
    /// True if every action can be replayed from the stored parameters.
    pub reproducible: bool,
    pub referred_images: Vec<HistoryImageId>,
    pub original: Option<HistoryImageId>,
    pub current: Option<HistoryImageId>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CategoryEntry {
    pub row: ImageRowId,
    pub category: ImageCategory,
}

/// Structure of a graph built from stored relations.
#[derive(Debug, Serialize)]
pub struct RelationsReport {
    pub roots: Vec<ImageRowId>,
    pub leaves: Vec<ImageRowId>,
    pub relations: Vec<RowRelation>,
    pub cloud: Vec<RowRelation>,
    pub categories: Vec<CategoryEntry>,
    /// Longest ancestry line through `--vertex`, root first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<ImageRowId>>,
}

#[derive(Debug, Serialize)]
pub struct VertexReport {
    pub index: usize,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    pub ids: Vec<HistoryImageId>,
}

#[derive(Debug, Serialize)]
pub struct EdgeReport {
    pub child: usize,
    pub parent: usize,
    pub actions: Vec<FilterAction>,
}

/// A graph merged from history files. Vertices are numbered in insertion
/// order.
#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub vertices: Vec<VertexReport>,
    pub edges: Vec<EdgeReport>,
    pub roots: Vec<usize>,
    pub leaves: Vec<usize>,
}

#[derive(Debug, Serialize)]
pub struct DisplayEntry {
    pub rows: Vec<ImageRowId>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uuid: String,
}

/// The graph around a stored image, prepared for display.
#[derive(Debug, Serialize)]
pub struct DisplayReport {
    pub order: Vec<DisplayEntry>,
    pub categories: Vec<CategoryEntry>,
    pub history: Vec<ImageRowId>,
    pub cloud: Vec<RowRelation>,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub fn load_config(path: Option<&Path>) -> Result<GraphConfig, CliError> {
    match path {
        Some(path) => Ok(GraphConfig::from_file(path)?),
        None => Ok(GraphConfig::default()),
    }
}

pub fn inspect(path: &Path) -> Result<InspectReport, CliError> {
    let history = DImageHistory::read_from_file(path)?;
    let report = InspectReport {
        entries: history.len(),
        actions: history.actions().map(|a| a.identifier.clone()).collect(),
        reproducible: history.actions().all(FilterAction::is_reproducible),
        referred_images: history.all_referred_images().into_iter().cloned().collect(),
        original: history.original_referred_image().cloned(),
        current: history.current_referred_image().cloned(),
    };
    Ok(report)
}

/// Re-encodes a history file in canonical form. Writes to `output` if
/// given, otherwise returns the text.
pub fn normalize(path: &Path, output: Option<&Path>) -> Result<Option<String>, CliError> {
    let history = DImageHistory::read_from_file(path)?;
    match output {
        Some(output) => {
            history.write_to_file(output)?;
            Ok(None)
        }
        None => Ok(Some(history.to_text()?)),
    }
}

pub fn relations(
    path: &Path,
    vertex: Option<ImageRowId>,
    config: &GraphConfig,
) -> Result<RelationsReport, CliError> {
    let text = read_text(path)?;
    let pairs: Vec<RowRelation> = serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let mut graph = ImageHistoryGraph::new();
    graph.subscribe(Arc::new(LoggingObserver));
    graph.add_relations(&pairs);
    if config.reduce_on_display {
        graph.reduce_edges();
    }

    let history = match vertex {
        Some(row) => {
            graph.require_vertex_of_row(row)?;
            Some(graph.history_of(row))
        }
        None => None,
    };

    Ok(RelationsReport {
        roots: graph.root_images(),
        leaves: graph.leaf_images(),
        relations: graph.image_relations(),
        cloud: graph.relation_cloud(),
        categories: categories(&graph),
        history,
    })
}

pub fn ingest(paths: &[PathBuf], config: &GraphConfig) -> Result<IngestReport, CliError> {
    let mut graph = ImageHistoryGraph::new();
    graph.subscribe(Arc::new(LoggingObserver));
    for path in paths {
        let history = DImageHistory::read_from_file(path)?;
        if graph.add_history(&history, None).is_none() {
            tracing::warn!(path = %path.display(), "history names no image");
        }
    }
    if config.reduce_on_display {
        graph.reduce_edges();
    }

    let g = graph.graph();
    let vertices = g.vertices();
    let index: HashMap<Vertex, usize> = vertices.iter().enumerate().map(|(i, &v)| (v, i)).collect();
    let position = |v: Vertex| index.get(&v).copied().unwrap_or_default();

    let vertex_reports = vertices
        .iter()
        .enumerate()
        .filter_map(|(i, &v)| {
            g.properties(v).map(|props| VertexReport {
                index: i,
                uuid: props.uuid.clone(),
                ids: props.referred_images.clone(),
            })
        })
        .collect();

    let edges = g
        .edges()
        .into_iter()
        .filter_map(|e| {
            let (child, parent) = g.edge_endpoints(e)?;
            let props = g.edge_properties(e)?;
            Some(EdgeReport {
                child: position(child),
                parent: position(parent),
                actions: props.actions.clone(),
            })
        })
        .collect();

    Ok(IngestReport {
        vertices: vertex_reports,
        edges,
        roots: g.roots().into_iter().map(position).collect(),
        leaves: g.leaves().into_iter().map(position).collect(),
    })
}

pub fn display(catalog_path: &Path, row: ImageRowId, config: &GraphConfig) -> Result<DisplayReport, CliError> {
    let text = read_text(catalog_path)?;
    let catalog = InMemoryCatalog::from_json(&text).map_err(|source| CliError::Json {
        path: catalog_path.to_path_buf(),
        source,
    })?;

    let mut graph = ImageHistoryGraph::from_catalog(&catalog, row, config.load_flags)?;
    graph.subscribe(Arc::new(LoggingObserver));
    let order = graph.prepare_for_display(&catalog, Some(row), config);

    let order = order
        .into_iter()
        .map(|v| DisplayEntry {
            rows: graph.rows(v).to_vec(),
            uuid: graph
                .graph()
                .properties(v)
                .map(|p| p.uuid.clone())
                .unwrap_or_default(),
        })
        .collect();

    Ok(DisplayReport {
        order,
        categories: categories(&graph),
        history: graph.history_of(row),
        cloud: graph.relation_cloud(),
    })
}

fn categories(graph: &ImageHistoryGraph) -> Vec<CategoryEntry> {
    graph
        .categorize()
        .into_iter()
        .map(|(row, category)| CategoryEntry { row, category })
        .collect()
}

fn read_text(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}
