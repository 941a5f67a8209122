//! File collaborators that move a [`Graph`] in and out of the layout pipeline.

mod graphml;
mod json;

use crate::error::{Error, Result};
use crate::graph::Graph;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub trait GraphImporter {
    fn import_graph(&self, path: &Path) -> Result<Graph>;
}

pub trait GraphExporter {
    fn export_graph(&self, graph: &Graph, path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    GraphMl,
}

impl FileFormat {
    /// Infers the format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "graphml" | "xml" => Some(Self::GraphMl),
            _ => None,
        }
    }
}

/// Direction given to edges whose file does not say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeDefault {
    #[default]
    Directed,
    Undirected,
}

impl EdgeDefault {
    pub(crate) fn is_directed(self) -> bool {
        self == Self::Directed
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileImporter {
    pub edge_default: EdgeDefault,
}

impl FileImporter {
    pub fn new(edge_default: EdgeDefault) -> Self {
        Self { edge_default }
    }
}

impl GraphImporter for FileImporter {
    fn import_graph(&self, path: &Path) -> Result<Graph> {
        let format = FileFormat::from_path(path)
            .ok_or_else(|| Error::import(path, "unsupported format"))?;
        let text = std::fs::read_to_string(path).map_err(|e| Error::import(path, e))?;
        let graph = match format {
            FileFormat::Json => json::parse(&text, self.edge_default),
            FileFormat::GraphMl => graphml::parse(&text, self.edge_default),
        };
        // Store-level failures (duplicate ids, dangling edges) surface as import errors too.
        graph.map_err(|e| match e {
            Error::Import { message, .. } => Error::import(path, message),
            other => Error::import(path, other),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FileExporter;

impl GraphExporter for FileExporter {
    fn export_graph(&self, graph: &Graph, path: &Path) -> Result<()> {
        let format = FileFormat::from_path(path)
            .ok_or_else(|| Error::export(path, "unsupported format"))?;
        let text = match format {
            FileFormat::Json => json::render(graph).map_err(|e| Error::export(path, e))?,
            FileFormat::GraphMl => graphml::render(graph),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::export(path, e))?;
        }
        std::fs::write(path, text).map_err(|e| Error::export(path, e))
    }
}
