use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("edge {edge} references an unknown node: {missing}")]
    InvalidReference { edge: String, missing: String },
    #[error("duplicate node id: {id}")]
    DuplicateId { id: String },
    #[error("cannot lay out a graph with no nodes")]
    EmptyGraph,
    #[error("node {id} has a non-positive mass: {mass}")]
    InvalidMass { id: String, mass: f64 },
    #[error("invalid option `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },
    #[error("failed to import {}: {message}", path.display())]
    Import { path: PathBuf, message: String },
    #[error("failed to export {}: {message}", path.display())]
    Export { path: PathBuf, message: String },
    #[error("failed to start the layout thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub(crate) fn import(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Import {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn export(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Export {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
