#![forbid(unsafe_code)]

//! Headless force-directed graph layout (ForceAtlas2 with a Barnes-Hut quadtree) followed by
//! label-overlap removal.
//!
//! `narwhal` owns no I/O beyond the small [`io`] collaborators used by `narwhal-cli`; embedders
//! build a [`Graph`], call [`layout`], and read positions back from the [`LayoutResult`].

pub mod driver;
pub mod error;
pub mod forceatlas2;
pub mod graph;
pub mod grid;
pub mod io;
pub mod label_adjust;
pub mod options;
pub mod quadtree;
pub mod text;

mod rng;

pub use driver::{LayoutDriver, LayoutResult, compute_layout, compute_layout_with};
pub use error::{Error, Result};
pub use forceatlas2::{CancelToken, EngineState, ForceAtlas2, LayoutStats};
pub use graph::{Edge, Graph, GraphDocument, Node, Point, Size};
pub use io::{EdgeDefault, FileExporter, FileFormat, FileImporter, GraphExporter, GraphImporter};
pub use label_adjust::{LabelAdjust, LabelAdjustStats};
pub use options::{ForceAtlas2Options, GravityMode, LabelAdjustOptions, LayoutOptions};
pub use text::{DeterministicTextMeasurer, TextMeasurer, TextMetrics, TextStyle};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Headless layout entry point.
pub fn layout(graph: Graph, options: &LayoutOptions) -> Result<LayoutResult> {
    compute_layout(graph, options)
}
