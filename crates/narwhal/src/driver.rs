use crate::error::Result;
use crate::forceatlas2::{CancelToken, ForceAtlas2, LayoutStats};
use crate::graph::{Graph, Point};
use crate::io::{GraphExporter, GraphImporter};
use crate::label_adjust::{LabelAdjust, LabelAdjustStats};
use crate::options::LayoutOptions;
use crate::text::{DeterministicTextMeasurer, TextMeasurer};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LayoutResult {
    /// The laid-out graph, handed back to the caller.
    pub graph: Graph,
    pub positions: BTreeMap<String, Point>,
    pub forceatlas2: LayoutStats,
    /// `None` when the label pass is disabled.
    pub label_adjust: Option<LabelAdjustStats>,
}

impl LayoutResult {
    pub fn iterations(&self) -> usize {
        self.forceatlas2.iterations
    }

    pub fn converged_early(&self) -> bool {
        self.forceatlas2.converged_early
    }
}

/// Runs ForceAtlas2 then label-overlap removal on `graph`, measuring labels with the
/// deterministic measurer configured by `options.label_adjust`.
pub fn compute_layout(graph: Graph, options: &LayoutOptions) -> Result<LayoutResult> {
    let measurer = DeterministicTextMeasurer::new(
        options.label_adjust.char_width_factor,
        options.label_adjust.line_height_factor,
    );
    compute_layout_with(graph, options, &measurer, None)
}

pub fn compute_layout_with(
    graph: Graph,
    options: &LayoutOptions,
    measurer: &(dyn TextMeasurer + Sync),
    cancel: Option<&CancelToken>,
) -> Result<LayoutResult> {
    options.validate()?;

    let run = move || -> Result<LayoutResult> {
        let mut engine = ForceAtlas2::new(graph, &options.forceatlas2)?;
        if let Some(token) = cancel {
            engine = engine.with_cancel_token(token.clone());
        }
        let forceatlas2 = engine.run();
        let graph = engine.into_graph();

        let (graph, label_adjust) = if options.label_adjust.enabled {
            let mut pass = LabelAdjust::new(graph, &options.label_adjust, measurer);
            let stats = pass.run();
            (pass.into_graph(), Some(stats))
        } else {
            (graph, None)
        };

        Ok(LayoutResult {
            positions: graph.positions(),
            graph,
            forceatlas2,
            label_adjust,
        })
    };

    match options.forceatlas2.threads {
        Some(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?;
            pool.install(run)
        }
        None => run(),
    }
}

/// Import → layout → export, with every collaborator passed in explicitly.
pub struct LayoutDriver<I, E> {
    importer: I,
    exporter: E,
    options: LayoutOptions,
    measurer: Arc<dyn TextMeasurer + Send + Sync>,
    cancel: Option<CancelToken>,
}

impl<I: GraphImporter, E: GraphExporter> LayoutDriver<I, E> {
    pub fn new(importer: I, exporter: E, options: LayoutOptions) -> Self {
        let measurer = Arc::new(DeterministicTextMeasurer::new(
            options.label_adjust.char_width_factor,
            options.label_adjust.line_height_factor,
        ));
        Self {
            importer,
            exporter,
            options,
            measurer,
            cancel: None,
        }
    }

    pub fn with_text_measurer(mut self, measurer: Arc<dyn TextMeasurer + Send + Sync>) -> Self {
        self.measurer = measurer;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    pub fn run(&self, input: &Path, output: &Path) -> Result<LayoutResult> {
        let graph = self.importer.import_graph(input)?;
        tracing::info!(
            path = %input.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "imported graph"
        );

        let result = compute_layout_with(
            graph,
            &self.options,
            self.measurer.as_ref(),
            self.cancel.as_ref(),
        )?;
        tracing::info!(
            iterations = result.iterations(),
            converged_early = result.converged_early(),
            "layout finished"
        );

        self.exporter.export_graph(&result.graph, output)?;
        tracing::info!(path = %output.display(), "exported graph");
        Ok(result)
    }
}
