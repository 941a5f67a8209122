use super::EdgeDefault;
use crate::error::{Error, Result};
use crate::graph::{Edge, Graph, Node};
use serde::Deserialize;

/// Document-level `directed` overrides the importer's default; a per-edge flag overrides both.
#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    directed: Option<bool>,
    nodes: Vec<Node>,
    #[serde(default)]
    edges: Vec<RawEdge>,
}

#[derive(Debug, Deserialize)]
struct RawEdge {
    source: String,
    target: String,
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    directed: Option<bool>,
}

pub(super) fn parse(text: &str, edge_default: EdgeDefault) -> Result<Graph> {
    let doc: RawDocument =
        serde_json::from_str(text).map_err(|e| Error::import("", format!("invalid JSON: {e}")))?;
    let default_directed = doc.directed.unwrap_or(edge_default.is_directed());

    let mut graph = Graph::with_capacity(doc.nodes.len(), doc.edges.len());
    for node in doc.nodes {
        graph.add_node(node)?;
    }
    for raw in doc.edges {
        let mut edge = Edge::new(raw.source, raw.target);
        edge.weight = raw.weight.unwrap_or(1.0);
        edge.directed = raw.directed.unwrap_or(default_directed);
        graph.add_edge(edge)?;
    }
    Ok(graph)
}

pub(super) fn render(graph: &Graph) -> std::result::Result<String, serde_json::Error> {
    let mut out = serde_json::to_string_pretty(graph)?;
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{parse, render};
    use crate::error::Error;
    use crate::io::EdgeDefault;

    #[test]
    fn edge_direction_falls_back_through_document_then_importer() {
        let text = r#"{
            "nodes": [{"id": "a"}, {"id": "b"}, {"id": "c"}],
            "edges": [
                {"source": "a", "target": "b"},
                {"source": "b", "target": "c", "directed": true, "weight": 2.5}
            ]
        }"#;
        let g = parse(text, EdgeDefault::Undirected).unwrap();
        assert!(!g.edges()[0].directed);
        assert!(g.edges()[1].directed);
        assert_eq!(g.edges()[1].weight, 2.5);

        let doc_level = r#"{"directed": true, "nodes": [{"id": "a"}, {"id": "b"}],
            "edges": [{"source": "a", "target": "b"}]}"#;
        let g = parse(doc_level, EdgeDefault::Undirected).unwrap();
        assert!(g.edges()[0].directed);
    }

    #[test]
    fn node_fields_are_camel_case() {
        let text = r#"{"nodes": [{"id": "a", "x": 3, "y": -1, "size": 4, "fixed": true,
            "label": "A", "labelSize": {"width": 10, "height": 5}}]}"#;
        let g = parse(text, EdgeDefault::Directed).unwrap();
        let a = &g.nodes()[0];
        assert_eq!((a.x, a.y, a.size), (3.0, -1.0, 4.0));
        assert!(a.fixed);
        assert_eq!(a.label_size.map(|s| s.width), Some(10.0));

        let out = render(&g).unwrap();
        assert!(out.contains("\"labelSize\""));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let text = r#"{"nodes": [{"id": "a"}], "edges": [{"source": "a", "target": "zz"}]}"#;
        let err = parse(text, EdgeDefault::Directed).unwrap_err();
        assert!(matches!(err, Error::InvalidReference { ref missing, .. } if missing == "zz"));
    }

    #[test]
    fn malformed_json_is_an_import_error() {
        let err = parse("{nodes:", EdgeDefault::Directed).unwrap_err();
        assert!(matches!(err, Error::Import { .. }));
    }
}
