use super::EdgeDefault;
use crate::error::{Error, Result};
use crate::graph::{Edge, Graph, Node, Size};
use indexmap::IndexMap;
use std::fmt::Write as _;

const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";

/// `<key>` declarations: key id to attribute name, split by domain.
#[derive(Debug, Default)]
struct KeyTable {
    node: IndexMap<String, String>,
    edge: IndexMap<String, String>,
}

impl KeyTable {
    fn read(root: roxmltree::Node<'_, '_>) -> Self {
        let mut keys = Self::default();
        for key in root.children().filter(|c| c.has_tag_name("key")) {
            let Some(id) = key.attribute("id") else {
                continue;
            };
            let name = key.attribute("attr.name").unwrap_or(id).to_string();
            match key.attribute("for").unwrap_or("all") {
                "node" => {
                    keys.node.insert(id.to_string(), name);
                }
                "edge" => {
                    keys.edge.insert(id.to_string(), name);
                }
                "all" => {
                    keys.node.insert(id.to_string(), name.clone());
                    keys.edge.insert(id.to_string(), name);
                }
                _ => {}
            }
        }
        keys
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::import("", message.into())
}

fn parse_f64(owner: &str, key: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| invalid(format!("{owner}: invalid {key} value `{raw}`")))
}

fn parse_bool(owner: &str, key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(invalid(format!("{owner}: invalid {key} value `{raw}`"))),
    }
}

/// `(attribute name, text)` for each `<data>` child whose key is declared for the domain.
fn data_values<'a>(
    el: roxmltree::Node<'a, '_>,
    keys: &'a IndexMap<String, String>,
) -> impl Iterator<Item = (&'a str, &'a str)> {
    el.children()
        .filter(|c| c.has_tag_name("data"))
        .filter_map(move |d| {
            let key = d.attribute("key")?;
            let name = keys.get(key).map(String::as_str).unwrap_or(key);
            Some((name, d.text().unwrap_or("")))
        })
}

pub(super) fn parse(text: &str, edge_default: EdgeDefault) -> Result<Graph> {
    let doc = roxmltree::Document::parse(text).map_err(|e| invalid(format!("invalid XML: {e}")))?;
    let root = doc.root_element();
    if !root.has_tag_name("graphml") {
        return Err(invalid(format!(
            "expected a <graphml> root element, found <{}>",
            root.tag_name().name()
        )));
    }
    let keys = KeyTable::read(root);
    let graph_el = root
        .children()
        .find(|c| c.has_tag_name("graph"))
        .ok_or_else(|| invalid("missing <graph> element"))?;
    let default_directed = match graph_el.attribute("edgedefault") {
        Some("directed") => true,
        Some("undirected") => false,
        _ => edge_default.is_directed(),
    };

    let mut graph = Graph::new();
    for el in graph_el.children().filter(|c| c.has_tag_name("node")) {
        let id = el
            .attribute("id")
            .ok_or_else(|| invalid("<node> without an id"))?;
        let mut node = Node::new(id);
        let (mut label_w, mut label_h) = (None, None);
        for (name, value) in data_values(el, &keys.node) {
            match name {
                "label" => node.label = value.to_string(),
                "x" => node.x = parse_f64(id, name, value)?,
                "y" => node.y = parse_f64(id, name, value)?,
                "size" => node.size = parse_f64(id, name, value)?,
                "mass" => node.mass = Some(parse_f64(id, name, value)?),
                "fixed" => node.fixed = parse_bool(id, name, value)?,
                "labelWidth" => label_w = Some(parse_f64(id, name, value)?),
                "labelHeight" => label_h = Some(parse_f64(id, name, value)?),
                _ => {}
            }
        }
        if let (Some(w), Some(h)) = (label_w, label_h) {
            node.label_size = Some(Size::new(w, h));
        }
        graph.add_node(node)?;
    }

    for el in graph_el.children().filter(|c| c.has_tag_name("edge")) {
        let (Some(source), Some(target)) = (el.attribute("source"), el.attribute("target")) else {
            return Err(invalid("<edge> without source or target"));
        };
        let owner = format!("edge {source} -> {target}");
        let mut edge = Edge::new(source, target);
        edge.directed = match el.attribute("directed") {
            Some(raw) => parse_bool(&owner, "directed", raw)?,
            None => default_directed,
        };
        for (name, value) in data_values(el, &keys.edge) {
            if name == "weight" {
                edge.weight = parse_f64(&owner, name, value)?;
            }
        }
        graph.add_edge(edge)?;
    }
    Ok(graph)
}

fn escape_xml_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_xml_into(&mut out, text);
    out
}

pub(super) fn render(graph: &Graph) -> String {
    // The majority direction becomes `edgedefault`; the rest carry a `directed` attribute.
    let directed_count = graph.edges().iter().filter(|e| e.directed).count();
    let default_directed = directed_count * 2 >= graph.edge_count();

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(&mut out, "<graphml xmlns=\"{GRAPHML_NS}\">");
    for (id, ty) in [
        ("label", "string"),
        ("x", "double"),
        ("y", "double"),
        ("size", "double"),
        ("mass", "double"),
        ("fixed", "boolean"),
        ("labelWidth", "double"),
        ("labelHeight", "double"),
    ] {
        let _ = writeln!(
            &mut out,
            "  <key id=\"{id}\" for=\"node\" attr.name=\"{id}\" attr.type=\"{ty}\"/>"
        );
    }
    out.push_str("  <key id=\"weight\" for=\"edge\" attr.name=\"weight\" attr.type=\"double\"/>\n");
    let _ = writeln!(
        &mut out,
        "  <graph id=\"G\" edgedefault=\"{}\">",
        if default_directed {
            "directed"
        } else {
            "undirected"
        }
    );

    for node in graph.nodes() {
        let _ = writeln!(&mut out, "    <node id=\"{}\">", escape_xml(&node.id));
        if !node.label.is_empty() {
            out.push_str("      <data key=\"label\">");
            escape_xml_into(&mut out, &node.label);
            out.push_str("</data>\n");
        }
        let _ = writeln!(&mut out, "      <data key=\"x\">{}</data>", node.x);
        let _ = writeln!(&mut out, "      <data key=\"y\">{}</data>", node.y);
        let _ = writeln!(&mut out, "      <data key=\"size\">{}</data>", node.size);
        if let Some(mass) = node.mass {
            let _ = writeln!(&mut out, "      <data key=\"mass\">{mass}</data>");
        }
        if node.fixed {
            out.push_str("      <data key=\"fixed\">true</data>\n");
        }
        if let Some(s) = node.label_size {
            let _ = writeln!(&mut out, "      <data key=\"labelWidth\">{}</data>", s.width);
            let _ = writeln!(&mut out, "      <data key=\"labelHeight\">{}</data>", s.height);
        }
        out.push_str("    </node>\n");
    }

    for (idx, edge) in graph.edges().iter().enumerate() {
        let _ = write!(
            &mut out,
            "    <edge id=\"e{idx}\" source=\"{}\" target=\"{}\"",
            escape_xml(&edge.source),
            escape_xml(&edge.target)
        );
        if edge.directed != default_directed {
            let _ = write!(&mut out, " directed=\"{}\"", edge.directed);
        }
        let _ = writeln!(
            &mut out,
            "><data key=\"weight\">{}</data></edge>",
            edge.weight
        );
    }

    out.push_str("  </graph>\n</graphml>\n");
    out
}
