//! DOT graph interface: a minimal reader/writer for the subset of the DOT
//! language this kernel's tooling actually needs — a flat list of nodes
//! (each carrying `id`, `area`, `pos="x,y"`) and a flat list of edges.
//! `--` and `->` are accepted and treated identically, matching the
//! original component layout tool rather than full graphviz semantics
//! (subgraphs, ports, HTML labels and the rest of the grammar are out of
//! scope). A repeated attribute on the same node overrides the earlier
//! value, in source order.

use crate::error::IoError;

/// One parsed node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DotNode {
    /// Node identifier, as written in the source (also used as `id` if no
    /// explicit `id` attribute overrides it).
    pub name: String,
    /// `id` attribute, if present (defaults to `name`).
    pub id: Option<String>,
    /// `area` attribute, if present.
    pub area: Option<f64>,
    /// `pos="x,y"` attribute, if present.
    pub pos: Option<(f64, f64)>,
}

/// One parsed edge. `--` and `->` both produce this; direction is not
/// tracked since the kernel's consumers treat a DOT edge as an undirected
/// connection hint.
#[derive(Debug, Clone, PartialEq)]
pub struct DotEdge {
    /// Source node name.
    pub from: String,
    /// Target node name.
    pub to: String,
}

/// A parsed (or to-be-written) graph: nodes in first-seen order, edges in
/// source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DotGraph {
    /// Nodes, in the order their first mention appeared.
    pub nodes: Vec<DotNode>,
    /// Edges, in source order.
    pub edges: Vec<DotEdge>,
}

impl DotGraph {
    fn node_mut(&mut self, name: &str) -> &mut DotNode {
        if let Some(index) = self.nodes.iter().position(|n| n.name == name) {
            &mut self.nodes[index]
        } else {
            self.nodes.push(DotNode {
                name: name.to_string(),
                ..Default::default()
            });
            self.nodes.last_mut().unwrap()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Quoted(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Equals,
    Edge,
}

fn tokenize(buffer: &str) -> Result<Vec<Token>, IoError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = buffer.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Equals);
                i += 1;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                tokens.push(Token::Edge);
                i += 2;
            }
            '-' if chars.get(i + 1) == Some(&'>') => {
                tokens.push(Token::Edge);
                i += 2;
            }
            '"' => {
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some('\\') if chars.get(i + 1) == Some(&'"') => {
                            s.push('"');
                            i += 2;
                        }
                        Some(&c) => {
                            s.push(c);
                            i += 1;
                        }
                        None => return Err(IoError::Format("unterminated quoted string".to_string())),
                    }
                }
                tokens.push(Token::Quoted(s));
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.' || chars[i] == '-') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(IoError::Format(format!("unexpected character '{other}'"))),
        }
    }
    Ok(tokens)
}

fn ident_text(token: &Token) -> Option<&str> {
    match token {
        Token::Ident(s) | Token::Quoted(s) => Some(s),
        _ => None,
    }
}

/// Parses a DOT document, returning its node and edge sets.
pub fn parse_dot_buffer(buffer: &str) -> Result<DotGraph, IoError> {
    let tokens = tokenize(buffer)?;
    let mut pos = 0;

    // Optional `strict`, then `graph`/`digraph`, then an optional name.
    if matches!(tokens.get(pos), Some(Token::Ident(s)) if s.eq_ignore_ascii_case("strict")) {
        pos += 1;
    }
    match tokens.get(pos) {
        Some(Token::Ident(s)) if s.eq_ignore_ascii_case("graph") || s.eq_ignore_ascii_case("digraph") => {
            pos += 1;
        }
        _ => return Err(IoError::Format("expected 'graph' or 'digraph'".to_string())),
    }
    if matches!(tokens.get(pos), Some(Token::Ident(_))) {
        pos += 1; // graph name, discarded
    }
    match tokens.get(pos) {
        Some(Token::LBrace) => pos += 1,
        _ => return Err(IoError::Format("expected '{' after graph header".to_string())),
    }

    let mut graph = DotGraph::default();
    loop {
        match tokens.get(pos) {
            Some(Token::RBrace) | None => break,
            Some(Token::Semicolon) => {
                pos += 1;
            }
            Some(Token::Ident(_)) | Some(Token::Quoted(_)) => {
                let name = ident_text(&tokens[pos]).unwrap().to_string();
                pos += 1;

                if matches!(tokens.get(pos), Some(Token::Edge)) {
                    let mut chain = vec![name];
                    while matches!(tokens.get(pos), Some(Token::Edge)) {
                        pos += 1;
                        let next = tokens
                            .get(pos)
                            .and_then(ident_text)
                            .ok_or_else(|| IoError::Format("expected node after edge operator".to_string()))?
                            .to_string();
                        pos += 1;
                        chain.push(next);
                    }
                    for window in chain.windows(2) {
                        graph.edges.push(DotEdge {
                            from: window[0].clone(),
                            to: window[1].clone(),
                        });
                        graph.node_mut(&window[0]);
                        graph.node_mut(&window[1]);
                    }
                    if matches!(tokens.get(pos), Some(Token::LBracket)) {
                        let attrs = parse_attr_list(&tokens, &mut pos)?;
                        for (key, value) in attrs {
                            apply_attr(graph.node_mut(chain.last().unwrap()), &key, &value)?;
                        }
                    }
                } else {
                    graph.node_mut(&name);
                    if matches!(tokens.get(pos), Some(Token::LBracket)) {
                        let attrs = parse_attr_list(&tokens, &mut pos)?;
                        for (key, value) in attrs {
                            apply_attr(graph.node_mut(&name), &key, &value)?;
                        }
                    }
                }
            }
            Some(other) => return Err(IoError::Format(format!("unexpected token {other:?}"))),
        }
    }
    Ok(graph)
}

fn parse_attr_list(tokens: &[Token], pos: &mut usize) -> Result<Vec<(String, String)>, IoError> {
    let mut attrs = Vec::new();
    *pos += 1; // consume '['
    loop {
        match tokens.get(*pos) {
            Some(Token::RBracket) => {
                *pos += 1;
                break;
            }
            Some(Token::Comma) | Some(Token::Semicolon) => {
                *pos += 1;
            }
            Some(Token::Ident(key)) | Some(Token::Quoted(key)) => {
                let key = key.clone();
                *pos += 1;
                match tokens.get(*pos) {
                    Some(Token::Equals) => *pos += 1,
                    _ => return Err(IoError::Format(format!("expected '=' after attribute '{key}'"))),
                }
                let value = tokens
                    .get(*pos)
                    .and_then(ident_text)
                    .ok_or_else(|| IoError::Format(format!("expected value for attribute '{key}'")))?
                    .to_string();
                *pos += 1;
                attrs.push((key, value));
            }
            other => return Err(IoError::Format(format!("unexpected token in attribute list: {other:?}"))),
        }
    }
    Ok(attrs)
}

fn apply_attr(node: &mut DotNode, key: &str, value: &str) -> Result<(), IoError> {
    match key {
        "id" => node.id = Some(value.to_string()),
        "area" => {
            node.area = Some(
                value
                    .parse()
                    .map_err(|_| IoError::Format(format!("invalid area value '{value}'")))?,
            )
        }
        "pos" => {
            let (x, y) = value
                .split_once(',')
                .ok_or_else(|| IoError::Format(format!("invalid pos value '{value}', expected 'x,y'")))?;
            let x: f64 = x.trim().parse().map_err(|_| IoError::Format(format!("invalid pos x '{x}'")))?;
            let y: f64 = y.trim().parse().map_err(|_| IoError::Format(format!("invalid pos y '{y}'")))?;
            node.pos = Some((x, y));
        }
        _ => {} // unknown attributes are accepted and ignored, per the "mechanical glue" scope
    }
    Ok(())
}

/// Serializes `graph` back to DOT text. Round-tripping
/// `parse_dot_buffer(write_dot_buffer(g))` reproduces the same node and
/// edge sets with the same `id`/`area`/`pos` attributes.
pub fn write_dot_buffer(graph: &DotGraph) -> String {
    let mut out = String::from("digraph {\n");
    for node in &graph.nodes {
        out.push_str("  ");
        out.push_str(&quote(&node.name));
        let mut attrs = Vec::new();
        if let Some(id) = &node.id {
            attrs.push(format!("id={}", quote(id)));
        }
        if let Some(area) = node.area {
            attrs.push(format!("area={area}"));
        }
        if let Some((x, y)) = node.pos {
            attrs.push(format!("pos={}", quote(&format!("{x},{y}"))));
        }
        if !attrs.is_empty() {
            out.push_str(" [");
            out.push_str(&attrs.join(", "));
            out.push(']');
        }
        out.push_str(";\n");
    }
    for edge in &graph.edges {
        out.push_str("  ");
        out.push_str(&quote(&edge.from));
        out.push_str(" -> ");
        out.push_str(&quote(&edge.to));
        out.push_str(";\n");
    }
    out.push_str("}\n");
    out
}

fn quote(s: &str) -> String {
    if s.chars().all(|c| c.is_alphanumeric() || c == '_') && !s.is_empty() {
        s.to_string()
    } else {
        format!("\"{}\"", s.replace('"', "\\\""))
    }
}
