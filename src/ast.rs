/// Tree node types for parsed wikitext
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Document(Vec<Node>),
    // Block-level nodes (minimal: only what the inline engine hands off to)
    Paragraph(Vec<Node>),
    // Inline nodes
    Text(String),
    Italic(Vec<Node>),
    Bold(Vec<Node>),
    BoldItalic(Vec<Node>),
    Wikilink {
        target: String,
        children: Vec<Node>, // Caption; defaults to the target text
    },
    ExternalLink {
        target: String,
        children: Vec<Node>, // Caption; defaults to the target text
    },
    Image {
        path: String,
        attrs: Vec<String>, // Format/placement keywords and key=value parameters
        caption: Vec<Node>,
    },
    Template {
        name: String,
        params: Vec<TemplateParam>,
    },
    Ref {
        params: HashMap<String, String>,
        children: Vec<Node>, // Empty for self-closing <ref .../>
    },
    HtmlTag {
        tag: String,
        attrs: HashMap<String, String>,
        children: Vec<Node>,
    },
    HtmlOpeningTag {
        tag: String,
        attrs: HashMap<String, String>,
    },
    HtmlClosingTag {
        tag: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParam {
    pub name: Option<String>, // None for positional parameters
    pub value: Vec<Node>,
}

impl Node {
    /// Plain-text view of the node: concatenated text of visible children.
    /// References, templates and images are invisible in running text.
    pub fn text(&self) -> String {
        match self {
            Node::Text(text) => text.clone(),
            Node::Document(children)
            | Node::Paragraph(children)
            | Node::Italic(children)
            | Node::Bold(children)
            | Node::BoldItalic(children)
            | Node::Wikilink { children, .. }
            | Node::ExternalLink { children, .. }
            | Node::HtmlTag { children, .. } => children.iter().map(Node::text).collect(),
            Node::Image { .. }
            | Node::Template { .. }
            | Node::Ref { .. }
            | Node::HtmlOpeningTag { .. }
            | Node::HtmlClosingTag { .. } => String::new(),
        }
    }

    /// Child fragments, for nodes that have them.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Document(children)
            | Node::Paragraph(children)
            | Node::Italic(children)
            | Node::Bold(children)
            | Node::BoldItalic(children)
            | Node::Wikilink { children, .. }
            | Node::ExternalLink { children, .. }
            | Node::Ref { children, .. }
            | Node::HtmlTag { children, .. } => children,
            _ => &[],
        }
    }
}
