/// A wikitext parser: MediaWiki-style inline markup to a typed node tree
pub mod ast;
pub mod cursor;
pub mod error;
pub mod parser;
pub mod traits;

use cursor::ScanCursor;
use std::sync::Arc;

pub use ast::{Node, TemplateParam};
pub use error::{ParseError, Result};
pub use parser::Parser;
pub use traits::Traits;

/// Parse wikitext into a document of paragraphs, with default traits.
pub fn parse(text: &str) -> Result<Node> {
    parse_with_traits(text, Traits::shared_default())
}

/// Parse wikitext under a specific site configuration.
pub fn parse_with_traits(text: &str, traits: Arc<Traits>) -> Result<Node> {
    Parser::new(ScanCursor::new(text, traits)).document()
}

/// Parse a snippet as inline markup only, with default traits.
pub fn parse_inline(text: &str) -> Result<Vec<Node>> {
    Parser::new(ScanCursor::new(text, Traits::shared_default())).inline(None)
}

/// Parse wikitext and serialize the tree as pretty JSON.
pub fn wikitext_to_json(text: &str) -> Result<String> {
    let doc = parse(text)?;
    Ok(serde_json::to_string_pretty(&doc).expect("tree serialization is infallible"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(parse("").unwrap(), Node::Document(vec![]));
    }

    #[test]
    fn test_basic_markup() {
        let doc = parse("''italic'' and '''bold'''").unwrap();
        assert_eq!(
            doc,
            Node::Document(vec![Node::Paragraph(vec![
                Node::Italic(vec![Node::Text("italic".into())]),
                Node::Text(" and ".into()),
                Node::Bold(vec![Node::Text("bold".into())]),
            ])])
        );
    }

    #[test]
    fn test_custom_traits() {
        let traits = std::sync::Arc::new(Traits::new(["Datei"]));
        let doc = parse_with_traits("[[Datei:Karte.png|thumb]]", traits).unwrap();
        let Node::Document(blocks) = &doc else {
            panic!("expected a document");
        };
        assert!(matches!(blocks[0].children()[0], Node::Image { .. }));
    }

    #[test]
    fn test_json_output() {
        let json = wikitext_to_json("[[Argentina]]").unwrap();
        assert!(json.contains("Wikilink"));
        assert!(json.contains("Argentina"));
    }
}
