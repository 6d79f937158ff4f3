use std::collections::HashMap;
use wikimark::cursor::ScanCursor;
use wikimark::{Node, Parser, Traits, parse_inline};

fn nodes(src: &str) -> Vec<Node> {
    parse_inline(src).expect("parse should succeed")
}

fn text(s: &str) -> Node {
    Node::Text(s.to_string())
}

#[test]
fn just_text() {
    assert_eq!(nodes("just text"), vec![text("just text")]);
}

#[test]
fn italic_simple() {
    assert_eq!(
        nodes("''italic''"),
        vec![Node::Italic(vec![text("italic")])]
    );
}

#[test]
fn italic_auto_closes_at_end_of_line() {
    assert_eq!(nodes("''italic"), vec![Node::Italic(vec![text("italic")])]);
}

#[test]
fn bold() {
    assert_eq!(nodes("'''bold'''"), vec![Node::Bold(vec![text("bold")])]);
}

#[test]
fn bold_italic() {
    assert_eq!(
        nodes("'''''bold italic'''''"),
        vec![Node::BoldItalic(vec![text("bold italic")])]
    );
}

#[test]
fn wikilink_with_label() {
    assert_eq!(
        nodes("[[Argentina|Ar]]"),
        vec![Node::Wikilink {
            target: "Argentina".to_string(),
            children: vec![text("Ar")],
        }]
    );
}

#[test]
fn wikilink_with_formatted_label() {
    let nodes = nodes("[[Argentina|Argentinian ''Republic'']]");
    let Node::Wikilink { target, children } = &nodes[0] else {
        panic!("expected a wikilink, got {nodes:?}");
    };
    assert_eq!(target, "Argentina");
    assert_eq!(
        children,
        &vec![
            text("Argentinian "),
            Node::Italic(vec![text("Republic")]),
        ]
    );
}

#[test]
fn wikilink_without_label_captions_itself() {
    assert_eq!(
        nodes("[[Argentina]]"),
        vec![Node::Wikilink {
            target: "Argentina".to_string(),
            children: vec![text("Argentina")],
        }]
    );
}

#[test]
fn wikilink_caption_spans_lines() {
    assert_eq!(
        nodes("[[Argentina|first\nsecond]]"),
        vec![Node::Wikilink {
            target: "Argentina".to_string(),
            children: vec![text("first\nsecond")],
        }]
    );
}

#[test]
fn external_link_with_label() {
    assert_eq!(
        nodes("[http://google.com Google]"),
        vec![Node::ExternalLink {
            target: "http://google.com".to_string(),
            children: vec![text("Google")],
        }]
    );
}

#[test]
fn external_link_without_caption() {
    assert_eq!(
        nodes("[http://google.com]"),
        vec![Node::ExternalLink {
            target: "http://google.com".to_string(),
            children: vec![text("http://google.com")],
        }]
    );
}

#[test]
fn bracketed_text_without_protocol_is_not_a_link() {
    assert_eq!(nodes("[just text]"), vec![text("[just text]")]);
}

#[test]
fn bracketed_text_inside_formatting_is_not_a_link() {
    let nodes = nodes("This ''is [just text], trust'' me");
    assert_eq!(
        nodes,
        vec![
            text("This "),
            Node::Italic(vec![text("is [just text], trust")]),
            text(" me"),
        ]
    );
}

#[test]
fn external_link_with_unclosed_formatting_in_caption() {
    // Seen in the wild: the italic never closes, the link bracket must
    // still close both.
    assert_eq!(
        nodes("[http://google.com ''Google]"),
        vec![Node::ExternalLink {
            target: "http://google.com".to_string(),
            children: vec![Node::Italic(vec![text("Google")])],
        }]
    );
}

#[test]
fn html_paired_tag() {
    assert_eq!(
        nodes("<strike>Some text</strike>"),
        vec![Node::HtmlTag {
            tag: "strike".to_string(),
            attrs: HashMap::new(),
            children: vec![text("Some text")],
        }]
    );
}

#[test]
fn html_tag_with_attributes() {
    assert_eq!(
        nodes("<strike class=\"airstrike\" style=\"color: red;\">Some text</strike>"),
        vec![Node::HtmlTag {
            tag: "strike".to_string(),
            attrs: HashMap::from([
                ("class".to_string(), "airstrike".to_string()),
                ("style".to_string(), "color: red;".to_string()),
            ]),
            children: vec![text("Some text")],
        }]
    );
}

#[test]
fn html_self_closing_tag() {
    assert_eq!(
        nodes("<br/>"),
        vec![Node::HtmlTag {
            tag: "br".to_string(),
            attrs: HashMap::new(),
            children: vec![],
        }]
    );
}

#[test]
fn html_self_closing_with_attrs() {
    assert_eq!(
        nodes("<div name=totalpop/>"),
        vec![Node::HtmlTag {
            tag: "div".to_string(),
            attrs: HashMap::from([("name".to_string(), "totalpop".to_string())]),
            children: vec![],
        }]
    );
}

#[test]
fn html_lonely_opening_tag() {
    assert_eq!(
        nodes("<strike>Some text"),
        vec![
            Node::HtmlOpeningTag {
                tag: "strike".to_string(),
                attrs: HashMap::new(),
            },
            text("Some text"),
        ]
    );
}

#[test]
fn html_lonely_closing_tag() {
    assert_eq!(
        nodes("</strike>"),
        vec![Node::HtmlClosingTag {
            tag: "strike".to_string(),
        }]
    );
}

#[test]
fn html_br_is_void() {
    assert_eq!(
        nodes("<br> test"),
        vec![
            Node::HtmlTag {
                tag: "br".to_string(),
                attrs: HashMap::new(),
                children: vec![],
            },
            text(" test"),
        ]
    );
}

#[test]
fn accidental_angle_bracket_is_text() {
    assert_eq!(nodes("< just text"), vec![text("< just text")]);
}

#[test]
fn nowiki_suppresses_all_markup() {
    assert_eq!(
        nodes("<nowiki> all kinds <ref> of {{highly}} irrelevant '' markup </nowiki>"),
        vec![text(" all kinds <ref> of {{highly}} irrelevant '' markup ")]
    );
}

#[test]
fn nowiki_self_closing_is_nothing() {
    assert_eq!(nodes("a<nowiki/>b"), vec![text("ab")]);
}

#[test]
fn sequence_of_text_bold_and_link() {
    let nodes = nodes("This is '''bold''' text with [[Some link|Link]]");
    assert_eq!(nodes.len(), 4);
    assert!(matches!(nodes[0], Node::Text(_)));
    assert!(matches!(nodes[1], Node::Bold(_)));
    assert!(matches!(nodes[2], Node::Text(_)));
    assert!(matches!(nodes[3], Node::Wikilink { .. }));
    let texts: Vec<String> = nodes.iter().map(Node::text).collect();
    assert_eq!(texts, vec!["This is ", "bold", " text with ", "Link"]);
}

#[test]
fn sequence_of_html_and_template() {
    let nodes = nodes("<br>{{small|(Sun of May)}}");
    assert_eq!(nodes.len(), 2);
    assert!(matches!(nodes[0], Node::HtmlTag { .. }));
    assert!(matches!(nodes[1], Node::Template { .. }));
}

#[test]
fn sequence_of_text_and_html() {
    let nodes = nodes("test <b>me</b>");
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0], text("test "));
    assert!(matches!(nodes[1], Node::HtmlTag { .. }));
}

#[test]
fn reference_after_text_with_template_body() {
    let src = "4D S.A.S.<ref>{{Citation | url = http://www.4D.com | title = 4D}}</ref>";
    let nodes = nodes(src);
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0], text("4D S.A.S."));
    let Node::Ref { children, .. } = &nodes[1] else {
        panic!("expected a reference, got {nodes:?}");
    };
    assert!(matches!(children[0], Node::Template { .. }));
}

#[test]
fn reference_parses_even_in_short_context() {
    let src = "4D S.A.S.<ref>{{Citation | url = http://www.4D.com | title = 4D}}</ref>";
    let mut parser = Parser::new(ScanCursor::new(src, Traits::shared_default()));
    let nodes = parser.short_inline(None).expect("parse should succeed");
    assert_eq!(nodes.len(), 2);
    assert!(matches!(nodes[0], Node::Text(_)));
    assert!(matches!(nodes[1], Node::Ref { .. }));
}

#[test]
fn empty_reference_node() {
    let nodes = nodes("text<ref name=price/>");
    assert_eq!(nodes.len(), 2);
    assert_eq!(
        nodes[1],
        Node::Ref {
            params: HashMap::from([("name".to_string(), "price".to_string())]),
            children: vec![],
        }
    );
}

#[test]
fn bold_wrapping_a_wikilink() {
    let nodes = nodes("'''[[Bold link|Link]]'''");
    let Node::Bold(children) = &nodes[0] else {
        panic!("expected bold, got {nodes:?}");
    };
    assert!(matches!(children[0], Node::Wikilink { .. }));
}

#[test]
fn italic_crossing_a_template_stays_one_node() {
    let nodes = nodes("''italic{{tmpl|its ''italic'' too}}''");
    assert_eq!(nodes.len(), 1);
    let Node::Italic(children) = &nodes[0] else {
        panic!("expected italic, got {nodes:?}");
    };
    // The terminator inside the nested template call must not close the
    // outer run: text, then the whole template.
    assert_eq!(children.len(), 2);
    assert_eq!(nodes[0].text(), "italic");
    assert!(matches!(children[1], Node::Template { .. }));
}
