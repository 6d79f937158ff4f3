/// Recursive-descent inline dispatcher and construct sub-parsers
use crate::ast::{Node, TemplateParam};
use crate::cursor::{EarlyExit, Hit, ScanCursor};
use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static EXTERNAL_LINK_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[([a-z]+://)$").unwrap());
static NOWIKI_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<nowiki([^>]*)>$").unwrap());
static REF_EMPTY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<ref([^>]*)/>$").unwrap());
static REF_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<ref([^>]*)>$").unwrap());
static NAMESPACE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\s|\]:][^|\]:]*:").unwrap());
const EXTERNAL_TARGET_END: &str = r"\s+|\]";
static PIPE_OR_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\||\]\]").unwrap());
static TEMPLATE_PARAM_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[^=|{}\[\]<>\s][^=|{}\[\]<>]*=").unwrap());
static IMAGE_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:thumb(?:nail)?|frame(?:less)?|border|left|right|center|none|baseline|sub|super|top|text-top|middle|bottom|text-bottom|x?\d+px|\d+x\d+px|upright(?:=[0-9.]+)?|(?:alt|link|page|class|lang)=[^|\]]*)\s*",
    )
    .unwrap()
});
static HTML_CLOSING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\s*[A-Za-z][A-Za-z0-9]*\s*>").unwrap());
static HTML_TAG_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z0-9]*").unwrap());
static HTML_TAG_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"/>|>").unwrap());
static PARAM_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\s=]+").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*").unwrap());
static EQ_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"=\s*").unwrap());

/// Tags that take no children even without a self-closing slash.
const VOID_TAGS: &[&str] = &["br", "hr", "img", "wbr", "meta"];

/// A classified markup trigger.
#[derive(Debug, Clone, PartialEq)]
enum Trigger {
    Quotes(usize),
    WikilinkOpen,
    TemplateOpen,
    ExternalLinkOpen(String),
    NowikiOpen,
    NowikiEmpty,
    RefEmpty(String),
    RefOpen(String),
    HtmlOpen,
    Literal(String),
}

impl Trigger {
    fn classify(text: &str) -> Trigger {
        match text {
            "[[" => Trigger::WikilinkOpen,
            "{{" => Trigger::TemplateOpen,
            "<" => Trigger::HtmlOpen,
            t if !t.is_empty() && t.chars().all(|c| c == '\'') => Trigger::Quotes(t.len()),
            t => {
                if let Some(caps) = EXTERNAL_LINK_OPEN.captures(t) {
                    Trigger::ExternalLinkOpen(caps[1].to_string())
                } else if let Some(caps) = NOWIKI_OPEN.captures(t) {
                    if caps[1].trim_end().ends_with('/') {
                        Trigger::NowikiEmpty
                    } else {
                        Trigger::NowikiOpen
                    }
                } else if let Some(caps) = REF_EMPTY.captures(t) {
                    Trigger::RefEmpty(caps[1].to_string())
                } else if let Some(caps) = REF_OPEN.captures(t) {
                    Trigger::RefOpen(caps[1].to_string())
                } else {
                    Trigger::Literal(t.to_string())
                }
            }
        }
    }
}

pub struct Parser {
    ctx: ScanCursor,
}

impl Parser {
    pub fn new(ctx: ScanCursor) -> Parser {
        Parser { ctx }
    }

    /// Parse the whole input as a document of paragraphs.
    pub fn document(&mut self) -> Result<Node> {
        Ok(Node::Document(self.paragraphs(None)?))
    }

    /// Paragraph-spanning entry: the outermost parse of a block and the
    /// parse of link captions. Crosses line boundaries, emitting explicit
    /// line breaks; a required terminator that never appears is fatal.
    pub fn inline(&mut self, until: Option<&str>) -> Result<Vec<Node>> {
        let start = self.ctx.lineno();
        let mut nodes = Vec::new();
        loop {
            let before = self.ctx.position();
            if self.ctx.at_end() {
                match until {
                    Some(u) => {
                        return Err(self
                            .ctx
                            .failure(format!("{u} not found, starting from line {start}")));
                    }
                    None => break,
                }
            }
            let pat = self.ctx.traits().inline_until(until);
            let (chunk, hit) = self.ctx.scan_inline(&pat)?;
            push_text(&mut nodes, &chunk);
            match hit {
                Hit::Terminator(_) => break,
                Hit::Trigger(text) => {
                    let node = self.inline_formatting(&text, EarlyExit::Tags)?;
                    push_node(&mut nodes, node);
                }
                Hit::Boundary(closer) => {
                    self.ctx.rewind(closer.len());
                    break;
                }
                Hit::Eol => {
                    if self.ctx.at_end() {
                        match until {
                            Some(u) => {
                                return Err(self
                                    .ctx
                                    .failure(format!("{u} not found, starting from line {start}")));
                            }
                            None => break,
                        }
                    }
                    push_text(&mut nodes, "\n");
                    self.ctx.advance_line(1);
                }
            }
            self.guard_progress(before)?;
        }
        Ok(nodes)
    }

    /// Single-line auto-closing entry: emphasis runs and captions nested one
    /// level. Never advances past the current line, which is what gives
    /// unterminated markup its implicit close at line end or construct
    /// boundary.
    pub fn short_inline(&mut self, until: Option<&str>) -> Result<Vec<Node>> {
        self.short_inline_exit(until, EarlyExit::Tags)
    }

    fn short_inline_exit(&mut self, until: Option<&str>, exit: EarlyExit) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            let before = self.ctx.position();
            let pat = match exit {
                EarlyExit::Tags => self.ctx.traits().short_until(until),
                EarlyExit::Brackets => self.ctx.traits().short_until_brackets(until),
            };
            let (chunk, hit) = self.ctx.scan_inline(&pat)?;
            push_text(&mut nodes, &chunk);
            match hit {
                Hit::Terminator(_) => break,
                Hit::Eol => break,
                Hit::Boundary(closer) => {
                    if closer.starts_with(']') && closer.len() > 1 {
                        // A ]] run closes nothing at this level; it is text.
                        push_text(&mut nodes, &closer);
                    } else {
                        self.ctx.rewind(closer.len());
                        break;
                    }
                }
                Hit::Trigger(text) => {
                    let node = self.inline_formatting(&text, exit)?;
                    push_node(&mut nodes, node);
                }
            }
            if self.ctx.inline_eol(exit) && !self.at_own_terminator(until) {
                break;
            }
            self.guard_progress(before)?;
        }
        Ok(nodes)
    }

    /// Multi-line entry with a mandatory terminator, for reference bodies.
    /// Once content crosses a line boundary it hands off to the block layer
    /// for the remainder.
    pub fn long_inline(&mut self, until: &str) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            let before = self.ctx.position();
            if self.ctx.at_end() {
                return Err(self.ctx.failure(format!("{until} not found")));
            }
            let pat = self.ctx.traits().inline_until(Some(until));
            let (chunk, hit) = self.ctx.scan_inline(&pat)?;
            push_text(&mut nodes, &chunk);
            match hit {
                Hit::Terminator(_) => break,
                Hit::Trigger(text) => {
                    let node = self.inline_formatting(&text, EarlyExit::Tags)?;
                    push_node(&mut nodes, node);
                }
                Hit::Boundary(closer) => {
                    self.ctx.rewind(closer.len());
                    break;
                }
                Hit::Eol => {
                    if self.ctx.at_end() {
                        return Err(self.ctx.failure(format!("{until} not found")));
                    }
                    self.ctx.advance_line(1);
                    nodes.extend(self.paragraphs(Some(until))?);
                    break;
                }
            }
            self.guard_progress(before)?;
        }
        Ok(nodes)
    }

    /// Minimal block-layer hand-off: blank-line skipping plus one paragraph
    /// per inline run. Lists, headings and tables live elsewhere.
    pub fn paragraphs(&mut self, until: Option<&str>) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            while !self.ctx.at_end() && self.ctx.eol() {
                self.ctx.advance_line(1);
            }
            if self.ctx.at_end() {
                if let Some(u) = until {
                    return Err(self.ctx.failure(format!("{u} not found")));
                }
                break;
            }
            let children = self.inline(until)?;
            if !children.is_empty() {
                nodes.push(Node::Paragraph(children));
            }
            if until.is_some() || self.ctx.at_end() {
                break;
            }
        }
        Ok(nodes)
    }

    /// A misclassified trigger that consumes nothing would loop forever;
    /// every dispatcher iteration must either break or move the cursor.
    fn guard_progress(&self, before: (isize, usize)) -> Result<()> {
        let after = self.ctx.position();
        if after == before {
            return Err(self
                .ctx
                .failure(format!("Infinite loop on position {}", after.1)));
        }
        Ok(())
    }

    /// True when the short-inline loop's own terminator is what sits ahead,
    /// so the loop must consume it rather than early-exit around it.
    fn at_own_terminator(&self, until: Option<&str>) -> bool {
        until.is_some_and(|u| {
            let re = self.ctx.traits().pattern(u);
            self.ctx.check(&re).is_some()
        })
    }

    fn inline_formatting(&mut self, matched: &str, exit: EarlyExit) -> Result<Node> {
        match Trigger::classify(matched) {
            Trigger::Quotes(5) => Ok(Node::BoldItalic(
                self.short_inline_exit(Some("'''''"), exit)?,
            )),
            Trigger::Quotes(3) => Ok(Node::Bold(self.short_inline_exit(Some("'''"), exit)?)),
            Trigger::Quotes(2) => Ok(Node::Italic(self.short_inline_exit(Some("''"), exit)?)),
            // A 4-quote run means nothing; it stays text.
            Trigger::Quotes(n) => Ok(Node::Text("'".repeat(n))),
            Trigger::WikilinkOpen => {
                if self.file_prefix_ahead() {
                    self.image()
                } else {
                    self.wikilink()
                }
            }
            Trigger::ExternalLinkOpen(protocol) => self.external_link(&protocol),
            Trigger::TemplateOpen => self.template(),
            Trigger::NowikiOpen => Ok(Node::Text(
                self.ctx.scan_continued_until("</nowiki>", false)?,
            )),
            Trigger::NowikiEmpty => Ok(Node::Text(String::new())),
            Trigger::RefEmpty(attrs) => Ok(Node::Ref {
                params: parse_params(&attrs),
                children: Vec::new(),
            }),
            Trigger::RefOpen(attrs) => self.reference(&attrs),
            Trigger::HtmlOpen => Ok(self
                .html()?
                .unwrap_or_else(|| Node::Text("<".to_string()))),
            Trigger::Literal(text) => Ok(Node::Text(text)),
        }
    }

    fn file_prefix_ahead(&self) -> bool {
        match self.ctx.check(&NAMESPACE_PREFIX) {
            Some(prefix) => self
                .ctx
                .traits()
                .is_file_namespace(prefix.trim_end_matches(':')),
            None => false,
        }
    }

    // [[Target]] or [[Target|caption]]
    fn wikilink(&mut self) -> Result<Node> {
        let target = self.ctx.scan_through_until(r"\||\]\]", false)?;
        let children = if self.ctx.matched_is("|") {
            self.inline(Some(r"\]\]"))?
        } else {
            vec![Node::Text(target.clone())]
        };
        Ok(Node::Wikilink { target, children })
    }

    // [http://example.org] or [http://example.org caption]
    fn external_link(&mut self, protocol: &str) -> Result<Node> {
        let link = self.ctx.scan_continued_until(EXTERNAL_TARGET_END, false)?;
        let target = format!("{protocol}{link}");
        let stopped_at_space = self
            .ctx
            .matched()
            .is_some_and(|m| m.chars().all(char::is_whitespace));
        let children = if stopped_at_space {
            self.short_inline_exit(Some(r"\]"), EarlyExit::Brackets)?
        } else {
            vec![Node::Text(target.clone())]
        };
        Ok(Node::ExternalLink { target, children })
    }

    // [[File:Name.jpg|thumb|left|Caption]]
    fn image(&mut self) -> Result<Node> {
        self.ctx.skip(&NAMESPACE_PREFIX);
        let path = self.ctx.scan_through_until(r"\||\]\]", false)?;
        let mut attrs = Vec::new();
        let mut caption = Vec::new();
        while self.ctx.matched_is("|") {
            match self.ctx.scan(&IMAGE_FORMAT) {
                Some(keyword) if self.ctx.check(&PIPE_OR_CLOSE).is_some() => {
                    attrs.push(keyword.trim().to_string());
                    self.ctx.scan(&PIPE_OR_CLOSE);
                }
                Some(keyword) => {
                    // Not a bare keyword after all; it opens the caption.
                    self.ctx.rewind(keyword.len());
                    caption = self.inline(Some(r"\||\]\]"))?;
                }
                None => {
                    caption = self.inline(Some(r"\||\]\]"))?;
                }
            }
        }
        Ok(Node::Image {
            path,
            attrs,
            caption,
        })
    }

    // {{name}} or {{name|positional|key=value}}
    fn template(&mut self) -> Result<Node> {
        let name = self
            .ctx
            .scan_through_until(r"\||\}\}", false)?
            .trim()
            .to_string();
        let mut params = Vec::new();
        while self.ctx.matched_is("|") {
            let name_part = self.ctx.scan(&TEMPLATE_PARAM_NAME).map(|raw| {
                raw.trim().trim_end_matches('=').trim_end().to_string()
            });
            let value = self.inline(Some(r"\||\}\}"))?;
            params.push(TemplateParam {
                name: name_part,
                value,
            });
        }
        Ok(Node::Template { name, params })
    }

    fn reference(&mut self, attrs: &str) -> Result<Node> {
        let children = self.long_inline("</ref>")?;
        Ok(Node::Ref {
            params: parse_params(attrs),
            children,
        })
    }

    // <tag attr="value">…</tag>, self-closing and void forms, and lonely
    // opening/closing tags. Declines (None) when the text is not a tag
    // after all, so the dispatcher emits the literal `<` instead.
    fn html(&mut self) -> Result<Option<Node>> {
        if let Some(closing) = self.ctx.scan(&HTML_CLOSING) {
            let tag = closing
                .trim_start_matches('/')
                .trim_end_matches('>')
                .trim()
                .to_string();
            return Ok(Some(Node::HtmlClosingTag { tag }));
        }
        let Some(tag) = self.ctx.scan(&HTML_TAG_NAME) else {
            return Ok(None);
        };
        if self.ctx.at_end() {
            self.ctx.rewind(tag.len());
            return Ok(None);
        }
        let Some(attr_chunk) = self.ctx.scan_until(&HTML_TAG_END, false)? else {
            // No closing > on this line; the < was not a tag after all.
            self.ctx.rewind(tag.len());
            return Ok(None);
        };
        let attrs = parse_params(&attr_chunk);
        if self.ctx.matched_is("/>") || VOID_TAGS.contains(&tag.to_ascii_lowercase().as_str()) {
            return Ok(Some(Node::HtmlTag {
                tag,
                attrs,
                children: Vec::new(),
            }));
        }
        let closer = format!("</{tag}>");
        let closer_re = self.ctx.traits().pattern(&closer);
        if self.ctx.ahead(&closer_re) {
            let children = self.short_inline(Some(&closer))?;
            Ok(Some(Node::HtmlTag {
                tag,
                attrs,
                children,
            }))
        } else {
            Ok(Some(Node::HtmlOpeningTag { tag, attrs }))
        }
    }
}

/// Append literal text, merging into a trailing text fragment.
fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}

fn push_node(nodes: &mut Vec<Node>, node: Node) {
    match node {
        Node::Text(text) => push_text(nodes, &text),
        other => nodes.push(other),
    }
}

/// Tokenize a tag parameter string: `name`, `name=value`, `name="value"`,
/// `name='value'`. A bare name maps to itself.
fn parse_params(s: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut pos = 0;
    loop {
        pos = skip_at(s, pos, &SPACES);
        let Some(name) = match_at(s, pos, &PARAM_NAME).map(str::to_string) else {
            break;
        };
        pos += name.len();
        pos = skip_at(s, pos, &SPACES);
        if s[pos..].starts_with('=') {
            pos = skip_at(s, pos, &EQ_SPACES);
            let value = if let Some(quote) = s[pos..].chars().next().filter(|c| *c == '\'' || *c == '"')
            {
                pos += 1;
                let end = s[pos..]
                    .find(quote)
                    .map_or(s.len(), |offset| pos + offset);
                let value = s[pos..end].to_string();
                pos = (end + 1).min(s.len());
                value
            } else {
                let end = s[pos..]
                    .find(char::is_whitespace)
                    .map_or(s.len(), |offset| pos + offset);
                let value = s[pos..end].to_string();
                pos = end;
                value
            };
            params.insert(name, value);
        } else {
            params.insert(name.clone(), name);
        }
    }
    params
}

fn match_at<'a>(s: &'a str, pos: usize, re: &Regex) -> Option<&'a str> {
    re.find_at(s, pos)
        .filter(|m| m.start() == pos)
        .map(|m| m.as_str())
}

fn skip_at(s: &str, pos: usize, re: &Regex) -> usize {
    match_at(s, pos, re).map_or(pos, |m| pos + m.len())
}
