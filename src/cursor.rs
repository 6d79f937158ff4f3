/// Line-aware consuming scanner over wikitext
use crate::error::{ParseError, Result};
use crate::traits::Traits;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

// Comments are stripped in one naive pass before line segmentation.
// Known limitation: comment lookalikes inside <nowiki> are stripped too.
static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.+?-->").unwrap());
static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r\n|\r|\n").unwrap());

/// Scanning mode for short inline runs: which closers ahead end the run
/// without being consumed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EarlyExit {
    /// A closing reference tag or closing template marker just ahead.
    Tags,
    /// As `Tags`, plus a single closing bracket that is not part of `]]`,
    /// i.e. the closer of an enclosing external link.
    Brackets,
}

/// Result of one compound inline scan: whichever condition occurred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hit {
    /// The caller-supplied terminator.
    Terminator(String),
    /// A markup trigger, to be classified and dispatched.
    Trigger(String),
    /// A closer belonging to an enclosing construct. The scan consumes it;
    /// the dispatcher rewinds it so the outer parser sees it untouched.
    Boundary(String),
    /// End of the current line, nothing else matched first.
    Eol,
}

/// Consuming scanner over the comment-stripped, line-segmented input.
/// Advances only forward except for the explicit bounded `rewind`.
pub struct ScanCursor {
    traits: Arc<Traits>,
    lines: Vec<String>,
    lineno: isize, // -1 only transiently before the constructor's first advance
    pos: usize,    // byte offset into the current line
    matched: Option<String>,
}

impl ScanCursor {
    pub fn new(text: &str, traits: Arc<Traits>) -> ScanCursor {
        let stripped = COMMENT.replace_all(text, "");
        let mut lines: Vec<String> = LINE_BREAK.split(&stripped).map(str::to_string).collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        let mut cursor = ScanCursor {
            traits,
            lines,
            lineno: -1,
            pos: 0,
            matched: None,
        };
        cursor.advance_line(1);
        cursor
    }

    pub fn traits(&self) -> &Arc<Traits> {
        &self.traits
    }

    pub fn lineno(&self) -> isize {
        self.lineno
    }

    /// Position snapshot for the dispatcher's progress guard.
    pub fn position(&self) -> (isize, usize) {
        (self.lineno, self.pos)
    }

    fn line(&self) -> Option<&str> {
        if self.lineno < 0 {
            return None;
        }
        self.lines.get(self.lineno as usize).map(String::as_str)
    }

    /// Remaining text of the active line, or empty if exhausted.
    pub fn current(&self) -> &str {
        self.line().map_or("", |line| &line[self.pos..])
    }

    /// Moves to the next/previous line and reinitializes the in-line scanner.
    pub fn advance_line(&mut self, delta: isize) {
        self.lineno += delta;
        self.pos = 0;
    }

    pub fn eol(&self) -> bool {
        self.current().is_empty()
    }

    /// True iff the line index is past the last line and no content remains.
    pub fn at_end(&self) -> bool {
        self.lineno >= self.lines.len() as isize
            || (self.lineno + 1 >= self.lines.len() as isize && self.eol())
    }

    /// The last `scan`-family match, read by the dispatcher and sub-parsers
    /// to decide control flow. `check` and `skip` never touch it.
    pub fn matched(&self) -> Option<&str> {
        self.matched.as_deref()
    }

    pub fn matched_is(&self, text: &str) -> bool {
        self.matched.as_deref() == Some(text)
    }

    /// Consume a match anchored at the current position.
    pub fn scan(&mut self, re: &Regex) -> Option<String> {
        let (end, text) = {
            let line = self.line()?;
            let m = re.find_at(line, self.pos)?;
            if m.start() != self.pos {
                return None;
            }
            (m.end(), m.as_str().to_string())
        };
        self.pos = end;
        self.matched = Some(text.clone());
        Some(text)
    }

    /// Peek a match anchored at the current position, consuming nothing.
    pub fn check(&self, re: &Regex) -> Option<String> {
        let line = self.line()?;
        let m = re.find_at(line, self.pos)?;
        if m.start() != self.pos {
            return None;
        }
        Some(m.as_str().to_string())
    }

    /// Consume a match anchored at the current position without recording it.
    pub fn skip(&mut self, re: &Regex) -> bool {
        let end = {
            let Some(line) = self.line() else { return false };
            match re.find_at(line, self.pos) {
                Some(m) if m.start() == self.pos => m.end(),
                _ => return false,
            }
        };
        self.pos = end;
        true
    }

    /// True if the pattern matches anywhere in the rest of the current line.
    pub fn ahead(&self, re: &Regex) -> bool {
        self.line()
            .is_some_and(|line| re.find_at(line, self.pos).is_some())
    }

    /// Advance to the first match of `re` ahead on the current line,
    /// consuming everything up to and through it. The matched text is
    /// stripped from the returned chunk unless `keep_matched`. Returns
    /// `None` (without advancing) when the line has no match.
    pub fn scan_until(&mut self, re: &Regex, keep_matched: bool) -> Result<Option<String>> {
        self.guard_end()?;
        let found = {
            let Some(line) = self.line() else {
                return Ok(None);
            };
            re.find_at(line, self.pos).map(|m| {
                let upto = if keep_matched { m.end() } else { m.start() };
                (
                    line[self.pos..upto].to_string(),
                    m.end(),
                    m.as_str().to_string(),
                )
            })
        };
        match found {
            Some((chunk, end, text)) => {
                self.pos = end;
                self.matched = Some(text);
                Ok(Some(chunk))
            }
            None => {
                self.matched = None;
                Ok(None)
            }
        }
    }

    /// One step of a compound inline scan: consume up to whichever of
    /// {terminator, early-exit closer, trigger, end of line} comes first
    /// and report which it was. The compound patterns always match, their
    /// end-of-line branch at the latest.
    pub fn scan_inline(&mut self, pat: &Regex) -> Result<(String, Hit)> {
        self.guard_end()?;
        let (chunk, end, text, hit) = {
            let line = self.line().unwrap_or("");
            let caps = pat
                .captures_at(line, self.pos)
                .expect("compound patterns match at end of line");
            let whole = caps.get(0).expect("whole match");
            let hit = if let Some(t) = caps.name("t") {
                Hit::Terminator(t.as_str().to_string())
            } else if let Some(x) = caps.name("x") {
                Hit::Boundary(x.as_str().to_string())
            } else if let Some(f) = caps.name("f") {
                Hit::Trigger(f.as_str().to_string())
            } else {
                Hit::Eol
            };
            (
                line[self.pos..whole.start()].to_string(),
                whole.end(),
                whole.as_str().to_string(),
                hit,
            )
        };
        self.pos = end;
        self.matched = Some(text);
        Ok((chunk, hit))
    }

    /// Bracket-aware multi-line scan: advance through input until `until`
    /// matches, consuming any nested `{{…}}` / `[[…]]` span whole so its
    /// innards cannot end the outer scan. End of input without a match is a
    /// fatal "Unfinished scan".
    pub fn scan_through_until(&mut self, until: &str, keep_matched: bool) -> Result<String> {
        let chunk_end = self.traits.chunk_end(until);
        let mut res = String::new();
        let matched = loop {
            let step = {
                let line = self.line().unwrap_or("");
                chunk_end.captures_at(line, self.pos).map(|caps| {
                    let whole = caps.get(0).expect("whole match");
                    (
                        line[self.pos..whole.end()].to_string(),
                        whole.end(),
                        whole.as_str().to_string(),
                        caps.name("o").is_some(),
                    )
                })
            };
            match step {
                Some((chunk, end, text, is_opener)) => {
                    self.pos = end;
                    self.matched = Some(text.clone());
                    res.push_str(&chunk);
                    if is_opener {
                        let closer = if text == "{{" { r"\}\}" } else { r"\]\]" };
                        let nested = self.scan_through_until(closer, true)?;
                        res.push_str(&nested);
                    } else {
                        break text;
                    }
                }
                None => {
                    res.push_str(self.current());
                    res.push('\n');
                    self.advance_line(1);
                    if self.at_end() {
                        return Err(self.failure(format!("Unfinished scan: {until} not found")));
                    }
                }
            }
        };
        if !keep_matched {
            res.truncate(res.len() - matched.len());
        }
        Ok(res)
    }

    /// Strictly sequential multi-line scan: as `scan_through_until` but with
    /// no bracket balancing. Used where nesting is irrelevant, e.g. scanning
    /// to a closing reference or nowiki tag.
    pub fn scan_continued_until(&mut self, until: &str, keep_matched: bool) -> Result<String> {
        let re = self.traits.pattern(until);
        let mut res = String::new();
        let matched = loop {
            let step = {
                let line = self.line().unwrap_or("");
                re.find_at(line, self.pos).map(|m| {
                    (
                        line[self.pos..m.end()].to_string(),
                        m.end(),
                        m.as_str().to_string(),
                    )
                })
            };
            match step {
                Some((chunk, end, text)) => {
                    self.pos = end;
                    self.matched = Some(text.clone());
                    res.push_str(&chunk);
                    break text;
                }
                None => {
                    res.push_str(self.current());
                    res.push('\n');
                    self.advance_line(1);
                    if self.at_end() {
                        return Err(self.failure(format!("Unfinished scan: {until} not found")));
                    }
                }
            }
        };
        if !keep_matched {
            res.truncate(res.len() - matched.len());
        }
        Ok(res)
    }

    /// Move the in-line offset back by `n` bytes, to reprocess a delimiter
    /// that was consumed speculatively.
    pub fn rewind(&mut self, n: usize) {
        self.pos = self.pos.saturating_sub(n);
    }

    /// True when a short inline run has nothing more to consume here: the
    /// line is exhausted, or a closer belonging to an enclosing construct
    /// sits immediately ahead.
    pub fn inline_eol(&self, exit: EarlyExit) -> bool {
        let current = self.current();
        if current.is_empty() || current.starts_with("</ref>") || current.starts_with("}}") {
            return true;
        }
        exit == EarlyExit::Brackets && current.starts_with(']') && !current.starts_with("]]")
    }

    /// A parse failure at the current location.
    pub fn failure(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.lineno.max(0) as usize,
            content: self.current().to_string(),
        }
    }

    fn guard_end(&self) -> Result<()> {
        if self.at_end() {
            Err(self.failure("End of input reached"))
        } else {
            Ok(())
        }
    }
}
