/// Site configuration ("traits") and the compiled-pattern bundle
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use unicode_casefold::UnicodeCaseFold;

/// The character sequences that can start an inline markup construct.
/// Alternation order matters: the regex engine prefers earlier branches at
/// the same position, so `<nowiki…>` and `<ref…>` must come before bare `<`.
const FORMATTING: &str =
    r"'{2,5}|\[\[|\{\{|\[[a-z]+://|<nowiki[^>]*>|<ref[^>]*>|<";

/// Closers that end a short inline run without being consumed by it:
/// a closing reference tag or a closing template marker just ahead.
const INLINE_EOL: &str = r"</ref>|\}\}";

/// As `INLINE_EOL`, plus a closing-bracket run. A run of length 1 is an
/// external-link closer; a longer run is plain text (a `]]` belongs to
/// nobody at this level). The dispatcher tells them apart by length.
const INLINE_EOL_BR: &str = r"</ref>|\}\}|\]+";

/// Opening markers that force balanced consumption during a bracket-aware
/// scan, grouped for `chunk_end` composition.
const OPENERS: &str = r"(?P<o>\{\{|\[\[)";

/// Immutable per-site configuration: which namespace aliases denote
/// file/image links, plus every compiled pattern the scanning engine uses.
/// Built once, shared by reference into every parse; the caches fill in
/// lazily and are never invalidated.
pub struct Traits {
    file_namespaces: HashSet<String>,
    formatting: String,
    inline_until: RwLock<HashMap<String, Arc<Regex>>>,
    short_until: RwLock<HashMap<String, Arc<Regex>>>,
    short_until_brackets: RwLock<HashMap<String, Arc<Regex>>>,
    chunk_end: RwLock<HashMap<String, Arc<Regex>>>,
    plain: RwLock<HashMap<String, Arc<Regex>>>,
}

static DEFAULT_TRAITS: Lazy<Arc<Traits>> =
    Lazy::new(|| Arc::new(Traits::new(["File", "Image"])));

impl Traits {
    pub fn new<I, S>(file_namespaces: I) -> Traits
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Traits {
            file_namespaces: file_namespaces
                .into_iter()
                .map(|ns| case_fold(ns.as_ref()))
                .collect(),
            formatting: FORMATTING.to_string(),
            inline_until: RwLock::new(HashMap::new()),
            short_until: RwLock::new(HashMap::new()),
            short_until_brackets: RwLock::new(HashMap::new()),
            chunk_end: RwLock::new(HashMap::new()),
            plain: RwLock::new(HashMap::new()),
        }
    }

    /// The shared default configuration (English namespace aliases).
    pub fn shared_default() -> Arc<Traits> {
        DEFAULT_TRAITS.clone()
    }

    /// A doctored trigger set, for exercising the dispatcher's defenses.
    #[cfg(test)]
    pub(crate) fn with_formatting<I, S>(file_namespaces: I, formatting: &str) -> Traits
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut traits = Traits::new(file_namespaces);
        traits.formatting = formatting.to_string();
        traits
    }

    /// True if `name` is a configured file/image namespace alias.
    /// Namespace matching is case-insensitive with full Unicode folding,
    /// so `file:`, `FILE:` and folded non-ASCII aliases all hit.
    pub fn is_file_namespace(&self, name: &str) -> bool {
        self.file_namespaces.contains(&case_fold(name))
    }

    /// Paragraph-spanning compound: terminator, any trigger, or end of line.
    pub fn inline_until(&self, until: Option<&str>) -> Arc<Regex> {
        let formatting = &self.formatting;
        memoized(&self.inline_until, until.unwrap_or(""), || {
            compile(&compose_inline(until, None, formatting))
        })
    }

    /// Short compound: as `inline_until`, with a tag-closer early exit.
    pub fn short_until(&self, until: Option<&str>) -> Arc<Regex> {
        let formatting = &self.formatting;
        memoized(&self.short_until, until.unwrap_or(""), || {
            compile(&compose_inline(until, Some(INLINE_EOL), formatting))
        })
    }

    /// Short compound with the single-closing-bracket early exit as well.
    pub fn short_until_brackets(&self, until: Option<&str>) -> Arc<Regex> {
        let formatting = &self.formatting;
        memoized(&self.short_until_brackets, until.unwrap_or(""), || {
            compile(&compose_inline(until, Some(INLINE_EOL_BR), formatting))
        })
    }

    /// Terminator-or-opening-marker pattern for bracket-aware scans.
    pub fn chunk_end(&self, until: &str) -> Arc<Regex> {
        memoized(&self.chunk_end, until, || {
            compile(&format!("{OPENERS}|(?P<t>{until})"))
        })
    }

    /// A plain compiled terminator, memoized by source text.
    pub fn pattern(&self, src: &str) -> Arc<Regex> {
        memoized(&self.plain, src, || compile(src))
    }
}

/// Full Unicode case folding, for alias comparison.
fn case_fold(s: &str) -> String {
    s.chars().case_fold().collect()
}

/// Union of terminator, early-exit closers, triggers and end of line, as
/// named groups so one scan can report which condition fired first.
fn compose_inline(until: Option<&str>, early_exit: Option<&str>, formatting: &str) -> String {
    let mut alternatives = Vec::new();
    if let Some(u) = until {
        alternatives.push(format!("(?P<t>{u})"));
    }
    if let Some(x) = early_exit {
        alternatives.push(format!("(?P<x>{x})"));
    }
    alternatives.push(format!("(?P<f>{formatting})"));
    alternatives.push("$".to_string());
    alternatives.join("|")
}

fn compile(src: &str) -> Regex {
    Regex::new(src).expect("scan patterns are built from known-good fragments")
}

fn memoized(
    map: &RwLock<HashMap<String, Arc<Regex>>>,
    key: &str,
    build: impl FnOnce() -> Regex,
) -> Arc<Regex> {
    if let Some(re) = map.read().expect("pattern cache lock").get(key) {
        return re.clone();
    }
    let re = Arc::new(build());
    map.write()
        .expect("pattern cache lock")
        .entry(key.to_string())
        .or_insert(re)
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_aliases_fold_case() {
        let traits = Traits::new(["File", "Image", "Датотека"]);
        assert!(traits.is_file_namespace("file"));
        assert!(traits.is_file_namespace("FILE"));
        assert!(traits.is_file_namespace("Image"));
        assert!(traits.is_file_namespace("ДАТОТЕКА"));
        assert!(!traits.is_file_namespace("Category"));
    }

    #[test]
    fn until_cache_memoizes_per_terminator() {
        let traits = Traits::new(["File"]);
        let first = traits.inline_until(Some(r"\]\]"));
        let second = traits.inline_until(Some(r"\]\]"));
        assert!(Arc::ptr_eq(&first, &second));
        let other = traits.inline_until(Some("''"));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn caches_for_the_three_variants_are_independent() {
        let traits = Traits::new(["File"]);
        let long = traits.inline_until(Some("''"));
        let short = traits.short_until(Some("''"));
        let brackets = traits.short_until_brackets(Some("''"));
        assert!(!Arc::ptr_eq(&long, &short));
        assert!(!Arc::ptr_eq(&short, &brackets));
    }

    #[test]
    fn compound_prefers_terminator_over_trigger() {
        let traits = Traits::new(["File"]);
        let re = traits.inline_until(Some("''"));
        let caps = re.captures("''rest").expect("must match");
        assert!(caps.name("t").is_some());
        assert!(caps.name("f").is_none());
    }

    #[test]
    fn compound_falls_back_to_end_of_line() {
        let traits = Traits::new(["File"]);
        let re = traits.inline_until(Some("''"));
        let caps = re.captures("no markup here").expect("must match");
        assert!(caps.name("t").is_none());
        assert!(caps.name("f").is_none());
        assert_eq!(caps.get(0).map(|m| m.start()), Some("no markup here".len()));
    }

    #[test]
    fn shared_default_is_reused() {
        assert!(Arc::ptr_eq(&Traits::shared_default(), &Traits::shared_default()));
    }
}
