use lazy_static::lazy_static;
use regex::{Match, Regex};
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::index::{Field, Span};

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*|\p{N}[\p{L}\p{N}_]*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Stop-word filtering applied after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopWords {
    /// Built-in English list.
    English,
    /// No filtering; every token of sufficient length is indexed.
    None,
    Custom(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Tokens with fewer characters than this are dropped.
    pub min_token_len: usize,
    pub stop_words: StopWords,
    /// Reduce terms with the Snowball English stemmer.
    pub stem: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self { min_token_len: 2, stop_words: StopWords::English, stem: true }
    }
}

#[derive(Debug, Clone)]
enum StopSet {
    English,
    Empty,
    Custom(HashSet<String>),
}

impl StopSet {
    fn contains(&self, token: &str) -> bool {
        match self {
            StopSet::English => STOPWORDS.contains(token),
            StopSet::Empty => false,
            StopSet::Custom(words) => words.contains(token),
        }
    }
}

/// A normalized token together with where it came from in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Index term (normalized and, when enabled, stemmed).
    pub term: String,
    /// Normalized but unstemmed form, used for prefix expansion.
    pub surface: String,
    pub field: Field,
    /// Ordinal of the word within the field. Dropped words still consume a position.
    pub position: u32,
    /// Byte range of the word in the original text.
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Tokenizer {
    min_len: usize,
    stem: bool,
    stop_words: StopSet,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(&TokenizerConfig::default())
    }
}

impl Tokenizer {
    pub fn new(config: &TokenizerConfig) -> Self {
        let stop_words = match &config.stop_words {
            StopWords::English => StopSet::English,
            StopWords::None => StopSet::Empty,
            StopWords::Custom(words) if words.is_empty() => StopSet::Empty,
            StopWords::Custom(words) => StopSet::Custom(words.iter().map(|w| normalize(w)).collect()),
        };
        Self { min_len: config.min_token_len, stem: config.stem, stop_words }
    }

    /// Lazily tokenize `text`. The iterator is cheap to clone, and calling this
    /// again on the same text yields the same sequence.
    pub fn tokenize<'a>(&'a self, text: &'a str, field: Field) -> Tokens<'a> {
        Tokens { tokenizer: self, text, field, offset: 0, position: 0 }
    }

    pub fn is_stopword(&self, surface: &str) -> bool {
        self.stop_words.contains(surface)
    }

    /// Map a normalized surface form to its index term.
    pub fn stem(&self, surface: &str) -> String {
        if self.stem {
            STEMMER.stem(surface).into_owned()
        } else {
            surface.to_string()
        }
    }

    /// Turn one regex word into a token. An `open` word is one still being
    /// typed: it keeps trailing `_` or `'` and skips length and stop-word filters.
    pub(crate) fn analyze(&self, mat: Match<'_>, position: u32, field: Field, open: bool) -> Option<Token> {
        let word = if open { mat.as_str() } else { mat.as_str().trim_end_matches(|c: char| !c.is_alphanumeric()) };
        let surface = normalize(word);
        if surface.is_empty() {
            return None;
        }
        if !open && (surface.chars().count() < self.min_len || self.is_stopword(&surface)) {
            return None;
        }
        let term = self.stem(&surface);
        let span = Span { start: mat.start(), end: mat.start() + word.len() };
        Some(Token { term, surface, field, position, span })
    }
}

/// Raw word matches in `text`, before normalization or filtering.
pub(crate) fn words(text: &str) -> impl Iterator<Item = Match<'_>> {
    RE.find_iter(text)
}

/// NFKD decomposition with combining marks removed, then lowercase.
pub fn normalize(word: &str) -> String {
    word.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    tokenizer: &'a Tokenizer,
    text: &'a str,
    field: Field,
    offset: usize,
    position: u32,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let mat = RE.find_at(self.text, self.offset)?;
            self.offset = mat.end();
            let position = self.position;
            self.position += 1;
            if let Some(token) = self.tokenizer.analyze(mat, position, self.field, false) {
                return Some(token);
            }
        }
    }
}

/// Tokenize text into (term, position) with the default configuration.
pub fn tokenize(text: &str) -> Vec<(String, u32)> {
    Tokenizer::default()
        .tokenize(text, Field::Body)
        .map(|t| (t.term, t.position))
        .collect()
}
