// BM25 inverted index
//
// Classic BM25 over tokenized file content (k1 = 1.5, b = 0.75, tunable),
// plus a symbol-aware variant that reweights documents by which role the
// query matched: file name, exported symbol, defined symbol, imported name
// or plain content. Postings live in memory; the relational store persists
// doc rows and global stats and the indexer rehydrates on open.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Tunable scoring parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
    /// Tokens shorter than this are dropped.
    pub min_token_len: usize,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            min_token_len: 2,
        }
    }
}

/// Multiplicative boost weights for symbol-aware search. Persisted in the
/// `boost_config` table and updatable at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostConfig {
    pub file_name_match_boost: f32,
    pub exported_symbol_boost: f32,
    pub defined_symbol_boost: f32,
    pub all_symbol_boost: f32,
    pub import_only_penalty: f32,
    pub content_match_weight: f32,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            file_name_match_boost: 0.3,
            exported_symbol_boost: 0.25,
            defined_symbol_boost: 0.15,
            all_symbol_boost: 0.1,
            import_only_penalty: 0.2,
            content_match_weight: 0.05,
        }
    }
}

/// Symbol role facts for one document, supplied at index time. All sets hold
/// lowercased tokens.
#[derive(Debug, Clone, Default)]
pub struct Bm25DocMeta {
    pub file_name_tokens: HashSet<String>,
    /// Names of exported symbols.
    pub exported: HashSet<String>,
    /// Names of defined but not exported symbols.
    pub defined: HashSet<String>,
    /// Names imported from other modules.
    pub imported: HashSet<String>,
}

impl Bm25DocMeta {
    /// Tokenized view of a symbol or file name (whole name plus its
    /// non-word-split parts, lowercased).
    pub fn name_tokens(name: &str) -> HashSet<String> {
        let mut tokens: HashSet<String> = tokenize_with(name, 1).into_iter().collect();
        tokens.insert(name.to_lowercase());
        tokens
    }
}

struct Bm25Doc {
    tokens: HashMap<String, u32>,
    length: u32,
    text: String,
    meta: Bm25DocMeta,
}

#[derive(Debug, Clone)]
pub struct Bm25Hit {
    pub id: String,
    pub score: f32,
    pub snippet: String,
}

pub struct Bm25Index {
    params: Bm25Params,
    docs: HashMap<String, Bm25Doc>,
    /// term -> doc id -> term frequency
    postings: HashMap<String, HashMap<String, u32>>,
    total_len: u64,
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new(Bm25Params::default())
    }
}

impl Bm25Index {
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            docs: HashMap::new(),
            postings: HashMap::new(),
            total_len: 0,
        }
    }

    /// Lowercase, split on non-word characters, drop short tokens.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        tokenize_with(text, self.params.min_token_len)
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn avg_doc_len(&self) -> f32 {
        if self.docs.is_empty() {
            0.0
        } else {
            self.total_len as f32 / self.docs.len() as f32
        }
    }

    pub fn df(&self, term: &str) -> u32 {
        self.postings.get(term).map(|p| p.len() as u32).unwrap_or(0)
    }

    /// Index or replace a document.
    pub fn index(&mut self, doc_id: &str, text: &str, meta: Bm25DocMeta) {
        self.remove(doc_id);

        let tokens = self.tokenize(text);
        let length = tokens.len() as u32;
        let mut freqs: HashMap<String, u32> = HashMap::new();
        for token in tokens {
            *freqs.entry(token).or_insert(0) += 1;
        }

        for (term, tf) in &freqs {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(doc_id.to_string(), *tf);
        }

        self.total_len += length as u64;
        self.docs.insert(
            doc_id.to_string(),
            Bm25Doc {
                tokens: freqs,
                length,
                text: text.to_string(),
                meta,
            },
        );
    }

    /// Rehydrate a document from persisted token frequencies. The text is
    /// supplied separately (it lives in the files table) so snippets keep
    /// working after a restart.
    pub fn restore(
        &mut self,
        doc_id: &str,
        tokens: HashMap<String, u32>,
        length: u32,
        text: String,
        meta: Bm25DocMeta,
    ) {
        self.remove(doc_id);
        for (term, tf) in &tokens {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(doc_id.to_string(), *tf);
        }
        self.total_len += length as u64;
        self.docs.insert(
            doc_id.to_string(),
            Bm25Doc {
                tokens,
                length,
                text,
                meta,
            },
        );
    }

    /// Remove a document; unknown ids are a no-op.
    pub fn remove(&mut self, doc_id: &str) {
        let Some(doc) = self.docs.remove(doc_id) else {
            return;
        };
        self.total_len -= doc.length as u64;
        for term in doc.tokens.keys() {
            if let Some(posting) = self.postings.get_mut(term) {
                posting.remove(doc_id);
                if posting.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
    }

    /// Persisted view of one doc: (length, term -> tf). None for unknown ids.
    pub fn doc_row(&self, doc_id: &str) -> Option<(u32, &HashMap<String, u32>)> {
        self.docs.get(doc_id).map(|d| (d.length, &d.tokens))
    }

    /// Document frequency table for persistence.
    pub fn df_table(&self) -> HashMap<String, u32> {
        self.postings
            .iter()
            .map(|(term, posting)| (term.clone(), posting.len() as u32))
            .collect()
    }

    /// Classic BM25 search. Scores are non-negative; ties break on id
    /// ascending; an empty index returns no hits.
    pub fn search(&self, query: &str, k: usize) -> Vec<Bm25Hit> {
        let query_terms = self.tokenize(query);
        let mut hits = self.score(&query_terms);
        sort_hits(&mut hits);
        hits.truncate(k);
        self.attach_snippets(hits, &query_terms)
    }

    /// BM25 with symbol-aware multiplicative boosts.
    pub fn search_symbol_aware(&self, query: &str, k: usize, boosts: &BoostConfig) -> Vec<Bm25Hit> {
        let query_terms = self.tokenize(query);
        let query_set: HashSet<&str> = query_terms.iter().map(String::as_str).collect();

        let mut hits = self.score(&query_terms);
        for hit in &mut hits {
            let meta = &self.docs[&hit.id].meta;
            hit.score *= symbol_multiplier(meta, &query_set, boosts);
        }
        sort_hits(&mut hits);
        hits.truncate(k);
        self.attach_snippets(hits, &query_terms)
    }

    fn score(&self, query_terms: &[String]) -> Vec<Bm25Hit> {
        if self.docs.is_empty() || query_terms.is_empty() {
            return Vec::new();
        }

        let n = self.docs.len() as f32;
        let avg_len = self.avg_doc_len().max(1.0);
        let mut scores: HashMap<&str, f32> = HashMap::new();

        for term in query_terms {
            let Some(posting) = self.postings.get(term) else {
                continue;
            };
            let df = posting.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for (doc_id, tf) in posting {
                let doc = &self.docs[doc_id];
                let tf = *tf as f32;
                let norm = self.params.k1
                    * (1.0 - self.params.b + self.params.b * doc.length as f32 / avg_len);
                let contribution = idf * (tf * (self.params.k1 + 1.0)) / (tf + norm);
                *scores.entry(doc_id.as_str()).or_insert(0.0) += contribution;
            }
        }

        scores
            .into_iter()
            .map(|(id, score)| Bm25Hit {
                id: id.to_string(),
                score,
                snippet: String::new(),
            })
            .collect()
    }

    fn attach_snippets(&self, mut hits: Vec<Bm25Hit>, query_terms: &[String]) -> Vec<Bm25Hit> {
        for hit in &mut hits {
            if let Some(doc) = self.docs.get(&hit.id) {
                hit.snippet = snippet_for(&doc.text, query_terms);
            }
        }
        hits
    }
}

fn tokenize_with(text: &str, min_len: usize) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.len() >= min_len)
        .map(str::to_string)
        .collect()
}

/// Boost multiplier for one document, clamped to [0, 5].
fn symbol_multiplier(meta: &Bm25DocMeta, query: &HashSet<&str>, boosts: &BoostConfig) -> f32 {
    let hits_set = |set: &HashSet<String>| query.iter().any(|q| set.contains(*q));

    let file_match = hits_set(&meta.file_name_tokens);
    let exported_match = hits_set(&meta.exported);
    let defined_match = hits_set(&meta.defined);
    let imported_match = hits_set(&meta.imported);
    let any_symbol = exported_match || defined_match;

    let mut multiplier = 1.0f32;
    if file_match {
        multiplier *= 1.0 + boosts.file_name_match_boost;
    }
    if exported_match {
        multiplier *= 1.0 + boosts.exported_symbol_boost;
    }
    if defined_match {
        multiplier *= 1.0 + boosts.defined_symbol_boost;
    }
    if any_symbol {
        multiplier *= 1.0 + boosts.all_symbol_boost;
    }
    if imported_match && !file_match && !any_symbol {
        multiplier *= 1.0 - boosts.import_only_penalty;
    }
    if !file_match && !any_symbol && !imported_match {
        multiplier *= 1.0 + boosts.content_match_weight;
    }
    multiplier.clamp(0.0, 5.0)
}

fn sort_hits(hits: &mut [Bm25Hit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// First line containing a query term, trimmed and bounded. Falls back to the
/// first non-empty line.
pub fn snippet_for(text: &str, query_terms: &[String]) -> String {
    const MAX_SNIPPET: usize = 160;

    let matching = text.lines().find(|line| {
        let lower = line.to_lowercase();
        query_terms.iter().any(|t| lower.contains(t.as_str()))
    });
    let line = matching
        .or_else(|| text.lines().find(|l| !l.trim().is_empty()))
        .unwrap_or("");
    line.trim().chars().take(MAX_SNIPPET).collect()
}
