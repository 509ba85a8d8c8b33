use docsift_core::{
    build, coalesce_by_location, parse_feed, query, DocumentIssue, Field, FeedRecord, QueryEngine, QueryState, SearchConfig,
    SearchError,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn scenario() -> Vec<FeedRecord> {
    vec![
        FeedRecord::new("/a", "Viterbi algorithm", "most likely state sequence", "function"),
        FeedRecord::new("/b", "Forward backward", "posterior marginals", "function"),
    ]
}

fn locations(raw: &str, index: &docsift_core::Index) -> Vec<String> {
    query(raw, index, Some(usize::MAX)).hits.iter().map(|h| h.document.location.clone()).collect()
}

#[test]
fn viterbi_scenario() {
    let index = build(&scenario(), &SearchConfig::default()).unwrap();

    let results = query("viterbi", &index, None);
    assert_eq!(results.hits[0].document.location, "/a");
    assert!(results.hits[0].score > 0.0);

    let results = query("algorithm", &index, None);
    assert_eq!(results.hits[0].document.location, "/a");
}

#[test]
fn title_match_outranks_body_mention() {
    let records = vec![
        FeedRecord::new("/guide", "Guide", "the viterbi decoder explained", "page"),
        FeedRecord::new("/api/viterbi", "viterbi", "decode a sequence", "function"),
    ];
    let index = build(&records, &SearchConfig::default()).unwrap();
    assert_eq!(locations("viterbi ", &index), vec!["/api/viterbi", "/guide"]);
}

#[test]
fn equal_scores_break_ties_by_location() {
    let records = vec![
        FeedRecord::new("/zz", "Baum Welch", "", "function"),
        FeedRecord::new("/b", "Baum Welch", "", "function"),
        FeedRecord::new("/a", "Baum Welch", "", "function"),
    ];
    let index = build(&records, &SearchConfig::default()).unwrap();
    assert_eq!(locations("baum ", &index), vec!["/a", "/b", "/zz"]);
}

#[test]
fn symbol_only_input_is_empty_not_an_error() {
    let index = build(&scenario(), &SearchConfig::default()).unwrap();
    let results = query("(*&^%", &index, None);
    assert_eq!(results.state, QueryState::Empty);
    assert!(results.hits.is_empty());
}

#[test]
fn empty_corpus_queries_return_nothing() {
    let engine = QueryEngine::new(SearchConfig::default());
    let summary = engine.rebuild(&[]).unwrap();
    assert_eq!(summary.num_docs, 0);
    let results = engine.query("viterbi", None).unwrap();
    assert!(results.hits.is_empty());
    assert_eq!(results.total_hits, 0);
}

#[test]
fn duplicate_location_fails_naming_both_records() {
    let mut records = scenario();
    records.push(FeedRecord::new("/a", "Viterbi again", "", "method"));
    match build(&records, &SearchConfig::default()) {
        Err(SearchError::InvalidDocument(issues)) => {
            assert_eq!(issues.len(), 1);
            match &issues[0] {
                DocumentIssue::DuplicateLocation { location, first, second, first_title, second_title } => {
                    assert_eq!(location, "/a");
                    assert_eq!((*first, *second), (0, 2));
                    assert_eq!(first_title, "Viterbi algorithm");
                    assert_eq!(second_title, "Viterbi again");
                }
                other => panic!("unexpected issue {other:?}"),
            }
        }
        other => panic!("expected InvalidDocument, got {other:?}"),
    }
}

#[test]
fn stopwords_disabled_allows_exact_word_search() {
    let mut config = SearchConfig::default();
    config.tokenizer.stop_words = docsift_core::tokenizer::StopWords::None;
    let records = vec![FeedRecord::new("/io", "The IO module", "read and write", "module")];
    let index = build(&records, &config).unwrap();
    assert_eq!(locations("and ", &index), vec!["/io"]);

    let default_index = build(&records, &SearchConfig::default()).unwrap();
    assert!(locations("and ", &default_index).is_empty());
}

#[test]
fn body_highlights_use_original_offsets() {
    let records = vec![FeedRecord::new("/hmm", "HMM", "Fit an HMM with Baum-Welch, then decode.", "page")];
    let index = build(&records, &SearchConfig::default()).unwrap();
    let hit = &query("baum welch decoding ", &index, None).hits[0];
    let body = hit.highlights.iter().find(|h| h.field == Field::Body).unwrap();
    let text = &hit.document.body;
    let pieces: Vec<&str> = body.spans.iter().map(|s| &text[s.start..s.end]).collect();
    // "Baum" and "Welch" are separated by a hyphen, so they stay separate spans
    assert_eq!(pieces, vec!["Baum", "Welch", "decode"]);
}

#[test]
fn documenter_payload_end_to_end() {
    let payload = r#"var documenterSearchIndex = {"docs":
[{"location":"api/#HiddenMarkovModels.viterbi","page":"API reference","title":"HiddenMarkovModels.viterbi","text":"viterbi(hmm, obs_seq)\n\nApply the Viterbi algorithm to infer the most likely state sequence.","category":"function"},
{"location":"api/#HiddenMarkovModels.forward_backward","page":"API reference","title":"HiddenMarkovModels.forward_backward","text":"Apply the forward-backward algorithm to infer the posterior state and transition marginals.","category":"function"},
{"location":"tutorial/","page":"Tutorial","title":"Tutorial","text":"warning: Work in progress","category":"page"},
{"location":"tutorial/","page":"Tutorial","title":"Tutorial","text":"Take a look at the files in test.","category":"page"}]
}"#;
    let records = parse_feed(payload).unwrap();
    assert!(matches!(build(&records, &SearchConfig::default()), Err(SearchError::InvalidDocument(_))));

    let index = build(&coalesce_by_location(records), &SearchConfig::default()).unwrap();
    assert_eq!(index.num_docs(), 3);
    let hits = locations("viterbi", &index);
    assert_eq!(hits[0], "api/#HiddenMarkovModels.viterbi");
    assert_eq!(locations("progress ", &index), vec!["tutorial/"]);
    assert_eq!(locations("files", &index), vec!["tutorial/"]);
}

#[test]
fn rebuilding_identical_feed_gives_identical_rankings() {
    let records = scenario();
    let a = build(&records, &SearchConfig::default()).unwrap();
    let b = build(&records, &SearchConfig::default()).unwrap();
    for q in ["viterbi", "state seq", "algorithm ", "forward backward", "m"] {
        let ra: Vec<(String, u32)> = query(q, &a, None).hits.iter().map(|h| (h.document.location.clone(), h.score.to_bits())).collect();
        let rb: Vec<(String, u32)> = query(q, &b, None).hits.iter().map(|h| (h.document.location.clone(), h.score.to_bits())).collect();
        assert_eq!(ra, rb, "query {q:?}");
    }
}

// Consonant-only words are never stop words and the stemmer leaves them alone,
// so generated titles map one-to-one onto index terms. Some are joined with `_`
// like identifiers, so prefixes can end on the connector.
fn word() -> impl Strategy<Value = String> {
    "[bcdfghjklmnpqrstvwxz]{4,8}(_[bcdfghjklmnpqrstvwxz]{1,4})?"
}

fn corpus() -> impl Strategy<Value = Vec<FeedRecord>> {
    prop::collection::vec(
        (prop::collection::vec(word(), 1..4), prop::collection::vec(word(), 0..12)),
        1..8,
    )
    .prop_map(|docs| {
        docs.into_iter()
            .enumerate()
            .map(|(i, (title, body))| FeedRecord::new(format!("/doc/{i}"), title.join(" "), body.join(" "), "section"))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Querying a document's title finds the document.
    #[test]
    fn prop_title_query_finds_document(records in corpus()) {
        let index = build(&records, &SearchConfig::default()).unwrap();
        for record in &records {
            let hits = locations(&format!("{} ", record.title), &index);
            prop_assert!(hits.iter().take(10).any(|l| l == &record.location), "{} missing from {:?}", record.location, hits);
        }
    }

    /// Every prefix of an indexed term matches at least what the whole term matches.
    #[test]
    fn prop_prefix_is_superset(records in corpus()) {
        let index = build(&records, &SearchConfig::default()).unwrap();
        let terms: Vec<String> = index.terms().map(|(t, _)| t.to_string()).collect();
        for term in terms.iter().take(8) {
            let full: BTreeSet<String> = locations(term, &index).into_iter().collect();
            let complete: BTreeSet<String> = locations(&format!("{term} "), &index).into_iter().collect();
            prop_assert!(full.is_superset(&complete));
            for end in 1..=term.len() {
                let prefix: BTreeSet<String> = locations(&term[..end], &index).into_iter().collect();
                prop_assert!(prefix.is_superset(&full), "prefix {:?} of {:?}", &term[..end], term);
            }
        }
    }

    /// Two builds from the same feed rank every title query the same way.
    #[test]
    fn prop_build_is_idempotent(records in corpus()) {
        let a = build(&records, &SearchConfig::default()).unwrap();
        let b = build(&records, &SearchConfig::default()).unwrap();
        for record in &records {
            let ra: Vec<(String, u32)> = query(&record.title, &a, None).hits.iter().map(|h| (h.document.location.clone(), h.score.to_bits())).collect();
            let rb: Vec<(String, u32)> = query(&record.title, &b, None).hits.iter().map(|h| (h.document.location.clone(), h.score.to_bits())).collect();
            prop_assert_eq!(ra, rb);
        }
    }
}
