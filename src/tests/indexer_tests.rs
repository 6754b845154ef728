// Sweep pipeline scenarios: discovery, change detection, atomic
// replacement, deletion, cancellation and embedding retry.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::IndexError;
use crate::indexer::CancelToken;
use crate::tests::helpers::*;

#[tokio::test]
async fn three_file_repo_builds_the_expected_graph() {
    let repo = scratch_repo();
    seed_three_file_repo(repo.path());

    let mut indexer = open_indexer(repo.path()).await;
    let stats = indexer.index_repository(&CancelToken::new()).await.unwrap();

    assert_eq!(stats.total_files, 3);
    assert_eq!(stats.indexed, 3);
    assert_eq!(stats.already_indexed, 0);
    assert!(stats.total_symbols >= 1);
    assert!(stats.errors.is_empty());

    let exports = indexer.store().exports_for_file("a.ts").unwrap();
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].name, "foo");

    let imports = indexer.store().imports_for_file("b.ts").unwrap();
    assert!(
        imports
            .iter()
            .any(|i| i.module == "./a" && i.imported_name.as_deref() == Some("foo")),
        "expected import of foo from ./a, got {imports:?}"
    );

    let aggregate = indexer.stats().unwrap();
    assert_eq!(aggregate.total_files, 3);
    assert_eq!(aggregate.files_with_embeddings, 3);
    assert_eq!(aggregate.by_language["typescript"], 2);
    assert_eq!(aggregate.by_language["markdown"], 1);

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn second_sweep_is_idempotent_and_fully_cached() {
    let repo = scratch_repo();
    seed_three_file_repo(repo.path());

    let mut indexer = open_indexer(repo.path()).await;
    let first = indexer.index_repository(&CancelToken::new()).await.unwrap();
    assert_eq!(first.indexed, 3);

    let second = indexer.index_repository(&CancelToken::new()).await.unwrap();
    assert_eq!(second.indexed, 0);
    assert_eq!(second.already_indexed, 3);
    assert!(second.errors.is_empty());
    // No parse work at all on the second sweep.
    assert!(second.cache_hit_rate() >= 0.95);

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn touched_mtime_with_same_bytes_does_not_reindex() {
    let repo = scratch_repo();
    seed_three_file_repo(repo.path());

    let mut indexer = open_indexer(repo.path()).await;
    indexer.index_repository(&CancelToken::new()).await.unwrap();

    // Rewrite identical bytes: mtime moves, hash does not.
    let a_ts = repo.path().join("a.ts");
    let bytes = fs::read(&a_ts).unwrap();
    fs::write(&a_ts, &bytes).unwrap();

    let stats = indexer.index_repository(&CancelToken::new()).await.unwrap();
    assert_eq!(stats.indexed, 0);
    assert_eq!(stats.already_indexed, 3);

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn content_change_reindexes_exactly_that_file() {
    let repo = scratch_repo();
    seed_three_file_repo(repo.path());

    let mut indexer = open_indexer(repo.path()).await;
    indexer.index_repository(&CancelToken::new()).await.unwrap();

    write_file(
        repo.path(),
        "a.ts",
        "export function foo(value: number): number {\n    return value * 3;\n}\n",
    );

    let stats = indexer.index_repository(&CancelToken::new()).await.unwrap();
    assert_eq!(stats.indexed, 1);
    assert_eq!(stats.already_indexed, 2);

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn removed_files_lose_all_dependents() {
    let repo = scratch_repo();
    seed_three_file_repo(repo.path());

    let mut indexer = open_indexer(repo.path()).await;
    indexer.index_repository(&CancelToken::new()).await.unwrap();

    fs::remove_file(repo.path().join("b.ts")).unwrap();
    let stats = indexer.index_repository(&CancelToken::new()).await.unwrap();
    assert_eq!(stats.total_files, 2);

    let store = indexer.store();
    assert!(store.get_file("b.ts").unwrap().is_none());
    assert!(store.symbols_for_file("b.ts").unwrap().is_empty());
    assert!(store.imports_for_file("b.ts").unwrap().is_empty());
    assert!(
        store
            .load_bm25_docs()
            .unwrap()
            .iter()
            .all(|(id, _, _)| id != "b.ts")
    );
    assert_eq!(indexer.stats().unwrap().files_with_embeddings, 2);

    // The vanished file no longer matches keyword queries.
    let hits = indexer.search_keyword("foo", 10).unwrap();
    assert!(hits.iter().all(|h| h.file != "b.ts"));

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn remove_then_index_files_restores_the_file() {
    let repo = scratch_repo();
    seed_three_file_repo(repo.path());

    let mut indexer = open_indexer(repo.path()).await;
    indexer.index_repository(&CancelToken::new()).await.unwrap();

    indexer.remove_files(&[PathBuf::from("a.ts")]).unwrap();
    assert!(indexer.store().get_file("a.ts").unwrap().is_none());
    let hits = indexer.search_keyword("foo", 10).unwrap();
    assert!(hits.iter().all(|h| h.file != "a.ts"));

    let stats = indexer
        .index_files(&[PathBuf::from("a.ts")], &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(stats.indexed, 1);

    let exports = indexer.store().exports_for_file("a.ts").unwrap();
    assert_eq!(exports.len(), 1);
    let hits = indexer.search_keyword("foo", 10).unwrap();
    assert_eq!(hits[0].file, "a.ts");

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn empty_repository_yields_empty_everything() {
    let repo = scratch_repo();

    let mut indexer = open_indexer(repo.path()).await;
    let stats = indexer.index_repository(&CancelToken::new()).await.unwrap();

    assert_eq!(stats.total_files, 0);
    assert_eq!(stats.indexed, 0);
    assert!(stats.errors.is_empty());
    assert!(indexer.search_keyword("anything", 5).unwrap().is_empty());
    assert!(indexer.search_semantic("anything", 5).await.unwrap().is_empty());
    assert!(indexer.search_hybrid("anything", 5).await.unwrap().is_empty());

    let aggregate = indexer.stats().unwrap();
    assert_eq!(aggregate.total_files, 0);
    assert_eq!(aggregate.total_symbols, 0);

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn parse_garbage_still_lands_in_keyword_search() {
    let repo = scratch_repo();
    write_file(
        repo.path(),
        "broken.ts",
        "((( %%% ]]] zzzuniquetoken garbage that will not parse cleanly",
    );

    let mut indexer = open_indexer(repo.path()).await;
    let stats = indexer.index_repository(&CancelToken::new()).await.unwrap();
    assert_eq!(stats.indexed, 1);

    let hits = indexer.search_keyword("zzzuniquetoken", 5).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].file, "broken.ts");

    // Semantic search covers it too (content was embedded regardless).
    let hits = indexer.search_semantic("zzzuniquetoken garbage", 5).await.unwrap();
    assert!(!hits.is_empty());

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn embedding_service_down_degrades_and_recovers() {
    let repo = scratch_repo();
    seed_three_file_repo(repo.path());

    // First pass with the service down: files index without vectors.
    let mut indexer = open_indexer_with(repo.path(), Arc::new(DownEmbedder)).await;
    let stats = indexer.index_repository(&CancelToken::new()).await.unwrap();
    assert_eq!(stats.indexed, 3);
    assert_eq!(stats.files_with_embeddings, 0);
    assert!(stats.errors.iter().any(|e| e.kind == "embedding"));

    // Semantic path returns nothing; hybrid degrades to the keyword order.
    assert!(indexer.search_semantic("foo", 5).await.unwrap().is_empty());
    let hybrid = indexer.search_hybrid("foo", 5).await.unwrap();
    let keyword = indexer.search_keyword("foo", 5).unwrap();
    let hybrid_files: Vec<&str> = hybrid.iter().map(|h| h.file.as_str()).collect();
    let keyword_files: Vec<&str> = keyword.iter().map(|h| h.file.as_str()).collect();
    assert_eq!(hybrid_files, keyword_files);
    indexer.close().await.unwrap();

    // Service recovers: the next sweep retries embeddings for files that
    // have none, without re-parsing anything.
    let mut indexer = open_indexer(repo.path()).await;
    let stats = indexer.index_repository(&CancelToken::new()).await.unwrap();
    assert_eq!(stats.indexed, 0);
    assert_eq!(stats.already_indexed, 3);
    assert_eq!(stats.files_with_embeddings, 3);

    let hits = indexer.search_semantic("doubling numbers documentation", 5).await.unwrap();
    assert!(!hits.is_empty());

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn cancellation_aborts_between_files() {
    let repo = scratch_repo();
    seed_three_file_repo(repo.path());

    let mut indexer = open_indexer(repo.path()).await;
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = indexer.index_repository(&cancel).await;
    assert!(matches!(result, Err(IndexError::Cancelled)));

    // Nothing was half-written: a fresh sweep indexes everything.
    let stats = indexer.index_repository(&CancelToken::new()).await.unwrap();
    assert_eq!(stats.indexed, 3);

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn outline_survives_through_the_cache() {
    let repo = scratch_repo();
    write_file(
        repo.path(),
        "widget.ts",
        "export class Widget {\n    render(): string { return \"x\"; }\n}\n",
    );

    let mut indexer = open_indexer(repo.path()).await;
    indexer.index_repository(&CancelToken::new()).await.unwrap();

    let outline = indexer
        .outline(Path::new("widget.ts"))
        .unwrap()
        .expect("outline for indexed file");
    assert_eq!(outline.len(), 1);
    assert_eq!(outline[0].name, "Widget");
    assert_eq!(outline[0].children.len(), 1);
    assert_eq!(outline[0].children[0].name, "render");

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn boost_config_round_trips_at_runtime() {
    let repo = scratch_repo();
    seed_three_file_repo(repo.path());

    let mut indexer = open_indexer(repo.path()).await;
    indexer.index_repository(&CancelToken::new()).await.unwrap();

    let mut config = indexer.boost_config().unwrap();
    config.file_name_match_boost = 2.0;
    indexer.set_boost_config(&config).unwrap();

    let loaded = indexer.boost_config().unwrap();
    assert!((loaded.file_name_match_boost - 2.0).abs() < 1e-6);

    // Still searchable with the updated weights.
    assert!(!indexer.search_keyword("foo", 5).unwrap().is_empty());

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn force_clean_resets_derived_state() {
    let repo = scratch_repo();
    seed_three_file_repo(repo.path());

    let mut indexer = open_indexer(repo.path()).await;
    indexer.index_repository(&CancelToken::new()).await.unwrap();
    assert_eq!(indexer.stats().unwrap().total_files, 3);

    indexer.clear().unwrap();
    assert_eq!(indexer.stats().unwrap().total_files, 0);
    assert!(indexer.search_keyword("foo", 5).unwrap().is_empty());

    let stats = indexer.index_repository(&CancelToken::new()).await.unwrap();
    assert_eq!(stats.indexed, 3);

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn reopen_keeps_clause_export_boosts() {
    let repo = scratch_repo();
    // Exported via a clause: the symbol's own flag stays unset, the exports
    // table carries the name. Rankings must not shift across a reopen.
    write_file(
        repo.path(),
        "util.ts",
        "function alpha() { return 1; }\nexport { alpha };\n",
    );

    let before = {
        let mut indexer = open_indexer(repo.path()).await;
        indexer.index_repository(&CancelToken::new()).await.unwrap();
        let hits = indexer.search_keyword("alpha", 5).unwrap();
        indexer.close().await.unwrap();
        hits
    };
    assert_eq!(before[0].file, "util.ts");

    let indexer = open_indexer(repo.path()).await;
    let after = indexer.search_keyword("alpha", 5).unwrap();
    assert_eq!(after[0].file, "util.ts");
    assert!(
        (before[0].score - after[0].score).abs() < 1e-6,
        "keyword score changed across reopen: {} vs {}",
        before[0].score,
        after[0].score
    );

    indexer.close().await.unwrap();
}

#[tokio::test]
async fn index_survives_reopen() {
    let repo = scratch_repo();
    seed_three_file_repo(repo.path());

    {
        let mut indexer = open_indexer(repo.path()).await;
        indexer.index_repository(&CancelToken::new()).await.unwrap();
        indexer.close().await.unwrap();
    }

    // A fresh process sees the persisted graph and searches keyword-only
    // state without any re-parse.
    let mut indexer = open_indexer(repo.path()).await;
    let hits = indexer.search_keyword("foo", 5).unwrap();
    assert_eq!(hits[0].file, "a.ts");

    let stats = indexer.index_repository(&CancelToken::new()).await.unwrap();
    assert_eq!(stats.indexed, 0);
    assert_eq!(stats.already_indexed, 3);

    indexer.close().await.unwrap();
}
