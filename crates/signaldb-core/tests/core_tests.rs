use std::fs;
use std::path::Path;
use tempfile::TempDir;

use signaldb_core::config::{Config, DataSettings, EngineSettings};
use signaldb_core::record::load_corpus;
use signaldb_core::types::{AssetFilter, MetaValue, StructuredFilter, ASSET_FIELD, HANDLE_FIELD};
use signaldb_core::Error;

#[test]
fn filters_with_same_predicates_share_a_key() {
    let a = StructuredFilter::handle("Pentosh1").sentiment("bullish");
    let b = StructuredFilter::new()
        .with("gpt_sentiment", "bullish")
        .and_then(|f| f.with(HANDLE_FIELD, "Pentosh1"))
        .expect("valid filter");
    assert_eq!(a, b);
    assert_eq!(a.cache_key(), b.cache_key());
    assert_ne!(a.cache_key(), StructuredFilter::handle("Pentosh1").cache_key());
    assert_ne!(StructuredFilter::new().cache_key(), a.cache_key());
}

#[test]
fn text_and_bool_values_do_not_collide_in_key() {
    let t = StructuredFilter::new().with("is_market_related", "true").expect("filter");
    let b = StructuredFilter::new().market_related(true);
    assert_ne!(t.cache_key(), b.cache_key());
}

#[test]
fn asset_field_rejected_as_structured_predicate() {
    let err = StructuredFilter::new().with(ASSET_FIELD, "BTC").expect_err("must reject");
    assert!(matches!(err, Error::InvalidFilter(_)));
}

#[test]
fn filter_matches_requires_every_predicate() {
    let filter = StructuredFilter::handle("alice").market_related(true);
    let mut meta = signaldb_core::Metadata::new();
    meta.insert("screen_name".into(), MetaValue::from("alice"));
    assert!(!filter.matches(&meta), "missing field fails");
    meta.insert("is_market_related".into(), MetaValue::Bool(true));
    assert!(filter.matches(&meta));
    meta.insert("is_market_related".into(), MetaValue::Bool(false));
    assert!(!filter.matches(&meta));
    assert!(StructuredFilter::new().matches(&meta), "empty filter matches everything");
}

#[test]
fn asset_request_rules() {
    assert_eq!(AssetFilter::from_request(None, None), AssetFilter::Disabled);
    assert_eq!(AssetFilter::from_request(Some("Blur"), None), AssetFilter::Disabled);
    let list = vec!["eth".to_string(), "BLUR".to_string()];
    assert_eq!(AssetFilter::from_request(None, Some(list.as_slice())), AssetFilter::Disabled);

    let assets = vec!["sol".to_string(), " ".to_string()];
    match AssetFilter::from_request(Some("btc"), Some(assets.as_slice())) {
        AssetFilter::Any(set) => assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["SOL".to_string()]),
        AssetFilter::Disabled => panic!("assets should win over asset"),
    }
    let blank = vec![String::new()];
    match AssetFilter::from_request(Some("btc"), Some(blank.as_slice())) {
        AssetFilter::Any(set) => assert!(set.contains("BTC")),
        AssetFilter::Disabled => panic!("blank assets fall back to asset"),
    }
}

#[test]
fn config_defaults_when_engine_section_missing() {
    let tmp = TempDir::new().expect("tmp");
    fs::write(tmp.path().join("config.toml"), "[data]\ntable = \"posts\"\n").expect("write");
    let cfg = Config::load_from(tmp.path()).expect("load");
    assert_eq!(cfg.engine().expect("engine"), EngineSettings::default());
    assert_eq!(cfg.data().expect("data").table, "posts");
}

#[test]
fn config_reads_engine_overrides_and_rejects_invalid() {
    let tmp = TempDir::new().expect("tmp");
    fs::write(tmp.path().join("config.toml"), "[engine]\nrrf_k = 30\nlexical_cache_ttl_secs = 600\n").expect("write");
    let cfg = Config::load_from(tmp.path()).expect("load");
    let engine = cfg.engine().expect("engine");
    assert_eq!(engine.rrf_k, 30);
    assert_eq!(engine.overfetch_factor, 2);
    assert_eq!(engine.lexical_cache_ttl().map(|d| d.as_secs()), Some(600));

    let bad = TempDir::new().expect("tmp");
    fs::write(bad.path().join("config.toml"), "[engine]\noverfetch_factor = 0\n").expect("write");
    assert!(matches!(Config::load_from(bad.path()), Err(Error::InvalidConfig(_))));
}

#[test]
fn explicit_settings_readable_by_key() {
    let engine = EngineSettings { rrf_k: 10, ..EngineSettings::default() };
    let data = DataSettings { lancedb_dir: "/srv/lance".into(), ..DataSettings::default() };
    let cfg = Config::from_settings(&engine, &data);
    assert_eq!(cfg.get::<u32>("engine.rrf_k").expect("rrf_k"), 10);
    assert!(cfg.get::<u32>("engine.missing").is_err());
    let data = cfg.data().expect("data");
    assert_eq!(data.lancedb_path(Path::new("/base")), Path::new("/srv/lance"));
    assert_eq!(data.corpus_path(Path::new("/base")), Path::new("/base/data/corpus"));
}

#[test]
fn only_path_failures_degrade() {
    assert!(Error::StoreUnavailable("down".into()).is_degradation());
    assert!(Error::Embedding("nan".into()).is_degradation());
    assert!(!Error::EmptyQuery.is_degradation());
    assert!(!Error::InvalidFilter("x".into()).is_degradation());
}

#[test]
fn load_corpus_reads_jsonl_and_skips_bad_lines() {
    let tmp = TempDir::new().expect("tmp");
    let nested = tmp.path().join("2024");
    fs::create_dir_all(&nested).expect("mkdir");
    fs::write(
        nested.join("a.jsonl"),
        concat!(
            r#"{"id": "1", "text": "Fed cuts rates", "screen_name": "alice", "gpt_assets": ["BTC"], "info_final_score": 7}"#, "\n",
            "not json\n",
            "\n",
            r#"{"text": "", "screen_name": "nobody"}"#, "\n",
            r#"{"text": "liquidity returns", "is_market_related": true}"#, "\n",
        ),
    )
    .expect("write");
    fs::write(tmp.path().join("ignored.txt"), "x").expect("write");

    let records = load_corpus(tmp.path()).expect("load");
    assert_eq!(records.len(), 2);
    let first = &records[0].document;
    assert_eq!(first.id, "1");
    assert_eq!(first.meta_str(ASSET_FIELD), Some("[\"BTC\"]"));
    assert_eq!(first.metadata.get("info_final_score"), Some(&MetaValue::Number(7.0)));
    assert_eq!(records[1].document.id, "row_5");
}

#[test]
fn load_corpus_reads_csv_export_with_typed_cells() {
    let tmp = TempDir::new().expect("tmp");
    let csv_path = tmp.path().join("posts_all.csv");
    fs::write(
        &csv_path,
        concat!(
            "id,text,gpt_reason,screen_name,gpt_assets,info_final_score,is_market_related,embedding_context\n",
            "42,\"Fed pivot, liquidity back\",rates,Pentosh1,\"[\"\"BTC\"\",\"\"ETH\"\"]\",8.5,True,\"[0.5, 1.0]\"\n",
            ",gm frens,,Pentosh1,[],,False,\n",
            ",,,nobody,,,,\n",
        ),
    )
    .expect("write");

    let records = load_corpus(&csv_path).expect("load");
    assert_eq!(records.len(), 2);

    let first = &records[0];
    assert_eq!(first.document.id, "42");
    assert_eq!(first.document.text, "Fed pivot, liquidity back | rates");
    assert_eq!(first.document.meta_str(ASSET_FIELD), Some(r#"["BTC","ETH"]"#));
    assert_eq!(first.document.metadata.get("info_final_score"), Some(&MetaValue::Number(8.5)));
    assert_eq!(first.embedding, Some(vec![0.5, 1.0]));
    assert!(StructuredFilter::handle("Pentosh1").market_related(true).matches(&first.document.metadata));

    let second = &records[1];
    assert_eq!(second.document.id, "row_2");
    assert_eq!(second.document.metadata.get("is_market_related"), Some(&MetaValue::Bool(false)));
    assert!(!second.document.metadata.contains_key("info_final_score"));
    assert_eq!(second.embedding, None);

    // directory walk picks csv files up too
    assert_eq!(load_corpus(tmp.path()).expect("load dir").len(), 2);
}
