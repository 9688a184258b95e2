//! End-to-end runs of the library pipeline over a realistic payload.

mod util;

use corpusprint::core::actors::ArtifactKind;
use corpusprint::core::classify::StrategyKind;
use corpusprint::core::extract::ArtifactExtractor;
use corpusprint::core::hasher::fingerprint;
use corpusprint::core::record::{Payload, SourceRecord, parse_payload};
use corpusprint::infra::output::{OutputLayout, write_outputs};
use corpusprint::{ActorMaps, Pipeline, PipelineOptions, TopicClassifier};

fn scenario() -> (Payload, usize)
{
    let text = serde_json::to_string(&util::scenario_payload()).unwrap();
    parse_payload(&text).unwrap()
}

#[test]
fn scenario_payload_end_to_end()
{
    let (payload, dropped) = scenario();
    assert_eq!(dropped, 1);

    let classifier = TopicClassifier::keyword_only();
    let out = Pipeline::new(&classifier, PipelineOptions::default())
        .run(payload)
        .unwrap();

    let r = &out.report;
    assert_eq!(r.records, 6);
    assert_eq!(r.entries, 5);
    assert_eq!(r.degraded_records, 1);
    assert_eq!(r.title_clusters, 1);
    assert!(!r.model_available);
    assert_eq!(r.classified_by_model, 0);
}

#[test]
fn case_and_whitespace_variants_share_an_entry()
{
    let (payload, _) = scenario();
    let classifier = TopicClassifier::keyword_only();
    let out = Pipeline::new(&classifier, PipelineOptions::default())
        .run(payload)
        .unwrap();

    let entry = &out.index[&fingerprint("Buy XTC here")];
    assert_eq!(entry.records.len(), 2);
    assert!(
        entry
            .records
            .iter()
            .all(|r| r.term == "xtc")
    );

    // Naive timestamps are read as UTC
    assert_eq!(
        entry
            .first_seen
            .unwrap()
            .to_rfc3339(),
        "2025-01-01T09:00:00+00:00"
    );
    assert_eq!(
        entry
            .last_seen
            .unwrap()
            .to_rfc3339(),
        "2025-01-02T10:00:00+00:00"
    );
}

#[test]
fn unparseable_timestamp_leaves_range_absent()
{
    let (payload, _) = scenario();
    let classifier = TopicClassifier::keyword_only();
    let out = Pipeline::new(&classifier, PipelineOptions::default())
        .run(payload)
        .unwrap();

    let entry = &out.index[&fingerprint(util::VENDOR_TEXT)];
    assert!(entry.first_seen.is_none());
    assert!(entry.last_seen.is_none());

    // The value itself is carried through as collected
    assert_eq!(
        entry.records[0]
            .record
            .collected_at
            .as_deref(),
        Some("not a timestamp")
    );
}

#[test]
fn shared_email_links_two_sources()
{
    let (payload, _) = scenario();
    let classifier = TopicClassifier::keyword_only();
    let out = Pipeline::new(&classifier, PipelineOptions::default())
        .run(payload)
        .unwrap();

    let urls = out
        .actors
        .sources(ArtifactKind::Email, "vendor@example.com")
        .unwrap();
    assert_eq!(
        urls.iter()
            .collect::<Vec<_>>(),
        ["http://a.onion", "http://c.onion"]
    );

    let wallets = out
        .actors
        .sources(ArtifactKind::BtcWallet, "1BoatSLRHtKNngkdXEeobR76b53LETtpyT")
        .unwrap();
    assert_eq!(
        wallets
            .iter()
            .collect::<Vec<_>>(),
        ["http://c.onion"]
    );
}

#[test]
fn mirrored_title_counts_distinct_urls()
{
    let (payload, _) = scenario();
    let classifier = TopicClassifier::keyword_only();
    let out = Pipeline::new(&classifier, PipelineOptions::default())
        .run(payload)
        .unwrap();

    assert_eq!(
        out.clusters
            .keys()
            .collect::<Vec<_>>(),
        ["Market Listing"]
    );
    assert_eq!(
        out.clusters["Market Listing"]
            .iter()
            .collect::<Vec<_>>(),
        ["http://a.onion", "http://b.onion", "http://c.onion"]
    );
}

#[test]
fn keyword_strategy_ranks_drugs_over_marketplace()
{
    let (payload, _) = scenario();
    let classifier = TopicClassifier::keyword_only();
    let out = Pipeline::new(&classifier, PipelineOptions::default())
        .run(payload)
        .unwrap();

    let entry = &out.index[&fingerprint("listing body")];
    let c = &entry.classification;
    assert_eq!(c.strategy, StrategyKind::Keyword);

    let labels: Vec<&str> = c
        .labels
        .iter()
        .map(|l| l.label.as_str())
        .collect();
    assert_eq!(labels, ["drugs", "marketplace"]);
    assert!((c.labels[0].score - 0.75).abs() < 1e-9);
}

#[test]
fn textless_record_is_indexed_as_degraded()
{
    let (payload, _) = scenario();
    let classifier = TopicClassifier::keyword_only();
    let out = Pipeline::new(&classifier, PipelineOptions::default())
        .run(payload)
        .unwrap();

    let entry = &out.index[&fingerprint("only the teaser survived")];
    assert!(entry.degraded);
    assert!(entry.records[0].fingerprint_source.is_degraded());
}

#[test]
fn extractor_output_feeds_actor_maps()
{
    let extractor = ArtifactExtractor::new().unwrap();
    let html = format!("<html><head><title>Shop</title></head><body><p>{}</p></body></html>", util::VENDOR_TEXT);
    let found = extractor.extract(&html, util::VENDOR_TEXT);

    let mut payload = Payload::new();
    payload.insert(
        "vendors".into(),
        vec![SourceRecord {
            url: Some("http://a.onion".into()),
            raw_text: Some(util::VENDOR_TEXT.into()),
            extracted_artifacts: found.artifacts,
            ..Default::default()
        }],
    );

    let classifier = TopicClassifier::keyword_only();
    let out = Pipeline::new(&classifier, PipelineOptions::default())
        .run(payload)
        .unwrap();

    insta::assert_json_snapshot!(out.actors, @r#"
    {
      "pgp_keys": {},
      "btc_wallets": {
        "1BoatSLRHtKNngkdXEeobR76b53LETtpyT": [
          "http://a.onion"
        ]
      },
      "emails": {
        "vendor@example.com": [
          "http://a.onion"
        ]
      }
    }
    "#);
}

#[test]
fn rerun_over_written_index_is_stable()
{
    let (payload, _) = scenario();
    let classifier = TopicClassifier::keyword_only();
    let out = Pipeline::new(&classifier, PipelineOptions::default())
        .run(payload)
        .unwrap();

    assert_eq!(ActorMaps::aggregate(&out.index), out.actors);

    let tmp = assert_fs::TempDir::new().unwrap();
    let date = chrono::NaiveDate::from_ymd_opt(2025, 1, 3).unwrap();
    let layout = OutputLayout::new(tmp.path(), date);
    let written = write_outputs(&layout, &out).unwrap();

    assert_eq!(written.actor_maps.len(), 3);
    let grouped = written
        .grouped_titles
        .expect("one cluster written");
    assert!(grouped.ends_with("grouped_titles/grouped_titles_2025-01-03.json"));

    let written_index: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&written.fingerprints).unwrap()).unwrap();
    let vendor = &written_index[fingerprint(util::VENDOR_TEXT)]["records"][0];
    assert_eq!(vendor["collected_at"], "not a timestamp");
    assert_eq!(vendor["status_code"], "200");

    // Clustering the written index again gives the same groups
    let again = corpusprint::core::clusters::cluster_file(&written.fingerprints).unwrap();
    assert_eq!(again, out.clusters);
}
