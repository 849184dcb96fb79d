use bytes::Bytes;
use docpipe::document::{Document, DocumentStatus};
use docpipe::pipeline::config::PipelineConfig;
use docpipe::pipeline::retry::RetryPolicy;
use docpipe::pipeline::runtime::Pipeline;
use docpipe::pipeline::stage::Stage;
use docpipe::stages::{
    ContentAnalyzer, ContentHasher, MimeSniffer, SizeMetrics, Validator, CONTENT_HASH, MIME_TYPE,
    MIME_WARNING, SIZE_BYTES, SIZE_KB, SIZE_WARNING, VALIDATION_ERROR, WORD_COUNT,
};
use proptest::prelude::*;
use serde_json::json;

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime")
        .block_on(fut)
}

#[tokio::test]
async fn content_hash_is_sha256_hex() -> docpipe::error::Result<()> {
    let doc = ContentHasher::new()
        .apply(Document::from("hello"))
        .await
        .map_err(|e| docpipe::error::Error::stage("content_hash", e))?;
    assert_eq!(
        doc.metadata_str(CONTENT_HASH),
        Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
    );
    Ok(())
}

proptest! {
    #[test]
    fn content_hash_is_deterministic_and_idempotent(
        content in proptest::collection::vec(any::<u8>(), 1..2048)
    ) {
        let hasher = ContentHasher::new();
        let (once, twice, other) = block_on(async {
            let once = hasher.apply(Document::new(content.clone())).await.expect("hash");
            let twice = hasher.apply(once.clone()).await.expect("hash");
            let other = hasher.apply(Document::new(content.clone())).await.expect("hash");
            (once, twice, other)
        });

        let first = once.metadata_value(CONTENT_HASH).cloned();
        let again = twice.metadata_value(CONTENT_HASH).cloned();
        let fresh = other.metadata_value(CONTENT_HASH).cloned();
        prop_assert!(first.is_some());
        prop_assert_eq!(&first, &again);
        prop_assert_eq!(&first, &fresh);
        prop_assert_eq!(once.metadata().len(), twice.metadata().len());
    }

    #[test]
    fn size_metrics_match_content_length(len in 0usize..10_000) {
        let doc = block_on(SizeMetrics::new().apply(Document::new(vec![b'a'; len]))).expect("size");
        let expected = json!(len);
        prop_assert_eq!(doc.metadata_value(SIZE_BYTES), Some(&expected));
        let kb = doc.metadata_value(SIZE_KB).and_then(|v| v.as_f64()).expect("size_kb");
        prop_assert!((kb - len as f64 / 1024.0).abs() <= 0.005 + f64::EPSILON);
    }
}

#[test]
fn mime_sniffing_recognizes_common_formats() {
    assert_eq!(MimeSniffer::sniff(b"%PDF-1.7 rest"), "application/pdf");
    assert_eq!(MimeSniffer::sniff(b"\x89PNG\r\n\x1a\n...."), "image/png");
    assert_eq!(MimeSniffer::sniff(b"\xFF\xD8\xFF\xE0JFIF"), "image/jpeg");
    assert_eq!(MimeSniffer::sniff(b"GIF89a..."), "image/gif");
    assert_eq!(MimeSniffer::sniff(b"PK\x03\x04zip"), "application/zip");
    assert_eq!(MimeSniffer::sniff(br#"{"a": 1}"#), "application/json");
    assert_eq!(MimeSniffer::sniff(b"<?xml version=\"1.0\"?><a/>"), "text/xml");
    assert_eq!(MimeSniffer::sniff(b"<!DOCTYPE html><html></html>"), "text/html");
    assert_eq!(MimeSniffer::sniff(b"just some words"), "text/plain");
    assert_eq!(MimeSniffer::sniff(b"{not json"), "text/plain");
    assert_eq!(MimeSniffer::sniff(&[0x00, 0xC3, 0x28, 0xFF]), "application/octet-stream");
    assert_eq!(MimeSniffer::sniff(b""), "application/x-empty");
}

#[test]
fn kilobytes_round_to_two_decimals() {
    assert_eq!(SizeMetrics::kilobytes(0), 0.0);
    assert_eq!(SizeMetrics::kilobytes(2048), 2.0);
    assert_eq!(SizeMetrics::kilobytes(1500), 1.46);
}

#[tokio::test]
async fn full_enrichment_pipeline() -> docpipe::error::Result<()> {
    let pipeline = Pipeline::new()
        .stage(ContentHasher::new())
        .stage(MimeSniffer::new())
        .stage(SizeMetrics::new())
        .stage(ContentAnalyzer::new())
        .stage(Validator::from_config(&PipelineConfig::default()));

    let text = pipeline
        .process_one(Document::new(Bytes::from_static(b"the quick  brown\nfox")))
        .await?;
    assert_eq!(text.status(), DocumentStatus::Completed);
    assert_eq!(text.metadata_str(MIME_TYPE), Some("text/plain"));
    assert_eq!(text.metadata_value(WORD_COUNT), Some(&json!(4)));
    assert_eq!(text.metadata_value(SIZE_BYTES), Some(&json!(20)));
    assert!(text.metadata_value(CONTENT_HASH).is_some());
    assert!(text.metadata_value(MIME_WARNING).is_none());

    let pdf = pipeline.process_one(Document::from("%PDF-1.4 binary")).await?;
    assert_eq!(pdf.metadata_str(MIME_TYPE), Some("application/pdf"));
    assert!(pdf.metadata_value(WORD_COUNT).is_none());

    let gif = pipeline.process_one(Document::from("GIF89a....")).await?;
    assert_eq!(gif.status(), DocumentStatus::Completed);
    assert!(gif.metadata_str(MIME_WARNING).unwrap_or_default().contains("image/gif"));
    Ok(())
}

#[tokio::test]
async fn analyzer_reports_zero_words_for_invalid_utf8_text() {
    let doc = Document::new(vec![0xFF, 0xFE, b' ', b'a']).with_metadata(MIME_TYPE, "text/plain");
    let doc = ContentAnalyzer::new().apply(doc).await.expect("analyze");
    assert_eq!(doc.metadata_value(WORD_COUNT), Some(&json!(0)));
}

#[tokio::test]
async fn lenient_validator_records_problems_as_metadata() {
    let validator = Validator::new().max_document_size(4);

    let empty = validator.apply(Document::empty()).await.expect("validate");
    assert_eq!(empty.metadata_str(VALIDATION_ERROR), Some("Empty document"));

    let big = validator.apply(Document::from("too large")).await.expect("validate");
    assert_eq!(big.metadata_str(SIZE_WARNING), Some("Document exceeds 4 bytes"));
    assert!(big.metadata_value(VALIDATION_ERROR).is_none());
}

#[tokio::test]
async fn strict_validator_fails_the_document() -> docpipe::error::Result<()> {
    let pipeline = Pipeline::new()
        .stage(MimeSniffer::new())
        .stage(Validator::new().allowed_mime_types(["text/plain"]).strict(true))
        .with_retry(RetryPolicy::new(1));

    let ok = pipeline.process_one(Document::from("plain text")).await?;
    assert_eq!(ok.status(), DocumentStatus::Completed);

    let rejected = pipeline.process_one(Document::from("%PDF-1.4")).await?;
    assert_eq!(rejected.status(), DocumentStatus::Failed);
    assert!(rejected.error().unwrap_or_default().contains("application/pdf"));
    Ok(())
}
