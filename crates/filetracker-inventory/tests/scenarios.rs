// Coverage for an inventory manifest containing one corrupt file.
// Unlike the database-backed scenarios in filetracker-ingest, this one
// never touches the database: `run_inventory_job` only decodes and
// hands batches to a sink, so it runs as a plain async test against a
// `MockStoreClient`, no Postgres required.

use std::io::Write;

use chrono::Utc;
use filetracker_ingest::MockStoreClient;
use filetracker_inventory::{run_inventory_job, InventoryManifest};

fn gzip(contents: &str) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(contents.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn manifest_json(destination_bucket: &str, files: &str) -> String {
    format!(
        r#"{{
            "sourceBucket": "source-bucket",
            "destinationBucket": "{destination_bucket}",
            "fileSchema": ["Bucket", "Key", "Size"],
            "files": [{files}]
        }}"#
    )
}

#[tokio::test]
async fn a_corrupt_file_is_skipped_while_the_rest_of_the_manifest_still_ingests() {
    let destination_bucket = "inventory-dest";

    let good_body = "my-bucket,data/a.txt,100\nmy-bucket,data/b.txt,200\n";
    let good_bytes = gzip(good_body);
    let good_md5 = format!("{:x}", md5::compute(&good_bytes));

    let corrupt_bytes = gzip("my-bucket,data/c.txt,300\n");
    // Declare a checksum that does not match the actual bytes, simulating
    // a data file corrupted in transit.
    let corrupt_md5 = "0".repeat(32);

    let files_json = format!(
        r#"{{"key": "f1.csv.gz", "size": {}, "MD5checksum": "{good_md5}"}},
        {{"key": "f2.csv.gz", "size": {}, "MD5checksum": "{corrupt_md5}"}}"#,
        good_bytes.len(),
        corrupt_bytes.len(),
    );
    let manifest: InventoryManifest =
        serde_json::from_str(&manifest_json(destination_bucket, &files_json)).expect("manifest parses");

    let client = MockStoreClient::new()
        .with_download(destination_bucket, "f1.csv.gz", good_bytes, Utc::now())
        .with_download(destination_bucket, "f2.csv.gz", corrupt_bytes, Utc::now());

    let mut all_rows = Vec::new();
    let summary = run_inventory_job(&client, &manifest, |batch| {
        all_rows.extend(batch);
        Ok(())
    })
    .await
    .expect("job runs to completion despite the corrupt file");

    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.files_corrupt, 1);
    assert_eq!(summary.files_unsupported, 0);
    assert_eq!(summary.rows_emitted, 2);
    assert_eq!(all_rows.len(), 2);
    assert!(all_rows.iter().all(|e| e.key.starts_with("data/")));
    assert!(all_rows.iter().any(|e| e.key == "data/a.txt"));
    assert!(all_rows.iter().any(|e| e.key == "data/b.txt"));
    assert!(!all_rows.iter().any(|e| e.key == "data/c.txt"), "the corrupt file's rows must never surface");
}

#[tokio::test]
async fn an_unrecognized_container_format_is_skipped_as_unsupported_not_fatal() {
    let destination_bucket = "inventory-dest";
    let files_json = r#"{"key": "f1.unknown", "size": 10, "MD5checksum": "ignored"}"#;
    let manifest: InventoryManifest =
        serde_json::from_str(&manifest_json(destination_bucket, files_json)).expect("manifest parses");

    let client = MockStoreClient::new();
    let summary = run_inventory_job(&client, &manifest, |_batch| Ok(())).await.expect("job runs to completion");

    assert_eq!(summary.files_processed, 0);
    assert_eq!(summary.files_unsupported, 1);
    assert_eq!(summary.rows_emitted, 0);
}
