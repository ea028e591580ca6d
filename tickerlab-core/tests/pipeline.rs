//! End-to-end pipeline over a temporary directory tree.
//!
//! Tests:
//! 1. enrich -> lists -> archive produces the expected lists and file moves
//! 2. Re-running list generation is byte-identical
//! 3. A snapshot that was already enriched is not rewritten
//! 4. Missing required columns fail the file, not the batch
//! 5. No enriched file is fatal for the list stage
//! 6. Numeric-looking symbols keep their leading zeros
//! 7. Enriching the same input twice is byte-identical
//! 8. A malformed number far down the file becomes null instead of failing it

use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tickerlab_core::{
    archive, enrich_directory, generate_lists, EnrichError, ListError, PipelineConfig,
};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

const HEADER: &str = "Symbol,Exchange,Price,Market capitalization,Performance % 1 year,\
Performance % 6 months,Performance % 3 months,Performance % 1 month,\
Simple Moving Average (21) 1 day,Simple Moving Average (200) 1 day";

// scores: NVDA 2.99, SMOL 2.27, MSFT 2.19, AAPL 2.10, BAD 1.23
const ROWS: &[&str] = &[
    "AAPL,NASDAQ,200,3000000000000,30,10,5,2,190,180",
    "MSFT,NASDAQ,400,2500000000000,50,20,10,3,390,350",
    "NVDA,NASDAQ,100,1000000000000,200,80,40,10,100,60",
    "SMOL,NYSE,10,500000000,100,50,20,5,11,10",
    "BAD,NYSE,5,20000000000,-90,-50,-30,-10,4,10",
];

fn temp_root() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("tickerlab_pipeline_{}_{id}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_snapshot(config: &PipelineConfig, name: &str, header: &str, rows: &[&str]) -> PathBuf {
    fs::create_dir_all(&config.directories.inbox).unwrap();
    let path = config.directories.inbox.join(name);
    let mut content = format!("{header}\n");
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(&path, content).unwrap();
    path
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn full_pipeline_builds_lists_and_archives() {
    let root = temp_root();
    let config = PipelineConfig::rooted_at(&root);
    let dirs = &config.directories;
    write_snapshot(&config, "TOP MONDE_2025-01-10.csv", HEADER, ROWS);

    let enriched = enrich_directory(&config).unwrap();
    assert_eq!(enriched.written.len(), 1);
    assert!(enriched.failed.is_empty());
    let enriched_path = dirs.enriched.join("TOP MONDE_2025-01-10_enhanced.csv");
    assert!(enriched_path.exists());

    let lists = generate_lists(&config, day("2025-01-12")).unwrap();
    assert_eq!(lists.source, enriched_path);
    assert_eq!(lists.unified, dirs.lists.join("top_monde_2025-01-12.txt"));

    let unified = fs::read_to_string(&lists.unified).unwrap();
    assert_eq!(
        unified,
        "// Top 30 Big\nNASDAQ:NVDA\nNASDAQ:MSFT\nNASDAQ:AAPL\nNYSE:BAD\n\
         // Top 50 Global\nNYSE:SMOL\n"
    );
    assert_eq!(
        fs::read_to_string(dirs.lists.join("top_monde_2_7_2025-01-12.txt")).unwrap(),
        "NASDAQ:NVDA\n"
    );
    assert_eq!(
        fs::read_to_string(dirs.lists.join("top_monde_worst_2025-01-12.txt")).unwrap(),
        "NYSE:BAD\nNASDAQ:AAPL\nNASDAQ:MSFT\nNYSE:SMOL\nNASDAQ:NVDA\n"
    );
    // every big cap went to tier A, so tier B skipped all four
    assert_eq!(lists.lists.skipped().len(), 4);

    let moved = archive(&config).unwrap();
    assert_eq!(moved.moved.len(), 1);
    assert!(dirs.raw_archive.join("TOP MONDE_2025-01-10.csv").exists());
    assert!(enriched_path.exists());

    // inbox is empty now
    assert!(matches!(
        enrich_directory(&config),
        Err(EnrichError::NoInput { .. })
    ));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn list_generation_is_deterministic() {
    let root = temp_root();
    let config = PipelineConfig::rooted_at(&root);
    write_snapshot(&config, "TOP MONDE_2025-01-10.csv", HEADER, ROWS);
    enrich_directory(&config).unwrap();

    let first = generate_lists(&config, day("2025-01-12")).unwrap();
    let before: Vec<Vec<u8>> = [&first.unified, &first.threshold, &first.worst]
        .iter()
        .map(|p| fs::read(p).unwrap())
        .collect();

    let second = generate_lists(&config, day("2025-01-12")).unwrap();
    let after: Vec<Vec<u8>> = [&second.unified, &second.threshold, &second.worst]
        .iter()
        .map(|p| fs::read(p).unwrap())
        .collect();
    assert_eq!(before, after);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn already_enriched_snapshot_is_left_alone() {
    let root = temp_root();
    let config = PipelineConfig::rooted_at(&root);
    write_snapshot(&config, "TOP MONDE_2025-01-10.csv", HEADER, ROWS);

    enrich_directory(&config).unwrap();
    let output = config
        .directories
        .enriched
        .join("TOP MONDE_2025-01-10_enhanced.csv");
    let bytes = fs::read(&output).unwrap();

    let again = enrich_directory(&config).unwrap();
    assert!(again.written.is_empty());
    assert_eq!(again.already_enriched.len(), 1);
    assert_eq!(fs::read(&output).unwrap(), bytes);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn file_missing_columns_fails_alone() {
    let root = temp_root();
    let config = PipelineConfig::rooted_at(&root);
    write_snapshot(&config, "TOP MONDE_2025-01-03.csv", "Symbol,Exchange,Price", &["AAPL,NASDAQ,200"]);
    write_snapshot(&config, "TOP MONDE_2025-01-10.csv", HEADER, ROWS);

    let report = enrich_directory(&config).unwrap();
    assert_eq!(report.written.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].0.ends_with("TOP MONDE_2025-01-03.csv"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn lists_without_enriched_file_is_fatal() {
    let root = temp_root();
    let config = PipelineConfig::rooted_at(&root);

    let err = generate_lists(&config, day("2025-01-12")).unwrap_err();
    assert!(matches!(err, ListError::NoEnrichedFile { .. }));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn lists_use_most_recent_enriched_snapshot() {
    let root = temp_root();
    let config = PipelineConfig::rooted_at(&root);
    write_snapshot(&config, "TOP MONDE_2025-01-03.csv", HEADER, &ROWS[..2]);
    write_snapshot(&config, "TOP MONDE_2025-01-10.csv", HEADER, ROWS);
    enrich_directory(&config).unwrap();

    let report = generate_lists(&config, day("2025-01-12")).unwrap();
    assert!(report.source.ends_with("TOP MONDE_2025-01-10_enhanced.csv"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn numeric_symbols_keep_leading_zeros() {
    let root = temp_root();
    let config = PipelineConfig::rooted_at(&root);
    write_snapshot(
        &config,
        "TOP MONDE_2025-01-10.csv",
        HEADER,
        &[
            "0700,HKEX,380,3500000000000,40,20,10,3,370,330",
            "9988,HKEX,110,260000000000,60,30,15,5,105,90",
        ],
    );

    let report = enrich_directory(&config).unwrap();
    let enriched = fs::read_to_string(&report.written[0]).unwrap();
    assert!(enriched.lines().any(|l| l.starts_with("0700,HKEX,")));

    let lists = generate_lists(&config, day("2025-01-12")).unwrap();
    let unified = fs::read_to_string(&lists.unified).unwrap();
    assert!(unified.contains("HKEX:0700\n"), "{unified}");
    assert!(!unified.contains("HKEX:700\n"));
    let symbols: Vec<&str> = lists
        .lists
        .selection
        .top_big
        .iter()
        .map(|r| r.symbol.as_str())
        .collect();
    assert_eq!(symbols.len(), 2);
    assert!(symbols.contains(&"0700"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn enrichment_is_byte_identical_across_runs() {
    let root = temp_root();
    let config = PipelineConfig::rooted_at(&root);
    let mut rows = ROWS.to_vec();
    // malformed cap and empty ma200, then a zero ma200
    rows.push("MSFT2,NASDAQ,400,n/a,50,20,10,3,390,");
    rows.push("ZERO,NYSE,20,15000000000,10,5,2,1,19,0");
    write_snapshot(&config, "TOP MONDE_2025-01-10.csv", HEADER, &rows);

    let first = enrich_directory(&config).unwrap();
    let output = first.written[0].clone();
    let before = fs::read(&output).unwrap();

    fs::remove_file(&output).unwrap();
    let second = enrich_directory(&config).unwrap();
    assert_eq!(second.written, vec![output.clone()]);
    assert_eq!(fs::read(&output).unwrap(), before);

    let text = String::from_utf8(before).unwrap();
    let header: Vec<&str> = text.lines().next().unwrap().split(',').collect();
    let field = |line: &str, name: &str| -> String {
        let idx = header.iter().position(|h| *h == name).unwrap();
        line.split(',').nth(idx).unwrap().to_string()
    };
    for symbol in ["MSFT2", "ZERO"] {
        let line = text
            .lines()
            .find(|l| l.starts_with(&format!("{symbol},")))
            .unwrap();
        assert_eq!(field(line, "mrat").parse::<f64>().unwrap(), 0.0);
        assert_eq!(field(line, "diff").parse::<f64>().unwrap(), 0.0);
    }
    let msft = text.lines().find(|l| l.starts_with("MSFT2,")).unwrap();
    assert_eq!(field(msft, "Market capitalization"), "");
    // the perf terms survive; the missing ratio nulls the score before the fill
    assert_eq!(field(msft, "perf_norm").parse::<f64>().unwrap(), 1.08);
    assert_eq!(field(msft, "score").parse::<f64>().unwrap(), 0.0);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn malformed_cell_deep_in_file_is_not_fatal() {
    let root = temp_root();
    let config = PipelineConfig::rooted_at(&root);
    let mut rows: Vec<String> = (0..10_050)
        .map(|i| format!("S{i},NYSE,10,1000000000,1,1,1,1,10,10"))
        .collect();
    rows.push("LATE,NYSE,10,1000000000,n/a,1,1,1,10,10".to_string());
    let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
    write_snapshot(&config, "TOP MONDE_2025-01-10.csv", HEADER, &refs);

    let report = enrich_directory(&config).unwrap();
    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert_eq!(report.written.len(), 1);

    let text = fs::read_to_string(&report.written[0]).unwrap();
    assert_eq!(text.lines().count(), 10_052);

    let _ = fs::remove_dir_all(&root);
}
