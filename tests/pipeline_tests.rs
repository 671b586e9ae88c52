mod common;

use common::{reading, Workspace};
use std::fs;
use std::io::Write;

#[test]
fn test_run_writes_daily_and_hourly_means() {
    let ws = Workspace::new();
    ws.write_input(
        "la.csv",
        &[
            reading("2024-01-01T05:00:00Z", 20, "A"),
            reading("2024-01-01T05:30:00Z", 40, "A"),
            reading("2024-01-01T07:00:00Z", 90, "B"),
            reading("2024-01-02T00:00:00Z", -999, "A"),
        ]
        .concat(),
    );

    let (_, stderr, code) = ws.run(&["run", "data", "--threads", "3"]);
    assert_eq!(code, 0, "stderr: {}", stderr);

    let json = ws.read_json("results_analysis.json");
    assert_eq!(json["dailyAverage"]["2024-01-01"], 50.0);
    assert!(json["dailyAverage"].get("2024-01-02").is_none());
    assert_eq!(json["hourlyAverage"]["2024-01-01"]["5"], 30.0);
    assert_eq!(json["hourlyAverage"]["2024-01-01"]["7"], 90.0);
}

#[test]
fn test_result_file_is_indented_with_four_spaces() {
    let ws = Workspace::new();
    ws.write_input("a.csv", &reading("2024-03-01T10:00:00Z", 10, "A"));

    let (_, stderr, code) = ws.run(&["run", "data", "-o", "custom.json"]);
    assert_eq!(code, 0, "stderr: {}", stderr);

    let text = fs::read_to_string(ws.path().join("custom.json")).unwrap();
    assert!(text.starts_with("{\n    \"dailyAverage\": {\n        \"2024-03-01\": 10.0"));
    assert!(!ws.path().join("results_analysis.json").exists());
}

#[test]
fn test_malformed_lines_are_skipped_and_later_lines_processed() {
    let ws = Workspace::new();
    let content = [
        reading("2024-01-01T00:00:00Z", 10, "A"),
        "this,is,not,a,reading\n".to_string(),
        reading("2024-01-01T01:00:00Z", 20, "A").replace("\"34.05\"", "\"north\""),
        "\n".to_string(),
        reading("2024-01-01T02:00:00Z", 30, "A"),
    ]
    .concat();
    ws.write_input("mixed.csv", &content);

    let (_, stderr, code) = ws.run(&["run", "data", "--stats"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(stderr.contains("skipping malformed line"));
    assert!(stderr.contains("3 parse errors"));
    assert!(stderr.contains("expected 13 fields, found 1"));

    let json = ws.read_json("results_analysis.json");
    assert_eq!(json["dailyAverage"]["2024-01-01"], 20.0);
}

#[test]
fn test_capacity_overflow_keeps_earliest_records() {
    let ws = Workspace::new();
    ws.write_input("a.csv", &reading("2024-01-01T00:00:00Z", 10, "A"));
    ws.write_input(
        "b.csv",
        &[
            reading("2024-01-01T00:00:00Z", 20, "B"),
            reading("2024-01-01T00:00:00Z", 1000, "B"),
        ]
        .concat(),
    );
    ws.write_input("c.csv", &reading("2024-01-01T00:00:00Z", 5000, "C"));

    let (_, stderr, code) = ws.run(&["run", "data", "--capacity", "2", "--stats", "--threads", "4"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(stderr.contains("2 dropped (capacity)"));
    assert!(stderr.contains("Store: 2 of 2 slots used"));

    let json = ws.read_json("results_analysis.json");
    assert_eq!(json["dailyAverage"]["2024-01-01"], 15.0);
}

#[test]
fn test_compressed_and_nested_inputs() {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let ws = Workspace::new();
    ws.write_input("2024/01/plain.csv", &reading("2024-01-01T00:00:00Z", 10, "A"));

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(reading("2024-01-01T00:00:00Z", 30, "B").as_bytes())
        .unwrap();
    fs::write(ws.data_dir().join("more.csv.gz"), encoder.finish().unwrap()).unwrap();

    let (_, stderr, code) = ws.run(&["run", "data"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert_eq!(ws.read_json("results_analysis.json")["dailyAverage"]["2024-01-01"], 20.0);
}

#[test]
fn test_unordered_mode_produces_same_result() {
    let ws = Workspace::new();
    for f in 0..6 {
        let body: String = (0..50)
            .map(|i| reading(&format!("2024-01-0{}T{:02}:00:00Z", 1 + f % 3, i % 24), i * 7 + f, "S"))
            .collect();
        ws.write_input(&format!("part{}.csv", f), &body);
    }

    let (_, stderr, code) = ws.run(&["run", "data", "-o", "ordered.json", "--threads", "1"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    let (_, stderr, code) = ws.run(&[
        "run",
        "data",
        "-o",
        "unordered.json",
        "--threads",
        "6",
        "--no-preserve-order",
        "--batch-size",
        "7",
    ]);
    assert_eq!(code, 0, "stderr: {}", stderr);

    let ordered = fs::read(ws.path().join("ordered.json")).unwrap();
    let unordered = fs::read(ws.path().join("unordered.json")).unwrap();
    assert_eq!(ordered, unordered);
}

#[test]
fn test_missing_input_directory_fails() {
    let ws = Workspace::new();
    let (_, stderr, code) = ws.run(&["run", "nowhere"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("does not exist"));
}

#[test]
fn test_invalid_usage_exit_code() {
    let ws = Workspace::new();
    let (_, _, code) = ws.run(&["run", "data", "--threads", "many"]);
    assert_eq!(code, 2);

    let (_, _, code) = ws.run(&["frobnicate"]);
    assert_eq!(code, 2);
}

#[test]
fn test_config_file_defaults_are_applied() {
    let ws = Workspace::new();
    ws.write_input("a.csv", &reading("2024-01-01T00:00:00Z", 10, "A"));
    fs::write(ws.path().join(".aqstorerc"), "defaults = --stats --threads 2\n").unwrap();

    let (_, stderr, code) = ws.run(&["run", "data"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(stderr.contains("Lines processed: 1 total"));

    let (_, stderr, code) = ws.run(&["--ignore-config", "run", "data"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(!stderr.contains("Lines processed"));
}

#[test]
fn test_explicit_config_file() {
    let ws = Workspace::new();
    ws.write_input("a.csv", &reading("2024-01-01T00:00:00Z", 10, "A"));
    let config = ws.path().join("custom.ini");
    fs::write(&config, "defaults = --stats\n").unwrap();

    let (_, stderr, code) = ws.run(&["--config-file", config.to_str().unwrap(), "run", "data"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
    assert!(stderr.contains("Records scanned: 1 total"));
}

#[test]
fn test_completions_are_generated() {
    let ws = Workspace::new();
    let (stdout, _, code) = ws.run(&["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("aqstore"));
}
