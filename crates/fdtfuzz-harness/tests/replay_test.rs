//! Integration tests: corpus replay, bounded reads, JSONL logs and the CLI.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use fdtfuzz_core::fdt::BlobBuilder;
use fdtfuzz_core::{FdtError, RunReport, SkipReason};
use fdtfuzz_harness::structured_log::validate_log_file;
use fdtfuzz_harness::{LogEmitter, Outcome, ReplayError, ReplayRunner};
use fdtfuzz_membrane::VerifierKind;
use sha2::Digest;

fn unique_tmp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after UNIX_EPOCH")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn valid_blob() -> Vec<u8> {
    let mut b = BlobBuilder::new();
    b.begin_node("")
        .prop("compatible", b"acme,board\0")
        .begin_node("uart@1000")
        .phandle(1)
        .prop("reg", &[0, 0, 0x10, 0, 0, 0, 0x01, 0])
        .end_node()
        .end_node()
        .end();
    b.finish()
}

/// corpus/{a_valid.dtb, b_garbage.bin, nested/c_tiny.bin}
fn write_corpus(dir: &Path) {
    std::fs::write(dir.join("b_garbage.bin"), vec![0x5a; 128]).unwrap();
    std::fs::write(dir.join("a_valid.dtb"), valid_blob()).unwrap();
    std::fs::create_dir_all(dir.join("nested")).unwrap();
    std::fs::write(dir.join("nested").join("c_tiny.bin"), b"\xd0\x0d").unwrap();
}

#[test]
fn directory_replay_is_sorted_and_classified() {
    let dir = unique_tmp_dir("fdtfuzz-replay-dir");
    write_corpus(&dir);

    let records = ReplayRunner::new(VerifierKind::Shadow)
        .replay(&[dir.clone()])
        .unwrap();
    let names: Vec<_> = records
        .iter()
        .map(|r| r.path.strip_prefix(&dir).unwrap().to_path_buf())
        .collect();
    assert_eq!(
        names,
        vec![
            PathBuf::from("a_valid.dtb"),
            PathBuf::from("b_garbage.bin"),
            PathBuf::from("nested/c_tiny.bin"),
        ]
    );

    let stats = records[0].report.stats().unwrap();
    assert_eq!(stats.nodes, 2);
    assert_eq!(stats.properties, 3);
    assert_eq!(stats.phandles, 1);
    assert_eq!(records[0].outcome(), Outcome::Pass);

    assert_eq!(
        records[1].report,
        RunReport::Skipped(SkipReason::Rejected(FdtError::BadMagic(0x5a5a_5a5a)))
    );
    assert_eq!(
        records[2].report,
        RunReport::Skipped(SkipReason::TooSmall { size: 2 })
    );
    assert!(records.iter().all(|r| r.report.status_code() == 0));
}

#[test]
fn oversized_input_is_truncated_before_the_driver() {
    let dir = unique_tmp_dir("fdtfuzz-replay-trunc");
    let blob = valid_blob();
    let path = dir.join("big.dtb");
    let mut padded = blob.clone();
    padded.extend_from_slice(&[0xee; 64]);
    std::fs::write(&path, &padded).unwrap();

    // Cutting into the header's totalsize turns a valid blob into a rejection.
    let short = ReplayRunner::new(VerifierKind::Plain)
        .with_max_len(blob.len() - 8)
        .replay_file(&path)
        .unwrap();
    assert!(short.truncated);
    assert_eq!(short.len, blob.len() - 8);
    assert!(matches!(
        short.report,
        RunReport::Skipped(SkipReason::Rejected(FdtError::Truncated { .. }))
    ));

    // Trailing bytes past totalsize are ignored by the reader.
    let exact = ReplayRunner::new(VerifierKind::Plain)
        .with_max_len(blob.len())
        .replay_file(&path)
        .unwrap();
    assert!(exact.truncated);
    assert!(exact.report.stats().is_some());
    let digest: String = sha2::Sha256::digest(&blob)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    assert_eq!(exact.sha256, digest);

    let whole = ReplayRunner::new(VerifierKind::Plain)
        .replay_file(&path)
        .unwrap();
    assert!(!whole.truncated);
    assert_eq!(whole.len, padded.len());
}

#[test]
fn empty_directory_has_no_inputs() {
    let dir = unique_tmp_dir("fdtfuzz-replay-empty");
    let err = ReplayRunner::new(VerifierKind::Plain)
        .replay(&[dir])
        .unwrap_err();
    assert!(matches!(err, ReplayError::NoInputs));
}

#[test]
fn check_reports_validation_errors() {
    let dir = unique_tmp_dir("fdtfuzz-check");
    let good = dir.join("good.dtb");
    let bad = dir.join("bad.dtb");
    std::fs::write(&good, valid_blob()).unwrap();
    let mut broken = valid_blob();
    broken[20..24].copy_from_slice(&1u32.to_be_bytes());
    std::fs::write(&bad, broken).unwrap();

    let runner = ReplayRunner::new(VerifierKind::Plain);
    assert_eq!(runner.check_file(&good).unwrap(), Ok(()));
    assert!(matches!(
        runner.check_file(&bad).unwrap(),
        Err(FdtError::BadVersion { version: 1, .. })
    ));
}

#[test]
fn log_records_validate() {
    let dir = unique_tmp_dir("fdtfuzz-replay-log");
    let corpus = dir.join("corpus");
    std::fs::create_dir_all(&corpus).unwrap();
    write_corpus(&corpus);
    let log_path = dir.join("replay.jsonl");

    let records = ReplayRunner::new(VerifierKind::Shadow)
        .replay(&[corpus])
        .unwrap();
    let mut emitter = LogEmitter::to_file(&log_path, "fdtfuzz", "test").unwrap();
    for record in &records {
        let trace_id = emitter.next_trace_id();
        emitter
            .emit_entry(record.to_log_entry(trace_id, VerifierKind::Shadow))
            .unwrap();
    }
    emitter.flush().unwrap();

    let (lines, errors) = validate_log_file(&log_path).unwrap();
    assert_eq!(lines, 3);
    assert!(errors.is_empty(), "{errors:?}");

    let content = std::fs::read_to_string(&log_path).unwrap();
    let first: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    assert_eq!(first["trace_id"], "fdtfuzz::test::001");
    assert_eq!(first["outcome"], "pass");
    assert_eq!(first["details"]["nodes"], 2);
    assert_eq!(first["details"]["version"], 17);
}

#[test]
fn cli_replay_writes_log_and_check_sets_exit_code() {
    let dir = unique_tmp_dir("fdtfuzz-cli");
    let corpus = dir.join("corpus");
    std::fs::create_dir_all(&corpus).unwrap();
    write_corpus(&corpus);
    let log_path = dir.join("cli.jsonl");

    let output = Command::new(env!("CARGO_BIN_EXE_fdtfuzz"))
        .arg("replay")
        .arg(&corpus)
        .args(["--verifier", "shadow", "--log"])
        .arg(&log_path)
        .output()
        .expect("run fdtfuzz replay");
    assert!(output.status.success(), "{output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Replayed 3 inputs: 1 walked, 2 skipped"), "{stderr}");

    // replay_started, then one record per input
    let (lines, errors) = validate_log_file(&log_path).unwrap();
    assert_eq!(lines, 4);
    assert!(errors.is_empty(), "{errors:?}");
    let content = std::fs::read_to_string(&log_path).unwrap();
    let started: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    assert_eq!(started["event"], "replay_started");
    assert!(started.get("outcome").is_none());

    let ok = Command::new(env!("CARGO_BIN_EXE_fdtfuzz"))
        .arg("check")
        .arg(corpus.join("a_valid.dtb"))
        .output()
        .expect("run fdtfuzz check");
    assert!(ok.status.success());
    assert_eq!(String::from_utf8_lossy(&ok.stdout).trim(), "ok");

    let rejected = Command::new(env!("CARGO_BIN_EXE_fdtfuzz"))
        .arg("check")
        .arg(corpus.join("b_garbage.bin"))
        .output()
        .expect("run fdtfuzz check");
    assert_eq!(rejected.status.code(), Some(1));
    assert_eq!(
        String::from_utf8_lossy(&rejected.stdout).trim(),
        "bad FDT magic: 0x5a5a5a5a"
    );
}

#[cfg(unix)]
#[test]
fn cli_replay_keeps_earlier_records_when_an_input_fails() {
    let dir = unique_tmp_dir("fdtfuzz-cli-dangling");
    let corpus = dir.join("corpus");
    std::fs::create_dir_all(&corpus).unwrap();
    std::fs::write(corpus.join("a_tiny.bin"), b"\xd0\x0d").unwrap();
    std::fs::write(corpus.join("b_valid.dtb"), valid_blob()).unwrap();
    std::os::unix::fs::symlink(dir.join("missing"), corpus.join("c_dangling")).unwrap();
    let log_path = dir.join("dangling.jsonl");

    let output = Command::new(env!("CARGO_BIN_EXE_fdtfuzz"))
        .arg("replay")
        .arg(&corpus)
        .args(["--verifier", "plain", "--log"])
        .arg(&log_path)
        .output()
        .expect("run fdtfuzz replay");
    assert!(!output.status.success(), "{output:?}");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SKIP "), "{stderr}");
    assert!(stderr.contains("a_tiny.bin"), "{stderr}");
    assert!(stderr.contains("PASS "), "{stderr}");
    assert!(stderr.contains("RUN  "), "{stderr}");
    assert!(stderr.contains("c_dangling"), "{stderr}");

    let (lines, errors) = validate_log_file(&log_path).unwrap();
    assert_eq!(lines, 3);
    assert!(errors.is_empty(), "{errors:?}");
    let content = std::fs::read_to_string(&log_path).unwrap();
    let outcomes: Vec<String> = content
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
        .filter_map(|v| v["outcome"].as_str().map(str::to_string))
        .collect();
    assert_eq!(outcomes, vec!["skip", "pass"]);
}
