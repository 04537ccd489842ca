use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use star_capture::{acquire, CaptureConfig};

fn test_config(dir: &Path, device: &str, frame_count: u32) -> CaptureConfig {
    let mut cfg = CaptureConfig::default();
    cfg.device = device.to_string();
    cfg.output.dir = dir.to_string_lossy().into_owned();
    cfg.frame_count = frame_count;
    cfg.interval = Duration::ZERO;
    cfg.stabilize = Duration::ZERO;
    cfg.tuning.width = 16;
    cfg.tuning.height = 8;
    cfg
}

fn frame_file(dir: &Path, index: u32) -> std::path::PathBuf {
    dir.join(format!("star_{:04}.jpg", index))
}

#[test]
fn three_successful_captures_produce_three_grayscale_files() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let cfg = test_config(tmp.path(), "stub://cam", 3);

    let report = acquire::run(&cfg, &AtomicBool::new(false)).expect("run");
    assert_eq!(report.attempted, 3);
    assert_eq!(report.saved, 3);
    assert_eq!(report.skipped, 0);
    assert!(!report.cancelled);

    for index in 0..3 {
        let path = frame_file(tmp.path(), index);
        assert!(path.is_file(), "missing {}", path.display());

        let decoded = image::open(&path).expect("decode jpeg");
        assert_eq!(decoded.color(), image::ColorType::L8);
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 8);
    }
    assert!(!frame_file(tmp.path(), 3).exists());
}

#[test]
fn failed_read_skips_its_index_and_the_loop_continues() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let cfg = test_config(tmp.path(), "stub://cam?fail=1", 3);

    let report = acquire::run(&cfg, &AtomicBool::new(false)).expect("run");
    assert_eq!(report.attempted, 3);
    assert_eq!(report.saved, 2);
    assert_eq!(report.skipped, 1);

    assert!(frame_file(tmp.path(), 0).is_file());
    assert!(!frame_file(tmp.path(), 1).exists());
    assert!(frame_file(tmp.path(), 2).is_file());
}

#[test]
fn every_produced_filename_matches_the_sequential_scheme() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let cfg = test_config(tmp.path(), "stub://cam", 5);

    acquire::run(&cfg, &AtomicBool::new(false)).expect("run");

    let mut names: Vec<String> = std::fs::read_dir(tmp.path())
        .expect("read output dir")
        .map(|entry| entry.expect("dir entry").file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "star_0000.jpg",
            "star_0001.jpg",
            "star_0002.jpg",
            "star_0003.jpg",
            "star_0004.jpg"
        ]
    );
}

#[test]
fn running_twice_into_the_same_directory_succeeds() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let dir = tmp.path().join("star_images");
    let cfg = test_config(&dir, "stub://cam", 2);

    acquire::run(&cfg, &AtomicBool::new(false)).expect("first run");
    acquire::run(&cfg, &AtomicBool::new(false)).expect("second run");

    assert!(frame_file(&dir, 0).is_file());
    assert!(frame_file(&dir, 1).is_file());
}

#[test]
fn open_failure_produces_no_capture_iterations() {
    let tmp = tempfile::tempdir().expect("temp dir");
    let cfg = test_config(tmp.path(), "/dev/null/not-a-camera", 3);

    let err = acquire::run(&cfg, &AtomicBool::new(false));
    assert!(err.is_err());
    for index in 0..3 {
        assert!(!frame_file(tmp.path(), index).exists());
    }
}
