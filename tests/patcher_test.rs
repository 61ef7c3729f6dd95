mod helpers;

use botstrap::executor::RealCommandExecutor;
use botstrap::patcher::{PatchOutcome, apply_patch};
use helpers::utf8;
use tempfile::tempdir;

const MARKER: &str = "#dtparam=i2c_arm=on";
const REPLACEMENT: &str = "dtparam=i2c_arm=on\nstart_x=1";

/// The patcher stages content and moves it into place; with privilege
/// disabled the move is a plain `mv`, so these tests exercise the real
/// write discipline against a temp directory.
fn executor() -> RealCommandExecutor {
    RealCommandExecutor { dry_run: false }
}

#[test]
fn patch_replaces_marker_and_preserves_other_lines() {
    let dir = tempdir().expect("failed to create temp dir");
    let config = utf8(&dir.path().join("config.txt"));
    std::fs::write(&config, "# For more options see the docs\n#dtparam=i2c_arm=on\ngpu_mem=128\n")
        .expect("failed to seed config");

    let outcome = apply_patch(&config, MARKER, REPLACEMENT, None, &executor())
        .expect("patch should succeed");

    assert_eq!(outcome, PatchOutcome::Patched);
    let patched = std::fs::read_to_string(&config).expect("failed to read config");
    assert_eq!(
        patched,
        "# For more options see the docs\ndtparam=i2c_arm=on\nstart_x=1\ngpu_mem=128\n"
    );
}

#[test]
fn patch_is_idempotent() {
    let dir = tempdir().expect("failed to create temp dir");
    let config = utf8(&dir.path().join("config.txt"));
    std::fs::write(&config, "#dtparam=i2c_arm=on\ngpu_mem=128\n").expect("failed to seed config");

    let first = apply_patch(&config, MARKER, REPLACEMENT, None, &executor())
        .expect("first patch should succeed");
    assert_eq!(first, PatchOutcome::Patched);
    let after_first = std::fs::read_to_string(&config).expect("failed to read config");

    // The replacement consumed the marker, so a second pass is a no-op.
    let second = apply_patch(&config, MARKER, REPLACEMENT, None, &executor())
        .expect("second patch should succeed");
    assert_eq!(second, PatchOutcome::NoMarker);
    let after_second = std::fs::read_to_string(&config).expect("failed to read config");
    assert_eq!(after_first, after_second);
}

#[test]
fn file_without_marker_is_left_byte_for_byte_unchanged() {
    let dir = tempdir().expect("failed to create temp dir");
    let config = utf8(&dir.path().join("config.txt"));
    let original = "gpu_mem=128\ndtoverlay=vc4-kms-v3d\n# trailing comment";
    std::fs::write(&config, original).expect("failed to seed config");

    let outcome = apply_patch(&config, MARKER, REPLACEMENT, None, &executor())
        .expect("patch should succeed");

    assert_eq!(outcome, PatchOutcome::NoMarker);
    let contents = std::fs::read_to_string(&config).expect("failed to read config");
    assert_eq!(contents, original);
}

#[test]
fn missing_file_is_skipped_and_never_created() {
    let dir = tempdir().expect("failed to create temp dir");
    let config = utf8(&dir.path().join("does-not-exist.txt"));

    let outcome = apply_patch(&config, MARKER, REPLACEMENT, None, &executor())
        .expect("missing file is a reported outcome, not an error");

    assert_eq!(outcome, PatchOutcome::MissingFile);
    assert!(!config.exists(), "patcher must never create a config file");
}

#[test]
fn stock_config_ends_up_with_i2c_and_camera_lines() {
    let dir = tempdir().expect("failed to create temp dir");
    let config = utf8(&dir.path().join("config.txt"));
    std::fs::write(&config, "#dtparam=i2c_arm=on\n").expect("failed to seed config");

    apply_patch(&config, MARKER, REPLACEMENT, None, &executor()).expect("patch should succeed");

    let patched = std::fs::read_to_string(&config).expect("failed to read config");
    assert_eq!(patched, "dtparam=i2c_arm=on\nstart_x=1\n");
}

#[test]
fn relative_order_of_untouched_lines_is_preserved() {
    let dir = tempdir().expect("failed to create temp dir");
    let config = utf8(&dir.path().join("config.txt"));
    std::fs::write(&config, "a=1\nb=2\n#dtparam=i2c_arm=on\nc=3\nd=4\n")
        .expect("failed to seed config");

    apply_patch(&config, MARKER, REPLACEMENT, None, &executor()).expect("patch should succeed");

    let patched = std::fs::read_to_string(&config).expect("failed to read config");
    let lines: Vec<&str> = patched.lines().collect();
    assert_eq!(lines, vec!["a=1", "b=2", "dtparam=i2c_arm=on", "start_x=1", "c=3", "d=4"]);
}
