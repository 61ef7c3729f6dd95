mod helpers;

use botstrap::config::StartupConfig;
use botstrap::executor::RealCommandExecutor;
use botstrap::probe::InstallStrategy;
use botstrap::startup::{
    StartupMechanism, crontab_entry, register, startup_script_contents, unit_file_contents,
    write_startup_script,
};
use camino::{Utf8Path, Utf8PathBuf};
use helpers::{ScriptedExecutor, make_environment, utf8};
use tempfile::tempdir;

fn isolated_strategy() -> InstallStrategy {
    InstallStrategy::isolated(
        Utf8Path::new("/home/pi/.cargo/bin/uv"),
        Utf8PathBuf::from("/home/pi/.venv"),
    )
}

#[test]
fn script_activates_the_virtual_environment_when_isolated() {
    let contents =
        startup_script_contents(&isolated_strategy(), "/home/pi/robot/server/webServer.py");
    assert_eq!(
        contents,
        "#!/bin/sh\n. /home/pi/.venv/bin/activate && python3 /home/pi/robot/server/webServer.py\n"
    );
}

#[test]
fn script_invokes_the_server_directly_without_isolation() {
    let contents = startup_script_contents(
        &InstallStrategy::system_wide(),
        "/home/pi/robot/server/webServer.py",
    );
    assert_eq!(contents, "#!/bin/sh\npython3 /home/pi/robot/server/webServer.py\n");
}

#[test]
fn written_script_is_executable_but_not_world_writable() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().expect("failed to create temp dir");
    let env = make_environment(utf8(dir.path()));
    let cfg = StartupConfig::default();

    let script = write_startup_script(
        &env,
        &cfg,
        &InstallStrategy::system_wide(),
        &RealCommandExecutor { dry_run: false },
    )
    .expect("failed to write startup script");

    assert_eq!(script, env.home.join("startup.sh"));
    let mode = std::fs::metadata(&script)
        .expect("failed to stat script")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o755);

    let contents = std::fs::read_to_string(&script).expect("failed to read script");
    assert!(contents.starts_with("#!/bin/sh\n"));
    assert!(contents.contains(&format!("python3 {}/server/webServer.py", env.project_dir)));
}

#[test]
fn dry_run_does_not_create_the_script() {
    let dir = tempdir().expect("failed to create temp dir");
    let env = make_environment(utf8(dir.path()));

    let script = write_startup_script(
        &env,
        &StartupConfig::default(),
        &InstallStrategy::system_wide(),
        &RealCommandExecutor { dry_run: true },
    )
    .expect("dry run should succeed");

    assert!(!script.exists(), "dry run must not touch the filesystem target");
}

#[test]
fn unit_file_carries_the_supervision_fields() {
    let env = make_environment("/home/pi");
    let unit = unit_file_contents(
        Utf8Path::new("/home/pi/startup.sh"),
        &env,
        &isolated_strategy(),
    );

    assert!(unit.contains("[Unit]\n"));
    assert!(unit.contains("After=network.target\n"));
    assert!(unit.contains("User=pi\n"));
    assert!(unit.contains("Group=pi\n"));
    assert!(unit.contains("WorkingDirectory=/home/pi\n"));
    assert!(unit.contains("ExecStart=/home/pi/startup.sh\n"));
    assert!(unit.contains("Restart=always\n"));
    assert!(unit.contains("RestartSec=5\n"));
    assert!(unit.contains("Environment=PATH=/home/pi/.venv/bin:"));
    assert!(unit.contains("WantedBy=multi-user.target\n"));
}

#[test]
fn unit_file_path_omits_the_venv_without_isolation() {
    let env = make_environment("/home/pi");
    let unit = unit_file_contents(
        Utf8Path::new("/home/pi/startup.sh"),
        &env,
        &InstallStrategy::system_wide(),
    );
    assert!(!unit.contains(".venv"));
}

#[test]
fn successful_systemd_registration_never_touches_crontab() {
    let env = make_environment("/home/pi");
    let executor = ScriptedExecutor::new();

    let mechanism = register(
        Utf8Path::new("/home/pi/startup.sh"),
        &env,
        &StartupConfig::default(),
        &InstallStrategy::system_wide(),
        None,
        &executor,
    )
    .expect("registration should succeed");

    assert_eq!(mechanism, StartupMechanism::Systemd);
    assert_eq!(executor.count_matching("crontab"), 0);
    assert_eq!(executor.count_matching("/etc/systemd/system/robot-web.service"), 1);
    assert_eq!(executor.count_matching("systemctl \"daemon-reload\""), 1);
    assert_eq!(executor.count_matching("systemctl \"enable\" \"robot-web.service\""), 1);
}

#[test]
fn systemd_failure_falls_back_to_a_single_crontab_append() {
    let env = make_environment("/home/pi");
    let executor = ScriptedExecutor::new()
        .fail_always("systemctl")
        .with_stdout("crontab \"-l\"", "0 4 * * * /usr/bin/backup\n");

    let mechanism = register(
        Utf8Path::new("/home/pi/startup.sh"),
        &env,
        &StartupConfig::default(),
        &InstallStrategy::system_wide(),
        None,
        &executor,
    )
    .expect("fallback registration should succeed");

    assert_eq!(mechanism, StartupMechanism::Crontab);
    // One read of the existing table, one load of the merged table.
    assert_eq!(executor.count_matching("crontab \"-l\""), 1);
    assert_eq!(executor.count_matching("crontab"), 2);
}

#[test]
fn unit_install_failure_also_falls_back_to_crontab() {
    let env = make_environment("/home/pi");
    let executor = ScriptedExecutor::new().fail_always("mv");

    let mechanism = register(
        Utf8Path::new("/home/pi/startup.sh"),
        &env,
        &StartupConfig::default(),
        &InstallStrategy::system_wide(),
        None,
        &executor,
    )
    .expect("fallback registration should succeed");

    assert_eq!(mechanism, StartupMechanism::Crontab);
    // The primary path stops at the failed unit install.
    assert_eq!(executor.count_matching("systemctl"), 0);
}

#[test]
fn crontab_entry_uses_the_reboot_form() {
    assert_eq!(
        crontab_entry(Utf8Path::new("/home/pi/startup.sh")),
        "@reboot /home/pi/startup.sh"
    );
}

#[test]
fn crontab_failure_after_systemd_failure_propagates() {
    let env = make_environment("/home/pi");
    let executor = ScriptedExecutor::new()
        .fail_always("systemctl")
        .fail_always("crontab");

    let result = register(
        Utf8Path::new("/home/pi/startup.sh"),
        &env,
        &StartupConfig::default(),
        &InstallStrategy::system_wide(),
        None,
        &executor,
    );

    let err = result.expect_err("both mechanisms failing should error");
    assert!(
        format!("{:#}", err).contains("crontab registration failed"),
        "unexpected error: {:#}",
        err
    );
}
