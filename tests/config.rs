use std::{env, sync::Mutex};

use emcc_sandboxd::config;
use indoc::indoc;

static LOCK: Mutex<()> = Mutex::new(());

#[test]
fn defaults_when_file_is_missing() {
    let _guard = LOCK.lock().unwrap();
    env::set_var("CONFIG_PATH", "/does/not/exist/config.json");
    let conf = config::load().unwrap();
    assert_eq!(conf.working_dir, "/srv/emcc-sandboxd");
    assert_eq!(conf.addr, ":8080");
    assert_eq!(conf.jobs_dir, "jobs");
    assert_eq!(conf.artifacts_dir, "artifacts");
    assert!(conf.enable_static_artifacts);
    assert_eq!(conf.artifact_ttl_days, 3);
    assert_eq!(conf.cleanup_interval_mins, 30);
    assert_eq!(
        conf.default_args,
        [
            "-sINVOKE_RUN=0",
            "-sENVIRONMENT=web",
            "-sALLOW_MEMORY_GROWTH=1",
            "-sMODULARIZE=1",
        ]
    );
    assert!(!conf.nsjail_enabled);
    assert_eq!(conf.nsjail_path, "nsjail");
    assert!(!conf.enable_resource_gating);
    assert_eq!(conf.job_memory_estimate_mb, 256);
}

#[test]
fn file_overrides_merge_with_defaults() {
    let _guard = LOCK.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        indoc! {r#"
            {
              "addr": ":9090",
              "workingDir": "",
              "artifactTTLDays": 7,
              "jobMemoryEstimateMB": 512,
              "nsjailEnabled": true,
              "nsjailPath": "/usr/local/bin/nsjail",
              "enableResourceGating": true,
              "cgroupV2Root": "/sys/fs/cgroup/emcc",
              "defaultArgs": ["-O2"]
            }
        "#},
    )
    .unwrap();
    env::set_var("CONFIG_PATH", &path);

    let conf = config::load().unwrap();
    assert_eq!(conf.addr, ":9090");
    assert!(conf.working_dir.is_empty());
    assert_eq!(conf.artifact_ttl_days, 7);
    assert_eq!(conf.job_memory_estimate_mb, 512);
    assert!(conf.nsjail_enabled);
    assert_eq!(conf.nsjail_path, "/usr/local/bin/nsjail");
    assert!(conf.enable_resource_gating);
    assert_eq!(
        conf.cgroup_v2_root,
        std::path::PathBuf::from("/sys/fs/cgroup/emcc")
    );
    assert_eq!(conf.default_args, ["-O2"]);
    // keys absent from the file keep their defaults
    assert_eq!(conf.jobs_dir, "jobs");
    assert_eq!(conf.cleanup_interval_mins, 30);
}

#[test]
fn malformed_file_is_an_error() {
    let _guard = LOCK.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "definitely not json").unwrap();
    env::set_var("CONFIG_PATH", &path);
    assert!(config::load().is_err());
}
