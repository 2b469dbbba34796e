use assert_cmd::cargo::cargo_bin_cmd;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_config(root: &Path) -> std::path::PathBuf {
    for sub in ["stim", "runs", "res"] {
        fs::create_dir_all(root.join(sub)).unwrap();
    }
    let config = root.join("scanstim.toml");
    fs::write(
        &config,
        format!(
            "stim_dir = {:?}\nruns_dir = {:?}\nres_dir = {:?}\n",
            root.join("stim"),
            root.join("runs"),
            root.join("res")
        ),
    )
    .unwrap();
    config
}

fn identify_table(rows: usize) -> String {
    let mut table = String::from("ObjectID,StimNo,StimType,Onset,Duration,Jitter,WhereAnimate\n");
    for i in 0..rows {
        table.push_str(&format!("fixation,0,fixation,{}.0,1.0,0,\n", 2 * i));
    }
    table
}

#[test]
fn short_trial_table_fails_before_the_run_starts() {
    let temp = tempdir().unwrap();
    let config = write_config(temp.path());
    fs::write(temp.path().join("runs/Sub01_Run02.csv"), identify_table(71)).unwrap();

    let mut cmd = cargo_bin_cmd!("scanstim");
    cmd.args([
        "--protocol",
        "identify",
        "--config",
        config.to_str().unwrap(),
        "SID000001",
        "A000000",
        "01",
        "02",
    ]);
    let output = cmd.assert().failure().get_output().clone();
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("expected 72"), "{}", stderr);
    // the log file is opened before the table is read
    assert!(temp.path().join("res/log_p01_r02.txt").exists());
    assert!(!temp.path().join("res/sub-01_run-02_events.tsv").exists());
}

#[test]
fn missing_media_is_reported() {
    let temp = tempdir().unwrap();
    let config = write_config(temp.path());
    let mut table = String::from("ObjectID,StimNo,StimType,Repeat,Onset,Duration,Jitter,FixChange\n");
    for i in 0..48 {
        let ty = if i == 5 { "photo" } else { "fixation" };
        table.push_str(&format!("hand_cactus,2,{},0,{}.0,6.0,0,0\n", ty, 9 * i));
    }
    fs::write(temp.path().join("runs/Sub03_Run01.csv"), table).unwrap();

    let mut cmd = cargo_bin_cmd!("scanstim");
    cmd.args(["--config", config.to_str().unwrap(), "SID", "ACC", "3", "1"]);
    let output = cmd.assert().failure().get_output().clone();
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("hand_cactus_2.png"), "{}", stderr);
}

#[test]
fn familiarize_needs_every_practice_clip() {
    let temp = tempdir().unwrap();
    let config = write_config(temp.path());
    fs::write(temp.path().join("stim/pig_alarm-clock_0_8s.mov"), b"mov").unwrap();

    let mut cmd = cargo_bin_cmd!("scanstim");
    cmd.args(["--protocol", "familiarize", "--config", config.to_str().unwrap()]);
    let output = cmd.assert().failure().get_output().clone();
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("missing media file"), "{}", stderr);
    assert!(stderr.contains("_0_8s.mov"), "{}", stderr);
    assert!(temp.path().join("res/log_practice.txt").exists());
}

#[test]
fn rejects_unknown_protocol() {
    let mut cmd = cargo_bin_cmd!("scanstim");
    cmd.args(["--protocol", "stroop"]);
    cmd.assert().failure();
}

#[test]
fn help_lists_protocol_flag() {
    let mut cmd = cargo_bin_cmd!("scanstim");
    cmd.arg("--help");
    let out = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("--protocol"));
    assert!(text.contains("identify"));
    assert!(text.contains("familiarize"));
}
