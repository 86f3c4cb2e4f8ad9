// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate assert_cmd;
extern crate predicates;
extern crate tempfile;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::tempdir;

fn flamegen() -> Command {
    Command::cargo_bin("flamegen").unwrap()
}

#[test]
fn renders_a_still() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("still.png");
    flamegen()
        .args(&["-s", "48x32", "-q", "2", "-t", "1", "--seed", "42", "-o"])
        .arg(&out)
        .assert()
        .success();
    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(&bytes[1..4], b"PNG");
}

#[test]
fn numbers_animation_frames() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("anim.png");
    flamegen()
        .args(&["-s", "24x24", "-q", "1", "-t", "1", "--seed", "7", "-f", "3", "-o"])
        .arg(&out)
        .assert()
        .success();
    for i in 0..3 {
        assert!(dir.path().join(format!("anim-{:04}.png", i)).exists());
    }
    assert!(!out.exists());
}

#[test]
fn rejects_a_malformed_size() {
    let dir = tempdir().unwrap();
    flamegen()
        .args(&["-s", "48by32", "-o"])
        .arg(dir.path().join("x.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not parse output image size"));
}

#[test]
fn rejects_an_empty_size() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("x.png");
    flamegen()
        .args(&["-s", "0x0", "-o"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Output image must be at least 1x1"));
    assert!(!out.exists());
}

#[test]
fn rejects_supersample_out_of_range() {
    let dir = tempdir().unwrap();
    flamegen()
        .args(&["-S", "9", "-o"])
        .arg(dir.path().join("x.png"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Supersample must be between 1 and 4"));
}

#[test]
fn requires_an_output() {
    flamegen().assert().failure();
}

#[test]
fn accepts_negative_symmetry() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("sym.png");
    flamegen()
        .args(&["-s", "24x24", "-q", "1", "-t", "1", "--seed", "3", "--symmetry", "-3", "-o"])
        .arg(&out)
        .assert()
        .success();
    assert!(out.exists());
}
