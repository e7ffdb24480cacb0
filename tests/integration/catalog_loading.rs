// Device catalog loading and output naming

use std::fs;
use tempfile::TempDir;
use transcast::engine::{Catalog, Device, generate_output_path};

const PHONE: &str = r#"{
    "make": "Acme",
    "model": "Phone",
    "description": "Acme Phone video",
    "author": {"name": "Ann Example", "email": "ann@example.com"},
    "version": "2.0",
    "icon": "file://phone.svg",
    "default": "Small",
    "presets": [
        {
            "name": "Small",
            "container": "qtmux",
            "extension": "mp4",
            "acodec": {"name": "faac", "container": "qtmux", "rate": ["8000", "48000"],
                       "passes": ["bitrate=96000 profile=2"], "channels": [1, 2]},
            "vcodec": {"name": "x264enc", "container": "qtmux", "rate": ["1", "30000/1001"],
                       "passes": ["pass=pass1", "pass=pass2"], "width": [176, 320], "height": [144, 240]}
        },
        {
            "name": "Large",
            "description": "Bigger and slower",
            "version": "2.1",
            "container": "qtmux",
            "extension": "m4v",
            "acodec": {"name": "faac", "passes": ["bitrate=128000"], "rate": [8000, 44100, 48000]},
            "vcodec": {"name": "x264enc", "passes": ["pass=qual"], "width": [176, 640], "height": [144, 480]}
        }
    ]
}"#;

fn catalog_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, contents) in files {
        fs::write(dir.path().join(name), contents).unwrap();
    }
    dir
}

#[test]
fn test_presets_inherit_device_metadata() {
    let dir = catalog_dir(&[("phone.json", PHONE)]);
    let mut catalog = Catalog::new();
    assert_eq!(catalog.load_directory(dir.path()).unwrap(), 1);

    let device = catalog.device("phone").unwrap();
    assert_eq!(device.name(), "Acme Phone");
    assert_eq!(device.presets.len(), 2);

    let small = catalog.preset("phone", "").unwrap();
    assert_eq!(small.name, "Small");
    assert_eq!(small.description, "Acme Phone video");
    assert_eq!(small.version, "2.0");
    assert_eq!(small.author.to_string(), "Ann Example <ann@example.com>");
    assert_eq!(small.pass_count(), 2);
    assert_eq!(small.slug("phone"), "phone-small");

    let large = catalog.preset("phone", "Large").unwrap();
    assert_eq!(large.description, "Bigger and slower");
    assert_eq!(large.version, "2.1");
    assert_eq!(large.icon, "file://phone.svg");
    assert_eq!(large.acodec.rate.to_string(), "{ 8000, 44100, 48000 }");
}

#[test]
fn test_device_json_round_trips() {
    let device = Device::from_json(PHONE).unwrap();
    let again = Device::from_json(&device.to_json().unwrap()).unwrap();
    assert_eq!(again.presets, device.presets);
    assert_eq!(again.default, "Small");
}

#[test]
fn test_bad_files_do_not_stop_loading() {
    let dir = catalog_dir(&[
        ("phone.json", PHONE),
        ("empty.json", ""),
        ("wrong.json", r#"{"presets": "not a list"}"#),
        ("readme.md", "# not a device"),
    ]);
    let mut catalog = Catalog::new();
    assert_eq!(catalog.load_directory(dir.path()).unwrap(), 1);
    assert!(catalog.device("empty").is_none());
    assert!(catalog.device("wrong").is_none());
}

#[test]
fn test_save_writes_back_to_source_file() {
    let dir = catalog_dir(&[("phone.json", PHONE)]);
    let path = dir.path().join("phone.json");

    let mut device = Device::load(&path).unwrap();
    device.default = "Large".to_string();
    device.save().unwrap();

    let reloaded = Device::load(&path).unwrap();
    assert_eq!(reloaded.default_preset().unwrap().name, "Large");
    assert_eq!(reloaded.short_name, "phone");
}

#[test]
fn test_version_info_lists_every_device() {
    let base = catalog_dir(&[("phone.json", PHONE)]);
    let user = catalog_dir(&[(
        "tablet.json",
        r#"{"model": "Tablet", "version": "0.9", "presets": []}"#,
    )]);

    let mut catalog = Catalog::new();
    catalog.load_search_paths(&[base.path(), user.path()]);
    assert_eq!(catalog.version_info(), "phone, 2.0\ntablet, 0.9\n");
    assert!(catalog.preset("tablet", "").is_err());
}

#[test]
fn test_output_names_avoid_collisions() {
    let dir = TempDir::new().unwrap();
    let catalog = {
        let mut c = Catalog::new();
        c.load_json("phone", PHONE).unwrap();
        c
    };
    let preset = catalog.preset("phone", "Small").unwrap();
    let input = dir.path().join("clip.avi");
    let input = input.to_string_lossy();

    let first = generate_output_path(&input, preset, &[], "phone");
    assert_eq!(first, dir.path().join("clip-phone.mp4"));

    fs::write(&first, b"taken").unwrap();
    let second = generate_output_path(&input, preset, &[], "phone");
    assert_eq!(second, dir.path().join("clip-phone1.mp4"));

    let third = generate_output_path(&input, preset, &[second.clone()], "phone");
    assert_eq!(third, dir.path().join("clip-phone2.mp4"));
}

#[test]
fn test_capture_output_uses_device_basename() {
    let mut catalog = Catalog::new();
    catalog.load_json("phone", PHONE).unwrap();
    let preset = catalog.preset("phone", "Large").unwrap();
    let path = generate_output_path("v4l2:///nonexistent/video0", preset, &[], "");
    assert_eq!(path.to_string_lossy(), "video0.m4v");
}
