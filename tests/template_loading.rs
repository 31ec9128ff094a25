mod common;

use autoscene::{AutoSceneError, ScaleBand, TemplateSet};
use common::sinusoid;
use image::{Rgb, RgbImage};
use std::fs;

#[test]
fn loads_recognized_images_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    sinusoid(40, 32).save(dir.path().join("b_menu.png")).unwrap();
    sinusoid(32, 32).save(dir.path().join("a_loading.BMP")).unwrap();
    fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

    let set = TemplateSet::load_dir(dir.path(), &ScaleBand::default()).unwrap();
    let names: Vec<_> = set.templates().iter().map(|t| t.name()).collect();
    assert_eq!(names, vec!["a_loading.BMP", "b_menu.png"]);
    assert!(set.templates().iter().all(|t| t.levels().len() == 3));
}

#[test]
fn undecodable_and_flat_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    sinusoid(40, 40).save(dir.path().join("loading.png")).unwrap();
    fs::write(dir.path().join("broken.png"), b"\x89PNG garbage").unwrap();
    RgbImage::from_pixel(20, 20, Rgb([40, 40, 40]))
        .save(dir.path().join("flat.png"))
        .unwrap();

    let set = TemplateSet::load_dir(dir.path(), &ScaleBand::default()).unwrap();
    assert_eq!(set.len(), 1);
    assert_eq!(set.templates()[0].name(), "loading.png");
}

#[test]
fn empty_directory_has_no_templates() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("readme.md"), "# templates").unwrap();

    let err = TemplateSet::load_dir(dir.path(), &ScaleBand::default())
        .err()
        .unwrap();
    assert!(matches!(err, AutoSceneError::NoTemplatesAvailable { .. }));
}

#[test]
fn missing_directory_has_no_templates() {
    let dir = tempfile::tempdir().unwrap();
    let err = TemplateSet::load_dir(dir.path().join("absent"), &ScaleBand::default())
        .err()
        .unwrap();
    assert!(matches!(err, AutoSceneError::NoTemplatesAvailable { .. }));
}

#[test]
fn small_template_keeps_levels_that_survive() {
    let dir = tempfile::tempdir().unwrap();
    sinusoid(4, 2).save(dir.path().join("tiny.png")).unwrap();
    let band = ScaleBand {
        levels: 3,
        min_scale: 0.2,
        max_scale: 1.0,
    };
    let set = TemplateSet::load_dir(dir.path(), &band).unwrap();
    let levels = set.templates()[0].levels();
    assert!(!levels.is_empty() && levels.len() < 3);
}
