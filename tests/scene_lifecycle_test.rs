use std::sync::atomic::Ordering;

use godray_stage::{
    SceneRoot,
    camera::{Camera, OrbitController},
    data_structures::material::Material,
    scene::Effect,
    settings,
    signal::Availability,
};

use crate::common::test_utils::{FailingSource, FakeSource};

mod common;

fn scene() -> (SceneRoot, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
    let (source, plays) = FakeSource::new();
    (SceneRoot::new(Box::new(source)), plays)
}

#[test]
fn post_processing_is_absent_before_the_first_commit() {
    let (root, plays) = scene();

    let tree = root.compose();

    assert!(tree.post_processing.is_none());
    assert!(!root.screen().material().is_ready());
    assert!(!root.screen().emitter().is_mounted());
    assert_eq!(plays.load(Ordering::SeqCst), 0);
}

#[test]
fn first_commit_mounts_god_rays_then_bloom() {
    let (mut root, _) = scene();

    assert!(root.commit());
    let tree = root.compose();

    let composer = tree.post_processing.expect("composer after the first commit");
    let stages = composer.stages();
    assert!(matches!(stages[0], Effect::GodRays(_)));
    assert!(matches!(stages[1], Effect::Bloom(_)));
    assert_eq!(composer.sun().node(), root.screen().emitter().surface());
    assert_eq!(composer.multisampling, settings::COMPOSER.multisampling);
}

#[test]
fn emitter_reports_once() {
    let (mut root, plays) = scene();

    assert!(root.commit());
    assert!(!root.commit());
    assert!(!root.commit());

    assert_eq!(plays.load(Ordering::SeqCst), 1);
    let first = root.compose().post_processing;
    let again = root.compose().post_processing;
    assert_eq!(first, again);
}

#[test]
fn composing_is_idempotent() {
    let (mut root, _) = scene();
    assert_eq!(root.compose(), root.compose());

    root.commit();
    assert_eq!(root.compose(), root.compose());
}

#[test]
fn reported_material_is_the_video_surface() {
    let (mut root, _) = scene();
    root.commit();

    let Availability::Ready(handle) = root.screen().material() else {
        panic!("material should be ready after the first commit");
    };
    match handle.material() {
        Material::Basic(basic) => assert!(basic.map.is_some()),
        other => panic!("unexpected surface material {:?}", other),
    }

    let tree = root.compose();
    let surface = tree
        .root
        .find(handle.node())
        .expect("surface node in the composed tree");
    assert!(
        surface
            .material()
            .is_some_and(|material| handle.refers_to(material))
    );
}

#[test]
fn failed_video_still_mounts_post_processing() {
    let mut root = SceneRoot::new(Box::new(FailingSource::new()));

    assert!(root.commit());
    let tree = root.compose();

    assert!(tree.post_processing.is_some());
    assert!(tree.root.find(root.screen().emitter().surface()).is_some());
}

#[test]
fn orbiting_leaves_the_screen_alone() {
    let (mut root, _) = scene();
    root.commit();
    let before = root.compose();

    let mut camera = Camera::from_settings(&settings::CAMERA);
    let mut controller = OrbitController::new(settings::ORBIT);
    controller.handle_scroll(3.0);
    assert!(controller.update(&mut camera));

    assert!(!root.commit());
    assert_eq!(root.compose(), before);
    assert!(root.screen().material().is_ready());
}

#[test]
fn tree_carries_the_scene_defaults() {
    let (root, _) = scene();
    let tree = root.compose();

    assert_eq!(tree.background, settings::BACKGROUND);
    assert!(!tree.antialias);
    assert_eq!(tree.root.get_children().len(), 4);
}
