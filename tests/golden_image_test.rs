#[cfg(feature = "integration-tests")]
mod common;

#[test]
#[cfg(feature = "integration-tests")]
fn should_render_background_colour() {
    use godray_stage::{
        context::Context,
        data_structures::scene_graph::{NodeIds, SceneNode},
        flow::ImageTestResult,
        scene::SceneTree,
        settings,
    };

    use crate::common::test_utils::TestRender;

    let tree = SceneTree {
        camera: settings::CAMERA,
        ambient: settings::AMBIENT,
        background: settings::BACKGROUND,
        antialias: false,
        root: SceneNode::group(NodeIds::new().next(), "empty"),
        post_processing: None,
    };

    golden_image_test!(TestRender::new(
        tree,
        |_: &mut Context| {},
        |_, frames, texture| {
            if frames.frame() == 0 {
                return Ok(ImageTestResult::Waiting);
            }
            let [r, g, b] = [
                settings::BACKGROUND.r,
                settings::BACKGROUND.g,
                settings::BACKGROUND.b,
            ];
            for pixel in texture.pixels() {
                let close = |got: u8, want: u8| got.abs_diff(want) <= 1;
                // Surface channel order may be BGRA; the background is grey.
                if !(close(pixel[0], r) && close(pixel[1], g) && close(pixel[2], b)) {
                    return Ok(ImageTestResult::Failed);
                }
            }
            Ok(ImageTestResult::Passed)
        },
    ));
}
