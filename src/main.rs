use godray_stage::{SceneRoot, flow};

fn main() -> anyhow::Result<()> {
    flow::run(Box::new(SceneRoot::with_default_video()))
}
