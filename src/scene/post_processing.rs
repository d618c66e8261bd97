//! Description of the full-frame effect chain mounted by the screen.
//!
//! This is plain data; [`crate::pipelines::post`] turns it into GPU passes.

use crate::{
    data_structures::material::MaterialHandle,
    settings::{self, BloomSettings, ComposerSettings, GodRaysSettings},
};

/// Volumetric light shafts radiating from the surface behind `sun`.
#[derive(Clone, Debug, PartialEq)]
pub struct GodRays {
    pub sun: MaterialHandle,
    pub settings: GodRaysSettings,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bloom {
    pub settings: BloomSettings,
}

/// One full-frame stage, borrowed from its composer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Effect<'a> {
    GodRays(&'a GodRays),
    Bloom(&'a Bloom),
}

/// God rays followed by bloom. The two stages only exist together and always
/// run in that order.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectComposer {
    pub multisampling: u32,
    pub disable_normal_pass: bool,
    god_rays: GodRays,
    bloom: Bloom,
}

impl EffectComposer {
    pub fn new(sun: MaterialHandle) -> Self {
        Self::with_settings(sun, settings::COMPOSER, settings::GOD_RAYS, settings::BLOOM)
    }

    pub fn with_settings(
        sun: MaterialHandle,
        composer: ComposerSettings,
        god_rays: GodRaysSettings,
        bloom: BloomSettings,
    ) -> Self {
        Self {
            multisampling: composer.multisampling,
            disable_normal_pass: composer.disable_normal_pass,
            god_rays: GodRays {
                sun,
                settings: god_rays,
            },
            bloom: Bloom { settings: bloom },
        }
    }

    /// Stages in execution order; each consumes the previous one's output.
    pub fn stages(&self) -> [Effect<'_>; 2] {
        [Effect::GodRays(&self.god_rays), Effect::Bloom(&self.bloom)]
    }

    pub fn god_rays(&self) -> &GodRays {
        &self.god_rays
    }

    pub fn bloom(&self) -> &Bloom {
        &self.bloom
    }

    pub fn sun(&self) -> &MaterialHandle {
        &self.god_rays.sun
    }
}
