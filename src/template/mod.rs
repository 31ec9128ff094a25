//! Reference patterns and their precomputed scale bands.
//!
//! A `Template` is immutable after construction: one name plus a few scaled,
//! normalized copies of the authored image, each with its ZNCC plan ready.
//! Levels large enough also carry a box-downsampled plan for coarse search.

use crate::image::preprocess::{normalize, Frame};
use crate::image::pyramid::{build_scale_band, downsample_box, ScaleBand};
use crate::image::ImageView;
use crate::util::{AutoSceneError, AutoSceneResult};
use tracing::debug;

mod loader;
mod plan;

pub use loader::TemplateSet;
pub use plan::TemplatePlan;

/// Box-downsampling factors tried for coarse plans, largest first.
pub const COARSE_FACTORS: [usize; 2] = [4, 2];

/// Smallest side a coarse plan may have.
pub const MIN_COARSE_SIDE: usize = 12;

/// A level shrunk by an integer factor, used to locate candidate placements.
pub struct CoarsePlan {
    factor: usize,
    plan: TemplatePlan,
}

impl CoarsePlan {
    /// Builds the coarse plan for a level with the largest factor in
    /// [`COARSE_FACTORS`] that keeps both sides at [`MIN_COARSE_SIDE`] or
    /// more. Returns `None` if no factor qualifies or the result is flat.
    pub fn for_level(level: ImageView<'_, u8>) -> Option<Self> {
        let side = level.width().min(level.height());
        let factor = COARSE_FACTORS
            .iter()
            .copied()
            .find(|&f| side / f >= MIN_COARSE_SIDE)?;
        let image = downsample_box(level, factor).ok()?;
        let plan = TemplatePlan::from_view(image.view()).ok()?;
        Some(Self { factor, plan })
    }

    /// Returns the downsampling factor.
    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Returns the plan of the downsampled level.
    pub fn plan(&self) -> &TemplatePlan {
        &self.plan
    }
}

/// One scaled copy of a template.
pub struct TemplateLevel {
    scale: f32,
    plan: TemplatePlan,
    coarse: Option<CoarsePlan>,
}

impl TemplateLevel {
    /// Returns the scale factor relative to the authored size.
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Returns the precomputed ZNCC plan for this level.
    pub fn plan(&self) -> &TemplatePlan {
        &self.plan
    }

    /// Returns the coarse plan, if this level is large enough for one.
    pub fn coarse(&self) -> Option<&CoarsePlan> {
        self.coarse.as_ref()
    }
}

/// Named reference pattern with its scale band.
pub struct Template {
    name: String,
    levels: Vec<TemplateLevel>,
}

impl Template {
    /// Builds a template from an RGB source image.
    pub fn from_frame(name: impl Into<String>, source: &Frame, band: &ScaleBand) -> AutoSceneResult<Self> {
        let normalized = normalize(source)?;
        Self::from_normalized(name, normalized.view(), band)
    }

    /// Builds a template from an already normalized grayscale image.
    ///
    /// Levels that are flat after resampling are dropped. A template left with
    /// no level is rejected.
    pub fn from_normalized(
        name: impl Into<String>,
        base: ImageView<'_, u8>,
        band: &ScaleBand,
    ) -> AutoSceneResult<Self> {
        let name = name.into();
        let mut levels = Vec::new();
        for scaled in build_scale_band(base, &band.scales())? {
            match TemplatePlan::from_view(scaled.image.view()) {
                Ok(plan) => levels.push(TemplateLevel {
                    scale: scaled.scale,
                    plan,
                    coarse: CoarsePlan::for_level(scaled.image.view()),
                }),
                Err(err) => debug!(template = %name, scale = scaled.scale, %err, "dropping level"),
            }
        }
        if levels.is_empty() {
            return Err(AutoSceneError::DegenerateTemplate {
                reason: "no usable pyramid levels",
            });
        }
        Ok(Self { name, levels })
    }

    /// Returns the template name (its file name when loaded from disk).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the levels, smallest scale first.
    pub fn levels(&self) -> &[TemplateLevel] {
        &self.levels
    }
}

#[cfg(test)]
mod tests {
    use super::Template;
    use crate::image::pyramid::ScaleBand;
    use crate::util::AutoSceneError;
    use image::{Rgb, RgbImage};

    #[test]
    fn template_keeps_one_level_per_scale() {
        let src = RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 6) as u8, (y * 8) as u8, 50]));
        let tpl = Template::from_frame("menu.png", &src, &ScaleBand::default()).unwrap();
        assert_eq!(tpl.name(), "menu.png");
        let widths: Vec<_> = tpl.levels().iter().map(|l| l.plan().width()).collect();
        assert_eq!(widths, vec![24, 32, 40]);
    }

    #[test]
    fn coarse_factor_follows_level_size() {
        let src = RgbImage::from_fn(160, 90, |x, y| Rgb([(x + y) as u8, (x * 3) as u8, (y * 2) as u8]));
        let tpl = Template::from_frame("hud.png", &src, &ScaleBand::default()).unwrap();
        let factors: Vec<_> = tpl
            .levels()
            .iter()
            .map(|l| l.coarse().map(|c| c.factor()))
            .collect();
        assert_eq!(factors, vec![Some(4), Some(4), Some(4)]);
        let coarse = tpl.levels()[2].coarse().unwrap().plan();
        assert_eq!((coarse.width(), coarse.height()), (40, 22));

        let small = Template::from_frame("icon.png", &src, &ScaleBand {
            levels: 1,
            min_scale: 0.15,
            max_scale: 0.15,
        })
        .unwrap();
        assert!(small.levels()[0].coarse().is_none());
    }

    #[test]
    fn flat_source_has_no_levels() {
        let src = RgbImage::from_pixel(16, 16, Rgb([90, 90, 90]));
        let err = Template::from_frame("flat.png", &src, &ScaleBand::default())
            .err()
            .unwrap();
        assert_eq!(
            err,
            AutoSceneError::DegenerateTemplate {
                reason: "no usable pyramid levels"
            }
        );
    }
}
