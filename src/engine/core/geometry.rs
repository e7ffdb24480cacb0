use super::capability::DimensionBound;
use super::error::{TranscodeError, TranscodeResult};
use super::types::{Crop, PixelAspectRatio};
use serde::{Deserialize, Serialize};

/// Frame geometry for the video branch of a pass.
///
/// `width`/`height` are the scaler output caps, the padding is added
/// afterwards by a letterbox stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    pub crop: Crop,
    pub pad_left: u32,
    pub pad_right: u32,
    pub pad_top: u32,
    pub pad_bottom: u32,
}

impl Geometry {
    pub fn output_width(&self) -> u32 {
        self.width + self.pad_left + self.pad_right
    }

    pub fn output_height(&self) -> u32 {
        self.height + self.pad_top + self.pad_bottom
    }

    pub fn is_padded(&self) -> bool {
        self.pad_left + self.pad_right + self.pad_top + self.pad_bottom > 0
    }
}

/// Compute output dimensions for a source frame.
///
/// Width is fitted first and height second, both scaling from the cropped
/// source so the aspect ratio is kept. The height step wins; a width it pushes
/// past the maximum is cut back, and one left under the minimum is padded.
///
/// The cut back departs from the classic GStreamer transcoder, which let the
/// width overshoot for extreme aspect ratios. Output sizes differ only for
/// those sources.
pub fn plan(
    source_width: u32,
    source_height: u32,
    par: PixelAspectRatio,
    crop: Crop,
    width_bound: DimensionBound,
    height_bound: DimensionBound,
) -> TranscodeResult<Geometry> {
    let cropped_w = i64::from(source_width) - i64::from(crop.left) - i64::from(crop.right);
    let cropped_h = i64::from(source_height) - i64::from(crop.top) - i64::from(crop.bottom);
    if cropped_w <= 0 || cropped_h <= 0 {
        return Err(TranscodeError::construction(format!(
            "crop {} leaves nothing of a {}x{} frame",
            crop, source_width, source_height
        )));
    }

    let par = PixelAspectRatio::new(par.num, par.denom);
    let owidth = ((cropped_w as f64) * f64::from(par.num) / f64::from(par.denom)).round() as u32;
    let owidth = owidth.max(1);
    let oheight = cropped_h as u32;

    let (wmin, wmax) = (width_bound.min, width_bound.max);
    let (hmin, hmax) = (height_bound.min, height_bound.max);

    let mut width = owidth;
    let mut height = oheight;

    if owidth < wmin {
        width = wmin;
        height = scaled(wmin, owidth, oheight);
    } else if owidth > wmax {
        width = wmax;
        height = scaled(wmax, owidth, oheight);
    }

    if height < hmin {
        height = hmin;
        width = scaled(hmin, oheight, owidth);
    } else if height > hmax {
        height = hmax;
        width = scaled(hmax, oheight, owidth);
    }
    width = width.clamp(1, wmax.max(1));

    let (mut pad_left, mut pad_right, mut pad_top, mut pad_bottom) = (0, 0, 0, 0);
    if width < wmin {
        pad_left = (wmin - width) / 2;
        pad_right = pad_left;
    }
    if height < hmin {
        pad_top = (hmin - height) / 2;
        pad_bottom = pad_top;
    }

    if width % 2 == 1 {
        width += 1;
    }
    if height % 2 == 1 {
        height += 1;
    }

    Ok(Geometry {
        width,
        height,
        crop,
        pad_left,
        pad_right,
        pad_top,
        pad_bottom,
    })
}

/// `target / reference * other`, truncated
fn scaled(target: u32, reference: u32, other: u32) -> u32 {
    (f64::from(target) / f64::from(reference) * f64::from(other)) as u32
}
