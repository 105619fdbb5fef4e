//! The HDR intensity of the color input.
//!
//! HDR denoiser models expect a scalar telling them how bright the image is, so that very dark
//! and very bright renders land in the range the model was trained on. It is the key value
//! divided by the log-average luminance.

/// The middle grey that the log-average luminance is mapped to.
const KEY_VALUE: f32 = 0.18;

/// Pixels darker than this are ignored, they'd dominate the log average.
const MIN_LUMINANCE: f32 = 1e-8;

/// Rec. 709 luminance weights.
const LUMINANCE_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Compute the HDR intensity of a `HALF3` color buffer.
pub fn hdr_intensity(half3: &[u8]) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0u64;

    for [red, green, blue] in crate::pixels::half3_to_rgb(half3) {
        let luminance = LUMINANCE_WEIGHTS[0].mul_add(
            red,
            LUMINANCE_WEIGHTS[1].mul_add(green, LUMINANCE_WEIGHTS[2] * blue),
        );
        if luminance > MIN_LUMINANCE {
            sum += f64::from(luminance.log2());
            count += 1;
        }
    }

    if count == 0 {
        tracing::warn!("Color input is black, using a neutral HDR intensity");
        return 1.0;
    }

    #[expect(
        clippy::as_conversions,
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        reason = "Accuracy beyond `f32` isn't needed for an exposure hint"
    )]
    let average = (sum / count as f64) as f32;
    KEY_VALUE / average.exp2()
}
