// Frame preprocessing shared by tensor-based backends

use crate::models::frame::Frame;
use crate::models::pose::PoseResult;
use image::imageops::{self, FilterType};

/// Resize a frame to the model input and lay it out as an NCHW float tensor
/// with values in [0, 1].
pub fn to_nchw_tensor(frame: &Frame, input_width: u32, input_height: u32) -> PoseResult<Vec<f32>> {
    let rgb = frame.to_rgb_image()?;
    let resized = if rgb.dimensions() == (input_width, input_height) {
        rgb
    } else {
        imageops::resize(&rgb, input_width, input_height, FilterType::Triangle)
    };

    let plane = (input_width * input_height) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
        let idx = (y * input_width + x) as usize;
        data[idx] = pixel[0] as f32 / 255.0;
        data[plane + idx] = pixel[1] as f32 / 255.0;
        data[2 * plane + idx] = pixel[2] as f32 / 255.0;
    }

    Ok(data)
}
