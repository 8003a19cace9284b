use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{ImageReader, Limits};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::{error::DecodeError, types::Frame};

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

/// Largest accepted width or height. Webcam frames stay far below this.
pub const MAX_IMAGE_SIDE: u32 = 4096;

pub fn decode_image_payload(payload: &str) -> Result<Frame, DecodeError> {
    let encoded = match payload.split_once(',') {
        Some((_header, data)) => data,
        None => payload,
    };
    let bytes = STANDARD.decode(encoded.trim())?;
    decode_image_bytes(&bytes)
}

pub fn decode_image_bytes(bytes: &[u8]) -> Result<Frame, DecodeError> {
    let (rgba, width, height) = if bytes.starts_with(&JPEG_SOI) {
        jpeg_to_rgba(bytes)?
    } else {
        generic_to_rgba(bytes)?
    };

    if width == 0 || height == 0 {
        return Err(DecodeError::Empty);
    }

    Ok(Frame::new(rgba, width, height))
}

fn check_dimensions(width: u32, height: u32) -> Result<(), DecodeError> {
    if width > MAX_IMAGE_SIDE || height > MAX_IMAGE_SIDE {
        return Err(DecodeError::Image(format!(
            "image is {width}x{height}, larger than {MAX_IMAGE_SIDE}x{MAX_IMAGE_SIDE}"
        )));
    }
    Ok(())
}

fn jpeg_to_rgba(data: &[u8]) -> Result<(Vec<u8>, u32, u32), DecodeError> {
    let options = DecoderOptions::default()
        .jpeg_set_out_colorspace(ColorSpace::RGBA)
        .set_max_width(MAX_IMAGE_SIDE as usize)
        .set_max_height(MAX_IMAGE_SIDE as usize);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);

    // Dimensions are checked before any pixel buffer is allocated.
    decoder
        .decode_headers()
        .map_err(|err| DecodeError::Image(format!("JPEG header invalid: {err:?}")))?;
    let info = decoder
        .info()
        .ok_or_else(|| DecodeError::Image("JPEG header missing".to_string()))?;
    let width = u32::from(info.width);
    let height = u32::from(info.height);
    check_dimensions(width, height)?;

    let mut rgba = decoder
        .decode()
        .map_err(|err| DecodeError::Image(format!("JPEG decode failed: {err:?}")))?;

    let expected_len = width as usize * height as usize * 4;
    if rgba.len() < expected_len {
        return Err(DecodeError::Image(format!(
            "JPEG decode produced too few bytes: got {}, expected {}",
            rgba.len(),
            expected_len
        )));
    }
    rgba.truncate(expected_len);

    Ok((rgba, width, height))
}

fn generic_to_rgba(data: &[u8]) -> Result<(Vec<u8>, u32, u32), DecodeError> {
    let mut reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|err| DecodeError::Image(err.to_string()))?;
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_SIDE);
    limits.max_image_height = Some(MAX_IMAGE_SIDE);
    reader.limits(limits);

    let image = reader
        .decode()
        .map_err(|err| DecodeError::Image(err.to_string()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    check_dimensions(width, height)?;
    Ok((image.into_raw(), width, height))
}
