//! BlurHash encoder.
//!
//! Projects the image onto a small grid of cosine basis functions in linear
//! RGB, then packs the DC term and quantised AC terms into a base-83 string.

use std::f64::consts::PI;

use image::RgbaImage;

use crate::error::CoreError;

const BASE83_CHARS: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz#$%*+,-.:;=?@[]^_{|}~";

/// Encode `image` with `components_x` by `components_y` basis functions.
///
/// Both component counts must be in `1..=9`.
pub fn encode(image: &RgbaImage, components_x: u32, components_y: u32) -> Result<String, CoreError> {
    if !(1..=9).contains(&components_x) || !(1..=9).contains(&components_y) {
        return Err(CoreError::Validation(format!(
            "BlurHash components must be between 1 and 9, got {components_x}x{components_y}"
        )));
    }
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(CoreError::Validation(
            "Cannot encode an empty image".to_string(),
        ));
    }

    let linear: Vec<[f64; 3]> = image
        .pixels()
        .map(|p| {
            [
                srgb_to_linear(p[0]),
                srgb_to_linear(p[1]),
                srgb_to_linear(p[2]),
            ]
        })
        .collect();

    let mut factors: Vec<[f64; 3]> = Vec::with_capacity((components_x * components_y) as usize);
    for j in 0..components_y {
        for i in 0..components_x {
            factors.push(basis_factor(i, j, width, height, &linear));
        }
    }

    let dc = factors[0];
    let ac = &factors[1..];

    let mut hash = String::with_capacity(4 + 2 * factors.len());
    let size_flag = (components_x - 1) + (components_y - 1) * 9;
    encode_base83(size_flag, 1, &mut hash);

    let maximum_value = if ac.is_empty() {
        encode_base83(0, 1, &mut hash);
        1.0
    } else {
        let actual_max = ac
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let quantised_max = (actual_max * 166.0 - 0.5).floor().clamp(0.0, 82.0) as u32;
        encode_base83(quantised_max, 1, &mut hash);
        (quantised_max + 1) as f64 / 166.0
    };

    encode_base83(encode_dc(dc), 4, &mut hash);
    for component in ac {
        encode_base83(encode_ac(*component, maximum_value), 2, &mut hash);
    }

    Ok(hash)
}

fn basis_factor(i: u32, j: u32, width: u32, height: u32, linear: &[[f64; 3]]) -> [f64; 3] {
    let normalisation = if i == 0 && j == 0 { 1.0 } else { 2.0 };
    let mut sum = [0.0_f64; 3];
    for y in 0..height {
        let basis_y = (PI * j as f64 * y as f64 / height as f64).cos();
        for x in 0..width {
            let basis = basis_y * (PI * i as f64 * x as f64 / width as f64).cos();
            let pixel = linear[(y * width + x) as usize];
            sum[0] += basis * pixel[0];
            sum[1] += basis * pixel[1];
            sum[2] += basis * pixel[2];
        }
    }
    let scale = normalisation / (width as f64 * height as f64);
    [sum[0] * scale, sum[1] * scale, sum[2] * scale]
}

fn encode_dc(value: [f64; 3]) -> u32 {
    (linear_to_srgb(value[0]) << 16) + (linear_to_srgb(value[1]) << 8) + linear_to_srgb(value[2])
}

fn encode_ac(value: [f64; 3], maximum_value: f64) -> u32 {
    let quant =
        |v: f64| (sign_pow(v / maximum_value, 0.5) * 9.0 + 9.5).floor().clamp(0.0, 18.0) as u32;
    quant(value[0]) * 19 * 19 + quant(value[1]) * 19 + quant(value[2])
}

fn encode_base83(value: u32, length: u32, out: &mut String) {
    for i in 1..=length {
        let digit = (value / 83_u32.pow(length - i)) % 83;
        out.push(BASE83_CHARS[digit as usize] as char);
    }
}

fn srgb_to_linear(value: u8) -> f64 {
    let v = value as f64 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(value: f64) -> u32 {
    let v = value.clamp(0.0, 1.0);
    if v <= 0.003_130_8 {
        (v * 12.92 * 255.0 + 0.5) as u32
    } else {
        ((1.055 * v.powf(1.0 / 2.4) - 0.055) * 255.0 + 0.5) as u32
    }
}

fn sign_pow(value: f64, exp: f64) -> f64 {
    value.abs().powf(exp).copysign(value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
