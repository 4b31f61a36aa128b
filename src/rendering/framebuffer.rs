/// Output image for the ray-caster
/// Stores ARGB color only; visibility is resolved per ray, so there is no
/// depth buffer.
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::{_mm256_set1_epi32, _mm256_storeu_si256, _mm_set1_epi32, _mm_storeu_si128};

/// View into a contiguous set of rows in the framebuffer.
/// Used for multi-core compositing where each worker owns a disjoint slice.
pub struct FrameSlice<'a> {
    pub width: usize,
    pub y0: usize,
    pub height: usize,
    pub color: &'a mut [u32],
}

impl<'a> FrameSlice<'a> {
    /// Mutable row `y_local` of this slice.
    #[inline]
    pub fn row_mut(&mut self, y_local: usize) -> &mut [u32] {
        let start = y_local * self.width;
        &mut self.color[start..start + self.width]
    }

    /// Get slice bounds: (x0, y0, x1, y1) in global framebuffer coordinates
    #[inline(always)]
    pub fn bounds(&self) -> (usize, usize, usize, usize) {
        (0, self.y0, self.width, self.y0 + self.height)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Framebuffer {
    pub width: usize,
    pub height: usize,
    pub color_buffer: Vec<u32>, // ARGB format
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            color_buffer: vec![0; width * height],
        }
    }

    pub fn clear(&mut self, clear_color: u32) {
        fill_u32(&mut self.color_buffer, clear_color);
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.color_buffer[y * self.width + x])
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.color_buffer.resize(width * height, 0);
    }

    /// Split the framebuffer into horizontal stripes for multi-core compositing.
    /// Each stripe owns a disjoint subset of rows, so they can be filled in parallel.
    pub fn split_into_stripes(&mut self, stripes: usize) -> Vec<FrameSlice<'_>> {
        let stripes = stripes.max(1);
        let width = self.width;
        let height = self.height;

        let mut slices = Vec::with_capacity(stripes);
        let mut remaining_color: &mut [u32] = self.color_buffer.as_mut_slice();

        let mut y0 = 0usize;
        let min_rows_per_stripe = (height + stripes - 1) / stripes;

        for _ in 0..stripes {
            if y0 >= height {
                break;
            }
            let remaining_rows = height - y0;
            let rows = remaining_rows.min(min_rows_per_stripe);
            let pixels = rows * width;

            let (color_head, color_tail) = remaining_color.split_at_mut(pixels);
            slices.push(FrameSlice {
                width,
                y0,
                height: rows,
                color: color_head,
            });

            remaining_color = color_tail;
            y0 += rows;
        }

        slices
    }
}

/// Fill a pixel buffer with one value, using vector stores when available.
pub fn fill_u32(buffer: &mut [u32], value: u32) {
    #[cfg(target_arch = "x86_64")]
    {
        // Prefer AVX (8 pixels per iteration) when available,
        // otherwise fall back to SSE2 (4 pixels per iteration).
        if std::arch::is_x86_feature_detected!("avx") {
            unsafe {
                return fill_simd_avx(buffer, value);
            }
        }
        if std::arch::is_x86_feature_detected!("sse2") {
            unsafe {
                return fill_simd_sse2(buffer, value);
            }
        }
    }

    buffer.fill(value);
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn fill_simd_sse2(buffer: &mut [u32], value: u32) {
    let len = buffer.len();
    let mut i = 0usize;
    let lanes = _mm_set1_epi32(value as i32);
    while i + 4 <= len {
        let ptr = buffer.as_mut_ptr().add(i) as *mut _;
        _mm_storeu_si128(ptr, lanes);
        i += 4;
    }
    // Tail
    for pixel in &mut buffer[i..] {
        *pixel = value;
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
unsafe fn fill_simd_avx(buffer: &mut [u32], value: u32) {
    let len = buffer.len();
    let mut i = 0usize;
    let lanes = _mm256_set1_epi32(value as i32);
    while i + 8 <= len {
        let ptr = buffer.as_mut_ptr().add(i) as *mut _;
        _mm256_storeu_si256(ptr, lanes);
        i += 8;
    }
    // Tail
    for pixel in &mut buffer[i..] {
        *pixel = value;
    }
}

/// Convert RGB to ARGB u32
#[inline]
pub const fn rgb_to_u32(r: u8, g: u8, b: u8) -> u32 {
    0xFF000000 | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

/// Split ARGB u32 into its RGB channels
#[inline]
pub const fn u32_to_rgb(color: u32) -> [u8; 3] {
    [(color >> 16) as u8, (color >> 8) as u8, color as u8]
}
