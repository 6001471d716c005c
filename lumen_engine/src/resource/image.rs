/// Image descriptor types and mip math

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    RgbaU8,
    RgbaF32,
    RgbaU8Srgb,
    RgbaF32Srgb,
    D24S8,
}

impl TextureFormat {
    /// Size of one texel in bytes
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TextureFormat::RgbaU8 | TextureFormat::RgbaU8Srgb | TextureFormat::D24S8 => 4,
            TextureFormat::RgbaF32 | TextureFormat::RgbaF32Srgb => 16,
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, TextureFormat::D24S8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureType {
    T2D,
    Cube,
}

/// Descriptor for creating a device-local image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub texture_type: TextureType,
    /// Full mip chain when true, a single level otherwise
    pub generate_mips: bool,
    /// Used by the storage-image render target of the compute pass
    pub storage: bool,
}

impl ImageDesc {
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, generate_mips: bool) -> Self {
        Self {
            width,
            height,
            format,
            texture_type: TextureType::T2D,
            generate_mips,
            storage: false,
        }
    }

    pub fn new_cube(size: u32, format: TextureFormat, generate_mips: bool) -> Self {
        Self {
            width: size,
            height: size,
            format,
            texture_type: TextureType::Cube,
            generate_mips,
            storage: false,
        }
    }

    pub fn mip_levels(&self) -> u32 {
        if self.generate_mips {
            calculate_mip_levels(self.width, self.height)
        } else {
            1
        }
    }

    pub fn array_layers(&self) -> u32 {
        match self.texture_type {
            TextureType::T2D => 1,
            TextureType::Cube => 6,
        }
    }
}

/// `floor(log2(max(width, height))) + 1`
pub fn calculate_mip_levels(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// Extent of mip `level`: each dimension halved per level, floored at 1
pub fn mip_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    let w = width.checked_shr(level).unwrap_or(0).max(1);
    let h = height.checked_shr(level).unwrap_or(0).max(1);
    (w, h)
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
