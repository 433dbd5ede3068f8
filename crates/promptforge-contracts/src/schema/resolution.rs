use std::fmt;

use super::meta::{AspectRatio, ImageSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Output pixel size the upstream model renders for a ratio and size tier.
pub fn resolution(ratio: AspectRatio, size: ImageSize) -> Resolution {
    let tiers: [(u32, u32); 3] = match ratio {
        AspectRatio::Square => [(1024, 1024), (2048, 2048), (4096, 4096)],
        AspectRatio::Portrait2x3 => [(848, 1264), (1696, 2528), (3392, 5056)],
        AspectRatio::Landscape3x2 => [(1264, 848), (2528, 1696), (5056, 3392)],
        AspectRatio::Portrait3x4 => [(896, 1200), (1792, 2400), (3584, 4800)],
        AspectRatio::Landscape4x3 => [(1200, 896), (2400, 1792), (4800, 3584)],
        AspectRatio::Portrait4x5 => [(928, 1152), (1856, 2304), (3712, 4608)],
        AspectRatio::Landscape5x4 => [(1152, 928), (2304, 1856), (4608, 3712)],
        AspectRatio::Portrait9x16 => [(768, 1376), (1536, 2752), (3072, 5504)],
        AspectRatio::Landscape16x9 => [(1376, 768), (2752, 1536), (5504, 3072)],
        AspectRatio::Ultrawide21x9 => [(1584, 672), (3168, 1344), (6336, 2688)],
    };
    let (width, height) = match size {
        ImageSize::OneK => tiers[0],
        ImageSize::TwoK => tiers[1],
        ImageSize::FourK => tiers[2],
    };
    Resolution { width, height }
}
