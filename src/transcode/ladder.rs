use serde::Serialize;

/// One resolution/bitrate encoding of a source video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rendition {
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
    pub codec_profile: &'static str,
}

impl Rendition {
    pub const fn new(width: u32, height: u32, bitrate_kbps: u32) -> Self {
        Self {
            width,
            height,
            bitrate_kbps,
            codec_profile: "h264",
        }
    }

    /// `WIDTHxHEIGHT`, as written into the master manifest.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Manifests carry bits per second, the ladder is configured in kbit/s.
    pub fn bandwidth_bps(&self) -> u64 {
        u64::from(self.bitrate_kbps) * 1000
    }
}

/// Renditions produced for every video, lowest bandwidth first. The order
/// here is the order of the master manifest.
pub const LADDER: [Rendition; 4] = [
    Rendition::new(426, 240, 500),
    Rendition::new(640, 360, 1000),
    Rendition::new(1280, 720, 2500),
    Rendition::new(1920, 1080, 5000),
];

pub fn default_ladder() -> Vec<Rendition> {
    LADDER.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_is_ordered_by_bandwidth() {
        let bandwidths: Vec<u64> = LADDER.iter().map(Rendition::bandwidth_bps).collect();
        assert_eq!(bandwidths, vec![500_000, 1_000_000, 2_500_000, 5_000_000]);
    }

    #[test]
    fn resolution_uses_width_x_height() {
        assert_eq!(LADDER[0].resolution(), "426x240");
        assert_eq!(LADDER[3].resolution(), "1920x1080");
    }
}
