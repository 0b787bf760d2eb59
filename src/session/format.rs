//! Output surface formats and their wire tags.

use serde::{Deserialize, Serialize};

/// Image output formats the device can deliver. The wire name doubles as
/// the stream-configuration format name and, suffixed with `Image`, as the
/// response frame tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceFormat {
    #[serde(rename = "yuv")]
    Yuv,
    #[serde(rename = "jpeg")]
    Jpeg,
    #[serde(rename = "jpeg_r")]
    JpegR,
    #[serde(rename = "priv")]
    Priv,
    #[serde(rename = "y8")]
    Y8,
    #[serde(rename = "dng")]
    Dng,
    #[serde(rename = "raw")]
    Raw,
    #[serde(rename = "raw10")]
    Raw10,
    #[serde(rename = "raw12")]
    Raw12,
    #[serde(rename = "rawStats")]
    RawStats,
    #[serde(rename = "raw10Stats")]
    Raw10Stats,
    #[serde(rename = "rawQuadBayer")]
    RawQuadBayer,
    #[serde(rename = "rawQuadBayerStats")]
    RawQuadBayerStats,
    #[serde(rename = "raw10QuadBayer")]
    Raw10QuadBayer,
    #[serde(rename = "raw10QuadBayerStats")]
    Raw10QuadBayerStats,
}

impl SurfaceFormat {
    pub const ALL: [SurfaceFormat; 15] = [
        SurfaceFormat::Yuv,
        SurfaceFormat::Jpeg,
        SurfaceFormat::JpegR,
        SurfaceFormat::Priv,
        SurfaceFormat::Y8,
        SurfaceFormat::Dng,
        SurfaceFormat::Raw,
        SurfaceFormat::Raw10,
        SurfaceFormat::Raw12,
        SurfaceFormat::RawStats,
        SurfaceFormat::Raw10Stats,
        SurfaceFormat::RawQuadBayer,
        SurfaceFormat::RawQuadBayerStats,
        SurfaceFormat::Raw10QuadBayer,
        SurfaceFormat::Raw10QuadBayerStats,
    ];

    /// Wire name, as used in output surface specifications.
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceFormat::Yuv => "yuv",
            SurfaceFormat::Jpeg => "jpeg",
            SurfaceFormat::JpegR => "jpeg_r",
            SurfaceFormat::Priv => "priv",
            SurfaceFormat::Y8 => "y8",
            SurfaceFormat::Dng => "dng",
            SurfaceFormat::Raw => "raw",
            SurfaceFormat::Raw10 => "raw10",
            SurfaceFormat::Raw12 => "raw12",
            SurfaceFormat::RawStats => "rawStats",
            SurfaceFormat::Raw10Stats => "raw10Stats",
            SurfaceFormat::RawQuadBayer => "rawQuadBayer",
            SurfaceFormat::RawQuadBayerStats => "rawQuadBayerStats",
            SurfaceFormat::Raw10QuadBayer => "raw10QuadBayer",
            SurfaceFormat::Raw10QuadBayerStats => "raw10QuadBayerStats",
        }
    }

    /// Response frame tag announcing a buffer of this format.
    pub fn image_tag(&self) -> String {
        format!("{}Image", self.name())
    }

    /// Decode a buffer frame tag into its format and optional physical
    /// camera suffix. The longest matching format name wins, so
    /// `raw10QuadBayerImage` is never misread as `raw10` plus a suffix.
    pub fn from_image_tag(tag: &str) -> Option<(SurfaceFormat, Option<&str>)> {
        let mut best: Option<(SurfaceFormat, &str)> = None;
        for format in SurfaceFormat::ALL {
            let name = format.name();
            let Some(rest) = tag.strip_prefix(name) else {
                continue;
            };
            let Some(suffix) = rest.strip_prefix("Image") else {
                continue;
            };
            if best.is_none_or(|(b, _)| b.name().len() < name.len()) {
                best = Some((format, suffix));
            }
        }
        best.map(|(format, suffix)| {
            (
                format,
                if suffix.is_empty() { None } else { Some(suffix) },
            )
        })
    }

    /// Whether this format draws from the sensor's raw output path; at most
    /// one such format is allowed per capture request.
    pub fn is_raw_family(&self) -> bool {
        matches!(
            self,
            SurfaceFormat::Dng
                | SurfaceFormat::Raw
                | SurfaceFormat::Raw10
                | SurfaceFormat::Raw12
                | SurfaceFormat::RawStats
                | SurfaceFormat::Raw10Stats
                | SurfaceFormat::RawQuadBayer
                | SurfaceFormat::RawQuadBayerStats
                | SurfaceFormat::Raw10QuadBayer
                | SurfaceFormat::Raw10QuadBayerStats
        )
    }

    pub fn is_quad_bayer(&self) -> bool {
        matches!(
            self,
            SurfaceFormat::RawQuadBayer
                | SurfaceFormat::RawQuadBayerStats
                | SurfaceFormat::Raw10QuadBayer
                | SurfaceFormat::Raw10QuadBayerStats
        )
    }

    pub fn is_stats(&self) -> bool {
        matches!(
            self,
            SurfaceFormat::RawStats
                | SurfaceFormat::Raw10Stats
                | SurfaceFormat::RawQuadBayerStats
                | SurfaceFormat::Raw10QuadBayerStats
        )
    }
}

impl std::fmt::Display for SurfaceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for format in SurfaceFormat::ALL {
            let tag = format.image_tag();
            assert_eq!(SurfaceFormat::from_image_tag(&tag), Some((format, None)));
        }
    }

    #[test]
    fn physical_suffix_extracted() {
        assert_eq!(
            SurfaceFormat::from_image_tag("yuvImage3"),
            Some((SurfaceFormat::Yuv, Some("3")))
        );
        assert_eq!(
            SurfaceFormat::from_image_tag("raw10QuadBayerStatsImage2"),
            Some((SurfaceFormat::Raw10QuadBayerStats, Some("2")))
        );
    }

    #[test]
    fn longest_name_wins() {
        assert_eq!(
            SurfaceFormat::from_image_tag("raw10QuadBayerImage"),
            Some((SurfaceFormat::Raw10QuadBayer, None))
        );
        assert_eq!(
            SurfaceFormat::from_image_tag("rawStatsImage"),
            Some((SurfaceFormat::RawStats, None))
        );
    }

    #[test]
    fn unknown_tags_rejected() {
        assert_eq!(SurfaceFormat::from_image_tag("captureResults"), None);
        assert_eq!(SurfaceFormat::from_image_tag("rawimage"), None);
    }

    #[test]
    fn raw_family_membership() {
        assert!(SurfaceFormat::Dng.is_raw_family());
        assert!(SurfaceFormat::Raw10QuadBayerStats.is_raw_family());
        assert!(!SurfaceFormat::Yuv.is_raw_family());
        assert!(!SurfaceFormat::Jpeg.is_raw_family());
    }
}
