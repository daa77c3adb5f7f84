//! What the video player must be configured with to play PhotoPrism previews.

use std::time::Duration;

/// How much video the player keeps buffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDurations {
    pub min_buffer: Duration,
    pub max_buffer: Duration,
    pub buffer_for_playback: Duration,
    pub buffer_for_playback_after_rebuffer: Duration,
}

impl Default for BufferDurations {
    fn default() -> Self {
        Self {
            min_buffer: Duration::from_millis(6_000),
            max_buffer: Duration::from_millis(30_000),
            buffer_for_playback: Duration::from_millis(500),
            buffer_for_playback_after_rebuffer: Duration::from_millis(5_000),
        }
    }
}

/// `Cache-Control` value the player requests previews with. Content addressed by hash
/// never changes, so it's cached without revalidation.
pub const IMMUTABLE: &str = "immutable";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoTrack {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f32,
}

/// Configuration handed to the platform video player.
///
/// One shared cache is used by every player, which is fine as long as the server keeps
/// mapping a hash to the same bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoPlayerConfig {
    pub buffer: BufferDurations,
    pub cache_control: &'static str,
}

impl Default for VideoPlayerConfig {
    fn default() -> Self {
        Self {
            buffer: BufferDurations::default(),
            cache_control: IMMUTABLE,
        }
    }
}

impl VideoPlayerConfig {
    /// Pick the video track with the highest frame rate.
    ///
    /// Live photo previews may carry a second, single frame track of higher resolution,
    /// which a resolution based choice would play instead of the motion.
    pub fn select_video_track<'a>(&self, tracks: &'a [VideoTrack]) -> Option<&'a VideoTrack> {
        tracks
            .iter()
            .filter(|track| track.frame_rate.is_finite())
            .max_by(|a, b| a.frame_rate.total_cmp(&b.frame_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = VideoPlayerConfig::default();

        assert_eq!(config.buffer.min_buffer, Duration::from_secs(6));
        assert_eq!(config.buffer.max_buffer, Duration::from_secs(30));
        assert_eq!(config.buffer.buffer_for_playback, Duration::from_millis(500));
        assert_eq!(config.cache_control, "immutable");
    }

    #[test]
    fn prefers_the_moving_track_over_the_sharp_one() {
        let tracks = [
            VideoTrack {
                index: 0,
                width: 1440,
                height: 1080,
                frame_rate: 29.417,
            },
            VideoTrack {
                index: 1,
                width: 2048,
                height: 1536,
                frame_rate: 0.604,
            },
        ];

        let selected = VideoPlayerConfig::default().select_video_track(&tracks).unwrap();
        assert_eq!(selected.index, 0);
    }

    #[test]
    fn no_tracks_no_selection() {
        assert_eq!(VideoPlayerConfig::default().select_video_track(&[]), None);
    }
}
