//! Playback duration probing
//!
//! Only used to turn engine time positions into percentages, so every
//! failure collapses to 0 ("unknown") instead of an error.

use std::fs::File;
use std::path::Path;

use lofty::AudioFile;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Duration of a media file in milliseconds, or 0 if it cannot be read
///
/// Tries symphonia first, then lofty's container properties. Blocking.
pub fn probe_duration_ms(path: &Path) -> u64 {
    if let Some(ms) = symphonia_duration_ms(path).filter(|ms| *ms > 0) {
        return ms;
    }
    if let Some(ms) = lofty_duration_ms(path).filter(|ms| *ms > 0) {
        return ms;
    }
    log::debug!("No duration found for {:?}", path);
    0
}

fn symphonia_duration_ms(path: &Path) -> Option<u64> {
    let file = File::open(path).ok()?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(&ext.to_string_lossy());
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;

    let track = probed.format.default_track()?;
    let params = &track.codec_params;
    let n_frames = params.n_frames?;

    if let Some(time_base) = params.time_base {
        let time = time_base.calc_time(n_frames);
        return Some(time.seconds * 1000 + (time.frac * 1000.0) as u64);
    }

    let sample_rate = u64::from(params.sample_rate?);
    if sample_rate == 0 {
        return None;
    }
    Some(n_frames * 1000 / sample_rate)
}

fn lofty_duration_ms(path: &Path) -> Option<u64> {
    let tagged = lofty::read_from_path(path).ok()?;
    let millis = tagged.properties().duration().as_millis();
    u64::try_from(millis).ok()
}
