// Media module - input detection and duration probing

pub mod detection;
pub mod probe;

pub use detection::{find_video_files, is_video_file};
pub use probe::probe_duration_ms;
