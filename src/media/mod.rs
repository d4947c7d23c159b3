//! Media streams and the table that owns them

pub mod record;
pub mod stats;
pub mod table;
pub mod track;

pub use record::{ActivityState, StreamId, StreamKind, StreamRecord};
pub use stats::{rate_label, StatsPoller, StatsReport, StatsSink, TrackStats};
pub use table::StreamTable;
pub use track::{ContentHint, MediaStream, MediaTrack, TrackKind, TrackLabel, TrackRef};
