mod ids;
mod playlist;
mod source;
mod track;

pub use ids::{PlaylistId, TrackId};
pub use playlist::Playlist;
pub use source::{LocatorKind, SourceLocator};
pub use track::Track;
