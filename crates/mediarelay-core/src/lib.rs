pub mod api_key;
pub mod error;
pub mod media;
pub mod timestamp;

pub use api_key::ApiKeyRecord;
pub use error::KeyError;
pub use media::{ChatReply, ForecastEntry, Photo, PhotoSources, VideoSummary};
