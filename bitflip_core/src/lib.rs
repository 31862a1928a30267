pub mod config;
pub mod flip;
pub mod offset;
pub mod percent;
pub mod rng;
pub mod spray;
pub mod units;

pub use config::{BitflipConfig, LogLevel};
pub use flip::{FlipError, ReadWriteSeek, flip_bit_at_offset, toggle_nth_bit};
pub use offset::{OffsetError, OffsetSpec};
pub use percent::PercentSpray;
pub use rng::session_rng;
pub use spray::{
    FileInfo, FlipFn, SprayError, SprayPattern, SprayPatternFactory, SprayRegistry,
    parse_spray_pattern,
};
