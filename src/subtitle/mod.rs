//! Модуль для работы с субтитрами
//!
//! Хранилище сегментов, импорт и экспорт SRT/WebVTT.

pub mod export;
pub mod parser;
pub mod segment;
pub mod store;
pub mod timecode;

pub use export::{to_srt, to_vtt, write_subtitle_file, SubtitleFormat};
pub use parser::{parse_srt, parse_subtitle_file, parse_vtt};
pub use segment::{Segment, TextSource};
pub use store::{SegmentStore, TextSplit};
