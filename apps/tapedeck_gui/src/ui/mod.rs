//! UI 模块

pub mod deck;
pub mod info;
pub mod scrub;
pub mod theme;

pub use deck::TransportRow;
pub use info::TrackInfoPanel;
pub use scrub::ScrubSlider;
pub use theme::DeckTheme;
