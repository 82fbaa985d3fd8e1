//! tapedeck_player - 播放引擎
//!
//! 提供单个音频文件的标签读取、解码和播放功能。

mod command;
mod convert;
mod decoder;
mod engine;
mod metadata;
mod output;

#[cfg(test)]
mod testutil;

pub use command::*;
pub use convert::*;
pub use decoder::*;
pub use engine::*;
pub use metadata::*;
pub use output::*;
