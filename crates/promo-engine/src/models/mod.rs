//! 促销引擎领域模型

mod award;
mod event;
mod promotion;

pub use award::*;
pub use event::*;
pub use promotion::*;
