mod content;
mod core;
mod error;
mod html;
mod link;
mod marks;
mod page_tree;
mod palette;
mod selection;
mod table;
mod toolbar;

pub use crate::content::*;
pub use crate::core::*;
pub use crate::error::*;
pub use crate::html::{parse_fragment, serialize_fragment};
pub use crate::link::*;
pub use crate::marks::*;
pub use crate::page_tree::*;
pub use crate::palette::*;
pub use crate::selection::*;
pub use crate::table::*;
pub use crate::toolbar::*;
