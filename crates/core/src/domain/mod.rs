pub mod item;
pub mod map;
