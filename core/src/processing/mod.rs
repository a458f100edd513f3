pub mod clutter;

pub use clutter::{remove_clutter, ClutterRemovalFilter};
