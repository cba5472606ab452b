pub mod hypr;

pub use hypr::{HyprFocusSource, HyprlandWindow};
