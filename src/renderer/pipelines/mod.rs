pub mod surface;
pub mod widget;
