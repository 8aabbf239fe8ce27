pub mod export;
pub mod guide;
pub mod pattern;
pub mod work;
