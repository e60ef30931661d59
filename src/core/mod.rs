pub mod package;
pub mod platform;
pub mod purl;
pub mod receipt;
pub mod template;
