pub mod collector;
pub mod file;
pub mod source;
pub mod stdin;
