//! XPROBE: context-aware reflected and DOM XSS probing.

pub mod cli;
pub mod core;
pub mod http;
pub mod payload;
pub mod reporting;
pub mod scanner;
pub mod xss;
