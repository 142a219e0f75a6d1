//! Shared value grammars used by constraint compilation.

pub mod html;
