// Allow dead code for items that are part of the public API but only used in tests
#![allow(dead_code)]

pub mod cleaner;
pub mod compression;
pub mod lexer;
pub mod metadata;
pub mod progress;
pub mod reassembler;
pub mod rewrite;
pub mod scanner;
pub mod warnings;
pub mod writer;
