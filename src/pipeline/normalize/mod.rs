pub mod normalizer;
pub mod parse;
pub mod select;

pub use normalizer::*;
pub use parse::*;
pub use select::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizationError {
    #[error("line item {index} in group {group} has no recognizable fields")]
    MalformedLineItem { group: usize, index: usize },
}
