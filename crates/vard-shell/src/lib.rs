pub mod cwd;
pub mod tok;

pub use cwd::{absolutize, expand_tilde, resolve_dir_at_segment, resolve_effective_dir};
pub use tok::{
    join, quote, split_segments, tokenize, tokenize_lossy, Operator, Segment, Token,
    TokenizeError,
};
