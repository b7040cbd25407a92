mod collection;
mod scanner;
mod searcher;
mod signature;

pub use collection::*;
pub use scanner::*;
pub use searcher::*;
pub use signature::*;
