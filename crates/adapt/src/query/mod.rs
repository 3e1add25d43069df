pub mod compile;
pub mod operation;
pub mod parser;
pub mod predicate;

pub use compile::compile;
pub use operation::Operation;
pub use parser::parse_filter;
pub use predicate::{captured, lit, member, BinaryOp, Capture, Expr};
