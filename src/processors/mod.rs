//! Stateless processors behind the builder sugar (`map_func`, `filter_func`, `print`).

mod filter_func;
mod map_func;
mod print;

pub use filter_func::FilterFunc;
pub use map_func::MapFunc;
pub use print::Print;
