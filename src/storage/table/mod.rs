pub mod table_heap;
pub mod table_iterator;
pub mod tuple;

pub use table_heap::{HeapError, TableHeap};
pub use table_iterator::TableIterator;
pub use tuple::{Tuple, TupleError, Value};
