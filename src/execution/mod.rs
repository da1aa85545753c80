// Pull-based query execution: every operator exposes init()/next() and
// owns its children.

pub mod aggregation;
pub mod context;
pub mod delete;
pub mod executor;
pub mod expression;
pub mod index_scan;
pub mod insert;
pub mod limit;
pub mod nested_index_join;
pub mod nested_loop_join;
pub mod seq_scan;
pub mod update;

pub use aggregation::{AggregationExecutor, AggregationType};
pub use context::ExecutorContext;
pub use delete::DeleteExecutor;
pub use executor::{BoxedExecutor, ExecutionError, ExecutionResult, Executor};
pub use expression::{CompareOp, Expression};
pub use index_scan::IndexScanExecutor;
pub use insert::InsertExecutor;
pub use limit::LimitExecutor;
pub use nested_index_join::NestedIndexJoinExecutor;
pub use nested_loop_join::NestedLoopJoinExecutor;
pub use seq_scan::SeqScanExecutor;
pub use update::{UpdateAction, UpdateExecutor};
