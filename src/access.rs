pub mod scan;
pub mod tuple;
pub mod value;

pub use scan::HeapScan;
pub use tuple::{RecordId, Tuple, TupleDesc};
pub use value::{DataType, Value};
