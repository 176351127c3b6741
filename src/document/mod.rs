pub mod chunker;
pub mod flatten;
pub mod record;

pub use chunker::{CharacterSplitter, Chunk, TextSplitter};
pub use flatten::{EmptyContainerPolicy, FlatLine, Flattener};
pub use record::{Scalar, StructuredRecord};
