pub use super::{
    EncodedSequence, EncseqBuilder, EncseqLoader, ParallelProcessor, ParallelReader, ReadMode,
    SequenceView,
};
