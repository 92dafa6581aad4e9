// Intan RHD recording reader
// Main library entry point

pub mod core;

// Re-export main types
pub use crate::core::error::{RhdError, Result};
pub use crate::core::events::CodeDecoding;
pub use crate::core::format::{ChannelDescriptor, GroupKind, RhdHeader, Unit, Version};
pub use crate::core::lazy::{LazyKey, LazyList, LazyLoader, Slot};
pub use crate::core::model::{
    AnalogSignal, Annotated, AnnotationValue, Annotations, Block, ChannelGroup, EventSet, MemberRef,
    Segment,
};
pub use crate::core::options::ReadOptions;
pub use crate::core::reader::{read_block, read_segment, RhdReader};

#[cfg(test)]
mod tests {
    #[test]
    fn test_constants() {
        use crate::core::constants::*;
        assert_eq!(RHD_MAGIC, 0xC691_2702);
        assert_eq!(SAMPLES_PER_BLOCK_V1, 60);
        assert_eq!(SAMPLES_PER_BLOCK_V3, 128);
    }
}
