mod frame;
mod writer;

pub use frame::{is_truthy, BindingFrame};
pub use writer::EncodedWriter;
