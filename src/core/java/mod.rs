mod runtime;

pub use runtime::{cached_java, ensure_runtime, is_usable_java_binary};
