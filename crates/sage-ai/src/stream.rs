//! Fragment stream type

use std::pin::Pin;

use tokio_stream::Stream;

use crate::error::Result;

/// A stream of incremental text fragments from the completion service.
///
/// Fragment boundaries are arbitrary: a fragment may split words, lines,
/// or even a code-fence marker. Consumers must not assume any alignment.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Build a fragment stream from pre-scripted items.
///
/// Used by tests and offline doubles that need to replay a fixed response.
pub fn scripted(items: Vec<Result<String>>) -> FragmentStream {
    Box::pin(tokio_stream::iter(items))
}
