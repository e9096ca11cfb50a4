//! Introspector for platforms without process memory support

use super::{MemoryIntrospector, MemoryReading};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct UnsupportedIntrospector;

impl UnsupportedIntrospector {
    pub fn new() -> Self {
        Self
    }
}

impl MemoryIntrospector for UnsupportedIntrospector {
    fn sample(&self) -> Result<MemoryReading> {
        Err(Error::Platform(format!(
            "Process memory introspection is not supported on {}",
            std::env::consts::OS
        )))
    }

    fn platform_name(&self) -> &str {
        "unsupported"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_unsupported_is_collection_failure() {
        let err = UnsupportedIntrospector::new().sample().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::CollectionFailure);
    }
}
