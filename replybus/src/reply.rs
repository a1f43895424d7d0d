//! Handler results.
//!
//! A handler produces zero, one or many response values for a request. Zero
//! means "send nothing" and is how fire-and-forget notifications are served.

use crate::error::HandlerError;

/// Response values produced for one request, in publish order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<T>(Vec<T>);

impl<T> Reply<T> {
    /// No response; nothing is published.
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// A single response.
    pub fn one(value: T) -> Self {
        Self(vec![value])
    }

    /// Several responses, published in iteration order.
    pub fn many(values: impl IntoIterator<Item = T>) -> Self {
        Self(values.into_iter().collect())
    }

    /// Whether no response will be sent.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of response values.
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<T> Default for Reply<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> From<Option<T>> for Reply<T> {
    fn from(value: Option<T>) -> Self {
        Self(value.into_iter().collect())
    }
}

impl<T> From<Vec<T>> for Reply<T> {
    fn from(values: Vec<T>) -> Self {
        Self(values)
    }
}

impl<T> IntoIterator for Reply<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Anything a handler may return.
///
/// Implemented for `Reply<T>`, `Option<T>`, and both wrapped in a
/// `Result` whose error converts into [`HandlerError`].
pub trait IntoReply<T> {
    /// Convert into the values to publish, or the handler's failure.
    fn into_reply(self) -> Result<Reply<T>, HandlerError>;
}

impl<T> IntoReply<T> for Reply<T> {
    fn into_reply(self) -> Result<Reply<T>, HandlerError> {
        Ok(self)
    }
}

impl<T> IntoReply<T> for Option<T> {
    fn into_reply(self) -> Result<Reply<T>, HandlerError> {
        Ok(self.into())
    }
}

impl<T, E: Into<HandlerError>> IntoReply<T> for Result<Reply<T>, E> {
    fn into_reply(self) -> Result<Reply<T>, HandlerError> {
        self.map_err(Into::into)
    }
}

impl<T, E: Into<HandlerError>> IntoReply<T> for Result<Option<T>, E> {
    fn into_reply(self) -> Result<Reply<T>, HandlerError> {
        self.map(Reply::from).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert!(Reply::<u32>::none().is_empty());
        assert_eq!(Reply::one(1).len(), 1);
        assert_eq!(Reply::many(1..=3).into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(Reply::<u32>::default(), Reply::none());
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Reply::from(Some(5)), Reply::one(5));
        assert_eq!(Reply::<u32>::from(None), Reply::none());
    }

    #[test]
    fn test_into_reply() {
        assert_eq!(Some(2).into_reply().expect("conversion should succeed"), Reply::one(2));
        assert_eq!(Reply::many([1, 2]).into_reply().expect("conversion should succeed").len(), 2);

        let ok: Result<Option<u32>, std::io::Error> = Ok(None);
        assert!(ok.into_reply().expect("conversion should succeed").is_empty());

        let failed: Result<Reply<u32>, String> = Err("stock exhausted".to_string());
        let err = failed.into_reply().expect_err("error passes through");
        assert_eq!(err.to_string(), "stock exhausted");
    }
}
