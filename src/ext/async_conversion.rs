/// Async counterpart to the standard library's `TryFrom<T>` trait.
///
/// Used for conversions that have to perform I/O, such as turning a file
/// path into the digest of the file's contents.
///
/// # Examples
///
/// ```rust,ignore
/// use std::path::Path;
///
/// struct FileLength(u64);
///
/// impl<'a> AsyncTryFrom<&'a Path> for FileLength {
///     type Error = std::io::Error;
///
///     async fn async_try_from(path: &'a Path) -> Result<Self, Self::Error> {
///         Ok(FileLength(compio::fs::metadata(path).await?.len()))
///     }
/// }
/// ```
pub trait AsyncTryFrom<T>: Sized {
    /// The error type that can occur during conversion.
    type Error;

    /// Performs the fallible asynchronous conversion from `T` to `Self`.
    async fn async_try_from(value: T) -> Result<Self, Self::Error>;
}

/// Async counterpart to `TryInto<T>`.
pub trait AsyncTryInto<T> {
    /// The error type that can occur during conversion.
    type Error;

    /// Performs the fallible asynchronous conversion from `Self` to `T`.
    async fn async_try_into(self) -> Result<T, Self::Error>;
}

/// Blanket implementation for `AsyncTryInto<U>` when `U` implements `AsyncTryFrom<T>`.
impl<T, U> AsyncTryInto<U> for T
where
    U: AsyncTryFrom<T>,
{
    type Error = U::Error;

    async fn async_try_into(self) -> Result<U, Self::Error> {
        U::async_try_from(self).await
    }
}
