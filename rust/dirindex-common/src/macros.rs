/// Unwraps a `Result` inside a function returning `Option<Result<T, E>>`.
///
/// - `Ok(t)` yields `t`.
/// - `Err(e)` returns `Some(Err(e))` from the enclosing function.
///
/// Intended for `Iterator<Item = Result<T, E>>::next()` implementations that call
/// fallible helpers, e.g. record stream readers.
#[macro_export]
macro_rules! try_or_ret_some_err {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => {
                return Some(Err(err.into()));
            }
        }
    };
}
