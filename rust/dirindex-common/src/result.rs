pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Fails with `InvalidArgument` naming the argument and the violated condition.
#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

/// Fails with `MalformedEncoding` naming the element and the violated condition.
#[macro_export]
macro_rules! verify_encoding {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_encoding(result, stringify!($name), stringify!($expr))?;
    }};
}

#[inline]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        invalid_arg(name, condition)
    }
}

#[inline]
pub fn verify_encoding(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        malformed_encoding(name, condition)
    }
}

#[cold]
pub fn invalid_arg(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::InvalidArgument {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}

#[cold]
pub fn malformed_encoding(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::MalformedEncoding {
        message: format!("{name}: expected {condition}"),
    }
    .into())
}
