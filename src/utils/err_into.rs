/// Converts the error side of a `Result` through `Into`, for call sites where `?` can't infer the
/// destination type
pub trait ErrInto<T, ESource> {
    fn err_into<EDest>(self) -> Result<T, EDest>
    where
        ESource: Into<EDest>;
}

impl<T, ESource> ErrInto<T, ESource> for Result<T, ESource> {
    fn err_into<EDest>(self) -> Result<T, EDest>
    where
        ESource: Into<EDest>,
    {
        self.map_err(Into::into)
    }
}
