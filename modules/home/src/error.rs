use actionkit::ApiError;

/// Turn a model failure into the error the caller sees.
///
/// `ApiError`s pass through unchanged; database errors keep their driver
/// code; anything else becomes a plain 400 with the failure text.
pub(crate) fn to_api_error(err: &anyhow::Error) -> ApiError {
    if let Some(api) = err.downcast_ref::<ApiError>() {
        return api.clone();
    }
    let code = err
        .downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .and_then(|e| e.code())
        .map(|c| c.into_owned());

    let api = ApiError::new(err.to_string());
    match code {
        Some(code) => api.with_code(code),
        None => api,
    }
}
