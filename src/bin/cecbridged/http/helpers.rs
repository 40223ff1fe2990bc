use std::str::FromStr;

use hyper::{body, Body, Request, Response, StatusCode};
use routerify::prelude::*;
use serde::de::DeserializeOwned;

use super::error::{Error, FormattedError};

pub fn parse_param<T>(req: &Request<Body>, name: &str) -> Result<T, FormattedError>
where
    T: FromStr,
    T::Err: ToString,
{
    let data = req
        .param(name)
        .ok_or_else(|| Error::parameter_missing(name))?;
    Ok(T::from_str(data).map_err(|e| Error::parameter_error(name, e))?)
}

pub async fn parse_body<T: DeserializeOwned>(req: &mut Request<Body>) -> Result<T, FormattedError> {
    let data = body::to_bytes(req.body_mut())
        .await
        .map_err(|e| Error::ParseError(e.to_string()))?;

    Ok(serde_json::from_slice(data.as_ref()).map_err(|e| Error::ParseError(e.to_string()))?)
}

/// Reads an integer that may have been sent either as a JSON number or as a string.
/// Fractional values and trailing garbage are rejected.
pub fn parse_integer(name: &str, value: &serde_json::Value) -> Result<i64, Error> {
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| Error::parameter_error(name, format!("{} is not an integer", n))),
        serde_json::Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::parameter_error(name, format!("{:?} is not an integer", s))),
        serde_json::Value::Null => Err(Error::parameter_missing(name)),
        other => Err(Error::parameter_error(
            name,
            format!("{} is not an integer", other),
        )),
    }
}

pub fn serialize_response<T: serde::Serialize>(
    _: &Request<Body>,
    resp: T,
) -> Result<Response<Body>, Error> {
    let data = serde_json::to_vec_pretty(&resp).map_err(anyhow::Error::from)?;

    Ok(Response::builder()
        .header("Content-Type", "application/json")
        .body(Body::from(data))?)
}

pub fn no_content() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Body::empty())?)
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("volume", &json!(40)).unwrap(), 40);
        assert_eq!(parse_integer("volume", &json!("40")).unwrap(), 40);
        assert_eq!(parse_integer("volume", &json!(-1)).unwrap(), -1);
        assert!(parse_integer("volume", &json!(40.5)).is_err());
        assert!(parse_integer("volume", &json!("40.5")).is_err());
        assert!(parse_integer("volume", &json!("40abc")).is_err());
        assert!(parse_integer("volume", &json!(null)).is_err());
        assert!(parse_integer("volume", &json!([40])).is_err());
    }
}
