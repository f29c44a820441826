//! Conversion of caller-supplied values into URLs.

use url::Url;

use crate::error::UrlConversionError;

/// A value that can be converted into a `Url`.
pub trait UrlConvertible {
    fn to_url(&self) -> Result<Url, UrlConversionError>;

    /// Text shown in logs and error messages, even when conversion fails.
    fn describe(&self) -> String {
        match self.to_url() {
            Ok(url) => url.into(),
            Err(error) => error.to_string(),
        }
    }
}

impl UrlConvertible for str {
    fn to_url(&self) -> Result<Url, UrlConversionError> {
        Url::parse(self).map_err(|_| UrlConversionError::NotConvertible(self.to_string()))
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl UrlConvertible for String {
    fn to_url(&self) -> Result<Url, UrlConversionError> {
        self.as_str().to_url()
    }

    fn describe(&self) -> String {
        self.clone()
    }
}

impl UrlConvertible for Url {
    fn to_url(&self) -> Result<Url, UrlConversionError> {
        Ok(self.clone())
    }
}

impl<T: UrlConvertible + ?Sized> UrlConvertible for &T {
    fn to_url(&self) -> Result<Url, UrlConversionError> {
        (**self).to_url()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_parses_to_url() {
        let url = "http://localhost:3000/echo?a=1".to_url().unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.query(), Some("a=1"));
    }

    #[test]
    fn url_converts_to_itself() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(url.to_url().unwrap(), url);
    }

    #[test]
    fn malformed_string_is_not_convertible() {
        let err = String::from("not a url").to_url().unwrap_err();
        assert_eq!(err, UrlConversionError::NotConvertible("not a url".to_string()));
    }

    #[test]
    fn description_keeps_caller_text() {
        assert_eq!("not a url".describe(), "not a url");
        assert_eq!(String::from("http://localhost/a b").describe(), "http://localhost/a b");
        let url = Url::parse("http://localhost/echo").unwrap();
        assert_eq!((&url).describe(), "http://localhost/echo");
    }
}
