//! CORS policy construction.
//!
//! Converts [`CorsOptions`] into a `tower_http` [`CorsLayer`]. Combinations
//! that `tower_http` rejects at runtime (credentials with wildcards) are
//! reported as configuration errors up front.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer, ExposeHeaders};

use crate::config::schema::CorsOptions;
use crate::error::ConfigError;

const WILDCARD: &str = "*";

/// Build the CORS layer.
pub fn build_cors_layer(options: &CorsOptions) -> Result<CorsLayer, ConfigError> {
    let mut layer = CorsLayer::new().allow_credentials(options.credentials);

    layer = if options.origin.iter().any(|o| o == WILDCARD) {
        reject_with_credentials(options, "origin")?;
        layer.allow_origin(Any)
    } else {
        let origins = options
            .origin
            .iter()
            .map(|o| {
                HeaderValue::from_str(o)
                    .map_err(|_| ConfigError::InvalidCors(format!("origin '{o}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        layer.allow_origin(AllowOrigin::list(origins))
    };

    layer = if options.methods.iter().any(|m| m == WILDCARD) {
        reject_with_credentials(options, "methods")?;
        layer.allow_methods(Any)
    } else {
        let methods = options
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| ConfigError::InvalidCors(format!("method '{m}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        layer.allow_methods(AllowMethods::list(methods))
    };

    layer = if options.allowed_headers.is_empty() {
        layer.allow_headers(AllowHeaders::mirror_request())
    } else if options.allowed_headers.iter().any(|h| h == WILDCARD) {
        reject_with_credentials(options, "allowed_headers")?;
        layer.allow_headers(Any)
    } else {
        layer.allow_headers(AllowHeaders::list(header_names(&options.allowed_headers)?))
    };

    if !options.exposed_headers.is_empty() {
        layer = if options.exposed_headers.iter().any(|h| h == WILDCARD) {
            reject_with_credentials(options, "exposed_headers")?;
            layer.expose_headers(Any)
        } else {
            layer.expose_headers(ExposeHeaders::list(header_names(&options.exposed_headers)?))
        };
    }

    if let Some(secs) = options.max_age_secs {
        layer = layer.max_age(Duration::from_secs(secs));
    }

    Ok(layer)
}

fn reject_with_credentials(options: &CorsOptions, field: &str) -> Result<(), ConfigError> {
    if options.credentials {
        Err(ConfigError::InvalidCors(format!(
            "credentials cannot be combined with a wildcard {field}"
        )))
    } else {
        Ok(())
    }
}

fn header_names(names: &[String]) -> Result<Vec<HeaderName>, ConfigError> {
    names
        .iter()
        .map(|h| {
            HeaderName::from_bytes(h.as_bytes())
                .map_err(|_| ConfigError::InvalidCors(format!("header '{h}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_build() {
        assert!(build_cors_layer(&CorsOptions::default()).is_ok());
    }

    #[test]
    fn test_credentials_with_wildcard_origin_rejected() {
        let options = CorsOptions {
            credentials: true,
            ..CorsOptions::default()
        };
        let err = build_cors_layer(&options).unwrap_err();
        assert!(err.to_string().contains("wildcard origin"));
    }

    #[test]
    fn test_explicit_origins_with_credentials() {
        let options = CorsOptions {
            origin: vec!["https://app.example.com".to_string()],
            credentials: true,
            allowed_headers: vec!["content-type".to_string()],
            max_age_secs: Some(600),
            ..CorsOptions::default()
        };
        assert!(build_cors_layer(&options).is_ok());
    }

    #[test]
    fn test_invalid_method_rejected() {
        let options = CorsOptions {
            methods: vec!["GET".into(), "BAD METHOD".into()],
            ..CorsOptions::default()
        };
        assert!(matches!(
            build_cors_layer(&options),
            Err(ConfigError::InvalidCors(_))
        ));
    }
}
