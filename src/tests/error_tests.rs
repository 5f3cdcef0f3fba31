#[cfg(test)]
mod tests {
    use crate::error::{validation, AppError, AppResult, OptionExt};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;

    #[test]
    fn test_app_error_display() {
        let error = AppError::BadRequest("Invalid input".to_string());
        assert_eq!(format!("{}", error), "Bad request: Invalid input");

        let error = AppError::Forbidden("Access denied".to_string());
        assert_eq!(format!("{}", error), "Forbidden: Access denied");

        let error = AppError::ValidationError { field: "ip_address".to_string(), message: "bad".to_string() };
        assert_eq!(format!("{}", error), "Validation error on field 'ip_address': bad");
    }

    #[test]
    fn test_app_error_into_response() {
        let cases = [
            (AppError::BadRequest("x".to_string()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
            (AppError::Conflict("x".to_string()), StatusCode::CONFLICT),
            (AppError::ServiceUnavailable("x".to_string()), StatusCode::SERVICE_UNAVAILABLE),
            (AppError::Database("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Forbidden("x".to_string()), StatusCode::FORBIDDEN),
            (AppError::Internal(anyhow::anyhow!("boom")), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_forbidden_body() {
        let response = AppError::Forbidden("Access denied".to_string()).into_response();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(v["error"]["code"], "IP_BLOCKED");
        assert_eq!(v["error"]["message"], "Access denied");
        assert_eq!(v["status"], 403);
        assert!(v["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_validation_error_body_has_details() {
        let error = AppError::ValidationError {
            field: "ip_address".to_string(),
            message: "Invalid IP address: nope".to_string(),
        };
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(v["error"]["details"]["field"], "ip_address");
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let app_error: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(app_error, AppError::NotFound(_)));

        let app_error: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(app_error, AppError::ServiceUnavailable(_)));
    }

    #[test]
    fn test_option_ext() {
        let result: AppResult<i32> = Some(42).ok_or_not_found("Blocked IP");
        assert_eq!(result.unwrap(), 42);

        let result: AppResult<i32> = None.ok_or_not_found("Blocked IP");
        match result.unwrap_err() {
            AppError::NotFound(msg) => assert_eq!(msg, "Blocked IP not found"),
            _ => panic!("Expected NotFound error"),
        }
    }

    #[test]
    fn test_validate_ip_address() {
        assert_eq!(validation::validate_ip_address("192.0.2.1").unwrap().to_string(), "192.0.2.1");
        assert_eq!(validation::validate_ip_address(" 2001:DB8::1 ").unwrap().to_string(), "2001:db8::1");

        for raw in ["", "not-an-ip", "256.1.1.1", "192.0.2.1/24"] {
            match validation::validate_ip_address(raw).unwrap_err() {
                AppError::ValidationError { field, .. } => assert_eq!(field, "ip_address"),
                _ => panic!("Expected ValidationError for {:?}", raw),
            }
        }
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validation::validate_positive_number(Some(1), "limit").is_ok());
        assert!(validation::validate_positive_number(None, "limit").is_ok());

        match validation::validate_positive_number(Some(-5), "limit").unwrap_err() {
            AppError::ValidationError { field, message } => {
                assert_eq!(field, "limit");
                assert!(message.contains("must be positive"));
                assert!(message.contains("-5"));
            }
            _ => panic!("Expected ValidationError"),
        }
    }
}
