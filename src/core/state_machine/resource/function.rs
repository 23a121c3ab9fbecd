use crate::core::config::FunctionConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;

/// Characters escaped when a function ARN is placed in a URL path.
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'/')
    .add(b'?')
    .add(b'#')
    .add(b':')
    .add(b'$');

const FUNCTION_ERROR_HEADER: &str = "X-Amz-Function-Error";

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionRequest {
    pub function_arn: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResponse {
    pub status_code: u16,
    /// Error kind reported by the function itself, e.g. `Unhandled`.
    pub function_error: Option<String>,
    pub payload: Value,
}

impl FunctionResponse {
    pub fn ok(payload: Value) -> Self {
        FunctionResponse {
            status_code: 200,
            function_error: None,
            payload,
        }
    }

    pub fn function_error<T: Into<String>>(kind: T, payload: Value) -> Self {
        FunctionResponse {
            status_code: 200,
            function_error: Some(kind.into()),
            payload,
        }
    }

    /// Turn a function-level error into an error named after its kind, with
    /// the payload's `errorMessage` as the message.
    pub fn into_result(self) -> Result<Value, AppError> {
        match self.function_error {
            None => Ok(self.payload),
            Some(kind) => {
                let message = match self.payload.get("errorMessage") {
                    Some(Value::String(text)) => text.clone(),
                    Some(other) => other.to_string(),
                    None => self.payload.to_string(),
                };
                Err(
                    AppError::named(ErrorCategory::InvocationError, kind, message)
                        .with_code("SFN-TASK-002"),
                )
            }
        }
    }
}

/// Synchronous function invocation.
#[async_trait]
pub trait FunctionTransport: Send + Sync {
    async fn invoke(&self, request: FunctionRequest) -> Result<FunctionResponse, AppError>;
}

/// Invokes functions over the Lambda REST protocol.
#[derive(Clone)]
pub struct HttpFunctionTransport {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpFunctionTransport {
    pub fn new(config: &FunctionConfig) -> Self {
        Self::with_endpoint(config.resolved_endpoint())
    }

    pub fn with_endpoint<T: Into<String>>(endpoint: T) -> Self {
        HttpFunctionTransport {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    fn invocation_url(&self, function_arn: &str) -> String {
        format!(
            "{}/2015-03-31/functions/{}/invocations",
            self.endpoint,
            utf8_percent_encode(function_arn, PATH_SEGMENT_ENCODE_SET)
        )
    }
}

#[async_trait]
impl FunctionTransport for HttpFunctionTransport {
    async fn invoke(&self, request: FunctionRequest) -> Result<FunctionResponse, AppError> {
        let url = self.invocation_url(&request.function_arn);
        tracing::debug!(function = %request.function_arn, url = %url, "invoking function");

        let response = self
            .http
            .post(&url)
            .header("X-Amz-Invocation-Type", "RequestResponse")
            .json(&request.payload)
            .send()
            .await
            .map_err(|err| {
                AppError::with_source(
                    ErrorCategory::InvocationError,
                    format!("function invocation request failed: {}", err),
                    Box::new(err),
                )
                .with_name("Lambda.SdkClientException")
                .with_code("SFN-HTTP-001")
            })?;

        let status = response.status();
        let function_error = response
            .headers()
            .get(FUNCTION_ERROR_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let service_error = response
            .headers()
            .get("X-Amzn-ErrorType")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(':').next().unwrap_or(value).to_string());
        let body = response.text().await.map_err(|err| {
            AppError::new(
                ErrorCategory::InvocationError,
                format!("failed to read function response: {}", err),
            )
            .with_code("SFN-HTTP-001")
        })?;
        let payload = parse_body(&body);

        if !status.is_success() && function_error.is_none() {
            let name = service_error.unwrap_or_else(|| "Lambda.ServiceException".to_string());
            return Err(AppError::named(
                ErrorCategory::InvocationError,
                name,
                format!("function endpoint returned {}: {}", status, body),
            )
            .with_code("SFN-HTTP-002"));
        }

        Ok(FunctionResponse {
            status_code: status.as_u16(),
            function_error,
            payload,
        })
    }
}

fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}
