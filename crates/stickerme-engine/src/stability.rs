//! Client for the Stability AI text-to-image endpoint.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{json, Value};
use stickerme_contracts::ResolvedParameters;
use tracing::{debug, warn};

use crate::config::{ApiKey, EngineConfig};
use crate::error::GenerationError;
use crate::generator::{ImageBytes, ImageGenerator};

const ERROR_TEXT_MAX_CHARS: usize = 512;

pub struct StabilityClient {
    api_base: String,
    model: String,
    api_key: Option<ApiKey>,
    http: HttpClient,
}

impl StabilityClient {
    pub fn new(config: &EngineConfig) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1/generation/{}/text-to-image",
            self.api_base, self.model
        )
    }
}

impl ImageGenerator for StabilityClient {
    fn name(&self) -> &str {
        "stability"
    }

    fn display_name(&self) -> &str {
        "Stability AI"
    }

    fn submit(&self, params: &ResolvedParameters) -> Result<ImageBytes, GenerationError> {
        let Some(api_key) = &self.api_key else {
            return Err(GenerationError::Unauthorized {
                status: None,
                message: "STABILITY_API_KEY not set".to_string(),
            });
        };

        let endpoint = self.endpoint();
        let payload = request_body(params);
        debug!(
            endpoint = %endpoint,
            width = params.width,
            height = params.height,
            steps = params.steps,
            cfg_scale = params.cfg_scale,
            styled = params.style_token.is_some(),
            "submitting text-to-image request"
        );

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key.expose())
            .header(ACCEPT, "application/json")
            .json(&payload)
            .send()
            .map_err(|err| transport_error(&err))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase())
            .unwrap_or_default();
        let body = response.bytes().map_err(|err| transport_error(&err))?;

        let outcome = classify_response(status, &content_type, &body, api_key.expose());
        if let Err(err) = &outcome {
            warn!(status, kind = err.kind(), "text-to-image request failed");
        }
        outcome
    }
}

/// Upstream body: the prompt verbatim, the style token as a second prompt
/// of equal weight, and the numeric parameters unchanged.
pub fn request_body(params: &ResolvedParameters) -> Value {
    let mut text_prompts = vec![json!({ "text": params.prompt, "weight": 1 })];
    if let Some(token) = &params.style_token {
        text_prompts.push(json!({ "text": token, "weight": 1 }));
    }
    json!({
        "text_prompts": text_prompts,
        "cfg_scale": params.cfg_scale,
        "height": params.height,
        "width": params.width,
        "samples": 1,
        "steps": params.steps,
    })
}

/// Maps one upstream response onto image bytes or a typed failure.
pub fn classify_response(
    status: u16,
    content_type: &str,
    body: &[u8],
    secret: &str,
) -> Result<ImageBytes, GenerationError> {
    match status {
        200..=299 => decode_success(status, content_type, body),
        401 | 403 => Err(GenerationError::Unauthorized {
            status: Some(status),
            message: error_text(body, secret),
        }),
        402 | 429 => Err(GenerationError::QuotaExceeded {
            status,
            message: error_text(body, secret),
        }),
        408 | 500..=599 => Err(GenerationError::Transient {
            message: format!("upstream returned {status}: {}", error_text(body, secret)),
        }),
        _ => Err(GenerationError::UpstreamProtocol {
            status: Some(status),
            message: format!("upstream returned {status}: {}", error_text(body, secret)),
        }),
    }
}

fn decode_success(status: u16, content_type: &str, body: &[u8]) -> Result<ImageBytes, GenerationError> {
    let protocol = |message: String| GenerationError::UpstreamProtocol {
        status: Some(status),
        message,
    };

    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if media_type == "image/png" {
        if body.is_empty() {
            return Err(protocol("empty image body".to_string()));
        }
        return Ok(ImageBytes::png(body.to_vec()));
    }
    // Artifacts are always stored as `.png`.
    if media_type.starts_with("image/") {
        return Err(protocol(format!("unsupported image type '{media_type}'")));
    }

    let payload: Value = serde_json::from_slice(body)
        .map_err(|err| protocol(format!("invalid JSON payload: {err}")))?;
    let artifact = payload
        .get("artifacts")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(Value::as_object)
        .ok_or_else(|| protocol("response has no artifacts".to_string()))?;
    if artifact.get("finishReason").and_then(Value::as_str) == Some("ERROR") {
        return Err(protocol("upstream reported a generation error".to_string()));
    }
    let image_b64 = artifact
        .get("base64")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| protocol("artifact is missing image bytes".to_string()))?;
    let bytes = BASE64
        .decode(image_b64.as_bytes())
        .map_err(|err| protocol(format!("image base64 decode failed: {err}")))?;
    if bytes.is_empty() {
        return Err(protocol("artifact decoded to zero bytes".to_string()));
    }
    Ok(ImageBytes::png(bytes))
}

fn transport_error(err: &reqwest::Error) -> GenerationError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    };
    GenerationError::Transient { message }
}

/// Prefers the JSON `message` field, falls back to the raw body.
fn error_text(body: &[u8], secret: &str) -> String {
    let raw = String::from_utf8_lossy(body);
    let text = serde_json::from_str::<Value>(&raw)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| raw.trim().to_string());
    let text = if secret.is_empty() {
        text
    } else {
        text.replace(secret, "<redacted>")
    };
    if text.is_empty() {
        return "no details provided".to_string();
    }
    truncate_text(&text, ERROR_TEXT_MAX_CHARS)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use stickerme_contracts::{GenerationRequest, ParameterResolver};

    use super::*;

    /// Serves exactly one canned HTTP response and returns the raw request it saw.
    fn one_shot_server(status: u16, content_type: &str, body: Vec<u8>) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let content_type = content_type.to_string();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream);
            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    break;
                }
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
                head.push_str(&line);
                if line == "\r\n" {
                    break;
                }
            }
            let mut request_body = vec![0u8; content_length];
            reader.read_exact(&mut request_body).unwrap_or_default();
            head.push_str(&String::from_utf8_lossy(&request_body));

            let mut stream = reader.into_inner();
            let header = format!(
                "HTTP/1.1 {status} Canned\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(header.as_bytes()).unwrap_or_default();
            stream.write_all(&body).unwrap_or_default();
            stream.flush().unwrap_or_default();
            head
        });
        (format!("http://{addr}"), handle)
    }

    fn params(style: Option<&str>) -> ResolvedParameters {
        let mut request = GenerationRequest::new("a cute cat", "42").with_aspect_ratio("landscape");
        if let Some(style) = style {
            request = request.with_style(style);
        }
        ParameterResolver::default().resolve(&request).expect("resolves")
    }

    fn client(api_base: &str, key: Option<&str>) -> StabilityClient {
        StabilityClient::new(&EngineConfig {
            api_base: api_base.to_string(),
            api_key: key.map(ApiKey::new),
            request_timeout: Duration::from_secs(5),
            ..EngineConfig::default()
        })
        .expect("client builds")
    }

    #[test]
    fn request_body_maps_parameters_field_for_field() {
        let body = request_body(&params(Some("anime")));
        assert_eq!(body["width"], json!(1216));
        assert_eq!(body["height"], json!(832));
        assert_eq!(body["steps"], json!(30));
        assert_eq!(body["cfg_scale"], json!(7.0));
        assert_eq!(body["samples"], json!(1));
        assert_eq!(body["text_prompts"][0]["text"], json!("a cute cat"));
        assert_eq!(
            body["text_prompts"][1]["text"],
            json!("anime style, manga, cel shaded, colorful")
        );

        let plain = request_body(&params(None));
        assert_eq!(plain["text_prompts"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn classify_decodes_json_artifact() {
        let body = json!({
            "artifacts": [{ "base64": BASE64.encode(b"png-bytes"), "finishReason": "SUCCESS" }]
        });
        let image = classify_response(200, "application/json", body.to_string().as_bytes(), "k")
            .expect("image");
        assert_eq!(image.bytes, b"png-bytes".to_vec());
    }

    #[test]
    fn classify_accepts_raw_image_bodies() {
        let image = classify_response(200, "image/png", b"\x89PNG", "k").expect("image");
        assert_eq!(image.mime_type.as_deref(), Some("image/png"));
        let image = classify_response(200, "Image/PNG; q=1", b"\x89PNG", "k").expect("image");
        assert_eq!(image.bytes, b"\x89PNG".to_vec());
    }

    #[test]
    fn classify_rejects_non_png_image_bodies() {
        for content_type in ["image/jpeg", "image/webp"] {
            let err = classify_response(200, content_type, b"\xff\xd8\xff", "k")
                .expect_err("only png is stored");
            assert_eq!(err.kind(), "upstream_protocol_error");
            assert!(err.to_string().contains(content_type));
        }
    }

    #[test]
    fn classify_maps_status_codes() {
        let body = br#"{"name":"unauthorized","message":"bad key sk-live-123"}"#;
        match classify_response(401, "application/json", body, "sk-live-123") {
            Err(GenerationError::Unauthorized { status, message }) => {
                assert_eq!(status, Some(401));
                assert_eq!(message, "bad key <redacted>");
            }
            other => panic!("unexpected: {other:?}"),
        }
        let quota = classify_response(429, "text/plain", b"too many", "k").expect_err("quota");
        assert_eq!(quota.kind(), "quota_exceeded");
        let credit = classify_response(402, "text/plain", b"", "k").expect_err("credit");
        assert_eq!(credit.kind(), "quota_exceeded");
        let outage = classify_response(503, "text/plain", b"down", "k").expect_err("outage");
        assert_eq!(outage.kind(), "transient");
        let rejected = classify_response(400, "text/plain", b"bad dims", "k").expect_err("400");
        assert_eq!(rejected.kind(), "upstream_protocol_error");
    }

    #[test]
    fn classify_rejects_malformed_success_payloads() {
        for body in [
            b"not json".to_vec(),
            br#"{"artifacts":[]}"#.to_vec(),
            br#"{"artifacts":[{"finishReason":"ERROR","base64":"AAAA"}]}"#.to_vec(),
            br#"{"artifacts":[{"base64":"!!!"}]}"#.to_vec(),
        ] {
            let err = classify_response(200, "application/json", &body, "k").expect_err("malformed");
            assert_eq!(err.kind(), "upstream_protocol_error");
        }
        let err = classify_response(200, "image/png", b"", "k").expect_err("empty image");
        assert_eq!(err.kind(), "upstream_protocol_error");
    }

    #[test]
    fn missing_key_fails_without_network() {
        let err = client("http://127.0.0.1:9", None)
            .submit(&params(None))
            .expect_err("no key");
        assert_eq!(err.kind(), "unauthorized");
    }

    #[test]
    fn submit_posts_json_with_bearer_credential() {
        let body = json!({ "artifacts": [{ "base64": BASE64.encode(b"fake-png") }] });
        let (base, server) = one_shot_server(200, "application/json", body.to_string().into_bytes());
        let image = client(&base, Some("sk-test"))
            .submit(&params(None))
            .expect("image");
        assert_eq!(image.bytes, b"fake-png".to_vec());

        let seen = server.join().expect("server thread");
        assert!(seen.starts_with(
            "POST /v1/generation/stable-diffusion-xl-1024-v1-0/text-to-image HTTP/1.1"
        ));
        assert!(seen.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        assert!(seen.contains("\"width\":1216"));
    }

    #[test]
    fn submit_surfaces_unauthorized_without_echoing_key() {
        let (base, server) = one_shot_server(
            401,
            "application/json",
            br#"{"message":"key sk-test is invalid"}"#.to_vec(),
        );
        let err = client(&base, Some("sk-test"))
            .submit(&params(None))
            .expect_err("unauthorized");
        server.join().expect("server thread");
        assert_eq!(err.kind(), "unauthorized");
        assert!(!err.to_string().contains("sk-test"));
    }

    #[test]
    fn refused_connection_is_transient() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let err = client(&format!("http://127.0.0.1:{port}"), Some("sk-test"))
            .submit(&params(None))
            .expect_err("refused");
        assert_eq!(err.kind(), "transient");
    }

    #[test]
    fn slow_upstream_times_out_as_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                thread::sleep(Duration::from_millis(1500));
                drop(stream);
            }
        });
        let slow = StabilityClient::new(&EngineConfig {
            api_base: format!("http://{addr}"),
            api_key: Some(ApiKey::new("sk-test")),
            request_timeout: Duration::from_millis(200),
            ..EngineConfig::default()
        })
        .expect("client builds");
        let err = slow.submit(&params(None)).expect_err("timeout");
        assert_eq!(err.kind(), "transient");
        server.join().expect("server thread");
    }
}
