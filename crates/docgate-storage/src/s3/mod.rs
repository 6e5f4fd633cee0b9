//! S3 (and S3-compatible) backend speaking the REST API over `reqwest`.

pub mod signing;
pub mod xml;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use docgate_common::error::{BackendError, BackendResult};
use docgate_common::time;
use docgate_common::types::{Listing, ObjectMeta};
use futures::{StreamExt, TryStreamExt};
use quick_xml::{de::from_str as xml_from_str, se::to_string as xml_to_string};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::{Method, Response};
use tracing::{debug, warn};
use url::Url;

use crate::traits::{ByteStream, ObjectBody, ObjectStore};

use self::signing::SigningParams;
use self::xml::{
    CompleteMultipartUploadResultXml, CompleteMultipartUploadXml, CompletePartXml, ErrorXml,
    InitiateMultipartUploadResultXml, ListBucketV2ResultXml,
};

pub const DEFAULT_REGION: &str = "us-east-1";
/// Streams up to this size are written with one `PutObject`; larger ones use
/// multipart uploads with parts of this size.
pub const PART_SIZE: usize = 5 * 1024 * 1024;

#[derive(Clone)]
pub struct S3Config {
    /// Override for S3-compatible stores; AWS is addressed by region otherwise.
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub request_timeout: Duration,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl S3Config {
    fn endpoint_url(&self) -> BackendResult<Url> {
        let endpoint = match self.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => endpoint.to_string(),
            _ => format!("https://s3.{}.amazonaws.com", self.region),
        };
        Url::parse(&endpoint)
            .map_err(|err| BackendError::Unavailable(format!("invalid endpoint {endpoint}: {err}")))
    }
}

/// Path-style S3 client. The HTTP connection pool is shared by every request.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: reqwest::Client,
    endpoint: String,
    host: String,
    config: S3Config,
}

impl S3ObjectStore {
    pub fn new(config: S3Config) -> BackendResult<Self> {
        let url = config.endpoint_url()?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(BackendError::Unavailable(format!(
                    "endpoint has no host: {url}"
                )));
            }
        };
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|err| BackendError::Unavailable(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            endpoint: url.as_str().trim_end_matches('/').to_string(),
            host,
            config,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// Signs and sends one request. `timed` bounds the whole exchange by the
    /// request timeout; streaming downloads leave it off.
    async fn send(
        &self,
        method: Method,
        key: Option<&str>,
        query: &[(&str, &str)],
        extra_headers: &[(&str, &str)],
        body: Bytes,
        timed: bool,
    ) -> BackendResult<Response> {
        let path = match key {
            Some(key) => format!("/{}/{key}", self.config.bucket),
            None => format!("/{}", self.config.bucket),
        };
        let uri = signing::canonical_uri(&path);
        let query = signing::canonical_query_string(query);
        let url = if query.is_empty() {
            format!("{}{uri}", self.endpoint)
        } else {
            format!("{}{uri}?{query}", self.endpoint)
        };

        let date_time = time::format_amz_date(&time::now());
        let payload_hash = signing::sha256_hex(&body);
        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), self.host.clone());
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.clone());
        headers.insert("x-amz-date".to_string(), date_time.clone());
        for (name, value) in extra_headers {
            headers.insert(name.to_ascii_lowercase(), (*value).to_string());
        }

        let params = SigningParams {
            access_key: &self.config.access_key,
            secret_key: &self.config.secret_key,
            region: &self.config.region,
            date_time: &date_time,
        };
        let authorization = signing::authorization(
            &params,
            method.as_str(),
            &uri,
            &query,
            &headers,
            &payload_hash,
        );

        let mut request = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, authorization);
        for (name, value) in headers.iter().filter(|(name, _)| name.as_str() != "host") {
            request = request.header(name.as_str(), value.as_str());
        }
        if timed {
            request = request.timeout(self.config.request_timeout);
        }

        request
            .body(body)
            .send()
            .await
            .map_err(|err| self.transport_error(err))
    }

    async fn check(&self, response: Response, key: &str) -> BackendResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(status.as_u16(), &body, key))
    }

    fn transport_error(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout(self.config.request_timeout)
        } else {
            BackendError::Unavailable(err.to_string())
        }
    }

    async fn read_text(&self, response: Response) -> BackendResult<String> {
        response.text().await.map_err(|err| self.transport_error(err))
    }

    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> BackendResult<ObjectMeta> {
        let size = data.len() as u64;
        let mut headers = Vec::new();
        if let Some(content_type) = content_type {
            headers.push(("content-type", content_type));
        }
        let response = self
            .send(Method::PUT, Some(key), &[], &headers, data, true)
            .await?;
        let response = self.check(response, key).await?;
        Ok(ObjectMeta {
            key: key.to_string(),
            size,
            etag: header_string(&response, ETAG).map(|etag| etag.trim_matches('"').to_string()),
            content_type: content_type.map(str::to_string),
            last_modified: time::now(),
        })
    }

    async fn put_multipart(
        &self,
        key: &str,
        first_part: Bytes,
        body: &mut ByteStream,
        content_type: Option<&str>,
    ) -> BackendResult<ObjectMeta> {
        let upload_id = self.create_multipart_upload(key, content_type).await?;
        debug!(key, upload_id = %upload_id, "multipart upload started");

        let outcome = async {
            let (parts, size) = self.upload_parts(key, &upload_id, first_part, body).await?;
            let etag = self.complete_multipart_upload(key, &upload_id, parts).await?;
            Ok::<_, BackendError>((etag, size))
        }
        .await;

        match outcome {
            Ok((etag, size)) => Ok(ObjectMeta {
                key: key.to_string(),
                size,
                etag,
                content_type: content_type.map(str::to_string),
                last_modified: time::now(),
            }),
            Err(err) => {
                if let Err(abort_err) = self.abort_multipart_upload(key, &upload_id).await {
                    warn!(key, upload_id = %upload_id, error = %abort_err, "failed to abort multipart upload");
                }
                Err(err)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        first_part: Bytes,
        body: &mut ByteStream,
    ) -> BackendResult<(Vec<CompletePartXml>, u64)> {
        let mut parts = Vec::new();
        let mut size = first_part.len() as u64;
        parts.push(self.upload_part(key, upload_id, 1, first_part).await?);

        let mut buffer = BytesMut::with_capacity(PART_SIZE);
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            size += chunk.len() as u64;
            buffer.extend_from_slice(&chunk);
            while buffer.len() >= PART_SIZE {
                let data = buffer.split_to(PART_SIZE).freeze();
                let number = next_part_number(&parts)?;
                parts.push(self.upload_part(key, upload_id, number, data).await?);
            }
        }
        if !buffer.is_empty() {
            let number = next_part_number(&parts)?;
            parts.push(self.upload_part(key, upload_id, number, buffer.freeze()).await?);
        }
        Ok((parts, size))
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: Option<&str>,
    ) -> BackendResult<String> {
        let mut headers = Vec::new();
        if let Some(content_type) = content_type {
            headers.push(("content-type", content_type));
        }
        let response = self
            .send(Method::POST, Some(key), &[("uploads", "")], &headers, Bytes::new(), true)
            .await?;
        let response = self.check(response, key).await?;
        let body = self.read_text(response).await?;
        let result: InitiateMultipartUploadResultXml = xml_from_str(&body).map_err(|err| {
            BackendError::Malformed(format!("invalid InitiateMultipartUploadResult: {err}"))
        })?;
        Ok(result.upload_id)
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> BackendResult<CompletePartXml> {
        let number = part_number.to_string();
        let response = self
            .send(
                Method::PUT,
                Some(key),
                &[("partNumber", number.as_str()), ("uploadId", upload_id)],
                &[],
                data,
                true,
            )
            .await?;
        let response = self.check(response, key).await?;
        let etag = header_string(&response, ETAG).ok_or_else(|| {
            BackendError::Malformed(format!("part {part_number} of {key} returned no ETag"))
        })?;
        Ok(CompletePartXml { part_number, etag })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletePartXml>,
    ) -> BackendResult<Option<String>> {
        let payload = xml_to_string(&CompleteMultipartUploadXml { parts }).map_err(|err| {
            BackendError::Malformed(format!("failed to serialize CompleteMultipartUpload: {err}"))
        })?;
        let response = self
            .send(
                Method::POST,
                Some(key),
                &[("uploadId", upload_id)],
                &[("content-type", "application/xml")],
                Bytes::from(payload),
                true,
            )
            .await?;
        let response = self.check(response, key).await?;
        let body = self.read_text(response).await?;
        // S3 may report a failed completion inside a 200 response.
        if let Some(err) = embedded_error(&body, key) {
            return Err(err);
        }
        Ok(xml_from_str::<CompleteMultipartUploadResultXml>(&body)
            .ok()
            .and_then(|result| result.etag)
            .map(|etag| etag.trim_matches('"').to_string()))
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> BackendResult<()> {
        let response = self
            .send(Method::DELETE, Some(key), &[("uploadId", upload_id)], &[], Bytes::new(), true)
            .await?;
        self.check(response, key).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, prefix: &str, delimiter: Option<char>) -> BackendResult<Listing> {
        let delimiter = delimiter.map(String::from);
        let mut listing = Listing::default();
        let mut token: Option<String> = None;

        loop {
            let mut query = vec![("list-type", "2"), ("prefix", prefix)];
            if let Some(delimiter) = delimiter.as_deref() {
                query.push(("delimiter", delimiter));
            }
            if let Some(token) = token.as_deref() {
                query.push(("continuation-token", token));
            }

            let response = self
                .send(Method::GET, None, &query, &[], Bytes::new(), true)
                .await?;
            let response = self.check(response, prefix).await?;
            let body = self.read_text(response).await?;
            let page: ListBucketV2ResultXml = xml_from_str(&body).map_err(|err| {
                BackendError::Malformed(format!("invalid ListBucketResult: {err}"))
            })?;

            for item in page.contents {
                listing.objects.push(ObjectMeta {
                    last_modified: time::parse_iso8601(&item.last_modified)
                        .unwrap_or_else(time::now),
                    etag: item.etag.map(|etag| etag.trim_matches('"').to_string()),
                    key: item.key,
                    size: item.size,
                    content_type: None,
                });
            }
            listing
                .prefixes
                .extend(page.common_prefixes.into_iter().map(|item| item.prefix));

            match page.next_continuation_token {
                Some(next) if page.is_truncated => token = Some(next),
                _ => break,
            }
        }

        Ok(listing)
    }

    async fn head(&self, key: &str) -> BackendResult<ObjectMeta> {
        let response = self
            .send(Method::HEAD, Some(key), &[], &[], Bytes::new(), true)
            .await?;
        let response = self.check(response, key).await?;
        Ok(meta_from_response(key, &response))
    }

    async fn get(&self, key: &str) -> BackendResult<ObjectBody> {
        let response = self
            .send(Method::GET, Some(key), &[], &[], Bytes::new(), false)
            .await?;
        let response = self.check(response, key).await?;
        let meta = meta_from_response(key, &response);
        let body = response
            .bytes_stream()
            .map_err(|err| BackendError::Stream(err.to_string()))
            .boxed();
        Ok(ObjectBody { meta, body })
    }

    async fn put(
        &self,
        key: &str,
        mut body: ByteStream,
        content_type: Option<&str>,
    ) -> BackendResult<ObjectMeta> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
            if buffer.len() >= PART_SIZE {
                let first_part = buffer.split_to(PART_SIZE).freeze();
                let mut rest: ByteStream = if buffer.is_empty() {
                    body
                } else {
                    futures::stream::iter(vec![Ok(buffer.freeze())])
                        .chain(body)
                        .boxed()
                };
                return self
                    .put_multipart(key, first_part, &mut rest, content_type)
                    .await;
            }
        }
        self.put_object(key, buffer.freeze(), content_type).await
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> BackendResult<()> {
        let source = signing::canonical_uri(&format!("/{}/{src_key}", self.config.bucket));
        let response = self
            .send(
                Method::PUT,
                Some(dst_key),
                &[],
                &[("x-amz-copy-source", source.as_str())],
                Bytes::new(),
                true,
            )
            .await?;
        let response = self.check(response, src_key).await?;
        let body = self.read_text(response).await?;
        match embedded_error(&body, src_key) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        let response = self
            .send(Method::DELETE, Some(key), &[], &[], Bytes::new(), true)
            .await?;
        self.check(response, key).await?;
        Ok(())
    }
}

fn next_part_number(parts: &[CompletePartXml]) -> BackendResult<i32> {
    i32::try_from(parts.len() + 1)
        .ok()
        .filter(|number| *number <= 10_000)
        .ok_or_else(|| BackendError::Malformed("object exceeds 10000 upload parts".to_string()))
}

fn header_string(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn meta_from_response(key: &str, response: &Response) -> ObjectMeta {
    ObjectMeta {
        key: key.to_string(),
        size: header_string(response, CONTENT_LENGTH)
            .and_then(|value| value.parse().ok())
            .unwrap_or_default(),
        etag: header_string(response, ETAG).map(|etag| etag.trim_matches('"').to_string()),
        content_type: header_string(response, CONTENT_TYPE),
        last_modified: header_string(response, LAST_MODIFIED)
            .and_then(|value| time::parse_http_date(&value))
            .unwrap_or_else(time::now),
    }
}

fn embedded_error(body: &str, key: &str) -> Option<BackendError> {
    if !body.contains("<Error>") {
        return None;
    }
    Some(error_from_response(500, body, key))
}

fn error_from_response(status: u16, body: &str, key: &str) -> BackendError {
    let (code, message) = xml_from_str::<ErrorXml>(body)
        .map(|err| (err.code, err.message))
        .unwrap_or_default();

    match (status, code.as_str()) {
        (_, "NoSuchBucket") => BackendError::Status {
            status,
            code: code.clone(),
            message,
        },
        (404, _) | (_, "NoSuchKey") => BackendError::not_found(key),
        (403, _) | (_, "AccessDenied") => BackendError::AccessDenied(if code.is_empty() {
            format!("status {status}")
        } else {
            code.clone()
        }),
        (503, _) | (_, "SlowDown") | (_, "ServiceUnavailable") => {
            BackendError::Unavailable(format!("status {status} {code}"))
        }
        _ => BackendError::Status {
            status,
            code: code.clone(),
            message,
        },
    }
}
