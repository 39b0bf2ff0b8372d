//! Request body decoding for the create and update endpoints.
//!
//! Both endpoints accept either a JSON object or a `multipart/form-data` form
//! with text fields `title` / `content` and an optional file field `image`.
//! File parts are streamed chunk by chunk; the image-type check and the size
//! ceiling are applied while streaming, before the store sees anything.

use crate::error::{Result, StoreError};
use crate::store::{is_image_type, AssetDir, Upload};
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpMessage, HttpRequest};
use cms_common::requests::{ArticlePatch, NewArticle};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;

/// Ceiling for JSON bodies and multipart text fields.
const TEXT_LIMIT: usize = 1024 * 1024;

/// Field name carrying the uploaded image.
const IMAGE_FIELD: &str = "image";

/// Decoded text fields and file of a multipart form.
#[derive(Debug, Default)]
struct FormParts {
    title: Option<String>,
    content: Option<String>,
    upload: Option<Upload>,
}

pub(crate) async fn read_new_article(
    req: &HttpRequest,
    payload: web::Payload,
    assets: &AssetDir,
) -> Result<(NewArticle, Option<Upload>)> {
    if is_multipart(req) {
        let parts = read_form(req, payload, assets).await?;
        let fields = NewArticle {
            title: parts.title.unwrap_or_default(),
            content: parts.content.unwrap_or_default(),
        };
        Ok((fields, parts.upload))
    } else {
        Ok((read_json(req, payload).await?, None))
    }
}

pub(crate) async fn read_patch(
    req: &HttpRequest,
    payload: web::Payload,
    assets: &AssetDir,
) -> Result<(ArticlePatch, Option<Upload>)> {
    if is_multipart(req) {
        let parts = read_form(req, payload, assets).await?;
        let patch = ArticlePatch {
            title: parts.title,
            content: parts.content,
            image: None,
        };
        Ok((patch, parts.upload))
    } else {
        Ok((read_json(req, payload).await?, None))
    }
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.content_type().eq_ignore_ascii_case("multipart/form-data")
}

/// Reads a JSON body. An empty body decodes as `T::default()`.
async fn read_json<T>(req: &HttpRequest, mut payload: web::Payload) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let content_type = req.content_type();
    let is_json = content_type.eq_ignore_ascii_case("application/json")
        || content_type.to_ascii_lowercase().ends_with("+json");
    if !content_type.is_empty() && !is_json {
        return Err(StoreError::InvalidRequest(format!(
            "Unsupported content type: {content_type}"
        )));
    }

    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
        if body.len() + chunk.len() > TEXT_LIMIT {
            return Err(StoreError::InvalidRequest("Request body too large".into()));
        }
        body.extend_from_slice(&chunk);
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&body)
        .map_err(|e| StoreError::InvalidRequest(format!("Invalid JSON body: {e}")))
}

async fn read_form(
    req: &HttpRequest,
    payload: web::Payload,
    assets: &AssetDir,
) -> Result<FormParts> {
    let mut form = Multipart::new(req.headers(), payload);
    let mut parts = FormParts::default();

    while let Some(item) = form.next().await {
        let mut field = item.map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name().map(|n| n.to_string()));
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename().map(|f| f.to_string()));

        match (name.as_deref(), file_name) {
            (Some(IMAGE_FIELD), Some(file_name)) => {
                if parts.upload.is_some() {
                    return Err(StoreError::InvalidRequest(
                        "Only one image may be uploaded".into(),
                    ));
                }
                parts.upload = read_file(&mut field, file_name, assets).await?;
            }
            (Some("title"), None) => parts.title = Some(read_text(&mut field).await?),
            (Some("content"), None) => parts.content = Some(read_text(&mut field).await?),
            _ => drain(&mut field).await?,
        }
    }

    Ok(parts)
}

/// Streams one file part into memory, enforcing the image rules as it goes.
/// A part with an empty file name and no bytes (no file chosen) yields `None`.
async fn read_file(
    field: &mut Field,
    file_name: String,
    assets: &AssetDir,
) -> Result<Option<Upload>> {
    let mut upload = Upload {
        file_name,
        content_type: field.content_type().map(|m| m.essence_str().to_string()),
        bytes: Vec::new(),
    };

    // Browsers send `application/octet-stream` when they cannot tell.
    if upload.content_type.as_deref() == Some("application/octet-stream") {
        upload.content_type = None;
    }

    let declared_image = upload
        .effective_content_type()
        .is_some_and(|ct| is_image_type(&ct));

    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
        if !declared_image && !chunk.is_empty() {
            return Err(StoreError::InvalidAsset("Only image files are allowed!".into()));
        }
        if upload.bytes.len() + chunk.len() > assets.max_bytes() {
            return Err(assets.too_large());
        }
        upload.bytes.extend_from_slice(&chunk);
    }

    if upload.file_name.is_empty() && upload.bytes.is_empty() {
        return Ok(None);
    }
    assets.validate(&upload)?;
    Ok(Some(upload))
}

async fn read_text(field: &mut Field) -> Result<String> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
        if bytes.len() + chunk.len() > TEXT_LIMIT {
            return Err(StoreError::InvalidRequest("Form field too large".into()));
        }
        bytes.extend_from_slice(&chunk);
    }
    String::from_utf8(bytes)
        .map_err(|_| StoreError::InvalidRequest("Form fields must be valid UTF-8".into()))
}

async fn drain(field: &mut Field) -> Result<()> {
    while let Some(chunk) = field.next().await {
        chunk.map_err(|e| StoreError::InvalidRequest(e.to_string()))?;
    }
    Ok(())
}
