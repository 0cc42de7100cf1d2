use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::ApiError,
    model::document::Document,
    models::MessageResponse,
    utils::upload_policy::{UploadKind, UploadPolicy, sanitize_file_name},
};
use actix_multipart::{Field, Multipart};
use actix_web::{
    HttpResponse, Responder,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    web,
};
use futures_util::TryStreamExt;
use serde::Serialize;
use sqlx::MySqlPool;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

const FILE_FIELD: &str = "file";

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    #[schema(example = 12)]
    pub id: u64,
    #[schema(example = "medical-certificate.pdf")]
    pub file_name: String,
    #[schema(example = "application/pdf")]
    pub content_type: String,
    #[schema(example = 48213)]
    pub size: u64,
    #[schema(example = "/api/v1/upload/12")]
    pub url: String,
}

/// Multipart form with a single `file` part
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

struct ReceivedFile {
    original_name: String,
    kind: UploadKind,
    data: Vec<u8>,
}

fn malformed(e: impl std::fmt::Display) -> ApiError {
    warn!(error = %e, "Malformed multipart body");
    ApiError::bad_request("Malformed multipart body")
}

/// Reads one part, rejecting it as soon as the declared type or the size is off
async fn read_file_field(mut field: Field, policy: &UploadPolicy) -> Result<ReceivedFile, ApiError> {
    let kind = policy.check_type(field.content_type())?;
    let original_name = sanitize_file_name(
        field
            .content_disposition()
            .get_filename()
            .unwrap_or_default(),
    );

    let mut data = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(malformed)? {
        policy.check_size(data.len() + chunk.len())?;
        data.extend_from_slice(&chunk);
    }
    policy.check_content(kind, &data)?;

    Ok(ReceivedFile {
        original_name,
        kind,
        data,
    })
}

pub fn stored_path(upload_dir: &str, stored_name: &str) -> PathBuf {
    Path::new(upload_dir).join(stored_name)
}

fn check_owner(owner: Option<u64>, expected: u64) -> Result<(), ApiError> {
    match owner {
        None => Err(ApiError::bad_request("Document not found")),
        Some(owner) if owner != expected => {
            Err(ApiError::forbidden("Document belongs to another user"))
        }
        Some(_) => Ok(()),
    }
}

/// Documents can only be attached to records of the user who uploaded them
pub async fn ensure_document_owner(
    pool: &MySqlPool,
    document_id: u64,
    owner_id: u64,
) -> Result<(), ApiError> {
    let owner = sqlx::query_scalar::<_, u64>("SELECT owner_id FROM documents WHERE id = ?")
        .bind(document_id)
        .fetch_optional(pool)
        .await?;
    check_owner(owner, owner_id)
}

/// Upload a PDF, PNG or JPEG document
#[utoipa::path(
    post,
    path = "/api/v1/upload/uploadFile",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Missing or empty file", body = MessageResponse),
        (status = 413, description = "File too large. Maximum size is 10 MB.", body = MessageResponse),
        (status = 415, description = "Invalid file type. Only PDF, PNG and JPEG files are allowed.", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Upload"
)]
pub async fn upload_file(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    mut payload: Multipart,
) -> actix_web::Result<impl Responder> {
    let policy = UploadPolicy::new(config.max_upload_bytes);
    let mut received = None;

    while let Some(mut field) = payload.try_next().await.map_err(malformed)? {
        if field.name() == FILE_FIELD && received.is_none() {
            received = Some(read_file_field(field, &policy).await?);
        } else {
            // drain parts we do not store
            while field.try_next().await.map_err(malformed)?.is_some() {}
        }
    }

    let file = received.ok_or_else(|| ApiError::bad_request("No file provided in field 'file'"))?;

    let stored_name = format!("{}.{}", Uuid::new_v4(), file.kind.extension());
    let path = stored_path(&config.upload_dir, &stored_name);

    let written = async {
        tokio::fs::create_dir_all(&config.upload_dir).await?;
        tokio::fs::write(&path, &file.data).await
    };
    written.await.map_err(|e: std::io::Error| {
        error!(error = %e, path = %path.display(), "Failed to store upload");
        ApiError::Internal
    })?;

    let size = file.data.len() as u64;
    let inserted = sqlx::query(
        r#"
        INSERT INTO documents (owner_id, original_name, stored_name, content_type, size_bytes)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(&file.original_name)
    .bind(&stored_name)
    .bind(file.kind.content_type())
    .bind(size)
    .execute(pool.get_ref())
    .await;

    let id = match inserted {
        Ok(result) => result.last_insert_id(),
        Err(e) => {
            // no row points at the file, so drop it
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                warn!(error = %rm, path = %path.display(), "Failed to remove orphaned upload");
            }
            return Err(ApiError::from(e).into());
        }
    };

    info!(document_id = id, owner_id = auth.user_id, size, "File uploaded");

    Ok(HttpResponse::Created().json(UploadResponse {
        id,
        file_name: file.original_name,
        content_type: file.kind.content_type().to_string(),
        size,
        url: format!("{}/upload/{}", config.api_prefix, id),
    }))
}

/// Download an uploaded document
#[utoipa::path(
    get,
    path = "/api/v1/upload/{document_id}",
    params(("document_id" = u64, Path, description = "Document ID")),
    responses(
        (status = 200, description = "File content with its stored content type"),
        (status = 403, description = "Not the owner", body = MessageResponse),
        (status = 404, description = "File not found", body = MessageResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Upload"
)]
pub async fn download_file(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    path: web::Path<u64>,
) -> actix_web::Result<HttpResponse> {
    let document_id = path.into_inner();

    let document = sqlx::query_as::<_, Document>(
        r#"
        SELECT id, owner_id, original_name, stored_name, content_type, size_bytes, created_at
        FROM documents
        WHERE id = ?
        "#,
    )
    .bind(document_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(ApiError::from)?
    .ok_or_else(|| ApiError::not_found("File not found"))?;

    auth.require_self_or_manager(document.owner_id)?;

    let file_path = stored_path(&config.upload_dir, &document.stored_name);
    let bytes = match tokio::fs::read(&file_path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(document_id, path = %file_path.display(), "Document row without file");
            return Err(ApiError::not_found("File not found").into());
        }
        Err(e) => {
            error!(error = %e, document_id, "Failed to read upload");
            return Err(ApiError::Internal.into());
        }
    };

    let content_type = document
        .content_type
        .parse::<mime::Mime>()
        .unwrap_or_else(|_| mime_guess::from_path(&document.stored_name).first_or_octet_stream());

    Ok(HttpResponse::Ok()
        .content_type(content_type)
        .insert_header(ContentDisposition {
            disposition: DispositionType::Inline,
            parameters: vec![DispositionParam::Filename(document.original_name)],
        })
        .body(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::auth::test_user;
    use crate::config::test_config;
    use crate::error::extractor_errors;
    use crate::model::role::Role;
    use actix_web::body::BoxBody;
    use actix_web::dev::{Service, ServiceRequest, ServiceResponse};
    use actix_web::http::StatusCode;
    use actix_web::middleware::{Next, from_fn};
    use actix_web::{App, Error, HttpMessage, test};

    const BOUNDARY: &str = "----workforce-test-boundary";
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    struct Part<'a> {
        name: &'a str,
        file_name: Option<&'a str>,
        content_type: &'a str,
        data: &'a [u8],
    }

    fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let disposition = match part.file_name {
                Some(f) => format!("form-data; name=\"{}\"; filename=\"{f}\"", part.name),
                None => format!("form-data; name=\"{}\"", part.name),
            };
            body.extend_from_slice(format!("Content-Disposition: {disposition}\r\n").as_bytes());
            body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());
            body.extend_from_slice(part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn as_employee(
        req: ServiceRequest,
        next: Next<BoxBody>,
    ) -> Result<ServiceResponse<BoxBody>, Error> {
        req.extensions_mut().insert(test_user(5, Role::Employee));
        next.call(req).await
    }

    /// Rejections all happen before the first query, so the pool never connects
    async fn post_upload(max_upload_bytes: usize, parts: &[Part<'_>]) -> (StatusCode, serde_json::Value) {
        let mut config = test_config();
        config.max_upload_bytes = max_upload_bytes;
        let pool = MySqlPool::connect_lazy(&config.database_url).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pool))
                .app_data(web::Data::new(config))
                .configure(extractor_errors)
                .service(
                    web::scope("")
                        .wrap(from_fn(as_employee))
                        .route("/uploadFile", web::post().to(upload_file)),
                ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/uploadFile")
            .insert_header((
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(multipart_body(parts))
            .to_request();
        let resp = app.call(req).await.unwrap();
        let status = resp.status();
        let body: serde_json::Value = test::read_body_json(resp).await;
        (status, body)
    }

    #[actix_web::test]
    async fn gif_upload_is_unsupported() {
        let (status, body) = post_upload(
            1024,
            &[Part {
                name: "file",
                file_name: Some("cat.gif"),
                content_type: "image/gif",
                data: b"GIF89a....",
            }],
        )
        .await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["message"], crate::utils::upload_policy::INVALID_TYPE_MESSAGE);
    }

    #[actix_web::test]
    async fn oversized_file_is_cut_off_while_streaming() {
        let big = [PNG, &[0u8; 64][..]].concat();
        let (status, body) = post_upload(
            16,
            &[Part {
                name: "file",
                file_name: Some("scan.png"),
                content_type: "image/png",
                data: &big,
            }],
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["message"].as_str().unwrap().starts_with("File too large"));
    }

    #[actix_web::test]
    async fn form_without_a_file_part_is_a_bad_request() {
        let (status, body) = post_upload(
            1024,
            &[Part {
                name: "note",
                file_name: None,
                content_type: "text/plain",
                data: b"hello",
            }],
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "No file provided in field 'file'");
    }

    #[actix_web::test]
    async fn png_bytes_declared_as_pdf_are_rejected() {
        let (status, _) = post_upload(
            1024,
            &[
                Part {
                    name: "note",
                    file_name: None,
                    content_type: "text/plain",
                    data: b"drained first",
                },
                Part {
                    name: "file",
                    file_name: Some("report.pdf"),
                    content_type: "application/pdf",
                    data: PNG,
                },
            ],
        )
        .await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[::std::prelude::v1::test]
    fn attached_documents_must_belong_to_the_user() {
        assert!(check_owner(Some(5), 5).is_ok());
        assert!(matches!(check_owner(None, 5), Err(ApiError::BadRequest(_))));
        assert!(matches!(check_owner(Some(6), 5), Err(ApiError::Forbidden(_))));
    }

    #[::std::prelude::v1::test]
    fn stored_files_live_under_the_upload_dir() {
        let path = stored_path("uploads", "abc.pdf");
        assert_eq!(path, Path::new("uploads").join("abc.pdf"));
    }

    #[::std::prelude::v1::test]
    fn fallback_content_type_comes_from_extension() {
        assert_eq!(
            mime_guess::from_path("x.png").first_or_octet_stream(),
            mime::IMAGE_PNG
        );
        assert_eq!(
            mime_guess::from_path("x.bin").first_or_octet_stream(),
            mime::APPLICATION_OCTET_STREAM
        );
    }
}
