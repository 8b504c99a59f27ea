mod common;

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{Method, Request};
use common::{body_bytes, body_json, ArtifactStub, TestApp, ANA};
use jobgate_job_queue::{JobKind, JobState};
use uuid::Uuid;

const BOUNDARY: &str = "jobgate-test-boundary";

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((field, file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
                 Content-Type: application/vnd.openxmlformats-officedocument.spreadsheetml.sheet\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(email: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/executar")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(email) = email {
        builder = builder.header("email", email);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn batch_lookup_receives_uploaded_file() {
    let app = TestApp::new(vec![ArtifactStub::shared(JobKind::BatchLookup)]).await;

    let body = multipart_body(
        &[("opcao", "batch-lookup"), ("userEmail", ANA)],
        Some(("arquivo", "lote.xlsx", b"cpf;nome")),
    );
    let res = app.send(multipart_request(None, body)).await;
    assert_eq!(res.status(), 202);
    let id = Uuid::parse_str(body_json(res).await["id"].as_str().unwrap()).unwrap();

    let record = app.wait_terminal(id).await;
    assert_eq!(record.state, JobState::Succeeded);
    assert_eq!(record.descriptor.attachments.len(), 1);
    let upload = record.descriptor.attachments[0].clone();
    assert!(upload.is_absolute());
    assert_eq!(std::fs::read(&upload).unwrap(), b"cpf;nome");

    // The stub echoes its arguments into the artifact: the upload path.
    let res = app.get(&format!("/status/{id}"), Some(ANA)).await;
    let echoed = PathBuf::from(String::from_utf8(body_bytes(res).await).unwrap());
    assert_eq!(echoed, upload);

    let res = app.delete(&format!("/excluir/{id}"), Some(ANA)).await;
    assert_eq!(res.status(), 200);
    assert!(!upload.exists());
}

#[tokio::test]
async fn file_field_alias_is_accepted() {
    let app = TestApp::new(vec![ArtifactStub::shared(JobKind::BatchLookup)]).await;
    let body = multipart_body(
        &[("opcao", "batch-lookup")],
        Some(("file", "entrada.xlsx", b"dados")),
    );
    let res = app.send(multipart_request(Some(ANA), body)).await;
    assert_eq!(res.status(), 202);
}

#[tokio::test]
async fn batch_lookup_without_file_is_rejected() {
    let app = TestApp::new(vec![ArtifactStub::shared(JobKind::BatchLookup)]).await;
    let body = multipart_body(&[("opcao", "batch-lookup")], None);
    let res = app.send(multipart_request(Some(ANA), body)).await;
    assert_eq!(res.status(), 400);
    assert_eq!(body_json(res).await["mensagem"], "Arquivo de entrada não enviado.");
    assert!(app.state.job_queue.list_by_owner(ANA).await.is_empty());
}

#[tokio::test]
async fn rejected_submission_discards_its_upload() {
    let app = TestApp::new(vec![ArtifactStub::shared(JobKind::BatchLookup)]).await;
    let body = multipart_body(
        &[("opcao", "3. Inexistente")],
        Some(("arquivo", "lote.xlsx", b"dados")),
    );
    let res = app.send(multipart_request(Some(ANA), body)).await;
    assert_eq!(res.status(), 400);

    let uploads = app.dir.path().join("uploads");
    let leftover = std::fs::read_dir(&uploads)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn invoice_form_fields_are_read_from_multipart() {
    let app = TestApp::new(vec![ArtifactStub::shared(JobKind::InvoiceDownload)]).await;
    let body = multipart_body(
        &[
            ("opcao", "1. Download PDF Católica"),
            ("user", "cliente"),
            ("password", "senha"),
        ],
        None,
    );
    let res = app.send(multipart_request(Some(ANA), body)).await;
    assert_eq!(res.status(), 202);
    let id = Uuid::parse_str(body_json(res).await["id"].as_str().unwrap()).unwrap();
    let record = app.wait_terminal(id).await;
    assert_eq!(record.descriptor.arguments, vec!["cliente", "senha"]);
}
