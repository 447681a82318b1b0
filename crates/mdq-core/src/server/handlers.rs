//! Route dispatch and JSON handlers for the control plane.

use std::io::{Cursor, Read};

use serde_json::json;
use tiny_http::{Method, Request, Response};

use crate::catalog::ListFilter;
use crate::error::SubmitError;
use crate::queue::{SubmitOutcome, SubmitRequest};

use super::auth::KEY_HEADER;
use super::PlaneInner;

type JsonResponse = Response<Cursor<Vec<u8>>>;

fn json_response(status: u16, body: &serde_json::Value) -> JsonResponse {
    let mut resp = Response::from_string(body.to_string()).with_status_code(status);
    if let Ok(h) = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        resp = resp.with_header(h);
    }
    resp
}

fn error_response(status: u16, error: &str, message: &str) -> JsonResponse {
    json_response(status, &json!({ "error": error, "message": message }))
}

fn parse_json_body(request: &mut Request) -> Result<serde_json::Value, String> {
    let mut body = String::new();
    request
        .as_reader()
        .read_to_string(&mut body)
        .map_err(|e| format!("read body: {e}"))?;
    if body.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(&body).map_err(|e| format!("json: {e}"))
}

fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    let query = query?;
    for pair in query.split('&') {
        let Some((k, v)) = pair.split_once('=') else { continue };
        if k == name {
            return Some(urlencoding::decode(v).map(|s| s.into_owned()).unwrap_or_else(|_| v.to_string()));
        }
    }
    None
}

pub(super) fn handle_request(inner: &PlaneInner, mut request: Request) {
    let method = request.method().clone();
    let url = request.url().to_string();
    let (path, query) = match url.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (url.as_str(), None),
    };
    let segments: Vec<String> =
        path.trim_matches('/').split('/').filter(|s| !s.is_empty()).map(str::to_string).collect();
    let segs: Vec<&str> = segments.iter().map(String::as_str).collect();

    // Liveness is the only unauthenticated route.
    if method == Method::Get && segs == ["health"] {
        let _ = request.respond(json_response(200, &json!({ "status": "ok" })));
        return;
    }

    let presented = request
        .headers()
        .iter()
        .find(|h| h.field.equiv(KEY_HEADER))
        .map(|h| h.value.as_str().to_string());
    if !inner.key.verify(presented.as_deref()) {
        tracing::warn!(path, "rejected request without a valid signing key");
        let _ = request.respond(error_response(401, "unauthorized", "missing or invalid signing key"));
        return;
    }

    let response = match (method, segs.as_slice()) {
        (Method::Post, ["jobs"]) => submit(inner, &mut request),
        (Method::Get, ["jobs"]) => list_jobs(inner),
        (Method::Get, ["jobs", id]) => job_status(inner, id),
        (Method::Post, ["jobs", id, "cancel"]) => cancel_job(inner, id),
        (Method::Get, ["catalog"]) => list_catalog(inner, query),
        (Method::Delete, ["catalog"]) => clear_catalog(inner),
        (Method::Post, ["shutdown"]) => {
            // Ack first; the backend tears the process down after us.
            let _ = request.respond(json_response(200, &json!({ "status": "shutting_down" })));
            inner.shutdown.notify_one();
            return;
        }
        _ => error_response(404, "not_found", "no such route"),
    };
    let _ = request.respond(response);
}

fn submit(inner: &PlaneInner, request: &mut Request) -> JsonResponse {
    let payload = match parse_json_body(request) {
        Ok(v) => v,
        Err(msg) => return error_response(400, "invalid_request", &msg),
    };
    let submit_req: SubmitRequest = match serde_json::from_value(payload) {
        Ok(r) => r,
        Err(e) => return error_response(400, "invalid_request", &e.to_string()),
    };

    match inner.rt.block_on(inner.queue.submit(submit_req)) {
        Ok(SubmitOutcome::Queued(job_id)) => json_response(200, &json!({ "job_id": job_id })),
        Ok(SubmitOutcome::AlreadyCompleted(entry)) => {
            json_response(200, &json!({ "already_completed": entry }))
        }
        Err(SubmitError::InvalidRequest(msg)) => error_response(400, "invalid_request", &msg),
        Err(SubmitError::Duplicate) => {
            error_response(409, "duplicate", "a job for this source and destination is in flight")
        }
    }
}

fn list_jobs(inner: &PlaneInner) -> JsonResponse {
    let jobs = inner.rt.block_on(inner.queue.list());
    match serde_json::to_value(&jobs) {
        Ok(v) => json_response(200, &v),
        Err(e) => error_response(500, "internal", &e.to_string()),
    }
}

fn job_status(inner: &PlaneInner, id: &str) -> JsonResponse {
    match inner.rt.block_on(inner.queue.snapshot(id)) {
        Some(snap) => match serde_json::to_value(&snap) {
            Ok(v) => json_response(200, &v),
            Err(e) => error_response(500, "internal", &e.to_string()),
        },
        None => error_response(404, "not_found", "no such job"),
    }
}

fn cancel_job(inner: &PlaneInner, id: &str) -> JsonResponse {
    match inner.rt.block_on(inner.queue.cancel(id)) {
        Some(snap) => match serde_json::to_value(&snap) {
            Ok(v) => json_response(200, &v),
            Err(e) => error_response(500, "internal", &e.to_string()),
        },
        None => error_response(404, "not_found", "no such job"),
    }
}

fn list_catalog(inner: &PlaneInner, query: Option<&str>) -> JsonResponse {
    let filter = ListFilter { contains: query_param(query, "contains") };
    match inner.rt.block_on(inner.catalog.list(&filter)) {
        Ok(entries) => match serde_json::to_value(&entries) {
            Ok(v) => json_response(200, &v),
            Err(e) => error_response(500, "internal", &e.to_string()),
        },
        Err(e) => error_response(500, "internal", &format!("{e:#}")),
    }
}

fn clear_catalog(inner: &PlaneInner) -> JsonResponse {
    match inner.rt.block_on(inner.catalog.clear()) {
        Ok(n) => json_response(200, &json!({ "cleared": n })),
        Err(e) => error_response(500, "internal", &format!("{e:#}")),
    }
}
