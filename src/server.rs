use std::{
    fs,
    io::Read,
    path::{Component, Path, PathBuf},
    sync::Arc,
    thread,
};

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use tiny_http::{Header, Method, Request, Response, Server};

use crate::{
    error::ProcessError,
    pipeline::{FrameProcessor, decode_image_payload},
};

const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    File {
        bytes: Vec<u8>,
        content_type: &'static str,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl HttpResponse {
    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: ResponseBody::Json(body),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "error": message }))
    }

    fn frame_failure(status: u16, message: String) -> Self {
        Self::json(
            status,
            json!({ "jump": false, "landmarks": [], "error": message }),
        )
    }

    fn not_found() -> Self {
        Self::error(404, "Not found")
    }

    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::File { .. } => None,
        }
    }
}

pub struct GestureService {
    processor: FrameProcessor,
    static_dir: PathBuf,
}

impl GestureService {
    pub fn new(processor: FrameProcessor, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            processor,
            static_dir: static_dir.into(),
        }
    }

    pub fn handle(&self, method: &Method, url: &str, body: &[u8]) -> HttpResponse {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        match (method, path) {
            (Method::Post, "/process_frame") => self.process_frame(body),
            (_, "/process_frame") => HttpResponse::error(405, "Method not allowed"),
            (Method::Get, "/") => self.static_file(Path::new("index.html")),
            (Method::Get, p) => match p.strip_prefix("/static/") {
                Some(rel) => self.static_file(Path::new(rel)),
                None => HttpResponse::not_found(),
            },
            _ => HttpResponse::not_found(),
        }
    }

    fn process_frame(&self, body: &[u8]) -> HttpResponse {
        let request: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(err) => {
                log::debug!("rejecting frame request with malformed body: {err}");
                return HttpResponse::error(400, "Invalid request body");
            }
        };

        let image = match request.get("image").and_then(Value::as_str) {
            Some(image) if !image.is_empty() => image,
            _ => return HttpResponse::error(400, "No image data"),
        };

        let frame = match decode_image_payload(image) {
            Ok(frame) => frame,
            Err(err) => {
                log::debug!("rejecting undecodable frame: {err}");
                return HttpResponse::error(400, "Invalid image data");
            }
        };

        match self.processor.process_frame(&frame) {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(value) => HttpResponse::json(200, value),
                Err(err) => HttpResponse::frame_failure(500, err.to_string()),
            },
            Err(err @ ProcessError::ProviderBusy(_)) => {
                log::warn!("dropping frame: {err}");
                HttpResponse::frame_failure(503, err.to_string())
            }
            Err(err @ ProcessError::Provider(_)) => {
                log::error!("error processing frame: {err}");
                HttpResponse::frame_failure(500, err.to_string())
            }
        }
    }

    fn static_file(&self, relative: &Path) -> HttpResponse {
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe || relative.as_os_str().is_empty() {
            return HttpResponse::not_found();
        }

        let path = self.static_dir.join(relative);
        match fs::read(&path) {
            Ok(bytes) => HttpResponse {
                status: 200,
                body: ResponseBody::File {
                    bytes,
                    content_type: content_type_for(&path),
                },
            },
            Err(err) => {
                log::debug!("static file {} unavailable: {err}", path.display());
                HttpResponse::not_found()
            }
        }
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

pub fn serve(service: Arc<GestureService>, bind: &str, workers: usize) -> Result<()> {
    let server =
        Arc::new(Server::http(bind).map_err(|err| anyhow!("failed to bind {bind}: {err}"))?);
    log::info!("listening on http://{bind} with {workers} worker threads");

    let mut handles = Vec::with_capacity(workers);
    for idx in 0..workers.max(1) {
        let server = server.clone();
        let service = service.clone();
        let handle = thread::Builder::new()
            .name(format!("http-worker-{idx}"))
            .spawn(move || worker_loop(&server, &service))
            .context("failed to spawn http worker")?;
        handles.push(handle);
    }

    for handle in handles {
        if handle.join().is_err() {
            log::error!("http worker panicked");
        }
    }
    Ok(())
}

fn worker_loop(server: &Server, service: &GestureService) {
    loop {
        match server.recv() {
            Ok(request) => handle_request(service, request),
            Err(err) => {
                log::error!("failed to receive request: {err}");
                break;
            }
        }
    }
}

fn handle_request(service: &GestureService, mut request: Request) {
    let mut body = Vec::new();
    let response = match request
        .as_reader()
        .take(MAX_BODY_BYTES + 1)
        .read_to_end(&mut body)
    {
        Ok(_) if body.len() as u64 > MAX_BODY_BYTES => {
            HttpResponse::error(413, "Request body too large")
        }
        Ok(_) => service.handle(request.method(), request.url(), &body),
        Err(err) => {
            log::debug!("failed to read request body: {err}");
            HttpResponse::error(400, "Invalid request body")
        }
    };

    log::debug!(
        "{} {} -> {}",
        request.method(),
        request.url(),
        response.status
    );

    let (bytes, content_type) = match response.body {
        ResponseBody::Json(value) => (value.to_string().into_bytes(), "application/json"),
        ResponseBody::File {
            bytes,
            content_type,
        } => (bytes, content_type),
    };
    let mut reply = Response::from_data(bytes).with_status_code(response.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
        reply = reply.with_header(header);
    }
    if let Err(err) = request.respond(reply) {
        log::warn!("failed to send response: {err}");
    }
}
