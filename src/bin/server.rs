//! Reference router: a small static-file and echo server exercising every
//! operation on [`HttpMessage`]'s public surface.
//!
//! Grounded directly on `original_source/src/server/include/routes.c`'s
//! `default_handler`/`echo_handler`/`static_handler`/`favicon_handler` —
//! reworked onto `set_status`/`set_header`/`serve_file`/`write_body` in
//! place of writing straight into a union-typed C struct, but the routing
//! decisions (content-type gate on `/echo`, path canonicalization under
//! `/static`, GET-only enforcement, favicon's 204 fallback) are unchanged.

use std::path::{Path, PathBuf};

use epoll_http::{event_loop, limits::*, HttpMessage, Method, Router, RouterError};

const STATIC_ROOT: &str = "static";

struct ReferenceRouter {
    static_root: PathBuf,
}

impl ReferenceRouter {
    fn new(static_root: impl Into<PathBuf>) -> Self {
        Self { static_root: static_root.into() }
    }

    fn not_found(response: &mut HttpMessage) -> Result<(), RouterError> {
        response.set_status(404, b"Not Found")?;
        response.serve_file(Path::new("static/html/NotFound.html"))
    }

    fn forbidden(response: &mut HttpMessage) -> Result<(), RouterError> {
        response.set_status(403, b"Forbidden")?;
        response.serve_file(Path::new("static/html/Forbidden.html"))
    }

    fn index(&self, request: &HttpMessage, response: &mut HttpMessage) -> Result<(), RouterError> {
        if request.method() != Some(Method::Get) {
            response.set_status(405, b"Method Not Allowed")?;
            response.set_header(b"allow", b"GET")?;
            return Ok(());
        }
        response.set_status(200, b"OK")?;
        response.serve_file(&self.static_root.join("html/index.html"))
    }

    fn echo(&self, request: &HttpMessage, response: &mut HttpMessage) -> Result<(), RouterError> {
        if request.method() != Some(Method::Post) {
            response.set_status(405, b"Method Not Allowed")?;
            response.set_header(b"allow", b"POST")?;
            return Ok(());
        }
        let content_type = request.header(b"content-type").unwrap_or(b"");
        if content_type != b"text/plain" {
            response.set_status(415, b"Unsupported Media Type")?;
            return response.serve_file(&self.static_root.join("html/UnsupportedMediaType.html"));
        }
        let body = request.read_body_to_vec()?;
        response.set_status(200, b"OK")?;
        response.set_header(b"content-type", b"text/plain")?;
        response.write_body(&body)
    }

    /// Serves a file under `static_root`, 403ing anything that resolves
    /// outside it (the source's `realpath` + prefix-check, reimplemented on
    /// `std::fs::canonicalize`).
    fn static_file(&self, request: &HttpMessage, response: &mut HttpMessage) -> Result<(), RouterError> {
        if request.method() != Some(Method::Get) {
            response.set_status(405, b"Method Not Allowed")?;
            response.set_header(b"allow", b"GET")?;
            return Ok(());
        }

        let Some(url) = request.url() else {
            return Self::not_found(response);
        };
        // `path_segments()` starts with the "static" segment that selected
        // this handler; everything after it is relative to `static_root`.
        let rel: PathBuf = url.path_segments()[1..]
            .iter()
            .map(|seg| String::from_utf8_lossy(seg).into_owned())
            .collect();
        let requested = self.static_root.join(rel);

        let Ok(resolved) = std::fs::canonicalize(&requested) else {
            return Self::not_found(response);
        };
        let Ok(static_root_resolved) = std::fs::canonicalize(&self.static_root) else {
            return Self::forbidden(response);
        };
        if !resolved.starts_with(&static_root_resolved) {
            return Self::forbidden(response);
        }
        match std::fs::metadata(&resolved) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Self::forbidden(response),
            Err(_) => return Self::not_found(response),
        }

        response.set_status(200, b"OK")?;
        response.serve_file(&resolved)
    }

    fn favicon(&self, request: &HttpMessage, response: &mut HttpMessage) -> Result<(), RouterError> {
        if request.method() != Some(Method::Get) {
            response.set_status(405, b"Method Not Allowed")?;
            response.set_header(b"allow", b"GET")?;
            return Ok(());
        }
        let path = self.static_root.join("favicon.ico");
        if path.is_file() {
            response.set_status(200, b"OK")?;
            response.set_header(b"content-type", b"image/x-icon")?;
            response.set_header(b"cache-control", b"public, max-age=86400")?;
            response.serve_file(&path)
        } else {
            response.set_status(204, b"No Content")
        }
    }
}

impl Router for ReferenceRouter {
    fn route(&self, request: &HttpMessage, response: &mut HttpMessage) -> Result<(), RouterError> {
        let Some(url) = request.url() else {
            return Self::not_found(response);
        };
        match url.path_segments() {
            [] => self.index(request, response),
            [b"echo"] => self.echo(request, response),
            [b"favicon.ico"] => self.favicon(request, response),
            [b"static", ..] => self.static_file(request, response),
            _ => Self::not_found(response),
        }
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();

    let listener = event_loop::bind_listener("0.0.0.0:8080")?;
    let router = ReferenceRouter::new(STATIC_ROOT);

    log::info!("epoll_http reference server listening on 0.0.0.0:8080");
    event_loop::run(
        listener,
        &router,
        &ServerLimits::default(),
        &ConnLimits::default(),
        &ReqLimits::default(),
        &RespLimits::default(),
    )
}
