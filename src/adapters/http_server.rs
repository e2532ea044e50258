//! ESP-IDF HTTP server glue.
//!
//! Registers one wildcard handler per method.  Handlers run on the httpd
//! task: they read the body, route it through [`api::route`], forward
//! service commands over the [`Bridge`](crate::api::channels::Bridge) and
//! write the rendered JSON back.  They never touch controller state.
//!
//! Device-only; the routing and rendering it relies on are tested on the
//! host in [`crate::api`].

use esp_idf_svc::http::Method as SvcMethod;
use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::io::{EspIOError, Read, Write};
use log::{info, warn};

use crate::adapters::time::TaskDelay;
use crate::api::channels::bridge;
use crate::api::{self, CONTENT_TYPE_JSON, HttpResponse, Method, Route};

/// Largest request body accepted; anything longer is truncated and then
/// fails to parse.
const MAX_BODY: usize = 1024;
const HTTPD_STACK_SIZE: usize = 10 * 1024;

/// Start the server on `port`.  The returned handle must be kept alive.
pub fn start(port: u16) -> Result<EspHttpServer<'static>, esp_idf_svc::sys::EspError> {
    let config = Configuration {
        http_port: port,
        uri_match_wildcard: true,
        stack_size: HTTPD_STACK_SIZE,
        ..Default::default()
    };
    let mut server = EspHttpServer::new(&config)?;

    for (svc, method) in [
        (SvcMethod::Get, Method::Get),
        (SvcMethod::Post, Method::Post),
        (SvcMethod::Options, Method::Options),
    ] {
        server.fn_handler("/*", svc, move |req| handle(req, method))?;
    }

    info!("HTTP: server listening on port {}", port);
    Ok(server)
}

fn read_body(req: &mut Request<&mut EspHttpConnection<'_>>, buf: &mut [u8]) -> usize {
    let mut len = 0;
    while len < buf.len() {
        match req.read(&mut buf[len..]) {
            Ok(0) => break,
            Ok(n) => len += n,
            Err(e) => {
                warn!("HTTP: body read failed: {:?}", e);
                break;
            }
        }
    }
    len
}

fn handle(mut req: Request<&mut EspHttpConnection<'_>>, method: Method) -> Result<(), EspIOError> {
    let path: heapless::String<64> = req.uri().try_into().unwrap_or_default();

    let mut buf = [0u8; MAX_BODY];
    let len = if method == Method::Post {
        read_body(&mut req, &mut buf)
    } else {
        0
    };

    let response = match api::route(method, &path, &buf[..len]) {
        Route::Immediate(resp) => resp,
        Route::Forward(command) => match bridge().exchange(command, &mut TaskDelay) {
            Some(reply) => api::render_reply(&reply.reply, &reply.health),
            None => HttpResponse::unavailable(),
        },
    };

    let mut headers: heapless::Vec<(&str, &str), 4> = response.headers().copied().collect();
    if !response.preflight {
        // Capacity covers the CORS set plus this one.
        let _ = headers.push(("Content-Type", CONTENT_TYPE_JSON));
    }

    let mut out = req.into_response(response.status, None, &headers)?;
    out.write_all(response.body.as_bytes())?;
    Ok(())
}
