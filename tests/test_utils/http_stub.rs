//! Scripted HTTP/1.1 responder on 127.0.0.1 for calendar client tests
//!
//! Responses are queued per path prefix and served one per connection.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

struct Route {
    prefix: String,
    responses: VecDeque<(u16, String)>,
}

type Routes = Arc<Mutex<Vec<Route>>>;
type Requests = Arc<Mutex<Vec<RecordedRequest>>>;

pub struct HttpStub {
    base_url: String,
    routes: Routes,
    requests: Requests,
}

impl HttpStub {
    pub fn start() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("Failed to bind stub server");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let routes: Routes = Arc::new(Mutex::new(Vec::new()));
        let requests: Requests = Arc::new(Mutex::new(Vec::new()));

        let (served_routes, served_requests) = (routes.clone(), requests.clone());
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                serve(stream, &served_routes, &served_requests);
            }
        });

        Self {
            base_url,
            routes,
            requests,
        }
    }

    /// Queue one response for requests whose path starts with `prefix`
    pub fn respond(&self, prefix: &str, status: u16, body: &str) -> &Self {
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|route| route.prefix == prefix) {
            Some(route) => route.responses.push_back((status, body.to_string())),
            None => routes.push(Route {
                prefix: prefix.to_string(),
                responses: VecDeque::from([(status, body.to_string())]),
            }),
        }
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.path.starts_with(prefix))
            .cloned()
            .collect()
    }
}

fn serve(stream: TcpStream, routes: &Routes, requests: &Requests) {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0;
    let mut authorization = None;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header).unwrap_or(0) == 0 {
            break;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            match name.to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                "authorization" => authorization = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }

    let mut body = vec![0; content_length];
    if reader.read_exact(&mut body).is_err() {
        return;
    }

    let (status, payload) = routes
        .lock()
        .unwrap()
        .iter_mut()
        .find(|route| path.starts_with(&route.prefix))
        .and_then(|route| route.responses.pop_front())
        .unwrap_or((404, r#"{"error":"no scripted response"}"#.to_string()));

    requests.lock().unwrap().push(RecordedRequest {
        method,
        path,
        authorization,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let response = format!(
        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    );
    let mut stream = reader.into_inner();
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
