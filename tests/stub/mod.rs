use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

/// Behaviour of the combined tracker / catalog / metadata stub.
#[derive(Debug, Clone)]
pub struct StubConfig {
    /// Every unfulfilled request, newest first.
    pub listing: Vec<Value>,
    pub perpage: usize,
    /// Listing calls answered with 500 before the listing starts working.
    pub listing_failures: usize,
    /// When set, listing calls without `mam_id=<value>` get a 403.
    pub required_session: Option<String>,
    /// Sent back as `Set-Cookie: mam_id=<value>` on listing responses.
    pub rotated_session: Option<String>,
    /// Catalog hits keyed by the queried author name.
    pub catalog_hits: HashMap<String, Vec<Value>>,
    pub catalog_failing_authors: HashSet<String>,
    pub catalog_garbage_authors: HashSet<String>,
    pub metadata_status: u16,
    pub metadata_body: Value,
    pub torrent_body: Value,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            listing: Vec::new(),
            perpage: 100,
            listing_failures: 0,
            required_session: None,
            rotated_session: None,
            catalog_hits: HashMap::new(),
            catalog_failing_authors: HashSet::new(),
            catalog_garbage_authors: HashSet::new(),
            metadata_status: 200,
            metadata_body: json!([]),
            torrent_body: json!({ "error": "Nothing returned, out of 0" }),
        }
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: String,
    pub cookie: Option<String>,
}

impl Recorded {
    #[allow(dead_code)]
    pub fn json_body(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }

    #[allow(dead_code)]
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

pub struct Stub {
    pub base_url: String,
    config: Arc<Mutex<StubConfig>>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl Stub {
    pub fn spawn(config: StubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start stub server");
        let base_url = format!("http://{}", server.server_addr());

        let config = Arc::new(Mutex::new(config));
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let listing_calls = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = {
            let config = Arc::clone(&config);
            let recorded = Arc::clone(&recorded);
            thread::spawn(move || {
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }

                    let mut request = match server.recv_timeout(Duration::from_millis(50)) {
                        Ok(Some(req)) => req,
                        Ok(None) => continue,
                        Err(_) => break,
                    };

                    let mut body = String::new();
                    let _ = request.as_reader().read_to_string(&mut body);
                    let parsed = url::Url::parse(&format!("http://stub{}", request.url()))
                        .expect("parse request url");
                    let cookie = request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv("Cookie"))
                        .map(|h| h.value.as_str().to_owned());
                    let entry = Recorded {
                        method: request.method().to_string(),
                        path: parsed.path().to_owned(),
                        query: parsed
                            .query_pairs()
                            .map(|(k, v)| (k.into_owned(), v.into_owned()))
                            .collect(),
                        body,
                        cookie,
                    };
                    recorded.lock().unwrap().push(entry.clone());

                    let config = config.lock().unwrap().clone();
                    let (status, body, set_cookie) = match entry.path.as_str() {
                        "/tor/json/loadRequests.php" => {
                            respond_listing(&config, &entry, &listing_calls)
                        }
                        "/tor/js/loadSearchJSONbasic.php" => {
                            (200, config.torrent_body.to_string(), None)
                        }
                        "/graphql" => respond_catalog(&config, &entry),
                        "/book/auto_complete" => {
                            (config.metadata_status, config.metadata_body.to_string(), None)
                        }
                        _ => (404, "not found".to_owned(), None),
                    };

                    let mut response =
                        tiny_http::Response::from_string(body).with_status_code(status);
                    let header =
                        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                            .expect("build header");
                    response = response.with_header(header);
                    if let Some(token) = set_cookie {
                        let header = tiny_http::Header::from_bytes(
                            &b"Set-Cookie"[..],
                            format!("mam_id={token}; Path=/").as_bytes(),
                        )
                        .expect("build cookie header");
                        response = response.with_header(header);
                    }
                    let _ = request.respond(response);
                }
            })
        };

        Self {
            base_url,
            config,
            recorded,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut StubConfig)) {
        f(&mut self.config.lock().unwrap());
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn recorded_at(&self, path: &str) -> Vec<Recorded> {
        self.recorded()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn clear_recorded(&self) {
        self.recorded.lock().unwrap().clear();
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for Stub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn respond_listing(
    config: &StubConfig,
    entry: &Recorded,
    calls: &AtomicUsize,
) -> (u16, String, Option<String>) {
    if let Some(required) = config.required_session.as_deref() {
        let expected = format!("mam_id={required}");
        if entry.cookie.as_deref() != Some(expected.as_str()) {
            return (403, "forbidden".to_owned(), None);
        }
    }
    if calls.fetch_add(1, Ordering::SeqCst) < config.listing_failures {
        return (500, "temporarily unavailable".to_owned(), None);
    }

    let offset = entry
        .query_param("tor[startNumber]")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let page = config
        .listing
        .iter()
        .skip(offset)
        .take(config.perpage)
        .cloned()
        .collect::<Vec<_>>();
    let body = json!({
        "data": page,
        "found": config.listing.len(),
        "perpage": config.perpage,
    });
    (200, body.to_string(), config.rotated_session.clone())
}

fn respond_catalog(config: &StubConfig, entry: &Recorded) -> (u16, String, Option<String>) {
    let payload = entry.json_body();
    let author = payload
        .pointer("/variables/criteria/artistName")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    if config.catalog_failing_authors.contains(&author) {
        return (500, "catalog exploded".to_owned(), None);
    }
    if config.catalog_garbage_authors.contains(&author) {
        return (200, "<html>not json</html>".to_owned(), None);
    }
    let hits = config.catalog_hits.get(&author).cloned().unwrap_or_default();
    let body = json!({
        "data": {
            "search": {
                "found": hits.len(),
                "hits": hits,
            }
        }
    });
    (200, body.to_string(), None)
}

/// A raw listing record as the tracker sends it.
#[allow(dead_code)]
pub fn request_record(id: u64, title: &str, authors: &[&str], cat_name: &str) -> Value {
    let authors = authors
        .iter()
        .enumerate()
        .map(|(i, name)| (format!("{}", 1000 + i), Value::String((*name).to_owned())))
        .collect::<serde_json::Map<_, _>>();
    let category = if cat_name.starts_with("Audiobooks") { 49 } else { 60 };
    json!({
        "id": id,
        "title": title,
        "authors": Value::Object(authors).to_string(),
        "category": category,
        "cat_name": cat_name,
        "filled": 0,
        "torsatch": 0,
        "lang_code": 1,
        "votes": 1,
        "series_info": null,
    })
}

#[allow(dead_code)]
pub fn catalog_hit(id: u64, title: &str, subtitle: Option<&str>) -> Value {
    json!({
        "id": id.to_string(),
        "title": title,
        "subtitle": subtitle,
        "kind": { "name": "EBOOK" },
        "releaseDate": "2020-01-01",
        "artKey": format!("art{id}"),
        "primaryArtist": { "name": "Someone" },
    })
}
