//! Shared helpers for sync integration tests
//!
//! Provides configs pointing at a wiremock server, engine wiring over the
//! real adapters, and an in-memory WebDAV server that echoes back whatever
//! was PUT.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use oneroll_core::domain::{CredentialMode, SyncConfig};
use oneroll_remote::{backend_for, AuthManager, HttpClient, MemoryTokenStore};
use oneroll_sync::{LocalPhotoStore, SyncEngine};
use tempfile::TempDir;
use url::Url;
use wiremock::{Request, Respond, ResponseTemplate};

pub const DEVICE_ID: &str = "device-1";
pub const OCCASION_ID: &str = "occ-1";

/// Broker config whose base is `{server}/api`
pub fn broker_config(uri: &str) -> SyncConfig {
    SyncConfig {
        endpoint_base: Url::parse(&format!("{uri}/api")).unwrap(),
        path_prefix: String::new(),
        credential_mode: CredentialMode::BearerViaEnroll {
            invite_token: "invite-xyz".to_string(),
        },
        occasion_id: OCCASION_ID.to_string(),
        device_id: DEVICE_ID.to_string(),
        device_model: "Test Model".to_string(),
        platform: "linux".to_string(),
        max_photos: 24,
    }
}

/// WebDAV config whose base is `{server}/dav` with prefix `/photos`
pub fn webdav_config(uri: &str) -> SyncConfig {
    SyncConfig {
        endpoint_base: Url::parse(&format!("{uri}/dav")).unwrap(),
        path_prefix: "/photos".to_string(),
        credential_mode: CredentialMode::Basic {
            username: "guest".to_string(),
            password: "secret".to_string(),
        },
        ..broker_config(uri)
    }
}

/// Engine over the real adapters, a fresh auth manager and a temp store
pub struct Harness {
    pub engine: SyncEngine,
    pub auth: Arc<AuthManager>,
    pub store: LocalPhotoStore,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(config: &SyncConfig) -> Self {
        let auth = Arc::new(AuthManager::new(
            HttpClient::new(),
            Arc::new(MemoryTokenStore::new()),
        ));
        Self::with_auth(config, auth)
    }

    pub fn with_auth(config: &SyncConfig, auth: Arc<AuthManager>) -> Self {
        let dir = TempDir::new().unwrap();
        let store = LocalPhotoStore::new(dir.path().join("photos"), dir.path().join("occasion"));
        let backend = backend_for(config.backend_kind(), HttpClient::new());
        let engine = SyncEngine::new(backend, auth.clone(), Arc::new(store.clone()));
        Self {
            engine,
            auth,
            store,
            dir,
        }
    }
}

#[derive(Default)]
struct DavState {
    folders: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
}

/// In-memory WebDAV server: MKCOL, PUT, PROPFIND (Depth 1) and GET
#[derive(Clone, Default)]
pub struct EchoDav {
    state: Arc<Mutex<DavState>>,
}

impl EchoDav {
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    fn propfind(state: &DavState, folder: &str) -> ResponseTemplate {
        if !state.folders.contains(folder) {
            return ResponseTemplate::new(404);
        }
        let mut children: BTreeMap<String, bool> = BTreeMap::new();
        let nested = state
            .folders
            .iter()
            .map(|f| (f.as_str(), true))
            .chain(state.files.keys().map(|f| (f.as_str(), false)));
        for (path, is_collection) in nested {
            let Some(rest) = path.strip_prefix(folder) else {
                continue;
            };
            let rest = rest.trim_end_matches('/');
            if rest.is_empty() || rest.contains('/') {
                continue;
            }
            let href = if is_collection {
                format!("{folder}{rest}/")
            } else {
                format!("{folder}{rest}")
            };
            children.insert(href, is_collection);
        }

        let mut xml = String::from(r#"<?xml version="1.0"?><d:multistatus xmlns:d="DAV:">"#);
        let own = std::iter::once((folder.to_string(), true));
        for (href, is_collection) in own.chain(children) {
            let resource_type = if is_collection {
                "<d:resourcetype><d:collection/></d:resourcetype>"
            } else {
                "<d:resourcetype/>"
            };
            xml.push_str(&format!(
                "<d:response><d:href>{href}</d:href><d:propstat><d:prop>{resource_type}</d:prop></d:propstat></d:response>"
            ));
        }
        xml.push_str("</d:multistatus>");
        ResponseTemplate::new(207).set_body_string(xml)
    }
}

impl Respond for EchoDav {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let path = request.url.path().to_string();
        let mut state = self.state.lock().unwrap();
        match request.method.as_str() {
            "MKCOL" => {
                let parent_chain: Vec<String> = ancestors(&path);
                if state.folders.contains(&path) {
                    return ResponseTemplate::new(405);
                }
                state.folders.extend(parent_chain);
                state.folders.insert(path);
                ResponseTemplate::new(201)
            }
            "PUT" => {
                state.files.insert(path, request.body.clone());
                ResponseTemplate::new(201)
            }
            "PROPFIND" => Self::propfind(&state, &path),
            "GET" => match state.files.get(&path) {
                Some(body) => ResponseTemplate::new(200).set_body_bytes(body.clone()),
                None => ResponseTemplate::new(404),
            },
            _ => ResponseTemplate::new(405),
        }
    }
}

/// `/a/b/c/` → [`/`, `/a/`, `/a/b/`]
fn ancestors(path: &str) -> Vec<String> {
    let mut out = vec!["/".to_string()];
    let mut current = String::from("/");
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    for segment in segments.iter().take(segments.len().saturating_sub(1)) {
        current.push_str(segment);
        current.push('/');
        out.push(current.clone());
    }
    out
}
