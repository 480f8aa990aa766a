use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use a11y_bridge::background::{
    Background, BackgroundServices, MessageSender, TabEndpoint, TabId, TabRegistry,
};
use a11y_bridge::config::AppConfig;
use a11y_bridge::content::styles::{FONT_STYLE_ID, MODE_STYLE_ID, OVERLAY_FRAME_ID};
use a11y_bridge::content::{OverlayHiddenReason, PageDocument, PageRuntime, ProductRequestError, RequestTimings};
use a11y_bridge::settings::models::{FontSize, StorageArea, keys};
use a11y_bridge::settings::repositories::BoxFuture;
use a11y_bridge::settings::{InMemorySettingsStore, SettingsStore};

/// Tab endpoint that only records what it is sent.
#[derive(Default)]
struct RecordingTab {
    received: Mutex<Vec<Value>>,
}

impl RecordingTab {
    fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }

    fn received_types(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|m| m["type"].as_str().map(str::to_string))
            .collect()
    }
}

impl TabEndpoint for RecordingTab {
    fn on_message(&self, message: Value) -> BoxFuture<'static, Option<Value>> {
        self.received.lock().push(message);
        Box::pin(async { Some(json!({ "success": true })) })
    }
}

struct Harness {
    store: Arc<InMemorySettingsStore>,
    tabs: Arc<TabRegistry>,
    background: Background,
}

impl Harness {
    async fn start(backend_url: &str) -> Self {
        Self::start_with(Arc::new(InMemorySettingsStore::new()), backend_url).await
    }

    async fn start_with(store: Arc<InMemorySettingsStore>, backend_url: &str) -> Self {
        let tabs = Arc::new(TabRegistry::new());
        let config = AppConfig {
            backend_url: backend_url.to_string(),
            ..AppConfig::default()
        };
        let services = BackgroundServices::new(store.clone(), tabs.clone(), &config).unwrap();
        let background = Background::start(services).await;
        Self {
            store,
            tabs,
            background,
        }
    }

    async fn open_page(&self, url: &str, timings: RequestTimings) -> (TabId, PageRuntime) {
        let tab_id = self.tabs.open_tab(url);
        let tab = self.tabs.tab(tab_id).unwrap();
        let page = PageRuntime::new(
            PageDocument::shared(url),
            self.store.clone(),
            Arc::new(self.background.link(MessageSender::from_tab(tab))),
            self.background.services().assets.clone(),
            timings,
        );
        self.tabs.attach(tab_id, Arc::new(page.clone())).unwrap();
        page.start().await;
        (tab_id, page)
    }

    fn open_recording_tab(&self, url: &str) -> (TabId, Arc<RecordingTab>) {
        let tab_id = self.tabs.open_tab(url);
        let recorder = Arc::new(RecordingTab::default());
        self.tabs.attach(tab_id, recorder.clone()).unwrap();
        (tab_id, recorder)
    }

    async fn send(&self, tab_id: TabId, message: Value) -> Value {
        let tab = self.tabs.tab(tab_id).unwrap();
        let tag = message["type"].as_str().unwrap_or_default().to_string();
        self.background
            .router()
            .dispatch(message, MessageSender::from_tab(tab))
            .into_response(&tag)
            .await
            .unwrap()
    }

    async fn write_sync(&self, items: Value) {
        self.store
            .set(StorageArea::Sync, items.as_object().cloned().unwrap())
            .await
            .unwrap();
    }
}

/// Poll `condition` until it holds or two seconds pass.
async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

fn font_and_mode(page: &PageRuntime) -> (Option<String>, Option<String>) {
    let doc = page.document().lock();
    (
        doc.style_node(FONT_STYLE_ID).map(str::to_string),
        doc.style_node(MODE_STYLE_ID).map(str::to_string),
    )
}

#[tokio::test]
async fn fresh_install_exposes_defaults() {
    let harness = Harness::start("http://127.0.0.1:9").await;
    let (tab_id, _page) = harness.open_page("https://shop.example/", RequestTimings::default()).await;

    let settings = harness.send(tab_id, json!({ "type": "GET_SETTINGS" })).await;
    assert_eq!(
        settings,
        json!({
            "fontSize": "m",
            "fontWeight": "bold",
            "themeMode": "light",
            "isCursorEnabled": true,
            "cursorSize": "medium",
            "cursorTheme": "white"
        })
    );

    let stored = harness.store.get(StorageArea::Sync, &keys::ALL).await.unwrap();
    assert_eq!(stored.len(), keys::ALL.len());
}

#[tokio::test]
async fn install_keeps_existing_values() {
    let store = Arc::new(InMemorySettingsStore::new());
    store
        .set(StorageArea::Sync, json!({ "fontSize": "xl" }).as_object().cloned().unwrap())
        .await
        .unwrap();
    let harness = Harness::start_with(store, "http://127.0.0.1:9").await;

    let record = harness.store.load_settings().await;
    assert_eq!(record.font_size, FontSize::Xl);
    assert!(record.styles_enabled);
}

#[tokio::test]
async fn theme_update_is_idempotent_on_page() {
    let harness = Harness::start("http://127.0.0.1:9").await;
    let (_tab_id, page) = harness.open_page("https://shop.example/", RequestTimings::default()).await;
    page.document().lock().add_element("p");

    let update = json!({
        "type": "THEME_UPDATE",
        "payload": { "fontSize": "l", "fontWeight": "xbold", "themeMode": "dark" }
    });
    page.on_message(update.clone()).await;
    let first = page.document().lock().style_nodes().to_vec();
    let first_inline = page.document().lock().element(0).cloned();

    page.on_message(update).await;
    assert_eq!(page.document().lock().style_nodes(), first.as_slice());
    assert_eq!(page.document().lock().element(0).cloned(), first_inline);
}

#[tokio::test]
async fn disable_then_restore_brings_back_the_stored_look() {
    let harness = Harness::start("http://127.0.0.1:9").await;
    harness
        .write_sync(json!({ "fontSize": "xl", "themeMode": "dark" }))
        .await;
    let (tab_id, page) = harness.open_page("https://shop.example/", RequestTimings::default()).await;
    let before = font_and_mode(&page);
    assert!(before.0.is_some() && before.1.is_some());

    let toggled = harness.send(tab_id, json!({ "type": "TOGGLE_ALL_STYLES" })).await;
    assert_eq!(toggled, json!({ "success": true, "stylesEnabled": false }));
    eventually(|| page.document().lock().style_nodes().is_empty()).await;
    eventually(|| !page.overlay().is_present()).await;

    harness.send(tab_id, json!({ "type": "TOGGLE_ALL_STYLES" })).await;
    eventually(|| font_and_mode(&page) == before).await;
    eventually(|| page.overlay().is_present()).await;
    assert!(harness.store.load_settings().await.styles_enabled);
}

#[tokio::test]
async fn unrelated_keys_are_not_broadcast() {
    let harness = Harness::start("http://127.0.0.1:9").await;
    let (tab_id, recorder) = harness.open_recording_tab("https://shop.example/cart");

    let ack = harness
        .send(tab_id, json!({ "type": "CART_ITEMS_UPDATED", "data": [{ "id": 1 }] }))
        .await;
    assert_eq!(ack["success"], true);
    harness.write_sync(json!({ "somethingElse": 1 })).await;

    // Batches are handled in order, so once this one arrives the others were skipped.
    harness.write_sync(json!({ "cursorSize": "large" })).await;
    eventually(|| !recorder.received().is_empty()).await;
    assert_eq!(recorder.received_types(), vec!["UPDATE_CURSOR"]);
}

#[tokio::test]
async fn broadcast_payload_comes_from_the_cache() {
    let harness = Harness::start("http://127.0.0.1:9").await;
    let (_tab_id, recorder) = harness.open_recording_tab("https://shop.example/");

    harness.write_sync(json!({ "fontSize": "l" })).await;
    harness.write_sync(json!({ "fontWeight": "xbold" })).await;

    eventually(|| recorder.received().len() == 2).await;
    let last = recorder.received().pop().unwrap();
    assert_eq!(last["type"], "THEME_UPDATE");
    assert_eq!(last["payload"]["fontSize"], "l");
    assert_eq!(last["payload"]["fontWeight"], "xbold");
    assert_eq!(last["payload"]["themeMode"], "light");
}

#[tokio::test]
async fn sidebar_toggle_cannot_reopen_overlay_hidden_by_overlay_toggle() {
    let harness = Harness::start("http://127.0.0.1:9").await;
    let (_tab_id, page) = harness.open_page("https://shop.example/", RequestTimings::default()).await;
    assert!(page.overlay().is_present());

    harness.background.router().on_command("toggle_iframe").await.unwrap();
    assert!(!page.overlay().is_present());

    harness.background.router().on_command("toggle_sidebar").await.unwrap();
    assert!(!page.overlay().is_present());
    assert!(page.document().lock().frame(OVERLAY_FRAME_ID).is_none());
    assert_eq!(
        page.overlay().hidden_reason().await,
        OverlayHiddenReason::HiddenByToggleA
    );

    harness.background.router().on_command("toggle_iframe").await.unwrap();
    assert!(page.overlay().is_present());
}

#[tokio::test]
async fn sidebar_toggle_leaves_disabled_page_without_overlay() {
    let harness = Harness::start("http://127.0.0.1:9").await;
    let (tab_id, page) = harness.open_page("https://shop.example/", RequestTimings::default()).await;
    harness.background.router().on_command("toggle_sidebar").await.unwrap();
    assert_eq!(
        page.overlay().hidden_reason().await,
        OverlayHiddenReason::HiddenByToggleV
    );

    harness.send(tab_id, json!({ "type": "TOGGLE_ALL_STYLES" })).await;
    eventually(|| !page.overlay().is_present()).await;

    harness.background.router().on_command("toggle_sidebar").await.unwrap();
    assert!(!page.overlay().is_present());
    assert!(page.document().lock().style_nodes().is_empty());
}

#[tokio::test]
async fn health_data_reaches_sender_and_its_tab() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/health-food/keywords"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": ["IMMUNE", "SKIN"] })))
        .expect(1)
        .mount(&server)
        .await;

    let harness = Harness::start(&server.uri()).await;
    let (tab_id, page) = harness
        .open_page("https://shop.example/vp/products/123", RequestTimings::default())
        .await;

    let response = harness
        .send(
            tab_id,
            json!({
                "type": "FETCH_HEALTH_DATA",
                "payload": {
                    "productId": "123",
                    "title": "X",
                    "html": "<div/>",
                    "birthYear": 1990,
                    "gender": "male",
                    "allergies": []
                }
            }),
        )
        .await;

    let expected = json!({ "type": "HEALTH_DATA_RESPONSE", "data": ["IMMUNE", "SKIN"] });
    assert_eq!(response, expected);
    assert_eq!(page.context().replies(), vec![expected]);
}

#[tokio::test]
async fn page_assembles_health_request_from_profile_and_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/health-food/keywords"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": ["BONE"] })))
        .mount(&server)
        .await;

    let harness = Harness::start(&server.uri()).await;
    let (_tab_id, page) = harness
        .open_page("https://shop.example/vp/products/55", RequestTimings::default())
        .await;
    {
        let mut doc = page.document().lock();
        doc.product_mut().title = Some("Calcium".into());
        doc.product_mut().vendor_html = Some("<div>vendor</div>".into());
    }
    let mut profile = Map::new();
    profile.insert("birthYear".into(), json!(1985));
    profile.insert("gender".into(), json!("female"));
    harness.store.set(StorageArea::Local, profile).await.unwrap();

    let data = page.requests().request_health_data().await.unwrap();
    assert_eq!(data, json!(["BONE"]));

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["productId"], "55");
    assert_eq!(body["title"], "Calcium");
    assert_eq!(body["birthYear"], 1985);
}

#[tokio::test]
async fn review_server_error_only_reaches_originating_tab() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/review/summary"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "server error" })))
        .mount(&server)
        .await;

    let harness = Harness::start(&server.uri()).await;
    let (_other_id, other) = harness.open_recording_tab("https://shop.example/");
    let timings = RequestTimings {
        review_retry_delay: Duration::from_millis(20),
        ..RequestTimings::default()
    };
    let (tab_id, page) = harness
        .open_page("https://shop.example/vp/products/9", timings)
        .await;

    let response = harness
        .send(
            tab_id,
            json!({
                "type": "FETCH_REVIEW_SUMMARY",
                "payload": { "productId": "9", "reviewRating": {}, "reviews": [] }
            }),
        )
        .await;
    let expected = json!({ "type": "REVIEW_SUMMARY_ERROR", "error": "server error" });
    assert_eq!(response, expected);
    assert_eq!(page.context().replies(), vec![expected.clone()]);

    // The page's own flow retries once, then gives up.
    page.document().lock().product_mut().review_payload = Some(json!({ "reviewRating": {}, "reviews": [] }));
    let err = page.requests().request_review_summary().await.unwrap_err();
    assert_eq!(err, ProductRequestError::BackendError("server error".into()));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);

    assert!(other.received().is_empty());
}
